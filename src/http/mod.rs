//! Minimal HTTP message value objects consumed by the routing core.
//!
//! Header maps, methods and status codes come from the `http` crate; what
//! lives here is the request/response shape the middleware contract needs
//! (attributes, a seekable body, a URI with a base path).
pub mod body;
pub mod environment;
pub mod request;
pub mod response;
pub mod uri;

pub use body::Body;
pub use environment::Environment;
pub use request::Request;
pub use response::Response;
pub use uri::Uri;
