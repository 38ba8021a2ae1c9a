pub mod buffered_emitter;
pub mod server;
pub mod writer_emitter;

pub use buffered_emitter::BufferedEmitter;
pub use server::{AppFactory, process_blocking, router, serve};
pub use writer_emitter::WriterEmitter;
