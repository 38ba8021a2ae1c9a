use std::{path::Path, sync::Arc};

use clap::Parser;
use color_eyre::{
    Result,
    eyre::{Context, eyre},
};
use http::{HeaderValue, header};
use switchyard::{
    App, HandlerArgs, Request, Response, Settings,
    adapters::server::{self, AppFactory},
    config::{SettingsValidator, load_or_default},
    from_fn, handler_fn, tracing_setup,
};
use tokio::net::TcpListener;

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    #[clap(subcommand)]
    command: Option<Commands>,

    /// Configuration file; built-in defaults when omitted
    #[clap(short, long)]
    config: Option<String>,
}

#[derive(Parser, Debug)]
enum Commands {
    /// Start the HTTP server (default)
    Serve {
        #[clap(short, long)]
        config: Option<String>,
    },
    /// Validate a configuration file
    Validate {
        #[clap(short, long, default_value = "config.toml")]
        config: String,
    },
    /// List the routes of the bundled application
    Routes {
        #[clap(short, long)]
        config: Option<String>,
    },
    /// Write a default configuration file
    Init {
        #[clap(short, long, default_value = "config.toml")]
        config: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    match args.command {
        Some(Commands::Serve { config }) => serve_command(config.or(args.config).as_deref()).await,
        Some(Commands::Validate { config }) => validate_command(&config),
        Some(Commands::Routes { config }) => routes_command(config.or(args.config).as_deref()),
        Some(Commands::Init { config }) => init_command(&config).await,
        None => serve_command(args.config.as_deref()).await,
    }
}

async fn serve_command(config_path: Option<&str>) -> Result<()> {
    let config = load_or_default(config_path)?;
    tracing_setup::init_tracing_with_config(&config.logging)?;
    SettingsValidator::validate(&config).wrap_err("Invalid configuration")?;

    // Surface registration errors before accepting connections.
    demo_app(config.settings.clone()).wrap_err("Failed to build application")?;

    let settings = config.settings.clone();
    let factory: AppFactory = Arc::new(move || demo_app(settings.clone()));

    let listener = TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.listen_addr))?;

    server::serve(listener, factory).await
}

fn validate_command(config_path: &str) -> Result<()> {
    println!("Validating configuration file: {config_path}");

    if !Path::new(config_path).exists() {
        return Err(eyre!("Configuration file '{config_path}' not found"));
    }

    let config = load_or_default(Some(config_path))?;
    println!("Configuration parsing: OK");

    SettingsValidator::validate(&config).wrap_err("Configuration validation failed")?;
    println!("Configuration validation: OK");
    println!();
    println!("Listen address:        {}", config.listen_addr);
    println!("HTTP version:          {}", config.settings.http_version);
    println!("Output buffering:      {}", config.settings.output_buffering);
    println!(
        "Route cache file:      {}",
        config
            .settings
            .router_cache_file
            .as_ref()
            .map_or_else(|| "disabled".to_string(), |p| p.display().to_string())
    );
    Ok(())
}

fn routes_command(config_path: Option<&str>) -> Result<()> {
    let config = load_or_default(config_path)?;
    let app = demo_app(config.settings).wrap_err("Failed to build application")?;

    println!("{:<10} {:<28} {:<8} {}", "ID", "PATTERN", "NAME", "METHODS");
    for route in app.router().routes() {
        println!(
            "{:<10} {:<28} {:<8} {}",
            route.identifier(),
            route.pattern(),
            route.name().unwrap_or_else(|| "-".to_string()),
            route.methods().join("|")
        );
    }
    Ok(())
}

async fn init_command(config_path: &str) -> Result<()> {
    let path = Path::new(config_path);
    if path.exists() {
        return Err(eyre!("Configuration file '{config_path}' already exists"));
    }

    let default_config = r#"# Switchyard configuration

listen_addr = "127.0.0.1:8080"

[settings]
http_version = "1.1"
response_chunk_size = 4096
# none | prepend | append
output_buffering = "append"
determine_route_before_app_middleware = false
display_error_details = false
add_content_length_header = true
# router_cache_file = "/tmp/switchyard-routes.json"

[logging]
level = "info"
json = false
include_spans = true
"#;

    tokio::fs::write(path, default_config)
        .await
        .context("Failed to write config file")?;
    println!("Created default configuration at: {config_path}");
    println!("Run 'switchyard serve --config {config_path}' to start the server");
    Ok(())
}

/// The application served by the binary.
fn demo_app(settings: Settings) -> switchyard::Result<App> {
    let app = App::new(settings)?;

    app.add(from_fn(|request, response, next| {
        let response = next.run(request, response)?;
        Ok(response.with_header(
            header::HeaderName::from_static("x-powered-by"),
            HeaderValue::from_static("switchyard"),
        ))
    }))?;

    app.get(
        "/",
        handler_fn(|_req: &Request, _res: &mut Response, _args: &HandlerArgs| {
            Ok("Switchyard is running")
        }),
    )
    .set_name("home");

    app.get(
        "/hello/{name}",
        handler_fn(|_req: &Request, _res: &mut Response, args: &HandlerArgs| {
            Ok(format!("Hello, {}", args.get("name").unwrap_or("stranger")))
        }),
    )
    .set_name("hello");

    app.group("/api", |app: &App| {
        app.get(
            "/route[/{extra:.+}]",
            handler_fn(|req: &Request, res: &mut Response, _args: &HandlerArgs| {
                let body = match req.route() {
                    Some(route) => serde_json::json!({
                        "identifier": route.identifier(),
                        "pattern": route.pattern(),
                        "arguments": route.arguments(),
                    }),
                    None => serde_json::Value::Null,
                };
                res.headers_mut().insert(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("application/json"),
                );
                Ok(body.to_string())
            }),
        );
        Ok(())
    })?
    .add(from_fn(|request, response, next| {
        let response = next.run(request, response)?;
        Ok(response.with_header(
            header::HeaderName::from_static("x-api-version"),
            HeaderValue::from_static("1"),
        ))
    }));

    Ok(app)
}
