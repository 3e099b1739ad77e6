use std::env;

use backplane_server::BackplaneServer;
use backplane_server::config::loader::load_config;

#[tokio::main]
async fn main() {
    // A missing .env is fine; anything else is worth a warning.
    match dotenvy::dotenv() {
        Ok(_) => {}
        Err(dotenvy::Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => eprintln!("Warning: could not load .env: {e}"),
    }

    let (config_path, source) = resolve_config_path();

    let cfg = match load_config(Some(&config_path)) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(2);
        }
    };

    backplane_server::init_tracing(&cfg.logging.level);

    tracing::info!(path = %config_path, source, "Configuration loaded");

    let server = match BackplaneServer::from_config(cfg).await {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Server initialization failed: {e}");
            std::process::exit(2);
        }
    };

    if let Err(err) = server.run().await {
        eprintln!("Server error: {err}");
    }
}

/// Picks the config file path: `--config <path>` beats `BACKPLANE_CONFIG`,
/// which beats the default `backplane.toml`. Also reports where the path
/// came from for the startup log line.
fn resolve_config_path() -> (String, &'static str) {
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config"
            && let Some(path) = args.next()
        {
            return (path, "cli");
        }
    }

    if let Ok(path) = env::var("BACKPLANE_CONFIG")
        && !path.is_empty()
    {
        return (path, "env");
    }

    ("backplane.toml".to_string(), "default")
}
