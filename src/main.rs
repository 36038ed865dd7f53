use std::env;
use tracing_subscriber::EnvFilter;

fn init_logging() {
    let debug_enabled = env::var("FOCUS_STATION_DEBUG_LOG")
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false);
    let filter = if debug_enabled {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() {
    init_logging();

    let workspace_root = match env::current_dir() {
        Ok(path) => path,
        Err(error) => {
            tracing::error!(%error, "failed to resolve current directory");
            std::process::exit(1);
        }
    };

    if let Err(error) = focus_station::run(workspace_root).await {
        tracing::error!(%error, "focus station stopped");
        std::process::exit(1);
    }
}
