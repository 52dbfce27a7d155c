use reelvote::{config::Config, server::start_server};
use tracing::error;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let config = match Config::load() {
        Ok(config) => config,
        Err(err) => {
            error!("{err}");
            std::process::exit(2);
        }
    };

    if let Err(err) = start_server(config).await {
        error!("{err}");
        std::process::exit(1);
    }
}
