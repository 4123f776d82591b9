// web-server/src/main.rs
use actix_web::{App, HttpServer};
use common::{setup_tracing, ClearnodeMode, Config, SystemClock};
use std::sync::Arc;

use revatix_server::audit::TracingAuditSink;
use revatix_server::middleware::rate_limiter::RateLimiter;
use revatix_server::network::build_client;
use revatix_server::{static_files, AppState};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let (config, source) = Config::from_env();
    setup_tracing(&config.log_level);
    source.log();

    let server_addr = config.web_server_addr.clone();
    let static_config = config.static_files.clone();
    let rate_limit = RateLimiter::from_config(&config.rate_limit);

    if config.clearnode.mode == ClearnodeMode::Demo {
        tracing::warn!("Clearnode is in demo mode, channels are not backed by a network");
    }

    let network = build_client(&config.clearnode)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;

    let state = AppState::build(config, network, Arc::new(SystemClock), Arc::new(TracingAuditSink))
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;

    let serve_static = static_files::is_available(&static_config);
    if !serve_static {
        tracing::warn!("Static bundle not found at {}, serving the API only", static_config.path);
    }

    tracing::info!("Starting Revatix server on {}", server_addr);

    HttpServer::new(move || {
        let state = state.clone();
        let static_config = static_config.clone();

        App::new()
            .wrap(rate_limit.clone())
            .configure(|cfg| state.configure(cfg))
            .configure(|cfg| {
                if serve_static {
                    static_files::configure(cfg, &static_config);
                }
            })
    })
    .bind(&server_addr)?
    .run()
    .await
}
