use std::process::ExitCode;

mod config;
mod error;
mod logger;
mod server;

use error::StartupError;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            logger::log_error(&format!("{e}"));
            if let Some(source) = std::error::Error::source(&e) {
                logger::log_error(&format!("  caused by: {source}"));
            }
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), StartupError> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| config::DEFAULT_CONFIG_PATH.to_string());
    let cfg = config::Config::load_validated(&config_path)?;
    logger::init(&cfg).map_err(StartupError::Logger)?;

    // One thread drives the whole relay; the client table is never shared
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(StartupError::Runtime)?;

    runtime.block_on(async_main(cfg))
}

async fn async_main(cfg: config::Config) -> Result<(), StartupError> {
    let addr = cfg.get_socket_addr()?;
    let listener = server::create_listener(addr, cfg.server.backlog)
        .map_err(|source| StartupError::Bind { addr, source })?;

    let relay = server::ServerLoop::new(listener, &cfg.relay);
    let bound = relay
        .local_addr()
        .map_err(|source| StartupError::Bind { addr, source })?;
    logger::log_server_start(&bound, &cfg);

    relay.run_until(server::shutdown_signal()).await;
    Ok(())
}
