use service_registry::config::Config;
use service_registry::server;
use tokio_util::sync::CancellationToken;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: jemallocator::Jemalloc = jemallocator::Jemalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    server::init_tracing();
    let config = Config::load()?;

    let cancel = CancellationToken::new();
    tokio::spawn(server::cancel_on_ctrl_c(cancel.clone()));

    tracing::info!("Starting registry server...");
    server::start(&config, cancel).await?;
    Ok(())
}
