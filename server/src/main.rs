use clap::Parser;
use log::{error, info};
use server::config::ServerConfig;
use server::network::Server;

/// Parses command-line arguments, binds the listener and runs the
/// coordinator until Ctrl+C.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = ServerConfig::parse();
    let server = Server::bind(config).await?;
    let shutdown = server.shutdown_handle();

    let mut server_handle = tokio::spawn(server.run());

    tokio::select! {
        result = &mut server_handle => {
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Server stopped with error: {}", e),
                Err(e) => error!("Server task panicked: {}", e),
            }
            return Ok(());
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
            shutdown.shutdown();
        }
    }

    server_handle.await??;
    Ok(())
}
