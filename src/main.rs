use kube::Client;
use tokio::signal;
use tracing::{error, info};

use stormdb_operator::{run_database_controller, run_storage_controller};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("stormdb_operator=info".parse()?)
                .add_directive("kube=info".parse()?),
        )
        .init();

    info!("Starting stormdb-operator");

    let client = Client::try_default().await?;
    info!("Connected to Kubernetes cluster");

    let storage_handle = {
        let client = client.clone();
        tokio::spawn(async move {
            run_storage_controller(client).await;
        })
    };

    let database_handle = {
        let client = client.clone();
        tokio::spawn(async move {
            run_database_controller(client).await;
        })
    };

    tokio::select! {
        result = storage_handle => {
            if let Err(e) = result {
                error!("Storage controller task panicked: {}", e);
            }
        }
        result = database_handle => {
            if let Err(e) = result {
                error!("Database controller task panicked: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Received shutdown signal, shutting down");
        }
    }

    info!("Operator stopped");
    Ok(())
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
