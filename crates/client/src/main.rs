//! socialsync terminal client.

mod command;
mod shell;

use socialsync_common::Config;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::command::Command;
use crate::shell::{Flow, Shell};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received SIGINT, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
    }
}

async fn print(lines: &[String]) -> std::io::Result<()> {
    let mut stdout = tokio::io::stdout();
    for line in lines {
        stdout.write_all(line.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
    }
    stdout.flush().await
}

async fn prompt(text: &str) -> std::io::Result<()> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(text.as_bytes()).await?;
    stdout.flush().await
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "socialsync_client=info,socialsync_core=info,socialsync_db=warn".into()),
        )
        .init();

    let config = Config::load()?;
    info!(backend = ?config.storage.backend, "Starting socialsync client");

    let mut shell = Shell::start(config)?;
    shell.settle().await;
    print(&[shell.banner()]).await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        prompt(&shell.prompt()).await?;
        let line = tokio::select! {
            line = lines.next_line() => line?,
            () = &mut shutdown => None,
        };
        let Some(line) = line else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        let flow = match line.parse::<Command>() {
            Ok(command) => {
                let (flow, out) = shell.execute(command).await;
                print(&out).await?;
                flow
            }
            Err(e) => {
                print(&[e.to_string()]).await?;
                Flow::Continue
            }
        };
        print(&shell.drain_toasts()).await?;

        if flow == Flow::Quit {
            break;
        }
    }

    shell.shutdown().await;
    info!("Client shutdown complete");
    Ok(())
}
