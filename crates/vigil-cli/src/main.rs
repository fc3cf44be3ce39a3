//! vigil — command-line client for the watch daemon.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use vigil_hw::Camera;

#[zbus::proxy(
    interface = "org.vigil.Watch1",
    default_service = "org.vigil.Watch1",
    default_path = "/org/vigil/Watch1"
)]
trait Watch {
    async fn start_session(&self) -> zbus::Result<()>;
    async fn stop_session(&self) -> zbus::Result<bool>;
    async fn status(&self) -> zbus::Result<String>;
    async fn reload_gallery(&self) -> zbus::Result<u32>;
    async fn enroll(&self, name: &str) -> zbus::Result<String>;
}

#[derive(Parser)]
#[command(name = "vigil", version, about = "Control the vigild watch daemon")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the motion detection session
    Start,
    /// Stop the running detection session
    Stop,
    /// Show daemon status
    Status,
    /// Reload the known-face gallery from disk
    Reload,
    /// Capture a face from the camera and enroll it
    Enroll {
        /// Name for the enrolled identity
        name: String,
    },
    /// List V4L2 capture devices (does not need the daemon)
    Devices,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Devices = cli.command {
        let devices = Camera::list_devices();
        if devices.is_empty() {
            println!("No capture devices found.");
        }
        for device in devices {
            println!("{}\t{}\t{}", device.path, device.name, device.driver);
        }
        return Ok(());
    }

    let connection = zbus::Connection::session()
        .await
        .context("failed to connect to the session bus")?;
    let proxy = WatchProxy::new(&connection)
        .await
        .context("failed to reach vigild — is the daemon running?")?;

    match cli.command {
        Commands::Start => {
            proxy.start_session().await?;
            println!("Detection started.");
        }
        Commands::Stop => {
            if proxy.stop_session().await? {
                println!("Detection stopped.");
            } else {
                println!("No session was running.");
            }
        }
        Commands::Status => {
            println!("{}", proxy.status().await?);
        }
        Commands::Reload => {
            let count = proxy.reload_gallery().await?;
            println!("Gallery reloaded: {count} identities.");
        }
        Commands::Enroll { name } => {
            let path = proxy.enroll(&name).await?;
            println!("Enrolled {name}: {path}");
        }
        Commands::Devices => unreachable!("handled before connecting"),
    }

    Ok(())
}
