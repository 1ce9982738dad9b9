use std::time::Duration;

use clap::Parser;
use inkroom::DEFAULT_IDLE_TIMEOUT;
use inkroom::prelude::*;
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

const DEFAULT_PORT: u16 = 3001;

/// Server settings, from flags or the environment.
#[derive(Debug, Parser)]
#[command(
    name = "draw-server",
    version,
    about = "Room broker for shared drawing canvases."
)]
struct Settings {
    /// Full bind address; takes precedence over --port
    #[arg(long, env = "INKROOM_ADDR")]
    addr: Option<String>,

    /// Port to listen on (all interfaces)
    #[arg(
        long,
        env = "PORT",
        default_value_t = DEFAULT_PORT,
        value_parser = clap::value_parser!(u16).range(1..),
    )]
    port: u16,

    /// Members per room
    #[arg(
        long,
        env = "INKROOM_ROOM_CAPACITY",
        value_parser = clap::value_parser!(u64).range(1..),
    )]
    capacity: Option<u64>,

    /// Seconds an empty room survives before it is deleted
    #[arg(
        long,
        env = "INKROOM_EMPTY_GRACE_SECS",
        value_parser = clap::value_parser!(u64).range(1..),
    )]
    empty_grace_secs: Option<u64>,

    /// Seconds a silent connection survives
    #[arg(
        long,
        env = "INKROOM_IDLE_TIMEOUT_SECS",
        value_parser = clap::value_parser!(u64).range(1..),
    )]
    idle_timeout_secs: Option<u64>,
}

impl Settings {
    fn bind_addr(&self) -> String {
        match &self.addr {
            Some(addr) => addr.clone(),
            None => format!("0.0.0.0:{}", self.port),
        }
    }

    fn room_config(&self) -> RoomConfig {
        let mut rooms = RoomConfig::default();
        if let Some(capacity) = self.capacity {
            rooms.capacity = usize::try_from(capacity).unwrap_or(usize::MAX);
        }
        if let Some(secs) = self.empty_grace_secs {
            rooms.empty_grace = Duration::from_secs(secs);
        }
        rooms
    }

    fn idle_timeout(&self) -> Duration {
        self.idle_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_IDLE_TIMEOUT)
    }
}

// ---------------------------------------------------------------------------
// Server bootstrap
// ---------------------------------------------------------------------------

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let addr = settings.bind_addr();
    let rooms = settings.room_config();
    let idle_timeout = settings.idle_timeout();
    tracing::info!(
        %addr,
        capacity = rooms.capacity,
        empty_grace_secs = rooms.empty_grace.as_secs(),
        idle_timeout_secs = idle_timeout.as_secs(),
        "starting draw server"
    );

    let server = InkroomServerBuilder::new()
        .bind(&addr)
        .room_config(rooms)
        .idle_timeout(idle_timeout)
        .build()
        .await?;

    server.run_until(shutdown_signal()).await?;
    Ok(())
}
