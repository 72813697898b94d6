//! Tap Party bot entry point.

use std::time::Duration;

use clap::Parser;
use tapparty_bot::{Plan, Seat};
use tapparty_client::ClientConfig;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Scripted Tap Party player
#[derive(Parser, Debug)]
#[command(name = "tapparty-bot")]
#[command(about = "Headless Tap Party player for exercising a relay")]
#[command(version)]
struct Args {
    /// Relay WebSocket URL
    #[arg(short, long, default_value = "ws://127.0.0.1:8080")]
    relay: String,

    /// Display name
    #[arg(short, long, default_value = "bot")]
    name: String,

    /// Skin ID
    #[arg(long, default_value_t = 0)]
    skin: u32,

    /// Host a room, optionally with a fixed code
    #[arg(long, conflicts_with = "join", num_args = 0..=1, default_missing_value = "")]
    create: Option<String>,

    /// Join the room with this code
    #[arg(long)]
    join: Option<String>,

    /// Players (host included) needed before the host starts the round
    #[arg(long, default_value_t = 2)]
    players: usize,

    /// Milliseconds between taps
    #[arg(long, default_value_t = 250)]
    tap_interval_ms: u64,

    /// Connect attempts before giving up
    #[arg(long, default_value_t = 5)]
    connect_attempts: u32,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn plan(&self) -> Result<Plan, String> {
        let seat = match (&self.create, &self.join) {
            (_, Some(code)) => Seat::Guest { room_code: code.clone() },
            (Some(code), None) => Seat::Host {
                room_code: (!code.is_empty()).then(|| code.clone()),
                players: self.players.max(1),
            },
            (None, None) => return Err("pass --create or --join <CODE>".to_string()),
        };

        Ok(Plan {
            seat,
            name: self.name.clone(),
            skin_id: self.skin,
            tap_interval: Duration::from_millis(self.tap_interval_ms.max(1)),
        })
    }

    fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::default();
        config.session.connect_attempts = self.connect_attempts.max(1);
        config
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let plan = args.plan()?;
    let taps = tapparty_bot::play(&args.relay, plan, args.client_config()).await?;

    tracing::info!(taps, "bot finished");
    Ok(())
}
