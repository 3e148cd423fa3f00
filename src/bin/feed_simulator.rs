//! Synthetic Biosignal Feed
//!
//! A stand-in for the headset telemetry server, for testing FocusGuard
//! without hardware. Serves the same line-JSON protocol over TCP and
//! generates a slowly drifting concentration signal with occasional dips
//! below the intervention threshold.
//!
//! # Usage
//! ```bash
//! ./feed_simulator --port 8765 --dip-every 40
//! ```

use clap::Parser;
use rand::prelude::*;
use serde_json::json;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{info, warn};

// ============================================================================
// Signal Constants
// ============================================================================

/// Baseline concentration level
const BASE_CONCENTRATION: f64 = 65.0;
/// Random walk step size per sample
const DRIFT_STEP: f64 = 3.0;
/// Concentration floor during an induced dip
const DIP_LEVEL: f64 = 18.0;
/// Samples a dip lasts
const DIP_LENGTH: u64 = 6;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug, Clone)]
#[command(name = "feed-simulator")]
#[command(about = "Synthetic biosignal feed for FocusGuard testing")]
#[command(version)]
struct Args {
    /// Listen address
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Listen port
    #[arg(long, default_value = "8765")]
    port: u16,

    /// Induce a concentration dip every N samples (0 disables dips)
    #[arg(long, default_value = "40")]
    dip_every: u64,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,
}

// ============================================================================
// Per-connection session
// ============================================================================

struct FeedSession {
    rng: StdRng,
    concentration: f64,
    speed: f64,
    streaming: bool,
    sample_index: u64,
    dip_every: u64,
}

impl FeedSession {
    fn new(seed: Option<u64>, dip_every: u64) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng,
            concentration: BASE_CONCENTRATION,
            speed: 1.0,
            streaming: false,
            sample_index: 0,
            dip_every,
        }
    }

    /// Advance the random walk and emit one sample message.
    fn next_sample(&mut self) -> String {
        self.sample_index += 1;

        let in_dip = self.dip_every > 0
            && self.sample_index % self.dip_every < DIP_LENGTH
            && self.sample_index >= self.dip_every;
        let target = if in_dip { DIP_LEVEL } else { BASE_CONCENTRATION };

        // Drift toward the target with some noise
        let noise = self.rng.gen_range(-DRIFT_STEP..=DRIFT_STEP);
        self.concentration += (target - self.concentration) * 0.3 + noise;
        self.concentration = self.concentration.clamp(0.0, 100.0);

        json!({
            "type": "concentration_data",
            "data": {
                "concentration": self.concentration,
                "stress": self.rng.gen_range(20.0..60.0),
                "heart_rate": self.rng.gen_range(60.0..90.0),
                "focus": (self.concentration + self.rng.gen_range(-5.0..5.0)).clamp(0.0, 100.0),
                "timestamp": chrono::Utc::now().to_rfc3339(),
                "data_index": self.sample_index,
                "total_points": serde_json::Value::Null,
            }
        })
        .to_string()
    }

    fn sample_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.speed)
    }
}

async fn send_line(stream: &mut TcpStream, line: &str) -> std::io::Result<()> {
    stream.write_all(line.as_bytes()).await?;
    stream.write_all(b"\n").await?;
    stream.flush().await
}

async fn handle_client(stream: TcpStream, args: &Args) -> std::io::Result<()> {
    let peer = stream.peer_addr()?;
    info!(peer = %peer, "Client connected");

    let mut session = FeedSession::new(args.seed, args.dip_every);
    let mut reader = BufReader::new(stream);
    let mut line = String::new();

    {
        let greeting = json!({
            "type": "connection_established",
            "message": "feed-simulator ready"
        })
        .to_string();
        send_line(reader.get_mut(), &greeting).await?;
    }

    let mut ticker = tokio::time::interval(session.sample_interval());
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            result = reader.read_line(&mut line) => {
                if result? == 0 {
                    info!(peer = %peer, "Client disconnected");
                    return Ok(());
                }
                let reply = handle_command(line.trim(), &mut session);
                line.clear();
                if let Some(reply) = reply {
                    send_line(reader.get_mut(), &reply).await?;
                }
                // Speed changes take effect on the next tick
                ticker = tokio::time::interval(session.sample_interval());
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            }
            _ = ticker.tick(), if session.streaming => {
                let sample = session.next_sample();
                send_line(reader.get_mut(), &sample).await?;
            }
        }
    }
}

/// Process one inbound command, returning the reply line (if any).
fn handle_command(line: &str, session: &mut FeedSession) -> Option<String> {
    let parsed: serde_json::Value = match serde_json::from_str(line) {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, "Ignoring malformed command");
            return None;
        }
    };

    match parsed.get("type").and_then(|t| t.as_str()) {
        Some("start_stream") => {
            session.streaming = true;
            if let Some(speed) = parsed.get("speed").and_then(|s| s.as_f64()) {
                if speed > 0.0 {
                    session.speed = speed;
                }
            }
            info!(speed = session.speed, "Stream started");
            Some(json!({"type": "stream_started", "speed": session.speed}).to_string())
        }
        Some("stop_stream") => {
            session.streaming = false;
            info!("Stream stopped");
            Some(json!({"type": "stream_stopped"}).to_string())
        }
        Some("set_speed") => {
            if let Some(speed) = parsed.get("speed").and_then(|s| s.as_f64()) {
                if speed > 0.0 {
                    session.speed = speed;
                    info!(speed, "Speed changed");
                }
            }
            None
        }
        Some("exercise_selected") => {
            let kind = parsed
                .get("exercise_type")
                .and_then(|t| t.as_str())
                .unwrap_or("unknown");
            info!(exercise = kind, "Exercise announced");
            None
        }
        Some("ping") => Some(json!({"type": "pong"}).to_string()),
        other => {
            warn!(command = ?other, "Unknown command");
            Some(
                json!({"type": "error", "message": format!("unknown command: {other:?}")})
                    .to_string(),
            )
        }
    }
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();
    let addr = format!("{}:{}", args.host, args.port);
    let listener = TcpListener::bind(&addr).await?;
    info!(address = %addr, "Feed simulator listening");

    loop {
        let (stream, _) = listener.accept().await?;
        let args = args.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_client(stream, &args).await {
                warn!(error = %e, "Client session ended with error");
            }
        });
    }
}
