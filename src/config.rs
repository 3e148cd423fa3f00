//! Monitor configuration
//!
//! Runtime tunables loaded from a TOML file, replacing hardcoded thresholds
//! with operator-tunable values.
//!
//! ## Loading Order
//!
//! 1. `FOCUSGUARD_CONFIG` environment variable (path to TOML file)
//! 2. `focusguard.toml` in the current working directory
//! 3. Built-in defaults
//!
//! The config is constructor-injected into the components that need it;
//! there is no process-global instance.

use serde::Deserialize;
use std::path::Path;

/// Runtime configuration for the monitoring loop.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Telemetry feed host
    pub feed_host: String,
    /// Telemetry feed port
    pub feed_port: u16,
    /// Session identifier sent with the start command
    pub session_id: u64,
    /// Initial playback speed multiplier
    pub stream_speed: f64,
    /// Concentration level below which an intervention fires (strict `<`)
    pub concentration_threshold: f64,
    /// Calibrated baseline concentration. When set, a sample below 70% of
    /// this value also fires an intervention.
    pub baseline_concentration: Option<f64>,
    /// Sliding-window capacity of the sample buffer
    pub buffer_capacity: usize,
    /// Whether streaming pauses while a guided session is active,
    /// or continues in the background
    pub pause_streaming_during_session: bool,
    /// Seconds to wait for a start-command acknowledgment
    pub ack_timeout_secs: u64,
    /// Seconds to wait before the single reconnection attempt
    pub reconnect_delay_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            feed_host: "127.0.0.1".to_string(),
            feed_port: 8765,
            session_id: 1,
            stream_speed: 1.0,
            concentration_threshold: 30.0,
            baseline_concentration: None,
            buffer_capacity: 50,
            pause_streaming_during_session: true,
            ack_timeout_secs: 5,
            reconnect_delay_secs: 3,
        }
    }
}

impl MonitorConfig {
    /// Load configuration using the documented loading order.
    ///
    /// Missing files fall back to defaults; a present-but-invalid file is a
    /// startup error.
    pub fn load() -> anyhow::Result<Self> {
        if let Ok(path) = std::env::var("FOCUSGUARD_CONFIG") {
            tracing::info!(path = %path, "Loading config from FOCUSGUARD_CONFIG");
            return Self::from_path(Path::new(&path));
        }

        let local = Path::new("focusguard.toml");
        if local.exists() {
            tracing::info!("Loading config from ./focusguard.toml");
            return Self::from_path(local);
        }

        tracing::info!("No config file found, using built-in defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific TOML file.
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config {}: {}", path.display(), e))?;
        let config: Self = toml::from_str(&text)
            .map_err(|e| anyhow::anyhow!("Failed to parse config {}: {}", path.display(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Sanity-check the loaded values.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.buffer_capacity == 0 {
            anyhow::bail!("buffer_capacity must be at least 1");
        }
        if !(0.0..=100.0).contains(&self.concentration_threshold) {
            anyhow::bail!(
                "concentration_threshold must be within 0-100, got {}",
                self.concentration_threshold
            );
        }
        if let Some(baseline) = self.baseline_concentration {
            if !(0.0..=100.0).contains(&baseline) {
                anyhow::bail!(
                    "baseline_concentration must be within 0-100, got {}",
                    baseline
                );
            }
        }
        Ok(())
    }

    /// Feed address in `host:port` form.
    pub fn feed_addr(&self) -> String {
        format!("{}:{}", self.feed_host, self.feed_port)
    }
}
