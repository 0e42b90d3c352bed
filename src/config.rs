//! Configuration loading and wallet directory layout

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Main configuration structure
///
/// Loaded once at startup and handed to each orchestrator; nothing reads
/// the process environment after this point.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Mining API root; `DEFENSIO_API_BASE` overrides
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Wallet storage root; `DEFENSIO_WALLET_ROOT` overrides.
    /// Defaults to `./wallets` when unset.
    #[serde(default)]
    pub wallet_root: Option<PathBuf>,

    /// Fixed pause between remote calls within a batch, in milliseconds
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
}

fn default_api_base() -> String {
    "https://mine.defensio.io/api".to_string()
}

fn default_delay_ms() -> u64 {
    1000
}

impl Config {
    /// Load configuration from an optional file and `DEFENSIO_*` environment variables
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let settings = config::Config::builder()
            // Load from file if exists
            .add_source(config::File::from(path).required(false))
            // Override with environment variables (prefix DEFENSIO_)
            .add_source(config::Environment::with_prefix("DEFENSIO").try_parsing(true))
            .build()
            .context("Failed to build configuration")?;

        let config: Config = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        url::Url::parse(self.api_base())
            .with_context(|| format!("Invalid api_base URL: {}", self.api_base))?;
        Ok(())
    }

    /// API root with any trailing slash stripped
    pub fn api_base(&self) -> &str {
        self.api_base.trim_end_matches('/')
    }

    /// Resolve the wallet directory layout under the configured root
    pub fn paths(&self) -> WalletPaths {
        let root = self
            .wallet_root
            .clone()
            .unwrap_or_else(|| PathBuf::from("wallets"));
        WalletPaths::resolve(root)
    }

    /// Scheduling policy for remote calls within a batch
    pub fn pacing(&self) -> Pacing {
        Pacing::new(self.delay_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            wallet_root: None,
            delay_ms: default_delay_ms(),
        }
    }
}

/// Resolved directory layout under the wallet storage root
///
/// Each lifecycle root holds wallet folders named by 6-digit zero-padded
/// id; `wall_file` is the single ledger aggregating registered wallets.
#[derive(Debug, Clone)]
pub struct WalletPaths {
    pub root: PathBuf,
    pub generated: PathBuf,
    pub registered: PathBuf,
    pub donors: PathBuf,
    pub mining: PathBuf,
    pub solutions: PathBuf,
    pub challenges: PathBuf,
    pub receipts: PathBuf,
    pub wall_file: PathBuf,
}

impl WalletPaths {
    /// Build the layout for a wallet root
    pub fn resolve(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            generated: root.join("generated"),
            registered: root.join("registered"),
            donors: root.join("donors"),
            mining: root.join("mining"),
            solutions: root.join("solutions"),
            challenges: root.join("challenges"),
            receipts: root.join("receipts"),
            wall_file: root.join("wall.json"),
            root,
        }
    }

    /// Create every lifecycle root (owner-only on Unix)
    pub fn ensure_layout(&self) -> crate::error::Result<()> {
        for dir in [
            &self.root,
            &self.generated,
            &self.registered,
            &self.donors,
            &self.mining,
            &self.solutions,
            &self.challenges,
            &self.receipts,
        ] {
            crate::wallets::store::create_dir_private(dir)?;
        }
        Ok(())
    }

    /// Path relative to the wallet root, for ledger `directory` fields
    pub fn relative_to_root<'a>(&self, path: &'a Path) -> &'a Path {
        path.strip_prefix(&self.root).unwrap_or(path)
    }
}

/// Fixed inter-call interval used to respect the remote rate limit
///
/// The pause is applied between attempts, never before the first one.
#[derive(Debug, Clone, Copy)]
pub struct Pacing {
    interval: Duration,
}

impl Pacing {
    pub fn new(delay_ms: u64) -> Self {
        Self {
            interval: Duration::from_millis(delay_ms),
        }
    }

    /// No pause at all; used by tests
    pub fn none() -> Self {
        Self::new(0)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Suspend for one interval
    pub async fn pause(&self) {
        if !self.interval.is_zero() {
            tokio::time::sleep(self.interval).await;
        }
    }
}
