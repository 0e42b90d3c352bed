//! Error types for the wallet lifecycle tooling

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for wallet lifecycle operations
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Wallet document errors
    #[error("wallet.json not found in {0}")]
    MissingWalletFile(PathBuf),

    #[error("Invalid wallet document {path}: {message}")]
    InvalidWalletSchema { path: PathBuf, message: String },

    #[error("Unable to determine mnemonic words for wallet")]
    InvalidMnemonicFormat,

    #[error("Wallet chainId missing")]
    MissingChainId,

    #[error("Wallet does not contain an external payment address")]
    MissingAddress,

    // Signing errors
    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("Signature key is shorter than 64 hex characters; cannot derive nonce")]
    NonceDerivation,

    // Remote API errors
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Remote call failed ({status}): {body}")]
    RemoteRequest { status: u16, body: String },

    // Filesystem errors
    #[error("Filesystem error at {path}: {source}")]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Attach the offending path to an I/O error
    pub fn fs(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Error::Filesystem {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}
