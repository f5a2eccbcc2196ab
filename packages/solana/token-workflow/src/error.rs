use solana_sdk::pubkey::Pubkey;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Workflow errors
#[derive(Error, Debug)]
pub enum Error {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request rejected: {message}")]
    Rejected { message: String, logs: Vec<String> },

    #[error(
        "Insufficient funds in {address}: expected at least {expected} lamports, found {actual}"
    )]
    InsufficientFunds {
        address: Pubkey,
        expected: u64,
        actual: u64,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl Error {
    pub fn rejected(message: impl Into<String>) -> Self {
        Error::Rejected {
            message: message.into(),
            logs: Vec::new(),
        }
    }

    pub fn rejected_with_logs(message: impl Into<String>, logs: Vec<String>) -> Self {
        Error::Rejected {
            message: message.into(),
            logs,
        }
    }

    /// Diagnostic log lines reported by the remote service, if any.
    pub fn logs(&self) -> &[String] {
        match self {
            Error::Rejected { logs, .. } => logs,
            _ => &[],
        }
    }
}
