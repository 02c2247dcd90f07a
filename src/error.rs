//! Crate-wide error type.
//!
//! Every fallible boundary in the router core (parsing, signature
//! verification, crypto, timeouts, resource limits, disk IO) converts into
//! one of these variants. No variant unwinds across a task boundary: tasks
//! catch their own errors, log them, and drop the offending message. Only
//! [`Error::Fatal`] is allowed to propagate out of router startup.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A buffer was truncated, had an out-of-range length prefix, or named an
    /// unsupported algorithm/type code.
    #[error("parse error in {context}: {reason}")]
    Parse {
        context: &'static str,
        reason: String,
    },

    /// A signature, payload hash, or MAC did not match.
    #[error("verification failed in {context}: {reason}")]
    Verify {
        context: &'static str,
        reason: String,
    },

    /// A cryptographic operation (ElGamal decrypt, AES, key derivation)
    /// produced non-conforming output.
    #[error("crypto error in {context}: {reason}")]
    Crypto {
        context: &'static str,
        reason: String,
    },

    /// A build, lookup, or garlic acknowledgement deadline elapsed.
    #[error("{context} timed out after {elapsed_ms}ms")]
    Timeout {
        context: &'static str,
        elapsed_ms: u64,
    },

    /// A local resource limit (transit tunnel cap, bandwidth cap) was hit.
    #[error("resource exhausted: {0}")]
    Resource(&'static str),

    /// Filesystem IO on a descriptor file failed.
    #[error("io error in {context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// Unrecoverable startup condition: abort initialization.
    #[error("fatal: {0}")]
    Fatal(String),
}

impl Error {
    pub fn parse(context: &'static str, reason: impl Into<String>) -> Self {
        Error::Parse {
            context,
            reason: reason.into(),
        }
    }

    pub fn verify(context: &'static str, reason: impl Into<String>) -> Self {
        Error::Verify {
            context,
            reason: reason.into(),
        }
    }

    pub fn crypto(context: &'static str, reason: impl Into<String>) -> Self {
        Error::Crypto {
            context,
            reason: reason.into(),
        }
    }

    pub fn io(context: &'static str, source: std::io::Error) -> Self {
        Error::Io { context, source }
    }

    /// True for the class of errors that simply mean "drop this message and
    /// move on" rather than anything the caller needs to surface.
    pub fn is_droppable(&self) -> bool {
        matches!(
            self,
            Error::Parse { .. } | Error::Verify { .. } | Error::Crypto { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
