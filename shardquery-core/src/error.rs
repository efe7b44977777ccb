//! Error types for ShardQuery
//!
//! Mirrors the taxonomy a query analysis/dispatch core needs: failures that
//! should be surfaced immediately (bad input), failures that are local to one
//! shard and must never take down the job, and failures that are non-fatal
//! and self-correcting (estimation drift).

use thiserror::Error;

/// Result type alias for ShardQuery operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the adaptive execution core
#[derive(Error, Debug)]
pub enum Error {
    /// SQL was empty, oversize, missing `SELECT ... FROM`, or otherwise
    /// unanalysable. Surfaced immediately, never retried.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Unbalanced parentheses or an unmatched `CASE...END` during protection.
    #[error("protection imbalance: {0}")]
    ProtectionImbalance(String),

    /// A failure reported by a `ShardStore` during execution. Logged with
    /// shard name and query code by the caller; the shard's task ends but
    /// siblings continue.
    #[error("shard '{shard}' failed for query '{query_code}': {source}")]
    ShardError {
        shard: String,
        query_code: String,
        #[source]
        source: anyhow::Error,
    },

    /// A platform-level out-of-memory condition intercepted inside a shard
    /// task. Always rewrapped with the province name before propagating.
    #[error("out of memory while processing shard '{shard}'")]
    MemoryExhaustion { shard: String },

    /// Observed row count exceeded the registered estimate beyond the
    /// configured error factor. Non-fatal: callers persist a new estimate
    /// and reroute to streaming.
    #[error("estimation drift for query '{query_code}': observed {observed}, estimated {estimated}")]
    EstimationDrift {
        query_code: String,
        observed: u64,
        estimated: u64,
    },

    /// The query registry could not load or persist metadata.
    #[error("registry error: {0}")]
    Registry(String),

    /// Configuration failed validation (e.g. threshold ordering).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Anything else; preserves the source error for diagnostics.
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl Error {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn protection_imbalance(msg: impl Into<String>) -> Self {
        Self::ProtectionImbalance(msg.into())
    }

    pub fn shard(
        shard: impl Into<String>,
        query_code: impl Into<String>,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        Self::ShardError {
            shard: shard.into(),
            query_code: query_code.into(),
            source: source.into(),
        }
    }

    pub fn memory_exhaustion(shard: impl Into<String>) -> Self {
        Self::MemoryExhaustion { shard: shard.into() }
    }

    pub fn estimation_drift(query_code: impl Into<String>, observed: u64, estimated: u64) -> Self {
        Self::EstimationDrift {
            query_code: query_code.into(),
            observed,
            estimated,
        }
    }

    pub fn registry(msg: impl Into<String>) -> Self {
        Self::Registry(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Errors that must abort the whole job rather than just the shard that
    /// raised them (spec §7: invalid input and protection imbalance are
    /// rejected up front, before any shard work starts).
    pub fn is_job_fatal(&self) -> bool {
        matches!(
            self,
            Error::InvalidInput(_) | Error::ProtectionImbalance(_) | Error::Configuration(_)
        )
    }

    /// Classify a raw `ShardStore` failure: an out-of-memory condition is
    /// always rethrown wrapped with the province name (spec §4.12, §4.14);
    /// anything else becomes a logged-and-returned `ShardError`.
    pub fn from_shard_failure(province: impl Into<String>, query_code: impl Into<String>, err: anyhow::Error) -> Self {
        let province = province.into();
        let is_oom = err
            .chain()
            .any(|cause| cause.to_string().to_lowercase().contains("out of memory"));
        if is_oom {
            Self::memory_exhaustion(province)
        } else {
            Self::shard(province, query_code, err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_fatal_classification() {
        assert!(Error::invalid_input("empty sql").is_job_fatal());
        assert!(Error::protection_imbalance("unmatched CASE").is_job_fatal());
        assert!(!Error::memory_exhaustion("cordoba").is_job_fatal());
        assert!(!Error::estimation_drift("q1", 100, 10).is_job_fatal());
    }

    #[test]
    fn shard_error_carries_context() {
        let err = Error::shard("mendoza", "q42", anyhow::anyhow!("timeout"));
        let msg = err.to_string();
        assert!(msg.contains("mendoza"));
        assert!(msg.contains("q42"));
    }

    #[test]
    fn classifies_out_of_memory_failures() {
        let err = Error::from_shard_failure("cordoba", "q1", anyhow::anyhow!("driver reported Out of Memory"));
        assert!(matches!(err, Error::MemoryExhaustion { shard } if shard == "cordoba"));
    }

    #[test]
    fn classifies_generic_failures_as_shard_errors() {
        let err = Error::from_shard_failure("cordoba", "q1", anyhow::anyhow!("connection reset"));
        assert!(matches!(err, Error::ShardError { .. }));
    }
}
