//! Typed error hierarchy for the order tracker.
//!
//! Two enums cover the two layers:
//! - `StoreError`: reading, writing and locking the JSON data file
//! - `TrackerError`: domain operations (missing entities) plus store failures

use std::path::PathBuf;

use thiserror::Error;

use crate::tracker::models::OrderType;

/// Errors from the persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to access data file at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Data file at {path} is not valid JSON: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Data file at {path} does not match the expected layout: {source}")]
    Schema {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize document: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("Failed to lock data file at {path}: {source}")]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Store lock poisoned")]
    LockPoisoned,

    #[error("Store task panicked: {0}")]
    TaskPanicked(String),
}

/// Errors from tracker operations.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("{order_type} order {id} not found")]
    OrderNotFound { order_type: OrderType, id: i64 },

    #[error("Problem {id} not found")]
    ProblemNotFound { id: i64 },

    #[error("Requisition {id} not found")]
    RequisitionNotFound { id: i64 },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl TrackerError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::OrderNotFound { .. } | Self::ProblemNotFound { .. } | Self::RequisitionNotFound { .. }
        )
    }
}
