//! Crate-local error type.
//!
//! The teacher repo wraps every failure in a single `SimpleError` string.
//! That collapses the taxonomy the spec calls for (not-found vs. I/O vs.
//! integrity violation vs. capacity exhaustion), so this is a small enum
//! instead, still kept deliberately flat.

use std::fmt;
use std::io;

#[derive(Debug)]
pub enum StorageError {
    Io(io::Error),
    NotFound(String),
    CapacityExhausted(String),
    IntegrityViolation(String),
    LockConflict(String),
}

impl StorageError {
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        StorageError::NotFound(msg.into())
    }

    pub fn capacity<S: Into<String>>(msg: S) -> Self {
        StorageError::CapacityExhausted(msg.into())
    }

    pub fn integrity<S: Into<String>>(msg: S) -> Self {
        StorageError::IntegrityViolation(msg.into())
    }

    pub fn lock_conflict<S: Into<String>>(msg: S) -> Self {
        StorageError::LockConflict(msg.into())
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StorageError::Io(e) => write!(f, "io error: {}", e),
            StorageError::NotFound(msg) => write!(f, "not found: {}", msg),
            StorageError::CapacityExhausted(msg) => write!(f, "capacity exhausted: {}", msg),
            StorageError::IntegrityViolation(msg) => write!(f, "integrity violation: {}", msg),
            StorageError::LockConflict(msg) => write!(f, "lock conflict: {}", msg),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<io::Error> for StorageError {
    fn from(e: io::Error) -> Self {
        StorageError::Io(e)
    }
}

pub type StorageResult<T> = Result<T, StorageError>;
