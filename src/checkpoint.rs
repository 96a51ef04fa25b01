//! Transport abstraction for persisting and restoring criterion state.
//!
//! Criteria serialize their configuration as fixed-length records of scalars,
//! tagged with a caller-supplied identifier pair. The concrete transport (a
//! database, a file, a message channel between processes) is behind the
//! [`Channel`] trait; [`InMemoryChannel`] is a map-backed implementation
//! suitable for tests and process-local snapshots.

use std::collections::HashMap;

use nalgebra::{DVector, RealField};
use thiserror::Error;

/// Identifier pair of a checkpoint record: a database tag assigned to the
/// persisted object and a tag for the individual send/receive call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CheckpointTag {
    /// Tag of the persisted object within the transport.
    pub db: u32,
    /// Tag of the individual send or receive call.
    pub commit: u32,
}

impl CheckpointTag {
    /// Creates a tag pair.
    pub fn new(db: u32, commit: u32) -> Self {
        Self { db, commit }
    }
}

/// Error raised by a checkpoint channel.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// No record is stored under the requested tag.
    #[error("no record stored for tag {0:?}")]
    Missing(CheckpointTag),
    /// The stored record does not match the requested length.
    #[error("record length mismatch: expected {expected}, got {actual}")]
    RecordLength {
        /// Length requested by the receiver.
        expected: usize,
        /// Length of the stored record.
        actual: usize,
    },
    /// Failure in the underlying transport.
    #[error("transport failure: {0}")]
    Transport(Box<dyn std::error::Error + Send + Sync>),
}

/// A transport channel for fixed-length scalar records.
pub trait Channel<T: RealField + Copy> {
    /// Writes a record under the given tag, replacing any previous record
    /// with the same tag.
    fn send_vector(&mut self, tag: CheckpointTag, data: &DVector<T>) -> Result<(), ChannelError>;

    /// Reads the record stored under the given tag into `data`, whose length
    /// must match the stored record exactly.
    fn recv_vector(&mut self, tag: CheckpointTag, data: &mut DVector<T>)
        -> Result<(), ChannelError>;
}

/// Map-backed channel keeping records in process memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryChannel<T: RealField + Copy> {
    records: HashMap<CheckpointTag, DVector<T>>,
}

impl<T: RealField + Copy> InMemoryChannel<T> {
    /// Creates an empty channel.
    pub fn new() -> Self {
        Self {
            records: HashMap::new(),
        }
    }
}

impl<T: RealField + Copy> Channel<T> for InMemoryChannel<T> {
    fn send_vector(&mut self, tag: CheckpointTag, data: &DVector<T>) -> Result<(), ChannelError> {
        self.records.insert(tag, data.clone());
        Ok(())
    }

    fn recv_vector(
        &mut self,
        tag: CheckpointTag,
        data: &mut DVector<T>,
    ) -> Result<(), ChannelError> {
        let stored = self
            .records
            .get(&tag)
            .ok_or(ChannelError::Missing(tag))?;

        if stored.len() != data.len() {
            return Err(ChannelError::RecordLength {
                expected: data.len(),
                actual: stored.len(),
            });
        }

        data.copy_from(stored);
        Ok(())
    }
}
