//! SLURM vocabulary for squint.
//!
//! Job records, the explicit squeue field order, the line parser and the
//! builders for every command squint sends to a cluster.

pub mod commands;
pub mod config;
pub mod squeue;
pub mod types;

pub use config::{ClusterConfig, parse_config, parse_partitions};
pub use squeue::{FieldOrder, QUEUE_DELIMITER, QueueField, SqueueError, parse_squeue_output};
pub use types::{Job, JobState};
