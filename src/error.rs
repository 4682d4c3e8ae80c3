use std::fmt::Debug;
use thiserror::Error;

/// Enum with all errors in this crate.
#[derive(Error, Debug)]
pub enum KdIndexError {
    /// The node arena refused to allocate another node.
    #[error("node arena at capacity ({0} nodes)")]
    ArenaFull(usize),
}

pub type Result<T> = std::result::Result<T, KdIndexError>;
