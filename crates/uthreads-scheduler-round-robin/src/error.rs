use thiserror::Error;

use crate::thread::Tid;

/// Rejections reported to library callers. The caller's thread keeps running
/// and the scheduler state is left unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
    #[error("thread library error: {0}")]
    InvalidArgument(&'static str),

    #[error("thread library error: the entry point cannot be null")]
    NullArgument,

    #[error("thread library error: the maximum number of threads ({max}) is already live")]
    ResourceExhausted { max: usize },

    #[error("thread library error: {0} is not a valid thread id")]
    InvalidId(i64),

    #[error("thread library error: no thread with id {0} exists")]
    NoSuchThread(Tid),

    #[error("thread library error: {0}")]
    InvalidOperation(&'static str),

    #[error("thread library error: the library has not been initialized")]
    NotInitialized,

    #[error("thread library error: no thread is ready to run")]
    ReadyQueueEmpty,
}

impl Error {
    /// Whether the scheduler can no longer make progress after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::ReadyQueueEmpty)
    }
}

pub type Result<T> = core::result::Result<T, Error>;
