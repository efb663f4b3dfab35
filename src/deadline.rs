//! Caller-supplied deadlines for blocking collaborator calls.
//!
//! The call runs on a short-lived worker thread and its result is handed back
//! over a channel. When the deadline passes first the caller gets
//! [`TopicError::Timeout`]; the worker's late result is dropped on the floor,
//! so nothing it produced can reach the document store.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

use crate::error::{Result, TopicError};
use crate::generate::GenerationError;
use crate::semantic::embeddings::EmbeddingError;

/// Run `call` with an optional deadline.
///
/// Without a deadline the call runs inline on the current thread.
pub fn run_with_deadline<T, E, F>(
    operation: &'static str,
    timeout: Option<Duration>,
    call: F,
) -> Result<T>
where
    T: Send + 'static,
    E: Into<TopicError> + Send + 'static,
    F: FnOnce() -> std::result::Result<T, E> + Send + 'static,
{
    let Some(timeout) = timeout else {
        return call().map_err(Into::into);
    };

    let (tx, rx) = mpsc::channel();
    std::thread::Builder::new()
        .name(format!("{operation}-call"))
        .spawn(move || {
            // receiver may already be gone after a timeout
            let _ = tx.send(call());
        })
        .map_err(|e| {
            TopicError::configuration(format!("failed to spawn {operation} worker: {e}"))
        })?;

    match rx.recv_timeout(timeout) {
        Ok(result) => result.map_err(Into::into),
        Err(RecvTimeoutError::Timeout) => {
            log::warn!("{operation} call timed out after {}ms", timeout.as_millis());
            Err(TopicError::Timeout {
                operation,
                after: timeout,
            })
        }
        Err(RecvTimeoutError::Disconnected) => {
            log::error!("{operation} worker exited without a result");
            Err(worker_lost(operation))
        }
    }
}

/// A worker that died before answering (usually a panic inside the
/// collaborator) is a failure of that collaborator.
fn worker_lost(operation: &'static str) -> TopicError {
    let message = format!("{operation} worker exited without a result");
    match operation {
        "generation" => GenerationError::Failed(message).into(),
        "model download" => EmbeddingError::InitFailed(message).into(),
        _ => EmbeddingError::EmbeddingFailed(message).into(),
    }
}
