//! Render-side error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("render dispatcher has been released")]
    Released,

    #[error("graphics context creation failed: {0}")]
    ContextCreation(String),

    #[error("failed to spawn render thread: {0}")]
    ThreadSpawn(#[from] std::io::Error),

    #[error("render thread exited before completing the job")]
    WorkerGone,

    #[error("pending work queue is full ({0} tasks)")]
    PendingQueueFull(usize),

    #[error("no graphics context is current on this thread")]
    NoContext,
}
