//! Progress, cancellation and log sink injected into long-running work.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Host-side capability polled by the pixel loop.
pub trait Feedback {
    /// Report coarse progress in percent (0–100).
    fn report_percent(&self, percent: u8);

    /// Whether the host asked to stop.
    fn is_cancelled(&self) -> bool;

    /// Human-readable status line.
    fn log(&self, message: &str);
}

/// Feedback that ignores everything and never cancels.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopFeedback;

impl Feedback for NoopFeedback {
    fn report_percent(&self, _percent: u8) {}

    fn is_cancelled(&self) -> bool {
        false
    }

    fn log(&self, _message: &str) {}
}

/// Shared cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Feedback that forwards progress and log lines to `tracing`.
#[derive(Debug, Clone, Default)]
pub struct TracingFeedback {
    token: CancellationToken,
}

impl TracingFeedback {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feedback that stops when `token` is cancelled.
    pub fn with_token(token: CancellationToken) -> Self {
        Self { token }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Feedback for TracingFeedback {
    fn report_percent(&self, percent: u8) {
        tracing::debug!(percent, "progress");
    }

    fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    fn log(&self, message: &str) {
        tracing::info!("{}", message);
    }
}
