use std::future;
use std::pin::Pin;
use std::time::Duration;

use tokio::time::{sleep, Instant, Sleep};

/// One-shot timeout acquired when an attempt enters `Loading`.
///
/// Fires at most once. After it fires, or after [`ScopedTimer::cancel`], or
/// when it is dropped, it never completes again.
#[derive(Debug)]
pub struct ScopedTimer {
    sleep: Option<Pin<Box<Sleep>>>,
    started: Instant,
}

impl ScopedTimer {
    pub fn start(duration: Duration) -> Self {
        Self {
            sleep: Some(Box::pin(sleep(duration))),
            started: Instant::now(),
        }
    }

    pub fn is_armed(&self) -> bool {
        self.sleep.is_some()
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn cancel(&mut self) {
        self.sleep = None;
    }

    /// Resolves when the timer fires; pending forever once disarmed.
    pub async fn expired(&mut self) {
        match self.sleep.as_mut() {
            Some(s) => {
                s.as_mut().await;
                self.sleep = None;
            }
            None => future::pending::<()>().await,
        }
    }
}
