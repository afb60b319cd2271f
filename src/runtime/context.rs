use std::{future::Future, time::Duration};

use tokio::time::Instant;

use crate::{common::Shutdown, utils};

/// Per-run signal handed to every node: run id, cancellation and optional deadline.
///
/// Clones share the same cancellation state.
#[derive(Clone, Debug)]
pub struct Context {
    run_id: String,
    deadline: Option<Instant>,
    shutdown: Shutdown,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    pub fn new() -> Self {
        Self {
            run_id: utils::longid(),
            deadline: None,
            shutdown: Shutdown::new(),
        }
    }

    /// Cancel the run once `timeout` has elapsed from now.
    pub fn with_timeout(
        self,
        timeout: Duration,
    ) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn with_deadline(
        mut self,
        deadline: Instant,
    ) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, `None` when there is no deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline.map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Cancel the run. Nodes already executing observe it through [`Context::cancelled`].
    pub fn cancel(&self) {
        self.shutdown.shutdown();
    }

    pub fn is_cancelled(&self) -> bool {
        self.shutdown.is_terminated() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Resolves when the run is cancelled or its deadline passes.
    pub fn cancelled(&self) -> impl Future<Output = ()> + Send + 'static {
        let wait = self.shutdown.wait();
        let deadline = self.deadline;
        async move {
            match deadline {
                Some(deadline) => {
                    tokio::select! {
                        _ = wait => {}
                        _ = tokio::time::sleep_until(deadline) => {}
                    }
                }
                None => wait.await,
            }
        }
    }
}
