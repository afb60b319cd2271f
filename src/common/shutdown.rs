//! Cooperative shutdown signal shared between a run and its nodes.

use std::future::Future;

use tokio_util::sync::CancellationToken;

/// Clonable shutdown flag. All clones observe the same signal.
#[derive(Clone, Debug, Default)]
pub struct Shutdown {
    token: CancellationToken,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal every waiter.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    pub fn is_terminated(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once [`Shutdown::shutdown`] has been called on any clone.
    pub fn wait(&self) -> impl Future<Output = ()> + Send + 'static {
        let token = self.token.clone();
        async move { token.cancelled().await }
    }
}
