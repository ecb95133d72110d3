//! Per-request host context.
//!
//! Bundles the inbound request, the response being built for the client,
//! the current principal, and the client's abort signal. One context lives
//! for exactly one request.

use tokio::sync::watch;

use crate::auth::Principal;
use crate::http::request::InboundRequest;
use crate::http::response::InboundResponse;

/// Everything the pipeline and rules can see about the inbound exchange.
#[derive(Debug)]
pub struct ProxyContext {
    pub request: InboundRequest,
    pub response: InboundResponse,
    pub user: Principal,
    pub aborted: AbortSignal,
}

impl ProxyContext {
    pub fn new(request: InboundRequest) -> Self {
        Self {
            request,
            response: InboundResponse::default(),
            user: Principal::anonymous(),
            aborted: AbortSignal::never(),
        }
    }

    pub fn with_user(mut self, user: Principal) -> Self {
        self.user = user;
        self
    }

    pub fn with_abort_signal(mut self, aborted: AbortSignal) -> Self {
        self.aborted = aborted;
        self
    }
}

/// Fires when the client goes away.
#[derive(Debug, Clone)]
pub struct AbortSignal {
    rx: Option<watch::Receiver<bool>>,
}

/// Trigger side of an [`AbortSignal`].
#[derive(Debug)]
pub struct AbortHandle {
    tx: watch::Sender<bool>,
}

impl AbortSignal {
    /// A signal paired with the handle that fires it.
    pub fn new() -> (AbortHandle, Self) {
        let (tx, rx) = watch::channel(false);
        (AbortHandle { tx }, Self { rx: Some(rx) })
    }

    /// A signal that never fires.
    ///
    /// Hosts that drop the request future on disconnect need nothing more:
    /// dropping the future drops the outbound call with it.
    pub fn never() -> Self {
        Self { rx: None }
    }

    pub fn is_aborted(&self) -> bool {
        self.rx.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Resolves once the request is aborted. Pends forever otherwise.
    pub async fn aborted(&mut self) {
        if let Some(rx) = self.rx.as_mut() {
            if rx.wait_for(|aborted| *aborted).await.is_ok() {
                return;
            }
        }
        std::future::pending::<()>().await;
    }
}

impl Default for AbortSignal {
    fn default() -> Self {
        Self::never()
    }
}

impl AbortHandle {
    pub fn abort(&self) {
        let _ = self.tx.send(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn abort_handle_fires_signal() {
        let (handle, mut signal) = AbortSignal::new();
        assert!(!signal.is_aborted());

        handle.abort();
        tokio::time::timeout(Duration::from_secs(1), signal.aborted())
            .await
            .expect("signal should fire");
        assert!(signal.is_aborted());
    }

    #[tokio::test]
    async fn never_signal_pends() {
        let mut signal = AbortSignal::never();
        let waited = tokio::time::timeout(Duration::from_millis(50), signal.aborted()).await;
        assert!(waited.is_err());
    }
}
