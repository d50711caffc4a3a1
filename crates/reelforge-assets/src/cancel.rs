use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

use reelforge_core::{ReelError, ReelResult};

/// Run-level cancellation, triggered by the user or by a deadline.
///
/// Clones observe the same state. Stages poll [`CancelToken::checkpoint`]
/// between steps; asset resolution races backend calls against
/// [`CancelToken::cancelled`] and substitutes placeholders when it fires.
#[derive(Debug, Clone)]
pub struct CancelToken {
    state: Arc<watch::Sender<Option<String>>>,
    deadline: Option<Instant>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self {
            state: Arc::new(tx),
            deadline: None,
        }
    }

    /// A token that also fires once `timeout` has elapsed from now.
    pub fn with_deadline(timeout: Duration) -> Self {
        Self {
            deadline: Some(Instant::now() + timeout),
            ..Self::new()
        }
    }

    /// Request cancellation. The first reason wins.
    pub fn cancel(&self, reason: impl Into<String>) {
        let reason = reason.into();
        self.state.send_if_modified(|current| {
            if current.is_none() {
                *current = Some(reason);
                true
            } else {
                false
            }
        });
    }

    pub fn is_cancelled(&self) -> bool {
        self.reason().is_some()
    }

    pub fn reason(&self) -> Option<String> {
        if let Some(reason) = self.state.borrow().clone() {
            return Some(reason);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some("run deadline exceeded".into()),
            _ => None,
        }
    }

    /// `Err(Cancelled)` once the token has fired.
    pub fn checkpoint(&self) -> ReelResult<()> {
        match self.reason() {
            Some(reason) => Err(ReelError::Cancelled(reason)),
            None => Ok(()),
        }
    }

    /// Resolves when the token fires.
    pub async fn cancelled(&self) {
        let mut rx = self.state.subscribe();
        let requested = async move {
            // The sender lives as long as `self`, so this only returns on a reason.
            let _ = rx.wait_for(|reason| reason.is_some()).await;
        };
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = requested => {}
                    _ = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => requested.await,
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_reason_wins() {
        let token = CancelToken::new();
        assert!(token.checkpoint().is_ok());
        token.clone().cancel("ctrl-c");
        token.cancel("second");
        assert_eq!(token.reason().as_deref(), Some("ctrl-c"));
        assert!(matches!(token.checkpoint(), Err(ReelError::Cancelled(_))));
    }

    #[tokio::test]
    async fn test_cancelled_wakes_waiters() {
        let token = CancelToken::new();
        let waiter = token.clone();
        let handle = tokio::spawn(async move { waiter.cancelled().await });
        tokio::task::yield_now().await;
        token.cancel("stop");
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_deadline_fires() {
        let token = CancelToken::with_deadline(Duration::from_millis(10));
        tokio::time::timeout(Duration::from_secs(1), token.cancelled())
            .await
            .unwrap();
        assert_eq!(token.reason().as_deref(), Some("run deadline exceeded"));
    }
}
