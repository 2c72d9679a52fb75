use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(300);

/// Trailing-edge debounce: each call to [`Debouncer::settle`] supersedes
/// every earlier one still waiting.
#[derive(Debug, Clone)]
pub struct Debouncer {
    generation: Arc<AtomicU64>,
    delay: Duration,
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(SEARCH_DEBOUNCE)
    }
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            generation: Arc::new(AtomicU64::new(0)),
            delay,
        }
    }

    /// Waits out the delay. Returns the call's ticket when no newer call
    /// arrived meanwhile; the ticket stays valid until the next call or
    /// [`Debouncer::cancel`].
    pub async fn settle(&self) -> Option<u64> {
        let ticket = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(self.delay).await;
        self.is_current(ticket).then_some(ticket)
    }

    pub fn is_current(&self, ticket: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == ticket
    }

    /// Drops whatever is pending.
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn only_the_last_call_wins() {
        let debouncer = Debouncer::default();

        let first = tokio::spawn({
            let d = debouncer.clone();
            async move { d.settle().await }
        });
        tokio::time::sleep(Duration::from_millis(100)).await;
        let second = tokio::spawn({
            let d = debouncer.clone();
            async move { d.settle().await }
        });

        assert!(first.await.unwrap().is_none());
        assert!(second.await.unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_drops_pending_work() {
        let debouncer = Debouncer::default();
        let pending = tokio::spawn({
            let d = debouncer.clone();
            async move { d.settle().await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        debouncer.cancel();
        assert!(pending.await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn settled_tickets_expire_on_cancel() {
        let debouncer = Debouncer::default();
        let ticket = debouncer.settle().await.unwrap();
        assert!(debouncer.is_current(ticket));

        debouncer.cancel();
        assert!(!debouncer.is_current(ticket));
    }
}
