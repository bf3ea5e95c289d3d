//! Debounced, ordered update queue.
//!
//! Every edit to an existing event goes through one `UpdateQueue`. Edits wait
//! out a short debounce window; then a single drain pass applies them oldest
//! first, one write at a time. Edits of the same event still queued when its
//! turn comes are folded into that one write.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::constants::{DEFAULT_DEBOUNCE_MS, DEFAULT_DRAIN_DELAY_MS};
use crate::error::{CalendarError, CalendarResult};
use crate::event::{CalendarEvent, EventPatch};

/// Performs the write for a dequeued update.
#[async_trait]
pub trait UpdateApplier: Send + Sync {
    async fn apply(&self, event_id: &str, patch: &EventPatch) -> CalendarResult<CalendarEvent>;

    /// Runs after each successful write, before the next item is taken.
    async fn after_apply(&self, _event: &CalendarEvent) {}
}

#[derive(Debug, Clone, Copy)]
pub struct QueueConfig {
    pub debounce: Duration,
    /// Pause between consecutive writes of one drain pass.
    pub drain_delay: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        QueueConfig {
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            drain_delay: Duration::from_millis(DEFAULT_DRAIN_DELAY_MS),
        }
    }
}

type Reply = oneshot::Sender<CalendarResult<CalendarEvent>>;

struct PendingUpdate {
    seq: u64,
    event_id: String,
    patch: EventPatch,
    submitted_at: Instant,
    reply: Reply,
}

#[derive(Default)]
struct QueueState {
    pending: Vec<PendingUpdate>,
    timer: Option<JoinHandle<()>>,
    timer_generation: u64,
    draining: bool,
    next_seq: u64,
    closed: bool,
}

struct QueueInner {
    state: Mutex<QueueState>,
    applier: Arc<dyn UpdateApplier>,
    config: QueueConfig,
}

pub struct UpdateQueue {
    inner: Arc<QueueInner>,
}

impl UpdateQueue {
    /// Must be created inside a tokio runtime.
    pub fn new(applier: Arc<dyn UpdateApplier>, config: QueueConfig) -> Self {
        UpdateQueue {
            inner: Arc::new(QueueInner {
                state: Mutex::new(QueueState::default()),
                applier,
                config,
            }),
        }
    }

    /// Queue `patch` for `event_id` and restart the debounce window.
    pub fn submit(&self, event_id: impl Into<String>, patch: EventPatch) -> UpdateHandle {
        let (reply, rx) = oneshot::channel();
        let mut state = self.inner.lock();

        if state.closed {
            let _ = reply.send(Err(CalendarError::Cancelled));
            return UpdateHandle { rx };
        }

        let seq = state.next_seq;
        state.next_seq += 1;
        state.pending.push(PendingUpdate {
            seq,
            event_id: event_id.into(),
            patch,
            submitted_at: Instant::now(),
            reply,
        });

        self.inner.restart_timer(&mut state);
        UpdateHandle { rx }
    }

    /// Updates waiting to be written.
    pub fn pending(&self) -> usize {
        self.inner.lock().pending.len()
    }

    pub fn is_draining(&self) -> bool {
        self.inner.lock().draining
    }

    /// Stop the queue. Queued updates resolve with `Cancelled`; a write
    /// already in flight still completes.
    pub fn shutdown(&self) {
        let mut state = self.inner.lock();
        if state.closed {
            return;
        }
        state.closed = true;

        if let Some(timer) = state.timer.take() {
            timer.abort();
        }

        let dropped = state.pending.len();
        for update in state.pending.drain(..) {
            let _ = update.reply.send(Err(CalendarError::Cancelled));
        }
        if dropped > 0 {
            tracing::info!(dropped, "Update queue shut down with pending updates");
        }
    }
}

impl Drop for UpdateQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl QueueInner {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn restart_timer(self: &Arc<Self>, state: &mut QueueState) {
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        state.timer_generation += 1;

        let generation = state.timer_generation;
        let inner = Arc::clone(self);
        let debounce = self.config.debounce;
        state.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            inner.timer_fired(generation);
        }));
    }

    fn timer_fired(self: &Arc<Self>, generation: u64) {
        let mut state = self.lock();
        if state.closed || state.timer_generation != generation {
            return;
        }
        state.timer = None;

        // The running pass picks up everything queued in the meantime.
        if state.draining {
            return;
        }
        state.draining = true;
        drop(state);

        // The drain runs in its own task so restarting the timer never aborts a write.
        tokio::spawn(Arc::clone(self).drain());
    }

    async fn drain(self: Arc<Self>) {
        loop {
            let next = {
                let mut state = self.lock();
                if state.closed || state.pending.is_empty() {
                    state.draining = false;
                    return;
                }
                take_oldest(&mut state.pending)
            };

            let followers = next.replies.len() - 1;
            tracing::debug!(event_id = %next.event_id, coalesced = followers, "Applying queued update");

            let result = self.applier.apply(&next.event_id, &next.patch).await;
            match &result {
                Ok(event) => self.applier.after_apply(event).await,
                Err(e) => tracing::warn!(event_id = %next.event_id, error = %e, "Queued update failed"),
            }
            settle(next.replies, result);

            let more = !self.lock().pending.is_empty();
            if more {
                tokio::time::sleep(self.config.drain_delay).await;
            }
        }
    }
}

struct Dequeued {
    event_id: String,
    patch: EventPatch,
    replies: Vec<Reply>,
}

/// Remove the oldest update along with every later one for the same event.
fn take_oldest(pending: &mut Vec<PendingUpdate>) -> Dequeued {
    pending.sort_by_key(|p| (p.submitted_at, p.seq));
    let leader = pending.remove(0);

    let mut patch = leader.patch;
    let mut replies = vec![leader.reply];
    let mut index = 0;
    while index < pending.len() {
        if pending[index].event_id == leader.event_id {
            let follower = pending.remove(index);
            patch.merge(follower.patch);
            replies.push(follower.reply);
        } else {
            index += 1;
        }
    }

    Dequeued {
        event_id: leader.event_id,
        patch,
        replies,
    }
}

fn settle(replies: Vec<Reply>, result: CalendarResult<CalendarEvent>) {
    let mut replies = replies.into_iter();
    let first = replies.next();

    for reply in replies {
        let copy = match &result {
            Ok(event) => Ok(event.clone()),
            Err(e) => Err(e.replicate()),
        };
        let _ = reply.send(copy);
    }
    if let Some(reply) = first {
        let _ = reply.send(result);
    }
}

/// Resolves once the submitted update has been written or rejected.
#[must_use = "an update handle does nothing unless awaited"]
pub struct UpdateHandle {
    rx: oneshot::Receiver<CalendarResult<CalendarEvent>>,
}

impl UpdateHandle {
    /// A handle that is already settled.
    pub fn ready(result: CalendarResult<CalendarEvent>) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(result);
        UpdateHandle { rx }
    }
}

impl Future for UpdateHandle {
    type Output = CalendarResult<CalendarEvent>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(CalendarError::Cancelled)))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::color::SupportedColor;
    use chrono::{TimeZone, Utc};

    #[derive(Default)]
    struct Recorder {
        applied: Mutex<Vec<(String, EventPatch)>>,
        failing: HashSet<String>,
        write_time: Duration,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl Recorder {
        fn applied(&self) -> Vec<(String, EventPatch)> {
            self.applied.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl UpdateApplier for Recorder {
        async fn apply(&self, event_id: &str, patch: &EventPatch) -> CalendarResult<CalendarEvent> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.write_time).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.failing.contains(event_id) {
                return Err(CalendarError::Store(format!("rejected {event_id}")));
            }
            self.applied
                .lock()
                .unwrap()
                .push((event_id.to_string(), patch.clone()));

            let mut event = CalendarEvent {
                id: event_id.to_string(),
                title: String::new(),
                description: String::new(),
                location: String::new(),
                start_at: Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap(),
                end_at: Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap(),
                color: SupportedColor::Blue,
                locked: false,
                google_event_id: None,
                ws_id: "ws".into(),
            };
            patch.apply_to(&mut event);
            Ok(event)
        }
    }

    fn titled(title: &str) -> EventPatch {
        EventPatch {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    fn queue(recorder: &Arc<Recorder>) -> UpdateQueue {
        UpdateQueue::new(recorder.clone(), QueueConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_debounce() {
        let recorder = Arc::new(Recorder::default());
        let queue = queue(&recorder);

        let handle = queue.submit("e1", titled("A"));
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(recorder.applied().is_empty());

        let event = handle.await.unwrap();
        assert_eq!(event.title, "A");
        assert_eq!(recorder.applied().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_edit_restarts_debounce() {
        let recorder = Arc::new(Recorder::default());
        let queue = queue(&recorder);

        let first = queue.submit("e1", titled("A"));
        tokio::time::sleep(Duration::from_millis(200)).await;
        let second = queue.submit("e2", titled("B"));
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(recorder.applied().is_empty());

        first.await.unwrap();
        second.await.unwrap();
        assert_eq!(recorder.applied().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_event_edits_coalesce_in_order() {
        let recorder = Arc::new(Recorder::default());
        let queue = queue(&recorder);

        let first = queue.submit("e1", titled("U1"));
        tokio::time::sleep(Duration::from_millis(10)).await;
        let second = queue.submit(
            "e1",
            EventPatch {
                title: Some("U2".into()),
                color: Some(SupportedColor::Green),
                ..Default::default()
            },
        );

        assert_eq!(first.await.unwrap().title, "U2");
        assert_eq!(second.await.unwrap().title, "U2");

        let applied = recorder.applied();
        assert_eq!(applied.len(), 1);
        assert_eq!(applied[0].1.title.as_deref(), Some("U2"));
        assert_eq!(applied[0].1.color, Some(SupportedColor::Green));
    }

    #[tokio::test(start_paused = true)]
    async fn test_distinct_events_apply_oldest_first() {
        let recorder = Arc::new(Recorder::default());
        let queue = queue(&recorder);

        let handles: Vec<_> = ["c", "a", "b"]
            .into_iter()
            .map(|id| queue.submit(id, titled(id)))
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        let order: Vec<_> = recorder.applied().into_iter().map(|(id, _)| id).collect();
        assert_eq!(order, vec!["c", "a", "b"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_only_reaches_its_caller() {
        let recorder = Arc::new(Recorder {
            failing: HashSet::from(["bad".to_string()]),
            ..Default::default()
        });
        let queue = queue(&recorder);

        let bad = queue.submit("bad", titled("x"));
        let good = queue.submit("good", titled("y"));

        assert!(matches!(bad.await, Err(CalendarError::Store(_))));
        assert_eq!(good.await.unwrap().title, "y");
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_drain_pass_at_a_time() {
        let recorder = Arc::new(Recorder {
            write_time: Duration::from_millis(400),
            ..Default::default()
        });
        let queue = queue(&recorder);

        let first = queue.submit("e1", titled("A"));
        // Lands while the first write is in flight.
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(queue.is_draining());
        let second = queue.submit("e2", titled("B"));
        tokio::time::sleep(Duration::from_millis(300)).await;
        let third = queue.submit("e3", titled("C"));

        first.await.unwrap();
        second.await.unwrap();
        third.await.unwrap();
        assert_eq!(recorder.max_in_flight.load(Ordering::SeqCst), 1);
        assert!(!queue.is_draining());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_pending() {
        let recorder = Arc::new(Recorder::default());
        let queue = queue(&recorder);

        let handle = queue.submit("e1", titled("A"));
        queue.shutdown();

        assert!(matches!(handle.await, Err(CalendarError::Cancelled)));
        assert!(matches!(
            queue.submit("e2", titled("B")).await,
            Err(CalendarError::Cancelled)
        ));
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(recorder.applied().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_pending() {
        let recorder = Arc::new(Recorder::default());
        let handle = queue(&recorder).submit("e1", titled("A"));

        assert!(matches!(handle.await, Err(CalendarError::Cancelled)));
    }

    #[tokio::test]
    async fn test_ready_handle() {
        let handle = UpdateHandle::ready(Err(CalendarError::Locked("e1".into())));
        assert!(matches!(handle.await, Err(CalendarError::Locked(_))));
    }
}
