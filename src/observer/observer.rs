use std::collections::VecDeque;
use std::sync::Mutex;

use tokio::sync::broadcast;

use super::TraceEvent;

/// Upper bound on retained events; the oldest are evicted first.
pub const TRACE_BUFFER_CAPACITY: usize = 500;

/// Default window for [`Observer::list_recent`].
pub const DEFAULT_RECENT_LIMIT: usize = 100;

type PersistFn =
    dyn Fn(&TraceEvent) -> Result<(), Box<dyn std::error::Error + Send + Sync>> + Send + Sync;

/// Bounded append-only trace log with live fan-out.
///
/// `emit` never blocks on consumers: live subscribers receive events over
/// a broadcast channel and lagging subscribers lose the oldest entries,
/// exactly like the ring itself.
pub struct Observer {
    events: Mutex<VecDeque<TraceEvent>>,
    sender: broadcast::Sender<TraceEvent>,
    persist: Option<Box<PersistFn>>,
}

impl Default for Observer {
    fn default() -> Self {
        Self::new()
    }
}

impl Observer {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(TRACE_BUFFER_CAPACITY);
        Self {
            events: Mutex::new(VecDeque::with_capacity(TRACE_BUFFER_CAPACITY)),
            sender,
            persist: None,
        }
    }

    /// Install a best-effort persistence hook. A failing hook is logged
    /// and never fails the producer.
    pub fn with_persistence<F>(mut self, persist: F) -> Self
    where
        F: Fn(&TraceEvent) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
            + Send
            + Sync
            + 'static,
    {
        self.persist = Some(Box::new(persist));
        self
    }

    pub fn emit(&self, event: TraceEvent) {
        {
            let mut events = self.events.lock().unwrap_or_else(|e| e.into_inner());
            if events.len() >= TRACE_BUFFER_CAPACITY {
                events.pop_front();
            }
            events.push_back(event.clone());
        }

        if let Some(persist) = &self.persist {
            if let Err(e) = persist(&event) {
                log::warn!("trace persistence failed: {e}");
            }
        }

        // No receivers is fine; send only fails when nobody listens.
        let _ = self.sender.send(event);
    }

    /// The last `limit` events in insertion order.
    pub fn list_recent(&self, limit: usize) -> Vec<TraceEvent> {
        let events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        let skip = events.len().saturating_sub(limit);
        events.iter().skip(skip).cloned().collect()
    }

    pub fn recent(&self) -> Vec<TraceEvent> {
        self.list_recent(DEFAULT_RECENT_LIMIT)
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TraceEvent> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::observer::TraceEventKind;

    #[test]
    fn test_buffer_is_bounded_and_ordered() {
        let observer = Observer::new();
        for i in 0..700 {
            observer.emit(TraceEvent::generic(format!("event {i}")));
        }

        assert_eq!(observer.len(), TRACE_BUFFER_CAPACITY);

        let recent = observer.list_recent(3);
        let messages: Vec<_> = recent
            .iter()
            .map(|e| match &e.kind {
                TraceEventKind::Generic { message, .. } => message.clone(),
                _ => panic!("expected generic"),
            })
            .collect();
        assert_eq!(messages, vec!["event 697", "event 698", "event 699"]);
    }

    #[test]
    fn test_list_recent_smaller_than_limit() {
        let observer = Observer::new();
        observer.emit(TraceEvent::generic("only"));
        assert_eq!(observer.list_recent(100).len(), 1);
    }

    #[test]
    fn test_persistence_failure_never_fails_emit() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let observer = Observer::new().with_persistence(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
            Err("disk full".into())
        });

        observer.emit(TraceEvent::generic("one"));
        observer.emit(TraceEvent::generic("two"));

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(observer.len(), 2);
    }

    #[tokio::test]
    async fn test_subscriber_receives_live_events() {
        let observer = Observer::new();
        let mut rx = observer.subscribe();

        observer.emit(TraceEvent::generic("hello"));

        let event = rx.recv().await.unwrap();
        match event.kind {
            TraceEventKind::Generic { message, .. } => assert_eq!(message, "hello"),
            _ => panic!("expected generic"),
        }
    }
}
