//! The in-process event router.
//!
//! RULES:
//!   - Subscribers are invoked sequentially, in registration order.
//!   - A failing (or panicking) handler never stops delivery to the
//!     remaining subscribers and never surfaces to the publisher.
//!   - A publish issued from inside a handler is queued and delivered
//!     after the current handler chain completes, so per-type delivery
//!     order is always publish order and no dispatch nests.
//!   - History is a bounded ring buffer, oldest evicted first.

use crate::{
    error::TrustResult,
    event::{Event, EventPayload, EventType},
    types::{ModuleId, UserId},
};
use std::collections::{HashSet, VecDeque};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub const DEFAULT_HISTORY_CAPACITY: usize = 1000;

type Handler = Box<dyn FnMut(&Event) -> TrustResult<()> + Send>;

struct SubEntry {
    id: u64,
    event_type: EventType,
    module_id: ModuleId,
    handler: Arc<Mutex<Handler>>,
}

struct RouterInner {
    subs: Vec<SubEntry>,
    history: VecDeque<Event>,
    capacity: usize,
    queue: VecDeque<Event>,
    dispatching: bool,
    next_sub_id: u64,
    published_total: u64,
}

/// Cheaply cloneable handle; all clones share one bus.
#[derive(Clone)]
pub struct EventRouter {
    inner: Arc<Mutex<RouterInner>>,
}

/// Returned by `subscribe`; consumes itself to deregister the handler.
#[must_use = "dropping the handle without calling unsubscribe() leaves the subscription active"]
pub struct SubscriptionHandle {
    router: EventRouter,
    id: u64,
}

impl SubscriptionHandle {
    pub fn unsubscribe(self) {
        let mut inner = self.router.lock_inner();
        inner.subs.retain(|s| s.id != self.id);
    }
}

/// Optional predicates for `history()`. All set fields must match.
#[derive(Debug, Clone, Default)]
pub struct HistoryFilter {
    pub event_type: Option<EventType>,
    pub source: Option<ModuleId>,
    pub user_id: Option<UserId>,
    /// Keep only the most recent N matches.
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterStats {
    pub subscriptions: usize,
    pub event_types: usize,
    pub history_len: usize,
    pub history_capacity: usize,
    pub published_total: u64,
}

impl Default for EventRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl EventRouter {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(RouterInner {
                subs: Vec::new(),
                history: VecDeque::with_capacity(capacity),
                capacity,
                queue: VecDeque::new(),
                dispatching: false,
                next_sub_id: 0,
                published_total: 0,
            })),
        }
    }

    // A handler panic poisons its own mutex; the bus shrugs that off
    // rather than cascading the failure into every later lock.
    fn lock_inner(&self) -> MutexGuard<'_, RouterInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a handler for one event type. Multiple subscriptions per
    /// type are allowed; delivery follows registration order.
    pub fn subscribe<F>(&self, event_type: EventType, module_id: &str, handler: F) -> SubscriptionHandle
    where
        F: FnMut(&Event) -> TrustResult<()> + Send + 'static,
    {
        let mut inner = self.lock_inner();
        let id = inner.next_sub_id;
        inner.next_sub_id += 1;
        inner.subs.push(SubEntry {
            id,
            event_type,
            module_id: module_id.to_string(),
            handler: Arc::new(Mutex::new(Box::new(handler))),
        });
        log::debug!("subscribe: {module_id} -> {event_type} (sub #{id})");
        SubscriptionHandle {
            router: self.clone(),
            id,
        }
    }

    /// Construct an event, record it in history and deliver it to every
    /// subscriber of its type. Never fails from the publisher's view.
    pub fn publish(
        &self,
        source: &str,
        data: EventPayload,
        user_id: Option<UserId>,
        metadata: Option<serde_json::Value>,
    ) -> Event {
        let event = Event::new(source, data, user_id, metadata);
        {
            let mut inner = self.lock_inner();
            if inner.history.len() == inner.capacity {
                inner.history.pop_front();
            }
            inner.history.push_back(event.clone());
            inner.queue.push_back(event.clone());
            inner.published_total += 1;
            if inner.dispatching {
                // An outer publish() on this stack owns the drain loop.
                return event;
            }
            inner.dispatching = true;
        }
        self.drain();
        event
    }

    fn drain(&self) {
        loop {
            let (next, handlers) = {
                let mut inner = self.lock_inner();
                match inner.queue.pop_front() {
                    Some(ev) => {
                        let handlers: Vec<(ModuleId, Arc<Mutex<Handler>>)> = inner
                            .subs
                            .iter()
                            .filter(|s| s.event_type == ev.event_type)
                            .map(|s| (s.module_id.clone(), Arc::clone(&s.handler)))
                            .collect();
                        (ev, handlers)
                    }
                    None => {
                        inner.dispatching = false;
                        return;
                    }
                }
            };

            // Inner lock released: handlers may publish, query history, or
            // subscribe without deadlocking.
            for (module_id, handler) in handlers {
                let outcome = catch_unwind(AssertUnwindSafe(|| {
                    let mut h = handler.lock().unwrap_or_else(PoisonError::into_inner);
                    h(&next)
                }));
                match outcome {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => {
                        log::warn!(
                            "handler '{module_id}' failed on {}: {err}",
                            next.event_type
                        );
                    }
                    Err(_) => {
                        log::error!("handler '{module_id}' panicked on {}", next.event_type);
                    }
                }
            }
        }
    }

    /// Linear scan over the ring buffer, oldest first; `limit` keeps the
    /// most recent N matches.
    pub fn history(&self, filter: &HistoryFilter) -> Vec<Event> {
        let inner = self.lock_inner();
        let mut matches: Vec<Event> = inner
            .history
            .iter()
            .filter(|ev| {
                filter.event_type.map_or(true, |t| ev.event_type == t)
                    && filter.source.as_ref().map_or(true, |s| &ev.source == s)
                    && filter
                        .user_id
                        .as_ref()
                        .map_or(true, |u| ev.user_id.as_ref() == Some(u))
            })
            .cloned()
            .collect();
        if let Some(limit) = filter.limit {
            let start = matches.len().saturating_sub(limit);
            matches.drain(..start);
        }
        matches
    }

    pub fn stats(&self) -> RouterStats {
        let inner = self.lock_inner();
        let event_types: HashSet<EventType> = inner.subs.iter().map(|s| s.event_type).collect();
        RouterStats {
            subscriptions: inner.subs.len(),
            event_types: event_types.len(),
            history_len: inner.history.len(),
            history_capacity: inner.capacity,
            published_total: inner.published_total,
        }
    }
}
