//! Router store: single source of truth for the current route.
//!
//! One store is created at application start and shared by `Arc` with the
//! binding, links and the top-level shell. Every mutation goes through
//! [`RouterStore::navigate`] (push) or [`RouterStore::sync_from_history`] (popstate).

use parking_lot::ReentrantMutex;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{parse, split_href, RouteState};

/// Route-change callback. Receives the new state by shared pointer.
pub type Listener = Arc<dyn Fn(Arc<RouteState>) + Send + Sync>;

/// Browser history boundary.
pub trait HistoryAdapter: Send + Sync {
    /// Append a new entry (`history.pushState(state, '', path)`).
    fn push_state(&self, state: &RouteState, path: &str);

    /// Current `(pathname, search)`; `search` may carry a leading `?`.
    fn location(&self) -> (String, String);
}

#[inline]
fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Registered {
    id: u64,
    listener: Listener,
}

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: Vec<Registered>,
}

pub struct RouterStore {
    /// Held for a whole navigation. Re-entrant so a listener may navigate.
    turn: ReentrantMutex<()>,
    current: Mutex<Arc<RouteState>>,
    listeners: Arc<Mutex<Listeners>>,
    history: Arc<dyn HistoryAdapter>,
}

impl std::fmt::Debug for RouterStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouterStore")
            .field("current", &*lock(&self.current))
            .field("listeners", &lock(&self.listeners).entries.len())
            .finish()
    }
}

impl RouterStore {
    /// Creates a store whose initial state is parsed from the history's current location.
    pub fn new(history: Arc<dyn HistoryAdapter>) -> Self {
        let (path, query) = history.location();
        Self {
            turn: ReentrantMutex::new(()),
            current: Mutex::new(Arc::new(parse(&path, &query))),
            listeners: Arc::new(Mutex::new(Listeners::default())),
            history,
        }
    }

    pub fn current(&self) -> Arc<RouteState> {
        Arc::clone(&lock(&self.current))
    }

    /// `pathname + search` as the history currently reports it.
    pub fn current_path(&self) -> String {
        let (path, query) = self.history.location();
        match query.trim_start_matches('?') {
            "" => path,
            q => format!("{path}?{q}"),
        }
    }

    /// Parse, replace state, notify every listener, then push a history entry.
    ///
    /// Notification is synchronous and happens exactly once per call, before returning.
    /// Calls from different threads are serialized; each completes before the next starts.
    pub fn navigate(&self, href: &str) {
        let _turn = self.turn.lock();
        let (path, query) = split_href(href);
        let next = Arc::new(parse(path, query));
        log::debug!("[router] navigate {} -> {}", href, next.kind());
        self.replace_and_notify(Arc::clone(&next));
        self.history.push_state(&next, href);
    }

    /// Popstate handling: re-parse the current location and notify, without pushing.
    pub fn sync_from_history(&self) -> Arc<RouteState> {
        let _turn = self.turn.lock();
        let (path, query) = self.history.location();
        let next = Arc::new(parse(&path, &query));
        log::debug!("[router] popstate {} -> {}", path, next.kind());
        self.replace_and_notify(Arc::clone(&next));
        next
    }

    /// Registers a listener. Registering the same `Arc` twice is a no-op.
    pub fn subscribe(&self, listener: Listener) -> Subscription {
        let mut guard = lock(&self.listeners);
        if let Some(existing) = guard
            .entries
            .iter()
            .find(|r| Arc::ptr_eq(&r.listener, &listener))
        {
            return Subscription {
                id: existing.id,
                listeners: Arc::downgrade(&self.listeners),
            };
        }
        let id = guard.next_id;
        guard.next_id += 1;
        guard.entries.push(Registered { id, listener });
        Subscription {
            id,
            listeners: Arc::downgrade(&self.listeners),
        }
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.listeners).entries.len()
    }

    fn replace_and_notify(&self, next: Arc<RouteState>) {
        *lock(&self.current) = Arc::clone(&next);
        // Snapshot so listeners may subscribe, unsubscribe or navigate re-entrantly.
        let snapshot: Vec<Listener> = lock(&self.listeners)
            .entries
            .iter()
            .map(|r| Arc::clone(&r.listener))
            .collect();
        for listener in snapshot {
            listener(Arc::clone(&next));
        }
    }
}

/// Handle returned by [`RouterStore::subscribe`].
///
/// Dropping the handle does not unsubscribe; call [`Subscription::unsubscribe`].
#[derive(Debug, Clone)]
pub struct Subscription {
    id: u64,
    listeners: std::sync::Weak<Mutex<Listeners>>,
}

impl Subscription {
    /// Removes the listener. Safe to call any number of times.
    pub fn unsubscribe(&self) {
        if let Some(listeners) = self.listeners.upgrade() {
            lock(&listeners).entries.retain(|r| r.id != self.id);
        }
    }
}

/// In-memory history with back/forward, for native hosts and tests.
#[derive(Debug)]
pub struct MemoryHistory {
    inner: Mutex<MemoryHistoryInner>,
}

#[derive(Debug)]
struct MemoryHistoryInner {
    entries: Vec<(String, Option<RouteState>)>,
    index: usize,
}

impl MemoryHistory {
    pub fn new(initial_href: &str) -> Self {
        Self {
            inner: Mutex::new(MemoryHistoryInner {
                entries: vec![(initial_href.to_string(), None)],
                index: 0,
            }),
        }
    }

    /// Number of entries, including the initial one.
    pub fn len(&self) -> usize {
        lock(&self.inner).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn current_href(&self) -> String {
        let inner = lock(&self.inner);
        inner
            .entries
            .get(inner.index)
            .map(|(href, _)| href.clone())
            .unwrap_or_default()
    }

    /// State object stored with the current entry (None for the initial entry).
    pub fn current_state(&self) -> Option<RouteState> {
        let inner = lock(&self.inner);
        inner.entries.get(inner.index).and_then(|(_, s)| s.clone())
    }

    /// Moves one entry back. Returns false at the start of the stack.
    pub fn back(&self) -> bool {
        let mut inner = lock(&self.inner);
        if inner.index == 0 {
            return false;
        }
        inner.index -= 1;
        true
    }

    /// Moves one entry forward. Returns false at the end of the stack.
    pub fn forward(&self) -> bool {
        let mut inner = lock(&self.inner);
        if inner.index + 1 >= inner.entries.len() {
            return false;
        }
        inner.index += 1;
        true
    }
}

impl HistoryAdapter for MemoryHistory {
    fn push_state(&self, state: &RouteState, path: &str) {
        let mut inner = lock(&self.inner);
        let keep = inner.index + 1;
        inner.entries.truncate(keep);
        inner.entries.push((path.to_string(), Some(state.clone())));
        inner.index = inner.entries.len() - 1;
    }

    fn location(&self) -> (String, String) {
        let href = self.current_href();
        let (path, query) = split_href(&href);
        (path.to_string(), query.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn store_at(href: &str) -> (Arc<MemoryHistory>, RouterStore) {
        let history = Arc::new(MemoryHistory::new(href));
        let store = RouterStore::new(history.clone());
        (history, store)
    }

    #[test]
    fn initial_state_comes_from_location() {
        let (_, store) = store_at("/jobs/3");
        assert_eq!(
            *store.current(),
            RouteState::JobDetail {
                job_id: "3".into()
            }
        );
    }

    #[test]
    fn navigate_pushes_after_notify() {
        let (history, store) = store_at("/");
        let seen_len = Arc::new(AtomicUsize::new(0));
        let h = history.clone();
        let seen = seen_len.clone();
        store.subscribe(Arc::new(move |_: Arc<RouteState>| {
            seen.store(h.len(), Ordering::SeqCst);
        }));

        store.navigate("/jobs");
        // Listener ran before the push: history still had only the initial entry.
        assert_eq!(seen_len.load(Ordering::SeqCst), 1);
        assert_eq!(history.len(), 2);
        assert_eq!(history.current_href(), "/jobs");
        assert_eq!(history.current_state(), Some(RouteState::Jobs));
    }

    #[test]
    fn duplicate_listener_registered_once() {
        let (_, store) = store_at("/");
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let listener: Listener = Arc::new(move |_: Arc<RouteState>| {
            h.fetch_add(1, Ordering::SeqCst);
        });
        let a = store.subscribe(listener.clone());
        let _b = store.subscribe(listener);
        assert_eq!(store.listener_count(), 1);
        store.navigate("/terms");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        a.unsubscribe();
        a.unsubscribe();
        assert_eq!(store.listener_count(), 0);
    }

    #[test]
    fn listener_may_navigate_reentrantly() {
        let history = Arc::new(MemoryHistory::new("/"));
        let store = Arc::new(RouterStore::new(history.clone()));
        let weak = Arc::downgrade(&store);
        store.subscribe(Arc::new(move |state: Arc<RouteState>| {
            if *state == RouteState::Recommendations {
                if let Some(store) = weak.upgrade() {
                    store.navigate("/ai-recommendations");
                }
            }
        }));
        store.navigate("/recommendation");
        assert_eq!(*store.current(), RouteState::AiRecommendations);
    }

    #[test]
    fn concurrent_navigations_do_not_interleave() {
        let history = Arc::new(MemoryHistory::new("/"));
        let store = Arc::new(RouterStore::new(history.clone()));
        let stale = Arc::new(AtomicUsize::new(0));
        let weak = Arc::downgrade(&store);
        let st = stale.clone();
        store.subscribe(Arc::new(move |next: Arc<RouteState>| {
            if let Some(store) = weak.upgrade() {
                if !Arc::ptr_eq(&store.current(), &next) {
                    st.fetch_add(1, Ordering::SeqCst);
                }
            }
        }));

        std::thread::scope(|s| {
            s.spawn(|| (0..200).for_each(|i| store.navigate(&format!("/jobs/{i}"))));
            s.spawn(|| (0..200).for_each(|i| store.navigate(&format!("/certs/{i}"))));
        });

        assert_eq!(stale.load(Ordering::SeqCst), 0);
        assert_eq!(history.len(), 401);
        assert_eq!(history.current_state().as_ref(), Some(&*store.current()));
    }

    #[test]
    fn memory_history_truncates_forward_entries() {
        let history = MemoryHistory::new("/");
        history.push_state(&RouteState::Jobs, "/jobs");
        history.push_state(&RouteState::Terms, "/terms");
        assert!(history.back());
        history.push_state(&RouteState::Privacy, "/privacy");
        assert_eq!(history.len(), 3);
        assert!(!history.forward());
        assert_eq!(history.location(), ("/privacy".to_string(), String::new()));
    }
}
