//! Reactive bindings over the [`RouterStore`].
//!
//! [`RouterBinding`] is the view-side hook: it mirrors the store's current route,
//! bumps a version counter on every change (the host re-renders when it moves),
//! and unsubscribes itself when dropped. [`AppShell`] is the top-level consumer
//! that also owns popstate translation and the scroll-to-top side effect.

use super::store::{Listener, RouterStore, Subscription};
use super::RouteState;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

pub struct RouterBinding {
    store: Arc<RouterStore>,
    state: Arc<Mutex<Arc<RouteState>>>,
    version: Arc<AtomicU64>,
    subscription: Subscription,
}

impl std::fmt::Debug for RouterBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouterBinding")
            .field("state", &self.state())
            .field("version", &self.version())
            .finish()
    }
}

impl RouterBinding {
    pub fn new(store: Arc<RouterStore>) -> Self {
        Self::with_rerender(store, |_| {})
    }

    /// Like [`RouterBinding::new`], with a callback fired after each mirrored change.
    pub fn with_rerender<F>(store: Arc<RouterStore>, rerender: F) -> Self
    where
        F: Fn(Arc<RouteState>) + Send + Sync + 'static,
    {
        let state = Arc::new(Mutex::new(store.current()));
        let version = Arc::new(AtomicU64::new(0));
        let (s, v) = (Arc::clone(&state), Arc::clone(&version));
        let listener: Listener = Arc::new(move |next: Arc<RouteState>| {
            *s.lock().unwrap_or_else(PoisonError::into_inner) = Arc::clone(&next);
            v.fetch_add(1, Ordering::SeqCst);
            rerender(next);
        });
        let subscription = store.subscribe(listener);
        Self {
            store,
            state,
            version,
            subscription,
        }
    }

    pub fn state(&self) -> Arc<RouteState> {
        Arc::clone(&self.state.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Number of route changes observed since the binding was created.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    pub fn navigate(&self, href: &str) {
        self.store.navigate(href);
    }
}

impl Drop for RouterBinding {
    fn drop(&mut self) {
        self.subscription.unsubscribe();
    }
}

/// Scroll control owned by the top-level view.
pub trait Viewport: Send + Sync {
    fn scroll_to_top(&self);
}

/// Top-level view container.
///
/// Re-renders on every route change, resets scroll to the top, and turns
/// popstate into a store update without a history push.
pub struct AppShell {
    store: Arc<RouterStore>,
    binding: RouterBinding,
    scroll: Subscription,
}

impl std::fmt::Debug for AppShell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppShell")
            .field("binding", &self.binding)
            .finish()
    }
}

impl AppShell {
    pub fn mount(store: Arc<RouterStore>, viewport: Arc<dyn Viewport>) -> Self {
        let binding = RouterBinding::new(Arc::clone(&store));
        let scroll = store.subscribe(Arc::new(move |_: Arc<RouteState>| viewport.scroll_to_top()));
        Self {
            store,
            binding,
            scroll,
        }
    }

    pub fn route(&self) -> Arc<RouteState> {
        self.binding.state()
    }

    pub fn render_version(&self) -> u64 {
        self.binding.version()
    }

    /// Key for the mounted page; a new key remounts the page view.
    pub fn view_key(&self) -> String {
        self.store.current_path()
    }

    /// Back/forward handler.
    pub fn on_popstate(&self) {
        self.store.sync_from_history();
    }
}

impl Drop for AppShell {
    fn drop(&mut self) {
        self.scroll.unsubscribe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::MemoryHistory;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct CountingViewport(AtomicUsize);

    impl Viewport for CountingViewport {
        fn scroll_to_top(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn binding_mirrors_store_and_drops_cleanly() {
        let store = Arc::new(RouterStore::new(Arc::new(MemoryHistory::new("/"))));
        let binding = RouterBinding::new(Arc::clone(&store));
        assert_eq!(*binding.state(), RouteState::Home);

        binding.navigate("/mypage");
        assert_eq!(*binding.state(), RouteState::MyPage);
        assert_eq!(binding.version(), 1);
        assert!(Arc::ptr_eq(&binding.state(), &store.current()));

        drop(binding);
        assert_eq!(store.listener_count(), 0);
    }

    #[test]
    fn shell_scrolls_on_navigate_and_popstate() {
        let history = Arc::new(MemoryHistory::new("/"));
        let store = Arc::new(RouterStore::new(history.clone()));
        let viewport = Arc::new(CountingViewport::default());
        let shell = AppShell::mount(Arc::clone(&store), viewport.clone());

        store.navigate("/certs?sort=name");
        assert_eq!(shell.view_key(), "/certs?sort=name");
        store.navigate("/jobs/11");
        assert_eq!(viewport.0.load(Ordering::SeqCst), 2);

        assert!(history.back());
        shell.on_popstate();
        assert_eq!(shell.route().kind(), crate::router::RouteKind::Certs);
        assert_eq!(viewport.0.load(Ordering::SeqCst), 3);
        // popstate never pushes
        assert_eq!(history.len(), 3);
        assert_eq!(shell.render_version(), 3);

        drop(shell);
        assert_eq!(store.listener_count(), 0);
    }
}
