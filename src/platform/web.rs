//! Browser adapters: history, storage, timers, scrolling and DOM event wiring.
//!
//! Every adapter looks up `window` on each call instead of holding `web_sys`
//! handles, which keeps the types `Send + Sync` for the shared traits.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use wasm_bindgen::closure::Closure;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

use crate::router::{AppShell, HistoryAdapter, Link, RouteState, RouterStore, Viewport};
use crate::session::{ActivityEvent, SessionManager, Timer, TimerHandle};
use crate::session::watchdog::TimerCallback;
use crate::storage::{KeyValueStore, StorageError};

/// Attribute marking anchors the router should intercept.
pub const ROUTER_LINK_ATTR: &str = "data-router-link";

#[derive(Debug, Default, Clone, Copy)]
pub struct BrowserHistory;

impl HistoryAdapter for BrowserHistory {
    fn push_state(&self, state: &RouteState, path: &str) {
        let Some(history) = web_sys::window().and_then(|w| w.history().ok()) else {
            log::warn!("[router] history unavailable, not pushing {path}");
            return;
        };
        let data = serde_json::to_string(state)
            .map(|s| JsValue::from_str(&s))
            .unwrap_or(JsValue::NULL);
        if let Err(e) = history.push_state_with_url(&data, "", Some(path)) {
            log::warn!("[router] pushState failed for {path}: {e:?}");
        }
    }

    fn location(&self) -> (String, String) {
        let Some(location) = web_sys::window().map(|w| w.location()) else {
            return ("/".to_string(), String::new());
        };
        (
            location.pathname().unwrap_or_else(|_| "/".to_string()),
            location.search().unwrap_or_default(),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Local,
    Session,
}

/// `localStorage` / `sessionStorage`.
#[derive(Debug, Clone, Copy)]
pub struct BrowserStorage {
    kind: StorageKind,
}

impl BrowserStorage {
    pub fn local() -> Self {
        Self {
            kind: StorageKind::Local,
        }
    }

    pub fn session() -> Self {
        Self {
            kind: StorageKind::Session,
        }
    }

    fn storage(&self) -> Result<web_sys::Storage, StorageError> {
        let window =
            web_sys::window().ok_or_else(|| StorageError::Unavailable("no window".into()))?;
        let storage = match self.kind {
            StorageKind::Local => window.local_storage(),
            StorageKind::Session => window.session_storage(),
        };
        storage
            .map_err(|e| StorageError::Unavailable(format!("{e:?}")))?
            .ok_or_else(|| StorageError::Unavailable(format!("{:?} storage disabled", self.kind)))
    }
}

impl KeyValueStore for BrowserStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.storage().ok()?.get_item(key).ok().flatten()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.storage()?
            .set_item(key, value)
            .map_err(|e| StorageError::Write {
                key: key.to_string(),
                reason: format!("{e:?}"),
            })
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.storage()?
            .remove_item(key)
            .map_err(|e| StorageError::Write {
                key: key.to_string(),
                reason: format!("{e:?}"),
            })
    }
}

/// `setTimeout`-backed one-shot timers.
#[derive(Debug, Default)]
pub struct BrowserTimer {
    next_id: AtomicU64,
    live: Arc<Mutex<HashMap<u64, i32>>>,
}

impl BrowserTimer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Timer for BrowserTimer {
    fn schedule(&self, delay: Duration, callback: TimerCallback) -> TimerHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let Some(window) = web_sys::window() else {
            log::warn!("[watchdog] no window, timer {id} not scheduled");
            return TimerHandle::new(id);
        };
        let live = Arc::clone(&self.live);
        let fire = Closure::once_into_js(move || {
            live.lock().unwrap_or_else(PoisonError::into_inner).remove(&id);
            callback();
        });
        let millis = delay.as_millis().min(i32::MAX as u128) as i32;
        match window
            .set_timeout_with_callback_and_timeout_and_arguments_0(fire.unchecked_ref(), millis)
        {
            Ok(js_id) => {
                self.live
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(id, js_id);
            }
            Err(e) => log::warn!("[watchdog] setTimeout failed: {e:?}"),
        }
        TimerHandle::new(id)
    }

    fn cancel(&self, handle: TimerHandle) {
        let js_id = self
            .live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&handle.id());
        if let (Some(js_id), Some(window)) = (js_id, web_sys::window()) {
            window.clear_timeout_with_handle(js_id);
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct WindowViewport;

impl Viewport for WindowViewport {
    fn scroll_to_top(&self) {
        if let Some(window) = web_sys::window() {
            window.scroll_to_with_x_and_y(0.0, 0.0);
        }
    }
}

fn listen(target: &web_sys::EventTarget, event: &str, handler: impl FnMut(web_sys::Event) + 'static) {
    let closure = Closure::<dyn FnMut(web_sys::Event)>::new(handler);
    if let Err(e) = target.add_event_listener_with_callback(event, closure.as_ref().unchecked_ref()) {
        log::warn!("[platform] addEventListener({event}) failed: {e:?}");
    }
    // Listeners live as long as the page.
    closure.forget();
}

/// Back/forward buttons re-parse the location without pushing.
pub fn bind_popstate(shell: Arc<AppShell>) {
    let Some(window) = web_sys::window() else {
        return;
    };
    listen(&window, "popstate", move |_| shell.on_popstate());
}

/// Delegated click handling for `<a data-router-link href=...>` anchors.
pub fn bind_router_links(store: Arc<RouterStore>) {
    let Some(document) = web_sys::window().and_then(|w| w.document()) else {
        return;
    };
    let selector = format!("a[{ROUTER_LINK_ATTR}]");
    listen(&document, "click", move |ev| {
        let Some(anchor) = ev
            .target()
            .and_then(|t| t.dyn_into::<web_sys::Element>().ok())
            .and_then(|el| el.closest(&selector).ok().flatten())
        else {
            return;
        };
        let Some(href) = anchor.get_attribute("href") else {
            return;
        };
        if let Some(mouse) = ev.dyn_ref::<web_sys::MouseEvent>() {
            Link::new(href).handle_dom_click(&store, mouse);
        }
    });
}

/// Feeds user activity into the idle watchdog.
pub fn bind_activity(manager: Arc<SessionManager>) {
    let Some(window) = web_sys::window() else {
        return;
    };
    for event in ActivityEvent::ALL {
        let manager = Arc::clone(&manager);
        listen(&window, event.dom_event(), move |_| manager.activity(event));
    }
}
