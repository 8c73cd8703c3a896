//! In-app link primitive.
//!
//! A [`Link`] renders as a plain anchor carrying its destination as `href`, so
//! middle-click, ctrl/cmd-click and "open in new tab" keep their native behaviour.
//! Only an unmodified primary-button click is routed through the [`RouterStore`].

use super::RouterStore;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MouseButton {
    Primary,
    Auxiliary,
    Secondary,
    Other(i16),
}

impl From<i16> for MouseButton {
    /// Maps the DOM `MouseEvent.button` code.
    fn from(code: i16) -> Self {
        match code {
            0 => MouseButton::Primary,
            1 => MouseButton::Auxiliary,
            2 => MouseButton::Secondary,
            other => MouseButton::Other(other),
        }
    }
}

/// The parts of a click the link cares about.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClickEvent {
    pub button: MouseButton,
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
    pub meta: bool,
}

impl ClickEvent {
    /// Plain primary-button click.
    pub fn primary() -> Self {
        Self {
            button: MouseButton::Primary,
            ctrl: false,
            shift: false,
            alt: false,
            meta: false,
        }
    }

    pub fn with_ctrl(mut self) -> Self {
        self.ctrl = true;
        self
    }

    pub fn with_shift(mut self) -> Self {
        self.shift = true;
        self
    }

    pub fn with_alt(mut self) -> Self {
        self.alt = true;
        self
    }

    pub fn with_meta(mut self) -> Self {
        self.meta = true;
        self
    }

    pub fn has_modifier(&self) -> bool {
        self.ctrl || self.shift || self.alt || self.meta
    }
}

#[cfg(target_arch = "wasm32")]
impl From<&web_sys::MouseEvent> for ClickEvent {
    fn from(ev: &web_sys::MouseEvent) -> Self {
        Self {
            button: MouseButton::from(ev.button()),
            ctrl: ev.ctrl_key(),
            shift: ev.shift_key(),
            alt: ev.alt_key(),
            meta: ev.meta_key(),
        }
    }
}

/// What the host should do with the click.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClickOutcome {
    /// Navigation handled in-app; the host must suppress the default action.
    Intercepted,
    /// Leave the click to the browser.
    Default,
}

pub struct Link {
    to: String,
    class: Option<String>,
    on_click: Option<Arc<dyn Fn() + Send + Sync>>,
}

impl std::fmt::Debug for Link {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Link")
            .field("to", &self.to)
            .field("class", &self.class)
            .field("has_on_click", &self.on_click.is_some())
            .finish()
    }
}

impl Link {
    pub fn new(to: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            class: None,
            on_click: None,
        }
    }

    pub fn class(mut self, class: impl Into<String>) -> Self {
        self.class = Some(class.into());
        self
    }

    /// Callback run after an intercepted navigation (e.g. closing a menu).
    pub fn on_click<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_click = Some(Arc::new(f));
        self
    }

    /// The `href` attribute value.
    pub fn href(&self) -> &str {
        &self.to
    }

    pub fn class_name(&self) -> Option<&str> {
        self.class.as_deref()
    }

    /// Routes an unmodified primary click through the store; anything else is left alone.
    pub fn handle_click(&self, store: &RouterStore, ev: &ClickEvent) -> ClickOutcome {
        if ev.button != MouseButton::Primary || ev.has_modifier() {
            return ClickOutcome::Default;
        }
        store.navigate(&self.to);
        if let Some(cb) = &self.on_click {
            cb();
        }
        ClickOutcome::Intercepted
    }

    /// DOM glue: converts the event, and calls `preventDefault` when intercepted.
    #[cfg(target_arch = "wasm32")]
    pub fn handle_dom_click(&self, store: &RouterStore, ev: &web_sys::MouseEvent) {
        if self.handle_click(store, &ClickEvent::from(ev)) == ClickOutcome::Intercepted {
            ev.prevent_default();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::{MemoryHistory, RouteState};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn store() -> (Arc<MemoryHistory>, RouterStore) {
        let history = Arc::new(MemoryHistory::new("/"));
        (history.clone(), RouterStore::new(history))
    }

    #[test]
    fn primary_click_navigates_then_calls_back() {
        let (history, store) = store();
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        let link = Link::new("/certs/5").on_click(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });

        let outcome = link.handle_click(&store, &ClickEvent::primary());
        assert_eq!(outcome, ClickOutcome::Intercepted);
        assert_eq!(
            *store.current(),
            RouteState::CertDetail {
                qual_id: "5".into()
            }
        );
        assert_eq!(history.current_href(), "/certs/5");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn modified_or_non_primary_clicks_fall_through() {
        let (history, store) = store();
        let link = Link::new("/jobs").class("nav");
        let events = [
            ClickEvent::primary().with_ctrl(),
            ClickEvent::primary().with_shift(),
            ClickEvent::primary().with_alt(),
            ClickEvent::primary().with_meta(),
            ClickEvent {
                button: MouseButton::Auxiliary,
                ..ClickEvent::primary()
            },
            ClickEvent {
                button: MouseButton::from(2),
                ..ClickEvent::primary()
            },
        ];
        for ev in events {
            assert_eq!(link.handle_click(&store, &ev), ClickOutcome::Default);
        }
        assert_eq!(*store.current(), RouteState::Home);
        assert_eq!(history.len(), 1);
        assert_eq!(link.href(), "/jobs");
        assert_eq!(link.class_name(), Some("nav"));
    }
}
