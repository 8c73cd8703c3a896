#![cfg_attr(target_arch = "wasm32", no_main)]

// Browser entry point for certweb.
//
// JS side:
//   import init, { navigate, current_route_json } from "./certweb-web.js";
//   await init();
//   navigate("/certs?main_field=IT");
//   const route = JSON.parse(current_route_json());

#[cfg(target_arch = "wasm32")]
mod web_entry {
    use std::cell::RefCell;
    use std::sync::Arc;

    use wasm_bindgen::prelude::*;

    use certweb::config::Config;
    use certweb::http::ReqwestTransport;
    use certweb::platform::{self, web, BrowserHistory, BrowserTimer, WindowViewport};
    use certweb::router::{AppShell, RouterStore};
    use certweb::session::SessionManager;

    struct WebApp {
        store: Arc<RouterStore>,
        session: Arc<SessionManager>,
    }

    thread_local! {
        static APP: RefCell<Option<WebApp>> = const { RefCell::new(None) };
    }

    /// Installs the panic hook and console logger, then wires router, shell and
    /// idle watchdog to the page.
    #[wasm_bindgen(start)]
    pub fn wasm_start() {
        platform::install_panic_hook();
        let cfg = Config::default();
        platform::init_logging(cfg.log_level);

        let store = Arc::new(RouterStore::new(Arc::new(BrowserHistory)));
        let shell = Arc::new(AppShell::mount(Arc::clone(&store), Arc::new(WindowViewport)));
        let session = Arc::new(SessionManager::from_config(
            &cfg,
            Arc::new(ReqwestTransport::new()),
            Arc::new(BrowserTimer::new()),
        ));

        web::bind_popstate(shell);
        web::bind_router_links(Arc::clone(&store));
        web::bind_activity(Arc::clone(&session));

        log::info!("[platform] certweb started at {}", store.current_path());
        APP.with(|app| *app.borrow_mut() = Some(WebApp { store, session }));
    }

    /// Programmatic navigation for host-page scripts.
    #[wasm_bindgen]
    pub fn navigate(href: &str) {
        APP.with(|app| {
            if let Some(app) = app.borrow().as_ref() {
                app.store.navigate(href);
            }
        });
    }

    /// Current route as JSON (`null` before start).
    #[wasm_bindgen]
    pub fn current_route_json() -> String {
        APP.with(|app| {
            app.borrow()
                .as_ref()
                .and_then(|app| serde_json::to_string(&*app.store.current()).ok())
                .unwrap_or_else(|| "null".to_string())
        })
    }

    /// Whether a user is signed in (the watchdog is armed while this is true).
    #[wasm_bindgen]
    pub fn is_signed_in() -> bool {
        APP.with(|app| {
            app.borrow()
                .as_ref()
                .is_some_and(|app| app.session.store().is_signed_in())
        })
    }
}

// Native builds: stub main so `cargo build --all-features` still links.
#[cfg(not(target_arch = "wasm32"))]
fn main() {
    eprintln!("certweb-web is only supported on wasm32 (browser) target.");
}
