//! Platform layer: timers, task spawning, logging, and browser adapters.

use cfg_if::cfg_if;

cfg_if! {
    if #[cfg(target_arch = "wasm32")] {
        mod runtime_wasm;
        pub use runtime_wasm::*;

        pub mod web;
        pub use web::{BrowserHistory, BrowserStorage, BrowserTimer, WindowViewport};
    } else {
        mod runtime_native;
        pub use runtime_native::*;
    }
}
