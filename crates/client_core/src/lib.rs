use std::sync::{Mutex, MutexGuard, PoisonError};

pub mod app;
pub mod behavior;
pub mod components;
pub mod config;
pub mod fetcher;
pub mod links;
pub mod markup;
pub mod pages;
pub mod router;
pub mod routes;
pub mod shell;
pub mod state;

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;

#[cfg(test)]
#[path = "tests/http_tests.rs"]
mod http_tests;

pub use app::PortfolioApp;
pub use behavior::{ActivationGuard, BehaviorRegistry, PageBehavior, PageContext};
pub use config::ClientConfig;
pub use fetcher::{ContactSender, FetchChannel, FetchError, HttpFetcher, ResourceFetcher};
pub use links::{ClickOutcome, LinkInterceptor};
pub use router::{NavigateOptions, NavigationOutcome, Phase, Router};
pub use routes::RouteTable;
pub use shell::{HeadlessShell, NavLink, Region, ShellDocument};
pub use state::{AppSnapshot, AppStatus, StatePatch, StateStore, StoreOptions};

// Guards in this crate are never held across an await point, so a poisoned
// lock only means a listener panicked mid-update; the data is still usable.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
