use std::{
    fs,
    panic::{catch_unwind, AssertUnwindSafe},
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, Weak,
    },
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use shared::domain::{PageKey, Theme};
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::lock;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSnapshot {
    pub route: PageKey,
    pub loading: bool,
    pub ready: bool,
    pub error: Option<String>,
    pub theme: Theme,
    pub mobile_menu_open: bool,
}

impl Default for AppSnapshot {
    fn default() -> Self {
        Self {
            route: PageKey::DEFAULT,
            loading: false,
            ready: false,
            error: None,
            theme: Theme::default(),
            mobile_menu_open: false,
        }
    }
}

/// Document-level status derived from a snapshot. An error outranks
/// loading, which outranks ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppStatus {
    Idle,
    Loading,
    Ready,
    Error,
}

impl AppStatus {
    pub fn css_class(self) -> Option<&'static str> {
        match self {
            AppStatus::Idle => None,
            AppStatus::Loading => Some("app-loading"),
            AppStatus::Ready => Some("app-ready"),
            AppStatus::Error => Some("app-error"),
        }
    }
}

impl AppSnapshot {
    pub fn status(&self) -> AppStatus {
        if self.error.is_some() {
            AppStatus::Error
        } else if self.loading {
            AppStatus::Loading
        } else if self.ready {
            AppStatus::Ready
        } else {
            AppStatus::Idle
        }
    }

    pub fn get(&self, key: StateKey) -> StateValue {
        match key {
            StateKey::Route => StateValue::Route(self.route),
            StateKey::Loading => StateValue::Flag(self.loading),
            StateKey::Ready => StateValue::Flag(self.ready),
            StateKey::Error => StateValue::Error(self.error.clone()),
            StateKey::Theme => StateValue::Theme(self.theme),
            StateKey::MobileMenuOpen => StateValue::Flag(self.mobile_menu_open),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateKey {
    Route,
    Loading,
    Ready,
    Error,
    Theme,
    MobileMenuOpen,
}

impl StateKey {
    pub fn field_name(self) -> &'static str {
        match self {
            StateKey::Route => "route",
            StateKey::Loading => "loading",
            StateKey::Ready => "ready",
            StateKey::Error => "error",
            StateKey::Theme => "theme",
            StateKey::MobileMenuOpen => "mobile_menu_open",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateValue {
    Route(PageKey),
    Flag(bool),
    Error(Option<String>),
    Theme(Theme),
}

/// Shallow patch: `None` leaves a field untouched. For `error`,
/// `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatePatch {
    pub route: Option<PageKey>,
    pub loading: Option<bool>,
    pub ready: Option<bool>,
    pub error: Option<Option<String>>,
    pub theme: Option<Theme>,
    pub mobile_menu_open: Option<bool>,
}

impl StatePatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, route: PageKey) -> Self {
        self.route = Some(route);
        self
    }

    pub fn loading(mut self, loading: bool) -> Self {
        self.loading = Some(loading);
        self
    }

    pub fn ready(mut self, ready: bool) -> Self {
        self.ready = Some(ready);
        self
    }

    pub fn error(mut self, error: Option<String>) -> Self {
        self.error = Some(error);
        self
    }

    pub fn theme(mut self, theme: Theme) -> Self {
        self.theme = Some(theme);
        self
    }

    pub fn mobile_menu_open(mut self, open: bool) -> Self {
        self.mobile_menu_open = Some(open);
        self
    }

    /// Applies the patch, returning whether any field actually changed.
    fn apply_to(&self, state: &mut AppSnapshot) -> bool {
        let mut changed = false;
        changed |= assign(&mut state.route, &self.route);
        changed |= assign(&mut state.loading, &self.loading);
        changed |= assign(&mut state.ready, &self.ready);
        changed |= assign(&mut state.error, &self.error);
        changed |= assign(&mut state.theme, &self.theme);
        changed |= assign(&mut state.mobile_menu_open, &self.mobile_menu_open);
        changed
    }
}

fn assign<T: PartialEq + Clone>(slot: &mut T, value: &Option<T>) -> bool {
    match value {
        Some(value) if slot != value => {
            *slot = value.clone();
            true
        }
        _ => false,
    }
}

pub type Listener = dyn Fn(&AppSnapshot, Option<&AppSnapshot>) + Send + Sync;

#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub initial: AppSnapshot,
    pub persist_keys: Vec<StateKey>,
    pub state_file: Option<PathBuf>,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            initial: AppSnapshot::default(),
            persist_keys: vec![StateKey::Theme],
            state_file: None,
        }
    }
}

struct StoreInner {
    state: Mutex<AppSnapshot>,
    listeners: Mutex<Vec<(u64, Arc<Listener>)>>,
    next_listener_id: AtomicU64,
    watch: watch::Sender<AppSnapshot>,
    persist_keys: Vec<StateKey>,
    state_file: Option<PathBuf>,
}

/// Observable application state shared by the router and UI surfaces.
/// Cloning yields another handle to the same store.
#[derive(Clone)]
pub struct StateStore {
    inner: Arc<StoreInner>,
}

#[must_use = "dropping a Subscription keeps the listener registered; call unsubscribe to remove it"]
pub struct Subscription {
    store: Weak<StoreInner>,
    id: u64,
}

impl Subscription {
    pub fn unsubscribe(self) {
        if let Some(store) = self.store.upgrade() {
            lock(&store.listeners).retain(|(id, _)| *id != self.id);
        }
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new(StoreOptions::default())
    }
}

impl StateStore {
    pub fn new(options: StoreOptions) -> Self {
        let mut initial = options.initial;
        if let Some(path) = &options.state_file {
            match load_persisted(path, &initial, &options.persist_keys) {
                Ok(restored) => initial = restored,
                Err(err) => debug!(path = %path.display(), error = %err, "no persisted state restored"),
            }
        }

        let (watch, _) = watch::channel(initial.clone());
        Self {
            inner: Arc::new(StoreInner {
                state: Mutex::new(initial),
                listeners: Mutex::new(Vec::new()),
                next_listener_id: AtomicU64::new(1),
                watch,
                persist_keys: options.persist_keys,
                state_file: options.state_file,
            }),
        }
    }

    pub fn snapshot(&self) -> AppSnapshot {
        lock(&self.inner.state).clone()
    }

    pub fn get(&self, key: StateKey) -> StateValue {
        lock(&self.inner.state).get(key)
    }

    /// Merges `patch` into the state. Returns `false` without notifying
    /// anyone when no patched value differs from the current one.
    pub fn set(&self, patch: StatePatch) -> bool {
        let (next, previous) = {
            let mut state = lock(&self.inner.state);
            let previous = state.clone();
            if !patch.apply_to(&mut state) {
                return false;
            }
            (state.clone(), previous)
        };

        self.persist(&next);
        self.inner.watch.send_replace(next.clone());
        self.emit(&next, &previous);
        true
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&AppSnapshot, Option<&AppSnapshot>) + Send + Sync + 'static,
    {
        let id = self.inner.next_listener_id.fetch_add(1, Ordering::Relaxed);
        let listener: Arc<Listener> = Arc::new(listener);
        lock(&self.inner.listeners).push((id, Arc::clone(&listener)));

        let current = self.snapshot();
        invoke(&listener, &current, None);

        Subscription {
            store: Arc::downgrade(&self.inner),
            id,
        }
    }

    pub fn watch(&self) -> watch::Receiver<AppSnapshot> {
        self.inner.watch.subscribe()
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.inner.listeners).len()
    }

    fn emit(&self, next: &AppSnapshot, previous: &AppSnapshot) {
        // Snapshot the list so listeners may (un)subscribe while being notified.
        let listeners: Vec<Arc<Listener>> = lock(&self.inner.listeners)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            invoke(&listener, next, Some(previous));
        }
    }

    fn persist(&self, state: &AppSnapshot) {
        let Some(path) = &self.inner.state_file else {
            return;
        };
        if self.inner.persist_keys.is_empty() {
            return;
        }
        if let Err(err) = write_persisted(path, state, &self.inner.persist_keys) {
            debug!(path = %path.display(), error = %err, "ignoring state persistence failure");
        }
    }
}

fn invoke(listener: &Arc<Listener>, next: &AppSnapshot, previous: Option<&AppSnapshot>) {
    if catch_unwind(AssertUnwindSafe(|| listener(next, previous))).is_err() {
        warn!("state subscriber panicked; continuing with remaining subscribers");
    }
}

fn write_persisted(path: &Path, state: &AppSnapshot, keys: &[StateKey]) -> Result<()> {
    let Value::Object(all) = serde_json::to_value(state)? else {
        return Ok(());
    };
    let subset: Map<String, Value> = keys
        .iter()
        .filter_map(|key| {
            all.get(key.field_name())
                .map(|value| (key.field_name().to_string(), value.clone()))
        })
        .collect();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_vec_pretty(&Value::Object(subset))?)
        .with_context(|| format!("failed to write state file '{}'", path.display()))?;
    Ok(())
}

fn load_persisted(path: &Path, initial: &AppSnapshot, keys: &[StateKey]) -> Result<AppSnapshot> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read state file '{}'", path.display()))?;
    let Value::Object(persisted) = serde_json::from_str::<Value>(&raw)? else {
        return Ok(initial.clone());
    };
    let Value::Object(mut merged) = serde_json::to_value(initial)? else {
        return Ok(initial.clone());
    };
    for key in keys {
        if let Some(value) = persisted.get(key.field_name()) {
            merged.insert(key.field_name().to_string(), value.clone());
        }
    }
    // A malformed persisted value falls back to the initial state.
    Ok(serde_json::from_value(Value::Object(merged)).unwrap_or_else(|_| initial.clone()))
}

#[cfg(test)]
#[path = "tests/state_tests.rs"]
mod tests;
