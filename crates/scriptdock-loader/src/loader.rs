//! Loader orchestrator.
//!
//! Keeps the registry in sync with a [`ScriptSource`]: a reload pass lists the
//! source, compiles and executes every script, registers the results and evicts
//! scripts that disappeared. Watch events schedule a debounced pass; passes are
//! serialized by an async mutex so a manual [`ScriptLoader::reload_scripts`]
//! never overlaps a timer-triggered one.
//!
//! The loader is single-threaded. Background work is spawned with
//! [`tokio::task::spawn_local`], so `start` must run inside a
//! [`tokio::task::LocalSet`].

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::fmt;
use std::rc::{Rc, Weak};

use scriptdock_runtime::{Compiler, ExecutionRuntime, ScriptValue};
use tokio::sync::Mutex;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

use crate::config::LoaderConfig;
use crate::error::{LoaderError, LoaderResult};
use crate::events::LoaderEvents;
use crate::registry::{ScriptMetadata, ScriptRegistry};
use crate::source::{ScriptEntry, ScriptSource, Subscription, WatchEvent, WatchSink};

/// Lifecycle state of a [`ScriptLoader`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoaderState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl fmt::Display for LoaderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
        };
        f.write_str(name)
    }
}

/// Outcome of one reload pass, identifiers in processing order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReloadSummary {
    pub loaded: Vec<String>,
    /// Skipped because their mtime did not change (`skip_unchanged`)
    pub unchanged: Vec<String>,
    pub failed: Vec<String>,
    pub removed: Vec<String>,
}

enum LoadOutcome {
    Loaded,
    Unchanged,
}

/// Derive a script name: strip `prefix` (and the separator after it), then
/// the extension of the last segment.
pub fn derive_name(identifier: &str, prefix: Option<&str>) -> String {
    let trimmed = prefix
        .filter(|p| !p.is_empty())
        .and_then(|p| {
            let rest = identifier.strip_prefix(p)?;
            (p.ends_with('/') || rest.starts_with('/')).then_some(rest)
        })
        .map(|rest| rest.trim_start_matches('/'))
        .filter(|rest| !rest.is_empty())
        .unwrap_or(identifier);

    let segment_start = trimmed.rfind('/').map(|i| i + 1).unwrap_or(0);
    match trimmed[segment_start..].rfind('.') {
        Some(dot) if dot > 0 => trimmed[..segment_start + dot].to_string(),
        _ => trimmed.to_string(),
    }
}

struct LoaderInner {
    config: LoaderConfig,
    source: Rc<dyn ScriptSource>,
    compiler: Rc<Compiler>,
    runtime: RefCell<Box<dyn ExecutionRuntime>>,
    registry: RefCell<ScriptRegistry>,
    events: Rc<dyn LoaderEvents>,
    state: Cell<LoaderState>,
    /// Held for the whole of `start` and `stop`
    lifecycle_lock: Mutex<()>,
    reload_lock: Mutex<()>,
    /// Debounce timer that has not fired yet
    pending: RefCell<Option<JoinHandle<()>>>,
    listener: RefCell<Option<JoinHandle<()>>>,
    subscription: RefCell<Option<Subscription>>,
}

/// Discovers, executes and hot-reloads scripts.
///
/// Cloning is cheap and every clone drives the same loader.
#[derive(Clone)]
pub struct ScriptLoader {
    inner: Rc<LoaderInner>,
}

impl ScriptLoader {
    pub fn new(
        config: LoaderConfig,
        source: Rc<dyn ScriptSource>,
        compiler: Rc<Compiler>,
        runtime: Box<dyn ExecutionRuntime>,
        events: Rc<dyn LoaderEvents>,
    ) -> Self {
        Self {
            inner: Rc::new(LoaderInner {
                config,
                source,
                compiler,
                runtime: RefCell::new(runtime),
                registry: RefCell::new(ScriptRegistry::new()),
                events,
                state: Cell::new(LoaderState::Stopped),
                lifecycle_lock: Mutex::new(()),
                reload_lock: Mutex::new(()),
                pending: RefCell::new(None),
                listener: RefCell::new(None),
                subscription: RefCell::new(None),
            }),
        }
    }

    pub fn state(&self) -> LoaderState {
        self.inner.state.get()
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.inner.config
    }

    pub fn compiler(&self) -> &Rc<Compiler> {
        &self.inner.compiler
    }

    /// Load every script and begin watching. No-op unless stopped.
    pub async fn start(&self) -> LoaderResult<()> {
        let inner = &self.inner;
        let _lifecycle = inner.lifecycle_lock.lock().await;
        if inner.state.get() != LoaderState::Stopped {
            return Ok(());
        }
        inner.state.set(LoaderState::Starting);
        tracing::info!("starting script loader");

        match inner.clone().boot().await {
            Ok(summary) => {
                inner.state.set(LoaderState::Running);
                tracing::info!(
                    loaded = summary.loaded.len(),
                    failed = summary.failed.len(),
                    "script loader running"
                );
                Ok(())
            }
            Err(error) => {
                inner.detach_watch();
                inner.unregister_all();
                inner.state.set(LoaderState::Stopped);
                tracing::error!(error = %error, "script loader failed to start");
                Err(error)
            }
        }
    }

    /// Stop watching and unregister every script. A start in progress
    /// completes first; otherwise a no-op unless running.
    pub async fn stop(&self) {
        let inner = &self.inner;
        let _lifecycle = inner.lifecycle_lock.lock().await;
        if inner.state.get() != LoaderState::Running {
            return;
        }
        inner.state.set(LoaderState::Stopping);
        tracing::info!("stopping script loader");

        inner.detach_watch();

        // Wait for an in-flight pass
        let _guard = inner.reload_lock.lock().await;
        inner.unregister_all();
        if inner.config.dispose_runtime_on_stop {
            inner.runtime.borrow_mut().dispose();
        }

        inner.state.set(LoaderState::Stopped);
        tracing::info!("script loader stopped");
    }

    /// Run a reload pass now.
    pub async fn reload_scripts(&self) -> LoaderResult<ReloadSummary> {
        let inner = &self.inner;
        if inner.state.get() != LoaderState::Running {
            return Err(LoaderError::NotRunning);
        }
        let _guard = inner.reload_lock.lock().await;
        // The loader may have stopped while this call waited
        if inner.state.get() != LoaderState::Running {
            return Err(LoaderError::NotRunning);
        }
        inner.reload_pass().await
    }

    pub fn get(&self, identifier: &str) -> Option<ScriptMetadata> {
        self.inner.registry.borrow().get(identifier).cloned()
    }

    pub fn get_all(&self) -> Vec<ScriptMetadata> {
        self.inner.registry.borrow().get_all().into_iter().cloned().collect()
    }

    pub fn get_by_name(&self, name: &str) -> Vec<ScriptMetadata> {
        self.inner
            .registry
            .borrow()
            .get_by_name(name)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn has(&self, identifier: &str) -> bool {
        self.inner.registry.borrow().has(identifier)
    }

    pub fn count(&self) -> usize {
        self.inner.registry.borrow().count()
    }

    pub fn identifiers(&self) -> Vec<String> {
        self.inner.registry.borrow().identifiers()
    }

    /// Call an export of a registered script
    pub fn invoke(
        &self,
        identifier: &str,
        export_path: &str,
        args: &[ScriptValue],
    ) -> LoaderResult<ScriptValue> {
        let registry = self.inner.registry.borrow();
        let mut runtime = self.inner.runtime.borrow_mut();
        registry.invoke(runtime.as_mut(), identifier, export_path, args)
    }

    /// Read an export of a registered script
    pub fn get_export(&self, identifier: &str, export_path: &str) -> LoaderResult<ScriptValue> {
        let registry = self.inner.registry.borrow();
        let mut runtime = self.inner.runtime.borrow_mut();
        registry.get_export(runtime.as_mut(), identifier, export_path)
    }
}

impl fmt::Debug for ScriptLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptLoader")
            .field("state", &self.inner.state.get())
            .field("scripts", &self.inner.registry.borrow().count())
            .finish()
    }
}

async fn listen(loader: Weak<LoaderInner>, mut rx: UnboundedReceiver<WatchEvent>) {
    while let Some(event) = rx.recv().await {
        let Some(inner) = loader.upgrade() else {
            break;
        };
        tracing::debug!(?event, "script change detected");
        inner.schedule_reload();
    }
}

impl LoaderInner {
    async fn boot(self: Rc<Self>) -> LoaderResult<ReloadSummary> {
        self.source.ensure_directory().await?;
        self.runtime.borrow_mut().initialize()?;

        let summary = {
            let _guard = self.reload_lock.lock().await;
            self.reload_pass().await?
        };

        let (sink, rx) = WatchSink::channel();
        let subscription = self.source.watch(sink)?;
        *self.subscription.borrow_mut() = Some(subscription);
        let listener = tokio::task::spawn_local(listen(Rc::downgrade(&self), rx));
        *self.listener.borrow_mut() = Some(listener);

        Ok(summary)
    }

    /// Cancel the pending timer, stop listening and drop the subscription
    fn detach_watch(&self) {
        if let Some(timer) = self.pending.borrow_mut().take() {
            timer.abort();
        }
        if let Some(listener) = self.listener.borrow_mut().take() {
            listener.abort();
        }
        self.subscription.borrow_mut().take();
    }

    /// Replace the pending timer with a fresh one
    fn schedule_reload(self: &Rc<Self>) {
        let loader = Rc::downgrade(self);
        let debounce = self.config.debounce;
        let timer = tokio::task::spawn_local(async move {
            tokio::time::sleep(debounce).await;
            let Some(inner) = loader.upgrade() else {
                return;
            };
            // Fired: from here on the pass is no longer cancellable
            inner.pending.borrow_mut().take();
            inner.debounced_reload().await;
        });

        if let Some(previous) = self.pending.borrow_mut().replace(timer) {
            previous.abort();
        }
    }

    async fn debounced_reload(&self) {
        let _guard = self.reload_lock.lock().await;
        if self.state.get() != LoaderState::Running {
            return;
        }
        match self.reload_pass().await {
            Ok(summary) => tracing::info!(
                loaded = summary.loaded.len(),
                unchanged = summary.unchanged.len(),
                failed = summary.failed.len(),
                removed = summary.removed.len(),
                "scripts reloaded"
            ),
            Err(error) => tracing::warn!(error = %error, "reload pass failed"),
        }
    }

    /// List, load and evict. Callers hold `reload_lock`.
    async fn reload_pass(&self) -> LoaderResult<ReloadSummary> {
        let entries = self.source.list_files().await?;
        let mut summary = ReloadSummary::default();

        for entry in &entries {
            let identifier = entry.identifier.clone();
            match self.load_script(entry).await {
                Ok(LoadOutcome::Loaded) => summary.loaded.push(identifier),
                Ok(LoadOutcome::Unchanged) => summary.unchanged.push(identifier),
                Err(error) => {
                    tracing::warn!(identifier = %identifier, error = %error, "script failed to load");
                    self.unregister_script(&identifier);
                    self.events.on_script_error(&identifier, &error);
                    summary.failed.push(identifier);
                }
            }
        }

        let listed: HashSet<&str> = entries.iter().map(|e| e.identifier.as_str()).collect();
        let stale: Vec<String> = self
            .registry
            .borrow()
            .identifiers()
            .into_iter()
            .filter(|id| !listed.contains(id.as_str()))
            .collect();
        for identifier in stale {
            self.unregister_script(&identifier);
            summary.removed.push(identifier);
        }

        Ok(summary)
    }

    async fn load_script(&self, entry: &ScriptEntry) -> LoaderResult<LoadOutcome> {
        let identifier = entry.identifier.as_str();
        let file = self.source.read_file(identifier).await?;

        if self.config.skip_unchanged {
            let unchanged = self
                .registry
                .borrow()
                .get(identifier)
                .is_some_and(|m| m.mtime == file.mtime && m.handle.is_some());
            if unchanged {
                tracing::debug!(identifier, "script unchanged, skipping");
                return Ok(LoadOutcome::Unchanged);
            }
        }

        let code = self
            .compiler
            .compile(identifier, &file.contents, file.kind, Some(file.mtime))?;
        let handle = self.runtime.borrow_mut().load(&code, identifier)?;
        let exports = handle.exports.clone();

        let metadata = ScriptMetadata {
            identifier: identifier.to_string(),
            name: derive_name(identifier, self.config.name_prefix.as_deref()),
            mtime: file.mtime,
            compiled_code: code,
            handle: Some(handle),
        };
        self.registry.borrow_mut().register(metadata.clone());
        tracing::debug!(identifier, name = %metadata.name, "script registered");

        self.events.on_script_loaded(&metadata, &exports);
        Ok(LoadOutcome::Loaded)
    }

    /// Unload, invalidate and unregister one script
    fn unregister_script(&self, identifier: &str) {
        let removed = self.registry.borrow_mut().unregister(identifier);
        self.runtime.borrow_mut().unload(identifier);
        self.compiler.invalidate(identifier);

        if let Some(metadata) = removed {
            tracing::debug!(identifier, "script unregistered");
            self.events.on_script_unloaded(&metadata);
        }
    }

    fn unregister_all(&self) {
        let identifiers = self.registry.borrow().identifiers();
        for identifier in identifiers {
            self.unregister_script(&identifier);
        }
    }
}
