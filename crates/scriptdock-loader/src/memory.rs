//! In-memory script source.
//!
//! Files live in a map; every write bumps a logical clock used as the mtime.
//! Writes are reported to active watchers immediately. The same map also backs
//! `require()` through the [`ModuleResolver`] implementation.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use async_trait::async_trait;
use scriptdock_runtime::resolver::{candidates, resolve_relative};
use scriptdock_runtime::{
    DEFAULT_EXTENSIONS, LoaderKind, ModuleResolver, ModuleSource, RuntimeError, RuntimeResult,
};

use crate::error::{LoaderError, LoaderResult};
use crate::source::{ScriptEntry, ScriptFile, ScriptSource, Subscription, WatchEvent, WatchSink};

#[derive(Debug, Clone)]
struct MemoryFile {
    contents: String,
    mtime: u64,
}

type Sinks = Rc<RefCell<Vec<(u64, WatchSink)>>>;

/// Removes its sink when the subscription is dropped
struct SinkGuard {
    id: u64,
    sinks: Sinks,
}

impl Drop for SinkGuard {
    fn drop(&mut self) {
        self.sinks.borrow_mut().retain(|(id, _)| *id != self.id);
    }
}

#[derive(Debug, Default)]
pub struct MemoryScriptSource {
    files: RefCell<BTreeMap<String, MemoryFile>>,
    sinks: Sinks,
    clock: Cell<u64>,
    next_sink: Cell<u64>,
}

impl MemoryScriptSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn tick(&self) -> u64 {
        let now = self.clock.get() + 1;
        self.clock.set(now);
        now
    }

    fn emit(&self, event: WatchEvent) {
        let sinks: Vec<WatchSink> = self.sinks.borrow().iter().map(|(_, s)| s.clone()).collect();
        for sink in sinks {
            sink.send(event.clone());
        }
    }

    /// Write a file with a fresh mtime
    pub fn insert(&self, identifier: impl Into<String>, contents: impl Into<String>) {
        let mtime = self.tick();
        self.insert_with_mtime(identifier, contents, mtime);
    }

    /// Write a file with an explicit mtime
    pub fn insert_with_mtime(
        &self,
        identifier: impl Into<String>,
        contents: impl Into<String>,
        mtime: u64,
    ) {
        let identifier = identifier.into();
        let previous = self.files.borrow_mut().insert(
            identifier.clone(),
            MemoryFile {
                contents: contents.into(),
                mtime,
            },
        );
        self.emit(match previous {
            Some(_) => WatchEvent::Modified(identifier),
            None => WatchEvent::Created(identifier),
        });
    }

    pub fn remove(&self, identifier: &str) -> bool {
        let removed = self.files.borrow_mut().remove(identifier).is_some();
        if removed {
            self.emit(WatchEvent::Deleted(identifier.to_string()));
        }
        removed
    }

    pub fn rename(&self, from: &str, to: impl Into<String>) -> bool {
        let to = to.into();
        let Some(file) = self.files.borrow_mut().remove(from) else {
            return false;
        };
        self.files.borrow_mut().insert(to.clone(), file);
        self.emit(WatchEvent::Renamed {
            from: from.to_string(),
            to,
        });
        true
    }

    /// Number of live watch subscriptions
    pub fn watcher_count(&self) -> usize {
        self.sinks.borrow().len()
    }
}

#[async_trait(?Send)]
impl ScriptSource for MemoryScriptSource {
    async fn read_file(&self, identifier: &str) -> LoaderResult<ScriptFile> {
        let files = self.files.borrow();
        let file = files
            .get(identifier)
            .ok_or_else(|| LoaderError::source(format!("no such script: {identifier}")))?;
        Ok(ScriptFile {
            contents: file.contents.clone(),
            mtime: file.mtime,
            kind: LoaderKind::from_path(identifier),
        })
    }

    async fn list_files(&self) -> LoaderResult<Vec<ScriptEntry>> {
        Ok(self
            .files
            .borrow()
            .keys()
            .filter(|id| LoaderKind::from_extension(id.rsplit_once('.').map(|(_, ext)| ext)).is_some())
            .map(ScriptEntry::new)
            .collect())
    }

    fn watch(&self, sink: WatchSink) -> LoaderResult<Subscription> {
        let id = self.next_sink.get();
        self.next_sink.set(id + 1);
        self.sinks.borrow_mut().push((id, sink));
        Ok(Subscription::new(SinkGuard {
            id,
            sinks: Rc::clone(&self.sinks),
        }))
    }

    async fn ensure_directory(&self) -> LoaderResult<()> {
        Ok(())
    }

    async fn exists(&self, identifier: &str) -> bool {
        self.files.borrow().contains_key(identifier)
    }
}

impl ModuleResolver for MemoryScriptSource {
    fn resolve(&self, specifier: &str, from: &str) -> Option<String> {
        let base = resolve_relative(specifier, from)?;
        let files = self.files.borrow();
        candidates(&base, &DEFAULT_EXTENSIONS)
            .into_iter()
            .find(|candidate| files.contains_key(candidate))
    }

    fn load(&self, identifier: &str) -> RuntimeResult<ModuleSource> {
        let files = self.files.borrow();
        let file = files
            .get(identifier)
            .ok_or_else(|| RuntimeError::internal(format!("module '{identifier}' disappeared")))?;
        Ok(ModuleSource::raw(
            file.contents.clone(),
            LoaderKind::from_path(identifier),
            Some(file.mtime),
        ))
    }
}
