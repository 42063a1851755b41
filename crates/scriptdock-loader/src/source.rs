//! Script source contract.
//!
//! A [`ScriptSource`] lists, reads and watches script files below a root.
//! Identifiers are paths relative to that root with `/` separators.

use std::any::Any;

use async_trait::async_trait;
use scriptdock_runtime::LoaderKind;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

use crate::error::LoaderResult;

/// Contents of one script file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptFile {
    pub contents: String,
    /// Modification time in milliseconds since the Unix epoch
    pub mtime: u64,
    pub kind: LoaderKind,
}

/// One listed script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptEntry {
    pub identifier: String,
    pub kind: LoaderKind,
}

impl ScriptEntry {
    pub fn new(identifier: impl Into<String>) -> Self {
        let identifier = identifier.into();
        let kind = LoaderKind::from_path(&identifier);
        Self { identifier, kind }
    }
}

/// Change reported by a watched source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    Created(String),
    Modified(String),
    Deleted(String),
    Renamed { from: String, to: String },
}

/// Receiving end handed to [`ScriptSource::watch`]
#[derive(Debug, Clone)]
pub struct WatchSink {
    tx: UnboundedSender<WatchEvent>,
}

impl WatchSink {
    /// Create a sink and the receiver its events arrive on
    pub fn channel() -> (Self, UnboundedReceiver<WatchEvent>) {
        let (tx, rx) = unbounded_channel();
        (Self { tx }, rx)
    }

    /// Forward an event; `false` once the receiver is gone
    pub fn send(&self, event: WatchEvent) -> bool {
        self.tx.send(event).is_ok()
    }
}

/// Active watch. Dropping it stops event delivery.
pub struct Subscription {
    _guard: Box<dyn Any>,
}

impl Subscription {
    pub fn new(guard: impl Any) -> Self {
        Self {
            _guard: Box::new(guard),
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

/// File access used by the loader.
#[async_trait(?Send)]
pub trait ScriptSource {
    /// Read one script
    async fn read_file(&self, identifier: &str) -> LoaderResult<ScriptFile>;

    /// Every script currently present, in a stable order
    async fn list_files(&self) -> LoaderResult<Vec<ScriptEntry>>;

    /// Start delivering change events to `sink`
    fn watch(&self, sink: WatchSink) -> LoaderResult<Subscription>;

    /// Create the root if it does not exist
    async fn ensure_directory(&self) -> LoaderResult<()>;

    async fn exists(&self, identifier: &str) -> bool;
}
