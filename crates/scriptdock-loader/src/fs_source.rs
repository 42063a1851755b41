//! Script source backed by a directory on disk.

use std::path::{Component, Path, PathBuf};
use std::time::UNIX_EPOCH;

use async_trait::async_trait;
use notify::event::{EventKind, ModifyKind, RenameMode};
use notify::{RecursiveMode, Watcher};
use scriptdock_runtime::LoaderKind;

use crate::config::FsSourceConfig;
use crate::error::{LoaderError, LoaderResult};
use crate::source::{ScriptEntry, ScriptFile, ScriptSource, Subscription, WatchEvent, WatchSink};

/// Lists, reads and watches scripts under a root directory.
///
/// Listing walks the tree recursively, skipping ignored directory names and
/// files outside the extension allow-list. Watching uses the platform's
/// recommended `notify` watcher.
#[derive(Debug, Clone)]
pub struct FsScriptSource {
    config: FsSourceConfig,
}

impl FsScriptSource {
    pub fn new(config: FsSourceConfig) -> Self {
        Self { config }
    }

    /// Absolute path for an identifier; rejects identifiers leaving the root
    fn path_for(&self, identifier: &str) -> LoaderResult<PathBuf> {
        let relative = Path::new(identifier);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(LoaderError::source(format!("invalid script identifier: {identifier}")));
        }
        Ok(self.config.root.join(relative))
    }
}

/// `/`-separated identifier of `path` relative to `root`
fn identifier_for(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(name) => parts.push(name.to_str()?),
            _ => return None,
        }
    }
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}

fn is_ignored(path: &Path, config: &FsSourceConfig) -> bool {
    path.components().any(|component| {
        matches!(component, Component::Normal(name)
            if name.to_str().is_some_and(|n| config.ignore_dirs.iter().any(|d| d == n)))
    })
}

fn has_script_extension(path: &Path, config: &FsSourceConfig) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| config.extensions.iter().any(|e| e == ext))
}

/// Whether a changed path is relevant. Paths without an extension pass, since
/// a removed or renamed directory can take scripts with it.
fn should_watch_file(relative: &Path, config: &FsSourceConfig) -> bool {
    if is_ignored(relative, config) {
        return false;
    }
    match relative.extension() {
        Some(_) => has_script_extension(relative, config),
        None => true,
    }
}

fn modified_millis(metadata: &std::fs::Metadata) -> u64 {
    metadata
        .modified()
        .ok()
        .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Translate a notify event into watch events for paths below the root
fn translate(event: notify::Event, roots: &[PathBuf], config: &FsSourceConfig) -> Vec<WatchEvent> {
    let relevant = |path: &PathBuf| -> Option<String> {
        let identifier = roots.iter().find_map(|root| identifier_for(root, path))?;
        should_watch_file(Path::new(&identifier), config).then_some(identifier)
    };

    match event.kind {
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) if event.paths.len() == 2 => {
            match (relevant(&event.paths[0]), relevant(&event.paths[1])) {
                (Some(from), Some(to)) => vec![WatchEvent::Renamed { from, to }],
                (Some(from), None) => vec![WatchEvent::Deleted(from)],
                (None, Some(to)) => vec![WatchEvent::Created(to)],
                (None, None) => Vec::new(),
            }
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) | EventKind::Remove(_) => {
            event.paths.iter().filter_map(relevant).map(WatchEvent::Deleted).collect()
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) | EventKind::Create(_) => {
            event.paths.iter().filter_map(relevant).map(WatchEvent::Created).collect()
        }
        EventKind::Modify(_) | EventKind::Any => {
            event.paths.iter().filter_map(relevant).map(WatchEvent::Modified).collect()
        }
        EventKind::Access(_) | EventKind::Other => Vec::new(),
    }
}

#[async_trait(?Send)]
impl ScriptSource for FsScriptSource {
    async fn read_file(&self, identifier: &str) -> LoaderResult<ScriptFile> {
        let path = self.path_for(identifier)?;
        let contents = tokio::fs::read_to_string(&path).await?;
        let metadata = tokio::fs::metadata(&path).await?;
        Ok(ScriptFile {
            contents,
            mtime: modified_millis(&metadata),
            kind: LoaderKind::from_path(identifier),
        })
    }

    async fn list_files(&self) -> LoaderResult<Vec<ScriptEntry>> {
        let root = &self.config.root;
        let mut entries = Vec::new();
        let mut pending = vec![root.clone()];

        while let Some(dir) = pending.pop() {
            let mut read_dir = tokio::fs::read_dir(&dir).await?;
            while let Some(entry) = read_dir.next_entry().await? {
                let path = entry.path();
                let Some(identifier) = identifier_for(root, &path) else {
                    continue;
                };
                // Follows symlinks
                let Ok(metadata) = tokio::fs::metadata(&path).await else {
                    continue;
                };
                if metadata.is_dir() {
                    if !is_ignored(Path::new(&identifier), &self.config) {
                        pending.push(path);
                    }
                } else if metadata.is_file() && has_script_extension(&path, &self.config) {
                    entries.push(ScriptEntry::new(identifier));
                }
            }
        }

        entries.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        Ok(entries)
    }

    fn watch(&self, sink: WatchSink) -> LoaderResult<Subscription> {
        let root = self.config.root.clone();
        let mut roots = vec![root.clone()];
        if let Ok(canonical) = std::fs::canonicalize(&root)
            && canonical != root
        {
            roots.insert(0, canonical);
        }
        let config = self.config.clone();

        let mut watcher = notify::recommended_watcher(move |result: notify::Result<notify::Event>| {
            match result {
                Ok(event) => {
                    for change in translate(event, &roots, &config) {
                        sink.send(change);
                    }
                }
                Err(e) => tracing::warn!(error = %e, "file watcher error"),
            }
        })?;
        watcher.watch(&root, RecursiveMode::Recursive)?;

        tracing::debug!(root = %root.display(), "watching script directory");
        Ok(Subscription::new(watcher))
    }

    async fn ensure_directory(&self) -> LoaderResult<()> {
        tokio::fs::create_dir_all(&self.config.root).await?;
        Ok(())
    }

    async fn exists(&self, identifier: &str) -> bool {
        match self.path_for(identifier) {
            Ok(path) => tokio::fs::metadata(path).await.is_ok_and(|m| m.is_file()),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, RemoveKind};

    fn config() -> FsSourceConfig {
        FsSourceConfig::new("/scripts")
    }

    #[test]
    fn test_should_watch_file() {
        let config = config();
        assert!(should_watch_file(Path::new("tools/a.ts"), &config));
        assert!(should_watch_file(Path::new("tools"), &config));
        assert!(!should_watch_file(Path::new("notes.md"), &config));
        assert!(!should_watch_file(Path::new("node_modules/x/index.js"), &config));
        assert!(!should_watch_file(Path::new(".git/HEAD"), &config));
    }

    #[test]
    fn test_identifier_for() {
        let root = Path::new("/scripts");
        assert_eq!(
            identifier_for(root, Path::new("/scripts/tools/a.ts")).as_deref(),
            Some("tools/a.ts")
        );
        assert_eq!(identifier_for(root, Path::new("/scripts")), None);
        assert_eq!(identifier_for(root, Path::new("/elsewhere/a.ts")), None);
    }

    #[test]
    fn test_translate_events() {
        let config = config();
        let roots = vec![PathBuf::from("/scripts")];

        let event = notify::Event::new(EventKind::Create(CreateKind::File))
            .add_path(PathBuf::from("/scripts/a.ts"));
        assert_eq!(
            translate(event, &roots, &config),
            vec![WatchEvent::Created("a.ts".into())]
        );

        let event = notify::Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content)))
            .add_path(PathBuf::from("/scripts/node_modules/x.js"));
        assert!(translate(event, &roots, &config).is_empty());

        let event = notify::Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path(PathBuf::from("/scripts/a.ts"))
            .add_path(PathBuf::from("/scripts/b.ts"));
        assert_eq!(
            translate(event, &roots, &config),
            vec![WatchEvent::Renamed {
                from: "a.ts".into(),
                to: "b.ts".into()
            }]
        );

        let event = notify::Event::new(EventKind::Remove(RemoveKind::File))
            .add_path(PathBuf::from("/scripts/b.ts"));
        assert_eq!(
            translate(event, &roots, &config),
            vec![WatchEvent::Deleted("b.ts".into())]
        );
    }

    #[tokio::test]
    async fn test_list_and_read() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("tools/nested")).unwrap();
        std::fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        std::fs::write(root.join("main.js"), "module.exports = 1;").unwrap();
        std::fs::write(root.join("tools/search.ts"), "export const x = 1;").unwrap();
        std::fs::write(root.join("tools/nested/deep.mjs"), "export default 1;").unwrap();
        std::fs::write(root.join("tools/README.md"), "docs").unwrap();
        std::fs::write(root.join("node_modules/pkg/index.js"), "").unwrap();

        let source = FsScriptSource::new(FsSourceConfig::new(root));
        let listed: Vec<String> = source
            .list_files()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.identifier)
            .collect();
        assert_eq!(listed, vec!["main.js", "tools/nested/deep.mjs", "tools/search.ts"]);

        let file = source.read_file("tools/search.ts").await.unwrap();
        assert_eq!(file.contents, "export const x = 1;");
        assert_eq!(file.kind, LoaderKind::TypeScript);
        assert!(file.mtime > 0);

        assert!(source.exists("main.js").await);
        assert!(!source.exists("missing.js").await);
        assert!(!source.exists("../outside.js").await);
        assert!(matches!(
            source.read_file("../outside.js").await,
            Err(LoaderError::Source(_))
        ));
    }

    #[tokio::test]
    async fn test_ensure_directory() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("scripts/tools");
        let source = FsScriptSource::new(FsSourceConfig::new(&root));

        source.ensure_directory().await.unwrap();
        assert!(root.is_dir());
        assert!(source.list_files().await.unwrap().is_empty());
    }
}
