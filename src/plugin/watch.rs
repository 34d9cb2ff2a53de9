//! Source file change detection
//!
//! Dev-mode plugins have their whole source tree registered here. Every tick
//! re-digests each watched file and reports `(file, plugin)` pairs for the
//! files whose content changed. The watch set only ever grows.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::domain::{FileDigest, PluginId};

/// A watched source file
#[derive(Debug, Clone, Serialize)]
pub struct WatchedFile {
    #[serde(serialize_with = "serialize_digest")]
    digest: FileDigest,

    /// Plugins reloaded when this file changes, in registration order
    dependents: Vec<PluginId>,

    /// When the last content change was detected
    last_changed: Option<DateTime<Utc>>,
}

fn serialize_digest<S: serde::Serializer>(digest: &FileDigest, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(digest)
}

impl WatchedFile {
    pub fn digest(&self) -> &FileDigest {
        &self.digest
    }

    pub fn dependents(&self) -> &[PluginId] {
        &self.dependents
    }

    pub fn last_changed(&self) -> Option<DateTime<Utc>> {
        self.last_changed
    }
}

/// A plugin that needs reloading because one of its files changed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReloadTrigger {
    pub file: PathBuf,
    pub plugin: PluginId,
}

/// Selects which files under a module's source directory are watched
///
/// With no extensions configured every non-hidden file matches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceFilter {
    extensions: Vec<String>,
}

impl SourceFilter {
    /// Matches every non-hidden file
    pub fn any() -> Self {
        Self::default()
    }

    /// Matches files whose extension is one of `extensions` (without the dot)
    pub fn extensions<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            extensions: extensions.into_iter().map(Into::into).collect(),
        }
    }

    pub fn matches(&self, path: &Path) -> bool {
        if self.extensions.is_empty() {
            return true;
        }
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|e| e == ext))
    }
}

/// Digest table for all watched files, iterated in path order
#[derive(Debug, Default)]
pub struct FileWatcher {
    files: BTreeMap<PathBuf, WatchedFile>,
}

impl FileWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers every file under `dir` accepted by `filter` as a dependency
    /// of `plugin`
    ///
    /// Files already watched keep their digest and gain `plugin` as a
    /// dependent. Returns the number of matching files found under `dir`.
    pub fn watch(
        &mut self,
        plugin: &PluginId,
        dir: &Path,
        filter: &SourceFilter,
    ) -> io::Result<usize> {
        let mut found = Vec::new();
        collect_files(dir, filter, &mut found)?;
        found.sort();

        let mut count = 0;
        for path in found {
            if !self.files.contains_key(&path) {
                let digest = match FileDigest::of_file(&path) {
                    Ok(d) => d,
                    Err(e) => {
                        warn!(file = %path.display(), error = %e, "Skipping unreadable file");
                        continue;
                    }
                };
                debug!(file = %path.display(), digest = %digest.short(), "Watching file");
                self.files.insert(
                    path.clone(),
                    WatchedFile {
                        digest,
                        dependents: Vec::new(),
                        last_changed: None,
                    },
                );
            }

            // Present after the insert above
            if let Some(watched) = self.files.get_mut(&path) {
                if !watched.dependents.contains(plugin) {
                    watched.dependents.push(plugin.clone());
                }
                count += 1;
            }
        }

        Ok(count)
    }

    /// Re-digests every watched file and returns the reloads to perform
    ///
    /// One trigger is produced per dependent of each changed file, so a
    /// plugin depending on two changed files appears twice.
    pub fn tick(&mut self) -> Vec<ReloadTrigger> {
        let now = Utc::now();
        let mut triggers = Vec::new();

        for (path, watched) in &mut self.files {
            let digest = match FileDigest::of_file(path) {
                Ok(d) => d,
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "Cannot read watched file");
                    continue;
                }
            };

            if digest == watched.digest {
                continue;
            }

            debug!(
                file = %path.display(),
                old = %watched.digest.short(),
                new = %digest.short(),
                "File changed"
            );
            watched.digest = digest;
            watched.last_changed = Some(now);

            for plugin in &watched.dependents {
                triggers.push(ReloadTrigger {
                    file: path.clone(),
                    plugin: plugin.clone(),
                });
            }
        }

        triggers
    }

    pub fn get(&self, path: &Path) -> Option<&WatchedFile> {
        self.files.get(path)
    }

    pub fn files(&self) -> impl Iterator<Item = (&Path, &WatchedFile)> {
        self.files.iter().map(|(p, f)| (p.as_path(), f))
    }

    /// Whether any watched file lists `plugin` as a dependent
    pub fn is_watching(&self, plugin: &PluginId) -> bool {
        self.files.values().any(|f| f.dependents.contains(plugin))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Collects non-hidden regular files below `dir` that pass `filter`
///
/// Errors reading `dir` itself propagate; unreadable subdirectories are
/// skipped.
fn collect_files(dir: &Path, filter: &SourceFilter, out: &mut Vec<PathBuf>) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();

        let hidden = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with('.'));
        if hidden {
            continue;
        }

        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            if let Err(e) = collect_files(&path, filter, out) {
                warn!(dir = %path.display(), error = %e, "Skipping unreadable directory");
            }
        } else if file_type.is_file() && filter.matches(&path) {
            out.push(path);
        }
    }

    Ok(())
}
