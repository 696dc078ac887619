//! Shared cache of open file handles.
//!
//! The underlying library is not reentrant per handle, so each cache entry
//! pairs the (lazily opened) handle with its own mutex. A single cache-wide
//! mutex protects only the map itself: lookups clone the entry's `Arc` and
//! release the cache lock before any I/O starts, so reads against distinct
//! files never serialize against each other while a given file sees at most
//! one open handle and strictly ordered access.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use snafu::prelude::*;

use crate::errors::{CacheMissSnafu, OpenFailedSnafu, Result};

/// One cached file: a per-file mutex guarding the optional open handle.
#[derive(Debug, Default)]
pub(crate) struct FileEntry {
    handle: Mutex<Option<netcdf::File>>,
}

impl FileEntry {
    /// Run `f` with the open handle, holding this entry's mutex for the whole
    /// call. The file is opened read-only on first use; an open failure
    /// leaves the handle absent.
    pub(crate) fn with_open<R>(
        &self,
        path: &Path,
        f: impl FnOnce(&netcdf::File) -> Result<R>,
    ) -> Result<R> {
        let mut guard = self.handle.lock().expect("file entry lock poisoned");
        if guard.is_none() {
            let file = netcdf::open(path).context(OpenFailedSnafu { path })?;
            *guard = Some(file);
        }
        match guard.as_ref() {
            Some(file) => f(file),
            None => unreachable!("handle stored above"),
        }
    }

    /// Close the handle if one is open. The entry (and its mutex) remain.
    fn close(&self) {
        let mut guard = self.handle.lock().expect("file entry lock poisoned");
        *guard = None;
    }

    #[cfg(test)]
    pub(crate) fn is_open(&self) -> bool {
        self.handle.lock().expect("file entry lock poisoned").is_some()
    }
}

/// Map from file basename to its [`FileEntry`], shared across worker threads.
#[derive(Debug, Default)]
pub(crate) struct HandleCache {
    entries: Mutex<HashMap<String, Arc<FileEntry>>>,
}

impl HandleCache {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Drop all existing entries and insert a fresh, closed entry per
    /// basename. Called once at the start of each metadata phase.
    pub(crate) fn initialize(&self, files: &[String]) {
        let mut entries = self.entries.lock().expect("handle cache lock poisoned");
        entries.clear();
        for file in files {
            entries.insert(file.clone(), Arc::new(FileEntry::default()));
        }
    }

    /// Look up the entry for `file` under the cache-wide mutex. The caller
    /// performs I/O through [`FileEntry::with_open`], which takes the
    /// per-file mutex.
    pub(crate) fn acquire(&self, file: &str) -> Result<Arc<FileEntry>> {
        let entries = self.entries.lock().expect("handle cache lock poisoned");
        entries
            .get(file)
            .cloned()
            .context(CacheMissSnafu { file })
    }

    /// Close the handle for `file`, keeping the entry.
    pub(crate) fn release(&self, file: &str) {
        let entry = {
            let entries = self.entries.lock().expect("handle cache lock poisoned");
            entries.get(file).cloned()
        };
        if let Some(entry) = entry {
            entry.close();
        }
    }

    /// Close every handle and empty the map.
    pub(crate) fn clear(&self) {
        let mut entries = self.entries.lock().expect("handle cache lock poisoned");
        entries.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.lock().expect("handle cache lock poisoned").len()
    }
}
