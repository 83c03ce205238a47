//! Per-file read cursors
//!
//! One record per tracked path, owned by the tailer. Nothing here is
//! persisted; a restart starts from [`StartPosition`] again.

use std::collections::{HashMap, HashSet};
use std::fs::Metadata;
use std::path::{Path, PathBuf};

use contracts::StartPosition;

/// Identity of the underlying file, stable across renames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileIdentity {
    pub dev: u64,
    pub ino: u64,
}

impl FileIdentity {
    #[cfg(unix)]
    pub fn from_metadata(metadata: &Metadata) -> Option<Self> {
        use std::os::unix::fs::MetadataExt;
        Some(Self {
            dev: metadata.dev(),
            ino: metadata.ino(),
        })
    }

    #[cfg(not(unix))]
    pub fn from_metadata(_metadata: &Metadata) -> Option<Self> {
        None
    }
}

/// Read progress of one path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileCursor {
    pub identity: Option<FileIdentity>,
    /// Byte offset just past the last emitted line
    pub offset: u64,
    /// Size seen at the last scan
    pub size: u64,
}

/// Why a cursor went back to offset 0
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetReason {
    /// Same path, different file
    Rotated,
    /// File shorter than the recorded offset
    Truncated,
}

impl ResetReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rotated => "rotated",
            Self::Truncated => "truncated",
        }
    }
}

/// Result of reconciling a fresh `stat` with the stored cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    /// Where reading starts this tick
    pub offset: u64,
    /// Current file size
    pub size: u64,
    pub reset: Option<ResetReason>,
}

impl Observation {
    /// Whether there is unread content
    pub fn has_new_data(&self) -> bool {
        self.size > self.offset
    }
}

/// Cursor map keyed by path
#[derive(Debug, Default)]
pub struct CursorStore {
    cursors: HashMap<PathBuf, FileCursor>,
}

impl CursorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &Path) -> Option<&FileCursor> {
        self.cursors.get(path)
    }

    pub fn len(&self) -> usize {
        self.cursors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cursors.is_empty()
    }

    /// Record the current identity and size of `path`
    ///
    /// Creates the cursor on first sighting, resets it to 0 on rotation or
    /// truncation.
    pub fn observe(
        &mut self,
        path: &Path,
        identity: Option<FileIdentity>,
        size: u64,
        start_at: StartPosition,
    ) -> Observation {
        let Some(cursor) = self.cursors.get_mut(path) else {
            let offset = match start_at {
                StartPosition::Beginning => 0,
                StartPosition::End => size,
            };
            self.cursors.insert(
                path.to_path_buf(),
                FileCursor {
                    identity,
                    offset,
                    size,
                },
            );
            return Observation {
                offset,
                size,
                reset: None,
            };
        };

        let rotated = matches!(
            (cursor.identity, identity),
            (Some(previous), Some(current)) if previous != current
        );

        let reset = if rotated {
            Some(ResetReason::Rotated)
        } else if size < cursor.offset {
            Some(ResetReason::Truncated)
        } else {
            None
        };

        if reset.is_some() {
            cursor.offset = 0;
        }
        cursor.identity = identity;
        cursor.size = size;

        Observation {
            offset: cursor.offset,
            size,
            reset,
        }
    }

    /// Move the cursor of `path` past an emitted line
    pub fn advance(&mut self, path: &Path, offset: u64) {
        if let Some(cursor) = self.cursors.get_mut(path) {
            cursor.offset = offset;
        }
    }

    /// Drop cursors of paths not seen in the last scan, returns how many
    pub fn retain_seen(&mut self, seen: &HashSet<PathBuf>) -> usize {
        let before = self.cursors.len();
        self.cursors.retain(|path, _| seen.contains(path));
        before - self.cursors.len()
    }
}
