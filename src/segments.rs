use std::collections::HashSet;
use std::io;
use std::ops::Range;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::playlist::{parse_segment_index, segment_name, SegmentRename};

const STAGING_SUFFIX: &str = "staged";

#[derive(Debug, Error)]
pub enum RenameError {
    #[error("failed to list segment directory {path}: {source}")]
    List { path: PathBuf, source: io::Error },
    #[error("failed to stage {from} as {to}: {source}")]
    Stage {
        from: String,
        to: String,
        source: io::Error,
    },
    #[error("failed to commit {to} after {committed} renames: {source}")]
    Commit {
        to: String,
        committed: usize,
        source: io::Error,
    },
}

/// The flat directory holding every `seg<N>.ts` the live playlist refers to.
#[derive(Debug, Clone)]
pub struct SegmentDir {
    dir: PathBuf,
}

impl SegmentDir {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    pub fn segment_path(&self, index: u64) -> PathBuf {
        self.dir.join(segment_name(index))
    }

    fn staged_path(&self, index: u64) -> PathBuf {
        self.dir
            .join(format!("{}.{STAGING_SUFFIX}", segment_name(index)))
    }

    fn present(&self) -> Result<HashSet<u64>, RenameError> {
        let read_dir = std::fs::read_dir(&self.dir).map_err(|source| RenameError::List {
            path: self.dir.clone(),
            source,
        })?;
        Ok(read_dir
            .flatten()
            .filter_map(|entry| parse_segment_index(entry.file_name().to_str()?))
            .collect())
    }

    /// Highest segment index on disk plus one; zero for an empty or
    /// missing directory.
    pub fn next_free_index(&self) -> io::Result<u64> {
        let read_dir = match std::fs::read_dir(&self.dir) {
            Ok(rd) => rd,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };
        let max = read_dir
            .flatten()
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .filter_map(|entry| parse_segment_index(entry.file_name().to_str()?))
            .max();
        Ok(max.map(|m| m + 1).unwrap_or(0))
    }

    /// Copies an external file in as `seg<index>.ts`.
    pub fn import(&self, source: &Path, index: u64) -> io::Result<()> {
        let dest = self.segment_path(index);
        std::fs::copy(source, &dest)?;
        tracing::debug!(from = %source.display(), to = %dest.display(), "imported segment");
        Ok(())
    }

    /// Deletes `seg<N>.ts` for every `N` in `indices`. Missing files are fine.
    pub fn discard(&self, indices: Range<u64>) {
        for index in indices {
            let path = self.segment_path(index);
            match std::fs::remove_file(&path) {
                Ok(()) => tracing::debug!(path = %path.display(), "discarded segment"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to discard segment")
                }
            }
        }
    }

    /// Renames segment files as decided by a playlist relocation and returns
    /// the new `(start, end)` range.
    ///
    /// Every source is first moved to a staging name, then every staged file
    /// is committed to its final name. A staging failure puts the already
    /// staged files back. A commit failure is returned as is: the files
    /// committed before it keep their new names.
    pub fn apply(&self, renames: &[SegmentRename]) -> Result<Option<(u64, u64)>, RenameError> {
        let present = self.present()?;
        let mut staged: Vec<SegmentRename> = Vec::with_capacity(renames.len());

        for rename in renames {
            if !present.contains(&rename.from) {
                tracing::warn!(
                    segment = %segment_name(rename.from),
                    dir = %self.dir.display(),
                    "segment file missing, skipping rename"
                );
                continue;
            }
            let from = self.segment_path(rename.from);
            let to = self.staged_path(rename.to);
            if let Err(source) = std::fs::rename(&from, &to) {
                self.unstage(&staged);
                return Err(RenameError::Stage {
                    from: from.display().to_string(),
                    to: to.display().to_string(),
                    source,
                });
            }
            staged.push(*rename);
        }

        for (committed, rename) in staged.iter().enumerate() {
            let to = self.segment_path(rename.to);
            if let Err(source) = std::fs::rename(self.staged_path(rename.to), &to) {
                return Err(RenameError::Commit {
                    to: to.display().to_string(),
                    committed,
                    source,
                });
            }
        }

        tracing::debug!(
            renamed = staged.len(),
            planned = renames.len(),
            "segment renames committed"
        );

        Ok(renames
            .first()
            .zip(renames.last())
            .map(|(first, last)| (first.to, last.to)))
    }

    /// Undoes a committed [`apply`](Self::apply).
    pub fn revert(&self, renames: &[SegmentRename]) -> Result<(), RenameError> {
        let reversed: Vec<SegmentRename> = renames
            .iter()
            .map(|r| SegmentRename {
                from: r.to,
                to: r.from,
            })
            .collect();
        self.apply(&reversed).map(|_| ())
    }

    fn unstage(&self, staged: &[SegmentRename]) {
        for rename in staged.iter().rev() {
            let from = self.staged_path(rename.to);
            let to = self.segment_path(rename.from);
            if let Err(e) = std::fs::rename(&from, &to) {
                tracing::error!(
                    from = %from.display(),
                    to = %to.display(),
                    error = %e,
                    "failed to roll back staged segment"
                );
            }
        }
    }
}
