use std::path::{Path, PathBuf};

use crate::env::{Env, WritableFile};
use crate::error::{Error, Result};

/// A table file that exists on disk but is not yet part of the database.
///
/// Until [`commit`](Self::commit) is called the file is removed when the
/// guard is discarded or dropped, so an early return or panic anywhere in a
/// build cannot leave a half-written table behind.
pub struct StagedTable<'a> {
    env: &'a dyn Env,
    path: PathBuf,
    armed: bool,
}

impl<'a> StagedTable<'a> {
    /// Create (or truncate) the file at `path`.
    pub fn create(env: &'a dyn Env, path: PathBuf) -> Result<(Self, Box<dyn WritableFile>)> {
        match env.new_writable_file(&path) {
            Ok(file) => Ok((
                StagedTable {
                    env,
                    path,
                    armed: true,
                },
                file,
            )),
            Err(e) => {
                remove_if_present(env, &path);
                Err(Error::create_failed(path, e))
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Keep the file.
    pub fn commit(mut self) -> PathBuf {
        self.armed = false;
        std::mem::take(&mut self.path)
    }

    /// Remove the file now.
    pub fn discard(mut self) {
        self.armed = false;
        remove_if_present(self.env, &self.path);
    }
}

impl Drop for StagedTable<'_> {
    fn drop(&mut self) {
        if self.armed {
            remove_if_present(self.env, &self.path);
        }
    }
}

/// Best-effort delete. A failure is logged, never returned: the build's own
/// status is what the caller needs to see.
pub fn remove_if_present(env: &dyn Env, path: &Path) {
    if !env.file_exists(path) {
        return;
    }
    match env.delete_file(path) {
        Ok(()) => log::debug!("removed unusable table file {}", path.display()),
        Err(e) => log::warn!(
            "could not remove unusable table file {}: {}",
            path.display(),
            e
        ),
    }
}
