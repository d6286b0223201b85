//! High-level operations
//!
//! `Engine` ties the configuration, the repo, and the planner together and
//! implements the user-facing move semantics: moving into an existing
//! directory keeps the source's file name, and an occupied destination gets
//! a numeric suffix instead of being overwritten.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::{FileEditCmd, FileInfo, FileQuery, LinkInfo};
use crate::rearrange::plan_rearrange;
use crate::refs;
use crate::repo::DirectRepo;

pub struct Engine {
    repo: DirectRepo,
}

impl Engine {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            repo: DirectRepo::new(config)?,
        })
    }

    pub fn repo(&self) -> &DirectRepo {
        &self.repo
    }

    /// Move `src` to `dest`, rewriting every reference that points at it
    /// and every reference it contains. Returns the realized destination,
    /// which differs from the request when `dest` is an existing directory
    /// or the destination name is already taken.
    pub fn move_file(&self, src: &Path, dest: &Path) -> Result<PathBuf> {
        let src = refs::canonical(src);
        if !src.exists() {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no such file or directory: {}", src.display()),
            )));
        }
        let mut dest = refs::canonical(dest);
        if dest.is_dir() {
            if let Some(name) = src.file_name() {
                dest = dest.join(name);
            }
        }
        if dest == src {
            return Ok(dest);
        }
        let dest = free_destination(&dest);

        let mut renames = BTreeMap::new();
        renames.insert(src.clone(), dest.clone());
        let edits = plan_rearrange(&self.repo, &renames)?;
        self.repo.change(edits)?;
        info!(src = %src.display(), dest = %dest.display(), "moved");
        Ok(dest)
    }

    /// Parsed summary of one file, with backlinks filled in.
    pub fn info(&self, path: &Path) -> FileInfo {
        let mut info = self.repo.info(&refs::canonical(path));
        info.backlinks = self.repo.backlinks(path);
        info
    }

    pub fn query(&self, query: &FileQuery) -> Vec<FileInfo> {
        self.repo.query(query)
    }

    pub fn backlinks(&self, path: &Path) -> Vec<LinkInfo> {
        self.repo.backlinks(path)
    }

    pub fn tag_counts(&self, query: &FileQuery) -> BTreeMap<String, usize> {
        self.repo.tag_counts(query)
    }

    /// Set a file's title through the regular change pipeline, so the edit
    /// is logged like any other mutation.
    pub fn set_title(&self, path: &Path, title: &str) -> Result<()> {
        self.repo.change(vec![FileEditCmd::SetTitle {
            path: refs::canonical(path),
            title: title.to_string(),
        }])
    }
}

/// The first non-existing variant of `dest`: the path itself, then
/// `stem-2`, `stem-3`, ... before the extension.
fn free_destination(dest: &Path) -> PathBuf {
    if !dest.exists() {
        return dest.to_path_buf();
    }
    let stem = dest
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = dest
        .extension()
        .map(|ext| ext.to_string_lossy().into_owned());
    let mut counter = 2;
    loop {
        let name = match &extension {
            Some(ext) => format!("{stem}-{counter}.{ext}"),
            None => format!("{stem}-{counter}"),
        };
        let candidate = dest.with_file_name(name);
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}
