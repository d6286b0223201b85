//! Direct file index
//!
//! `DirectRepo` answers every question by walking the configured roots and
//! parsing files on demand. Nothing is cached: a `FileInfo` always reflects
//! on-disk content at the moment it is read, so information can never go
//! stale across a `change` call.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::Local;
use regex::Regex;
use serde::Serialize;
use tracing::debug;
use walkdir::WalkDir;

use crate::accessors::Accessor;
use crate::config::Config;
use crate::error::Result;
use crate::models::{group_edits, FileEditCmd, FileInfo, FileQuery, LinkInfo};
use crate::refs;

pub struct DirectRepo {
    roots: Vec<PathBuf>,
    filters: Vec<Regex>,
    skip_parse: Vec<Regex>,
    edit_log: Option<EditLog>,
}

impl DirectRepo {
    pub fn new(config: &Config) -> Result<Self> {
        let filters = compile(&config.filters)?;
        let skip_parse = compile(&config.skip_parse)?;
        Ok(Self {
            roots: config.roots.iter().map(|root| refs::canonical(root)).collect(),
            filters,
            skip_parse,
            edit_log: config.edit_log_path.clone().map(EditLog::new),
        })
    }

    /// Parse one file into its summary. Paths matching a skip-parse pattern
    /// stay content-opaque; they still exist and can be moved.
    pub fn info(&self, path: &Path) -> FileInfo {
        self.accessor(path).info()
    }

    /// Every path under the configured roots that survives the exclusion
    /// filters, files and directories alike. An excluded directory prunes
    /// its whole subtree.
    pub fn paths(&self) -> Vec<PathBuf> {
        let mut result = Vec::new();
        for root in &self.roots {
            let walk = WalkDir::new(root)
                .min_depth(1)
                .into_iter()
                .filter_entry(|entry| !self.excluded(entry.path()));
            for entry in walk.filter_map(|entry| entry.ok()) {
                result.push(entry.path().to_path_buf());
            }
        }
        result
    }

    /// Files whose content contains a reference resolving to `path`.
    pub fn referrers(&self, path: &Path) -> BTreeSet<PathBuf> {
        let target = refs::canonical(path);
        let mut result = BTreeSet::new();
        for candidate in self.paths() {
            if !candidate.is_file() {
                continue;
            }
            if !self.info(&candidate).refs_to_path(&target).is_empty() {
                result.insert(candidate);
            }
        }
        result
    }

    /// Backlink records pointing at `path`, one per literal reference.
    pub fn backlinks(&self, path: &Path) -> Vec<LinkInfo> {
        let target = refs::canonical(path);
        let mut result = Vec::new();
        for candidate in self.paths() {
            if !candidate.is_file() {
                continue;
            }
            for href in self.info(&candidate).refs_to_path(&target) {
                result.push(LinkInfo::new(candidate.clone(), href));
            }
        }
        result
    }

    /// Files matching the query's tag filters, sorted per its sort spec.
    /// Backlink counts are filled in only when the sort needs them.
    pub fn query(&self, query: &FileQuery) -> Vec<FileInfo> {
        let mut matches = Vec::new();
        for path in self.paths() {
            if !path.is_file() {
                continue;
            }
            let info = self.info(&path);
            if query.matches(&info) {
                matches.push(info);
            }
        }
        if query.needs_backlinks() {
            for info in &mut matches {
                info.backlinks = self.backlinks(&info.path);
            }
        }
        query.apply_sorting(matches)
    }

    /// How many matching files carry each tag.
    pub fn tag_counts(&self, query: &FileQuery) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for info in self.query(query) {
            for tag in info.tags {
                *counts.entry(tag).or_insert(0) += 1;
            }
        }
        counts
    }

    /// Apply a batch of edits. Edits are grouped by target path; each group
    /// is logged before it mutates anything. A content group is applied
    /// against one accessor parse and saved once; a move group goes through
    /// the filesystem's rename primitive. Failures propagate immediately,
    /// leaving earlier groups committed.
    pub fn change(&self, edits: Vec<FileEditCmd>) -> Result<()> {
        for group in group_edits(edits) {
            if let Some(log) = &self.edit_log {
                log.record(&group)?;
            }
            match &group[0] {
                FileEditCmd::Move { .. } => {
                    for edit in &group {
                        if let FileEditCmd::Move { path, dest } = edit {
                            debug!(src = %path.display(), dest = %dest.display(), "renaming");
                            fs::rename(path, dest)?;
                        }
                    }
                }
                first => {
                    let mut accessor = self.accessor(first.path());
                    for edit in &group {
                        accessor.edit(edit)?;
                    }
                    debug!(path = %first.path().display(), edits = group.len(), "saving");
                    accessor.save()?;
                }
            }
        }
        Ok(())
    }

    fn accessor(&self, path: &Path) -> Accessor {
        if self.skips_parsing(path) {
            Accessor::opaque(path)
        } else {
            Accessor::open(path)
        }
    }

    fn skips_parsing(&self, path: &Path) -> bool {
        let text = path.to_string_lossy();
        self.skip_parse.iter().any(|pattern| pattern.is_match(&text))
    }

    fn excluded(&self, path: &Path) -> bool {
        let text = path.to_string_lossy();
        self.filters.iter().any(|pattern| pattern.is_match(&text))
    }
}

fn compile(patterns: &[String]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|pattern| Regex::new(pattern).map_err(Into::into))
        .collect()
}

/// Append-only log of applied edit groups: one JSON line per group, written
/// before the group mutates anything, carrying the target's prior content
/// (base64 when it is not valid UTF-8) so an external tool can reconstruct
/// or undo the change.
pub struct EditLog {
    path: PathBuf,
}

#[derive(Serialize)]
struct EditLogEntry<'a> {
    datetime: String,
    path: &'a Path,
    edits: &'a [FileEditCmd],
    #[serde(skip_serializing_if = "Option::is_none")]
    prior_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    prior_base64: Option<String>,
}

impl EditLog {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn record(&self, group: &[FileEditCmd]) -> Result<()> {
        let target = group[0].path();
        let (prior_text, prior_base64) = if target.is_file() {
            match fs::read_to_string(target) {
                Ok(text) => (Some(text), None),
                Err(_) => (None, Some(BASE64.encode(fs::read(target)?))),
            }
        } else {
            (None, None)
        };
        let entry = EditLogEntry {
            datetime: Local::now().to_rfc3339(),
            path: target,
            edits: group,
            prior_text,
            prior_base64,
        };
        let line = serde_json::to_string(&entry)?;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{line}")?;
        Ok(())
    }
}
