//! Core data model: parsed file summaries, backlink records, queries, and
//! the edit commands the planner emits.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::refs;

/// One backlink record: file `referrer` contains literal text `href` that
/// resolves to some other file. Derived fresh on each query, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkInfo {
    pub referrer: PathBuf,
    pub href: String,
}

impl LinkInfo {
    pub fn new(referrer: impl Into<PathBuf>, href: impl Into<String>) -> Self {
        Self {
            referrer: referrer.into(),
            href: href.into(),
        }
    }

    /// The canonical path this link points at, if it denotes a local file.
    pub fn referent(&self) -> Option<PathBuf> {
        refs::referent(&self.referrer, &self.href)
    }
}

/// Parsed summary of one file. Constructed on demand by parsing the file
/// and discarded after use, so it always reflects on-disk content at read
/// time. `backlinks` is filled by the repo only when a query asks for
/// backlink-dependent sorting.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FileInfo {
    pub path: PathBuf,
    pub refs: BTreeSet<String>,
    pub tags: BTreeSet<String>,
    pub title: Option<String>,
    pub created: Option<NaiveDateTime>,
    pub backlinks: Vec<LinkInfo>,
}

impl FileInfo {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Outbound references grouped by the canonical path they resolve to.
    /// Dangling and non-local references carry no entry.
    pub fn path_refs(&self) -> BTreeMap<PathBuf, Vec<String>> {
        let mut map: BTreeMap<PathBuf, Vec<String>> = BTreeMap::new();
        for href in &self.refs {
            if let Some(target) = refs::referent(&self.path, href) {
                map.entry(target).or_default().push(href.clone());
            }
        }
        map
    }

    /// The literal reference texts in this file that resolve to `target`.
    pub fn refs_to_path(&self, target: &Path) -> Vec<String> {
        let target = refs::canonical(target);
        self.refs
            .iter()
            .filter(|href| refs::referent(&self.path, href).as_deref() == Some(&target))
            .cloned()
            .collect()
    }
}

/// One mutation to apply to one file. Commands are grouped by target path
/// before application; all content edits for a file are applied against a
/// single in-memory parse and saved once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum FileEditCmd {
    /// Rename `path` to `dest` via the filesystem's rename primitive.
    Move { path: PathBuf, dest: PathBuf },
    /// Replace the reference text `original` with `replacement` wherever it
    /// appears as a link target in `path`.
    ReplaceRef {
        path: PathBuf,
        original: String,
        replacement: String,
    },
    /// Set the file's title metadata.
    SetTitle { path: PathBuf, title: String },
}

impl FileEditCmd {
    /// The file this command mutates.
    pub fn path(&self) -> &Path {
        match self {
            FileEditCmd::Move { path, .. } => path,
            FileEditCmd::ReplaceRef { path, .. } => path,
            FileEditCmd::SetTitle { path, .. } => path,
        }
    }

    pub fn is_move(&self) -> bool {
        matches!(self, FileEditCmd::Move { .. })
    }
}

/// Group edits by target path. Content edits for one path merge into a
/// single group no matter where they appear in the list; every `Move` is
/// its own group and bars later content edits for that path from joining
/// an earlier group (they would otherwise be applied to a file that has
/// already been renamed away).
pub fn group_edits(edits: Vec<FileEditCmd>) -> Vec<Vec<FileEditCmd>> {
    let mut groups: Vec<Vec<FileEditCmd>> = Vec::new();
    let mut open: HashMap<PathBuf, usize> = HashMap::new();
    for edit in edits {
        if edit.is_move() {
            open.remove(edit.path());
            groups.push(vec![edit]);
        } else if let Some(&index) = open.get(edit.path()) {
            groups[index].push(edit);
        } else {
            open.insert(edit.path().to_path_buf(), groups.len());
            groups.push(vec![edit]);
        }
    }
    groups
}

/// Field a query can sort on. `Tags` and `Backlinks` order by count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Path,
    Filename,
    Title,
    Created,
    Tags,
    Backlinks,
}

impl SortField {
    fn parse(name: &str) -> Result<Self> {
        match name {
            "path" => Ok(SortField::Path),
            "filename" => Ok(SortField::Filename),
            "title" => Ok(SortField::Title),
            "created" => Ok(SortField::Created),
            "tags" => Ok(SortField::Tags),
            "backlinks" => Ok(SortField::Backlinks),
            other => Err(Error::Query(format!("unknown sort field '{other}'"))),
        }
    }
}

/// One sort key: field, direction, case folding for string fields, and
/// where files missing the field's value are placed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileQuerySort {
    pub field: SortField,
    pub reverse: bool,
    pub ignore_case: bool,
    pub missing_first: bool,
}

impl FileQuerySort {
    pub fn new(field: SortField) -> Self {
        Self {
            field,
            reverse: false,
            ignore_case: true,
            missing_first: false,
        }
    }

    fn compare(&self, a: &FileInfo, b: &FileInfo) -> Ordering {
        let ordering = match self.field {
            SortField::Path => {
                self.compare_strings(&a.path.to_string_lossy(), &b.path.to_string_lossy())
            }
            SortField::Filename => self.compare_strings(&file_name(a), &file_name(b)),
            SortField::Title => self.compare_missing(a.title.as_deref(), b.title.as_deref()),
            SortField::Created => match (a.created, b.created) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => self.missing_ordering(),
                (Some(_), None) => self.missing_ordering().reverse(),
                (Some(x), Some(y)) => x.cmp(&y),
            },
            SortField::Tags => a.tags.len().cmp(&b.tags.len()),
            SortField::Backlinks => a.backlinks.len().cmp(&b.backlinks.len()),
        };
        if self.reverse {
            ordering.reverse()
        } else {
            ordering
        }
    }

    fn compare_strings(&self, a: &str, b: &str) -> Ordering {
        if self.ignore_case {
            a.to_lowercase().cmp(&b.to_lowercase())
        } else {
            a.cmp(b)
        }
    }

    fn compare_missing(&self, a: Option<&str>, b: Option<&str>) -> Ordering {
        match (a, b) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => self.missing_ordering(),
            (Some(_), None) => self.missing_ordering().reverse(),
            (Some(x), Some(y)) => self.compare_strings(x, y),
        }
    }

    /// Where a missing value sorts relative to a present one.
    fn missing_ordering(&self) -> Ordering {
        if self.missing_first {
            Ordering::Less
        } else {
            Ordering::Greater
        }
    }
}

fn file_name(info: &FileInfo) -> String {
    info.path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// A filter and sort specification over a file tree. Tag filters are set
/// operations on a file's tag set: tags must include every `include_tags`
/// entry and none of `exclude_tags`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileQuery {
    pub include_tags: BTreeSet<String>,
    pub exclude_tags: BTreeSet<String>,
    pub sort_by: Vec<FileQuerySort>,
}

impl FileQuery {
    /// Parse the query string form: whitespace-separated terms `tag:a,b`,
    /// `-tag:c`, and `sort:created,-backlinks`. A `+` inside a tag name
    /// decodes to a space; a `-` prefix on a sort field reverses it.
    pub fn parse(query: &str) -> Result<Self> {
        let mut parsed = FileQuery::default();
        for term in query.split_whitespace() {
            if let Some(tags) = term.strip_prefix("tag:") {
                parsed
                    .include_tags
                    .extend(tags.split(',').map(decode_tag).filter(|t| !t.is_empty()));
            } else if let Some(tags) = term.strip_prefix("-tag:") {
                parsed
                    .exclude_tags
                    .extend(tags.split(',').map(decode_tag).filter(|t| !t.is_empty()));
            } else if let Some(fields) = term.strip_prefix("sort:") {
                for field in fields.split(',').filter(|f| !f.is_empty()) {
                    let (name, reverse) = match field.strip_prefix('-') {
                        Some(name) => (name, true),
                        None => (field, false),
                    };
                    let mut sort = FileQuerySort::new(SortField::parse(name)?);
                    sort.reverse = reverse;
                    parsed.sort_by.push(sort);
                }
            } else {
                return Err(Error::Query(format!("unrecognized term '{term}'")));
            }
        }
        if let Some(tag) = parsed.include_tags.intersection(&parsed.exclude_tags).next() {
            return Err(Error::Query(format!(
                "tag '{tag}' is both included and excluded"
            )));
        }
        Ok(parsed)
    }

    /// Whether a file's tag set satisfies the include/exclude filters.
    pub fn matches(&self, info: &FileInfo) -> bool {
        self.include_tags.is_subset(&info.tags) && self.exclude_tags.is_disjoint(&info.tags)
    }

    /// Whether sorting needs backlink counts filled in.
    pub fn needs_backlinks(&self) -> bool {
        self.sort_by
            .iter()
            .any(|sort| sort.field == SortField::Backlinks)
    }

    /// Stable multi-key sort: earlier `sort_by` entries take precedence,
    /// ties keep their input order.
    pub fn apply_sorting(&self, mut infos: Vec<FileInfo>) -> Vec<FileInfo> {
        infos.sort_by(|a, b| {
            for sort in &self.sort_by {
                let ordering = sort.compare(a, b);
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });
        infos
    }
}

fn decode_tag(raw: &str) -> String {
    raw.replace('+', " ").trim().to_lowercase()
}
