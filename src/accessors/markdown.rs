//! Markdown accessor
//!
//! References are extracted with plain regex scans over the raw text:
//! inline links `[label](target)` and reference-style definitions
//! `[label]: target`. Tags are `#hashtags` in the body plus any `tags`/
//! `keywords` lists in the YAML front matter. The title comes from the
//! front matter, falling back to the first top-level heading.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use pulldown_cmark::{Event, HeadingLevel, Parser, Tag, TagEnd};
use regex::Regex;
use serde_yaml::{Mapping, Value};

use super::{apply_text_edits, TextEdit};
use crate::error::{Error, Result};
use crate::models::{FileEditCmd, FileInfo};

static INLINE_REF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[[^\]]*\]\(([^)\s]+)\)").unwrap());

static REFSTYLE_REF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\[[^\]]*\]:\s*(\S+)").unwrap());

static TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)(?:^|\s)#([A-Za-z][A-Za-z0-9_-]*)").unwrap());

pub struct MarkdownAccessor {
    path: PathBuf,
    text: String,
}

impl MarkdownAccessor {
    pub(crate) fn new(path: &Path, text: String) -> Self {
        Self {
            path: path.to_path_buf(),
            text,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn info(&self) -> FileInfo {
        let mut info = FileInfo::new(self.path.clone());
        info.refs = extract_refs(&self.text);
        info.tags = extract_tags(&self.text);

        let body = match split_front_matter(&self.text) {
            Some((yaml, body)) => {
                let meta = parse_meta(yaml);
                info.title = meta
                    .get("title")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                info.created = parse_created(&meta);
                info.tags.extend(meta_tags(&meta));
                body
            }
            None => self.text.as_str(),
        };
        if info.title.is_none() {
            info.title = first_heading(body);
        }
        info
    }

    pub fn edit(&mut self, edit: &FileEditCmd) -> Result<()> {
        match edit {
            FileEditCmd::ReplaceRef {
                original,
                replacement,
                ..
            } => {
                let edits = replace_ref_edits(&self.text, original, replacement);
                if edits.is_empty() {
                    return Err(Error::Edit {
                        path: self.path.clone(),
                        reason: format!("reference '{original}' not found"),
                    });
                }
                apply_text_edits(&mut self.text, edits);
                Ok(())
            }
            FileEditCmd::SetTitle { title, .. } => {
                self.text = set_title(&self.text, title);
                Ok(())
            }
            FileEditCmd::Move { .. } => Err(Error::Edit {
                path: self.path.clone(),
                reason: "a move is not a content edit".to_string(),
            }),
        }
    }

    pub fn save(&self) -> Result<()> {
        fs::write(&self.path, &self.text)?;
        Ok(())
    }
}

/// All reference targets found in the document, both inline and
/// reference-style.
pub fn extract_refs(text: &str) -> BTreeSet<String> {
    let mut refs = BTreeSet::new();
    for capture in INLINE_REF_RE.captures_iter(text) {
        refs.insert(capture[1].to_string());
    }
    for capture in REFSTYLE_REF_RE.captures_iter(text) {
        refs.insert(capture[1].to_string());
    }
    refs
}

/// Lower-cased `#hashtags` appearing in the text.
pub fn extract_tags(text: &str) -> BTreeSet<String> {
    TAG_RE
        .captures_iter(text)
        .map(|capture| capture[1].to_lowercase())
        .collect()
}

/// Byte-range edits replacing every link target equal to `original`.
fn replace_ref_edits(text: &str, original: &str, replacement: &str) -> Vec<TextEdit> {
    let mut edits = Vec::new();
    for re in [&*INLINE_REF_RE, &*REFSTYLE_REF_RE] {
        for capture in re.captures_iter(text) {
            let Some(target) = capture.get(1) else {
                continue;
            };
            if target.as_str() == original {
                edits.push(TextEdit {
                    start: target.start(),
                    len: target.len(),
                    text: replacement.to_string(),
                });
            }
        }
    }
    edits
}

/// Split a document into its front matter block and the remaining body.
/// The block must open with `---` on the first line and close with a `---`
/// or `...` line.
fn split_front_matter(text: &str) -> Option<(&str, &str)> {
    let rest = text.strip_prefix("---\n")?;
    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        let trimmed = line.trim_end();
        if trimmed == "---" || trimmed == "..." {
            return Some((&rest[..offset], &rest[offset + line.len()..]));
        }
        offset += line.len();
    }
    None
}

fn parse_meta(yaml: &str) -> Value {
    serde_yaml::from_str(yaml).unwrap_or(Value::Null)
}

fn meta_tags(meta: &Value) -> BTreeSet<String> {
    let mut tags = BTreeSet::new();
    for key in ["tags", "keywords"] {
        match meta.get(key) {
            Some(Value::Sequence(values)) => {
                for value in values {
                    if let Some(tag) = value.as_str() {
                        tags.insert(tag.trim().to_lowercase());
                    }
                }
            }
            Some(Value::String(tag)) => {
                tags.insert(tag.trim().to_lowercase());
            }
            _ => {}
        }
    }
    tags.retain(|tag| !tag.is_empty());
    tags
}

fn parse_created(meta: &Value) -> Option<NaiveDateTime> {
    let text = match meta.get("created")? {
        Value::String(text) => text.trim().to_string(),
        other => serde_yaml::to_string(other).ok()?.trim().to_string(),
    };
    if let Ok(parsed) = DateTime::parse_from_rfc3339(&text) {
        return Some(parsed.naive_local());
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(&text, format) {
            return Some(parsed);
        }
    }
    NaiveDate::parse_from_str(&text, "%Y-%m-%d")
        .ok()?
        .and_hms_opt(0, 0, 0)
}

/// The text of the first top-level heading, if any.
fn first_heading(body: &str) -> Option<String> {
    let mut in_heading = false;
    let mut buffer = String::new();
    for event in Parser::new(body) {
        match event {
            Event::Start(Tag::Heading {
                level: HeadingLevel::H1,
                ..
            }) => {
                in_heading = true;
                buffer.clear();
            }
            Event::Text(text) | Event::Code(text) => {
                if in_heading {
                    buffer.push_str(&text);
                }
            }
            Event::End(TagEnd::Heading(HeadingLevel::H1)) => {
                let title = buffer.trim().to_string();
                if !title.is_empty() {
                    return Some(title);
                }
                in_heading = false;
            }
            _ => {}
        }
    }
    None
}

/// Rewrite (or create) the front matter block with the new title, keeping
/// every other metadata key.
fn set_title(text: &str, title: &str) -> String {
    let (mut meta, body) = match split_front_matter(text) {
        Some((yaml, body)) => (parse_meta(yaml), body),
        None => (Value::Null, text),
    };
    if !matches!(meta, Value::Mapping(_)) {
        meta = Value::Mapping(Mapping::new());
    }
    if let Value::Mapping(map) = &mut meta {
        map.insert(
            Value::String("title".to_string()),
            Value::String(title.to_string()),
        );
    }
    let yaml = serde_yaml::to_string(&meta).unwrap_or_default();
    format!("---\n{yaml}---\n{body}")
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "---\ntitle: An Example\ncreated: 2012-01-09 10:30:00\ntags: [One, two]\n---\n\nSee [other](other.md) and [pic](images/pic%201.png).\n\nBody #tagA text #tag-b\n\n[ref]: ../elsewhere/ref.md\n";

    #[test]
    fn extracts_refs_of_both_forms() {
        let refs = extract_refs(DOC);
        assert!(refs.contains("other.md"));
        assert!(refs.contains("images/pic%201.png"));
        assert!(refs.contains("../elsewhere/ref.md"));
        assert_eq!(refs.len(), 3);
    }

    #[test]
    fn extracts_every_link_on_a_line() {
        let refs = extract_refs("[a](x.md) and [b](y.md)");
        assert!(refs.contains("x.md"));
        assert!(refs.contains("y.md"));
    }

    #[test]
    fn extracts_lowercased_tags() {
        let tags = extract_tags(DOC);
        assert!(tags.contains("taga"));
        assert!(tags.contains("tag-b"));
    }

    #[test]
    fn tag_requires_leading_boundary() {
        let tags = extract_tags("word#notatag #yes\n#start");
        assert!(tags.contains("yes"));
        assert!(tags.contains("start"));
        assert!(!tags.contains("notatag"));
    }

    #[test]
    fn info_merges_front_matter() {
        let accessor = MarkdownAccessor::new(Path::new("/doc.md"), DOC.to_string());
        let info = accessor.info();
        assert_eq!(info.title.as_deref(), Some("An Example"));
        assert_eq!(
            info.created,
            NaiveDate::from_ymd_opt(2012, 1, 9)
                .unwrap()
                .and_hms_opt(10, 30, 0)
        );
        assert!(info.tags.contains("one"));
        assert!(info.tags.contains("two"));
        assert!(info.tags.contains("taga"));
    }

    #[test]
    fn title_falls_back_to_first_heading() {
        let accessor =
            MarkdownAccessor::new(Path::new("/doc.md"), "intro\n\n# The Title\n\nbody".to_string());
        assert_eq!(accessor.info().title.as_deref(), Some("The Title"));
    }

    #[test]
    fn malformed_front_matter_degrades_to_partial_info() {
        let accessor = MarkdownAccessor::new(
            Path::new("/doc.md"),
            "---\n\t: not yaml [\n---\n[a](b.md)".to_string(),
        );
        let info = accessor.info();
        assert!(info.refs.contains("b.md"));
        assert_eq!(info.title, None);
    }

    #[test]
    fn replace_ref_rewrites_all_matching_targets() {
        let mut accessor = MarkdownAccessor::new(
            Path::new("/doc.md"),
            "[a](old.md) then [b](old.md) but [c](other.md)\n\n[r]: old.md\n".to_string(),
        );
        accessor
            .edit(&FileEditCmd::ReplaceRef {
                path: PathBuf::from("/doc.md"),
                original: "old.md".into(),
                replacement: "new.md".into(),
            })
            .unwrap();
        assert_eq!(
            accessor.text,
            "[a](new.md) then [b](new.md) but [c](other.md)\n\n[r]: new.md\n"
        );
    }

    #[test]
    fn replace_ref_fails_when_target_is_absent() {
        let mut accessor =
            MarkdownAccessor::new(Path::new("/doc.md"), "[a](here.md)".to_string());
        let err = accessor
            .edit(&FileEditCmd::ReplaceRef {
                path: PathBuf::from("/doc.md"),
                original: "gone.md".into(),
                replacement: "new.md".into(),
            })
            .unwrap_err();
        assert!(matches!(err, Error::Edit { .. }));
    }

    #[test]
    fn set_title_updates_existing_front_matter() {
        let updated = set_title(DOC, "New Title");
        assert!(updated.starts_with("---\n"));
        assert!(updated.contains("title: New Title"));
        assert!(updated.contains("created:"));
        assert!(updated.contains("See [other](other.md)"));
    }

    #[test]
    fn set_title_creates_front_matter_when_missing() {
        let updated = set_title("just a body\n", "Fresh");
        assert!(updated.starts_with("---\ntitle: Fresh\n---\n"));
        assert!(updated.ends_with("just a body\n"));
    }
}
