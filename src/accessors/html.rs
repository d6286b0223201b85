//! HTML accessor
//!
//! HTML documents are scanned with regexes rather than a full DOM parse:
//! references are `href`/`src` attribute values, the title is the text of
//! the `<title>` element, and tags come from the keywords meta tag.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;

use super::{apply_text_edits, TextEdit};
use crate::error::{Error, Result};
use crate::models::{FileEditCmd, FileInfo};

static ATTR_REF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)\b(?:href|src)\s*=\s*["']([^"']+)["']"#).unwrap());

static TITLE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").unwrap());

static KEYWORDS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<meta\s[^>]*name\s*=\s*["']keywords["'][^>]*content\s*=\s*["']([^"']*)["']"#)
        .unwrap()
});

pub struct HtmlAccessor {
    path: PathBuf,
    text: String,
}

impl HtmlAccessor {
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
        info.title = TITLE_RE
            .captures(&self.text)
            .map(|capture| capture[1].trim().to_string())
            .filter(|title| !title.is_empty());
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
                let span = TITLE_RE
                    .captures(&self.text)
                    .and_then(|capture| capture.get(1))
                    .map(|group| (group.start(), group.len()));
                match span {
                    Some((start, len)) => {
                        apply_text_edits(
                            &mut self.text,
                            vec![TextEdit {
                                start,
                                len,
                                text: title.clone(),
                            }],
                        );
                        Ok(())
                    }
                    None => Err(Error::Edit {
                        path: self.path.clone(),
                        reason: "document has no <title> element".to_string(),
                    }),
                }
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

/// All `href` and `src` attribute values in the document.
pub fn extract_refs(text: &str) -> BTreeSet<String> {
    ATTR_REF_RE
        .captures_iter(text)
        .map(|capture| capture[1].to_string())
        .collect()
}

/// Lower-cased entries of the keywords meta tag.
pub fn extract_tags(text: &str) -> BTreeSet<String> {
    let mut tags = BTreeSet::new();
    for capture in KEYWORDS_RE.captures_iter(text) {
        for keyword in capture[1].split(',') {
            let keyword = keyword.trim().to_lowercase();
            if !keyword.is_empty() {
                tags.insert(keyword);
            }
        }
    }
    tags
}

fn replace_ref_edits(text: &str, original: &str, replacement: &str) -> Vec<TextEdit> {
    ATTR_REF_RE
        .captures_iter(text)
        .filter_map(|capture| {
            let target = capture.get(1)?;
            (target.as_str() == original).then(|| TextEdit {
                start: target.start(),
                len: target.len(),
                text: replacement.to_string(),
            })
        })
        .collect()
}
