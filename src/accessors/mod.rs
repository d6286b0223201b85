//! Per-format file accessors
//!
//! An accessor loads one file, derives its `FileInfo`, applies grouped
//! content edits against the in-memory text, and saves once. Dispatch is a
//! closed table keyed by extension; unrecognized or unreadable files fall
//! back to the opaque variant, which parses to an empty `FileInfo` and
//! accepts no content edits.

pub mod html;
pub mod markdown;

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::models::{FileEditCmd, FileInfo};

pub use html::HtmlAccessor;
pub use markdown::MarkdownAccessor;

pub enum Accessor {
    Markdown(MarkdownAccessor),
    Html(HtmlAccessor),
    Opaque(PathBuf),
}

impl Accessor {
    /// Load the accessor for `path`, chosen by extension. Files that cannot
    /// be read as UTF-8 text degrade to `Opaque` rather than failing, so a
    /// malformed file never blocks indexing of the rest of the tree.
    pub fn open(path: &Path) -> Accessor {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());
        match extension.as_deref() {
            Some("md") => match fs::read_to_string(path) {
                Ok(text) => Accessor::Markdown(MarkdownAccessor::new(path, text)),
                Err(_) => Accessor::Opaque(path.to_path_buf()),
            },
            Some("html") | Some("htm") => match fs::read_to_string(path) {
                Ok(text) => Accessor::Html(HtmlAccessor::new(path, text)),
                Err(_) => Accessor::Opaque(path.to_path_buf()),
            },
            _ => Accessor::Opaque(path.to_path_buf()),
        }
    }

    /// Treat `path` as opaque regardless of its extension. Used for paths
    /// matching the configured skip-parse patterns: they still exist and can
    /// be moved, but their content is never inspected.
    pub fn opaque(path: &Path) -> Accessor {
        Accessor::Opaque(path.to_path_buf())
    }

    pub fn path(&self) -> &Path {
        match self {
            Accessor::Markdown(acc) => acc.path(),
            Accessor::Html(acc) => acc.path(),
            Accessor::Opaque(path) => path,
        }
    }

    /// Parse the loaded content into a `FileInfo`. Never fails; malformed
    /// content yields best-effort partial info.
    pub fn info(&self) -> FileInfo {
        match self {
            Accessor::Markdown(acc) => acc.info(),
            Accessor::Html(acc) => acc.info(),
            Accessor::Opaque(path) => FileInfo::new(path.clone()),
        }
    }

    /// Apply one content edit to the in-memory text.
    pub fn edit(&mut self, edit: &FileEditCmd) -> Result<()> {
        match self {
            Accessor::Markdown(acc) => acc.edit(edit),
            Accessor::Html(acc) => acc.edit(edit),
            Accessor::Opaque(path) => Err(Error::Edit {
                path: path.clone(),
                reason: "no parser for this file type".to_string(),
            }),
        }
    }

    /// Write the edited text back to disk.
    pub fn save(&self) -> Result<()> {
        match self {
            Accessor::Markdown(acc) => acc.save(),
            Accessor::Html(acc) => acc.save(),
            Accessor::Opaque(path) => Err(Error::Edit {
                path: path.clone(),
                reason: "opaque files cannot be saved".to_string(),
            }),
        }
    }
}

/// A byte-range replacement within a file's text. Edits are collected per
/// command and applied in reverse offset order so earlier offsets stay
/// valid while later ones are rewritten.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct TextEdit {
    pub start: usize,
    pub len: usize,
    pub text: String,
}

pub(crate) fn apply_text_edits(content: &mut String, mut edits: Vec<TextEdit>) {
    edits.sort_by(|a, b| b.start.cmp(&a.start));
    for edit in edits {
        content.replace_range(edit.start..edit.start + edit.len, &edit.text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn dispatches_by_extension() {
        let dir = TempDir::new().unwrap();
        let md = dir.path().join("note.md");
        let html = dir.path().join("page.html");
        let bin = dir.path().join("image.png");
        fs::write(&md, "# Hi").unwrap();
        fs::write(&html, "<title>Hi</title>").unwrap();
        fs::write(&bin, [0u8, 159, 146, 150]).unwrap();

        assert!(matches!(Accessor::open(&md), Accessor::Markdown(_)));
        assert!(matches!(Accessor::open(&html), Accessor::Html(_)));
        assert!(matches!(Accessor::open(&bin), Accessor::Opaque(_)));
    }

    #[test]
    fn non_utf8_content_degrades_to_opaque() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.md");
        fs::write(&path, [0xffu8, 0xfe, 0x00]).unwrap();
        let accessor = Accessor::open(&path);
        assert!(matches!(accessor, Accessor::Opaque(_)));
        assert!(accessor.info().refs.is_empty());
    }

    #[test]
    fn opaque_rejects_content_edits() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("image.png");
        fs::write(&path, [1u8, 2, 3]).unwrap();
        let mut accessor = Accessor::open(&path);
        let err = accessor
            .edit(&FileEditCmd::SetTitle {
                path: path.clone(),
                title: "x".into(),
            })
            .unwrap_err();
        assert!(matches!(err, Error::Edit { .. }));
    }

    #[test]
    fn text_edits_apply_in_reverse_offset_order() {
        let mut text = "a OLD b OLD c".to_string();
        apply_text_edits(
            &mut text,
            vec![
                TextEdit {
                    start: 2,
                    len: 3,
                    text: "NEW!".into(),
                },
                TextEdit {
                    start: 8,
                    len: 3,
                    text: "NEW!".into(),
                },
            ],
        );
        assert_eq!(text, "a NEW! b NEW! c");
    }
}
