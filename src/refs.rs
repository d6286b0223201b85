//! Reference resolution and construction
//!
//! A reference is the literal target text of a link: the `target` in
//! `[label](target)` or `[label]: target`, or an `href`/`src` attribute
//! value. This module turns reference text into canonical filesystem paths
//! and back:
//! - `referent` resolves a reference against the file containing it
//! - `ref_path` computes the relative path to use between two files
//! - `RefUrl::with_path` rebuilds reference text around a new path while
//!   keeping the original scheme, host, query and fragment

use std::env;
use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

use url::Url;

use crate::error::{Error, Result};

/// The parts of a reference string that matter for rewriting. Only the path
/// component is substituted when a file moves; everything else is carried
/// over into the rewritten reference unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefUrl {
    raw: String,
    scheme: Option<String>,
    host: Option<String>,
    /// Path component, still percent-encoded.
    path: String,
    query: Option<String>,
    fragment: Option<String>,
}

impl RefUrl {
    /// Split reference text into its URL parts. Scheme-qualified references
    /// go through a full URL parse; anything without a scheme is treated as
    /// a relative reference and split on `#` and `?` by hand, since relative
    /// references are not parseable as standalone URLs. Returns `None` for
    /// text that is not a URL at all (e.g. an unclosed IPv6 host).
    pub fn parse(href: &str) -> Option<Self> {
        match Url::parse(href) {
            Ok(url) => Some(RefUrl {
                raw: href.to_string(),
                scheme: Some(url.scheme().to_string()),
                host: url.host_str().map(str::to_string),
                path: url.path().to_string(),
                query: url.query().map(str::to_string),
                fragment: url.fragment().map(str::to_string),
            }),
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                let (rest, fragment) = match href.split_once('#') {
                    Some((rest, fragment)) => (rest, Some(fragment.to_string())),
                    None => (href, None),
                };
                let (path, query) = match rest.split_once('?') {
                    Some((path, query)) => (path, Some(query.to_string())),
                    None => (rest, None),
                };
                Some(RefUrl {
                    raw: href.to_string(),
                    scheme: None,
                    host: None,
                    path: path.to_string(),
                    query,
                    fragment,
                })
            }
            Err(_) => None,
        }
    }

    /// The reference text this value was parsed from.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Resolve this reference relative to the file containing it. Returns
    /// `None` when the reference does not denote a local file: a scheme
    /// other than `file`, a host other than empty/`localhost`, an empty
    /// path, or undecodable percent-escapes.
    pub fn referent(&self, referrer: &Path) -> Option<PathBuf> {
        match self.scheme.as_deref() {
            None | Some("file") => {}
            Some(_) => return None,
        }
        match self.host.as_deref() {
            None | Some("") | Some("localhost") => {}
            Some(_) => return None,
        }
        let decoded = decode_path(&self.path)?;
        if decoded.is_empty() {
            return None;
        }
        let path = PathBuf::from(decoded);
        if path.is_absolute() {
            Some(canonical(&path))
        } else {
            let base = referrer.parent().unwrap_or_else(|| Path::new(""));
            Some(canonical(&base.join(path)))
        }
    }

    /// Substitute `path` as this reference's path component, keeping the
    /// scheme, host, query and fragment. A relative path cannot live inside
    /// a URL that carries a scheme or host, so that combination is an error.
    pub fn with_path(&self, path: &Path) -> Result<String> {
        if (self.scheme.is_some() || self.host.is_some()) && !path.is_absolute() {
            return Err(Error::RelativePathInUrl {
                path: path.to_path_buf(),
                url: self.raw.clone(),
            });
        }
        let mut out = String::new();
        if let Some(scheme) = &self.scheme {
            out.push_str(scheme);
            out.push(':');
        }
        if let Some(host) = &self.host {
            out.push_str("//");
            out.push_str(host);
        }
        out.push_str(&encode_path(path));
        if let Some(query) = &self.query {
            out.push('?');
            out.push_str(query);
        }
        if let Some(fragment) = &self.fragment {
            out.push('#');
            out.push_str(fragment);
        }
        Ok(out)
    }
}

/// Resolve reference text against the file containing it. Convenience
/// wrapper over `RefUrl::parse` + `RefUrl::referent`.
pub fn referent(referrer: &Path, href: &str) -> Option<PathBuf> {
    RefUrl::parse(href)?.referent(referrer)
}

/// The string to use for referring to `path` in a file, optionally rebuilt
/// around the URL parts of an existing reference.
pub fn path_as_ref(path: &Path, template: Option<&RefUrl>) -> Result<String> {
    match template {
        Some(template) => template.with_path(path),
        None => Ok(encode_path(path)),
    }
}

/// The path to use for a reference from file `src` to file `dest`: a
/// relative path to `dest` from the directory containing `src`. Both inputs
/// are canonicalized before the calculation.
pub fn ref_path(src: &Path, dest: &Path) -> PathBuf {
    let src = canonical(src);
    let from_dir = src.parent().unwrap_or(&src);
    relative_to(from_dir, &canonical(dest))
}

/// POSIX relpath arithmetic over two absolute paths: trim the common
/// prefix, then one `..` per remaining source segment followed by the
/// remaining destination segments.
pub fn relative_to(from_dir: &Path, to: &Path) -> PathBuf {
    let from: Vec<Component> = from_dir.components().collect();
    let to: Vec<Component> = to.components().collect();
    let common = from
        .iter()
        .zip(to.iter())
        .take_while(|(a, b)| a == b)
        .count();
    let mut rel = PathBuf::new();
    for _ in common..from.len() {
        rel.push("..");
    }
    for component in &to[common..] {
        rel.push(component.as_os_str());
    }
    if rel.as_os_str().is_empty() {
        rel.push(".");
    }
    rel
}

/// Percent-encode a path for use as a URL path component. `/` separators
/// stay literal; every other reserved character is escaped per segment.
pub fn encode_path(path: &Path) -> String {
    path.to_string_lossy()
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Percent-decode a URL path component; `+` decodes to a space.
fn decode_path(encoded: &str) -> Option<String> {
    let unplussed = encoded.replace('+', " ");
    urlencoding::decode(&unplussed)
        .ok()
        .map(|decoded| decoded.into_owned())
}

/// Resolve symlinks and `.`/`..` segments to an absolute path. A path that
/// does not exist (yet) canonicalizes its deepest existing ancestor and
/// keeps the remaining segments lexically, so rename destinations can be
/// normalized before they are created.
pub fn canonical(path: &Path) -> PathBuf {
    if let Ok(resolved) = dunce::canonicalize(path) {
        return resolved;
    }
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };
    let normalized = lexical_normalize(&absolute);
    let mut pending: Vec<OsString> = Vec::new();
    let mut cursor = normalized.as_path();
    loop {
        if let Ok(base) = dunce::canonicalize(cursor) {
            let mut out = base;
            for name in pending.iter().rev() {
                out.push(name);
            }
            return out;
        }
        match (cursor.parent(), cursor.file_name()) {
            (Some(parent), Some(name)) => {
                pending.push(name.to_os_string());
                cursor = parent;
            }
            _ => break,
        }
    }
    normalized
}

/// Remove `.` segments and fold `..` segments into their parent, without
/// touching the filesystem.
fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}
