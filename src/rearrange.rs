//! The rearrangement engine
//!
//! `plan_rearrange` turns a rename mapping into the ordered list of edits
//! that realizes it: reference rewrites first (they target the old paths),
//! then the primitive move operations. `moves_for_renames` sequences the
//! raw moves in two phases so that overlapping or cyclic rename sets never
//! overwrite a file before it has been read.

use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::error::Result;
use crate::models::FileEditCmd;
use crate::refs::{self, RefUrl};
use crate::repo::DirectRepo;

/// Moves that will rename a set of files/folders. A path appearing as both
/// a source and a destination vacates through a temporary name: phase 1
/// moves it out of the way, phase 2 moves it to its final destination. Any
/// other source moves directly in phase 1. Sources that do not exist on
/// disk are skipped.
pub fn moves_for_renames(renames: &BTreeMap<PathBuf, PathBuf>) -> Result<Vec<FileEditCmd>> {
    let resolved: BTreeMap<PathBuf, PathBuf> = renames
        .iter()
        .map(|(src, dest)| (refs::canonical(src), refs::canonical(dest)))
        .collect();
    let dests: BTreeSet<&PathBuf> = resolved.values().collect();

    let mut phase1 = Vec::new();
    let mut phase2 = Vec::new();
    for &dest in &dests {
        if let Some(final_dest) = resolved.get(dest) {
            if dest.exists() {
                let temp = reserve_temp(dest)?;
                phase1.push(FileEditCmd::Move {
                    path: dest.clone(),
                    dest: temp.clone(),
                });
                phase2.push(FileEditCmd::Move {
                    path: temp,
                    dest: final_dest.clone(),
                });
            }
        }
    }
    for (src, dest) in &resolved {
        if !dests.contains(src) && src.exists() {
            phase1.push(FileEditCmd::Move {
                path: src.clone(),
                dest: dest.clone(),
            });
        }
    }
    phase1.extend(phase2);
    Ok(phase1)
}

/// Reserve a unique temporary name next to `path` for a chained move. The
/// file is created empty so a concurrent reservation cannot pick the same
/// name; the phase-1 rename replaces it.
fn reserve_temp(path: &Path) -> Result<PathBuf> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let prefix = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp = tempfile::Builder::new()
        .prefix(&prefix)
        .tempfile_in(parent)?;
    let kept = temp.into_temp_path().keep().map_err(io::Error::from)?;
    Ok(kept)
}

/// The full edit list realizing a rename set: every affected reference
/// rewritten, then the sequenced moves.
///
/// Directory sources are expanded so every descendant gets its own entry.
/// For each moved path, its own outbound references are recomputed from its
/// destination (substituting the new location of targets that also move),
/// and every outside referrer is rewritten to point at the destination.
/// Referrers that are themselves in the move set are skipped on the inbound
/// pass: their own outbound pass emits the correct edit.
pub fn plan_rearrange(
    repo: &DirectRepo,
    renames: &BTreeMap<PathBuf, PathBuf>,
) -> Result<Vec<FileEditCmd>> {
    let to_move: BTreeMap<PathBuf, PathBuf> = renames
        .iter()
        .map(|(src, dest)| (refs::canonical(src), refs::canonical(dest)))
        .collect();

    let mut all_moves = to_move.clone();
    for (src, dest) in &to_move {
        if src.is_dir() {
            let walk = WalkDir::new(src).min_depth(1).into_iter();
            for entry in walk.filter_map(|entry| entry.ok()) {
                if let Ok(relative) = entry.path().strip_prefix(src) {
                    all_moves.insert(entry.path().to_path_buf(), dest.join(relative));
                }
            }
        }
    }

    let mut edits = Vec::new();
    for (src, dest) in &all_moves {
        let info = repo.info(src);
        for (target, hrefs) in info.path_refs() {
            let target = all_moves.get(&target).cloned().unwrap_or(target);
            for href in hrefs {
                let url = match RefUrl::parse(&href) {
                    Some(url) => url,
                    None => continue,
                };
                let replacement = url
                    .with_path(&refs::ref_path(dest, &target))
                    .map_err(|err| err.in_reference(src, &href))?;
                if replacement != href {
                    edits.push(FileEditCmd::ReplaceRef {
                        path: src.clone(),
                        original: href,
                        replacement,
                    });
                }
            }
        }
        for referrer in repo.referrers(src) {
            if all_moves.contains_key(&refs::canonical(&referrer)) {
                continue;
            }
            for href in repo.info(&referrer).refs_to_path(src) {
                let url = match RefUrl::parse(&href) {
                    Some(url) => url,
                    None => continue,
                };
                let replacement = url
                    .with_path(&refs::ref_path(&referrer, dest))
                    .map_err(|err| err.in_reference(&referrer, &href))?;
                edits.push(FileEditCmd::ReplaceRef {
                    path: referrer.clone(),
                    original: href,
                    replacement,
                });
            }
        }
    }

    debug!(
        moves = all_moves.len(),
        rewrites = edits.len(),
        "planned rearrangement"
    );
    edits.extend(moves_for_renames(&to_move)?);
    Ok(edits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::error::Error;
    use std::fs;
    use tempfile::TempDir;

    fn repo_for(root: &Path) -> DirectRepo {
        let config = Config {
            roots: vec![root.to_path_buf()],
            ..Config::default()
        };
        DirectRepo::new(&config).unwrap()
    }

    fn write(root: &Path, relative: &str, content: &str) -> PathBuf {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        refs::canonical(&path)
    }

    fn renames(pairs: &[(&PathBuf, PathBuf)]) -> BTreeMap<PathBuf, PathBuf> {
        pairs
            .iter()
            .map(|(src, dest)| ((*src).clone(), dest.clone()))
            .collect()
    }

    #[test]
    fn rewrites_inbound_reference_and_moves_the_file() {
        let dir = TempDir::new().unwrap();
        let subject = write(dir.path(), "foo/subject.md", "");
        let r1 = write(dir.path(), "bar/r1.md", "[x](../foo/subject.md)");
        let repo = repo_for(dir.path());
        let moved = subject.with_file_name("moved.md");

        let edits = plan_rearrange(&repo, &renames(&[(&subject, moved.clone())])).unwrap();

        assert_eq!(edits.len(), 2);
        assert_eq!(
            edits[0],
            FileEditCmd::ReplaceRef {
                path: r1.clone(),
                original: "../foo/subject.md".into(),
                replacement: "../foo/moved.md".into(),
            }
        );
        assert_eq!(
            edits[1],
            FileEditCmd::Move {
                path: subject.clone(),
                dest: moved.clone(),
            }
        );

        repo.change(edits).unwrap();
        assert!(!subject.exists());
        assert!(moved.exists());
        assert_eq!(
            fs::read_to_string(&r1).unwrap(),
            "[x](../foo/moved.md)"
        );
    }

    #[test]
    fn rewrites_outbound_references_of_the_moved_file() {
        let dir = TempDir::new().unwrap();
        let _target = write(dir.path(), "img/pic.png", "");
        let note = write(dir.path(), "notes/note.md", "![p](../img/pic.png)");
        let repo = repo_for(dir.path());
        let dest = refs::canonical(dir.path()).join("archive/deep/note.md");
        fs::create_dir_all(dest.parent().unwrap()).unwrap();

        let edits = plan_rearrange(&repo, &renames(&[(&note, dest.clone())])).unwrap();

        assert_eq!(
            edits[0],
            FileEditCmd::ReplaceRef {
                path: note.clone(),
                original: "../img/pic.png".into(),
                replacement: "../../img/pic.png".into(),
            }
        );

        repo.change(edits).unwrap();
        assert_eq!(
            fs::read_to_string(&dest).unwrap(),
            "![p](../../img/pic.png)"
        );
    }

    #[test]
    fn suppresses_no_op_rewrites() {
        let dir = TempDir::new().unwrap();
        let _target = write(dir.path(), "n/sub/t.md", "");
        let note = write(dir.path(), "n/a.md", "[t](sub/t.md)");
        let repo = repo_for(dir.path());
        // renaming within the same directory keeps every relative offset
        let dest = note.with_file_name("b.md");

        let edits = plan_rearrange(&repo, &renames(&[(&note, dest.clone())])).unwrap();
        assert_eq!(
            edits,
            vec![FileEditCmd::Move {
                path: note,
                dest
            }]
        );
    }

    #[test]
    fn swap_uses_one_temp_hop_per_side() {
        let dir = TempDir::new().unwrap();
        let a = write(dir.path(), "a.md", "alpha");
        let b = write(dir.path(), "b.md", "beta");
        let repo = repo_for(dir.path());

        let edits =
            plan_rearrange(&repo, &renames(&[(&a, b.clone()), (&b, a.clone())])).unwrap();

        let moves: Vec<_> = edits.iter().filter(|edit| edit.is_move()).collect();
        assert_eq!(moves.len(), 4);

        repo.change(edits).unwrap();
        assert_eq!(fs::read_to_string(&a).unwrap(), "beta");
        assert_eq!(fs::read_to_string(&b).unwrap(), "alpha");
        // no temporary files left behind
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                let name = entry.file_name();
                let name = name.to_string_lossy().into_owned();
                name != "a.md" && name != "b.md"
            })
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn chained_renames_do_not_clobber() {
        let dir = TempDir::new().unwrap();
        let a = write(dir.path(), "a.md", "from a");
        let b = write(dir.path(), "b.md", "from b");
        let c = refs::canonical(dir.path()).join("c.md");
        let repo = repo_for(dir.path());

        let edits =
            plan_rearrange(&repo, &renames(&[(&a, b.clone()), (&b, c.clone())])).unwrap();
        repo.change(edits).unwrap();

        assert!(!a.exists());
        assert_eq!(fs::read_to_string(&b).unwrap(), "from a");
        assert_eq!(fs::read_to_string(&c).unwrap(), "from b");
    }

    #[test]
    fn directory_move_keeps_internal_references_and_rewrites_external_ones() {
        let dir = TempDir::new().unwrap();
        let root = refs::canonical(dir.path());
        let inner = write(dir.path(), "old/inner.md", "[s](sibling.md)");
        let _sibling = write(dir.path(), "old/sibling.md", "");
        let outside = write(dir.path(), "outside.md", "[i](old/inner.md)");
        let old_dir = root.join("old");
        let new_dir = root.join("new");
        let repo = repo_for(dir.path());

        let mapping = renames(&[(&old_dir, new_dir.clone())]);
        let edits = plan_rearrange(&repo, &mapping).unwrap();

        // the internal relative reference needs no rewrite
        assert!(edits.iter().all(|edit| edit.path() != inner.as_path()));

        repo.change(edits).unwrap();
        assert!(!old_dir.exists());
        assert_eq!(
            fs::read_to_string(new_dir.join("inner.md")).unwrap(),
            "[s](sibling.md)"
        );
        assert_eq!(
            fs::read_to_string(&outside).unwrap(),
            "[i](new/inner.md)"
        );
    }

    #[test]
    fn sibling_movers_with_diverging_destinations_rewrite_each_other() {
        let dir = TempDir::new().unwrap();
        let root = refs::canonical(dir.path());
        let a = write(dir.path(), "pair/a.md", "[b](b.md)");
        let b = write(dir.path(), "pair/b.md", "");
        fs::create_dir_all(root.join("left")).unwrap();
        fs::create_dir_all(root.join("right")).unwrap();
        let a_dest = root.join("left/a.md");
        let b_dest = root.join("right/b.md");
        let repo = repo_for(dir.path());

        let mapping = renames(&[(&a, a_dest.clone()), (&b, b_dest.clone())]);
        let edits = plan_rearrange(&repo, &mapping).unwrap();

        // exactly one rewrite: a's outbound link, computed from its new home
        let rewrites: Vec<_> = edits.iter().filter(|edit| !edit.is_move()).collect();
        assert_eq!(
            rewrites,
            vec![&FileEditCmd::ReplaceRef {
                path: a.clone(),
                original: "b.md".into(),
                replacement: "../right/b.md".into(),
            }]
        );

        repo.change(edits).unwrap();
        assert_eq!(
            fs::read_to_string(&a_dest).unwrap(),
            "[b](../right/b.md)"
        );
    }

    #[test]
    fn dangling_references_are_left_untouched() {
        let dir = TempDir::new().unwrap();
        let subject = write(dir.path(), "subject.md", "");
        let referrer = write(dir.path(), "r.md", "[gone](missing.md) [s](subject.md)");
        let repo = repo_for(dir.path());
        let dest = subject.with_file_name("renamed.md");

        let edits = plan_rearrange(&repo, &renames(&[(&subject, dest)])).unwrap();
        let rewrites: Vec<_> = edits.iter().filter(|edit| !edit.is_move()).collect();
        assert_eq!(rewrites.len(), 1);
        assert_eq!(
            rewrites[0],
            &FileEditCmd::ReplaceRef {
                path: referrer.clone(),
                original: "subject.md".into(),
                replacement: "renamed.md".into(),
            }
        );
    }

    #[test]
    fn scheme_qualified_reference_fails_with_context() {
        let dir = TempDir::new().unwrap();
        let subject = write(dir.path(), "subject.md", "");
        let referrer_text = format!("[s](file://localhost{})", subject.display());
        let referrer = write(dir.path(), "r.md", &referrer_text);
        let repo = repo_for(dir.path());
        let dest = subject.with_file_name("renamed.md");

        let err = plan_rearrange(&repo, &renames(&[(&subject, dest)])).unwrap_err();
        match err {
            Error::RefRewrite {
                file, reference, ..
            } => {
                assert_eq!(file, referrer);
                assert!(reference.starts_with("file://localhost"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rewrite_preserves_fragments() {
        let dir = TempDir::new().unwrap();
        let subject = write(dir.path(), "foo/subject.md", "");
        let referrer = write(dir.path(), "bar/r.md", "[x](../foo/subject.md#part)");
        let repo = repo_for(dir.path());
        let dest = subject.with_file_name("moved.md");

        let edits = plan_rearrange(&repo, &renames(&[(&subject, dest)])).unwrap();
        repo.change(edits).unwrap();
        assert_eq!(
            fs::read_to_string(&referrer).unwrap(),
            "[x](../foo/moved.md#part)"
        );
    }

    #[test]
    fn missing_sources_generate_no_moves() {
        let dir = TempDir::new().unwrap();
        let ghost = refs::canonical(dir.path()).join("ghost.md");
        let mapping = renames(&[(&ghost, ghost.with_file_name("other.md"))]);
        assert!(moves_for_renames(&mapping).unwrap().is_empty());
    }

    #[test]
    fn percent_encoded_references_round_trip_through_a_move() {
        let dir = TempDir::new().unwrap();
        let subject = write(dir.path(), "foo/has space.md", "");
        let referrer = write(dir.path(), "bar/r.md", "[x](../foo/has%20space.md)");
        let repo = repo_for(dir.path());
        let dest = subject.with_file_name("still has space.md");

        let edits = plan_rearrange(&repo, &renames(&[(&subject, dest.clone())])).unwrap();
        repo.change(edits).unwrap();
        assert_eq!(
            fs::read_to_string(&referrer).unwrap(),
            "[x](../foo/still%20has%20space.md)"
        );
        assert!(dest.exists());
    }
}
