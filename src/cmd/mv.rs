use std::path::{Path, PathBuf};

use anyhow::Result;
use relink::{refs, Engine};

/// Move a file or folder and update every reference. The realized
/// destination is printed only when it differs from what was asked for:
/// landing inside a requested directory under the original name is the
/// quiet case, a collision-renamed destination is not.
pub fn run(engine: &Engine, src: &Path, dest: &Path) -> Result<()> {
    let realized = engine.move_file(src, dest)?;
    let requested = refs::canonical(dest);
    let into_dir = src.file_name().map(|name| requested.join(name));
    if realized != requested && Some(&realized) != into_dir.as_ref() {
        println!("Moved to: {}", display_relative(&realized).display());
    }
    Ok(())
}

/// Show a path relative to the working directory when it is under it.
fn display_relative(path: &Path) -> PathBuf {
    std::env::current_dir()
        .ok()
        .and_then(|cwd| {
            path.strip_prefix(refs::canonical(&cwd))
                .ok()
                .map(Path::to_path_buf)
        })
        .unwrap_or_else(|| path.to_path_buf())
}
