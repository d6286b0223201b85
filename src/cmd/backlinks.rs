use std::path::Path;

use anyhow::Result;
use relink::Engine;

pub fn run(engine: &Engine, path: &Path) -> Result<()> {
    for link in engine.backlinks(path) {
        println!("{}: {}", link.referrer.display(), link.href);
    }
    Ok(())
}
