use std::path::Path;

use anyhow::Result;
use relink::Engine;

pub fn run(engine: &Engine, path: &Path, title: &str) -> Result<()> {
    engine.set_title(path, title)?;
    Ok(())
}
