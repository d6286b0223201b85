use std::path::Path;

use anyhow::Result;
use relink::Engine;

pub fn run(engine: &Engine, path: &Path, json: bool) -> Result<()> {
    let info = engine.info(path);

    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }
    println!("path: {}", info.path.display());
    if let Some(title) = &info.title {
        println!("title: {title}");
    }
    if let Some(created) = &info.created {
        println!("created: {created}");
    }
    if !info.tags.is_empty() {
        let tags: Vec<&str> = info.tags.iter().map(String::as_str).collect();
        println!("tags: {}", tags.join(", "));
    }
    for href in &info.refs {
        println!("ref: {href}");
    }
    for link in &info.backlinks {
        println!("backlink: {}", link.referrer.display());
    }
    Ok(())
}
