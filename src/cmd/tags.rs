use anyhow::Result;
use relink::{Engine, FileQuery};

pub fn run(engine: &Engine, query: Option<&str>, json: bool) -> Result<()> {
    let query = FileQuery::parse(query.unwrap_or(""))?;
    let counts = engine.tag_counts(&query);

    if json {
        println!("{}", serde_json::to_string_pretty(&counts)?);
        return Ok(());
    }
    for (tag, count) in counts {
        println!("{count}\t{tag}");
    }
    Ok(())
}
