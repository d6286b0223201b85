use anyhow::Result;
use relink::{Engine, FileQuery};

pub fn run(engine: &Engine, query: Option<&str>, json: bool) -> Result<()> {
    let query = FileQuery::parse(query.unwrap_or(""))?;
    let results = engine.query(&query);

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }
    for info in results {
        match &info.title {
            Some(title) => println!("{}\t{}", info.path.display(), title),
            None => println!("{}", info.path.display()),
        }
    }
    Ok(())
}
