use anyhow::Result;
use clap::Parser;
use relink::{Cli, Command, Config, Engine};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };
    let engine = Engine::new(&config)?;

    match &cli.command {
        Command::Mv { src, dest } => cmd::mv::run(&engine, src, dest),
        Command::Query { query } => cmd::query::run(&engine, query.as_deref(), cli.json),
        Command::Tags { query } => cmd::tags::run(&engine, query.as_deref(), cli.json),
        Command::Info { path } => cmd::info::run(&engine, path, cli.json),
        Command::Backlinks { path } => cmd::backlinks::run(&engine, path),
        Command::Title { path, title } => cmd::title::run(&engine, path, title),
    }
}

mod cmd {
    pub mod backlinks;
    pub mod info;
    pub mod mv;
    pub mod query;
    pub mod tags;
    pub mod title;
}
