pub mod accessors;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod rearrange;
pub mod refs;
pub mod repo;

pub use cli::{Cli, Command};
pub use config::Config;
pub use engine::Engine;
pub use error::{Error, Result};
pub use models::{FileEditCmd, FileInfo, FileQuery, LinkInfo};
pub use rearrange::{moves_for_renames, plan_rearrange};
pub use repo::DirectRepo;
