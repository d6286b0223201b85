use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// relink - move and rename notes without breaking the links between them
///
/// ## Moving files
///
/// ```bash
/// relink mv notes/idea.md notes/archive/        # move into a directory
/// relink mv notes/idea.md notes/big-idea.md     # rename, rewriting links
/// relink mv notes/project/ archive/project/     # move a whole subtree
/// ```
///
/// Every Markdown/HTML file under the configured roots that links to the
/// moved path is rewritten to point at the new location, and the moved
/// file's own relative links are recomputed from its new home.
///
/// ## Queries
///
/// ```bash
/// relink query "tag:rust -tag:draft"            # filter by tags
/// relink query "sort:-backlinks"                # most linked-to first
/// relink tags                                   # tag usage counts
/// relink info notes/idea.md                     # one file's summary
/// relink backlinks notes/idea.md                # who links here
/// ```
///
/// Query strings combine `tag:a,b` (must carry all), `-tag:c` (must carry
/// none), and `sort:` over path, filename, title, created, tags, and
/// backlinks; a leading `-` on a sort field reverses it.
///
/// ## Configuration
///
/// Roots, exclusion filters, and the edit log live in
/// `~/.config/relink/config.toml` (override with `--config` or the
/// `RELINK_CONFIG` environment variable). Without a config file the
/// current directory is indexed.
#[derive(Parser, Debug)]
#[command(name = "relink")]
#[command(version)]
#[command(about = "Move and rename notes without breaking the links between them")]
pub struct Cli {
    /// Config file to use (default: ~/.config/relink/config.toml)
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Output in JSON format (for scripting)
    #[arg(short = 'j', long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Move a file or directory and update all references to it
    Mv {
        /// File or folder to move
        src: PathBuf,

        /// New filename or existing parent folder
        dest: PathBuf,
    },

    /// List files matching a query
    #[command(alias = "q")]
    Query {
        /// Filter and sort spec, e.g. "tag:rust -tag:draft sort:-backlinks"
        query: Option<String>,
    },

    /// Count tag usage across matching files
    Tags {
        /// Optional filter applied before counting
        query: Option<String>,
    },

    /// Show one file's parsed summary (tags, title, links, backlinks)
    Info {
        /// File to inspect
        path: PathBuf,
    },

    /// List the files whose content links to a path
    Backlinks {
        /// Link target to look up
        path: PathBuf,
    },

    /// Set a file's title metadata
    Title {
        /// File to retitle
        path: PathBuf,

        /// New title
        title: String,
    },
}
