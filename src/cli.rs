//! Command-line interface definitions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Index a flat-file page tree and query its routes and collections
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Project root (default: current directory)
    #[arg(short, long)]
    pub root: Option<PathBuf>,

    /// Config file name, relative to the root
    #[arg(short = 'C', long, default_value = crate::config::CONFIG_FILE)]
    pub config: PathBuf,

    /// Suppress log output
    #[arg(short, long)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Build the index (or reuse the cached snapshot) and report
    Build,

    /// Print every registered route with its page
    Routes,

    /// Resolve a request route, following redirects and rewrites
    Find {
        route: String,
    },

    /// Print the page tree
    Tree {
        /// Show raw (folder) routes
        #[arg(long)]
        raw: bool,

        /// Include modular pages when hiding non-routable ones
        #[arg(long)]
        modular: bool,

        /// Only routable pages
        #[arg(long)]
        routable: bool,

        /// Maximum depth
        #[arg(short, long)]
        depth: Option<usize>,
    },

    /// Evaluate collection parameters from a YAML file
    Collection {
        params: PathBuf,

        /// Route of the current page (`@self`)
        #[arg(long)]
        current: Option<String>,

        /// Page number for pagination
        #[arg(long, default_value_t = 1)]
        page: usize,
    },

    /// Rebuild the index whenever pages or the config change
    Watch,
}
