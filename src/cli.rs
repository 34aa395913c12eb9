use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "assetforged")]
#[command(author, version, about = "Derived-asset cache and attachment server")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the attachment server
    Serve {
        /// Host to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Register a file as an attachment and print its id
    Import {
        /// File to import
        #[arg(required = true)]
        file: PathBuf,

        /// Parent attachment id
        #[arg(long)]
        parent: Option<String>,

        /// Title (defaults to the file name)
        #[arg(long)]
        title: Option<String>,

        /// Location tag within the parent; an existing child there is replaced
        #[arg(long)]
        location: Option<String>,

        /// Replace the content of this attachment instead of creating one
        #[arg(long, conflicts_with_all = ["parent", "title", "location"])]
        id: Option<String>,
    },

    /// Resolve a variant of an attachment, generating it if needed
    Variant {
        /// Source attachment id
        id: String,

        /// Profile name
        profile: String,
    },

    /// List configured profiles
    Profiles,

    /// Check that transform tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },
}
