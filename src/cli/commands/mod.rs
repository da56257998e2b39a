//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod annotate;
mod config_cmd;
mod generate;
mod health;
mod helpers;
mod library;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{load_settings_with_options, LoadOptions};

#[derive(Parser)]
#[command(name = "memoir")]
#[command(about = "Personal biography generation from life-story photos")]
#[command(version)]
pub struct Cli {
    /// Data directory (overrides config file)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a biography from photos and requirements
    Generate {
        /// Photo to include (repeat for each, at least 9)
        #[arg(short, long = "image", value_name = "PATH", required = true)]
        images: Vec<PathBuf>,

        /// What the biography should cover
        #[arg(short, long)]
        requirements: String,

        /// Template style sent with the generation request
        #[arg(long, default_value = "classic")]
        template_style: String,

        /// Output language sent with the generation request
        #[arg(long, default_value = "en")]
        language: String,

        /// Annotate each photo interactively before submitting
        #[arg(long)]
        annotate: bool,
    },

    /// List stored biographies
    List,

    /// Show biography metadata and a narrative preview
    Show {
        /// Biography id
        id: String,
    },

    /// Rename a stored biography
    Rename {
        /// Biography id
        id: String,
        /// New title
        title: String,
    },

    /// Replace the cover thumbnail with an image from disk
    SetCover {
        /// Biography id
        id: String,
        /// Image file (JPEG or PNG)
        image: PathBuf,
    },

    /// Delete a stored biography and its files
    Delete {
        /// Biography id
        id: String,
    },

    /// Delete all stored biographies and annotations
    Clear {
        /// Skip confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// Annotate photos with time periods and activities
    Annotate {
        /// Photo to annotate (repeat for each)
        #[arg(short, long = "image", value_name = "PATH", required = true)]
        images: Vec<PathBuf>,
    },

    /// Check whether the remote generation service is reachable
    Health,

    /// Print the effective configuration
    Config,
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let options = LoadOptions {
        config_path: cli.config,
        data_dir: cli.data_dir,
    };
    let (settings, config) = load_settings_with_options(options).await;

    match cli.command {
        Commands::Generate {
            images,
            requirements,
            template_style,
            language,
            annotate,
        } => {
            generate::cmd_generate(
                &settings,
                &images,
                &requirements,
                template_style,
                language,
                annotate,
            )
            .await
        }
        Commands::List => library::cmd_list(&settings).await,
        Commands::Show { id } => library::cmd_show(&settings, &id).await,
        Commands::Rename { id, title } => library::cmd_rename(&settings, &id, &title).await,
        Commands::SetCover { id, image } => library::cmd_set_cover(&settings, &id, &image).await,
        Commands::Delete { id } => library::cmd_delete(&settings, &id).await,
        Commands::Clear { yes } => library::cmd_clear(&settings, yes).await,
        Commands::Annotate { images } => annotate::cmd_annotate(&settings, &images).await,
        Commands::Health => health::cmd_health(&settings).await,
        Commands::Config => config_cmd::cmd_config(&settings, &config).await,
    }
}
