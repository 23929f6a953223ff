//! Command-line interface implementation for stencil-render.
//! Provides argument parsing and help text formatting using clap.

use clap::{error::ErrorKind, Command, CommandFactory, Parser};
use std::path::PathBuf;

/// Command-line arguments structure.
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Renders formation stencils and keeps them rendered while you edit them",
    long_about = None
)]
pub struct Args {
    /// Full or partial stack name. Can be set in .cx.yml
    #[arg(short, long)]
    pub stack: Option<String>,

    /// Formation the stencils belong to. Can be set in .cx.yml
    #[arg(long)]
    pub formation: Option<String>,

    /// Stencil file to render. The file name must match the one in the formation
    #[arg(long, value_name = "FILE", conflicts_with = "stencil_folder")]
    pub stencil_file: Option<PathBuf>,

    /// Render every stencil within the folder
    #[arg(long, value_name = "DIR")]
    pub stencil_folder: Option<PathBuf>,

    /// Use ~/cloud66/formations/<formation>/{stencils,renders} as input and output
    #[arg(long, conflicts_with_all = ["stencil_file", "stencil_folder", "output"])]
    pub default_folders: bool,

    /// Snapshot ID. Defaults to the latest snapshot
    #[arg(long)]
    pub snapshot: Option<String>,

    /// File (single stencil) or folder (stencil folder) to write renders to.
    /// Renders are printed to stdout when missing
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Watch the stencil file or folder and render every change
    #[arg(short, long)]
    pub watch: bool,

    /// Write whatever could be rendered even when there are errors
    #[arg(long)]
    pub ignore_errors: bool,

    /// Write whatever could be rendered even when there are warnings
    #[arg(long)]
    pub ignore_warnings: bool,

    /// Seconds to wait before rendering a newly created stencil
    #[arg(long, value_name = "SECONDS")]
    pub debounce: Option<u64>,

    /// Project configuration file. Defaults to .cx.yml in the current directory
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Base URL of the formations API
    #[arg(long, value_name = "URL")]
    pub api_url: Option<String>,

    /// Render offline with the built-in template engine instead of the API
    #[arg(long)]
    pub local: bool,

    /// YAML or JSON file with values for offline rendering
    #[arg(long, value_name = "FILE", requires = "local")]
    pub context: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,
}

/// The command used to print help when required arguments are missing.
pub fn help_command() -> Command {
    Args::command().help_template(
        r#"{about-section}
{usage-heading} {usage}

{all-args}
{after-help}
"#,
    )
}

/// Parses command line arguments and returns the Args structure.
///
/// # Exits
/// * With status code 1 if required arguments are missing
/// * With clap's default error handling for other argument errors
pub fn get_args() -> Args {
    match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            if e.kind() == ErrorKind::MissingRequiredArgument {
                if let Err(e) = help_command().print_help() {
                    eprintln!("Failed to print help: {e}");
                }
                std::process::exit(1);
            } else {
                e.exit();
            }
        }
    }
}
