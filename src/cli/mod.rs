use clap::Parser;
use std::path::PathBuf;

use crate::config::Profile;

pub mod deploy;

#[derive(Parser, Debug)]
#[command(
    name = "deploy",
    version,
    about = "Build, start and health-check the Docker Compose stack"
)]
pub struct Cli {
    /// Target environment
    #[arg(value_enum, default_value_t = Profile::Development)]
    pub environment: Profile,

    /// Prune unused containers, images, volumes and networks after a successful deploy
    #[arg(long)]
    pub cleanup: bool,

    /// Project root (defaults to the current directory)
    #[arg(short = 'C', long)]
    pub project_dir: Option<PathBuf>,

    /// Settings file, relative to the project root
    #[arg(short, long, default_value = "deploy.toml")]
    pub config: PathBuf,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}
