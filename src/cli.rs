use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::reference::{DEFAULT_SHOWCASE_BASE_URL, ReferenceType};

#[derive(Parser, Debug)]
#[command(
    name = "model-reference",
    version,
    about = "Convert legacy model reference databases to the strict schema"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Convert(ConvertArgs),
    Status(StatusArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ConvertArgs {
    #[arg(long, default_value = "horde_model_reference/legacy")]
    pub legacy_folder: PathBuf,

    #[arg(long, default_value = "horde_model_reference")]
    pub target_folder: PathBuf,

    #[arg(long, value_enum, default_value_t = ReferenceType::StableDiffusion)]
    pub reference_type: ReferenceType,

    /// Defaults to `<target-folder>/showcase`.
    #[arg(long)]
    pub showcase_root: Option<PathBuf>,

    #[arg(long, default_value = DEFAULT_SHOWCASE_BASE_URL)]
    pub showcase_base_url: String,

    /// Flag conditions that are otherwise tolerated.
    #[arg(long, default_value_t = false)]
    pub debug: bool,

    /// Do not print findings to stdout as they occur.
    #[arg(long, default_value_t = false)]
    pub quiet: bool,

    #[arg(long, default_value_t = false)]
    pub dry_run: bool,

    #[arg(long)]
    pub report_path: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long)]
    pub report_path: PathBuf,
}
