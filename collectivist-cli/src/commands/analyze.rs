use std::path::PathBuf;

use anyhow::Context;
use clap::Args;

use super::{build_client, run_pipeline_with_progress, single_stage_options};

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Path to the directory to analyze (default: current directory)
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Skip classification and use this scanner name directly
    #[arg(long)]
    pub force_type: Option<String>,
}

pub async fn run(args: AnalyzeArgs, quiet: bool) -> anyhow::Result<()> {
    let root = std::fs::canonicalize(&args.path)
        .with_context(|| format!("Cannot resolve path: {}", args.path.display()))?;

    let client = build_client(&root).await?;
    let options = single_stage_options(&["analyze"], args.force_type, 5);
    run_pipeline_with_progress(&root, client, options, quiet).await?;

    Ok(())
}
