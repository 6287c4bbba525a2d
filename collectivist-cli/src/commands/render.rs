use std::path::PathBuf;

use anyhow::Context;
use clap::Args;

use super::{run_pipeline_with_progress, single_stage_options};

#[derive(Args, Debug)]
pub struct RenderArgs {
    /// Path to the collection (default: current directory)
    #[arg(default_value = ".")]
    pub path: PathBuf,
}

pub async fn run(args: RenderArgs, quiet: bool) -> anyhow::Result<()> {
    let root = std::fs::canonicalize(&args.path)
        .with_context(|| format!("Cannot resolve path: {}", args.path.display()))?;

    let options = single_stage_options(&["render"], None, 5);
    run_pipeline_with_progress(&root, None, options, quiet).await?;

    Ok(())
}
