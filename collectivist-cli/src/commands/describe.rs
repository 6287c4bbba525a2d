use std::path::PathBuf;

use anyhow::Context;
use clap::Args;

use super::{build_client, run_pipeline_with_progress, single_stage_options};

#[derive(Args, Debug)]
pub struct DescribeArgs {
    /// Path to the collection (default: current directory)
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Number of concurrent description workers
    #[arg(long, default_value_t = 5)]
    pub max_workers: usize,
}

pub async fn run(args: DescribeArgs, quiet: bool) -> anyhow::Result<()> {
    let root = std::fs::canonicalize(&args.path)
        .with_context(|| format!("Cannot resolve path: {}", args.path.display()))?;

    let client = build_client(&root).await?;
    if client.is_none() {
        anyhow::bail!(
            "No model configuration found for {}. Describing items requires an LLM provider \
             (see .collection/collectivist.yaml or the LLM_* environment variables).",
            root.display()
        );
    }

    let options = single_stage_options(&["describe"], None, args.max_workers);
    run_pipeline_with_progress(&root, client, options, quiet).await?;

    Ok(())
}
