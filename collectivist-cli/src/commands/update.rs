use std::path::PathBuf;

use anyhow::Context;
use clap::Args;

use collectivist_core::config::DescribeOptions;
use collectivist_core::pipeline::{PipelineOptions, StageFlags, WorkflowMode};

use super::{build_client, run_pipeline_with_progress};

#[derive(Args, Debug)]
pub struct UpdateArgs {
    /// Path to the collection (default: current directory)
    #[arg(default_value = ".")]
    pub path: PathBuf,

    #[arg(long)]
    pub skip_analyze: bool,

    #[arg(long)]
    pub skip_scan: bool,

    #[arg(long)]
    pub skip_describe: bool,

    #[arg(long)]
    pub skip_render: bool,

    /// Skip Organic Placer discovery of newly-arrived items
    #[arg(long)]
    pub skip_process_new: bool,

    /// Skip classification and use this scanner name directly
    #[arg(long)]
    pub force_type: Option<String>,

    /// Number of concurrent description workers
    #[arg(long, default_value_t = 5)]
    pub max_workers: usize,
}

pub async fn run(args: UpdateArgs, quiet: bool) -> anyhow::Result<()> {
    let root = std::fs::canonicalize(&args.path)
        .with_context(|| format!("Cannot resolve path: {}", args.path.display()))?;

    let client = build_client(&root).await?;

    let flags = StageFlags {
        skip_organic: args.skip_process_new,
        skip_analyze: args.skip_analyze,
        skip_scan: args.skip_scan,
        skip_describe: args.skip_describe,
        skip_render: args.skip_render,
    };
    let options = PipelineOptions {
        mode: WorkflowMode::Manual,
        flags,
        force_type: args.force_type,
        describe: DescribeOptions {
            max_workers: args.max_workers,
            ..DescribeOptions::default()
        },
    };

    run_pipeline_with_progress(&root, client, options, quiet).await?;

    Ok(())
}
