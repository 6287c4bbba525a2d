pub mod analyze;
pub mod describe;
pub mod render;
pub mod scan;
pub mod update;

use std::path::Path;
use std::sync::Arc;

use clap::Subcommand;
use collectivist_core::events::{EventBus, IndicatifSink};
use collectivist_core::llm::providers::create_client;
use collectivist_core::llm::ModelClient;
use collectivist_core::config::DescribeOptions;
use collectivist_core::pipeline::{self, PipelineOptions, StageFlags, WorkflowMode};
use collectivist_core::plugins::{self, ScannerRegistry};
use collectivist_core::render::{default_renderers, Renderer};
use collectivist_core::types::PipelineRun;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Classify a directory and write its `collection.yaml`
    Analyze(analyze::AnalyzeArgs),
    /// Walk the collection and refresh its index
    Scan(scan::ScanArgs),
    /// Fill in descriptions and categories for undescribed items
    Describe(describe::DescribeArgs),
    /// Regenerate the markdown/html/json/nushell artifacts
    Render(render::RenderArgs),
    /// Run the full pipeline: analyze, scan, describe, render, place new arrivals
    Update(update::UpdateArgs),
}

pub async fn run(cmd: Command, quiet: bool) -> anyhow::Result<()> {
    match cmd {
        Command::Analyze(args) => analyze::run(args, quiet).await,
        Command::Scan(args) => scan::run(args, quiet).await,
        Command::Describe(args) => describe::run(args, quiet).await,
        Command::Render(args) => render::run(args, quiet).await,
        Command::Update(args) => update::run(args, quiet).await,
    }
}

/// Resolve a model client via the discovery precedence chain. Absence of
/// any configuration at all is not an error here — callers that require a
/// client (e.g. `describe`) check for `None` themselves and report it in
/// their own terms.
pub async fn build_client(root: &Path) -> anyhow::Result<Option<Arc<dyn ModelClient>>> {
    match collectivist_core::llm::discovery::discover(root, None) {
        Ok(config) => Ok(Some(Arc::from(create_client(&config)?))),
        Err(collectivist_core::error::CollectivistError::Config(
            collectivist_core::error::ConfigError::NotFound(_),
        )) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn registry() -> ScannerRegistry {
    plugins::default_registry()
}

pub fn renderers() -> Vec<Box<dyn Renderer>> {
    default_renderers()
}

/// Drive one pipeline run with an attached `indicatif` progress consumer,
/// then print the short human-readable summary every subcommand ends with.
pub async fn run_pipeline_with_progress(
    root: &Path,
    client: Option<Arc<dyn ModelClient>>,
    options: PipelineOptions,
    quiet: bool,
) -> anyhow::Result<PipelineRun> {
    let bus = Arc::new(EventBus::new());
    let sink = IndicatifSink::new(quiet);
    let receiver = bus.subscribe();
    let sink_task = tokio::spawn(async move { sink.run(receiver).await });

    let registry = registry();
    let renderers = renderers();
    let result = pipeline::run(root, &registry, client, &renderers, Arc::clone(&bus), options).await;

    drop(bus);
    let _ = sink_task.await;

    if let Some(err) = &result.last_error {
        anyhow::bail!("{err}");
    }

    println!("Stages run: {}", result.stages_run.join(", "));
    if let Some(finished) = result.finished_at {
        let elapsed = finished.signed_duration_since(result.started_at);
        println!("Duration: {}ms", elapsed.num_milliseconds());
    }

    Ok(result)
}

/// Manual-mode options with every stage skipped except the ones named in
/// `only`. Used by the single-stage subcommands.
pub fn single_stage_options(only: &[&str], force_type: Option<String>, max_workers: usize) -> PipelineOptions {
    let flags = StageFlags {
        skip_organic: !only.contains(&"organic"),
        skip_analyze: !only.contains(&"analyze"),
        skip_scan: !only.contains(&"scan"),
        skip_describe: !only.contains(&"describe"),
        skip_render: !only.contains(&"render"),
    };
    PipelineOptions {
        mode: WorkflowMode::Manual,
        flags,
        force_type,
        describe: DescribeOptions {
            max_workers,
            ..DescribeOptions::default()
        },
    }
}
