//! Pipeline Orchestrator (C10): runs `OrganicPlace -> Analyze -> Scan ->
//! Describe -> Render` in strict order, with per-stage skip flags
//! constrained by a workflow mode, and owns error propagation for a run.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::error;

use crate::config::{CollectionConfig, DescribeOptions, ScheduleConfig};
use crate::error::{CollectivistError, ConfigError};
use crate::events::EventBus;
use crate::llm::ModelClient;
use crate::plugins::ScannerRegistry;
use crate::render::Renderer;
use crate::types::PipelineRun;
use crate::{analyzer, organic, scanner_host, store};

/// Which of the three documented workflows a run follows (§4.10). Each
/// mode constrains the effective stage mask differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowMode {
    /// Caller-supplied skip flags are respected as given.
    Manual,
    /// Organic placement is forced off (and `auto_file` with it); the rest
    /// respect caller-supplied flags.
    Scheduled,
    /// Every stage runs regardless of caller-supplied flags.
    Organic,
}

/// Caller-supplied skip flags, before the workflow mode is applied.
#[derive(Debug, Clone, Default)]
pub struct StageFlags {
    pub skip_organic: bool,
    pub skip_analyze: bool,
    pub skip_scan: bool,
    pub skip_describe: bool,
    pub skip_render: bool,
}

/// The stage mask actually applied to a run, after `WorkflowMode` has had
/// its say over the caller's flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageMask {
    pub organic: bool,
    pub analyze: bool,
    pub scan: bool,
    pub describe: bool,
    pub render: bool,
}

impl StageMask {
    pub fn resolve(mode: WorkflowMode, flags: &StageFlags) -> Self {
        match mode {
            WorkflowMode::Manual => Self {
                organic: !flags.skip_organic,
                analyze: !flags.skip_analyze,
                scan: !flags.skip_scan,
                describe: !flags.skip_describe,
                render: !flags.skip_render,
            },
            WorkflowMode::Scheduled => Self {
                organic: false,
                analyze: !flags.skip_analyze,
                scan: !flags.skip_scan,
                describe: !flags.skip_describe,
                render: !flags.skip_render,
            },
            WorkflowMode::Organic => Self {
                organic: true,
                analyze: true,
                scan: true,
                describe: true,
                render: true,
            },
        }
    }
}

/// Per-run knobs beyond the stage mask itself.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub mode: WorkflowMode,
    pub flags: StageFlags,
    pub force_type: Option<String>,
    pub describe: DescribeOptions,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            mode: WorkflowMode::Manual,
            flags: StageFlags::default(),
            force_type: None,
            describe: DescribeOptions::default(),
        }
    }
}

static NEXT_RUN_ID: AtomicU64 = AtomicU64::new(1);

fn config_path(root: &Path) -> PathBuf {
    root.join(".collection").join("collection.yaml")
}

fn load_config(root: &Path) -> crate::error::Result<Option<CollectionConfig>> {
    let path = config_path(root);
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(&path)
        .map_err(|e| CollectivistError::Config(ConfigError::Parse(e.to_string())))?;
    let config: CollectionConfig = serde_yaml::from_str(&contents)
        .map_err(|e| CollectivistError::Config(ConfigError::Parse(e.to_string())))?;
    config
        .validate()
        .map_err(|e| CollectivistError::Config(ConfigError::Invalid(e)))?;
    Ok(Some(config))
}

/// Run the orchestrator's stage sequence once, in strict order. Any stage
/// failure terminates the run: an `error` event is emitted naming the
/// stage and cause, and the error is recorded on the returned `PipelineRun`.
pub async fn run(
    root: &Path,
    registry: &ScannerRegistry,
    client: Option<Arc<dyn ModelClient>>,
    renderers: &[Box<dyn Renderer>],
    bus: Arc<EventBus>,
    options: PipelineOptions,
) -> PipelineRun {
    let run_id = NEXT_RUN_ID.fetch_add(1, Ordering::SeqCst);
    let mut pipeline_run = PipelineRun::new(run_id);
    let mask = StageMask::resolve(options.mode, &options.flags);

    if let Err(e) = run_inner(root, registry, client, renderers, &bus, &options, mask, &mut pipeline_run).await {
        error!(run_id, error = %e, "pipeline run failed");
        bus.error(e.to_string());
        pipeline_run.last_error = Some(e.to_string());
    }

    pipeline_run.finished_at = Some(chrono::Utc::now());
    pipeline_run
}

#[allow(clippy::too_many_arguments)]
async fn run_inner(
    root: &Path,
    registry: &ScannerRegistry,
    client: Option<Arc<dyn ModelClient>>,
    renderers: &[Box<dyn Renderer>],
    bus: &Arc<EventBus>,
    options: &PipelineOptions,
    mask: StageMask,
    pipeline_run: &mut PipelineRun,
) -> crate::error::Result<()> {
    // S0: Organic Placement. Mutates the tree before Analyze/Scan see it.
    if mask.organic {
        pipeline_run.stages_run.push("organic".to_string());
        match load_config(root)? {
            Some(config) => {
                let (items, _overview) = store::load(&scanner_host::index_path(root))?;
                organic::place_new_arrivals(root, &items, &config, client.as_deref(), bus).await?;
            }
            None => {
                bus.info("organic: no collection.yaml yet; nothing to place against");
            }
        }
    }

    // S1: Analyze. No-op if collection.yaml exists and no forced type was given.
    if mask.analyze {
        let existing = config_path(root).exists();
        if existing && options.force_type.is_none() {
            bus.info("analyze: collection.yaml already present; skipping");
        } else {
            pipeline_run.stages_run.push("analyze".to_string());
            analyzer::analyze(
                root,
                registry,
                client.as_deref(),
                options.force_type.as_deref(),
                existing && options.force_type.is_some(),
            )
            .await?;
        }
    }

    // Stages past this point need a resolved config.
    let config = match load_config(root)? {
        Some(config) => config,
        None => {
            if mask.scan || mask.describe || mask.render {
                bus.warn("no collection.yaml found; skipping remaining stages");
            }
            return Ok(());
        }
    };
    let config = if options.mode == WorkflowMode::Scheduled {
        with_auto_file_disabled(config)
    } else {
        config
    };

    let scanner = registry.get(&config.collection_type).ok_or_else(|| {
        CollectivistError::Config(ConfigError::UnknownScannerType(config.collection_type.clone()))
    })?;

    // S2: Scan. Scanning is blocking filesystem/subprocess I/O, so it runs
    // on a blocking thread rather than tying up the async runtime.
    let mut items = if mask.scan {
        pipeline_run.stages_run.push("scan".to_string());
        let scan_root = root.to_path_buf();
        let config_clone = config.clone();
        let scanner_for_blocking = Arc::clone(&scanner);
        let bus_for_blocking = Arc::clone(bus);
        tokio::task::spawn_blocking(move || {
            scanner_host::run(&scan_root, scanner_for_blocking.as_ref(), &config_clone, &bus_for_blocking)
        })
        .await
        .expect("scan task panicked")?
    } else {
        store::load(&scanner_host::index_path(root))?.0
    };

    // S3: Describe. The configured model must answer a minimal probe
    // before any per-item work starts.
    if mask.describe {
        let Some(client) = client.clone() else {
            bus.warn("describe: no model client configured; skipping stage");
            return finish_render(root, &mask, renderers, &config, &items, None, bus, pipeline_run).await;
        };

        if !client.probe().await.unwrap_or(false) {
            return Err(CollectivistError::Config(ConfigError::Invalid(format!(
                "model probe failed; check the configuration resolved for {}",
                config_path(root).display()
            ))));
        }

        pipeline_run.stages_run.push("describe".to_string());
        let index_path = scanner_host::index_path(root);
        let save_path = index_path.clone();
        let save: crate::describer::SaveCallback = Arc::new(move |items| store::save(&save_path, items, None));

        let (described_items, overview) = crate::describer::describe(
            items,
            Arc::clone(&scanner),
            &config,
            client,
            options.describe.max_workers,
            options.describe.few_shot_examples,
            Arc::clone(bus),
            save,
        )
        .await?;
        items = described_items;
        store::save(&index_path, &items, overview.as_deref())?;

        return finish_render(root, &mask, renderers, &config, &items, overview, bus, pipeline_run).await;
    }

    let (_, overview) = store::load(&scanner_host::index_path(root))?;
    finish_render(root, &mask, renderers, &config, &items, overview, bus, pipeline_run).await
}

#[allow(clippy::too_many_arguments)]
async fn finish_render(
    root: &Path,
    mask: &StageMask,
    renderers: &[Box<dyn Renderer>],
    config: &CollectionConfig,
    items: &[crate::types::CollectionItem],
    overview: Option<String>,
    bus: &Arc<EventBus>,
    pipeline_run: &mut PipelineRun,
) -> crate::error::Result<()> {
    if !mask.render {
        return Ok(());
    }
    pipeline_run.stages_run.push("render".to_string());
    bus.set_stage("render", renderers.len() as u64);
    for (i, renderer) in renderers.iter().enumerate() {
        renderer.write(items, config, overview.as_deref(), root)?;
        bus.set_progress(i as u64 + 1, Some(renderer.name()));
    }
    bus.complete_stage(Some(&format!("wrote {} artifacts", renderers.len())));
    Ok(())
}

/// Forces `auto_file` off on a loaded config, for the `scheduled` workflow
/// mode's documented constraint beyond just skipping the Organic stage.
pub fn with_auto_file_disabled(mut config: CollectionConfig) -> CollectionConfig {
    config.schedule = ScheduleConfig {
        auto_file: false,
        ..config.schedule
    };
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_config_rejects_duplicate_categories() {
        let dir = tempfile::tempdir().unwrap();
        let collection_dir = dir.path().join(".collection");
        std::fs::create_dir_all(&collection_dir).unwrap();
        std::fs::write(
            collection_dir.join("collection.yaml"),
            "collection_type: fallback\nname: t\npath: /t\ncategories: [misc, misc]\n",
        )
        .unwrap();

        let result = load_config(dir.path());
        assert!(result.is_err());
    }

    #[test]
    fn manual_mode_respects_all_flags() {
        let flags = StageFlags {
            skip_organic: true,
            skip_describe: true,
            ..Default::default()
        };
        let mask = StageMask::resolve(WorkflowMode::Manual, &flags);
        assert!(!mask.organic);
        assert!(mask.analyze);
        assert!(mask.scan);
        assert!(!mask.describe);
        assert!(mask.render);
    }

    #[test]
    fn scheduled_mode_forces_organic_off_regardless_of_flags() {
        let flags = StageFlags::default();
        let mask = StageMask::resolve(WorkflowMode::Scheduled, &flags);
        assert!(!mask.organic);
        assert!(mask.scan);
    }

    #[test]
    fn organic_mode_forces_everything_on() {
        let flags = StageFlags {
            skip_organic: true,
            skip_analyze: true,
            skip_scan: true,
            skip_describe: true,
            skip_render: true,
        };
        let mask = StageMask::resolve(WorkflowMode::Organic, &flags);
        assert!(mask.organic && mask.analyze && mask.scan && mask.describe && mask.render);
    }

    #[test]
    fn with_auto_file_disabled_clears_the_flag() {
        let mut config = CollectionConfig {
            collection_type: "fallback".into(),
            status: String::new(),
            name: "t".into(),
            path: "/t".into(),
            categories: vec!["misc".into()],
            exclude_hidden: true,
            scanner_config: serde_json::json!({}),
            schedule: ScheduleConfig::default(),
        };
        config.schedule.auto_file = true;
        let disabled = with_auto_file_disabled(config);
        assert!(!disabled.schedule.auto_file);
    }

    #[tokio::test]
    async fn run_with_no_config_present_stops_before_scan() {
        let dir = tempfile::tempdir().unwrap();
        let registry = crate::plugins::default_registry();
        let bus = Arc::new(EventBus::new());
        let renderers: Vec<Box<dyn Renderer>> = Vec::new();
        let options = PipelineOptions {
            mode: WorkflowMode::Manual,
            flags: StageFlags {
                skip_organic: true,
                skip_analyze: true,
                ..Default::default()
            },
            ..Default::default()
        };
        let result = run(dir.path(), &registry, None, &renderers, bus, options).await;
        assert!(result.last_error.is_none());
    }

    #[tokio::test]
    async fn run_analyzes_scans_and_renders_without_a_model_client() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.md"), "# hello\nsome words here").unwrap();
        let registry = crate::plugins::default_registry();
        let bus = Arc::new(EventBus::new());
        let renderers = crate::render::default_renderers();
        let options = PipelineOptions {
            mode: WorkflowMode::Manual,
            flags: StageFlags {
                skip_organic: true,
                skip_describe: true,
                ..Default::default()
            },
            ..Default::default()
        };
        let result = run(dir.path(), &registry, None, &renderers, bus, options).await;
        assert!(result.last_error.is_none(), "{:?}", result.last_error);
        assert!(dir.path().join(".collection/collection.yaml").exists());
        assert!(dir.path().join("COLLECTION.md").exists());
    }
}
