//! Structured progress events for long-running pipeline stages.
//!
//! The bus is a single-writer, multi-reader broadcast channel: producers
//! call [`EventBus::emit`] and never block on consumers. A consumer that
//! falls behind misses the oldest unread events rather than stalling the
//! pipeline — exactly the semantics `tokio::sync::broadcast` gives a lagging
//! receiver, which is why the bus is built directly on top of it.
//!
//! The CLI attaches an [`IndicatifSink`] that drives progress bars; a push
//! based network surface (out of scope for this crate) would attach its own
//! subscriber the same way, via [`EventBus::subscribe`].

use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

/// Severity of a [`ProgressEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warn,
    Error,
    Success,
}

/// Lifecycle state of a pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageState {
    Pending,
    Active,
    Complete,
    Error,
}

/// Immutable record of pipeline progress, as defined in the data model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub stage: String,
    pub current_item: Option<String>,
    pub i: u64,
    pub n: u64,
    pub pct: f64,
    pub severity: Severity,
    pub message: String,
    pub timestamp_utc: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Value,
}

impl ProgressEvent {
    fn new(stage: &str, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            stage: stage.to_string(),
            current_item: None,
            i: 0,
            n: 0,
            pct: 0.0,
            severity,
            message: message.into(),
            timestamp_utc: Utc::now(),
            metadata: Value::Null,
        }
    }
}

fn derive_pct(i: u64, n: u64) -> f64 {
    if n == 0 {
        0.0
    } else {
        (i as f64 / n as f64) * 100.0
    }
}

/// One-producer-at-a-time, many-consumer event stream.
///
/// Each stage is used through a single `EventBus` instance; callers drive it
/// compositionally with `set_stage` / `set_progress` / `info` / ... rather
/// than constructing `ProgressEvent`s by hand.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ProgressEvent>,
    state: std::sync::Arc<std::sync::Mutex<BusState>>,
}

#[derive(Debug, Default)]
struct BusState {
    stage: String,
    total: u64,
    current: u64,
    stage_state: Option<StageState>,
}

/// Ring-buffer capacity for the broadcast channel. A consumer that falls
/// this far behind the producer starts missing events (signalled by
/// `RecvError::Lagged` on `subscribe()`'s receiver) instead of blocking it.
const DEFAULT_CAPACITY: usize = 1024;

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            state: std::sync::Arc::new(std::sync::Mutex::new(BusState::default())),
        }
    }

    /// Subscribe a new consumer. Each subscriber gets its own lag-tolerant view.
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressEvent> {
        self.sender.subscribe()
    }

    /// Non-blocking emit. A channel with zero subscribers still succeeds —
    /// the bus never requires a listener to make progress.
    pub fn emit(&self, event: ProgressEvent) {
        let _ = self.sender.send(event);
    }

    /// Begin a new stage with an optional total item count.
    pub fn set_stage(&self, stage: &str, total: u64) {
        {
            let mut state = self.state.lock().expect("event bus state poisoned");
            state.stage = stage.to_string();
            state.total = total;
            state.current = 0;
            state.stage_state = Some(StageState::Active);
        }
        let mut event = ProgressEvent::new(stage, Severity::Info, format!("Starting {stage} stage"));
        event.n = total;
        self.emit(event);
    }

    /// Advance progress within the current stage.
    pub fn set_progress(&self, i: u64, item_name: Option<&str>) {
        let (stage, n) = {
            let mut state = self.state.lock().expect("event bus state poisoned");
            state.current = i;
            (state.stage.clone(), state.total)
        };
        let message = match item_name {
            Some(name) => format!("Processing item {i}/{n}: {name}"),
            None => format!("Processing item {i}/{n}"),
        };
        let mut event = ProgressEvent::new(&stage, Severity::Info, message);
        event.current_item = item_name.map(str::to_string);
        event.i = i;
        event.n = n;
        event.pct = derive_pct(i, n);
        self.emit(event);
    }

    pub fn info(&self, msg: impl Into<String>) {
        self.emit_at_current_progress(Severity::Info, msg);
    }

    pub fn warn(&self, msg: impl Into<String>) {
        self.emit_at_current_progress(Severity::Warn, msg);
    }

    pub fn error(&self, msg: impl Into<String>) {
        let stage = {
            let mut state = self.state.lock().expect("event bus state poisoned");
            state.stage_state = Some(StageState::Error);
            state.stage.clone()
        };
        self.emit(ProgressEvent::new(&stage, Severity::Error, msg));
    }

    pub fn success(&self, msg: impl Into<String>) {
        self.emit_at_current_progress(Severity::Success, msg);
    }

    fn emit_at_current_progress(&self, severity: Severity, msg: impl Into<String>) {
        let (stage, i, n) = {
            let state = self.state.lock().expect("event bus state poisoned");
            (state.stage.clone(), state.current, state.total)
        };
        let mut event = ProgressEvent::new(&stage, severity, msg);
        event.i = i;
        event.n = n;
        event.pct = derive_pct(i, n);
        self.emit(event);
    }

    /// Mark the current stage complete. Guarantees `i=n, pct=100, severity=success`.
    pub fn complete_stage(&self, msg: Option<&str>) {
        let (stage, n) = {
            let mut state = self.state.lock().expect("event bus state poisoned");
            state.stage_state = Some(StageState::Complete);
            state.current = state.total;
            (state.stage.clone(), state.total)
        };
        let message = msg
            .map(str::to_string)
            .unwrap_or_else(|| format!("Completed {stage} stage"));
        let mut event = ProgressEvent::new(&stage, Severity::Success, message);
        event.i = n;
        event.n = n;
        event.pct = 100.0;
        self.emit(event);
    }
}

/// CLI consumer: projects the bus onto an `indicatif` progress bar.
///
/// Call [`IndicatifSink::run`] on a spawned task with a receiver from
/// [`EventBus::subscribe`]; it returns once the channel closes.
#[derive(Debug)]
pub struct IndicatifSink {
    bar: ProgressBar,
    quiet: bool,
}

impl IndicatifSink {
    pub fn new(quiet: bool) -> Self {
        Self {
            bar: if quiet {
                ProgressBar::hidden()
            } else {
                ProgressBar::new(0)
            },
            quiet,
        }
    }

    pub async fn run(&self, mut receiver: broadcast::Receiver<ProgressEvent>) {
        let mut last_stage = String::new();
        loop {
            match receiver.recv().await {
                Ok(event) => self.handle(&event, &mut last_stage),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    if !self.quiet {
                        self.bar
                            .println(format!("  (missed {skipped} progress events)"));
                    }
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        self.bar.finish_and_clear();
    }

    fn handle(&self, event: &ProgressEvent, last_stage: &mut String) {
        if event.stage != *last_stage {
            *last_stage = event.stage.clone();
            if event.n > 0 {
                self.bar.set_length(event.n);
                self.bar.set_style(
                    ProgressStyle::with_template(
                        "{spinner:.green} {msg} [{bar:30.cyan/blue}] {pos}/{len}",
                    )
                    .unwrap()
                    .progress_chars("=> "),
                );
            } else {
                self.bar
                    .set_style(ProgressStyle::with_template("{spinner:.green} {msg}").unwrap());
            }
            self.bar.reset();
        }

        self.bar.set_position(event.i);
        match event.severity {
            Severity::Error => self.bar.println(format!("  [X] {}", event.message)),
            Severity::Warn => self.bar.println(format!("  [!] {}", event.message)),
            Severity::Success if event.pct >= 100.0 => {
                self.bar.println(format!("  [OK] {}", event.message));
            }
            _ => self.bar.set_message(event.message.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complete_stage_guarantees_full_progress_success() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.set_stage("scan", 3);
        bus.set_progress(1, Some("a"));
        bus.complete_stage(None);

        rx.try_recv().unwrap(); // stage start
        rx.try_recv().unwrap(); // progress
        let complete = rx.try_recv().unwrap();
        assert_eq!(complete.i, 3);
        assert_eq!(complete.n, 3);
        assert!((complete.pct - 100.0).abs() < f64::EPSILON);
        assert_eq!(complete.severity, Severity::Success);
    }

    #[test]
    fn pct_auto_derives_from_progress() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.set_stage("describe", 4);
        rx.try_recv().unwrap();
        bus.set_progress(2, Some("item"));
        let event = rx.try_recv().unwrap();
        assert!((event.pct - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn emit_without_subscribers_does_not_error() {
        let bus = EventBus::new();
        bus.set_stage("render", 0);
        bus.info("no one is listening");
    }

    #[tokio::test]
    async fn lagging_subscriber_reports_loss_instead_of_blocking_producer() {
        let bus = EventBus::with_capacity(2);
        let rx = bus.subscribe();
        bus.set_stage("describe", 10);
        for i in 1..=10 {
            bus.set_progress(i, None);
        }
        bus.complete_stage(None);

        let sink = IndicatifSink::new(true);
        sink.run(rx).await;
    }
}
