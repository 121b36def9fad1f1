//! Work-queue orchestrator: entrypoints → fetch → parse → transform → ...
//!
//! Every [`SourceReference`] is fetched at most once per run. Transformer
//! outputs are appended to a FIFO queue; the run ends when the queue drains.

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, trace, warn};

use ladle_fetcher::{FetchOutcome, Fetcher};
use ladle_shared::{
    AppConfig, LadleError, PipelineOutput, PolicyConfig, ReadSource, Result, RunConfig,
    SourceReference, StructuredContent,
};

use crate::registry::{ParserRegistry, TransformerRegistry};
use crate::report::{ItemFailure, RunReport};

// ---------------------------------------------------------------------------
// Work items
// ---------------------------------------------------------------------------

/// A unit of pending work.
#[derive(Debug, Clone)]
pub enum WorkItem {
    /// Fetch, parse, then transform.
    Fetch(SourceReference),
    /// Transform already structured content.
    Transform(StructuredContent),
}

impl From<PipelineOutput> for WorkItem {
    fn from(output: PipelineOutput) -> Self {
        match output {
            PipelineOutput::FetchTarget(reference) => Self::Fetch(reference),
            PipelineOutput::TransformTarget(content) => Self::Transform(content),
        }
    }
}

impl fmt::Display for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fetch(reference) => write!(f, "fetch {reference}"),
            Self::Transform(content) => {
                write!(f, "transform {} <{}>", content.source, content.schema_type)
            }
        }
    }
}

/// Lifecycle of a work item. Only traced, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemState {
    Queued,
    Fetching,
    Parsing,
    Transforming,
    Done,
    Failed,
}

impl fmt::Display for ItemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Queued => "queued",
            Self::Fetching => "fetching",
            Self::Parsing => "parsing",
            Self::Transforming => "transforming",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

fn trace_state(reference: &SourceReference, state: ItemState) {
    debug!(location = %reference.location, page_type = %reference.page_type, %state, "item state");
}

fn enqueue(queue: &mut VecDeque<WorkItem>, item: WorkItem) {
    let reference = match &item {
        WorkItem::Fetch(reference) => reference,
        WorkItem::Transform(content) => &content.source,
    };
    trace_state(reference, ItemState::Queued);
    queue.push_back(item);
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Progress callback for reporting run status.
pub trait RunProgress: Send + Sync {
    /// Called when an item leaves the queue for processing.
    fn item_started(&self, item: &WorkItem, queued: usize);
    /// Called when an item is recorded as failed.
    fn item_failed(&self, failure: &ItemFailure);
    /// Called once when the queue has drained.
    fn done(&self, report: &RunReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl RunProgress for SilentProgress {
    fn item_started(&self, _item: &WorkItem, _queued: usize) {}
    fn item_failed(&self, _failure: &ItemFailure) {}
    fn done(&self, _report: &RunReport) {}
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Scheduling knobs for a run.
#[derive(Debug, Clone, Copy)]
pub struct PipelineOptions {
    /// Fetches in flight per batch.
    pub concurrency: usize,
    /// Upper bound on one fetch attempt. `None` waits indefinitely.
    pub fetch_timeout: Option<Duration>,
    /// Extra attempts after a failed fetch.
    pub fetch_retries: u32,
    /// Base pause between attempts, multiplied by the attempt number.
    pub retry_backoff: Duration,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            concurrency: 1,
            fetch_timeout: Some(Duration::from_secs(30)),
            fetch_retries: 0,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

impl From<&RunConfig> for PipelineOptions {
    fn from(config: &RunConfig) -> Self {
        Self {
            concurrency: config.concurrency as usize,
            fetch_timeout: (config.fetch_timeout_secs > 0)
                .then(|| Duration::from_secs(config.fetch_timeout_secs)),
            fetch_retries: config.fetch_retries,
            ..Default::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// A configured run: system policy, fetcher, and both registries.
///
/// The registries are moved in and stay read-only for the pipeline's lifetime.
pub struct Pipeline {
    policy: PolicyConfig,
    fetcher: Fetcher,
    parsers: ParserRegistry,
    transformers: TransformerRegistry,
    options: PipelineOptions,
}

enum InFlight {
    Fetch {
        reference: SourceReference,
        policy: PolicyConfig,
        handle: JoinHandle<Result<FetchOutcome>>,
    },
    Transform(StructuredContent),
}

impl Pipeline {
    /// Build a pipeline, rejecting an invalid system policy up front.
    pub fn new(
        policy: PolicyConfig,
        fetcher: Fetcher,
        parsers: ParserRegistry,
        transformers: TransformerRegistry,
        options: PipelineOptions,
    ) -> Result<Self> {
        policy.validate()?;
        if options.concurrency == 0 {
            return Err(LadleError::config("concurrency must be at least 1"));
        }
        Ok(Self {
            policy,
            fetcher,
            parsers,
            transformers,
            options,
        })
    }

    /// Build a pipeline from a loaded configuration file.
    pub fn from_config(
        config: &AppConfig,
        fetcher: Fetcher,
        parsers: ParserRegistry,
        transformers: TransformerRegistry,
    ) -> Result<Self> {
        config.validate()?;
        Self::new(
            config.policy.policy(),
            fetcher,
            parsers,
            transformers,
            PipelineOptions::from(&config.run),
        )
    }

    /// The effective system policy.
    pub fn policy(&self) -> &PolicyConfig {
        &self.policy
    }

    /// Process `entrypoints` and everything reachable from them.
    ///
    /// Only configuration problems detected before any work starts are
    /// returned as `Err`. Per-item failures land in the report.
    #[instrument(skip_all, fields(entrypoints = entrypoints.len()))]
    pub async fn run(
        &self,
        entrypoints: Vec<SourceReference>,
        progress: &dyn RunProgress,
    ) -> Result<RunReport> {
        if entrypoints.is_empty() {
            return Err(LadleError::config("at least one entrypoint is required"));
        }
        for reference in &entrypoints {
            self.policy.resolve(reference.policy.as_ref())?;
        }

        let start = Instant::now();
        let semaphore = Arc::new(Semaphore::new(self.options.concurrency));
        let mut queue = VecDeque::with_capacity(entrypoints.len());
        for reference in entrypoints {
            enqueue(&mut queue, WorkItem::Fetch(reference));
        }
        let mut visited: HashSet<(String, String)> = HashSet::new();
        let mut report = RunReport::default();

        info!(
            queued = queue.len(),
            concurrency = self.options.concurrency,
            "starting run"
        );

        while !queue.is_empty() {
            // Take a batch from the queue (up to concurrency limit)
            let batch: Vec<WorkItem> = {
                let drain_count = queue.len().min(self.options.concurrency);
                queue.drain(..drain_count).collect()
            };

            let mut in_flight = Vec::with_capacity(batch.len());

            for item in batch {
                if let WorkItem::Fetch(reference) = &item {
                    if !visited.insert(reference.key()) {
                        trace!(%reference, "already visited, skipping");
                        report.stats.duplicates_skipped += 1;
                        continue;
                    }
                }

                progress.item_started(&item, queue.len());

                match item {
                    WorkItem::Fetch(reference) => {
                        let policy = match self.policy.resolve(reference.policy.as_ref()) {
                            Ok(policy) => policy,
                            Err(e) => {
                                record_failure(&mut report, progress, reference, None, &e);
                                continue;
                            }
                        };

                        trace_state(&reference, ItemState::Fetching);
                        let fetcher = self.fetcher.clone();
                        let sem = semaphore.clone();
                        let options = self.options;
                        let task_reference = reference.clone();
                        let task_policy = policy.clone();

                        let handle = tokio::spawn(async move {
                            let _permit = sem.acquire_owned().await.map_err(|e| {
                                LadleError::Storage(format!("fetch slot unavailable: {e}"))
                            })?;
                            fetch_with_retries(&fetcher, &task_reference, &task_policy, options)
                                .await
                        });

                        in_flight.push(InFlight::Fetch {
                            reference,
                            policy,
                            handle,
                        });
                    }
                    WorkItem::Transform(content) => in_flight.push(InFlight::Transform(content)),
                }
            }

            // Collect results in dequeue order
            for flight in in_flight {
                match flight {
                    InFlight::Fetch {
                        reference,
                        policy,
                        handle,
                    } => {
                        let outcome = match handle.await {
                            Ok(outcome) => outcome,
                            Err(e) => Err(LadleError::Storage(format!("fetch task failed: {e}"))),
                        };
                        self.complete_fetch(
                            reference,
                            &policy,
                            outcome,
                            &mut queue,
                            &mut report,
                            progress,
                        );
                    }
                    InFlight::Transform(content) => {
                        self.dispatch(content, &mut queue, &mut report, progress);
                    }
                }
            }
        }

        report.stats.elapsed_ms = start.elapsed().as_millis() as u64;

        info!(
            outputs = report.outputs.len(),
            failures = report.failures.len(),
            fetched = report.stats.fetched,
            duplicates = report.stats.duplicates_skipped,
            elapsed_ms = report.stats.elapsed_ms,
            "run complete"
        );

        progress.done(&report);
        Ok(report)
    }

    /// Parse fetched content and hand it to transform dispatch.
    fn complete_fetch(
        &self,
        reference: SourceReference,
        policy: &PolicyConfig,
        outcome: Result<FetchOutcome>,
        queue: &mut VecDeque<WorkItem>,
        report: &mut RunReport,
        progress: &dyn RunProgress,
    ) {
        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(e) => {
                record_failure(report, progress, reference, None, &e);
                return;
            }
        };

        report.stats.fetched += 1;
        match outcome.origin {
            ReadSource::File => report.stats.from_store += 1,
            ReadSource::Web => report.stats.from_web += 1,
        }
        if let Some(e) = outcome.store_error {
            report.store_errors.push(e.to_string());
        }

        trace_state(&reference, ItemState::Parsing);
        let parsed = self
            .parsers
            .resolve(&reference.page_type)
            .and_then(|parser| parser.parse(&outcome.content));

        let content = match parsed {
            Ok(content) => content,
            Err(e) => {
                record_failure(report, progress, reference, None, &e);
                return;
            }
        };
        report.stats.parsed += 1;

        if policy.write_contents {
            if let Err(e) = self.fetcher.store().write_structured(&content, policy) {
                warn!(%reference, error = %e, "failed to cache structured content");
                report.store_errors.push(e.to_string());
            }
        }

        self.dispatch(content, queue, report, progress);
    }

    /// Run every transformer registered for the content's pair and enqueue
    /// their outputs in registration order.
    fn dispatch(
        &self,
        content: StructuredContent,
        queue: &mut VecDeque<WorkItem>,
        report: &mut RunReport,
        progress: &dyn RunProgress,
    ) {
        trace_state(&content.source, ItemState::Transforming);
        let transformers = self
            .transformers
            .resolve(&content.source.page_type, &content.schema_type);

        let mut produced = 0usize;
        let mut failed = false;

        for transformer in transformers {
            match transformer.transform(&content) {
                Ok(outputs) => {
                    debug!(
                        transformer = transformer.name(),
                        outputs = outputs.len(),
                        "transformed"
                    );
                    produced += outputs.len();
                    for output in outputs {
                        enqueue(queue, WorkItem::from(output));
                    }
                }
                Err(e) => {
                    failed = true;
                    record_failure(
                        report,
                        progress,
                        content.source.clone(),
                        Some(content.schema_type.clone()),
                        &e,
                    );
                }
            }
        }

        if !transformers.is_empty() {
            report.stats.transformed += 1;
        }

        if produced == 0 && !failed {
            debug!(source = %content.source, schema_type = %content.schema_type, "terminal output");
            trace_state(&content.source, ItemState::Done);
            report.outputs.push(content);
        } else if !failed {
            trace_state(&content.source, ItemState::Done);
        }
    }
}

fn record_failure(
    report: &mut RunReport,
    progress: &dyn RunProgress,
    reference: SourceReference,
    schema_type: Option<String>,
    err: &LadleError,
) {
    warn!(%reference, error = %err, "item failed");
    trace_state(&reference, ItemState::Failed);
    let failure = ItemFailure::new(reference, schema_type, err);
    progress.item_failed(&failure);
    report.failures.push(failure);
}

/// Fetch with the per-attempt timeout and linear backoff between attempts,
/// then pace after a live retrieval.
async fn fetch_with_retries(
    fetcher: &Fetcher,
    reference: &SourceReference,
    policy: &PolicyConfig,
    options: PipelineOptions,
) -> Result<FetchOutcome> {
    let mut attempt = 0u32;
    loop {
        let result = match options.fetch_timeout {
            Some(limit) => tokio::time::timeout(limit, fetcher.fetch(reference, policy))
                .await
                .unwrap_or_else(|_| {
                    Err(LadleError::Timeout {
                        location: reference.location.clone(),
                        limit,
                    })
                }),
            None => fetcher.fetch(reference, policy).await,
        };

        // The delay runs outside the timeout; the body is already in hand.
        if matches!(&result, Ok(outcome) if outcome.origin == ReadSource::Web) {
            fetcher.pause_after_live().await;
        }

        match result {
            Err(e) if attempt < options.fetch_retries => {
                attempt += 1;
                warn!(%reference, attempt, error = %e, "fetch failed, retrying");
                tokio::time::sleep(options.retry_backoff * attempt).await;
            }
            other => return other,
        }
    }
}
