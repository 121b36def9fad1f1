//! Read-order driven fetching over the content store and live sources.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use ladle_shared::{
    FetchAttempt, LadleError, PolicyConfig, RawContent, ReadSource, Result, SourceReference,
};
use ladle_storage::ContentStore;

use crate::web::LiveSource;

/// Successful fetch result.
#[derive(Debug)]
pub struct FetchOutcome {
    /// The fetched content.
    pub content: RawContent,
    /// Which source produced it.
    pub origin: ReadSource,
    /// A failed write-back. Never turns the fetch into a failure.
    pub store_error: Option<LadleError>,
}

/// Produces raw content for a reference by walking the policy's read order.
///
/// `File` entries consult the [`ContentStore`]; `Web` entries go to the live
/// source installed for the reference's page type (or the default one).
/// Retries are not attempted here, and neither is the politeness delay: callers
/// invoke [`Fetcher::pause_after_live`] once a live fetch has completed.
#[derive(Clone)]
pub struct Fetcher {
    store: Arc<ContentStore>,
    default_source: Arc<dyn LiveSource>,
    sources: HashMap<String, Arc<dyn LiveSource>>,
    delay: Duration,
    // Shared by every clone so pauses from concurrent fetches queue up.
    pacing: Arc<Mutex<()>>,
}

impl Fetcher {
    /// Create a fetcher with a default live source for every page type.
    pub fn new(store: Arc<ContentStore>, default_source: Arc<dyn LiveSource>) -> Self {
        Self {
            store,
            default_source,
            sources: HashMap::new(),
            delay: Duration::ZERO,
            pacing: Arc::new(Mutex::new(())),
        }
    }

    /// Use `source` for live retrieval of references with `page_type`.
    pub fn with_live_source_for(
        mut self,
        page_type: impl Into<String>,
        source: Arc<dyn LiveSource>,
    ) -> Self {
        self.sources.insert(page_type.into(), source);
        self
    }

    /// Pause for `delay` after each live retrieval.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Wait out the configured delay after a live retrieval.
    ///
    /// Pauses are serialized across all clones of this fetcher, so `n`
    /// concurrent live fetches are followed by `n` consecutive delays.
    pub async fn pause_after_live(&self) {
        if self.delay.is_zero() {
            return;
        }
        let _turn = self.pacing.lock().await;
        debug!(delay_ms = self.delay.as_millis() as u64, "pacing live retrieval");
        tokio::time::sleep(self.delay).await;
    }

    /// The backing store.
    pub fn store(&self) -> &ContentStore {
        &self.store
    }

    fn live_source_for(&self, page_type: &str) -> &Arc<dyn LiveSource> {
        self.sources.get(page_type).unwrap_or(&self.default_source)
    }

    /// Fetch `source` under an already-resolved `policy`.
    ///
    /// The first source in `policy.read_order` that yields content wins. Live
    /// results are written back when `write_contents` is set.
    #[instrument(skip_all, fields(location = %source.location, page_type = %source.page_type))]
    pub async fn fetch(
        &self,
        source: &SourceReference,
        policy: &PolicyConfig,
    ) -> Result<FetchOutcome> {
        let mut attempts = Vec::with_capacity(policy.read_order.len());

        for read_source in &policy.read_order {
            match read_source {
                ReadSource::File => match self.store.read_raw(source, &[ReadSource::File]) {
                    Ok(Some(content)) => {
                        debug!("served from store");
                        return Ok(FetchOutcome {
                            content,
                            origin: ReadSource::File,
                            store_error: None,
                        });
                    }
                    Ok(None) => attempts.push(FetchAttempt {
                        read_source: ReadSource::File,
                        reason: "not in content store".into(),
                    }),
                    Err(e) => attempts.push(FetchAttempt {
                        read_source: ReadSource::File,
                        reason: e.to_string(),
                    }),
                },
                ReadSource::Web => {
                    let live = self.live_source_for(&source.page_type);
                    match live.retrieve(source).await {
                        Ok(body) => {
                            info!(source = live.name(), bytes = body.len(), "retrieved live");
                            let content = RawContent {
                                source: source.clone(),
                                body,
                            };
                            let store_error = self.write_back(&content, policy);
                            return Ok(FetchOutcome {
                                content,
                                origin: ReadSource::Web,
                                store_error,
                            });
                        }
                        Err(e) => {
                            debug!(error = %e, "live retrieval failed");
                            attempts.push(FetchAttempt {
                                read_source: ReadSource::Web,
                                reason: e.to_string(),
                            });
                        }
                    }
                }
            }
        }

        Err(LadleError::Fetch {
            location: source.location.clone(),
            page_type: source.page_type.clone(),
            attempts,
        })
    }

    fn write_back(&self, content: &RawContent, policy: &PolicyConfig) -> Option<LadleError> {
        if !policy.write_contents {
            return None;
        }
        match self.store.write_raw(content, policy) {
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "failed to cache fetched content");
                Some(e)
            }
        }
    }
}
