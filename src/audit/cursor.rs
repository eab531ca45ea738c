//! Audit Cursor - Stripe Sampling
//!
//! Picks one stripe to audit per call. The cursor pages through the segment
//! index, draws a random pointer from the current page, reaps it if it has
//! expired, and otherwise derives a random stripe index inside the pointer's
//! erasure layout.
//!
//! ```text
//!   list(start_after = last_path) ──▶ page ──▶ draw item ──▶ get(path)
//!        ▲  (≤ max_list_attempts)                  ▲           │
//!        │                                         │  invalid  ▼
//!   last_path = page end,                          └──────── classify
//!   or root once the index                   (≤ max_get_attempts)  │
//!   reports no more pages                               expired ───┼──▶ delete, Ok(None)
//!                                                       accepted ──┴──▶ stripe index
//! ```
//!
//! All draws come from a [`RandomSource`]; the default is the operating
//! system CSPRNG. A storage node able to predict which stripes are audited
//! could keep only those.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::domain::pointer::{SegmentPath, SegmentPointer};
use crate::domain::ports::{
    ListPage, ListRequest, OsRandom, RandomSource, RedundancyResolver, SegmentIndex,
};
use crate::ec::ErasureStripeResolver;
use crate::error::{Error, Result};
use crate::metrics::{AttemptLabel, SamplerMetrics, SelectionLabel};

/// Listing attempts before giving up on an empty index
pub const MAX_LIST_ATTEMPTS: usize = 4;

/// Pointer draws per page before giving up on it
pub const MAX_GET_ATTEMPTS: usize = 4;

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the audit cursor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorConfig {
    /// Listing attempts that may return an empty page
    pub max_list_attempts: usize,

    /// Pointer draws per page
    pub max_get_attempts: usize,

    /// Page size hint passed to the index, 0 for the index default
    pub list_page_size: usize,
}

impl Default for CursorConfig {
    fn default() -> Self {
        Self {
            max_list_attempts: MAX_LIST_ATTEMPTS,
            max_get_attempts: MAX_GET_ATTEMPTS,
            list_page_size: 0,
        }
    }
}

impl CursorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_list_attempts == 0 {
            return Err(Error::Config(
                "max_list_attempts must be at least 1".to_string(),
            ));
        }
        if self.max_get_attempts == 0 {
            return Err(Error::Config(
                "max_get_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Stripe
// =============================================================================

/// A stripe selected for audit
#[derive(Debug, Clone)]
pub struct Stripe {
    /// Zero-based stripe number within the segment's erasure layout
    pub index: u64,

    /// The selected pointer
    pub segment: Arc<SegmentPointer>,

    /// Path of the selected pointer
    pub segment_path: SegmentPath,
}

// =============================================================================
// Attempt Outcomes
// =============================================================================

/// Why a pointer cannot be audited
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidReason {
    /// Inline segments have no remote pieces to challenge
    NotRemote,
    /// Placeholder with no bytes
    EmptySegment,
}

impl std::fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvalidReason::NotRemote => write!(f, "not remote"),
            InvalidReason::EmptySegment => write!(f, "zero segment size"),
        }
    }
}

/// Verdict on one drawn pointer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Accepted(SegmentPointer),
    SkippedInvalid(InvalidReason),
    SkippedExpired,
}

/// Classify a fetched pointer at `now`.
///
/// Expiration is checked first: an expired pointer is reaped whatever its
/// kind or size.
pub fn classify(pointer: SegmentPointer, now: DateTime<Utc>) -> Result<AttemptOutcome> {
    if pointer.is_expired_at(now)? {
        return Ok(AttemptOutcome::SkippedExpired);
    }
    if !pointer.is_remote() {
        return Ok(AttemptOutcome::SkippedInvalid(InvalidReason::NotRemote));
    }
    if pointer.segment_size == 0 {
        return Ok(AttemptOutcome::SkippedInvalid(InvalidReason::EmptySegment));
    }
    Ok(AttemptOutcome::Accepted(pointer))
}

/// Result of the selection phase over one page
#[derive(Debug)]
enum SelectionOutcome {
    Accepted {
        path: SegmentPath,
        pointer: SegmentPointer,
    },
    Reaped,
    Exhausted,
}

/// Draw a stripe index for a segment.
///
/// A segment shorter than one stripe only has stripe 0. Otherwise the index
/// is uniform over the whole stripes; a short trailing stripe is never drawn.
pub fn stripe_index(segment_size: u64, stripe_size: u64, random: &dyn RandomSource) -> Result<u64> {
    if stripe_size == 0 {
        return Err(Error::InvalidRedundancy(
            "stripe size must be greater than 0".to_string(),
        ));
    }
    if segment_size < stripe_size {
        return Ok(0);
    }
    random.next_below(segment_size / stripe_size)
}

/// Where the next listing resumes after `page`.
fn next_position(page: &ListPage) -> SegmentPath {
    match page.last_path() {
        Some(last) if page.more => last.clone(),
        _ => SegmentPath::root(),
    }
}

/// Race `fut` against the cancellation token.
async fn cancellable<T, F>(cancel: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        result = fut => result,
    }
}

// =============================================================================
// Cursor
// =============================================================================

/// Pagination position. Only touched while the cursor lock is held.
#[derive(Debug, Default)]
struct CursorState {
    last_path: SegmentPath,
}

/// Samples stripes to audit from a segment index.
///
/// Concurrent callers are serialized: one call holds the lock from listing
/// through stripe derivation.
pub struct Cursor {
    index: Arc<dyn SegmentIndex>,
    resolver: Arc<dyn RedundancyResolver>,
    random: Arc<dyn RandomSource>,
    config: CursorConfig,
    metrics: Option<SamplerMetrics>,
    state: Mutex<CursorState>,
}

impl std::fmt::Debug for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cursor")
            .field("config", &self.config)
            .field("metrics", &self.metrics.is_some())
            .finish()
    }
}

impl Cursor {
    /// Create a cursor over `index` with default settings
    pub fn new(index: Arc<dyn SegmentIndex>) -> Self {
        Self {
            index,
            resolver: Arc::new(ErasureStripeResolver),
            random: Arc::new(OsRandom),
            config: CursorConfig::default(),
            metrics: None,
            state: Mutex::new(CursorState::default()),
        }
    }

    pub fn builder(index: Arc<dyn SegmentIndex>) -> CursorBuilder {
        CursorBuilder::new(index)
    }

    pub fn config(&self) -> &CursorConfig {
        &self.config
    }

    /// Select one stripe to audit.
    ///
    /// Returns `Ok(None)` when the drawn pointer had expired and was deleted;
    /// the caller should simply call again. Exhaustion errors are retriable.
    /// When `cancel` fires the call fails with `Error::Cancelled` and the
    /// pagination position is left where it was.
    #[instrument(skip(self, cancel))]
    pub async fn select_stripe(&self, cancel: &CancellationToken) -> Result<Option<Stripe>> {
        let started = Instant::now();
        let result = self.select_locked(cancel).await;

        if let Some(metrics) = &self.metrics {
            metrics.record_selection(SelectionLabel::for_result(&result), started.elapsed());
        }
        result
    }

    async fn select_locked(&self, cancel: &CancellationToken) -> Result<Option<Stripe>> {
        let mut state =
            cancellable(cancel, async { Ok::<_, Error>(self.state.lock().await) }).await?;

        let page = self.list_page(&state.last_path, cancel).await?;
        let position = next_position(&page);

        match self.sample_page(&page, cancel).await? {
            SelectionOutcome::Accepted { path, pointer } => {
                let index = self.random_stripe_index(&pointer)?;
                state.last_path = position;

                debug!(path = %path, stripe = index, "Selected stripe");
                Ok(Some(Stripe {
                    index,
                    segment: Arc::new(pointer),
                    segment_path: path,
                }))
            }
            SelectionOutcome::Reaped => {
                state.last_path = position;
                Ok(None)
            }
            SelectionOutcome::Exhausted => {
                state.last_path = position;
                Err(Error::ExhaustedSampling {
                    attempts: self.config.max_get_attempts,
                })
            }
        }
    }

    /// Fetch the first non-empty page at or after `last_path`.
    async fn list_page(
        &self,
        last_path: &SegmentPath,
        cancel: &CancellationToken,
    ) -> Result<ListPage> {
        let mut start_after = last_path.clone();

        for attempt in 1..=self.config.max_list_attempts {
            let request = ListRequest::resume_after(start_after.clone())
                .with_limit(self.config.list_page_size);
            let page = cancellable(cancel, self.index.list(&request)).await?;

            if !page.is_empty() {
                return Ok(page);
            }

            debug!(attempt, start_after = %start_after, "Listing returned no pointers");

            // Nothing left past the cursor: wrap around to the start
            if !page.more {
                start_after = SegmentPath::root();
            }
        }

        warn!(
            attempts = self.config.max_list_attempts,
            "Segment index listing exhausted"
        );
        Err(Error::ExhaustedListing {
            attempts: self.config.max_list_attempts,
        })
    }

    /// Draw pointers from `page` until one can be audited.
    async fn sample_page(
        &self,
        page: &ListPage,
        cancel: &CancellationToken,
    ) -> Result<SelectionOutcome> {
        for attempt in 1..=self.config.max_get_attempts {
            let pick = self.random.next_below(page.items.len() as u64)?;
            let item = usize::try_from(pick)
                .ok()
                .and_then(|i| page.items.get(i))
                .ok_or_else(|| {
                    Error::RandomSource(format!(
                        "draw {} outside page of {} items",
                        pick,
                        page.items.len()
                    ))
                })?;

            let pointer = cancellable(cancel, self.index.get(&item.path)).await?;

            match classify(pointer, Utc::now())? {
                AttemptOutcome::SkippedExpired => {
                    info!(path = %item.path, "Deleting expired pointer");
                    cancellable(cancel, self.index.delete(&item.path)).await?;
                    self.record_attempt(AttemptLabel::ReapedExpired);
                    return Ok(SelectionOutcome::Reaped);
                }
                AttemptOutcome::SkippedInvalid(reason) => {
                    debug!(attempt, path = %item.path, %reason, "Skipping pointer");
                    self.record_attempt(AttemptLabel::SkippedInvalid);
                }
                AttemptOutcome::Accepted(pointer) => {
                    self.record_attempt(AttemptLabel::Accepted);
                    return Ok(SelectionOutcome::Accepted {
                        path: item.path.clone(),
                        pointer,
                    });
                }
            }
        }

        warn!(
            attempts = self.config.max_get_attempts,
            items = page.items.len(),
            "No auditable pointer found in page"
        );
        Ok(SelectionOutcome::Exhausted)
    }

    fn random_stripe_index(&self, pointer: &SegmentPointer) -> Result<u64> {
        let scheme = pointer.redundancy().ok_or_else(|| {
            Error::InvalidRedundancy("remote pointer has no redundancy scheme".to_string())
        })?;
        let stripe_size = self.resolver.stripe_size(scheme)?;
        stripe_index(pointer.segment_size, stripe_size, self.random.as_ref())
    }

    fn record_attempt(&self, label: AttemptLabel) {
        if let Some(metrics) = &self.metrics {
            metrics.record_attempt(label);
        }
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Builder for a `Cursor` with non-default collaborators
pub struct CursorBuilder {
    index: Arc<dyn SegmentIndex>,
    resolver: Arc<dyn RedundancyResolver>,
    random: Arc<dyn RandomSource>,
    config: CursorConfig,
    metrics: Option<SamplerMetrics>,
}

impl CursorBuilder {
    pub fn new(index: Arc<dyn SegmentIndex>) -> Self {
        Self {
            index,
            resolver: Arc::new(ErasureStripeResolver),
            random: Arc::new(OsRandom),
            config: CursorConfig::default(),
            metrics: None,
        }
    }

    pub fn config(mut self, config: CursorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn resolver(mut self, resolver: Arc<dyn RedundancyResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn random_source(mut self, random: Arc<dyn RandomSource>) -> Self {
        self.random = random;
        self
    }

    pub fn metrics(mut self, metrics: SamplerMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn build(self) -> Result<Cursor> {
        self.config.validate()?;
        Ok(Cursor {
            index: self.index,
            resolver: self.resolver,
            random: self.random,
            config: self.config,
            metrics: self.metrics,
            state: Mutex::new(CursorState::default()),
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
