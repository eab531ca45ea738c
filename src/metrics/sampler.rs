//! Sampler Metrics
//!
//! Counters for per-attempt and per-call outcomes of stripe selection, plus a
//! latency histogram. Collectors start unregistered; the process decides
//! which registry exposes them.

use std::time::Duration;

use prometheus::{Histogram, HistogramOpts, IntCounterVec, Opts, Registry};

use crate::error::{Error, Result};

/// Outcome of one selection attempt over a page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptLabel {
    Accepted,
    SkippedInvalid,
    ReapedExpired,
}

impl AttemptLabel {
    fn as_str(&self) -> &'static str {
        match self {
            AttemptLabel::Accepted => "accepted",
            AttemptLabel::SkippedInvalid => "skipped_invalid",
            AttemptLabel::ReapedExpired => "reaped_expired",
        }
    }
}

/// Result of a whole `select_stripe` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionLabel {
    Stripe,
    Reaped,
    ExhaustedListing,
    ExhaustedSampling,
    Cancelled,
    Error,
}

impl SelectionLabel {
    fn as_str(&self) -> &'static str {
        match self {
            SelectionLabel::Stripe => "stripe",
            SelectionLabel::Reaped => "reaped",
            SelectionLabel::ExhaustedListing => "exhausted_listing",
            SelectionLabel::ExhaustedSampling => "exhausted_sampling",
            SelectionLabel::Cancelled => "cancelled",
            SelectionLabel::Error => "error",
        }
    }

    /// Label for a finished call.
    pub fn for_result<T>(result: &Result<Option<T>>) -> Self {
        match result {
            Ok(Some(_)) => SelectionLabel::Stripe,
            Ok(None) => SelectionLabel::Reaped,
            Err(Error::ExhaustedListing { .. }) => SelectionLabel::ExhaustedListing,
            Err(Error::ExhaustedSampling { .. }) => SelectionLabel::ExhaustedSampling,
            Err(Error::Cancelled) => SelectionLabel::Cancelled,
            Err(_) => SelectionLabel::Error,
        }
    }
}

/// Prometheus collectors for the audit cursor
#[derive(Debug, Clone)]
pub struct SamplerMetrics {
    attempts: IntCounterVec,
    selections: IntCounterVec,
    select_duration: Histogram,
}

impl SamplerMetrics {
    /// Create unregistered collectors
    pub fn new() -> Result<Self> {
        let attempts = IntCounterVec::new(
            Opts::new(
                "audit_cursor_attempts_total",
                "Selection attempts by outcome",
            ),
            &["outcome"],
        )
        .map_err(metrics_error)?;

        let selections = IntCounterVec::new(
            Opts::new(
                "audit_cursor_selections_total",
                "Stripe selection calls by result",
            ),
            &["result"],
        )
        .map_err(metrics_error)?;

        let select_duration = Histogram::with_opts(
            HistogramOpts::new(
                "audit_cursor_select_duration_seconds",
                "Time spent in a stripe selection call, including lock wait",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        )
        .map_err(metrics_error)?;

        Ok(Self {
            attempts,
            selections,
            select_duration,
        })
    }

    /// Register all collectors with a registry
    pub fn register(&self, registry: &Registry) -> Result<()> {
        registry
            .register(Box::new(self.attempts.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(self.selections.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(self.select_duration.clone()))
            .map_err(metrics_error)?;
        Ok(())
    }

    pub fn record_attempt(&self, label: AttemptLabel) {
        self.attempts.with_label_values(&[label.as_str()]).inc();
    }

    pub fn record_selection(&self, label: SelectionLabel, elapsed: Duration) {
        self.selections.with_label_values(&[label.as_str()]).inc();
        self.select_duration.observe(elapsed.as_secs_f64());
    }

    pub fn attempts(&self, label: AttemptLabel) -> u64 {
        self.attempts.with_label_values(&[label.as_str()]).get()
    }

    pub fn selections(&self, label: SelectionLabel) -> u64 {
        self.selections.with_label_values(&[label.as_str()]).get()
    }
}

fn metrics_error(e: prometheus::Error) -> Error {
    Error::Internal(format!("metrics: {}", e))
}
