//! Redundancy Strategy
//!
//! Validates a segment's redundancy scheme and derives the geometry of its
//! erasure layout. A stripe is one erasure share from each of the
//! `min_required` data pieces, so its size is `erasure_share_size *
//! min_required`.

use tracing::{debug, instrument};

use crate::domain::pointer::RedundancyScheme;
use crate::domain::ports::RedundancyResolver;
use crate::error::{Error, Result};

/// Largest piece count a GF(2^8) Reed-Solomon code supports.
pub const MAX_TOTAL_PIECES: u32 = 256;

// =============================================================================
// Redundancy Strategy
// =============================================================================

/// Validated erasure layout of a segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedundancyStrategy {
    /// Pieces needed to reconstruct (k)
    required: u32,
    /// Pieces produced (k + m)
    total: u32,
    repair_threshold: u32,
    optimal_threshold: u32,
    erasure_share_size: u32,
}

impl RedundancyStrategy {
    /// Validate a scheme and build its strategy.
    ///
    /// Zero thresholds default to `min_required` (repair) and `total`
    /// (success).
    pub fn from_scheme(scheme: &RedundancyScheme) -> Result<Self> {
        let required = scheme.min_required;
        let total = scheme.total;

        if required == 0 {
            return Err(Error::InvalidRedundancy(
                "min_required must be greater than 0".to_string(),
            ));
        }
        if total == 0 {
            return Err(Error::InvalidRedundancy(
                "total must be greater than 0".to_string(),
            ));
        }
        if required > total {
            return Err(Error::InvalidRedundancy(format!(
                "min_required {} exceeds total {}",
                required, total
            )));
        }
        if total > MAX_TOTAL_PIECES {
            return Err(Error::InvalidRedundancy(format!(
                "total {} exceeds maximum of {}",
                total, MAX_TOTAL_PIECES
            )));
        }
        if scheme.erasure_share_size == 0 {
            return Err(Error::InvalidRedundancy(
                "erasure_share_size must be greater than 0".to_string(),
            ));
        }

        let repair_threshold = match scheme.repair_threshold {
            0 => required,
            t => t,
        };
        let optimal_threshold = match scheme.success_threshold {
            0 => total,
            t => t,
        };

        if repair_threshold < required {
            return Err(Error::InvalidRedundancy(format!(
                "repair threshold {} less than required count {}",
                repair_threshold, required
            )));
        }
        if repair_threshold > total {
            return Err(Error::InvalidRedundancy(format!(
                "repair threshold {} greater than total count {}",
                repair_threshold, total
            )));
        }
        if optimal_threshold < required {
            return Err(Error::InvalidRedundancy(format!(
                "success threshold {} less than required count {}",
                optimal_threshold, required
            )));
        }
        if optimal_threshold > total {
            return Err(Error::InvalidRedundancy(format!(
                "success threshold {} greater than total count {}",
                optimal_threshold, total
            )));
        }
        if repair_threshold > optimal_threshold {
            return Err(Error::InvalidRedundancy(format!(
                "repair threshold {} greater than success threshold {}",
                repair_threshold, optimal_threshold
            )));
        }

        Ok(Self {
            required,
            total,
            repair_threshold,
            optimal_threshold,
            erasure_share_size: scheme.erasure_share_size,
        })
    }

    /// Pieces needed to reconstruct the segment
    pub fn required_count(&self) -> u32 {
        self.required
    }

    /// Pieces produced by encoding
    pub fn total_count(&self) -> u32 {
        self.total
    }

    pub fn repair_threshold(&self) -> u32 {
        self.repair_threshold
    }

    pub fn optimal_threshold(&self) -> u32 {
        self.optimal_threshold
    }

    /// Parity pieces (m)
    pub fn parity_count(&self) -> u32 {
        self.total - self.required
    }

    /// Size in bytes of one share
    pub fn erasure_share_size(&self) -> u32 {
        self.erasure_share_size
    }

    /// Size in bytes of one stripe
    pub fn stripe_size(&self) -> u64 {
        u64::from(self.erasure_share_size) * u64::from(self.required)
    }

    /// Number of whole stripes in a segment; a short trailing stripe is not
    /// counted.
    pub fn full_stripes(&self, segment_size: u64) -> u64 {
        segment_size / self.stripe_size()
    }
}

// =============================================================================
// Resolver
// =============================================================================

/// Resolves stripe sizes through `RedundancyStrategy`
#[derive(Debug, Clone, Copy, Default)]
pub struct ErasureStripeResolver;

impl RedundancyResolver for ErasureStripeResolver {
    #[instrument(level = "trace", skip(self))]
    fn stripe_size(&self, scheme: &RedundancyScheme) -> Result<u64> {
        let strategy = RedundancyStrategy::from_scheme(scheme)?;
        let size = strategy.stripe_size();
        debug!(
            required = strategy.required_count(),
            total = strategy.total_count(),
            share_size = strategy.erasure_share_size(),
            stripe_size = size,
            "Resolved stripe size"
        );
        Ok(size)
    }
}

// =============================================================================
// Tests
// =============================================================================
