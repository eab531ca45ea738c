//! Property-Based Tests for Stripe Sampling
//!
//! # Test Properties
//!
//! 1. **Stripe Bounds**: a drawn stripe index is always 0 for short segments
//!    and inside `[0, segment_size / stripe_size)` otherwise
//! 2. **Cursor Bounds**: the same holds end to end through `select_stripe`
//! 3. **Classification**: only live, remote, nonzero-size pointers are accepted

#![cfg(test)]

use std::sync::Arc;

use bytes::Bytes;
use chrono::{Duration, Utc};
use proptest::prelude::*;
use tokio_util::sync::CancellationToken;

use super::cursor::{classify, stripe_index, AttemptOutcome, Cursor};
use crate::adapters::InMemorySegmentIndex;
use crate::domain::pointer::{RedundancyScheme, SegmentPointer, Timestamp};
use crate::domain::ports::OsRandom;

// =============================================================================
// Property Strategies
// =============================================================================

/// Strategy for valid schemes: k in 1..=16, m in 0..=8, share 1..=4096
fn scheme_strategy() -> impl Strategy<Value = RedundancyScheme> {
    (1u32..=16, 0u32..=8, 1u32..=4096).prop_map(|(k, m, share)| RedundancyScheme {
        min_required: k,
        total: k + m,
        erasure_share_size: share,
        ..Default::default()
    })
}

/// Segment sizes from a single byte up to a few hundred megabytes
fn segment_size_strategy() -> impl Strategy<Value = u64> {
    prop_oneof![1u64..=64, 1u64..=1 << 20, 1u64..=1 << 28]
}

// =============================================================================
// Stripe Bounds
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Property: stripe index stays within the whole stripes of the segment.
    #[test]
    fn prop_stripe_index_in_bounds(
        segment_size in segment_size_strategy(),
        stripe_size in 1u64..=1 << 16,
    ) {
        let index = stripe_index(segment_size, stripe_size, &OsRandom)?;
        if segment_size < stripe_size {
            prop_assert_eq!(index, 0);
        } else {
            prop_assert!(index < segment_size / stripe_size);
        }
    }

    /// Property: a cursor over a single pointer returns that pointer with an
    /// in-bounds stripe index.
    #[test]
    fn prop_cursor_stripe_in_bounds(
        scheme in scheme_strategy(),
        segment_size in segment_size_strategy(),
    ) {
        let stripe_size = u64::from(scheme.min_required) * u64::from(scheme.erasure_share_size);
        let index = Arc::new(InMemorySegmentIndex::new());
        index.put("bucket/object", SegmentPointer::remote(segment_size, scheme, vec![]));
        let cursor = Cursor::new(index);

        let stripe = tokio_test::block_on(cursor.select_stripe(&CancellationToken::new()))?
            .expect("live pointer is never reaped");

        prop_assert_eq!(stripe.segment_path.as_str(), "bucket/object");
        if segment_size < stripe_size {
            prop_assert_eq!(stripe.index, 0);
        } else {
            prop_assert!(stripe.index < segment_size / stripe_size);
        }
    }
}

// =============================================================================
// Classification
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: acceptance requires remote kind, nonzero size and no past expiry.
    #[test]
    fn prop_classify_acceptance(
        remote in any::<bool>(),
        segment_size in 0u64..=100,
        expiry_offset in prop::option::of(-3600i64..=3600),
    ) {
        let now = Utc::now();
        let mut pointer = if remote {
            SegmentPointer::remote(segment_size, RedundancyScheme::default(), vec![])
        } else {
            SegmentPointer::inline(Bytes::from(vec![0u8; segment_size as usize]))
        };
        if let Some(offset) = expiry_offset {
            pointer = pointer.with_expiration(Timestamp::from_datetime(now + Duration::seconds(offset)));
        }

        let expired = matches!(expiry_offset, Some(offset) if offset < 0);
        let outcome = classify(pointer, now)?;

        if expired {
            prop_assert_eq!(outcome, AttemptOutcome::SkippedExpired);
        } else if remote && segment_size > 0 {
            prop_assert!(matches!(outcome, AttemptOutcome::Accepted(_)));
        } else {
            prop_assert!(matches!(outcome, AttemptOutcome::SkippedInvalid(_)));
        }
    }
}
