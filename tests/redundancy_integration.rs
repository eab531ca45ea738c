//! Redundancy Integration Tests
//!
//! Stripe geometry resolved from fixture-described layouts, end to end
//! through the cursor.

use std::path::PathBuf;
use std::sync::Arc;

use assert_matches::assert_matches;
use tokio_util::sync::CancellationToken;

use audit_cursor::adapters::{IndexFixture, InMemorySegmentIndex};
use audit_cursor::audit::Cursor;
use audit_cursor::domain::{RedundancyResolver, RedundancyScheme, SegmentPath, SegmentPointer};
use audit_cursor::ec::{ErasureStripeResolver, RedundancyStrategy};
use audit_cursor::error::Error;

fn demo_fixture() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("demos/fixture.yaml")
}

// =============================================================================
// Fixture Tests
// =============================================================================

#[tokio::test]
async fn test_demo_fixture_layouts_resolve() {
    let fixture = IndexFixture::load(demo_fixture())
        .await
        .expect("Failed to load demo fixture");
    assert_eq!(fixture.pointers.len(), 5);

    let resolver = ErasureStripeResolver;
    for entry in &fixture.pointers {
        if let Some(scheme) = entry.pointer.redundancy() {
            let stripe_size = resolver
                .stripe_size(scheme)
                .unwrap_or_else(|e| panic!("{}: {}", entry.path, e));
            assert_eq!(
                stripe_size,
                u64::from(scheme.min_required) * u64::from(scheme.erasure_share_size)
            );
        }
    }
}

#[tokio::test]
async fn test_demo_fixture_end_to_end() {
    let fixture = IndexFixture::load(demo_fixture()).await.unwrap();
    let index = Arc::new(InMemorySegmentIndex::from_fixture(fixture));
    let cursor = Cursor::new(index.clone());
    let cancel = CancellationToken::new();

    let mut stripes = 0;
    for _ in 0..200 {
        match cursor.select_stripe(&cancel).await {
            Ok(Some(stripe)) => {
                let scheme = stripe.segment.redundancy().expect("remote pointer");
                let strategy = RedundancyStrategy::from_scheme(scheme).unwrap();
                let whole = strategy.full_stripes(stripe.segment.segment_size);
                assert!(stripe.index < whole.max(1));
                stripes += 1;
            }
            Ok(None) => {}
            Err(e) => assert!(e.is_retriable(), "unexpected error: {}", e),
        }
    }

    assert!(stripes > 0);
    // The pointer that expired at the epoch is reaped, the others remain
    assert!(!index.contains(&SegmentPath::from("Pictures/Nature/mountains.png")));
    assert_eq!(index.len(), 4);
}

// =============================================================================
// Invalid Layout Tests
// =============================================================================

#[tokio::test]
async fn test_invalid_layout_fails_selection() {
    let index = Arc::new(InMemorySegmentIndex::new());
    let scheme = RedundancyScheme {
        min_required: 5,
        total: 3,
        erasure_share_size: 256,
        ..Default::default()
    };
    index.put("broken", SegmentPointer::remote(4096, scheme, vec![]));

    let cursor = Cursor::new(index.clone());
    assert_matches!(
        cursor.select_stripe(&CancellationToken::new()).await,
        Err(Error::InvalidRedundancy(_))
    );
    assert_eq!(index.len(), 1);
}

#[test]
fn test_wide_layout_stripe_size() {
    let scheme = RedundancyScheme {
        min_required: 29,
        total: 80,
        repair_threshold: 35,
        success_threshold: 50,
        erasure_share_size: 256,
        ..Default::default()
    };

    let strategy = RedundancyStrategy::from_scheme(&scheme).unwrap();
    assert_eq!(strategy.parity_count(), 51);
    assert_eq!(strategy.stripe_size(), 29 * 256);
    assert_eq!(strategy.full_stripes(4 * 1024 * 1024), 4 * 1024 * 1024 / (29 * 256));
}
