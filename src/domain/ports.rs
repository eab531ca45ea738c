//! Domain Ports (DDD Port/Adapter Pattern)
//!
//! Trait abstractions for the collaborators the sampler depends on.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Audit Cursor                            │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │                    Ports (Traits)                    │    │
//! │  │  SegmentIndex │ RedundancyResolver │ RandomSource   │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Infrastructure Layer                       │
//! │  InMemorySegmentIndex │ ErasureStripeResolver │ OsRandom    │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;

use super::pointer::{ListItem, RedundancyScheme, SegmentPath, SegmentPointer};
use crate::error::{Error, Result};

// =============================================================================
// Segment Index Port
// =============================================================================

/// Parameters of a listing request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListRequest {
    /// Only keys starting with this prefix
    pub prefix: String,
    /// Resume strictly after this key; empty starts at the beginning
    pub start_after: SegmentPath,
    /// Include nested keys instead of collapsing them
    pub recursive: bool,
    /// Page size hint, 0 for the index default
    pub limit: usize,
    /// Attach a summary of each pointer
    pub include_summary: bool,
}

impl ListRequest {
    /// Recursive listing of the whole keyspace resuming after `start_after`.
    pub fn resume_after(start_after: SegmentPath) -> Self {
        Self {
            start_after,
            recursive: true,
            ..Default::default()
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

/// One page of a listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    pub items: Vec<ListItem>,
    /// More entries exist beyond this page
    pub more: bool,
}

impl ListPage {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Path of the final entry, where the next page resumes.
    pub fn last_path(&self) -> Option<&SegmentPath> {
        self.items.last().map(|item| &item.path)
    }
}

/// Port for the ordered, paginated store of segment pointers.
///
/// Each call is individually atomic; the store synchronizes itself.
#[async_trait]
pub trait SegmentIndex: Send + Sync {
    /// List a page of pointers in lexicographic order.
    async fn list(&self, request: &ListRequest) -> Result<ListPage>;

    /// Fetch a pointer. Fails with `Error::NotFound` if absent.
    async fn get(&self, path: &SegmentPath) -> Result<SegmentPointer>;

    /// Delete a pointer.
    async fn delete(&self, path: &SegmentPath) -> Result<()>;
}

// =============================================================================
// Redundancy Resolver Port
// =============================================================================

/// Port converting a redundancy scheme into the stripe size of its layout.
pub trait RedundancyResolver: Send + Sync {
    /// Stripe size in bytes. Pure and deterministic.
    fn stripe_size(&self, scheme: &RedundancyScheme) -> Result<u64>;
}

// =============================================================================
// Random Source Port
// =============================================================================

/// Port for unpredictable, uniform random draws.
///
/// Implementations used outside tests must be cryptographically secure.
pub trait RandomSource: Send + Sync {
    /// Uniform integer in `[0, bound)`. `bound` must be nonzero.
    fn next_below(&self, bound: u64) -> Result<u64>;
}

/// Operating-system CSPRNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsRandom;

impl OsRandom {
    fn next_u64(&self) -> Result<u64> {
        let mut buf = [0u8; 8];
        getrandom::fill(&mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }
}

impl RandomSource for OsRandom {
    fn next_below(&self, bound: u64) -> Result<u64> {
        if bound == 0 {
            return Err(Error::RandomSource("bound must be nonzero".to_string()));
        }

        // Reject the incomplete final block of the u64 range so every
        // residue is equally likely.
        let zone = u64::MAX - (u64::MAX % bound + 1) % bound;
        loop {
            let value = self.next_u64()?;
            if value <= zone {
                return Ok(value % bound);
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::pointer::ListItem;

    #[test]
    fn test_resume_after_is_recursive() {
        let request = ListRequest::resume_after(SegmentPath::from("a/b"));
        assert!(request.recursive);
        assert_eq!(request.limit, 0);
        assert_eq!(request.prefix, "");
        assert_eq!(request.start_after.as_str(), "a/b");
        assert!(!request.include_summary);
    }

    #[test]
    fn test_list_page_last_path() {
        let page = ListPage {
            items: vec![
                ListItem {
                    path: SegmentPath::from("a"),
                    is_prefix: false,
                    summary: None,
                },
                ListItem {
                    path: SegmentPath::from("b"),
                    is_prefix: false,
                    summary: None,
                },
            ],
            more: true,
        };
        assert_eq!(page.last_path().unwrap().as_str(), "b");
        assert!(ListPage::default().last_path().is_none());
    }

    #[test]
    fn test_os_random_bounds() {
        let rng = OsRandom;
        for bound in [1u64, 2, 3, 7, 10, 1000, u64::MAX] {
            for _ in 0..50 {
                assert!(rng.next_below(bound).unwrap() < bound);
            }
        }
        assert_eq!(rng.next_below(1).unwrap(), 0);
    }

    #[test]
    fn test_os_random_rejects_zero_bound() {
        assert!(matches!(OsRandom.next_below(0), Err(Error::RandomSource(_))));
    }

    #[test]
    fn test_os_random_covers_range() {
        let rng = OsRandom;
        let mut seen = [false; 8];
        for _ in 0..1000 {
            seen[rng.next_below(8).unwrap() as usize] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }
}
