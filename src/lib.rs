//! Audit Cursor - Stripe Sampling for Storage Audits
//!
//! Storage nodes in a decentralized network hold erasure-coded pieces of user
//! data and are challenged at random to prove they still have them. This
//! crate selects what to challenge: it pages through the segment index,
//! picks a pointer uniformly at random, reaps it if it has expired, and
//! derives a random stripe inside the pointer's erasure layout.
//!
//! # Architecture
//!
//! ```text
//! Audit workers ──▶ Cursor ──▶ SegmentIndex (list / get / delete)
//!                     │
//!                     ├──▶ RedundancyResolver (stripe size)
//!                     └──▶ RandomSource (OS CSPRNG)
//! ```
//!
//! # Modules
//!
//! - [`adapters`] - In-memory segment index and fixture loading
//! - [`audit`] - The sampling cursor
//! - [`domain`] - Pointer model and ports
//! - [`ec`] - Erasure layout geometry
//! - [`error`] - Error types
//! - [`metrics`] - Prometheus collectors for sampling outcomes

pub mod adapters;
pub mod audit;
pub mod domain;
pub mod ec;
pub mod error;
pub mod metrics;

// Re-export commonly used types
pub use adapters::InMemorySegmentIndex;
pub use audit::{Cursor, CursorConfig, Stripe};
pub use domain::{SegmentIndex, SegmentPath, SegmentPointer};
pub use error::{Error, Result};
pub use metrics::SamplerMetrics;
