//! Erasure Coding Module
//!
//! Geometry of a segment's erasure layout.
//!
//! - **Redundancy** (`redundancy.rs`): validates redundancy schemes against
//!   the Reed-Solomon code they describe and resolves stripe sizes for the
//!   audit cursor.

pub mod redundancy;

pub use redundancy::{ErasureStripeResolver, RedundancyStrategy, MAX_TOTAL_PIECES};
