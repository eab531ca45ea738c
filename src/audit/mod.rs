//! Audit Module
//!
//! Selection of the stripes that storage nodes are challenged on.
//!
//! - **Cursor** (`cursor.rs`): paginated, randomized sampling of the segment
//!   index with expired-pointer reaping and stripe-index derivation.
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use audit_cursor::adapters::InMemorySegmentIndex;
//! use audit_cursor::audit::Cursor;
//! use tokio_util::sync::CancellationToken;
//!
//! let cursor = Cursor::new(Arc::new(InMemorySegmentIndex::new()));
//! match cursor.select_stripe(&CancellationToken::new()).await {
//!     Ok(Some(stripe)) => println!("audit {} stripe {}", stripe.segment_path, stripe.index),
//!     Ok(None) => {} // reaped an expired pointer, call again
//!     Err(e) if e.is_retriable() => {}
//!     Err(e) => return Err(e),
//! }
//! ```

pub mod cursor;

#[cfg(test)]
mod proptest;

pub use cursor::{
    classify, stripe_index, AttemptOutcome, Cursor, CursorBuilder, CursorConfig, InvalidReason,
    Stripe, MAX_GET_ATTEMPTS, MAX_LIST_ATTEMPTS,
};
