//! Infrastructure Adapters
//!
//! Adapter implementations of the domain ports, following the Port/Adapter
//! (Hexagonal) architecture pattern.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Domain Layer                              │
//! │  ┌────────────────────────────────────────────────────────────┐ │
//! │  │                    Ports (Traits)                           │ │
//! │  │        SegmentIndex │ RedundancyResolver │ RandomSource    │ │
//! │  └────────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Adapters (This Module)                       │
//! │  ┌────────────────────────────────────────────────────────────┐ │
//! │  │       InMemorySegmentIndex │ IndexFixture (YAML / JSON)    │ │
//! │  └────────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The redundancy resolver lives in [`crate::ec`] and the OS random source
//! in [`crate::domain::ports`].

mod fixture;
mod memory_index;

pub use fixture::{FixtureEntry, IndexFixture};
pub use memory_index::{InMemorySegmentIndex, IndexStats, DEFAULT_LIST_LIMIT};
