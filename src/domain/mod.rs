//! Domain Layer
//!
//! The data model of the segment index and the ports the sampler consumes.
//!
//! - **Pointer** (`pointer.rs`) - Segment pointers, redundancy schemes, timestamps
//! - **Ports** (`ports.rs`) - Trait abstractions for the index, the redundancy
//!   resolver and the random source
//!
//! # Usage
//!
//! ```ignore
//! use audit_cursor::domain::{ListRequest, SegmentIndex, SegmentPath};
//!
//! async fn first_page<I: SegmentIndex>(index: &I) -> Result<usize> {
//!     let page = index.list(&ListRequest::resume_after(SegmentPath::root())).await?;
//!     Ok(page.items.len())
//! }
//! ```

pub mod pointer;
pub mod ports;

pub use pointer::{
    ListItem, NodeId, PointerKind, PointerSummary, RedundancyAlgorithm, RedundancyScheme,
    RemotePiece, RemoteSegment, SegmentPath, SegmentPointer, Timestamp,
};
pub use ports::{
    ListPage, ListRequest, OsRandom, RandomSource, RedundancyResolver, SegmentIndex,
};
