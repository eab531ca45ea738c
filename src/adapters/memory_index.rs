//! In-Memory Segment Index
//!
//! Ordered pointer store implementing the `SegmentIndex` port. Used by the
//! binary (seeded from a fixture) and by tests.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::domain::pointer::{ListItem, SegmentPath, SegmentPointer};
use crate::domain::ports::{ListPage, ListRequest, SegmentIndex};
use crate::error::{Error, Result};

/// Page size applied when a request leaves `limit` at 0.
pub const DEFAULT_LIST_LIMIT: usize = 1000;

/// Operation counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub lists: u64,
    pub gets: u64,
    pub deletes: u64,
}

/// In-memory segment index backed by a `BTreeMap`
pub struct InMemorySegmentIndex {
    pointers: RwLock<BTreeMap<SegmentPath, SegmentPointer>>,
    default_limit: usize,
    lists: AtomicU64,
    gets: AtomicU64,
    deletes: AtomicU64,
}

impl Default for InMemorySegmentIndex {
    fn default() -> Self {
        Self::with_default_limit(DEFAULT_LIST_LIMIT)
    }
}

impl std::fmt::Debug for InMemorySegmentIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemorySegmentIndex")
            .field("len", &self.len())
            .field("default_limit", &self.default_limit)
            .finish()
    }
}

impl InMemorySegmentIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an index whose unbounded listings return `limit` entries per page
    pub fn with_default_limit(limit: usize) -> Self {
        Self {
            pointers: RwLock::new(BTreeMap::new()),
            default_limit: limit.max(1),
            lists: AtomicU64::new(0),
            gets: AtomicU64::new(0),
            deletes: AtomicU64::new(0),
        }
    }

    /// Insert or replace a pointer
    pub fn put(&self, path: impl Into<SegmentPath>, pointer: SegmentPointer) {
        self.pointers.write().insert(path.into(), pointer);
    }

    pub fn len(&self) -> usize {
        self.pointers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pointers.read().is_empty()
    }

    pub fn contains(&self, path: &SegmentPath) -> bool {
        self.pointers.read().contains_key(path)
    }

    /// All stored paths in order
    pub fn paths(&self) -> Vec<SegmentPath> {
        self.pointers.read().keys().cloned().collect()
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            lists: self.lists.load(Ordering::Relaxed),
            gets: self.gets.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
        }
    }

    fn page(&self, request: &ListRequest) -> ListPage {
        let limit = match request.limit {
            0 => self.default_limit,
            n => n,
        };

        let pointers = self.pointers.read();
        let lower = lower_bound(&request.prefix, &request.start_after);

        let mut items: Vec<ListItem> = Vec::with_capacity(limit.min(pointers.len()));
        let mut more = false;

        for (path, pointer) in pointers.range((lower, Bound::Unbounded)) {
            // Keys sharing the prefix are contiguous from the lower bound
            let Some(rest) = path.as_str().strip_prefix(request.prefix.as_str()) else {
                break;
            };

            let item = match rest.find('/') {
                Some(pos) if !request.recursive => {
                    let collapsed =
                        SegmentPath::new(format!("{}{}", request.prefix, &rest[..=pos]));
                    if collapsed <= request.start_after
                        || items.last().map(|last| last.path == collapsed).unwrap_or(false)
                    {
                        continue;
                    }
                    ListItem {
                        path: collapsed,
                        is_prefix: true,
                        summary: None,
                    }
                }
                _ => ListItem {
                    path: path.clone(),
                    is_prefix: false,
                    summary: request.include_summary.then(|| pointer.summary()),
                },
            };

            if items.len() == limit {
                more = true;
                break;
            }
            items.push(item);
        }

        ListPage { items, more }
    }
}

#[async_trait]
impl SegmentIndex for InMemorySegmentIndex {
    async fn list(&self, request: &ListRequest) -> Result<ListPage> {
        self.lists.fetch_add(1, Ordering::Relaxed);
        let page = self.page(request);
        trace!(
            start_after = %request.start_after,
            items = page.items.len(),
            more = page.more,
            "Listed segment index"
        );
        Ok(page)
    }

    async fn get(&self, path: &SegmentPath) -> Result<SegmentPointer> {
        self.gets.fetch_add(1, Ordering::Relaxed);
        self.pointers
            .read()
            .get(path)
            .cloned()
            .ok_or_else(|| Error::NotFound(path.to_string()))
    }

    async fn delete(&self, path: &SegmentPath) -> Result<()> {
        self.deletes.fetch_add(1, Ordering::Relaxed);
        match self.pointers.write().remove(path) {
            Some(_) => {
                debug!(path = %path, "Deleted pointer");
                Ok(())
            }
            None => Err(Error::NotFound(path.to_string())),
        }
    }
}

/// First key a listing may visit: just past `start_after`, or the prefix
/// itself when the resume point sorts before it.
fn lower_bound(prefix: &str, start_after: &SegmentPath) -> Bound<SegmentPath> {
    if start_after.as_str() >= prefix {
        if start_after.is_empty() {
            Bound::Unbounded
        } else {
            Bound::Excluded(start_after.clone())
        }
    } else {
        Bound::Included(SegmentPath::new(prefix))
    }
}

// =============================================================================
// Tests
// =============================================================================
