//! Segment Pointer Model
//!
//! Value objects describing the metadata records held by the segment index.
//! The sampler only reads these; upload, delete and repair flows own their
//! lifecycle.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// =============================================================================
// Paths
// =============================================================================

/// Key of a segment in the index. Ordered lexicographically; the empty path
/// is the start of the keyspace.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SegmentPath(String);

impl SegmentPath {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// The start-of-keyspace position.
    pub fn root() -> Self {
        Self(String::new())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for SegmentPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SegmentPath {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SegmentPath {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// =============================================================================
// Timestamps
// =============================================================================

/// Earliest representable instant, 0001-01-01T00:00:00Z.
const MIN_VALID_SECONDS: i64 = -62_135_596_800;

/// Latest representable instant, 9999-12-31T23:59:59Z.
const MAX_VALID_SECONDS: i64 = 253_402_300_799;

/// Timestamp as stored on a pointer: seconds since the Unix epoch plus a
/// non-negative sub-second nanosecond count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamp {
    pub seconds: i64,
    #[serde(default)]
    pub nanos: i32,
}

impl Timestamp {
    pub fn new(seconds: i64, nanos: i32) -> Self {
        Self { seconds, nanos }
    }

    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self {
            seconds: dt.timestamp(),
            nanos: dt.timestamp_subsec_nanos() as i32,
        }
    }

    /// Decode into a UTC instant, rejecting values outside the valid range.
    pub fn to_datetime(&self) -> Result<DateTime<Utc>> {
        if self.seconds < MIN_VALID_SECONDS {
            return Err(Error::TimestampDecode(format!(
                "timestamp {:?} before 0001-01-01",
                self
            )));
        }
        if self.seconds > MAX_VALID_SECONDS {
            return Err(Error::TimestampDecode(format!(
                "timestamp {:?} after 10000-01-01",
                self
            )));
        }
        if !(0..1_000_000_000).contains(&self.nanos) {
            return Err(Error::TimestampDecode(format!(
                "timestamp {:?}: nanos not in range [0, 1e9)",
                self
            )));
        }

        DateTime::from_timestamp(self.seconds, self.nanos as u32).ok_or_else(|| {
            Error::TimestampDecode(format!("timestamp {:?} is not representable", self))
        })
    }
}

// =============================================================================
// Redundancy
// =============================================================================

/// Erasure coding algorithm of a remote segment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RedundancyAlgorithm {
    #[default]
    ReedSolomon,
}

/// Parameters of a segment's erasure layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedundancyScheme {
    #[serde(default)]
    pub algorithm: RedundancyAlgorithm,
    /// Pieces needed to reconstruct the segment
    pub min_required: u32,
    /// Pieces produced by encoding
    pub total: u32,
    /// Healthy piece count below which repair is due (0 = min_required)
    #[serde(default)]
    pub repair_threshold: u32,
    /// Piece count an upload aims to reach (0 = total)
    #[serde(default)]
    pub success_threshold: u32,
    /// Size in bytes of one erasure share
    pub erasure_share_size: u32,
}

// =============================================================================
// Remote Segments
// =============================================================================

/// Identity of a storage node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One erasure share of a segment held by a storage node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemotePiece {
    pub piece_num: u32,
    pub node_id: NodeId,
}

/// Erasure layout and placement of a remote segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteSegment {
    pub redundancy: RedundancyScheme,
    #[serde(default)]
    pub root_piece_id: String,
    #[serde(default)]
    pub pieces: Vec<RemotePiece>,
}

// =============================================================================
// Segment Pointer
// =============================================================================

/// Where a segment's bytes live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerKind {
    /// Stored inside the pointer itself
    Inline,
    /// Erasure coded across storage nodes
    Remote,
}

impl std::fmt::Display for PointerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PointerKind::Inline => write!(f, "inline"),
            PointerKind::Remote => write!(f, "remote"),
        }
    }
}

/// Metadata for one stored segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentPointer {
    pub kind: PointerKind,

    /// Segment bytes for inline pointers
    #[serde(default)]
    pub inline_segment: Bytes,

    /// Erasure layout for remote pointers
    #[serde(default)]
    pub remote: Option<RemoteSegment>,

    /// Total size of the segment in bytes
    #[serde(default)]
    pub segment_size: u64,

    /// Instant after which the pointer is dead
    #[serde(default)]
    pub expires_at: Option<Timestamp>,

    #[serde(default)]
    pub created_at: Option<Timestamp>,
}

impl SegmentPointer {
    /// Build a remote pointer with the given layout.
    pub fn remote(
        segment_size: u64,
        redundancy: RedundancyScheme,
        pieces: Vec<RemotePiece>,
    ) -> Self {
        Self {
            kind: PointerKind::Remote,
            inline_segment: Bytes::new(),
            remote: Some(RemoteSegment {
                redundancy,
                root_piece_id: String::new(),
                pieces,
            }),
            segment_size,
            expires_at: None,
            created_at: None,
        }
    }

    /// Build an inline pointer holding the data itself.
    pub fn inline(data: Bytes) -> Self {
        Self {
            kind: PointerKind::Inline,
            segment_size: data.len() as u64,
            inline_segment: data,
            remote: None,
            expires_at: None,
            created_at: None,
        }
    }

    pub fn with_expiration(mut self, expires_at: Timestamp) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn is_remote(&self) -> bool {
        self.kind == PointerKind::Remote
    }

    /// Redundancy scheme of a remote pointer.
    pub fn redundancy(&self) -> Option<&RedundancyScheme> {
        self.remote.as_ref().map(|r| &r.redundancy)
    }

    /// Whether the pointer expired strictly before `now`.
    ///
    /// A malformed expiration timestamp is an error, never "not expired".
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> Result<bool> {
        match &self.expires_at {
            Some(ts) => Ok(ts.to_datetime()? < now),
            None => Ok(false),
        }
    }

    pub fn summary(&self) -> PointerSummary {
        PointerSummary {
            kind: self.kind,
            segment_size: self.segment_size,
            expires_at: self.expires_at,
        }
    }
}

// =============================================================================
// Listing
// =============================================================================

/// Lightweight view of a pointer returned with listings on request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointerSummary {
    pub kind: PointerKind,
    pub segment_size: u64,
    pub expires_at: Option<Timestamp>,
}

/// One entry of a listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListItem {
    pub path: SegmentPath,
    /// Collapsed nested keys of a non-recursive listing
    pub is_prefix: bool,
    pub summary: Option<PointerSummary>,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn scheme() -> RedundancyScheme {
        RedundancyScheme {
            algorithm: RedundancyAlgorithm::ReedSolomon,
            min_required: 1,
            total: 3,
            repair_threshold: 2,
            success_threshold: 3,
            erasure_share_size: 2,
        }
    }

    #[test]
    fn test_segment_path_ordering() {
        let mut paths = vec![
            SegmentPath::from("b"),
            SegmentPath::from("a/z"),
            SegmentPath::root(),
            SegmentPath::from("a"),
        ];
        paths.sort();

        assert_eq!(paths[0], SegmentPath::root());
        assert_eq!(paths[1].as_str(), "a");
        assert_eq!(paths[2].as_str(), "a/z");
        assert_eq!(paths[3].as_str(), "b");
        assert!(SegmentPath::root().is_empty());
    }

    #[test]
    fn test_timestamp_epoch_decodes() {
        let dt = Timestamp::default().to_datetime().unwrap();
        assert_eq!(dt.timestamp(), 0);
    }

    #[test]
    fn test_timestamp_roundtrip_datetime() {
        let now = Utc::now();
        let ts = Timestamp::from_datetime(now);
        assert_eq!(ts.to_datetime().unwrap(), now);
    }

    #[test]
    fn test_timestamp_rejects_bad_nanos() {
        assert!(matches!(
            Timestamp::new(10, -1).to_datetime(),
            Err(Error::TimestampDecode(_))
        ));
        assert!(matches!(
            Timestamp::new(10, 1_000_000_000).to_datetime(),
            Err(Error::TimestampDecode(_))
        ));
    }

    #[test]
    fn test_timestamp_rejects_out_of_range_seconds() {
        assert!(Timestamp::new(MIN_VALID_SECONDS, 0).to_datetime().is_ok());
        assert!(Timestamp::new(MAX_VALID_SECONDS, 0).to_datetime().is_ok());
        assert!(Timestamp::new(MIN_VALID_SECONDS - 1, 0).to_datetime().is_err());
        assert!(Timestamp::new(MAX_VALID_SECONDS + 1, 0).to_datetime().is_err());
    }

    #[test]
    fn test_pointer_expiration() {
        let now = Utc::now();
        let pointer = SegmentPointer::remote(10, scheme(), vec![]);
        assert!(!pointer.is_expired_at(now).unwrap());

        let past = pointer
            .clone()
            .with_expiration(Timestamp::from_datetime(now - Duration::seconds(1)));
        assert!(past.is_expired_at(now).unwrap());

        let future = pointer
            .clone()
            .with_expiration(Timestamp::from_datetime(now + Duration::seconds(3000)));
        assert!(!future.is_expired_at(now).unwrap());

        // No grace period, but "strictly before" means equal is still alive
        let exact = pointer.with_expiration(Timestamp::from_datetime(now));
        assert!(!exact.is_expired_at(now).unwrap());
    }

    #[test]
    fn test_malformed_expiration_is_error() {
        let pointer =
            SegmentPointer::remote(10, scheme(), vec![]).with_expiration(Timestamp::new(0, -5));
        assert!(pointer.is_expired_at(Utc::now()).is_err());
    }

    #[test]
    fn test_inline_pointer() {
        let pointer = SegmentPointer::inline(Bytes::from_static(b"hello"));
        assert_eq!(pointer.kind, PointerKind::Inline);
        assert_eq!(pointer.segment_size, 5);
        assert!(!pointer.is_remote());
        assert!(pointer.redundancy().is_none());
    }

    #[test]
    fn test_pointer_deserializes_from_yaml() {
        let yaml = r#"
kind: remote
segmentSize: 100
remote:
  redundancy:
    minRequired: 1
    total: 3
    erasureShareSize: 10
  pieces:
    - pieceNum: 1
      nodeId: node-a
expiresAt:
  seconds: 4102444800
"#;
        let pointer: SegmentPointer = serde_yaml::from_str(yaml).unwrap();
        assert!(pointer.is_remote());
        assert_eq!(pointer.segment_size, 100);
        assert_eq!(pointer.redundancy().unwrap().erasure_share_size, 10);
        assert_eq!(pointer.redundancy().unwrap().repair_threshold, 0);
        assert_eq!(pointer.expires_at, Some(Timestamp::new(4_102_444_800, 0)));
        assert_eq!(
            pointer.remote.as_ref().unwrap().pieces[0].node_id,
            NodeId("node-a".to_string())
        );
    }
}
