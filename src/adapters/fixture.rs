//! Index Fixtures
//!
//! YAML or JSON descriptions of an index's contents, used to seed an
//! `InMemorySegmentIndex`.
//!
//! ```yaml
//! pointers:
//!   - path: Pictures/image1.png
//!     pointer:
//!       kind: remote
//!       segmentSize: 10
//!       remote:
//!         redundancy: { minRequired: 1, total: 3, erasureShareSize: 2 }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::memory_index::InMemorySegmentIndex;
use crate::domain::pointer::{SegmentPath, SegmentPointer};
use crate::error::{Error, Result};

/// One pointer of a fixture
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureEntry {
    pub path: SegmentPath,
    pub pointer: SegmentPointer,
}

/// Contents of an index
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexFixture {
    #[serde(default)]
    pub pointers: Vec<FixtureEntry>,
}

impl IndexFixture {
    pub fn from_yaml_str(s: &str) -> Result<Self> {
        serde_yaml::from_str(s).map_err(|e| Error::Fixture(format!("invalid YAML: {}", e)))
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        serde_json::from_str(s).map_err(|e| Error::Fixture(format!("invalid JSON: {}", e)))
    }

    /// Load a fixture file; `.json` is parsed as JSON, anything else as YAML
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = tokio::fs::read_to_string(path).await?;

        let fixture = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&contents)?,
            _ => Self::from_yaml_str(&contents)?,
        };

        info!(
            "Loaded {} pointers from fixture {}",
            fixture.pointers.len(),
            path.display()
        );
        Ok(fixture)
    }
}

impl InMemorySegmentIndex {
    /// Build an index holding every pointer of the fixture
    pub fn from_fixture(fixture: IndexFixture) -> Self {
        let index = Self::new();
        for entry in fixture.pointers {
            index.put(entry.path, entry.pointer);
        }
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::pointer::PointerKind;

    const YAML: &str = r#"
pointers:
  - path: folder1/file1
    pointer:
      kind: remote
      segmentSize: 10
      remote:
        redundancy: { minRequired: 1, total: 3, repairThreshold: 2, successThreshold: 3, erasureShareSize: 2 }
        pieces:
          - { pieceNum: 1, nodeId: testId }
  - path: inline/small
    pointer:
      kind: inline
      segmentSize: 0
"#;

    #[test]
    fn test_yaml_fixture() {
        let fixture = IndexFixture::from_yaml_str(YAML).unwrap();
        assert_eq!(fixture.pointers.len(), 2);
        assert_eq!(fixture.pointers[0].path.as_str(), "folder1/file1");
        assert_eq!(fixture.pointers[1].pointer.kind, PointerKind::Inline);

        let index = InMemorySegmentIndex::from_fixture(fixture);
        assert_eq!(index.len(), 2);
        assert!(index.contains(&SegmentPath::from("inline/small")));
    }

    #[test]
    fn test_json_fixture() {
        let json = r#"{"pointers":[{"path":"a","pointer":{"kind":"remote","segmentSize":100,
            "remote":{"redundancy":{"minRequired":2,"total":4,"erasureShareSize":5}}}}]}"#;
        let fixture = IndexFixture::from_json_str(json).unwrap();
        assert_eq!(fixture.pointers[0].pointer.segment_size, 100);
    }

    #[test]
    fn test_invalid_fixture() {
        assert!(matches!(
            IndexFixture::from_yaml_str("pointers: [ { path: 1 "),
            Err(Error::Fixture(_))
        ));
        assert!(matches!(
            IndexFixture::from_json_str("{"),
            Err(Error::Fixture(_))
        ));
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let result = IndexFixture::load("/nonexistent/fixture.yaml").await;
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
