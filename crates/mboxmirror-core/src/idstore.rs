//! Persisted set of archived message identifiers.
//!
//! The sidecar is a YAML document with a single `Msg` list:
//!
//! ```yaml
//! Msg:
//! - 1234@mail.example.com
//! - abcd@example.org
//! ```
//!
//! Identifiers are written in lexicographic order so successive runs diff
//! cleanly. A missing or unreadable sidecar is an error: starting from an
//! empty set would re-archive the whole mailbox.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::debug;

use crate::error::{Error, Result};

/// Identifiers of every message accepted so far.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentifierSet {
    ids: HashSet<String>,
}

impl IdentifierSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an identifier. Returns false if it was already present.
    pub fn insert(&mut self, id: impl Into<String>) -> bool {
        self.ids.insert(id.into())
    }

    /// Returns true if `id` has been recorded.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Number of identifiers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Returns true if no identifier has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Identifiers in lexicographic order.
    #[must_use]
    pub fn sorted(&self) -> Vec<&str> {
        let mut ids: Vec<_> = self.ids.iter().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

impl<S: Into<String>> FromIterator<S> for IdentifierSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Serialize)]
struct SidecarOut<'a> {
    #[serde(rename = "Msg")]
    msg: Vec<&'a str>,
}

#[derive(Deserialize)]
struct SidecarIn {
    #[serde(rename = "Msg", alias = "msg", default)]
    msg: Vec<String>,
}

/// Reads a sidecar file.
///
/// # Errors
///
/// [`Error::SidecarIo`] if the file cannot be read (including when it does
/// not exist) and [`Error::SidecarFormat`] if it is not a valid sidecar.
pub async fn load(path: &Path) -> Result<IdentifierSet> {
    let text = fs::read_to_string(path).await.map_err(|source| Error::SidecarIo {
        path: path.to_path_buf(),
        source,
    })?;
    let parsed = parse(&text).map_err(|source| Error::SidecarFormat {
        path: path.to_path_buf(),
        source,
    })?;

    debug!(path = %path.display(), count = parsed.len(), "loaded message identifiers");
    Ok(parsed)
}

/// Writes a sidecar file, replacing any previous content.
///
/// # Errors
///
/// [`Error::SidecarFormat`] if serialization fails and
/// [`Error::SidecarIo`] if the file cannot be written.
pub async fn save(set: &IdentifierSet, path: &Path) -> Result<()> {
    let text = render(set).map_err(|source| Error::SidecarFormat {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, text).await.map_err(|source| Error::SidecarIo {
        path: path.to_path_buf(),
        source,
    })?;

    debug!(path = %path.display(), count = set.len(), "saved message identifiers");
    Ok(())
}

fn parse(text: &str) -> std::result::Result<IdentifierSet, serde_yaml::Error> {
    // An empty document is a sidecar written for an empty mailbox.
    if text.trim().is_empty() {
        return Ok(IdentifierSet::new());
    }
    let sidecar: SidecarIn = serde_yaml::from_str(text)?;
    Ok(sidecar.msg.into_iter().collect())
}

fn render(set: &IdentifierSet) -> std::result::Result<String, serde_yaml::Error> {
    serde_yaml::to_string(&SidecarOut { msg: set.sorted() })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_render_is_sorted() {
        let set: IdentifierSet = ["zeta@x", "alpha@x", "mid@x"].into_iter().collect();
        let text = render(&set).unwrap();
        assert_eq!(text, "Msg:\n- alpha@x\n- mid@x\n- zeta@x\n");
    }

    #[test]
    fn test_parse_accepts_lowercase_key() {
        let set = parse("msg:\n  - one@x\n  - two@x\n").unwrap();
        assert_eq!(set.len(), 2);
        assert!(set.contains("two@x"));
    }

    #[test]
    fn test_parse_empty_document() {
        assert!(parse("").unwrap().is_empty());
        assert!(parse("Msg: []\n").unwrap().is_empty());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse("Msg: {not: [a list").is_err());
    }

    #[tokio::test]
    async fn test_load_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(&dir.path().join("INBOX.yaml")).await.unwrap_err();
        assert!(matches!(err, Error::SidecarIo { .. }));
    }

    #[tokio::test]
    async fn test_load_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("INBOX.yaml");
        std::fs::write(&path, "Msg: 12\n").unwrap();
        assert!(matches!(load(&path).await.unwrap_err(), Error::SidecarFormat { .. }));
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("INBOX.yaml");
        let set: IdentifierSet = ["b@x", "a@x"].into_iter().collect();

        save(&set, &path).await.unwrap();
        assert_eq!(load(&path).await.unwrap(), set);
    }

    proptest! {
        #[test]
        fn prop_round_trip_ignores_insertion_order(
            ids in proptest::collection::vec("[a-z0-9.]{1,12}@[a-z]{1,8}\\.org", 0..20),
        ) {
            let forward: IdentifierSet = ids.iter().cloned().collect();
            let backward: IdentifierSet = ids.iter().rev().cloned().collect();

            let text = render(&forward).unwrap();
            prop_assert_eq!(&text, &render(&backward).unwrap());
            prop_assert_eq!(parse(&text).unwrap(), forward);
        }
    }
}
