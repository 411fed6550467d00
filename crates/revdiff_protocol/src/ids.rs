//! Document and revision identifiers.

use crate::error::{ProtocolError, ProtocolResult};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Identifier of a document within a store.
///
/// Document ids are opaque strings. They order lexicographically so that
/// sets and maps of ids iterate deterministically.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    /// Creates a document id without validation.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Creates a document id, rejecting the empty string.
    pub fn parse(id: impl Into<String>) -> ProtocolResult<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(ProtocolError::InvalidDocumentId(
                "document id must not be empty".into(),
            ));
        }
        Ok(Self(id))
    }

    /// Returns the id as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DocumentId({:?})", self.0)
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for DocumentId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DocumentId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for DocumentId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Identifier of one revision in a document's revision tree.
///
/// Revision ids have the form `<generation>-<hash>`, where `generation` is a
/// positive integer and `hash` an opaque token. Only equality and string
/// comparison are meaningful; the ordering is not a causal order.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RevisionId(String);

impl RevisionId {
    /// Parses a revision id, validating the `<generation>-<hash>` form.
    pub fn parse(rev: impl Into<String>) -> ProtocolResult<Self> {
        let rev = rev.into();
        let (generation, hash) = rev
            .split_once('-')
            .ok_or_else(|| ProtocolError::invalid_revision(rev.as_str(), "missing '-' separator"))?;

        match generation.parse::<u64>() {
            Ok(0) => {
                return Err(ProtocolError::invalid_revision(
                    rev.as_str(),
                    "generation must be positive",
                ))
            }
            Ok(_) => {}
            Err(_) => {
                return Err(ProtocolError::invalid_revision(
                    rev.as_str(),
                    "generation is not an integer",
                ))
            }
        }

        if hash.is_empty() {
            return Err(ProtocolError::invalid_revision(rev.as_str(), "empty hash"));
        }

        Ok(Self(rev))
    }

    /// Wraps a revision id reported by a store without validation.
    ///
    /// Stores are authoritative about the ids in their own revision trees,
    /// so values read off the wire are never rejected.
    #[must_use]
    pub fn from_wire(rev: impl Into<String>) -> Self {
        Self(rev.into())
    }

    /// Returns the generation number, if the id is well formed.
    #[must_use]
    pub fn generation(&self) -> Option<u64> {
        self.0
            .split_once('-')
            .and_then(|(generation, _)| generation.parse().ok())
    }

    /// Returns the hash part, if the id is well formed.
    #[must_use]
    pub fn hash(&self) -> Option<&str> {
        self.0.split_once('-').map(|(_, hash)| hash)
    }

    /// Returns the id as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for RevisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RevisionId({:?})", self.0)
    }
}

impl fmt::Display for RevisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for RevisionId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_valid_revision() {
        let rev = RevisionId::parse("2-bbb").unwrap();
        assert_eq!(rev.generation(), Some(2));
        assert_eq!(rev.hash(), Some("bbb"));
        assert_eq!(rev.as_str(), "2-bbb");
    }

    #[test]
    fn parse_keeps_dashes_in_hash() {
        let rev = RevisionId::parse("9999-a-b").unwrap();
        assert_eq!(rev.generation(), Some(9999));
        assert_eq!(rev.hash(), Some("a-b"));
    }

    #[test]
    fn parse_rejects_malformed() {
        assert!(RevisionId::parse("abc").is_err());
        assert!(RevisionId::parse("0-abc").is_err());
        assert!(RevisionId::parse("x-abc").is_err());
        assert!(RevisionId::parse("3-").is_err());
        assert!(RevisionId::parse("").is_err());
    }

    #[test]
    fn from_wire_accepts_anything() {
        let rev = RevisionId::from_wire("not a revision");
        assert_eq!(rev.generation(), None);
        assert_eq!(rev.to_string(), "not a revision");
    }

    #[test]
    fn document_id_parse() {
        assert!(DocumentId::parse("").is_err());
        assert_eq!(DocumentId::parse("d1").unwrap().as_str(), "d1");
    }

    #[test]
    fn ids_serialize_as_bare_strings() {
        let doc = DocumentId::from("d1");
        assert_eq!(serde_json::to_string(&doc).unwrap(), "\"d1\"");

        let rev: RevisionId = serde_json::from_str("\"1-abc\"").unwrap();
        assert_eq!(rev, RevisionId::from_wire("1-abc"));
    }

    #[test]
    fn document_ids_order_lexicographically() {
        let mut ids = vec![DocumentId::from("b"), DocumentId::from("a10"), DocumentId::from("a2")];
        ids.sort();
        let sorted: Vec<&str> = ids.iter().map(DocumentId::as_str).collect();
        assert_eq!(sorted, vec!["a10", "a2", "b"]);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn well_formed_revisions_parse(generation in 1u64..1_000_000, hash in "[0-9a-f]{1,32}") {
                let rev = RevisionId::parse(format!("{generation}-{hash}")).unwrap();
                prop_assert_eq!(rev.generation(), Some(generation));
                prop_assert_eq!(rev.hash(), Some(hash.as_str()));
            }

            #[test]
            fn revisions_without_separator_are_rejected(value in "[0-9a-z]{0,16}") {
                prop_assert!(RevisionId::parse(value).is_err());
            }
        }
    }
}
