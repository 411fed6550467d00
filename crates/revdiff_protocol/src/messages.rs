//! Wire messages for the `_revs_diff` and `_all_docs` endpoints.
//!
//! All messages are JSON. Maps are ordered by document id so encoded bodies
//! are deterministic.

use crate::error::{ProtocolError, ProtocolResult};
use crate::ids::{DocumentId, RevisionId};
use serde::{Deserialize, Serialize};
use std::collections::btree_map;
use std::collections::BTreeMap;

/// Body of a `_revs_diff` request.
///
/// Encodes as `{"<doc id>": ["<rev>", ...], ...}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RevsDiffRequest(BTreeMap<DocumentId, Vec<RevisionId>>);

impl RevsDiffRequest {
    /// Creates an empty request.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the candidate revisions for a document, replacing any previous set.
    pub fn insert(&mut self, id: DocumentId, revisions: Vec<RevisionId>) {
        self.0.insert(id, revisions);
    }

    /// Returns the candidates for a document.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&[RevisionId]> {
        self.0.get(id).map(Vec::as_slice)
    }

    /// Returns true if the request names the document.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.0.contains_key(id)
    }

    /// Number of documents in the request.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the request names no documents.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates documents and their candidates in id order.
    pub fn iter(&self) -> btree_map::Iter<'_, DocumentId, Vec<RevisionId>> {
        self.0.iter()
    }

    /// Encodes to a JSON body.
    pub fn to_json(&self) -> ProtocolResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decodes from a JSON body.
    pub fn from_json(bytes: &[u8]) -> ProtocolResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

impl FromIterator<(DocumentId, Vec<RevisionId>)> for RevsDiffRequest {
    fn from_iter<I: IntoIterator<Item = (DocumentId, Vec<RevisionId>)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Per-document entry of a `_revs_diff` response.
///
/// Both fields are optional on the wire; an absent field decodes as empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevsDiffEntry {
    /// Candidate revisions the store does not hold at all.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing: Vec<RevisionId>,
    /// Leaf revisions the store holds that could be ancestors of the
    /// missing candidates.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub possible_ancestors: Vec<RevisionId>,
}

/// Body of a `_revs_diff` response.
///
/// Encodes as `{"<doc id>": {"missing": [...], "possible_ancestors": [...]}}`.
/// Documents with nothing missing are usually omitted by the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RevsDiffResponse(BTreeMap<DocumentId, RevsDiffEntry>);

impl RevsDiffResponse {
    /// Creates an empty response.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the entry for a document.
    pub fn insert(&mut self, id: DocumentId, entry: RevsDiffEntry) {
        self.0.insert(id, entry);
    }

    /// Returns the entry for a document.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&RevsDiffEntry> {
        self.0.get(id)
    }

    /// Number of documents in the response.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the response has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates entries in id order.
    pub fn iter(&self) -> btree_map::Iter<'_, DocumentId, RevsDiffEntry> {
        self.0.iter()
    }

    /// Consumes the response, yielding entries in id order.
    pub fn into_entries(self) -> btree_map::IntoIter<DocumentId, RevsDiffEntry> {
        self.0.into_iter()
    }

    /// Encodes to a JSON body.
    pub fn to_json(&self) -> ProtocolResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decodes from a JSON body.
    pub fn from_json(bytes: &[u8]) -> ProtocolResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

impl FromIterator<(DocumentId, RevsDiffEntry)> for RevsDiffResponse {
    fn from_iter<I: IntoIterator<Item = (DocumentId, RevsDiffEntry)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// One row of an `_all_docs` page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllDocsRow {
    /// Document id.
    pub id: DocumentId,
    /// Row key (equal to the id for `_all_docs`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<DocumentId>,
    /// Winning revision, when the store reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<AllDocsValue>,
}

/// Value of an `_all_docs` row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllDocsValue {
    /// Winning revision of the document.
    pub rev: RevisionId,
}

/// One page of an `_all_docs` listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllDocsPage {
    /// Total number of documents in the store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_rows: Option<u64>,
    /// Offset of the first row in this page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
    /// Rows in key order.
    pub rows: Vec<AllDocsRow>,
}

impl AllDocsPage {
    /// Returns the document ids of this page, rejecting empty ids.
    pub fn document_ids(&self) -> ProtocolResult<Vec<DocumentId>> {
        self.rows
            .iter()
            .map(|row| {
                if row.id.as_str().is_empty() {
                    Err(ProtocolError::InvalidDocumentId(format!(
                        "empty id in _all_docs row (offset {:?})",
                        self.offset
                    )))
                } else {
                    Ok(row.id.clone())
                }
            })
            .collect()
    }

    /// Encodes to a JSON body.
    pub fn to_json(&self) -> ProtocolResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decodes from a JSON body.
    pub fn from_json(bytes: &[u8]) -> ProtocolResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
