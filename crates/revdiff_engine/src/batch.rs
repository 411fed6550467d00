//! Partitioning of document ids into diff batches.

use crate::error::{CompareError, CompareResult};
use revdiff_protocol::DocumentId;

/// A bounded group of common document ids diffed in one request pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffBatch {
    /// Zero-based position of the batch in the partition.
    pub index: usize,
    /// Document ids, in input order.
    pub ids: Vec<DocumentId>,
}

impl DiffBatch {
    /// Number of documents in the batch.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Returns true if the batch holds no documents.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Splits `ids` into consecutive batches of `batch_size`.
///
/// Every batch holds exactly `batch_size` ids except the last, which holds
/// the remainder. An empty input yields no batches.
pub fn partition(ids: &[DocumentId], batch_size: usize) -> CompareResult<Vec<DiffBatch>> {
    if batch_size == 0 {
        return Err(CompareError::InvalidArgument(
            "batch size must be positive".into(),
        ));
    }

    Ok(ids
        .chunks(batch_size)
        .enumerate()
        .map(|(index, chunk)| DiffBatch {
            index,
            ids: chunk.to_vec(),
        })
        .collect())
}
