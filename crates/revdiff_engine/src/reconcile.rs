//! Document-set reconciliation.

use revdiff_protocol::DocumentId;
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// Split of two document listings into exclusive and shared ids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// Ids present only in the first store.
    pub only_in_a: BTreeSet<DocumentId>,
    /// Ids present only in the second store.
    pub only_in_b: BTreeSet<DocumentId>,
    /// Ids present in both stores, in lexicographic order.
    pub common: Vec<DocumentId>,
}

/// Splits two id listings into only-in-A, only-in-B and common.
///
/// Duplicate ids within a listing collapse. The output order is
/// lexicographic regardless of input order, so batches built from `common`
/// are reproducible.
pub fn reconcile<A, B>(ids_a: A, ids_b: B) -> Reconciliation
where
    A: IntoIterator<Item = DocumentId>,
    B: IntoIterator<Item = DocumentId>,
{
    let a: BTreeSet<DocumentId> = ids_a.into_iter().collect();
    let b: BTreeSet<DocumentId> = ids_b.into_iter().collect();

    let mut result = Reconciliation::default();
    let mut left = a.into_iter().peekable();
    let mut right = b.into_iter().peekable();

    // Merge walk over two sorted sequences.
    loop {
        let order = match (left.peek(), right.peek()) {
            (Some(x), Some(y)) => x.cmp(y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => break,
        };
        match order {
            Ordering::Less => {
                if let Some(id) = left.next() {
                    result.only_in_a.insert(id);
                }
            }
            Ordering::Greater => {
                if let Some(id) = right.next() {
                    result.only_in_b.insert(id);
                }
            }
            Ordering::Equal => {
                right.next();
                if let Some(id) = left.next() {
                    result.common.push(id);
                }
            }
        }
    }

    result
}
