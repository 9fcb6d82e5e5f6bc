//! Consensus trees from several candidate parses
//!
//! [`TreeMerger`] grows a tree outward from the root. At each round every
//! candidate proposes arcs whose head is already in the tree and whose
//! dependent is not; identical `(dep, head, label)` proposals pool their
//! votes, and the best-supported one is committed. Because heads are always
//! settled before their dependents, the result cannot contain a cycle.

use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::heads::HeadAssignment;
use crate::tree::{DepArc, NodeId, ROOT_ID, TreeStore};

/// Error merging candidate head assignments
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MergeError {
    #[error("No candidates to merge")]
    NoCandidates,

    #[error("Candidate {index} covers {found} nodes, expected {expected}")]
    LengthMismatch {
        index: usize,
        expected: usize,
        found: usize,
    },

    #[error("Consensus covers {found} nodes but the tree has {tree}")]
    TreeMismatch { tree: usize, found: usize },

    #[error("Candidate {index} attaches node {dep} to {head}, outside a sentence of size {size}")]
    HeadOutOfRange {
        index: usize,
        dep: NodeId,
        head: NodeId,
        size: usize,
    },
}

/// Consensus heads plus the nodes no candidate could connect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeResult {
    pub heads: HeadAssignment,
    pub unresolved: Vec<NodeId>,
}

impl MergeResult {
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }
}

/// Weighted-vote tree merger
#[derive(Debug, Clone, Copy, Default)]
pub struct TreeMerger;

impl TreeMerger {
    pub fn new() -> Self {
        Self
    }

    /// Merge candidates for one sentence
    ///
    /// Ties between equally voted arcs go to the lowest dependent id, then
    /// the lowest head id, then the smallest label. Dependents that never
    /// become reachable from the root are left unset and listed in
    /// [`MergeResult::unresolved`].
    pub fn merge(&self, candidates: &[HeadAssignment]) -> Result<MergeResult, MergeError> {
        let size = check_candidates(candidates)?;

        let mut heads = HeadAssignment::new(size);
        let mut settled = vec![false; size.max(1)];
        settled[ROOT_ID] = true;
        let mut remaining = size.saturating_sub(1);

        while remaining > 0 {
            let mut votes: FxHashMap<(NodeId, NodeId, Option<&str>), usize> = FxHashMap::default();
            for candidate in candidates {
                for (dep, arc) in candidate.iter() {
                    let Some(head) = arc.target else { continue };
                    if settled[head] && !settled[dep] {
                        *votes.entry((dep, head, arc.label.as_deref())).or_default() += 1;
                    }
                }
            }

            let Some(((dep, head, label), _)) = votes.into_iter().min_by(|(a, va), (b, vb)| {
                vb.cmp(va).then_with(|| a.cmp(b))
            }) else {
                break;
            };

            heads.set_arc(
                dep,
                DepArc {
                    target: Some(head),
                    label: label.map(str::to_string),
                },
            );
            settled[dep] = true;
            remaining -= 1;
        }

        let unresolved = heads.unresolved();
        if !unresolved.is_empty() {
            log::warn!(
                "merge left {} of {} nodes unattached: {:?}",
                unresolved.len(),
                size - 1,
                unresolved
            );
        }
        Ok(MergeResult { heads, unresolved })
    }

    /// Merge candidates and write the consensus onto `tree`
    pub fn merge_into(
        &self,
        tree: &mut TreeStore,
        candidates: &[HeadAssignment],
    ) -> Result<MergeResult, MergeError> {
        let result = self.merge(candidates)?;
        if result.heads.len() != tree.len() {
            return Err(MergeError::TreeMismatch {
                tree: tree.len(),
                found: result.heads.len(),
            });
        }
        tree.reset_heads(&result.heads);
        Ok(result)
    }
}

/// All candidates must have the same size and in-range heads; returns that size
fn check_candidates(candidates: &[HeadAssignment]) -> Result<usize, MergeError> {
    let size = candidates.first().ok_or(MergeError::NoCandidates)?.len();
    for (index, candidate) in candidates.iter().enumerate() {
        if candidate.len() != size {
            return Err(MergeError::LengthMismatch {
                index,
                expected: size,
                found: candidate.len(),
            });
        }
        for (dep, arc) in candidate.iter() {
            if let Some(head) = arc.target.filter(|&head| head >= size) {
                return Err(MergeError::HeadOutOfRange {
                    index,
                    dep,
                    head,
                    size,
                });
            }
        }
    }
    Ok(size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_majority_wins() {
        let a = HeadAssignment::from_pairs([(0, "root"), (1, "obj"), (2, "x")]);
        let b = a.clone();
        let c = HeadAssignment::from_pairs([(0, "root"), (0, "dep"), (2, "x")]);

        let result = TreeMerger::new().merge(&[a.clone(), b, c]).unwrap();

        assert!(result.is_complete());
        assert_eq!(result.heads, a);
    }

    #[test]
    fn test_votes_pool_across_labels_only_when_identical() {
        // two candidates agree on the head of 1 but not the label
        let a = HeadAssignment::from_pairs([(2, "nsubj"), (0, "root")]);
        let b = HeadAssignment::from_pairs([(2, "dep"), (0, "root")]);
        let c = HeadAssignment::from_pairs([(0, "x"), (0, "root")]);

        let result = TreeMerger::new().merge(&[a, b, c]).unwrap();

        // 2 -> 0 has three votes and goes first; the three proposals for 1
        // then tie at one vote each and the lowest head wins
        assert_eq!(result.heads.head_id(2), Some(0));
        assert_eq!(result.heads.head_id(1), Some(0));
        assert_eq!(result.heads.label(1), Some("x"));
    }

    #[test]
    fn test_tie_break_lowest_dep_then_head() {
        let a = HeadAssignment::from_pairs([(0, "a"), (1, "b")]);
        let b = HeadAssignment::from_pairs([(2, "c"), (0, "d")]);

        let result = TreeMerger::new().merge(&[a, b]).unwrap();

        // round one: 1 -> 0 and 2 -> 0 tie at one vote, dep 1 wins;
        // round two: only 2 -> 1 and 2 -> 0 remain, head 0 wins
        assert_eq!(result.heads.head_id(1), Some(0));
        assert_eq!(result.heads.head_id(2), Some(0));
        assert_eq!(result.heads.label(2), Some("d"));
    }

    #[test]
    fn test_unreachable_nodes_are_reported() {
        let a = HeadAssignment::from_pairs([(0, "root"), (3, "a"), (2, "b")]);
        let result = TreeMerger::new().merge(&[a]).unwrap();

        assert!(!result.is_complete());
        assert_eq!(result.unresolved, vec![2, 3]);
        assert_eq!(result.heads.head_id(1), Some(0));
    }

    #[test]
    fn test_rejects_bad_candidates() {
        let merger = TreeMerger::new();
        assert_eq!(merger.merge(&[]), Err(MergeError::NoCandidates));

        let short = HeadAssignment::from_pairs([(0, "root")]);
        let long = HeadAssignment::from_pairs([(0, "root"), (1, "a")]);
        assert_eq!(
            merger.merge(&[long.clone(), short]),
            Err(MergeError::LengthMismatch {
                index: 1,
                expected: 3,
                found: 2
            })
        );

        let wild = HeadAssignment::from_pairs([(0, "root"), (5, "a")]);
        assert_eq!(
            merger.merge(&[long, wild]),
            Err(MergeError::HeadOutOfRange {
                index: 1,
                dep: 2,
                head: 5,
                size: 3
            })
        );
    }

    #[test]
    fn test_merge_into_tree() {
        let mut tree = TreeStore::from_tokens([("a", "a", "X"), ("b", "b", "X")]);
        let a = HeadAssignment::from_pairs([(2, "det"), (0, "root")]);

        let result = TreeMerger::new()
            .merge_into(&mut tree, &[a.clone(), a])
            .unwrap();

        assert!(result.is_complete());
        assert_eq!(tree.head_id(1), Some(2));
        assert_eq!(tree[2].label(), Some("root"));
        assert_eq!(tree.dependents(2).len(), 1);

        let mut small = TreeStore::from_tokens([("a", "a", "X")]);
        let b = HeadAssignment::from_pairs([(2, "det"), (0, "root")]);
        assert_eq!(
            TreeMerger::new().merge_into(&mut small, &[b]),
            Err(MergeError::TreeMismatch { tree: 2, found: 3 })
        );
    }
}
