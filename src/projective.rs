//! Removal of crossing arcs
//!
//! An arc from `wk` to its head `wi` is non-projective when some token
//! strictly between them is not a descendant of `wi`. Its measure is the
//! arc length `|wi - wk|`, or 0 for a projective arc. The projectivizer
//! repeatedly lifts the worst arc one level up the head chain until no
//! crossing arc remains.

use crate::config::ParserConfig;
use crate::tree::{NodeId, TreeStore};

/// Length of the arc above `id` if it is non-projective, otherwise 0
pub fn non_projective_measure(tree: &TreeStore, id: NodeId) -> usize {
    let Some(head) = tree.head_id(id) else {
        return 0;
    };
    let (lo, hi) = if head < id { (head, id) } else { (id, head) };
    if (lo + 1..hi).any(|j| !tree.is_descendant_of(j, head)) {
        hi - lo
    } else {
        0
    }
}

/// True if no arc in the tree crosses another
pub fn is_projective(tree: &TreeStore) -> bool {
    (1..tree.len()).all(|id| non_projective_measure(tree, id) == 0)
}

/// Lifts non-projective arcs to the grand-head
#[derive(Debug, Clone)]
pub struct Projectivizer {
    label: String,
}

impl Projectivizer {
    /// `label` replaces the label of every lifted arc
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }

    /// Projectivizer labelling lifted arcs with `non_projective_label`
    pub fn from_config(config: &ParserConfig) -> Self {
        Self::new(config.non_projective_label.as_str())
    }

    /// Lift crossing arcs until the tree is projective; returns the number of lifts
    ///
    /// Measures are recomputed for every node each round, since a lift can
    /// make a previously projective arc cross. The longest arc goes first;
    /// on equal measures the lowest dependent id wins.
    pub fn projectivize(&self, tree: &mut TreeStore) -> usize {
        if tree.contains_cycle() {
            log::warn!("not projectivizing a tree with a head cycle");
            return 0;
        }
        let mut lifts = 0;
        while let Some(id) = self.worst_arc(tree) {
            // worst_arc only yields nodes whose head has a head
            let Some(grand_head) = tree.grand_head_id(id) else {
                break;
            };
            log::debug!(
                "lifting {} from {} to {}",
                id,
                tree.head_id(id).unwrap_or_default(),
                grand_head
            );
            tree.attach(id, grand_head, &self.label);
            lifts += 1;
        }
        lifts
    }

    fn worst_arc(&self, tree: &TreeStore) -> Option<NodeId> {
        let mut worst = None;
        let mut max = 0;
        for id in 1..tree.len() {
            if tree.grand_head_id(id).is_none() {
                continue;
            }
            let measure = non_projective_measure(tree, id);
            if measure > max {
                max = measure;
                worst = Some(id);
            }
        }
        worst
    }
}
