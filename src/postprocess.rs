//! Repair pass for tokens the parser left without a head

use crate::tree::{NodeId, ROOT_ID, TreeStore};

/// Side of the headless node a candidate head lies on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Left,
    Right,
}

/// A scored proposal to attach a node to a candidate head
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub label: String,
    pub score: f64,
}

/// External model scoring candidate heads for a headless node
pub trait AttachmentScorer {
    fn score(&self, tree: &TreeStore, node: NodeId, candidate: NodeId, direction: Direction) -> Attachment;
}

impl<F> AttachmentScorer for F
where
    F: Fn(&TreeStore, NodeId, NodeId, Direction) -> Attachment,
{
    fn score(&self, tree: &TreeStore, node: NodeId, candidate: NodeId, direction: Direction) -> Attachment {
        self(tree, node, candidate, direction)
    }
}

/// Attaches every headless token to its best-scoring candidate, or the root
#[derive(Debug, Clone)]
pub struct Postprocessor {
    root_label: String,
}

impl Postprocessor {
    pub fn new(root_label: impl Into<String>) -> Self {
        Self {
            root_label: root_label.into(),
        }
    }

    /// Assign a head to every token lacking one; returns how many were repaired
    ///
    /// Candidates are scanned leftwards from the node, then rightwards. The
    /// root with score `-1.0` is the fallback; a candidate must beat the
    /// current best strictly. Candidates inside the node's own subtree are
    /// never considered, so the result stays a tree.
    pub fn repair<S>(&self, tree: &mut TreeStore, scorer: &S) -> usize
    where
        S: AttachmentScorer + ?Sized,
    {
        let size = tree.len();
        let mut repaired = 0;

        for id in 1..size {
            if tree[id].has_head() {
                continue;
            }

            let mut best_head = ROOT_ID;
            let mut best = Attachment {
                label: self.root_label.clone(),
                score: -1.0,
            };

            let left = (1..id).rev().map(|c| (c, Direction::Left));
            let right = (id + 1..size).map(|c| (c, Direction::Right));
            for (candidate, direction) in left.chain(right) {
                if tree.is_descendant_of(candidate, id) {
                    continue;
                }
                let attachment = scorer.score(tree, id, candidate, direction);
                if attachment.score > best.score {
                    best_head = candidate;
                    best = attachment;
                }
            }

            log::debug!(
                "attaching {} to {} as {} ({:.3})",
                id,
                best_head,
                best.label,
                best.score
            );
            tree.attach(id, best_head, &best.label);
            repaired += 1;
        }
        repaired
    }
}
