//! Tree data structures for transition-based parsing
//!
//! A [`TreeStore`] owns every [`Node`] of one sentence, with index 0 reserved
//! for the artificial root. Arcs are `(NodeId, label)` pairs pointing back
//! into the same store, so no node can outlive its tree.

use rustc_hash::FxHashMap;
use std::cell::OnceCell;
use std::fmt;
use thiserror::Error;

use crate::heads::HeadAssignment;

/// Position of a node in its sentence (0 = artificial root)
pub type NodeId = usize;

/// Id of the artificial root node
pub const ROOT_ID: NodeId = 0;

/// Form, lemma and POS of the artificial root
pub const ROOT_TAG: &str = "@#r$%";

/// Placeholder for empty columns
pub const BLANK: &str = "_";

/// Error raised by checked tree mutations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TreeError {
    #[error("node {0} is out of range for a tree of size {1}")]
    OutOfRange(NodeId, usize),

    #[error("the root node cannot take a head")]
    RootHead,

    #[error("attaching node {dep} to {head} would create a cycle")]
    Cycle { dep: NodeId, head: NodeId },
}

/// A directed, labeled edge from a dependent to its head
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct DepArc {
    pub target: Option<NodeId>,
    pub label: Option<String>,
}

impl DepArc {
    pub fn new(target: NodeId, label: impl Into<String>) -> Self {
        Self {
            target: Some(target),
            label: Some(label.into()),
        }
    }

    pub fn is_set(&self) -> bool {
        self.target.is_some()
    }

    pub fn is_label(&self, label: &str) -> bool {
        self.label.as_deref() == Some(label)
    }

    pub fn clear(&mut self) {
        self.target = None;
        self.label = None;
    }
}

impl fmt::Display for DepArc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.target {
            Some(target) => write!(f, "{}:{}", target, self.label.as_deref().unwrap_or(BLANK)),
            None => f.write_str(BLANK),
        }
    }
}

/// Morphological features (key=value pairs)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Features(FxHashMap<String, String>);

impl Features {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the `key=value|key=value` column notation (`_` is empty)
    pub fn parse(s: &str) -> Self {
        let mut feats = Self::new();
        if s == BLANK {
            return feats;
        }
        for pair in s.split('|') {
            if let Some((key, value)) = pair.split_once('=') {
                feats.insert(key, value);
            }
        }
        feats
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        let mut pairs: Vec<(&str, &str)> = self
            .0
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        pairs.sort_unstable();
        pairs.into_iter()
    }
}

impl fmt::Display for Features {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str(BLANK);
        }
        for (i, (key, value)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str("|")?;
            }
            write!(f, "{}={}", key, value)?;
        }
        Ok(())
    }
}

/// A single token plus its structural arcs
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub form: String,
    pub lemma: String,
    pub pos: String,
    pub feats: Features,
    head: DepArc,
    pub secondary_heads: Vec<DepArc>,
    pub semantic_heads: Vec<DepArc>,
}

impl Node {
    /// Create a new node with the given attributes
    pub fn new(id: NodeId, form: &str, lemma: &str, pos: &str) -> Self {
        Self::with_feats(id, form, lemma, pos, Features::new())
    }

    pub fn with_feats(id: NodeId, form: &str, lemma: &str, pos: &str, feats: Features) -> Self {
        Self {
            id,
            form: form.to_string(),
            lemma: lemma.to_string(),
            pos: pos.to_string(),
            feats,
            head: DepArc::default(),
            secondary_heads: Vec::new(),
            semantic_heads: Vec::new(),
        }
    }

    fn root() -> Self {
        Self::new(ROOT_ID, ROOT_TAG, ROOT_TAG, ROOT_TAG)
    }

    pub fn head(&self) -> &DepArc {
        &self.head
    }

    pub fn head_id(&self) -> Option<NodeId> {
        self.head.target
    }

    pub fn label(&self) -> Option<&str> {
        self.head.label.as_deref()
    }

    pub fn has_head(&self) -> bool {
        self.head.is_set()
    }

    pub fn feat(&self, key: &str) -> Option<&str> {
        self.feats.get(key)
    }

    /// True if this node's head is the artificial root
    pub fn is_root_child(&self) -> bool {
        self.head.target == Some(ROOT_ID)
    }

    pub fn add_semantic_head(&mut self, head: NodeId, label: impl Into<String>) {
        self.semantic_heads.push(DepArc::new(head, label));
    }

    pub fn semantic_heads_by_label(&self, label: &str) -> Vec<&DepArc> {
        self.semantic_heads
            .iter()
            .filter(|arc| arc.is_label(label))
            .collect()
    }

    pub fn remove_semantic_heads_by_label(&mut self, label: &str) {
        self.semantic_heads.retain(|arc| !arc.is_label(label));
    }

    /// True if `head` is one of this node's semantic heads, optionally with `label`
    pub fn is_argument_of(&self, head: NodeId, label: Option<&str>) -> bool {
        self.semantic_heads.iter().any(|arc| {
            arc.target == Some(head) && label.is_none_or(|l| arc.is_label(l))
        })
    }

    pub fn add_secondary_head(&mut self, head: NodeId, label: impl Into<String>) {
        self.secondary_heads.push(DepArc::new(head, label));
    }
}

/// A dependent of some node, as seen from the head
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependent {
    pub id: NodeId,
    pub label: Option<String>,
}

/// One sentence: index 0 is the artificial root, tokens follow in order
#[derive(Debug, Clone)]
pub struct TreeStore {
    nodes: Vec<Node>,
    /// Memoized dependents per node, dropped on every head mutation
    dependents: OnceCell<Vec<Vec<Dependent>>>,
}

impl TreeStore {
    /// Create a tree holding only the artificial root
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::root()],
            dependents: OnceCell::new(),
        }
    }

    /// Build a tree from `(form, lemma, pos)` triples
    pub fn from_tokens<'a>(tokens: impl IntoIterator<Item = (&'a str, &'a str, &'a str)>) -> Self {
        let mut tree = Self::new();
        for (form, lemma, pos) in tokens {
            tree.add_token(form, lemma, pos, Features::new());
        }
        tree
    }

    /// Append a token; its id is its position
    pub fn add_token(&mut self, form: &str, lemma: &str, pos: &str, feats: Features) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node::with_feats(id, form, lemma, pos, feats));
        self.invalidate();
        id
    }

    /// Number of nodes including the root
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True if the tree holds no token besides the root
    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Mutable access to token attributes; heads stay behind [`TreeStore::set_head`]
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    /// All nodes except the root
    pub fn tokens(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().skip(1)
    }

    pub fn head_id(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id).and_then(Node::head_id)
    }

    pub fn grand_head_id(&self, id: NodeId) -> Option<NodeId> {
        self.head_id(id).and_then(|head| self.head_id(head))
    }

    /// Attach `dep` to `head`, checking ids and refusing cycles
    pub fn set_head(&mut self, dep: NodeId, head: NodeId, label: &str) -> Result<(), TreeError> {
        let size = self.len();
        if dep >= size {
            return Err(TreeError::OutOfRange(dep, size));
        }
        if head >= size {
            return Err(TreeError::OutOfRange(head, size));
        }
        if dep == ROOT_ID {
            return Err(TreeError::RootHead);
        }
        if dep == head || self.is_descendant_of(head, dep) {
            return Err(TreeError::Cycle { dep, head });
        }
        self.attach(dep, head, label);
        Ok(())
    }

    /// Unchecked attachment used by the algorithms, which uphold the guards themselves
    pub(crate) fn attach(&mut self, dep: NodeId, head: NodeId, label: &str) {
        let arc = &mut self.nodes[dep].head;
        arc.target = Some(head);
        arc.label = Some(label.to_string());
        self.invalidate();
    }

    pub fn clear_head(&mut self, id: NodeId) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.head.clear();
            self.invalidate();
        }
    }

    pub fn clear_heads(&mut self) {
        for node in &mut self.nodes {
            node.head.clear();
        }
        self.invalidate();
    }

    fn invalidate(&mut self) {
        self.dependents.take();
    }

    /// True if `ancestor` lies on the head chain above `id`
    ///
    /// The walk is bounded by the tree size, so malformed head data
    /// cannot loop forever.
    pub fn is_descendant_of(&self, id: NodeId, ancestor: NodeId) -> bool {
        let mut current = self.head_id(id);
        let mut steps = 0;
        while let Some(head) = current {
            if head == ancestor {
                return true;
            }
            steps += 1;
            if steps > self.len() {
                return false;
            }
            current = self.head_id(head);
        }
        false
    }

    /// True if some token reaches itself by following heads
    pub fn contains_cycle(&self) -> bool {
        (1..self.len()).any(|id| self.walks_forever(id))
    }

    fn walks_forever(&self, id: NodeId) -> bool {
        let mut current = self.head_id(id);
        for _ in 0..=self.len() {
            match current {
                Some(head) => current = self.head_id(head),
                None => return false,
            }
        }
        true
    }

    fn dependent_lists(&self) -> &Vec<Vec<Dependent>> {
        self.dependents.get_or_init(|| {
            let mut lists = vec![Vec::new(); self.nodes.len()];
            for node in self.nodes.iter().skip(1) {
                if let Some(head) = node.head_id() {
                    lists[head].push(Dependent {
                        id: node.id,
                        label: node.head.label.clone(),
                    });
                }
            }
            lists
        })
    }

    /// Dependents of `id`, ordered by id
    pub fn dependents(&self, id: NodeId) -> &[Dependent] {
        self.dependent_lists()
            .get(id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn left_dependents(&self, id: NodeId) -> impl Iterator<Item = &Dependent> {
        self.dependents(id).iter().take_while(move |d| d.id < id)
    }

    pub fn right_dependents(&self, id: NodeId) -> impl Iterator<Item = &Dependent> {
        self.dependents(id).iter().skip_while(move |d| d.id < id)
    }

    pub fn left_valency(&self, id: NodeId) -> usize {
        self.left_dependents(id).count()
    }

    pub fn right_valency(&self, id: NodeId) -> usize {
        self.right_dependents(id).count()
    }

    /// The `order`-th dependent counting from the far left (0 = leftmost)
    pub fn leftmost_dependent(&self, id: NodeId, order: usize) -> Option<NodeId> {
        self.left_dependents(id).nth(order).map(|d| d.id)
    }

    /// The `order`-th dependent counting from the far right (0 = rightmost)
    pub fn rightmost_dependent(&self, id: NodeId, order: usize) -> Option<NodeId> {
        self.dependents(id)
            .iter()
            .rev()
            .take_while(|d| d.id > id)
            .nth(order)
            .map(|d| d.id)
    }

    /// Closest sibling to the left, not crossing the shared head
    pub fn left_nearest_sibling(&self, id: NodeId) -> Option<NodeId> {
        let head = self.head_id(id)?;
        self.dependents(head)
            .iter()
            .rev()
            .find(|d| d.id < id)
            .map(|d| d.id)
            .filter(|&sib| head > id || sib > head)
    }

    /// Closest sibling to the right, not crossing the shared head
    pub fn right_nearest_sibling(&self, id: NodeId) -> Option<NodeId> {
        let head = self.head_id(id)?;
        self.dependents(head)
            .iter()
            .find(|d| d.id > id)
            .map(|d| d.id)
            .filter(|&sib| head < id || sib < head)
    }

    /// Sorted ids of `id` and all its descendants
    pub fn subtree_ids(&self, id: NodeId) -> Vec<NodeId> {
        let mut ids = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if current >= self.len() || ids.contains(&current) {
                continue;
            }
            ids.push(current);
            stack.extend(self.dependents(current).iter().map(|d| d.id));
        }
        ids.sort_unstable();
        ids
    }

    /// For every node, the arcs of tokens that name it as a semantic head
    pub fn argument_lists(&self) -> Vec<Vec<DepArc>> {
        let mut lists = vec![Vec::new(); self.len()];
        for node in self.tokens() {
            for arc in &node.semantic_heads {
                if let Some(list) = arc.target.and_then(|head| lists.get_mut(head)) {
                    list.push(DepArc {
                        target: Some(node.id),
                        label: arc.label.clone(),
                    });
                }
            }
        }
        lists
    }

    /// Snapshot of every node's primary head
    pub fn heads(&self) -> HeadAssignment {
        let mut heads = HeadAssignment::new(self.len());
        for node in self.tokens() {
            heads.set_arc(node.id, node.head.clone());
        }
        heads
    }

    /// Replace all primary heads with `heads`; unset entries clear the head
    pub fn reset_heads(&mut self, heads: &HeadAssignment) {
        for node in self.nodes.iter_mut().skip(1) {
            node.head = heads.get(node.id).cloned().unwrap_or_default();
        }
        self.invalidate();
    }

    /// Copy only the set entries of `heads` onto the tree
    pub fn append_heads(&mut self, heads: &HeadAssignment) {
        for node in self.nodes.iter_mut().skip(1) {
            if let Some(arc) = heads.get(node.id).filter(|arc| arc.is_set()) {
                node.head = arc.clone();
            }
        }
        self.invalidate();
    }

    /// Space-separated forms, root excluded
    pub fn to_raw_string(&self) -> String {
        self.tokens()
            .map(|node| node.form.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Default for TreeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Index<NodeId> for TreeStore {
    type Output = Node;

    fn index(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }
}

impl fmt::Display for TreeStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for node in self.tokens() {
            let (head, label) = match node.head_id() {
                Some(head) => (head.to_string(), node.label().unwrap_or(BLANK)),
                None => (BLANK.to_string(), BLANK),
            };
            writeln!(
                f,
                "{}\t{}\t{}\t{}\t{}\t{}\t{}",
                node.id, node.form, node.lemma, node.pos, node.feats, head, label
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// The dog barks loudly
    ///   barks <- root, dog <- barks, The <- dog, loudly <- barks
    fn create_test_tree() -> TreeStore {
        let mut tree = TreeStore::from_tokens([
            ("The", "the", "DT"),
            ("dog", "dog", "NN"),
            ("barks", "bark", "VBZ"),
            ("loudly", "loudly", "RB"),
        ]);
        tree.set_head(1, 2, "det").unwrap();
        tree.set_head(2, 3, "nsubj").unwrap();
        tree.set_head(3, 0, "root").unwrap();
        tree.set_head(4, 3, "advmod").unwrap();
        tree
    }

    #[test]
    fn test_tree_creation() {
        let tree = create_test_tree();

        assert_eq!(tree.len(), 5);
        assert_eq!(tree[0].form, ROOT_TAG);
        assert!(!tree[0].has_head());
        assert_eq!(tree.head_id(1), Some(2));
        assert_eq!(tree[2].label(), Some("nsubj"));
        assert_eq!(tree.grand_head_id(1), Some(3));
        assert!(tree[3].is_root_child());
    }

    #[test]
    fn test_set_head_guards() {
        let mut tree = create_test_tree();

        assert_eq!(tree.set_head(0, 1, "x"), Err(TreeError::RootHead));
        assert_eq!(tree.set_head(9, 1, "x"), Err(TreeError::OutOfRange(9, 5)));
        assert_eq!(tree.set_head(3, 1, "x"), Err(TreeError::Cycle { dep: 3, head: 1 }));
        assert_eq!(tree.set_head(2, 2, "x"), Err(TreeError::Cycle { dep: 2, head: 2 }));
        assert!(!tree.contains_cycle());
    }

    #[test]
    fn test_dependents_are_ordered() {
        let tree = create_test_tree();

        let deps: Vec<NodeId> = tree.dependents(3).iter().map(|d| d.id).collect();
        assert_eq!(deps, vec![2, 4]);
        assert_eq!(tree.dependents(3)[0].label.as_deref(), Some("nsubj"));
        assert_eq!(tree.left_valency(3), 1);
        assert_eq!(tree.right_valency(3), 1);
        assert_eq!(tree.leftmost_dependent(3, 0), Some(2));
        assert_eq!(tree.rightmost_dependent(3, 0), Some(4));
        assert_eq!(tree.rightmost_dependent(3, 1), None);
    }

    #[test]
    fn test_dependents_invalidated_on_mutation() {
        let mut tree = create_test_tree();
        assert_eq!(tree.dependents(2).len(), 1);

        tree.set_head(4, 2, "amod").unwrap();
        let deps: Vec<NodeId> = tree.dependents(2).iter().map(|d| d.id).collect();
        assert_eq!(deps, vec![1, 4]);
        assert_eq!(tree.right_valency(3), 0);

        tree.clear_head(1);
        assert_eq!(tree.dependents(2).len(), 1);
    }

    #[test]
    fn test_valency_matches_dependents() {
        let tree = create_test_tree();

        for node in tree.nodes() {
            let deps = tree.dependents(node.id);
            assert_eq!(tree.left_valency(node.id) + tree.right_valency(node.id), deps.len());
            for dep in deps {
                assert_eq!(tree.head_id(dep.id), Some(node.id));
            }
        }
    }

    #[test]
    fn test_siblings_and_subtree() {
        let mut tree = create_test_tree();
        tree.set_head(1, 3, "dep").unwrap();

        assert_eq!(tree.right_nearest_sibling(1), Some(2));
        assert_eq!(tree.left_nearest_sibling(2), Some(1));
        // loudly is on the other side of the head
        assert_eq!(tree.right_nearest_sibling(2), None);
        assert_eq!(tree.subtree_ids(3), vec![1, 2, 3, 4]);
        assert_eq!(tree.subtree_ids(2), vec![2]);
    }

    #[test]
    fn test_descendant_walk() {
        let tree = create_test_tree();

        assert!(tree.is_descendant_of(1, 3));
        assert!(tree.is_descendant_of(1, ROOT_ID));
        assert!(!tree.is_descendant_of(3, 1));
        assert!(!tree.is_descendant_of(0, 1));
    }

    #[test]
    fn test_heads_snapshot_and_reset() {
        let mut tree = create_test_tree();
        let heads = tree.heads();

        tree.clear_heads();
        assert!(tree.tokens().all(|n| !n.has_head()));
        assert!(tree.dependents(3).is_empty());

        tree.reset_heads(&heads);
        assert_eq!(tree.heads(), heads);
        assert_eq!(tree.dependents(3).len(), 2);
    }

    #[test]
    fn test_features() {
        let feats = Features::parse("Number=Sing|Case=Nom");
        assert_eq!(feats.get("Case"), Some("Nom"));
        assert_eq!(feats.to_string(), "Case=Nom|Number=Sing");
        assert!(Features::parse("_").is_empty());
        assert_eq!(Features::new().to_string(), "_");
    }

    #[test]
    fn test_semantic_heads() {
        let mut tree = create_test_tree();
        let node = tree.get_mut(2).unwrap();
        node.add_semantic_head(3, "A0");
        node.add_semantic_head(3, "AM-TMP");

        assert!(tree[2].is_argument_of(3, None));
        assert!(tree[2].is_argument_of(3, Some("A0")));
        assert!(!tree[2].is_argument_of(3, Some("A1")));
        assert_eq!(tree[2].semantic_heads_by_label("A0").len(), 1);

        let args = tree.argument_lists();
        assert_eq!(args[3].len(), 2);
        assert_eq!(args[3][0].target, Some(2));

        tree.get_mut(2).unwrap().remove_semantic_heads_by_label("A0");
        assert_eq!(tree[2].semantic_heads.len(), 1);
    }

    #[test]
    fn test_display() {
        let tree = create_test_tree();
        let text = tree.to_string();
        let first = text.lines().next().unwrap();

        assert_eq!(first, "1\tThe\tthe\tDT\t_\t2\tdet");
        assert_eq!(tree.to_raw_string(), "The dog barks loudly");
    }
}
