//! Head assignments: one `(head id, label)` arc per token
//!
//! A [`HeadAssignment`] is a detached snapshot of a tree's primary heads.
//! It is what the oracle reads gold structure from, what [`crate::merge`]
//! votes over, and what the boundary text format round-trips as
//! `id<TAB>head<TAB>label` lines (`0` = root, `-1` = no head yet).

use std::fmt;
use thiserror::Error;

use crate::tree::{BLANK, DepArc, NodeId, ROOT_ID};

/// Text sentinel for a head that has not been assigned
pub const NO_HEAD: i64 = -1;

/// Error reading or validating a head assignment
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HeadsError {
    #[error("line {line}: expected 3 tab-separated fields, found {found}")]
    FieldCount { line: usize, found: usize },

    #[error("line {line}: invalid number {value:?}")]
    InvalidNumber { line: usize, value: String },

    #[error("line {line}: expected token id {expected}, found {found}")]
    UnexpectedId {
        line: usize,
        expected: NodeId,
        found: NodeId,
    },

    #[error("head {head} of node {dep} is out of range for a sentence of size {size}")]
    OutOfRange {
        dep: NodeId,
        head: NodeId,
        size: usize,
    },

    #[error("node {0} has no head")]
    MissingHead(NodeId),

    #[error("node {0} is part of a head cycle")]
    Cycle(NodeId),
}

/// Primary heads of one sentence, indexed by token id (slot 0 is the root)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeadAssignment {
    arcs: Vec<DepArc>,
}

impl HeadAssignment {
    /// All heads unset for a sentence of `size` nodes (root included)
    pub fn new(size: usize) -> Self {
        Self {
            arcs: vec![DepArc::default(); size.max(1)],
        }
    }

    /// Build from `(head, label)` pairs for tokens 1..=n
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (NodeId, &'a str)>) -> Self {
        let mut arcs = vec![DepArc::default()];
        arcs.extend(pairs.into_iter().map(|(head, label)| DepArc::new(head, label)));
        Self { arcs }
    }

    /// Number of slots including the root
    pub fn len(&self) -> usize {
        self.arcs.len()
    }

    /// True if there are no token slots
    pub fn is_empty(&self) -> bool {
        self.arcs.len() <= 1
    }

    pub fn get(&self, id: NodeId) -> Option<&DepArc> {
        self.arcs.get(id)
    }

    pub fn head_id(&self, id: NodeId) -> Option<NodeId> {
        self.arcs.get(id).and_then(|arc| arc.target)
    }

    pub fn label(&self, id: NodeId) -> Option<&str> {
        self.arcs.get(id).and_then(|arc| arc.label.as_deref())
    }

    pub fn set(&mut self, id: NodeId, head: NodeId, label: impl Into<String>) {
        self.set_arc(id, DepArc::new(head, label));
    }

    pub(crate) fn set_arc(&mut self, id: NodeId, arc: DepArc) {
        if id != ROOT_ID && id < self.arcs.len() {
            self.arcs[id] = arc;
        }
    }

    pub fn clear(&mut self, id: NodeId) {
        if let Some(arc) = self.arcs.get_mut(id) {
            arc.clear();
        }
    }

    /// `(id, arc)` for every token, root excluded
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &DepArc)> {
        self.arcs.iter().enumerate().skip(1)
    }

    /// Ids whose head is still unset
    pub fn unresolved(&self) -> Vec<NodeId> {
        self.iter()
            .filter(|(_, arc)| !arc.is_set())
            .map(|(id, _)| id)
            .collect()
    }

    /// Check that every token has an in-range head and that heads form a tree
    pub fn validate(&self) -> Result<(), HeadsError> {
        let size = self.len();
        for (dep, arc) in self.iter() {
            let head = arc.target.ok_or(HeadsError::MissingHead(dep))?;
            if head >= size {
                return Err(HeadsError::OutOfRange { dep, head, size });
            }
        }
        for dep in 1..size {
            let mut current = self.head_id(dep);
            let mut steps = 0;
            while let Some(head) = current {
                steps += 1;
                if head == dep || steps > size {
                    return Err(HeadsError::Cycle(dep));
                }
                current = self.head_id(head);
            }
        }
        Ok(())
    }

    /// Read `id<TAB>head<TAB>label` lines; ids must run 1, 2, ...
    pub fn parse(text: &str) -> Result<Self, HeadsError> {
        let mut heads = Self::new(1);
        for (idx, line) in text.lines().enumerate() {
            let line_num = idx + 1;
            let line = line.trim_end_matches('\r');
            if line.is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            let [id, head, label] = fields[..] else {
                return Err(HeadsError::FieldCount {
                    line: line_num,
                    found: fields.len(),
                });
            };

            let id: NodeId = parse_number(id, line_num)?;
            if id != heads.len() {
                return Err(HeadsError::UnexpectedId {
                    line: line_num,
                    expected: heads.len(),
                    found: id,
                });
            }

            let head: i64 = parse_number(head, line_num)?;
            let arc = match NodeId::try_from(head) {
                Ok(head) => DepArc {
                    target: Some(head),
                    label: (label != BLANK).then(|| label.to_string()),
                },
                Err(_) if head == NO_HEAD => DepArc::default(),
                Err(_) => {
                    return Err(HeadsError::InvalidNumber {
                        line: line_num,
                        value: head.to_string(),
                    });
                }
            };
            heads.arcs.push(arc);
        }
        Ok(heads)
    }
}

fn parse_number<T: atoi::FromRadix10SignedChecked>(field: &str, line: usize) -> Result<T, HeadsError> {
    // an optional minus and at least one digit, nothing else
    let digits = field.strip_prefix('-').unwrap_or(field);
    let well_formed = !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit());
    match T::from_radix_10_signed_checked(field.as_bytes()) {
        (Some(n), used) if well_formed && used == field.len() => Ok(n),
        _ => Err(HeadsError::InvalidNumber {
            line,
            value: field.to_string(),
        }),
    }
}

impl fmt::Display for HeadAssignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (id, arc) in self.iter() {
            match arc.target {
                Some(head) => writeln!(
                    f,
                    "{}\t{}\t{}",
                    id,
                    head,
                    arc.label.as_deref().unwrap_or(BLANK)
                )?,
                None => writeln!(f, "{}\t{}\t{}", id, NO_HEAD, BLANK)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> HeadAssignment {
        HeadAssignment::from_pairs([(2, "nsubj"), (0, "root"), (2, "obj")])
    }

    #[test]
    fn test_from_pairs() {
        let heads = sample();

        assert_eq!(heads.len(), 4);
        assert_eq!(heads.head_id(0), None);
        assert_eq!(heads.head_id(1), Some(2));
        assert_eq!(heads.label(3), Some("obj"));
        assert!(heads.validate().is_ok());
    }

    #[test]
    fn test_text_format() {
        let mut heads = sample();
        heads.clear(3);

        let text = heads.to_string();
        assert_eq!(text, "1\t2\tnsubj\n2\t0\troot\n3\t-1\t_\n");

        let parsed = HeadAssignment::parse(&text).unwrap();
        assert_eq!(parsed, heads);
        assert_eq!(parsed.unresolved(), vec![3]);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            HeadAssignment::parse("1\t2\n"),
            Err(HeadsError::FieldCount { line: 1, found: 2 })
        );
        assert_eq!(
            HeadAssignment::parse("1\tx\tdet\n"),
            Err(HeadsError::InvalidNumber {
                line: 1,
                value: "x".to_string()
            })
        );
        assert_eq!(
            HeadAssignment::parse("2\t0\troot\n"),
            Err(HeadsError::UnexpectedId {
                line: 1,
                expected: 1,
                found: 2
            })
        );
        assert!(HeadAssignment::parse("1\t-3\troot\n").is_err());
        for sign in ["-", "+"] {
            assert_eq!(
                HeadAssignment::parse(&format!("1\t{sign}\troot\n")),
                Err(HeadsError::InvalidNumber {
                    line: 1,
                    value: sign.to_string()
                })
            );
        }
        assert!(matches!(
            HeadAssignment::parse("+1\t0\troot\n"),
            Err(HeadsError::InvalidNumber { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_malformed() {
        let out_of_range = HeadAssignment::from_pairs([(0, "root"), (7, "dep")]);
        assert_eq!(
            out_of_range.validate(),
            Err(HeadsError::OutOfRange {
                dep: 2,
                head: 7,
                size: 3
            })
        );

        let cyclic = HeadAssignment::from_pairs([(2, "a"), (1, "b"), (0, "root")]);
        assert_eq!(cyclic.validate(), Err(HeadsError::Cycle(1)));

        let mut missing = sample();
        missing.clear(2);
        assert_eq!(missing.validate(), Err(HeadsError::MissingHead(2)));
    }
}
