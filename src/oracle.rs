//! Gold-standard decisions for training
//!
//! [`OracleLabeler`] reads the reference heads of a sentence and, at every
//! configuration, returns the decision that keeps the parse on track to
//! reproduce them. Driving [`crate::parser::TransitionParser`] with it
//! rebuilds the gold tree exactly.

use thiserror::Error;

use crate::feature::FeatureTemplate;
use crate::heads::{HeadAssignment, HeadsError};
use crate::parser::{DecisionSource, ParseError, ParseState};
use crate::transition::{ArcType, Decision, ListAction};
use crate::tree::{NodeId, ROOT_ID, TreeStore};

/// Error building or applying an oracle
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OracleError {
    #[error("Invalid gold heads: {0}")]
    Heads(#[from] HeadsError),

    #[error("Gold heads cover {gold} nodes but the sentence has {tree}")]
    LengthMismatch { gold: usize, tree: usize },
}

/// One decision together with the features seen when it was made
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingInstance {
    pub decision: Decision,
    pub features: Vec<Option<String>>,
}

/// Decision source that follows a reference tree
#[derive(Debug, Clone)]
pub struct OracleLabeler {
    gold: HeadAssignment,
    template: Option<FeatureTemplate>,
    instances: Vec<TrainingInstance>,
}

impl OracleLabeler {
    /// Build from gold heads, rejecting missing, out-of-range or cyclic heads
    pub fn new(gold: HeadAssignment) -> Result<Self, OracleError> {
        gold.validate()?;
        Ok(Self {
            gold,
            template: None,
            instances: Vec::new(),
        })
    }

    /// Build from the heads currently on `tree`
    pub fn from_tree(tree: &TreeStore) -> Result<Self, OracleError> {
        Self::new(tree.heads())
    }

    /// Record a [`TrainingInstance`] for every decision
    pub fn with_template(mut self, template: FeatureTemplate) -> Self {
        self.template = Some(template);
        self
    }

    pub fn gold(&self) -> &HeadAssignment {
        &self.gold
    }

    pub fn instances(&self) -> &[TrainingInstance] {
        &self.instances
    }

    pub fn take_instances(&mut self) -> Vec<TrainingInstance> {
        std::mem::take(&mut self.instances)
    }

    /// The gold decision for the current configuration
    ///
    /// With lambda unset only a shift is possible, so the empty
    /// no-arc shift is returned.
    pub fn label(&self, state: &ParseState<'_>) -> Decision {
        let Some(lambda) = state.lambda() else {
            return Decision::no_arc(ListAction::Shift);
        };
        let beta = state.beta();

        if lambda != ROOT_ID && self.gold.head_id(lambda) == Some(beta) {
            let list = if self.has_gold_dependent_after(lambda, beta) {
                ListAction::Pass
            } else {
                ListAction::Reduce
            };
            return Decision::new(ArcType::Left, list, self.gold.label(lambda).unwrap_or_default());
        }

        let shift = self.can_shift(state, lambda, beta);
        if self.gold.head_id(beta) == Some(lambda) {
            let list = if shift {
                ListAction::Shift
            } else {
                ListAction::Pass
            };
            return Decision::new(ArcType::Right, list, self.gold.label(beta).unwrap_or_default());
        }

        let list = if shift {
            ListAction::Shift
        } else if state.tree()[lambda].has_head()
            && !self.has_gold_dependent_after(lambda, beta)
        {
            ListAction::Reduce
        } else {
            ListAction::Pass
        };
        Decision::no_arc(list)
    }

    /// Nothing left of lambda still waits for beta, and beta's head is not left of lambda
    fn can_shift(&self, state: &ParseState<'_>, lambda: NodeId, beta: NodeId) -> bool {
        self.gold.head_id(beta).is_some_and(|head| head >= lambda)
            && !(1..lambda).any(|i| !state.is_reduced(i) && self.gold.head_id(i) == Some(beta))
    }

    /// Some token right of beta has `id` as its gold head
    fn has_gold_dependent_after(&self, id: NodeId, beta: NodeId) -> bool {
        (beta + 1..self.gold.len()).any(|i| self.gold.head_id(i) == Some(id))
    }
}

impl DecisionSource for OracleLabeler {
    fn begin(&mut self, tree: &TreeStore) -> Result<(), ParseError> {
        if tree.len() != self.gold.len() {
            return Err(OracleError::LengthMismatch {
                gold: self.gold.len(),
                tree: tree.len(),
            }
            .into());
        }
        Ok(())
    }

    fn decide(&mut self, state: &ParseState<'_>) -> Result<Decision, ParseError> {
        let decision = self.label(state);
        if let Some(template) = &self.template {
            self.instances.push(TrainingInstance {
                decision: decision.clone(),
                features: state.extract(template),
            });
        }
        Ok(decision)
    }
}
