//! Transition-based dependency parser
//!
//! The automaton keeps two pointers over the sentence: `lambda`, the left
//! candidate, and `beta`, the right candidate. At each step a
//! [`DecisionSource`] proposes a [`Decision`] for the pair, the parser's
//! guards may override it, and the resulting [`Transition`] updates heads and
//! pointers. Parsing stops when `beta` runs off the end of the sentence.
//!
//! The same automaton serves training (driven by
//! [`crate::oracle::OracleLabeler`]) and inference (driven by a
//! [`ClassifierSource`]).

use rustc_hash::FxHashSet;
use std::fmt;
use thiserror::Error;

use crate::config::ParserConfig;
use crate::feature::{Feature, FeatureTemplate, FeatureToken, Field, Relation, Source};
use crate::oracle::{OracleError, OracleLabeler};
use crate::postprocess::{AttachmentScorer, Postprocessor};
use crate::transition::{ArcType, Decision, ListAction, Transition};
use crate::tree::{Node, NodeId, ROOT_ID, TreeStore};

/// Error during a parse
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Cannot parse a sentence without tokens")]
    EmptySentence,

    #[error(transparent)]
    Oracle(#[from] OracleError),

    /// Raised by a [`DecisionSource`] that cannot produce a decision
    #[error("Decision source failed: {0}")]
    Source(String),
}

/// Anything that can choose the next transition
///
/// External sources (a model server, a feature cache) report their own
/// failures as [`ParseError::Source`]; the error aborts the parse and is
/// returned unchanged from [`TransitionParser::parse`].
pub trait DecisionSource {
    /// Called once per parse, before the first decision
    fn begin(&mut self, _tree: &TreeStore) -> Result<(), ParseError> {
        Ok(())
    }

    fn decide(&mut self, state: &ParseState<'_>) -> Result<Decision, ParseError>;
}

/// Output of an external classifier
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub decision: Decision,
    pub confidence: f64,
}

/// External model mapping feature values to a decision
pub trait Classifier {
    fn predict(&self, features: &[Option<String>]) -> Prediction;
}

impl<F> Classifier for F
where
    F: Fn(&[Option<String>]) -> Prediction,
{
    fn predict(&self, features: &[Option<String>]) -> Prediction {
        self(features)
    }
}

/// Decision source backed by a feature template and a classifier
pub struct ClassifierSource<C> {
    template: FeatureTemplate,
    classifier: C,
}

impl<C: Classifier> ClassifierSource<C> {
    pub fn new(template: FeatureTemplate, classifier: C) -> Self {
        Self {
            template,
            classifier,
        }
    }

    pub fn template(&self) -> &FeatureTemplate {
        &self.template
    }
}

impl<C: Classifier> DecisionSource for ClassifierSource<C> {
    fn decide(&mut self, state: &ParseState<'_>) -> Result<Decision, ParseError> {
        let values = state.extract(&self.template);
        Ok(self.classifier.predict(&values).decision)
    }
}

/// Pointer snapshot reported to trace sinks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub lambda: Option<NodeId>,
    /// first unreduced node strictly between lambda and beta
    pub lambda2: Option<NodeId>,
    pub beta: NodeId,
    pub size: usize,
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        if let Some(lambda) = self.lambda {
            if lambda > 0 {
                f.write_str("L1|")?;
            }
            write!(f, "{}", lambda)?;
        }
        f.write_str("]\t[")?;
        if let Some(lambda2) = self.lambda2 {
            write!(f, "{}", lambda2)?;
            if self.beta - lambda2 > 1 {
                f.write_str("|L2")?;
            }
        }
        f.write_str("]\t[")?;
        if self.beta < self.size {
            write!(f, "{}", self.beta)?;
            if self.beta + 1 < self.size {
                f.write_str("|B")?;
            }
        }
        f.write_str("]")
    }
}

/// One transition as seen by a trace sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEvent<'a> {
    pub transition: Transition,
    /// pointers before the transition was applied
    pub window: Window,
    /// arc label for arc transitions
    pub label: Option<&'a str>,
}

impl fmt::Display for TraceEvent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}\t", self.transition, self.window)?;
        if let (Some(label), Some(lambda)) = (self.label, self.window.lambda) {
            match self.transition.arc() {
                ArcType::Left => write!(f, "{} <-{}- {}", lambda, label, self.window.beta)?,
                ArcType::Right => write!(f, "{} -{}-> {}", lambda, label, self.window.beta)?,
                ArcType::No => {}
            }
        }
        Ok(())
    }
}

/// Observer notified of every transition
pub trait TraceSink {
    fn on_transition(&mut self, event: &TraceEvent<'_>);
}

/// Writes transitions to the `log` facade at trace level
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTraceSink;

impl TraceSink for LogTraceSink {
    fn on_transition(&mut self, event: &TraceEvent<'_>) {
        log::trace!("{}", event);
    }
}

/// Keeps every transition in memory
#[derive(Debug, Clone, Default)]
pub struct RecordingTraceSink {
    pub events: Vec<(Transition, Window, Option<String>)>,
}

impl TraceSink for RecordingTraceSink {
    fn on_transition(&mut self, event: &TraceEvent<'_>) {
        self.events
            .push((event.transition, event.window, event.label.map(str::to_string)));
    }
}

/// Transitions taken by one parse
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransitionTrace {
    steps: Vec<Transition>,
}

impl TransitionTrace {
    /// Number of transitions, forced ones included
    pub fn count(&self) -> usize {
        self.steps.len()
    }

    pub fn steps(&self) -> &[Transition] {
        &self.steps
    }
}

/// Transient automaton state for one parse
#[derive(Debug)]
struct Configuration {
    lambda: Option<NodeId>,
    beta: NodeId,
    reduced: Vec<bool>,
    leftmost: Vec<Option<NodeId>>,
    rightmost: Vec<Option<NodeId>>,
    steps: Vec<Transition>,
}

impl Configuration {
    fn new(size: usize) -> Self {
        Self {
            lambda: Some(ROOT_ID),
            beta: 1,
            reduced: vec![false; size],
            leftmost: vec![None; size],
            rightmost: vec![None; size],
            steps: Vec::with_capacity(size * 2),
        }
    }

    fn is_reduced(&self, id: NodeId) -> bool {
        self.reduced.get(id).copied().unwrap_or(false)
    }

    fn window(&self, size: usize) -> Window {
        let start = self.lambda.map_or(0, |lambda| lambda + 1);
        Window {
            lambda: self.lambda,
            lambda2: (start..self.beta).find(|&i| !self.is_reduced(i)),
            beta: self.beta,
            size,
        }
    }

    /// Apply the guards to a requested decision
    fn select(&self, tree: &TreeStore, lambda: NodeId, decision: &Decision) -> Transition {
        let beta = self.beta;
        match decision.arc {
            ArcType::Left => {
                if lambda == ROOT_ID {
                    Transition::NoShift
                } else if tree.is_descendant_of(beta, lambda) {
                    Transition::NoPass
                } else if decision.list == ListAction::Reduce {
                    Transition::LeftReduce
                } else {
                    Transition::LeftPass
                }
            }
            ArcType::Right => {
                if tree.is_descendant_of(lambda, beta) {
                    Transition::NoPass
                } else if decision.list == ListAction::Shift {
                    Transition::RightShift
                } else {
                    Transition::RightPass
                }
            }
            ArcType::No => match decision.list {
                ListAction::Shift => Transition::NoShift,
                ListAction::Reduce if tree[lambda].has_head() => Transition::NoReduce,
                _ => Transition::NoPass,
            },
        }
    }

    fn apply(&mut self, tree: &mut TreeStore, transition: Transition, label: &str) {
        self.steps.push(transition);
        match transition {
            Transition::LeftReduce => {
                self.left_arc(tree, label);
                self.reduce();
            }
            Transition::LeftPass => {
                self.left_arc(tree, label);
                self.pass();
            }
            Transition::RightShift => {
                self.right_arc(tree, label);
                self.shift();
            }
            Transition::RightPass => {
                self.right_arc(tree, label);
                self.pass();
            }
            Transition::NoShift => self.shift(),
            Transition::NoReduce => self.reduce(),
            Transition::NoPass => self.pass(),
        }
    }

    fn left_arc(&mut self, tree: &mut TreeStore, label: &str) {
        if let Some(lambda) = self.lambda {
            tree.attach(lambda, self.beta, label);
            self.leftmost[self.beta] = Some(lambda);
        }
    }

    fn right_arc(&mut self, tree: &mut TreeStore, label: &str) {
        if let Some(lambda) = self.lambda {
            tree.attach(self.beta, lambda, label);
            self.rightmost[lambda] = Some(self.beta);
        }
    }

    fn shift(&mut self) {
        self.lambda = Some(self.beta);
        self.beta += 1;
    }

    fn reduce(&mut self) {
        if let Some(lambda) = self.lambda {
            self.reduced[lambda] = true;
        }
        self.pass();
    }

    fn pass(&mut self) {
        self.lambda = self
            .lambda
            .and_then(|lambda| (0..lambda).rev().find(|&i| !self.reduced[i]));
    }
}

/// Read-only view of the automaton handed to decision sources
pub struct ParseState<'a> {
    tree: &'a TreeStore,
    config: &'a Configuration,
    punctuation: &'a FxHashSet<String>,
}

impl<'a> ParseState<'a> {
    fn new(
        tree: &'a TreeStore,
        config: &'a Configuration,
        punctuation: &'a FxHashSet<String>,
    ) -> Self {
        Self {
            tree,
            config,
            punctuation,
        }
    }

    pub fn tree(&self) -> &'a TreeStore {
        self.tree
    }

    pub fn lambda(&self) -> Option<NodeId> {
        self.config.lambda
    }

    pub fn beta(&self) -> NodeId {
        self.config.beta
    }

    /// Sentence size including the root
    pub fn size(&self) -> usize {
        self.tree.len()
    }

    pub fn is_reduced(&self, id: NodeId) -> bool {
        self.config.is_reduced(id)
    }

    /// Dependent recorded by the most recent left arc into `id`
    pub fn leftmost_dependent(&self, id: NodeId) -> Option<NodeId> {
        self.config.leftmost.get(id).copied().flatten()
    }

    /// Dependent recorded by the most recent right arc out of `id`
    pub fn rightmost_dependent(&self, id: NodeId) -> Option<NodeId> {
        self.config.rightmost.get(id).copied().flatten()
    }

    /// Resolve a token to a node; `None` when the address is out of range
    pub fn node(&self, token: &FeatureToken) -> Option<&'a Node> {
        let id = match token.source {
            Source::Stack => self.stack_id(token.offset)?,
            Source::Lambda => self.lambda_id(token.offset)?,
            Source::Beta => self.beta_id(token.offset)?,
        };
        let id = match token.relation {
            None => id,
            Some(Relation::Head) => self.tree.head_id(id)?,
            Some(Relation::LeftmostDependent) => self.leftmost_dependent(id)?,
            Some(Relation::RightmostDependent) => self.rightmost_dependent(id)?,
        };
        self.tree.get(id)
    }

    fn stack_id(&self, offset: i32) -> Option<NodeId> {
        let lambda = self.config.lambda?;
        if offset == 0 {
            return Some(lambda);
        }
        let step: isize = if offset < 0 { -1 } else { 1 };
        let mut remaining = offset.unsigned_abs();
        let beta = self.config.beta as isize;
        let mut i = lambda as isize + step;
        while 0 < i && i < beta {
            let id = i as NodeId;
            if !self.config.is_reduced(id) {
                remaining -= 1;
                if remaining == 0 {
                    return Some(id);
                }
            }
            i += step;
        }
        None
    }

    fn lambda_id(&self, offset: i32) -> Option<NodeId> {
        let lambda = self.config.lambda?;
        if offset == 0 {
            return Some(lambda);
        }
        let index = lambda as isize + offset as isize;
        (0 < index && index < self.config.beta as isize).then_some(index as NodeId)
    }

    fn beta_id(&self, offset: i32) -> Option<NodeId> {
        let beta = self.config.beta;
        if offset == 0 {
            return (beta < self.size()).then_some(beta);
        }
        let lower = self.config.lambda.map_or(-1, |lambda| lambda as isize);
        let index = beta as isize + offset as isize;
        (lower < index && index < self.size() as isize).then_some(index as NodeId)
    }

    /// Value of one token, or `None` if it cannot be resolved
    pub fn value(&self, token: &FeatureToken) -> Option<String> {
        let node = self.node(token)?;
        match &token.field {
            Field::Form => Some(node.form.clone()),
            Field::Lemma => Some(node.lemma.clone()),
            Field::Pos => Some(node.pos.clone()),
            Field::Deprel => node.label().map(str::to_string),
            Field::Feat(key) => node.feat(key).map(str::to_string),
            Field::LeftPunctLambda => self.left_nearest_punct(0, self.config.lambda?),
            Field::RightPunctLambda => self.right_nearest_punct(self.config.lambda?, self.config.beta),
            Field::LeftPunctBeta => self.left_nearest_punct(self.config.lambda?, self.config.beta),
            Field::RightPunctBeta => self.right_nearest_punct(self.config.beta, self.size()),
            Field::Boolean(index) => {
                let lambda = self.config.lambda?;
                let beta = self.config.beta;
                let flag = match index {
                    0 => lambda == 1,
                    1 => beta + 1 == self.size(),
                    2 => lambda + 1 == beta,
                    _ => false,
                };
                flag.then(|| token.field.to_string())
            }
        }
    }

    /// Joined value of a conjunction of tokens
    pub fn feature_value(&self, feature: &Feature) -> Option<String> {
        let values = feature
            .tokens
            .iter()
            .map(|token| self.value(token))
            .collect::<Option<Vec<_>>>()?;
        Some(values.join("_"))
    }

    /// Values of every feature in the template, in order
    pub fn extract(&self, template: &FeatureTemplate) -> Vec<Option<String>> {
        template
            .features()
            .iter()
            .map(|feature| self.feature_value(feature))
            .collect()
    }

    /// Nearest punctuation strictly inside (`left`, `right`), scanning from the right
    fn left_nearest_punct(&self, left: NodeId, right: NodeId) -> Option<String> {
        (left + 1..right)
            .rev()
            .find_map(|i| self.punct_form(i))
    }

    /// Nearest punctuation strictly inside (`left`, `right`), scanning from the left
    fn right_nearest_punct(&self, left: NodeId, right: NodeId) -> Option<String> {
        (left + 1..right).find_map(|i| self.punct_form(i))
    }

    fn punct_form(&self, id: NodeId) -> Option<String> {
        self.tree
            .get(id)
            .filter(|node| self.punctuation.contains(&node.form))
            .map(|node| node.form.clone())
    }
}

/// The shift/reduce/pass automaton
pub struct TransitionParser {
    config: ParserConfig,
    punctuation: FxHashSet<String>,
}

impl TransitionParser {
    pub fn new(config: ParserConfig) -> Self {
        let punctuation = config.punctuation_set();
        Self {
            config,
            punctuation,
        }
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Parse `tree` in place
    ///
    /// Existing heads are cleared first. When the configuration asks for
    /// tracing, every transition is written to the log at trace level.
    pub fn parse<D>(&self, tree: &mut TreeStore, source: &mut D) -> Result<TransitionTrace, ParseError>
    where
        D: DecisionSource + ?Sized,
    {
        if self.config.trace {
            self.run(tree, source, Some(&mut LogTraceSink))
        } else {
            self.run(tree, source, None)
        }
    }

    /// Parse `tree` in place, reporting every transition to `sink`
    pub fn parse_traced<D>(
        &self,
        tree: &mut TreeStore,
        source: &mut D,
        sink: &mut dyn TraceSink,
    ) -> Result<TransitionTrace, ParseError>
    where
        D: DecisionSource + ?Sized,
    {
        self.run(tree, source, Some(sink))
    }

    /// Inference: classifier-driven parse followed by the repair pass
    pub fn decode<C, S>(
        &self,
        tree: &mut TreeStore,
        source: &mut ClassifierSource<C>,
        scorer: &S,
    ) -> Result<TransitionTrace, ParseError>
    where
        C: Classifier,
        S: AttachmentScorer + ?Sized,
    {
        let trace = self.parse(tree, source)?;
        Postprocessor::new(&self.config.root_label).repair(tree, scorer);
        Ok(trace)
    }

    /// Training: oracle-driven parse, leaving the gold heads on the tree
    pub fn train(
        &self,
        tree: &mut TreeStore,
        oracle: &mut OracleLabeler,
    ) -> Result<TransitionTrace, ParseError> {
        let trace = self.parse(tree, oracle)?;
        tree.reset_heads(oracle.gold());
        Ok(trace)
    }

    fn run<D>(
        &self,
        tree: &mut TreeStore,
        source: &mut D,
        mut sink: Option<&mut dyn TraceSink>,
    ) -> Result<TransitionTrace, ParseError>
    where
        D: DecisionSource + ?Sized,
    {
        if tree.is_empty() {
            return Err(ParseError::EmptySentence);
        }
        tree.clear_heads();
        source.begin(tree)?;

        let size = tree.len();
        let mut config = Configuration::new(size);

        while config.beta < size {
            let (transition, decision) = match config.lambda {
                None => (Transition::NoShift, None),
                Some(lambda) => {
                    let state = ParseState::new(tree, &config, &self.punctuation);
                    let decision = source.decide(&state)?;
                    (config.select(tree, lambda, &decision), Some(decision))
                }
            };
            let label = decision.as_ref().map_or("", |d| d.label.as_str());

            if let Some(sink) = sink.as_deref_mut() {
                let arc_label = (transition.arc() != ArcType::No).then_some(label);
                sink.on_transition(&TraceEvent {
                    transition,
                    window: config.window(size),
                    label: arc_label,
                });
            }
            config.apply(tree, transition, label);
        }

        log::debug!(
            "parsed {} tokens in {} transitions",
            size - 1,
            config.steps.len()
        );
        Ok(TransitionTrace {
            steps: config.steps,
        })
    }
}

impl Default for TransitionParser {
    fn default() -> Self {
        Self::new(ParserConfig::default())
    }
}
