//! Depparse: transition-based dependency parsing
//!
//! A list-based shift/reduce/pass automaton that builds labeled dependency
//! trees, driven either by a training oracle or by an external classifier,
//! plus the tree transforms that surround it: repair of unattached tokens,
//! projectivization and ensemble merging.

pub mod config; // Labels, punctuation and tracing switches
pub mod conll; // Column-format sentence I/O
pub mod feature; // Feature token notation and templates
pub mod heads; // Detached head assignments
pub mod merge; // Weighted-vote consensus trees
pub mod oracle; // Gold decisions for training
pub mod parser; // The transition automaton
pub mod postprocess; // Attachment of headless tokens
pub mod projective; // Lifting of crossing arcs
pub mod transition; // Decisions and transitions
pub mod tree; // Nodes, arcs and the per-sentence tree store

pub use config::{ConfigError, ParserConfig};
pub use conll::{ColumnReader, ReadError, write_tree};
pub use feature::{Feature, FeatureError, FeatureTemplate, FeatureToken};
pub use heads::{HeadAssignment, HeadsError};
pub use merge::{MergeError, MergeResult, TreeMerger};
pub use oracle::{OracleError, OracleLabeler, TrainingInstance};
pub use parser::{
    Classifier, ClassifierSource, DecisionSource, LogTraceSink, ParseError, ParseState, Prediction,
    RecordingTraceSink, TraceEvent, TraceSink, TransitionParser, TransitionTrace, Window,
};
pub use postprocess::{Attachment, AttachmentScorer, Direction, Postprocessor};
pub use projective::{Projectivizer, is_projective, non_projective_measure};
pub use transition::{ArcType, Decision, DecisionError, ListAction, Transition};
pub use tree::{DepArc, Dependent, Features, Node, NodeId, ROOT_ID, TreeError, TreeStore};
