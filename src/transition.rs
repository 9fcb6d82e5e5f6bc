//! Transition vocabulary of the parsing automaton
//!
//! A [`Decision`] is what a decision source asks for: an arc type, a list
//! action and a dependency label. A [`Transition`] is what the automaton
//! actually performed after its guards had their say.
//!
//! Decisions have a compact string form, `arc_list_label` (e.g. `L_R_nsubj`,
//! `N_S_`), which is convenient as a class label for external classifiers.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const DELIM: char = '_';

/// Direction of the arc between lambda and beta, if any
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArcType {
    /// beta becomes the head of lambda
    Left,
    /// lambda becomes the head of beta
    Right,
    /// no arc
    No,
}

impl ArcType {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Left => "L",
            Self::Right => "R",
            Self::No => "N",
        }
    }
}

/// What happens to lambda after the arc step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListAction {
    Shift,
    Reduce,
    Pass,
}

impl ListAction {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Shift => "S",
            Self::Reduce => "R",
            Self::Pass => "P",
        }
    }
}

/// A requested transition, as produced by a classifier or the oracle
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Decision {
    pub arc: ArcType,
    pub list: ListAction,
    pub label: String,
}

impl Decision {
    pub fn new(arc: ArcType, list: ListAction, label: impl Into<String>) -> Self {
        Self {
            arc,
            list,
            label: label.into(),
        }
    }

    /// A decision without an arc
    pub fn no_arc(list: ListAction) -> Self {
        Self::new(ArcType::No, list, "")
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}{}{}",
            self.arc.symbol(),
            DELIM,
            self.list.symbol(),
            DELIM,
            self.label
        )
    }
}

/// Error reading a decision from its string form
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecisionError {
    #[error("malformed decision {0:?}: expected arc_list_label")]
    Malformed(String),

    #[error("unknown arc type {0:?}")]
    UnknownArc(String),

    #[error("unknown list action {0:?}")]
    UnknownList(String),
}

impl FromStr for Decision {
    type Err = DecisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, DELIM);
        let (Some(arc), Some(list), Some(label)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(DecisionError::Malformed(s.to_string()));
        };

        let arc = match arc {
            "L" => ArcType::Left,
            "R" => ArcType::Right,
            "N" => ArcType::No,
            other => return Err(DecisionError::UnknownArc(other.to_string())),
        };
        let list = match list {
            "S" => ListAction::Shift,
            "R" => ListAction::Reduce,
            "P" => ListAction::Pass,
            other => return Err(DecisionError::UnknownList(other.to_string())),
        };

        Ok(Self::new(arc, list, label))
    }
}

/// A transition the automaton performed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
    LeftReduce,
    LeftPass,
    RightShift,
    RightPass,
    NoShift,
    NoReduce,
    NoPass,
}

impl Transition {
    pub fn name(self) -> &'static str {
        match self {
            Self::LeftReduce => "Left-Reduce",
            Self::LeftPass => "Left-Pass",
            Self::RightShift => "Right-Shift",
            Self::RightPass => "Right-Pass",
            Self::NoShift => "No-Shift",
            Self::NoReduce => "No-Reduce",
            Self::NoPass => "No-Pass",
        }
    }

    pub fn arc(self) -> ArcType {
        match self {
            Self::LeftReduce | Self::LeftPass => ArcType::Left,
            Self::RightShift | Self::RightPass => ArcType::Right,
            Self::NoShift | Self::NoReduce | Self::NoPass => ArcType::No,
        }
    }

    pub fn list(self) -> ListAction {
        match self {
            Self::RightShift | Self::NoShift => ListAction::Shift,
            Self::LeftReduce | Self::NoReduce => ListAction::Reduce,
            Self::LeftPass | Self::RightPass | Self::NoPass => ListAction::Pass,
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_string_form() {
        let decision = Decision::new(ArcType::Left, ListAction::Reduce, "nsubj");
        assert_eq!(decision.to_string(), "L_R_nsubj");
        assert_eq!(Decision::no_arc(ListAction::Shift).to_string(), "N_S_");
    }

    #[test]
    fn test_decision_from_str() {
        let decision: Decision = "R_P_acl_relcl".parse().unwrap();
        assert_eq!(decision.arc, ArcType::Right);
        assert_eq!(decision.list, ListAction::Pass);
        // labels may contain the delimiter
        assert_eq!(decision.label, "acl_relcl");

        let no_arc: Decision = "N_R_".parse().unwrap();
        assert_eq!(no_arc, Decision::no_arc(ListAction::Reduce));
    }

    #[test]
    fn test_decision_from_str_errors() {
        assert_eq!(
            "L".parse::<Decision>(),
            Err(DecisionError::Malformed("L".to_string()))
        );
        assert_eq!(
            "X_S_".parse::<Decision>(),
            Err(DecisionError::UnknownArc("X".to_string()))
        );
        assert_eq!(
            "L_Q_det".parse::<Decision>(),
            Err(DecisionError::UnknownList("Q".to_string()))
        );
    }

    #[test]
    fn test_transition_parts() {
        assert_eq!(Transition::LeftReduce.arc(), ArcType::Left);
        assert_eq!(Transition::LeftReduce.list(), ListAction::Reduce);
        assert_eq!(Transition::NoShift.to_string(), "No-Shift");
        assert_eq!(Transition::RightPass.list(), ListAction::Pass);
    }
}
