//! Feature addressing
//!
//! A [`FeatureToken`] names one attribute of one node relative to the
//! parser's current configuration, e.g. "the POS of the head of the node one
//! step down the stack". Tokens are only descriptions; the parser resolves
//! them against its live state (see [`crate::parser::ParseState`]).
//!
//! Tokens are written `<source><offset>?(_<relation>)?:<field>`:
//!
//! | part     | values                                                     |
//! |----------|------------------------------------------------------------|
//! | source   | `s` stack, `l` lambda, `b` beta                            |
//! | offset   | signed integer, default 0                                  |
//! | relation | `h` head, `lmd` leftmost dependent, `rmd` rightmost dep.   |
//! | field    | `f` form, `m` lemma, `p` pos, `d` deprel, `ft=KEY` feature,|
//! |          | `lnpl` `rnpl` `lnpb` `rnpb` nearest punctuation, `b0`-`b2` |
//!
//! A [`FeatureTemplate`] is a whitespace-separated list of features, where
//! each feature is one or more tokens joined with `+`.

use pest::Parser;
use pest::iterators::Pair;
use pest_derive::Parser;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Parser)]
#[grammar = "feature.pest"]
struct FeatureParser;

/// Error type for feature notation failures
#[derive(Debug, Error)]
pub enum FeatureError {
    #[error("Feature syntax error: {0}")]
    Syntax(Box<pest::error::Error<Rule>>),

    #[error("Feature offset out of range: {0}")]
    Offset(String),

    #[error("Unexpected rule in feature notation: {0:?}")]
    Unexpected(Rule),
}

impl From<pest::error::Error<Rule>> for FeatureError {
    fn from(err: pest::error::Error<Rule>) -> Self {
        FeatureError::Syntax(Box::new(err))
    }
}

/// Which pointer a token is relative to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    /// lambda, stepping over reduced nodes for nonzero offsets
    Stack,
    /// lambda, plain arithmetic offsets
    Lambda,
    /// beta, plain arithmetic offsets
    Beta,
}

/// Structural step taken from the addressed node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    Head,
    LeftmostDependent,
    RightmostDependent,
}

/// Attribute read from the addressed node
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Field {
    Form,
    Lemma,
    Pos,
    Deprel,
    Feat(String),
    /// nearest punctuation left of lambda
    LeftPunctLambda,
    /// nearest punctuation between lambda and beta, scanning from lambda
    RightPunctLambda,
    /// nearest punctuation between lambda and beta, scanning from beta
    LeftPunctBeta,
    /// nearest punctuation right of beta
    RightPunctBeta,
    /// configuration flag, valued with its own name when true
    Boolean(u8),
}

/// One addressed attribute
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FeatureToken {
    pub source: Source,
    pub offset: i32,
    pub relation: Option<Relation>,
    pub field: Field,
}

impl FeatureToken {
    pub fn new(source: Source, offset: i32, relation: Option<Relation>, field: Field) -> Self {
        Self {
            source,
            offset,
            relation,
            field,
        }
    }

    /// Parse a single token, e.g. `s-1_h:p`
    pub fn parse(input: &str) -> Result<Self, FeatureError> {
        let mut pairs = FeatureParser::parse(Rule::single, input)?;
        let token = pairs
            .next()
            .and_then(|single| single.into_inner().find(|p| p.as_rule() == Rule::token))
            .ok_or(FeatureError::Unexpected(Rule::single))?;
        build_token(token)
    }
}

impl FromStr for FeatureToken {
    type Err = FeatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for FeatureToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let source = match self.source {
            Source::Stack => "s",
            Source::Lambda => "l",
            Source::Beta => "b",
        };
        f.write_str(source)?;
        if self.offset > 0 {
            write!(f, "+{}", self.offset)?;
        } else if self.offset < 0 {
            write!(f, "{}", self.offset)?;
        }
        if let Some(relation) = self.relation {
            let relation = match relation {
                Relation::Head => "h",
                Relation::LeftmostDependent => "lmd",
                Relation::RightmostDependent => "rmd",
            };
            write!(f, "_{}", relation)?;
        }
        write!(f, ":{}", self.field)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Form => f.write_str("f"),
            Field::Lemma => f.write_str("m"),
            Field::Pos => f.write_str("p"),
            Field::Deprel => f.write_str("d"),
            Field::Feat(key) => write!(f, "ft={}", key),
            Field::LeftPunctLambda => f.write_str("lnpl"),
            Field::RightPunctLambda => f.write_str("rnpl"),
            Field::LeftPunctBeta => f.write_str("lnpb"),
            Field::RightPunctBeta => f.write_str("rnpb"),
            Field::Boolean(index) => write!(f, "b{}", index),
        }
    }
}

/// A conjunction of tokens; absent if any token is absent
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Feature {
    pub tokens: Vec<FeatureToken>,
}

impl Feature {
    pub fn new(tokens: Vec<FeatureToken>) -> Self {
        Self { tokens }
    }
}

impl From<FeatureToken> for Feature {
    fn from(token: FeatureToken) -> Self {
        Self::new(vec![token])
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, token) in self.tokens.iter().enumerate() {
            if i > 0 {
                f.write_str("+")?;
            }
            write!(f, "{}", token)?;
        }
        Ok(())
    }
}

/// Ordered list of features handed to a classifier
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureTemplate {
    features: Vec<Feature>,
}

impl FeatureTemplate {
    pub fn new(features: Vec<Feature>) -> Self {
        Self { features }
    }

    /// Parse a whitespace-separated template, e.g. `l:f b:p l:p+b:p`
    pub fn parse(input: &str) -> Result<Self, FeatureError> {
        let mut pairs = FeatureParser::parse(Rule::template, input)?;
        let Some(template) = pairs.next() else {
            return Ok(Self::default());
        };

        let mut features = Vec::new();
        for pair in template.into_inner() {
            match pair.as_rule() {
                Rule::feature => {
                    let tokens = pair
                        .into_inner()
                        .map(build_token)
                        .collect::<Result<Vec<_>, _>>()?;
                    features.push(Feature::new(tokens));
                }
                Rule::EOI => {}
                other => return Err(FeatureError::Unexpected(other)),
            }
        }
        Ok(Self { features })
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn push(&mut self, feature: impl Into<Feature>) {
        self.features.push(feature.into());
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

impl FromStr for FeatureTemplate {
    type Err = FeatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn build_token(pair: Pair<Rule>) -> Result<FeatureToken, FeatureError> {
    let mut source = Source::Lambda;
    let mut offset = 0;
    let mut relation = None;
    let mut field = Field::Form;

    for part in pair.into_inner() {
        match part.as_rule() {
            Rule::source => {
                source = match part.as_str() {
                    "s" => Source::Stack,
                    "b" => Source::Beta,
                    _ => Source::Lambda,
                };
            }
            Rule::offset => {
                offset = part
                    .as_str()
                    .parse()
                    .map_err(|_| FeatureError::Offset(part.as_str().to_string()))?;
            }
            Rule::relation => {
                relation = Some(match part.as_str() {
                    "lmd" => Relation::LeftmostDependent,
                    "rmd" => Relation::RightmostDependent,
                    _ => Relation::Head,
                });
            }
            Rule::field => field = build_field(part)?,
            other => return Err(FeatureError::Unexpected(other)),
        }
    }

    Ok(FeatureToken::new(source, offset, relation, field))
}

fn build_field(pair: Pair<Rule>) -> Result<Field, FeatureError> {
    let Some(inner) = pair.into_inner().next() else {
        return Err(FeatureError::Unexpected(Rule::field));
    };

    let field = match inner.as_rule() {
        Rule::form => Field::Form,
        Rule::lemma => Field::Lemma,
        Rule::pos => Field::Pos,
        Rule::deprel => Field::Deprel,
        Rule::feat => {
            let key = inner
                .into_inner()
                .next()
                .map(|k| k.as_str().to_string())
                .unwrap_or_default();
            Field::Feat(key)
        }
        Rule::punct => match inner.as_str() {
            "lnpl" => Field::LeftPunctLambda,
            "rnpl" => Field::RightPunctLambda,
            "lnpb" => Field::LeftPunctBeta,
            _ => Field::RightPunctBeta,
        },
        Rule::boolean => {
            let digit = inner.as_str().trim_start_matches('b');
            Field::Boolean(
                digit
                    .parse()
                    .map_err(|_| FeatureError::Offset(digit.to_string()))?,
            )
        }
        other => return Err(FeatureError::Unexpected(other)),
    };
    Ok(field)
}
