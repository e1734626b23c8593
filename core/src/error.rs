use thiserror::Error;

use crate::{ItemId, RuleId, Span};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    #[error("nonterminal {0} is not defined by any rule")]
    UndefinedNonterminal(String),

    #[error("no start symbols were declared for this parser")]
    NoStartSymbols,

    #[error("shift/reduce conflict on {symbol} in state {state}")]
    ShiftReduceConflict { state: usize, symbol: String },

    #[error("reduce/reduce conflict on {symbol} in state {state}")]
    ReduceReduceConflict { state: usize, symbol: String },

    #[error("clashing guards on {symbol} in state {state}: {detail}")]
    ClashingGuards {
        state: usize,
        symbol: String,
        detail: String,
    },

    #[error("unknown rule {0}")]
    UnknownRule(RuleId),

    #[error("unknown item {0}")]
    UnknownItem(ItemId),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}")]
pub struct YalrError {
    /// Kind of error
    kind: ErrorKind,
    /// Location of the error in a stream, when one is known.
    span: Option<Span>,
}

impl YalrError {
    pub fn new(kind: impl Into<ErrorKind>, span: Option<Span>) -> Self {
        Self {
            kind: kind.into(),
            span,
        }
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn span(&self) -> Option<Span> {
        self.span
    }
}

impl From<ErrorKind> for YalrError {
    fn from(kind: ErrorKind) -> Self {
        Self { kind, span: None }
    }
}
