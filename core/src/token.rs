use crate::span::{Position, Span};
use crate::{ItemId, RuleId};

pub mod traits {
    use crate::token::Lexeme;
    use crate::{ItemId, RuleId};

    /// A source of lexemes, pulled one at a time. `None` signals the end of
    /// the input.
    pub trait LexemeStream {
        fn next_lexeme(&mut self) -> Option<Lexeme>;
    }

    impl<I> LexemeStream for I
    where
        I: Iterator<Item = Lexeme>,
    {
        fn next_lexeme(&mut self) -> Option<Lexeme> {
            self.next()
        }
    }

    /// Client callbacks driven by the parser runtime.
    ///
    /// `shift` builds the client's node for a terminal, `reduce` for a
    /// nonterminal; `read` pulls the next lexeme into the lookahead. The
    /// lexeme handed to `shift` is `None` only when a guard symbol is shifted
    /// at the end of the input.
    pub trait ParseActions {
        type Node;

        fn read(&mut self) -> Option<Lexeme>;

        fn shift(&mut self, lexeme: Option<&Lexeme>) -> Self::Node;

        /// `children` are in rule order.
        fn reduce(&mut self, nonterminal: ItemId, rule: RuleId, children: Vec<Self::Node>)
            -> Self::Node;
    }
}

/// A symbol matched by the lexer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lexeme {
    /// The matched symbol, in the lexer's symbol space.
    pub matched: usize,
    /// The original source content.
    pub content: String,
    /// Where the content sits in the stream.
    pub location: Span,
}

impl Lexeme {
    pub fn new<S: ToString>(matched: usize, content: S, location: Span) -> Self {
        Self {
            matched,
            content: content.to_string(),
            location,
        }
    }

    pub fn len(&self) -> usize {
        self.location.len
    }

    pub fn is_empty(&self) -> bool {
        self.location.len == 0
    }
}

impl std::fmt::Display for Lexeme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({:?})", self.matched, self.content)
    }
}

/// Parse actions that only decide whether the input is accepted.
///
/// Nodes carry no information; useful to test whether a stream belongs to the
/// language recognised by a parser.
pub struct AcceptActions<S: traits::LexemeStream> {
    stream: S,
}

impl<S: traits::LexemeStream> AcceptActions<S> {
    pub fn new(stream: S) -> Self {
        Self { stream }
    }
}

impl<S: traits::LexemeStream> traits::ParseActions for AcceptActions<S> {
    type Node = ();

    fn read(&mut self) -> Option<Lexeme> {
        self.stream.next_lexeme()
    }

    fn shift(&mut self, _lexeme: Option<&Lexeme>) -> Self::Node {}

    fn reduce(&mut self, _nonterminal: ItemId, _rule: RuleId, _children: Vec<Self::Node>) {}
}

/// Turns a sequence of terminal symbol ids into a lexeme stream, one code
/// point per symbol.
pub fn lexemes(symbols: impl IntoIterator<Item = usize>) -> impl Iterator<Item = Lexeme> {
    symbols.into_iter().enumerate().map(|(offset, sym)| {
        Lexeme::new(
            sym,
            "",
            Span::new(Position::new(1, offset, offset), 1),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::traits::LexemeStream as _;
    use super::*;

    #[test]
    fn lexeme_stream_from_symbols() {
        let mut stream = lexemes([3, 5, 3]);

        let first = stream.next_lexeme().unwrap();
        assert_eq!(first.matched, 3);
        assert_eq!(first.location.start.offset, 0);

        assert_eq!(stream.next_lexeme().unwrap().matched, 5);
        assert_eq!(stream.next_lexeme().unwrap().matched, 3);
        assert!(stream.next_lexeme().is_none());
    }
}
