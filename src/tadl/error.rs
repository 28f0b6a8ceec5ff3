//! Lexer and parser diagnostics.
//!
//! Every diagnostic is anchored to a position in the input. The lexer
//! reports byte spans; the parser converts them to line/column ranges
//! and attaches the file name before anything reaches a caller.
//! Parsing halts at the first error; there are no error lists.

use std::fmt;
use std::ops::Range as ByteRange;

use thiserror::Error;

use super::ast::Range;
use super::token::TokenKind;

/// What went wrong at the character level.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexErrorKind {
    #[error("string is missing its closing '\"'")]
    UnterminatedString,
    #[error("invalid escape sequence '\\{0}'")]
    InvalidEscape(char),
    #[error("character {0:?} is not valid here")]
    UnexpectedCharacter(char),
    #[error("input is not valid UTF-8")]
    InvalidUtf8,
}

/// A lexical error with the byte span it occurred at.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}")]
pub struct LexError {
    pub kind: LexErrorKind,
    pub span: ByteRange<usize>,
}

impl LexError {
    pub fn new(kind: LexErrorKind, span: ByteRange<usize>) -> Self {
        Self { kind, span }
    }
}

/// What went wrong at the grammar level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// A lexical error surfaced through the parser.
    Lex(LexErrorKind),
    /// A token (or end of input, when `found` is `None`) appeared where
    /// one of `expected` would have been accepted.
    UnexpectedToken {
        found: Option<TokenKind>,
        expected: Vec<TokenKind>,
    },
    /// The same attribute key was defined twice on one node.
    DuplicateAttribute { key: String },
    /// Forward attributes were pending where only a text or comment
    /// leaf followed.
    ForwardedAttributesNotAllowed,
    /// A plain `@` attribute appeared where only `@@` is meaningful.
    AttributeMustForward,
    /// Forwarded nodes were never attached to an element.
    DanglingForwardNodes,
    /// The root element was not enclosed in `{}`.
    RootMissingBraces,
}

fn write_expected(f: &mut fmt::Formatter<'_>, expected: &[TokenKind]) -> fmt::Result {
    for (i, kind) in expected.iter().enumerate() {
        if i > 0 {
            f.write_str(if i + 1 == expected.len() { " or " } else { ", " })?;
        }
        write!(f, "{kind}")?;
    }
    Ok(())
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseErrorKind::Lex(kind) => write!(f, "{kind}"),
            ParseErrorKind::UnexpectedToken { found, expected } => {
                match found {
                    Some(kind) => write!(f, "unexpected {kind}")?,
                    None => f.write_str("unexpected end of input")?,
                }
                if !expected.is_empty() {
                    f.write_str(", expected ")?;
                    write_expected(f, expected)?;
                }
                Ok(())
            }
            ParseErrorKind::DuplicateAttribute { key } => {
                write!(f, "attribute '{key}' is already defined on this node")
            }
            ParseErrorKind::ForwardedAttributesNotAllowed => {
                f.write_str("attributes cannot be forwarded into this node")
            }
            ParseErrorKind::AttributeMustForward => {
                f.write_str("this should be a forward attribute or removed")
            }
            ParseErrorKind::DanglingForwardNodes => {
                f.write_str("there is no node to forward this node into")
            }
            ParseErrorKind::RootMissingBraces => {
                f.write_str("root element must have curly brackets")
            }
        }
    }
}

/// A parse error: file, range, and cause.
///
/// The range always points into the input, even when the failing token
/// was synthesized by the parser (synthetic tokens inherit the current
/// lexer position).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// File name as given to the parser; may be empty.
    pub file: String,
    pub range: Range,
    pub kind: ParseErrorKind,
}

impl ParseError {
    pub fn new(file: impl Into<String>, range: Range, kind: ParseErrorKind) -> Self {
        Self {
            file: file.into(),
            range,
            kind,
        }
    }

    /// The token kinds that would have been accepted, when known.
    pub fn expected(&self) -> &[TokenKind] {
        match &self.kind {
            ParseErrorKind::UnexpectedToken { expected, .. } => expected,
            _ => &[],
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.file.is_empty() {
            write!(f, "{}: {}", self.range.start, self.kind)
        } else {
            write!(f, "{}:{}: {}", self.file, self.range.start, self.kind)
        }
    }
}

impl std::error::Error for ParseError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tadl::ast::Position;

    fn range() -> Range {
        Range::new(4..5, Position::new(0, 4), Position::new(0, 5))
    }

    #[test]
    fn display_with_file() {
        let err = ParseError::new(
            "doc.tadl",
            range(),
            ParseErrorKind::UnexpectedToken {
                found: Some(TokenKind::Comma),
                expected: vec![TokenKind::Identifier, TokenKind::QuotedString],
            },
        );
        assert_eq!(
            err.to_string(),
            "doc.tadl:0:4: unexpected ',', expected an identifier or a quoted string"
        );
    }

    #[test]
    fn display_without_file() {
        let err = ParseError::new("", range(), ParseErrorKind::RootMissingBraces);
        assert_eq!(err.to_string(), "0:4: root element must have curly brackets");
    }

    #[test]
    fn display_at_end_of_input() {
        let err = ParseError::new(
            "",
            range(),
            ParseErrorKind::UnexpectedToken {
                found: None,
                expected: vec![TokenKind::BlockEnd],
            },
        );
        assert_eq!(err.to_string(), "0:4: unexpected end of input, expected '}'");
    }

    #[test]
    fn expected_set_is_exposed() {
        let err = ParseError::new(
            "",
            range(),
            ParseErrorKind::UnexpectedToken {
                found: None,
                expected: vec![TokenKind::BlockEnd, TokenKind::Comma],
            },
        );
        assert_eq!(err.expected(), &[TokenKind::BlockEnd, TokenKind::Comma]);
        let other = ParseError::new("", range(), ParseErrorKind::DanglingForwardNodes);
        assert!(other.expected().is_empty());
    }
}
