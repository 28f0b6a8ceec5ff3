//! Recursive-descent parser.
//!
//! The parser drives the lexer's grammar mode and owns the forwarding
//! buffers. Its token plumbing mirrors the grammar's needs: a front
//! buffer holds peeked and synthetic tokens, a tail buffer holds
//! synthetic tokens delivered once the lexer is exhausted. Both G1 and
//! G2 documents end up with the same shape because the root is made
//! explicit before parsing starts. A G1 document is parsed as if it
//! were written `#root{ ... }`; a G2 document swaps its `#!` preamble
//! for a root identifier.
//!
//! Forwarded nodes (`##`) accumulate in a parser-level buffer and are
//! moved, not copied, into the next non-forwarded element. Forwarded
//! attributes (`@@`) live on the call stack between the point of
//! definition and the element that absorbs them.
//!
//! Parsing halts at the first error. Errors carry the token kinds that
//! would have been accepted, and synthetic tokens inherit the current
//! lexer position so every reported range points into the input.

use std::collections::VecDeque;
use std::mem;
use std::ops::Range as ByteRange;

use super::ast::{AttributeMap, BlockType, Element, NodeKind, Range, SourceLocation, TreeNode};
use super::error::{LexErrorKind, ParseError, ParseErrorKind};
use super::lexing::{Lexer, SpannedToken};
use super::token::{GrammarMode, Token, TokenKind};

/// Parses a TADL document into its tree.
///
/// The returned tree is always rooted in an element named `root` with
/// a normal block type.
pub fn parse(source: &str) -> Result<TreeNode, ParseError> {
    Parser::new("", source).parse()
}

/// Like [`parse`], with a file name that diagnostics will carry.
pub fn parse_named(file: &str, source: &str) -> Result<TreeNode, ParseError> {
    Parser::new(file, source).parse()
}

/// Like [`parse_named`], for input that has not been validated as
/// UTF-8 yet.
pub fn parse_bytes(file: &str, bytes: &[u8]) -> Result<TreeNode, ParseError> {
    match std::str::from_utf8(bytes) {
        Ok(source) => Parser::new(file, source).parse(),
        Err(utf8_error) => {
            let at = utf8_error.valid_up_to();
            let prefix = std::str::from_utf8(&bytes[..at]).unwrap_or("");
            let position = SourceLocation::new(prefix).position(at);
            Err(ParseError::new(
                file,
                Range::new(at..at, position, position),
                ParseErrorKind::Lex(LexErrorKind::InvalidUtf8),
            ))
        }
    }
}

/// An attribute as collected from the token stream, before it is
/// merged into an element's [`AttributeMap`].
struct Attribute {
    key: String,
    value: String,
    key_span: ByteRange<usize>,
}

/// `None` marks end of input.
type Fetched = Option<SpannedToken>;

pub struct Parser<'a> {
    file: String,
    lexer: Lexer<'a>,
    locations: SourceLocation,
    /// Tokens to process before asking the lexer: peeked tokens and
    /// synthetic tokens pushed by the parser.
    token_buffer: VecDeque<Result<Fetched, ParseError>>,
    /// Synthetic tokens delivered once the lexer has no more input.
    tail_buffer: VecDeque<Token>,
    /// Nodes defined with `##`, waiting for the next regular element.
    forwarding_nodes: Vec<TreeNode>,
    /// End offset of the last consumed token.
    last_end: usize,
}

impl<'a> Parser<'a> {
    pub fn new(file: impl Into<String>, source: &'a str) -> Self {
        Self {
            file: file.into(),
            lexer: Lexer::new(source),
            locations: SourceLocation::new(source),
            token_buffer: VecDeque::new(),
            tail_buffer: VecDeque::new(),
            forwarding_nodes: Vec::new(),
            last_end: 0,
        }
    }

    /// Parses the document this parser was built over.
    pub fn parse(mut self) -> Result<TreeNode, ParseError> {
        let first = self.peek()?;

        let tree = if matches!(&first, Some((Token::G2Preamble, _))) {
            self.next()?;
            self.lexer.set_mode(GrammarMode::G2);

            // Swap the preamble for a root identifier; the document
            // body then parses as the root node's content.
            let at = self.lexer.offset();
            self.token_buffer
                .push_back(Ok(Some((Token::Identifier("root".into()), at..at))));

            self.g2_node()?
        } else {
            if first.is_none() {
                // Empty input: drop the buffered end marker so the
                // synthetic root tokens below are seen first.
                self.token_buffer.clear();
            }

            // Wrap the whole document in `#root{ ... }`, making the
            // root just another element.
            for token in [
                Token::BlockStart,
                Token::Identifier("root".into()),
                Token::DefineElement { forward: false },
            ] {
                self.token_buffer.push_front(Ok(Some((token, 0..0))));
            }
            self.tail_buffer.push_back(Token::BlockEnd);

            self.g1_node()?
        };

        // Everything forwarded must have found a home by now.
        if let Some(node) = self.forwarding_nodes.first() {
            return Err(ParseError::new(
                self.file.clone(),
                node.range.clone(),
                ParseErrorKind::DanglingForwardNodes,
            ));
        }

        if tree.block_type() != BlockType::Normal {
            return Err(ParseError::new(
                self.file.clone(),
                tree.range.clone(),
                ParseErrorKind::RootMissingBraces,
            ));
        }

        Ok(tree)
    }

    // ------------------------------------------------------------------
    // G1
    // ------------------------------------------------------------------

    /// Parses one G1 node: a text leaf, a comment leaf, or an element
    /// with optional attributes, an optional `{}` block or a single
    /// inline text child. Forwarded elements are buffered and the next
    /// regular node is returned in their place.
    fn g1_node(&mut self) -> Result<TreeNode, ParseError> {
        let mut start = self.peek_offset();
        let forward_attributes = self.parse_attributes(true)?;

        let (forward, name) = match self.next()? {
            Some((Token::CharData(text), span)) => {
                self.reject_forwarded_attributes(&forward_attributes, &span)?;
                return Ok(TreeNode::text(text).at(self.locations.range(&span)));
            }
            Some((Token::Comment(text), span)) => {
                self.reject_forwarded_attributes(&forward_attributes, &span)?;
                return Ok(TreeNode::comment(text).at(self.locations.range(&span)));
            }
            Some((Token::DefineElement { forward }, _)) => {
                (forward, self.expect_identifier()?)
            }
            // A line element: the word right after a G1 line marker.
            Some((Token::Identifier(name), _)) => (false, name),
            other => return Err(self.node_position_error(other)),
        };

        let mut element = Element::new(name);

        // A regular element absorbs everything forwarded so far. Its
        // range grows to cover them; they were lexed earlier.
        if !forward {
            element.children = mem::take(&mut self.forwarding_nodes);
            if let Some(first) = element.children.first() {
                start = start.min(first.range.span.start);
            }
        }

        let attributes = self.parse_attributes(false)?;
        element.attributes = self.merge_attributes(forward_attributes, attributes)?;

        match self.peek()? {
            Some((Token::BlockStart, _)) => {
                self.next()?;
                element.block_type = BlockType::Normal;

                loop {
                    match self.peek()? {
                        Some((Token::BlockEnd, _)) => {
                            self.next()?;
                            break;
                        }
                        None => {
                            return Err(self.unexpected(None, vec![TokenKind::BlockEnd]))
                        }
                        _ => element.children.push(self.g1_node()?),
                    }
                }
            }
            Some((Token::CharData(_), _)) => {
                let (text, span) = self.expect_chardata()?;
                element
                    .children
                    .push(TreeNode::text(text).at(self.locations.range(&span)));
            }
            _ => {}
        }

        let node = TreeNode {
            kind: NodeKind::Element(element),
            range: self.make_range(start),
        };

        if forward {
            // Buffer it and hand the caller the next regular node, so
            // forwarding stays invisible to the surrounding grammar.
            self.forwarding_nodes.push(node);
            return self.g1_node();
        }

        Ok(node)
    }

    /// Parses the G1 nodes of one line inside a G2 document. Eats the
    /// leading `#`/`##` and the terminating line end. For a `##` line
    /// the nodes go into the forwarding buffer and the result is empty.
    fn g1_line_nodes(&mut self) -> Result<Vec<TreeNode>, ParseError> {
        let forward = match self.next()? {
            Some((Token::DefineElement { forward }, _)) => forward,
            other => return Err(self.unexpected(other, vec![TokenKind::DefineElement])),
        };

        self.lexer.set_mode(GrammarMode::G1Line);

        let mut nodes = Vec::new();
        loop {
            match self.peek()? {
                Some((Token::G1LineEnd, _)) => {
                    self.next()?;
                    break;
                }
                // A line at the very end of the input has no newline.
                None => break,
                _ => nodes.push(self.g1_node()?),
            }
        }

        self.lexer.set_mode(GrammarMode::G2);

        if forward {
            self.forwarding_nodes.append(&mut nodes);
            Ok(Vec::new())
        } else {
            Ok(nodes)
        }
    }

    // ------------------------------------------------------------------
    // G2
    // ------------------------------------------------------------------

    /// Parses one G2 node and whatever single child production follows
    /// it: a quoted text child, a G1 line, a bracketed block, or one
    /// implicitly nested node. Commas and closing brackets end the
    /// node.
    fn g2_node(&mut self) -> Result<TreeNode, ParseError> {
        let mut start = self.peek_offset();
        let forward_attributes = self.parse_attributes(true)?;

        let mut element = match self.next()? {
            Some((Token::Identifier(name), _)) => {
                let mut element = Element::new(name);
                element.children = mem::take(&mut self.forwarding_nodes);
                if let Some(first) = element.children.first() {
                    start = start.min(first.range.span.start);
                }
                element
            }
            Some((Token::QuotedString(text), span)) => {
                self.reject_forwarded_attributes(&forward_attributes, &span)?;
                return Ok(TreeNode::text(text).at(self.locations.range(&span)));
            }
            other => return Err(self.node_position_error(other)),
        };

        let attributes = self.parse_attributes(false)?;
        element.attributes = self.merge_attributes(forward_attributes, attributes)?;

        match self.peek()? {
            Some((Token::QuotedString(_), _)) => {
                let (text, span) = self.expect_quoted_string()?;
                element
                    .children
                    .push(TreeNode::text(text).at(self.locations.range(&span)));
            }
            Some((Token::DefineElement { .. }, _)) => {
                let mut nodes = self.g1_line_nodes()?;
                element.children.append(&mut nodes);
            }
            Some((open @ (Token::BlockStart | Token::GroupStart | Token::GenericStart), _)) => {
                self.next()?;
                let (block_type, closer) = block_kind(&open);
                element.block_type = block_type;
                self.g2_block_children(closer, &mut element.children)?;

                // `name(...) -> (...)` appends a synthetic `ret` child.
                if matches!(self.peek()?, Some((Token::G2Arrow, _))) {
                    self.next()?;
                    let ret = self.g2_ret_node()?;
                    element.children.push(ret);
                }
            }
            Some((Token::G2Arrow, _)) => {
                // `name -> (...)`: the ret block is the sole child.
                self.next()?;
                let ret = self.g2_ret_node()?;
                element.children.push(ret);
            }
            Some((Token::Comma, _)) => {
                // Comma ends a node definition.
                self.next()?;
            }
            // Closing tokens belong to the parent; end of input ends
            // the node as well.
            Some((token, _)) if token.is_closing() => {}
            None => {}
            // Anything else starts an implicitly nested child.
            _ => element.children.push(self.g2_node()?),
        }

        Ok(TreeNode {
            kind: NodeKind::Element(element),
            range: self.make_range(start),
        })
    }

    /// Children of a bracketed G2 body, up to and including `closer`.
    fn g2_block_children(
        &mut self,
        closer: TokenKind,
        children: &mut Vec<TreeNode>,
    ) -> Result<(), ParseError> {
        loop {
            match self.peek()? {
                None => return Err(self.unexpected(None, vec![closer])),
                Some((token, _)) if token.kind() == closer => {
                    self.next()?;
                    return Ok(());
                }
                Some((Token::DefineElement { .. }, _)) => {
                    let mut nodes = self.g1_line_nodes()?;
                    children.append(&mut nodes);
                }
                _ => children.push(self.g2_node()?),
            }
        }
    }

    /// The synthetic `ret` element produced by the arrow rewrite: its
    /// body is the bracketed block following `->`.
    fn g2_ret_node(&mut self) -> Result<TreeNode, ParseError> {
        let start = self.peek_offset();

        let open = match self.next()? {
            Some((token @ (Token::BlockStart | Token::GroupStart | Token::GenericStart), _)) => {
                token
            }
            other => {
                return Err(self.unexpected(
                    other,
                    vec![
                        TokenKind::BlockStart,
                        TokenKind::GroupStart,
                        TokenKind::GenericStart,
                    ],
                ))
            }
        };

        let (block_type, closer) = block_kind(&open);
        let mut element = Element::new("ret");
        element.block_type = block_type;
        self.g2_block_children(closer, &mut element.children)?;

        Ok(TreeNode {
            kind: NodeKind::Element(element),
            range: self.make_range(start),
        })
    }

    // ------------------------------------------------------------------
    // Attributes
    // ------------------------------------------------------------------

    /// Collects consecutive attributes of one forwarding class. In
    /// G1/G1Line an attribute is `@key{value}`, in G2 it is
    /// `@key = "value"`.
    ///
    /// When collecting forward attributes, a plain `@` is an error;
    /// when collecting regular attributes, a `@@` stops the run since
    /// it belongs to the next element.
    fn parse_attributes(&mut self, want_forward: bool) -> Result<Vec<Attribute>, ParseError> {
        let g1 = matches!(self.lexer.mode(), GrammarMode::G1 | GrammarMode::G1Line);
        let mut result = Vec::new();

        loop {
            match self.peek()? {
                Some((Token::DefineAttribute { forward }, span)) => {
                    if want_forward && !forward {
                        return Err(ParseError::new(
                            self.file.clone(),
                            self.locations.range(&span),
                            ParseErrorKind::AttributeMustForward,
                        ));
                    }
                    if !want_forward && forward {
                        break;
                    }
                    self.next()?;
                }
                _ => break,
            }

            let (key, key_span) = self.expect_identifier_spanned()?;

            let value = if g1 {
                self.expect_token(TokenKind::BlockStart)?;
                let (value, _) = self.expect_chardata()?;
                self.expect_token(TokenKind::BlockEnd)?;
                value
            } else {
                self.expect_token(TokenKind::Assign)?;
                let (value, _) = self.expect_quoted_string()?;
                value
            };

            result.push(Attribute {
                key,
                value,
                key_span,
            });
        }

        Ok(result)
    }

    /// Merges forward and regular attributes, forward keys first. Any
    /// key collision is reported at the later occurrence.
    fn merge_attributes(
        &self,
        forward: Vec<Attribute>,
        regular: Vec<Attribute>,
    ) -> Result<AttributeMap, ParseError> {
        let mut merged = AttributeMap::new();

        for attribute in forward.into_iter().chain(regular) {
            if merged.set(attribute.key.clone(), attribute.value).is_some() {
                return Err(ParseError::new(
                    self.file.clone(),
                    self.locations.range(&attribute.key_span),
                    ParseErrorKind::DuplicateAttribute {
                        key: attribute.key,
                    },
                ));
            }
        }

        Ok(merged)
    }

    fn reject_forwarded_attributes(
        &self,
        forwarded: &[Attribute],
        at: &ByteRange<usize>,
    ) -> Result<(), ParseError> {
        if forwarded.is_empty() {
            Ok(())
        } else {
            Err(ParseError::new(
                self.file.clone(),
                self.locations.range(at),
                ParseErrorKind::ForwardedAttributesNotAllowed,
            ))
        }
    }

    // ------------------------------------------------------------------
    // Token plumbing
    // ------------------------------------------------------------------

    /// The next token, consuming it. `Ok(None)` is end of input.
    fn next(&mut self) -> Result<Fetched, ParseError> {
        let fetched = match self.token_buffer.pop_front() {
            Some(entry) => entry,
            None => self.fetch(),
        };
        if let Ok(Some((_, span))) = &fetched {
            self.last_end = span.end;
        }
        fetched
    }

    /// The next token without consuming it.
    fn peek(&mut self) -> Result<Fetched, ParseError> {
        if let Some(front) = self.token_buffer.front() {
            return front.clone();
        }
        let fetched = self.fetch();
        self.token_buffer.push_back(fetched.clone());
        fetched
    }

    /// Where the next token starts, for node range bookkeeping.
    fn peek_offset(&mut self) -> usize {
        match self.peek() {
            Ok(Some((_, span))) => span.start,
            _ => self.lexer.offset(),
        }
    }

    fn fetch(&mut self) -> Result<Fetched, ParseError> {
        match self.lexer.next_token() {
            Ok(Some(token)) => Ok(Some(token)),
            Ok(None) => match self.tail_buffer.pop_front() {
                Some(token) => {
                    // Tail tokens are synthetic; give them the current
                    // lexer position so errors point somewhere real.
                    let at = self.lexer.offset();
                    Ok(Some((token, at..at)))
                }
                None => Ok(None),
            },
            Err(lex_error) => Err(ParseError::new(
                self.file.clone(),
                self.locations.range(&lex_error.span),
                ParseErrorKind::Lex(lex_error.kind),
            )),
        }
    }

    fn make_range(&self, start: usize) -> Range {
        let end = self.last_end.max(start);
        self.locations.range(&(start..end))
    }

    // ------------------------------------------------------------------
    // Expectations and errors
    // ------------------------------------------------------------------

    fn expect_identifier(&mut self) -> Result<String, ParseError> {
        self.expect_identifier_spanned().map(|(name, _)| name)
    }

    fn expect_identifier_spanned(&mut self) -> Result<(String, ByteRange<usize>), ParseError> {
        match self.next()? {
            Some((Token::Identifier(name), span)) => Ok((name, span)),
            other => Err(self.unexpected(other, vec![TokenKind::Identifier])),
        }
    }

    fn expect_chardata(&mut self) -> Result<(String, ByteRange<usize>), ParseError> {
        match self.next()? {
            Some((Token::CharData(text), span)) => Ok((text, span)),
            other => Err(self.unexpected(other, vec![TokenKind::CharData])),
        }
    }

    fn expect_quoted_string(&mut self) -> Result<(String, ByteRange<usize>), ParseError> {
        match self.next()? {
            Some((Token::QuotedString(text), span)) => Ok((text, span)),
            other => Err(self.unexpected(other, vec![TokenKind::QuotedString])),
        }
    }

    fn expect_token(&mut self, kind: TokenKind) -> Result<ByteRange<usize>, ParseError> {
        match self.next()? {
            Some((token, span)) if token.kind() == kind => Ok(span),
            other => Err(self.unexpected(other, vec![kind])),
        }
    }

    /// Error for a token in node position that cannot start a node.
    /// When the forwarding buffer is waiting and the context closes
    /// instead, the buffered node is the real problem and the error
    /// points at it.
    fn node_position_error(&mut self, found: Fetched) -> ParseError {
        let closes = match &found {
            None => true,
            Some((token, _)) => token.is_closing() || *token == Token::G1LineEnd,
        };

        if closes {
            if let Some(node) = self.forwarding_nodes.first() {
                return ParseError::new(
                    self.file.clone(),
                    node.range.clone(),
                    ParseErrorKind::DanglingForwardNodes,
                );
            }
        }

        let expected = match self.lexer.mode() {
            GrammarMode::G2 => vec![TokenKind::Identifier, TokenKind::QuotedString],
            _ => vec![
                TokenKind::DefineElement,
                TokenKind::Identifier,
                TokenKind::CharData,
            ],
        };
        self.unexpected(found, expected)
    }

    fn unexpected(&mut self, found: Fetched, expected: Vec<TokenKind>) -> ParseError {
        match found {
            Some((token, span)) => ParseError::new(
                self.file.clone(),
                self.locations.range(&span),
                ParseErrorKind::UnexpectedToken {
                    found: Some(token.kind()),
                    expected,
                },
            ),
            None => {
                let at = self.lexer.offset();
                ParseError::new(
                    self.file.clone(),
                    self.locations.range(&(at..at)),
                    ParseErrorKind::UnexpectedToken {
                        found: None,
                        expected,
                    },
                )
            }
        }
    }
}

fn block_kind(open: &Token) -> (BlockType, TokenKind) {
    match open {
        Token::BlockStart => (BlockType::Normal, TokenKind::BlockEnd),
        Token::GroupStart => (BlockType::Group, TokenKind::GroupEnd),
        _ => (BlockType::Generic, TokenKind::GenericEnd),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_yields_bare_root() {
        let tree = parse("").expect("parse failed");
        assert_eq!(tree.name(), Some("root"));
        assert_eq!(tree.block_type(), BlockType::Normal);
        assert!(tree.children().is_empty());
    }

    #[test]
    fn root_range_spans_the_input() {
        let source = "#a{b}";
        let tree = parse(source).expect("parse failed");
        assert_eq!(tree.range.span, 0..source.len());
    }

    #[test]
    fn parse_named_tags_errors_with_the_file() {
        let err = parse_named("doc.tadl", "#a{").expect_err("should fail");
        assert_eq!(err.file, "doc.tadl");
    }

    #[test]
    fn parse_bytes_rejects_invalid_utf8() {
        let err = parse_bytes("", b"#a\xFF").expect_err("should fail");
        assert_eq!(err.kind, ParseErrorKind::Lex(LexErrorKind::InvalidUtf8));
        assert_eq!(err.range.span, 2..2);
    }

    #[test]
    fn unclosed_block_errors_at_end_of_input() {
        let source = "#a{";
        let err = parse(source).expect_err("should fail");
        assert_eq!(err.range.span.start, source.len());
        assert_eq!(err.expected(), &[TokenKind::BlockEnd]);
    }
}
