//! The modal lexer.
//!
//! One lexer serves all three grammars; the active [`GrammarMode`] is
//! written by the parser between token requests.
//!
//! ## G1 (and G1Line)
//!
//! Text-first. `#`, `@`, `{` and `}` are structural, everything else
//! is a [`Token::CharData`] run in which a backslash escapes the
//! following character. Runs that contain only whitespace are dropped;
//! a run's leading whitespace is swallowed, the rest is preserved
//! verbatim. `#?` starts a comment captured up to the next `#` or `}`.
//! `#!` before any other token is the G2 preamble. After `#`, `##`,
//! `@` or `@@` the next word is lexed as an identifier instead of
//! char data.
//!
//! G1Line additionally ends at an unescaped newline, emitting
//! [`Token::G1LineEnd`]; the parser is expected to restore G2
//! afterwards.
//!
//! ## G2
//!
//! Node-first. Whitespace is insignificant, `//` comments are
//! discarded, text requires quotes. Identifiers, quoted strings, the
//! three bracket pairs, `=`, `,`, `->`, `@`/`@@` and `#`/`##` (which
//! hands the line over to G1Line) are the alphabet.
//!
//! Tokens are paired with their byte span. The lexer never allocates
//! beyond token payloads and reads the input exactly once.

pub mod scanner;

use std::ops::Range as ByteRange;

use super::error::{LexError, LexErrorKind};
use super::token::{GrammarMode, Token};
use scanner::Scanner;

/// A token plus the byte span it was lexed from.
pub type SpannedToken = (Token, ByteRange<usize>);

pub struct Lexer<'a> {
    scanner: Scanner<'a>,
    mode: GrammarMode,
    /// After `#`/`@` the next G1 token is an identifier, not char data.
    want_identifier: bool,
    /// `#!` is only a preamble before any other token.
    emitted_any: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            scanner: Scanner::new(source),
            mode: GrammarMode::G1,
            want_identifier: false,
            emitted_any: false,
        }
    }

    pub fn mode(&self) -> GrammarMode {
        self.mode
    }

    /// Switches the grammar. Takes effect at the next token request.
    pub fn set_mode(&mut self, mode: GrammarMode) {
        self.mode = mode;
    }

    /// Current byte offset; synthetic parser tokens take this as their
    /// position.
    pub fn offset(&self) -> usize {
        self.scanner.offset()
    }

    /// Produces the next token, or `None` at end of input.
    pub fn next_token(&mut self) -> Result<Option<SpannedToken>, LexError> {
        let produced = match self.mode {
            GrammarMode::G1 => self.next_g1(false)?,
            GrammarMode::G1Line => self.next_g1(true)?,
            GrammarMode::G2 => self.next_g2()?,
        };
        if produced.is_some() {
            self.emitted_any = true;
        }
        Ok(produced)
    }

    fn next_g1(&mut self, line_mode: bool) -> Result<Option<SpannedToken>, LexError> {
        if self.want_identifier {
            self.want_identifier = false;
            self.skip_inline_whitespace();
            if let Some(tok) = self.lex_identifier() {
                return Ok(Some(tok));
            }
        }

        loop {
            let Some(ch) = self.scanner.peek() else {
                return Ok(None);
            };
            let start = self.scanner.offset();

            match ch {
                '\n' if line_mode => {
                    self.scanner.bump();
                    return Ok(Some((Token::G1LineEnd, start..self.scanner.offset())));
                }
                '\r' if line_mode && self.scanner.peek_second() == Some('\n') => {
                    self.scanner.bump();
                    self.scanner.bump();
                    return Ok(Some((Token::G1LineEnd, start..self.scanner.offset())));
                }
                '#' => {
                    self.scanner.bump();
                    let token = match self.scanner.peek() {
                        Some('!') if !self.emitted_any => {
                            self.scanner.bump();
                            Token::G2Preamble
                        }
                        Some('#') => {
                            self.scanner.bump();
                            self.want_identifier = true;
                            Token::DefineElement { forward: true }
                        }
                        Some('?') => {
                            self.scanner.bump();
                            let text = self.lex_comment_text(line_mode);
                            Token::Comment(text)
                        }
                        _ => {
                            self.want_identifier = true;
                            Token::DefineElement { forward: false }
                        }
                    };
                    return Ok(Some((token, start..self.scanner.offset())));
                }
                '@' => {
                    self.scanner.bump();
                    let forward = self.scanner.bump_if('@');
                    self.want_identifier = true;
                    return Ok(Some((
                        Token::DefineAttribute { forward },
                        start..self.scanner.offset(),
                    )));
                }
                '{' => {
                    self.scanner.bump();
                    return Ok(Some((Token::BlockStart, start..self.scanner.offset())));
                }
                '}' => {
                    self.scanner.bump();
                    return Ok(Some((Token::BlockEnd, start..self.scanner.offset())));
                }
                _ => {
                    if let Some(tok) = self.lex_chardata(line_mode) {
                        return Ok(Some(tok));
                    }
                    // The run was all whitespace; whatever stopped it is
                    // handled on the next iteration.
                    if self.scanner.is_eof() {
                        return Ok(None);
                    }
                }
            }
        }
    }

    /// A char data run. Leading whitespace is swallowed; `None` if
    /// nothing but whitespace was found.
    fn lex_chardata(&mut self, line_mode: bool) -> Option<SpannedToken> {
        loop {
            match self.scanner.peek() {
                Some(' ' | '\t' | '\r') => {
                    self.scanner.bump();
                }
                Some('\n') if !line_mode => {
                    self.scanner.bump();
                }
                _ => break,
            }
        }

        let start = self.scanner.offset();
        let mut value = String::new();

        loop {
            match self.scanner.peek() {
                None => break,
                Some('#' | '@' | '{' | '}') => break,
                Some('\n') if line_mode => break,
                Some('\\') => {
                    self.scanner.bump();
                    match self.scanner.bump() {
                        Some(escaped) => value.push(escaped),
                        // A trailing backslash stands for itself.
                        None => {
                            value.push('\\');
                            break;
                        }
                    }
                }
                Some(ch) => {
                    self.scanner.bump();
                    value.push(ch);
                }
            }
        }

        if value.is_empty() {
            None
        } else {
            Some((Token::CharData(value), start..self.scanner.offset()))
        }
    }

    /// Comment text after `#?`: up to the next `#` or `}` (exclusive),
    /// the end of the line in line mode, or end of input. Surrounding
    /// whitespace is not part of the value.
    fn lex_comment_text(&mut self, line_mode: bool) -> String {
        let mut text = String::new();

        loop {
            match self.scanner.peek() {
                None => break,
                Some('#' | '}') => break,
                Some('\n') if line_mode => break,
                Some(ch) => {
                    self.scanner.bump();
                    text.push(ch);
                }
            }
        }

        text.trim().to_string()
    }

    fn next_g2(&mut self) -> Result<Option<SpannedToken>, LexError> {
        loop {
            match self.scanner.peek() {
                Some(' ' | '\t' | '\r' | '\n') => {
                    self.scanner.bump();
                }
                Some('/') if self.scanner.peek_second() == Some('/') => {
                    while let Some(ch) = self.scanner.peek() {
                        if ch == '\n' {
                            break;
                        }
                        self.scanner.bump();
                    }
                }
                _ => break,
            }
        }

        let Some(ch) = self.scanner.peek() else {
            return Ok(None);
        };
        let start = self.scanner.offset();

        if ch.is_ascii_alphanumeric() {
            // Checked above, cannot fail.
            return Ok(self.lex_identifier());
        }

        let token = match ch {
            '"' => return self.lex_quoted_string().map(Some),
            '{' => self.single(Token::BlockStart),
            '}' => self.single(Token::BlockEnd),
            '(' => self.single(Token::GroupStart),
            ')' => self.single(Token::GroupEnd),
            '<' => self.single(Token::GenericStart),
            '>' => self.single(Token::GenericEnd),
            '=' => self.single(Token::Assign),
            ',' => self.single(Token::Comma),
            '-' => {
                self.scanner.bump();
                if self.scanner.bump_if('>') {
                    Token::G2Arrow
                } else {
                    return Err(LexError::new(
                        LexErrorKind::UnexpectedCharacter('-'),
                        start..self.scanner.offset(),
                    ));
                }
            }
            '#' => {
                self.scanner.bump();
                let forward = self.scanner.bump_if('#');
                // The parser will move this line into G1Line; the line
                // element's name is lexed as an identifier there.
                self.want_identifier = true;
                Token::DefineElement { forward }
            }
            '@' => {
                self.scanner.bump();
                let forward = self.scanner.bump_if('@');
                Token::DefineAttribute { forward }
            }
            other => {
                self.scanner.bump();
                return Err(LexError::new(
                    LexErrorKind::UnexpectedCharacter(other),
                    start..self.scanner.offset(),
                ));
            }
        };

        Ok(Some((token, start..self.scanner.offset())))
    }

    fn single(&mut self, token: Token) -> Token {
        self.scanner.bump();
        token
    }

    /// `[A-Za-z0-9_]+` starting with a letter or digit; `None` if the
    /// next character does not start an identifier.
    fn lex_identifier(&mut self) -> Option<SpannedToken> {
        let first = self.scanner.peek()?;
        if !first.is_ascii_alphanumeric() {
            return None;
        }

        let start = self.scanner.offset();
        let mut name = String::new();
        while let Some(ch) = self.scanner.peek() {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                self.scanner.bump();
                name.push(ch);
            } else {
                break;
            }
        }

        Some((Token::Identifier(name), start..self.scanner.offset()))
    }

    fn lex_quoted_string(&mut self) -> Result<SpannedToken, LexError> {
        let start = self.scanner.offset();
        self.scanner.bump(); // opening quote
        let mut value = String::new();

        loop {
            match self.scanner.peek() {
                None => {
                    return Err(LexError::new(
                        LexErrorKind::UnterminatedString,
                        start..self.scanner.offset(),
                    ));
                }
                Some('"') => {
                    self.scanner.bump();
                    break;
                }
                Some('\\') => {
                    let escape_start = self.scanner.offset();
                    self.scanner.bump();
                    match self.scanner.peek() {
                        Some(esc @ ('"' | '\\')) => {
                            self.scanner.bump();
                            value.push(esc);
                        }
                        Some(other) => {
                            return Err(LexError::new(
                                LexErrorKind::InvalidEscape(other),
                                escape_start..self.scanner.offset() + other.len_utf8(),
                            ));
                        }
                        None => {
                            return Err(LexError::new(
                                LexErrorKind::UnterminatedString,
                                start..self.scanner.offset(),
                            ));
                        }
                    }
                }
                Some(ch) => {
                    self.scanner.bump();
                    value.push(ch);
                }
            }
        }

        Ok((
            Token::QuotedString(value),
            start..self.scanner.offset(),
        ))
    }

    fn skip_inline_whitespace(&mut self) {
        while let Some(' ' | '\t') = self.scanner.peek() {
            self.scanner.bump();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_g1(source: &str) -> Vec<Token> {
        let mut lexer = Lexer::new(source);
        let mut tokens = Vec::new();
        while let Some((tok, _)) = lexer.next_token().expect("lex failed") {
            tokens.push(tok);
        }
        tokens
    }

    #[test]
    fn g1_element_with_block() {
        assert_eq!(
            all_g1("#hello{world}"),
            vec![
                Token::DefineElement { forward: false },
                Token::Identifier("hello".into()),
                Token::BlockStart,
                Token::CharData("world".into()),
                Token::BlockEnd,
            ]
        );
    }

    #[test]
    fn g1_chardata_keeps_trailing_whitespace() {
        assert_eq!(
            all_g1("#S hello #I"),
            vec![
                Token::DefineElement { forward: false },
                Token::Identifier("S".into()),
                Token::CharData("hello ".into()),
                Token::DefineElement { forward: false },
                Token::Identifier("I".into()),
            ]
        );
    }

    #[test]
    fn g1_escapes() {
        assert_eq!(
            all_g1(r"a \# b \} c"),
            vec![Token::CharData("a # b } c".into())]
        );
    }

    #[test]
    fn g1_comment_stops_at_element_or_block_end() {
        assert_eq!(
            all_g1("#? note #x"),
            vec![
                Token::Comment("note".into()),
                Token::DefineElement { forward: false },
                Token::Identifier("x".into()),
            ]
        );
        assert_eq!(
            all_g1("#?trailing comment"),
            vec![Token::Comment("trailing comment".into())]
        );
    }

    #[test]
    fn preamble_only_at_document_start() {
        assert_eq!(all_g1("#!")[0], Token::G2Preamble);
        assert_eq!(all_g1("  #!")[0], Token::G2Preamble);
        // After any token, '#' + '!' is a plain element definition.
        let tokens = all_g1("x #!y");
        assert_eq!(tokens[0], Token::CharData("x ".into()));
        assert_eq!(tokens[1], Token::DefineElement { forward: false });
    }

    #[test]
    fn g2_token_stream() {
        let mut lexer = Lexer::new(r#"server @host="local" { port, x -> (int) } // done"#);
        lexer.set_mode(GrammarMode::G2);
        let mut tokens = Vec::new();
        while let Some((tok, _)) = lexer.next_token().expect("lex failed") {
            tokens.push(tok);
        }
        assert_eq!(
            tokens,
            vec![
                Token::Identifier("server".into()),
                Token::DefineAttribute { forward: false },
                Token::Identifier("host".into()),
                Token::Assign,
                Token::QuotedString("local".into()),
                Token::BlockStart,
                Token::Identifier("port".into()),
                Token::Comma,
                Token::Identifier("x".into()),
                Token::G2Arrow,
                Token::GroupStart,
                Token::Identifier("int".into()),
                Token::GroupEnd,
                Token::BlockEnd,
            ]
        );
    }

    #[test]
    fn g2_string_escapes() {
        let mut lexer = Lexer::new(r#""a\"b\\c""#);
        lexer.set_mode(GrammarMode::G2);
        let (tok, span) = lexer.next_token().expect("lex failed").expect("token");
        assert_eq!(tok, Token::QuotedString(r#"a"b\c"#.into()));
        assert_eq!(span, 0..9);
    }

    #[test]
    fn g2_unterminated_string() {
        let mut lexer = Lexer::new("\"abc");
        lexer.set_mode(GrammarMode::G2);
        let err = lexer.next_token().expect_err("should fail");
        assert_eq!(err.kind, LexErrorKind::UnterminatedString);
    }

    #[test]
    fn g2_invalid_escape() {
        let mut lexer = Lexer::new(r#""a\nb""#);
        lexer.set_mode(GrammarMode::G2);
        let err = lexer.next_token().expect_err("should fail");
        assert_eq!(err.kind, LexErrorKind::InvalidEscape('n'));
    }

    #[test]
    fn g1_line_ends_at_newline() {
        let mut lexer = Lexer::new("# doc comment\nrest");
        // Simulate the parser: consume the marker in G2, then switch.
        lexer.set_mode(GrammarMode::G2);
        let (marker, _) = lexer.next_token().expect("lex").expect("token");
        assert_eq!(marker, Token::DefineElement { forward: false });
        lexer.set_mode(GrammarMode::G1Line);

        let (name, _) = lexer.next_token().expect("lex").expect("token");
        assert_eq!(name, Token::Identifier("doc".into()));
        let (text, _) = lexer.next_token().expect("lex").expect("token");
        assert_eq!(text, Token::CharData("comment".into()));
        let (end, _) = lexer.next_token().expect("lex").expect("token");
        assert_eq!(end, Token::G1LineEnd);
    }

    #[test]
    fn spans_are_byte_ranges() {
        let mut lexer = Lexer::new("#ab{c}");
        let spans: Vec<_> = std::iter::from_fn(|| {
            lexer.next_token().expect("lex failed").map(|(_, s)| s)
        })
        .collect();
        assert_eq!(spans, vec![0..1, 1..3, 3..4, 4..5, 5..6]);
    }
}
