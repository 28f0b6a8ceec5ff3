//! Integration tests for the lexer: exact token sequences per grammar
//! mode, spans, and lexical errors.

use rstest::rstest;
use tadl_parser::tadl::lexing::Lexer;
use tadl_parser::tadl::{GrammarMode, Token};

fn lex_in(mode: GrammarMode, source: &str) -> Vec<Token> {
    let mut lexer = Lexer::new(source);
    lexer.set_mode(mode);
    let mut tokens = Vec::new();
    while let Some((token, _)) = lexer.next_token().expect("lex failed") {
        tokens.push(token);
    }
    tokens
}

fn ident(name: &str) -> Token {
    Token::Identifier(name.to_string())
}

fn chardata(text: &str) -> Token {
    Token::CharData(text.to_string())
}

#[test]
fn g1_full_element() {
    assert_eq!(
        lex_in(GrammarMode::G1, "#item @id{42}{body text}"),
        vec![
            Token::DefineElement { forward: false },
            ident("item"),
            Token::DefineAttribute { forward: false },
            ident("id"),
            Token::BlockStart,
            chardata("42"),
            Token::BlockEnd,
            Token::BlockStart,
            chardata("body text"),
            Token::BlockEnd,
        ]
    );
}

#[test]
fn g1_forward_sigils() {
    assert_eq!(
        lex_in(GrammarMode::G1, "##meta @@key{v}"),
        vec![
            Token::DefineElement { forward: true },
            ident("meta"),
            Token::DefineAttribute { forward: true },
            ident("key"),
            Token::BlockStart,
            chardata("v"),
            Token::BlockEnd,
        ]
    );
}

#[test]
fn g1_whitespace_only_runs_produce_nothing() {
    assert_eq!(
        lex_in(GrammarMode::G1, "#a   \n\t  #b"),
        vec![
            Token::DefineElement { forward: false },
            ident("a"),
            Token::DefineElement { forward: false },
            ident("b"),
        ]
    );
}

#[test]
fn g1_identifier_with_digits_and_underscores() {
    assert_eq!(
        lex_in(GrammarMode::G1, "#x2_y"),
        vec![Token::DefineElement { forward: false }, ident("x2_y")]
    );
}

#[rstest]
#[case("#?c#next", "c")]
#[case("#? spaced out }", "spaced out")]
#[case("#?unterminated at eof", "unterminated at eof")]
fn g1_comment_capture(#[case] source: &str, #[case] expected: &str) {
    let tokens = lex_in(GrammarMode::G1, source);
    assert_eq!(tokens[0], Token::Comment(expected.to_string()));
}

#[test]
fn g1_line_emits_line_end_and_preserves_escaped_newline() {
    assert_eq!(
        lex_in(GrammarMode::G1Line, "one\\\ntwo\nrest"),
        vec![
            chardata("one\ntwo"),
            Token::G1LineEnd,
            // The lexer keeps lexing as G1Line when nobody switches the
            // mode back; the next line follows the same rules.
            chardata("rest"),
        ]
    );
}

#[test]
fn g2_structural_tokens() {
    assert_eq!(
        lex_in(GrammarMode::G2, "{ } ( ) < > = , ->"),
        vec![
            Token::BlockStart,
            Token::BlockEnd,
            Token::GroupStart,
            Token::GroupEnd,
            Token::GenericStart,
            Token::GenericEnd,
            Token::Assign,
            Token::Comma,
            Token::G2Arrow,
        ]
    );
}

#[test]
fn g2_whitespace_and_comments_are_insignificant() {
    assert_eq!(
        lex_in(GrammarMode::G2, "a // rest of line\n  b\t,c"),
        vec![ident("a"), ident("b"), Token::Comma, ident("c")]
    );
}

#[test]
fn g2_quoted_string_with_escapes() {
    assert_eq!(
        lex_in(GrammarMode::G2, r#""say \"hi\" with \\ backslash""#),
        vec![Token::QuotedString(r#"say "hi" with \ backslash"#.to_string())]
    );
}

#[test]
fn g2_hash_hands_over_to_g1_line() {
    // `#` and `##` stay ordinary element definitions in G2; the parser
    // reacts to them by switching the mode.
    assert_eq!(
        lex_in(GrammarMode::G2, "# ##")[..2],
        [
            Token::DefineElement { forward: false },
            Token::DefineElement { forward: true },
        ]
    );
}

#[test]
fn spans_cover_the_lexed_bytes() {
    let mut lexer = Lexer::new("#key{a b}");
    let mut spans = Vec::new();
    while let Some((_, span)) = lexer.next_token().expect("lex failed") {
        spans.push(span);
    }
    assert_eq!(spans, vec![0..1, 1..4, 4..5, 5..8, 8..9]);
}

#[test]
fn multibyte_text_is_lexed_whole() {
    let tokens = lex_in(GrammarMode::G1, "#a{grüße ✓}");
    assert_eq!(tokens[3], chardata("grüße ✓"));
}
