//! TADL language front-end
//!
//! TADL documents mix two grammars.
//!
//! ## G1, text-first
//!
//! The default grammar. Plain text is the background; structure is
//! introduced by a small set of sigils. `#name` starts an element,
//! optionally followed by attributes (`@key{value}`) and a `{...}`
//! block of children. A text run directly after the element head
//! becomes its single inline child:
//!
//! ```text
//! #book @lang{en} {
//!     #title The Silmarillion
//!     #? a comment
//!     plain text is allowed anywhere
//! }
//! ```
//!
//! `\#` and `\}` escape the structural characters inside text.
//!
//! ## G2, node-first
//!
//! Selected for the whole document by a leading `#!`. Whitespace is
//! insignificant, text must be quoted, and structure dominates:
//!
//! ```text
//! #!{
//!     server @host="localhost" {
//!         port "8080",
//!         tls enabled
//!     }
//! }
//! ```
//!
//! Consecutive bare identifiers nest (`tls enabled` is an element
//! `tls` with child `enabled`); commas, blocks and quoted strings end
//! a nesting run. `()` and `<>` blocks work like `{}` and are
//! distinguished in the tree by their block type. `->` rewrites the
//! following block into a synthetic `ret` child, so `f(x) -> (int)`
//! reads like a function signature.
//!
//! ## G1 lines inside G2
//!
//! A `#` inside G2 switches the rest of the line back to G1. The first
//! word names a line element, the remainder is its content. With `##`
//! the line's nodes are forwarded into the next regular element, which
//! is how documentation attaches to declarations:
//!
//! ```text
//! #!{
//!     ## doc comment
//!     type T
//! }
//! ```
//!
//! ## Forwarding
//!
//! `##element` and `@@attr` defer attachment: they are captured where
//! they appear and become part of the next non-forwarded element.
//! Leftover forwarded items at the end of input are an error.
//!
//! The parse tree is rooted in a synthetic element named `root` with a
//! normal (`{}`) block type, whether or not the document spelled it
//! out. See [`parsing::parse`] for the entry point, [`ast`] for the
//! tree, [`unmarshal`] for mapping trees onto Rust records, and
//! [`formats`] for the XML projection.

pub mod ast;
pub mod error;
pub mod formats;
pub mod lexing;
pub mod parsing;
pub mod testing;
pub mod token;
pub mod unmarshal;

pub use ast::{AttributeMap, BlockType, Element, NodeKind, Position, Range, TreeNode};
pub use error::{LexError, LexErrorKind, ParseError, ParseErrorKind};
pub use parsing::{parse, parse_bytes, parse_named};
pub use token::{GrammarMode, Token, TokenKind};
