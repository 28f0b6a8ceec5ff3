//! # tadl-parser
//!
//! A front-end for TADL, a lightweight markup language meant as a
//! human-writable replacement for XML in document markup and DSL roles.
//!
//! The crate turns TADL source into a [`TreeNode`](tadl::ast::TreeNode)
//! parse tree. Two grammars coexist in one document: the text-first G1
//! grammar (the default) and the node-first G2 grammar (entered with a
//! leading `#!`), with single-line G1 excursions available inside G2.
//! See the [`tadl`] module for the full language tour.
//!
//! ```
//! use tadl_parser::tadl::parsing::parse;
//!
//! let tree = parse("#greeting{hello}").unwrap();
//! let greeting = &tree.children()[0];
//! assert_eq!(greeting.name(), Some("greeting"));
//! ```

pub mod tadl;
