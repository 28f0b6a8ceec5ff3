//! Fluent assertions for parse trees.
//!
//! Tests that walk trees by hand end up verbose and brittle; this
//! module gives them a compact vocabulary instead:
//!
//! ```
//! use tadl_parser::tadl::parsing::parse;
//! use tadl_parser::tadl::testing::assert_tree;
//!
//! let tree = parse("#hello{world}").unwrap();
//! assert_tree(&tree)
//!     .named("root")
//!     .child_count(1)
//!     .child(0, |hello| {
//!         hello.named("hello").child(0, |text| {
//!             text.is_text("world");
//!         });
//!     });
//! ```
//!
//! Every check panics with the failing path and the actual tree dump,
//! so a broken expectation reads like a diff.

use super::ast::{BlockType, TreeNode};
use super::formats::to_tree_string;

/// Entry point: assert on the root of a tree.
pub fn assert_tree(node: &TreeNode) -> TreeAssertion<'_> {
    TreeAssertion {
        node,
        path: "root".to_string(),
    }
}

pub struct TreeAssertion<'a> {
    node: &'a TreeNode,
    path: String,
}

impl<'a> TreeAssertion<'a> {
    fn fail(&self, message: &str) -> ! {
        panic!(
            "assertion failed at {}: {message}\ntree:\n{}",
            self.path,
            to_tree_string(self.node)
        );
    }

    /// The node is an element with this name.
    pub fn named(self, name: &str) -> Self {
        match self.node.name() {
            Some(actual) if actual == name => self,
            Some(actual) => self.fail(&format!("expected element '{name}', found '{actual}'")),
            None => self.fail(&format!("expected element '{name}', found a leaf")),
        }
    }

    pub fn block(self, block_type: BlockType) -> Self {
        let actual = self.node.block_type();
        if actual != block_type {
            self.fail(&format!(
                "expected block type {block_type:?}, found {actual:?}"
            ));
        }
        self
    }

    pub fn child_count(self, count: usize) -> Self {
        let actual = self.node.children().len();
        if actual != count {
            self.fail(&format!("expected {count} children, found {actual}"));
        }
        self
    }

    /// Descend into child `index`.
    pub fn child(self, index: usize, check: impl FnOnce(TreeAssertion<'a>)) -> Self {
        match self.node.children().get(index) {
            Some(child) => check(TreeAssertion {
                node: child,
                path: format!("{}[{index}]", self.path),
            }),
            None => self.fail(&format!(
                "no child at index {index}, node has {}",
                self.node.children().len()
            )),
        }
        self
    }

    pub fn attr(self, key: &str, value: &str) -> Self {
        match self.node.attribute(key) {
            Some(actual) if actual == value => self,
            Some(actual) => self.fail(&format!(
                "attribute '{key}': expected {value:?}, found {actual:?}"
            )),
            None => self.fail(&format!("attribute '{key}' is missing")),
        }
    }

    pub fn attr_count(self, count: usize) -> Self {
        let actual = self
            .node
            .as_element()
            .map_or(0, |element| element.attributes.len());
        if actual != count {
            self.fail(&format!("expected {count} attributes, found {actual}"));
        }
        self
    }

    /// The node is a text leaf with exactly this payload.
    pub fn is_text(self, text: &str) -> Self {
        match self.node.text_value() {
            Some(actual) if actual == text => self,
            Some(actual) => self.fail(&format!("expected text {text:?}, found {actual:?}")),
            None => self.fail(&format!("expected text {text:?}, found a non-text node")),
        }
    }

    /// The node is a comment leaf with exactly this payload.
    pub fn is_comment(self, comment: &str) -> Self {
        match self.node.comment_value() {
            Some(actual) if actual == comment => self,
            Some(actual) => {
                self.fail(&format!("expected comment {comment:?}, found {actual:?}"))
            }
            None => self.fail(&format!(
                "expected comment {comment:?}, found a non-comment node"
            )),
        }
    }
}
