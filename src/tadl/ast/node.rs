//! The parse tree.
//!
//! A [`TreeNode`] is an element, a text leaf or a comment leaf; the
//! [`NodeKind`] enum keeps the three shapes mutually exclusive. Nodes
//! own their children, so the root element owns the whole tree.
//! Equality between nodes ignores source ranges, which keeps expected
//! trees in tests free of position bookkeeping.

use std::collections::btree_map;
use std::collections::BTreeMap;

use super::range::Range;

/// Which bracket pair enclosed an element's children.
///
/// `None` marks an element that had no brackets at all; such an element
/// has at most one inline child.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockType {
    #[default]
    None,
    /// `{}`
    Normal,
    /// `()`
    Group,
    /// `<>`
    Generic,
}

/// Attributes of an element. Keys are unique; iteration order is the
/// key order, so every projection of a tree is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeMap(BTreeMap<String, String>);

impl AttributeMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a key/value pair, returning the previous value if the
    /// key was already present.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn has(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, String> {
        self.0.iter()
    }
}

impl<'a> IntoIterator for &'a AttributeMap {
    type Item = (&'a String, &'a String);
    type IntoIter = btree_map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for AttributeMap {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// A regular named node.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub name: String,
    pub attributes: AttributeMap,
    pub children: Vec<TreeNode>,
    pub block_type: BlockType,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: AttributeMap::new(),
            children: Vec::new(),
            block_type: BlockType::None,
        }
    }
}

/// The three node shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Element(Element),
    Text(String),
    Comment(String),
}

/// A node in the parse tree.
#[derive(Debug, Clone)]
pub struct TreeNode {
    pub kind: NodeKind,
    /// Spans every token consumed to build this node.
    pub range: Range,
}

impl TreeNode {
    pub fn element(name: impl Into<String>) -> Self {
        Self {
            kind: NodeKind::Element(Element::new(name)),
            range: Range::default(),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: NodeKind::Text(text.into()),
            range: Range::default(),
        }
    }

    pub fn comment(comment: impl Into<String>) -> Self {
        Self {
            kind: NodeKind::Comment(comment.into()),
            range: Range::default(),
        }
    }

    /// Sets the range, builder-style.
    pub fn at(mut self, range: Range) -> Self {
        self.range = range;
        self
    }

    /// Appends a child, builder-style. Panics on leaves, which is fine
    /// for the test construction this is meant for.
    pub fn with_child(mut self, child: TreeNode) -> Self {
        self.expect_element_mut().children.push(child);
        self
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = TreeNode>) -> Self {
        self.expect_element_mut().children.extend(children);
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.expect_element_mut().attributes.set(key, value);
        self
    }

    pub fn block(mut self, block_type: BlockType) -> Self {
        self.expect_element_mut().block_type = block_type;
        self
    }

    pub fn is_element(&self) -> bool {
        matches!(self.kind, NodeKind::Element(_))
    }

    pub fn is_text(&self) -> bool {
        matches!(self.kind, NodeKind::Text(_))
    }

    pub fn is_comment(&self) -> bool {
        matches!(self.kind, NodeKind::Comment(_))
    }

    pub fn as_element(&self) -> Option<&Element> {
        match &self.kind {
            NodeKind::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn as_element_mut(&mut self) -> Option<&mut Element> {
        match &mut self.kind {
            NodeKind::Element(el) => Some(el),
            _ => None,
        }
    }

    /// The element name, if this is an element.
    pub fn name(&self) -> Option<&str> {
        self.as_element().map(|el| el.name.as_str())
    }

    /// The text payload, if this is a text leaf.
    pub fn text_value(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Text(t) => Some(t),
            _ => None,
        }
    }

    /// The comment payload, if this is a comment leaf.
    pub fn comment_value(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Comment(c) => Some(c),
            _ => None,
        }
    }

    /// Children in source order; empty for leaves.
    pub fn children(&self) -> &[TreeNode] {
        match self.as_element() {
            Some(element) => element.children.as_slice(),
            None => &[],
        }
    }

    /// Attribute lookup; `None` for leaves and for absent keys.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.as_element().and_then(|el| el.attributes.get(key))
    }

    pub fn block_type(&self) -> BlockType {
        self.as_element()
            .map_or(BlockType::None, |el| el.block_type)
    }

    /// The value of the first text child, if any. This is what scalar
    /// unmarshalling reads.
    pub fn first_text(&self) -> Option<&str> {
        self.children().iter().find_map(|c| c.text_value())
    }

    fn expect_element_mut(&mut self) -> &mut Element {
        self.as_element_mut()
            .expect("builder methods only apply to element nodes")
    }
}

/// Structural equality; ranges are deliberately not compared.
impl PartialEq for TreeNode {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tadl::ast::Position;

    #[test]
    fn attribute_map_reports_previous_value() {
        let mut attrs = AttributeMap::new();
        assert_eq!(attrs.set("a", "1"), None);
        assert_eq!(attrs.set("a", "2"), Some("1".to_string()));
        assert_eq!(attrs.get("a"), Some("2"));
        assert!(attrs.has("a"));
        assert!(!attrs.has("b"));
    }

    #[test]
    fn attribute_iteration_is_sorted() {
        let attrs: AttributeMap = [("b", "2"), ("a", "1")].into_iter().collect();
        let keys: Vec<_> = attrs.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn equality_ignores_ranges() {
        let range = Range::new(3..9, Position::new(0, 3), Position::new(0, 9));
        let a = TreeNode::element("x").with_child(TreeNode::text("t"));
        let b = TreeNode::element("x")
            .with_child(TreeNode::text("t").at(range.clone()))
            .at(range);
        assert_eq!(a, b);
    }

    #[test]
    fn leaf_accessors() {
        let text = TreeNode::text("hello");
        assert!(text.is_text());
        assert_eq!(text.text_value(), Some("hello"));
        assert_eq!(text.name(), None);
        assert!(text.children().is_empty());

        let comment = TreeNode::comment("note");
        assert!(comment.is_comment());
        assert_eq!(comment.comment_value(), Some("note"));
    }

    #[test]
    fn first_text_skips_elements() {
        let node = TreeNode::element("n")
            .with_child(TreeNode::element("child"))
            .with_child(TreeNode::text("payload"));
        assert_eq!(node.first_text(), Some("payload"));
    }
}
