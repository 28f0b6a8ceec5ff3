//! Output projections of a parse tree.
//!
//! The XML projection maps elements to elements, attributes to
//! attributes, text leaves to text nodes and comment leaves to XML
//! comments. Block types are not serialized; they are a property of
//! the TADL surface syntax, not of the structure.

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use thiserror::Error;

use super::ast::{BlockType, NodeKind, TreeNode};

#[derive(Debug, Error)]
pub enum XmlError {
    #[error("xml writing failed: {0}")]
    Write(#[from] quick_xml::Error),
    #[error("xml output was not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Serializes a tree as XML, without a document declaration.
pub fn to_xml(node: &TreeNode) -> Result<String, XmlError> {
    let mut writer = Writer::new(Vec::new());
    write_node(&mut writer, node)?;
    Ok(String::from_utf8(writer.into_inner())?)
}

fn write_node(writer: &mut Writer<Vec<u8>>, node: &TreeNode) -> Result<(), XmlError> {
    match &node.kind {
        NodeKind::Element(element) => {
            let mut start = BytesStart::new(element.name.as_str());
            for (key, value) in &element.attributes {
                start.push_attribute((key.as_str(), value.as_str()));
            }

            if element.children.is_empty() {
                writer.write_event(Event::Empty(start))?;
            } else {
                writer.write_event(Event::Start(start))?;
                for child in &element.children {
                    write_node(writer, child)?;
                }
                writer.write_event(Event::End(BytesEnd::new(element.name.as_str())))?;
            }
        }
        NodeKind::Text(text) => {
            writer.write_event(Event::Text(BytesText::new(text)))?;
        }
        NodeKind::Comment(comment) => {
            writer.write_event(Event::Comment(BytesText::new(comment)))?;
        }
    }
    Ok(())
}

/// Renders a tree as an indented structural dump, one node per line.
/// Meant for debugging and test failure output.
pub fn to_tree_string(node: &TreeNode) -> String {
    let mut out = String::new();
    dump(node, 0, &mut out);
    out
}

fn dump(node: &TreeNode, depth: usize, out: &mut String) {
    for _ in 0..depth {
        out.push_str("  ");
    }

    match &node.kind {
        NodeKind::Element(element) => {
            out.push_str(&element.name);
            for (key, value) in &element.attributes {
                out.push_str(&format!(" @{key}={value:?}"));
            }
            match element.block_type {
                BlockType::None => {}
                BlockType::Normal => out.push_str(" {}"),
                BlockType::Group => out.push_str(" ()"),
                BlockType::Generic => out.push_str(" <>"),
            }
            out.push('\n');
            for child in &element.children {
                dump(child, depth + 1, out);
            }
        }
        NodeKind::Text(text) => {
            out.push_str(&format!("{text:?}\n"));
        }
        NodeKind::Comment(comment) => {
            out.push_str(&format!("#? {comment}\n"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tadl::parsing::parse;

    #[test]
    fn xml_projection_of_elements_text_and_comments() {
        let tree = parse("#item @id{1} {hello #?done}").expect("parse failed");
        let xml = to_xml(&tree).expect("xml failed");
        assert_eq!(
            xml,
            "<root><item id=\"1\">hello <!--done--></item></root>"
        );
    }

    #[test]
    fn xml_escapes_markup_in_text() {
        let tree = TreeNode::element("root").with_child(TreeNode::text("a < b & c"));
        let xml = to_xml(&tree).expect("xml failed");
        assert_eq!(xml, "<root>a &lt; b &amp; c</root>");
    }

    #[test]
    fn empty_elements_self_close() {
        let tree = parse("#a #b").expect("parse failed");
        let xml = to_xml(&tree).expect("xml failed");
        assert_eq!(xml, "<root><a/><b/></root>");
    }

    #[test]
    fn tree_dump_is_indented() {
        let tree = parse("#a{hello}").expect("parse failed");
        let dump = to_tree_string(&tree);
        assert_eq!(dump, "root {}\n  a {}\n    \"hello\"\n");
    }
}
