//! Property tests: determinism over arbitrary input, and structural
//! invariants over generated documents.

use proptest::prelude::*;
use tadl_parser::tadl::ast::{BlockType, TreeNode};
use tadl_parser::tadl::parsing::parse;

fn identifier() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,5}"
}

fn text_run() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9 ]{0,10}"
}

/// Well-formed G1 fragments: text runs, bare elements, attributed
/// elements, and elements with blocks of nested fragments.
fn g1_fragment(depth: u32) -> BoxedStrategy<String> {
    let leaf = prop_oneof![
        text_run(),
        identifier().prop_map(|name| format!("#{name}")),
        (identifier(), identifier(), text_run())
            .prop_map(|(name, key, value)| format!("#{name} @{key}{{{value}}}")),
    ];

    if depth == 0 {
        leaf.boxed()
    } else {
        prop_oneof![
            leaf,
            (identifier(), prop::collection::vec(g1_fragment(depth - 1), 0..3))
                .prop_map(|(name, children)| format!("#{name}{{{}}}", children.join(" "))),
        ]
        .boxed()
    }
}

fn g1_document() -> impl Strategy<Value = String> {
    prop::collection::vec(g1_fragment(3), 0..4).prop_map(|fragments| fragments.join(" "))
}

fn assert_ranges_nested(node: &TreeNode) {
    assert!(node.range.span.start <= node.range.span.end);
    for child in node.children() {
        assert!(
            node.range.contains(&child.range),
            "child {:?} outside parent {:?}",
            child.range,
            node.range
        );
        assert_ranges_nested(child);
    }
}

proptest! {
    /// Same bytes in, same result out, including error positions.
    #[test]
    fn parse_is_deterministic(source in ".{0,60}") {
        let first = parse(&source);
        let second = parse(&source);
        prop_assert_eq!(format!("{first:?}"), format!("{second:?}"));
    }

    /// Every accepted generated document satisfies the tree invariants.
    #[test]
    fn generated_documents_parse_with_invariants(source in g1_document()) {
        let tree = parse(&source).expect("generated document must parse");

        prop_assert_eq!(tree.name(), Some("root"));
        prop_assert_eq!(tree.block_type(), BlockType::Normal);
        prop_assert_eq!(tree.range.span.start, 0);
        prop_assert_eq!(tree.range.span.end, source.len());

        assert_ranges_nested(&tree);
    }

    /// Parsing arbitrary input never panics; it returns a tree or an
    /// error anchored inside the input.
    #[test]
    fn parse_never_panics(source in ".{0,60}") {
        match parse(&source) {
            Ok(tree) => {
                prop_assert_eq!(tree.name(), Some("root"));
                prop_assert_eq!(tree.block_type(), BlockType::Normal);
            }
            Err(err) => {
                prop_assert!(err.range.span.start <= source.len());
            }
        }
    }
}
