//! Parse tree types and source positions.

pub mod node;
pub mod range;

pub use node::{AttributeMap, BlockType, Element, NodeKind, TreeNode};
pub use range::{Position, Range, SourceLocation};
