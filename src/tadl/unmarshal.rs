//! Unmarshalling: projecting a parse tree onto record shapes.
//!
//! The facade is a serde `Deserializer` over [`TreeNode`], so any
//! `serde::Deserialize` type works as a target. Each immediate child
//! element of a node maps to the field of the same name; renaming is
//! `#[serde(rename = "...")]`.
//!
//! Scalars parse from the node's first text child. Strings are taken
//! verbatim; integers and booleans are whitespace-trimmed first, and
//! integer overflow of the target width is an error. A sequence field
//! reads the wrapper element's children in order, text children as
//! scalar items and element children as nested records.
//!
//! In [`UnmarshalMode::Strict`], a field with no matching element is an
//! error. In [`UnmarshalMode::Lenient`], missing fields take zero
//! values: empty strings, zero numbers, empty sequences, and records
//! whose own fields are zeroed recursively.
//!
//! ```
//! use serde::Deserialize;
//! use tadl_parser::tadl::unmarshal::{from_str, UnmarshalMode};
//!
//! #[derive(Deserialize)]
//! struct Record {
//!     #[serde(rename = "item")]
//!     field: String,
//! }
//!
//! let record: Record = from_str("#item hello", UnmarshalMode::Lenient).unwrap();
//! assert_eq!(record.field, "hello");
//! ```

use std::fmt;

use serde::de::value::StrDeserializer;
use serde::de::{
    self, DeserializeOwned, DeserializeSeed, Deserializer, IntoDeserializer, MapAccess,
    SeqAccess, Visitor,
};
use serde::forward_to_deserialize_any;
use thiserror::Error;

use super::ast::{NodeKind, TreeNode};
use super::error::ParseError;
use super::parsing;

/// How absent fields are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnmarshalMode {
    /// Every target field must be satisfied by the tree.
    #[default]
    Strict,
    /// Absent fields take zero values.
    Lenient,
}

#[derive(Debug, Error)]
pub enum UnmarshalError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("{0}")]
    Message(String),
}

impl de::Error for UnmarshalError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        UnmarshalError::Message(msg.to_string())
    }
}

/// Parses `source` and unmarshals the root's children into `T`.
pub fn from_str<T: DeserializeOwned>(
    source: &str,
    mode: UnmarshalMode,
) -> Result<T, UnmarshalError> {
    let tree = parsing::parse(source)?;
    from_tree(&tree, mode)
}

/// Unmarshals the children of `node` into `T`.
pub fn from_tree<T: DeserializeOwned>(
    node: &TreeNode,
    mode: UnmarshalMode,
) -> Result<T, UnmarshalError> {
    T::deserialize(NodeDeserializer { node, mode })
}

// ----------------------------------------------------------------------
// Tree-backed deserializer
// ----------------------------------------------------------------------

struct NodeDeserializer<'de> {
    node: &'de TreeNode,
    mode: UnmarshalMode,
}

impl<'de> NodeDeserializer<'de> {
    /// The text a scalar target reads: a text leaf is its own value,
    /// an element contributes its first text child.
    fn scalar_text(&self) -> &'de str {
        match &self.node.kind {
            NodeKind::Text(text) => text,
            _ => self.node.first_text().unwrap_or(""),
        }
    }

    fn parse_signed(&self) -> Result<i64, UnmarshalError> {
        let text = self.scalar_text().trim();
        text.parse::<i64>().map_err(|err| {
            UnmarshalError::Message(format!("invalid integer {text:?}: {err}"))
        })
    }

    fn parse_unsigned(&self) -> Result<u64, UnmarshalError> {
        let text = self.scalar_text().trim();
        text.parse::<u64>().map_err(|err| {
            UnmarshalError::Message(format!("invalid integer {text:?}: {err}"))
        })
    }
}

macro_rules! deserialize_signed {
    ($($method:ident)*) => {
        $(fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
            visitor.visit_i64(self.parse_signed()?)
        })*
    };
}

macro_rules! deserialize_unsigned {
    ($($method:ident)*) => {
        $(fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
            visitor.visit_u64(self.parse_unsigned()?)
        })*
    };
}

impl<'de> Deserializer<'de> for NodeDeserializer<'de> {
    type Error = UnmarshalError;

    fn deserialize_any<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, Self::Error> {
        Err(UnmarshalError::Message(
            "unmarshalling requires a concrete target type".to_string(),
        ))
    }

    deserialize_signed!(deserialize_i8 deserialize_i16 deserialize_i32 deserialize_i64);
    deserialize_unsigned!(deserialize_u8 deserialize_u16 deserialize_u32 deserialize_u64);

    fn deserialize_bool<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.scalar_text().trim() {
            "true" => visitor.visit_bool(true),
            "false" => visitor.visit_bool(false),
            other => Err(UnmarshalError::Message(format!(
                "invalid boolean {other:?}"
            ))),
        }
    }

    fn deserialize_str<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_str(self.scalar_text())
    }

    fn deserialize_string<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.deserialize_str(visitor)
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_some(self)
    }

    fn deserialize_unit<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_unit()
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        visitor.visit_unit()
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_seq(ItemSeqAccess {
            items: self.node.children().iter(),
            mode: self.mode,
        })
    }

    fn deserialize_tuple<V: Visitor<'de>>(
        self,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_map(ElementMapAccess::new(self.node, &[], self.mode))
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        visitor.visit_map(ElementMapAccess::new(self.node, fields, self.mode))
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(
        self,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        visitor.visit_unit()
    }

    forward_to_deserialize_any! {
        f32 f64 char bytes byte_buf enum identifier
    }
}

// ----------------------------------------------------------------------
// Struct fields from element children
// ----------------------------------------------------------------------

struct ElementMapAccess<'de> {
    children: std::slice::Iter<'de, TreeNode>,
    fields: &'static [&'static str],
    mode: UnmarshalMode,
    seen: Vec<&'de str>,
    /// Fields not present in the tree, filled in lenient mode.
    missing: Vec<&'static str>,
    missing_started: bool,
    pending: Option<PendingValue<'de>>,
}

enum PendingValue<'de> {
    Node(&'de TreeNode),
    Zero,
}

impl<'de> ElementMapAccess<'de> {
    fn new(node: &'de TreeNode, fields: &'static [&'static str], mode: UnmarshalMode) -> Self {
        Self {
            children: node.children().iter(),
            fields,
            mode,
            seen: Vec::new(),
            missing: Vec::new(),
            missing_started: false,
            pending: None,
        }
    }
}

impl<'de> MapAccess<'de> for ElementMapAccess<'de> {
    type Error = UnmarshalError;

    fn next_key_seed<K: DeserializeSeed<'de>>(
        &mut self,
        seed: K,
    ) -> Result<Option<K::Value>, Self::Error> {
        // Element children first, in source order.
        for child in self.children.by_ref() {
            if let Some(name) = child.name() {
                self.seen.push(name);
                self.pending = Some(PendingValue::Node(child));
                let key: StrDeserializer<'de, UnmarshalError> = name.into_deserializer();
                return seed.deserialize(key).map(Some);
            }
        }

        // Then, leniently, zero values for whatever was absent.
        if self.mode == UnmarshalMode::Lenient {
            if !self.missing_started {
                self.missing_started = true;
                self.missing = self
                    .fields
                    .iter()
                    .copied()
                    .filter(|field| !self.seen.iter().any(|name| *name == *field))
                    .collect();
                self.missing.reverse();
            }
            if let Some(field) = self.missing.pop() {
                self.pending = Some(PendingValue::Zero);
                let key: StrDeserializer<'de, UnmarshalError> = field.into_deserializer();
                return seed.deserialize(key).map(Some);
            }
        }

        Ok(None)
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(
        &mut self,
        seed: V,
    ) -> Result<V::Value, Self::Error> {
        match self.pending.take() {
            Some(PendingValue::Node(node)) => seed.deserialize(NodeDeserializer {
                node,
                mode: self.mode,
            }),
            Some(PendingValue::Zero) => seed.deserialize(ZeroDeserializer),
            None => Err(UnmarshalError::Message(
                "value requested before key".to_string(),
            )),
        }
    }
}

// ----------------------------------------------------------------------
// Sequence items from wrapper children
// ----------------------------------------------------------------------

struct ItemSeqAccess<'de> {
    items: std::slice::Iter<'de, TreeNode>,
    mode: UnmarshalMode,
}

impl<'de> SeqAccess<'de> for ItemSeqAccess<'de> {
    type Error = UnmarshalError;

    fn next_element_seed<T: DeserializeSeed<'de>>(
        &mut self,
        seed: T,
    ) -> Result<Option<T::Value>, Self::Error> {
        for item in self.items.by_ref() {
            // Comments do not contribute sequence items.
            if item.is_comment() {
                continue;
            }
            return seed
                .deserialize(NodeDeserializer {
                    node: item,
                    mode: self.mode,
                })
                .map(Some);
        }
        Ok(None)
    }
}

// ----------------------------------------------------------------------
// Zero values for lenient mode
// ----------------------------------------------------------------------

struct ZeroDeserializer;

impl<'de> Deserializer<'de> for ZeroDeserializer {
    type Error = UnmarshalError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_unit()
    }

    fn deserialize_bool<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_bool(false)
    }

    fn deserialize_str<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_str("")
    }

    fn deserialize_string<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_str("")
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_none()
    }

    fn deserialize_unit<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_unit()
    }

    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        visitor.visit_unit()
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_seq(EmptySeqAccess)
    }

    fn deserialize_tuple<V: Visitor<'de>>(
        self,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        const NO_FIELDS: &[&str] = &[];
        visitor.visit_map(ZeroMapAccess {
            fields: NO_FIELDS.iter(),
            key_pending: false,
        })
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        visitor.visit_map(ZeroMapAccess {
            fields: fields.iter(),
            key_pending: false,
        })
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(
        self,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        visitor.visit_unit()
    }

    fn deserialize_i8<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_i64(0)
    }

    fn deserialize_i16<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_i64(0)
    }

    fn deserialize_i32<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_i64(0)
    }

    fn deserialize_i64<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_i64(0)
    }

    fn deserialize_u8<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_u64(0)
    }

    fn deserialize_u16<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_u64(0)
    }

    fn deserialize_u32<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_u64(0)
    }

    fn deserialize_u64<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_u64(0)
    }

    forward_to_deserialize_any! {
        f32 f64 char bytes byte_buf enum identifier
    }
}

struct EmptySeqAccess;

impl<'de> SeqAccess<'de> for EmptySeqAccess {
    type Error = UnmarshalError;

    fn next_element_seed<T: DeserializeSeed<'de>>(
        &mut self,
        _seed: T,
    ) -> Result<Option<T::Value>, Self::Error> {
        Ok(None)
    }

    fn size_hint(&self) -> Option<usize> {
        Some(0)
    }
}

struct ZeroMapAccess {
    fields: std::slice::Iter<'static, &'static str>,
    key_pending: bool,
}

impl<'de> MapAccess<'de> for ZeroMapAccess {
    type Error = UnmarshalError;

    fn next_key_seed<K: DeserializeSeed<'de>>(
        &mut self,
        seed: K,
    ) -> Result<Option<K::Value>, Self::Error> {
        match self.fields.next() {
            Some(field) => {
                self.key_pending = true;
                let key: StrDeserializer<'de, UnmarshalError> = field.into_deserializer();
                seed.deserialize(key).map(Some)
            }
            None => Ok(None),
        }
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(
        &mut self,
        seed: V,
    ) -> Result<V::Value, Self::Error> {
        if !self.key_pending {
            return Err(UnmarshalError::Message(
                "value requested before key".to_string(),
            ));
        }
        self.key_pending = false;
        seed.deserialize(ZeroDeserializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Pair {
        a: String,
        b: i32,
    }

    #[test]
    fn strict_requires_every_field() {
        let err = from_str::<Pair>("#a x", UnmarshalMode::Strict).expect_err("should fail");
        assert!(err.to_string().contains("missing field"));
    }

    #[test]
    fn lenient_zeroes_missing_fields() {
        let pair: Pair = from_str("#a x", UnmarshalMode::Lenient).expect("unmarshal failed");
        assert_eq!(
            pair,
            Pair {
                a: "x".to_string(),
                b: 0
            }
        );
    }

    #[test]
    fn unknown_elements_are_ignored() {
        let pair: Pair =
            from_str("#a x #b 1 #extra y", UnmarshalMode::Strict).expect("unmarshal failed");
        assert_eq!(pair.b, 1);
    }
}
