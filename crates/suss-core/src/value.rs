//! Value definitions
//!
//! A value is any serializable datum carried by a node, a pulse, or an
//! accumulator. It is a closed two-shape sum:
//! - Atomic: a tagged literal with annotations `(Tag, Literal, Annotations)`
//! - Associative: a map of tags to values or value lists, with annotations
//!
//! Equality is structural (see [`crate::compare`]), never identity: two values
//! built in different key orders are the same value.

use std::fmt;
use std::hash::{Hash, Hasher};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::compare::{hash_value, values_equal};

/// Semantic label for a value, used for dispatch and grouping
pub type Tag = String;

/// Ordered string-keyed literal map
pub type Fields = IndexMap<String, Literal>;

/// Metadata attached to values, nodes, links and networks
pub type Annotations = Fields;

/// Plain serializable datum
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<Literal>),
    Map(Fields),
}

impl Literal {
    #[inline]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Literal::Number(n) => Some(*n),
            _ => None,
        }
    }

    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Literal::Text(s) => Some(s),
            _ => None,
        }
    }

    #[inline]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Literal::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Literal::Null)
    }
}

impl From<f64> for Literal {
    fn from(n: f64) -> Self {
        Literal::Number(n)
    }
}

impl From<i64> for Literal {
    fn from(n: i64) -> Self {
        Literal::Number(n as f64)
    }
}

impl From<i32> for Literal {
    fn from(n: i32) -> Self {
        Literal::Number(n as f64)
    }
}

impl From<bool> for Literal {
    fn from(b: bool) -> Self {
        Literal::Bool(b)
    }
}

impl From<&str> for Literal {
    fn from(s: &str) -> Self {
        Literal::Text(s.to_owned())
    }
}

impl From<String> for Literal {
    fn from(s: String) -> Self {
        Literal::Text(s)
    }
}

impl From<Vec<Literal>> for Literal {
    fn from(items: Vec<Literal>) -> Self {
        Literal::List(items)
    }
}

impl From<Fields> for Literal {
    fn from(fields: Fields) -> Self {
        Literal::Map(fields)
    }
}

/// Entry of an associative value: one value or an ordered list of values
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Entry {
    Many(Vec<Value>),
    One(Value),
}

impl Entry {
    /// Values held by this entry, in order
    pub fn values(&self) -> &[Value] {
        match self {
            Entry::One(v) => std::slice::from_ref(v),
            Entry::Many(vs) => vs,
        }
    }
}

impl From<Value> for Entry {
    fn from(v: Value) -> Self {
        Entry::One(v)
    }
}

impl From<Vec<Value>> for Entry {
    fn from(vs: Vec<Value>) -> Self {
        Entry::Many(vs)
    }
}

/// A node, pulse or accumulator value
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    /// Tagged literal with annotations
    Atomic {
        tag: Tag,
        literal: Literal,
        #[serde(default)]
        annotations: Annotations,
    },
    /// Associative structure with annotations
    Associative {
        entries: IndexMap<Tag, Entry>,
        #[serde(default)]
        annotations: Annotations,
    },
}

impl Value {
    /// Create an atomic value without annotations
    pub fn atom(tag: impl Into<Tag>, literal: impl Into<Literal>) -> Self {
        Value::Atomic {
            tag: tag.into(),
            literal: literal.into(),
            annotations: Annotations::new(),
        }
    }

    /// Create an atomic numeric value
    pub fn number(tag: impl Into<Tag>, n: f64) -> Self {
        Value::atom(tag, Literal::Number(n))
    }

    /// Create an atomic text value
    pub fn text(tag: impl Into<Tag>, s: impl Into<String>) -> Self {
        Value::atom(tag, Literal::Text(s.into()))
    }

    /// Create an associative value from `(tag, entry)` pairs, keeping their order
    pub fn assoc<K, E>(entries: impl IntoIterator<Item = (K, E)>) -> Self
    where
        K: Into<Tag>,
        E: Into<Entry>,
    {
        Value::Associative {
            entries: entries
                .into_iter()
                .map(|(k, e)| (k.into(), e.into()))
                .collect(),
            annotations: Annotations::new(),
        }
    }

    /// Attach an annotation, replacing any previous value under the same key
    pub fn with_annotation(mut self, key: impl Into<String>, literal: impl Into<Literal>) -> Self {
        self.annotations_mut().insert(key.into(), literal.into());
        self
    }

    #[inline]
    pub fn is_atomic(&self) -> bool {
        matches!(self, Value::Atomic { .. })
    }

    /// Tag of an atomic value
    pub fn tag(&self) -> Option<&str> {
        match self {
            Value::Atomic { tag, .. } => Some(tag),
            Value::Associative { .. } => None,
        }
    }

    /// Literal of an atomic value
    pub fn literal(&self) -> Option<&Literal> {
        match self {
            Value::Atomic { literal, .. } => Some(literal),
            Value::Associative { .. } => None,
        }
    }

    /// Entry of an associative value
    pub fn entry(&self, tag: &str) -> Option<&Entry> {
        match self {
            Value::Atomic { .. } => None,
            Value::Associative { entries, .. } => entries.get(tag),
        }
    }

    pub fn annotations(&self) -> &Annotations {
        match self {
            Value::Atomic { annotations, .. } | Value::Associative { annotations, .. } => {
                annotations
            }
        }
    }

    pub fn annotations_mut(&mut self) -> &mut Annotations {
        match self {
            Value::Atomic { annotations, .. } | Value::Associative { annotations, .. } => {
                annotations
            }
        }
    }

    /// Extract a number: the literal of a numeric atom, or the first numeric
    /// value found in an associative structure (entry order, depth first)
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Atomic { literal, .. } => literal.as_f64(),
            Value::Associative { entries, .. } => entries
                .values()
                .flat_map(|e| e.values())
                .find_map(Value::as_number),
        }
    }

    /// Replace the first numeric literal reachable by [`Value::as_number`],
    /// keeping the surrounding shape, tags and annotations.
    /// Returns `None` when the value holds no number.
    pub fn with_number(&self, n: f64) -> Option<Value> {
        match self {
            Value::Atomic {
                tag,
                literal: Literal::Number(_),
                annotations,
            } => Some(Value::Atomic {
                tag: tag.clone(),
                literal: Literal::Number(n),
                annotations: annotations.clone(),
            }),
            Value::Atomic { .. } => None,
            Value::Associative {
                entries,
                annotations,
            } => {
                let mut entries = entries.clone();
                for entry in entries.values_mut() {
                    let replaced = match entry {
                        Entry::One(v) => v.with_number(n).map(|nv| *v = nv).is_some(),
                        Entry::Many(vs) => vs
                            .iter_mut()
                            .find_map(|v| v.with_number(n).map(|nv| *v = nv))
                            .is_some(),
                    };
                    if replaced {
                        return Some(Value::Associative {
                            entries,
                            annotations: annotations.clone(),
                        });
                    }
                }
                None
            }
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        values_equal(self, other)
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        hash_value(self).hash(state);
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Atomic {
                tag,
                literal,
                annotations,
            } => {
                write!(f, "[{tag:?}, {literal:?}")?;
                if !annotations.is_empty() {
                    write!(f, ", {annotations:?}")?;
                }
                write!(f, "]")
            }
            Value::Associative {
                entries,
                annotations,
            } => {
                write!(f, "{entries:?}")?;
                if !annotations.is_empty() {
                    write!(f, " @ {annotations:?}")?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_as_number_atomic() {
        assert_eq!(Value::number("celsius", 25.0).as_number(), Some(25.0));
        assert_eq!(Value::text("name", "x").as_number(), None);
    }

    #[test]
    fn test_as_number_associative() {
        let v = Value::assoc([
            ("label", Entry::One(Value::text("name", "probe"))),
            (
                "temperature",
                Entry::Many(vec![Value::number("celsius", 25.0)]),
            ),
        ]);
        assert_eq!(v.as_number(), Some(25.0));
    }

    #[test]
    fn test_with_number_keeps_shape() {
        let v = Value::number("fahrenheit", 0.0).with_annotation("unit", "F");
        let updated = v.with_number(77.0).unwrap();
        assert_eq!(updated.tag(), Some("fahrenheit"));
        assert_eq!(updated.as_number(), Some(77.0));
        assert_eq!(updated.annotations().get("unit"), Some(&Literal::from("F")));
    }

    #[test]
    fn test_with_number_nested() {
        let v = Value::assoc([(
            "temperature",
            Entry::Many(vec![Value::number("celsius", 25.0)]),
        )]);
        let updated = v.with_number(30.0).unwrap();
        assert_eq!(updated.as_number(), Some(30.0));
        assert!(Value::text("t", "x").with_number(1.0).is_none());
    }

    #[test]
    fn test_serde_roundtrip_preserves_order() {
        let v = Value::assoc([
            ("b", Entry::One(Value::number("n", 1.0))),
            ("a", Entry::One(Value::number("n", 2.0))),
        ]);
        let json = serde_json::to_string(&v).unwrap();
        assert!(json.find("\"b\"").unwrap() < json.find("\"a\"").unwrap());
        let back: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v);
    }
}
