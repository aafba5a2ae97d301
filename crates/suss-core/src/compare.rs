//! Structural value comparison
//!
//! Values are compared through a canonical serialization:
//! - associative keys and literal maps are emitted in ascending key order
//! - lists are canonicalized element-wise, keeping their order
//! - every shape carries a discriminator, so `[1]` as a value list never
//!   collides with `[1]` as a literal list
//!
//! The canonical string is the value's hash. Equality is hash equality, so
//! two values are equal regardless of field order or construction path.

use std::cmp::Ordering;
use std::fmt::Write;

use crate::{Entry, Fields, Literal, Value};

/// Canonical form of a value
pub fn canonicalize(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

/// Canonical serialization used as the structural hash of a value
#[inline]
pub fn hash_value(value: &Value) -> String {
    canonicalize(value)
}

/// Structural equality: `hash_value(a) == hash_value(b)`
pub fn values_equal(a: &Value, b: &Value) -> bool {
    // Same address is trivially equal; skip the serialization
    std::ptr::eq(a, b) || canonicalize(a) == canonicalize(b)
}

/// Canonical form of a literal
pub fn canonicalize_literal(literal: &Literal) -> String {
    let mut out = String::new();
    write_literal(&mut out, literal);
    out
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Atomic {
            tag,
            literal,
            annotations,
        } => {
            out.push_str("A(");
            let _ = write!(out, "{tag:?}");
            out.push(',');
            write_literal(out, literal);
            out.push(',');
            write_fields(out, annotations);
            out.push(')');
        }
        Value::Associative {
            entries,
            annotations,
        } => {
            out.push_str("S({");
            let mut keys: Vec<&String> = entries.keys().collect();
            keys.sort();
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                let _ = write!(out, "{key:?}:");
                match &entries[key.as_str()] {
                    Entry::One(v) => write_value(out, v),
                    Entry::Many(vs) => {
                        out.push_str("V[");
                        for (j, v) in vs.iter().enumerate() {
                            if j > 0 {
                                out.push(',');
                            }
                            write_value(out, v);
                        }
                        out.push(']');
                    }
                }
            }
            out.push_str("},");
            write_fields(out, annotations);
            out.push(')');
        }
    }
}

fn write_literal(out: &mut String, literal: &Literal) {
    match literal {
        Literal::Null => out.push('n'),
        Literal::Bool(b) => {
            let _ = write!(out, "b:{b}");
        }
        Literal::Number(n) => {
            let _ = write!(out, "f:{:?}", normalize(*n));
        }
        Literal::Text(s) => {
            let _ = write!(out, "t:{s:?}");
        }
        Literal::List(items) => {
            out.push_str("l[");
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_literal(out, item);
            }
            out.push(']');
        }
        Literal::Map(fields) => {
            out.push('m');
            write_fields(out, fields);
        }
    }
}

fn write_fields(out: &mut String, fields: &Fields) {
    let mut keys: Vec<&String> = fields.keys().collect();
    keys.sort();
    out.push('{');
    for (i, key) in keys.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        let _ = write!(out, "{key:?}:");
        write_literal(out, &fields[key.as_str()]);
    }
    out.push('}');
}

/// `-0.0` and `0.0` are the same number
#[inline]
fn normalize(n: f64) -> f64 {
    if n == 0.0 {
        0.0
    } else {
        n
    }
}

/// Fixed total order over values.
///
/// Atomic values sort before associative ones. Atomic values order by tag,
/// then by literal (numbers numerically), then by annotations. Associative
/// values order by canonical form.
pub fn canonical_cmp(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (
            Value::Atomic {
                tag: ta,
                literal: la,
                annotations: aa,
            },
            Value::Atomic {
                tag: tb,
                literal: lb,
                annotations: ab,
            },
        ) => ta
            .cmp(tb)
            .then_with(|| literal_cmp(la, lb))
            .then_with(|| fields_canonical(aa).cmp(&fields_canonical(ab))),
        (Value::Atomic { .. }, Value::Associative { .. }) => Ordering::Less,
        (Value::Associative { .. }, Value::Atomic { .. }) => Ordering::Greater,
        _ => canonicalize(a).cmp(&canonicalize(b)),
    }
}

/// Fixed total order over literals: null < bool < number < text < list < map
pub fn literal_cmp(a: &Literal, b: &Literal) -> Ordering {
    fn rank(l: &Literal) -> u8 {
        match l {
            Literal::Null => 0,
            Literal::Bool(_) => 1,
            Literal::Number(_) => 2,
            Literal::Text(_) => 3,
            Literal::List(_) => 4,
            Literal::Map(_) => 5,
        }
    }

    match (a, b) {
        (Literal::Bool(x), Literal::Bool(y)) => x.cmp(y),
        (Literal::Number(x), Literal::Number(y)) => normalize(*x).total_cmp(&normalize(*y)),
        (Literal::Text(x), Literal::Text(y)) => x.cmp(y),
        (Literal::List(xs), Literal::List(ys)) => xs
            .iter()
            .zip(ys)
            .map(|(x, y)| literal_cmp(x, y))
            .find(|o| o.is_ne())
            .unwrap_or_else(|| xs.len().cmp(&ys.len())),
        (Literal::Map(x), Literal::Map(y)) => fields_canonical(x).cmp(&fields_canonical(y)),
        _ => rank(a).cmp(&rank(b)),
    }
}

fn fields_canonical(fields: &Fields) -> String {
    let mut out = String::new();
    write_fields(&mut out, fields);
    out
}
