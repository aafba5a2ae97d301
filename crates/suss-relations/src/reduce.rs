//! Reduce relation - fold the source into an accumulating target
//!
//! Each execution folds the current source value into the target. The
//! fold is directional: the source is never rewritten. A target holding a
//! null literal starts from the initial value.

use std::fmt;
use std::sync::Arc;

use suss_core::{Annotations, Literal, Value};
use suss_state::{LinkRelation, Node, Relation, RelationDescriptor, RelationError, RelationOutput};

use crate::linear::number;
use crate::StandardRelation;

/// Descriptor name
pub const REDUCE: &str = "reduce";

type ReduceFn = Arc<dyn Fn(&Value, &Value) -> Result<Value, RelationError> + Send + Sync>;

/// Fold step
#[derive(Clone)]
pub enum Reducer {
    /// Numeric sum, tagged `sum`
    Sum,
    /// Number of folds, tagged `count`
    Count,
    /// Caller-supplied `(accumulator, value) -> accumulator`
    Custom(ReduceFn),
}

impl Reducer {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&Value, &Value) -> Result<Value, RelationError> + Send + Sync + 'static,
    {
        Reducer::Custom(Arc::new(f))
    }

    /// Descriptor name of a built-in reducer
    pub fn name(&self) -> Option<&'static str> {
        match self {
            Reducer::Sum => Some("sum"),
            Reducer::Count => Some("count"),
            Reducer::Custom(_) => None,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "sum" => Some(Reducer::Sum),
            "count" => Some(Reducer::Count),
            _ => None,
        }
    }

    fn step(&self, acc: &Value, value: &Value) -> Result<Value, RelationError> {
        let acc_n = || {
            acc.as_number()
                .ok_or_else(|| RelationError::NonNumeric(format!("accumulator {acc:?}")))
        };
        match self {
            Reducer::Sum => {
                let v = value
                    .as_number()
                    .ok_or_else(|| RelationError::NonNumeric(format!("source {value:?}")))?;
                Ok(Value::number("sum", acc_n()? + v))
            }
            Reducer::Count => Ok(Value::number("count", acc_n()? + 1.0)),
            Reducer::Custom(f) => f(acc, value),
        }
    }
}

impl fmt::Debug for Reducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => f.write_str("custom"),
        }
    }
}

/// Accumulating relation
#[derive(Clone, Debug)]
pub struct Reduce {
    pub reducer: Reducer,
    pub initial: Value,
}

impl Reduce {
    pub fn new(reducer: Reducer, initial: Value) -> Self {
        Reduce { reducer, initial }
    }

    pub fn sum() -> Self {
        Reduce::new(Reducer::Sum, Value::number("sum", 0.0))
    }

    pub fn count() -> Self {
        Reduce::new(Reducer::Count, Value::number("count", 0.0))
    }
}

impl LinkRelation for Reduce {
    fn apply(
        &self,
        src: &Node,
        tgt: &Node,
        _args: &[Value],
        meta: &Annotations,
    ) -> Result<RelationOutput, RelationError> {
        let acc = match tgt.value.literal() {
            Some(Literal::Null) => &self.initial,
            _ => &tgt.value,
        };
        let next = self.reducer.step(acc, &src.value)?;
        Ok(RelationOutput::new(src.value.clone(), next, meta.clone()))
    }
}

impl StandardRelation for Reduce {
    fn descriptor(&self) -> RelationDescriptor {
        let descriptor = RelationDescriptor::link(REDUCE);
        let descriptor = match self.reducer.name() {
            Some(name) => descriptor.with_param("reducer", name),
            None => descriptor,
        };
        match self.initial.as_number() {
            Some(n) => descriptor.with_param("initial", n),
            None => descriptor,
        }
    }

    fn into_relation(self) -> Relation {
        Relation::link(self)
    }
}

/// Sum of the numbers in `values`, failing on the first non-numeric one
pub fn sum_values<'a>(values: impl IntoIterator<Item = &'a Node>) -> Result<f64, RelationError> {
    values
        .into_iter()
        .map(|node| number(node, "source"))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use suss_core::Timestamp;

    fn node(value: Value) -> Node {
        Node::derived(value, Timestamp::ZERO)
    }

    #[test]
    fn test_sum_accumulates() {
        let out = Reduce::sum()
            .apply(
                &node(Value::number("n", 4.0)),
                &node(Value::number("sum", 10.0)),
                &[],
                &Annotations::new(),
            )
            .unwrap();
        assert_eq!(out.tgt, Value::number("sum", 14.0));
        assert_eq!(out.src, Value::number("n", 4.0));
    }

    #[test]
    fn test_null_target_starts_from_initial() {
        let out = Reduce::count()
            .apply(
                &node(Value::text("event", "click")),
                &node(Value::atom("count", Literal::Null)),
                &[],
                &Annotations::new(),
            )
            .unwrap();
        assert_eq!(out.tgt, Value::number("count", 1.0));
    }

    #[test]
    fn test_custom_reducer() {
        let longest = Reduce::new(
            Reducer::custom(|acc, v| {
                let len = |x: &Value| x.literal().and_then(Literal::as_str).map_or(0, str::len);
                Ok(if len(v) > len(acc) { v.clone() } else { acc.clone() })
            }),
            Value::text("w", ""),
        );
        let out = longest
            .apply(
                &node(Value::text("w", "propagate")),
                &node(Value::text("w", "sway")),
                &[],
                &Annotations::new(),
            )
            .unwrap();
        assert_eq!(out.tgt, Value::text("w", "propagate"));
        assert_eq!(longest.descriptor().params.get("reducer"), None);
    }

    #[test]
    fn test_sum_rejects_text() {
        let err = Reduce::sum()
            .apply(
                &node(Value::text("n", "x")),
                &node(Value::number("sum", 0.0)),
                &[],
                &Annotations::new(),
            )
            .unwrap_err();
        assert!(matches!(err, RelationError::NonNumeric(_)));
    }

    #[test]
    fn test_sum_values() {
        let nodes = [node(Value::number("a", 1.5)), node(Value::number("b", 2.5))];
        assert_eq!(sum_values(&nodes).unwrap(), 4.0);
        assert!(sum_values(&[node(Value::text("c", "x"))]).is_err());
    }

    #[test]
    fn test_reducer_names() {
        assert!(matches!(Reducer::from_name("sum"), Some(Reducer::Sum)));
        assert!(Reducer::from_name("median").is_none());
        assert_eq!(format!("{:?}", Reducer::Count), "count");
    }
}
