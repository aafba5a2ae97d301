//! Linear relation - `tgt = a + b·src`
//!
//! Direction follows authority: an anchored (observed or consensus) side
//! drives the other. When both or neither side is anchored the source
//! drives. Solving for the source needs `b != 0`.

use suss_core::{Annotations, Value};
use suss_state::{LinkRelation, Node, Relation, RelationDescriptor, RelationError, RelationOutput};

use crate::StandardRelation;

/// Descriptor name
pub const LINEAR: &str = "linear";

/// Read the number a relation works on
pub(crate) fn number(node: &Node, side: &str) -> Result<f64, RelationError> {
    node.value
        .as_number()
        .ok_or_else(|| RelationError::NonNumeric(format!("{side} value {:?}", node.value)))
}

/// Write `n` into the shape of `like`, or a plain `value` atom
pub(crate) fn reshape(like: &Value, n: f64) -> Value {
    like.with_number(n).unwrap_or_else(|| Value::number("value", n))
}

/// `y = a + b·x`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Linear {
    /// Intercept
    pub a: f64,
    /// Slope
    pub b: f64,
}

impl Linear {
    pub fn new(a: f64, b: f64) -> Self {
        Linear { a, b }
    }

    /// Celsius to Fahrenheit
    pub fn celsius_to_fahrenheit() -> Self {
        Linear::new(32.0, 1.8)
    }

    #[inline]
    pub fn forward(&self, x: f64) -> f64 {
        self.a + self.b * x
    }

    pub fn inverse(&self, y: f64) -> Result<f64, RelationError> {
        if self.b == 0.0 {
            return Err(RelationError::Singular(format!(
                "cannot invert y = {} + 0x",
                self.a
            )));
        }
        Ok((y - self.a) / self.b)
    }
}

impl LinkRelation for Linear {
    fn apply(
        &self,
        src: &Node,
        tgt: &Node,
        _args: &[Value],
        meta: &Annotations,
    ) -> Result<RelationOutput, RelationError> {
        let src_anchor = src.lineage.is_anchor();
        let tgt_anchor = tgt.lineage.is_anchor();

        if tgt_anchor && !src_anchor {
            let y = number(tgt, "target")?;
            let x = self.inverse(y)?;
            return Ok(RelationOutput::new(
                reshape(&src.value, x),
                tgt.value.clone(),
                meta.clone(),
            ));
        }

        let x = number(src, "source")?;
        Ok(RelationOutput::new(
            src.value.clone(),
            reshape(&tgt.value, self.forward(x)),
            meta.clone(),
        ))
    }
}

impl StandardRelation for Linear {
    fn descriptor(&self) -> RelationDescriptor {
        RelationDescriptor::link(LINEAR)
            .with_param("a", self.a)
            .with_param("b", self.b)
    }

    fn into_relation(self) -> Relation {
        Relation::link(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use suss_core::{Lineage, Timestamp};

    fn node(x: f64, lineage: Lineage) -> Node {
        Node::new(Value::number("temp", x), Timestamp::ZERO, lineage)
    }

    #[test]
    fn test_forward_from_anchor() {
        let out = Linear::celsius_to_fahrenheit()
            .apply(
                &node(25.0, Lineage::Observed),
                &node(0.0, Lineage::Derived),
                &[],
                &Annotations::new(),
            )
            .unwrap();
        assert_eq!(out.tgt, Value::number("temp", 77.0));
        assert_eq!(out.src, Value::number("temp", 25.0));
    }

    #[test]
    fn test_inverse_when_target_anchored() {
        let out = Linear::celsius_to_fahrenheit()
            .apply(
                &node(0.0, Lineage::Derived),
                &node(212.0, Lineage::Consensus),
                &[],
                &Annotations::new(),
            )
            .unwrap();
        assert!((out.src.as_number().unwrap() - 100.0).abs() < 1e-9);
        assert_eq!(out.tgt.as_number(), Some(212.0));
    }

    #[test]
    fn test_singular_inverse() {
        let err = Linear::new(5.0, 0.0)
            .apply(
                &node(0.0, Lineage::Derived),
                &node(1.0, Lineage::Observed),
                &[],
                &Annotations::new(),
            )
            .unwrap_err();
        assert!(matches!(err, RelationError::Singular(_)));
    }

    #[test]
    fn test_non_numeric_source() {
        let src = Node::observed(Value::text("temp", "warm"), Timestamp::ZERO);
        let err = Linear::new(0.0, 1.0)
            .apply(&src, &node(0.0, Lineage::Derived), &[], &Annotations::new())
            .unwrap_err();
        assert!(matches!(err, RelationError::NonNumeric(_)));
    }

    #[test]
    fn test_reshape_falls_back_to_plain_atom() {
        assert_eq!(reshape(&Value::text("t", "x"), 3.0), Value::number("value", 3.0));
    }

    #[test]
    fn test_descriptor() {
        let d = Linear::new(32.0, 1.8).descriptor();
        assert_eq!(d.name, LINEAR);
        assert_eq!(d.param_f64("a"), Some(32.0));
        assert_eq!(d.param_f64("b"), Some(1.8));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_inverse_undoes_forward(
                a in -100.0f64..100.0,
                b in prop_oneof![-10.0f64..-0.1, 0.1f64..10.0],
                x in -1000.0f64..1000.0,
            ) {
                let linear = Linear::new(a, b);
                let back = linear.inverse(linear.forward(x)).unwrap();
                prop_assert!((back - x).abs() < 1e-6);
            }
        }
    }
}
