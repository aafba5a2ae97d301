//! Constrain relation - keep `f(src, tgt, args) == 0`
//!
//! The check returns a residual. A residual within [`TOLERANCE`] leaves
//! both values alone. Otherwise the repair function receives the residual
//! and proposes new values; without one the relation fails with
//! [`RelationError::Unsatisfiable`] so the violation shows up in the logs.

use std::sync::Arc;

use suss_core::{Annotations, Value};
use suss_state::{LinkRelation, Node, RelationError, RelationOutput};

/// Residual magnitude treated as satisfied
pub const TOLERANCE: f64 = 1e-10;

type CheckFn = Arc<dyn Fn(&Value, &Value, &[Value]) -> Result<f64, RelationError> + Send + Sync>;
type RepairFn = Arc<dyn Fn(&Node, &Node, &[Value], f64) -> Result<(Value, Value), RelationError> + Send + Sync>;

#[derive(Clone)]
pub struct Constrain {
    check: CheckFn,
    repair: Option<RepairFn>,
}

impl Constrain {
    pub fn new<C>(check: C) -> Self
    where
        C: Fn(&Value, &Value, &[Value]) -> Result<f64, RelationError> + Send + Sync + 'static,
    {
        Constrain {
            check: Arc::new(check),
            repair: None,
        }
    }

    /// Repair receives both nodes, so it can leave anchored sides alone
    pub fn with_repair<R>(mut self, repair: R) -> Self
    where
        R: Fn(&Node, &Node, &[Value], f64) -> Result<(Value, Value), RelationError>
            + Send
            + Sync
            + 'static,
    {
        self.repair = Some(Arc::new(repair));
        self
    }

    /// `tgt == k·src`, with `k` read from the first link arg (default 1).
    /// The non-anchored side is repaired.
    pub fn proportional() -> Self {
        fn factor(args: &[Value]) -> f64 {
            args.first().and_then(Value::as_number).unwrap_or(1.0)
        }
        let nums = |s: &Value, t: &Value| -> Result<(f64, f64), RelationError> {
            let s = s
                .as_number()
                .ok_or_else(|| RelationError::NonNumeric(format!("source {s:?}")))?;
            let t = t
                .as_number()
                .ok_or_else(|| RelationError::NonNumeric(format!("target {t:?}")))?;
            Ok((s, t))
        };

        Constrain::new(move |s, t, args| {
            let (s, t) = nums(s, t)?;
            Ok(t - factor(args) * s)
        })
        .with_repair(move |src, tgt, args, _residual| {
            let k = factor(args);
            let (s, t) = nums(&src.value, &tgt.value)?;
            if tgt.lineage.is_anchor() && !src.lineage.is_anchor() {
                if k == 0.0 {
                    return Err(RelationError::Singular("factor is zero".into()));
                }
                return Ok((crate::linear::reshape(&src.value, t / k), tgt.value.clone()));
            }
            Ok((src.value.clone(), crate::linear::reshape(&tgt.value, k * s)))
        })
    }
}

impl LinkRelation for Constrain {
    fn apply(
        &self,
        src: &Node,
        tgt: &Node,
        args: &[Value],
        meta: &Annotations,
    ) -> Result<RelationOutput, RelationError> {
        let residual = (self.check)(&src.value, &tgt.value, args)?;
        if residual.abs() < TOLERANCE {
            return Ok(RelationOutput::new(src.value.clone(), tgt.value.clone(), meta.clone()));
        }
        match &self.repair {
            Some(repair) => {
                let (s, t) = repair(src, tgt, args, residual)?;
                Ok(RelationOutput::new(s, t, meta.clone()))
            }
            None => Err(RelationError::Unsatisfiable(format!("residual {residual}"))),
        }
    }
}
