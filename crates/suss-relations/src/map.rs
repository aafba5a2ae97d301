//! Value-shaping relations: map, join, mark

use std::sync::Arc;

use suss_core::{values_equal, Annotations, Value};
use suss_state::{LinkRelation, Node, Relation, RelationDescriptor, RelationError, RelationOutput};

use crate::StandardRelation;

/// Descriptor name of [`Mark`]
pub const MARK: &str = "mark";

type Transform = Arc<dyn Fn(&Value) -> Value + Send + Sync>;
type Resolve = Arc<dyn Fn(&Value, &Value) -> (Value, Value) + Send + Sync>;

/// Bidirectional transform.
///
/// The more recent side drives: a newer source runs `forward`, a newer
/// target runs `backward`. With equal timestamps the target is brought in
/// line with `forward(src)`.
#[derive(Clone)]
pub struct Map {
    forward: Transform,
    backward: Transform,
    resolver: Option<Resolve>,
}

impl Map {
    pub fn new<F, B>(forward: F, backward: B) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
        B: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        Map {
            forward: Arc::new(forward),
            backward: Arc::new(backward),
            resolver: None,
        }
    }

    /// Settle a tie: equal timestamps with an inconsistent target
    pub fn with_resolver<R>(mut self, resolver: R) -> Self
    where
        R: Fn(&Value, &Value) -> (Value, Value) + Send + Sync + 'static,
    {
        self.resolver = Some(Arc::new(resolver));
        self
    }
}

impl LinkRelation for Map {
    fn apply(
        &self,
        src: &Node,
        tgt: &Node,
        _args: &[Value],
        meta: &Annotations,
    ) -> Result<RelationOutput, RelationError> {
        let (s, t) = if src.as_of > tgt.as_of {
            (src.value.clone(), (self.forward)(&src.value))
        } else if tgt.as_of > src.as_of {
            ((self.backward)(&tgt.value), tgt.value.clone())
        } else {
            let expected = (self.forward)(&src.value);
            if values_equal(&expected, &tgt.value) {
                (src.value.clone(), tgt.value.clone())
            } else if let Some(resolve) = &self.resolver {
                resolve(&src.value, &tgt.value)
            } else {
                (src.value.clone(), expected)
            }
        };
        Ok(RelationOutput::new(s, t, meta.clone()))
    }
}

type KeyFn = Arc<dyn Fn(&Value) -> Option<String> + Send + Sync>;
type JoinFn = Arc<dyn Fn(&Value, &Value, &str) -> (Value, Value) + Send + Sync>;

/// Key-matched propagation.
///
/// Without a join function the source value is copied onto the target when
/// both carry the same key. A value without a key never matches.
#[derive(Clone)]
pub struct Join {
    key: KeyFn,
    join: Option<JoinFn>,
}

impl Join {
    pub fn new<K>(key: K) -> Self
    where
        K: Fn(&Value) -> Option<String> + Send + Sync + 'static,
    {
        Join {
            key: Arc::new(key),
            join: None,
        }
    }

    /// Join on an annotation of both values
    pub fn on_annotation(name: impl Into<String>) -> Self {
        let name = name.into();
        Join::new(move |v| {
            v.annotations()
                .get(&name)
                .map(|l| l.as_str().map_or_else(|| format!("{l:?}"), str::to_owned))
        })
    }

    pub fn with_join<J>(mut self, join: J) -> Self
    where
        J: Fn(&Value, &Value, &str) -> (Value, Value) + Send + Sync + 'static,
    {
        self.join = Some(Arc::new(join));
        self
    }
}

impl LinkRelation for Join {
    fn apply(
        &self,
        src: &Node,
        tgt: &Node,
        _args: &[Value],
        meta: &Annotations,
    ) -> Result<RelationOutput, RelationError> {
        let unchanged = || RelationOutput::new(src.value.clone(), tgt.value.clone(), meta.clone());
        let Some(key) = (self.key)(&src.value) else {
            return Ok(unchanged());
        };

        if let Some(join) = &self.join {
            let (s, t) = join(&src.value, &tgt.value, &key);
            return Ok(RelationOutput::new(s, t, meta.clone()));
        }

        if (self.key)(&tgt.value).as_deref() == Some(key.as_str()) {
            Ok(RelationOutput::new(src.value.clone(), src.value.clone(), meta.clone()))
        } else {
            Ok(unchanged())
        }
    }
}

/// Copies the source value onto the target
#[derive(Clone, Copy, Debug, Default)]
pub struct Mark;

impl LinkRelation for Mark {
    fn apply(
        &self,
        src: &Node,
        _tgt: &Node,
        _args: &[Value],
        meta: &Annotations,
    ) -> Result<RelationOutput, RelationError> {
        Ok(RelationOutput::new(src.value.clone(), src.value.clone(), meta.clone()))
    }
}

impl StandardRelation for Mark {
    fn descriptor(&self) -> RelationDescriptor {
        RelationDescriptor::link(MARK)
    }

    fn into_relation(self) -> Relation {
        Relation::link(self)
    }
}
