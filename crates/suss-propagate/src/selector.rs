//! Selectors - `type:pattern` addressing
//!
//! - `node:celsius` exact id
//! - `node:sensor:*` wildcard prefix
//! - `node:meta.unit` nodes carrying a metadata key
//! - `node:unit="C"` nodes whose metadata key equals a value
//! - `node:celsius:{{id}}` template pattern
//!
//! `link:` patterns match link labels (or link metadata) and `rel:` patterns
//! match relation ids (or descriptor params). A selector without a known type
//! prefix is a node selector over the whole string.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use suss_core::{Annotations, Literal, NodeId, RelationId, SussError, SussResult};
use suss_state::{Link, Network, Node, NodeResolver};

use crate::{has_template_vars, Template};

/// What a selector addresses
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SelectorKind {
    Node,
    Link,
    Rel,
}

impl SelectorKind {
    pub fn prefix(self) -> &'static str {
        match self {
            SelectorKind::Node => "node",
            SelectorKind::Link => "link",
            SelectorKind::Rel => "rel",
        }
    }

    fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "node" => Some(SelectorKind::Node),
            "link" => Some(SelectorKind::Link),
            "rel" => Some(SelectorKind::Rel),
            _ => None,
        }
    }
}

/// Pattern half of a selector
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Pattern {
    Exact(String),
    /// Trailing `*`; holds the text before it
    Prefix(String),
    /// `meta.key`
    MetaKey(String),
    /// `key="value"`
    MetaEq { key: String, value: String },
    Template(Template),
}

impl Pattern {
    fn parse(raw: &str) -> SussResult<Self> {
        if raw.is_empty() {
            return Err(SussError::InvalidSelector("empty pattern".into()));
        }
        if has_template_vars(raw) {
            return Template::parse(raw).map(Pattern::Template);
        }
        if let Some(prefix) = raw.strip_suffix('*') {
            return Ok(Pattern::Prefix(prefix.to_owned()));
        }
        if let Some(key) = raw.strip_prefix("meta.") {
            if key.is_empty() {
                return Err(SussError::InvalidSelector(raw.to_owned()));
            }
            return Ok(Pattern::MetaKey(key.to_owned()));
        }
        if let Some((key, value)) = raw.split_once('=') {
            let key = key.trim();
            if key.is_empty() {
                return Err(SussError::InvalidSelector(raw.to_owned()));
            }
            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or(value);
            return Ok(Pattern::MetaEq {
                key: key.to_owned(),
                value: value.to_owned(),
            });
        }
        Ok(Pattern::Exact(raw.to_owned()))
    }

    /// Match an id together with the metadata of the record it names
    pub fn matches(&self, id: &str, meta: &Annotations) -> bool {
        match self {
            Pattern::Exact(exact) => id == exact,
            Pattern::Prefix(prefix) => id.starts_with(prefix.as_str()),
            Pattern::MetaKey(key) => meta.contains_key(key),
            Pattern::MetaEq { key, value } => meta.get(key).is_some_and(|l| literal_matches(l, value)),
            Pattern::Template(template) => template.captures(id).is_some(),
        }
    }

    /// Whether the pattern can only ever match a single id
    #[inline]
    pub fn is_exact(&self) -> bool {
        matches!(self, Pattern::Exact(_))
    }
}

fn literal_matches(literal: &Literal, expected: &str) -> bool {
    match literal {
        Literal::Text(s) => s == expected,
        Literal::Number(n) => expected.parse::<f64>().is_ok_and(|e| e == *n),
        Literal::Bool(b) => expected.parse::<bool>().is_ok_and(|e| e == *b),
        Literal::Null => expected == "null",
        Literal::List(_) | Literal::Map(_) => false,
    }
}

/// Parsed selector
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Selector {
    pub kind: SelectorKind,
    pub pattern: Pattern,
    raw: String,
}

impl Selector {
    /// Original selector text
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    #[inline]
    pub fn is_template(&self) -> bool {
        matches!(self.pattern, Pattern::Template(_))
    }

    /// Match a node by id and metadata
    pub fn matches_node(&self, id: &str, node: &Node) -> bool {
        self.kind == SelectorKind::Node && self.pattern.matches(id, &node.meta)
    }

    fn expect_kind(&self, kind: SelectorKind) -> SussResult<()> {
        if self.kind == kind {
            Ok(())
        } else {
            Err(SussError::InvalidSelector(format!(
                "{:?} is not a {} selector",
                self.raw,
                kind.prefix()
            )))
        }
    }
}

impl FromStr for Selector {
    type Err = SussError;

    fn from_str(s: &str) -> SussResult<Self> {
        let (kind, pattern) = match s.split_once(':') {
            Some((prefix, rest)) => match SelectorKind::from_prefix(prefix) {
                Some(kind) => (kind, rest),
                None => (SelectorKind::Node, s),
            },
            None => (SelectorKind::Node, s),
        };
        Ok(Selector {
            kind,
            pattern: Pattern::parse(pattern)?,
            raw: s.to_owned(),
        })
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Parse a selector string
#[inline]
pub fn parse_selector(s: &str) -> SussResult<Selector> {
    s.parse()
}

/// Resolve a node selector to its matches, in network order.
///
/// Exact ids go through `resolver`; a missing exact id resolves to nothing.
pub fn resolve_nodes<'n, N: NodeResolver + ?Sized>(
    selector: &Selector,
    network: &'n Network,
    resolver: &N,
) -> SussResult<Vec<(NodeId, &'n Node)>> {
    selector.expect_kind(SelectorKind::Node)?;

    if let Pattern::Exact(id) = &selector.pattern {
        let id = NodeId::new(id.as_str());
        return match resolver.resolve(&id, network) {
            Ok(node) => Ok(vec![(id, node)]),
            Err(SussError::NodeNotFound(_)) => Ok(Vec::new()),
            Err(e) => Err(e),
        };
    }

    Ok(network
        .nodes()
        .filter(|(id, node)| selector.pattern.matches(id.as_str(), &node.meta))
        .map(|(id, node)| (id.clone(), node))
        .collect())
}

/// Resolve a link selector to `(index, link)` pairs. Patterns match the
/// link label; metadata patterns match link metadata.
pub fn resolve_links<'n>(
    selector: &Selector,
    network: &'n Network,
) -> SussResult<Vec<(usize, &'n Arc<Link>)>> {
    selector.expect_kind(SelectorKind::Link)?;
    Ok(network
        .links()
        .iter()
        .enumerate()
        .filter(|(_, link)| {
            let label = link.label.as_deref().unwrap_or_default();
            match &selector.pattern {
                Pattern::MetaKey(_) | Pattern::MetaEq { .. } => {
                    selector.pattern.matches(label, &link.meta)
                }
                _ => link.label.is_some() && selector.pattern.matches(label, &link.meta),
            }
        })
        .collect())
}

/// Resolve a relation selector to relation ids. Patterns match the id;
/// metadata patterns match descriptor params.
pub fn resolve_relations(selector: &Selector, network: &Network) -> SussResult<Vec<RelationId>> {
    selector.expect_kind(SelectorKind::Rel)?;
    Ok(network
        .relations()
        .descriptors()
        .filter(|(id, descriptor)| selector.pattern.matches(id.as_str(), &descriptor.params))
        .map(|(id, _)| id.clone())
        .collect())
}
