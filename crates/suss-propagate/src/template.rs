//! Template patterns and link expansion
//!
//! A template pattern embeds variables: `sensor:{{room}}:{{id}}`.
//! Matching a node id against it captures each variable; the captures are
//! substituted into the companion pattern to address the target.
//!
//! A variable matches the shortest non-empty text that lets the rest of the
//! pattern match.

use indexmap::IndexMap;
use suss_core::{NodeId, SussError, SussResult};
use suss_state::{Link, Network};

use crate::{Pattern, Selector, SelectorKind};

/// Variable bindings captured from a matched id
pub type Bindings = IndexMap<String, String>;

/// Variable bound to the remainder of a prefix (`*`) source pattern
pub const PREFIX_VAR: &str = "id";

#[derive(Clone, Debug, PartialEq, Eq)]
enum Segment {
    Lit(String),
    Var(String),
}

/// Parsed template pattern
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    /// Parse a pattern containing `{{name}}` variables
    pub fn parse(pattern: &str) -> SussResult<Self> {
        let mut segments = Vec::new();
        let mut rest = pattern;
        while let Some(open) = rest.find("{{") {
            if open > 0 {
                segments.push(Segment::Lit(rest[..open].to_owned()));
            }
            let after = &rest[open + 2..];
            let close = after
                .find("}}")
                .ok_or_else(|| SussError::InvalidSelector(format!("unclosed variable in {pattern:?}")))?;
            let name = after[..close].trim();
            if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
                return Err(SussError::InvalidSelector(format!(
                    "bad variable name {name:?} in {pattern:?}"
                )));
            }
            if matches!(segments.last(), Some(Segment::Var(_))) {
                return Err(SussError::InvalidSelector(format!(
                    "adjacent variables in {pattern:?}"
                )));
            }
            segments.push(Segment::Var(name.to_owned()));
            rest = &after[close + 2..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Lit(rest.to_owned()));
        }
        Ok(Template { segments })
    }

    /// Variable names, in order of appearance
    pub fn vars(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Var(name) => Some(name.as_str()),
            Segment::Lit(_) => None,
        })
    }

    /// Match `id`, returning the captured variables
    pub fn captures(&self, id: &str) -> Option<Bindings> {
        let mut bindings = Bindings::new();
        match_segments(&self.segments, id, &mut bindings).then_some(bindings)
    }

    /// Substitute bindings; unbound variables are left in place
    pub fn render(&self, bindings: &Bindings) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Lit(lit) => out.push_str(lit),
                Segment::Var(name) => match bindings.get(name) {
                    Some(value) => out.push_str(value),
                    None => {
                        out.push_str("{{");
                        out.push_str(name);
                        out.push_str("}}");
                    }
                },
            }
        }
        out
    }
}

fn match_segments(segments: &[Segment], s: &str, bindings: &mut Bindings) -> bool {
    let Some((head, tail)) = segments.split_first() else {
        return s.is_empty();
    };
    match head {
        Segment::Lit(lit) => s
            .strip_prefix(lit.as_str())
            .is_some_and(|rest| match_segments(tail, rest, bindings)),
        Segment::Var(name) => {
            // Shortest non-empty capture first
            for (end, c) in s.char_indices() {
                let end = end + c.len_utf8();
                let (value, rest) = s.split_at(end);
                if let Some(bound) = bindings.get(name) {
                    if bound != value {
                        continue;
                    }
                }
                let fresh = !bindings.contains_key(name);
                if fresh {
                    bindings.insert(name.clone(), value.to_owned());
                }
                if match_segments(tail, rest, bindings) {
                    return true;
                }
                if fresh {
                    bindings.shift_remove(name);
                }
            }
            false
        }
    }
}

/// Whether a pattern contains template variables
#[inline]
pub fn has_template_vars(pattern: &str) -> bool {
    pattern.contains("{{")
}

/// Replace every `{{name}}` bound in `vars`
pub fn substitute_vars(pattern: &str, vars: &Bindings) -> String {
    let mut out = pattern.to_owned();
    for (name, value) in vars {
        out = out.replace(&format!("{{{{{name}}}}}"), value);
    }
    out
}

/// Bindings a source selector captures from a matched id
pub fn source_bindings(selector: &Selector, id: &str) -> Bindings {
    match &selector.pattern {
        Pattern::Template(template) => template.captures(id).unwrap_or_default(),
        Pattern::Prefix(prefix) => id
            .strip_prefix(prefix.as_str())
            .map(|rest| Bindings::from([(PREFIX_VAR.to_owned(), rest.to_owned())]))
            .unwrap_or_default(),
        _ => Bindings::new(),
    }
}

/// Expand a template link into concrete `node:` links, one per
/// `(source, target)` pair the templates address
pub fn expand_template(link: &Link, network: &Network) -> SussResult<Vec<Link>> {
    let src: Selector = link.src.parse()?;
    if src.kind != SelectorKind::Node {
        return Err(SussError::InvalidSelector(link.src.clone()));
    }

    let mut expanded = Vec::new();
    for (src_id, src_node) in network.nodes() {
        if !src.matches_node(src_id.as_str(), src_node) {
            continue;
        }
        for tgt_id in targets_for(link, &src, src_id, network)? {
            let mut concrete = link.clone();
            concrete.src = format!("node:{src_id}");
            concrete.tgt = format!("node:{tgt_id}");
            expanded.push(concrete);
        }
    }
    Ok(expanded)
}

/// Target ids addressed by `link` for one matched source
pub fn targets_for(
    link: &Link,
    src: &Selector,
    src_id: &NodeId,
    network: &Network,
) -> SussResult<Vec<NodeId>> {
    let bindings = source_bindings(src, src_id.as_str());
    let tgt: Selector = substitute_vars(&link.tgt, &bindings).parse()?;
    Ok(network
        .nodes()
        .filter(|(id, node)| tgt.matches_node(id.as_str(), node))
        .map(|(id, _)| id.clone())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use suss_core::{Timestamp, Value};
    use suss_state::Node;

    fn node() -> Node {
        Node::derived(Value::number("v", 0.0), Timestamp::ZERO)
    }

    #[test]
    fn test_parse_and_capture() {
        let t = Template::parse("sensor:{{room}}:{{id}}").unwrap();
        assert_eq!(t.vars().collect::<Vec<_>>(), ["room", "id"]);
        let caps = t.captures("sensor:kitchen:7").unwrap();
        assert_eq!(caps["room"], "kitchen");
        assert_eq!(caps["id"], "7");
        assert!(t.captures("display:kitchen:7").is_none());
        assert!(t.captures("sensor::7").is_none());
    }

    #[test]
    fn test_repeated_variable_must_agree() {
        let t = Template::parse("{{x}}-{{y}}-{{x}}").unwrap();
        assert!(t.captures("a-b-a").is_some());
        assert!(t.captures("a-b-c").is_none());
    }

    #[test]
    fn test_parse_errors() {
        assert!(Template::parse("a:{{id").is_err());
        assert!(Template::parse("a:{{}}").is_err());
        assert!(Template::parse("{{a}}{{b}}").is_err());
    }

    #[test]
    fn test_render_and_substitute() {
        let t = Template::parse("display:{{id}}:{{unit}}").unwrap();
        let vars = Bindings::from([("id".to_owned(), "7".to_owned())]);
        assert_eq!(t.render(&vars), "display:7:{{unit}}");
        assert_eq!(substitute_vars("display:{{id}}:{{id}}", &vars), "display:7:7");
    }

    #[test]
    fn test_expand_template() {
        let net = Network::default()
            .with_node("celsius:a", node())
            .with_node("celsius:b", node())
            .with_node("fahrenheit:a", node())
            .with_node("fahrenheit:b", node())
            .with_node("other", node());
        let link = Link::new("node:celsius:{{id}}", "node:fahrenheit:{{id}}", "c2f");
        let expanded = expand_template(&link, &net).unwrap();
        let pairs: Vec<_> = expanded
            .iter()
            .map(|l| (l.src.as_str(), l.tgt.as_str()))
            .collect();
        assert_eq!(
            pairs,
            [
                ("node:celsius:a", "node:fahrenheit:a"),
                ("node:celsius:b", "node:fahrenheit:b"),
            ]
        );
        assert!(expanded.iter().all(|l| l.relation.as_str() == "c2f"));
    }

    #[test]
    fn test_prefix_source_binds_id() {
        let net = Network::default()
            .with_node("in:x", node())
            .with_node("out:x", node());
        let link = Link::new("node:in:*", "node:out:{{id}}", "copy");
        let expanded = expand_template(&link, &net).unwrap();
        assert_eq!(expanded.len(), 1);
        assert_eq!(expanded[0].tgt, "node:out:x");
    }
}
