//! Relationship graph between features.
//!
//! Built on demand from listed records as an adjacency list keyed by feature
//! ID. Traversals carry an explicit visited set, so cyclic data on disk
//! cannot loop them. Workflows only use the narrow `would_create_cycle` /
//! `validate_close` surface.

use crate::error::{FtrackError, Result};
use crate::model::Feature;
use std::collections::{BTreeMap, BTreeSet};

/// Kind used for dependency edges.
pub const DEPENDS_ON: &str = "depends-on";

/// Known relationship kinds and their inverses.
const KINDS: [(&str, &str); 5] = [
    ("depends-on", "required-by"),
    ("required-by", "depends-on"),
    ("relates-to", "relates-to"),
    ("duplicates", "duplicated-by"),
    ("duplicated-by", "duplicates"),
];

/// Returns the inverse of a known relationship kind.
///
/// # Errors
///
/// Returns `FtrackError::UnknownRelationship` for kinds outside the table.
pub fn inverse_kind(kind: &str) -> Result<&'static str> {
    KINDS
        .iter()
        .find(|(k, _)| *k == kind)
        .map(|(_, inverse)| *inverse)
        .ok_or_else(|| FtrackError::UnknownRelationship(kind.to_string()))
}

#[derive(Debug, Clone)]
struct Edge {
    kind: String,
    target: String,
}

/// A closing feature that still depends on open work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseAdvisory {
    pub feature_id: String,
    pub feature_name: String,
    /// Names of open features reachable through `depends-on` edges.
    pub open_dependencies: Vec<String>,
}

impl CloseAdvisory {
    pub fn message(&self) -> String {
        format!(
            "closing '{}' while it depends on open feature(s): {}",
            self.feature_name,
            self.open_dependencies.join(", ")
        )
    }
}

/// Adjacency list of feature relationships.
#[derive(Debug, Default, Clone)]
pub struct RelationshipGraph {
    edges: BTreeMap<String, Vec<Edge>>,
}

impl RelationshipGraph {
    pub fn from_features<'a, I>(features: I) -> Self
    where
        I: IntoIterator<Item = &'a Feature>,
    {
        let mut edges: BTreeMap<String, Vec<Edge>> = BTreeMap::new();
        for feature in features {
            let list = edges.entry(feature.id.clone()).or_default();
            for rel in &feature.relationships {
                list.push(Edge {
                    kind: rel.kind.clone(),
                    target: rel.target.clone(),
                });
            }
        }
        Self { edges }
    }

    /// Adds an edge in memory.
    pub fn add_edge(&mut self, from: &str, kind: &str, to: &str) {
        self.edges.entry(from.to_string()).or_default().push(Edge {
            kind: kind.to_string(),
            target: to.to_string(),
        });
    }

    /// Every feature reachable from `from` through edges of `kind`.
    /// `from` itself is included only when it lies on a cycle.
    pub fn reachable(&self, from: &str, kind: &str) -> BTreeSet<String> {
        let mut visited = BTreeSet::new();
        let mut stack = vec![from.to_string()];
        while let Some(node) = stack.pop() {
            let Some(edges) = self.edges.get(&node) else {
                continue;
            };
            for edge in edges.iter().filter(|e| e.kind == kind) {
                if visited.insert(edge.target.clone()) {
                    stack.push(edge.target.clone());
                }
            }
        }
        visited
    }

    /// Whether adding `from -kind-> to` would close a cycle.
    pub fn would_create_cycle(&self, from: &str, kind: &str, to: &str) -> bool {
        from == to || self.reachable(to, kind).contains(from)
    }

    /// Advisories for closing `closing` given the current `features`.
    /// Dependencies that are closed or closing together are ignored.
    pub fn validate_close(&self, closing: &[String], features: &[Feature]) -> Vec<CloseAdvisory> {
        let by_id: BTreeMap<&str, &Feature> =
            features.iter().map(|f| (f.id.as_str(), f)).collect();
        let closing_set: BTreeSet<&str> = closing.iter().map(String::as_str).collect();

        closing
            .iter()
            .filter_map(|id| {
                let open: Vec<String> = self
                    .reachable(id, DEPENDS_ON)
                    .into_iter()
                    .filter(|dep| !closing_set.contains(dep.as_str()))
                    .filter_map(|dep| by_id.get(dep.as_str()).copied())
                    .filter(|dep| !dep.is_closed())
                    .map(|dep| dep.name.clone())
                    .collect();
                if open.is_empty() {
                    return None;
                }
                Some(CloseAdvisory {
                    feature_id: id.clone(),
                    feature_name: by_id
                        .get(id.as_str())
                        .map(|f| f.name.clone())
                        .unwrap_or_else(|| id.clone()),
                    open_dependencies: open,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn feature(id: &str, deps: &[&str]) -> Feature {
        let mut f = Feature::with_id(id, id.to_uppercase(), Utc::now());
        for dep in deps {
            f.add_relationship(DEPENDS_ON, dep);
        }
        f
    }

    #[test]
    fn test_reachable_follows_kind_transitively() {
        let mut b = feature("b", &["c"]);
        b.add_relationship("relates-to", "d");
        let features = [feature("a", &["b"]), b, feature("c", &[])];
        let graph = RelationshipGraph::from_features(&features);

        let reach = graph.reachable("a", DEPENDS_ON);
        assert_eq!(reach.into_iter().collect::<Vec<_>>(), vec!["b", "c"]);
    }

    #[test]
    fn test_cycle_detection_terminates() {
        let features = [feature("a", &["b"]), feature("b", &["a"])];
        let graph = RelationshipGraph::from_features(&features);

        assert!(graph.reachable("a", DEPENDS_ON).contains("a"));
        assert!(graph.would_create_cycle("c", DEPENDS_ON, "c"));

        let line = RelationshipGraph::from_features(&[feature("x", &["y"])]);
        assert!(line.would_create_cycle("y", DEPENDS_ON, "x"));
        assert!(!line.would_create_cycle("x", DEPENDS_ON, "z"));
    }

    #[test]
    fn test_validate_close_reports_open_dependencies() {
        let mut closed = feature("c", &[]);
        closed.close(Utc::now());
        let features = vec![
            feature("a", &["b", "c"]),
            feature("b", &[]),
            closed,
            feature("d", &["b"]),
        ];
        let graph = RelationshipGraph::from_features(&features);

        let advisories = graph.validate_close(&["a".to_string()], &features);
        assert_eq!(advisories.len(), 1);
        assert_eq!(advisories[0].open_dependencies, vec!["B"]);

        let together = graph.validate_close(&["a".to_string(), "b".to_string()], &features);
        assert!(together.is_empty());
    }

    #[test]
    fn test_inverse_kind() {
        assert_eq!(inverse_kind("depends-on").unwrap(), "required-by");
        assert_eq!(inverse_kind("relates-to").unwrap(), "relates-to");
        assert!(inverse_kind("blocks").is_err());
    }
}
