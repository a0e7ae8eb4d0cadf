//! Resource dependency graph.
//!
//! Nodes are logical resource names; an edge `dependent -> dependency`
//! means the dependent must not be applied before the dependency reports
//! ready. The graph is validated on construction:
//! - unique node names
//! - edges reference existing nodes
//! - acyclic (DFS coloring)

use crate::core::{Error, Result};
use crate::k8s::ResourceSpec;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// `dependent` depends on `dependency`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub dependent: String,
    pub dependency: String,
}

impl DependencyEdge {
    pub fn new(dependent: &str, dependency: &str) -> Self {
        Self {
            dependent: dependent.to_string(),
            dependency: dependency.to_string(),
        }
    }
}

/// Validated dependency DAG.
#[derive(Clone, Debug)]
pub struct DependencyGraph {
    /// Nodes in declaration order
    nodes: Vec<String>,
    /// node -> the nodes it depends on
    dependencies: BTreeMap<String, Vec<String>>,
    /// node -> the nodes that depend on it
    dependents: BTreeMap<String, Vec<String>>,
    /// Topological levels
    levels: Vec<Vec<String>>,
}

impl DependencyGraph {
    /// Build the graph from the `depends_on` lists of a spec set.
    pub fn from_specs(specs: &[ResourceSpec]) -> Result<Self> {
        let nodes = specs.iter().map(|s| s.logical_name.clone()).collect();
        let edges = specs
            .iter()
            .flat_map(|s| {
                s.depends_on
                    .iter()
                    .map(|d| DependencyEdge::new(&s.logical_name, d))
            })
            .collect();
        Self::new(nodes, edges)
    }

    /// Validate nodes and edges and build the graph.
    pub fn new(nodes: Vec<String>, edges: Vec<DependencyEdge>) -> Result<Self> {
        let mut seen = BTreeSet::new();
        for n in &nodes {
            if !seen.insert(n.as_str()) {
                return Err(Error::DuplicateResource(n.clone()));
            }
        }

        let mut dependencies = BTreeMap::<String, Vec<String>>::new();
        let mut dependents = BTreeMap::<String, Vec<String>>::new();
        for edge in &edges {
            let known = seen.contains(edge.dependent.as_str())
                && seen.contains(edge.dependency.as_str());
            if !known {
                return Err(Error::UnknownDependency {
                    resource: edge.dependent.clone(),
                    dependency: edge.dependency.clone(),
                });
            }
            let deps = dependencies.entry(edge.dependent.clone()).or_default();
            if !deps.contains(&edge.dependency) {
                deps.push(edge.dependency.clone());
                dependents
                    .entry(edge.dependency.clone())
                    .or_default()
                    .push(edge.dependent.clone());
            }
        }

        check_acyclic(&nodes, &dependencies)?;
        let levels = layer(&nodes, &dependencies);

        Ok(Self {
            nodes,
            dependencies,
            dependents,
            levels,
        })
    }

    /// Nodes in declaration order.
    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    /// Direct dependencies of a node.
    pub fn dependencies(&self, node: &str) -> &[String] {
        self.dependencies.get(node).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Direct dependents of a node.
    pub fn dependents(&self, node: &str) -> &[String] {
        self.dependents.get(node).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All edges, grouped by dependent in declaration order.
    pub fn edges(&self) -> Vec<DependencyEdge> {
        self.nodes
            .iter()
            .flat_map(|n| {
                self.dependencies(n)
                    .iter()
                    .map(move |d| DependencyEdge::new(n, d))
            })
            .collect()
    }

    /// Topological levels. Every node's dependencies sit in earlier levels,
    /// so nodes within one level are independent of each other.
    pub fn levels(&self) -> &[Vec<String>] {
        &self.levels
    }

    /// Flattened topological order.
    pub fn order(&self) -> Vec<&str> {
        self.levels
            .iter()
            .flat_map(|level| level.iter().map(String::as_str))
            .collect()
    }
}

fn check_acyclic(nodes: &[String], dependencies: &BTreeMap<String, Vec<String>>) -> Result<()> {
    #[derive(Copy, Clone, PartialEq, Eq)]
    enum Mark {
        Temp,
        Perm,
    }

    fn dfs(
        v: &str,
        dependencies: &BTreeMap<String, Vec<String>>,
        marks: &mut BTreeMap<String, Mark>,
        stack: &mut Vec<String>,
    ) -> Result<()> {
        match marks.get(v) {
            Some(Mark::Perm) => return Ok(()),
            Some(Mark::Temp) => {
                // v is on the current path; report only the loop itself
                let start = stack.iter().position(|s| s == v).unwrap_or(0);
                let mut cycle = stack[start..].to_vec();
                cycle.push(v.to_string());
                return Err(Error::DependencyCycle(cycle.join(" -> ")));
            }
            None => {}
        }

        marks.insert(v.to_string(), Mark::Temp);
        stack.push(v.to_string());

        if let Some(deps) = dependencies.get(v) {
            for d in deps {
                dfs(d, dependencies, marks, stack)?;
            }
        }

        stack.pop();
        marks.insert(v.to_string(), Mark::Perm);
        Ok(())
    }

    let mut marks = BTreeMap::new();
    let mut stack = Vec::new();
    for n in nodes {
        stack.clear();
        dfs(n, dependencies, &mut marks, &mut stack)?;
    }
    Ok(())
}

/// Kahn layering; assumes the graph is acyclic.
fn layer(nodes: &[String], dependencies: &BTreeMap<String, Vec<String>>) -> Vec<Vec<String>> {
    let mut placed = BTreeSet::<String>::new();
    let mut levels = Vec::new();

    while placed.len() < nodes.len() {
        let level: Vec<String> = nodes
            .iter()
            .filter(|n| !placed.contains(n.as_str()))
            .filter(|n| {
                dependencies
                    .get(n.as_str())
                    .map(|deps| deps.iter().all(|d| placed.contains(d.as_str())))
                    .unwrap_or(true)
            })
            .cloned()
            .collect();
        if level.is_empty() {
            break;
        }
        placed.extend(level.iter().cloned());
        levels.push(level);
    }

    levels
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_chain_levels() {
        let graph = DependencyGraph::new(
            names(&["ns", "deploy", "svc", "lb"]),
            vec![
                DependencyEdge::new("deploy", "ns"),
                DependencyEdge::new("svc", "deploy"),
                DependencyEdge::new("lb", "deploy"),
            ],
        )
        .unwrap();

        assert_eq!(
            graph.levels(),
            &[names(&["ns"]), names(&["deploy"]), names(&["svc", "lb"])]
        );
        assert_eq!(graph.order(), vec!["ns", "deploy", "svc", "lb"]);
        assert_eq!(graph.dependents("deploy"), &names(&["svc", "lb"])[..]);
        assert_eq!(graph.edges().len(), 3);
    }

    #[test]
    fn test_declaration_order_does_not_matter() {
        let graph = DependencyGraph::new(
            names(&["svc", "deploy", "ns"]),
            vec![
                DependencyEdge::new("deploy", "ns"),
                DependencyEdge::new("svc", "deploy"),
            ],
        )
        .unwrap();
        assert_eq!(graph.order(), vec!["ns", "deploy", "svc"]);
    }

    #[test]
    fn test_duplicate_edges_collapse() {
        let graph = DependencyGraph::new(
            names(&["a", "b"]),
            vec![DependencyEdge::new("b", "a"), DependencyEdge::new("b", "a")],
        )
        .unwrap();
        assert_eq!(graph.dependencies("b"), &names(&["a"])[..]);
    }

    #[test]
    fn test_duplicate_node() {
        let err = DependencyGraph::new(names(&["a", "a"]), vec![]).unwrap_err();
        assert!(matches!(err, Error::DuplicateResource(n) if n == "a"));
    }

    #[test]
    fn test_unknown_dependency() {
        let err =
            DependencyGraph::new(names(&["a"]), vec![DependencyEdge::new("a", "missing")])
                .unwrap_err();
        assert!(matches!(
            err,
            Error::UnknownDependency { resource, dependency }
                if resource == "a" && dependency == "missing"
        ));
    }

    #[test]
    fn test_cycle() {
        let err = DependencyGraph::new(
            names(&["a", "b", "c"]),
            vec![
                DependencyEdge::new("a", "b"),
                DependencyEdge::new("b", "c"),
                DependencyEdge::new("c", "a"),
            ],
        )
        .unwrap_err();
        match err {
            Error::DependencyCycle(path) => assert_eq!(path, "a -> b -> c -> a"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_cycle_path_excludes_entry() {
        let err = DependencyGraph::new(
            names(&["a", "b", "c"]),
            vec![
                DependencyEdge::new("a", "b"),
                DependencyEdge::new("b", "c"),
                DependencyEdge::new("c", "b"),
            ],
        )
        .unwrap_err();
        match err {
            Error::DependencyCycle(path) => assert_eq!(path, "b -> c -> b"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_self_dependency() {
        let err = DependencyGraph::new(names(&["a"]), vec![DependencyEdge::new("a", "a")])
            .unwrap_err();
        assert!(matches!(err, Error::DependencyCycle(_)));
    }
}
