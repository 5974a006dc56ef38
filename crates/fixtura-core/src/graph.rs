use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::schema::ModelSpec;

/// Summary of dependency graph structure.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DependencySummary {
    pub nodes: usize,
    pub edges: usize,
}

/// Ephemeral "A requires B" graph over model names.
///
/// Only required to-one relationships contribute edges; optional and to-many
/// links never constrain ordering.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    requires: BTreeMap<String, BTreeSet<String>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the graph restricted to the given models.
    pub fn from_models<'a>(models: impl IntoIterator<Item = &'a ModelSpec>) -> Self {
        let models: Vec<&ModelSpec> = models.into_iter().collect();
        let names: BTreeSet<&str> = models.iter().map(|model| model.name.as_str()).collect();

        let mut graph = Self::new();
        for model in &models {
            graph.add_node(&model.name);
            for target in model.required_targets() {
                if names.contains(target) {
                    graph.add_requirement(&model.name, target);
                }
            }
        }
        graph
    }

    pub fn add_node(&mut self, name: &str) {
        self.requires.entry(name.to_string()).or_default();
    }

    pub fn add_requirement(&mut self, dependent: &str, dependency: &str) {
        self.add_node(dependency);
        self.requires
            .entry(dependent.to_string())
            .or_default()
            .insert(dependency.to_string());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.requires.contains_key(name)
    }

    pub fn summary(&self) -> DependencySummary {
        DependencySummary {
            nodes: self.requires.len(),
            edges: self.requires.values().map(BTreeSet::len).sum(),
        }
    }

    /// Deterministic order with every dependency before its dependents.
    ///
    /// Ties are broken by name. A cycle fails with the names along one cycle.
    pub fn topological_order(&self) -> Result<Vec<String>> {
        let mut dependents: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        let mut pending: BTreeMap<&str, usize> = BTreeMap::new();

        for (node, deps) in &self.requires {
            pending.insert(node.as_str(), deps.len());
            for dep in deps {
                dependents.entry(dep.as_str()).or_default().insert(node.as_str());
            }
        }

        let mut ready: BTreeSet<&str> = pending
            .iter()
            .filter_map(|(node, count)| (*count == 0).then_some(*node))
            .collect();

        let mut order = Vec::with_capacity(self.requires.len());
        while let Some(node) = ready.pop_first() {
            order.push(node.to_string());
            if let Some(children) = dependents.get(node) {
                for child in children {
                    if let Some(count) = pending.get_mut(child) {
                        *count = count.saturating_sub(1);
                        if *count == 0 {
                            ready.insert(child);
                        }
                    }
                }
            }
        }

        if order.len() == self.requires.len() {
            return Ok(order);
        }

        let remaining: BTreeSet<&str> = pending
            .into_iter()
            .filter_map(|(node, count)| (count > 0).then_some(node))
            .collect();
        Err(Error::CyclicRelationship {
            cycle: self.extract_cycle(&remaining),
        })
    }

    // Every unresolved node still requires another unresolved node, so walking
    // requirement edges inside `remaining` must revisit a node.
    fn extract_cycle(&self, remaining: &BTreeSet<&str>) -> Vec<String> {
        let Some(start) = remaining.first() else {
            return Vec::new();
        };
        let mut path: Vec<&str> = Vec::new();
        let mut current = *start;
        loop {
            if let Some(pos) = path.iter().position(|node| *node == current) {
                return path[pos..].iter().map(|node| node.to_string()).collect();
            }
            path.push(current);
            let next = self
                .requires
                .get(current)
                .and_then(|deps| deps.iter().find(|dep| remaining.contains(dep.as_str())));
            match next {
                Some(next) => current = next.as_str(),
                None => return path.iter().map(|node| node.to_string()).collect(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldCategory, FieldSpec, RelationshipSpec};

    fn model(name: &str, requires: &[&str]) -> ModelSpec {
        ModelSpec {
            name: name.to_string(),
            app: "shop".to_string(),
            fields: vec![FieldSpec::new("label", FieldCategory::Text)],
            relationships: requires
                .iter()
                .map(|target| RelationshipSpec::required(target.to_lowercase(), *target))
                .collect(),
        }
    }

    #[test]
    fn orders_dependencies_first() {
        let models = [
            model("OrderLine", &["Order", "Product"]),
            model("Order", &["Customer"]),
            model("Product", &[]),
            model("Customer", &[]),
        ];
        let order = DependencyGraph::from_models(&models)
            .topological_order()
            .expect("acyclic");
        let pos = |name: &str| order.iter().position(|item| item == name).expect(name);
        assert!(pos("Customer") < pos("Order"));
        assert!(pos("Order") < pos("OrderLine"));
        assert!(pos("Product") < pos("OrderLine"));
    }

    #[test]
    fn reports_the_cycle_members() {
        let models = [model("A", &["B"]), model("B", &["A"]), model("C", &["A"])];
        let err = DependencyGraph::from_models(&models)
            .topological_order()
            .expect_err("cycle");
        match err {
            Error::CyclicRelationship { cycle } => {
                assert_eq!(cycle, vec!["A".to_string(), "B".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn self_reference_is_a_cycle() {
        let models = [model("Node", &["Node"])];
        let err = DependencyGraph::from_models(&models)
            .topological_order()
            .expect_err("cycle");
        assert!(matches!(err, Error::CyclicRelationship { cycle } if cycle == vec!["Node".to_string()]));
    }

    #[test]
    fn optional_links_do_not_order() {
        let mut a = model("A", &[]);
        a.relationships.push(RelationshipSpec::optional("b", "B"));
        let mut b = model("B", &[]);
        b.relationships.push(RelationshipSpec::to_many("items", "A"));
        let graph = DependencyGraph::from_models([&a, &b]);
        assert_eq!(graph.summary(), DependencySummary { nodes: 2, edges: 0 });
        assert!(graph.topological_order().is_ok());
    }

    #[test]
    fn targets_outside_the_set_are_ignored() {
        let models = [model("Product", &["Category"])];
        let graph = DependencyGraph::from_models(&models);
        assert!(!graph.contains("Category"));
        assert_eq!(graph.topological_order().expect("order"), vec!["Product".to_string()]);
    }
}
