//! Component dependency ordering.
//!
//! A component depends on every type it instantiates in its view and every
//! route target of its router block. Children are lowered first so the
//! session already holds their facts when the parent is lowered.

use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

use crate::ast::{Component, ComponentInstantiation, ViewNode};
use crate::visitor::{walk_children, ViewVisitor};

struct DepCollector<'a> {
    deps: &'a mut BTreeSet<String>,
}

impl ViewVisitor for DepCollector<'_> {
    fn visit_instantiation(&mut self, inst: &ComponentInstantiation) {
        if !inst.is_member_reference {
            self.deps.insert(inst.qualified_name());
        }
    }
}

pub fn collect_component_deps(node: &ViewNode, deps: &mut BTreeSet<String>) {
    DepCollector { deps }.visit_node(node);
}

/// Every type `component` must be ordered after.
pub fn component_deps(component: &Component) -> BTreeSet<String> {
    let mut deps = BTreeSet::new();
    walk_children(&mut DepCollector { deps: &mut deps }, &component.render_roots);
    if let Some(router) = &component.router {
        deps.extend(router.routes.iter().map(|r| r.qualified_name()));
    }
    deps
}

/// Kahn's algorithm; among ready components the earliest declared goes first.
/// A cycle is not an error: the earliest declared component still waiting is
/// emitted to break it.
pub fn topological_sort_components(components: &[Component]) -> Vec<&Component> {
    let mut index_of: BTreeMap<String, usize> = BTreeMap::new();
    for (i, c) in components.iter().enumerate() {
        index_of.entry(c.qualified_name()).or_insert(i);
    }

    let mut in_degree = vec![0usize; components.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); components.len()];
    for (i, c) in components.iter().enumerate() {
        for dep in component_deps(c) {
            match index_of.get(&dep) {
                Some(&j) if j != i => {
                    in_degree[i] += 1;
                    dependents[j].push(i);
                }
                _ => {}
            }
        }
    }

    let mut ready: BTreeSet<usize> = (0..components.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut emitted = vec![false; components.len()];
    let mut order = Vec::with_capacity(components.len());

    while order.len() < components.len() {
        let next = match ready.pop_first() {
            Some(i) => i,
            None => {
                let stuck = (0..components.len())
                    .find(|&i| !emitted[i])
                    .unwrap_or_default();
                warn!(
                    component = %components[stuck].qualified_name(),
                    "dependency cycle, falling back to declaration order"
                );
                stuck
            }
        };
        if emitted[next] {
            continue;
        }
        emitted[next] = true;
        order.push(&components[next]);

        for &dependent in &dependents[next] {
            in_degree[dependent] = in_degree[dependent].saturating_sub(1);
            if in_degree[dependent] == 0 && !emitted[dependent] {
                ready.insert(dependent);
            }
        }
    }

    debug!(
        order = ?order.iter().map(|c| c.qualified_name()).collect::<Vec<_>>(),
        "component order"
    );
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn component(name: &str, children: &[&str]) -> Component {
        let kids: Vec<serde_json::Value> = children
            .iter()
            .map(|c| json!({ "type": "component", "componentName": c }))
            .collect();
        serde_json::from_value(json!({
            "name": name,
            "renderRoots": [{ "type": "element", "tag": "div", "children": kids }]
        }))
        .unwrap()
    }

    fn names(order: &[&Component]) -> Vec<String> {
        order.iter().map(|c| c.name.clone()).collect()
    }

    #[test]
    fn test_collect_deps_skips_member_references() {
        let node: ViewNode = serde_json::from_value(json!({
            "type": "element",
            "tag": "div",
            "children": [
                { "type": "component", "componentName": "Card", "modulePrefix": "ui" },
                { "type": "component", "componentName": "Chart", "isMemberReference": true, "memberName": "chart" },
                { "type": "if", "condition": { "code": "x" },
                  "elseChildren": [{ "type": "component", "componentName": "Empty" }] }
            ]
        }))
        .unwrap();

        let mut deps = BTreeSet::new();
        collect_component_deps(&node, &mut deps);
        assert_eq!(deps, BTreeSet::from(["Empty".to_string(), "ui_Card".to_string()]));
    }

    #[test]
    fn test_children_before_parents() {
        let components = vec![
            component("App", &["Header", "List"]),
            component("List", &["Item"]),
            component("Header", &[]),
            component("Item", &[]),
        ];
        let order = topological_sort_components(&components);
        assert_eq!(names(&order), vec!["Header", "Item", "List", "App"]);
    }

    #[test]
    fn test_route_targets_are_edges() {
        let shell: Component = serde_json::from_value(json!({
            "name": "Shell",
            "renderRoots": [{ "type": "route" }],
            "router": { "routes": [{ "path": "/", "componentName": "Home" }] }
        }))
        .unwrap();
        let components = vec![shell, component("Home", &[])];
        let order = topological_sort_components(&components);
        assert_eq!(names(&order), vec!["Home", "Shell"]);
    }

    #[test]
    fn test_cycles_are_not_fatal() {
        let components = vec![
            component("Leaf", &[]),
            component("A", &["B"]),
            component("B", &["A"]),
            component("Top", &["A", "Unknown", "Top"]),
        ];
        let order = topological_sort_components(&components);
        assert_eq!(names(&order), vec!["Leaf", "A", "B", "Top"]);
        // Same input, same order.
        assert_eq!(names(&topological_sort_components(&components)), names(&order));
    }
}
