//! Child-instance naming and the state → child-update map.
//!
//! Instances are named `<Type>_<n>` in first-encountered order, counted per
//! qualified type. Member-reference instantiations keep their member name and
//! never advance a counter. The same walk order is used everywhere an
//! instance name is needed, so names agree across passes.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::ast::{Component, ComponentInstantiation, ViewNode};
use crate::ir::LifecycleStmt;
use crate::session::CompilerSession;
use crate::visitor::{walk_children, ViewVisitor};

/// Qualified type name → number of owned instances, in first-encountered order.
pub type ChildCounts = IndexMap<String, usize>;

/// State identifier → update calls to run when it changes, in collection order.
pub type UpdateMap = IndexMap<String, Vec<LifecycleStmt>>;

#[derive(Debug, Clone, Default)]
pub struct InstanceNamer {
    counters: IndexMap<String, usize>,
}

impl InstanceNamer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name_for(&mut self, inst: &ComponentInstantiation) -> String {
        if inst.is_member_reference {
            return inst.member_name.clone();
        }
        let type_name = inst.qualified_name();
        let counter = self.counters.entry(type_name.clone()).or_insert(0);
        let name = format!("{}_{}", type_name, counter);
        *counter += 1;
        name
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CHILD COUNTS
// ═══════════════════════════════════════════════════════════════════════════════

struct ChildCounter<'a> {
    counts: &'a mut ChildCounts,
}

impl ViewVisitor for ChildCounter<'_> {
    fn visit_instantiation(&mut self, inst: &ComponentInstantiation) {
        if !inst.is_member_reference {
            *self.counts.entry(inst.qualified_name()).or_insert(0) += 1;
        }
    }
}

pub fn collect_child_components(node: &ViewNode, counts: &mut ChildCounts) {
    ChildCounter { counts }.visit_node(node);
}

pub fn component_child_counts(component: &Component) -> ChildCounts {
    let mut counts = ChildCounts::new();
    for root in &component.render_roots {
        collect_child_components(root, &mut counts);
    }
    counts
}

// ═══════════════════════════════════════════════════════════════════════════════
// UPDATE MAP
// ═══════════════════════════════════════════════════════════════════════════════

struct UpdateCollector<'a> {
    updates: &'a mut UpdateMap,
    namer: &'a mut InstanceNamer,
}

impl ViewVisitor for UpdateCollector<'_> {
    fn visit_instantiation(&mut self, inst: &ComponentInstantiation) {
        let instance = self.namer.name_for(inst);
        for prop in inst.props.iter().filter(|p| p.is_reference) {
            let mut deps = BTreeSet::new();
            prop.value.collect_dependencies(&mut deps);
            for dep in deps {
                self.updates
                    .entry(dep)
                    .or_default()
                    .push(LifecycleStmt::CallUpdate {
                        instance: instance.clone(),
                        prop: prop.name.clone(),
                    });
            }
        }
    }
}

pub fn collect_child_updates(node: &ViewNode, updates: &mut UpdateMap, namer: &mut InstanceNamer) {
    UpdateCollector { updates, namer }.visit_node(node);
}

pub fn component_updates(component: &Component) -> UpdateMap {
    let mut updates = UpdateMap::new();
    let mut namer = InstanceNamer::new();
    for root in &component.render_roots {
        collect_child_updates(root, &mut updates, &mut namer);
    }
    updates
}

/// The statements a mutator for `state` must run: exactly `updates[state]`.
pub fn plan_state_mutator<'a>(updates: &'a UpdateMap, state: &str) -> &'a [LifecycleStmt] {
    updates.get(state).map(Vec::as_slice).unwrap_or(&[])
}

// ═══════════════════════════════════════════════════════════════════════════════
// TWO-WAY BINDINGS
// ═══════════════════════════════════════════════════════════════════════════════

/// A reactive binding of parent state straight onto a child's `pub mut`
/// member. The child may write the member back, so the parent copies it into
/// `state` and notifies its own dependents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncBinding {
    pub instance: String,
    pub member: String,
    pub state: String,
}

struct SyncCollector<'a> {
    session: &'a CompilerSession,
    namer: InstanceNamer,
    bindings: Vec<SyncBinding>,
}

impl ViewVisitor for SyncCollector<'_> {
    fn visit_instantiation(&mut self, inst: &ComponentInstantiation) {
        let instance = self.namer.name_for(inst);
        let type_name = inst.qualified_name();
        for prop in inst.props.iter().filter(|p| p.is_reference) {
            // Only a bare identifier can be written back.
            let [dep] = prop.value.dependencies.as_slice() else {
                continue;
            };
            if prop.value.code.trim() != dep.as_str() {
                continue;
            }
            if self.session.is_pub_mut(&type_name, &prop.name) {
                self.bindings.push(SyncBinding {
                    instance: instance.clone(),
                    member: prop.name.clone(),
                    state: dep.clone(),
                });
            }
        }
    }
}

pub fn collect_sync_bindings(component: &Component, session: &CompilerSession) -> Vec<SyncBinding> {
    let mut collector = SyncCollector {
        session,
        namer: InstanceNamer::new(),
        bindings: Vec::new(),
    };
    walk_children(&mut collector, &component.render_roots);
    collector.bindings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ComponentParam, Expr, HtmlElement, PropBinding, ViewIf};
    use pretty_assertions::assert_eq;

    fn inst(name: &str, props: Vec<PropBinding>) -> ViewNode {
        ViewNode::Component(ComponentInstantiation {
            component_name: name.to_string(),
            props,
            ..Default::default()
        })
    }

    fn member(name: &str, member_name: &str) -> ViewNode {
        ViewNode::Component(ComponentInstantiation {
            component_name: name.to_string(),
            is_member_reference: true,
            member_name: member_name.to_string(),
            ..Default::default()
        })
    }

    fn reactive(name: &str, code: &str, deps: &[&str]) -> PropBinding {
        PropBinding {
            name: name.to_string(),
            value: Expr::with_deps(code, deps),
            is_reference: true,
        }
    }

    fn div(children: Vec<ViewNode>) -> ViewNode {
        ViewNode::Element(HtmlElement {
            tag: "div".to_string(),
            children,
            ..Default::default()
        })
    }

    #[test]
    fn test_counts_skip_member_references() {
        let root = div(vec![
            inst("Button", vec![]),
            member("Panel", "sidebar"),
            ViewNode::If(ViewIf {
                condition: Expr::with_deps("open", &["open"]),
                then_children: vec![inst("Button", vec![])],
                else_children: vec![inst("Label", vec![])],
                ..Default::default()
            }),
        ]);

        let mut counts = ChildCounts::new();
        collect_child_components(&root, &mut counts);

        let pairs: Vec<(&str, usize)> = counts.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        assert_eq!(pairs, vec![("Button", 2), ("Label", 1)]);
    }

    #[test]
    fn test_instance_naming() {
        let mut namer = InstanceNamer::new();
        let button = ComponentInstantiation {
            component_name: "Button".to_string(),
            ..Default::default()
        };
        let sidebar = ComponentInstantiation {
            component_name: "Panel".to_string(),
            is_member_reference: true,
            member_name: "sidebar".to_string(),
            ..Default::default()
        };

        assert_eq!(namer.name_for(&button), "Button_0");
        assert_eq!(namer.name_for(&sidebar), "sidebar");
        assert_eq!(namer.name_for(&button), "Button_1");
    }

    #[test]
    fn test_update_map_precision() {
        let root = div(vec![
            inst("Display", vec![reactive("value", "count", &["count"])]),
            inst(
                "Display",
                vec![PropBinding {
                    name: "label".to_string(),
                    value: Expr::new("\"static\""),
                    is_reference: false,
                }],
            ),
        ]);

        let mut updates = UpdateMap::new();
        let mut namer = InstanceNamer::new();
        collect_child_updates(&root, &mut updates, &mut namer);

        assert_eq!(
            plan_state_mutator(&updates, "count"),
            &[LifecycleStmt::CallUpdate {
                instance: "Display_0".to_string(),
                prop: "value".to_string(),
            }]
        );
        assert!(plan_state_mutator(&updates, "other").is_empty());
        assert_eq!(updates.len(), 1);
    }

    #[test]
    fn test_update_map_fans_out_per_dependency() {
        let root = div(vec![
            member("Chart", "chart"),
            inst("Label", vec![reactive("text", "first + last", &["last", "first"])]),
            inst("Label", vec![reactive("text", "first", &["first"])]),
        ]);

        let mut updates = UpdateMap::new();
        collect_child_updates(&root, &mut updates, &mut InstanceNamer::new());

        let first: Vec<String> = plan_state_mutator(&updates, "first")
            .iter()
            .map(|s| match s {
                LifecycleStmt::CallUpdate { instance, prop } => format!("{}._update_{}", instance, prop),
                other => panic!("unexpected {:?}", other),
            })
            .collect();
        assert_eq!(first, vec!["Label_0._update_text", "Label_1._update_text"]);
        assert_eq!(plan_state_mutator(&updates, "last").len(), 1);
        // Dependencies are visited in sorted order, so "first" is inserted before "last".
        assert_eq!(updates.keys().collect::<Vec<_>>(), vec!["first", "last"]);
    }

    #[test]
    fn test_sync_bindings_need_pub_mut_member() {
        let mut session = CompilerSession::new();
        session.record_member_info(&Component {
            name: "Slider".to_string(),
            params: vec![
                ComponentParam {
                    name: "value".to_string(),
                    is_mutable: true,
                    is_public: true,
                    ..Default::default()
                },
                ComponentParam {
                    name: "max".to_string(),
                    is_public: true,
                    ..Default::default()
                },
            ],
            ..Default::default()
        });

        let parent = Component {
            name: "Mixer".to_string(),
            render_roots: vec![div(vec![inst(
                "Slider",
                vec![
                    reactive("value", "volume", &["volume"]),
                    reactive("max", "limit", &["limit"]),
                ],
            )])],
            ..Default::default()
        };

        let bindings = collect_sync_bindings(&parent, &session);
        assert_eq!(
            bindings,
            vec![SyncBinding {
                instance: "Slider_0".to_string(),
                member: "value".to_string(),
                state: "volume".to_string(),
            }]
        );
    }
}
