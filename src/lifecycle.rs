//! Lifecycle lowering.
//!
//! Produces the statement bodies of `_destroy`, `_remove_view`,
//! `_get_root_element` and `tick`, plus the mount-path listener registrations
//! they mirror. Every (element, event) pair registered on mount has a matching
//! removal on every teardown path.
//!
//! Teardown has three shapes:
//! - a root-level conditional decides which arm holds the root; each arm
//!   removes its own listeners and then its root node
//! - conditionals exist but none holds the root; unconditional listeners go
//!   first, then one branch per region, then the view root
//! - no conditionals; listeners are removed by mask loop, then the view root
//!
//! A root is whatever node opens its sibling list: an element, a nested
//! conditional (resolved through its own arms) or a child component. Nested
//! regions are handled inside their parent's arm. DOM removal cascades, so
//! only one local node per teardown path is removed explicitly. A child
//! component skips its own DOM removal only when a local element encloses it.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::ast::{Component, EventKind, Field};
use crate::elements::{
    compute_event_masks, conditional_elements, find_root_region, number_view, Branch,
    ChildInstance, EventHandler, EventMasks, IfRegion, RegionSlot, RootNode, ViewLayout,
};
use crate::error::{CompilerError, Result};
use crate::ir::{ChildDom, Handle, LifecycleStmt};
use crate::router::{plan_router_methods, RouterPlan};
use crate::session::{CompilerSession, TypeScope};
use crate::updates::{
    collect_sync_bindings, component_child_counts, component_updates, plan_state_mutator,
    ChildCounts, SyncBinding, UpdateMap,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownMode {
    /// `_destroy()`: full teardown, DOM removal unconditional.
    Destroy,
    /// `_remove_view(skip_dom_removal)`: state kept, DOM removal guarded.
    RemoveView,
}

impl TeardownMode {
    fn guarded(self) -> bool {
        self == TeardownMode::RemoveView
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// LOWERED COMPONENT
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleMethods {
    pub destroy: Vec<LifecycleStmt>,
    pub remove_view: Vec<LifecycleStmt>,
    pub get_root_element: Vec<LifecycleStmt>,
    /// `None` when neither the component nor anything it owns needs ticking.
    pub tick: Option<Vec<LifecycleStmt>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum LocalTypeKind {
    Data { fields: Vec<Field> },
    Enum { variants: Vec<String> },
}

/// A data or enum type declared inside a component, under its resolved name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalType {
    pub name: String,
    #[serde(flatten)]
    pub kind: LocalTypeKind,
}

/// `_set_<state>(value)`: assigns, then runs exactly the updates bound to `state`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateMutator {
    pub state: String,
    pub ty: String,
    pub updates: Vec<LifecycleStmt>,
}

/// `_update_<param>()`: called by the parent when a reactive prop changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropUpdate {
    pub param: String,
    pub updates: Vec<LifecycleStmt>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoweredComponent {
    pub name: String,
    pub element_count: u32,
    pub masks: EventMasks,
    pub layout: ViewLayout,
    /// Owned instances per child type.
    pub child_counts: ChildCounts,
    pub updates: UpdateMap,
    pub sync_bindings: Vec<SyncBinding>,
    pub local_types: Vec<LocalType>,
    pub mutators: Vec<StateMutator>,
    pub prop_updates: Vec<PropUpdate>,
    pub registrations: Vec<LifecycleStmt>,
    pub methods: LifecycleMethods,
    pub router: Option<RouterPlan>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// TEARDOWN
// ═══════════════════════════════════════════════════════════════════════════════

fn listener_removals<'a>(
    ids: impl IntoIterator<Item = &'a u32>,
    masks: &EventMasks,
) -> Vec<LifecycleStmt> {
    let mut out = Vec::new();
    for &id in ids {
        for event in EventKind::ALL {
            if masks.has(event, id) {
                out.push(LifecycleStmt::RemoveListener { event, element: id });
            }
        }
    }
    out
}

fn child_dom(inst: &ChildInstance, mode: TeardownMode) -> ChildDom {
    match (mode, inst.enclosed) {
        (TeardownMode::Destroy, true) => ChildDom::Skip,
        (TeardownMode::Destroy, false) => ChildDom::Remove,
        (TeardownMode::RemoveView, _) => ChildDom::Forward,
    }
}

fn child_view_removals(
    layout: &ViewLayout,
    slot: Option<RegionSlot>,
    mode: TeardownMode,
) -> Vec<LifecycleStmt> {
    layout
        .instances_in(slot)
        .map(|inst| LifecycleStmt::RemoveChildView {
            instance: inst.instance_name.clone(),
            dom: child_dom(inst, mode),
        })
        .collect()
}

fn route_teardown(route_count: usize, mode: TeardownMode) -> Vec<LifecycleStmt> {
    (0..route_count)
        .map(|index| match mode {
            TeardownMode::Destroy => LifecycleStmt::DestroyRoute { index },
            TeardownMode::RemoveView => LifecycleStmt::RemoveRouteView { index },
        })
        .collect()
}

fn region_arm(
    layout: &ViewLayout,
    masks: &EventMasks,
    region: &IfRegion,
    branch: Branch,
    mode: TeardownMode,
) -> Vec<LifecycleStmt> {
    let slot = RegionSlot {
        if_id: region.if_id,
        branch,
    };
    let mut body = listener_removals(region.elements(branch), masks);
    for nested in layout.child_regions(Some(slot)) {
        body.extend(region_conditional(layout, masks, nested, mode));
    }
    body.extend(child_view_removals(layout, Some(slot), mode));
    body
}

fn region_conditional(
    layout: &ViewLayout,
    masks: &EventMasks,
    region: &IfRegion,
    mode: TeardownMode,
) -> Option<LifecycleStmt> {
    let then_body = region_arm(layout, masks, region, Branch::Then, mode);
    let else_body = region_arm(layout, masks, region, Branch::Else, mode);
    if then_body.is_empty() && else_body.is_empty() {
        return None;
    }
    Some(LifecycleStmt::IfBranch {
        if_id: region.if_id,
        then_body,
        else_body,
    })
}

/// The top-level region whose arms hold the component's visible root, if any.
///
/// Element 0's region decides first. A view that opens with a conditional
/// producing no elements (only child components) falls back to that
/// conditional.
pub fn root_conditional(layout: &ViewLayout) -> Option<&IfRegion> {
    let Some(mut region) = find_root_region(&layout.regions) else {
        return match layout.root {
            Some(RootNode::Region { if_id }) => layout.region(if_id),
            _ => None,
        };
    };
    while let Some(parent) = region.parent {
        region = layout.region(parent.if_id)?;
    }
    Some(region)
}

/// DOM removal of a sibling list's root. Child-component roots are removed by
/// their own `_remove_view`, already emitted with the child views.
fn root_removal(
    layout: &ViewLayout,
    root: Option<&RootNode>,
    guarded: bool,
) -> Vec<LifecycleStmt> {
    match root {
        Some(RootNode::Element { id }) => vec![LifecycleStmt::RemoveElement {
            handle: Handle::Element { id: *id },
            guarded,
        }],
        Some(RootNode::Region { if_id }) => layout
            .region(*if_id)
            .and_then(|region| {
                let then_body = root_removal(layout, region.root(Branch::Then), guarded);
                let else_body = root_removal(layout, region.root(Branch::Else), guarded);
                (!then_body.is_empty() || !else_body.is_empty()).then_some(
                    LifecycleStmt::IfBranch {
                        if_id: *if_id,
                        then_body,
                        else_body,
                    },
                )
            })
            .into_iter()
            .collect(),
        Some(RootNode::Instance { .. }) | None => Vec::new(),
    }
}

fn unconditional_ids(layout: &ViewLayout) -> Vec<u32> {
    let conditional = conditional_elements(&layout.regions);
    (0..layout.element_count)
        .filter(|id| !conditional.contains(id))
        .collect()
}

pub fn plan_teardown(
    layout: &ViewLayout,
    masks: &EventMasks,
    route_count: usize,
    mode: TeardownMode,
) -> Vec<LifecycleStmt> {
    let guarded = mode.guarded();
    let mut body = Vec::new();

    if let Some(root) = root_conditional(layout) {
        body.extend(listener_removals(&unconditional_ids(layout), masks));
        for region in layout.child_regions(None).filter(|r| r.if_id != root.if_id) {
            body.extend(region_conditional(layout, masks, region, mode));
        }
        body.extend(child_view_removals(layout, None, mode));
        body.extend(route_teardown(route_count, mode));

        let arm = |branch| {
            let mut stmts = region_arm(layout, masks, root, branch, mode);
            stmts.extend(root_removal(layout, root.root(branch), guarded));
            stmts
        };
        body.push(LifecycleStmt::IfBranch {
            if_id: root.if_id,
            then_body: arm(Branch::Then),
            else_body: arm(Branch::Else),
        });
        return body;
    }

    if layout.regions.is_empty() {
        for event in EventKind::ALL {
            if masks.mask(event) != 0 {
                body.push(LifecycleStmt::RemoveMaskedListeners {
                    event,
                    element_count: layout.element_count,
                });
            }
        }
    } else {
        body.extend(listener_removals(&unconditional_ids(layout), masks));
        for region in layout.child_regions(None) {
            body.extend(region_conditional(layout, masks, region, mode));
        }
    }
    body.extend(child_view_removals(layout, None, mode));
    body.extend(route_teardown(route_count, mode));
    body.extend(root_removal(layout, layout.root.as_ref(), guarded));
    body
}

// ═══════════════════════════════════════════════════════════════════════════════
// ROOT ELEMENT & TICK
// ═══════════════════════════════════════════════════════════════════════════════

fn root_return(layout: &ViewLayout, root: Option<&RootNode>) -> LifecycleStmt {
    match root {
        Some(RootNode::Element { id }) => LifecycleStmt::Return {
            handle: Handle::Element { id: *id },
        },
        Some(RootNode::Instance { name }) => LifecycleStmt::ReturnChildRoot {
            instance: name.clone(),
        },
        Some(RootNode::Region { if_id }) => match layout.region(*if_id) {
            Some(region) => LifecycleStmt::IfBranch {
                if_id: *if_id,
                then_body: vec![root_return(layout, region.root(Branch::Then))],
                else_body: vec![root_return(layout, region.root(Branch::Else))],
            },
            None => LifecycleStmt::Return { handle: Handle::Null },
        },
        None => LifecycleStmt::Return { handle: Handle::Null },
    }
}

pub fn plan_get_root_element(layout: &ViewLayout) -> Vec<LifecycleStmt> {
    let root = match root_conditional(layout) {
        Some(region) => Some(RootNode::Region {
            if_id: region.if_id,
        }),
        None => layout.root.clone(),
    };
    vec![root_return(layout, root.as_ref())]
}

/// Reads the tick-need of every owned child and route target from the
/// session, so those must already be lowered.
pub fn plan_tick(
    component: &Component,
    layout: &ViewLayout,
    session: &CompilerSession,
) -> Option<Vec<LifecycleStmt>> {
    let mut body = Vec::new();

    if let Some(arity) = session
        .current_scope()
        .and_then(|scope| scope.method_param_count("tick"))
    {
        body.push(LifecycleStmt::CallUserTick { with_dt: arity > 0 });
    }

    body.extend(
        layout
            .instances
            .iter()
            .filter(|inst| !inst.is_member_reference && session.needs_tick(&inst.type_name))
            .map(|inst| LifecycleStmt::TickChild {
                instance: inst.instance_name.clone(),
            }),
    );

    if let Some(router) = &component.router {
        body.extend(
            router
                .routes
                .iter()
                .enumerate()
                .filter(|(_, route)| session.needs_tick(&route.qualified_name()))
                .map(|(index, _)| LifecycleStmt::TickRoute { index }),
        );
    }

    (!body.is_empty()).then_some(body)
}

// ═══════════════════════════════════════════════════════════════════════════════
// REGISTRATION
// ═══════════════════════════════════════════════════════════════════════════════

/// One registration per (element, event) pair: grouped by event type, element
/// ids ascending within each group. Several handlers of one event on one
/// element run in source order from a single listener, since the dispatcher
/// keeps one callback per handle and teardown removes it once.
pub fn plan_event_registrations(handlers: &[EventHandler]) -> Vec<LifecycleStmt> {
    let mut out = Vec::new();
    for event in EventKind::ALL {
        let mut by_element: BTreeMap<u32, Vec<&str>> = BTreeMap::new();
        for h in handlers.iter().filter(|h| h.event == event) {
            by_element
                .entry(h.element_id)
                .or_default()
                .push(h.handler.code.trim().trim_end_matches(';'));
        }
        out.extend(
            by_element
                .into_iter()
                .map(|(element, codes)| LifecycleStmt::RegisterListener {
                    event,
                    element,
                    handler: codes.join("; "),
                }),
        );
    }
    out
}

fn registrations_for(layout: &ViewLayout, ids: &BTreeSet<u32>) -> Vec<LifecycleStmt> {
    let handlers: Vec<EventHandler> = layout
        .handlers
        .iter()
        .filter(|h| ids.contains(&h.element_id))
        .cloned()
        .collect();
    plan_event_registrations(&handlers)
}

fn registration_conditional(layout: &ViewLayout, region: &IfRegion) -> Option<LifecycleStmt> {
    let arm = |branch| {
        let slot = RegionSlot {
            if_id: region.if_id,
            branch,
        };
        let mut body = registrations_for(layout, region.elements(branch));
        for nested in layout.child_regions(Some(slot)) {
            body.extend(registration_conditional(layout, nested));
        }
        body
    };
    let then_body = arm(Branch::Then);
    let else_body = arm(Branch::Else);
    if then_body.is_empty() && else_body.is_empty() {
        return None;
    }
    Some(LifecycleStmt::IfBranch {
        if_id: region.if_id,
        then_body,
        else_body,
    })
}

/// Mount-path registrations: only the active arm of each region registers.
pub fn plan_mount_registrations(layout: &ViewLayout) -> Vec<LifecycleStmt> {
    let unconditional: BTreeSet<u32> = unconditional_ids(layout).into_iter().collect();
    let mut body = registrations_for(layout, &unconditional);
    for region in layout.child_regions(None) {
        body.extend(registration_conditional(layout, region));
    }
    body
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMPONENT LOWERING
// ═══════════════════════════════════════════════════════════════════════════════

fn plan_local_types(component: &Component, scope: &TypeScope) -> Vec<LocalType> {
    let data = component.data.iter().map(|d| LocalType {
        name: scope.resolve(&d.name),
        kind: LocalTypeKind::Data {
            fields: d
                .fields
                .iter()
                .map(|f| Field {
                    name: f.name.clone(),
                    ty: scope.resolve(&f.ty),
                })
                .collect(),
        },
    });
    let enums = component.enums.iter().map(|e| LocalType {
        name: scope.resolve(&e.name),
        kind: LocalTypeKind::Enum {
            variants: e.variants.clone(),
        },
    });
    data.chain(enums).collect()
}

/// Records what parents read from the session once `lowered` is final.
pub fn record_session_facts(
    session: &mut CompilerSession,
    component: &Component,
    lowered: &LoweredComponent,
) {
    session.record_member_info(component);
    if lowered.methods.tick.is_some() {
        session.mark_tick(&component.qualified_name());
    }
}

pub fn lower_component(
    session: &mut CompilerSession,
    component: &Component,
) -> Result<LoweredComponent> {
    let name = component.qualified_name();
    debug!(component = %name, "lowering component");

    let lowered = session.in_component_scope(component, |session| -> Result<LoweredComponent> {
        let layout = number_view(component);
        let masks = compute_event_masks(&layout.handlers).map_err(|e| CompilerError {
            context: Some(format!("component {}", name)),
            ..e
        })?;

        let updates = component_updates(component);
        let sync_bindings = collect_sync_bindings(component, session);
        let router = plan_router_methods(component, &layout);
        let route_count = component.router.as_ref().map_or(0, |r| r.routes.len());

        let methods = LifecycleMethods {
            destroy: plan_teardown(&layout, &masks, route_count, TeardownMode::Destroy),
            remove_view: plan_teardown(&layout, &masks, route_count, TeardownMode::RemoveView),
            get_root_element: plan_get_root_element(&layout),
            tick: plan_tick(component, &layout, session),
        };

        let scope = session
            .current_scope()
            .cloned()
            .unwrap_or_else(|| TypeScope::for_component(component));

        let mutators = component
            .state
            .iter()
            .filter(|v| v.is_mutable)
            .map(|v| StateMutator {
                state: v.name.clone(),
                ty: scope.resolve(&v.ty),
                updates: plan_state_mutator(&updates, &v.name).to_vec(),
            })
            .collect();
        let prop_updates = component
            .params
            .iter()
            .map(|p| PropUpdate {
                param: p.name.clone(),
                updates: plan_state_mutator(&updates, &p.name).to_vec(),
            })
            .collect();

        Ok(LoweredComponent {
            name: name.clone(),
            element_count: layout.element_count,
            masks,
            registrations: plan_mount_registrations(&layout),
            local_types: plan_local_types(component, &scope),
            child_counts: component_child_counts(component),
            layout,
            updates,
            sync_bindings,
            mutators,
            prop_updates,
            methods,
            router,
        })
    })?;

    record_session_facts(session, component, &lowered);
    debug!(
        component = %name,
        elements = lowered.element_count,
        regions = lowered.layout.regions.len(),
        ticks = lowered.methods.tick.is_some(),
        "lowered component"
    );
    Ok(lowered)
}
