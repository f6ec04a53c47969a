//! Whole-program validation.
//!
//! Runs once over the full component set before anything is lowered. The
//! first violation aborts compilation.

use std::collections::BTreeMap;

use crate::ast::{Component, Program, RoutePlaceholder, ViewNode};
use crate::elements::{compute_event_masks, number_view};
use crate::error::{
    CompilerError, Result, ERR_LOGIC_ONLY_IN_VIEW, ERR_NO_ROOT_COMPONENT,
    ERR_PLACEHOLDER_WITHOUT_ROUTER, ERR_ROUTER_WITHOUT_PLACEHOLDER, ERR_UNKNOWN_ROOT_COMPONENT,
    ERR_UNKNOWN_ROUTE_TARGET,
};

type ComponentMap<'a> = BTreeMap<String, &'a Component>;

fn component_context(component: &Component) -> Option<String> {
    Some(format!("in component {}", component.qualified_name()))
}

// ═══════════════════════════════════════════════════════════════════════════════
// VALIDATION FUNCTIONS (Return Option, not Result)
// ═══════════════════════════════════════════════════════════════════════════════

fn validate_root(program: &Program, root: &str) -> Option<CompilerError> {
    if root.is_empty() {
        return Some(CompilerError::with_details(
            ERR_NO_ROOT_COMPONENT,
            "No root component defined.",
            "",
            0,
            0,
            None,
            vec!["Use 'app { root = ComponentName }' to define the entry point.".to_string()],
        ));
    }
    if program.component(root).is_none() {
        return Some(CompilerError::new(
            ERR_UNKNOWN_ROOT_COMPONENT,
            &format!("Root component '{}' is not defined.", root),
            "",
            0,
            0,
        ));
    }
    None
}

fn validate_view_hierarchy(component: &Component, known: &ComponentMap) -> Option<CompilerError> {
    for node in &component.render_roots {
        if let Some(e) = check_node_for_logic_only(node, component, known) {
            return Some(e);
        }
    }
    None
}

fn check_node_for_logic_only(
    node: &ViewNode,
    owner: &Component,
    known: &ComponentMap,
) -> Option<CompilerError> {
    match node {
        ViewNode::Component(inst) => {
            let target = known.get(&inst.qualified_name())?;
            if target.has_view() {
                return None;
            }
            Some(CompilerError::with_details(
                ERR_LOGIC_ONLY_IN_VIEW,
                &format!(
                    "Component '{}' is used in a view but has no view definition (logic-only component)",
                    inst.component_name
                ),
                "",
                inst.location.line,
                inst.location.column,
                component_context(owner),
                vec![],
            ))
        }
        ViewNode::Element(el) => el
            .children
            .iter()
            .find_map(|child| check_node_for_logic_only(child, owner, known)),
        ViewNode::If(view_if) => view_if
            .then_children
            .iter()
            .chain(view_if.else_children.iter())
            .find_map(|child| check_node_for_logic_only(child, owner, known)),
        ViewNode::Text(_) | ViewNode::Route(_) => None,
    }
}

fn find_route_placeholder(nodes: &[ViewNode]) -> Option<&RoutePlaceholder> {
    nodes.iter().find_map(|node| match node {
        ViewNode::Route(r) => Some(r),
        ViewNode::Element(el) => find_route_placeholder(&el.children),
        ViewNode::If(view_if) => find_route_placeholder(&view_if.then_children)
            .or_else(|| find_route_placeholder(&view_if.else_children)),
        ViewNode::Text(_) | ViewNode::Component(_) => None,
    })
}

fn validate_router(component: &Component, known: &ComponentMap) -> Option<CompilerError> {
    let placeholder = find_route_placeholder(&component.render_roots);

    let Some(router) = &component.router else {
        let placeholder = placeholder?;
        return Some(CompilerError::with_details(
            ERR_PLACEHOLDER_WITHOUT_ROUTER,
            "<route /> is used but the component has no router block",
            "",
            placeholder.location.line,
            placeholder.location.column,
            component_context(component),
            vec![],
        ));
    };

    if placeholder.is_none() {
        return Some(CompilerError::with_details(
            ERR_ROUTER_WITHOUT_PLACEHOLDER,
            "Component has a router block but no <route /> placeholder in its view",
            "",
            router.location.line,
            router.location.column,
            component_context(component),
            vec!["Add <route /> where the active route should be mounted.".to_string()],
        ));
    }

    router.routes.iter().find_map(|route| {
        if known.contains_key(&route.qualified_name()) {
            return None;
        }
        Some(CompilerError::with_details(
            ERR_UNKNOWN_ROUTE_TARGET,
            &format!(
                "Route '{}' targets unknown component '{}'",
                route.path, route.component_name
            ),
            "",
            route.location.line,
            route.location.column,
            component_context(component),
            vec![],
        ))
    })
}

fn validate_interactive_capacity(component: &Component) -> Option<CompilerError> {
    let layout = number_view(component);
    compute_event_masks(&layout.handlers)
        .err()
        .map(|e| CompilerError {
            context: component_context(component),
            ..e
        })
}

// ═══════════════════════════════════════════════════════════════════════════════
// ENTRY POINT
// ═══════════════════════════════════════════════════════════════════════════════

pub fn validate_program(program: &Program, root: &str) -> Result<()> {
    if let Some(e) = validate_root(program, root) {
        return Err(e);
    }

    let mut known = ComponentMap::new();
    for c in &program.components {
        known.entry(c.qualified_name()).or_insert(c);
    }

    for component in &program.components {
        let checks = [
            validate_view_hierarchy(component, &known),
            validate_router(component, &known),
            validate_interactive_capacity(component),
        ];
        if let Some(e) = checks.into_iter().flatten().next() {
            return Err(e);
        }
    }
    Ok(())
}
