//! Route-child management for components with a router block.
//!
//! Each route owns one heap-allocated child (`_route_<i>`), created on
//! navigation and destroyed when another route becomes active.

use serde::{Deserialize, Serialize};

use crate::ast::Component;
use crate::elements::ViewLayout;
use crate::ir::LifecycleStmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteArm {
    pub index: usize,
    pub path: String,
    pub is_default: bool,
    pub type_name: String,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouterPlan {
    /// Element id of the `<route>` placeholder children are appended to.
    pub anchor: Option<u32>,
    /// Path-matched routes in declaration order.
    pub arms: Vec<RouteArm>,
    pub fallback: Option<RouteArm>,
    /// Runs before a new route child is created.
    pub teardown: Vec<LifecycleStmt>,
}

pub fn plan_router_methods(component: &Component, layout: &ViewLayout) -> Option<RouterPlan> {
    let router = component.router.as_ref()?;

    let mut arms = Vec::new();
    let mut fallback = None;
    for (index, route) in router.routes.iter().enumerate() {
        let arm = RouteArm {
            index,
            path: route.path.clone(),
            is_default: route.is_default,
            type_name: route.qualified_name(),
            args: route.args.iter().map(|a| a.code.clone()).collect(),
        };
        // The first `else` route wins; later ones are unreachable.
        if route.is_default {
            if fallback.is_none() {
                fallback = Some(arm);
            }
        } else {
            arms.push(arm);
        }
    }

    let teardown = (0..router.routes.len())
        .map(|index| LifecycleStmt::DestroyRoute { index })
        .collect();

    Some(RouterPlan {
        anchor: layout.route_anchor,
        arms,
        fallback,
        teardown,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::number_view;
    use serde_json::json;

    #[test]
    fn test_router_plan() {
        let c: Component = serde_json::from_value(json!({
            "name": "Shell",
            "renderRoots": [{ "type": "element", "tag": "main", "children": [{ "type": "route" }] }],
            "router": { "routes": [
                { "path": "/", "componentName": "Home" },
                { "componentName": "NotFound", "isDefault": true },
                { "path": "/docs", "componentName": "Page", "moduleName": "docs",
                  "args": [{ "code": "\"intro\"" }] }
            ]}
        }))
        .unwrap();

        let layout = number_view(&c);
        let plan = plan_router_methods(&c, &layout).unwrap();

        assert_eq!(plan.anchor, Some(1));
        let paths: Vec<&str> = plan.arms.iter().map(|a| a.path.as_str()).collect();
        assert_eq!(paths, vec!["/", "/docs"]);
        assert_eq!(plan.arms[1].type_name, "docs_Page");
        assert_eq!(plan.arms[1].args, vec!["\"intro\"".to_string()]);
        assert_eq!(plan.fallback.as_ref().map(|a| a.index), Some(1));
        assert_eq!(plan.teardown.len(), 3);
    }

    #[test]
    fn test_no_router_no_plan() {
        let c = Component {
            name: "Plain".to_string(),
            ..Default::default()
        };
        assert!(plan_router_methods(&c, &ViewLayout::default()).is_none());
    }
}
