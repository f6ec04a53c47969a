//! View numbering, event masks and conditional regions.
//!
//! Every node that produces a runtime DOM handle gets a dense id in pre-order:
//! elements, text bound to state, and the `<route>` placeholder. Ids index
//! `el[]` directly in generated code.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::trace;

use crate::ast::{
    Component, ComponentInstantiation, EventKind, Expr, HtmlElement, RoutePlaceholder,
    SourceLocation, TextNode, ViewIf,
};
use crate::error::{CompilerError, Result, ERR_TOO_MANY_INTERACTIVE, MAX_INTERACTIVE_ELEMENTS};
use crate::updates::InstanceNamer;
use crate::visitor::{walk_component_view, walk_element, ViewVisitor};

// ═══════════════════════════════════════════════════════════════════════════════
// LAYOUT TYPES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Branch {
    Then,
    Else,
}

/// One arm of one conditional region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionSlot {
    pub if_id: u32,
    pub branch: Branch,
}

/// The first DOM-producing node of a sibling list: what that list presents
/// as its root once mounted. Static text produces no node and is skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum RootNode {
    Element { id: u32 },
    Instance { name: String },
    /// Resolved through the region's own arm roots at runtime.
    Region { if_id: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IfRegion {
    pub if_id: u32,
    /// Elements whose innermost enclosing region is this one, then-arm.
    pub then_element_ids: BTreeSet<u32>,
    pub else_element_ids: BTreeSet<u32>,
    /// Root of each arm's sibling list.
    pub then_root: Option<RootNode>,
    pub else_root: Option<RootNode>,
    pub parent: Option<RegionSlot>,
    pub location: SourceLocation,
}

impl IfRegion {
    pub fn elements(&self, branch: Branch) -> &BTreeSet<u32> {
        match branch {
            Branch::Then => &self.then_element_ids,
            Branch::Else => &self.else_element_ids,
        }
    }

    pub fn root(&self, branch: Branch) -> Option<&RootNode> {
        match branch {
            Branch::Then => self.then_root.as_ref(),
            Branch::Else => self.else_root.as_ref(),
        }
    }

    fn elements_mut(&mut self, branch: Branch) -> &mut BTreeSet<u32> {
        match branch {
            Branch::Then => &mut self.then_element_ids,
            Branch::Else => &mut self.else_element_ids,
        }
    }

    fn root_mut(&mut self, branch: Branch) -> &mut Option<RootNode> {
        match branch {
            Branch::Then => &mut self.then_root,
            Branch::Else => &mut self.else_root,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventHandler {
    pub element_id: u32,
    pub event: EventKind,
    pub handler: Expr,
    pub location: SourceLocation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildInstance {
    pub type_name: String,
    pub instance_name: String,
    pub is_member_reference: bool,
    /// Innermost region arm the instantiation sits in; `None` when unconditional.
    pub slot: Option<RegionSlot>,
    /// Nested inside a local element, whose DOM removal takes the child's with it.
    pub enclosed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewLayout {
    pub element_count: u32,
    pub handlers: Vec<EventHandler>,
    /// Indexed by region id (pre-order).
    pub regions: Vec<IfRegion>,
    pub instances: Vec<ChildInstance>,
    pub route_anchor: Option<u32>,
    /// Root of the component's top-level sibling list.
    pub root: Option<RootNode>,
}

impl ViewLayout {
    pub fn region(&self, if_id: u32) -> Option<&IfRegion> {
        self.regions.get(if_id as usize)
    }

    /// Regions directly inside `parent` (`None` for top-level regions).
    pub fn child_regions(&self, parent: Option<RegionSlot>) -> impl Iterator<Item = &IfRegion> {
        self.regions.iter().filter(move |r| r.parent == parent)
    }

    pub fn instances_in(&self, slot: Option<RegionSlot>) -> impl Iterator<Item = &ChildInstance> {
        self.instances.iter().filter(move |i| i.slot == slot)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// NUMBERING
// ═══════════════════════════════════════════════════════════════════════════════

/// A sibling list being numbered: the view's top level or one region arm.
#[derive(Default)]
struct SiblingFrame {
    element_depth: u32,
    root: Option<RootNode>,
}

#[derive(Default)]
struct ViewNumberer {
    next_id: u32,
    element_depth: u32,
    slots: Vec<RegionSlot>,
    frames: Vec<SiblingFrame>,
    namer: InstanceNamer,
    layout: ViewLayout,
}

impl ViewNumberer {
    fn assign(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;

        if let Some(innermost) = self.slots.last().copied() {
            self.layout.regions[innermost.if_id as usize]
                .elements_mut(innermost.branch)
                .insert(id);
        }
        self.claim_root(RootNode::Element { id });
        id
    }

    /// Records `node` as the current list's root if it is the list's first
    /// direct DOM-producing node.
    fn claim_root(&mut self, node: RootNode) {
        if let Some(frame) = self.frames.last_mut() {
            if frame.root.is_none() && frame.element_depth == self.element_depth {
                frame.root = Some(node);
            }
        }
    }

    fn open_frame(&mut self) {
        self.frames.push(SiblingFrame {
            element_depth: self.element_depth,
            root: None,
        });
    }

    fn close_frame(&mut self) -> Option<RootNode> {
        self.frames.pop().and_then(|f| f.root)
    }
}

impl ViewVisitor for ViewNumberer {
    fn visit_element(&mut self, element: &HtmlElement) {
        let id = self.assign();
        trace!(id, tag = %element.tag, "numbered element");
        for binding in &element.handlers {
            self.layout.handlers.push(EventHandler {
                element_id: id,
                event: binding.event,
                handler: binding.handler.clone(),
                location: element.location,
            });
        }
        self.element_depth += 1;
        walk_element(self, element);
        self.element_depth -= 1;
    }

    fn visit_text(&mut self, text: &TextNode) {
        if text.has_handle() {
            let id = self.assign();
            trace!(id, "numbered bound text");
        }
    }

    fn visit_instantiation(&mut self, inst: &ComponentInstantiation) {
        let instance_name = self.namer.name_for(inst);
        self.claim_root(RootNode::Instance {
            name: instance_name.clone(),
        });
        self.layout.instances.push(ChildInstance {
            type_name: inst.qualified_name(),
            instance_name,
            is_member_reference: inst.is_member_reference,
            slot: self.slots.last().copied(),
            enclosed: self.element_depth > 0,
        });
    }

    fn visit_if(&mut self, view_if: &ViewIf) {
        let if_id = self.layout.regions.len() as u32;
        self.claim_root(RootNode::Region { if_id });
        self.layout.regions.push(IfRegion {
            if_id,
            then_element_ids: BTreeSet::new(),
            else_element_ids: BTreeSet::new(),
            then_root: None,
            else_root: None,
            parent: self.slots.last().copied(),
            location: view_if.location,
        });

        for (branch, children) in [
            (Branch::Then, &view_if.then_children),
            (Branch::Else, &view_if.else_children),
        ] {
            self.slots.push(RegionSlot { if_id, branch });
            self.open_frame();
            self.visit_children(children);
            let root = self.close_frame();
            *self.layout.regions[if_id as usize].root_mut(branch) = root;
            self.slots.pop();
        }
    }

    fn visit_route(&mut self, _route: &RoutePlaceholder) {
        let id = self.assign();
        self.layout.route_anchor = Some(id);
    }
}

pub fn number_view(component: &Component) -> ViewLayout {
    let mut numberer = ViewNumberer::default();
    numberer.open_frame();
    walk_component_view(&mut numberer, component);
    numberer.layout.root = numberer.close_frame();
    numberer.layout.element_count = numberer.next_id;
    numberer.layout
}

// ═══════════════════════════════════════════════════════════════════════════════
// EVENT MASKS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMasks {
    pub click: u64,
    pub input: u64,
    pub change: u64,
    pub keydown: u64,
}

impl EventMasks {
    pub fn mask(&self, event: EventKind) -> u64 {
        match event {
            EventKind::Click => self.click,
            EventKind::Input => self.input,
            EventKind::Change => self.change,
            EventKind::Keydown => self.keydown,
        }
    }

    fn mask_mut(&mut self, event: EventKind) -> &mut u64 {
        match event {
            EventKind::Click => &mut self.click,
            EventKind::Input => &mut self.input,
            EventKind::Change => &mut self.change,
            EventKind::Keydown => &mut self.keydown,
        }
    }

    pub fn has(&self, event: EventKind, element_id: u32) -> bool {
        element_id < MAX_INTERACTIVE_ELEMENTS && self.mask(event) & (1u64 << element_id) != 0
    }

    pub fn any(&self) -> bool {
        EventKind::ALL.iter().any(|e| self.mask(*e) != 0)
    }
}

pub fn compute_event_masks(handlers: &[EventHandler]) -> Result<EventMasks> {
    let mut masks = EventMasks::default();
    for h in handlers {
        if h.element_id >= MAX_INTERACTIVE_ELEMENTS {
            return Err(CompilerError::with_details(
                ERR_TOO_MANY_INTERACTIVE,
                &format!(
                    "Too many interactive elements in one component: element {} has an `on{}` handler",
                    h.element_id,
                    h.event.as_str()
                ),
                "",
                h.location.line,
                h.location.column,
                None,
                vec![format!(
                    "Only the first {} DOM nodes of a component can carry listeners; split the view into child components.",
                    MAX_INTERACTIVE_ELEMENTS
                )],
            ));
        }
        *masks.mask_mut(h.event) |= 1u64 << h.element_id;
    }
    Ok(masks)
}

pub fn get_elements_for_event(handlers: &[EventHandler], event: EventKind) -> BTreeSet<u32> {
    handlers
        .iter()
        .filter(|h| h.event == event)
        .map(|h| h.element_id)
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════════════
// REGIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// The region deciding which node is the component's visible root. Then-arm
/// membership of element 0 is checked across all regions before else-arm.
pub fn find_root_region(regions: &[IfRegion]) -> Option<&IfRegion> {
    regions
        .iter()
        .find(|r| r.then_element_ids.contains(&0))
        .or_else(|| regions.iter().find(|r| r.else_element_ids.contains(&0)))
}

/// Every element id that only exists while some region arm is active.
pub fn conditional_elements(regions: &[IfRegion]) -> BTreeSet<u32> {
    regions
        .iter()
        .flat_map(|r| r.then_element_ids.iter().chain(r.else_element_ids.iter()))
        .copied()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::ViewNode;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn component(view: serde_json::Value) -> Component {
        serde_json::from_value(json!({ "name": "Test", "renderRoots": view })).unwrap()
    }

    fn handler(element_id: u32, event: EventKind) -> EventHandler {
        EventHandler {
            element_id,
            event,
            handler: Expr::new("onTap()"),
            location: SourceLocation::default(),
        }
    }

    #[test]
    fn test_mask_correctness() {
        let masks = compute_event_masks(&[handler(1, EventKind::Click)]).unwrap();
        assert_eq!(masks.click, 0b010);
        assert_eq!(masks.input, 0);
        assert_eq!(masks.change, 0);
        assert_eq!(masks.keydown, 0);
        assert!(masks.has(EventKind::Click, 1));
        assert!(!masks.has(EventKind::Click, 0));
    }

    #[test]
    fn test_mask_overflow_is_fatal() {
        let err = compute_event_masks(&[handler(63, EventKind::Input), handler(64, EventKind::Click)])
            .unwrap_err();
        assert_eq!(err.code, ERR_TOO_MANY_INTERACTIVE);
    }

    #[test]
    fn test_elements_for_event_are_ordered() {
        let handlers = vec![
            handler(4, EventKind::Click),
            handler(1, EventKind::Click),
            handler(2, EventKind::Keydown),
        ];
        let ids: Vec<u32> = get_elements_for_event(&handlers, EventKind::Click).into_iter().collect();
        assert_eq!(ids, vec![1, 4]);
    }

    #[test]
    fn test_numbering_skips_static_text_and_children() {
        let c = component(json!([{
            "type": "element",
            "tag": "div",
            "children": [
                { "type": "text", "value": { "code": "\"Total: \"" } },
                { "type": "text", "value": { "code": "count", "dependencies": ["count"] } },
                { "type": "component", "componentName": "Badge" },
                { "type": "element", "tag": "button",
                  "handlers": [{ "event": "click", "handler": { "code": "inc()" } }] },
                { "type": "route" }
            ]
        }]));

        let layout = number_view(&c);
        assert_eq!(layout.element_count, 4);
        assert_eq!(layout.handlers.len(), 1);
        assert_eq!(layout.handlers[0].element_id, 2);
        assert_eq!(layout.route_anchor, Some(3));
        assert_eq!(layout.instances[0].instance_name, "Badge_0");
        assert!(layout.regions.is_empty());
    }

    #[test]
    fn test_root_level_region() {
        let c = component(json!([{
            "type": "if",
            "condition": { "code": "loggedIn", "dependencies": ["loggedIn"] },
            "thenChildren": [{ "type": "element", "tag": "main", "children": [
                { "type": "element", "tag": "span" }
            ]}],
            "elseChildren": [{ "type": "element", "tag": "form" }]
        }]));

        let layout = number_view(&c);
        let region = &layout.regions[0];
        assert_eq!(region.then_element_ids, BTreeSet::from([0, 1]));
        assert_eq!(region.else_element_ids, BTreeSet::from([2]));
        assert_eq!(region.root(Branch::Then), Some(&RootNode::Element { id: 0 }));
        assert_eq!(region.root(Branch::Else), Some(&RootNode::Element { id: 2 }));
        assert_eq!(layout.root, Some(RootNode::Region { if_id: 0 }));
        assert_eq!(find_root_region(&layout.regions).map(|r| r.if_id), Some(0));
    }

    #[test]
    fn test_nested_regions_hold_innermost_elements() {
        let c = component(json!([{
            "type": "element",
            "tag": "div",
            "children": [{
                "type": "if",
                "condition": { "code": "a", "dependencies": ["a"] },
                "thenChildren": [
                    { "type": "element", "tag": "p" },
                    {
                        "type": "if",
                        "condition": { "code": "b", "dependencies": ["b"] },
                        "thenChildren": [{ "type": "component", "componentName": "Chart" }],
                        "elseChildren": [{ "type": "element", "tag": "em" }]
                    }
                ]
            }]
        }]));

        let layout = number_view(&c);
        assert_eq!(layout.regions.len(), 2);
        assert_eq!(layout.regions[0].then_element_ids, BTreeSet::from([1]));
        assert_eq!(layout.regions[1].else_element_ids, BTreeSet::from([2]));
        assert_eq!(
            layout.regions[1].parent,
            Some(RegionSlot { if_id: 0, branch: Branch::Then })
        );
        assert_eq!(
            layout.instances[0].slot,
            Some(RegionSlot { if_id: 1, branch: Branch::Then })
        );
        assert!(layout.instances[0].enclosed);
        assert!(find_root_region(&layout.regions).is_none());
        assert_eq!(conditional_elements(&layout.regions), BTreeSet::from([1, 2]));
        assert_eq!(layout.child_regions(None).count(), 1);
    }

    #[test]
    fn test_arm_roots_follow_direct_children() {
        let c = component(json!([{
            "type": "if",
            "condition": { "code": "a" },
            "thenChildren": [
                { "type": "text", "value": { "code": "\"label\"" } },
                { "type": "if", "condition": { "code": "b" },
                  "thenChildren": [{ "type": "element", "tag": "div" }],
                  "elseChildren": [{ "type": "component", "componentName": "Card" }] },
                { "type": "element", "tag": "span" }
            ],
            "elseChildren": [{ "type": "element", "tag": "p", "children": [
                { "type": "component", "componentName": "Card" }
            ]}]
        }]));

        let layout = number_view(&c);
        assert_eq!(layout.root, Some(RootNode::Region { if_id: 0 }));
        assert_eq!(layout.regions[0].root(Branch::Then), Some(&RootNode::Region { if_id: 1 }));
        assert_eq!(layout.regions[0].root(Branch::Else), Some(&RootNode::Element { id: 2 }));
        assert_eq!(layout.regions[1].root(Branch::Then), Some(&RootNode::Element { id: 0 }));
        assert_eq!(
            layout.regions[1].root(Branch::Else),
            Some(&RootNode::Instance { name: "Card_0".to_string() })
        );
        assert!(!layout.instances[0].enclosed);
        assert!(layout.instances[1].enclosed);
    }

    #[test]
    fn test_component_at_view_root() {
        let c = component(json!([{ "type": "component", "componentName": "Card" }]));
        let layout = number_view(&c);
        assert_eq!(layout.element_count, 0);
        assert_eq!(layout.root, Some(RootNode::Instance { name: "Card_0".to_string() }));
        assert!(!layout.instances[0].enclosed);
    }

    #[test]
    fn test_root_detection_prefers_then_arm() {
        let regions = vec![
            IfRegion {
                if_id: 0,
                then_element_ids: BTreeSet::new(),
                else_element_ids: BTreeSet::from([0]),
                then_root: None,
                else_root: Some(RootNode::Element { id: 0 }),
                parent: None,
                location: SourceLocation::default(),
            },
            IfRegion {
                if_id: 1,
                then_element_ids: BTreeSet::from([0]),
                else_element_ids: BTreeSet::new(),
                then_root: Some(RootNode::Element { id: 0 }),
                else_root: None,
                parent: None,
                location: SourceLocation::default(),
            },
        ];
        assert_eq!(find_root_region(&regions).map(|r| r.if_id), Some(1));
    }

    #[test]
    fn test_view_node_count_matches_handles() {
        let c = Component {
            name: "Empty".to_string(),
            render_roots: vec![ViewNode::Text(TextNode {
                value: Expr::new("\"static\""),
                location: SourceLocation::default(),
            })],
            ..Default::default()
        };
        assert_eq!(number_view(&c).element_count, 0);
    }
}
