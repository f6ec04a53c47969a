//! AST forest handed over by the front end.
//!
//! The parser lives outside this crate; it serializes one `Program` (or several
//! fragments, see `discovery`) as JSON. Everything here is plain owned data:
//! a component owns its view tree, and every view node owns its children.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// ═══════════════════════════════════════════════════════════════════════════════
// LOCATIONS & EXPRESSIONS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct SourceLocation {
    pub line: u32,
    #[serde(default)]
    pub column: u32,
}

/// An expression the front end has already parsed. We never look inside
/// `code` structurally; the identifiers it reads were collected upstream.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct Expr {
    pub code: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl Expr {
    pub fn new(code: &str) -> Self {
        Expr {
            code: code.to_string(),
            dependencies: Vec::new(),
        }
    }

    pub fn with_deps(code: &str, deps: &[&str]) -> Self {
        Expr {
            code: code.to_string(),
            dependencies: deps.iter().map(|d| d.to_string()).collect(),
        }
    }

    pub fn collect_dependencies(&self, deps: &mut BTreeSet<String>) {
        deps.extend(self.dependencies.iter().cloned());
    }

    pub fn is_static(&self) -> bool {
        self.dependencies.is_empty()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PROGRAM
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Program {
    #[serde(default)]
    pub components: Vec<Component>,
    #[serde(default)]
    pub app: AppConfig,
    /// Runtime headers the front end resolved from the standard-library schema.
    #[serde(default)]
    pub headers: BTreeSet<String>,
}

impl Program {
    pub fn component(&self, qualified: &str) -> Option<&Component> {
        self.components
            .iter()
            .find(|c| c.qualified_name() == qualified)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    #[serde(default)]
    pub root_component: String,
    #[serde(default)]
    pub routes: BTreeMap<String, String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_lang")]
    pub lang: String,
}

fn default_lang() -> String {
    "en".to_string()
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMPONENT & DECLARATIONS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    pub name: String,
    #[serde(default)]
    pub module_name: String,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub data: Vec<DataDef>,
    #[serde(default)]
    pub enums: Vec<EnumDef>,
    #[serde(default)]
    pub state: Vec<VarDeclaration>,
    #[serde(default)]
    pub params: Vec<ComponentParam>,
    #[serde(default)]
    pub methods: Vec<FunctionDef>,
    #[serde(default)]
    pub render_roots: Vec<ViewNode>,
    #[serde(default)]
    pub router: Option<RouterDef>,
    #[serde(default)]
    pub location: SourceLocation,
}

impl Component {
    pub fn qualified_name(&self) -> String {
        qualified_name(&self.module_name, &self.name)
    }

    /// Logic-only components have no view and cannot be instantiated in one.
    pub fn has_view(&self) -> bool {
        !self.render_roots.is_empty()
    }

    pub fn method(&self, name: &str) -> Option<&FunctionDef> {
        self.methods.iter().find(|m| m.name == name)
    }
}

pub fn qualified_name(module: &str, name: &str) -> String {
    if module.is_empty() {
        name.to_string()
    } else {
        format!("{}_{}", module, name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DataDef {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<Field>,
    #[serde(default)]
    pub location: SourceLocation,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct EnumDef {
    pub name: String,
    #[serde(default)]
    pub variants: Vec<String>,
    #[serde(default)]
    pub location: SourceLocation,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct VarDeclaration {
    pub name: String,
    #[serde(rename = "type", default)]
    pub ty: String,
    #[serde(default)]
    pub initializer: Option<Expr>,
    #[serde(default)]
    pub is_mutable: bool,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub location: SourceLocation,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ComponentParam {
    pub name: String,
    #[serde(rename = "type", default)]
    pub ty: String,
    #[serde(default)]
    pub default_value: Option<Expr>,
    #[serde(default)]
    pub is_mutable: bool,
    #[serde(default)]
    pub is_public: bool,
    /// Declared as `&name`: the parent passes a reference, not a copy.
    #[serde(default)]
    pub is_reference: bool,
    #[serde(default)]
    pub location: SourceLocation,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Param {
    pub name: String,
    #[serde(rename = "type", default)]
    pub ty: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct FunctionDef {
    pub name: String,
    #[serde(default)]
    pub params: Vec<Param>,
    #[serde(default = "default_return_type")]
    pub return_type: String,
    /// Body source as written; only scanned for runtime facility usage.
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub location: SourceLocation,
}

fn default_return_type() -> String {
    "void".to_string()
}

// ═══════════════════════════════════════════════════════════════════════════════
// VIEW TREE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ViewNode {
    Element(HtmlElement),
    Text(TextNode),
    Component(ComponentInstantiation),
    If(ViewIf),
    Route(RoutePlaceholder),
}

impl ViewNode {
    pub fn location(&self) -> SourceLocation {
        match self {
            ViewNode::Element(e) => e.location,
            ViewNode::Text(t) => t.location,
            ViewNode::Component(c) => c.location,
            ViewNode::If(i) => i.location,
            ViewNode::Route(r) => r.location,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Click,
    Input,
    Change,
    Keydown,
}

impl EventKind {
    pub const ALL: [EventKind; 4] = [
        EventKind::Click,
        EventKind::Input,
        EventKind::Change,
        EventKind::Keydown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Click => "click",
            EventKind::Input => "input",
            EventKind::Change => "change",
            EventKind::Keydown => "keydown",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attribute {
    pub name: String,
    pub value: Expr,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventBinding {
    pub event: EventKind,
    pub handler: Expr,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct HtmlElement {
    pub tag: String,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    #[serde(default)]
    pub handlers: Vec<EventBinding>,
    #[serde(default)]
    pub children: Vec<ViewNode>,
    #[serde(default)]
    pub location: SourceLocation,
}

/// Text content. Static text is baked into its parent's markup; text bound
/// to state gets its own DOM handle so updates can write to it directly.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TextNode {
    pub value: Expr,
    #[serde(default)]
    pub location: SourceLocation,
}

impl TextNode {
    pub fn has_handle(&self) -> bool {
        !self.value.is_static()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PropBinding {
    pub name: String,
    pub value: Expr,
    /// Reactive binding: re-evaluated whenever one of its dependencies changes.
    #[serde(default)]
    pub is_reference: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ComponentInstantiation {
    pub component_name: String,
    #[serde(default)]
    pub module_prefix: String,
    #[serde(default)]
    pub props: Vec<PropBinding>,
    #[serde(default)]
    pub is_member_reference: bool,
    #[serde(default)]
    pub member_name: String,
    #[serde(default)]
    pub location: SourceLocation,
}

impl ComponentInstantiation {
    pub fn qualified_name(&self) -> String {
        qualified_name(&self.module_prefix, &self.component_name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ViewIf {
    pub condition: Expr,
    #[serde(default)]
    pub then_children: Vec<ViewNode>,
    #[serde(default)]
    pub else_children: Vec<ViewNode>,
    #[serde(default)]
    pub location: SourceLocation,
}

/// `<route />`: where the active route child is mounted.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RoutePlaceholder {
    #[serde(default)]
    pub location: SourceLocation,
}

// ═══════════════════════════════════════════════════════════════════════════════
// ROUTER
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RouteEntry {
    /// Empty for the default (`else`) route.
    #[serde(default)]
    pub path: String,
    pub component_name: String,
    /// Filled in by type resolution.
    #[serde(default)]
    pub module_name: String,
    #[serde(default)]
    pub args: Vec<Expr>,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub location: SourceLocation,
}

impl RouteEntry {
    pub fn qualified_name(&self) -> String {
        qualified_name(&self.module_name, &self.component_name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RouterDef {
    #[serde(default)]
    pub routes: Vec<RouteEntry>,
    #[serde(default)]
    pub location: SourceLocation,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_view_node_tagging() {
        let node: ViewNode = serde_json::from_value(json!({
            "type": "if",
            "condition": { "code": "open", "dependencies": ["open"] },
            "thenChildren": [{ "type": "element", "tag": "div" }],
            "elseChildren": [{ "type": "route" }]
        }))
        .unwrap();

        match node {
            ViewNode::If(view_if) => {
                assert_eq!(view_if.condition.dependencies, vec!["open".to_string()]);
                assert!(matches!(view_if.then_children[0], ViewNode::Element(_)));
                assert!(matches!(view_if.else_children[0], ViewNode::Route(_)));
            }
            other => panic!("expected if node, got {:?}", other),
        }
    }

    #[test]
    fn test_qualified_names() {
        assert_eq!(qualified_name("", "Counter"), "Counter");
        assert_eq!(qualified_name("ui", "Button"), "ui_Button");

        let inst = ComponentInstantiation {
            component_name: "Button".to_string(),
            module_prefix: "ui".to_string(),
            ..Default::default()
        };
        assert_eq!(inst.qualified_name(), "ui_Button");
    }

    #[test]
    fn test_text_handles() {
        let fixed = TextNode {
            value: Expr::new("\"hello\""),
            location: SourceLocation::default(),
        };
        let bound = TextNode {
            value: Expr::with_deps("count", &["count"]),
            location: SourceLocation::default(),
        };
        assert!(!fixed.has_handle());
        assert!(bound.has_handle());
    }
}
