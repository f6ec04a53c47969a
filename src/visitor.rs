use crate::ast::{
    Component, ComponentInstantiation, HtmlElement, RoutePlaceholder, TextNode, ViewIf, ViewNode,
};

/// Walk over one component's view forest.
///
/// Pre-order: an element is visited before its children, and a conditional's
/// then-arm is walked completely before its else-arm. Element numbering and
/// region ids depend on this order.
///
/// Child component instantiations and `<route>` placeholders are leaves. A
/// child's view belongs to the child's own lowering and is never entered from
/// the parent.
///
/// Override a `visit_*` method and call the matching `walk_*` function from it
/// to keep descending.
pub trait ViewVisitor {
    fn visit_component_view(&mut self, component: &Component) {
        walk_component_view(self, component);
    }

    fn visit_node(&mut self, node: &ViewNode) {
        walk_node(self, node);
    }

    fn visit_element(&mut self, element: &HtmlElement) {
        walk_element(self, element);
    }

    fn visit_text(&mut self, _text: &TextNode) {
        // Leaf node, nothing to walk by default
    }

    fn visit_instantiation(&mut self, _inst: &ComponentInstantiation) {
        // Child components own their own views; never walked from the parent
    }

    fn visit_if(&mut self, view_if: &ViewIf) {
        walk_if(self, view_if);
    }

    fn visit_route(&mut self, _route: &RoutePlaceholder) {}

    fn visit_children(&mut self, children: &[ViewNode]) {
        walk_children(self, children);
    }
}

pub fn walk_component_view<V: ViewVisitor + ?Sized>(visitor: &mut V, component: &Component) {
    visitor.visit_children(&component.render_roots);
}

pub fn walk_children<V: ViewVisitor + ?Sized>(visitor: &mut V, children: &[ViewNode]) {
    for node in children {
        visitor.visit_node(node);
    }
}

pub fn walk_node<V: ViewVisitor + ?Sized>(visitor: &mut V, node: &ViewNode) {
    match node {
        ViewNode::Element(el) => visitor.visit_element(el),
        ViewNode::Text(t) => visitor.visit_text(t),
        ViewNode::Component(c) => visitor.visit_instantiation(c),
        ViewNode::If(i) => visitor.visit_if(i),
        ViewNode::Route(r) => visitor.visit_route(r),
    }
}

pub fn walk_element<V: ViewVisitor + ?Sized>(visitor: &mut V, element: &HtmlElement) {
    visitor.visit_children(&element.children);
}

pub fn walk_if<V: ViewVisitor + ?Sized>(visitor: &mut V, view_if: &ViewIf) {
    visitor.visit_children(&view_if.then_children);
    visitor.visit_children(&view_if.else_children);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Expr, SourceLocation};

    #[derive(Default)]
    struct TagCollector {
        tags: Vec<String>,
    }

    impl ViewVisitor for TagCollector {
        fn visit_element(&mut self, element: &HtmlElement) {
            self.tags.push(element.tag.clone());
            walk_element(self, element);
        }

        fn visit_instantiation(&mut self, inst: &ComponentInstantiation) {
            self.tags.push(format!("<{}>", inst.component_name));
        }
    }

    fn el(tag: &str, children: Vec<ViewNode>) -> ViewNode {
        ViewNode::Element(HtmlElement {
            tag: tag.to_string(),
            children,
            ..Default::default()
        })
    }

    #[test]
    fn test_traversal_order_then_before_else() {
        let tree = vec![el(
            "div",
            vec![
                ViewNode::If(ViewIf {
                    condition: Expr::with_deps("flag", &["flag"]),
                    then_children: vec![el("a", vec![])],
                    else_children: vec![
                        el("b", vec![]),
                        ViewNode::Component(ComponentInstantiation {
                            component_name: "Child".to_string(),
                            ..Default::default()
                        }),
                    ],
                    location: SourceLocation::default(),
                }),
                el("c", vec![]),
            ],
        )];

        let mut collector = TagCollector::default();
        collector.visit_children(&tree);
        assert_eq!(collector.tags, vec!["div", "a", "b", "<Child>", "c"]);
    }
}
