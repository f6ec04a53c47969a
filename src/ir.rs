//! Typed statements produced by lowering.
//!
//! Lowering decides *what* runs in each generated method; `render` decides how
//! it reads as target text. Tests assert against these statements directly.

use crate::ast::EventKind;
use serde::{Deserialize, Serialize};

/// A runtime DOM handle as seen from generated code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Handle {
    /// `el[id]`
    Element { id: u32 },
    /// `_if_<id>_anchor`
    Anchor { if_id: u32 },
    /// `webcc::handle{0}`
    Null,
}

/// What a child's `_remove_view` does with its own DOM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChildDom {
    /// `true`: an enclosing local element is removed on the same path.
    Skip,
    /// `skip_dom_removal`, as passed to the caller.
    Forward,
    /// `false`: nothing local encloses the child.
    Remove,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum LifecycleStmt {
    RegisterListener {
        event: EventKind,
        element: u32,
        handler: String,
    },
    RemoveListener {
        event: EventKind,
        element: u32,
    },
    /// Loop over `el[0..element_count]`, removing every element whose bit is
    /// set in the component's mask constant for `event`.
    RemoveMaskedListeners {
        event: EventKind,
        element_count: u32,
    },
    /// DOM removal; cascades to descendants. `guarded` statements only run
    /// when the caller did not ask to skip DOM removal.
    RemoveElement {
        handle: Handle,
        guarded: bool,
    },
    /// Two-armed branch on `_if_<if_id>_state`.
    IfBranch {
        if_id: u32,
        then_body: Vec<LifecycleStmt>,
        else_body: Vec<LifecycleStmt>,
    },
    /// `<instance>._remove_view(...)`.
    RemoveChildView {
        instance: String,
        dom: ChildDom,
    },
    /// Destroys and frees `_route_<index>` if it is live, leaving it null.
    DestroyRoute {
        index: usize,
    },
    RemoveRouteView {
        index: usize,
    },
    Return {
        handle: Handle,
    },
    /// The view's root is a child component: `return <instance>._get_root_element();`
    ReturnChildRoot {
        instance: String,
    },
    CallUserTick {
        with_dt: bool,
    },
    TickChild {
        instance: String,
    },
    TickRoute {
        index: usize,
    },
    CallUpdate {
        instance: String,
        prop: String,
    },
}

impl LifecycleStmt {
    /// Depth-first visit of this statement and every statement nested in it.
    pub fn for_each<'a>(&'a self, f: &mut impl FnMut(&'a LifecycleStmt)) {
        f(self);
        if let LifecycleStmt::IfBranch {
            then_body,
            else_body,
            ..
        } = self
        {
            for stmt in then_body.iter().chain(else_body.iter()) {
                stmt.for_each(f);
            }
        }
    }
}

/// Flattens a body into the statements it contains, in source order.
pub fn flatten(body: &[LifecycleStmt]) -> Vec<&LifecycleStmt> {
    let mut out = Vec::new();
    for stmt in body {
        stmt.for_each(&mut |s| out.push(s));
    }
    out
}
