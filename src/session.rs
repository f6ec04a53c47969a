//! Whole-program lowering context.
//!
//! One `CompilerSession` is created per program and threaded by reference
//! through every pass. Facts only grow: a component's tick-need and member
//! info are recorded after it is lowered and read by the components that
//! instantiate it, which the dependency order always lowers later.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::ast::Component;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentMemberInfo {
    pub pub_mut_members: BTreeSet<String>,
}

#[derive(Debug, Default)]
pub struct CompilerSession {
    pub components_with_tick: BTreeSet<String>,
    pub component_info: BTreeMap<String, ComponentMemberInfo>,
    scopes: Vec<TypeScope>,
}

impl CompilerSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn needs_tick(&self, type_name: &str) -> bool {
        self.components_with_tick.contains(type_name)
    }

    pub fn mark_tick(&mut self, type_name: &str) {
        self.components_with_tick.insert(type_name.to_string());
    }

    /// Records which parameters and state of `component` are both `pub` and `mut`.
    pub fn record_member_info(&mut self, component: &Component) {
        let pub_mut_members = component
            .params
            .iter()
            .filter(|p| p.is_public && p.is_mutable)
            .map(|p| p.name.clone())
            .chain(
                component
                    .state
                    .iter()
                    .filter(|v| v.is_public && v.is_mutable)
                    .map(|v| v.name.clone()),
            )
            .collect();
        self.component_info
            .insert(component.qualified_name(), ComponentMemberInfo { pub_mut_members });
    }

    pub fn is_pub_mut(&self, type_name: &str, member: &str) -> bool {
        self.component_info
            .get(type_name)
            .is_some_and(|info| info.pub_mut_members.contains(member))
    }

    pub fn push_scope(&mut self, scope: TypeScope) {
        self.scopes.push(scope);
    }

    pub fn pop_scope(&mut self) -> Option<TypeScope> {
        self.scopes.pop()
    }

    pub fn current_scope(&self) -> Option<&TypeScope> {
        self.scopes.last()
    }

    /// Runs `f` with the scope of `component` pushed, popping it afterwards
    /// whether or not `f` succeeded.
    pub fn in_component_scope<T>(
        &mut self,
        component: &Component,
        f: impl FnOnce(&mut CompilerSession) -> T,
    ) -> T {
        self.push_scope(TypeScope::for_component(component));
        let out = f(self);
        self.pop_scope();
        out
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TYPE SCOPE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodSignature {
    pub param_types: Vec<String>,
    pub return_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeScope {
    pub component_name: String,
    pub local_data_types: BTreeSet<String>,
    pub local_enum_types: BTreeSet<String>,
    pub method_signatures: BTreeMap<String, MethodSignature>,
}

impl TypeScope {
    pub fn for_component(component: &Component) -> Self {
        TypeScope {
            component_name: component.qualified_name(),
            local_data_types: component.data.iter().map(|d| d.name.clone()).collect(),
            local_enum_types: component.enums.iter().map(|e| e.name.clone()).collect(),
            method_signatures: component
                .methods
                .iter()
                .map(|m| {
                    (
                        m.name.clone(),
                        MethodSignature {
                            param_types: m.params.iter().map(|p| p.ty.clone()).collect(),
                            return_type: m.return_type.clone(),
                        },
                    )
                })
                .collect(),
        }
    }

    pub fn is_local(&self, ty: &str) -> bool {
        self.local_data_types.contains(ty) || self.local_enum_types.contains(ty)
    }

    /// Component-local types are emitted at namespace scope as `<Component>_<Type>`.
    pub fn resolve(&self, ty: &str) -> String {
        if self.is_local(ty) {
            format!("{}_{}", self.component_name, ty)
        } else {
            ty.to_string()
        }
    }

    pub fn method_param_count(&self, name: &str) -> Option<usize> {
        self.method_signatures.get(name).map(|s| s.param_types.len())
    }
}
