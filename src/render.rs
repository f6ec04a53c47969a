//! Target-text rendering.
//!
//! Lowering hands over typed statements; this module is the only place that
//! knows the webcc spelling of them.

use crate::ast::{Component, EventKind};
use crate::elements::EventMasks;
use crate::features::dispatcher_for;
use crate::ir::{ChildDom, Handle, LifecycleStmt};
use crate::lifecycle::{root_conditional, LocalTypeKind, LoweredComponent};
use crate::router::{RouteArm, RouterPlan};
use crate::session::TypeScope;

const INDENT: &str = "    ";

#[derive(Debug, Default)]
pub struct CodeWriter {
    lines: Vec<String>,
    indent: usize,
}

impl CodeWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_indent(indent: usize) -> Self {
        CodeWriter {
            lines: Vec::new(),
            indent,
        }
    }

    pub fn line(&mut self, text: impl AsRef<str>) {
        self.lines
            .push(format!("{}{}", INDENT.repeat(self.indent), text.as_ref()));
    }

    pub fn blank(&mut self) {
        self.lines.push(String::new());
    }

    /// `header {`, the body one level deeper, then `}`.
    pub fn block(&mut self, header: impl AsRef<str>, body: impl FnOnce(&mut CodeWriter)) {
        self.line(format!("{} {{", header.as_ref()));
        self.indent += 1;
        body(self);
        self.indent -= 1;
        self.line("}");
    }

    pub fn append_to_last(&mut self, suffix: &str) {
        if let Some(last) = self.lines.last_mut() {
            last.push_str(suffix);
        }
    }

    pub fn finish(self) -> String {
        let mut out = String::new();
        for line in self.lines {
            out.push_str(&line);
            out.push('\n');
        }
        out
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// STATEMENTS
// ═══════════════════════════════════════════════════════════════════════════════

pub fn render_handle(handle: Handle) -> String {
    match handle {
        Handle::Element { id } => format!("el[{}]", id),
        Handle::Anchor { if_id } => format!("_if_{}_anchor", if_id),
        Handle::Null => "webcc::handle{0}".to_string(),
    }
}

fn callback_params(event: EventKind) -> &'static str {
    match event {
        EventKind::Click => "",
        EventKind::Input | EventKind::Change => "const webcc::string& value",
        EventKind::Keydown => "int keycode",
    }
}

fn as_statement(code: &str) -> String {
    let code = code.trim();
    if code.ends_with(';') || code.ends_with('}') {
        code.to_string()
    } else {
        format!("{};", code)
    }
}

pub fn render_stmts(w: &mut CodeWriter, stmts: &[LifecycleStmt]) {
    for stmt in stmts {
        render_stmt(w, stmt);
    }
}

pub fn render_stmt(w: &mut CodeWriter, stmt: &LifecycleStmt) {
    match stmt {
        LifecycleStmt::RegisterListener {
            event,
            element,
            handler,
        } => {
            let (dispatcher, _) = dispatcher_for(*event);
            w.line(format!(
                "{}.register_handler(el[{}], [this]({}) {{ {} }});",
                dispatcher,
                element,
                callback_params(*event),
                as_statement(handler)
            ));
        }
        LifecycleStmt::RemoveListener { event, element } => {
            let (dispatcher, _) = dispatcher_for(*event);
            w.line(format!("{}.remove(el[{}]);", dispatcher, element));
        }
        LifecycleStmt::RemoveMaskedListeners {
            event,
            element_count,
        } => {
            let (dispatcher, _) = dispatcher_for(*event);
            w.line(format!(
                "for (int i = 0; i < {}; i++) if (_{}_mask & (1ULL << i)) {}.remove(el[i]);",
                element_count,
                event.as_str(),
                dispatcher
            ));
        }
        LifecycleStmt::RemoveElement { handle, guarded } => {
            let call = format!("webcc::dom::remove_element({});", render_handle(*handle));
            if *guarded {
                w.line(format!("if (!skip_dom_removal) {}", call));
            } else {
                w.line(call);
            }
        }
        LifecycleStmt::IfBranch {
            if_id,
            then_body,
            else_body,
        } => {
            if then_body.is_empty() {
                w.block(format!("if (!_if_{}_state)", if_id), |w| {
                    render_stmts(w, else_body)
                });
            } else {
                w.block(format!("if (_if_{}_state)", if_id), |w| {
                    render_stmts(w, then_body)
                });
                if !else_body.is_empty() {
                    // Reopen the closing brace as `} else {`.
                    w.lines.pop();
                    w.block("} else", |w| render_stmts(w, else_body));
                }
            }
        }
        LifecycleStmt::RemoveChildView { instance, dom } => {
            let flag = match dom {
                ChildDom::Skip => "true",
                ChildDom::Forward => "skip_dom_removal",
                ChildDom::Remove => "false",
            };
            w.line(format!("{}._remove_view({});", instance, flag));
        }
        LifecycleStmt::DestroyRoute { index } => {
            w.line(format!(
                "if (_route_{i}) {{ _route_{i}->_destroy(); delete _route_{i}; _route_{i} = nullptr; }}",
                i = index
            ));
        }
        LifecycleStmt::RemoveRouteView { index } => {
            w.line(format!(
                "if (_route_{i}) _route_{i}->_remove_view(skip_dom_removal);",
                i = index
            ));
        }
        LifecycleStmt::Return { handle } => {
            w.line(format!("return {};", render_handle(*handle)));
        }
        LifecycleStmt::ReturnChildRoot { instance } => {
            w.line(format!("return {}._get_root_element();", instance));
        }
        LifecycleStmt::CallUserTick { with_dt } => {
            w.line(if *with_dt { "_user_tick(dt);" } else { "_user_tick();" });
        }
        LifecycleStmt::TickChild { instance } => {
            w.line(format!("{}.tick(dt);", instance));
        }
        LifecycleStmt::TickRoute { index } => {
            w.line(format!("if (_route_{i}) _route_{i}->tick(dt);", i = index));
        }
        LifecycleStmt::CallUpdate { instance, prop } => {
            w.line(format!("{}._update_{}();", instance, prop));
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMPONENT SECTIONS
// ═══════════════════════════════════════════════════════════════════════════════

pub fn emit_event_mask_constants(w: &mut CodeWriter, masks: &EventMasks) {
    for event in EventKind::ALL {
        let mask = masks.mask(event);
        if mask != 0 {
            w.line(format!(
                "static constexpr uint64_t _{}_mask = 0x{:x}ULL;",
                event.as_str(),
                mask
            ));
        }
    }
}

fn render_local_types(w: &mut CodeWriter, lowered: &LoweredComponent) {
    for ty in &lowered.local_types {
        if let LocalTypeKind::Enum { variants } = &ty.kind {
            w.line(format!("enum class {} {{ {} }};", ty.name, variants.join(", ")));
        }
    }
    for ty in &lowered.local_types {
        if let LocalTypeKind::Data { fields } = &ty.kind {
            w.block(format!("struct {}", ty.name), |w| {
                for f in fields {
                    w.line(format!("{} {};", f.ty, f.name));
                }
            });
            w.append_to_last(";");
        }
    }
}

fn mount_route(w: &mut CodeWriter, arm: &RouteArm, anchor: Option<u32>) {
    w.line(format!(
        "_route_{} = new {}({});",
        arm.index,
        arm.type_name,
        arm.args.join(", ")
    ));
    w.line(format!("_route_{}->view();", arm.index));
    if let Some(anchor) = anchor {
        w.line(format!(
            "webcc::dom::append_child(el[{}], _route_{}->_get_root_element());",
            anchor, arm.index
        ));
    }
}

fn render_router(w: &mut CodeWriter, plan: &RouterPlan) {
    w.block("void _navigate(const webcc::string& path)", |w| {
        render_stmts(w, &plan.teardown);
        let mut first = true;
        for arm in &plan.arms {
            let header = if first {
                format!("if (path == \"{}\")", arm.path)
            } else {
                format!("}} else if (path == \"{}\")", arm.path)
            };
            if !first {
                w.lines.pop();
            }
            w.block(header, |w| mount_route(w, arm, plan.anchor));
            first = false;
        }
        if let Some(fallback) = &plan.fallback {
            if first {
                mount_route(w, fallback, plan.anchor);
            } else {
                w.lines.pop();
                w.block("} else", |w| mount_route(w, fallback, plan.anchor));
            }
        }
    });
    w.block("void _wire_router()", |w| {
        w.line("g_on_navigate = [this](const webcc::string& p) { _navigate(p); };");
        w.line("_navigate(g_current_path);");
    });
}

pub fn render_component(component: &Component, lowered: &LoweredComponent) -> String {
    let scope = TypeScope::for_component(component);
    let layout = &lowered.layout;
    let root_if = root_conditional(layout).map(|r| r.if_id);

    let mut w = CodeWriter::new();
    render_local_types(&mut w, lowered);

    w.block(format!("class {}", lowered.name), |w| {
        w.line("public:");

        for p in &component.params {
            let ty = scope.resolve(&p.ty);
            if p.is_reference {
                w.line(format!("{}* {} = nullptr;", ty, p.name));
            } else {
                match &p.default_value {
                    Some(v) => w.line(format!("{} {} = {};", ty, p.name, v.code)),
                    None => w.line(format!("{} {}{{}};", ty, p.name)),
                }
            }
        }
        for v in &component.state {
            let ty = scope.resolve(&v.ty);
            match &v.initializer {
                Some(init) => w.line(format!("{} {} = {};", ty, v.name, init.code)),
                None => w.line(format!("{} {}{{}};", ty, v.name)),
            }
        }

        if lowered.element_count > 0 {
            w.line(format!("webcc::handle el[{}];", lowered.element_count));
        }
        for region in &layout.regions {
            w.line(format!("bool _if_{}_state = false;", region.if_id));
            if Some(region.if_id) != root_if {
                w.line(format!("webcc::handle _if_{}_anchor;", region.if_id));
            }
        }
        for inst in layout.instances.iter().filter(|i| !i.is_member_reference) {
            w.line(format!("{} {};", inst.type_name, inst.instance_name));
        }
        if let Some(router) = &component.router {
            for (index, route) in router.routes.iter().enumerate() {
                w.line(format!("{}* _route_{} = nullptr;", route.qualified_name(), index));
            }
        }
        emit_event_mask_constants(w, &lowered.masks);
        w.blank();

        for m in &component.methods {
            let name = if m.name == "tick" { "_user_tick" } else { m.name.as_str() };
            let params: Vec<String> = m
                .params
                .iter()
                .map(|p| format!("{} {}", scope.resolve(&p.ty), p.name))
                .collect();
            w.block(
                format!("{} {}({})", scope.resolve(&m.return_type), name, params.join(", ")),
                |w| {
                    for line in m.body.lines().map(str::trim).filter(|l| !l.is_empty()) {
                        w.line(line);
                    }
                },
            );
        }

        w.block("void _register_events()", |w| render_stmts(w, &lowered.registrations));

        // Node creation belongs to the markup builder; this is the wiring half of mounting.
        w.block("void view()", |w| {
            for inst in layout
                .instances_in(None)
                .filter(|i| !i.is_member_reference)
            {
                w.line(format!("{}.view();", inst.instance_name));
            }
            w.line("_register_events();");
            if lowered.router.is_some() {
                w.line("_wire_router();");
            }
        });

        for m in &lowered.mutators {
            w.block(
                format!("void _set_{}(const {}& value)", m.state, m.ty),
                |w| {
                    w.line(format!("{} = value;", m.state));
                    render_stmts(w, &m.updates);
                },
            );
        }
        for p in &lowered.prop_updates {
            w.block(format!("void _update_{}()", p.param), |w| {
                render_stmts(w, &p.updates)
            });
        }

        if !lowered.sync_bindings.is_empty() {
            w.block("void _sync_bindings()", |w| {
                for b in &lowered.sync_bindings {
                    let source = format!("{}.{}", b.instance, b.member);
                    if lowered.mutators.iter().any(|m| m.state == b.state) {
                        w.line(format!(
                            "if ({} != {}) _set_{}({});",
                            b.state, source, b.state, source
                        ));
                    } else {
                        w.line(format!("{} = {};", b.state, source));
                    }
                }
            });
        }

        if let Some(plan) = &lowered.router {
            render_router(w, plan);
        }

        w.block("void _destroy()", |w| render_stmts(w, &lowered.methods.destroy));
        w.block("void _remove_view(bool skip_dom_removal = false)", |w| {
            render_stmts(w, &lowered.methods.remove_view)
        });
        w.block("webcc::handle _get_root_element()", |w| {
            render_stmts(w, &lowered.methods.get_root_element)
        });
        if let Some(tick) = &lowered.methods.tick {
            w.block("void tick(double dt)", |w| render_stmts(w, tick));
        }
    });
    w.append_to_last(";");
    w.finish()
}
