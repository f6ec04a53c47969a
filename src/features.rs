//! Whole-program feature detection.
//!
//! Flags are a pure function of the component set and the referenced headers.
//! Every scaffolding emitter below reads only the flags, so the generated
//! runtime carries exactly the dispatchers and globals the program uses.

use lazy_static::lazy_static;
use rayon::prelude::*;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::ast::{Component, ComponentInstantiation, EventKind, HtmlElement, TextNode, ViewIf};
use crate::render::CodeWriter;
use crate::visitor::{walk_element, walk_if, ViewVisitor};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureFlags {
    pub click: bool,
    pub input: bool,
    pub change: bool,
    pub keydown: bool,
    pub keyboard: bool,
    pub router: bool,
    pub websocket: bool,
    pub fetch: bool,
    pub json: bool,
}

impl FeatureFlags {
    fn merge(self, other: FeatureFlags) -> FeatureFlags {
        FeatureFlags {
            click: self.click || other.click,
            input: self.input || other.input,
            change: self.change || other.change,
            keydown: self.keydown || other.keydown,
            keyboard: self.keyboard || other.keyboard,
            router: self.router || other.router,
            websocket: self.websocket || other.websocket,
            fetch: self.fetch || other.fetch,
            json: self.json || other.json,
        }
    }

    fn set_event(&mut self, event: EventKind) {
        match event {
            EventKind::Click => self.click = true,
            EventKind::Input => self.input = true,
            EventKind::Change => self.change = true,
            EventKind::Keydown => self.keydown = true,
        }
    }

    pub fn has_event(&self, event: EventKind) -> bool {
        match event {
            EventKind::Click => self.click,
            EventKind::Input => self.input,
            EventKind::Change => self.change,
            EventKind::Keydown => self.keydown,
        }
    }
}

pub fn needs_dispatcher(flags: &FeatureFlags) -> bool {
    flags.click || flags.input || flags.change || flags.keydown
}

// ═══════════════════════════════════════════════════════════════════════════════
// DETECTION
// ═══════════════════════════════════════════════════════════════════════════════

lazy_static! {
    static ref KEY_POLL_RE: Regex = Regex::new(r"\bInput\s*\.\s*isKeyDown\s*\(").unwrap();
    static ref WEBSOCKET_RE: Regex = Regex::new(r"\bWebSocket\s*\.\s*\w+\s*\(").unwrap();
    static ref FETCH_RE: Regex = Regex::new(r"\bFetch\s*\.\s*\w+\s*\(").unwrap();
    static ref JSON_RE: Regex = Regex::new(r"\bJson\s*\.\s*\w+\s*\(").unwrap();
}

fn scan_code(flags: &mut FeatureFlags, src: &str) {
    flags.keyboard |= KEY_POLL_RE.is_match(src);
    flags.websocket |= WEBSOCKET_RE.is_match(src);
    flags.fetch |= FETCH_RE.is_match(src);
    flags.json |= JSON_RE.is_match(src);
}

/// Handler kinds plus facility calls inside any view expression.
#[derive(Default)]
struct ViewScanner {
    flags: FeatureFlags,
}

impl ViewVisitor for ViewScanner {
    fn visit_element(&mut self, element: &HtmlElement) {
        for h in &element.handlers {
            self.flags.set_event(h.event);
            scan_code(&mut self.flags, &h.handler.code);
        }
        for attr in &element.attributes {
            scan_code(&mut self.flags, &attr.value.code);
        }
        walk_element(self, element);
    }

    fn visit_text(&mut self, text: &TextNode) {
        scan_code(&mut self.flags, &text.value.code);
    }

    fn visit_instantiation(&mut self, inst: &ComponentInstantiation) {
        for prop in &inst.props {
            scan_code(&mut self.flags, &prop.value.code);
        }
    }

    fn visit_if(&mut self, view_if: &ViewIf) {
        scan_code(&mut self.flags, &view_if.condition.code);
        walk_if(self, view_if);
    }
}

fn scan_component(component: &Component) -> FeatureFlags {
    let mut scanner = ViewScanner::default();
    scanner.visit_component_view(component);

    let mut flags = scanner.flags;
    flags.router |= component.router.is_some();
    for method in &component.methods {
        scan_code(&mut flags, &method.body);
    }
    for init in component.state.iter().filter_map(|v| v.initializer.as_ref()) {
        scan_code(&mut flags, &init.code);
    }
    flags
}

pub fn detect_features(components: &[Component], headers: &BTreeSet<String>) -> FeatureFlags {
    let from_components = components
        .par_iter()
        .map(scan_component)
        .reduce(FeatureFlags::default, FeatureFlags::merge);

    let mut from_headers = FeatureFlags::default();
    for header in headers {
        let header = header.to_lowercase();
        from_headers.websocket |= header.contains("websocket");
        from_headers.fetch |= header.contains("fetch");
        from_headers.json |= header.contains("json");
    }
    from_components.merge(from_headers)
}

// ═══════════════════════════════════════════════════════════════════════════════
// SCAFFOLDING
// ═══════════════════════════════════════════════════════════════════════════════

/// Runtime headers the enabled features need, in a fixed order.
pub fn feature_headers(flags: &FeatureFlags) -> Vec<&'static str> {
    let mut headers = vec!["webcc/dom.h", "webcc/system.h", "webcc/core/function.h"];
    if flags.keyboard {
        headers.push("webcc/input.h");
    }
    if flags.websocket {
        headers.push("webcc/websocket.h");
    }
    if flags.fetch {
        headers.push("webcc/fetch.h");
    }
    if flags.json {
        headers.push("webcc/json.h");
    }
    headers
}

/// `(global name, callback signature)` of the dispatcher for one event kind.
pub fn dispatcher_for(event: EventKind) -> (&'static str, &'static str) {
    match event {
        EventKind::Click => ("g_dispatcher", "void()"),
        EventKind::Input => ("g_input_dispatcher", "void(const webcc::string&)"),
        EventKind::Change => ("g_change_dispatcher", "void(const webcc::string&)"),
        EventKind::Keydown => ("g_keydown_dispatcher", "void(int)"),
    }
}

pub fn emit_feature_globals(flags: &FeatureFlags) -> String {
    let mut w = CodeWriter::new();

    if needs_dispatcher(flags) {
        w.line("template <typename Callback>");
        w.block("struct Dispatcher", |w| {
            w.line("static constexpr int MAX_LISTENERS = 128;");
            w.line("int32_t handles[MAX_LISTENERS];");
            w.line("Callback callbacks[MAX_LISTENERS];");
            w.line("int count = 0;");
            w.block("void register_handler(webcc::handle h, Callback cb)", |w| {
                w.line("if (count >= MAX_LISTENERS) return;");
                w.line("handles[count] = (int32_t)h;");
                w.line("callbacks[count] = cb;");
                w.line("count++;");
            });
            w.block("void remove(webcc::handle h)", |w| {
                w.block("for (int i = 0; i < count; ++i)", |w| {
                    w.block("if (handles[i] == (int32_t)h)", |w| {
                        w.line("count--;");
                        w.line("handles[i] = handles[count];");
                        w.line("callbacks[i] = callbacks[count];");
                        w.line("return;");
                    });
                });
            });
            w.line("template <typename... Args>");
            w.block("void dispatch(webcc::handle h, Args... args)", |w| {
                w.block("for (int i = 0; i < count; ++i)", |w| {
                    w.line("if (handles[i] == (int32_t)h) callbacks[i](args...);");
                });
            });
        });
        w.append_to_last(";");
        for event in EventKind::ALL {
            if flags.has_event(event) {
                let (name, sig) = dispatcher_for(event);
                w.line(format!("Dispatcher<webcc::function<{}>> {};", sig, name));
            }
        }
        w.blank();
    }

    if flags.keyboard {
        w.line("bool g_key_state[256] = {};");
        w.block("struct Input", |w| {
            w.line("static bool isKeyDown(int key) { return key >= 0 && key < 256 && g_key_state[key]; }");
        });
        w.append_to_last(";");
        w.blank();
    }

    if flags.router {
        w.line("webcc::string g_current_path;");
        w.line("webcc::function<void(const webcc::string&)> g_on_navigate;");
        w.blank();
    }

    w.finish()
}

pub fn emit_feature_event_handlers(flags: &FeatureFlags) -> String {
    let mut w = CodeWriter::new();
    w.block(
        "static void _dispatch_events(const webcc::Event* events, uint32_t count)",
        |w| {
            w.block("for (uint32_t i = 0; i < count; ++i)", |w| {
                w.line("const auto& e = events[i];");
                if flags.click {
                    w.line("if (auto ev = e.as<webcc::dom::ClickEvent>()) g_dispatcher.dispatch(ev->handle);");
                }
                if flags.input {
                    w.line("if (auto ev = e.as<webcc::dom::InputEvent>()) g_input_dispatcher.dispatch(ev->handle, ev->value);");
                }
                if flags.change {
                    w.line("if (auto ev = e.as<webcc::dom::ChangeEvent>()) g_change_dispatcher.dispatch(ev->handle, ev->value);");
                }
                if flags.keydown {
                    w.line("if (auto ev = e.as<webcc::dom::KeydownEvent>()) g_keydown_dispatcher.dispatch(ev->handle, ev->keycode);");
                }
                if flags.keyboard {
                    w.line("if (auto ev = e.as<webcc::input::KeyDownEvent>()) { if (ev->key_code < 256) g_key_state[ev->key_code] = true; }");
                    w.line("if (auto ev = e.as<webcc::input::KeyUpEvent>()) { if (ev->key_code < 256) g_key_state[ev->key_code] = false; }");
                }
                if flags.router {
                    w.block("if (auto ev = e.as<webcc::system::PopstateEvent>())", |w| {
                        w.line("g_current_path = ev->path;");
                        w.line("if (g_on_navigate) g_on_navigate(g_current_path);");
                    });
                }
            });
        },
    );
    w.finish()
}

/// Body of `main` up to and including mounting `root`.
pub fn emit_feature_init(flags: &FeatureFlags, root: &str) -> String {
    let mut w = CodeWriter::with_indent(1);
    if flags.keyboard {
        w.line("webcc::input::init_keyboard();");
    }
    if flags.router {
        w.line("g_current_path = webcc::system::get_pathname();");
    }
    w.line(format!("void* app_mem = webcc::malloc(sizeof({}));", root));
    w.line(format!("app = new (app_mem) {}();", root));
    w.line("app->view();");
    w.finish()
}
