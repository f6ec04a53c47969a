//! Whole-program driver: validate → order → detect features → lower → render.
//!
//! A fatal error anywhere aborts before any text is produced.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, info_span};

use crate::ast::Program;
use crate::cache::LoweringCache;
use crate::config::CompileOptions;
use crate::deps::topological_sort_components;
use crate::error::Result;
use crate::features::{
    detect_features, emit_feature_event_handlers, emit_feature_globals, emit_feature_init,
    feature_headers, FeatureFlags,
};
use crate::lifecycle::{lower_component, record_session_facts, LoweredComponent};
use crate::render::{render_component, CodeWriter};
use crate::session::CompilerSession;
use crate::validate::validate_program;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramOutput {
    /// Qualified component names in lowering order.
    pub order: Vec<String>,
    pub features: FeatureFlags,
    pub headers: BTreeSet<String>,
    pub components: Vec<LoweredComponent>,
    pub code: String,
}

pub fn resolve_root(program: &Program, options: &CompileOptions) -> String {
    options
        .root_component
        .clone()
        .unwrap_or_else(|| program.app.root_component.clone())
}

pub fn compile_program(program: &Program, options: &CompileOptions) -> Result<ProgramOutput> {
    let _span = info_span!("compile_program", components = program.components.len()).entered();

    let root = resolve_root(program, options);
    validate_program(program, &root)?;

    let ordered = topological_sort_components(&program.components);

    let mut headers = program.headers.clone();
    headers.extend(options.extra_headers.iter().cloned());
    let features = detect_features(&program.components, &headers);
    debug!(?features, "detected features");

    let cache = options.cache_dir.as_deref().map(LoweringCache::new);
    let mut session = CompilerSession::new();
    let mut lowered = Vec::with_capacity(ordered.len());
    for component in &ordered {
        let name = component.qualified_name();
        let hash = match &cache {
            Some(_) => Some(LoweringCache::compute_hash(component, &session)?),
            None => None,
        };
        let hit = match (&cache, &hash) {
            (Some(cache), Some(hash)) => cache.get(&name, hash),
            _ => None,
        };
        let result = match hit {
            Some(hit) => {
                record_session_facts(&mut session, component, &hit);
                hit
            }
            None => {
                let fresh = lower_component(&mut session, component)?;
                if let (Some(cache), Some(hash)) = (&cache, &hash) {
                    cache.set(&name, hash, &fresh);
                }
                fresh
            }
        };
        lowered.push(result);
    }

    for header in feature_headers(&features) {
        headers.insert(header.to_string());
    }

    let mut code = String::new();
    for header in &headers {
        code.push_str(&format!("#include \"{}\"\n", header));
    }
    code.push('\n');

    if options.emit_scaffold {
        code.push_str(&emit_feature_globals(&features));
    }

    for component in &ordered {
        code.push_str(&format!("class {};\n", component.qualified_name()));
    }
    code.push('\n');

    for (component, lowered) in ordered.iter().zip(&lowered) {
        code.push_str(&render_component(component, lowered));
        code.push('\n');
    }

    if options.emit_scaffold {
        code.push_str(&emit_scaffold(&features, &root, session.needs_tick(&root)));
    }

    Ok(ProgramOutput {
        order: ordered.iter().map(|c| c.qualified_name()).collect(),
        features,
        headers,
        components: lowered,
        code,
    })
}

/// Frame function (poll → dispatch → tick → flush) and `main`.
fn emit_scaffold(features: &FeatureFlags, root: &str, root_ticks: bool) -> String {
    let mut out = emit_feature_event_handlers(features);
    out.push('\n');

    let mut w = CodeWriter::new();
    w.line(format!("{}* app = nullptr;", root));
    w.blank();
    w.block("void update_wrapper(float time)", |w| {
        w.line("static float last_time = 0;");
        w.line("float dt = (time - last_time) / 1000.0f;");
        w.line("last_time = time;");
        w.line("if (dt > 0.1f) dt = 0.1f;");
        w.line("static webcc::Event events[64];");
        w.line("uint32_t count = 0;");
        w.line("webcc::Event e;");
        w.block("while (count < 64 && webcc::poll_event(e))", |w| {
            w.line("events[count++] = e;");
        });
        w.line("_dispatch_events(events, count);");
        if root_ticks {
            w.line("if (app) app->tick(dt);");
        }
        w.line("webcc::flush();");
    });
    w.blank();
    out.push_str(&w.finish());

    out.push_str("int main() {\n");
    out.push_str(&emit_feature_init(features, root));
    let mut tail = CodeWriter::with_indent(1);
    tail.line("webcc::system::set_main_loop(update_wrapper);");
    tail.line("webcc::flush();");
    tail.line("return 0;");
    out.push_str(&tail.finish());
    out.push_str("}\n");
    out
}
