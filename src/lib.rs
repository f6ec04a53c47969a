//! # Coi Component Lowering
//!
//! Turns a validated component AST forest into webcc C++ class sections.
//!
//! ## Lowering Invariants
//!
//! 1. **Element Numbering**: every element and handle-bearing text node in a
//!    component's view gets a dense id in depth-first pre-order, starting at 0.
//!    The id is the index into the component's `el[]` handle array.
//!
//! 2. **Event Masks**: bit `i` of `_<event>_mask` is set iff element `i` has a
//!    listener for that event. Ids at or above 64 with a listener are a fatal
//!    error (`COI-E004`).
//!
//! 3. **Teardown Completeness**: on every path through `_destroy` and
//!    `_remove_view`, each registered (element, event) pair is unregistered
//!    exactly once, and no branch ever touches a handle its inactive branch
//!    never created.
//!
//! 4. **Children First**: components are lowered in dependency order so that
//!    a parent can read its children's tick-need and `pub mut` members from
//!    the session.
//!
//! 5. **Determinism**: identical input produces byte-identical output.

#[cfg(feature = "napi")]
use napi_derive::napi;

use std::sync::Once;

pub mod ast;
pub mod cache;
pub mod config;
pub mod deps;
pub mod discovery;
pub mod elements;
pub mod error;
pub mod features;
pub mod ir;
pub mod lifecycle;
pub mod program;
pub mod render;
pub mod router;
pub mod session;
pub mod updates;
pub mod validate;
pub mod visitor;


pub use ast::{Component, Program};
pub use config::CompileOptions;
pub use discovery::discover_program;
pub use error::{CompilerError, Result};
pub use features::{detect_features, FeatureFlags};
pub use lifecycle::{lower_component, LoweredComponent};
pub use program::{compile_program, ProgramOutput};
pub use session::CompilerSession;

static TRACING_INIT: Once = Once::new();

/// Installs a stderr subscriber filtered by `RUST_LOG`.
///
/// Does nothing when `RUST_LOG` is unset. Safe to call multiple times.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            tracing_subscriber::registry()
                .with(
                    fmt::layer()
                        .with_writer(std::io::stderr)
                        .with_target(true)
                        .with_level(true),
                )
                .with(filter)
                .init();
        }
    });
}

/// JSON-in, rendered-program-out entry point shared by the Node bridge.
pub fn lower_program_json(program_json: &str, options_json: &str) -> Result<String> {
    init_tracing();
    let program: Program = serde_json::from_str(program_json)?;
    let options = CompileOptions::from_json(options_json)?;
    Ok(compile_program(&program, &options)?.code)
}

#[cfg(feature = "napi")]
#[napi]
pub fn lower_program_native(program_json: String, options_json: String) -> napi::Result<String> {
    lower_program_json(&program_json, &options_json)
        .map_err(|e| napi::Error::from_reason(e.to_string()))
}
