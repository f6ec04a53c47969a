use serde::{Deserialize, Serialize};
use thiserror::Error;

// ═══════════════════════════════════════════════════════════════════════════════
// ERROR CODES
// ═══════════════════════════════════════════════════════════════════════════════

pub const ERR_LOGIC_ONLY_IN_VIEW: &str = "COI-E001";
pub const ERR_NO_ROOT_COMPONENT: &str = "COI-E002";
pub const ERR_UNKNOWN_ROOT_COMPONENT: &str = "COI-E003";
pub const ERR_TOO_MANY_INTERACTIVE: &str = "COI-E004";
pub const ERR_ROUTER_WITHOUT_PLACEHOLDER: &str = "COI-E005";
pub const ERR_PLACEHOLDER_WITHOUT_ROUTER: &str = "COI-E006";
pub const ERR_UNKNOWN_ROUTE_TARGET: &str = "COI-E007";
pub const ERR_MALFORMED_AST: &str = "COI-E008";
pub const ERR_IO: &str = "COI-E009";

/// Element ids at or above this value cannot carry a listener.
pub const MAX_INTERACTIVE_ELEMENTS: u32 = 64;

// ═══════════════════════════════════════════════════════════════════════════════
// GUARANTEES
// ═══════════════════════════════════════════════════════════════════════════════

fn get_guarantee(code: &str) -> &'static str {
    match code {
        ERR_LOGIC_ONLY_IN_VIEW => "Only components with a view can be instantiated in a view.",
        ERR_NO_ROOT_COMPONENT => "Every program mounts exactly one root component.",
        ERR_UNKNOWN_ROOT_COMPONENT => "The root component is defined in the program.",
        ERR_TOO_MANY_INTERACTIVE => {
            "Every listener-bearing element fits in the 64-bit event masks of its component."
        }
        ERR_ROUTER_WITHOUT_PLACEHOLDER => "Route children always have a mount point.",
        ERR_PLACEHOLDER_WITHOUT_ROUTER => "A <route> placeholder is backed by a router block.",
        ERR_UNKNOWN_ROUTE_TARGET => "Every route resolves to a defined component.",
        ERR_MALFORMED_AST => "Lowering only runs on a well-formed AST forest.",
        ERR_IO => "Inputs are read completely before lowering starts.",
        _ => "Unknown invariant.",
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMPILER ERROR
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize, Error, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
#[error("{code}: {message} at line {line}")]
pub struct CompilerError {
    pub code: String,
    pub message: String,
    pub guarantee: String,
    pub file: String,
    pub line: u32,
    pub column: u32,
    pub context: Option<String>,
    pub hints: Vec<String>,
}

impl CompilerError {
    pub fn new(code: &str, message: &str, file: &str, line: u32, column: u32) -> Self {
        Self::with_details(code, message, file, line, column, None, vec![])
    }

    pub fn with_details(
        code: &str,
        message: &str,
        file: &str,
        line: u32,
        column: u32,
        context: Option<String>,
        hints: Vec<String>,
    ) -> Self {
        CompilerError {
            code: code.to_string(),
            message: message.to_string(),
            guarantee: get_guarantee(code).to_string(),
            file: file.to_string(),
            line,
            column,
            context,
            hints,
        }
    }
}

impl From<serde_json::Error> for CompilerError {
    fn from(e: serde_json::Error) -> Self {
        CompilerError::new(
            ERR_MALFORMED_AST,
            &format!("Failed to parse AST JSON: {}", e),
            "",
            e.line() as u32,
            e.column() as u32,
        )
    }
}

impl From<std::io::Error> for CompilerError {
    fn from(e: std::io::Error) -> Self {
        CompilerError::new(ERR_IO, &e.to_string(), "", 0, 0)
    }
}

pub type Result<T> = std::result::Result<T, CompilerError>;
