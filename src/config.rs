use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileOptions {
    /// Overrides the root named by the program's app block.
    #[serde(default)]
    pub root_component: Option<String>,
    #[serde(default)]
    pub extra_headers: Vec<String>,
    /// Enables the lowering cache when set.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
    /// Include dispatcher globals, the frame function and `main`.
    #[serde(default = "default_true")]
    pub emit_scaffold: bool,
}

fn default_true() -> bool {
    true
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            root_component: None,
            extra_headers: Vec::new(),
            cache_dir: None,
            emit_scaffold: true,
        }
    }
}

impl CompileOptions {
    pub fn from_json(json: &str) -> Result<Self> {
        if json.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = CompileOptions::from_json("{}").unwrap();
        assert!(opts.emit_scaffold);
        assert!(opts.root_component.is_none());
        assert!(CompileOptions::from_json("").unwrap().emit_scaffold);
    }

    #[test]
    fn test_from_json() {
        let opts = CompileOptions::from_json(
            r#"{ "rootComponent": "Shell", "extraHeaders": ["webcc/fetch.h"], "emitScaffold": false, "cacheDir": ".coi/cache" }"#,
        )
        .unwrap();
        assert_eq!(opts.root_component.as_deref(), Some("Shell"));
        assert_eq!(opts.extra_headers, vec!["webcc/fetch.h".to_string()]);
        assert!(!opts.emit_scaffold);
        assert_eq!(opts.cache_dir, Some(PathBuf::from(".coi/cache")));
    }

    #[test]
    fn test_malformed_options() {
        let err = CompileOptions::from_json("{ \"emitScaffold\": 3 }").unwrap_err();
        assert_eq!(err.code, crate::error::ERR_MALFORMED_AST);
    }
}
