//! Discovery of AST-forest fragments.
//!
//! The front end may write one `*.ast.json` per source module. Fragments are
//! merged in sorted path order so the declaration order (and with it every
//! tie-break downstream) does not depend on the filesystem.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::ast::{AppConfig, Component, Program};
use crate::error::{CompilerError, Result, ERR_IO};

pub const FRAGMENT_SUFFIX: &str = ".ast.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgramFragment {
    #[serde(default)]
    pub components: Vec<Component>,
    #[serde(default)]
    pub app: Option<AppConfig>,
    #[serde(default)]
    pub headers: BTreeSet<String>,
}

/// Recursively find all fragment files in a directory, sorted by path.
pub fn find_fragment_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(error = %e, "skipping unreadable directory entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| entry.file_name().to_string_lossy().ends_with(FRAGMENT_SUFFIX))
        .map(|entry| entry.into_path())
        .collect();
    files.sort();
    files
}

pub fn load_fragment(path: &Path) -> Result<ProgramFragment> {
    let file = path.to_string_lossy().to_string();
    let source = fs::read_to_string(path).map_err(|e| {
        CompilerError::new(ERR_IO, &format!("Failed to read fragment: {}", e), &file, 0, 0)
    })?;
    serde_json::from_str(&source).map_err(|e| CompilerError {
        file: file.clone(),
        ..CompilerError::from(e)
    })
}

/// Loads and merges every fragment under `dir`. The last fragment carrying
/// an app block wins.
pub fn discover_program(dir: &Path) -> Result<Program> {
    if !dir.is_dir() {
        return Err(CompilerError::new(
            ERR_IO,
            &format!("Not a directory: {}", dir.display()),
            &dir.to_string_lossy(),
            0,
            0,
        ));
    }

    let mut program = Program::default();
    for path in find_fragment_files(dir) {
        let fragment = load_fragment(&path)?;
        debug!(
            path = %path.display(),
            components = fragment.components.len(),
            "loaded fragment"
        );
        program.components.extend(fragment.components);
        program.headers.extend(fragment.headers);
        if let Some(app) = fragment.app {
            program.app = app;
        }
    }
    Ok(program)
}
