use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::ast::Component;
use crate::deps::component_deps;
use crate::error::Result;
use crate::lifecycle::LoweredComponent;
use crate::session::CompilerSession;

#[derive(Serialize, Deserialize)]
pub struct CacheEntry {
    pub hash: String,
    pub lowered: LoweredComponent,
}

/// Lowered components keyed by a hash of everything lowering reads: the
/// component itself and the session facts of the types it owns.
pub struct LoweringCache {
    cache_dir: PathBuf,
}

impl LoweringCache {
    pub fn new(cache_dir: &Path) -> Self {
        if let Err(e) = fs::create_dir_all(cache_dir) {
            warn!(dir = %cache_dir.display(), error = %e, "cannot create cache directory");
        }
        Self {
            cache_dir: cache_dir.to_path_buf(),
        }
    }

    pub fn compute_hash(component: &Component, session: &CompilerSession) -> Result<String> {
        let mut hasher = Sha256::new();
        hasher.update(serde_json::to_vec(component)?);
        for dep in component_deps(component) {
            hasher.update(dep.as_bytes());
            hasher.update([session.needs_tick(&dep) as u8]);
            if let Some(info) = session.component_info.get(&dep) {
                hasher.update(serde_json::to_vec(info)?);
            }
        }
        Ok(format!("{:x}", hasher.finalize()))
    }

    fn get_cache_path(&self, name: &str) -> PathBuf {
        let safe_name = name.replace(['/', '\\', ':'], "_");
        self.cache_dir.join(format!("{}.json", safe_name))
    }

    pub fn get(&self, name: &str, hash: &str) -> Option<LoweredComponent> {
        let cache_path = self.get_cache_path(name);
        let data = fs::read_to_string(&cache_path).ok()?;

        let entry: CacheEntry = match serde_json::from_str(&data) {
            Ok(e) => e,
            Err(e) => {
                warn!(component = name, error = %e, "discarding corrupt cache entry");
                fs::remove_file(cache_path).ok();
                return None;
            }
        };

        if entry.hash == hash {
            debug!(component = name, "cache hit");
            Some(entry.lowered)
        } else {
            None
        }
    }

    pub fn set(&self, name: &str, hash: &str, lowered: &LoweredComponent) {
        let cache_path = self.get_cache_path(name);
        let entry = CacheEntry {
            hash: hash.to_string(),
            lowered: lowered.clone(),
        };
        match serde_json::to_string(&entry) {
            Ok(data) => {
                if let Err(e) = fs::write(&cache_path, data) {
                    warn!(path = %cache_path.display(), error = %e, "cannot write cache entry");
                }
            }
            Err(e) => warn!(component = name, error = %e, "cannot serialize cache entry"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::lower_component;
    use serde_json::json;
    use tempfile::tempdir;

    fn parent() -> Component {
        serde_json::from_value(json!({
            "name": "Scene",
            "renderRoots": [{ "type": "element", "tag": "div", "children": [
                { "type": "component", "componentName": "Sprite" }
            ]}]
        }))
        .unwrap()
    }

    #[test]
    fn test_hash_tracks_child_facts() {
        let mut session = CompilerSession::new();
        let before = LoweringCache::compute_hash(&parent(), &session).unwrap();
        assert_eq!(before, LoweringCache::compute_hash(&parent(), &session).unwrap());

        session.mark_tick("Sprite");
        let after = LoweringCache::compute_hash(&parent(), &session).unwrap();
        assert_ne!(before, after);
    }

    #[test]
    fn test_round_trip_and_corruption() {
        let dir = tempdir().unwrap();
        let cache = LoweringCache::new(&dir.path().join("lowered"));
        let mut session = CompilerSession::new();
        let component = parent();
        let hash = LoweringCache::compute_hash(&component, &session).unwrap();
        let lowered = lower_component(&mut session, &component).unwrap();

        assert!(cache.get("Scene", &hash).is_none());
        cache.set("Scene", &hash, &lowered);
        assert_eq!(cache.get("Scene", &hash), Some(lowered));
        assert!(cache.get("Scene", "stale").is_none());

        fs::write(dir.path().join("lowered").join("Scene.json"), "not json").unwrap();
        assert!(cache.get("Scene", &hash).is_none());
        assert!(!dir.path().join("lowered").join("Scene.json").exists());
    }
}
