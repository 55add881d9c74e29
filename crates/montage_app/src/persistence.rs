use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use engine_logging::{engine_error, engine_info, engine_warn};
use montage_core::CompletedMergeSnapshot;
use montage_engine::{ensure_output_dir, AtomicFileWriter, SessionStore};
use serde::{Deserialize, Serialize};

const STATE_FILENAME: &str = ".montage_state.ron";
const SESSION_FILENAME: &str = ".montage_session.ron";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedMerge {
    result_url: String,
    persisted: bool,
    clip_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PersistedState {
    completed: Vec<PersistedMerge>,
}

pub(crate) fn load_completed_merges(output_dir: &Path) -> Vec<CompletedMergeSnapshot> {
    let path = output_dir.join(STATE_FILENAME);
    let content = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Vec::new();
        }
        Err(err) => {
            engine_warn!("Failed to read persisted state from {:?}: {}", path, err);
            return Vec::new();
        }
    };

    let state: PersistedState = match ron::from_str(&content) {
        Ok(state) => state,
        Err(err) => {
            engine_warn!("Failed to parse persisted state from {:?}: {}", path, err);
            return Vec::new();
        }
    };

    let completed = state
        .completed
        .into_iter()
        .map(|merge| CompletedMergeSnapshot {
            result_url: merge.result_url,
            persisted: merge.persisted,
            clip_count: merge.clip_count,
        })
        .collect();

    engine_info!("Loaded persisted completed merges from {:?}", path);
    completed
}

pub(crate) fn save_completed_merges(output_dir: &Path, completed: &[CompletedMergeSnapshot]) {
    if let Err(err) = ensure_output_dir(output_dir) {
        engine_error!("Failed to ensure output dir {:?}: {}", output_dir, err);
        return;
    }

    let state = PersistedState {
        completed: completed
            .iter()
            .map(|merge| PersistedMerge {
                result_url: merge.result_url.clone(),
                persisted: merge.persisted,
                clip_count: merge.clip_count,
            })
            .collect(),
    };

    let pretty = ron::ser::PrettyConfig::new();
    let content = match ron::ser::to_string_pretty(&state, pretty) {
        Ok(text) => text,
        Err(err) => {
            engine_error!("Failed to serialize persisted state: {}", err);
            return;
        }
    };

    let writer = AtomicFileWriter::new(PathBuf::from(output_dir));
    if let Err(err) = writer.write(STATE_FILENAME, &content) {
        engine_error!("Failed to write persisted state to {:?}: {}", output_dir, err);
    }
}

/// File-backed session store: the shell's stand-in for the browser's
/// localStorage. Every mutation is flushed atomically.
pub(crate) struct FileSessionStore {
    dir: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl FileSessionStore {
    pub(crate) fn load(dir: &Path) -> Self {
        let path = dir.join(SESSION_FILENAME);
        let entries = match fs::read_to_string(&path) {
            Ok(content) => match ron::from_str::<HashMap<String, String>>(&content) {
                Ok(entries) => entries,
                Err(err) => {
                    engine_warn!("Failed to parse session file {:?}: {}", path, err);
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        };
        Self {
            dir: dir.to_path_buf(),
            entries: Mutex::new(entries),
        }
    }

    fn flush(&self, entries: &HashMap<String, String>) {
        let pretty = ron::ser::PrettyConfig::new();
        let content = match ron::ser::to_string_pretty(entries, pretty) {
            Ok(text) => text,
            Err(err) => {
                engine_error!("Failed to serialize session: {}", err);
                return;
            }
        };
        let writer = AtomicFileWriter::new(self.dir.clone());
        if let Err(err) = writer.write(SESSION_FILENAME, &content) {
            engine_error!("Failed to write session to {:?}: {}", self.dir, err);
        }
    }
}

impl SessionStore for FileSessionStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().expect("session lock").get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        let mut entries = self.entries.lock().expect("session lock");
        entries.insert(key.to_string(), value.to_string());
        self.flush(&entries);
    }

    fn clear(&self) {
        let mut entries = self.entries.lock().expect("session lock");
        entries.clear();
        self.flush(&entries);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn completed_merges_round_trip() {
        let temp = TempDir::new().unwrap();
        let snapshots = vec![CompletedMergeSnapshot {
            result_url: "https://cdn.example.com/merged/1.mp4".to_string(),
            persisted: true,
            clip_count: 3,
        }];

        save_completed_merges(temp.path(), &snapshots);
        let loaded = load_completed_merges(temp.path());

        assert_eq!(loaded, snapshots);
    }

    #[test]
    fn missing_state_file_loads_empty() {
        let temp = TempDir::new().unwrap();
        assert!(load_completed_merges(temp.path()).is_empty());
    }

    #[test]
    fn session_store_survives_reload() {
        let temp = TempDir::new().unwrap();
        {
            let store = FileSessionStore::load(temp.path());
            store.set("token", "jwt-abc");
        }
        let store = FileSessionStore::load(temp.path());
        assert_eq!(store.get("token").as_deref(), Some("jwt-abc"));

        store.clear();
        let store = FileSessionStore::load(temp.path());
        assert!(store.get("token").is_none());
    }
}
