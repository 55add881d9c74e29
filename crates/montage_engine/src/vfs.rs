use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use bytes::Bytes;

use crate::EngineFsError;

/// The in-memory file namespace the media engine exposes for staging
/// inputs and retrieving outputs.
///
/// Names are flat; staging names are job-prefixed by the merge pipeline
/// so attempts never collide.
#[derive(Debug, Clone, Default)]
pub struct VirtualFs {
    files: Arc<Mutex<HashMap<String, Bytes>>>,
}

impl VirtualFs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(&self, name: &str, bytes: Bytes) {
        self.files
            .lock()
            .expect("vfs lock")
            .insert(name.to_string(), bytes);
    }

    pub fn read(&self, name: &str) -> Result<Bytes, EngineFsError> {
        self.files
            .lock()
            .expect("vfs lock")
            .get(name)
            .cloned()
            .ok_or_else(|| EngineFsError::NotFound(name.to_string()))
    }

    pub fn remove(&self, name: &str) {
        self.files.lock().expect("vfs lock").remove(name);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.files.lock().expect("vfs lock").contains_key(name)
    }

    pub fn file_count(&self) -> usize {
        self.files.lock().expect("vfs lock").len()
    }
}
