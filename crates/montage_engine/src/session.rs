use std::collections::HashMap;
use std::sync::Mutex;

/// Session key holding the bearer token.
pub const TOKEN_KEY: &str = "token";
/// Session key holding the serialized user profile.
pub const USER_KEY: &str = "user";

/// Browser-localStorage-shaped session state, made explicit so components
/// take it by injection instead of reaching for ambient globals. The
/// merge pipeline itself needs none of it.
pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn clear(&self);
}

#[derive(Debug, Default)]
pub struct MemorySessionStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().expect("session lock").get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .expect("session lock")
            .insert(key.to_string(), value.to_string());
    }

    fn clear(&self) {
        self.entries.lock().expect("session lock").clear();
    }
}
