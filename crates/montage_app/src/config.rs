use std::env;
use std::path::PathBuf;

/// Shell configuration, read from the environment with local-dev defaults
/// matching the development service.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub service_base_url: String,
    pub engine_base_url: String,
    /// Local merge results and the persisted state file live here.
    pub output_dir: PathBuf,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let service_base_url = env::var("MONTAGE_SERVICE_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:5000".to_string());
        let engine_base_url = env::var("MONTAGE_ENGINE_URL").unwrap_or_else(|_| {
            format!("{}/engine", service_base_url.trim_end_matches('/'))
        });
        let output_dir = env::var("MONTAGE_OUTPUT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                env::current_dir()
                    .unwrap_or_else(|_| PathBuf::from("."))
                    .join("output")
            });
        Self {
            service_base_url,
            engine_base_url,
            output_dir,
        }
    }
}
