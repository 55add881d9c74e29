use bytes::{Bytes, BytesMut};

use engine_logging::engine_debug;

use crate::loader::EngineAssets;
use crate::vfs::VirtualFs;
use crate::{EngineExecError, EngineFsError};

/// The narrow contract of the in-browser media-processing engine: a
/// virtual filesystem plus an argv-style exec call with progress events.
#[async_trait::async_trait]
pub trait MediaEngine: Send + Sync {
    fn write_file(&self, name: &str, bytes: Bytes) -> Result<(), EngineFsError>;
    fn read_file(&self, name: &str) -> Result<Bytes, EngineFsError>;
    fn remove_file(&self, name: &str);
    /// Runs one engine command. `on_progress` receives values in 0..=100,
    /// monotonically non-decreasing; it may finish below 100.
    async fn exec(
        &self,
        args: &[String],
        on_progress: &(dyn Fn(u8) + Send + Sync),
    ) -> Result<(), EngineExecError>;
}

/// Builds the stream-copy concatenation argv for a manifest and output.
pub fn concat_args(manifest: &str, output: &str) -> Vec<String> {
    ["-f", "concat", "-i", manifest, "-c", "copy", output]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Built-in engine implementing exactly the stream-copy concatenation
/// command over the virtual filesystem.
///
/// Inputs are treated as opaque byte streams; codec compatibility is the
/// caller's problem, exactly as with the real engine.
pub struct StreamCopyEngine {
    vfs: VirtualFs,
}

impl StreamCopyEngine {
    pub fn new(assets: EngineAssets) -> Self {
        engine_debug!(
            "engine instantiated (runtime {} bytes, payload {} bytes)",
            assets.runtime.len(),
            assets.payload.len()
        );
        Self {
            vfs: VirtualFs::new(),
        }
    }

    /// The backing filesystem, exposed for inspection in tests.
    pub fn vfs(&self) -> &VirtualFs {
        &self.vfs
    }

    async fn run_concat(
        &self,
        manifest: &str,
        output: &str,
        on_progress: &(dyn Fn(u8) + Send + Sync),
    ) -> Result<(), EngineExecError> {
        let manifest_bytes = self
            .vfs
            .read(manifest)
            .map_err(|_| EngineExecError::MissingInput(manifest.to_string()))?;
        let manifest_text = String::from_utf8_lossy(&manifest_bytes);

        let mut names = Vec::new();
        for line in manifest_text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let name = line
                .strip_prefix("file '")
                .and_then(|rest| rest.strip_suffix('\''))
                .ok_or_else(|| EngineExecError::BadManifest(line.to_string()))?;
            names.push(name.to_string());
        }
        if names.is_empty() {
            return Err(EngineExecError::EmptyManifest);
        }

        let mut total: u64 = 0;
        for name in &names {
            let len = self
                .vfs
                .read(name)
                .map_err(|_| EngineExecError::MissingInput(name.clone()))?
                .len() as u64;
            total += len;
        }

        let mut out = BytesMut::new();
        let mut copied: u64 = 0;
        for name in &names {
            let bytes = self
                .vfs
                .read(name)
                .map_err(|_| EngineExecError::MissingInput(name.clone()))?;
            out.extend_from_slice(&bytes);
            copied += bytes.len() as u64;
            if total > 0 {
                on_progress((copied * 100 / total) as u8);
            }
            // Yield between inputs so a long concat never starves the
            // caller's event loop.
            tokio::task::yield_now().await;
        }

        self.vfs.write(output, out.freeze());
        Ok(())
    }
}

#[async_trait::async_trait]
impl MediaEngine for StreamCopyEngine {
    fn write_file(&self, name: &str, bytes: Bytes) -> Result<(), EngineFsError> {
        self.vfs.write(name, bytes);
        Ok(())
    }

    fn read_file(&self, name: &str) -> Result<Bytes, EngineFsError> {
        self.vfs.read(name)
    }

    fn remove_file(&self, name: &str) {
        self.vfs.remove(name);
    }

    async fn exec(
        &self,
        args: &[String],
        on_progress: &(dyn Fn(u8) + Send + Sync),
    ) -> Result<(), EngineExecError> {
        match args {
            [f, concat, i, manifest, c, copy, output]
                if f == "-f" && concat == "concat" && i == "-i" && c == "-c" && copy == "copy" =>
            {
                self.run_concat(manifest, output, on_progress).await
            }
            _ => Err(EngineExecError::UnsupportedCommand(args.join(" "))),
        }
    }
}
