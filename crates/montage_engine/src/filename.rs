use sha2::{Digest, Sha256};

use crate::JobId;

/// Deterministic local filename for a merge result:
/// `merged-{job_id}-{short_hash(content)}.mp4`.
///
/// Hashing the content keeps re-runs of the same inputs from piling up
/// distinct files in the output directory.
pub fn merged_filename(job_id: JobId, content: &[u8]) -> String {
    format!("merged-{job_id}-{}.mp4", short_hash(content))
}

fn short_hash(input: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input);
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(8);
    for byte in digest.iter().take(4) {
        use std::fmt::Write;
        let _ = write!(&mut hex, "{byte:02x}");
    }
    hex
}
