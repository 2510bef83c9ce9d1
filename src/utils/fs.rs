use std::io;
use std::path::Path;

/// Write a file atomically: write to a sibling temp file, then rename over
/// the target so readers never observe a half-written file.
pub async fn atomic_write(path: &Path, contents: &str) -> io::Result<()> {
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, contents).await?;
    tokio::fs::rename(&tmp, path).await
}
