//! Crash-safe file replacement for persisted calibration.
use std::{fs, io::Write, path::Path};

/// Write `bytes` to a sibling temp file, fsync it, then rename over `path`.
/// Readers see either the old file or the complete new one.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension("tmp");
    {
        let mut f = fs::File::create(&tmp)?;
        f.write_all(bytes)?;
        f.sync_all()?;
    }
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    Ok(())
}

/// Serialize thresholds as a `[thresholds]` TOML document and write them atomically.
pub fn save_thresholds(
    path: &Path,
    t: &crate::calibration::Thresholds,
) -> crate::error::Result<()> {
    use eyre::WrapErr;
    let persisted = carousel_config::PersistedThresholds::from(t);
    let text = carousel_config::thresholds_to_toml(&persisted)
        .wrap_err("failed to serialize thresholds")?;
    write_atomic(path, text.as_bytes())
        .wrap_err_with(|| format!("failed to write {}", path.display()))?;
    tracing::info!(path = %path.display(), "thresholds saved");
    Ok(())
}
