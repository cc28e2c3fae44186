use std::path::Path;

/// Computes the MD5 hash of the file at `path`, formatted as lowercase hex.
pub(crate) fn compute_md5sum(path: impl AsRef<Path>) -> crate::Result<String> {
    let data = std::fs::read(path.as_ref())?;
    Ok(format!("{:x}", md5::compute(&data)))
}

/// Returns true if the path has a `.json` extension (case-insensitive).
pub fn is_json_path(path: impl AsRef<Path>) -> bool {
    path.as_ref()
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

/// Formats a score with a fixed number of decimals, e.g. "0.4312".
pub fn format_score(score: f32) -> String {
    format!("{:.4}", score)
}
