use regex::Regex;
use skillforge_types::{ForgeError, Result};
use std::sync::OnceLock;

/// Compile `pattern` once into `cell`; a pattern that fails to compile is an
/// error on every call rather than a silently skipped step.
pub(crate) fn cached(
    cell: &'static OnceLock<Regex>,
    pattern: &'static str,
) -> Result<&'static Regex> {
    if let Some(re) = cell.get() {
        return Ok(re);
    }
    let re = Regex::new(pattern).map_err(|e| ForgeError::InvalidPattern {
        pattern,
        reason: e.to_string(),
    })?;
    Ok(cell.get_or_init(|| re))
}
