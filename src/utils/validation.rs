use crate::services::error::{UploadError, UploadResult};

/// Longest name most filesystems accept for a single path segment
pub const MAX_SEGMENT_LEN: usize = 255;

/// Reduces a client-supplied filename to the name a staged file is keyed by.
///
/// Browsers occasionally send a full client path (`C:\Users\me\a.csv`), so only
/// the last component is kept. The name is otherwise preserved verbatim because
/// it becomes the resource name.
pub fn staged_filename(raw: &str) -> UploadResult<String> {
    let name = raw
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or("")
        .trim();

    if name != raw.trim() {
        tracing::warn!("Stripped client path from uploaded filename: {}", raw);
    }

    validate_segment("filename", name)?;
    Ok(name.to_string())
}

/// Checks that a value can be used as a single path segment of the staging area
pub fn validate_segment(kind: &str, value: &str) -> UploadResult<()> {
    if value.is_empty() {
        return Err(UploadError::malformed(format!("{} cannot be empty", kind)));
    }

    if value == "." || value == ".." {
        tracing::warn!("Path traversal attempt detected in {}: {}", kind, value);
        return Err(UploadError::malformed(format!("{} is not allowed", kind)));
    }

    if value.contains(['/', '\\']) || value.chars().any(char::is_control) {
        tracing::warn!("Rejected unsafe {}: {:?}", kind, value);
        return Err(UploadError::malformed(format!(
            "{} contains forbidden characters",
            kind
        )));
    }

    if value.len() > MAX_SEGMENT_LEN {
        return Err(UploadError::malformed(format!(
            "{} exceeds {} bytes",
            kind, MAX_SEGMENT_LEN
        )));
    }

    Ok(())
}
