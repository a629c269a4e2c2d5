use crate::models::Credentials;
use std::path::Path;

/// Maximum file size: 500 MiB
pub const MAX_FILE_SIZE: u64 = 500 * 1024 * 1024; // 500 MiB

/// MIME types accepted for upload, including the registered aliases of each format
pub const ALLOWED_VIDEO_MIME_TYPES: &[&str] = &[
    "video/mp4",
    "video/avi",
    "video/mov",
    "video/wmv",
    "video/flv",
    "video/webm",
    // Registered names for the same containers
    "video/quicktime",
    "video/x-msvideo",
    "video/x-ms-wmv",
    "video/x-flv",
];

/// File extensions accepted when the MIME type is missing or generic
pub const ALLOWED_VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "wmv", "flv", "webm"];

/// Leading bytes needed to recognize an executable header
pub const EXECUTABLE_SNIFF_LEN: usize = 4;

pub const MISSING_FIELDS_MESSAGE: &str =
    "Missing required fields: username, password, and file are required";

#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct ValidationError {
    pub code: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn missing_fields() -> Self {
        Self::new("MISSING_FIELDS", MISSING_FIELDS_MESSAGE)
    }

    pub fn executable_content() -> Self {
        Self::new(
            "EXECUTABLE_CONTENT",
            "File contains executable content which is not allowed",
        )
    }

    pub fn file_too_large(max_size: u64) -> Self {
        Self::new(
            "FILE_TOO_LARGE",
            format!(
                "File size too large. Maximum size is {}MB.",
                max_size / 1024 / 1024
            ),
        )
    }
}

/// Validates file size against maximum limit
pub fn validate_file_size(size: u64, max_size: u64) -> Result<(), ValidationError> {
    if size > max_size {
        return Err(ValidationError::file_too_large(max_size));
    }
    Ok(())
}

/// Accepts the upload when either the MIME type or the file extension names a
/// supported video container.
pub fn validate_video_type(
    filename: &str,
    content_type: Option<&str>,
) -> Result<(), ValidationError> {
    let mime_allowed = content_type
        .and_then(|ct| ct.parse::<mime::Mime>().ok())
        .map(|m| m.essence_str().to_lowercase())
        .is_some_and(|essence| ALLOWED_VIDEO_MIME_TYPES.contains(&essence.as_str()));

    let extension_allowed = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .is_some_and(|ext| ALLOWED_VIDEO_EXTENSIONS.contains(&ext.as_str()));

    if mime_allowed || extension_allowed {
        return Ok(());
    }

    Err(ValidationError::new(
        "INVALID_VIDEO_TYPE",
        "Please upload a valid video file (MP4, AVI, MOV, WMV, FLV, WebM).",
    ))
}

/// Sanitizes filename to prevent path traversal and injection attacks
/// Returns the sanitized filename or an error if the name is invalid
pub fn sanitize_filename(filename: &str) -> Result<String, ValidationError> {
    // Browsers on Windows may send the full client path
    let last_segment = filename.rsplit(['/', '\\']).next().unwrap_or("");
    let name = Path::new(last_segment)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");

    if name.is_empty() {
        return Err(ValidationError::new(
            "INVALID_FILENAME",
            "Filename cannot be empty",
        ));
    }

    if filename.contains("..") || filename.contains('/') || filename.contains('\\') {
        tracing::warn!("Path components stripped from uploaded filename: {}", filename);
    }

    let sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_control()
                || c == ':'
                || c == '*'
                || c == '?'
                || c == '"'
                || c == '<'
                || c == '>'
                || c == '|'
                || c == ';'
            {
                '_'
            } else {
                c
            }
        })
        .collect();

    // Limit length safely for UTF-8
    let sanitized = if sanitized.len() > 200 {
        let mut end = 200;
        while !sanitized.is_char_boundary(end) {
            end -= 1;
        }
        sanitized[..end].to_string()
    } else {
        sanitized
    };

    if sanitized.starts_with('.') {
        return Err(ValidationError::new(
            "HIDDEN_FILE",
            "Hidden files (starting with '.') are not allowed",
        ));
    }

    Ok(sanitized)
}

/// Checks if file content appears to be executable
pub fn is_executable_content(header: &[u8]) -> bool {
    if header.len() < EXECUTABLE_SNIFF_LEN {
        return false;
    }

    // ELF binary (Linux)
    if header.starts_with(&[0x7F, 0x45, 0x4C, 0x46]) {
        return true;
    }

    // PE/COFF (Windows .exe, .dll)
    if header.starts_with(&[0x4D, 0x5A]) {
        return true;
    }

    // Mach-O (macOS)
    if header.starts_with(&[0xFE, 0xED, 0xFA, 0xCE])
        || header.starts_with(&[0xFE, 0xED, 0xFA, 0xCF])
        || header.starts_with(&[0xCE, 0xFA, 0xED, 0xFE])
        || header.starts_with(&[0xCF, 0xFA, 0xED, 0xFE])
    {
        return true;
    }

    // Shebang (shell scripts)
    header.starts_with(b"#!")
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Both credentials must be present and non-empty.
pub fn required_credentials(
    username: Option<String>,
    password: Option<String>,
) -> Result<Credentials, ValidationError> {
    match (non_empty(username), non_empty(password)) {
        (Some(username), Some(password)) => Ok(Credentials::new(username, password)),
        _ => Err(ValidationError::missing_fields()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_file_size() {
        assert!(validate_file_size(1024, MAX_FILE_SIZE).is_ok());
        assert!(validate_file_size(MAX_FILE_SIZE, MAX_FILE_SIZE).is_ok());
        let err = validate_file_size(MAX_FILE_SIZE + 1, MAX_FILE_SIZE).unwrap_err();
        assert_eq!(err.code, "FILE_TOO_LARGE");
        assert_eq!(err.message, "File size too large. Maximum size is 500MB.");
    }

    #[test]
    fn test_validate_video_type() {
        assert!(validate_video_type("clip.mp4", Some("video/mp4")).is_ok());
        assert!(validate_video_type("clip.bin", Some("video/quicktime")).is_ok());
        assert!(validate_video_type("clip.bin", Some("video/webm; codecs=vp9")).is_ok());
        // Extension alone is enough
        assert!(validate_video_type("CLIP.MOV", Some("application/octet-stream")).is_ok());
        assert!(validate_video_type("clip.flv", None).is_ok());

        assert!(validate_video_type("notes.txt", Some("text/plain")).is_err());
        assert!(validate_video_type("song.mp3", Some("audio/mpeg")).is_err());
        assert!(validate_video_type("noext", None).is_err());
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("holiday.mp4").unwrap(), "holiday.mp4");
        assert_eq!(sanitize_filename("my clip.webm").unwrap(), "my clip.webm");
        assert_eq!(sanitize_filename("a<b>?.mp4").unwrap(), "a_b__.mp4");
        assert_eq!(sanitize_filename("日本語.mp4").unwrap(), "日本語.mp4");

        // Path traversal
        assert_eq!(sanitize_filename("../../etc/clip.mp4").unwrap(), "clip.mp4");
        assert_eq!(
            sanitize_filename("C:\\Users\\me\\Videos\\clip.avi").unwrap(),
            "clip.avi"
        );

        assert!(sanitize_filename("").is_err());
        assert!(sanitize_filename(".hidden.mp4").is_err());
    }

    #[test]
    fn test_is_executable_content() {
        assert!(is_executable_content(&[0x7F, 0x45, 0x4C, 0x46, 0x00]));
        assert!(is_executable_content(&[0x4D, 0x5A, 0x00, 0x00]));
        assert!(is_executable_content(b"#!/bin/bash"));
        assert!(!is_executable_content(b"\x00\x00\x00\x18ftypmp42"));
        assert!(!is_executable_content(b"#!"));
    }

    #[test]
    fn test_required_credentials() {
        let creds = required_credentials(Some("alice".into()), Some("hunter2".into())).unwrap();
        assert_eq!(creds, Credentials::new("alice", "hunter2"));

        for (username, password) in [
            (None, Some("hunter2".to_string())),
            (Some("alice".to_string()), None),
            (Some(String::new()), Some("hunter2".to_string())),
            (Some("alice".to_string()), Some(String::new())),
        ] {
            let err = required_credentials(username, password).unwrap_err();
            assert_eq!(err.code, "MISSING_FIELDS");
            assert_eq!(err.message, MISSING_FIELDS_MESSAGE);
        }
    }
}
