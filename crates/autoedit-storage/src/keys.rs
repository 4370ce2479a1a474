//! Object key layout and content types.

use std::path::Path;

/// Key for a job's output: `{prefix}/{job_id}/{filename}`.
pub fn output_key(prefix: &str, job_id: &str, filename: &str) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        format!("{}/{}", job_id, filename)
    } else {
        format!("{}/{}/{}", prefix, job_id, filename)
    }
}

/// Content type for a media file, by extension.
pub fn content_type_for(path: impl AsRef<Path>) -> &'static str {
    let ext = path
        .as_ref()
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("mp4") | Some("m4v") => "video/mp4",
        Some("mov") => "video/quicktime",
        Some("mkv") => "video/x-matroska",
        Some("webm") => "video/webm",
        Some("avi") => "video/x-msvideo",
        Some("ts") => "video/mp2t",
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("m4a") => "audio/mp4",
        Some("xml") | Some("fcpxml") => "application/xml",
        Some("json") => "application/json",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_key() {
        assert_eq!(
            output_key("outputs", "job-1", "job-1_output.mp4"),
            "outputs/job-1/job-1_output.mp4"
        );
        assert_eq!(output_key("/", "job-1", "a.mp4"), "job-1/a.mp4");
        assert_eq!(output_key("a/b/", "job-1", "a.mp4"), "a/b/job-1/a.mp4");
    }

    #[test]
    fn test_content_type() {
        assert_eq!(content_type_for("x/out.MP4"), "video/mp4");
        assert_eq!(content_type_for("out.mov"), "video/quicktime");
        assert_eq!(content_type_for("out.webm"), "video/webm");
        assert_eq!(content_type_for("out"), "application/octet-stream");
        assert_eq!(content_type_for("out.bin"), "application/octet-stream");
    }
}
