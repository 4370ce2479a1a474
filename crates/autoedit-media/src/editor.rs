//! Editing-tool abstraction.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use autoedit_models::EditOptions;

use crate::command::{check_tool, AutoEditorCommand, AutoEditorRunner};
use crate::error::{MediaError, MediaResult};

/// Something that turns an input video into an edited output video.
#[async_trait]
pub trait VideoEditor: Send + Sync {
    /// Editor name for logs and metrics.
    fn name(&self) -> &'static str;

    /// Resolve the editor executable, failing if it is unavailable.
    fn check_available(&self) -> MediaResult<PathBuf>;

    /// Edit `input` into `output` using the passthrough options.
    async fn edit(&self, input: &Path, output: &Path, options: &EditOptions) -> MediaResult<()>;
}

#[async_trait]
impl VideoEditor for AutoEditorRunner {
    fn name(&self) -> &'static str {
        "auto_editor"
    }

    fn check_available(&self) -> MediaResult<PathBuf> {
        check_tool(self.binary())
    }

    async fn edit(&self, input: &Path, output: &Path, options: &EditOptions) -> MediaResult<()> {
        if !input.exists() {
            return Err(MediaError::FileNotFound(input.to_path_buf()));
        }

        let cmd = AutoEditorCommand::new(input, output).apply(options);
        self.run(&cmd).await?;

        // Some failure modes exit 0 without writing anything
        if !output.exists() {
            return Err(MediaError::tool_failed(
                "auto-editor did not produce an output file",
                None,
                Some(0),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_edit_missing_input() {
        let dir = TempDir::new().unwrap();
        let runner = AutoEditorRunner::new().with_binary("sh");

        let err = runner
            .edit(
                &dir.path().join("missing.mp4"),
                &dir.path().join("out.mp4"),
                &EditOptions::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
    }

    #[tokio::test]
    async fn test_edit_requires_output() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("noop.sh");
        std::fs::write(&input, "exit 0\n").unwrap();

        let runner = AutoEditorRunner::new().with_binary("sh");
        let err = runner
            .edit(&input, &dir.path().join("out.mp4"), &EditOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::ToolFailed { exit_code: Some(0), .. }));
    }

    #[test]
    fn test_check_available() {
        assert!(AutoEditorRunner::new().with_binary("sh").check_available().is_ok());
        assert!(AutoEditorRunner::new()
            .with_binary("definitely-not-a-real-editor-binary")
            .check_available()
            .is_err());
    }
}
