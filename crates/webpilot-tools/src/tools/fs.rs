//! Filesystem tools — create, delete, list, read, write.
//!
//! Relative paths resolve into the scratch area; absolute paths are honored
//! but refused inside protected system directories. The confirmation gate,
//! not these handlers, decides whether a destructive call may run at all.

use serde_json::{Map, Value};
use tokio::fs;
use tracing::debug;
use webpilot_core::ActionFeedback;

use crate::paths::{is_protected, ScratchArea};
use crate::registry::Tool;

const MAX_READ_BYTES: u64 = 1024 * 1024;

fn required_path<'a>(args: &'a Map<String, Value>) -> Result<&'a str, ActionFeedback> {
    args.get("path")
        .or_else(|| args.get("file_path"))
        .and_then(Value::as_str)
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| ActionFeedback::failure("E_MISSING_ARG", "missing required argument: path"))
}

pub struct CreateDirectoryTool {
    scratch: ScratchArea,
}

impl CreateDirectoryTool {
    pub fn new(scratch: ScratchArea) -> Self {
        Self { scratch }
    }
}

#[async_trait::async_trait]
impl Tool for CreateDirectoryTool {
    fn name(&self) -> &str {
        "create_directory"
    }

    fn description(&self) -> &str {
        "Create a directory (and its parents) if it does not exist."
    }

    async fn execute(&self, args: &Map<String, Value>) -> ActionFeedback {
        let raw = match required_path(args) {
            Ok(p) => p,
            Err(feedback) => return feedback,
        };
        let path = self.scratch.resolve(raw);
        if is_protected(&path) {
            return ActionFeedback::failure(
                "E_PROTECTED_PATH",
                format!("path is within a protected system directory: {}", path.display()),
            );
        }
        match fs::create_dir_all(&path).await {
            Ok(()) => {
                debug!(path = %path.display(), "directory created");
                ActionFeedback::success(format!(
                    "Directory created (or already exists): {}",
                    path.display()
                ))
            }
            Err(e) => ActionFeedback::failure("E_IO", format!("failed to create directory: {}", e)),
        }
    }
}

pub struct DeleteTool {
    scratch: ScratchArea,
}

impl DeleteTool {
    pub fn new(scratch: ScratchArea) -> Self {
        Self { scratch }
    }
}

#[async_trait::async_trait]
impl Tool for DeleteTool {
    fn name(&self) -> &str {
        "delete_file_or_directory"
    }

    fn description(&self) -> &str {
        "Delete a file, an empty directory, or (with recursive=true) a directory tree."
    }

    async fn execute(&self, args: &Map<String, Value>) -> ActionFeedback {
        let raw = match required_path(args) {
            Ok(p) => p,
            Err(feedback) => return feedback,
        };
        let recursive = args
            .get("recursive")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let path = self.scratch.resolve(raw);
        if is_protected(&path) {
            return ActionFeedback::failure(
                "E_PROTECTED_PATH",
                format!("path is within a protected system directory: {}", path.display()),
            );
        }

        let metadata = match fs::metadata(&path).await {
            Ok(m) => m,
            Err(_) => {
                return ActionFeedback::failure(
                    "E_NOT_FOUND",
                    format!("path does not exist: {}", path.display()),
                )
            }
        };

        let result = if metadata.is_dir() {
            if recursive {
                fs::remove_dir_all(&path)
                    .await
                    .map(|_| format!("Directory deleted (recursive): {}", path.display()))
            } else {
                fs::remove_dir(&path)
                    .await
                    .map(|_| format!("Empty directory deleted: {}", path.display()))
            }
        } else {
            fs::remove_file(&path)
                .await
                .map(|_| format!("File deleted: {}", path.display()))
        };

        match result {
            Ok(message) => {
                debug!(path = %path.display(), "deleted");
                ActionFeedback::success(message)
            }
            Err(e) => ActionFeedback::failure("E_IO", format!("failed to delete: {}", e)),
        }
    }
}

pub struct ListDirectoryTool {
    scratch: ScratchArea,
}

impl ListDirectoryTool {
    pub fn new(scratch: ScratchArea) -> Self {
        Self { scratch }
    }
}

#[async_trait::async_trait]
impl Tool for ListDirectoryTool {
    fn name(&self) -> &str {
        "list_directory"
    }

    fn description(&self) -> &str {
        "List the entries of a directory."
    }

    fn is_read_only(&self) -> bool {
        true
    }

    async fn execute(&self, args: &Map<String, Value>) -> ActionFeedback {
        let raw = match required_path(args) {
            Ok(p) => p,
            Err(feedback) => return feedback,
        };
        let show_hidden = args
            .get("show_hidden")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let path = self.scratch.resolve(raw);
        let mut reader = match fs::read_dir(&path).await {
            Ok(r) => r,
            Err(e) => {
                return ActionFeedback::failure(
                    "E_IO",
                    format!("failed to list directory {}: {}", path.display(), e),
                )
            }
        };

        let mut lines = Vec::new();
        while let Ok(Some(entry)) = reader.next_entry().await {
            let name = entry.file_name().to_string_lossy().to_string();
            if !show_hidden && name.starts_with('.') {
                continue;
            }
            let kind = match entry.file_type().await {
                Ok(t) if t.is_dir() => "DIR ",
                _ => "FILE",
            };
            lines.push(format!("{}  {}", kind, name));
        }
        lines.sort();

        ActionFeedback::success(format!(
            "Listed {} items in: {}\n{}",
            lines.len(),
            path.display(),
            lines.join("\n")
        ))
    }
}

pub struct ReadFileTool {
    scratch: ScratchArea,
}

impl ReadFileTool {
    pub fn new(scratch: ScratchArea) -> Self {
        Self { scratch }
    }
}

#[async_trait::async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file_content"
    }

    fn description(&self) -> &str {
        "Read a text file (up to 1 MiB). The content becomes the captured \
         output, so later plan steps can reference it."
    }

    fn is_read_only(&self) -> bool {
        true
    }

    async fn execute(&self, args: &Map<String, Value>) -> ActionFeedback {
        let raw = match required_path(args) {
            Ok(p) => p,
            Err(feedback) => return feedback,
        };
        let path = self.scratch.resolve(raw);

        match fs::metadata(&path).await {
            Ok(m) if m.is_file() => {
                if m.len() > MAX_READ_BYTES {
                    return ActionFeedback::failure(
                        "E_TOO_LARGE",
                        format!("file too large ({} bytes, max {})", m.len(), MAX_READ_BYTES),
                    );
                }
            }
            Ok(_) => {
                return ActionFeedback::failure(
                    "E_NOT_A_FILE",
                    format!("path is not a file: {}", path.display()),
                )
            }
            Err(_) => {
                return ActionFeedback::failure(
                    "E_NOT_FOUND",
                    format!("path does not exist: {}", path.display()),
                )
            }
        }

        // Lossy decode: bytes that are not valid UTF-8 are replaced rather
        // than failing the read.
        match fs::read(&path).await {
            Ok(bytes) => ActionFeedback::success(String::from_utf8_lossy(&bytes).into_owned()),
            Err(e) => ActionFeedback::failure("E_IO", format!("failed to read file: {}", e)),
        }
    }
}

pub struct WriteFileTool {
    scratch: ScratchArea,
}

impl WriteFileTool {
    pub fn new(scratch: ScratchArea) -> Self {
        Self { scratch }
    }
}

#[async_trait::async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file_content"
    }

    fn description(&self) -> &str {
        "Write text to a file, creating parent directories. Set append=true \
         to append instead of overwrite."
    }

    async fn execute(&self, args: &Map<String, Value>) -> ActionFeedback {
        let raw = match required_path(args) {
            Ok(p) => p,
            Err(feedback) => return feedback,
        };
        let content = args
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let append = args.get("append").and_then(Value::as_bool).unwrap_or(false);

        let path = self.scratch.resolve(raw);
        if is_protected(&path) {
            return ActionFeedback::failure(
                "E_PROTECTED_PATH",
                format!("path is within a protected system directory: {}", path.display()),
            );
        }

        if let Some(parent) = path.parent() {
            if let Err(e) = fs::create_dir_all(parent).await {
                return ActionFeedback::failure("E_IO", format!("failed to create parent directories: {}", e));
            }
        }

        let result = if append {
            let existing = fs::read_to_string(&path).await.unwrap_or_default();
            fs::write(&path, existing + content).await
        } else {
            fs::write(&path, content).await
        };

        match result {
            Ok(()) => {
                debug!(path = %path.display(), bytes = content.len(), append, "file written");
                let verb = if append { "appended to" } else { "written to" };
                ActionFeedback::success(format!("Content {}: {}", verb, path.display()))
            }
            Err(e) => ActionFeedback::failure("E_IO", format!("failed to write file: {}", e)),
        }
    }
}
