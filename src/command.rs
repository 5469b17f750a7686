use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// The closed set of operations the pipeline can perform.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    CreateFolder,
    CreateFile,
    MoveFile,
    SearchFiles,
    SummarizeFile,
}

impl ToolKind {
    pub const ALL: [ToolKind; 5] = [
        ToolKind::SearchFiles,
        ToolKind::SummarizeFile,
        ToolKind::CreateFolder,
        ToolKind::CreateFile,
        ToolKind::MoveFile,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolKind::CreateFolder => "create_folder",
            ToolKind::CreateFile => "create_file",
            ToolKind::MoveFile => "move_file",
            ToolKind::SearchFiles => "search_files",
            ToolKind::SummarizeFile => "summarize_file",
        }
    }

    /// Exact wire-name lookup. Anything else is unknown.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == name)
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized command, ready for the dispatcher.
///
/// Serializes as `{"tool": "...", "arguments": {...}}`. Every path field is
/// absolute and under the sandbox root; `CreateFolder::name` is a bare
/// basename joined to the root at dispatch time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tool", content = "arguments", rename_all = "snake_case")]
pub enum Command {
    CreateFolder {
        name: String,
    },
    CreateFile {
        path: PathBuf,
        content: String,
    },
    MoveFile {
        src: PathBuf,
        dst: PathBuf,
        dry_run: bool,
    },
    SearchFiles {
        keywords: Vec<String>,
        ext: Vec<String>,
        top_k: usize,
    },
    SummarizeFile {
        path: PathBuf,
        /// Accepted for compatibility; the preview length is fixed.
        max_tokens: usize,
    },
}

impl Command {
    pub fn kind(&self) -> ToolKind {
        match self {
            Command::CreateFolder { .. } => ToolKind::CreateFolder,
            Command::CreateFile { .. } => ToolKind::CreateFile,
            Command::MoveFile { .. } => ToolKind::MoveFile,
            Command::SearchFiles { .. } => ToolKind::SearchFiles,
            Command::SummarizeFile { .. } => ToolKind::SummarizeFile,
        }
    }

    /// Whether dispatching this command can change the filesystem.
    pub fn mutates(&self) -> bool {
        match self {
            Command::CreateFolder { .. } | Command::CreateFile { .. } => true,
            Command::MoveFile { dry_run, .. } => !dry_run,
            Command::SearchFiles { .. } | Command::SummarizeFile { .. } => false,
        }
    }

    /// Indented JSON preview shown before execution.
    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| format!("{self:?}"))
    }
}
