// src/tools/mod.rs

use crate::command::Command;
use crate::error::Result;
use crate::sandbox::Sandbox;
use tracing::{info, warn};

// 도구별 실행기
pub mod file_io;
pub mod folder;
pub mod mv;
pub mod search;

/// Something the dispatcher can run against the sandbox.
pub trait Tool: Send + Sync {
    /// 도구 이름 (예: "create_folder")
    fn name(&self) -> &str;

    /// 실행 로직. 실패는 dispatch가 문자열로 바꿈
    fn execute(&self, sandbox: &Sandbox) -> Result<String>;
}

impl Tool for Command {
    fn name(&self) -> &str {
        self.kind().as_str()
    }

    fn execute(&self, sandbox: &Sandbox) -> Result<String> {
        match self {
            Command::CreateFolder { name } => folder::create_folder(sandbox, name),
            Command::CreateFile { path, content } => file_io::create_file(sandbox, path, content),
            Command::MoveFile { src, dst, dry_run } => mv::move_file(sandbox, src, dst, *dry_run),
            Command::SearchFiles {
                keywords,
                ext,
                top_k,
            } => search::search_files(sandbox, keywords, ext, *top_k),
            Command::SummarizeFile { path, max_tokens } => {
                file_io::summarize_file(sandbox, path, *max_tokens)
            }
        }
    }
}

/// Executes a tool once and describes the outcome.
///
/// Never fails: I/O faults and sandbox violations come back as an
/// `Execution failed: ...` string.
pub fn dispatch(tool: &dyn Tool, sandbox: &Sandbox) -> String {
    match tool.execute(sandbox) {
        Ok(output) => {
            info!(tool = tool.name(), "dispatched");
            output
        }
        Err(e) => {
            warn!(tool = tool.name(), error = %e, "dispatch failed");
            format!("Execution failed: {}", e)
        }
    }
}
