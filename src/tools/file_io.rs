use crate::error::Result;
use crate::sandbox::Sandbox;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

/// Characters shown by a summary.
///
/// The command's `max_tokens` is accepted but not used: the preview is always
/// this fixed head of the file.
pub const PREVIEW_CHARS: usize = 200;

pub const NON_TEXT_PLACEHOLDER: &str = "[non-text file]";

/// 파일 쓰기 (부모 폴더가 없으면 만들고, 기존 파일은 덮어씀)
pub fn create_file(sandbox: &Sandbox, path: &Path, content: &str) -> Result<String> {
    sandbox.ensure_contained(path)?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)?;
    Ok(format!("Created file: {}", path.display()))
}

/// 파일 앞부분 미리보기
pub fn summarize_file(sandbox: &Sandbox, path: &Path, _max_tokens: usize) -> Result<String> {
    if !path.exists() {
        return Ok(format!("Summary failed: file not found {}", path.display()));
    }
    sandbox.ensure_contained(path)?;

    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::InvalidData => NON_TEXT_PLACEHOLDER.to_string(),
        Err(e) => return Err(e.into()),
    };

    Ok(format!(
        "Summary (first {} chars): {}",
        PREVIEW_CHARS,
        preview(&text)
    ))
}

/// Head of `text`, line breaks flattened to single spaces.
fn preview(text: &str) -> String {
    let head: String = text.chars().take(PREVIEW_CHARS).collect();
    head.replace("\r\n", " ").replace(['\r', '\n'], " ")
}
