use crate::error::Result;
use crate::sandbox::Sandbox;
use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, warn};

/// 파일/폴더 이동. dry_run이면 파일시스템을 건드리지 않음
pub fn move_file(sandbox: &Sandbox, src: &Path, dst: &Path, dry_run: bool) -> Result<String> {
    if dry_run {
        return Ok(format!("[DRY RUN] {} -> {}", src.display(), dst.display()));
    }
    if !src.exists() {
        return Ok(format!("Source missing: {}", src.display()));
    }

    sandbox.ensure_contained(src)?;
    sandbox.ensure_contained(dst)?;

    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)?;
    }

    if let Err(e) = fs::rename(src, dst) {
        // rename은 다른 파일시스템 사이에서 실패함. 일반 파일이면 복사 후 삭제
        if !src.is_file() {
            return Err(e.into());
        }
        debug!(error = %e, "rename failed, copying instead");
        copy_then_remove(src, dst, |p| fs::remove_file(p))?;
    }

    Ok(format!("Moved: {} -> {}", src.display(), dst.display()))
}

/// Copies `src` to `dst` and removes `src`. If the removal fails the copy is
/// deleted again, so a failed move never leaves the file in both places.
fn copy_then_remove(
    src: &Path,
    dst: &Path,
    remove: impl FnOnce(&Path) -> io::Result<()>,
) -> io::Result<()> {
    fs::copy(src, dst)?;
    if let Err(e) = remove(src) {
        if let Err(cleanup) = fs::remove_file(dst) {
            warn!(path = %dst.display(), error = %cleanup, "could not remove partial copy");
        }
        return Err(e);
    }
    Ok(())
}
