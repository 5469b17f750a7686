use crate::error::Result;
use crate::sandbox::Sandbox;
use std::fs;

/// 샌드박스 루트 아래에 폴더 생성 (이미 있으면 그대로 둠)
pub fn create_folder(sandbox: &Sandbox, name: &str) -> Result<String> {
    let path = sandbox.root().join(name);
    sandbox.ensure_contained(&path)?;

    fs::create_dir_all(&path)?;
    Ok(format!("Created folder: {}", path.display()))
}
