use crate::error::Result;
use crate::sandbox::Sandbox;
use std::cmp::Ordering;
use std::io;
use tracing::warn;
use walkdir::{DirEntry, WalkDir};

pub const NO_RESULTS: &str = "No results found.";

/// 샌드박스 전체를 재귀 탐색해서 파일명 필터에 맞는 파일 경로를 모음
///
/// Every keyword must occur in the file name (case-sensitive). When `ext` is
/// non-empty the name must also end with one of its entries, ignoring case.
/// Walk order is depth-first, files before subdirectories, both sorted by
/// name. Symlinked files are listed; symlinked directories are not entered.
pub fn search_files(
    sandbox: &Sandbox,
    keywords: &[String],
    ext: &[String],
    top_k: usize,
) -> Result<String> {
    let filter = NameFilter {
        keywords,
        ext: ext.iter().map(|e| e.to_lowercase()).collect(),
    };

    let walker = WalkDir::new(sandbox.root())
        .follow_links(false)
        .sort_by(files_first)
        .into_iter();

    let mut hits = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            // 루트를 못 읽으면 실패, 하위 폴더는 건너뜀
            Err(e) if e.depth() == 0 => return Err(io::Error::from(e).into()),
            Err(e) => {
                warn!(error = %e, "skipping unreadable entry");
                continue;
            }
        };
        if !is_listable_file(&entry) {
            continue;
        }
        if filter.matches(&entry.file_name().to_string_lossy()) {
            hits.push(entry.into_path());
            if hits.len() >= top_k {
                break;
            }
        }
    }

    if hits.is_empty() {
        return Ok(NO_RESULTS.to_string());
    }
    let listing = hits
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join("\n");
    Ok(format!("Search results:\n{}", listing))
}

fn files_first(a: &DirEntry, b: &DirEntry) -> Ordering {
    a.file_type()
        .is_dir()
        .cmp(&b.file_type().is_dir())
        .then_with(|| a.file_name().cmp(b.file_name()))
}

/// Regular files, plus symlinks that do not point at a directory.
fn is_listable_file(entry: &DirEntry) -> bool {
    let file_type = entry.file_type();
    file_type.is_file() || (file_type.is_symlink() && !entry.path().is_dir())
}

struct NameFilter<'a> {
    keywords: &'a [String],
    ext: Vec<String>,
}

impl NameFilter<'_> {
    fn matches(&self, file_name: &str) -> bool {
        let name_ok = self.keywords.iter().all(|k| file_name.contains(k.as_str()));
        if !name_ok {
            return false;
        }
        if self.ext.is_empty() {
            return true;
        }
        let lower = file_name.to_lowercase();
        self.ext.iter().any(|e| lower.ends_with(e.as_str()))
    }
}
