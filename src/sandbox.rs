//! Sandbox root and the path resolver that keeps every model-supplied name
//! beneath it.
//!
//! Untrusted strings never choose a directory: only their final component is
//! kept and joined under the root.

use crate::error::{FiletalkError, Result};
use std::fs;
use std::path::{Component, Path, PathBuf};

/// The single directory all mutations are confined to.
#[derive(Clone, Debug)]
pub struct Sandbox {
    root: PathBuf,
}

impl Sandbox {
    /// Creates the root (and its parents) if missing, then pins it to its
    /// canonical absolute form.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        fs::create_dir_all(root)?;
        let root = root.canonicalize()?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Final path component of an untrusted string.
    ///
    /// Both `/` and `\` count as separators. Returns `None` when nothing usable
    /// is left (empty, `.`, `..`, a bare drive prefix).
    pub fn basename(raw: &str) -> Option<&str> {
        let name = raw
            .trim()
            .rsplit(['/', '\\'])
            .map(str::trim)
            .find(|seg| !seg.is_empty())?;

        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Some(name),
            _ => None,
        }
    }

    /// `<root>/<basename(raw)>`, or `<root>/<default_name>` when `raw` has no
    /// usable basename.
    pub fn resolve(&self, raw: &str, default_name: &str) -> PathBuf {
        let name = Self::basename(raw).unwrap_or(default_name);
        self.root.join(name)
    }

    /// Destination for a move of `src_name`.
    ///
    /// An extension-less destination is a directory and receives the source's
    /// name; anything with an extension is taken as the literal target file.
    /// No usable destination keeps the file at the root under its own name.
    pub fn resolve_move_destination(&self, src_name: &str, raw_dst: &str) -> PathBuf {
        match Self::basename(raw_dst) {
            None => self.root.join(src_name),
            Some(dst) if Path::new(dst).extension().is_none() => {
                self.root.join(dst).join(src_name)
            }
            Some(dst) => self.root.join(dst),
        }
    }

    /// Lexical containment: `path` sits under the root and carries no `..`.
    pub fn contains(&self, path: &Path) -> bool {
        path.starts_with(&self.root)
            && !path
                .components()
                .any(|c| matches!(c, Component::ParentDir | Component::CurDir))
    }

    /// Physical containment check, done right before a mutation.
    ///
    /// A path that does not exist yet cannot be canonicalized, so the deepest
    /// existing ancestor is resolved instead. That catches a symlink planted
    /// inside the root that points elsewhere.
    pub fn ensure_contained(&self, path: &Path) -> Result<()> {
        if !self.contains(path) {
            return Err(FiletalkError::SandboxEscape {
                path: path.display().to_string(),
            });
        }

        let mut current = Some(path);
        while let Some(p) = current {
            // symlink_metadata: 깨진 링크도 "존재"로 취급
            if fs::symlink_metadata(p).is_ok() {
                let real = p.canonicalize().map_err(|_| FiletalkError::SandboxEscape {
                    path: p.display().to_string(),
                })?;
                if !real.starts_with(&self.root) {
                    return Err(FiletalkError::SandboxEscape {
                        path: path.display().to_string(),
                    });
                }
                return Ok(());
            }
            current = p.parent();
        }

        Err(FiletalkError::SandboxEscape {
            path: path.display().to_string(),
        })
    }
}
