//! Bidirectional mapping between user-visible virtual paths and the
//! download root on disk.

use std::fmt;
use std::path::{Component, Path, PathBuf};

#[derive(Debug, PartialEq, Eq)]
pub enum SandboxError {
    Escape,
    NullByte,
}

impl fmt::Display for SandboxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SandboxError::Escape => {
                write!(f, "access denied: cannot navigate outside download directory")
            }
            SandboxError::NullByte => write!(f, "path contains null byte"),
        }
    }
}

impl std::error::Error for SandboxError {}

/// Maps the virtual root `/` onto a fixed internal directory and refuses
/// any path that would resolve outside of it.
#[derive(Debug, Clone)]
pub struct PathSandbox {
    root: PathBuf,
}

impl PathSandbox {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a virtual path to an internal path under the root.
    ///
    /// `..` and `.` segments are normalized lexically; a `..` that would
    /// climb past the virtual root is rejected, never clamped.
    pub fn resolve(&self, virtual_path: &str) -> Result<PathBuf, SandboxError> {
        // Rust hands paths to C-style APIs, so \0 would end the str early
        if virtual_path.contains('\0') {
            return Err(SandboxError::NullByte);
        }

        let mut segments: Vec<&std::ffi::OsStr> = Vec::new();
        for component in Path::new(virtual_path).components() {
            match component {
                Component::RootDir | Component::CurDir => {}
                Component::Normal(segment) => segments.push(segment),
                Component::ParentDir => {
                    if segments.pop().is_none() {
                        return Err(SandboxError::Escape);
                    }
                }
                Component::Prefix(_) => return Err(SandboxError::Escape),
            }
        }

        let mut internal = self.root.clone();
        for segment in segments {
            internal.push(segment);
        }
        Ok(internal)
    }

    /// Strip the root prefix from an internal path. The root itself maps
    /// back to `/`; paths outside the root are returned unchanged.
    pub fn unresolve(&self, internal: &Path) -> String {
        match internal.strip_prefix(&self.root) {
            Ok(rest) if rest.as_os_str().is_empty() => "/".to_string(),
            Ok(rest) => format!("/{}", rest.display()),
            Err(_) => internal.display().to_string(),
        }
    }
}
