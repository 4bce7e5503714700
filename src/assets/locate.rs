use std::path::{Path, PathBuf};

use crate::foundation::error::{CompositorError, CompositorResult};

/// Where relative manifest paths are resolved from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BaseLocation {
    /// Local data directory.
    Dir(PathBuf),
    /// Remote or scheme-qualified base URI.
    Uri(String),
}

/// Fully resolved location of a resource.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResourceLocation {
    /// Scheme-qualified URI (`file://`, `https://`, ...).
    Uri(String),
    /// Local file path.
    File(PathBuf),
}

impl ResourceLocation {
    /// Resolve a manifest path against `base`.
    ///
    /// In order: anything containing `://` is a URI taken verbatim, a leading `/` is an absolute
    /// local file, everything else is joined onto `base`.
    pub fn resolve(path: &str, base: &BaseLocation) -> Self {
        if path.contains("://") {
            return Self::Uri(path.to_owned());
        }
        if path.starts_with('/') {
            return Self::File(PathBuf::from(path));
        }
        let rel = normalize_rel_path(path);
        match base {
            BaseLocation::Dir(dir) => Self::File(dir.join(rel)),
            BaseLocation::Uri(uri) => {
                Self::Uri(format!("{}/{}", uri.trim_end_matches('/'), rel))
            }
        }
    }

    /// Local path for `File` locations and `file://` URIs.
    pub fn local_path(&self) -> Option<PathBuf> {
        match self {
            Self::File(p) => Some(p.clone()),
            Self::Uri(u) => u.strip_prefix("file://").map(PathBuf::from),
        }
    }

    /// Read the whole resource. Only local resources are readable.
    pub fn read_bytes(&self) -> CompositorResult<Vec<u8>> {
        let path = self.local_path().ok_or_else(|| {
            CompositorError::resource_unavailable(format!("cannot read remote resource {self}"))
        })?;
        std::fs::read(&path).map_err(|e| {
            CompositorError::resource_unavailable(format!("read '{}': {e}", path.display()))
        })
    }

    /// Input argument for `ffmpeg`/`ffprobe`, which accept both paths and URIs.
    pub fn as_media_input(&self) -> std::ffi::OsString {
        match self {
            Self::File(p) => p.as_os_str().to_owned(),
            Self::Uri(u) => u.into(),
        }
    }
}

impl std::fmt::Display for ResourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uri(u) => f.write_str(u),
            Self::File(p) => write!(f, "{}", p.display()),
        }
    }
}

fn normalize_rel_path(p: &str) -> String {
    let p = p.replace('\\', "/");
    p.split('/')
        .filter(|seg| !seg.is_empty() && *seg != ".")
        .collect::<Vec<_>>()
        .join("/")
}

impl From<&Path> for BaseLocation {
    fn from(p: &Path) -> Self {
        Self::Dir(p.to_path_buf())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/locate.rs"]
mod tests;
