//! Shader source loading and the shared shader object cache.

use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};

use prism_core::{PrismError, Result};
use rustc_hash::FxHashMap;

use crate::device::{ShaderHandle, ShaderStage};

/// Where shader sources come from.
pub trait ShaderLoader {
    /// Returns the source text at `path`.
    fn load(&mut self, path: &Path) -> Result<String>;
}

/// Reads shader sources from disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileShaderLoader;

impl ShaderLoader for FileShaderLoader {
    fn load(&mut self, path: &Path) -> Result<String> {
        std::fs::read_to_string(path).map_err(|error| match error.kind() {
            io::ErrorKind::NotFound => PrismError::ShaderSourceMissing(path.display().to_string()),
            _ => PrismError::Io(error),
        })
    }
}

/// Serves shader sources from memory, keyed by path.
///
/// Used by tools and tests that ship their shaders inline.
#[derive(Debug, Clone, Default)]
pub struct MemoryShaderLoader {
    sources: FxHashMap<PathBuf, String>,
}

impl MemoryShaderLoader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_source(mut self, path: impl Into<PathBuf>, source: impl Into<String>) -> Self {
        self.insert(path, source);
        self
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, source: impl Into<String>) {
        self.sources.insert(path.into(), source.into());
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl ShaderLoader for MemoryShaderLoader {
    fn load(&mut self, path: &Path) -> Result<String> {
        self.sources
            .get(path)
            .cloned()
            .ok_or_else(|| PrismError::ShaderSourceMissing(path.display().to_string()))
    }
}

/// A compiled shader stage shared by every pass that asks for the same file
/// and define set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderObject {
    pub handle: ShaderHandle,
    pub stage: ShaderStage,
    /// Defines the stage was compiled with, global defines included.
    pub defines: BTreeSet<String>,
}

/// Cache key of a shader: the file name followed by its pass-level defines.
///
/// `("scene.frag", {"_ALPHATEST_", "_SHADOWS_"})` → `"scene.frag _ALPHATEST_ _SHADOWS_"`
#[must_use]
pub fn shader_cache_name(file: &str, defines: &BTreeSet<String>) -> String {
    let mut name = file.to_owned();
    for define in defines {
        name.push(' ');
        name.push_str(define);
    }
    name
}

/// Resolves a shader file against the configured shader directory.
#[must_use]
pub fn shader_file_path(shader_path: &str, file: &str) -> PathBuf {
    if shader_path.is_empty() {
        PathBuf::from(file)
    } else {
        Path::new(shader_path).join(file)
    }
}

/// Inserts one `#define` line per define.
///
/// The block goes right after a leading `#version` line, which must stay the
/// first statement of the source, or at the very top otherwise.
#[must_use]
pub fn insert_define_block(source: &str, defines: &BTreeSet<String>) -> String {
    let block: String = defines
        .iter()
        .filter(|define| !define.is_empty())
        .map(|define| format!("#define {define}\n"))
        .collect();

    if source.starts_with("#version")
        && let Some(newline) = source.find('\n')
        && newline + 1 < source.len()
    {
        let (version, body) = source.split_at(newline + 1);
        return format!("{version}{block}{body}");
    }
    format!("{block}{source}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defines(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|name| (*name).to_owned()).collect()
    }

    #[test]
    fn cache_names_include_sorted_defines() {
        assert_eq!(shader_cache_name("scene.vert", &BTreeSet::new()), "scene.vert");
        assert_eq!(
            shader_cache_name("scene.frag", &defines(&["_SHADOWS_", "_ALPHATEST_"])),
            "scene.frag _ALPHATEST_ _SHADOWS_"
        );
    }

    #[test]
    fn define_block_follows_version_line() {
        let source = "#version 330\nvoid main() {}\n";
        let patched = insert_define_block(source, &defines(&["_FOG_"]));

        assert_eq!(patched, "#version 330\n#define _FOG_\nvoid main() {}\n");
    }

    #[test]
    fn define_block_is_prepended_without_version() {
        let patched = insert_define_block("void main() {}", &defines(&["A", ""]));
        assert_eq!(patched, "#define A\nvoid main() {}");

        // A lone version line has no body to insert before.
        let patched = insert_define_block("#version 330", &defines(&["A"]));
        assert_eq!(patched, "#define A\n#version 330");
    }

    #[test]
    fn shader_paths() {
        assert_eq!(shader_file_path("", "a.vert"), PathBuf::from("a.vert"));
        assert_eq!(
            shader_file_path("shaders", "a.vert"),
            PathBuf::from("shaders").join("a.vert")
        );
    }

    #[test]
    fn memory_loader_reports_missing_sources() {
        let mut loader = MemoryShaderLoader::new().with_source("a.vert", "void main() {}");

        assert_eq!(loader.load(Path::new("a.vert")).unwrap(), "void main() {}");
        assert!(matches!(
            loader.load(Path::new("b.vert")),
            Err(PrismError::ShaderSourceMissing(path)) if path == "b.vert"
        ));
    }
}
