//! Hosts that own a loaded scene and know how to export it.

mod blender;
mod native;

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::export::ExportOptions;

pub use blender::{BlenderHost, DEFAULT_BLENDER};
pub use native::NativeHost;

/// Failures a conversion can report.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("file not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    #[error("failed to load {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("failed to export {}: {message}", path.display())]
    Export { path: PathBuf, message: String },
}

impl ConvertError {
    pub fn parse(path: &Path, err: impl std::fmt::Display) -> Self {
        Self::Parse {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }

    pub fn export(path: &Path, err: impl std::fmt::Display) -> Self {
        Self::Export {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }
}

/// Application that holds a working scene between `load` and `export`.
pub trait SceneHost {
    /// Short name used in log output.
    fn name(&self) -> &str;

    /// Discards whatever scene is currently loaded.
    fn reset(&mut self);

    /// Loads `path` as the working scene, replacing the previous one.
    fn load(&mut self, path: &Path) -> Result<(), ConvertError>;

    /// Writes the working scene to `output` as a binary glTF container.
    fn export(&mut self, output: &Path, options: &ExportOptions) -> Result<(), ConvertError>;
}

impl<T> SceneHost for Box<T>
where
    T: SceneHost + ?Sized,
{
    fn name(&self) -> &str {
        (**self).name()
    }

    fn reset(&mut self) {
        (**self).reset()
    }

    fn load(&mut self, path: &Path) -> Result<(), ConvertError> {
        (**self).load(path)
    }

    fn export(&mut self, output: &Path, options: &ExportOptions) -> Result<(), ConvertError> {
        (**self).export(output, options)
    }
}

/// Selects which host handles an input file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HostKind {
    /// Blender for `.blend` files, the native host for everything else.
    #[default]
    Auto,
    Blender,
    Native,
}

impl HostKind {
    /// Resolves `Auto` against the input path.
    pub fn resolve(self, input: &Path) -> HostKind {
        match self {
            HostKind::Auto => {
                let extension = input
                    .extension()
                    .map(|ext| ext.to_string_lossy().to_ascii_lowercase());
                match extension.as_deref() {
                    Some("blend") | Some("blend1") => HostKind::Blender,
                    _ => HostKind::Native,
                }
            }
            other => other,
        }
    }
}

impl std::str::FromStr for HostKind {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> anyhow::Result<Self> {
        match value {
            "auto" => Ok(HostKind::Auto),
            "blender" => Ok(HostKind::Blender),
            "native" => Ok(HostKind::Native),
            other => Err(anyhow::anyhow!(
                "unknown host {other:?}; expected auto, blender or native"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_picks_blender_for_blend_files() {
        assert_eq!(
            HostKind::Auto.resolve(Path::new("spider.blend")),
            HostKind::Blender
        );
        assert_eq!(
            HostKind::Auto.resolve(Path::new("models/Spider.BLEND")),
            HostKind::Blender
        );
        assert_eq!(
            HostKind::Auto.resolve(Path::new("spider.scene")),
            HostKind::Native
        );
        assert_eq!(
            HostKind::Native.resolve(Path::new("spider.blend")),
            HostKind::Native
        );
    }

    #[test]
    fn parses_host_names() {
        assert_eq!("blender".parse::<HostKind>().unwrap(), HostKind::Blender);
        assert!("maya".parse::<HostKind>().is_err());
    }

    #[test]
    fn errors_name_the_path() {
        let err = ConvertError::FileNotFound {
            path: PathBuf::from("missing.blend"),
        };
        assert_eq!(err.to_string(), "file not found: missing.blend");
        let err = ConvertError::export(Path::new("out.glb"), "disk full");
        assert_eq!(err.to_string(), "failed to export out.glb: disk full");
    }
}
