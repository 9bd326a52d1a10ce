use std::path::{Path, PathBuf};

use log::info;

use crate::export::ExportOptions;
use crate::host::{ConvertError, SceneHost};

/// Extension of the binary glTF container written next to the input.
pub const OUTPUT_EXTENSION: &str = "glb";

/// Returns the path of the container written for `input`: the same path with
/// its extension replaced by `.glb`.
pub fn output_path_for(input: impl AsRef<Path>) -> PathBuf {
    input.as_ref().with_extension(OUTPUT_EXTENSION)
}

/// Owns a host and the scene loaded into it.
///
/// Callers only reach the host's working scene through the session, and each
/// conversion starts by resetting it.
#[derive(Debug)]
pub struct ConversionSession<H> {
    host: H,
    options: ExportOptions,
}

impl<H: SceneHost> ConversionSession<H> {
    /// Wraps `host`. Every conversion uses the fixed [`ExportOptions`].
    pub fn new(host: H) -> Self {
        Self {
            host,
            options: ExportOptions::default(),
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    /// Converts `input` into a sibling `.glb` file and returns its path.
    pub fn convert(&mut self, input: &Path) -> Result<PathBuf, ConvertError> {
        self.host.reset();
        if !input.is_file() {
            return Err(ConvertError::FileNotFound {
                path: input.to_path_buf(),
            });
        }

        let output = output_path_for(input);
        info!(
            "converting {} -> {} with the {} host",
            input.display(),
            output.display(),
            self.host.name()
        );
        self.host.load(input)?;
        self.host.export(&output, &self.options)?;
        Ok(output)
    }

    pub fn into_host(self) -> H {
        self.host
    }
}
