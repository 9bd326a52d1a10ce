use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::Command;

use log::{debug, info};

use crate::export::{ExportOptions, ExportScope};

use super::{ConvertError, SceneHost};

/// Executable used when no Blender path is configured.
pub const DEFAULT_BLENDER: &str = "blender";

const BLEND_MAGIC: &[u8] = b"BLENDER";
const GZIP_MAGIC: &[u8] = &[0x1f, 0x8b];
const ZSTD_MAGIC: &[u8] = &[0x28, 0xb5, 0x2f, 0xfd];

/// Drives a Blender executable in background mode.
///
/// Every export starts a fresh Blender process with factory settings that
/// opens the loaded `.blend` file and runs the bundled glTF exporter, so no
/// state leaks between conversions.
#[derive(Debug)]
pub struct BlenderHost {
    executable: PathBuf,
    scene: Option<PathBuf>,
}

impl BlenderHost {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            scene: None,
        }
    }

    /// Builds the Blender invocation that exports `scene` to `output`.
    pub fn command(&self, scene: &Path, output: &Path, options: &ExportOptions) -> Command {
        let mut command = Command::new(&self.executable);
        command
            .arg("--background")
            .arg("--factory-startup")
            .arg(scene)
            .arg("--python-exit-code")
            .arg("1")
            .arg("--python-expr")
            .arg(export_expression(options))
            .arg("--")
            .arg(output);
        command
    }
}

impl Default for BlenderHost {
    fn default() -> Self {
        Self::new(DEFAULT_BLENDER)
    }
}

impl SceneHost for BlenderHost {
    fn name(&self) -> &str {
        "blender"
    }

    fn reset(&mut self) {
        self.scene = None;
    }

    fn load(&mut self, path: &Path) -> Result<(), ConvertError> {
        let mut header = [0u8; 7];
        let read = File::open(path)
            .and_then(|mut file| read_prefix(&mut file, &mut header))
            .map_err(|err| match err.kind() {
                ErrorKind::NotFound => ConvertError::FileNotFound {
                    path: path.to_path_buf(),
                },
                _ => ConvertError::parse(path, err),
            })?;
        let header = &header[..read];
        let recognised = header.starts_with(BLEND_MAGIC)
            || header.starts_with(GZIP_MAGIC)
            || header.starts_with(ZSTD_MAGIC);
        if !recognised {
            return Err(ConvertError::parse(path, "not a Blender scene file"));
        }
        debug!("queued {} for blender", path.display());
        self.scene = Some(path.to_path_buf());
        Ok(())
    }

    fn export(&mut self, output: &Path, options: &ExportOptions) -> Result<(), ConvertError> {
        let scene = self
            .scene
            .as_deref()
            .ok_or_else(|| ConvertError::export(output, "no scene is loaded"))?;
        // A leftover file would otherwise pass the existence check below.
        match fs::remove_file(output) {
            Ok(()) => debug!("removed stale {}", output.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => {
                return Err(ConvertError::export(
                    output,
                    format!("unable to replace existing output: {err}"),
                ))
            }
        }
        let mut command = self.command(scene, output, options);
        info!(
            "running {} on {}",
            self.executable.display(),
            scene.display()
        );
        let result = command.output().map_err(|err| {
            ConvertError::export(
                output,
                format!("failed to execute {}: {err}", self.executable.display()),
            )
        })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            let detail = stderr
                .lines()
                .rev()
                .find(|line| !line.trim().is_empty())
                .unwrap_or("no output");
            return Err(ConvertError::export(
                output,
                format!("blender exited with {}: {}", result.status, detail.trim()),
            ));
        }
        if !output.is_file() {
            return Err(ConvertError::export(
                output,
                "blender finished without writing the output file",
            ));
        }
        Ok(())
    }
}

fn read_prefix(file: &mut File, buffer: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        match file.read(&mut buffer[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

/// Python expression run inside Blender. The output path is read from the
/// arguments after `--` so it never needs quoting.
fn export_expression(options: &ExportOptions) -> OsString {
    let flag = |enabled: bool| if enabled { "True" } else { "False" };
    format!(
        "import bpy, sys; \
         bpy.ops.export_scene.gltf(\
         filepath=sys.argv[sys.argv.index('--') + 1], \
         export_format='GLB', \
         use_selection={}, \
         export_tangents={}, \
         export_texcoords={}, \
         export_normals={}, \
         export_materials='{}', \
         export_colors={})",
        flag(options.scope == ExportScope::Selection),
        flag(options.tangents),
        flag(options.texcoords),
        flag(options.normals),
        if options.materials { "EXPORT" } else { "NONE" },
        flag(options.colors),
    )
    .into()
}
