use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, info};

use crate::export::{export_glb, ExportOptions, LoadedObject};
use crate::obj::load_obj_from_str;
use crate::scene::SceneDescription;

use super::{ConvertError, SceneHost};

/// In-process host that reads XML scene descriptions and OBJ meshes.
#[derive(Debug, Default)]
pub struct NativeHost {
    scene: Option<LoadedScene>,
}

#[derive(Debug)]
struct LoadedScene {
    source: PathBuf,
    objects: Vec<LoadedObject>,
}

impl NativeHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Objects in the working scene, empty when nothing is loaded.
    pub fn objects(&self) -> &[LoadedObject] {
        self.scene
            .as_ref()
            .map(|scene| scene.objects.as_slice())
            .unwrap_or_default()
    }
}

impl SceneHost for NativeHost {
    fn name(&self) -> &str {
        "native"
    }

    fn reset(&mut self) {
        if let Some(scene) = self.scene.take() {
            debug!("discarding scene {}", scene.source.display());
        }
    }

    fn load(&mut self, path: &Path) -> Result<(), ConvertError> {
        if !path.is_file() {
            return Err(ConvertError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let objects =
            load_scene(path).map_err(|err| ConvertError::parse(path, format!("{err:#}")))?;
        info!(
            "loaded {} object(s) from {}",
            objects.len(),
            path.display()
        );
        self.scene = Some(LoadedScene {
            source: path.to_path_buf(),
            objects,
        });
        Ok(())
    }

    fn export(&mut self, output: &Path, options: &ExportOptions) -> Result<(), ConvertError> {
        let scene = self
            .scene
            .as_ref()
            .ok_or_else(|| ConvertError::export(output, "no scene is loaded"))?;
        let bytes = export_glb(&scene.objects, options)
            .map_err(|err| ConvertError::export(output, format!("{err:#}")))?;
        fs::write(output, &bytes).map_err(|err| ConvertError::export(output, err))?;
        info!("wrote {} bytes to {}", bytes.len(), output.display());
        Ok(())
    }
}

fn load_scene(path: &Path) -> Result<Vec<LoadedObject>> {
    let is_obj = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("obj"));
    let description = if is_obj {
        SceneDescription::single_mesh(path)
    } else {
        let xml = fs::read_to_string(path)
            .with_context(|| format!("unable to read {}", path.display()))?;
        SceneDescription::from_xml(&xml)?
    };

    let base = path.parent().unwrap_or_else(|| Path::new(""));
    description
        .objects
        .into_iter()
        .map(|object| {
            let mesh = match &object.mesh {
                Some(mesh_path) => {
                    let resolved = if is_obj {
                        mesh_path.clone()
                    } else {
                        base.join(mesh_path)
                    };
                    let text = fs::read_to_string(&resolved)
                        .with_context(|| format!("unable to read mesh {}", resolved.display()))?;
                    let mesh = load_obj_from_str(&text)
                        .with_context(|| format!("invalid mesh {}", resolved.display()))?;
                    Some(mesh)
                }
                None => None,
            };
            Ok(LoadedObject { object, mesh })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::glb;
    use tempfile::TempDir;

    const TRIANGLE: &str = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";

    fn fixture() -> TempDir {
        let dir = TempDir::new().expect("temp dir");
        fs::write(dir.path().join("body.obj"), TRIANGLE).unwrap();
        fs::write(
            dir.path().join("spider.scene"),
            "<scene><object><name>Body</name><mesh>body.obj</mesh></object></scene>",
        )
        .unwrap();
        dir
    }

    #[test]
    fn load_then_export_writes_glb() {
        let dir = fixture();
        let mut host = NativeHost::new();
        host.load(&dir.path().join("spider.scene")).unwrap();
        assert_eq!(host.objects().len(), 1);

        let output = dir.path().join("spider.glb");
        host.export(&output, &ExportOptions::default()).unwrap();
        let glb = glb::decode(&fs::read(output).unwrap()).unwrap();
        assert!(glb.bin.is_some());
    }

    #[test]
    fn reset_discards_the_scene() {
        let dir = fixture();
        let mut host = NativeHost::new();
        host.load(&dir.path().join("spider.scene")).unwrap();
        host.reset();
        assert!(host.objects().is_empty());
        let err = host
            .export(&dir.path().join("out.glb"), &ExportOptions::default())
            .unwrap_err();
        assert!(matches!(err, ConvertError::Export { .. }));
    }

    #[test]
    fn bare_obj_is_a_single_object_scene() {
        let dir = fixture();
        let mut host = NativeHost::new();
        host.load(&dir.path().join("body.obj")).unwrap();
        assert_eq!(host.objects()[0].object.name, "body");
        assert!(host.objects()[0].mesh.is_some());
    }

    #[test]
    fn missing_mesh_is_a_parse_error() {
        let dir = TempDir::new().unwrap();
        let scene = dir.path().join("broken.scene");
        fs::write(
            &scene,
            "<scene><object><name>Legs</name><mesh>legs.obj</mesh></object></scene>",
        )
        .unwrap();
        let err = NativeHost::new().load(&scene).unwrap_err();
        assert!(matches!(err, ConvertError::Parse { .. }));
        assert!(err.to_string().contains("legs.obj"));
    }

    #[test]
    fn missing_file_is_reported_as_not_found() {
        let err = NativeHost::new()
            .load(Path::new("does/not/exist.scene"))
            .unwrap_err();
        assert!(matches!(err, ConvertError::FileNotFound { .. }));
    }
}
