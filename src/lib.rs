//! Tooling for producing binary glTF assets.
//!
//! Two tools are built on this crate. `convert-model` turns a scene file into
//! a `.glb` container through a [`SceneHost`]: either an external Blender
//! process or the in-process [`NativeHost`], which reads XML scene
//! descriptions and OBJ meshes. `spider-stub` prints a placeholder glTF
//! document that has the scene layout of a spider model but no geometry.

pub mod config;
pub mod document;
pub mod export;
pub mod glb;
pub mod host;
pub mod obj;
pub mod scene;
pub mod session;
pub mod stub;

pub use config::ConvertConfig;
pub use document::Document;
pub use export::{export_glb, ExportOptions, ExportScope, LoadedObject};
pub use host::{BlenderHost, ConvertError, HostKind, NativeHost, SceneHost};
pub use obj::{load_obj_from_str, ObjMesh};
pub use scene::{SceneDescription, SceneObject};
pub use session::{output_path_for, ConversionSession};
pub use stub::{build_spider_stub, render_spider_stub};
