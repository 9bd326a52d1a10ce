use std::ffi::OsString;
use std::path::PathBuf;

use anyhow::{anyhow, Result};

use crate::host::{BlenderHost, HostKind, NativeHost, SceneHost, DEFAULT_BLENDER};

/// Input used when no path is given on the command line.
pub const DEFAULT_INPUT: &str = "spider.blend";
/// Environment variable naming the Blender executable.
pub const BLENDER_ENV: &str = "BLENDER_BIN";

pub const USAGE: &str =
    "Usage: convert-model [--host auto|blender|native] [--blender <path>] [input]";

/// Settings for one `convert-model` run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertConfig {
    pub input: PathBuf,
    pub host: HostKind,
    pub blender: PathBuf,
}

impl ConvertConfig {
    /// Reads the configuration from the process arguments and environment.
    pub fn from_env() -> Result<Self> {
        Self::parse(
            std::env::args_os().skip(1),
            std::env::var_os(BLENDER_ENV).map(PathBuf::from),
        )
    }

    /// Parses command-line arguments (without the program name).
    ///
    /// The last positional argument is the input path. `blender_env` is the
    /// value of [`BLENDER_ENV`], overridden by `--blender`. Paths need not
    /// be valid UTF-8; flags and the `--host` value must be.
    pub fn parse<I, S>(args: I, blender_env: Option<PathBuf>) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        let mut args = args.into_iter().map(Into::<OsString>::into);
        let mut input = None;
        let mut host = HostKind::Auto;
        let mut blender = None;

        while let Some(arg) = args.next() {
            let Some(flag) = arg.to_str() else {
                input = Some(PathBuf::from(arg));
                continue;
            };
            match flag {
                "--host" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow!("--host needs a value. {USAGE}"))?;
                    host = value
                        .to_str()
                        .ok_or_else(|| anyhow!("--host value is not valid UTF-8. {USAGE}"))?
                        .parse()?;
                }
                "--blender" => {
                    let value = args
                        .next()
                        .ok_or_else(|| anyhow!("--blender needs a path. {USAGE}"))?;
                    blender = Some(PathBuf::from(value));
                }
                "-h" | "--help" => return Err(anyhow!(USAGE)),
                other if other.starts_with("--") => {
                    return Err(anyhow!("Unknown argument: {other}. {USAGE}"));
                }
                _ => input = Some(PathBuf::from(arg)),
            }
        }

        Ok(Self {
            input: input.unwrap_or_else(|| PathBuf::from(DEFAULT_INPUT)),
            host,
            blender: blender
                .or(blender_env)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_BLENDER)),
        })
    }

    /// Creates the host that handles this configuration's input.
    pub fn build_host(&self) -> Box<dyn SceneHost> {
        match self.host.resolve(&self.input) {
            HostKind::Blender => Box::new(BlenderHost::new(&self.blender)),
            _ => Box::new(NativeHost::new()),
        }
    }
}
