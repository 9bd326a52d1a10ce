use anyhow::Result;
use log::debug;

use glb_tools::{ConversionSession, ConvertConfig};

fn main() {
    env_logger::init();
    match run() {
        Ok(output) => println!("Successfully converted to {output}"),
        Err(err) => {
            println!("Error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<String> {
    let config = ConvertConfig::from_env()?;
    debug!("configuration: {config:?}");
    let mut session = ConversionSession::new(config.build_host());
    let output = session.convert(&config.input)?;
    Ok(output.display().to_string())
}
