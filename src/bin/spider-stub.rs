//! Prints the placeholder spider glTF document.

fn main() {
    env_logger::init();
    match glb_tools::render_spider_stub() {
        Ok(json) => println!("{json}"),
        Err(err) => {
            println!("Error: {err:#}");
            std::process::exit(1);
        }
    }
}
