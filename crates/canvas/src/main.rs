use sim::SimConfig;

fn main() {
    env_logger::init();

    let config = match std::env::args().nth(1) {
        Some(path) => {
            let text = match std::fs::read_to_string(&path) {
                Ok(text) => text,
                Err(error) => {
                    eprintln!("failed to read config '{path}': {error}");
                    std::process::exit(1);
                }
            };
            match SimConfig::from_toml_str(&text) {
                Ok(config) => config,
                Err(error) => {
                    eprintln!("failed to parse config '{path}': {error}");
                    std::process::exit(1);
                }
            }
        }
        None => SimConfig::default(),
    };

    canvas::app::run(config);
}
