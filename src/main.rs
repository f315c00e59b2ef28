use crate::opt::{ConfigFile, Demo};
use refgate::Error;
use std::fs::{self, File};
use std::io;
use std::path::Path;

mod demo;
mod logging;
mod opt;

fn main() -> Result<(), Error> {
    let opt::Cli {
        verbose,
        config,
        log_file,
        demo,
    } = argh::from_env();

    // Init logging as early as possible.
    logging::init(log_file.as_deref(), verbose);

    let config = match config {
        Some(path) => load_config_file(&path),
        None => ConfigFile::default(),
    };

    log::info!("Started up refgate {}", env!("CARGO_PKG_VERSION"));

    let result = match demo {
        Demo::Dispatch(_) => demo::dispatch(),
        Demo::Worker(_) => demo::worker(&config),
    };

    if let Err(e) = result {
        log::error!("Demo failed: {e}");
        return Err(e);
    }

    Ok(())
}

fn load_config_file(path: &Path) -> ConfigFile {
    let default_config = ConfigFile::default();

    match File::open(path) {
        Ok(file) => match serde_json::from_reader(file) {
            Ok(config) => {
                log::info!("Loaded config from file `{}`", path.display());
                config
            }
            Err(e) => {
                log::error!("Failed to parse config file `{}`: {e}", path.display());
                default_config
            }
        },
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            log::info!("Config file `{}` not found, creating", path.display());
            match File::create(path) {
                Ok(file) => {
                    if let Err(e) = serde_json::to_writer_pretty(file, &default_config) {
                        log::warn!("Failed to write config file `{}`: {e}", path.display());
                        if let Err(e) = fs::remove_file(path) {
                            log::warn!("...and failed to delete the empty file: {e}");
                        }
                    }
                }
                Err(e) => log::warn!("Failed to create config file `{}`: {e}", path.display()),
            }
            default_config
        }
        Err(e) => {
            log::error!("Failed to load config file: {e}");
            default_config
        }
    }
}
