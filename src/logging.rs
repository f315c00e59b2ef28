use log::LevelFilter;
use log4rs::Config;
use log4rs::append::console::{ConsoleAppender, Target};
use log4rs::append::file::FileAppender;
use log4rs::config::{Appender, Root};
use log4rs::encode::pattern::PatternEncoder;
use std::path::Path;

/// Initializes logging to `path`, or to stderr if there is none.
pub fn init(path: Option<&Path>, verbose: u8) {
    let encoder = Box::new(PatternEncoder::new(
        "[{date(%Y-%m-%d %H:%M:%S%.3f)} {highlight({level}):5} {thread} {target}] {highlight({message})}{n}",
    ));

    let appender: Box<dyn log4rs::append::Append> = match path {
        Some(path) => match FileAppender::builder().encoder(encoder).build(path) {
            Ok(appender) => Box::new(appender),
            Err(e) => panic!("Failed to open log file `{}`: {e}", path.display()),
        },
        None => Box::new(
            ConsoleAppender::builder()
                .encoder(encoder)
                .target(Target::Stderr)
                .build(),
        ),
    };

    let level = match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    let config = Config::builder()
        .appender(Appender::builder().build("default", appender))
        .build(Root::builder().appender("default").build(level));

    match config {
        Ok(config) => {
            if let Err(e) = log4rs::init_config(config) {
                panic!("Failed to install logger: {e}");
            }
        }
        Err(e) => panic!("Invalid logging config: {e}"),
    }
}
