/// Log backend setup.
///
/// The terminal belongs to the renderer while the app runs, so records go
/// to `birthday.log` in the data directory instead of stderr.

use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};

use log::LevelFilter;
use simplelog::{ConfigBuilder, LevelPadding, WriteLogger};

pub const LOG_FILE: &str = "birthday.log";

fn log_config() -> simplelog::Config {
    ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_level_padding(LevelPadding::Off)
        .set_target_level(LevelFilter::Error)
        .set_thread_level(LevelFilter::Off)
        .build()
}

/// Install the file logger, appending to `dir/birthday.log`. The backend
/// accepts everything; `level` becomes the global filter so it can be
/// changed later with `log::set_max_level`.
pub fn init(dir: &Path, level: LevelFilter) -> io::Result<PathBuf> {
    let path = dir.join(LOG_FILE);
    let file = OpenOptions::new().create(true).append(true).open(&path)?;
    WriteLogger::init(LevelFilter::Trace, log_config(), file).map_err(io::Error::other)?;
    log::set_max_level(level);
    Ok(path)
}
