//! Initialisation of the program logger.
//!
//! Log messages go to the terminal, colourised when the stream is one, with warnings and errors
//! split onto stderr. Long-running commands can additionally keep plain-text log files. The log
//! level comes from the `SCOUT_LOG_LEVEL` environment variable, falling back to the level named
//! in the settings file.
use anyhow::{Result, bail};
use chrono::Local;
use fern::colors::{Color, ColoredLevelConfig};
use fern::{Dispatch, FormatCallback};
use log::{LevelFilter, Record};
use std::env;
use std::fmt::{Arguments, Display};
use std::fs::{File, OpenOptions};
use std::io::IsTerminal;
use std::path::Path;

/// The log level used when neither the environment nor the settings file names one
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Environment variable overriding the configured log level
const LOG_LEVEL_ENV_VAR: &str = "SCOUT_LOG_LEVEL";

/// The file name for messages about ordinary operation
const LOG_INFO_FILE_NAME: &str = "scout_info.log";

/// The file name for warnings and error messages
const LOG_ERROR_FILE_NAME: &str = "scout_error.log";

/// Initialise the program logger.
///
/// The level from the settings file can be overridden with the `SCOUT_LOG_LEVEL` environment
/// variable. Recognised levels are `off`, `error`, `warn`, `info`, `debug` and `trace`.
///
/// # Arguments
///
/// * `log_level_from_settings`: The log level named in `settings.toml`
/// * `log_dir`: Where to keep log files, if anywhere
pub fn init(log_level_from_settings: &str, log_dir: Option<&Path>) -> Result<()> {
    let log_level =
        env::var(LOG_LEVEL_ENV_VAR).unwrap_or_else(|_| log_level_from_settings.to_string());
    let log_level = parse_log_level(&log_level)?;

    let colours = ColoredLevelConfig::new()
        .error(Color::Red)
        .warn(Color::Yellow)
        .info(Color::Green)
        .debug(Color::Blue)
        .trace(Color::Magenta);

    let mut dispatch = Dispatch::new()
        .chain(stdout_chain(log_level, colours))
        .chain(stderr_chain(log_level, colours));
    if let Some(log_dir) = log_dir {
        dispatch = dispatch
            .chain(info_file_chain(log_level, log_dir)?)
            .chain(error_file_chain(log_dir)?);
    }
    dispatch.apply()?;

    Ok(())
}

/// Non-error messages for the terminal
fn stdout_chain(log_level: LevelFilter, colours: ColoredLevelConfig) -> Dispatch {
    // Only colourise streams going to a terminal
    let use_colour = std::io::stdout().is_terminal();

    Dispatch::new()
        .filter(|metadata| metadata.level() > LevelFilter::Warn)
        .format(move |out, message, record| {
            write_log_colour(out, message, record, use_colour, &colours);
        })
        .level(log_level)
        .chain(std::io::stdout())
}

/// Warnings and errors for the terminal
fn stderr_chain(log_level: LevelFilter, colours: ColoredLevelConfig) -> Dispatch {
    let use_colour = std::io::stderr().is_terminal();

    Dispatch::new()
        .format(move |out, message, record| {
            write_log_colour(out, message, record, use_colour, &colours);
        })
        .level(log_level.min(LevelFilter::Warn))
        .chain(std::io::stderr())
}

/// Non-error messages for the info log file, always capturing at least level info
fn info_file_chain(log_level: LevelFilter, log_dir: &Path) -> Result<Dispatch> {
    Ok(Dispatch::new()
        .filter(|metadata| metadata.level() > LevelFilter::Warn)
        .format(write_log_plain)
        .level(log_level.max(LevelFilter::Info))
        .chain(new_log_file(log_dir, LOG_INFO_FILE_NAME)?))
}

/// Warnings and errors for the error log file
fn error_file_chain(log_dir: &Path) -> Result<Dispatch> {
    Ok(Dispatch::new()
        .format(write_log_plain)
        .level(LevelFilter::Warn)
        .chain(new_log_file(log_dir, LOG_ERROR_FILE_NAME)?))
}

/// Create or truncate a log file in `log_dir`
fn new_log_file(log_dir: &Path, file_name: &str) -> std::io::Result<File> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(log_dir.join(file_name))
}

/// Convert a log level name to a level filter
fn parse_log_level(name: &str) -> Result<LevelFilter> {
    let level = match name.to_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "info" => LevelFilter::Info,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        unknown => bail!("Unknown log level: {unknown}"),
    };

    Ok(level)
}

/// Write a log line as `[time level target] message`
fn write_log<T: Display>(out: FormatCallback, level: T, record: &Record, message: &Arguments) {
    let timestamp = Local::now().format("%H:%M:%S");

    out.finish(format_args!(
        "[{timestamp} {level} {}] {message}",
        record.target()
    ));
}

/// Write a log line with no colours
fn write_log_plain(out: FormatCallback, message: &Arguments, record: &Record) {
    write_log(out, record.level(), record, message);
}

/// Write a log line with optional colours
fn write_log_colour(
    out: FormatCallback,
    message: &Arguments,
    record: &Record,
    use_colour: bool,
    colours: &ColoredLevelConfig,
) {
    if use_colour {
        write_log(out, colours.color(record.level()), record, message);
    } else {
        write_log_plain(out, message, record);
    }
}
