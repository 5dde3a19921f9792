//! Loading of user-level program settings.
use crate::get_scout_config_dir;
use crate::input::read_toml;
use crate::log::DEFAULT_LOG_LEVEL;
use anyhow::Result;
use documented::DocumentedFields;
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::path::{Path, PathBuf};

const SETTINGS_FILE_NAME: &str = "settings.toml";

const DEFAULT_SETTINGS_FILE_HEADER: &str = "# This file contains the program settings for scout
";

/// Default log level for the program
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

/// The location of the settings file inside the user config directory
pub fn get_settings_file_path() -> PathBuf {
    get_scout_config_dir().join(SETTINGS_FILE_NAME)
}

/// Program settings from the user config file
#[derive(Debug, DocumentedFields, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// Log level for console and file output
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Whether commands overwrite existing output files
    #[serde(default)]
    pub overwrite: bool,
}

impl Default for Settings {
    fn default() -> Settings {
        toml::from_str("").expect("settings must deserialise from an empty document")
    }
}

impl Settings {
    /// Read the settings file from the user config directory.
    ///
    /// A missing file is not an error; every setting then takes its default value. A file that
    /// does not parse is.
    pub fn load() -> Result<Settings> {
        Self::load_from_path(&get_settings_file_path())
    }

    /// Read from the specified path, defaulting when the file is absent
    fn load_from_path(file_path: &Path) -> Result<Settings> {
        if !file_path.is_file() {
            return Ok(Settings::default());
        }

        read_toml(file_path)
    }

    /// The contents of the default settings file.
    ///
    /// Every setting appears commented out at its default value, preceded by its documentation.
    pub fn default_file_contents() -> String {
        let serialised =
            toml::to_string(&Settings::default()).expect("Could not convert settings to TOML");

        let mut contents = DEFAULT_SETTINGS_FILE_HEADER.to_string();
        for line in serialised.lines() {
            let Some((field, _)) = line.split_once('=') else {
                continue;
            };

            // All fields carry doc comments
            let docs =
                Settings::get_field_docs(field.trim()).expect("Missing doc comment for field");
            for doc_line in docs.lines() {
                write!(&mut contents, "\n# # {}\n", doc_line.trim()).unwrap();
            }

            writeln!(&mut contents, "# {}", line.trim()).unwrap();
        }

        contents
    }
}
