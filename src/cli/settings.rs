//! CLI subcommands for managing the settings file
use crate::settings::{Settings, get_settings_file_path};
use anyhow::{Context, Result};
use clap::Subcommand;
use std::fs;
use std::path::Path;

/// The settings file management subcommands
#[derive(Subcommand)]
pub enum SettingsSubcommands {
    /// Open the settings file in an editor, creating it first if need be
    Edit,
    /// Print the location of the settings file
    Path,
    /// Print a default settings file to the console
    DumpDefault,
}

impl SettingsSubcommands {
    /// Run the settings subcommand
    pub fn execute(self) -> Result<()> {
        let file_path = get_settings_file_path();
        match self {
            Self::Edit => {
                write_placeholder_if_missing(&file_path)?;
                println!("Opening settings file for editing: {}", file_path.display());
                edit::edit_file(&file_path)?;
            }
            Self::Path => println!("{}", file_path.display()),
            Self::DumpDefault => print!("{}", Settings::default_file_contents()),
        }

        Ok(())
    }
}

/// Create a placeholder settings file if one doesn't exist yet
fn write_placeholder_if_missing(file_path: &Path) -> Result<()> {
    if file_path.is_file() {
        return Ok(());
    }

    if let Some(dir_path) = file_path.parent() {
        fs::create_dir_all(dir_path).with_context(|| {
            format!("Failed to create settings directory: {}", dir_path.display())
        })?;
    }

    fs::write(file_path, Settings::default_file_contents())
        .with_context(|| format!("Failed to write settings file: {}", file_path.display()))?;

    Ok(())
}
