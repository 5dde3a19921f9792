//! Project configuration: scenario files, demand centres and original cost assumptions.
use crate::error::ScoutError;
use crate::finance::EconomicParams;
use crate::input::{input_err_msg, read_toml};
use anyhow::{Context, Result, bail, ensure};
use indexmap::IndexMap;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The name of the project file within a project directory
pub const PROJECT_FILE_NAME: &str = "project.toml";

/// The raw shape of a project file.
#[derive(Debug, Deserialize)]
struct ProjectFile {
    /// Display name; the directory name is used when absent
    name: Option<String>,
    /// Supply curve file per scenario name
    scenarios: IndexMap<String, PathBuf>,
    /// Demand centre file, for hydrogen projects
    demand_file: Option<PathBuf>,
    /// Cost assumption fields per scenario, under their source names
    #[serde(default)]
    parameters: HashMap<String, IndexMap<String, toml::Value>>,
}

/// A project's scenario files, demand centres and original cost assumptions.
///
/// Cost parameter fields arrive under whatever names the source data used
/// (`capex_atb_moderate`, "FCR 2030"). They are resolved when the project
/// loads: for each of capex, opex, fcr and losses, exactly one field name
/// must contain the key after lowercasing and removing spaces, otherwise
/// loading fails with [`ScoutError::MissingParameter`].
#[derive(Debug, Clone)]
pub struct ProjectConfig {
    directory: PathBuf,
    /// Display name of the project
    pub name: String,
    scenarios: IndexMap<String, PathBuf>,
    demand_file: Option<PathBuf>,
    parameters: HashMap<String, EconomicParams>,
}

impl ProjectConfig {
    /// Load the project file in `directory`.
    pub fn from_dir(directory: &Path) -> Result<ProjectConfig> {
        let file_path = directory.join(PROJECT_FILE_NAME);
        let raw: ProjectFile = read_toml(&file_path)?;

        ensure!(
            !raw.scenarios.is_empty(),
            "{}: a project needs at least one scenario",
            input_err_msg(&file_path)
        );

        let mut parameters = HashMap::new();
        for (scenario, fields) in &raw.parameters {
            ensure!(
                raw.scenarios.contains_key(scenario),
                "{}: parameters given for unknown scenario \"{scenario}\"",
                input_err_msg(&file_path)
            );
            parameters.insert(scenario.clone(), resolve_parameters(scenario, fields)?);
        }

        let name = raw.name.unwrap_or_else(|| {
            directory.file_name().map_or_else(
                || "unnamed project".to_string(),
                |name| name.to_string_lossy().into_owned(),
            )
        });
        let scenarios = raw
            .scenarios
            .into_iter()
            .map(|(name, path)| (name, directory.join(path)))
            .collect();
        let demand_file = raw.demand_file.map(|path| directory.join(path));

        Ok(ProjectConfig {
            directory: directory.to_path_buf(),
            name,
            scenarios,
            demand_file,
            parameters,
        })
    }

    /// The directory the project lives in
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// The scenario names, in project file order
    pub fn scenario_names(&self) -> impl Iterator<Item = &str> {
        self.scenarios.keys().map(String::as_str)
    }

    /// The supply curve file for a scenario.
    ///
    /// `scenario` may also be a path to a file on disk, which is returned as given. Relative
    /// paths from the project file are resolved against the project directory.
    pub fn scenario_path(&self, scenario: &str) -> Result<PathBuf> {
        let candidate = Path::new(scenario);
        if candidate.is_file() {
            return Ok(candidate.to_path_buf());
        }

        self.scenarios
            .get(scenario)
            .cloned()
            .ok_or_else(|| ScoutError::ScenarioNotFound(scenario.to_string()).into())
    }

    /// The demand centre file, if the project has one
    pub fn demand_file(&self) -> Option<&Path> {
        self.demand_file.as_deref()
    }

    /// The cost assumptions a scenario's stored costs were computed with
    pub fn original_parameters(&self, scenario: &str) -> Result<EconomicParams> {
        self.parameters
            .get(scenario)
            .copied()
            .ok_or_else(|| ScoutError::MissingParameters(scenario.to_string()).into())
    }
}

/// Resolve a scenario's parameter fields to the four cost assumptions.
fn resolve_parameters(
    scenario: &str,
    fields: &IndexMap<String, toml::Value>,
) -> Result<EconomicParams> {
    Ok(EconomicParams {
        capex: resolve_field("capex", scenario, fields)?,
        opex: resolve_field("opex", scenario, fields)?,
        fcr: resolve_field("fcr", scenario, fields)?,
        losses: resolve_field("losses", scenario, fields)?,
    })
}

/// Find the single parameter field whose normalised name contains `key`.
fn resolve_field(
    key: &str,
    scenario: &str,
    fields: &IndexMap<String, toml::Value>,
) -> Result<f64> {
    let matches: Vec<(&String, &toml::Value)> = fields
        .iter()
        .filter(|(name, _)| normalise(name).contains(key))
        .collect();

    let [(name, value)] = matches[..] else {
        return Err(ScoutError::MissingParameter {
            key: key.to_string(),
            scenario: scenario.to_string(),
            found: matches.len(),
        }
        .into());
    };

    as_number(value).with_context(|| format!("Field \"{name}\" of scenario \"{scenario}\""))
}

/// Lowercase and remove spaces, for parameter field matching
fn normalise(name: &str) -> String {
    name.to_lowercase().replace(' ', "")
}

/// Coerce a TOML value to a number, accepting numeric strings
fn as_number(value: &toml::Value) -> Result<f64> {
    match value {
        toml::Value::Float(value) => Ok(*value),
        toml::Value::Integer(value) => i32::try_from(*value)
            .map(f64::from)
            .with_context(|| format!("Number out of range: {value}")),
        toml::Value::String(text) => {
            let text = text.replace(',', "");
            text.trim()
                .parse()
                .with_context(|| format!("Invalid number: \"{text}\""))
        }
        _ => bail!("Expected a number, found {value}"),
    }
}
