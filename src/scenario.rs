//! Reading scenario tables and recalculating their cost columns.
//!
//! A scenario's stored costs were produced with one set of assumptions. When a user overrides
//! some of them, the stored capacity factor and levelised costs are re-derived rather than
//! recomputed from scratch: the production each stored cost implies is recovered with the
//! original assumptions, moved to the new loss assumption, and priced with the new parameters.
use crate::config::ProjectConfig;
use crate::finance::{
    EconomicParams, adjust_cf_for_losses, capacity_factor_from_lcoe, lcoe, lcot,
};
use crate::input::deserialise_optional_number;
use crate::table::{
    CAPACITY_COL, Column, LCOT_COL, MEAN_CF_COL, MEAN_LCOE_COL, TOTAL_LCOE_COL,
    TRANS_CAP_COST_COL, Table,
};
use anyhow::{Result, ensure};
use itertools::{Itertools, izip};
use log::debug;
use serde::Deserialize;
use std::path::Path;

/// Override cost assumptions for one scenario.
///
/// Unset fields fall back to the scenario's original values. Fields may arrive as numbers or as
/// strings from UI form inputs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct RecalcOverrides {
    /// Capital cost in $/kW
    #[serde(default, deserialize_with = "deserialise_optional_number")]
    pub capex: Option<f64>,
    /// Fixed operating cost in $/kW-yr
    #[serde(default, deserialize_with = "deserialise_optional_number")]
    pub opex: Option<f64>,
    /// Fixed charge rate, as a decimal fraction or a percentage
    #[serde(default, deserialize_with = "deserialise_optional_number")]
    pub fcr: Option<f64>,
    /// Generation losses, as a decimal fraction or a percentage
    #[serde(default, deserialize_with = "deserialise_optional_number")]
    pub losses: Option<f64>,
}

impl RecalcOverrides {
    /// Whether every field is unset
    pub fn is_empty(&self) -> bool {
        *self == RecalcOverrides::default()
    }

    /// The assumptions to price with: each override, or the original value where unset
    fn resolve(&self, originals: &EconomicParams) -> EconomicParams {
        EconomicParams {
            capex: self.capex.unwrap_or(originals.capex),
            opex: self.opex.unwrap_or(originals.opex),
            fcr: self.fcr.unwrap_or(originals.fcr),
            losses: self.losses.unwrap_or(originals.losses),
        }
    }
}

/// Reads a project's scenario tables, recalculating costs on request.
pub struct ScenarioReader<'a> {
    config: &'a ProjectConfig,
}

impl<'a> ScenarioReader<'a> {
    /// Create a reader over a project's scenarios
    pub fn new(config: &'a ProjectConfig) -> ScenarioReader<'a> {
        ScenarioReader { config }
    }

    /// Read a scenario's supply curve table as stored.
    ///
    /// # Arguments
    ///
    /// * `scenario`: A scenario name from the project file, or a path to a file on disk
    pub fn read(&self, scenario: &str) -> Result<Table> {
        let file_path = self.config.scenario_path(scenario)?;
        debug!("Reading supply curve table from {}", file_path.display());
        Table::from_csv(&file_path)
    }

    /// Read a scenario's table, recalculating costs when any override is set.
    pub fn build(&self, scenario: &str, overrides: &RecalcOverrides) -> Result<Table> {
        let table = self.read(scenario)?;
        if overrides.is_empty() {
            return Ok(table);
        }

        self.recalc(table, scenario, overrides)
    }

    /// Recalculate a table's cost columns under override assumptions.
    ///
    /// Rewrites `mean_cf`, `mean_lcoe`, `lcot` and `total_lcoe` in place; other columns are
    /// untouched.
    pub fn recalc(
        &self,
        mut table: Table,
        scenario: &str,
        overrides: &RecalcOverrides,
    ) -> Result<Table> {
        debug!("Recalculating costs for scenario \"{scenario}\"");
        let originals = self.config.original_parameters(scenario)?;
        let assumed = overrides.resolve(&originals);

        // Percentage-scale rates become decimal fractions before pricing
        let originals = originals.normalised();
        let assumed = assumed.normalised();
        ensure!(
            originals.losses < 1.0,
            "Original losses for scenario \"{scenario}\" are 100% or more"
        );

        let n = table.n_rows();
        let mut cf_values = Vec::with_capacity(n);
        let mut lcoe_values = Vec::with_capacity(n);
        let mut lcot_values = Vec::with_capacity(n);
        let mut total_values = Vec::with_capacity(n);
        {
            let capacity = table.require_float(CAPACITY_COL)?;
            let mean_cf = table.require_float(MEAN_CF_COL)?;
            let mean_lcoe = table.require_float(MEAN_LCOE_COL)?;
            let trans_cap_cost = table.require_float(TRANS_CAP_COST_COL)?;

            for (&cap, &cf, &stored, &tcc) in izip!(capacity, mean_cf, mean_lcoe, trans_cap_cost) {
                // Recover the production the stored cost implies, then move both capacity
                // factors to the new loss assumption
                let cf_implied = capacity_factor_from_lcoe(cap, stored, &originals);
                let cf_implied = adjust_cf_for_losses(cf_implied, assumed.losses, originals.losses);
                let cf = adjust_cf_for_losses(cf, assumed.losses, originals.losses);

                let new_lcoe = lcoe(cap, cf_implied, &assumed);
                let new_lcot = lcot(cap, tcc, cf, &assumed);
                cf_values.push(cf);
                lcoe_values.push(new_lcoe);
                lcot_values.push(new_lcot);
                total_values.push(new_lcoe + new_lcot);
            }
        }

        table.insert(MEAN_CF_COL, Column::Float(cf_values))?;
        table.insert(MEAN_LCOE_COL, Column::Float(lcoe_values))?;
        table.insert(LCOT_COL, Column::Float(lcot_values))?;
        table.insert(TOTAL_LCOE_COL, Column::Float(total_values))?;

        Ok(table)
    }
}

/// The scenario key implied by a supply curve file name.
///
/// The file stem, without the customary `_sc` ending.
pub fn scenario_key(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map_or_else(String::new, |stem| stem.to_string_lossy().into_owned());

    stem.strip_suffix("_sc").unwrap_or(&stem).to_string()
}

/// A human readable scenario name from a supply curve file name.
///
/// Underscores become spaces and each word is capitalised, so
/// `open_access_sc.csv` becomes "Open Access".
pub fn scenario_display_name(path: &Path) -> String {
    scenario_key(path).split('_').map(capitalise).join(" ")
}

/// Capitalise the first character of a word
fn capitalise(word: &str) -> String {
    let mut chars = word.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().collect::<String>() + chars.as_str()
    })
}
