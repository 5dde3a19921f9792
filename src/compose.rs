//! Composing request-shaped supply curve tables.
//!
//! The composer ties the other modules together. A [`TableRequest`] describes one table as the
//! user wants to see it: a scenario, optional filters, an optional second scenario to difference
//! or mask against, cost overrides and geographic subsets. [`compose_map_table`] realises the
//! request; [`apply_selections`] then narrows the result to the user's on-screen selection, via
//! demand matching when a demand mode is active. Computed differences are cached on disk under
//! the project directory so repeat requests for the same pair are cheap.
use crate::config::ProjectConfig;
use crate::demand::{self, DEMAND_CONNECT_COUNT_COL, DemandTable};
use crate::diff::Difference;
use crate::filter::{apply_column_filters, apply_point_selection};
use crate::request::{ChartRequest, DEMAND_CURVE_NUMBER, DemandMode, PointSelection, TableRequest};
use crate::scenario::{RecalcOverrides, ScenarioReader, scenario_display_name, scenario_key};
use crate::table::{CAPACITY_COL, Column, GID_COL, OFFSHORE_COL, REGION_COL, STATE_COL, Table};
use anyhow::{Context, Result};
use indexmap::IndexMap;
use log::{debug, info};
use rayon::prelude::*;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Directory under the project holding cached difference tables
pub const CACHE_DIR_NAME: &str = ".scout";

/// Name of the scenario tag column added by [`calc_least_cost`]
pub const SCENARIO_COL: &str = "scenario";

/// Name of the row ordinal column every composed table carries
pub const INDEX_COL: &str = "index";

/// Capacity column carried by hybrid supply curves
pub const HYBRID_CAPACITY_COL: &str = "hybrid_capacity";

/// Capacity column used for display, defaulted from [`CAPACITY_COL`]
pub const PRINT_CAPACITY_COL: &str = "print_capacity";

/// Workers reading scenario files in [`calc_least_cost`]
const LEAST_COST_WORKERS: usize = 10;

/// Pseudo-state selecting rows with the offshore flag set
const OFFSHORE_STATE: &str = "offshore";

/// Pseudo-state selecting rows with the offshore flag clear
const ONSHORE_STATE: &str = "onshore";

/// Load one scenario's supply curve table and give it the columns every composed table carries.
///
/// # Arguments
///
/// * `config`: The project the scenario belongs to
/// * `scenario`: A scenario name from the project file or a path on disk
/// * `overrides`: Cost assumption overrides, applied when `recalc` is set
/// * `recalc`: Whether to recalculate cost columns under `overrides`
pub fn load_table(
    config: &ProjectConfig,
    scenario: &str,
    overrides: &RecalcOverrides,
    recalc: bool,
) -> Result<Table> {
    let reader = ScenarioReader::new(config);
    let mut table = if recalc {
        reader.build(scenario, overrides)?
    } else {
        reader.read(scenario)?
    };
    add_consistency_columns(&mut table)?;

    Ok(table)
}

/// Columns every composed table carries regardless of its source file
fn add_consistency_columns(table: &mut Table) -> Result<()> {
    let ordinals: Vec<f64> = (0_u32..).map(f64::from).take(table.n_rows()).collect();
    table.insert(INDEX_COL, Column::Float(ordinals))?;

    default_column(table, CAPACITY_COL, HYBRID_CAPACITY_COL)?;
    default_column(table, PRINT_CAPACITY_COL, CAPACITY_COL)?;

    Ok(())
}

/// Copy `source` to `target` when `target` is absent and `source` is present
fn default_column(table: &mut Table, target: &str, source: &str) -> Result<()> {
    if table.has_column(target) {
        return Ok(());
    }
    let Some(column) = table.column(source).cloned() else {
        return Ok(());
    };

    table.insert(target, column)
}

/// Compose the table a [`TableRequest`] asks for.
///
/// The primary scenario is loaded and filtered. If a second scenario is set, it is loaded and
/// filtered the same way and becomes the working result, either directly, or as the difference
/// of the pair when `diff` is requested. With `mask` requested, rows of the working result whose
/// site also appears in the primary are dropped. State and region subsets apply last.
pub fn compose_map_table(config: &ProjectConfig, request: &TableRequest) -> Result<Table> {
    let primary = load_table(config, &request.path, &request.overrides, request.recalc)?;
    let primary = apply_column_filters(&primary, &request.filters)?;

    let mut result = primary;
    if let Some(path2) = &request.path2 {
        let second = load_table(config, path2, &request.overrides2, request.recalc)?;
        let second = apply_column_filters(&second, &request.filters)?;

        let working = if request.diff {
            read_or_compute_diff(config, request, path2, &result, &second)?
        } else {
            second
        };
        result = if request.mask {
            calc_mask(&result, &working)?
        } else {
            working
        };
    }

    let result = subset_states(result, &request.states);

    Ok(subset_regions(result, &request.regions))
}

/// The difference of two filtered scenario tables, via the on-disk cache where possible.
///
/// The cache only ever holds unfiltered differences. With any filter active the difference is
/// recomputed from the filtered tables and not persisted.
fn read_or_compute_diff(
    config: &ProjectConfig,
    request: &TableRequest,
    path2: &str,
    table_a: &Table,
    table_b: &Table,
) -> Result<Table> {
    let unfiltered = request.filters.iter().all(|filter| filter.trim().is_empty());
    let cache_path = diff_cache_path(config, &request.path, path2);
    if unfiltered && cache_path.exists() {
        debug!("Reading cached difference from {}", cache_path.display());
        return Table::from_csv(&cache_path);
    }

    let result = Difference::new(GID_COL).calc(table_a, table_b)?;
    if unfiltered {
        persist_diff(&cache_path, &result)
            .with_context(|| format!("Cannot cache difference at {}", cache_path.display()))?;
    }

    Ok(result)
}

/// The cache file for the difference between two scenarios
fn diff_cache_path(config: &ProjectConfig, path_a: &str, path_b: &str) -> PathBuf {
    let name_a = scenario_key(Path::new(path_a));
    let name_b = scenario_key(Path::new(path_b));

    config
        .directory()
        .join(CACHE_DIR_NAME)
        .join(format!("diff_{name_a}_vs_{name_b}_sc.csv"))
}

/// Write a table to `file_path` through a named temporary file in the same directory, so that
/// concurrent readers never observe a partial file.
fn persist_diff(file_path: &Path, table: &Table) -> Result<()> {
    let dir = file_path
        .parent()
        .context("Cache path has no parent directory")?;
    fs::create_dir_all(dir)?;

    let temp = NamedTempFile::new_in(dir)?;
    table.write_csv(&temp)?;
    temp.persist(file_path)?;

    Ok(())
}

/// Drop rows of `target` whose site identifier appears in `base`.
///
/// Rows of `target` without an identifier are kept.
pub fn calc_mask(base: &Table, target: &Table) -> Result<Table> {
    let base_keys: HashSet<String> = base.keys(GID_COL)?.into_iter().flatten().collect();
    let target_keys = target.keys(GID_COL)?;
    let rows: Vec<usize> = target_keys
        .iter()
        .enumerate()
        .filter(|(_, key)| !key.as_ref().is_some_and(|key| base_keys.contains(key)))
        .map(|(row, _)| row)
        .collect();

    Ok(target.subset(&rows))
}

/// Restrict a table to the requested states.
///
/// The state restriction only applies when at least one requested state occurs in the state
/// column, so a request carried over from another scenario cannot empty the table. The
/// pseudo-states `offshore` and `onshore` select through the offshore flag instead and are
/// skipped when the flag column is absent.
fn subset_states(table: Table, states: &[String]) -> Table {
    if states.is_empty() {
        return table;
    }

    let mut result = table;
    let rows = result
        .text(STATE_COL)
        .and_then(|values| matching_rows(values, states));
    if let Some(rows) = rows {
        result = result.subset(&rows);
    }

    if states.iter().any(|state| state == OFFSHORE_STATE) {
        result = subset_by_flag(result, OFFSHORE_COL, 1.0);
    }
    if states.iter().any(|state| state == ONSHORE_STATE) {
        result = subset_by_flag(result, OFFSHORE_COL, 0.0);
    }

    result
}

/// Restrict a table to the requested regions, under the same occurrence rule as states
fn subset_regions(table: Table, regions: &[String]) -> Table {
    if regions.is_empty() {
        return table;
    }

    let mut result = table;
    let rows = result
        .text(REGION_COL)
        .and_then(|values| matching_rows(values, regions));
    if let Some(rows) = rows {
        result = result.subset(&rows);
    }

    result
}

/// Rows whose cell is one of `requested`, or `None` when no cell is
fn matching_rows(values: &[String], requested: &[String]) -> Option<Vec<usize>> {
    let requested: HashSet<&str> = requested.iter().map(String::as_str).collect();

    values
        .iter()
        .any(|value| requested.contains(value.as_str()))
        .then(|| {
            values
                .iter()
                .enumerate()
                .filter(|(_, value)| requested.contains(value.as_str()))
                .map(|(row, _)| row)
                .collect()
        })
}

/// Keep rows whose `column` equals `value`, leaving the table unchanged when the column is absent
fn subset_by_flag(table: Table, column: &str, value: f64) -> Table {
    let rows: Option<Vec<usize>> = table.float(column).map(|values| {
        values
            .iter()
            .enumerate()
            .filter(|&(_, &cell)| cell.partial_cmp(&value) == Some(Ordering::Equal))
            .map(|(row, _)| row)
            .collect()
    });

    match rows {
        Some(rows) => table.subset(&rows),
        None => table,
    }
}

/// Narrow a composed table to the user's on-screen selections.
///
/// With demand matching off, a map brush is a plain point filter. In mode `demand` the map and
/// click selections drive allocation to one or more demand centres; in mode `meet_demand` every
/// centre is filled from its nearest-assigned sites and the selections on the map are ignored.
/// A chart selection applies as a point filter last in every mode.
///
/// # Returns
///
/// The narrowed table, and the demand centres still in play when a demand mode is active.
pub fn apply_selections(
    config: &ProjectConfig,
    table: &Table,
    demand_mode: DemandMode,
    chart_selection: Option<&PointSelection>,
    map_selection: Option<&PointSelection>,
    click_selection: Option<&PointSelection>,
) -> Result<(Table, Option<DemandTable>)> {
    let (result, demand) = match demand_mode {
        DemandMode::Off => (apply_point_selection(table, map_selection)?, None),
        DemandMode::Demand => {
            let demand = load_demand(config)?;
            let (result, demand) =
                apply_demand_selection(table, demand, map_selection, click_selection)?;
            (result, Some(demand))
        }
        DemandMode::MeetDemand => {
            let demand = load_demand(config)?;
            let (result, demand) = demand::meet_demand(table, &demand)?;
            (result, Some(demand))
        }
    };

    let result = apply_point_selection(&result, chart_selection)?;

    Ok((result, demand))
}

/// The demand centres of the project
fn load_demand(config: &ProjectConfig) -> Result<DemandTable> {
    let file_path = config
        .demand_file()
        .context("Project has no demand centre file")?;

    DemandTable::from_csv(file_path)
}

/// Narrow a table to the demand centres the user picked out on the map.
///
/// A click takes precedence over a brush, even when it landed off the demand layer. A brush
/// containing demand centres allocates to each of them; a brush containing none allocates to the
/// single centre closest to the brush centroid.
fn apply_demand_selection(
    table: &Table,
    demand: DemandTable,
    map_selection: Option<&PointSelection>,
    click_selection: Option<&PointSelection>,
) -> Result<(Table, DemandTable)> {
    let click_point = click_selection
        .filter(|selection| !selection.is_empty())
        .and_then(|selection| selection.points.first());
    if let Some(point) = click_point {
        if point.curve_number == DEMAND_CURVE_NUMBER {
            return allocate_to_centre(table, &demand, point.point_index);
        }
        return Ok((table.clone(), demand));
    }

    let Some(map) = map_selection.filter(|selection| !selection.is_empty()) else {
        return Ok((table.clone(), demand));
    };

    let centres: Vec<usize> = map.demand_points().map(|point| point.point_index).collect();
    if !centres.is_empty() {
        return allocate_to_selected_centres(table, &demand, &centres);
    }

    let Some((lat, lon)) = map.centroid() else {
        return Ok((table.clone(), demand));
    };
    let centre = demand::closest_centre(lat, lon, &demand)?;

    allocate_to_centre(table, &demand, centre)
}

/// Allocate the whole table to the demand centre at `index`
fn allocate_to_centre(
    table: &Table,
    demand: &DemandTable,
    index: usize,
) -> Result<(Table, DemandTable)> {
    let centre = demand
        .get(index)
        .with_context(|| format!("No demand centre at index {index}"))?;
    let allocation = demand::allocate(table, centre)?;
    let result = allocation.apply(table)?;

    Ok((result, demand.subset_by_ids(&[centre.demand_id])))
}

/// Allocate the whole table to each selected centre independently.
///
/// The result keeps every site at least one centre chose, in table order, tagged with how many
/// centres chose it.
fn allocate_to_selected_centres(
    table: &Table,
    demand: &DemandTable,
    centres: &[usize],
) -> Result<(Table, DemandTable)> {
    let mut counts = vec![0.0; table.n_rows()];
    let mut ids = Vec::with_capacity(centres.len());
    for &index in centres {
        let centre = demand
            .get(index)
            .with_context(|| format!("No demand centre at index {index}"))?;
        let allocation = demand::allocate(table, centre)?;
        for row in allocation.rows {
            counts[row] += 1.0;
        }
        ids.push(centre.demand_id);
    }

    let rows: Vec<usize> = (0..counts.len()).filter(|&row| counts[row] > 0.0).collect();
    let kept: Vec<f64> = rows.iter().map(|&row| counts[row]).collect();
    let mut result = table.subset(&rows);
    result.insert(DEMAND_CONNECT_COUNT_COL, Column::Float(kept))?;

    Ok((result, demand.subset_by_ids(&ids)))
}

/// Compose the per-scenario tables behind a chart, keyed by scenario display name.
///
/// When a grouping column is requested and only the primary scenario is in play, its table is
/// split into one table per distinct group value instead, keyed by those values.
pub fn compose_chart_tables(
    config: &ProjectConfig,
    request: &ChartRequest,
) -> Result<IndexMap<String, Table>> {
    match &request.group_col {
        Some(group_col) if request.added_scenarios.is_empty() => {
            let table = compose_map_table(config, &request.table)?;
            let mut tables = IndexMap::new();
            for (value, rows) in table.group_rows(group_col)? {
                tables.insert(value, table.subset(&rows));
            }

            Ok(tables)
        }
        _ => {
            let mut scenarios = vec![request.table.path.clone()];
            scenarios.extend(request.added_scenarios.iter().cloned());

            let mut tables = IndexMap::new();
            for scenario in scenarios {
                let table_request = TableRequest {
                    path: scenario.clone(),
                    ..request.table.clone()
                };
                tables.insert(
                    scenario_display_name(Path::new(&scenario)),
                    compose_map_table(config, &table_request)?,
                );
            }

            Ok(tables)
        }
    }
}

/// The cheapest row per group across a set of tables.
///
/// Tables are concatenated and grouped by `group_col` in order of first occurrence; each group
/// keeps its row with the minimum `by`, ties going to the earlier row. Rows with a missing cost
/// never win; a group with no finite cost keeps its first row.
pub fn least_cost(tables: &[Table], by: &str, group_col: &str) -> Result<Table> {
    let combined = Table::concat(tables);
    let costs = combined.require_float(by)?;
    let groups = combined.group_rows(group_col)?;

    let mut rows = Vec::with_capacity(groups.len());
    for group in groups.values() {
        let best = group
            .iter()
            .copied()
            .filter(|&row| !costs[row].is_nan())
            .min_by(|&a, &b| costs[a].total_cmp(&costs[b]))
            .or_else(|| group.first().copied());
        rows.extend(best);
    }

    Ok(combined.subset(&rows))
}

/// Build a least-cost composite of several scenario files and write it to `out_file`.
///
/// Files are read in parallel and tagged with a scenario column derived from their file names.
/// Paths are sorted first so tie-breaks between scenarios do not depend on argument order. An
/// existing output file is left alone unless `overwrite` is set.
///
/// # Arguments
///
/// * `paths`: The scenario files to combine
/// * `out_file`: Where to write the composite table
/// * `by`: The cost column to minimise
/// * `overwrite`: Whether to replace an existing output file
pub fn calc_least_cost(
    paths: &[PathBuf],
    out_file: &Path,
    by: &str,
    overwrite: bool,
) -> Result<()> {
    if out_file.exists() && !overwrite {
        info!("{} already exists; skipping", out_file.display());
        return Ok(());
    }

    let mut paths = paths.to_vec();
    paths.sort();

    debug!("Calculating least cost table across {} scenarios...", paths.len());
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(LEAST_COST_WORKERS)
        .build()
        .context("Cannot create worker pool")?;
    let tables = pool.install(|| {
        paths
            .par_iter()
            .map(|file_path| read_tagged_scenario(file_path))
            .collect::<Result<Vec<_>>>()
    })?;

    let result = least_cost(&tables, by, GID_COL)?;
    result.to_csv(out_file)?;
    info!("Least cost table written to {}", out_file.display());

    Ok(())
}

/// Read one scenario file and tag its rows with the scenario name
fn read_tagged_scenario(file_path: &Path) -> Result<Table> {
    let mut table = Table::from_csv(file_path)?;
    let names = vec![scenario_key(file_path); table.n_rows()];
    table.insert(SCENARIO_COL, Column::Text(names))?;

    Ok(table)
}
