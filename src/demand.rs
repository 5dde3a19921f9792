//! Demand centres and the matching of supply curve sites to them.
//!
//! Matching happens in two phases. Assignment finds the nearest demand centre for every site.
//! Allocation greedily fills a single centre's annual load from the cheapest delivered-cost sites
//! first, stopping at the site that meets the load. [`meet_demand`] combines the two phases
//! across all centres.
use crate::input::{input_err_msg, read_csv};
use crate::spatial::{NearestIndex, haversine_km};
use crate::table::{Column, LATITUDE_COL, LONGITUDE_COL, Table};
use anyhow::{Context, Result, ensure};
use itertools::izip;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

/// Conversion factor between metric tonnes and kg
pub const KG_PER_TONNE: f64 = 1000.0;

/// Column holding the delivered cost of hydrogen excluding pipeline transport, in $/kg
pub const NO_PIPE_LCOH_COL: &str = "no_pipe_lcoh";

/// Column holding the pipeline cost component at the originally assigned distance, in $/kg
pub const PIPE_LCOH_COMPONENT_COL: &str = "pipe_lcoh_component";

/// Column holding the distance to the originally assigned demand centre, in km
pub const DIST_TO_H2_LOAD_COL: &str = "dist_to_h2_load_km";

/// Column holding annual hydrogen output, in kg
pub const HYDROGEN_ANNUAL_KG_COL: &str = "hydrogen_annual_kg";

/// Column holding the id of the demand centre each site supplies
pub const H2_LOAD_ID_COL: &str = "h2_load_id";

/// Column holding cumulative annual hydrogen output in delivered cost order, in kg
pub const H2_SUPPLY_COL: &str = "h2_supply";

/// Column holding the distance to the selected demand centre, in km
pub const DIST_TO_SELECTED_LOAD_COL: &str = "dist_to_selected_load";

/// Column holding the pipeline cost component rescaled to the selected centre, in $/kg
pub const SELECTED_PIPE_LCOH_COMPONENT_COL: &str = "selected_pipe_lcoh_component";

/// Column holding the delivered cost of hydrogen to the selected centre, in $/kg
pub const SELECTED_LCOH_COL: &str = "selected_lcoh";

/// Column counting how many selected demand centres drew on a site
pub const DEMAND_CONNECT_COUNT_COL: &str = "demand_connect_count";

/// A single hydrogen demand centre.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct DemandCentre {
    /// Unique identifier for the centre
    pub demand_id: u32,
    /// Latitude in degrees
    pub latitude: f64,
    /// Longitude in degrees
    pub longitude: f64,
    /// Annual hydrogen consumption in metric tonnes
    pub h2_tonnes: f64,
}

impl DemandCentre {
    /// Annual hydrogen consumption in kg
    pub fn load_kg(&self) -> f64 {
        self.h2_tonnes * KG_PER_TONNE
    }
}

/// The demand centres for a project.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DemandTable {
    centres: Vec<DemandCentre>,
}

impl DemandTable {
    /// Create a demand table, checking identifiers are unique and loads non-negative
    pub fn new(centres: Vec<DemandCentre>) -> Result<DemandTable> {
        let mut seen = HashSet::new();
        for centre in &centres {
            ensure!(
                seen.insert(centre.demand_id),
                "Duplicate demand centre id {}",
                centre.demand_id
            );
            ensure!(
                centre.h2_tonnes >= 0.0,
                "Demand centre {} has negative annual consumption",
                centre.demand_id
            );
        }

        Ok(DemandTable { centres })
    }

    /// Read the demand centres from a CSV file.
    ///
    /// # Arguments
    ///
    /// * `file_path`: Path to the CSV file
    pub fn from_csv(file_path: &Path) -> Result<DemandTable> {
        let centres: Vec<DemandCentre> = read_csv(file_path)?;
        ensure!(
            !centres.is_empty(),
            "{}: demand file cannot be empty",
            input_err_msg(file_path)
        );

        DemandTable::new(centres).with_context(|| input_err_msg(file_path))
    }

    /// The number of demand centres
    pub fn len(&self) -> usize {
        self.centres.len()
    }

    /// Whether the table has no centres
    pub fn is_empty(&self) -> bool {
        self.centres.is_empty()
    }

    /// Iterate over the centres in table order
    pub fn iter(&self) -> impl Iterator<Item = &DemandCentre> {
        self.centres.iter()
    }

    /// Get the centre at `index`, if in range
    pub fn get(&self, index: usize) -> Option<&DemandCentre> {
        self.centres.get(index)
    }

    /// A new table containing the centres with the given ids, in the given order.
    ///
    /// Unknown ids are skipped.
    pub fn subset_by_ids(&self, ids: &[u32]) -> DemandTable {
        let centres = ids
            .iter()
            .filter_map(|id| {
                self.centres
                    .iter()
                    .find(|centre| centre.demand_id == *id)
                    .cloned()
            })
            .collect();

        DemandTable { centres }
    }
}

/// Find the demand centre closest to a point.
///
/// # Arguments
///
/// * `lat`: Latitude of the point in degrees
/// * `lon`: Longitude of the point in degrees
/// * `demand`: The demand centres to search
///
/// # Returns
///
/// The index of the closest centre in `demand`.
pub fn closest_centre(lat: f64, lon: f64, demand: &DemandTable) -> Result<usize> {
    ensure!(!demand.is_empty(), "No demand centres to search");

    let (lat, lon) = (lat.to_radians(), lon.to_radians());
    let index = demand
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| {
            let dist_a = haversine_km(lat, lon, a.latitude.to_radians(), a.longitude.to_radians());
            let dist_b = haversine_km(lat, lon, b.latitude.to_radians(), b.longitude.to_radians());
            dist_a.total_cmp(&dist_b)
        })
        .expect("demand table is non-empty")
        .0;

    Ok(index)
}

/// Assign every supply curve site to its nearest demand centre.
///
/// # Arguments
///
/// * `table`: The supply curve table, with latitude and longitude columns
/// * `demand`: The demand centres
///
/// # Returns
///
/// The id of the nearest centre, one per row of `table`.
pub fn nearest_assignment(table: &Table, demand: &DemandTable) -> Result<Vec<u32>> {
    let lats = table.require_float(LATITUDE_COL)?;
    let lons = table.require_float(LONGITUDE_COL)?;

    let centre_lats: Vec<f64> = demand.iter().map(|centre| centre.latitude).collect();
    let centre_lons: Vec<f64> = demand.iter().map(|centre| centre.longitude).collect();
    let index = NearestIndex::build(&centre_lats, &centre_lons)
        .context("Cannot assign sites to demand centres")?;

    Ok(lats
        .iter()
        .zip(lons)
        .map(|(&lat, &lon)| {
            let (centre, _) = index.nearest(lat, lon);
            demand.get(centre).expect("index row in range").demand_id
        })
        .collect())
}

/// The outcome of allocating supply curve sites to a single demand centre.
///
/// All vectors run in delivered cost order and have one element per chosen site.
#[derive(Debug, Clone, PartialEq)]
pub struct Allocation {
    /// Rows of the source table chosen for the centre, cheapest first
    pub rows: Vec<usize>,
    /// Distance from each chosen site to the centre, in km
    pub distance_km: Vec<f64>,
    /// Pipeline cost component rescaled to the distance to the centre, in $/kg
    pub pipe_component: Vec<f64>,
    /// Delivered cost of hydrogen to the centre, in $/kg
    pub delivered_cost: Vec<f64>,
    /// Cumulative annual output of the chosen sites, in kg
    pub cumulative_kg: Vec<f64>,
}

impl Allocation {
    /// Write the allocation onto the table it was computed from.
    ///
    /// # Returns
    ///
    /// The chosen rows of `table` in delivered cost order, with the distance, rescaled pipeline
    /// component, delivered cost and cumulative supply as additional columns.
    pub fn apply(&self, table: &Table) -> Result<Table> {
        let mut out = table.subset(&self.rows);
        out.insert(
            DIST_TO_SELECTED_LOAD_COL,
            Column::Float(self.distance_km.clone()),
        )?;
        out.insert(
            SELECTED_PIPE_LCOH_COMPONENT_COL,
            Column::Float(self.pipe_component.clone()),
        )?;
        out.insert(SELECTED_LCOH_COL, Column::Float(self.delivered_cost.clone()))?;
        out.insert(H2_SUPPLY_COL, Column::Float(self.cumulative_kg.clone()))?;

        Ok(out)
    }
}

/// Greedily fill a demand centre's annual load from the cheapest sites first.
///
/// Each site's pipeline cost component is rescaled from its originally assigned distance to its
/// distance from `centre`, giving the delivered cost of hydrogen to the centre. Sites are taken
/// in ascending delivered cost order until their cumulative annual output meets the centre's
/// load. The site that crosses the load is included; if the load is never met, every site is.
///
/// # Arguments
///
/// * `table`: The candidate supply curve sites
/// * `centre`: The demand centre to fill
pub fn allocate(table: &Table, centre: &DemandCentre) -> Result<Allocation> {
    let lats = table.require_float(LATITUDE_COL)?;
    let lons = table.require_float(LONGITUDE_COL)?;
    let no_pipe = table.require_float(NO_PIPE_LCOH_COL)?;
    let pipe = table.require_float(PIPE_LCOH_COMPONENT_COL)?;
    let assigned_dist = table.require_float(DIST_TO_H2_LOAD_COL)?;
    let output = table.require_float(HYDROGEN_ANNUAL_KG_COL)?;

    let centre_lat = centre.latitude.to_radians();
    let centre_lon = centre.longitude.to_radians();

    let distance_km: Vec<f64> = izip!(lats, lons)
        .map(|(&lat, &lon)| haversine_km(lat.to_radians(), lon.to_radians(), centre_lat, centre_lon))
        .collect();
    // Per-km pipeline cost scaled to the new distance
    let pipe_component: Vec<f64> = izip!(pipe, assigned_dist, &distance_km)
        .map(|(&component, &original, &new)| component / original * new)
        .collect();
    let delivered_cost: Vec<f64> = izip!(no_pipe, &pipe_component)
        .map(|(&base, &component)| base + component)
        .collect();

    let mut order: Vec<usize> = (0..table.n_rows()).collect();
    order.sort_by(|&a, &b| delivered_cost[a].total_cmp(&delivered_cost[b]));

    let load = centre.load_kg();
    let mut rows = Vec::new();
    let mut cumulative_kg = Vec::new();
    let mut total = 0.0;
    for &row in &order {
        total += output[row];
        rows.push(row);
        cumulative_kg.push(total);
        if total >= load {
            break;
        }
    }

    Ok(Allocation {
        distance_km: rows.iter().map(|&row| distance_km[row]).collect(),
        pipe_component: rows.iter().map(|&row| pipe_component[row]).collect(),
        delivered_cost: rows.iter().map(|&row| delivered_cost[row]).collect(),
        rows,
        cumulative_kg,
    })
}

/// Fill every demand centre's load from its assigned sites.
///
/// Sites are first assigned to their nearest centre, then each centre is filled independently
/// from its assigned sites in delivered cost order. Centres with no assigned sites are dropped.
/// A table with no sites gives a zero row result that still carries the allocation columns.
///
/// # Returns
///
/// The chosen sites across all centres, annotated with the centre they supply and the cumulative
/// supply in cost order, plus the demand table restricted to the centres that were filled.
pub fn meet_demand(table: &Table, demand: &DemandTable) -> Result<(Table, DemandTable)> {
    let assignment = nearest_assignment(table, demand)?;

    let mut parts = Vec::new();
    let mut kept = Vec::new();
    for centre in demand.iter() {
        let rows: Vec<usize> = assignment
            .iter()
            .enumerate()
            .filter(|&(_, &id)| id == centre.demand_id)
            .map(|(row, _)| row)
            .collect();
        if rows.is_empty() {
            continue;
        }

        let subset = table.subset(&rows);
        let allocation = allocate(&subset, centre)?;
        let mut part = allocation.apply(&subset)?;
        part.insert(
            H2_LOAD_ID_COL,
            Column::Float(vec![centre.demand_id as f64; part.n_rows()]),
        )?;

        parts.push(part);
        kept.push(centre.clone());
    }
    if parts.is_empty() {
        return Ok((empty_allocation_table(table)?, DemandTable::new(kept)?));
    }

    Ok((Table::concat(&parts), DemandTable::new(kept)?))
}

/// A zero row result that still carries every column an allocation would add
fn empty_allocation_table(table: &Table) -> Result<Table> {
    let mut empty = table.subset(&[]);
    for name in [
        DIST_TO_SELECTED_LOAD_COL,
        SELECTED_PIPE_LCOH_COMPONENT_COL,
        SELECTED_LCOH_COL,
        H2_SUPPLY_COL,
        H2_LOAD_ID_COL,
    ] {
        empty.insert(name, Column::Float(Vec::new()))?;
    }

    Ok(empty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::assert_error;
    use float_cmp::assert_approx_eq;
    use std::fs::File;
    use std::io::Write;
    use std::path::Path;
    use tempfile::tempdir;

    const DEMAND_FILE_NAME: &str = "demand.csv";

    /// Create an example demand file in dir_path
    fn create_demand_file(dir_path: &Path) {
        let file_path = dir_path.join(DEMAND_FILE_NAME);
        let mut file = File::create(file_path).unwrap();
        writeln!(
            file,
            "demand_id,latitude,longitude,h2_tonnes
1,35.0,-101.0,100
2,41.0,-95.0,250"
        )
        .unwrap();
    }

    fn centre(demand_id: u32, latitude: f64, longitude: f64, h2_tonnes: f64) -> DemandCentre {
        DemandCentre {
            demand_id,
            latitude,
            longitude,
            h2_tonnes,
        }
    }

    /// Three candidate sites co-located with the centre they are tested against, so the
    /// delivered cost equals the no-pipe cost
    fn candidate_sites(centre: &DemandCentre) -> Table {
        let n = 3;
        let mut table = Table::new();
        table
            .insert(
                LATITUDE_COL,
                Column::Float(vec![centre.latitude; n]),
            )
            .unwrap();
        table
            .insert(
                LONGITUDE_COL,
                Column::Float(vec![centre.longitude; n]),
            )
            .unwrap();
        table
            .insert(NO_PIPE_LCOH_COL, Column::Float(vec![1.0, 2.0, 3.0]))
            .unwrap();
        table
            .insert(
                PIPE_LCOH_COMPONENT_COL,
                Column::Float(vec![0.5, 0.5, 0.5]),
            )
            .unwrap();
        table
            .insert(DIST_TO_H2_LOAD_COL, Column::Float(vec![50.0, 50.0, 50.0]))
            .unwrap();
        table
            .insert(
                HYDROGEN_ANNUAL_KG_COL,
                Column::Float(vec![40.0, 50.0, 30.0]),
            )
            .unwrap();

        table
    }

    #[test]
    fn test_from_csv() {
        let dir = tempdir().unwrap();
        create_demand_file(dir.path());
        let demand = DemandTable::from_csv(&dir.path().join(DEMAND_FILE_NAME)).unwrap();
        assert_eq!(demand.len(), 2);
        assert_eq!(demand.get(0).unwrap().demand_id, 1);
        assert_approx_eq!(f64, demand.get(1).unwrap().load_kg(), 250_000.0);
    }

    #[test]
    fn test_from_csv_empty_file() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join(DEMAND_FILE_NAME);
        {
            let mut file = File::create(&file_path).unwrap();
            writeln!(file, "demand_id,latitude,longitude,h2_tonnes").unwrap();
        }
        assert!(DemandTable::from_csv(&file_path).is_err());
    }

    #[test]
    fn test_new_validates_centres() {
        let result = DemandTable::new(vec![
            centre(1, 35.0, -101.0, 100.0),
            centre(1, 41.0, -95.0, 250.0),
        ]);
        assert_error!(result, "Duplicate demand centre id 1");

        let result = DemandTable::new(vec![centre(1, 35.0, -101.0, -5.0)]);
        assert_error!(result, "Demand centre 1 has negative annual consumption");
    }

    #[test]
    fn test_subset_by_ids_keeps_requested_order() {
        let demand = DemandTable::new(vec![
            centre(1, 35.0, -101.0, 100.0),
            centre(2, 41.0, -95.0, 250.0),
        ])
        .unwrap();

        let subset = demand.subset_by_ids(&[2, 7, 1]);
        assert_eq!(subset.len(), 2);
        assert_eq!(subset.get(0).unwrap().demand_id, 2);
        assert_eq!(subset.get(1).unwrap().demand_id, 1);
    }

    #[test]
    fn test_closest_centre() {
        let demand = DemandTable::new(vec![
            centre(1, 35.0, -101.0, 100.0),
            centre(2, 41.0, -95.0, 250.0),
        ])
        .unwrap();

        assert_eq!(closest_centre(34.0, -102.0, &demand).unwrap(), 0);
        assert_eq!(closest_centre(42.0, -94.0, &demand).unwrap(), 1);
        assert!(closest_centre(0.0, 0.0, &DemandTable::default()).is_err());
    }

    #[test]
    fn test_nearest_assignment() {
        let demand = DemandTable::new(vec![
            centre(1, 35.0, -101.0, 100.0),
            centre(2, 41.0, -95.0, 250.0),
        ])
        .unwrap();

        let mut table = Table::new();
        table
            .insert(LATITUDE_COL, Column::Float(vec![35.5, 40.5, 34.0]))
            .unwrap();
        table
            .insert(LONGITUDE_COL, Column::Float(vec![-100.0, -96.0, -101.5]))
            .unwrap();

        let assignment = nearest_assignment(&table, &demand).unwrap();
        assert_eq!(assignment, vec![1, 2, 1]);
    }

    #[test]
    fn test_allocate_includes_the_crossing_site() {
        let centre = centre(1, 35.0, -101.0, 0.1); // 100 kg load
        let table = candidate_sites(&centre);

        // Outputs in cost order are [40, 50, 30]; the second site crosses the 100 kg load
        let allocation = allocate(&table, &centre).unwrap();
        assert_eq!(allocation.rows, vec![0, 1, 2]);
        assert_eq!(allocation.cumulative_kg, vec![40.0, 90.0, 120.0]);

        let lighter = DemandCentre {
            h2_tonnes: 0.08,
            ..centre
        };
        let allocation = allocate(&table, &lighter).unwrap();
        assert_eq!(allocation.rows, vec![0, 1]);
        assert_eq!(allocation.cumulative_kg, vec![40.0, 90.0]);
    }

    #[test]
    fn test_allocate_takes_everything_when_load_is_never_met() {
        let centre = centre(1, 35.0, -101.0, 1000.0);
        let table = candidate_sites(&centre);

        let allocation = allocate(&table, &centre).unwrap();
        assert_eq!(allocation.rows, vec![0, 1, 2]);
    }

    #[test]
    fn test_allocate_rescales_the_pipeline_component() {
        // A site 100 km north of its original centre, now serving a centre at its own location
        let centre = centre(1, 35.0, -101.0, 1000.0);
        let mut table = Table::new();
        table
            .insert(LATITUDE_COL, Column::Float(vec![35.0]))
            .unwrap();
        table
            .insert(LONGITUDE_COL, Column::Float(vec![-101.0]))
            .unwrap();
        table
            .insert(NO_PIPE_LCOH_COL, Column::Float(vec![2.0]))
            .unwrap();
        table
            .insert(PIPE_LCOH_COMPONENT_COL, Column::Float(vec![1.0]))
            .unwrap();
        table
            .insert(DIST_TO_H2_LOAD_COL, Column::Float(vec![100.0]))
            .unwrap();
        table
            .insert(HYDROGEN_ANNUAL_KG_COL, Column::Float(vec![10.0]))
            .unwrap();

        let allocation = allocate(&table, &centre).unwrap();
        // Zero distance means no pipeline cost at all
        assert_approx_eq!(f64, allocation.distance_km[0], 0.0, epsilon = 1e-9);
        assert_approx_eq!(f64, allocation.pipe_component[0], 0.0, epsilon = 1e-9);
        assert_approx_eq!(f64, allocation.delivered_cost[0], 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_allocation_apply_adds_columns() {
        let centre = centre(1, 35.0, -101.0, 0.1);
        let table = candidate_sites(&centre);

        let result = allocate(&table, &centre).unwrap().apply(&table).unwrap();
        assert_eq!(result.n_rows(), 3);
        assert_eq!(
            result.float(H2_SUPPLY_COL).unwrap(),
            [40.0, 90.0, 120.0]
        );
        assert_eq!(
            result.float(SELECTED_LCOH_COL).unwrap(),
            [1.0, 2.0, 3.0]
        );
    }

    #[test]
    fn test_meet_demand_drops_unsupplied_centres() {
        // All sites sit next to centre 1; centre 2 attracts nothing and is dropped
        let near = centre(1, 35.0, -101.0, 0.08);
        let far = centre(2, 48.0, -70.0, 100.0);
        let table = candidate_sites(&near);
        let demand = DemandTable::new(vec![near, far]).unwrap();

        let (supply, kept) = meet_demand(&table, &demand).unwrap();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept.get(0).unwrap().demand_id, 1);

        // The 80 kg load is crossed by the second cheapest site
        assert_eq!(supply.n_rows(), 2);
        assert_eq!(supply.float(H2_LOAD_ID_COL).unwrap(), [1.0, 1.0]);
        assert_eq!(supply.float(H2_SUPPLY_COL).unwrap(), [40.0, 90.0]);
    }

    #[test]
    fn test_meet_demand_with_no_sites_keeps_every_column() {
        let near = centre(1, 35.0, -101.0, 0.08);
        let table = candidate_sites(&near).subset(&[]);
        let demand = DemandTable::new(vec![near]).unwrap();

        let (supply, kept) = meet_demand(&table, &demand).unwrap();
        assert_eq!(supply.n_rows(), 0);
        assert!(supply.has_column(NO_PIPE_LCOH_COL));
        assert!(supply.has_column(SELECTED_LCOH_COL));
        assert!(supply.has_column(H2_SUPPLY_COL));
        assert!(supply.has_column(H2_LOAD_ID_COL));
        assert_eq!(kept.len(), 0);
    }
}
