//! Great circle distances and nearest neighbour lookup over site coordinates.
use anyhow::{Result, ensure};

/// Earth radius in km, used to scale great circle distances
pub const EARTH_RADIUS_KM: f64 = 6373.0;

/// Haversine distance between two points in km.
///
/// All four coordinates are in radians.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;

    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// A location stored in the index: its row in the source data, its position on the unit sphere
/// and its coordinates in radians.
#[derive(Debug, Clone, Copy)]
struct Entry {
    row: usize,
    point: [f64; 3],
    lat: f64,
    lon: f64,
}

/// An exact nearest neighbour index over geographic locations.
///
/// Locations are embedded on the unit sphere and organised into a k-d tree over the embedding.
/// Chord distance is monotonic in great circle distance, so the nearest location by chord is also
/// the nearest by haversine and tree pruning stays exact.
#[derive(Debug, Clone)]
pub struct NearestIndex {
    /// Entries arranged in k-d order: the middle element of each subslice splits it on the axis
    /// for its depth
    entries: Vec<Entry>,
}

impl NearestIndex {
    /// Build an index over the given locations.
    ///
    /// # Arguments
    ///
    /// * `lats`: Latitudes in degrees
    /// * `lons`: Longitudes in degrees, one per latitude
    pub fn build(lats: &[f64], lons: &[f64]) -> Result<NearestIndex> {
        ensure!(
            lats.len() == lons.len(),
            "Latitude and longitude slices differ in length"
        );
        ensure!(!lats.is_empty(), "Cannot build an index over zero locations");

        let mut entries: Vec<Entry> = lats
            .iter()
            .zip(lons)
            .enumerate()
            .map(|(row, (&lat, &lon))| {
                let (lat, lon) = (lat.to_radians(), lon.to_radians());
                Entry {
                    row,
                    point: unit_vector(lat, lon),
                    lat,
                    lon,
                }
            })
            .collect();
        build_tree(&mut entries, 0);

        Ok(NearestIndex { entries })
    }

    /// Find the location nearest to the query point.
    ///
    /// # Arguments
    ///
    /// * `lat`: Query latitude in degrees
    /// * `lon`: Query longitude in degrees
    ///
    /// # Returns
    ///
    /// The row of the nearest location and the great circle distance to it in km.
    pub fn nearest(&self, lat: f64, lon: f64) -> (usize, f64) {
        let (lat, lon) = (lat.to_radians(), lon.to_radians());
        let query = unit_vector(lat, lon);

        let mut best = (self.entries[0], chord_sq(&self.entries[0].point, &query));
        search(&self.entries, 0, &query, &mut best);

        let entry = best.0;
        (entry.row, haversine_km(lat, lon, entry.lat, entry.lon))
    }
}

/// The position of a location on the unit sphere. Coordinates in radians.
fn unit_vector(lat: f64, lon: f64) -> [f64; 3] {
    [lat.cos() * lon.cos(), lat.cos() * lon.sin(), lat.sin()]
}

/// Squared chord distance between two points on the unit sphere
fn chord_sq(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    (a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2) + (a[2] - b[2]).powi(2)
}

/// Arrange `entries` into k-d order: the middle element of the slice is the median on the axis
/// for `depth` and the halves recursively split on the following axes.
fn build_tree(entries: &mut [Entry], depth: usize) {
    if entries.len() <= 1 {
        return;
    }

    let axis = depth % 3;
    let mid = entries.len() / 2;
    entries.select_nth_unstable_by(mid, |a, b| a.point[axis].total_cmp(&b.point[axis]));

    let (left, rest) = entries.split_at_mut(mid);
    build_tree(left, depth + 1);
    build_tree(&mut rest[1..], depth + 1);
}

/// Walk the tree looking for the entry with the smallest squared chord distance to `query`.
///
/// `best` holds the current best entry and its squared chord distance. A subtree on the far side
/// of a splitting plane is only visited when the plane is closer than the current best.
fn search(entries: &[Entry], depth: usize, query: &[f64; 3], best: &mut (Entry, f64)) {
    if entries.is_empty() {
        return;
    }

    let axis = depth % 3;
    let mid = entries.len() / 2;
    let node = entries[mid];

    let dist_sq = chord_sq(&node.point, query);
    if dist_sq < best.1 {
        *best = (node, dist_sq);
    }

    let delta = query[axis] - node.point[axis];
    let (near, far) = if delta < 0.0 {
        (&entries[..mid], &entries[mid + 1..])
    } else {
        (&entries[mid + 1..], &entries[..mid])
    };

    search(near, depth + 1, query, best);
    if delta * delta < best.1 {
        search(far, depth + 1, query, best);
    }
}
