//! Request descriptors and selection events arriving from the UI layer.
use crate::scenario::RecalcOverrides;
use serde::Deserialize;
use serde_string_enum::{DeserializeLabeledStringEnum, SerializeLabeledStringEnum};

/// The curve number the demand centre layer is drawn at, in selection events
pub const DEMAND_CURVE_NUMBER: u32 = 1;

/// How demand matching participates in a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, SerializeLabeledStringEnum, DeserializeLabeledStringEnum)]
pub enum DemandMode {
    /// No demand matching; selections are plain point filters
    #[string = "off"]
    Off,
    /// Allocate sites to the demand centres picked out by the user's selection
    #[string = "demand"]
    Demand,
    /// Fill every demand centre from its nearest assigned sites
    #[string = "meet_demand"]
    MeetDemand,
}

impl Default for DemandMode {
    fn default() -> DemandMode {
        DemandMode::Off
    }
}

/// A request for a single composed supply curve table.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TableRequest {
    /// The project the scenarios belong to
    #[serde(default)]
    pub project: Option<String>,
    /// The primary scenario, as a name in the project file map or a path on disk
    pub path: String,
    /// A second scenario for difference and mask operations
    #[serde(default)]
    pub path2: Option<String>,
    /// Filter predicate strings of the form `<column> <operator> <value>`
    #[serde(default)]
    pub filters: Vec<String>,
    /// Whether to compute the difference against `path2`
    #[serde(default)]
    pub diff: bool,
    /// Whether to drop sites of the working result that appear in the primary scenario
    #[serde(default)]
    pub mask: bool,
    /// Whether to recalculate costs under the override parameters
    #[serde(default)]
    pub recalc: bool,
    /// Cost assumption overrides for the primary scenario
    #[serde(default)]
    pub overrides: RecalcOverrides,
    /// Cost assumption overrides for the second scenario
    #[serde(default)]
    pub overrides2: RecalcOverrides,
    /// Restrict to these states; `offshore` and `onshore` select by the offshore flag
    #[serde(default)]
    pub states: Vec<String>,
    /// Restrict to these aggregation regions
    #[serde(default)]
    pub regions: Vec<String>,
    /// How demand matching participates in the request
    #[serde(default)]
    pub demand_mode: DemandMode,
}

/// A request for the per-scenario tables backing a chart.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChartRequest {
    /// The underlying table request, applied per scenario
    #[serde(flatten)]
    pub table: TableRequest,
    /// Further scenarios to compose alongside the primary one
    #[serde(default)]
    pub added_scenarios: Vec<String>,
    /// Split a lone scenario into one table per value of this column
    #[serde(default)]
    pub group_col: Option<String>,
}

/// A set of points picked out on a chart or map.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PointSelection {
    /// The selected points
    #[serde(default)]
    pub points: Vec<SelectedPoint>,
}

/// A single selected point.
#[derive(Debug, Clone, Deserialize)]
pub struct SelectedPoint {
    /// The curve (trace) the point belongs to
    #[serde(default, rename = "curveNumber")]
    pub curve_number: u32,
    /// The point's position within its curve
    #[serde(default, rename = "pointIndex")]
    pub point_index: usize,
    /// Latitude of the point in degrees, for map selections
    #[serde(default)]
    pub lat: Option<f64>,
    /// Longitude of the point in degrees, for map selections
    #[serde(default)]
    pub lon: Option<f64>,
    /// Opaque per-point payload; the first element identifies the backing site
    #[serde(default, rename = "customdata")]
    pub custom_data: Vec<serde_json::Value>,
}

impl PointSelection {
    /// Whether the selection contains no points
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// The selected points lying on the demand centre layer
    pub fn demand_points(&self) -> impl Iterator<Item = &SelectedPoint> {
        self.points
            .iter()
            .filter(|point| point.curve_number == DEMAND_CURVE_NUMBER)
    }

    /// The site identifier keys carried by the selected points.
    ///
    /// Points without a payload contribute nothing.
    pub fn gids(&self) -> Vec<String> {
        self.points
            .iter()
            .filter_map(|point| json_key(point.custom_data.first()?))
            .collect()
    }

    /// The centroid of the selected points, in degrees.
    ///
    /// `None` when no point carries coordinates.
    pub fn centroid(&self) -> Option<(f64, f64)> {
        let mut count = 0_u32;
        let mut lat_sum = 0.0;
        let mut lon_sum = 0.0;
        for point in &self.points {
            let (Some(lat), Some(lon)) = (point.lat, point.lon) else {
                continue;
            };
            lat_sum += lat;
            lon_sum += lon;
            count += 1;
        }
        if count == 0 {
            return None;
        }

        let n = f64::from(count);
        Some((lat_sum / n, lon_sum / n))
    }
}

/// The join key a JSON payload value corresponds to, matching the keys of
/// [`crate::table::Column::key`].
fn json_key(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Number(number) => {
            if let Some(int) = number.as_i64() {
                Some(int.to_string())
            } else if let Some(int) = number.as_u64() {
                Some(int.to_string())
            } else {
                // Integral floats display without a fractional part, matching the integer keys
                Some(number.as_f64()?.to_string())
            }
        }
        serde_json::Value::String(text) => {
            let text = text.trim();
            (!text.is_empty()).then(|| text.to_string())
        }
        _ => None,
    }
}
