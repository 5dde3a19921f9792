//! The column oriented table type used for supply curve data.
//!
//! Supply curve files are wide and their column sets vary between datasets, so tables are stored
//! as named columns rather than typed rows. A column is either floating point (missing cells are
//! NaN) or text. Operations that need a specific column look it up by name and fail with
//! [`ScoutError::MissingColumn`] if it is absent or has the wrong type.
use crate::error::ScoutError;
use crate::input::input_err_msg;
use anyhow::{Context, Result, ensure};
use indexmap::IndexMap;
use std::fs::File;
use std::io;
use std::path::Path;

/// Column holding the unique identifier of a supply curve point
pub const GID_COL: &str = "sc_point_gid";

/// Column holding latitude in degrees
pub const LATITUDE_COL: &str = "latitude";

/// Column holding longitude in degrees
pub const LONGITUDE_COL: &str = "longitude";

/// Column holding developable capacity in MW
pub const CAPACITY_COL: &str = "capacity";

/// Column holding the site capacity factor
pub const MEAN_CF_COL: &str = "mean_cf";

/// Column holding the site levelised cost of energy in $/MWh
pub const MEAN_LCOE_COL: &str = "mean_lcoe";

/// Column holding the transmission capital cost in $/MW
pub const TRANS_CAP_COST_COL: &str = "trans_cap_cost";

/// Column holding the levelised cost of transmission in $/MWh
pub const LCOT_COL: &str = "lcot";

/// Column holding the combined levelised cost in $/MWh
pub const TOTAL_LCOE_COL: &str = "total_lcoe";

/// Column holding the state a site falls in
pub const STATE_COL: &str = "state";

/// Column holding the aggregation region a site falls in
pub const REGION_COL: &str = "region";

/// Column flagging offshore sites with 1 and onshore sites with 0
pub const OFFSHORE_COL: &str = "offshore";

/// A single named column of data.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    /// Floating point values. Missing cells are NaN.
    Float(Vec<f64>),
    /// Text values. Missing cells are empty strings.
    Text(Vec<String>),
}

impl Column {
    /// The number of cells in the column
    pub fn len(&self) -> usize {
        match self {
            Column::Float(values) => values.len(),
            Column::Text(values) => values.len(),
        }
    }

    /// Whether the column has no cells
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The values as a float slice, if this is a float column
    pub fn as_float(&self) -> Option<&[f64]> {
        match self {
            Column::Float(values) => Some(values),
            Column::Text(_) => None,
        }
    }

    /// The values as a text slice, if this is a text column
    pub fn as_text(&self) -> Option<&[String]> {
        match self {
            Column::Float(_) => None,
            Column::Text(values) => Some(values),
        }
    }

    /// Infer a column from raw CSV cells.
    ///
    /// The column is treated as floating point iff every non-empty cell parses as a float, with
    /// empty cells becoming NaN. Otherwise the cells are kept as text.
    pub fn infer(cells: Vec<String>) -> Column {
        let is_float = cells
            .iter()
            .map(|cell| cell.trim())
            .all(|cell| cell.is_empty() || cell.parse::<f64>().is_ok());

        if is_float {
            Column::Float(
                cells
                    .iter()
                    .map(|cell| cell.trim().parse().unwrap_or(f64::NAN))
                    .collect(),
            )
        } else {
            Column::Text(cells)
        }
    }

    /// A key identifying the cell at `row`, for joining and grouping.
    ///
    /// Integer-valued floats are keyed without a fractional part, so a float identifier column
    /// and a text identifier column containing the same integers produce the same keys. Missing
    /// cells have no key.
    pub fn key(&self, row: usize) -> Option<String> {
        match self {
            Column::Float(values) => {
                let value = values[row];
                (!value.is_nan()).then(|| value.to_string())
            }
            Column::Text(values) => {
                let value = values[row].trim();
                (!value.is_empty()).then(|| value.to_string())
            }
        }
    }

    /// The cell at `row` formatted for CSV output
    fn format(&self, row: usize) -> String {
        match self {
            Column::Float(values) => {
                let value = values[row];
                if value.is_nan() {
                    String::new()
                } else {
                    value.to_string()
                }
            }
            Column::Text(values) => values[row].clone(),
        }
    }

    /// A new column containing the cells at `rows`, in order
    fn subset(&self, rows: &[usize]) -> Column {
        match self {
            Column::Float(values) => Column::Float(rows.iter().map(|&row| values[row]).collect()),
            Column::Text(values) => {
                Column::Text(rows.iter().map(|&row| values[row].clone()).collect())
            }
        }
    }

    /// Append all cells of `other`, converting between kinds where they disagree
    fn extend_from(&mut self, other: &Column) {
        match (self, other) {
            (Column::Float(out), Column::Float(values)) => out.extend_from_slice(values),
            (Column::Text(out), Column::Text(values)) => out.extend_from_slice(values),
            (Column::Float(out), Column::Text(values)) => {
                out.extend(values.iter().map(|cell| cell.trim().parse().unwrap_or(f64::NAN)));
            }
            (Column::Text(out), Column::Float(_)) => {
                out.extend((0..other.len()).map(|row| other.format(row)));
            }
        }
    }

    /// Append `count` missing cells
    fn extend_missing(&mut self, count: usize) {
        match self {
            Column::Float(values) => values.extend(std::iter::repeat_n(f64::NAN, count)),
            Column::Text(values) => values.extend(std::iter::repeat_n(String::new(), count)),
        }
    }

    /// An empty column of the same kind
    fn empty_like(&self) -> Column {
        match self {
            Column::Float(_) => Column::Float(Vec::new()),
            Column::Text(_) => Column::Text(Vec::new()),
        }
    }
}

/// A table of named columns with a shared row count.
///
/// Columns keep their insertion order, which is also the order they are written to CSV.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: IndexMap<String, Column>,
}

impl Table {
    /// Create an empty table
    pub fn new() -> Table {
        Table::default()
    }

    /// The number of rows in the table
    pub fn n_rows(&self) -> usize {
        self.columns.first().map_or(0, |(_, column)| column.len())
    }

    /// Whether the table has no columns
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// The column names in order
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    /// Whether the table has a column called `name`
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// Get the column called `name`, if present
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    /// Get the float column called `name`, if present and floating point
    pub fn float(&self, name: &str) -> Option<&[f64]> {
        self.columns.get(name)?.as_float()
    }

    /// Get the text column called `name`, if present and text
    pub fn text(&self, name: &str) -> Option<&[String]> {
        self.columns.get(name)?.as_text()
    }

    /// Get the float column called `name`, failing if it is absent or not floating point
    pub fn require_float(&self, name: &str) -> Result<&[f64]> {
        self.float(name)
            .ok_or_else(|| ScoutError::MissingColumn(name.to_string()).into())
    }

    /// Add a column to the table, replacing any existing column with the same name.
    ///
    /// A replaced column keeps its position; a new column is appended. The column length must
    /// match the table's row count unless the table has no columns yet.
    pub fn insert(&mut self, name: &str, column: Column) -> Result<()> {
        ensure!(
            self.columns.is_empty() || column.len() == self.n_rows(),
            "Column {} has {} rows but the table has {}",
            name,
            column.len(),
            self.n_rows()
        );
        self.columns.insert(name.to_string(), column);

        Ok(())
    }

    /// A new table containing the rows at `rows`, in order
    pub fn subset(&self, rows: &[usize]) -> Table {
        Table {
            columns: self
                .columns
                .iter()
                .map(|(name, column)| (name.clone(), column.subset(rows)))
                .collect(),
        }
    }

    /// The join/group keys of the column called `name`, one per row
    pub fn keys(&self, name: &str) -> Result<Vec<Option<String>>> {
        let column = self
            .column(name)
            .ok_or_else(|| ScoutError::MissingColumn(name.to_string()))?;

        Ok((0..self.n_rows()).map(|row| column.key(row)).collect())
    }

    /// Group row indices by the values of the column called `name`.
    ///
    /// Groups appear in order of first occurrence. Rows whose cell is missing belong to no group.
    pub fn group_rows(&self, name: &str) -> Result<IndexMap<String, Vec<usize>>> {
        let column = self
            .column(name)
            .ok_or_else(|| ScoutError::MissingColumn(name.to_string()))?;

        let mut groups: IndexMap<String, Vec<usize>> = IndexMap::new();
        for row in 0..self.n_rows() {
            if let Some(key) = column.key(row) {
                groups.entry(key).or_default().push(row);
            }
        }

        Ok(groups)
    }

    /// Concatenate tables row-wise.
    ///
    /// The result has the union of all column names in order of first appearance, with the kind
    /// of the first table that carries each column. Cells for columns a table does not carry are
    /// missing.
    pub fn concat<'a, I>(tables: I) -> Table
    where
        I: IntoIterator<Item = &'a Table>,
    {
        let tables: Vec<&Table> = tables.into_iter().collect();

        // Establish the output columns from the first table that carries each name
        let mut columns: IndexMap<String, Column> = IndexMap::new();
        for table in &tables {
            for (name, column) in &table.columns {
                columns
                    .entry(name.clone())
                    .or_insert_with(|| column.empty_like());
            }
        }

        for table in &tables {
            let n_rows = table.n_rows();
            for (name, out) in &mut columns {
                match table.columns.get(name) {
                    Some(column) => out.extend_from(column),
                    None => out.extend_missing(n_rows),
                }
            }
        }

        Table { columns }
    }

    /// Read a table from a CSV file, inferring column kinds.
    ///
    /// # Arguments
    ///
    /// * `file_path`: Path to the CSV file
    pub fn from_csv(file_path: &Path) -> Result<Table> {
        let mut reader =
            csv::Reader::from_path(file_path).with_context(|| input_err_msg(file_path))?;

        let headers: Vec<String> = reader
            .headers()
            .with_context(|| input_err_msg(file_path))?
            .iter()
            .map(str::to_string)
            .collect();

        let mut cells: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
        for record in reader.records() {
            let record = record.with_context(|| input_err_msg(file_path))?;
            for (column, cell) in cells.iter_mut().zip(record.iter()) {
                column.push(cell.to_string());
            }
        }

        let mut table = Table::new();
        for (name, raw) in headers.into_iter().zip(cells) {
            table
                .insert(&name, Column::infer(raw))
                .with_context(|| input_err_msg(file_path))?;
        }

        Ok(table)
    }

    /// Write the table as CSV to the given writer
    pub fn write_csv<W: io::Write>(&self, writer: W) -> Result<()> {
        let mut writer = csv::Writer::from_writer(writer);
        writer.write_record(self.columns.keys())?;
        for row in 0..self.n_rows() {
            writer.write_record(self.columns.values().map(|column| column.format(row)))?;
        }
        writer.flush()?;

        Ok(())
    }

    /// Write the table as CSV to a file.
    ///
    /// # Arguments
    ///
    /// * `file_path`: Path of the file to create or overwrite
    pub fn to_csv(&self, file_path: &Path) -> Result<()> {
        let file = File::create(file_path)
            .with_context(|| format!("Failed to create {}", file_path.display()))?;
        self.write_csv(file)
            .with_context(|| format!("Failed to write {}", file_path.display()))
    }
}
