//! Fixtures for tests

use crate::table::{
    CAPACITY_COL, Column, GID_COL, LATITUDE_COL, LONGITUDE_COL, STATE_COL, TOTAL_LCOE_COL, Table,
};
use rstest::fixture;

/// Assert that an error with the given message occurs
macro_rules! assert_error {
    ($result:expr, $msg:expr) => {
        assert_eq!(
            $result.unwrap_err().chain().next().unwrap().to_string(),
            $msg
        );
    };
}
pub(crate) use assert_error;

/// Build a table from name/column pairs
pub fn table_from(columns: Vec<(&str, Column)>) -> Table {
    let mut table = Table::new();
    for (name, column) in columns {
        table.insert(name, column).unwrap();
    }

    table
}

/// A small supply curve table covering a spread of capacities and costs
#[fixture]
pub fn sites() -> Table {
    table_from(vec![
        (GID_COL, Column::Float(vec![1.0, 2.0, 3.0, 4.0, 5.0])),
        (
            CAPACITY_COL,
            Column::Float(vec![12.0, 8.5, 21.0, 9.0, 30.0]),
        ),
        (
            TOTAL_LCOE_COL,
            Column::Float(vec![35.0, 42.0, 55.0, 28.0, 39.5]),
        ),
        (
            LATITUDE_COL,
            Column::Float(vec![40.1, 40.4, 41.0, 39.6, 40.8]),
        ),
        (
            LONGITUDE_COL,
            Column::Float(vec![-105.0, -104.2, -103.9, -104.8, -105.3]),
        ),
        (
            STATE_COL,
            Column::Text(vec![
                "Colorado".into(),
                "Colorado".into(),
                "Nebraska".into(),
                "Colorado".into(),
                "Nebraska".into(),
            ]),
        ),
    ])
}
