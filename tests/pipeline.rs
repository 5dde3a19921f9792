//! End-to-end tests for the table composer against a generated project directory.
use scout::cli::handle_diff_command;
use scout::compose::{
    INDEX_COL, PRINT_CAPACITY_COL, apply_selections, calc_least_cost, compose_chart_tables,
    compose_map_table,
};
use scout::config::ProjectConfig;
use scout::request::{ChartRequest, DemandMode, PointSelection, SelectedPoint, TableRequest};
use scout::settings::Settings;
use scout::table::{GID_COL, Table};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tempfile::{TempDir, tempdir};

const OPEN_ACCESS_CSV: &str = "\
sc_point_gid,latitude,longitude,capacity,mean_cf,mean_lcoe,trans_cap_cost,lcot,total_lcoe,state,region,offshore,no_pipe_lcoh,pipe_lcoh_component,dist_to_h2_load_km,hydrogen_annual_kg
1,40.0,-105.0,100,0.40,30.0,50000,1.0,31.0,Texas,South,0,2.0,0.5,100.0,600000
2,40.0,-104.0,120,0.35,32.0,60000,1.5,33.5,Texas,South,0,1.5,0.4,100.0,500000
3,41.0,-105.0,80,0.45,28.0,40000,0.8,28.8,Kansas,Plains,0,3.0,0.6,100.0,700000
4,41.0,-104.0,90,0.38,35.0,55000,1.2,36.2,Kansas,Plains,1,2.5,0.7,100.0,400000";

const LIMITED_ACCESS_CSV: &str = "\
sc_point_gid,latitude,longitude,capacity,mean_cf,mean_lcoe,trans_cap_cost,lcot,total_lcoe,state,region,offshore,no_pipe_lcoh,pipe_lcoh_component,dist_to_h2_load_km,hydrogen_annual_kg
1,40.0,-105.0,100,0.38,32.0,50000,1.0,33.0,Texas,South,0,2.0,0.5,100.0,600000
2,40.0,-104.0,120,0.36,28.5,60000,1.5,30.0,Texas,South,0,1.5,0.4,100.0,500000
3,41.0,-105.0,80,0.45,28.0,40000,0.8,28.8,Kansas,Plains,0,3.0,0.6,100.0,700000
5,42.0,-103.0,60,0.30,40.0,70000,2.0,42.0,Iowa,Plains,0,2.8,0.9,100.0,300000";

const DEMAND_CSV: &str = "\
demand_id,latitude,longitude,h2_tonnes
101,40.0,-105.0,900
202,41.0,-104.0,350";

/// Write `contents` to `file_path`
fn write_file(file_path: &Path, contents: &str) {
    let mut file = File::create(file_path).unwrap();
    writeln!(file, "{contents}").unwrap();
}

/// Create a project directory with two scenarios and a demand centre file
fn create_project() -> (TempDir, ProjectConfig) {
    let dir = tempdir().unwrap();
    write_file(
        &dir.path().join("project.toml"),
        "name = \"Pipeline test\"
demand_file = \"demand.csv\"

[scenarios]
open_access = \"open_access_sc.csv\"
limited_access = \"limited_access_sc.csv\"",
    );
    write_file(&dir.path().join("open_access_sc.csv"), OPEN_ACCESS_CSV);
    write_file(&dir.path().join("limited_access_sc.csv"), LIMITED_ACCESS_CSV);
    write_file(&dir.path().join("demand.csv"), DEMAND_CSV);

    let config = ProjectConfig::from_dir(dir.path()).unwrap();

    (dir, config)
}

/// A request for the open access scenario with no extras
fn open_access_request() -> TableRequest {
    TableRequest {
        path: "open_access".to_string(),
        ..TableRequest::default()
    }
}

#[test]
fn test_compose_map_table() {
    let (_dir, config) = create_project();
    let table = compose_map_table(&config, &open_access_request()).unwrap();

    assert_eq!(table.n_rows(), 4);
    assert_eq!(table.float(INDEX_COL).unwrap(), [0.0, 1.0, 2.0, 3.0]);
    assert_eq!(
        table.float(PRINT_CAPACITY_COL).unwrap(),
        [100.0, 120.0, 80.0, 90.0]
    );
}

#[test]
fn test_compose_map_table_with_filters() {
    let (_dir, config) = create_project();
    let request = TableRequest {
        filters: vec!["capacity >= 100".to_string()],
        ..open_access_request()
    };
    let table = compose_map_table(&config, &request).unwrap();

    assert_eq!(table.float(GID_COL).unwrap(), [1.0, 2.0]);
}

#[test]
fn test_compose_map_table_subsets_states() {
    let (_dir, config) = create_project();
    let request = TableRequest {
        states: vec!["Kansas".to_string()],
        ..open_access_request()
    };
    let table = compose_map_table(&config, &request).unwrap();
    assert_eq!(table.float(GID_COL).unwrap(), [3.0, 4.0]);

    let request = TableRequest {
        states: vec!["Kansas".to_string(), "onshore".to_string()],
        ..open_access_request()
    };
    let table = compose_map_table(&config, &request).unwrap();
    assert_eq!(table.float(GID_COL).unwrap(), [3.0]);
}

#[test]
fn test_second_scenario_becomes_the_working_result() {
    let (_dir, config) = create_project();
    let request = TableRequest {
        path2: Some("limited_access".to_string()),
        ..open_access_request()
    };
    let table = compose_map_table(&config, &request).unwrap();

    assert_eq!(table.float(GID_COL).unwrap(), [1.0, 2.0, 3.0, 5.0]);
}

#[test]
fn test_mask_keeps_only_new_sites() {
    let (_dir, config) = create_project();
    let request = TableRequest {
        path2: Some("limited_access".to_string()),
        mask: true,
        ..open_access_request()
    };
    let table = compose_map_table(&config, &request).unwrap();

    assert_eq!(table.float(GID_COL).unwrap(), [5.0]);
}

#[test]
fn test_diff_uses_the_cache() {
    let (dir, config) = create_project();
    let request = TableRequest {
        path2: Some("limited_access".to_string()),
        diff: true,
        ..open_access_request()
    };

    let first = compose_map_table(&config, &request).unwrap();
    assert_eq!(first.float("total_lcoe_diff").unwrap(), [2.0, -3.5, 0.0]);

    let cache_path = dir
        .path()
        .join(".scout/diff_open_access_vs_limited_access_sc.csv");
    assert!(cache_path.is_file());

    // Replace the cache with a sentinel to prove unfiltered requests read it back
    write_file(&cache_path, "sc_point_gid,total_lcoe_diff\n9,99.0");
    let second = compose_map_table(&config, &request).unwrap();
    assert_eq!(second.float("total_lcoe_diff").unwrap(), [99.0]);

    // An active filter bypasses the cache and leaves it untouched
    let filtered = TableRequest {
        filters: vec!["capacity >= 100".to_string()],
        ..request
    };
    let third = compose_map_table(&config, &filtered).unwrap();
    assert_eq!(third.float("total_lcoe_diff").unwrap(), [2.0, -3.5]);
    assert_eq!(Table::from_csv(&cache_path).unwrap().n_rows(), 1);
}

#[test]
fn test_apply_selections_meet_demand() {
    let (_dir, config) = create_project();
    let table = compose_map_table(&config, &open_access_request()).unwrap();

    let (result, demand) =
        apply_selections(&config, &table, DemandMode::MeetDemand, None, None, None).unwrap();
    let demand = demand.unwrap();

    // Centre 101 takes sites 2 and 1; centre 202 is covered by site 4 alone
    assert_eq!(result.float(GID_COL).unwrap(), [2.0, 1.0, 4.0]);
    assert_eq!(result.float("h2_load_id").unwrap(), [101.0, 101.0, 202.0]);
    assert!(result.has_column("h2_supply"));
    assert_eq!(demand.len(), 2);
}

#[test]
fn test_apply_selections_chart_filter() {
    let (_dir, config) = create_project();
    let table = compose_map_table(&config, &open_access_request()).unwrap();

    let chart = PointSelection {
        points: vec![SelectedPoint {
            curve_number: 0,
            point_index: 0,
            lat: None,
            lon: None,
            custom_data: vec![serde_json::json!(3)],
        }],
    };
    let (result, demand) =
        apply_selections(&config, &table, DemandMode::Off, Some(&chart), None, None).unwrap();

    assert_eq!(result.float(GID_COL).unwrap(), [3.0]);
    assert!(demand.is_none());
}

#[test]
fn test_apply_selections_meet_demand_on_an_emptied_table() {
    let (_dir, config) = create_project();
    let request = TableRequest {
        filters: vec!["capacity >= 1000".to_string()],
        ..open_access_request()
    };
    let table = compose_map_table(&config, &request).unwrap();
    assert_eq!(table.n_rows(), 0);

    let chart = PointSelection {
        points: vec![SelectedPoint {
            curve_number: 0,
            point_index: 0,
            lat: None,
            lon: None,
            custom_data: vec![serde_json::json!(3)],
        }],
    };
    let (result, demand) =
        apply_selections(&config, &table, DemandMode::MeetDemand, Some(&chart), None, None)
            .unwrap();

    assert_eq!(result.n_rows(), 0);
    assert!(result.has_column("h2_supply"));
    assert!(result.has_column("h2_load_id"));
    assert_eq!(demand.unwrap().len(), 0);
}

#[test]
fn test_compose_chart_tables() {
    let (_dir, config) = create_project();
    let request = ChartRequest {
        table: open_access_request(),
        added_scenarios: vec!["limited_access".to_string()],
        group_col: None,
    };
    let tables = compose_chart_tables(&config, &request).unwrap();

    let keys: Vec<&str> = tables.keys().map(String::as_str).collect();
    assert_eq!(keys, ["Open Access", "Limited Access"]);
    assert_eq!(tables["Open Access"].n_rows(), 4);
    assert_eq!(tables["Limited Access"].n_rows(), 4);
}

#[test]
fn test_compose_chart_tables_group_split() {
    let (_dir, config) = create_project();
    let request = ChartRequest {
        table: open_access_request(),
        added_scenarios: vec![],
        group_col: Some("region".to_string()),
    };
    let tables = compose_chart_tables(&config, &request).unwrap();

    let keys: Vec<&str> = tables.keys().map(String::as_str).collect();
    assert_eq!(keys, ["South", "Plains"]);
    assert_eq!(tables["South"].float(GID_COL).unwrap(), [1.0, 2.0]);
    assert_eq!(tables["Plains"].float(GID_COL).unwrap(), [3.0, 4.0]);
}

#[test]
fn test_calc_least_cost() {
    let (dir, _config) = create_project();
    let paths = vec![
        dir.path().join("open_access_sc.csv"),
        dir.path().join("limited_access_sc.csv"),
    ];
    let out_file = dir.path().join("least_cost.csv");
    calc_least_cost(&paths, &out_file, "total_lcoe", false).unwrap();

    let result = Table::from_csv(&out_file).unwrap();
    // Paths are sorted, so groups follow the limited access scenario's row order and ties go
    // to the limited access row
    assert_eq!(result.float(GID_COL).unwrap(), [1.0, 2.0, 3.0, 5.0, 4.0]);
    assert_eq!(
        result.float("total_lcoe").unwrap(),
        [31.0, 30.0, 28.8, 42.0, 36.2]
    );
    let scenarios: Vec<&str> = result
        .text("scenario")
        .unwrap()
        .iter()
        .map(String::as_str)
        .collect();
    assert_eq!(
        scenarios,
        [
            "open_access",
            "limited_access",
            "limited_access",
            "limited_access",
            "open_access"
        ]
    );
}

#[test]
fn test_calc_least_cost_honours_overwrite() {
    let (dir, _config) = create_project();
    let paths = vec![
        dir.path().join("open_access_sc.csv"),
        dir.path().join("limited_access_sc.csv"),
    ];
    let out_file = dir.path().join("least_cost.csv");

    write_file(&out_file, "sentinel");
    calc_least_cost(&paths, &out_file, "total_lcoe", false).unwrap();
    assert!(
        std::fs::read_to_string(&out_file)
            .unwrap()
            .starts_with("sentinel")
    );

    calc_least_cost(&paths, &out_file, "total_lcoe", true).unwrap();
    assert_eq!(Table::from_csv(&out_file).unwrap().n_rows(), 5);
}

#[test]
fn test_handle_diff_command() {
    let (dir, _config) = create_project();
    let out_file = dir.path().join("diff.csv");
    let settings = Settings {
        log_level: "off".to_string(),
        overwrite: false,
    };
    handle_diff_command(
        &dir.path().join("open_access_sc.csv"),
        &dir.path().join("limited_access_sc.csv"),
        &out_file,
        Some(settings),
    )
    .unwrap();

    let result = Table::from_csv(&out_file).unwrap();
    assert_eq!(result.float("total_lcoe_diff").unwrap(), [2.0, -3.5, 0.0]);
}
