use std::path::Path;
use std::time::Duration;

use chrono::NaiveDate;
use stopdash::config::DashboardConfig;
use stopdash::db::cache::QueryCache;
use stopdash::db::models::Cell;
use stopdash::db::Database;
use stopdash::query::filters::{DateSelection, FilterState};
use stopdash::reports::{Dashboard, ReportOutcome, Section};

/// Write a small `traffic_stops` table with non-default column names.
fn write_stops_db(path: &Path) {
    let db = Database::open(path).unwrap();
    db.conn
        .execute_batch(
            "CREATE TABLE traffic_stops (
                day TEXT, clock TEXT, nation TEXT, sex TEXT, age INTEGER,
                race TEXT, offense TEXT, searched INTEGER, arrested INTEGER,
                drugs INTEGER, plate TEXT
            );
            INSERT INTO traffic_stops VALUES
                ('2022-02-01', '07:30', 'Canada', 'M', 30, 'White', 'Speeding',  1, 1, 0, 'P1'),
                ('2022-02-01', '19:05', 'Canada', 'F', 52, 'Black', 'Speeding',  0, 0, 0, 'P2'),
                ('2022-02-02', '07:55', 'USA',    'F', 19, 'Asian', 'Equipment', 1, 0, 1, 'P1'),
                ('2023-05-20', '12:00', 'USA',    'M', 61, 'White', 'Registration', 1, 1, 1, 'P3');",
        )
        .unwrap();
}

const CONFIG: &str = r#"
table = "traffic_stops"

[columns]
date = "day"
time = "clock"
country = "nation"
gender = "sex"
race = "race"
violation = "offense"
search = "searched"
arrest = "arrested"
drugs = "drugs"
vehicle = "plate"
age = ""

[cache]
ttl_secs = 300
"#;

fn setup(dir: &Path) -> (Database, DashboardConfig) {
    let db_path = dir.join("stops.db");
    write_stops_db(&db_path);
    let config_path = dir.join("config.toml");
    std::fs::write(&config_path, CONFIG).unwrap();

    let cfg = DashboardConfig::load_from(&config_path).unwrap();
    let db = Database::open_read_only(&db_path).unwrap();
    (db, cfg)
}

#[test]
fn custom_column_mapping_drives_every_section() {
    let dir = tempfile::tempdir().unwrap();
    let (db, cfg) = setup(dir.path());
    let schema = cfg.schema().unwrap();
    db.validate_schema(&schema).unwrap();

    let mut dash = Dashboard::new(&db, &schema, QueryCache::from_config(&cfg.cache));
    let rendered = dash.render(&FilterState::default(), &Section::ALL).unwrap();

    assert_eq!(rendered.kpis.total_stops, 4);
    assert_eq!(rendered.kpis.arrest_rate, Some(50.0));
    assert_eq!(rendered.sections.len(), Section::ALL.len());

    let demographic = &rendered.sections[1];
    assert_eq!(demographic.section, Section::Demographic);
    match &demographic.reports[0].outcome {
        ReportOutcome::Skipped { message } => {
            assert_eq!(message, "Age column not configured.")
        }
        other => panic!("expected skip, got {other:?}"),
    }

    let time = &rendered.sections[2];
    match &time.reports[0].outcome {
        ReportOutcome::Table { table } => {
            assert_eq!(table.get(0, "hour_of_day"), Some(&Cell::Integer(7)));
            assert_eq!(table.get(0, "stops"), Some(&Cell::Integer(2)));
        }
        other => panic!("expected table, got {other:?}"),
    }
}

#[test]
fn filters_narrow_metrics_and_sample() {
    let dir = tempfile::tempdir().unwrap();
    let (db, cfg) = setup(dir.path());
    let schema = cfg.schema().unwrap();
    let mut dash = Dashboard::new(&db, &schema, QueryCache::disabled());

    let filters = FilterState {
        date: Some(DateSelection::Range(
            NaiveDate::from_ymd_opt(2022, 2, 1).unwrap(),
            NaiveDate::from_ymd_opt(2022, 2, 2).unwrap(),
        )),
        countries: vec!["USA".into(), "Canada".into()],
        only_searched: true,
        ..Default::default()
    };
    let rendered = dash.render(&filters, &[Section::Sample]).unwrap();

    assert_eq!(rendered.kpis.total_stops, 2);
    assert_eq!(rendered.params.len(), 4);
    assert!(rendered.where_sql.contains("nation IN (:c_0,:c_1)"));
    assert!(rendered.where_sql.ends_with("searched = 1"));
    match &rendered.sections[0].reports[0].outcome {
        ReportOutcome::Table { table } => assert_eq!(table.len(), 2),
        other => panic!("expected table, got {other:?}"),
    }
}

#[test]
fn repeated_render_is_served_from_cache() {
    let dir = tempfile::tempdir().unwrap();
    let (db, cfg) = setup(dir.path());
    let schema = cfg.schema().unwrap();
    let mut dash = Dashboard::new(&db, &schema, QueryCache::new(Duration::from_secs(300)));

    let filters = FilterState {
        genders: vec!["F".into()],
        ..Default::default()
    };
    dash.render(&filters, &[Section::Vehicle, Section::Location]).unwrap();
    let after_first = dash.cache_stats();
    dash.render(&filters, &[Section::Vehicle, Section::Location]).unwrap();
    let after_second = dash.cache_stats();

    assert_eq!(after_first.hits, 0);
    assert_eq!(after_second.misses, after_first.misses);
    assert_eq!(after_second.hits, after_first.misses);
}

#[test]
fn mapping_to_absent_column_fails_validation() {
    let dir = tempfile::tempdir().unwrap();
    let (db, mut cfg) = setup(dir.path());
    cfg.columns.age = "driver_age".into();
    let err = db.validate_schema(&cfg.schema().unwrap()).unwrap_err();
    assert!(err.to_string().contains("driver_age (age)"), "{err}");
}

#[test]
fn rendered_output_serializes_to_json() {
    let dir = tempfile::tempdir().unwrap();
    let (db, cfg) = setup(dir.path());
    let schema = cfg.schema().unwrap();
    let mut dash = Dashboard::new(&db, &schema, QueryCache::disabled());

    let filters = FilterState {
        violations: vec!["Speeding".into()],
        ..Default::default()
    };
    let rendered = dash
        .render(&filters, &[Section::Location, Section::Demographic])
        .unwrap();
    let json = serde_json::to_value(&rendered).unwrap();

    assert_eq!(json["where"], "1=1 AND offense IN (:v_0)");
    assert_eq!(json["params"]["v_0"], "Speeding");
    assert_eq!(json["kpis"]["total_stops"], 2);
    assert_eq!(json["sections"][0]["section"], "location");
    assert_eq!(json["sections"][0]["reports"][0]["status"], "table");
    assert_eq!(json["sections"][0]["reports"][0]["table"]["rows"][0][0], "Canada");
    assert_eq!(json["sections"][1]["reports"][0]["status"], "skipped");
}
