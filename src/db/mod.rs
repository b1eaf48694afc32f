pub mod cache;
pub mod models;

use anyhow::{Context, Result};
use rusqlite::types::ToSql;
use rusqlite::{Connection, OpenFlags};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::Schema;
use crate::error::Error;
use crate::query::{Ident, Params};
use models::{Cell, ResultTable};

pub struct Database {
    pub conn: Connection,
    pub path: PathBuf,
}

impl Database {
    /// Open (or create) a writable database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;

        // rollback journal: the file stays self-contained, no -wal/-shm sidecars
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        info!("Opened database: {}", path.display());

        Ok(Database {
            conn,
            path: path.to_path_buf(),
        })
    }

    /// Open an existing database for reporting. Never creates or writes the file.
    pub fn open_read_only(path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("Failed to open database: {}", path.display()))?;

        info!("Opened database (read-only): {}", path.display());

        Ok(Database {
            conn,
            path: path.to_path_buf(),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Database {
            conn,
            path: PathBuf::from(":memory:"),
        })
    }

    /// Default database path: ~/.stopdash/traffic_stops.db
    pub fn default_db_path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".stopdash").join("traffic_stops.db"))
    }

    /// Run a statement with named parameters and collect every row.
    ///
    /// Parameters the statement does not reference are skipped, so one
    /// mapping can serve several queries built from the same WHERE clause.
    pub fn run_query(&self, sql: &str, params: &Params) -> Result<ResultTable> {
        let mut stmt = self
            .conn
            .prepare(sql)
            .with_context(|| format!("Failed to prepare query: {}", sql.trim()))?;

        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        let names: Vec<String> = params.iter().map(|(name, _)| format!(":{name}")).collect();
        let mut bound: Vec<(&str, &dyn ToSql)> = Vec::with_capacity(names.len());
        for (name, (_, value)) in names.iter().zip(params.iter()) {
            if stmt.parameter_index(name)?.is_some() {
                bound.push((name.as_str(), value as &dyn ToSql));
            }
        }

        debug!(params = bound.len(), "running query");

        let mut rows = stmt.query(bound.as_slice())?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut cells = Vec::with_capacity(columns.len());
            for i in 0..columns.len() {
                cells.push(Cell::from(row.get_ref(i)?));
            }
            out.push(cells);
        }

        Ok(ResultTable { columns, rows: out })
    }

    /// Column names of a table, in declaration order. Empty if the table does not exist.
    pub fn table_columns(&self, table: &Ident) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM pragma_table_info(?1) ORDER BY cid")?;
        let rows = stmt.query_map([table.as_str()], |row| row.get(0))?;
        let mut names = Vec::new();
        for row in rows {
            names.push(row?);
        }
        Ok(names)
    }

    /// Check that the configured table exists and has every configured column.
    pub fn validate_schema(&self, schema: &Schema) -> Result<()> {
        let live = self.table_columns(&schema.table)?;
        if live.is_empty() {
            return Err(Error::MissingTable {
                table: schema.table.to_string(),
            }
            .into());
        }

        let missing: Vec<String> = schema
            .columns
            .configured()
            .filter(|(_, col)| !live.iter().any(|c| c.eq_ignore_ascii_case(col.as_str())))
            .map(|(role, col)| format!("{col} ({})", role.key()))
            .collect();

        if !missing.is_empty() {
            return Err(Error::MissingColumns {
                table: schema.table.to_string(),
                columns: missing,
            }
            .into());
        }

        debug!(table = %schema.table, columns = live.len(), "schema validated");
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::DashboardConfig;
    use crate::query::ParamValue;

    /// In-memory `police` table shaped like the default column mapping.
    pub(crate) fn police_db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.conn
            .execute_batch(
                "CREATE TABLE police (
                    stop_date TEXT,
                    stop_time TEXT,
                    country_name TEXT,
                    driver_gender TEXT,
                    driver_age INTEGER,
                    driver_race TEXT,
                    violation TEXT,
                    search_conducted INTEGER,
                    is_arrested INTEGER,
                    drugs_related_stop INTEGER,
                    vehicle_number TEXT
                );
                INSERT INTO police VALUES
                    ('2020-01-01', '08:15', 'Canada', 'M', 22, 'White',    'Speeding',  0, 0, 0, 'AB123'),
                    ('2020-01-01', '23:50', 'Canada', 'F', 35, 'Asian',    'Seatbelt',  1, 1, 1, 'AB123'),
                    ('2020-06-15', '14:05', 'USA',    'M', 17, 'Black',    'Speeding',  1, 0, 1, 'XY999'),
                    ('2021-03-10', '08:45', 'India',  'F', 70, 'Hispanic', 'Equipment', 0, 1, 0, NULL),
                    ('2021-12-31', '00:10', 'USA',    'M', 45, 'White',    'Speeding',  1, 1, 1, 'XY999');",
            )
            .unwrap();
        db
    }

    fn text_params(pairs: &[(&str, &str)]) -> Params {
        let mut p = Params::new();
        for (k, v) in pairs {
            p.insert(*k, *v);
        }
        p
    }

    #[test]
    fn test_run_query_binds_named_params() {
        let db = police_db();
        let table = db
            .run_query(
                "SELECT COUNT(*) AS total FROM police WHERE country_name IN (:c_0,:c_1)",
                &text_params(&[("c_0", "Canada"), ("c_1", "India")]),
            )
            .unwrap();
        assert_eq!(table.columns, vec!["total"]);
        assert_eq!(table.get(0, "total"), Some(&Cell::Integer(3)));
    }

    #[test]
    fn test_run_query_ignores_unreferenced_params() {
        let db = police_db();
        let table = db
            .run_query(
                "SELECT COUNT(*) AS total FROM police",
                &text_params(&[("c_0", "Canada")]),
            )
            .unwrap();
        assert_eq!(table.get(0, "total"), Some(&Cell::Integer(5)));
    }

    #[test]
    fn test_run_query_maps_cell_types() {
        let db = police_db();
        let table = db
            .run_query(
                "SELECT driver_age, vehicle_number, 0.5 AS r FROM police WHERE country_name = :c",
                &text_params(&[("c", "India")]),
            )
            .unwrap();
        assert_eq!(table.rows[0], vec![Cell::Integer(70), Cell::Null, Cell::Real(0.5)]);
    }

    #[test]
    fn test_timestamp_params_cover_date_only_values() {
        let db = police_db();
        let mut params = Params::new();
        let day = chrono::NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        params.insert("s", ParamValue::Timestamp(crate::query::filters::day_start(day)));
        params.insert("e", ParamValue::Timestamp(crate::query::filters::day_end(day)));
        let table = db
            .run_query(
                "SELECT COUNT(*) AS n FROM police WHERE julianday(stop_date) BETWEEN julianday(:s) AND julianday(:e)",
                &params,
            )
            .unwrap();
        assert_eq!(table.get(0, "n"), Some(&Cell::Integer(2)));
    }

    #[test]
    fn test_malformed_sql_is_an_error() {
        let db = police_db();
        assert!(db.run_query("SELEC oops", &Params::new()).is_err());
        assert!(db
            .run_query("SELECT no_such_col FROM police", &Params::new())
            .is_err());
    }

    #[test]
    fn test_validate_schema_accepts_default_mapping() {
        let db = police_db();
        let schema = DashboardConfig::default().schema().unwrap();
        db.validate_schema(&schema).unwrap();
    }

    #[test]
    fn test_validate_schema_reports_missing_columns() {
        let db = police_db();
        let mut config = DashboardConfig::default();
        config.columns.vehicle = "plate".into();
        let err = db.validate_schema(&config.schema().unwrap()).unwrap_err();
        let err = err.downcast::<Error>().unwrap();
        assert!(matches!(err, Error::MissingColumns { ref columns, .. } if columns == &vec!["plate (vehicle)".to_string()]));
    }

    #[test]
    fn test_validate_schema_reports_missing_table() {
        let db = police_db();
        let mut config = DashboardConfig::default();
        config.table = "stops".into();
        let err = db.validate_schema(&config.schema().unwrap()).unwrap_err();
        assert!(matches!(err.downcast::<Error>().unwrap(), Error::MissingTable { .. }));
    }

    #[test]
    fn test_open_read_only_refuses_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stops.db");
        {
            let db = Database::open(&path).unwrap();
            db.conn.execute_batch("CREATE TABLE t (x INTEGER);").unwrap();
        }
        let ro = Database::open_read_only(&path).unwrap();
        assert!(ro.conn.execute("INSERT INTO t VALUES (1)", []).is_err());
    }

    #[test]
    fn test_open_leaves_no_journal_sidecars() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("students.db");
        let db = Database::open(&path).unwrap();
        db.conn
            .execute_batch("CREATE TABLE t (x INTEGER); INSERT INTO t VALUES (1);")
            .unwrap();

        let mode: String = db
            .conn
            .query_row("PRAGMA journal_mode", [], |r| r.get(0))
            .unwrap();
        assert_eq!(mode, "delete");
        assert!(!dir.path().join("students.db-wal").exists());
        assert!(!dir.path().join("students.db-shm").exists());
    }

    #[test]
    fn test_open_read_only_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Database::open_read_only(&dir.path().join("absent.db")).is_err());
    }
}
