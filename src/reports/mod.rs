pub mod sql;

use anyhow::Result;
use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::{ColumnRole, Schema};
use crate::db::cache::{CacheStats, QueryCache};
use crate::db::models::{Cell, ResultTable};
use crate::db::Database;
use crate::query::filters::{DateSelection, FilterState};
use crate::query::{Ident, Params, WhereClause};

/// Dashboard pages, in navigation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    Vehicle,
    Demographic,
    Time,
    Violation,
    Location,
    Complex,
    Sample,
}

impl Section {
    pub const ALL: [Section; 7] = [
        Section::Vehicle,
        Section::Demographic,
        Section::Time,
        Section::Violation,
        Section::Location,
        Section::Complex,
        Section::Sample,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "vehicle" | "vehicles" => Some(Section::Vehicle),
            "demographic" | "demographics" => Some(Section::Demographic),
            "time" => Some(Section::Time),
            "violation" | "violations" => Some(Section::Violation),
            "location" => Some(Section::Location),
            "complex" => Some(Section::Complex),
            "sample" => Some(Section::Sample),
            _ => None,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Section::Vehicle => "Vehicle-Based",
            Section::Demographic => "Demographic",
            Section::Time => "Time & Duration",
            Section::Violation => "Violation",
            Section::Location => "Location",
            Section::Complex => "Complex",
            Section::Sample => "Sample Records",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReportOutcome {
    Table { table: Arc<ResultTable> },
    /// Required columns are not configured; nothing was queried.
    Skipped { message: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub title: &'static str,
    #[serde(flatten)]
    pub outcome: ReportOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct SectionReport {
    pub section: Section,
    pub title: &'static str,
    pub reports: Vec<Report>,
}

/// Headline metrics. Rates are percentages, `None` when the column is not configured.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Kpis {
    pub total_stops: i64,
    pub arrest_rate: Option<f64>,
    pub search_rate: Option<f64>,
    pub drug_rate: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateBounds {
    pub min: NaiveDate,
    pub max: NaiveDate,
}

/// Choices available for each filter control.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterOptions {
    pub date_bounds: Option<DateBounds>,
    pub countries: Vec<String>,
    pub genders: Vec<String>,
    pub races: Vec<String>,
    pub violations: Vec<String>,
}

/// Everything one render produces.
#[derive(Debug, Clone, Serialize)]
pub struct Rendered {
    #[serde(rename = "where")]
    pub where_sql: String,
    pub params: Params,
    pub kpis: Kpis,
    pub sections: Vec<SectionReport>,
}

/// "Vehicle or drug-related column not configured."
pub fn missing_message(missing: &[ColumnRole]) -> String {
    let labels: Vec<&str> = missing.iter().map(|r| r.label()).collect();
    let joined = match labels.split_last() {
        Some((last, [])) => last.to_string(),
        Some((last, rest)) => format!("{} or {last}", rest.join(", ")),
        None => String::new(),
    };
    let mut chars = joined.chars();
    let capitalized = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
        None => String::new(),
    };
    format!("{capitalized} column not configured.")
}

fn parse_date_cell(cell: &Cell) -> Option<NaiveDate> {
    if cell.is_null() {
        return None;
    }
    let text = cell.to_string();
    let parsed = text
        .get(..10)
        .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok());
    if parsed.is_none() {
        warn!("Unrecognized date value: {text}");
    }
    parsed
}

/// Runs the dashboard queries for one stops table, memoizing results.
pub struct Dashboard<'a> {
    db: &'a Database,
    schema: &'a Schema,
    cache: QueryCache,
}

impl<'a> Dashboard<'a> {
    pub fn new(db: &'a Database, schema: &'a Schema, cache: QueryCache) -> Self {
        Dashboard { db, schema, cache }
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    fn query(&mut self, sql: &str, params: &Params) -> Result<Arc<ResultTable>> {
        let db = self.db;
        self.cache.get_or_fetch(sql, params, || db.run_query(sql, params))
    }

    /// Sorted, non-null distinct values of a column.
    pub fn distinct_values(&mut self, column: &Ident) -> Result<Vec<String>> {
        let sql = sql::distinct_values(&self.schema.table, column);
        let table = self.query(&sql, &Params::new())?;
        Ok(table
            .rows
            .iter()
            .filter_map(|row| row.first())
            .filter(|cell| !cell.is_null())
            .map(|cell| cell.to_string())
            .collect())
    }

    /// Earliest and latest date in the table, if the date column is configured and non-empty.
    pub fn date_bounds(&mut self) -> Result<Option<DateBounds>> {
        let schema = self.schema;
        let Some(date) = &schema.columns.date else {
            return Ok(None);
        };
        let table = self.query(&sql::date_bounds(&schema.table, date), &Params::new())?;
        let min = table.get(0, "mn").and_then(parse_date_cell);
        let max = table.get(0, "mx").and_then(parse_date_cell);
        Ok(match (min, max) {
            (Some(min), Some(max)) => Some(DateBounds { min, max }),
            _ => None,
        })
    }

    /// Resolve optional from/to dates into a selection, filling open ends
    /// (or the whole window) from the table's date bounds.
    pub fn date_selection(
        &mut self,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Option<DateSelection>> {
        if let (Some(from), Some(to)) = (from, to) {
            return Ok(Some(DateSelection::Range(from, to)));
        }
        let bounds = self.date_bounds()?;
        Ok(match (from, to, bounds) {
            // a bound past the table's dates keeps the window empty instead of reversing it
            (Some(from), None, b) => {
                Some(DateSelection::Range(from, b.map_or(from, |b| from.max(b.max))))
            }
            (None, Some(to), b) => Some(DateSelection::Range(b.map_or(to, |b| to.min(b.min)), to)),
            (None, None, Some(b)) => Some(DateSelection::Range(b.min, b.max)),
            _ => None,
        })
    }

    /// Option lists for every configured filter control.
    pub fn options(&mut self) -> Result<FilterOptions> {
        let schema = self.schema;
        let columns = &schema.columns;
        let mut options = FilterOptions {
            date_bounds: self.date_bounds()?,
            ..Default::default()
        };
        let targets = [
            (&columns.country, &mut options.countries),
            (&columns.gender, &mut options.genders),
            (&columns.race, &mut options.races),
            (&columns.violation, &mut options.violations),
        ];
        for (column, values) in targets {
            if let Some(col) = column {
                *values = self.distinct_values(col)?;
            }
        }
        Ok(options)
    }

    pub fn kpis(&mut self, clause: &WhereClause) -> Result<Kpis> {
        let schema = self.schema;
        let c = &schema.columns;
        let sql = sql::kpis(
            &schema.table,
            &clause.sql(),
            c.arrest.as_ref(),
            c.search.as_ref(),
            c.drugs.as_ref(),
        );
        let table = self.query(&sql, clause.params())?;

        let rate = |col: &Option<Ident>, alias: &str| {
            col.as_ref().map(|_| {
                table.get(0, alias).and_then(Cell::as_f64).unwrap_or(0.0) * 100.0
            })
        };

        Ok(Kpis {
            total_stops: table.get(0, "total").and_then(Cell::as_i64).unwrap_or(0),
            arrest_rate: rate(&c.arrest, "arrest_rate"),
            search_rate: rate(&c.search, "search_rate"),
            drug_rate: rate(&c.drugs, "drug_rate"),
        })
    }

    fn report(
        &mut self,
        title: &'static str,
        planned: std::result::Result<String, Vec<ColumnRole>>,
        clause: &WhereClause,
    ) -> Result<Report> {
        let outcome = match planned {
            Ok(sql) => ReportOutcome::Table {
                table: self.query(&sql, clause.params())?,
            },
            Err(missing) => {
                let message = missing_message(&missing);
                info!("Skipping report \"{title}\": {message}");
                ReportOutcome::Skipped { message }
            }
        };
        Ok(Report { title, outcome })
    }

    pub fn section(&mut self, section: Section, clause: &WhereClause) -> Result<SectionReport> {
        use ColumnRole::*;

        let schema = self.schema;
        let c = &schema.columns;
        let t = &schema.table;
        let w = clause.sql();

        let reports = match section {
            Section::Vehicle => vec![
                self.report(
                    "Top 10 vehicles in drug-related stops",
                    c.require([Vehicle, Drugs])
                        .map(|[v, d]| sql::top_drug_vehicles(t, &w, v, d)),
                    clause,
                )?,
                self.report(
                    "Most frequently searched vehicles",
                    c.require([Vehicle, Search])
                        .map(|[v, s]| sql::top_searched_vehicles(t, &w, v, s)),
                    clause,
                )?,
            ],
            Section::Demographic => vec![self.report(
                "Driver age group with highest arrest rate",
                c.require([Age, Arrest])
                    .map(|[age, a]| sql::arrest_rate_by_age(t, &w, age, a)),
                clause,
            )?],
            Section::Time => vec![self.report(
                "Time of day with most stops",
                c.require([Time]).map(|[time]| sql::stops_by_hour(t, &w, time)),
                clause,
            )?],
            Section::Violation => vec![self.report(
                "Violations with highest search & arrest rates",
                c.require([Violation, Search, Arrest])
                    .map(|[v, s, a]| sql::violation_rates(t, &w, v, s, a)),
                clause,
            )?],
            Section::Location => vec![self.report(
                "Countries with highest drug stop rate",
                c.require([Country, Drugs])
                    .map(|[country, d]| sql::drug_rate_by_country(t, &w, country, d)),
                clause,
            )?],
            Section::Complex => vec![self.report(
                "Yearly breakdown of stops & arrests by country",
                c.require([Date, Country, Arrest])
                    .map(|[d, country, a]| sql::yearly_by_country(t, &w, d, country, a)),
                clause,
            )?],
            Section::Sample => vec![self.report(
                "Sample Records",
                Ok(sql::sample_rows(t, &w)),
                clause,
            )?],
        };

        Ok(SectionReport {
            section,
            title: section.title(),
            reports,
        })
    }

    /// One full render: WHERE clause, headline metrics, then each requested section.
    pub fn render(&mut self, filters: &FilterState, sections: &[Section]) -> Result<Rendered> {
        let clause = filters.where_clause(&self.schema.columns);
        let kpis = self.kpis(&clause)?;
        let mut rendered = Vec::with_capacity(sections.len());
        for &section in sections {
            rendered.push(self.section(section, &clause)?);
        }
        Ok(Rendered {
            where_sql: clause.sql(),
            params: clause.params().clone(),
            kpis,
            sections: rendered,
        })
    }
}
