use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use serde::Serialize;

use super::WhereClause;
use crate::config::Columns;

/// A date picked in the filter controls: one day, or an inclusive range of days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DateSelection {
    Single(NaiveDate),
    Range(NaiveDate, NaiveDate),
}

impl DateSelection {
    /// First and last instant covered, 00:00:00.000 through 23:59:59.999.
    pub fn span(&self) -> (NaiveDateTime, NaiveDateTime) {
        let (first, last) = match *self {
            DateSelection::Single(day) => (day, day),
            DateSelection::Range(a, b) if a <= b => (a, b),
            DateSelection::Range(a, b) => (b, a),
        };
        (day_start(first), day_end(last))
    }
}

pub fn day_start(day: NaiveDate) -> NaiveDateTime {
    day.and_time(NaiveTime::MIN)
}

pub fn day_end(day: NaiveDate) -> NaiveDateTime {
    day_start(day) + TimeDelta::days(1) - TimeDelta::milliseconds(1)
}

/// Current selections of every filter control. Rebuilt for each render.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterState {
    pub date: Option<DateSelection>,
    pub countries: Vec<String>,
    pub genders: Vec<String>,
    pub races: Vec<String>,
    pub violations: Vec<String>,
    pub only_searched: bool,
    pub only_arrested: bool,
    pub only_drugs: bool,
}

impl FilterState {
    /// Build the WHERE clause for these selections.
    ///
    /// Filters whose column is not configured are ignored.
    pub fn where_clause(&self, columns: &Columns) -> WhereClause {
        let mut clause = WhereClause::new();

        if let (Some(col), Some(date)) = (&columns.date, &self.date) {
            let (start, end) = date.span();
            clause.push_datetime_range(col, start, end);
        }

        let categorical = [
            (&columns.country, "c_", &self.countries),
            (&columns.gender, "g_", &self.genders),
            (&columns.race, "r_", &self.races),
            (&columns.violation, "v_", &self.violations),
        ];
        for (column, prefix, values) in categorical {
            if let Some(col) = column {
                clause.push_in(col, prefix, values);
            }
        }

        let flags = [
            (&columns.search, self.only_searched),
            (&columns.arrest, self.only_arrested),
            (&columns.drugs, self.only_drugs),
        ];
        for (column, on) in flags {
            if let (Some(col), true) = (column, on) {
                clause.push_flag(col);
            }
        }

        clause
    }
}
