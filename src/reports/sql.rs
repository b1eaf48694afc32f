//! Report statements in the SQLite dialect.
//!
//! Every function splices only validated [`Ident`]s and a WHERE clause built
//! by [`crate::query::WhereClause`]; values stay behind named parameters.

use crate::query::Ident;

pub const TOP_N: usize = 10;
pub const MIN_VIOLATION_STOPS: i64 = 30;
pub const SAMPLE_LIMIT: usize = 200;

/// `COUNT(*) AS total` plus `AVG(col = 1)` for each configured flag column.
pub fn kpis(
    table: &Ident,
    where_sql: &str,
    arrest: Option<&Ident>,
    search: Option<&Ident>,
    drugs: Option<&Ident>,
) -> String {
    let mut select = vec!["COUNT(*) AS total".to_string()];
    for (col, alias) in [(arrest, "arrest_rate"), (search, "search_rate"), (drugs, "drug_rate")] {
        if let Some(col) = col {
            select.push(format!("AVG({col} = 1) AS {alias}"));
        }
    }
    format!("SELECT {} FROM {table} WHERE {where_sql}", select.join(", "))
}

pub fn distinct_values(table: &Ident, column: &Ident) -> String {
    format!("SELECT DISTINCT {column} AS v FROM {table} WHERE {column} IS NOT NULL ORDER BY v")
}

pub fn date_bounds(table: &Ident, date: &Ident) -> String {
    format!("SELECT MIN({date}) AS mn, MAX({date}) AS mx FROM {table}")
}

pub fn top_drug_vehicles(table: &Ident, where_sql: &str, vehicle: &Ident, drugs: &Ident) -> String {
    format!(
        "SELECT {vehicle} AS vehicle_number, COUNT(*) AS drug_stops
         FROM {table}
         WHERE {where_sql} AND {drugs} = 1 AND {vehicle} IS NOT NULL
         GROUP BY {vehicle}
         ORDER BY drug_stops DESC, vehicle_number
         LIMIT {TOP_N}"
    )
}

pub fn top_searched_vehicles(table: &Ident, where_sql: &str, vehicle: &Ident, search: &Ident) -> String {
    format!(
        "SELECT {vehicle} AS vehicle_number, COUNT(*) AS searches
         FROM {table}
         WHERE {where_sql} AND {search} = 1 AND {vehicle} IS NOT NULL
         GROUP BY {vehicle}
         ORDER BY searches DESC, vehicle_number
         LIMIT {TOP_N}"
    )
}

pub fn arrest_rate_by_age(table: &Ident, where_sql: &str, age: &Ident, arrest: &Ident) -> String {
    format!(
        "WITH binned AS (
           SELECT CASE
                    WHEN {age} IS NULL THEN 'unknown'
                    WHEN {age} < 18 THEN '<18'
                    WHEN {age} BETWEEN 18 AND 24 THEN '18-24'
                    WHEN {age} BETWEEN 25 AND 34 THEN '25-34'
                    WHEN {age} BETWEEN 35 AND 44 THEN '35-44'
                    WHEN {age} BETWEEN 45 AND 54 THEN '45-54'
                    WHEN {age} BETWEEN 55 AND 64 THEN '55-64'
                    ELSE '65+'
                  END AS age_group,
                  {arrest} AS arrested
           FROM {table}
           WHERE {where_sql}
         )
         SELECT age_group, COUNT(*) AS stops,
                SUM(arrested = 1) AS arrests,
                ROUND(100.0 * SUM(arrested = 1) / COUNT(*), 2) AS arrest_rate
         FROM binned
         GROUP BY age_group
         ORDER BY arrest_rate DESC, age_group"
    )
}

pub fn stops_by_hour(table: &Ident, where_sql: &str, time: &Ident) -> String {
    format!(
        "SELECT CAST(strftime('%H', {time}) AS INTEGER) AS hour_of_day, COUNT(*) AS stops
         FROM {table}
         WHERE {where_sql}
         GROUP BY hour_of_day
         ORDER BY stops DESC, hour_of_day"
    )
}

pub fn violation_rates(
    table: &Ident,
    where_sql: &str,
    violation: &Ident,
    search: &Ident,
    arrest: &Ident,
) -> String {
    format!(
        "SELECT {violation} AS violation,
                COUNT(*) AS stops,
                SUM({search} = 1) AS searches,
                ROUND(100.0 * SUM({search} = 1) / COUNT(*), 2) AS search_rate,
                SUM({arrest} = 1) AS arrests,
                ROUND(100.0 * SUM({arrest} = 1) / COUNT(*), 2) AS arrest_rate
         FROM {table}
         WHERE {where_sql}
         GROUP BY {violation}
         HAVING COUNT(*) >= {MIN_VIOLATION_STOPS}
         ORDER BY arrest_rate DESC
         LIMIT {TOP_N}"
    )
}

pub fn drug_rate_by_country(table: &Ident, where_sql: &str, country: &Ident, drugs: &Ident) -> String {
    format!(
        "SELECT {country} AS country,
                COUNT(*) AS total_stops,
                SUM({drugs} = 1) AS drug_stops,
                ROUND(100.0 * SUM({drugs} = 1) / COUNT(*), 2) AS drug_rate
         FROM {table}
         WHERE {where_sql}
         GROUP BY {country}
         ORDER BY drug_rate DESC
         LIMIT {TOP_N}"
    )
}

pub fn yearly_by_country(
    table: &Ident,
    where_sql: &str,
    date: &Ident,
    country: &Ident,
    arrest: &Ident,
) -> String {
    format!(
        "SELECT {country} AS country,
                CAST(strftime('%Y', {date}) AS INTEGER) AS yr,
                COUNT(*) AS stops,
                SUM({arrest} = 1) AS arrests
         FROM {table}
         WHERE {where_sql}
         GROUP BY {country}, yr
         ORDER BY country, yr"
    )
}

pub fn sample_rows(table: &Ident, where_sql: &str) -> String {
    format!("SELECT * FROM {table} WHERE {where_sql} LIMIT {SAMPLE_LIMIT}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(s: &str) -> Ident {
        Ident::parse("test", s).unwrap()
    }

    #[test]
    fn test_kpis_selects_only_configured_rates() {
        let sql = kpis(&ident("police"), "1=1", Some(&ident("is_arrested")), None, None);
        assert_eq!(
            sql,
            "SELECT COUNT(*) AS total, AVG(is_arrested = 1) AS arrest_rate FROM police WHERE 1=1"
        );
    }

    #[test]
    fn test_distinct_values_excludes_nulls() {
        let sql = distinct_values(&ident("police"), &ident("driver_race"));
        assert!(sql.contains("WHERE driver_race IS NOT NULL"));
        assert!(sql.ends_with("ORDER BY v"));
    }

    #[test]
    fn test_section_queries_embed_where_clause() {
        let t = ident("police");
        let w = "1=1 AND country_name IN (:c_0)";
        let statements = [
            top_drug_vehicles(&t, w, &ident("vehicle_number"), &ident("drugs_related_stop")),
            stops_by_hour(&t, w, &ident("stop_time")),
            sample_rows(&t, w),
        ];
        for sql in statements {
            assert!(sql.contains(&format!("WHERE {w}")), "{sql}");
        }
    }

    #[test]
    fn test_violation_rates_has_minimum_stop_count() {
        let sql = violation_rates(
            &ident("police"),
            "1=1",
            &ident("violation"),
            &ident("search_conducted"),
            &ident("is_arrested"),
        );
        assert!(sql.contains("HAVING COUNT(*) >= 30"));
        assert!(sql.contains("LIMIT 10"));
    }
}
