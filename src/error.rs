use thiserror::Error;

/// Configuration and identifier validation failures.
///
/// Everything else (SQLite, I/O) travels as `anyhow::Error` with context.
#[derive(Error, Debug)]
pub enum Error {
    /// A configured table or column name is not a plain SQL identifier.
    #[error("invalid identifier for {role}: {value:?} (expected letters, digits and '_')")]
    InvalidIdentifier { role: String, value: String },

    /// The configured table does not exist in the database.
    #[error("table '{table}' not found in database")]
    MissingTable { table: String },

    /// Configured columns that the live table does not have.
    #[error("table '{table}' has no column(s): {}", .columns.join(", "))]
    MissingColumns { table: String, columns: Vec<String> },

    /// The config file could not be parsed.
    #[error("failed to parse config {path}: {message}")]
    ConfigParse { path: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_columns_lists_all_names() {
        let err = Error::MissingColumns {
            table: "police".to_string(),
            columns: vec!["driver_age".to_string(), "violation".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "table 'police' has no column(s): driver_age, violation"
        );
    }

    #[test]
    fn test_invalid_identifier_quotes_value() {
        let err = Error::InvalidIdentifier {
            role: "country".to_string(),
            value: "x; DROP".to_string(),
        };
        assert!(err.to_string().contains("\"x; DROP\""));
        assert!(err.to_string().contains("country"));
    }
}
