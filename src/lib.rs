//! Traffic-stop dashboard: filter selections become one parameterized WHERE
//! clause shared by a set of SQLite reports, with results memoized per
//! (query, parameters). Also ships a seeder for a synthetic student database.

pub mod config;
pub mod db;
pub mod error;
pub mod generator;
pub mod output;
pub mod query;
pub mod reports;

pub use error::Error;
