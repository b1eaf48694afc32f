use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::db::cache::DEFAULT_MAX_ENTRIES;
use crate::error::Error;
use crate::query::Ident;

/// Logical column roles the reports and filters refer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnRole {
    Date,
    Time,
    Country,
    Gender,
    Race,
    Violation,
    Search,
    Arrest,
    Drugs,
    Vehicle,
    Age,
}

impl ColumnRole {
    pub const ALL: [ColumnRole; 11] = [
        ColumnRole::Date,
        ColumnRole::Time,
        ColumnRole::Country,
        ColumnRole::Gender,
        ColumnRole::Race,
        ColumnRole::Violation,
        ColumnRole::Search,
        ColumnRole::Arrest,
        ColumnRole::Drugs,
        ColumnRole::Vehicle,
        ColumnRole::Age,
    ];

    /// Key used in the `[columns]` table of config.toml.
    pub fn key(&self) -> &'static str {
        match self {
            ColumnRole::Date => "date",
            ColumnRole::Time => "time",
            ColumnRole::Country => "country",
            ColumnRole::Gender => "gender",
            ColumnRole::Race => "race",
            ColumnRole::Violation => "violation",
            ColumnRole::Search => "search",
            ColumnRole::Arrest => "arrest",
            ColumnRole::Drugs => "drugs",
            ColumnRole::Vehicle => "vehicle",
            ColumnRole::Age => "age",
        }
    }

    /// Human label for informational messages.
    pub fn label(&self) -> &'static str {
        match self {
            ColumnRole::Date => "date",
            ColumnRole::Time => "time",
            ColumnRole::Country => "country",
            ColumnRole::Gender => "gender",
            ColumnRole::Race => "race",
            ColumnRole::Violation => "violation",
            ColumnRole::Search => "search",
            ColumnRole::Arrest => "arrest",
            ColumnRole::Drugs => "drug-related",
            ColumnRole::Vehicle => "vehicle",
            ColumnRole::Age => "age",
        }
    }
}

impl fmt::Display for ColumnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// `[columns]` block from config.toml: logical role -> physical column name.
/// An empty string means the role is not configured.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ColumnsConfig {
    pub date: String,
    pub time: String,
    pub country: String,
    pub gender: String,
    pub race: String,
    pub violation: String,
    pub search: String,
    pub arrest: String,
    pub drugs: String,
    pub vehicle: String,
    pub age: String,
}

impl Default for ColumnsConfig {
    fn default() -> Self {
        ColumnsConfig {
            date: "stop_date".into(),
            time: "stop_time".into(),
            country: "country_name".into(),
            gender: "driver_gender".into(),
            race: "driver_race".into(),
            violation: "violation".into(),
            search: "search_conducted".into(),
            arrest: "is_arrested".into(),
            drugs: "drugs_related_stop".into(),
            vehicle: "vehicle_number".into(),
            age: "driver_age".into(),
        }
    }
}

impl ColumnsConfig {
    fn raw(&self, role: ColumnRole) -> &str {
        match role {
            ColumnRole::Date => &self.date,
            ColumnRole::Time => &self.time,
            ColumnRole::Country => &self.country,
            ColumnRole::Gender => &self.gender,
            ColumnRole::Race => &self.race,
            ColumnRole::Violation => &self.violation,
            ColumnRole::Search => &self.search,
            ColumnRole::Arrest => &self.arrest,
            ColumnRole::Drugs => &self.drugs,
            ColumnRole::Vehicle => &self.vehicle,
            ColumnRole::Age => &self.age,
        }
    }

    /// Validate every configured name as an identifier.
    pub fn resolve(&self) -> Result<Columns, Error> {
        let mut columns = Columns::default();
        for role in ColumnRole::ALL {
            let raw = self.raw(role).trim();
            if raw.is_empty() {
                continue;
            }
            *columns.slot_mut(role) = Some(Ident::parse(role.key(), raw)?);
        }
        Ok(columns)
    }
}

/// Validated column mapping. `None` means the role is not configured.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Columns {
    pub date: Option<Ident>,
    pub time: Option<Ident>,
    pub country: Option<Ident>,
    pub gender: Option<Ident>,
    pub race: Option<Ident>,
    pub violation: Option<Ident>,
    pub search: Option<Ident>,
    pub arrest: Option<Ident>,
    pub drugs: Option<Ident>,
    pub vehicle: Option<Ident>,
    pub age: Option<Ident>,
}

impl Columns {
    pub fn get(&self, role: ColumnRole) -> Option<&Ident> {
        match role {
            ColumnRole::Date => self.date.as_ref(),
            ColumnRole::Time => self.time.as_ref(),
            ColumnRole::Country => self.country.as_ref(),
            ColumnRole::Gender => self.gender.as_ref(),
            ColumnRole::Race => self.race.as_ref(),
            ColumnRole::Violation => self.violation.as_ref(),
            ColumnRole::Search => self.search.as_ref(),
            ColumnRole::Arrest => self.arrest.as_ref(),
            ColumnRole::Drugs => self.drugs.as_ref(),
            ColumnRole::Vehicle => self.vehicle.as_ref(),
            ColumnRole::Age => self.age.as_ref(),
        }
    }

    fn slot_mut(&mut self, role: ColumnRole) -> &mut Option<Ident> {
        match role {
            ColumnRole::Date => &mut self.date,
            ColumnRole::Time => &mut self.time,
            ColumnRole::Country => &mut self.country,
            ColumnRole::Gender => &mut self.gender,
            ColumnRole::Race => &mut self.race,
            ColumnRole::Violation => &mut self.violation,
            ColumnRole::Search => &mut self.search,
            ColumnRole::Arrest => &mut self.arrest,
            ColumnRole::Drugs => &mut self.drugs,
            ColumnRole::Vehicle => &mut self.vehicle,
            ColumnRole::Age => &mut self.age,
        }
    }

    /// Every configured (role, column) pair.
    pub fn configured(&self) -> impl Iterator<Item = (ColumnRole, &Ident)> {
        ColumnRole::ALL
            .into_iter()
            .filter_map(move |role| self.get(role).map(|col| (role, col)))
    }

    /// Look up all `roles`, or report the ones that are not configured.
    pub fn require<const N: usize>(
        &self,
        roles: [ColumnRole; N],
    ) -> std::result::Result<[&Ident; N], Vec<ColumnRole>> {
        let mut found = Vec::with_capacity(N);
        let mut missing = Vec::new();
        for role in roles {
            match self.get(role) {
                Some(col) => found.push(col),
                None => missing.push(role),
            }
        }
        found.try_into().map_err(|_| missing)
    }
}

/// `[cache]` block.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct CacheConfig {
    /// Seconds a query result stays valid. 0 disables caching.
    pub ttl_secs: u64,
    /// Most results kept at once; 0 falls back to the default.
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            ttl_secs: 600,
            max_entries: DEFAULT_MAX_ENTRIES.get(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn capacity(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.max_entries).unwrap_or(DEFAULT_MAX_ENTRIES)
    }
}

/// Top-level config file structure.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct DashboardConfig {
    /// Path to the stops database (overridden by --db / STOPDASH_DB).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<PathBuf>,
    pub table: String,
    pub columns: ColumnsConfig,
    pub cache: CacheConfig,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        DashboardConfig {
            database: None,
            table: "police".into(),
            columns: ColumnsConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

/// Validated identifiers for the stops table and its columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    pub table: Ident,
    pub columns: Columns,
}

impl DashboardConfig {
    /// Load config from ~/.stopdash/config.toml. Returns default if file doesn't exist.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path()?)
    }

    /// Load config from an explicit path. Returns default if file doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(DashboardConfig::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        Self::parse(&content, path)
    }

    fn parse(content: &str, path: &Path) -> Result<Self> {
        let config = toml::from_str(content).map_err(|e| Error::ConfigParse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Ok(config)
    }

    /// Validate the table and column names as identifiers.
    pub fn schema(&self) -> Result<Schema, Error> {
        Ok(Schema {
            table: Ident::parse("table", self.table.trim())?,
            columns: self.columns.resolve()?,
        })
    }

    /// Effective config rendered back as TOML.
    pub fn display(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// Path to the config file: ~/.stopdash/config.toml
pub fn config_path() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".stopdash").join("config.toml"))
}

/// Default config template content.
pub fn default_config_template() -> &'static str {
    r#"# ~/.stopdash/config.toml
# Database resolution order: --db flag > STOPDASH_DB env var > database key

# database = "/path/to/traffic_stops.db"
table = "police"

# Physical column for each logical role. Set a role to "" to disable the
# filters and reports that need it.
[columns]
date = "stop_date"
time = "stop_time"
country = "country_name"
gender = "driver_gender"
race = "driver_race"
violation = "violation"
search = "search_conducted"
arrest = "is_arrested"
drugs = "drugs_related_stop"
vehicle = "vehicle_number"
age = "driver_age"

[cache]
# Seconds a query result is reused within one process. 0 disables caching.
ttl_secs = 600
# Most results kept at once; the least recently used is dropped first.
max_entries = 256
"#
}

/// Create the config file if it doesn't already exist.
pub fn init_config(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, default_config_template())?;
    Ok(true)
}
