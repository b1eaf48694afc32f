use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::{Path, PathBuf};
use tracing::debug;

use stopdash::config::{self, DashboardConfig};
use stopdash::db::cache::QueryCache;
use stopdash::db::Database;
use stopdash::generator::{self, schema as student_schema};
use stopdash::output::{json as json_out, table};
use stopdash::query::filters::{DateSelection, FilterState};
use stopdash::reports::{Dashboard, Section};

#[derive(Parser)]
#[command(name = "stopdash", version, about = "Traffic-stop dashboard: filtered SQL reports over a stops table")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Path to the stops database (default: ~/.stopdash/traffic_stops.db)
    #[arg(long, global = true, env = "STOPDASH_DB")]
    db: Option<PathBuf>,

    /// Path to config file (default: ~/.stopdash/config.toml)
    #[arg(long, global = true, env = "STOPDASH_CONFIG")]
    config: Option<PathBuf>,

    /// Log queries and cache activity
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show headline metrics and report tables for the selected filters
    Dashboard {
        /// Section to show: vehicle, demographic, time, violation, location, complex, sample
        #[arg(long, value_parser = parse_section, conflicts_with = "all")]
        section: Vec<Section>,

        /// Show every section
        #[arg(long)]
        all: bool,

        /// Date range start (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date)]
        from: Option<NaiveDate>,

        /// Date range end (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date)]
        to: Option<NaiveDate>,

        /// Single day (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date, conflicts_with_all = ["from", "to"])]
        on: Option<NaiveDate>,

        /// Country (repeatable)
        #[arg(long)]
        country: Vec<String>,

        /// Driver gender (repeatable)
        #[arg(long)]
        gender: Vec<String>,

        /// Driver race (repeatable)
        #[arg(long)]
        race: Vec<String>,

        /// Violation (repeatable)
        #[arg(long)]
        violation: Vec<String>,

        /// Only stops where a search was conducted
        #[arg(long)]
        searched: bool,

        /// Only stops that ended in arrest
        #[arg(long)]
        arrested: bool,

        /// Only drug-related stops
        #[arg(long)]
        drugs: bool,
    },

    /// List the values available for each filter
    Options,

    /// Generate synthetic student records into a separate SQLite file
    Seed {
        /// Number of students
        #[arg(long, default_value_t = generator::DEFAULT_COUNT)]
        count: u32,

        /// RNG seed for reproducible output
        #[arg(long)]
        seed: Option<u64>,

        /// Output database
        #[arg(long, default_value = "students.db")]
        out: PathBuf,
    },

    /// Create the student tables without inserting data
    InitTables {
        /// Output database
        #[arg(long, default_value = "students.db")]
        out: PathBuf,
    },

    /// Show the effective config, or write a template
    Config {
        /// Write a default config file if none exists
        #[arg(long)]
        init: bool,
    },
}

fn parse_date(s: &str) -> std::result::Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| format!("expected YYYY-MM-DD: {e}"))
}

fn parse_section(s: &str) -> std::result::Result<Section, String> {
    Section::parse(s).ok_or_else(|| {
        format!("unknown section '{s}' (vehicle, demographic, time, violation, location, complex, sample)")
    })
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let json_output = cli.json;
    let config_path = match cli.config {
        Some(p) => p,
        None => config::config_path()?,
    };

    match cli.command {
        Commands::Dashboard {
            section,
            all,
            from,
            to,
            on,
            country,
            gender,
            race,
            violation,
            searched,
            arrested,
            drugs,
        } => {
            let cfg = DashboardConfig::load_from(&config_path)?;
            let schema = cfg.schema()?;
            let db = open_stops_db(cli.db, &cfg)?;
            db.validate_schema(&schema)?;

            let mut dash = Dashboard::new(&db, &schema, QueryCache::from_config(&cfg.cache));
            let date = match on {
                Some(day) => Some(DateSelection::Single(day)),
                None => dash.date_selection(from, to)?,
            };
            let filters = FilterState {
                date,
                countries: country,
                genders: gender,
                races: race,
                violations: violation,
                only_searched: searched,
                only_arrested: arrested,
                only_drugs: drugs,
            };
            let sections: Vec<Section> = if all {
                Section::ALL.to_vec()
            } else if section.is_empty() {
                vec![Section::Vehicle]
            } else {
                section
            };

            let rendered = dash.render(&filters, &sections)?;
            debug!(stats = ?dash.cache_stats(), "query cache");

            if json_output {
                json_out::print_json(&serde_json::json!({
                    "filters": filters,
                    "where": rendered.where_sql,
                    "params": rendered.params,
                    "kpis": rendered.kpis,
                    "sections": rendered.sections,
                }))?;
            } else {
                table::print_rendered(&rendered);
            }
        }

        Commands::Options => {
            let cfg = DashboardConfig::load_from(&config_path)?;
            let schema = cfg.schema()?;
            let db = open_stops_db(cli.db, &cfg)?;
            db.validate_schema(&schema)?;

            let mut dash = Dashboard::new(&db, &schema, QueryCache::from_config(&cfg.cache));
            let options = dash.options()?;
            if json_output {
                json_out::print_json(&options)?;
            } else {
                table::print_options(&options);
            }
        }

        Commands::Seed { count, seed, out } => {
            let db = open_student_db(&out)?;
            let mut rng = match seed {
                Some(s) => StdRng::seed_from_u64(s),
                None => StdRng::from_entropy(),
            };
            let stats = generator::seed_students(&db, count, &mut rng, Local::now().naive_local())?;
            if json_output {
                json_out::print_json(&serde_json::json!({
                    "database": out.display().to_string(),
                    "students": stats.students,
                    "placed": stats.placed,
                }))?;
            } else {
                table::print_seed_stats(&stats, &out);
            }
        }

        Commands::InitTables { out } => {
            open_student_db(&out)?;
            if json_output {
                json_out::print_json(&serde_json::json!({
                    "database": out.display().to_string(),
                    "tables": student_schema::TABLES,
                }))?;
            } else {
                println!("Tables ready in {}: {}", out.display(), student_schema::TABLES.join(", "));
            }
        }

        Commands::Config { init } => {
            if init {
                if config::init_config(&config_path)? {
                    println!("Created config: {}", config_path.display());
                } else {
                    println!("Config already exists: {}", config_path.display());
                }
                return Ok(());
            }

            let cfg = DashboardConfig::load_from(&config_path)?;
            if json_output {
                json_out::print_json(&cfg)?;
            } else {
                println!("# {}", config_path.display());
                print!("{}", cfg.display()?);
            }
        }
    }

    Ok(())
}

/// Resolve the stops database (--db / STOPDASH_DB > config > default) and open it read-only.
fn open_stops_db(flag: Option<PathBuf>, cfg: &DashboardConfig) -> Result<Database> {
    let path = match flag.or_else(|| cfg.database.clone()) {
        Some(p) => p,
        None => Database::default_db_path()?,
    };
    if !path.exists() {
        bail!("Database not found: {}", path.display());
    }
    Database::open_read_only(&path)
}

fn open_student_db(path: &Path) -> Result<Database> {
    let db = Database::open(path)?;
    student_schema::create_tables(&db.conn)
        .with_context(|| format!("Failed to prepare {}", path.display()))?;
    Ok(db)
}
