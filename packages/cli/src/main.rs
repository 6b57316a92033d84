#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line entry point for the crime dashboard toolchain.
//!
//! Each pipeline stage and view has its own subcommand; without one the
//! tool opens an interactive menu. Paths come from an optional TOML config
//! (`--config`), overridden by flags and `CRIME_DASH_DB`.
//!
//! Uses `indicatif-log-bridge` (via [`crime_dash_cli_utils::init_logger`])
//! so log lines and progress bars never fight for the terminal.

mod commands;
mod interactive;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use crime_dash_analytics_models::{FilterError, TimeFilter, View};
use crime_dash_forecast::ArimaOrder;
use crime_dash_ingest_models::{ConfigError, PipelineConfig};

#[derive(Parser)]
#[command(name = "crime_dash", about = "Chicago crime data pipeline and dashboard views")]
struct Cli {
    /// Pipeline config file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Store file, overriding the config
    #[arg(long, global = true, env = "CRIME_DASH_DB")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize raw exports into one canonical CSV file
    Normalize {
        /// Raw export to read; repeat for several (overrides the config)
        #[arg(long = "input")]
        inputs: Vec<PathBuf>,
        /// Where to write the canonical file (overrides the config)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Concatenate raw exports under the first file's header, unchanged
    Concat {
        /// Raw export to read; repeat for several
        #[arg(long = "input", required = true)]
        inputs: Vec<PathBuf>,
        /// Where to write the combined file
        #[arg(long)]
        output: PathBuf,
    },
    /// Create the incidents table
    Provision {
        /// Drop and recreate an existing table
        #[arg(long)]
        recreate: bool,
    },
    /// Append a canonical CSV file to the store
    Load {
        /// Canonical file to load (defaults to the normalized output)
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Normalize, provision, and load in one go
    Run {
        /// Drop and recreate the incidents table before loading
        #[arg(long)]
        recreate: bool,
    },
    /// Print a view as JSON
    View {
        /// View name, e.g. `time-trend` or `detailed-stats`
        #[arg(value_parser = parse_view)]
        name: View,
        #[command(flatten)]
        filter: FilterArgs,
        #[command(flatten)]
        order: OrderArgs,
    },
    /// Print the monthly ARIMA forecast as JSON
    Forecast {
        #[command(flatten)]
        filter: FilterArgs,
        #[command(flatten)]
        order: OrderArgs,
    },
    /// Print the first stored incidents as JSON
    Sample {
        /// Number of incidents
        #[arg(long, default_value = "10")]
        limit: u32,
    },
    /// Serve the views over HTTP (`BIND_ADDR`, `PORT`)
    Serve,
}

/// Time filter flags shared by the view subcommands.
#[derive(Args, Debug, Default)]
struct FilterArgs {
    /// Single year
    #[arg(long)]
    year: Option<i32>,
    /// First year of a range
    #[arg(long)]
    year_from: Option<i32>,
    /// Last year of a range
    #[arg(long)]
    year_to: Option<i32>,
    /// Month (1-12)
    #[arg(long)]
    month: Option<u8>,
}

impl FilterArgs {
    fn to_filter(&self) -> Result<TimeFilter, FilterError> {
        TimeFilter::from_parts(self.year, self.year_from, self.year_to, self.month)
    }
}

/// ARIMA order flags.
#[derive(Args, Debug)]
struct OrderArgs {
    /// Autoregressive order
    #[arg(short, default_value = "1")]
    p: u8,
    /// Differencing order
    #[arg(short, default_value = "1")]
    d: u8,
    /// Moving-average order
    #[arg(short, default_value = "1")]
    q: u8,
}

impl OrderArgs {
    const fn to_order(&self) -> ArimaOrder {
        ArimaOrder {
            p: self.p,
            d: self.d,
            q: self.q,
        }
    }
}

fn parse_view(s: &str) -> Result<View, String> {
    s.parse().map_err(|_| {
        let names: Vec<String> = <View as strum::IntoEnumIterator>::iter()
            .map(|v| v.to_string())
            .collect();
        format!("unknown view {s:?}; expected one of {}", names.join(", "))
    })
}

/// Loads the config file when given, then applies the store override.
fn resolve_config(
    config_path: Option<&std::path::Path>,
    db: Option<PathBuf>,
) -> Result<PipelineConfig, ConfigError> {
    let mut config = match config_path {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(db) = db {
        config.store_path = db;
    }
    Ok(config)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = crime_dash_cli_utils::init_logger();
    let cli = Cli::parse();

    let mut config = resolve_config(cli.config.as_deref(), cli.db)?;
    log::debug!("Using {config:?}");

    let Some(command) = cli.command else {
        return interactive::run(&mut config, &multi);
    };

    match command {
        Commands::Normalize { inputs, output } => {
            if !inputs.is_empty() {
                config.inputs = inputs;
            }
            if let Some(output) = output {
                config.normalized_output = output;
            }
            commands::normalize(&config, &multi)
        }
        Commands::Concat { inputs, output } => commands::concat(&inputs, &output, &multi),
        Commands::Provision { recreate } => commands::provision(&config, recreate),
        Commands::Load { input } => {
            let input = input.unwrap_or_else(|| config.normalized_output.clone());
            commands::load(&config, &input, &multi)
        }
        Commands::Run { recreate } => commands::run(&config, recreate, &multi),
        Commands::View {
            name,
            filter,
            order,
        } => commands::view(&config, name, &filter.to_filter()?, order.to_order()),
        Commands::Forecast { filter, order } => commands::view(
            &config,
            View::Forecast,
            &filter.to_filter()?,
            order.to_order(),
        ),
        Commands::Sample { limit } => commands::sample(&config, limit),
        Commands::Serve => commands::serve(&config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory as _;
    use crime_dash_analytics_models::YearFilter;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_view_with_filters() {
        let cli = Cli::try_parse_from([
            "crime_dash",
            "view",
            "type-arrests",
            "--year-from",
            "2008",
            "--year-to",
            "2010",
        ])
        .unwrap();

        let Some(Commands::View { name, filter, .. }) = cli.command else {
            panic!("expected view command");
        };
        assert_eq!(name, View::TypeArrests);
        assert_eq!(
            filter.to_filter().unwrap().years,
            YearFilter::Range {
                from: 2008,
                to: 2010
            }
        );
    }

    #[test]
    fn rejects_unknown_view() {
        assert!(Cli::try_parse_from(["crime_dash", "view", "weather"]).is_err());
    }

    #[test]
    fn parses_forecast_order() {
        let cli =
            Cli::try_parse_from(["crime_dash", "forecast", "-p", "2", "-d", "0", "-q", "1"]).unwrap();

        let Some(Commands::Forecast { order, filter }) = cli.command else {
            panic!("expected forecast command");
        };
        assert_eq!(order.to_order(), ArimaOrder { p: 2, d: 0, q: 1 });
        assert_eq!(filter.to_filter().unwrap(), TimeFilter::all());
    }

    #[test]
    fn ambiguous_years_are_rejected() {
        let args = FilterArgs {
            year: Some(2008),
            year_from: Some(2007),
            ..FilterArgs::default()
        };
        assert_eq!(args.to_filter(), Err(FilterError::AmbiguousYears));
    }

    #[test]
    fn db_flag_overrides_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crime_dash.toml");
        std::fs::write(
            &path,
            "store_path = \"from_file.duckdb\"\nnormalized_output = \"n.csv\"\n",
        )
        .unwrap();

        let config = resolve_config(Some(&path), None).unwrap();
        assert_eq!(config.store_path, PathBuf::from("from_file.duckdb"));
        assert_eq!(config.normalized_output, PathBuf::from("n.csv"));

        let config = resolve_config(Some(&path), Some(PathBuf::from("flag.duckdb"))).unwrap();
        assert_eq!(config.store_path, PathBuf::from("flag.duckdb"));
    }

    #[test]
    fn defaults_without_config_file() {
        assert_eq!(resolve_config(None, None).unwrap(), PipelineConfig::default());
    }
}
