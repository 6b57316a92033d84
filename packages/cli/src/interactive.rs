//! Menu-driven mode, used when no subcommand is given.

use std::path::PathBuf;
use std::str::FromStr;

use crime_dash_analytics_models::{TimeFilter, View};
use crime_dash_cli_utils::MultiProgress;
use crime_dash_forecast::ArimaOrder;
use crime_dash_ingest_models::PipelineConfig;
use dialoguer::{Confirm, Input, Select};
use strum::IntoEnumIterator as _;

use crate::commands::{self, CommandResult};

/// Top-level actions.
enum Action {
    RunPipeline,
    Normalize,
    Provision,
    Load,
    View,
    Sample,
    Serve,
}

impl Action {
    const ALL: &[Self] = &[
        Self::RunPipeline,
        Self::Normalize,
        Self::Provision,
        Self::Load,
        Self::View,
        Self::Sample,
        Self::Serve,
    ];

    #[must_use]
    const fn label(&self) -> &'static str {
        match self {
            Self::RunPipeline => "Run full pipeline (normalize, provision, load)",
            Self::Normalize => "Normalize raw exports",
            Self::Provision => "Provision store",
            Self::Load => "Load canonical file",
            Self::View => "Show a view",
            Self::Sample => "Show sample incidents",
            Self::Serve => "Start API server",
        }
    }
}

/// Prompts for an optional value; blank input means `None`.
fn optional<T: FromStr>(prompt: &str) -> Result<Option<T>, Box<dyn std::error::Error>>
where
    T::Err: std::fmt::Display,
{
    let text: String = Input::new()
        .with_prompt(prompt)
        .allow_empty(true)
        .validate_with(|s: &String| -> Result<(), String> {
            if s.trim().is_empty() {
                return Ok(());
            }
            s.trim().parse::<T>().map(|_| ()).map_err(|e| e.to_string())
        })
        .interact_text()?;

    let text = text.trim();
    if text.is_empty() {
        Ok(None)
    } else {
        Ok(Some(text.parse().map_err(|e: T::Err| e.to_string())?))
    }
}

fn prompt_filter() -> Result<TimeFilter, Box<dyn std::error::Error>> {
    loop {
        let year = optional("Year (blank for a range or all years)")?;
        let (year_from, year_to) = if year.is_none() {
            (
                optional("First year (blank for no lower bound)")?,
                optional("Last year (blank for no upper bound)")?,
            )
        } else {
            (None, None)
        };
        let month = optional("Month 1-12 (blank for all)")?;

        match TimeFilter::from_parts(year, year_from, year_to, month) {
            Ok(filter) => return Ok(filter),
            Err(e) => println!("{e}; try again."),
        }
    }
}

fn prompt_order() -> Result<ArimaOrder, Box<dyn std::error::Error>> {
    let default = ArimaOrder::default();
    let p = Input::new().with_prompt("AR order p").default(default.p).interact_text()?;
    let d = Input::new().with_prompt("Differencing d").default(default.d).interact_text()?;
    let q = Input::new().with_prompt("MA order q").default(default.q).interact_text()?;
    Ok(ArimaOrder { p, d, q })
}

fn prompt_path(prompt: &str, default: &std::path::Path) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let text: String = Input::new()
        .with_prompt(prompt)
        .default(default.display().to_string())
        .interact_text()?;
    Ok(PathBuf::from(text))
}

/// Runs the interactive menu.
///
/// # Errors
///
/// Returns an error if a prompt fails or the chosen action fails.
pub fn run(config: &mut PipelineConfig, multi: &MultiProgress) -> CommandResult {
    println!("Crime Dashboard Toolchain");
    println!();

    let labels: Vec<&str> = Action::ALL.iter().map(Action::label).collect();
    let idx = Select::new()
        .with_prompt("What would you like to do?")
        .items(&labels)
        .default(0)
        .interact()?;

    config.store_path = prompt_path("Store file", &config.store_path)?;

    match Action::ALL[idx] {
        Action::RunPipeline => {
            let recreate = Confirm::new()
                .with_prompt("Drop and recreate the incidents table first?")
                .default(false)
                .interact()?;
            commands::run(config, recreate, multi)
        }
        Action::Normalize => {
            config.normalized_output =
                prompt_path("Canonical output file", &config.normalized_output)?;
            commands::normalize(config, multi)
        }
        Action::Provision => {
            let recreate = Confirm::new()
                .with_prompt("Drop and recreate an existing table?")
                .default(false)
                .interact()?;
            commands::provision(config, recreate)
        }
        Action::Load => {
            let input = prompt_path("Canonical file to load", &config.normalized_output)?;
            commands::load(config, &input, multi)
        }
        Action::View => {
            let views: Vec<View> = View::iter().collect();
            let titles: Vec<&str> = views.iter().map(|v| v.title()).collect();
            let choice = Select::new()
                .with_prompt("Which view?")
                .items(&titles)
                .default(0)
                .interact()?;
            let view = views[choice];

            let filter = prompt_filter()?;
            let order = if view == View::Forecast {
                prompt_order()?
            } else {
                ArimaOrder::default()
            };
            commands::view(config, view, &filter, order)
        }
        Action::Sample => {
            let limit: u32 = Input::new()
                .with_prompt("How many incidents?")
                .default(10)
                .interact_text()?;
            commands::sample(config, limit)
        }
        Action::Serve => commands::serve(config),
    }
}
