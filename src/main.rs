use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use weatherly_core::Config;
use weatherly_weather::{ErrorKind, SessionState, SuggestionOutcome, WeatherSession};

mod app;

use app::App;

#[derive(Parser)]
#[command(name = "weatherly")]
#[command(about = "Weather lookups that keep working offline", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show current weather and forecast for a city
    Weather {
        /// City name; multiple words are joined with spaces
        #[arg(required = true)]
        city: Vec<String>,
    },
    /// Look a city up, then pull it again as a refresh
    Refresh {
        #[arg(required = true)]
        city: Vec<String>,
    },
    /// Suggest cities matching a prefix
    Suggest {
        #[arg(required = true)]
        prefix: Vec<String>,
    },
    /// List recently viewed cities, most recent first
    Recent,
}

#[tokio::main]
async fn main() -> Result<()> {
    weatherly_core::init()?;
    let cli = Cli::parse();

    let (config, _) = match Config::load_validated() {
        Ok(loaded) => loaded,
        Err(e) => {
            tracing::error!("Failed to load config: {}", e);
            eprintln!("{}", e.user_message());
            return Err(e.into());
        }
    };
    let app = match App::new(config) {
        Ok(app) => app,
        Err(e) => {
            tracing::error!("Failed to start: {}", e);
            eprintln!("{}", e.user_message());
            return Err(e.into());
        }
    };
    tracing::debug!("Using config directory {}", app.config().config_dir.display());

    match cli.command {
        Commands::Weather { city } => {
            let session = app.new_session();
            watch_session(session, |s| async move { s.request(&city.join(" ")).await }).await;
        }
        Commands::Refresh { city } => {
            let session = app.new_session();
            watch_session(session, |s| async move {
                s.request(&city.join(" ")).await;
                s.refresh().await
            })
            .await;
        }
        Commands::Suggest { prefix } => {
            let prefix = prefix.join(" ");
            match app.suggester().lookup(&prefix).run().await {
                SuggestionOutcome::Cities(cities) if cities.is_empty() => {
                    println!("No matching cities");
                }
                SuggestionOutcome::Cities(cities) => {
                    for city in cities {
                        println!("{}, {} ({})", city.city, city.country, city.country_code);
                    }
                }
                SuggestionOutcome::TooShort => println!("Type at least a couple of letters"),
                SuggestionOutcome::Offline => println!("City search needs a connection"),
                SuggestionOutcome::Cancelled => {}
            }
        }
        Commands::Recent => {
            let cities = app.recent_cities();
            if cities.is_empty() {
                println!("No recent cities");
            }
            for city in cities {
                println!("{}", city);
            }
        }
    }

    Ok(())
}

/// Print every transition `session` accepts while `drive` runs.
async fn watch_session<F, Fut>(session: WeatherSession, drive: F)
where
    F: FnOnce(Arc<WeatherSession>) -> Fut,
    Fut: Future<Output = Option<SessionState>>,
{
    session.observe(print_state);
    drive(Arc::new(session)).await;
}

fn print_state(state: &SessionState) {
    match state {
        SessionState::Idle => {}
        SessionState::Loading { city, refreshing } => {
            if *refreshing {
                println!("Refreshing {}...", city);
            } else {
                println!("Loading {}...", city);
            }
        }
        SessionState::Ready {
            payload,
            served_from_cache,
            ..
        } => {
            if *served_from_cache {
                println!("Offline: showing saved weather");
            }
            let now = &payload.current_conditions;
            println!("{}", payload.resolved_address);
            println!(
                "  {:.1}°  {} ({})",
                now.temp,
                now.conditions,
                now.condition().description()
            );
            println!(
                "  Humidity {:.0}%  Wind {:.1}  Visibility {:.1}  UV {:.0}",
                now.humidity, now.windspeed, now.visibility, now.uvindex
            );
            for day in payload.days.iter().take(7) {
                println!(
                    "  {}  {:.1}°  {}",
                    day.datetime.format("%a %d %b"),
                    day.temp,
                    day.condition().description()
                );
            }
        }
        SessionState::Error { city, kind } => println!("{}", error_text(city, kind)),
    }
}

fn error_text(city: &str, kind: &ErrorKind) -> String {
    if kind.is_retryable() {
        format!(
            "{}\nRun `weatherly refresh {}` to try again.",
            kind.user_message(),
            city
        )
    } else {
        kind.user_message().to_string()
    }
}
