use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use nutri_x_client::{
    ApiClient, AppConfig, ConfigOverrides, MealSlot, SessionState, SqliteStore, image_form,
    models::{EvaluateReply, IdentifyReply, RecommendReply},
};

#[derive(Parser)]
#[command(name = "nutri-x")]
#[command(
    about = "Command-line client for the Nutri-X recipe and nutrition service",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Backend base URL (overrides NUTRIX_API_BASE)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Request timeout in seconds (overrides NUTRIX_TIMEOUT_SECS)
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Storage database path (overrides NUTRIX_STORAGE)
    #[arg(long, global = true)]
    storage: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the stored API key
    Key {
        #[command(subcommand)]
        action: KeyAction,
    },

    /// Identify ingredients in a photo
    Identify {
        image: PathBuf,
    },

    /// Recommend recipes for a set of ingredients
    Recommend {
        #[arg(required = true)]
        ingredients: Vec<String>,

        /// User profile as a JSON object
        #[arg(long)]
        profile: Option<String>,
    },

    /// Evaluate a day's meal plan
    Evaluate {
        #[arg(long, value_delimiter = ',')]
        breakfast: Vec<String>,

        #[arg(long, value_delimiter = ',')]
        lunch: Vec<String>,

        #[arg(long, value_delimiter = ',')]
        dinner: Vec<String>,
    },
}

#[derive(Subcommand)]
enum KeyAction {
    Set { key: String },
    Show,
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = AppConfig::load().context("failed to load configuration")?;
    config.apply_overrides(&ConfigOverrides {
        api_base: cli.base_url,
        timeout_secs: cli.timeout,
        storage_path: cli.storage,
    })?;
    tracing::debug!(
        api_base = %config.api_base,
        storage = %config.storage_path.display(),
        "configuration loaded"
    );

    let storage = SqliteStore::open(&config.storage_path)?;
    let mut state = SessionState::new(Box::new(storage))?;
    let api = ApiClient::new(&config).context("failed to build HTTP client")?;

    match cli.command {
        Commands::Key { action } => match action {
            KeyAction::Set { key } => {
                state.set_api_key(key.trim())?;
                tracing::info!("API key saved");
            }
            KeyAction::Show => println!("{}", mask(state.api_key())),
            KeyAction::Clear => {
                state.set_api_key("")?;
                tracing::info!("API key cleared");
            }
        },
        Commands::Identify { image } => {
            let bytes = tokio::fs::read(&image)
                .await
                .with_context(|| format!("failed to read image '{}'", image.display()))?;
            let file_name = image
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "upload".to_string());

            let reply: IdentifyReply = api
                .identify_ingredients(&state, image_form(file_name, bytes))
                .await?
                .json()
                .await?;
            state.apply_identification(reply.into_result()?);

            for item in &state.items_with_loc {
                let marker = if item.is_food { "" } else { " (not food)" };
                println!("{}{}", item.name, marker);
            }
            println!("{}", serde_json::to_string_pretty(&state.nutrition_data)?);
        }
        Commands::Recommend { ingredients, profile } => {
            let profile = profile
                .map(|raw| {
                    serde_json::from_str::<serde_json::Value>(&raw)
                        .context("--profile is not valid JSON")
                })
                .transpose()?;
            state.set_selected_ingredients(ingredients);

            let reply: RecommendReply = api
                .recommend_recipes(&state, &state.selected_ingredients, profile)
                .await?
                .json()
                .await?;
            state.set_recommendations(reply.into_result()?);
            println!("{}", serde_json::to_string_pretty(&state.recommendations)?);
        }
        Commands::Evaluate { breakfast, lunch, dinner } => {
            for (slot, dishes) in MealSlot::ALL.into_iter().zip([breakfast, lunch, dinner]) {
                for dish in dishes {
                    state.add_to_meal_plan(slot, dish.trim());
                }
            }
            if state.meal_plan().is_empty() {
                anyhow::bail!("meal plan is empty; pass --breakfast, --lunch or --dinner");
            }

            let reply: EvaluateReply = api
                .evaluate_meal_plan(&state, state.meal_plan())
                .await?
                .json()
                .await?;
            println!("{}", reply.into_result()?);
        }
    }

    Ok(())
}

fn mask(key: &str) -> String {
    if key.is_empty() {
        return "(not set)".to_string();
    }
    let visible: String = key.chars().take(4).collect();
    format!("{visible}****")
}
