use recipe_back::build_rocket;
use recipe_back::infra::Config;
use recipe_back::recipes::RecipeService;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[rocket::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Loading configuration...");
    let config = Config::load()?;
    let store = config.open_store()?;
    info!(write_mode = ?config.write_mode, retries = config.conflict_retries, "Store ready");

    let service = RecipeService::new(store, config.write_mode, config.conflict_retries);
    let _rocket = build_rocket(service).launch().await?;

    info!("Server shut down");
    Ok(())
}
