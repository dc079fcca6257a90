use color_eyre::eyre::Context;
use tsl_trust::{config::Config, setup, telemetry, tsl::TrustEvaluator};

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();
    telemetry::init_tracing();

    // Load configuration
    let config = Config::load()?;
    tracing::info!("Loaded configuration: {:?}", config);

    let service = setup::setup(&config).await?;
    let services = service
        .parse(config.tsl.timeout())
        .await
        .wrap_err("Failed to load trusted lists")?;
    tracing::info!("{} trusted service(s) available", services.len());

    // Remaining arguments are certificate files of one chain, leaf first
    let chain_paths: Vec<String> = std::env::args().skip(1).collect();
    if chain_paths.is_empty() {
        return Ok(());
    }

    let chain = setup::load_certificates(&chain_paths).await?;
    match TrustEvaluator::new(&services).validate(&chain) {
        Ok(()) => {
            println!("trusted: {}", chain[0]);
            Ok(())
        }
        Err(e) => {
            println!("not trusted: {e}");
            std::process::exit(1);
        }
    }
}
