use std::env;
use std::path::Path;
use std::sync::Arc;

use deal_pricer::config;
use deal_pricer::error::{kind_of, PricerError};
use deal_pricer::domain::deal::Deal;
use deal_pricer::infrastructure::file_system::read_json;
use deal_pricer::initialization::{build_deal_evaluator, initialize_pricer};

use anyhow::{bail, Result};

const USAGE: &str = "Usage:\n  deal-pricer estimate <product description>\n  deal-pricer deals <deals.json>";

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let (command, rest) = match args.split_first() {
        Some((command, rest)) if !rest.is_empty() => (command.as_str(), rest),
        _ => {
            eprintln!("{}", USAGE);
            std::process::exit(2);
        }
    };

    let config = config::load_config()?;
    log::debug!("Configuration loaded: {:?}", config);
    let pricer = initialize_pricer(Arc::new(config)).await?;

    match command {
        "estimate" => {
            let description = rest.join(" ");
            match pricer.ensemble.estimate(&description).await {
                Ok(price) => println!("{:.2}", price),
                Err(e) => {
                    if let Some(PricerError::NoPriceFound { response }) = kind_of(&e) {
                        log::error!("The model answered without a usable price: {:?}", response);
                    }
                    return Err(e);
                }
            }
        }
        "deals" => {
            let deals: Vec<Deal> = read_json(Path::new(&rest[0]))?;
            log::info!("Evaluating {} deals", deals.len());
            let evaluator = build_deal_evaluator(&pricer)?;
            let picks = evaluator.notify_best(deals).await?;
            println!("{}", serde_json::to_string_pretty(&picks)?);
        }
        other => bail!("Unknown command '{}'\n{}", other, USAGE),
    }
    Ok(())
}
