use std::env;

use car_rental::{AppState, Config, RentalError};
use log::info;
use serde_json::json;

const USAGE: &str = "usage: car_rental [summary|cars|available|customers|leases]";

#[tokio::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let command = env::args().nth(1).unwrap_or_else(|| "summary".to_owned());
    let config = Config::from_env();
    let state = AppState::connect(&config).await?;

    let report = match command.as_str() {
        "cars" => serde_json::to_value(state.cars().get_all_cars().await?),
        "available" => serde_json::to_value(state.cars().get_available_cars().await?),
        "customers" => serde_json::to_value(state.customers().get_all_customers().await?),
        "leases" => serde_json::to_value(state.leases().get_all_leases().await?),
        "summary" => {
            let cars = state.cars().get_all_cars().await?;
            let borrowed = cars.iter().filter(|car| car.is_borrowed).count();
            let customers = state.customers().get_all_customers().await?;
            let leases = state.leases().get_all_leases().await?;
            Ok(json!({
                "cars": cars.len(),
                "borrowed_cars": borrowed,
                "customers": customers.len(),
                "leases": leases.len(),
                "open_leases": leases.iter().filter(|lease| lease.is_open()).count(),
            }))
        }
        other => {
            log::error!("Unknown command {:?}", other);
            eprintln!("{USAGE}");
            std::process::exit(2);
        }
    }
    .map_err(RentalError::from)?;

    info!("Printing {} from {}", command, config.database_url);
    let rendered = serde_json::to_string_pretty(&report).map_err(RentalError::from)?;
    println!("{rendered}");
    Ok(())
}
