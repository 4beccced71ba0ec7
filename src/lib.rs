//! Record keeping for a small car rental: cars, customers and the leases that
//! tie them together, stored in SQLite.

pub mod cars;
pub mod config;
pub mod customers;
pub mod db;
pub mod errors;
pub mod leases;
pub mod structs;
pub mod utils;

use sqlx::SqlitePool;

pub use cars::CarManager;
pub use config::Config;
pub use customers::CustomerManager;
pub use errors::{RentalError, Result};
pub use leases::LeaseManager;
pub use structs::{Car, Customer, Lease};

/// Shared handle to the database. The managers are cheap to build from it.
#[derive(Debug, Clone)]
pub struct AppState {
    pub db_pool: SqlitePool,
}

impl AppState {
    pub async fn connect(config: &Config) -> Result<Self> {
        let db_pool = db::connect(config).await?;
        db::migrate(&db_pool).await?;
        Ok(Self { db_pool })
    }

    pub fn cars(&self) -> CarManager {
        CarManager::new(self.db_pool.clone())
    }

    pub fn customers(&self) -> CustomerManager {
        CustomerManager::new(self.db_pool.clone())
    }

    pub fn leases(&self) -> LeaseManager {
        LeaseManager::new(self.db_pool.clone())
    }
}
