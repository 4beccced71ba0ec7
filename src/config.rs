use std::env;
use std::time::Duration;

const DEFAULT_DATABASE_URL: &str = "sqlite://car_rental.db";

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
    pub busy_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: 5,
            busy_timeout: Duration::from_secs(5),
        }
    }
}

impl Config {
    /// Reads `DATABASE_URL`, `DATABASE_MAX_CONNECTIONS` and
    /// `DATABASE_BUSY_TIMEOUT_SECS`, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Config::default();
        Config {
            database_url: env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_connections),
            busy_timeout: env::var("DATABASE_BUSY_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.busy_timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_local_file() {
        let config = Config::default();
        assert_eq!(config.database_url, "sqlite://car_rental.db");
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.busy_timeout, Duration::from_secs(5));
    }
}
