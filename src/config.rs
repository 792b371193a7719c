use std::env;
use std::fmt::Display;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::error::{configuration_error, Error};

#[derive(Clone, Debug)]
pub struct Config {
    /// Postgres connection string. The in-memory store is used when unset.
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub listen_addr: SocketAddr,
}

impl Config {
    pub fn from_env() -> Result<Self, Error> {
        if dotenv::dotenv().is_err() {
            tracing::debug!("no .env file found, reading the process environment only");
        }

        Ok(Self {
            database_url: var("DATABASE_URL")?,
            max_connections: try_load("DATABASE_MAX_CONNECTIONS", "5")?,
            listen_addr: try_load("LISTEN_ADDR", "127.0.0.1:3000")?,
        })
    }
}

fn var(key: &str) -> Result<Option<String>, Error> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => Ok(Some(value)),
        Ok(_) | Err(env::VarError::NotPresent) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T, Error>
where
    T::Err: Display,
{
    let value = var(key)?.unwrap_or_else(|| {
        tracing::info!("{key} not set, using default: {default}");
        default.to_string()
    });

    value
        .parse()
        .map_err(|err| configuration_error(format!("invalid {key} value {value:?}: {err}")))
}

#[test]
fn try_load_default_test() {
    let port: u32 = try_load("HAILER_TEST_UNSET_VARIABLE", "42").unwrap();
    assert_eq!(port, 42);

    let addr: Result<SocketAddr, _> = try_load("HAILER_TEST_UNSET_VARIABLE", "not an address");
    assert_eq!(addr.unwrap_err().code, 4);
}
