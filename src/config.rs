use std::env;

use anyhow::{Context, bail};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub store_backend: StoreBackend,
    pub database_url: Option<String>,
    pub bind_addr: String,
    pub db_max_connections: u32,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let store_backend = match lookup("STORE_BACKEND")
            .map(|s| s.trim().to_lowercase())
            .as_deref()
        {
            None | Some("") | Some("postgres") => StoreBackend::Postgres,
            Some("memory") => StoreBackend::Memory,
            Some(other) => bail!("STORE_BACKEND must be postgres or memory, got {other:?}"),
        };

        let database_url = lookup("DATABASE_URL").filter(|s| !s.trim().is_empty());
        if store_backend == StoreBackend::Postgres && database_url.is_none() {
            bail!("DATABASE_URL is required when STORE_BACKEND=postgres");
        }

        let bind_addr = lookup("BIND_ADDR").unwrap_or_else(|| "127.0.0.1:8080".to_string());
        let db_max_connections = match lookup("DB_MAX_CONNECTIONS") {
            Some(s) => s
                .trim()
                .parse::<u32>()
                .with_context(|| format!("DB_MAX_CONNECTIONS is not a number: {s:?}"))?,
            None => 5,
        };

        Ok(Self {
            store_backend,
            database_url,
            bind_addr,
            db_max_connections,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn postgres_is_default_and_needs_database_url() {
        assert!(load(&[]).is_err());

        let cfg = load(&[("DATABASE_URL", "postgres://localhost/hms")]).unwrap();
        assert_eq!(cfg.store_backend, StoreBackend::Postgres);
        assert_eq!(cfg.bind_addr, "127.0.0.1:8080");
        assert_eq!(cfg.db_max_connections, 5);
    }

    #[test]
    fn memory_backend_runs_without_database() {
        let cfg = load(&[("STORE_BACKEND", "Memory"), ("BIND_ADDR", "0.0.0.0:9000")]).unwrap();
        assert_eq!(cfg.store_backend, StoreBackend::Memory);
        assert!(cfg.database_url.is_none());
        assert_eq!(cfg.bind_addr, "0.0.0.0:9000");
    }

    #[test]
    fn bad_values_fail_startup() {
        assert!(load(&[("STORE_BACKEND", "json-file")]).is_err());
        assert!(load(&[("STORE_BACKEND", "memory"), ("DB_MAX_CONNECTIONS", "lots")]).is_err());
    }
}
