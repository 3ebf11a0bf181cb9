use std::{net::SocketAddr, path::PathBuf};

use crate::error::StartupError;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_MODEL_PATH: &str = "models/gradient_boosting_model.json";

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub model_path: PathBuf,
    pub meta_path: Option<PathBuf>,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, StartupError> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, StartupError> {
        let bind = get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let mut bind_addr: SocketAddr = bind
            .parse()
            .map_err(|e| StartupError::Config(format!("BIND_ADDR {:?}: {}", bind, e)))?;

        if let Some(port) = get("PORT") {
            let port: u16 = port
                .parse()
                .map_err(|e| StartupError::Config(format!("PORT {:?}: {}", port, e)))?;
            bind_addr.set_port(port);
        }

        Ok(Self {
            bind_addr,
            model_path: get("MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_PATH)),
            meta_path: get("META_PATH").map(PathBuf::from),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |k: &str| map.get(k).cloned()
    }

    #[test]
    fn defaults() {
        let cfg = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg.bind_addr, "0.0.0.0:8080".parse::<SocketAddr>().unwrap());
        assert_eq!(cfg.model_path, PathBuf::from(DEFAULT_MODEL_PATH));
        assert_eq!(cfg.meta_path, None);
    }

    #[test]
    fn port_overrides_bind_port() {
        let cfg = ServerConfig::from_lookup(lookup(&[("BIND_ADDR", "127.0.0.1:9000"), ("PORT", "5000")])).unwrap();
        assert_eq!(cfg.bind_addr, "127.0.0.1:5000".parse::<SocketAddr>().unwrap());
    }

    #[test]
    fn bad_port_is_a_config_error() {
        let err = ServerConfig::from_lookup(lookup(&[("PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, StartupError::Config(_)));
    }
}
