//! Structured-path configuration, read once from the environment.

use std::sync::OnceLock;

use crate::{Error, Result};

/// Options controlling the structured (semantics-service) path.
///
/// Parsed from the environment on first access and never mutated
/// afterwards. A parse failure surfaces as [`Error::Environment`]
/// before any lifting starts.
#[derive(Debug, Clone)]
pub struct Config {
    /// Disable the structured path entirely when false (`ASLP`).
    pub enable: bool,
    /// Emit a trace of structured lowering (`ASLP_DEBUG`).
    pub debug: bool,
    /// Abort on the first unknown encoding instead of falling back to
    /// the classic catalog (`ASLP_FAIL_MISSING`).
    pub fail_if_missing: bool,
    /// Request vector-enabled semantics from the backend (`ASLP_VECTORS`).
    pub vectors: bool,
    /// Additional opcode ids routed straight to classic (`ASLP_BANNED`).
    pub banned: Vec<u32>,
    /// Semantics backend address (`ASLP_SERVER`, `host[:port]`).
    pub server_addr: String,
    pub server_port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enable: true,
            debug: false,
            fail_if_missing: false,
            vectors: true,
            banned: Vec::new(),
            server_addr: "localhost".to_string(),
            server_port: 8000,
        }
    }
}

fn parse_bool(name: &str, raw: &str) -> Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "on" | "yes" | "true" => Ok(true),
        "0" | "off" | "no" | "false" => Ok(false),
        other => Err(Error::Environment(format!(
            "could not parse boolean value for {name}: {other}"
        ))),
    }
}

fn parse_banned(raw: &str) -> Result<Vec<u32>> {
    raw.split(',')
        .filter(|p| !p.trim().is_empty())
        .map(|part| {
            part.trim().parse::<u32>().map_err(|_| {
                Error::Environment(format!("could not parse ASLP_BANNED entry: {part}"))
            })
        })
        .collect()
}

fn parse_server(raw: &str, default_port: u16) -> Result<(String, u16)> {
    match raw.split_once(':') {
        Some((host, port)) => {
            let port = port.parse::<u16>().map_err(|_| {
                Error::Environment(format!("could not parse ASLP_SERVER port: {port}"))
            })?;
            Ok((host.to_string(), port))
        }
        None => Ok((raw.to_string(), default_port)),
    }
}

fn env_bool(name: &str, default: bool) -> Result<bool> {
    match std::env::var(name) {
        Ok(raw) => parse_bool(name, &raw),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Parse all options from the current environment.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let banned = match std::env::var("ASLP_BANNED") {
            Ok(raw) => parse_banned(&raw)?,
            Err(_) => Vec::new(),
        };

        let (server_addr, server_port) = match std::env::var("ASLP_SERVER") {
            Ok(raw) => parse_server(&raw, defaults.server_port)?,
            Err(_) => (defaults.server_addr, defaults.server_port),
        };

        Ok(Self {
            enable: env_bool("ASLP", defaults.enable)?,
            debug: env_bool("ASLP_DEBUG", defaults.debug)?,
            fail_if_missing: env_bool("ASLP_FAIL_MISSING", defaults.fail_if_missing)?,
            vectors: env_bool("ASLP_VECTORS", defaults.vectors)?,
            banned,
            server_addr,
            server_port,
        })
    }

    /// The process-wide configuration. First access parses the
    /// environment; a parse failure is returned on every access.
    pub fn global() -> Result<&'static Self> {
        static CONFIG: OnceLock<Result<Config>> = OnceLock::new();
        match CONFIG.get_or_init(Config::from_env) {
            Ok(config) => Ok(config),
            Err(e) => Err(Error::Environment(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert!(config.enable);
        assert!(config.vectors);
        assert!(!config.fail_if_missing);
        assert_eq!(config.server_addr, "localhost");
        assert_eq!(config.server_port, 8000);
    }

    #[test]
    fn bool_spellings() {
        for raw in ["1", "on", "YES", "True"] {
            assert!(parse_bool("T", raw).unwrap());
        }
        for raw in ["0", "off", "NO", "False"] {
            assert!(!parse_bool("T", raw).unwrap());
        }
        assert!(parse_bool("T", "maybe").is_err());
    }

    #[test]
    fn banned_list() {
        assert_eq!(parse_banned("").unwrap(), Vec::<u32>::new());
        assert_eq!(parse_banned("3, 17,255").unwrap(), vec![3, 17, 255]);
        assert!(parse_banned("3,x").is_err());
    }

    #[test]
    fn server_address() {
        assert_eq!(
            parse_server("localhost", 8000).unwrap(),
            ("localhost".to_string(), 8000)
        );
        assert_eq!(
            parse_server("10.0.0.2:9001", 8000).unwrap(),
            ("10.0.0.2".to_string(), 9001)
        );
        assert!(parse_server("host:port", 8000).is_err());
    }
}
