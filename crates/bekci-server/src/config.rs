use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_db_path")]
    pub db_path: String,
    /// Snowflake identity for row IDs (0-31 each). Only matters when
    /// several instances share a database path over time.
    #[serde(default = "default_machine_id")]
    pub machine_id: i32,
    #[serde(default = "default_node_id")]
    pub node_id: i32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            db_path: default_db_path(),
            machine_id: default_machine_id(),
            node_id: default_node_id(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_db_path() -> String {
    "data/bekci.db".to_string()
}

fn default_machine_id() -> i32 {
    1
}

fn default_node_id() -> i32 {
    1
}

impl ServerConfig {
    /// Load from a TOML file; a missing file yields the defaults.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => Ok(toml::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path, "Config file not found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let config = ServerConfig::load("/no/such/bekci.toml").unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.db_path, "data/bekci.db");
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let config: ServerConfig = toml::from_str("port = 9000").unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.machine_id, 1);
        assert_eq!(config.node_id, 1);
    }

    #[test]
    fn id_identity_is_configurable() {
        let config: ServerConfig = toml::from_str("machine_id = 4\nnode_id = 7").unwrap();
        assert_eq!(config.machine_id, 4);
        assert_eq!(config.node_id, 7);
    }
}
