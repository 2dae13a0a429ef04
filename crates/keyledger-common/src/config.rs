pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8788;

#[derive(Debug, thiserror::Error)]
pub enum GlobalConfigError {
    #[error("missing required global config field: {0}")]
    MissingField(&'static str),
    #[error("invalid global config field {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Final, merged configuration used by the running process.
///
/// Merge order: CLI > ENV > defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalConfig {
    pub host: String,
    pub port: u16,
    /// Database DSN used for this process.
    pub dsn: String,
    pub data_dir: String,
    /// When set, every admin route requires this key.
    pub admin_key: Option<String>,
}

impl GlobalConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Optional layer used for merging the global config.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalConfigPatch {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub dsn: Option<String>,
    pub data_dir: Option<String>,
    pub admin_key: Option<String>,
}

impl GlobalConfigPatch {
    /// Values present in `other` win; blank strings count as absent.
    pub fn overlay(&mut self, other: GlobalConfigPatch) {
        if let Some(host) = non_blank(other.host) {
            self.host = Some(host);
        }
        if other.port.is_some() {
            self.port = other.port;
        }
        if let Some(dsn) = non_blank(other.dsn) {
            self.dsn = Some(dsn);
        }
        if let Some(data_dir) = non_blank(other.data_dir) {
            self.data_dir = Some(data_dir);
        }
        if let Some(admin_key) = non_blank(other.admin_key) {
            self.admin_key = Some(admin_key);
        }
    }

    pub fn into_config(self) -> Result<GlobalConfig, GlobalConfigError> {
        let port = self.port.unwrap_or(DEFAULT_PORT);
        if port == 0 {
            return Err(GlobalConfigError::Invalid {
                field: "port",
                reason: "must be non-zero".to_string(),
            });
        }
        Ok(GlobalConfig {
            host: self.host.unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            dsn: self.dsn.ok_or(GlobalConfigError::MissingField("dsn"))?,
            data_dir: self.data_dir.unwrap_or_else(|| "./data".to_string()),
            admin_key: self.admin_key,
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlay_prefers_later_layers_and_ignores_blanks() {
        let mut patch = GlobalConfigPatch {
            host: Some("0.0.0.0".to_string()),
            dsn: Some("sqlite::memory:".to_string()),
            ..Default::default()
        };
        patch.overlay(GlobalConfigPatch {
            host: Some("  ".to_string()),
            port: Some(9000),
            admin_key: Some("secret".to_string()),
            ..Default::default()
        });

        let config = patch.into_config().expect("config should merge");
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 9000);
        assert_eq!(config.admin_key.as_deref(), Some("secret"));
        assert_eq!(config.bind_addr(), "0.0.0.0:9000");
    }

    #[test]
    fn missing_dsn_is_reported() {
        let err = GlobalConfigPatch::default().into_config().unwrap_err();
        assert!(matches!(err, GlobalConfigError::MissingField("dsn")));
    }
}
