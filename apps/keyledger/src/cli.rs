use std::error::Error;

use clap::Parser;
use keyledger_common::{GlobalConfig, GlobalConfigPatch};

use crate::data_dir::resolve_data_dir;
use crate::dsn::resolve_dsn;

/// Command line flags; each falls back to its environment variable.
#[derive(Debug, Parser)]
#[command(name = "keyledger", version, about = "Key custody ledger service")]
pub(crate) struct Cli {
    #[arg(long, env = "KEYLEDGER_DSN")]
    pub(crate) dsn: Option<String>,
    #[arg(long, env = "KEYLEDGER_DATA_DIR")]
    pub(crate) data_dir: Option<String>,
    #[arg(long, env = "KEYLEDGER_HOST")]
    pub(crate) host: Option<String>,
    #[arg(long, env = "KEYLEDGER_PORT")]
    pub(crate) port: Option<u16>,
    #[arg(long, env = "KEYLEDGER_ADMIN_KEY", hide_env_values = true)]
    pub(crate) admin_key: Option<String>,
}

impl Cli {
    pub(crate) fn into_config(self) -> Result<GlobalConfig, Box<dyn Error + Send + Sync>> {
        let mut patch = GlobalConfigPatch::default();
        patch.overlay(GlobalConfigPatch {
            host: self.host,
            port: self.port,
            dsn: self.dsn,
            data_dir: self.data_dir,
            admin_key: self.admin_key,
        });

        let data_dir = resolve_data_dir(patch.data_dir.as_deref());
        let dsn = resolve_dsn(patch.dsn.as_deref(), &data_dir)?;
        patch.overlay(GlobalConfigPatch {
            dsn: Some(dsn),
            data_dir: Some(data_dir),
            ..Default::default()
        });
        Ok(patch.into_config()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "keyledger",
            "--dsn",
            "sqlite::memory:",
            "--port",
            "9100",
            "--admin-key",
            "s3cret",
        ])
        .unwrap();
        let config = cli.into_config().unwrap();
        assert_eq!(config.dsn, "sqlite::memory:");
        assert_eq!(config.bind_addr(), "127.0.0.1:9100");
        assert_eq!(config.admin_key.as_deref(), Some("s3cret"));
        assert_eq!(config.data_dir, "./data");
    }
}
