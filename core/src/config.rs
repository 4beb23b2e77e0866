use anyhow::{bail, Context, Result};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tracing::info;

const DEFAULT_TOOL: &str = "rally";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Process-wide settings, read once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Program placed at argv[0] of every invocation.
    pub tool: String,
    pub host: IpAddr,
    pub port: u16,
    /// Upper bound on a single child's run time.
    pub timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            tool: DEFAULT_TOOL.to_string(),
            host: IpAddr::from([0, 0, 0, 0]),
            port: DEFAULT_PORT,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl GatewayConfig {
    /// Loads `.env` if present, then reads `RALLY_GATEWAY_*` variables.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let config = Self::from_lookup(|key| std::env::var(key).ok())?;
        info!(
            "Config loaded. Tool: {}, bind: {}, timeout: {:?}",
            config.tool,
            config.bind_addr(),
            config.timeout
        );
        Ok(config)
    }

    /// Builds a config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let tool = lookup("RALLY_GATEWAY_TOOL").unwrap_or_else(|| DEFAULT_TOOL.to_string());
        if tool.trim().is_empty() {
            bail!("RALLY_GATEWAY_TOOL must not be empty");
        }

        let host = lookup("RALLY_GATEWAY_HOST")
            .unwrap_or_else(|| DEFAULT_HOST.to_string())
            .parse::<IpAddr>()
            .context("RALLY_GATEWAY_HOST must be an IP address")?;

        let port = match lookup("RALLY_GATEWAY_PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .with_context(|| format!("RALLY_GATEWAY_PORT '{}' is not a valid port", raw))?,
            None => DEFAULT_PORT,
        };

        let timeout_secs = match lookup("RALLY_GATEWAY_TIMEOUT_SECS") {
            Some(raw) => raw.parse::<u64>().with_context(|| {
                format!("RALLY_GATEWAY_TIMEOUT_SECS '{}' is not a number", raw)
            })?,
            None => DEFAULT_TIMEOUT_SECS,
        };
        if timeout_secs == 0 {
            bail!("RALLY_GATEWAY_TIMEOUT_SECS must be greater than zero");
        }

        Ok(Self {
            tool,
            host,
            port,
            timeout: Duration::from_secs(timeout_secs),
        })
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}
