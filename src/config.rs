//! Application configuration, merged from defaults, an optional
//! `config.toml`, and environment variables (highest priority), mirroring
//! the teacher's `Figment::new().merge(Serialized::defaults(...))` layering.

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::LazyLock;

const DEFAULT_CONFIG_FILE: &str = "config.toml";
pub const DEFAULT_AUTH_PASSWORD: &str = "123456";

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: IpAddr,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_auth_password")]
    pub gemini_auth_password: String,

    #[serde(default = "default_oauth_callback_port")]
    pub oauth_callback_port: u16,

    #[serde(default = "default_google_application_credentials")]
    pub google_application_credentials: String,

    #[serde(default)]
    pub gemini_credentials: Option<String>,

    #[serde(default = "default_accounts_dir")]
    pub accounts_dir: String,

    #[serde(default = "default_loglevel")]
    pub loglevel: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            gemini_auth_password: default_auth_password(),
            oauth_callback_port: default_oauth_callback_port(),
            google_application_credentials: default_google_application_credentials(),
            gemini_credentials: None,
            accounts_dir: default_accounts_dir(),
            loglevel: default_loglevel(),
        }
    }
}

fn default_host() -> IpAddr {
    Ipv4Addr::new(127, 0, 0, 1).into()
}
fn default_port() -> u16 {
    8888
}
fn default_auth_password() -> String {
    DEFAULT_AUTH_PASSWORD.to_string()
}
fn default_oauth_callback_port() -> u16 {
    8080
}
fn default_google_application_credentials() -> String {
    "oauth_creds.json".to_string()
}
fn default_accounts_dir() -> String {
    "accounts".to_string()
}
fn default_loglevel() -> String {
    "info".to_string()
}

impl Config {
    pub fn figment() -> Figment {
        let figment = Figment::new().merge(Serialized::defaults(Config::default()));
        let figment = if std::path::Path::new(DEFAULT_CONFIG_FILE).is_file() {
            figment.merge(Toml::file(DEFAULT_CONFIG_FILE))
        } else {
            figment
        };
        figment.merge(Env::raw())
    }

    pub fn load() -> Self {
        Self::figment().extract().unwrap_or_else(|err| {
            panic!("failed to extract configuration (defaults + config.toml + env): {err}")
        })
    }

    pub fn uses_default_password(&self) -> bool {
        self.gemini_auth_password == DEFAULT_AUTH_PASSWORD
    }
}

/// Global, lazily-initialized configuration instance.
pub static CONFIG: LazyLock<Config> = LazyLock::new(Config::load);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = Config::default();
        assert_eq!(cfg.port, 8888);
        assert_eq!(cfg.gemini_auth_password, "123456");
        assert_eq!(cfg.oauth_callback_port, 8080);
        assert_eq!(cfg.accounts_dir, "accounts");
        assert!(cfg.uses_default_password());
    }
}
