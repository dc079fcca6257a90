use std::{collections::HashMap, path::PathBuf, time::Duration};

use config::{Config as ConfigLib, ConfigError, Environment, File};
use serde::{Deserialize, Deserializer};

use crate::tsl::ParserOptions;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub tsl: TslConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TslConfig {
    /// Location of the list of the lists
    pub url: String,
    /// Territory code of the root list
    pub territory: String,
    pub cache_dir: PathBuf,
    pub timeout_secs: u64,
    pub max_pivot_depth: u32,
    /// PEM or DER files of the certificates trusted to sign the root list
    #[serde(default, deserialize_with = "string_or_list")]
    pub signing_certs: Vec<String>,
    /// Territories enabled at startup
    #[serde(default, deserialize_with = "string_or_list")]
    pub territories: Vec<String>,
    pub allow_cached_fallback: bool,
    pub user_agent: String,
}

impl TslConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn parser_options(&self) -> ParserOptions {
        ParserOptions {
            max_pivot_depth: self.max_pivot_depth,
            allow_cached_fallback: self.allow_cached_fallback,
        }
    }
}

/// Lists may be given as a sequence or as comma separated text, the latter
/// being the only form environment variables can carry.
fn string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrList {
        List(Vec<String>),
        Text(String),
    }

    Ok(match StringOrList::deserialize(deserializer)? {
        StringOrList::List(items) => items,
        StringOrList::Text(text) => text
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect(),
    })
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_sources(None)
    }

    pub fn load_with_sources(
        env_vars: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = ConfigLib::builder()
            .set_default("tsl.url", "https://ec.europa.eu/tools/lotl/eu-lotl.xml")?
            .set_default("tsl.territory", "EU")?
            .set_default("tsl.cache_dir", "cache/tsl")?
            .set_default("tsl.timeout_secs", 30)?
            .set_default("tsl.max_pivot_depth", 3)?
            .set_default("tsl.allow_cached_fallback", true)?
            .set_default(
                "tsl.user_agent",
                concat!("tsl-trust/", env!("CARGO_PKG_VERSION")),
            )?
            .add_source(File::with_name("config/settings").required(false));

        // explicit overrides replace the process environment
        if let Some(vars) = env_vars {
            for (key, value) in vars {
                builder = builder.set_override(&key, value)?;
            }
        } else {
            // APP_TSL__URL, APP_TSL__TERRITORIES=EE,LV
            builder = builder.add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__"),
            );
        }

        builder.build()?.try_deserialize()
    }
}
