use std::{path::PathBuf, time::Duration};

use duration_str::deserialize_duration;
use serde::Deserialize;

const DEFAULT_CONFIG_FILE: &str = include_str!("konkt.default.toml");

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    pub provider: Option<Provider>,
    pub quota: Option<Quota>,
    pub search: Option<Search>,
    pub resolver: Option<Resolver>,
    pub cache: Option<Cache>,
}

impl Default for Config {
    fn default() -> Self {
        let cfg: Self = toml::from_str(DEFAULT_CONFIG_FILE).expect("Default configuration");
        cfg
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Provider {
    pub base_url: String,
    pub api_key: Option<String>,
}

impl Default for Provider {
    fn default() -> Self {
        Config::default().provider.expect("Provider configuration")
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Quota {
    pub max_calls_per_window: u32,
    #[serde(deserialize_with = "deserialize_duration")]
    pub window: Duration,
    #[serde(deserialize_with = "deserialize_duration")]
    pub min_call_interval: Duration,
}

impl Default for Quota {
    fn default() -> Self {
        Config::default().quota.expect("Quota configuration")
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Search {
    pub radius_meters: u32,
    pub categories: Vec<String>,
    pub max_total_results: usize,
    pub page_size: usize,
    #[serde(deserialize_with = "deserialize_duration")]
    pub request_delay: Duration,
}

impl Default for Search {
    fn default() -> Self {
        Config::default().search.expect("Search configuration")
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Resolver {
    #[serde(deserialize_with = "deserialize_duration")]
    pub provider_timeout: Duration,
    #[serde(deserialize_with = "deserialize_duration")]
    pub debounce_window: Duration,
}

impl Default for Resolver {
    fn default() -> Self {
        Config::default().resolver.expect("Resolver configuration")
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Cache {
    pub directory: Option<PathBuf>,
    #[serde(deserialize_with = "deserialize_duration")]
    pub geocode_ttl: Duration,
    #[serde(deserialize_with = "deserialize_duration")]
    pub search_ttl: Duration,
    #[serde(deserialize_with = "deserialize_duration")]
    pub details_ttl: Duration,
    #[serde(deserialize_with = "deserialize_duration")]
    pub suggestions_ttl: Duration,
}

impl Default for Cache {
    fn default() -> Self {
        Config::default().cache.expect("Cache configuration")
    }
}
