use std::{
    env, fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use anyhow::{anyhow, Result};

use konkt_core::{
    quota::QuotaLimits,
    usecases::{EnricherOptions, ResolverOptions, SearchOptions, SuggestionOptions},
};
use konkt_entities::category::Category;

mod raw;

const DEFAULT_CONFIG_FILE_NAME: &str = "konkt.toml";

const ENV_NAME_PROVIDER_API_KEY: &str = "KONKT_PROVIDER_API_KEY";

pub struct Config {
    pub provider: Provider,
    pub quota: Quota,
    pub search: Search,
    pub resolver: Resolver,
    pub cache: Cache,
}

impl Config {
    pub fn try_load_from_file_or_default<P: AsRef<Path>>(file_path: Option<P>) -> Result<Self> {
        let file_path: &Path = file_path.as_ref().map(|p| p.as_ref()).unwrap_or_else(|| {
            log::info!("No configuration file specified. load {DEFAULT_CONFIG_FILE_NAME}");
            Path::new(DEFAULT_CONFIG_FILE_NAME)
        });

        let raw_config = match fs::read_to_string(file_path) {
            Ok(cfg_string) => toml::from_str(&cfg_string)?,
            Err(err) => match err.kind() {
                ErrorKind::NotFound => {
                    log::info!(
                        "{DEFAULT_CONFIG_FILE_NAME} not found => load default configuration."
                    );
                    Ok(raw::Config::default())
                }
                _ => Err(err),
            }?,
        };
        let mut cfg = Self::try_from(raw_config)?;
        if let Ok(api_key) = env::var(ENV_NAME_PROVIDER_API_KEY) {
            cfg.provider.api_key = Some(api_key);
        }
        Ok(cfg)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::try_from(raw::Config::default()).expect("Default configuration")
    }
}

pub struct Provider {
    pub base_url: String,
    pub api_key: Option<String>,
}

pub struct Quota {
    pub max_calls_per_window: u32,
    pub window: Duration,
    pub min_call_interval: Duration,
}

pub struct Search {
    pub radius_meters: u32,
    /// Searched in this order; see the dedup attribution notes in
    /// `konkt-core`.
    pub categories: Vec<Category>,
    pub max_total_results: usize,
    pub page_size: usize,
    pub request_delay: Duration,
}

pub struct Resolver {
    pub provider_timeout: Duration,
    pub debounce_window: Duration,
}

pub struct Cache {
    /// File system directory for the persistent store; `None` keeps
    /// everything in memory.
    pub directory: Option<PathBuf>,
    pub geocode_ttl: Duration,
    pub search_ttl: Duration,
    pub details_ttl: Duration,
    pub suggestions_ttl: Duration,
}

impl Config {
    pub fn quota_limits(&self) -> QuotaLimits {
        QuotaLimits {
            max_calls_per_window: self.quota.max_calls_per_window,
            window: self.quota.window,
            min_call_interval: self.quota.min_call_interval,
        }
    }

    pub fn resolver_options(&self) -> ResolverOptions {
        ResolverOptions {
            provider_timeout: self.resolver.provider_timeout,
            geocode_ttl: self.cache.geocode_ttl,
        }
    }

    pub fn search_options(&self) -> SearchOptions {
        SearchOptions {
            provider_timeout: self.resolver.provider_timeout,
            request_delay: self.search.request_delay,
            search_ttl: self.cache.search_ttl,
            max_total_results: self.search.max_total_results,
            first_page_size: self.search.page_size,
        }
    }

    pub fn enricher_options(&self) -> EnricherOptions {
        EnricherOptions {
            provider_timeout: self.resolver.provider_timeout,
            request_delay: self.search.request_delay,
            details_ttl: self.cache.details_ttl,
        }
    }

    pub fn suggestion_options(&self) -> SuggestionOptions {
        SuggestionOptions {
            provider_timeout: self.resolver.provider_timeout,
            suggestions_ttl: self.cache.suggestions_ttl,
        }
    }
}

impl TryFrom<raw::Config> for Config {
    type Error = anyhow::Error;

    fn try_from(from: raw::Config) -> Result<Self> {
        let raw::Config {
            provider,
            quota,
            search,
            resolver,
            cache,
        } = from;

        let raw::Provider { base_url, api_key } = provider.unwrap_or_default();
        let raw::Quota {
            max_calls_per_window,
            window,
            min_call_interval,
        } = quota.unwrap_or_default();
        let raw::Search {
            radius_meters,
            categories,
            max_total_results,
            page_size,
            request_delay,
        } = search.unwrap_or_default();
        let raw::Resolver {
            provider_timeout,
            debounce_window,
        } = resolver.unwrap_or_default();
        let raw::Cache {
            directory,
            geocode_ttl,
            search_ttl,
            details_ttl,
            suggestions_ttl,
        } = cache.unwrap_or_default();

        if page_size == 0 {
            return Err(anyhow!("search.page-size must not be zero"));
        }
        let categories = categories
            .iter()
            .map(|c| Category::from_str(c).map_err(|_| anyhow!("invalid category: {c:?}")))
            .collect::<Result<Vec<_>>>()?;
        if categories.is_empty() {
            return Err(anyhow!("search.categories must not be empty"));
        }

        Ok(Self {
            provider: Provider { base_url, api_key },
            quota: Quota {
                max_calls_per_window,
                window,
                min_call_interval,
            },
            search: Search {
                radius_meters,
                categories,
                max_total_results,
                page_size,
                request_delay,
            },
            resolver: Resolver {
                provider_timeout,
                debounce_window,
            },
            cache: Cache {
                directory,
                geocode_ttl,
                search_ttl,
                details_ttl,
                suggestions_ttl,
            },
        })
    }
}
