//! Optimizer configuration.
//!
//! Every knob has a default; `OptimizerConfig::from_env` overlays
//! `ROUTE_OPTIMIZER_*` variables on top of those defaults.

use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::geocoder::nominatim::NominatimConfig;
use crate::geocoder::synthetic::SyntheticConfig;
use crate::osrm::OsrmConfig;

const ENV_PREFIX: &str = "ROUTE_OPTIMIZER_";

/// Speed and emissions assumptions shared by all estimators.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EstimatorConfig {
    /// Assumed average driving speed in miles per hour.
    pub average_speed_mph: f64,
    /// Kilograms of CO2 per mile driven.
    pub emissions_kg_per_mile: f64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            average_speed_mph: 30.0,
            emissions_kg_per_mile: 0.12,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterConfig {
    pub enabled: bool,
    /// In auto mode, runs with more stops than this are clustered.
    pub auto_threshold: usize,
    /// Upper bound on clusters in auto mode.
    pub max_clusters: usize,
    pub min_cluster_size: usize,
    /// Neighbourhood radius in miles. Derived from the data when unset.
    pub eps_miles: Option<f64>,
    /// Multiplier on the median nearest-neighbour distance for derived eps.
    pub eps_scale: f64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            auto_threshold: 8,
            max_clusters: 3,
            min_cluster_size: 2,
            eps_miles: None,
            eps_scale: 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SequencerConfig {
    /// Hard ceiling on accepted improvement moves per route.
    pub iteration_ceiling: usize,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            iteration_ceiling: 2000,
        }
    }
}

/// Geocode result cache. A capacity of zero disables caching.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheConfig {
    pub ttl: Duration,
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(3600),
            capacity: 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GeocoderBackend {
    Nominatim(NominatimConfig),
    /// Deterministic, network-free coordinates for demos and tests.
    Synthetic(SyntheticConfig),
}

impl Default for GeocoderBackend {
    fn default() -> Self {
        GeocoderBackend::Synthetic(SyntheticConfig::default())
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum EstimatorBackend {
    #[default]
    Haversine,
    Osrm(OsrmConfig),
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptimizerConfig {
    pub geocoder: GeocoderBackend,
    pub estimator: EstimatorBackend,
    pub costs: EstimatorConfig,
    pub clustering: ClusterConfig,
    pub sequencer: SequencerConfig,
    pub cache: CacheConfig,
    /// Per-address geocoding timeout.
    pub geocode_timeout: Duration,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            geocoder: GeocoderBackend::default(),
            estimator: EstimatorBackend::default(),
            costs: EstimatorConfig::default(),
            clustering: ClusterConfig::default(),
            sequencer: SequencerConfig::default(),
            cache: CacheConfig::default(),
            geocode_timeout: Duration::from_secs(10),
        }
    }
}

impl OptimizerConfig {
    /// Defaults overlaid with `ROUTE_OPTIMIZER_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overlaid with values from `lookup`, keyed by full variable name.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars { lookup };
        let mut config = Self::default();

        if let Some(backend) = vars.raw("GEOCODER") {
            config.geocoder = match backend.trim().to_ascii_lowercase().as_str() {
                "nominatim" => GeocoderBackend::Nominatim(NominatimConfig::default()),
                "synthetic" | "mock" => GeocoderBackend::Synthetic(SyntheticConfig::default()),
                _ => {
                    return Err(ConfigError::new(
                        &Vars::<F>::key("GEOCODER"),
                        &backend,
                        "expected nominatim or synthetic",
                    ));
                }
            };
        }
        if let GeocoderBackend::Nominatim(nominatim) = &mut config.geocoder {
            if let Some(url) = vars.raw("NOMINATIM_URL") {
                nominatim.base_url = url;
            }
            if let Some(agent) = vars.raw("USER_AGENT") {
                nominatim.user_agent = agent;
            }
        }

        if let Some(backend) = vars.raw("ESTIMATOR") {
            config.estimator = match backend.trim().to_ascii_lowercase().as_str() {
                "haversine" => EstimatorBackend::Haversine,
                "osrm" => EstimatorBackend::Osrm(OsrmConfig::default()),
                _ => {
                    return Err(ConfigError::new(
                        &Vars::<F>::key("ESTIMATOR"),
                        &backend,
                        "expected haversine or osrm",
                    ));
                }
            };
        }
        if let EstimatorBackend::Osrm(osrm) = &mut config.estimator {
            if let Some(url) = vars.raw("OSRM_URL") {
                osrm.base_url = url;
            }
            if let Some(profile) = vars.raw("OSRM_PROFILE") {
                osrm.profile = profile;
            }
            if let Some(secs) = vars.parse::<u64>("OSRM_TIMEOUT_SECS")? {
                osrm.timeout_secs = secs;
            }
        }

        if let Some(speed) = vars.positive("SPEED_MPH")? {
            config.costs.average_speed_mph = speed;
        }
        if let Some(factor) = vars.parse::<f64>("EMISSIONS_KG_PER_MILE")? {
            config.costs.emissions_kg_per_mile = factor;
        }
        if let Some(secs) = vars.parse::<u64>("GEOCODE_TIMEOUT_SECS")? {
            config.geocode_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = vars.parse::<u64>("CACHE_TTL_SECS")? {
            config.cache.ttl = Duration::from_secs(secs);
        }
        if let Some(capacity) = vars.parse::<usize>("CACHE_CAPACITY")? {
            config.cache.capacity = capacity;
        }
        if let Some(enabled) = vars.parse::<bool>("CLUSTERING")? {
            config.clustering.enabled = enabled;
        }
        if let Some(threshold) = vars.parse::<usize>("CLUSTER_THRESHOLD")? {
            config.clustering.auto_threshold = threshold;
        }
        if let Some(max) = vars.parse::<usize>("MAX_CLUSTERS")? {
            config.clustering.max_clusters = max.max(1);
        }
        if let Some(size) = vars.parse::<usize>("MIN_CLUSTER_SIZE")? {
            config.clustering.min_cluster_size = size.max(1);
        }
        if let Some(eps) = vars.positive("CLUSTER_EPS_MILES")? {
            config.clustering.eps_miles = Some(eps);
        }
        if let Some(ceiling) = vars.parse::<usize>("ITERATION_CEILING")? {
            config.sequencer.iteration_ceiling = ceiling;
        }

        Ok(config)
    }
}

struct Vars<F> {
    lookup: F,
}

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn key(name: &str) -> String {
        format!("{}{}", ENV_PREFIX, name)
    }

    fn raw(&self, name: &str) -> Option<String> {
        (self.lookup)(&Self::key(name)).filter(|value| !value.trim().is_empty())
    }

    fn parse<T: FromStr>(&self, name: &str) -> Result<Option<T>, ConfigError> {
        match self.raw(name) {
            None => Ok(None),
            Some(value) => value.trim().parse::<T>().map(Some).map_err(|_| {
                ConfigError::new(
                    &Self::key(name),
                    &value,
                    format!("expected {}", std::any::type_name::<T>()),
                )
            }),
        }
    }

    fn positive(&self, name: &str) -> Result<Option<f64>, ConfigError> {
        match self.parse::<f64>(name)? {
            Some(value) if !(value.is_finite() && value > 0.0) => Err(ConfigError::new(
                &Self::key(name),
                &value.to_string(),
                "expected a positive number",
            )),
            other => Ok(other),
        }
    }
}
