use serde::Deserialize;
use std::env;

/// Engine policy defaults applied when an authoring request leaves the
/// corresponding field unset.
#[derive(Debug, Clone, Deserialize)]
pub struct GradingConfig {
    pub default_late_penalty_percent_per_day: f64,
    pub default_max_attempts: u32,
    pub default_total_points: f64,
}

impl Default for GradingConfig {
    fn default() -> Self {
        GradingConfig {
            default_late_penalty_percent_per_day: 10.0,
            default_max_attempts: 1,
            default_total_points: 100.0,
        }
    }
}

impl GradingConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        // Determine environment (defaults to dev)
        let env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // Build configuration from config/*.toml + ENV overrides
        let settings = config::Config::builder()
            .add_source(
                config::File::with_name(&format!("config/{}", env)).required(false), // Allow missing config file, fallback to ENV
            )
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        let defaults = GradingConfig::default();

        let default_late_penalty_percent_per_day = settings
            .get_float("grading.late_penalty_percent_per_day")
            .unwrap_or(defaults.default_late_penalty_percent_per_day);

        let default_max_attempts = settings
            .get_int("grading.max_attempts")
            .ok()
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(defaults.default_max_attempts);

        let default_total_points = settings
            .get_float("grading.total_points")
            .unwrap_or(defaults.default_total_points);

        Ok(GradingConfig {
            default_late_penalty_percent_per_day,
            default_max_attempts,
            default_total_points,
        })
    }
}
