use crate::error::{Error, Result};
use crate::services::grading_service::ScoringPolicy;
use crate::services::sampler::FillPolicy;
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;
use std::sync::OnceLock;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_address: String,
    pub database_url: String,
    pub database_max_connections: u32,
    pub jwt_secret: String,
    pub scoring_policy: ScoringPolicy,
    pub fill_policy: FillPolicy,
    pub json_logs: bool,
}

pub static CONFIG: OnceLock<Config> = OnceLock::new();

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();

        Ok(Self {
            server_address: get_env("SERVER_ADDRESS")?,
            database_url: get_env("DATABASE_URL")?,
            database_max_connections: get_env_parse_or("DATABASE_MAX_CONNECTIONS", 20)?,
            jwt_secret: get_env("JWT_SECRET")?,
            scoring_policy: get_env_parse_or("SCORING_POLICY", ScoringPolicy::default())?,
            fill_policy: get_env_parse_or("FILL_POLICY", FillPolicy::default())?,
            json_logs: env::var("LOG_FORMAT")
                .map(|v| v.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
        })
    }
}

fn get_env(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("Missing environment variable: {}", name)))
}

fn get_env_parse_or<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e))),
        Err(_) => Ok(default),
    }
}

pub fn init_config() -> Result<()> {
    let config = Config::from_env()?;
    CONFIG
        .set(config)
        .map_err(|_| Error::Config("Configuration has already been initialized".to_string()))?;
    Ok(())
}

pub fn get_config() -> &'static Config {
    CONFIG
        .get()
        .expect("Configuration has not been initialized")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unparsable_values_are_config_errors() {
        env::set_var("ASSESSMENT_TEST_POOL_SIZE", "many");
        let err = get_env_parse_or("ASSESSMENT_TEST_POOL_SIZE", 20u32).unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        env::remove_var("ASSESSMENT_TEST_POOL_SIZE");
        assert_eq!(get_env_parse_or("ASSESSMENT_TEST_POOL_SIZE", 20u32).unwrap(), 20);
    }

    #[test]
    fn policies_parse_from_env_strings() {
        env::set_var("ASSESSMENT_TEST_FILL", "fail_fast");
        assert_eq!(
            get_env_parse_or("ASSESSMENT_TEST_FILL", FillPolicy::default()).unwrap(),
            FillPolicy::FailFast
        );
        env::set_var("ASSESSMENT_TEST_SCORING", "bogus");
        assert!(get_env_parse_or("ASSESSMENT_TEST_SCORING", ScoringPolicy::default()).is_err());
    }
}
