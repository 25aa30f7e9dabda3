use std::env;

use tracing::info;

/// Application configuration loaded from environment variables.
///
/// Every collaborator credential is optional: a missing key means the
/// corresponding stage degrades (skip or deterministic fallback), never a
/// startup failure.
#[derive(Debug, Clone)]
pub struct Config {
    // Correlation graph (Neo4j). None → in-memory graph backend.
    pub neo4j_uri: Option<String>,
    pub neo4j_user: String,
    pub neo4j_password: Option<String>,

    // Result cache
    pub cache_db_path: String,
    pub remote_cache_url: Option<String>,
    pub remote_cache_token: Option<String>,

    // Collaborator credentials
    pub vision_api_key: Option<String>,
    pub voice_api_key: Option<String>,
    pub extractor_api_key: Option<String>,
    pub reputation_api_key: Option<String>,
    pub research_api_key: Option<String>,
    pub aggregator_api_key: Option<String>,
}

impl Config {
    /// Load configuration from environment variables. Nothing is required.
    pub fn from_env() -> Self {
        Self {
            neo4j_uri: optional_env("NEO4J_URI"),
            neo4j_user: env::var("NEO4J_USER").unwrap_or_else(|_| "neo4j".to_string()),
            neo4j_password: optional_env("NEO4J_PASSWORD"),
            cache_db_path: env::var("CACHE_DB_PATH")
                .unwrap_or_else(|_| "fraudlens-cache.db".to_string()),
            remote_cache_url: optional_env("REMOTE_CACHE_URL"),
            remote_cache_token: optional_env("REMOTE_CACHE_TOKEN"),
            vision_api_key: optional_env("VISION_API_KEY"),
            voice_api_key: optional_env("VOICE_API_KEY"),
            extractor_api_key: optional_env("EXTRACTOR_API_KEY"),
            reputation_api_key: optional_env("REPUTATION_API_KEY"),
            research_api_key: optional_env("RESEARCH_API_KEY"),
            aggregator_api_key: optional_env("AGGREGATOR_API_KEY"),
        }
    }

    /// Log which external services are configured, without leaking secrets.
    pub fn log_active_services(&self) {
        let services = [
            ("vision", self.vision_api_key.is_some()),
            ("voice", self.voice_api_key.is_some()),
            ("extractor", self.extractor_api_key.is_some()),
            ("reputation", self.reputation_api_key.is_some()),
            ("research", self.research_api_key.is_some()),
            ("aggregator", self.aggregator_api_key.is_some()),
            ("neo4j", self.neo4j_uri.is_some()),
            ("remote_cache", self.remote_cache_url.is_some()),
        ];
        let active: Vec<&str> = services
            .iter()
            .filter(|(_, on)| *on)
            .map(|(name, _)| *name)
            .collect();
        info!(active = active.join(", "), "configured services");
    }
}

fn optional_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_env_values_count_as_unset() {
        env::set_var("FRAUDLENS_TEST_EMPTY", "");
        assert_eq!(optional_env("FRAUDLENS_TEST_EMPTY"), None);
        env::set_var("FRAUDLENS_TEST_SET", "value");
        assert_eq!(optional_env("FRAUDLENS_TEST_SET"), Some("value".to_string()));
    }

    #[test]
    fn defaults_apply_without_environment() {
        let config = Config::from_env();
        assert_eq!(config.neo4j_user, "neo4j");
        assert!(!config.cache_db_path.is_empty());
    }
}
