//! arcade.toml configuration parser.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::naming::{MAX_BOUNDED_NAME_LEN, Naming};
use crate::types::{PlayerId, PlayerIdError};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ArcadeConfig {
    /// Prefix for every resource name and label.
    pub app_name: String,
    /// Namespace all player resources live in.
    pub namespace: String,
    /// Player ids that are provisioned out of band and never touched.
    pub reserved_players: Vec<String>,
    pub cabinet: CabinetConfig,
    pub cloud: CloudConfig,
    pub reclaim: ReclaimConfig,
    pub router: RouterConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CabinetConfig {
    pub image: String,
    pub image_pull_policy: String,
    pub container_port: u16,
    pub service_port: u16,
    pub health_path: String,
    pub probe_period_secs: u32,
    pub probe_failure_threshold: u32,
    pub probe_timeout_secs: u32,
    /// Public host name; passed to the cabinet so its links point back at
    /// the arcade, and used as the redirect target once a player is ready.
    pub ingress_host: Option<String>,
    pub resources: ResourcesConfig,
    /// Extra environment variables injected into every cabinet.
    pub env: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CloudConfig {
    pub image: String,
    pub image_pull_policy: String,
    /// Command for the apply variant. `None` runs the image entrypoint.
    pub apply_command: Option<Vec<String>>,
    pub destroy_command: Vec<String>,
    pub ttl_seconds_after_finished: u32,
    pub state_secret_prefix: String,
    /// Defaults to `{app_name}-service-account`.
    pub service_account: Option<String>,
    pub resources: ResourcesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ResourcesConfig {
    pub cpu_request: String,
    pub memory_request: String,
    pub cpu_limit: String,
    pub memory_limit: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReclaimConfig {
    pub job_timeout_secs: u64,
    pub poll_interval_secs: u64,
    /// Wait on a conflicting destroy job instead of trusting it finished.
    pub verify_conflicting_jobs: bool,
}

/// Player router: forwards `/player/{id}/...` to the player's cabinet
/// Service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RouterConfig {
    /// Appended to the Service name to form the upstream host, for example
    /// `.arcade.svc.cluster.local`. Empty resolves within the namespace.
    pub upstream_suffix: String,
    /// Connection attempts per request before giving up.
    pub attempts: u32,
    pub retry_delay_ms: u64,
    /// Largest request body buffered for forwarding.
    pub max_body_bytes: usize,
}

impl Default for ArcadeConfig {
    fn default() -> Self {
        Self {
            app_name: "arcade".to_string(),
            namespace: "arcade".to_string(),
            reserved_players: vec!["devplayer".to_string()],
            cabinet: CabinetConfig::default(),
            cloud: CloudConfig::default(),
            reclaim: ReclaimConfig::default(),
            router: RouterConfig::default(),
        }
    }
}

impl Default for CabinetConfig {
    fn default() -> Self {
        Self {
            image: "arcade/cabinet:latest".to_string(),
            image_pull_policy: "IfNotPresent".to_string(),
            container_port: 5000,
            service_port: 80,
            health_path: "/alive".to_string(),
            probe_period_secs: 30,
            probe_failure_threshold: 2,
            probe_timeout_secs: 5,
            ingress_host: None,
            resources: ResourcesConfig::default(),
            env: BTreeMap::new(),
        }
    }
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            image: "arcade/player-cloud:latest".to_string(),
            image_pull_policy: "IfNotPresent".to_string(),
            apply_command: None,
            destroy_command: vec!["/entrypoint.destroy.sh".to_string()],
            ttl_seconds_after_finished: 60,
            state_secret_prefix: "tfstate-default-".to_string(),
            service_account: None,
            resources: ResourcesConfig::default(),
        }
    }
}

impl Default for ResourcesConfig {
    fn default() -> Self {
        Self {
            cpu_request: "250m".to_string(),
            memory_request: "128Mi".to_string(),
            cpu_limit: "500m".to_string(),
            memory_limit: "512Mi".to_string(),
        }
    }
}

impl Default for ReclaimConfig {
    fn default() -> Self {
        Self {
            job_timeout_secs: 300,
            poll_interval_secs: 5,
            verify_conflicting_jobs: false,
        }
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            upstream_suffix: String::new(),
            attempts: 5,
            retry_delay_ms: 1000,
            max_body_bytes: 2 * 1024 * 1024,
        }
    }
}

impl ArcadeConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: ArcadeConfig = toml::from_str(content)?;
        if config.app_name.is_empty() {
            anyhow::bail!("app_name must not be empty");
        }
        if config.reclaim.poll_interval_secs == 0 {
            anyhow::bail!("reclaim.poll_interval_secs must be greater than zero");
        }
        if config.router.attempts == 0 {
            anyhow::bail!("router.attempts must be greater than zero");
        }
        if config.naming().max_player_id_len() == 0 {
            anyhow::bail!(
                "app_name {:?} leaves no room for player ids within the {MAX_BOUNDED_NAME_LEN}-byte name limit",
                config.app_name
            );
        }
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Load from `path` if given, otherwise use defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn naming(&self) -> Naming {
        Naming::new(&self.app_name, &self.cloud.state_secret_prefix)
    }

    /// Parse a player id and check that its derived names fit under
    /// `app_name`.
    pub fn parse_player(&self, raw: impl Into<String>) -> Result<PlayerId, PlayerIdError> {
        self.naming().parse_player(raw)
    }

    pub fn is_reserved(&self, player: &PlayerId) -> bool {
        self.reserved_players.iter().any(|r| r == player.as_str())
    }

    pub fn cloud_service_account(&self) -> String {
        self.cloud
            .service_account
            .clone()
            .unwrap_or_else(|| self.naming().cloud_service_account())
    }
}

impl RouterConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl ReclaimConfig {
    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_document_uses_defaults() {
        let config = ArcadeConfig::from_toml_str("").unwrap();
        assert_eq!(config, ArcadeConfig::default());
        assert_eq!(config.cabinet.container_port, 5000);
        assert_eq!(config.cloud.ttl_seconds_after_finished, 60);
        assert_eq!(config.reclaim.poll_interval(), Duration::from_secs(5));
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = ArcadeConfig::from_toml_str(
            r#"
app_name = "app"

[cabinet]
ingress_host = "arcade.example.com"

[cabinet.env]
SCOREBOARD_HOST = "app-scoreboard"

[reclaim]
job_timeout_secs = 90
"#,
        )
        .unwrap();
        assert_eq!(config.app_name, "app");
        assert_eq!(config.cabinet.ingress_host.as_deref(), Some("arcade.example.com"));
        assert_eq!(config.cabinet.env["SCOREBOARD_HOST"], "app-scoreboard");
        assert_eq!(config.cabinet.health_path, "/alive");
        assert_eq!(config.reclaim.job_timeout(), Duration::from_secs(90));
        assert_eq!(config.reclaim.poll_interval_secs, 5);
    }

    #[test]
    fn rejects_zero_poll_interval() {
        let err = ArcadeConfig::from_toml_str("[reclaim]\npoll_interval_secs = 0\n").unwrap_err();
        assert!(err.to_string().contains("poll_interval_secs"));
    }

    #[test]
    fn rejects_app_name_without_room_for_players() {
        let long = "a".repeat(41);
        let err = ArcadeConfig::from_toml_str(&format!("app_name = \"{long}\"\n")).unwrap_err();
        assert!(err.to_string().contains("no room for player ids"));

        let config = ArcadeConfig::from_toml_str("app_name = \"splunk-arcade\"\n").unwrap();
        assert!(config.parse_player("a".repeat(28)).is_ok());
        assert!(matches!(
            config.parse_player("a".repeat(29)),
            Err(PlayerIdError::TooLongForApp { max: 28, .. })
        ));
    }

    #[test]
    fn router_defaults() {
        let config = ArcadeConfig::from_toml_str("[router]\nupstream_suffix = \".games.svc\"\n").unwrap();
        assert_eq!(config.router.upstream_suffix, ".games.svc");
        assert_eq!(config.router.attempts, 5);
        assert_eq!(config.router.retry_delay(), Duration::from_secs(1));
        assert!(ArcadeConfig::from_toml_str("[router]\nattempts = 0\n").is_err());
    }

    #[test]
    fn reserved_players() {
        let config = ArcadeConfig::default();
        assert!(config.is_reserved(&PlayerId::parse("devplayer").unwrap()));
        assert!(!config.is_reserved(&PlayerId::parse("alice").unwrap()));
    }

    #[test]
    fn service_account_falls_back_to_app_name() {
        let mut config = ArcadeConfig::default();
        assert_eq!(config.cloud_service_account(), "arcade-service-account");
        config.cloud.service_account = Some("custom".to_string());
        assert_eq!(config.cloud_service_account(), "custom");
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "namespace = \"games\"").unwrap();
        let config = ArcadeConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.namespace, "games");
        assert_eq!(ArcadeConfig::load(None).unwrap(), ArcadeConfig::default());
    }

    #[test]
    fn serializes_back_to_toml() {
        let toml_str = ArcadeConfig::default().to_toml_string().unwrap();
        let parsed = ArcadeConfig::from_toml_str(&toml_str).unwrap();
        assert_eq!(parsed, ArcadeConfig::default());
    }
}
