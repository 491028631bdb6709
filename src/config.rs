use crate::error::{Result, SeekError};
use crate::types::WorkerId;
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

/// Listener container configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// Consumer group the container joins
    pub group_id: String,

    /// Client id prefix for worker ids; generated when absent
    pub client_id: Option<String>,

    /// Number of polling workers
    pub concurrency: usize,

    /// Interval after which an idle event fires if no records arrive
    pub idle_event_interval_ms: Option<u64>,

    /// Upper bound on deferred seek operations queued per worker
    pub max_pending_seeks: usize,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            group_id: String::new(),
            client_id: None,
            concurrency: 1,
            idle_event_interval_ms: None,
            max_pending_seeks: 10_000,
        }
    }
}

impl ContainerConfig {
    pub fn new(group_id: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            ..Default::default()
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ContainerConfig =
            toml::from_str(&content).map_err(|e| SeekError::Config(e.to_string()))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.group_id.is_empty() {
            return Err(SeekError::InvalidConfig(
                "group_id cannot be empty".to_string(),
            ));
        }

        if self.concurrency == 0 {
            return Err(SeekError::InvalidConfig(
                "concurrency must be greater than 0".to_string(),
            ));
        }

        if self.max_pending_seeks == 0 {
            return Err(SeekError::InvalidConfig(
                "max_pending_seeks must be greater than 0".to_string(),
            ));
        }

        if self.idle_event_interval_ms == Some(0) {
            return Err(SeekError::InvalidConfig(
                "idle_event_interval_ms must be greater than 0 when set".to_string(),
            ));
        }

        Ok(())
    }

    /// Worker ids for this container, one per unit of concurrency.
    pub fn worker_ids(&self) -> Vec<WorkerId> {
        let client_id = self
            .client_id
            .clone()
            .unwrap_or_else(|| format!("consumer-{}", Uuid::new_v4()));
        (0..self.concurrency)
            .map(|index| WorkerId::new(format!("{}-{}", client_id, index)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_config_validation() {
        let mut config = ContainerConfig::new("payments");
        assert!(config.validate().is_ok());

        config.concurrency = 0;
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("concurrency"));

        config.concurrency = 2;
        config.idle_event_interval_ms = Some(0);
        assert!(config.validate().is_err());

        let empty_group = ContainerConfig::default();
        assert!(empty_group
            .validate()
            .unwrap_err()
            .to_string()
            .contains("group_id"));
    }

    #[test]
    fn test_config_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
group_id = "payments"
client_id = "payments-listener"
concurrency = 3
idle_event_interval_ms = 5000
"#
        )
        .unwrap();

        let config = ContainerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.group_id, "payments");
        assert_eq!(config.concurrency, 3);
        assert_eq!(config.idle_event_interval_ms, Some(5000));
        assert_eq!(config.max_pending_seeks, 10_000);
        assert!(config.validate().is_ok());

        let ids = config.worker_ids();
        assert_eq!(
            ids,
            vec![
                WorkerId::new("payments-listener-0"),
                WorkerId::new("payments-listener-1"),
                WorkerId::new("payments-listener-2"),
            ]
        );
    }

    #[test]
    fn test_config_from_invalid_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "concurrency = \"many\"").unwrap();

        let err = ContainerConfig::from_file(file.path()).unwrap_err();
        assert_eq!(err.category(), "configuration");
    }

    #[test]
    fn test_generated_worker_ids_share_prefix() {
        let mut config = ContainerConfig::new("payments");
        config.concurrency = 2;
        let ids = config.worker_ids();
        assert!(ids[0].as_str().starts_with("consumer-"));
        assert!(ids[0].as_str().ends_with("-0"));
        assert!(ids[1].as_str().ends_with("-1"));
        assert_eq!(
            ids[0].as_str().trim_end_matches("-0"),
            ids[1].as_str().trim_end_matches("-1")
        );
    }
}
