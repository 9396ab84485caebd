use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Default)]
#[serde(default)]
pub struct Config {
    pub portal: PortalConfig,
    pub log: LogConfig,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct PortalConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    /// Text that precedes the user's JSON record in the profile page.
    pub profile_marker: String,
}

impl Default for PortalConfig {
    fn default() -> Self {
        PortalConfig {
            base_url: "https://cuchd.blackboard.com".to_string(),
            timeout_secs: 30,
            profile_marker: "\"user\":".to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(default)]
pub struct LogConfig {
    pub dir: String,
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            dir: "logs".to_string(),
            level: "info".to_string(),
        }
    }
}

pub async fn load_config(path: &str) -> Result<Config> {
    let config_contents = tokio::fs::read_to_string(path).await?;
    let config: Config = toml::from_str(&config_contents)?;
    Ok(config)
}

pub async fn save_config(path: &str, config: &Config) -> Result<()> {
    let config_contents = toml::to_string_pretty(config)?;
    tokio::fs::write(path, config_contents).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_take_defaults() -> Result<()> {
        let config: Config = toml::from_str("[portal]\nbase_url = \"https://bb.example\"\n")?;
        assert_eq!(config.portal.base_url, "https://bb.example");
        assert_eq!(config.portal.timeout_secs, 30);
        assert_eq!(config.portal.profile_marker, "\"user\":");
        assert_eq!(config.log.level, "info");
        Ok(())
    }

    #[test]
    fn missing_sections_take_defaults() -> Result<()> {
        let config: Config = toml::from_str("[log]\nlevel = \"debug\"\n")?;
        assert_eq!(config.log.level, "debug");
        assert_eq!(config.portal.base_url, "https://cuchd.blackboard.com");

        let config: Config = toml::from_str("")?;
        assert_eq!(config.log.dir, "logs");
        assert_eq!(config.portal.timeout_secs, 30);
        Ok(())
    }

    #[tokio::test]
    async fn saved_config_loads_back() -> Result<()> {
        let path = std::env::temp_dir().join(format!("bb-classroom-{}.toml", std::process::id()));
        let path = path.to_string_lossy().into_owned();

        let mut config = Config::default();
        config.portal.timeout_secs = 5;
        save_config(&path, &config).await?;
        let loaded = load_config(&path).await?;
        let _ = tokio::fs::remove_file(&path).await;

        assert_eq!(loaded.portal.timeout_secs, 5);
        assert_eq!(loaded.portal.base_url, config.portal.base_url);
        Ok(())
    }
}
