use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context as _, Result};
use serde::{Deserialize, Serialize};
use shelvediff_api::{extension_key, CleanupPolicy, ToolEntry};
use shelvediff_host_api::ToolConfigStore;
use tracing::debug;

const CONFIG_DIR_NAME: &str = ".shelvediff";
const CONFIG_FILE_NAME: &str = "config.toml";
const CONFIG_PATH_ENV: &str = "SHELVEDIFF_CONFIG";

/// Tool overrides that apply to one host version only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostProfile {
    pub tools: BTreeMap<String, ToolEntry>,
}

/// Contents of `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Selects the `[hosts."<version>"]` profile consulted before `[tools]`.
    pub host_version: Option<String>,
    /// Directory for downloaded comparison files; the system temp dir if unset.
    pub temp_dir: Option<String>,
    pub cleanup: CleanupPolicy,
    pub tools: BTreeMap<String, ToolEntry>,
    pub hosts: BTreeMap<String, HostProfile>,
}

#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    /// Locate the config file: `$SHELVEDIFF_CONFIG`, else `~/.shelvediff/config.toml`.
    pub fn new() -> Result<Self> {
        if let Some(path) = std::env::var_os(CONFIG_PATH_ENV) {
            return Ok(Self::at(path));
        }
        let home_dir =
            dirs::home_dir().ok_or_else(|| anyhow!("failed to resolve home directory"))?;
        let path = home_dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME);
        Ok(Self { path })
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load_or_create_default(&self) -> Result<AppConfig> {
        if !self.path.exists() {
            let config = AppConfig::default();
            self.save(&config)?;
            return Ok(config);
        }

        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read config file at {}", self.path.display()))?;
        toml::from_str::<AppConfig>(&raw).with_context(|| {
            format!(
                "failed to parse TOML config file at {}",
                self.path.display()
            )
        })
    }

    pub fn save(&self, config: &AppConfig) -> Result<()> {
        let parent = self
            .path
            .parent()
            .ok_or_else(|| anyhow!("config path has no parent: {}", self.path.display()))?;

        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create config directory {}", parent.display()))?;

        let contents =
            toml::to_string_pretty(config).context("failed to serialize config to TOML")?;
        fs::write(&self.path, contents)
            .with_context(|| format!("failed to write config file at {}", self.path.display()))?;
        Ok(())
    }
}

/// [`ToolConfigStore`] answering from a loaded [`AppConfig`].
///
/// Entries from the active host profile shadow the general `[tools]` table
/// key by key.
#[derive(Debug, Clone, Default)]
pub struct TomlToolStore {
    host_tools: HashMap<String, ToolEntry>,
    tools: HashMap<String, ToolEntry>,
}

impl TomlToolStore {
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        let host_tools = match config.host_version.as_deref() {
            Some(version) => match config.hosts.get(version) {
                Some(profile) => canonical_table(&profile.tools),
                None => {
                    debug!(version, "no tool profile configured for host version");
                    HashMap::new()
                }
            },
            None => HashMap::new(),
        };

        Self {
            host_tools,
            tools: canonical_table(&config.tools),
        }
    }
}

impl ToolConfigStore for TomlToolStore {
    fn lookup(&self, key: &str) -> Option<ToolEntry> {
        let key = extension_key(key);
        self.host_tools
            .get(&key)
            .or_else(|| self.tools.get(&key))
            .cloned()
    }
}

fn canonical_table(table: &BTreeMap<String, ToolEntry>) -> HashMap<String, ToolEntry> {
    table
        .iter()
        .map(|(key, entry)| (extension_key(key), entry.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
host_version = "17.0"

[cleanup]
policy = "after_tool_exit"
timeout_secs = 600

[tools."*"]
command = "meld"
arguments = "%1 %2 --label %6 --label %7"

[tools.CS]
command = "code"
arguments = "--diff %1 %2"

[tools.".txt"]
command = "kdiff3"

[hosts."17.0".tools.".cs"]
command = "bcompare"
arguments = "%1 %2 /title1=%6 /title2=%7"
"#;

    #[test]
    fn parses_sample_config() {
        let config: AppConfig = toml::from_str(SAMPLE).expect("parse sample");
        assert_eq!(config.host_version.as_deref(), Some("17.0"));
        assert_eq!(
            config.cleanup,
            CleanupPolicy::AfterToolExit { timeout_secs: 600 }
        );
        assert_eq!(config.tools.len(), 3);
        assert!(config.tools[".txt"].arguments.is_none());
    }

    #[test]
    fn host_profile_shadows_general_table() {
        let config: AppConfig = toml::from_str(SAMPLE).expect("parse sample");
        let store = TomlToolStore::from_config(&config);

        let cs = store.lookup(".cs").expect("cs entry");
        assert_eq!(cs.command.as_deref(), Some("bcompare"));

        let wildcard = store.lookup("*").expect("wildcard entry");
        assert_eq!(wildcard.command.as_deref(), Some("meld"));

        let without_profile = TomlToolStore::from_config(&AppConfig {
            host_version: None,
            ..config
        });
        let cs = without_profile.lookup(".CS").expect("cs entry");
        assert_eq!(cs.command.as_deref(), Some("code"));
    }

    #[test]
    fn missing_file_is_created_with_defaults() {
        let temp = tempfile::TempDir::new().expect("tempdir");
        let store = ConfigStore::at(temp.path().join("nested").join(CONFIG_FILE_NAME));

        let config = store.load_or_create_default().expect("load default");
        assert_eq!(config, AppConfig::default());
        assert!(store.path().exists());
    }

    #[test]
    fn save_then_load_preserves_tools() {
        let temp = tempfile::TempDir::new().expect("tempdir");
        let store = ConfigStore::at(temp.path().join(CONFIG_FILE_NAME));

        let mut config = AppConfig::default();
        config
            .tools
            .insert("*".into(), ToolEntry::new("meld", "%1 %2"));
        config.temp_dir = Some("/var/tmp/shelvediff".into());
        store.save(&config).expect("save");

        let loaded = store.load_or_create_default().expect("load");
        assert_eq!(loaded, config);
    }

    #[test]
    fn invalid_toml_reports_path() {
        let temp = tempfile::TempDir::new().expect("tempdir");
        let path = temp.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "tools = [").expect("write");

        let err = ConfigStore::at(&path)
            .load_or_create_default()
            .expect_err("invalid toml");
        assert!(err.to_string().contains("failed to parse TOML config file"));
    }
}
