use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum CompletionStyle {
    #[default]
    #[serde(rename = "name-only")]
    NameOnly,
    #[serde(rename = "placeholders")]
    Placeholders,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CompletionSettings {
    pub style: CompletionStyle,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DatabaseSource {
    pub label: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DatabaseSettings {
    pub directory: Option<PathBuf>,
    pub sources: Vec<DatabaseSource>,
    pub selected: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServerConfig {
    pub completions: CompletionSettings,
    pub databases: DatabaseSettings,
    pub auto_open_siblings: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            completions: CompletionSettings::default(),
            databases: DatabaseSettings::default(),
            auto_open_siblings: true,
        }
    }
}

impl ServerConfig {
    pub fn from_settings(settings: Option<&Value>) -> Option<Self> {
        let settings = settings?;
        let root = settings.get("dspre").unwrap_or(settings);
        if !root.is_object() {
            return None;
        }
        serde_json::from_value(root.clone()).ok()
    }

    pub fn keeping_selection(mut self, current: &ServerConfig) -> Self {
        if self.databases.selected.is_none() {
            self.databases.selected = current.databases.selected.clone();
        }
        self
    }

    pub fn database_directory(&self) -> PathBuf {
        if let Some(dir) = &self.databases.directory {
            return dir.clone();
        }
        let base = std::env::var_os("APPDATA")
            .or_else(|| std::env::var_os("HOME"))
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        base.join("DSPRE").join("databases")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_when_settings_are_missing() {
        assert!(ServerConfig::from_settings(None).is_none());
        let config = ServerConfig::default();
        assert_eq!(config.completions.style, CompletionStyle::NameOnly);
        assert!(config.auto_open_siblings);
        assert!(config.databases.sources.is_empty());
    }

    #[test]
    fn reads_nested_dspre_section() {
        let settings = json!({
            "dspre": {
                "completions": { "style": "placeholders" },
                "databases": {
                    "directory": "/data/DSPRE/databases",
                    "sources": [{ "label": "My hack", "path": "/hacks/my_scrcmd_database.json" }],
                    "selected": "My hack"
                },
                "autoOpenSiblings": false
            }
        });
        let config = ServerConfig::from_settings(Some(&settings)).unwrap();
        assert_eq!(config.completions.style, CompletionStyle::Placeholders);
        assert_eq!(config.databases.sources.len(), 1);
        assert_eq!(config.databases.selected.as_deref(), Some("My hack"));
        assert!(!config.auto_open_siblings);
        assert_eq!(
            config.database_directory(),
            PathBuf::from("/data/DSPRE/databases")
        );
    }

    #[test]
    fn reads_top_level_settings_with_partial_fields() {
        let settings = json!({ "completions": { "style": "name-only" } });
        let config = ServerConfig::from_settings(Some(&settings)).unwrap();
        assert_eq!(config.completions.style, CompletionStyle::NameOnly);
        assert!(config.auto_open_siblings);
    }

    #[test]
    fn settings_push_keeps_command_selection() {
        let mut current = ServerConfig::default();
        current.databases.selected = Some("platinum".into());

        let pushed = json!({ "completions": { "style": "placeholders" } });
        let next = ServerConfig::from_settings(Some(&pushed))
            .unwrap()
            .keeping_selection(&current);
        assert_eq!(next.databases.selected.as_deref(), Some("platinum"));
        assert_eq!(next.completions.style, CompletionStyle::Placeholders);

        let explicit = json!({ "databases": { "selected": "hgss" } });
        let next = ServerConfig::from_settings(Some(&explicit))
            .unwrap()
            .keeping_selection(&current);
        assert_eq!(next.databases.selected.as_deref(), Some("hgss"));
    }

    #[test]
    fn rejects_unknown_completion_style() {
        let settings = json!({ "completions": { "style": "fancy" } });
        assert!(ServerConfig::from_settings(Some(&settings)).is_none());
    }
}
