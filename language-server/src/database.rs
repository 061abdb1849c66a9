use crate::catalog::CommandCatalog;
use crate::config::ServerConfig;
use crate::error::LoadError;
use parking_lot::RwLock;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use std::time::SystemTime;

const HEADER_SCAN_LINES: usize = 200;

static ROM_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*\*\s*Rom\s*ID:\s*(.+)$").expect("rom id pattern"));

static GAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*\*\s*Game:\s*(DP|Diamond\s*Pearl|Platinum|Plat|HGSS)\b")
        .expect("game pattern")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameVariant {
    DiamondPearl,
    Platinum,
    HeartGoldSoulSilver,
}

impl GameVariant {
    pub fn from_key(key: &str) -> Option<Self> {
        let normalized: String = key
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "hgss" | "heartgoldsoulsilver" => Some(GameVariant::HeartGoldSoulSilver),
            "plat" | "platinum" => Some(GameVariant::Platinum),
            "dp" | "diamondpearl" => Some(GameVariant::DiamondPearl),
            _ => None,
        }
    }

    pub fn database_file_name(self) -> &'static str {
        match self {
            GameVariant::DiamondPearl => "diamond_pearl_scrcmd_database.json",
            GameVariant::Platinum => "platinum_scrcmd_database.json",
            GameVariant::HeartGoldSoulSilver => "hgss_scrcmd_database.json",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RomInfo {
    pub rom_id: Option<String>,
    pub game: Option<GameVariant>,
}

pub fn detect_rom_info(lines: &[&str]) -> RomInfo {
    let mut info = RomInfo::default();
    for line in lines.iter().take(HEADER_SCAN_LINES) {
        if info.rom_id.is_none() {
            if let Some(caps) = ROM_ID.captures(line) {
                let id = caps[1].trim();
                if !id.is_empty() {
                    info.rom_id = Some(id.to_string());
                }
            }
        }
        if info.game.is_none() {
            if let Some(caps) = GAME.captures(line) {
                info.game = GameVariant::from_key(&caps[1]);
            }
        }
        if info.rom_id.is_some() && info.game.is_some() {
            break;
        }
    }
    info
}

pub fn candidate_paths(config: &ServerConfig, selected: Option<&str>, rom: &RomInfo) -> Vec<PathBuf> {
    let directory = config.database_directory();

    if let Some(selected) = selected.map(str::trim).filter(|s| !s.is_empty()) {
        if let Some(source) = config
            .databases
            .sources
            .iter()
            .find(|source| source.label == selected)
        {
            return vec![source.path.clone()];
        }
        if let Some(game) = GameVariant::from_key(selected) {
            return vec![directory.join(game.database_file_name())];
        }
        let path = PathBuf::from(selected);
        if path.is_absolute() {
            return vec![path];
        }
        return vec![directory.join(path)];
    }

    let mut candidates = Vec::new();
    if let Some(rom_id) = &rom.rom_id {
        candidates.push(
            directory
                .join("edited_databases")
                .join(format!("{}_scrcmd_database.json", rom_id)),
        );
    }
    if let Some(game) = rom.game {
        candidates.push(directory.join(game.database_file_name()));
    }
    candidates
}

type Stamp = (PathBuf, Option<SystemTime>);

fn stamp(paths: &[PathBuf]) -> Vec<Stamp> {
    paths
        .iter()
        .map(|path| {
            let modified = std::fs::metadata(path).and_then(|m| m.modified()).ok();
            (path.clone(), modified)
        })
        .collect()
}

struct Slot {
    key: Vec<Stamp>,
    catalog: Arc<CommandCatalog>,
}

/// Result of asking the store for a catalog. `error` is only set on the call
/// that actually (re)loaded, so a broken file is reported once per change.
pub struct LoadOutcome {
    pub catalog: Arc<CommandCatalog>,
    pub error: Option<LoadError>,
    pub reloaded: bool,
}

#[derive(Default)]
pub struct CatalogStore {
    slot: RwLock<Option<Slot>>,
}

impl CatalogStore {
    pub fn catalog_for(&self, candidates: &[PathBuf]) -> LoadOutcome {
        if candidates.is_empty() {
            return LoadOutcome {
                catalog: Arc::new(CommandCatalog::empty()),
                error: None,
                reloaded: false,
            };
        }

        let key = stamp(candidates);
        if let Some(slot) = self.slot.read().as_ref() {
            if slot.key == key {
                return LoadOutcome {
                    catalog: Arc::clone(&slot.catalog),
                    error: None,
                    reloaded: false,
                };
            }
        }

        let (catalog, error) = load_first(candidates);
        let catalog = Arc::new(catalog);
        *self.slot.write() = Some(Slot {
            key,
            catalog: Arc::clone(&catalog),
        });

        LoadOutcome {
            catalog,
            error,
            reloaded: true,
        }
    }

    pub fn current(&self) -> Option<Arc<CommandCatalog>> {
        self.slot
            .read()
            .as_ref()
            .map(|slot| Arc::clone(&slot.catalog))
    }

    pub fn invalidate(&self) {
        *self.slot.write() = None;
    }
}

fn load_first(candidates: &[PathBuf]) -> (CommandCatalog, Option<LoadError>) {
    let mut failure: Option<LoadError> = None;

    for path in candidates {
        match CommandCatalog::load(path) {
            Ok(catalog) => return (catalog, None),
            Err(err @ LoadError::NotFound { .. }) => {
                if failure.is_none() {
                    failure = Some(err);
                }
            }
            Err(err) => {
                let have_broken = matches!(&failure, Some(f) if !matches!(f, LoadError::NotFound { .. }));
                if !have_broken {
                    failure = Some(err);
                }
            }
        }
    }

    (CommandCatalog::empty(), failure)
}

pub fn describe_source(catalog: &CommandCatalog) -> String {
    match catalog.source() {
        Some(path) => display_name(path),
        None => "(none)".to_string(),
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseSource;
    use serde_json::json;
    use std::fs;

    fn config_in(dir: &Path) -> ServerConfig {
        let mut config = ServerConfig::default();
        config.databases.directory = Some(dir.to_path_buf());
        config
    }

    fn write_db(path: &Path, name: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        let body = json!({ "scrcmd": { "0x0002": { "name": name } } });
        fs::write(path, body.to_string()).unwrap();
    }

    #[test]
    fn detects_rom_banner() {
        let lines = [
            "/*",
            " * Rom ID: Renegade Platinum ",
            " * Game: Platinum",
            " */",
        ];
        let info = detect_rom_info(&lines);
        assert_eq!(info.rom_id.as_deref(), Some("Renegade Platinum"));
        assert_eq!(info.game, Some(GameVariant::Platinum));
    }

    #[test]
    fn detects_game_spellings() {
        assert_eq!(
            detect_rom_info(&[" * Game: Diamond Pearl"]).game,
            Some(GameVariant::DiamondPearl)
        );
        assert_eq!(
            detect_rom_info(&[" * game: hgss"]).game,
            Some(GameVariant::HeartGoldSoulSilver)
        );
        assert_eq!(detect_rom_info(&[" * Game: Emerald"]).game, None);
    }

    #[test]
    fn ignores_banner_past_scan_window() {
        let mut lines = vec![""; HEADER_SCAN_LINES];
        lines.push(" * Game: DP");
        assert_eq!(detect_rom_info(&lines).game, None);
    }

    #[test]
    fn candidates_try_override_then_base() {
        let config = config_in(Path::new("/db"));
        let rom = RomInfo {
            rom_id: Some("CPUE".into()),
            game: Some(GameVariant::Platinum),
        };
        assert_eq!(
            candidate_paths(&config, None, &rom),
            vec![
                PathBuf::from("/db/edited_databases/CPUE_scrcmd_database.json"),
                PathBuf::from("/db/platinum_scrcmd_database.json"),
            ]
        );
    }

    #[test]
    fn explicit_selection_wins_over_detection() {
        let mut config = config_in(Path::new("/db"));
        config.databases.sources.push(DatabaseSource {
            label: "hack".into(),
            path: PathBuf::from("/hacks/hack.json"),
        });
        let rom = RomInfo {
            rom_id: None,
            game: Some(GameVariant::Platinum),
        };
        assert_eq!(
            candidate_paths(&config, Some("hack"), &rom),
            vec![PathBuf::from("/hacks/hack.json")]
        );
        assert_eq!(
            candidate_paths(&config, Some("hgss"), &rom),
            vec![PathBuf::from("/db/hgss_scrcmd_database.json")]
        );
        assert_eq!(
            candidate_paths(&config, Some("custom.json"), &rom),
            vec![PathBuf::from("/db/custom.json")]
        );
    }

    #[test]
    fn store_prefers_override_and_falls_back_to_base() {
        let dir = tempfile::tempdir().unwrap();
        let edited = dir.path().join("edited_databases/CPUE_scrcmd_database.json");
        let base = dir.path().join("platinum_scrcmd_database.json");
        write_db(&base, "BaseEnd");

        let store = CatalogStore::default();
        let outcome = store.catalog_for(&[edited.clone(), base.clone()]);
        assert!(outcome.error.is_none());
        assert!(outcome.catalog.find_by_name("BaseEnd").is_some());

        write_db(&edited, "EditedEnd");
        store.invalidate();
        let outcome = store.catalog_for(&[edited.clone(), base]);
        assert!(outcome.reloaded);
        assert!(outcome.catalog.find_by_name("EditedEnd").is_some());
        assert_eq!(outcome.catalog.source(), Some(edited.as_path()));
    }

    #[test]
    fn store_reuses_unchanged_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("hgss_scrcmd_database.json");
        write_db(&base, "End");

        let store = CatalogStore::default();
        let first = store.catalog_for(&[base.clone()]);
        let second = store.catalog_for(&[base]);
        assert!(first.reloaded);
        assert!(!second.reloaded);
        assert!(Arc::ptr_eq(&first.catalog, &second.catalog));
    }

    #[test]
    fn broken_database_degrades_to_empty_and_reports_once() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("platinum_scrcmd_database.json");
        fs::write(&base, "{ nope").unwrap();

        let store = CatalogStore::default();
        let first = store.catalog_for(&[base.clone()]);
        assert!(first.catalog.is_empty());
        assert!(matches!(first.error, Some(LoadError::Json { .. })));

        let second = store.catalog_for(&[base]);
        assert!(second.error.is_none());
        assert!(second.catalog.is_empty());
    }

    #[test]
    fn missing_everything_reports_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = CatalogStore::default();
        let outcome = store.catalog_for(&[dir.path().join("missing.json")]);
        assert!(matches!(outcome.error, Some(LoadError::NotFound { .. })));
        assert_eq!(describe_source(&outcome.catalog), "(none)");
    }

    #[test]
    fn no_candidates_is_silent() {
        let store = CatalogStore::default();
        let outcome = store.catalog_for(&[]);
        assert!(outcome.catalog.is_empty());
        assert!(outcome.error.is_none());
        assert!(store.current().is_none());
    }
}
