use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::alerts::AlertConfig;
use crate::reminders::{default_reminders, ReminderSetting};
use crate::repository::{default_food_options, sample_meal_history, MealRecord};

const FILE_PREFS: &str = "prefs.json";
const FILE_REMINDERS: &str = "reminders.json";
const FILE_MEALS: &str = "meals.json";
const FILE_FOOD_OPTIONS: &str = "food_options.json";
const FILE_ALERTS: &str = "alert_config.json";

pub const DEFAULT_NICKNAME: &str = "User";
pub const DEFAULT_LANGUAGE: &str = "en";

/// User preferences kept outside the repository proper.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Prefs {
    #[serde(rename = "key_first_launch")]
    pub first_launch: bool,
    #[serde(rename = "key_nickname")]
    pub nickname: String,
    pub language: String,
}

impl Default for Prefs {
    fn default() -> Self {
        Self {
            first_launch: true,
            nickname: DEFAULT_NICKNAME.to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
        }
    }
}

/// JSON-file persistence under a single data directory. Loads fall back to
/// seed data when a file is missing or unreadable; saves log and continue so
/// a full disk never takes the reminders down.
pub struct Storage {
    dir: PathBuf,
}

impl Storage {
    pub fn new(dir: Option<PathBuf>) -> Self {
        let dir = dir.unwrap_or_else(default_data_dir);
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn load_prefs(&self) -> Prefs {
        self.load_json(FILE_PREFS).unwrap_or_default()
    }

    pub fn save_prefs(&self, prefs: &Prefs) {
        self.save_json(FILE_PREFS, prefs);
    }

    pub fn load_reminders(&self) -> Vec<ReminderSetting> {
        self.load_json(FILE_REMINDERS)
            .unwrap_or_else(default_reminders)
    }

    pub fn save_reminders(&self, reminders: &[ReminderSetting]) {
        self.save_json(FILE_REMINDERS, &reminders);
    }

    pub fn load_meal_history(&self) -> Vec<MealRecord> {
        self.load_json(FILE_MEALS).unwrap_or_else(sample_meal_history)
    }

    pub fn save_meal_history(&self, history: &[MealRecord]) {
        self.save_json(FILE_MEALS, &history);
    }

    pub fn load_food_options(&self) -> Vec<String> {
        self.load_json(FILE_FOOD_OPTIONS)
            .unwrap_or_else(default_food_options)
    }

    pub fn save_food_options(&self, options: &[String]) {
        self.save_json(FILE_FOOD_OPTIONS, &options);
    }

    pub fn load_alert_config(&self) -> AlertConfig {
        self.load_json(FILE_ALERTS).unwrap_or_default()
    }

    pub fn save_alert_config(&self, config: &AlertConfig) {
        self.save_json(FILE_ALERTS, config);
    }

    fn path(&self, file: &str) -> PathBuf {
        self.dir.join(file)
    }

    fn load_json<T: DeserializeOwned>(&self, file: &str) -> Option<T> {
        let data = fs::read_to_string(self.path(file)).ok()?;
        match serde_json::from_str(&data) {
            Ok(value) => Some(value),
            Err(e) => {
                log::warn!("Ignoring malformed {}: {}", file, e);
                None
            }
        }
    }

    fn save_json<T: Serialize>(&self, file: &str, value: &T) {
        if let Err(e) = fs::create_dir_all(&self.dir) {
            log::error!("Failed to create {}: {}", self.dir.display(), e);
            return;
        }
        let data = match serde_json::to_string_pretty(value) {
            Ok(data) => data,
            Err(e) => {
                log::error!("Failed to encode {}: {}", file, e);
                return;
            }
        };
        if let Err(e) = fs::write(self.path(file), data) {
            log::error!("Failed to save {}: {}", file, e);
        }
    }
}

fn default_data_dir() -> PathBuf {
    match dirs::data_dir() {
        Some(dir) => dir.join("mealtime"),
        None => PathBuf::from(".mealtime"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reminders::MealSlot;
    use mealtime_core::WallTime;

    fn temp_storage() -> (tempfile::TempDir, Storage) {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(Some(dir.path().to_path_buf()));
        (dir, storage)
    }

    #[test]
    fn test_missing_files_yield_seed_data() {
        let (_dir, storage) = temp_storage();
        assert_eq!(storage.load_prefs(), Prefs::default());
        assert_eq!(storage.load_reminders(), default_reminders());
        assert_eq!(storage.load_food_options(), default_food_options());
        assert_eq!(storage.load_meal_history().len(), 3);
    }

    #[test]
    fn test_prefs_round_trip() {
        let (_dir, storage) = temp_storage();
        let prefs = Prefs {
            first_launch: false,
            nickname: "Sam".to_string(),
            language: "ja".to_string(),
        };
        storage.save_prefs(&prefs);
        assert_eq!(storage.load_prefs(), prefs);
    }

    #[test]
    fn test_prefs_use_stable_key_names() {
        let (dir, storage) = temp_storage();
        storage.save_prefs(&Prefs::default());
        let raw = fs::read_to_string(dir.path().join(FILE_PREFS)).unwrap();
        assert!(raw.contains("key_first_launch"));
        assert!(raw.contains("key_nickname"));
    }

    #[test]
    fn test_reminders_round_trip() {
        let (_dir, storage) = temp_storage();
        let mut reminders = default_reminders();
        reminders[0].time = WallTime::new(9, 45).unwrap();
        reminders[0].enabled = false;
        storage.save_reminders(&reminders);
        let loaded = storage.load_reminders();
        assert_eq!(loaded, reminders);
        assert_eq!(loaded[0].slot, MealSlot::Breakfast);
    }

    #[test]
    fn test_saved_empty_history_stays_empty() {
        let (_dir, storage) = temp_storage();
        storage.save_meal_history(&[]);
        assert!(storage.load_meal_history().is_empty());
    }

    #[test]
    fn test_corrupt_file_falls_back_to_defaults() {
        let (dir, storage) = temp_storage();
        fs::write(dir.path().join(FILE_REMINDERS), "not json").unwrap();
        assert_eq!(storage.load_reminders(), default_reminders());
    }
}
