use std::sync::Arc;

use chrono::{DateTime, Duration, Local};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use mealtime_core::WallTime;

use crate::reminders::{default_reminders, MealSlot, ReminderSetting};
use crate::seasonal::{current_solar_term, SolarTerm};

const CHANGE_CHANNEL_CAPACITY: usize = 64;

pub type ChangeSender = broadcast::Sender<RepositoryChange>;
pub type ChangeReceiver = broadcast::Receiver<RepositoryChange>;

#[derive(Debug, Clone, PartialEq)]
pub enum RepositoryChange {
    DidUpdateFoodOptions,
    DidAddMealRecord { id: String },
    DidUpdateReminder { slot: MealSlot },
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MealRecord {
    pub id: String,
    pub name: String,
    pub cost: f64,
    pub taste: String,
    pub eaten_at: DateTime<Local>,
}

struct RepoState {
    food_options: Vec<String>,
    meal_history: Vec<MealRecord>,
    reminders: Vec<ReminderSetting>,
    solar_term: SolarTerm,
}

/// In-memory data store for food options, meal history, reminder settings
/// and the current solar term. Handles are cheap clones over shared state;
/// mutations publish typed change events to subscribers.
#[derive(Clone)]
pub struct FoodRepository {
    inner: Arc<RwLock<RepoState>>,
    change_tx: ChangeSender,
}

impl FoodRepository {
    /// Repository with the stock seed data.
    #[cfg(test)]
    pub fn seeded() -> Self {
        Self::from_parts(
            default_food_options(),
            sample_meal_history(),
            default_reminders(),
        )
    }

    /// Repository over previously saved data (missing pieces already
    /// defaulted by the caller).
    pub fn from_parts(
        food_options: Vec<String>,
        meal_history: Vec<MealRecord>,
        reminders: Vec<ReminderSetting>,
    ) -> Self {
        let (change_tx, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(RwLock::new(RepoState {
                food_options,
                meal_history,
                reminders,
                solar_term: current_solar_term(),
            })),
            change_tx,
        }
    }

    pub fn subscribe(&self) -> ChangeReceiver {
        self.change_tx.subscribe()
    }

    pub fn food_options(&self) -> Vec<String> {
        self.inner.read().food_options.clone()
    }

    /// Add one option; blank and duplicate entries are ignored.
    pub fn add_food_option(&self, option: &str) -> bool {
        let option = option.trim();
        if option.is_empty() {
            return false;
        }
        {
            let mut state = self.inner.write();
            if state.food_options.iter().any(|o| o == option) {
                return false;
            }
            state.food_options.push(option.to_string());
        }
        let _ = self.change_tx.send(RepositoryChange::DidUpdateFoodOptions);
        true
    }

    pub fn remove_food_option(&self, option: &str) -> bool {
        let removed = {
            let mut state = self.inner.write();
            let before = state.food_options.len();
            state.food_options.retain(|o| o != option);
            state.food_options.len() != before
        };
        if removed {
            let _ = self.change_tx.send(RepositoryChange::DidUpdateFoodOptions);
        }
        removed
    }

    pub fn meal_history(&self) -> Vec<MealRecord> {
        self.inner.read().meal_history.clone()
    }

    pub fn add_meal_record(&self, name: &str, cost: f64, taste: &str) -> MealRecord {
        let record = MealRecord {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            cost,
            taste: taste.to_string(),
            eaten_at: Local::now(),
        };
        self.inner.write().meal_history.push(record.clone());
        let _ = self.change_tx.send(RepositoryChange::DidAddMealRecord {
            id: record.id.clone(),
        });
        record
    }

    pub fn reminders(&self) -> Vec<ReminderSetting> {
        self.inner.read().reminders.clone()
    }

    pub fn reminder(&self, slot: MealSlot) -> Option<ReminderSetting> {
        self.inner
            .read()
            .reminders
            .iter()
            .find(|r| r.slot == slot)
            .cloned()
    }

    /// Update time, lead time and enabled flag in place; returns the updated
    /// setting, or `None` for a slot that is not seeded (cannot happen with
    /// the stock set).
    pub fn update_reminder(
        &self,
        slot: MealSlot,
        time: WallTime,
        lead_minutes: u32,
        enabled: bool,
    ) -> Option<ReminderSetting> {
        let updated = {
            let mut state = self.inner.write();
            let setting = state.reminders.iter_mut().find(|r| r.slot == slot)?;
            setting.time = time;
            setting.lead_minutes = lead_minutes;
            setting.enabled = enabled;
            setting.clone()
        };
        let _ = self
            .change_tx
            .send(RepositoryChange::DidUpdateReminder { slot });
        Some(updated)
    }

    pub fn set_reminder_enabled(&self, slot: MealSlot, enabled: bool) -> Option<ReminderSetting> {
        let updated = {
            let mut state = self.inner.write();
            let setting = state.reminders.iter_mut().find(|r| r.slot == slot)?;
            setting.enabled = enabled;
            setting.clone()
        };
        let _ = self
            .change_tx
            .send(RepositoryChange::DidUpdateReminder { slot });
        Some(updated)
    }

    pub fn solar_term(&self) -> SolarTerm {
        self.inner.read().solar_term.clone()
    }
}

pub fn default_food_options() -> Vec<String> {
    ["Burger", "Pizza", "Sushi", "Pasta", "Salad", "Sandwich", "Taco", "Ramen"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// A few records so history screens are not empty on first start.
pub fn sample_meal_history() -> Vec<MealRecord> {
    let now = Local::now();
    let sample = |name: &str, cost: f64, taste: &str, days_ago: i64| MealRecord {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        cost,
        taste: taste.to_string(),
        eaten_at: now - Duration::days(days_ago),
    };
    vec![
        sample("Chicken Rice", 12.0, "Medium", 1),
        sample("Sandwich", 8.0, "Salty", 3),
        sample("Ramen", 15.0, "Light", 30),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_food_option_skips_blank_and_duplicate() {
        let repo = FoodRepository::seeded();
        let count = repo.food_options().len();

        assert!(!repo.add_food_option("  "));
        assert!(!repo.add_food_option("Burger"));
        assert_eq!(repo.food_options().len(), count);

        assert!(repo.add_food_option("Curry"));
        assert_eq!(repo.food_options().len(), count + 1);
    }

    #[test]
    fn test_remove_food_option() {
        let repo = FoodRepository::seeded();
        assert!(repo.remove_food_option("Pizza"));
        assert!(!repo.remove_food_option("Pizza"));
        assert!(!repo.food_options().contains(&"Pizza".to_string()));
    }

    #[test]
    fn test_add_meal_record_appends_with_fresh_id() {
        let repo = FoodRepository::seeded();
        let before = repo.meal_history().len();
        let record = repo.add_meal_record("Udon", 9.5, "Light");
        let history = repo.meal_history();
        assert_eq!(history.len(), before + 1);
        assert_eq!(history.last().unwrap(), &record);
        assert!(!record.id.is_empty());
        assert!(history[..before].iter().all(|r| r.id != record.id));
    }

    #[test]
    fn test_update_reminder_touches_only_target_slot() {
        let repo = FoodRepository::seeded();
        let time = WallTime::new(7, 15).unwrap();
        let updated = repo
            .update_reminder(MealSlot::Breakfast, time, 5, false)
            .unwrap();
        assert_eq!(updated.time, time);
        assert_eq!(updated.lead_minutes, 5);
        assert!(!updated.enabled);

        let lunch = repo.reminder(MealSlot::Lunch).unwrap();
        assert_eq!(lunch.time, WallTime::new(12, 30).unwrap());
        assert!(lunch.enabled);
    }

    #[test]
    fn test_changes_are_broadcast() {
        let repo = FoodRepository::seeded();
        let mut rx = repo.subscribe();

        repo.add_meal_record("Soup", 4.0, "Light");
        match rx.try_recv().unwrap() {
            RepositoryChange::DidAddMealRecord { id } => assert!(!id.is_empty()),
            other => panic!("unexpected change {:?}", other),
        }

        repo.set_reminder_enabled(MealSlot::Dinner, true).unwrap();
        assert_eq!(
            rx.try_recv().unwrap(),
            RepositoryChange::DidUpdateReminder {
                slot: MealSlot::Dinner
            }
        );
    }
}
