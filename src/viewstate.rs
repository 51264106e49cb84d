use std::sync::Arc;

use chrono::{NaiveDateTime, Timelike};
use rand::Rng;

use mealtime_core::{format_countdown, greeting_for_hour, MonthKey, WallTime};

use crate::picker::{PickerError, PickerState, SpinResult};
use crate::reminders::{MealSlot, ReminderSetting, ALL_SLOTS};
use crate::repository::{FoodRepository, MealRecord};
use crate::scheduler::{AlarmScheduler, Clock};
use crate::seasonal::SolarTerm;
use crate::storage::{Prefs, Storage};

pub const SUPPORTED_LANGUAGES: [&str; 4] = ["en", "zh-CN", "zh-TW", "ja"];

#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("meal name must not be blank")]
    BlankName,
    #[error("cost must not be negative")]
    NegativeCost,
    #[error("unsupported language {0:?}")]
    UnsupportedLanguage(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NextMeal {
    pub slot: MealSlot,
    pub at: NaiveDateTime,
}

/// Screen-facing state and the mutations behind it. Mutations write through
/// to storage and keep the scheduler in step with the reminder settings.
pub struct ViewState {
    repository: FoodRepository,
    storage: Arc<Storage>,
    scheduler: Arc<AlarmScheduler>,
    clock: Arc<dyn Clock>,
    prefs: Prefs,
    show_nickname_dialog: bool,
    editing_reminder: Option<MealSlot>,
    month_filter: Option<MonthKey>,
    taste_filter: Option<String>,
    picker: PickerState,
}

impl ViewState {
    pub fn new(
        repository: FoodRepository,
        storage: Arc<Storage>,
        scheduler: Arc<AlarmScheduler>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let prefs = storage.load_prefs();
        let show_nickname_dialog = prefs.first_launch;
        Self {
            repository,
            storage,
            scheduler,
            clock,
            prefs,
            show_nickname_dialog,
            editing_reminder: None,
            month_filter: None,
            taste_filter: None,
            picker: PickerState::new(),
        }
    }

    pub fn nickname(&self) -> &str {
        &self.prefs.nickname
    }

    pub fn language(&self) -> &str {
        &self.prefs.language
    }

    pub fn greeting(&self) -> String {
        let bucket = greeting_for_hour(self.clock.now().hour());
        format!("{}, {}!", bucket.phrase(), self.prefs.nickname)
    }

    // Nickname dialog

    pub fn show_nickname_dialog(&self) -> bool {
        self.show_nickname_dialog
    }

    pub fn open_nickname_dialog(&mut self) {
        self.show_nickname_dialog = true;
    }

    /// Blank input keeps the current nickname; either way the first-launch
    /// flag is cleared and preferences are persisted.
    pub fn save_nickname(&mut self, name: &str) {
        let name = name.trim();
        if !name.is_empty() {
            self.prefs.nickname = name.to_string();
        }
        self.prefs.first_launch = false;
        self.show_nickname_dialog = false;
        self.storage.save_prefs(&self.prefs);
    }

    /// Dismissing on first launch still completes it, locking in the
    /// default nickname.
    pub fn dismiss_nickname_dialog(&mut self) {
        if self.prefs.first_launch {
            self.prefs.first_launch = false;
            self.storage.save_prefs(&self.prefs);
        }
        self.show_nickname_dialog = false;
    }

    pub fn set_language(&mut self, language: &str) -> Result<(), InputError> {
        let canonical = SUPPORTED_LANGUAGES
            .iter()
            .find(|l| l.eq_ignore_ascii_case(language.trim()))
            .ok_or_else(|| InputError::UnsupportedLanguage(language.to_string()))?;
        self.prefs.language = canonical.to_string();
        self.storage.save_prefs(&self.prefs);
        Ok(())
    }

    // Next meal

    /// Today's first meal whose time has not passed, in slot order; once the
    /// day is done, tomorrow's breakfast.
    pub fn next_meal(&self) -> Option<NextMeal> {
        let now = self.clock.now();
        let reminders = self.repository.reminders();
        for slot in ALL_SLOTS {
            if let Some(setting) = reminders.iter().find(|r| r.slot == slot) {
                let at = setting.time.on(now.date());
                if at > now {
                    return Some(NextMeal { slot, at });
                }
            }
        }
        let first = reminders
            .iter()
            .find(|r| r.slot == MealSlot::Breakfast)
            .or_else(|| reminders.first())?;
        let tomorrow = now.date().succ_opt()?;
        Some(NextMeal {
            slot: first.slot,
            at: first.time.on(tomorrow),
        })
    }

    pub fn countdown_to_next(&self) -> Option<(MealSlot, String)> {
        let next = self.next_meal()?;
        Some((next.slot, format_countdown(next.at - self.clock.now())))
    }

    // Meal history

    pub fn record_meal(&mut self, name: &str, cost: f64, taste: &str) -> Result<MealRecord, InputError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(InputError::BlankName);
        }
        if cost < 0.0 {
            return Err(InputError::NegativeCost);
        }
        let record = self.repository.add_meal_record(name, cost, taste.trim());
        self.storage.save_meal_history(&self.repository.meal_history());
        Ok(record)
    }

    /// History with the active filters applied, newest first.
    pub fn filtered_history(&self) -> Vec<MealRecord> {
        let mut records = self.repository.meal_history();
        if let Some(month) = &self.month_filter {
            records.retain(|r| month.contains(r.eaten_at.naive_local().date()));
        }
        if let Some(taste) = &self.taste_filter {
            records.retain(|r| r.taste.eq_ignore_ascii_case(taste));
        }
        records.sort_by(|a, b| b.eaten_at.cmp(&a.eaten_at));
        records
    }

    pub fn set_month_filter(&mut self, month: Option<MonthKey>) {
        self.month_filter = month;
    }

    /// "all" (any case) or blank clears the taste filter.
    pub fn set_taste_filter(&mut self, taste: &str) {
        let taste = taste.trim();
        if taste.is_empty() || taste.eq_ignore_ascii_case("all") {
            self.taste_filter = None;
        } else {
            self.taste_filter = Some(taste.to_string());
        }
    }

    pub fn clear_filters(&mut self) {
        self.month_filter = None;
        self.taste_filter = None;
    }

    pub fn month_filter(&self) -> Option<MonthKey> {
        self.month_filter
    }

    pub fn taste_filter(&self) -> Option<&str> {
        self.taste_filter.as_deref()
    }

    // Reminders

    pub fn reminders(&self) -> Vec<ReminderSetting> {
        self.repository.reminders()
    }

    pub fn editing_reminder(&self) -> Option<MealSlot> {
        self.editing_reminder
    }

    pub fn begin_reminder_edit(&mut self, slot: MealSlot) {
        self.editing_reminder = Some(slot);
    }

    pub fn cancel_reminder_edit(&mut self) {
        self.editing_reminder = None;
    }

    /// Persist the new setting and bring the pending timer in line with it.
    pub fn apply_reminder_edit(
        &mut self,
        slot: MealSlot,
        time: WallTime,
        lead_minutes: u32,
        enabled: bool,
    ) -> Option<ReminderSetting> {
        let updated = self
            .repository
            .update_reminder(slot, time, lead_minutes, enabled)?;
        self.storage.save_reminders(&self.repository.reminders());
        if updated.enabled {
            self.scheduler.schedule(&updated);
        } else {
            self.scheduler.cancel(slot);
        }
        self.editing_reminder = None;
        Some(updated)
    }

    pub fn set_reminder_enabled(&mut self, slot: MealSlot, enabled: bool) -> Option<ReminderSetting> {
        let updated = self.repository.set_reminder_enabled(slot, enabled)?;
        self.storage.save_reminders(&self.repository.reminders());
        if updated.enabled {
            self.scheduler.schedule(&updated);
        } else {
            self.scheduler.cancel(slot);
        }
        Some(updated)
    }

    // Food options and the picker

    pub fn food_options(&self) -> Vec<String> {
        self.repository.food_options()
    }

    pub fn add_food_option(&mut self, option: &str) -> bool {
        let added = self.repository.add_food_option(option);
        if added {
            self.storage.save_food_options(&self.repository.food_options());
        }
        added
    }

    pub fn remove_food_option(&mut self, option: &str) -> bool {
        let removed = self.repository.remove_food_option(option);
        if removed {
            self.storage.save_food_options(&self.repository.food_options());
        }
        removed
    }

    pub fn spin_picker<R: Rng>(&mut self, rng: &mut R) -> Result<SpinResult, PickerError> {
        self.picker.spin(rng, &self.repository.food_options())
    }

    pub fn picks_left(&self) -> usize {
        self.picker.picks_left()
    }

    pub fn last_pick(&self) -> Option<&str> {
        self.picker.last_pick()
    }

    pub fn solar_term(&self) -> SolarTerm {
        self.repository.solar_term()
    }
}
