use std::fmt;
use std::str::FromStr;

use num_traits::FromPrimitive;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use mealtime_core::WallTime;

/// The three fixed meal slots. The numeric codes double as display-name
/// references in event payloads; 0 is reserved as the invalid reference.
#[derive(
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Debug,
    Serialize,
    Deserialize,
    num_derive::FromPrimitive,
    num_derive::ToPrimitive,
)]
#[serde(rename_all = "lowercase")]
pub enum MealSlot {
    Breakfast = 1,
    Lunch = 2,
    Dinner = 3,
}

pub const ALL_SLOTS: [MealSlot; 3] = [MealSlot::Breakfast, MealSlot::Lunch, MealSlot::Dinner];

impl MealSlot {
    pub fn as_str(&self) -> &'static str {
        match self {
            MealSlot::Breakfast => "breakfast",
            MealSlot::Lunch => "lunch",
            MealSlot::Dinner => "dinner",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MealSlot::Breakfast => "Breakfast",
            MealSlot::Lunch => "Lunch",
            MealSlot::Dinner => "Dinner",
        }
    }

    pub fn name_ref(&self) -> u32 {
        *self as u32
    }
}

impl fmt::Display for MealSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown meal slot {0:?}, expected breakfast, lunch or dinner")]
pub struct UnknownSlot(String);

impl FromStr for MealSlot {
    type Err = UnknownSlot;

    fn from_str(s: &str) -> Result<Self, UnknownSlot> {
        match s.trim().to_ascii_lowercase().as_str() {
            "breakfast" => Ok(MealSlot::Breakfast),
            "lunch" => Ok(MealSlot::Lunch),
            "dinner" => Ok(MealSlot::Dinner),
            _ => Err(UnknownSlot(s.to_string())),
        }
    }
}

/// Resolve a display-name reference from an event payload. Returns `None`
/// for 0 and unknown codes so callers fall back to the generic title.
pub fn display_name(name_ref: u32) -> Option<&'static str> {
    MealSlot::from_u32(name_ref).map(|slot| slot.label())
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ReminderSetting {
    pub slot: MealSlot,
    pub name_ref: u32,
    pub icon: String,
    #[serde(with = "walltime_str")]
    pub time: WallTime,
    pub lead_minutes: u32,
    pub enabled: bool,
}

impl ReminderSetting {
    fn new(slot: MealSlot, icon: &str, time: WallTime, lead_minutes: u32, enabled: bool) -> Self {
        Self {
            slot,
            name_ref: slot.name_ref(),
            icon: icon.to_string(),
            time,
            lead_minutes,
            enabled,
        }
    }
}

/// Seed settings used on first start: one entry per slot, dinner off.
pub fn default_reminders() -> Vec<ReminderSetting> {
    let breakfast = WallTime::new(8, 0).expect("valid seed time");
    let lunch = WallTime::new(12, 30).expect("valid seed time");
    let dinner = WallTime::new(19, 0).expect("valid seed time");
    vec![
        ReminderSetting::new(MealSlot::Breakfast, "fas fa-sun", breakfast, 15, true),
        ReminderSetting::new(MealSlot::Lunch, "fas fa-cloud-sun", lunch, 15, true),
        ReminderSetting::new(MealSlot::Dinner, "fas fa-moon", dinner, 30, false),
    ]
}

/// Persist `WallTime` as its "HH:MM" form.
mod walltime_str {
    use super::WallTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &WallTime, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&time.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<WallTime, D::Error> {
        let s = String::deserialize(de)?;
        s.parse().map_err(de::Error::custom)
    }
}
