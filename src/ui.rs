use std::fmt::Write;

use mealtime_core::MonthKey;

use crate::alerts::ReminderCard;
use crate::picker::SpinResult;
use crate::reminders::ReminderSetting;
use crate::repository::MealRecord;
use crate::seasonal::SolarTerm;
use crate::viewstate::ViewState;

const RULE: &str = "========================================";

pub fn render_home(state: &ViewState) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", RULE);
    let _ = writeln!(out, "  MEALTIME");
    let _ = writeln!(out, "{}", RULE);
    let _ = writeln!(out, "{}", state.greeting());
    let _ = writeln!(out);

    match state.countdown_to_next() {
        Some((slot, countdown)) => {
            // next_meal is Some whenever countdown_to_next is.
            if let Some(next) = state.next_meal() {
                let _ = writeln!(
                    out,
                    "Next meal: {} at {} (in {})",
                    slot.label(),
                    next.at.format("%H:%M"),
                    countdown
                );
            }
        }
        None => {
            let _ = writeln!(out, "No reminders configured.");
        }
    }

    let term = state.solar_term();
    let _ = writeln!(out, "Solar term: {}", term.name);
    let _ = writeln!(out);

    let _ = writeln!(out, "Reminders:");
    out.push_str(&render_reminder_lines(&state.reminders()));
    let _ = writeln!(out);
    let _ = writeln!(out, "Picker spins left: {}", state.picks_left());
    if let Some(pick) = state.last_pick() {
        let _ = writeln!(out, "Last pick: {}", pick);
    }
    out
}

pub fn render_history(
    records: &[MealRecord],
    month: Option<MonthKey>,
    taste: Option<&str>,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", RULE);
    let _ = writeln!(out, "  MEAL HISTORY");
    let _ = writeln!(out, "{}", RULE);

    match (month, taste) {
        (None, None) => {}
        (month, taste) => {
            let month = month.map(|m| m.to_string()).unwrap_or_else(|| "any".to_string());
            let _ = writeln!(out, "Filters: month={}  taste={}", month, taste.unwrap_or("any"));
        }
    }

    if records.is_empty() {
        let _ = writeln!(out, "No meals recorded.");
        return out;
    }

    let mut total = 0.0;
    for record in records {
        total += record.cost;
        let _ = writeln!(
            out,
            "{}  {:<20} ${:>7.2}  {}",
            record.eaten_at.format("%Y-%m-%d %H:%M"),
            record.name,
            record.cost,
            record.taste
        );
    }
    let _ = writeln!(out, "{} meal(s), ${:.2} total", records.len(), total);
    out
}

pub fn render_seasonal(term: &SolarTerm) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", RULE);
    let _ = writeln!(out, "  SEASONAL TIPS: {}", term.name.to_uppercase());
    let _ = writeln!(out, "{}", RULE);
    let _ = writeln!(out, "{}", term.description);
    let _ = writeln!(out);

    let _ = writeln!(out, "Recommended now:");
    for food in &term.recommended_foods {
        let _ = writeln!(out, "  {:<16} {}", food.name, food.description);
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "Better to avoid:");
    for food in &term.avoid_foods {
        let _ = writeln!(out, "  {:<16} {}", food.name, food.description);
    }
    out
}

pub fn render_reminders(reminders: &[ReminderSetting]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", RULE);
    let _ = writeln!(out, "  REMINDERS");
    let _ = writeln!(out, "{}", RULE);
    out.push_str(&render_reminder_lines(reminders));
    out
}

fn render_reminder_lines(reminders: &[ReminderSetting]) -> String {
    let mut out = String::new();
    for setting in reminders {
        let status = if setting.enabled { "[ON] " } else { "[OFF]" };
        let _ = writeln!(
            out,
            "  {:<10} {}  lead {:>2}m  {}",
            setting.slot.label(),
            setting.time,
            setting.lead_minutes,
            status
        );
    }
    out
}

/// The full-screen card a fired reminder puts up.
pub fn render_reminder_card(card: &ReminderCard) -> String {
    let mut out = String::new();
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", RULE);
    let _ = writeln!(out, "  *** {} ***", card.title().to_uppercase());
    let _ = writeln!(out);
    let _ = writeln!(out, "  {}", card.message());
    let _ = writeln!(out, "{}", RULE);
    let _ = writeln!(out, "Type 'dismiss' to acknowledge.");
    out
}

pub fn render_pick(result: &SpinResult, picks_left: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "How about: {}", result.chosen);
    let _ = writeln!(out, "Spins left this session: {}", picks_left);
    out
}
