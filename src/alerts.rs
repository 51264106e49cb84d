use std::io::Write;

use notify_rust::{Notification, Urgency};
use serde::{Deserialize, Serialize};

use crate::reminders;

/// Title used when a payload carries a name reference we cannot resolve.
pub const FALLBACK_TITLE: &str = "Meal Time";
pub const DEFAULT_MESSAGE: &str = "It is time for your meal. Enjoy!";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub vibration: bool,
    pub audio: bool,
    pub notification: bool,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            vibration: true,
            audio: false,
            notification: true,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AlertError {
    #[error("notification backend: {0}")]
    Notify(#[from] notify_rust::error::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CardState {
    Shown,
    Dismissed,
}

/// One full-screen reminder presentation. Starts out shown; dismissal is
/// terminal and repeat dismissals are no-ops.
#[derive(Clone, Debug)]
pub struct ReminderCard {
    title: String,
    message: String,
    state: CardState,
}

impl ReminderCard {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            state: CardState::Shown,
        }
    }

    /// Card for a fired payload; unresolvable name references get the
    /// generic title instead of failing the presentation.
    pub fn for_name_ref(name_ref: u32) -> Self {
        let title = reminders::display_name(name_ref).unwrap_or(FALLBACK_TITLE);
        Self::new(title, DEFAULT_MESSAGE)
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn state(&self) -> CardState {
        self.state
    }

    /// Returns true only on the transition out of `Shown`.
    pub fn dismiss(&mut self) -> bool {
        if self.state == CardState::Dismissed {
            return false;
        }
        self.state = CardState::Dismissed;
        true
    }
}

/// A way of getting a reminder in front of the user. Implementations must
/// tolerate being called from worker tasks.
pub trait ReminderPresenter: Send + Sync {
    fn notify(&self, card: &ReminderCard) -> Result<(), AlertError>;
    fn buzz(&self) -> Result<(), AlertError>;
}

/// Prints the card to stdout; buzz maps to the terminal bell.
pub struct ConsolePresenter;

impl ReminderPresenter for ConsolePresenter {
    fn notify(&self, card: &ReminderCard) -> Result<(), AlertError> {
        let mut out = std::io::stdout();
        out.write_all(crate::ui::render_reminder_card(card).as_bytes())?;
        out.flush()?;
        Ok(())
    }

    fn buzz(&self) -> Result<(), AlertError> {
        let mut out = std::io::stdout();
        out.write_all(b"\x07\x07")?;
        out.flush()?;
        Ok(())
    }
}

/// Sends a desktop notification at critical urgency so it stays on screen
/// until acknowledged.
pub struct DesktopPresenter {
    app_name: String,
}

impl DesktopPresenter {
    pub fn new() -> Self {
        Self {
            app_name: "mealtime".to_string(),
        }
    }
}

impl ReminderPresenter for DesktopPresenter {
    fn notify(&self, card: &ReminderCard) -> Result<(), AlertError> {
        Notification::new()
            .appname(&self.app_name)
            .summary(card.title())
            .body(card.message())
            .icon("dialog-information")
            .urgency(Urgency::Critical)
            .show()?;
        Ok(())
    }

    fn buzz(&self) -> Result<(), AlertError> {
        Ok(())
    }
}

/// Route one reminder through every configured channel. Failures are logged
/// and never stop the remaining channels.
pub fn fire_alert(config: &AlertConfig, presenters: &[Box<dyn ReminderPresenter>], card: &ReminderCard) {
    for presenter in presenters {
        if config.vibration {
            if let Err(e) = presenter.buzz() {
                log::warn!("Vibration cue failed: {}", e);
            }
        }
        if config.notification {
            if let Err(e) = presenter.notify(card) {
                log::warn!("Notification failed: {}", e);
            }
        }
    }
    // No sound backend is wired up for config.audio yet.
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct Counters {
        notified: AtomicUsize,
        buzzed: AtomicUsize,
    }

    struct RecordingPresenter(Arc<Counters>);

    impl ReminderPresenter for RecordingPresenter {
        fn notify(&self, _card: &ReminderCard) -> Result<(), AlertError> {
            self.0.notified.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn buzz(&self) -> Result<(), AlertError> {
            self.0.buzzed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_card_dismiss_is_terminal() {
        let mut card = ReminderCard::new("Lunch", DEFAULT_MESSAGE);
        assert_eq!(card.state(), CardState::Shown);
        assert!(card.dismiss());
        assert_eq!(card.state(), CardState::Dismissed);
        assert!(!card.dismiss());
        assert_eq!(card.state(), CardState::Dismissed);
    }

    #[test]
    fn test_card_falls_back_on_unknown_name_ref() {
        assert_eq!(ReminderCard::for_name_ref(2).title(), "Lunch");
        assert_eq!(ReminderCard::for_name_ref(0).title(), FALLBACK_TITLE);
        assert_eq!(ReminderCard::for_name_ref(99).title(), FALLBACK_TITLE);
    }

    #[test]
    fn test_fire_alert_honors_channel_config() {
        let card = ReminderCard::for_name_ref(1);
        let counters = Arc::new(Counters::default());
        let presenters: Vec<Box<dyn ReminderPresenter>> =
            vec![Box::new(RecordingPresenter(counters.clone()))];

        let silent = AlertConfig {
            vibration: false,
            audio: false,
            notification: false,
        };
        fire_alert(&silent, &presenters, &card);
        assert_eq!(counters.notified.load(Ordering::SeqCst), 0);
        assert_eq!(counters.buzzed.load(Ordering::SeqCst), 0);

        fire_alert(&AlertConfig::default(), &presenters, &card);
        assert_eq!(counters.notified.load(Ordering::SeqCst), 1);
        assert_eq!(counters.buzzed.load(Ordering::SeqCst), 1);

        let notify_only = AlertConfig {
            vibration: false,
            audio: false,
            notification: true,
        };
        fire_alert(&notify_only, &presenters, &card);
        assert_eq!(counters.notified.load(Ordering::SeqCst), 2);
        assert_eq!(counters.buzzed.load(Ordering::SeqCst), 1);
    }
}
