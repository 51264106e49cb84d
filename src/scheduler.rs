use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDateTime, Timelike};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use mealtime_core::next_occurrence;

use crate::delivery::DeliveryEvent;
use crate::reminders::{MealSlot, ReminderSetting};

/// What the platform lets us do. Flags start from the command line; a real
/// port would query the OS instead.
#[derive(Clone, Copy, Debug)]
pub struct Capabilities {
    pub exact_timers: bool,
    pub notifications: bool,
    pub overlay: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            exact_timers: true,
            notifications: true,
            overlay: true,
        }
    }
}

/// Data carried from the moment of scheduling to the moment of delivery.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderPayload {
    pub reminder_id: String,
    pub name_ref: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScheduleMode {
    Exact,
    Inexact,
}

impl ScheduleMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleMode::Exact => "exact",
            ScheduleMode::Inexact => "inexact",
        }
    }
}

pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// One-shot wall-clock timers keyed by meal slot. Scheduling a slot that
/// already has a pending timer replaces it; cancel on an idle slot is a
/// no-op. Neither operation can fail.
pub trait TimerService: Send + Sync {
    fn schedule(&self, slot: MealSlot, at: NaiveDateTime, payload: ReminderPayload) -> ScheduleMode;
    fn cancel(&self, slot: MealSlot);
}

/// Computes each reminder's next firing instant and hands it to the timer
/// service.
pub struct AlarmScheduler {
    service: Arc<dyn TimerService>,
    clock: Arc<dyn Clock>,
}

impl AlarmScheduler {
    pub fn new(service: Arc<dyn TimerService>, clock: Arc<dyn Clock>) -> Self {
        Self { service, clock }
    }

    pub fn with_system_clock(service: Arc<dyn TimerService>) -> Self {
        Self::new(service, Arc::new(SystemClock))
    }

    pub fn schedule(&self, setting: &ReminderSetting) -> ScheduleMode {
        let at = next_occurrence(self.clock.now(), setting.time);
        let payload = ReminderPayload {
            reminder_id: setting.slot.as_str().to_string(),
            name_ref: setting.name_ref,
        };
        let mode = self.service.schedule(setting.slot, at, payload);
        log::info!("Scheduled {} for {} ({})", setting.slot, at, mode.as_str());
        mode
    }

    pub fn cancel(&self, slot: MealSlot) {
        self.service.cancel(slot);
    }

    /// Arm every enabled reminder; returns how many were armed.
    pub fn schedule_enabled(&self, reminders: &[ReminderSetting]) -> usize {
        let mut armed = 0;
        for setting in reminders.iter().filter(|r| r.enabled) {
            self.schedule(setting);
            armed += 1;
        }
        armed
    }
}

struct Pending {
    generation: u64,
    handle: JoinHandle<()>,
}

/// Timer service backed by tokio sleep tasks. Fired timers push a delivery
/// event on the shared channel.
pub struct TokioTimerService {
    capabilities: Capabilities,
    events: mpsc::UnboundedSender<DeliveryEvent>,
    pending: Arc<Mutex<HashMap<MealSlot, Pending>>>,
    next_generation: AtomicU64,
}

impl TokioTimerService {
    pub fn new(capabilities: Capabilities, events: mpsc::UnboundedSender<DeliveryEvent>) -> Self {
        Self {
            capabilities,
            events,
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_generation: AtomicU64::new(0),
        }
    }

    #[cfg(test)]
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    #[cfg(test)]
    pub fn has_pending(&self, slot: MealSlot) -> bool {
        self.pending.lock().contains_key(&slot)
    }

    /// Without the exact-timer capability targets degrade to whole-minute
    /// alignment.
    fn align(&self, at: NaiveDateTime) -> (NaiveDateTime, ScheduleMode) {
        if self.capabilities.exact_timers {
            (at, ScheduleMode::Exact)
        } else {
            (at.with_second(0).unwrap_or(at), ScheduleMode::Inexact)
        }
    }
}

impl TimerService for TokioTimerService {
    fn schedule(&self, slot: MealSlot, at: NaiveDateTime, payload: ReminderPayload) -> ScheduleMode {
        let (at, mode) = self.align(at);
        let now = Local::now().naive_local();
        let delay = (at - now).to_std().unwrap_or(Duration::ZERO);

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let events = self.events.clone();
        let pending = Arc::clone(&self.pending);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(DeliveryEvent::ReminderFired(payload));
            let mut map = pending.lock();
            if map.get(&slot).map(|p| p.generation) == Some(generation) {
                map.remove(&slot);
            }
        });

        let previous = self
            .pending
            .lock()
            .insert(slot, Pending { generation, handle });
        if let Some(previous) = previous {
            previous.handle.abort();
            log::debug!("Replaced pending {} timer", slot);
        }
        mode
    }

    fn cancel(&self, slot: MealSlot) {
        if let Some(previous) = self.pending.lock().remove(&slot) {
            previous.handle.abort();
            log::debug!("Cancelled pending {} timer", slot);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reminders::default_reminders;
    use mealtime_core::WallTime;

    struct FixedClock(NaiveDateTime);

    impl Clock for FixedClock {
        fn now(&self) -> NaiveDateTime {
            self.0
        }
    }

    #[derive(Default)]
    struct RecordingService {
        scheduled: Mutex<Vec<(MealSlot, NaiveDateTime, ReminderPayload)>>,
        cancelled: Mutex<Vec<MealSlot>>,
    }

    impl TimerService for RecordingService {
        fn schedule(
            &self,
            slot: MealSlot,
            at: NaiveDateTime,
            payload: ReminderPayload,
        ) -> ScheduleMode {
            self.scheduled.lock().push((slot, at, payload));
            ScheduleMode::Exact
        }

        fn cancel(&self, slot: MealSlot) {
            self.cancelled.lock().push(slot);
        }
    }

    fn naive(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn test_scheduler_rolls_passed_time_to_tomorrow() {
        let service = Arc::new(RecordingService::default());
        let scheduler = AlarmScheduler::new(
            service.clone(),
            Arc::new(FixedClock(naive("2025-03-10 13:00:00"))),
        );

        let mut setting = default_reminders()[1].clone();
        setting.time = WallTime::new(12, 30).unwrap();
        scheduler.schedule(&setting);

        let recorded = service.scheduled.lock();
        let (slot, at, payload) = &recorded[0];
        assert_eq!(*slot, MealSlot::Lunch);
        assert_eq!(*at, naive("2025-03-11 12:30:00"));
        assert_eq!(payload.reminder_id, "lunch");
        assert_eq!(payload.name_ref, MealSlot::Lunch.name_ref());
    }

    #[test]
    fn test_schedule_enabled_arms_only_enabled_slots() {
        let service = Arc::new(RecordingService::default());
        let scheduler = AlarmScheduler::new(
            service.clone(),
            Arc::new(FixedClock(naive("2025-03-10 06:00:00"))),
        );

        let armed = scheduler.schedule_enabled(&default_reminders());
        assert_eq!(armed, 2);

        let slots: Vec<MealSlot> = service.scheduled.lock().iter().map(|(s, _, _)| *s).collect();
        assert_eq!(slots, vec![MealSlot::Breakfast, MealSlot::Lunch]);
    }

    fn payload_for(slot: MealSlot) -> ReminderPayload {
        ReminderPayload {
            reminder_id: slot.as_str().to_string(),
            name_ref: slot.name_ref(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_rescheduling_replaces_pending_timer() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let service = TokioTimerService::new(Capabilities::default(), tx);
        let at = Local::now().naive_local() + chrono::Duration::hours(1);

        service.schedule(MealSlot::Dinner, at, payload_for(MealSlot::Dinner));
        service.schedule(MealSlot::Dinner, at, payload_for(MealSlot::Dinner));
        assert_eq!(service.pending_count(), 1);

        service.cancel(MealSlot::Dinner);
        assert_eq!(service.pending_count(), 0);
        // Cancelling an idle slot changes nothing.
        service.cancel(MealSlot::Dinner);
        assert_eq!(service.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fired_timer_delivers_payload_and_clears_slot() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let service = TokioTimerService::new(Capabilities::default(), tx);

        let at = Local::now().naive_local() + chrono::Duration::seconds(30);
        service.schedule(MealSlot::Breakfast, at, payload_for(MealSlot::Breakfast));
        assert!(service.has_pending(MealSlot::Breakfast));

        match rx.recv().await {
            Some(DeliveryEvent::ReminderFired(payload)) => {
                assert_eq!(payload.reminder_id, "breakfast");
                assert_eq!(payload.name_ref, 1);
            }
            other => panic!("unexpected event {:?}", other),
        }

        // Let the fired task finish its bookkeeping.
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(service.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_inexact_mode_without_exact_capability() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let caps = Capabilities {
            exact_timers: false,
            ..Capabilities::default()
        };
        let service = TokioTimerService::new(caps, tx);
        let at = Local::now().naive_local() + chrono::Duration::hours(2);
        let mode = service.schedule(MealSlot::Lunch, at, payload_for(MealSlot::Lunch));
        assert_eq!(mode, ScheduleMode::Inexact);
    }
}
