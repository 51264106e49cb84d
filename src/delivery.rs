use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::alerts::{fire_alert, AlertConfig, ReminderCard, ReminderPresenter};
use crate::reminders::MealSlot;
use crate::repository::FoodRepository;
use crate::scheduler::{AlarmScheduler, ReminderPayload};
use crate::wake::{WakeLock, MAX_WAKE_HOLD};

/// How long a delivery waits for the wake lock before pressing on without it.
const WAKE_ACQUIRE_WAIT: Duration = Duration::from_secs(10);

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeliveryEvent {
    BootCompleted,
    ReminderFired(ReminderPayload),
}

/// Reacts to timer and lifecycle events. Each event is processed in its own
/// task under a hard deadline, so a stuck or panicking delivery never takes
/// the event loop down with it.
#[derive(Clone)]
pub struct DeliveryHandler {
    repository: FoodRepository,
    scheduler: Arc<AlarmScheduler>,
    presenters: Arc<Vec<Box<dyn ReminderPresenter>>>,
    alert_config: AlertConfig,
    wake: WakeLock,
    active_card: Arc<Mutex<Option<ReminderCard>>>,
}

impl DeliveryHandler {
    pub fn new(
        repository: FoodRepository,
        scheduler: Arc<AlarmScheduler>,
        presenters: Vec<Box<dyn ReminderPresenter>>,
        alert_config: AlertConfig,
        wake: WakeLock,
    ) -> Self {
        Self {
            repository,
            scheduler,
            presenters: Arc::new(presenters),
            alert_config,
            wake,
            active_card: Arc::new(Mutex::new(None)),
        }
    }

    /// The most recently presented card, dismissed or not.
    pub fn active_card(&self) -> Option<ReminderCard> {
        self.active_card.lock().clone()
    }

    /// Returns true only when a shown card actually transitioned.
    pub fn dismiss_active(&self) -> bool {
        match self.active_card.lock().as_mut() {
            Some(card) => card.dismiss(),
            None => false,
        }
    }

    pub fn handle(&self, event: DeliveryEvent) -> JoinHandle<()> {
        let handler = self.clone();
        tokio::spawn(async move {
            if tokio::time::timeout(MAX_WAKE_HOLD, handler.process(event))
                .await
                .is_err()
            {
                log::error!("Delivery ran past its {:?} deadline", MAX_WAKE_HOLD);
            }
        })
    }

    async fn process(&self, event: DeliveryEvent) {
        // Better to deliver without the lock than to drop the reminder.
        let _guard = match self.wake.acquire(WAKE_ACQUIRE_WAIT).await {
            Ok(guard) => Some(guard),
            Err(e) => {
                log::warn!("Proceeding without wake lock: {}", e);
                None
            }
        };
        match event {
            DeliveryEvent::BootCompleted => self.on_boot(),
            DeliveryEvent::ReminderFired(payload) => self.on_fired(payload),
        }
    }

    fn on_boot(&self) {
        let armed = self.scheduler.schedule_enabled(&self.repository.reminders());
        log::info!("Boot re-arm complete, {} reminder(s) armed", armed);
    }

    fn on_fired(&self, payload: ReminderPayload) {
        let card = ReminderCard::for_name_ref(payload.name_ref);
        log::info!("Reminder fired: {} ({})", payload.reminder_id, card.title());
        *self.active_card.lock() = Some(card.clone());
        fire_alert(&self.alert_config, &self.presenters, &card);
        self.rearm(&payload);
    }

    /// Arm the slot for its next day, unless the user disabled it meanwhile.
    fn rearm(&self, payload: &ReminderPayload) {
        let slot = match payload.reminder_id.parse::<MealSlot>() {
            Ok(slot) => slot,
            Err(e) => {
                log::warn!("Not re-arming: {}", e);
                return;
            }
        };
        match self.repository.reminder(slot) {
            Some(setting) if setting.enabled => {
                self.scheduler.schedule(&setting);
            }
            _ => log::debug!("{} is disabled, leaving it unarmed", slot),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::{AlertError, FALLBACK_TITLE};
    use crate::scheduler::{Clock, ScheduleMode, TimerService};
    use chrono::NaiveDateTime;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedClock(NaiveDateTime);

    impl Clock for FixedClock {
        fn now(&self) -> NaiveDateTime {
            self.0
        }
    }

    #[derive(Default)]
    struct RecordingService {
        scheduled: Mutex<Vec<MealSlot>>,
    }

    impl TimerService for RecordingService {
        fn schedule(&self, slot: MealSlot, _at: NaiveDateTime, _payload: ReminderPayload) -> ScheduleMode {
            self.scheduled.lock().push(slot);
            ScheduleMode::Exact
        }

        fn cancel(&self, _slot: MealSlot) {}
    }

    #[derive(Default)]
    struct CountingPresenter {
        notified: AtomicUsize,
    }

    impl ReminderPresenter for CountingPresenter {
        fn notify(&self, _card: &ReminderCard) -> Result<(), AlertError> {
            self.notified.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn buzz(&self) -> Result<(), AlertError> {
            Ok(())
        }
    }

    struct PanickyPresenter;

    impl ReminderPresenter for PanickyPresenter {
        fn notify(&self, _card: &ReminderCard) -> Result<(), AlertError> {
            panic!("presentation exploded");
        }

        fn buzz(&self) -> Result<(), AlertError> {
            Ok(())
        }
    }

    fn handler_with(
        presenters: Vec<Box<dyn ReminderPresenter>>,
        wake: WakeLock,
    ) -> (DeliveryHandler, Arc<RecordingService>) {
        let service = Arc::new(RecordingService::default());
        let clock = FixedClock(
            NaiveDateTime::parse_from_str("2025-03-10 06:00:00", "%Y-%m-%d %H:%M:%S").unwrap(),
        );
        let scheduler = Arc::new(AlarmScheduler::new(service.clone(), Arc::new(clock)));
        let handler = DeliveryHandler::new(
            FoodRepository::seeded(),
            scheduler,
            presenters,
            AlertConfig::default(),
            wake,
        );
        (handler, service)
    }

    fn payload(slot: MealSlot) -> ReminderPayload {
        ReminderPayload {
            reminder_id: slot.as_str().to_string(),
            name_ref: slot.name_ref(),
        }
    }

    #[tokio::test]
    async fn test_boot_arms_exactly_the_enabled_reminders() {
        let (handler, service) = handler_with(vec![], WakeLock::new());
        handler.handle(DeliveryEvent::BootCompleted).await.unwrap();

        // Stock data: breakfast and lunch on, dinner off.
        assert_eq!(
            *service.scheduled.lock(),
            vec![MealSlot::Breakfast, MealSlot::Lunch]
        );
    }

    #[tokio::test]
    async fn test_fired_presents_card_and_rearms_enabled_slot() {
        let counting = Arc::new(CountingPresenter::default());
        struct Fwd(Arc<CountingPresenter>);
        impl ReminderPresenter for Fwd {
            fn notify(&self, card: &ReminderCard) -> Result<(), AlertError> {
                self.0.notify(card)
            }
            fn buzz(&self) -> Result<(), AlertError> {
                self.0.buzz()
            }
        }
        let (handler, service) = handler_with(vec![Box::new(Fwd(counting.clone()))], WakeLock::new());

        handler
            .handle(DeliveryEvent::ReminderFired(payload(MealSlot::Lunch)))
            .await
            .unwrap();

        let card = handler.active_card().unwrap();
        assert_eq!(card.title(), "Lunch");
        assert_eq!(counting.notified.load(Ordering::SeqCst), 1);
        assert_eq!(*service.scheduled.lock(), vec![MealSlot::Lunch]);
    }

    #[tokio::test]
    async fn test_fired_disabled_slot_is_not_rearmed() {
        let (handler, service) = handler_with(vec![], WakeLock::new());
        handler
            .handle(DeliveryEvent::ReminderFired(payload(MealSlot::Dinner)))
            .await
            .unwrap();
        assert!(service.scheduled.lock().is_empty());
        assert!(handler.active_card().is_some());
    }

    #[tokio::test]
    async fn test_unresolvable_name_ref_gets_generic_title() {
        let (handler, _service) = handler_with(vec![], WakeLock::new());
        handler
            .handle(DeliveryEvent::ReminderFired(ReminderPayload {
                reminder_id: "lunch".to_string(),
                name_ref: 0,
            }))
            .await
            .unwrap();
        assert_eq!(handler.active_card().unwrap().title(), FALLBACK_TITLE);
    }

    #[tokio::test]
    async fn test_wake_lock_released_after_normal_delivery() {
        let wake = WakeLock::new();
        let (handler, _service) = handler_with(vec![], wake.clone());
        handler.handle(DeliveryEvent::BootCompleted).await.unwrap();
        assert!(!wake.is_held());
    }

    #[tokio::test]
    async fn test_wake_lock_released_when_presentation_panics() {
        let wake = WakeLock::new();
        let (handler, _service) = handler_with(vec![Box::new(PanickyPresenter)], wake.clone());
        let join = handler
            .handle(DeliveryEvent::ReminderFired(payload(MealSlot::Breakfast)))
            .await;
        assert!(join.is_err());
        assert!(!wake.is_held());
    }

    #[tokio::test]
    async fn test_dismiss_transitions_once() {
        let (handler, _service) = handler_with(vec![], WakeLock::new());
        assert!(!handler.dismiss_active());

        handler
            .handle(DeliveryEvent::ReminderFired(payload(MealSlot::Lunch)))
            .await
            .unwrap();
        assert!(handler.dismiss_active());
        assert!(!handler.dismiss_active());
    }
}
