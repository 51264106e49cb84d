mod alerts;
mod delivery;
mod picker;
mod reminders;
mod repository;
mod scheduler;
mod seasonal;
mod storage;
mod ui;
mod viewstate;
mod wake;

use std::io::Write as _;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use mealtime_core::{MonthKey, WallTime};

use crate::alerts::{CardState, ConsolePresenter, DesktopPresenter, ReminderPresenter};
use crate::delivery::{DeliveryEvent, DeliveryHandler};
use crate::picker::TICK_INTERVAL;
use crate::reminders::MealSlot;
use crate::repository::FoodRepository;
use crate::scheduler::{AlarmScheduler, Capabilities, Clock, SystemClock, TokioTimerService};
use crate::storage::Storage;
use crate::viewstate::ViewState;
use crate::wake::WakeLock;

#[derive(Parser)]
#[command(name = "mealtime", version, about = "Meal reminders, a meal log and seasonal eating tips")]
struct Cli {
    /// Data directory override
    #[arg(long, global = true, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Treat exact wall-clock timers as unavailable
    #[arg(long, global = true)]
    no_exact: bool,

    /// Do not send desktop notifications
    #[arg(long, global = true)]
    no_notify: bool,

    /// Do not print full-screen reminder cards
    #[arg(long, global = true)]
    no_overlay: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the reminder service in the foreground
    Run,
    /// Show the greeting, next meal and reminder summary
    Status,
    /// Spin the wheel for a meal suggestion
    Pick,
    /// Record a meal you just ate
    Log {
        name: String,
        #[arg(long, default_value_t = 0.0)]
        cost: f64,
        #[arg(long, default_value = "Medium")]
        taste: String,
    },
    /// Browse recorded meals
    History {
        /// Restrict to a month (YYYY-MM)
        #[arg(long)]
        month: Option<MonthKey>,
        /// Restrict to a taste; "all" lifts the restriction
        #[arg(long)]
        taste: Option<String>,
    },
    /// Seasonal eating tips for the current solar term
    Seasonal,
    /// Manage the three daily reminders
    Reminders {
        #[command(subcommand)]
        action: Option<ReminderAction>,
    },
    /// Manage the picker's food options
    Options {
        #[command(subcommand)]
        action: Option<OptionAction>,
    },
    /// Show or change the reminder channels
    Alerts {
        /// Terminal-bell cue on or off
        #[arg(long, value_parser = clap::builder::BoolishValueParser::new())]
        vibration: Option<bool>,
        /// Notification channel on or off
        #[arg(long, value_parser = clap::builder::BoolishValueParser::new())]
        notification: Option<bool>,
        /// Sound channel on or off
        #[arg(long, value_parser = clap::builder::BoolishValueParser::new())]
        audio: Option<bool>,
    },
    /// Set the display nickname
    Nickname { name: String },
    /// Set the interface language
    Lang { language: String },
}

#[derive(Subcommand)]
enum ReminderAction {
    /// List the reminders
    List,
    /// Change a reminder's time and lead minutes
    Set {
        slot: MealSlot,
        #[arg(long)]
        time: WallTime,
        #[arg(long, default_value_t = 15)]
        lead: u32,
    },
    /// Turn a reminder on
    Enable { slot: MealSlot },
    /// Turn a reminder off
    Disable { slot: MealSlot },
}

#[derive(Subcommand)]
enum OptionAction {
    /// List the food options
    List,
    /// Add a food option
    Add { name: String },
    /// Remove a food option
    Remove { name: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let capabilities = Capabilities {
        exact_timers: !cli.no_exact,
        notifications: !cli.no_notify,
        overlay: !cli.no_overlay,
    };
    let storage = Arc::new(Storage::new(cli.data_dir.clone()));
    log::debug!("Using data directory {}", storage.dir().display());

    let repository = FoodRepository::from_parts(
        storage.load_food_options(),
        storage.load_meal_history(),
        storage.load_reminders(),
    );
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let timer_service = Arc::new(TokioTimerService::new(capabilities, event_tx.clone()));
    let scheduler = Arc::new(AlarmScheduler::with_system_clock(timer_service));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let mut state = ViewState::new(repository.clone(), storage.clone(), scheduler.clone(), clock);

    match cli.command.unwrap_or(Command::Status) {
        Command::Run => {
            run_service(
                state,
                repository,
                storage,
                scheduler,
                capabilities,
                event_tx,
                event_rx,
            )
            .await
        }
        Command::Status => {
            print!("{}", ui::render_home(&state));
            if state.show_nickname_dialog() {
                println!();
                println!("First run. Set a nickname with `mealtime nickname <name>`.");
            }
            Ok(())
        }
        Command::Pick => {
            let result = {
                let mut rng = rand::thread_rng();
                state.spin_picker(&mut rng)?
            };
            for tick in &result.ticks {
                print!("\r  >> {:<20}", tick);
                std::io::stdout().flush().ok();
                tokio::time::sleep(TICK_INTERVAL).await;
            }
            println!();
            print!("{}", ui::render_pick(&result, state.picks_left()));
            Ok(())
        }
        Command::Log { name, cost, taste } => {
            let record = state.record_meal(&name, cost, &taste)?;
            println!("Logged {} (${:.2}, {})", record.name, record.cost, record.taste);
            Ok(())
        }
        Command::History { month, taste } => {
            state.set_month_filter(month);
            if let Some(taste) = taste {
                state.set_taste_filter(&taste);
            }
            print!(
                "{}",
                ui::render_history(&state.filtered_history(), state.month_filter(), state.taste_filter())
            );
            Ok(())
        }
        Command::Seasonal => {
            print!("{}", ui::render_seasonal(&state.solar_term()));
            Ok(())
        }
        Command::Reminders { action } => run_reminder_action(&mut state, action),
        Command::Options { action } => {
            match action.unwrap_or(OptionAction::List) {
                OptionAction::List => {
                    for option in state.food_options() {
                        println!("  {}", option);
                    }
                }
                OptionAction::Add { name } => {
                    if state.add_food_option(&name) {
                        println!("Added {}", name.trim());
                    } else {
                        println!("{} is already there (or blank)", name.trim());
                    }
                }
                OptionAction::Remove { name } => {
                    if state.remove_food_option(&name) {
                        println!("Removed {}", name);
                    } else {
                        println!("No such option {}", name);
                    }
                }
            }
            Ok(())
        }
        Command::Alerts {
            vibration,
            notification,
            audio,
        } => {
            let mut config = storage.load_alert_config();
            if vibration.is_some() || notification.is_some() || audio.is_some() {
                if let Some(on) = vibration {
                    config.vibration = on;
                }
                if let Some(on) = notification {
                    config.notification = on;
                }
                if let Some(on) = audio {
                    config.audio = on;
                }
                storage.save_alert_config(&config);
            }
            println!(
                "vibration: {}  notification: {}  audio: {}",
                on_off(config.vibration),
                on_off(config.notification),
                on_off(config.audio)
            );
            Ok(())
        }
        Command::Nickname { name } => {
            state.save_nickname(&name);
            println!("Nice to meet you, {}!", state.nickname());
            Ok(())
        }
        Command::Lang { language } => {
            state.set_language(&language)?;
            println!("Language set to {}", state.language());
            Ok(())
        }
    }
}

fn on_off(on: bool) -> &'static str {
    if on {
        "on"
    } else {
        "off"
    }
}

fn run_reminder_action(state: &mut ViewState, action: Option<ReminderAction>) -> anyhow::Result<()> {
    match action.unwrap_or(ReminderAction::List) {
        ReminderAction::List => {
            print!("{}", ui::render_reminders(&state.reminders()));
        }
        ReminderAction::Set { slot, time, lead } => {
            let current = state
                .reminders()
                .into_iter()
                .find(|r| r.slot == slot)
                .context("reminder slot is not configured")?;
            let updated = state
                .apply_reminder_edit(slot, time, lead, current.enabled)
                .context("reminder slot is not configured")?;
            println!(
                "{} set to {} (lead {}m, {})",
                updated.slot.label(),
                updated.time,
                updated.lead_minutes,
                on_off(updated.enabled)
            );
        }
        ReminderAction::Enable { slot } => {
            let updated = state
                .set_reminder_enabled(slot, true)
                .context("reminder slot is not configured")?;
            println!("{} reminder on, daily at {}", updated.slot.label(), updated.time);
        }
        ReminderAction::Disable { slot } => {
            let updated = state
                .set_reminder_enabled(slot, false)
                .context("reminder slot is not configured")?;
            println!("{} reminder off", updated.slot.label());
        }
    }
    Ok(())
}

async fn run_service(
    mut state: ViewState,
    repository: FoodRepository,
    storage: Arc<Storage>,
    scheduler: Arc<AlarmScheduler>,
    capabilities: Capabilities,
    event_tx: mpsc::UnboundedSender<DeliveryEvent>,
    mut event_rx: mpsc::UnboundedReceiver<DeliveryEvent>,
) -> anyhow::Result<()> {
    let mut presenters: Vec<Box<dyn ReminderPresenter>> = Vec::new();
    if capabilities.overlay {
        presenters.push(Box::new(ConsolePresenter));
    }
    if capabilities.notifications {
        presenters.push(Box::new(DesktopPresenter::new()));
    }

    let mut changes = repository.subscribe();
    let handler = DeliveryHandler::new(
        repository,
        scheduler,
        presenters,
        storage.load_alert_config(),
        WakeLock::new(),
    );

    // The service coming up is our boot; it re-arms every enabled reminder.
    event_tx
        .send(DeliveryEvent::BootCompleted)
        .context("event channel closed before startup")?;

    print!("{}", ui::render_home(&state));
    if state.show_nickname_dialog() {
        println!("What should we call you? Type 'name <nickname>' or 'skip'.");
    }
    println!("Commands: status  pick  dismiss  name <nick>  rename  skip  help  quit");

    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                log::info!("Shutting down");
                break;
            }
            Some(event) = event_rx.recv() => {
                // Fire and forget; the handler supervises its own task.
                handler.handle(event);
            }
            Ok(change) = changes.recv() => {
                log::debug!("Repository change: {:?}", change);
            }
            _ = ticker.tick() => {
                let card_showing = handler
                    .active_card()
                    .map(|c| c.state() == CardState::Shown)
                    .unwrap_or(false);
                if !card_showing {
                    if let Some((slot, countdown)) = state.countdown_to_next() {
                        print!("\rNext: {} in {}   ", slot.label(), countdown);
                        std::io::stdout().flush().ok();
                    }
                }
            }
            line = lines.next_line(), if stdin_open => {
                match line {
                    Ok(Some(line)) => {
                        println!();
                        if !handle_loop_command(line.trim(), &mut state, &handler) {
                            break;
                        }
                    }
                    Ok(None) => {
                        // Detached from a terminal; keep the service alive.
                        stdin_open = false;
                    }
                    Err(e) => {
                        log::warn!("Dropping stdin: {}", e);
                        stdin_open = false;
                    }
                }
            }
        }
    }
    println!();
    Ok(())
}

/// Returns false when the loop should stop.
fn handle_loop_command(line: &str, state: &mut ViewState, handler: &DeliveryHandler) -> bool {
    let mut words = line.splitn(2, char::is_whitespace);
    let command = words.next().unwrap_or("");
    let rest = words.next().unwrap_or("").trim();

    match command {
        "" => {}
        "status" => print!("{}", ui::render_home(state)),
        "pick" => {
            let mut rng = rand::thread_rng();
            match state.spin_picker(&mut rng) {
                Ok(result) => print!("{}", ui::render_pick(&result, state.picks_left())),
                Err(e) => println!("{}", e),
            }
        }
        "history" => {
            state.clear_filters();
            for word in rest.split_whitespace() {
                match word.parse::<MonthKey>() {
                    Ok(month) => state.set_month_filter(Some(month)),
                    Err(_) => state.set_taste_filter(word),
                }
            }
            print!(
                "{}",
                ui::render_history(&state.filtered_history(), state.month_filter(), state.taste_filter())
            );
        }
        "dismiss" => {
            if handler.dismiss_active() {
                println!("Dismissed. Enjoy your meal!");
            } else {
                println!("Nothing to dismiss.");
            }
        }
        "name" => {
            if rest.is_empty() {
                println!("Usage: name <nickname>");
            } else {
                state.save_nickname(rest);
                println!("Nice to meet you, {}!", state.nickname());
            }
        }
        "rename" => {
            state.open_nickname_dialog();
            println!("What should we call you? Type 'name <nickname>' or 'skip'.");
        }
        "skip" => {
            state.dismiss_nickname_dialog();
            println!("Keeping '{}'.", state.nickname());
        }
        "edit" => {
            if rest.is_empty() {
                println!("Usage: edit <breakfast|lunch|dinner>");
            } else {
                match rest.parse::<MealSlot>() {
                    Ok(slot) => {
                        state.begin_reminder_edit(slot);
                        match state.reminders().into_iter().find(|r| r.slot == slot) {
                            Some(r) => println!(
                                "Editing {} ({}, lead {}m). Type 'time <HH:MM> [lead]' or 'cancel'.",
                                r.slot.label(),
                                r.time,
                                r.lead_minutes
                            ),
                            None => println!("{} is not configured.", slot.label()),
                        }
                    }
                    Err(e) => println!("{}", e),
                }
            }
        }
        "time" => match state.editing_reminder() {
            None => println!("Nothing is being edited, start with 'edit <slot>'."),
            Some(slot) => apply_timed_edit(state, slot, rest),
        },
        "cancel" => {
            if state.editing_reminder().is_some() {
                state.cancel_reminder_edit();
                println!("Edit cancelled.");
            } else {
                println!("Nothing is being edited.");
            }
        }
        "help" => {
            println!("Commands: status  pick  history [YYYY-MM] [taste]  dismiss  name <nick>  rename  skip  quit");
            println!("Reminder edit: edit <slot>, then time <HH:MM> [lead] or cancel");
        }
        "quit" | "exit" => return false,
        other => println!("Unknown command {:?}, try 'help'", other),
    }
    true
}

fn apply_timed_edit(state: &mut ViewState, slot: MealSlot, rest: &str) {
    let mut parts = rest.split_whitespace();
    let time = match parts.next().map(str::parse::<WallTime>) {
        Some(Ok(time)) => time,
        Some(Err(e)) => {
            println!("{}", e);
            return;
        }
        None => {
            println!("Usage: time <HH:MM> [lead]");
            return;
        }
    };
    let current = state.reminders().into_iter().find(|r| r.slot == slot);
    let (mut lead, enabled) = match &current {
        Some(r) => (r.lead_minutes, r.enabled),
        None => (15, true),
    };
    if let Some(word) = parts.next() {
        match word.parse::<u32>() {
            Ok(l) => lead = l,
            Err(_) => {
                println!("Lead minutes must be a number");
                return;
            }
        }
    }
    match state.apply_reminder_edit(slot, time, lead, enabled) {
        Some(updated) => println!(
            "{} set to {} (lead {}m, {})",
            updated.slot.label(),
            updated.time,
            updated.lead_minutes,
            on_off(updated.enabled)
        ),
        None => println!("{} is not configured.", slot.label()),
    }
}
