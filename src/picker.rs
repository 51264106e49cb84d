use std::time::Duration;

use rand::Rng;

/// Spins allowed per session before the wheel locks.
pub const MAX_PICKS: usize = 3;
/// The wheel runs ~3 seconds at one highlight per tick.
pub const SPIN_TICKS: usize = 30;
pub const TICK_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum PickerError {
    #[error("need at least two food options to spin")]
    NotEnoughOptions,
    #[error("pick limit of {MAX_PICKS} reached")]
    PickLimitReached,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SpinResult {
    /// Highlight sequence for the animation, ending on the chosen option.
    pub ticks: Vec<String>,
    pub chosen: String,
}

/// Session-scoped wheel state. The pick count does not persist; restarting
/// the app starts a fresh session.
#[derive(Debug, Default)]
pub struct PickerState {
    picks: usize,
    last_pick: Option<String>,
}

impl PickerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn picks_left(&self) -> usize {
        MAX_PICKS.saturating_sub(self.picks)
    }

    pub fn last_pick(&self) -> Option<&str> {
        self.last_pick.as_deref()
    }

    pub fn spin<R: Rng>(&mut self, rng: &mut R, options: &[String]) -> Result<SpinResult, PickerError> {
        if options.len() < 2 {
            return Err(PickerError::NotEnoughOptions);
        }
        if self.picks >= MAX_PICKS {
            return Err(PickerError::PickLimitReached);
        }

        let mut ticks = Vec::with_capacity(SPIN_TICKS);
        let mut last: Option<usize> = None;
        for _ in 0..SPIN_TICKS {
            // Stepping by 1..len from the previous index can never repeat it.
            let idx = match last {
                None => rng.gen_range(0..options.len()),
                Some(prev) => (prev + rng.gen_range(1..options.len())) % options.len(),
            };
            last = Some(idx);
            ticks.push(options[idx].clone());
        }

        let chosen = match ticks.last() {
            Some(tick) => tick.clone(),
            None => return Err(PickerError::NotEnoughOptions),
        };
        self.picks += 1;
        self.last_pick = Some(chosen.clone());
        Ok(SpinResult { ticks, chosen })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn options(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_spin_needs_two_options() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut picker = PickerState::new();
        assert_eq!(
            picker.spin(&mut rng, &options(&[])),
            Err(PickerError::NotEnoughOptions)
        );
        assert_eq!(
            picker.spin(&mut rng, &options(&["Ramen"])),
            Err(PickerError::NotEnoughOptions)
        );
        assert_eq!(picker.picks_left(), MAX_PICKS);
    }

    #[test]
    fn test_spin_never_repeats_consecutive_ticks() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut picker = PickerState::new();
        let opts = options(&["Burger", "Pizza", "Sushi"]);
        let result = picker.spin(&mut rng, &opts).unwrap();

        assert_eq!(result.ticks.len(), SPIN_TICKS);
        assert!(result.ticks.windows(2).all(|w| w[0] != w[1]));
        assert!(opts.contains(&result.chosen));
        assert_eq!(result.ticks.last(), Some(&result.chosen));
    }

    #[test]
    fn test_pick_allowance_runs_out_after_three() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut picker = PickerState::new();
        let opts = options(&["Burger", "Pizza"]);

        let mut last_chosen = None;
        for left in [2usize, 1, 0] {
            let result = picker.spin(&mut rng, &opts).unwrap();
            last_chosen = Some(result.chosen);
            assert_eq!(picker.picks_left(), left);
        }
        assert_eq!(
            picker.spin(&mut rng, &opts),
            Err(PickerError::PickLimitReached)
        );
        assert_eq!(picker.last_pick(), last_chosen.as_deref());
    }

    #[test]
    fn test_same_seed_same_outcome() {
        let opts = options(&["Burger", "Pizza", "Sushi", "Taco"]);
        let mut a = PickerState::new();
        let mut b = PickerState::new();
        let ra = a.spin(&mut StdRng::seed_from_u64(99), &opts).unwrap();
        let rb = b.spin(&mut StdRng::seed_from_u64(99), &opts).unwrap();
        assert_eq!(ra, rb);
    }
}
