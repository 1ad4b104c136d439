//! Exponential moving average.

use super::Filter;

/// Blends each new value with the running average: `avg = alpha * value + (1 - alpha) * avg`.
///
/// The first value passes through unchanged.
#[derive(Debug, Clone, Copy)]
pub struct Ema {
    alpha: f32,
}

impl Ema {
    /// `alpha` is the weight of the newest value. 1.0 disables smoothing.
    ///
    /// # Panics
    ///
    /// Panics if `alpha` is outside of `0.0..=1.0`.
    pub fn new(alpha: f32) -> Self {
        assert!(
            (0.0..=1.0).contains(&alpha),
            "EMA weight {alpha} is outside of 0..=1"
        );
        Self { alpha }
    }
}

/// Running average of one signal, empty until the first value arrives.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmaState(Option<f32>);

impl Filter<f32> for Ema {
    type State = EmaState;

    fn filter(&self, state: &mut EmaState, value: f32) -> f32 {
        let avg = state
            .0
            .map_or(value, |avg| avg + self.alpha * (value - avg));
        state.0 = Some(avg);
        avg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn halves_the_distance() {
        let ema = Ema::new(0.5);
        let mut state = EmaState::default();
        assert_eq!(ema.filter(&mut state, 1.0), 1.0);
        assert_eq!(ema.filter(&mut state, 2.0), 1.5);
        assert_eq!(ema.filter(&mut state, 2.0), 1.75);

        let mut fresh = EmaState::default();
        assert_eq!(ema.filter(&mut fresh, 8.0), 8.0);
    }

    #[test]
    fn weight_one_passes_through() {
        let ema = Ema::new(1.0);
        let mut state = EmaState::default();
        assert_eq!(ema.filter(&mut state, 3.0), 3.0);
        assert_eq!(ema.filter(&mut state, -4.0), -4.0);
    }

    #[test]
    #[should_panic(expected = "outside of 0..=1")]
    fn rejects_out_of_range_weight() {
        Ema::new(1.5);
    }
}
