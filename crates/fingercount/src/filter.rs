//! Data smoothing, used to optionally steady landmark positions between frames.

pub mod ema;

/// A filter configuration. The history of each filtered signal lives in a separate
/// [`Filter::State`], so one filter can drive many signals (eg. every landmark coordinate).
pub trait Filter<V> {
    /// Per-signal filter state.
    type State: Default;

    /// Feeds `value` into the filter, returning the filtered value.
    fn filter(&self, state: &mut Self::State, value: V) -> V;
}
