use crate::constants::DEBOUNCE_MS;

/// Rising-edge detector for trigger inputs.
///
/// A high level fires once. The detector re-arms only after the input has
/// been read low continuously for at least [`DEBOUNCE_MS`], so contact bounce
/// and long gates never produce extra triggers. Times are milliseconds and
/// may wrap.
#[derive(Debug, Clone)]
pub struct Debouncer {
    armed: bool,
    low_since: Option<u32>,
    hold_ms: u32,
}

impl Debouncer {
    pub const fn new() -> Self {
        Self::with_hold(DEBOUNCE_MS)
    }

    pub const fn with_hold(hold_ms: u32) -> Self {
        Debouncer {
            armed: true,
            low_since: None,
            hold_ms,
        }
    }

    /// Feed the level read at time `t`. Returns `true` on a debounced rising edge.
    pub fn update(&mut self, high: bool, t: u32) -> bool {
        if high {
            self.low_since = None;
            if self.armed {
                self.armed = false;
                return true;
            }
            return false;
        }

        let since = *self.low_since.get_or_insert(t);
        if !self.armed && t.wrapping_sub(since) >= self.hold_ms {
            self.armed = true;
        }
        false
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn held_high_fires_once() {
        let mut d = Debouncer::new();
        let fired = (0..1000).filter(|&t| d.update(true, t)).count();
        assert_eq!(fired, 1);
    }

    #[test]
    fn short_low_does_not_rearm() {
        let mut d = Debouncer::new();
        assert!(d.update(true, 0));
        for t in 1..20 {
            assert!(!d.update(false, t));
        }
        // Low from t=1 to t=19 is only 18 ms.
        assert!(!d.update(true, 20));
        assert!(!d.is_armed());
    }

    #[test]
    fn low_for_hold_time_rearms() {
        let mut d = Debouncer::new();
        assert!(d.update(true, 0));
        for t in 1..=21 {
            d.update(false, t);
        }
        assert!(d.is_armed());
        assert!(d.update(true, 22));
    }

    #[test]
    fn bounce_restarts_low_timer() {
        let mut d = Debouncer::new();
        assert!(d.update(true, 0));
        for t in 1..15 {
            d.update(false, t);
        }
        assert!(!d.update(true, 15));
        for t in 16..30 {
            d.update(false, t);
        }
        assert!(!d.is_armed());
        for t in 30..40 {
            d.update(false, t);
        }
        assert!(d.update(true, 40));
    }

    #[test]
    fn survives_timer_wrap() {
        let mut d = Debouncer::new();
        let start = u32::MAX - 5;
        assert!(d.update(true, start));
        for i in 1..=25u32 {
            d.update(false, start.wrapping_add(i));
        }
        assert!(d.update(true, start.wrapping_add(26)));
    }
}
