use crate::constants::CONTROL_CHANGE_THRESHOLD;

/// Change filter for noisy analog controls.
///
/// A reading is committed when it moves more than the threshold away from
/// the last committed value. Below `floor` every changed reading is
/// committed, so a knob turned fully down always reaches its end stop.
#[derive(Debug, Clone)]
pub struct Hysteresis {
    committed: Option<u16>,
    threshold: i32,
    floor: u16,
    snap_below: u16,
}

impl Hysteresis {
    pub const fn new() -> Self {
        Hysteresis {
            committed: None,
            threshold: CONTROL_CHANGE_THRESHOLD,
            floor: 0,
            snap_below: 0,
        }
    }

    /// Filter for the loop start control: tracks freely below twice the
    /// threshold and snaps readings under 4 to zero.
    pub const fn for_start() -> Self {
        Hysteresis {
            committed: None,
            threshold: CONTROL_CHANGE_THRESHOLD,
            floor: (CONTROL_CHANGE_THRESHOLD * 2) as u16,
            snap_below: 4,
        }
    }

    /// Feed one reading; returns the value to apply if it should be committed.
    ///
    /// The first reading always commits.
    pub fn update(&mut self, reading: u16) -> Option<u16> {
        let value = if reading < self.snap_below { 0 } else { reading };
        let commit = match self.committed {
            None => true,
            Some(last) => {
                (value as i32 - last as i32).abs() > self.threshold
                    || (value < self.floor && value != last)
            }
        };
        if commit {
            self.committed = Some(value);
            Some(value)
        } else {
            None
        }
    }

    pub fn committed(&self) -> Option<u16> {
        self.committed
    }
}

impl Default for Hysteresis {
    fn default() -> Self {
        Self::new()
    }
}
