use std::ops::{Add, AddAssign};

use parking_lot::Mutex;
use serde::Serialize;

/// Capacity units a backend reports for one or more requests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct ConsumedCapacity {
    /// Total units, as reported by the backend.
    pub total: f64,
    /// Read units.
    pub read: f64,
    /// Write units.
    pub write: f64,
}

impl ConsumedCapacity {
    /// Read units only.
    pub fn read(units: f64) -> Self {
        Self {
            total: units,
            read: units,
            write: 0.0,
        }
    }

    /// Write units only.
    pub fn write(units: f64) -> Self {
        Self {
            total: units,
            read: 0.0,
            write: units,
        }
    }
}

impl Add for ConsumedCapacity {
    type Output = ConsumedCapacity;

    fn add(self, rhs: Self) -> Self::Output {
        ConsumedCapacity {
            total: self.total + rhs.total,
            read: self.read + rhs.read,
            write: self.write + rhs.write,
        }
    }
}

impl AddAssign for ConsumedCapacity {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

/// Running capacity totals of a store.
///
/// Only ever added to; readers get a copy of the totals at that moment.
#[derive(Debug, Default)]
pub(crate) struct CapacityMeter {
    totals: Mutex<ConsumedCapacity>,
}

impl CapacityMeter {
    pub(crate) fn record(&self, consumed: ConsumedCapacity) {
        *self.totals.lock() += consumed;
    }

    pub(crate) fn snapshot(&self) -> ConsumedCapacity {
        *self.totals.lock()
    }

    pub(crate) fn reset(&self) -> ConsumedCapacity {
        std::mem::take(&mut *self.totals.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meter_accumulates_and_resets() {
        let meter = CapacityMeter::default();
        meter.record(ConsumedCapacity::write(3.0));
        meter.record(ConsumedCapacity::read(0.5));

        let totals = meter.snapshot();
        assert_eq!(totals.total, 3.5);
        assert_eq!(totals.read, 0.5);
        assert_eq!(totals.write, 3.0);

        assert_eq!(meter.reset(), totals);
        assert_eq!(meter.snapshot(), ConsumedCapacity::default());
    }
}
