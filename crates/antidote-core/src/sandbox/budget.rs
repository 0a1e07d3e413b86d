//! Per-file evaluation budget and the meter that enforces it.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use super::error::Fault;

/// How often, in steps, the meter consults the clock.
const CLOCK_CHECK_INTERVAL: u64 = 1024;

/// Bytes of string work charged as one step.
const BYTES_PER_STEP: u64 = 64;

/// Resource limits for evaluating one predicate against one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Budget {
    /// Wall-clock allowance.
    #[serde(with = "millis")]
    pub deadline: Duration,
    /// Fuel: one step per AST node visit plus string work.
    pub max_steps: u64,
    /// Derived allocations may reach this multiple of the content length.
    pub memory_multiplier: u64,
    /// Floor for the memory ceiling, in bytes.
    pub min_memory: u64,
}

impl Default for Budget {
    fn default() -> Self {
        Self {
            deadline: Duration::from_millis(50),
            max_steps: 10_000_000,
            memory_multiplier: 4,
            min_memory: 1 << 20,
        }
    }
}

impl Budget {
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn memory_ceiling(&self, content_len: u64) -> u64 {
        content_len
            .saturating_mul(self.memory_multiplier)
            .max(self.min_memory)
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

/// Tracks consumption against a [`Budget`] during one evaluation.
#[derive(Debug)]
pub(crate) struct Meter {
    steps: u64,
    max_steps: u64,
    next_clock_check: u64,
    deadline: Instant,
    allocated: u64,
    ceiling: u64,
}

impl Meter {
    pub fn new(budget: &Budget, content_len: u64, started: Instant) -> Self {
        Self {
            steps: 0,
            max_steps: budget.max_steps,
            next_clock_check: CLOCK_CHECK_INTERVAL,
            deadline: started + budget.deadline,
            allocated: 0,
            ceiling: budget.memory_ceiling(content_len),
        }
    }

    pub fn step(&mut self) -> Result<(), Fault> {
        self.charge(1)
    }

    pub fn charge(&mut self, units: u64) -> Result<(), Fault> {
        self.steps = self.steps.saturating_add(units);
        if self.steps > self.max_steps {
            return Err(Fault::Timeout);
        }
        if self.steps >= self.next_clock_check {
            self.next_clock_check = self.steps.saturating_add(CLOCK_CHECK_INTERVAL);
            if Instant::now() >= self.deadline {
                return Err(Fault::Timeout);
            }
        }
        Ok(())
    }

    /// Charge for scanning `bytes` of string data.
    pub fn scan(&mut self, bytes: usize) -> Result<(), Fault> {
        self.charge(1 + bytes as u64 / BYTES_PER_STEP)
    }

    /// Account for a derived allocation before it is made. Counted
    /// cumulatively; nothing is credited back when values are dropped.
    pub fn allocate(&mut self, bytes: u64) -> Result<(), Fault> {
        self.allocated = self.allocated.saturating_add(bytes);
        if self.allocated > self.ceiling {
            return Err(Fault::ResourceExceeded {
                ceiling: self.ceiling,
            });
        }
        self.scan(bytes as usize)
    }

    #[cfg(test)]
    pub fn steps(&self) -> u64 {
        self.steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ceiling_has_a_floor() {
        let b = Budget::default();
        assert_eq!(b.memory_ceiling(10), 1 << 20);
        assert_eq!(b.memory_ceiling(10 << 20), 40 << 20);
    }

    #[test]
    fn step_exhaustion_is_a_timeout() {
        let budget = Budget {
            max_steps: 10,
            ..Budget::default()
        };
        let mut meter = Meter::new(&budget, 0, Instant::now());
        assert!(meter.charge(10).is_ok());
        assert_eq!(meter.step(), Err(Fault::Timeout));
    }

    #[test]
    fn expired_deadline_is_noticed_at_the_next_check() {
        let budget = Budget::default().with_deadline(Duration::ZERO);
        let mut meter = Meter::new(&budget, 0, Instant::now());
        assert_eq!(meter.charge(CLOCK_CHECK_INTERVAL), Err(Fault::Timeout));
    }

    #[test]
    fn allocations_accumulate() {
        let budget = Budget {
            min_memory: 100,
            ..Budget::default()
        };
        let mut meter = Meter::new(&budget, 0, Instant::now());
        assert!(meter.allocate(60).is_ok());
        assert_eq!(
            meter.allocate(60),
            Err(Fault::ResourceExceeded { ceiling: 100 })
        );
    }

    #[test]
    fn string_work_is_charged_proportionally() {
        let mut meter = Meter::new(&Budget::default(), 0, Instant::now());
        meter.scan(640).unwrap();
        assert_eq!(meter.steps(), 11);
    }

    #[test]
    fn budget_serializes_deadline_as_millis() {
        let json = serde_json::to_value(Budget::default()).unwrap();
        assert_eq!(json["deadline"], 50);
    }
}
