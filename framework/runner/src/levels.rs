use plateau_sweep_core::prelude::SweepError;

/// The offered-load levels of a sweep: `start, start + step, ...` up to and including `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadLevels {
    start: u32,
    step: u32,
    max: u32,
}

impl LoadLevels {
    pub fn new(start: u32, step: u32, max: u32) -> Result<Self, SweepError> {
        if step == 0 {
            return Err(SweepError::InvalidConfig(
                "QPS step must be greater than 0".to_string(),
            ));
        }

        Ok(Self { start, step, max })
    }

    pub fn start(&self) -> u32 {
        self.start
    }

    pub fn step(&self) -> u32 {
        self.step
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    /// Levels in strictly increasing order. Empty when `start > max`.
    pub fn iter(&self) -> impl Iterator<Item = u32> {
        (self.start..=self.max).step_by(self.step as usize)
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.start > self.max
    }
}

/// Maps a load level to the load generator's concurrency settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Concurrency {
    users_multiplier: f64,
    spawn_multiplier: f64,
}

impl Concurrency {
    pub fn new(users_multiplier: f64, spawn_multiplier: f64) -> Result<Self, SweepError> {
        for (name, value) in [
            ("users multiplier", users_multiplier),
            ("spawn multiplier", spawn_multiplier),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(SweepError::InvalidConfig(format!(
                    "The {name} must be a finite, non-negative number, got {value}"
                )));
            }
        }

        Ok(Self {
            users_multiplier,
            spawn_multiplier,
        })
    }

    pub fn users_multiplier(&self) -> f64 {
        self.users_multiplier
    }

    pub fn spawn_multiplier(&self) -> f64 {
        self.spawn_multiplier
    }

    /// `floor(qps * users_multiplier)` users, spawned at `floor(qps * spawn_multiplier)` per second.
    pub fn for_level(&self, qps: u32) -> (u32, u32) {
        let scale = |multiplier: f64| (qps as f64 * multiplier).floor() as u32;
        (scale(self.users_multiplier), scale(self.spawn_multiplier))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn levels(start: u32, step: u32, max: u32) -> Vec<u32> {
        LoadLevels::new(start, step, max).unwrap().iter().collect()
    }

    #[test]
    fn test_should_include_max_when_on_a_step() {
        assert_eq!(levels(10, 5, 25), vec![10, 15, 20, 25]);
    }

    #[test]
    fn test_should_stop_below_max_when_between_steps() {
        assert_eq!(levels(10, 5, 22), vec![10, 15, 20]);
    }

    #[test]
    fn test_should_yield_single_level_when_start_is_max() {
        assert_eq!(levels(10, 5, 10), vec![10]);
    }

    #[test]
    fn test_should_be_empty_when_start_exceeds_max() {
        let levels = LoadLevels::new(30, 5, 25).unwrap();
        assert!(levels.is_empty());
        assert_eq!(levels.len(), 0);
        assert_eq!(levels.iter().next(), None);
    }

    #[test]
    fn test_should_reject_zero_step() {
        assert!(matches!(
            LoadLevels::new(10, 0, 25),
            Err(SweepError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_should_not_overflow_near_u32_max() {
        assert_eq!(levels(u32::MAX - 1, 5, u32::MAX), vec![u32::MAX - 1]);
    }

    #[test]
    fn test_should_floor_concurrency() {
        let concurrency = Concurrency::new(1.5, 1.5).unwrap();
        assert_eq!(concurrency.for_level(10), (15, 15));
        assert_eq!(concurrency.for_level(15), (22, 22));

        let concurrency = Concurrency::new(2.0, 0.5).unwrap();
        assert_eq!(concurrency.for_level(15), (30, 7));
    }

    #[test]
    fn test_should_reject_invalid_multipliers() {
        assert!(Concurrency::new(-1.0, 1.0).is_err());
        assert!(Concurrency::new(1.0, f64::NAN).is_err());
        assert!(Concurrency::new(f64::INFINITY, 1.0).is_err());
    }
}
