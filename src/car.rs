use glam::Vec3;
use serde::Serialize;

use crate::config::CarConfig;

/// Motion phase of the car.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CarPhase {
    Moving,
    Stopped,
}

/// Snapshot of the car read by the scene composer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CarState {
    pub position: Vec3,
    pub speed: f32,
    pub stopped: bool,
}

/// Fixed-step car animation along the road's X axis.
///
/// Each tick adds `speed * fixed_step`; once `x` exceeds `wrap_max` it is
/// reset to exactly `wrap_min`, discarding the overflow.
#[derive(Debug, Clone, PartialEq)]
pub struct CarMotion {
    state: CarState,
    fixed_step: f32,
    wrap_min: f32,
    wrap_max: f32,
}

impl CarMotion {
    pub fn new(config: &CarConfig) -> Self {
        Self {
            state: CarState {
                position: config.start,
                speed: config.speed,
                stopped: false,
            },
            fixed_step: config.fixed_step,
            wrap_min: config.wrap_min,
            wrap_max: config.wrap_max,
        }
    }

    pub fn with_state(config: &CarConfig, state: CarState) -> Self {
        Self {
            state,
            ..Self::new(config)
        }
    }

    pub fn state(&self) -> CarState {
        self.state
    }

    pub fn position(&self) -> Vec3 {
        self.state.position
    }

    pub fn phase(&self) -> CarPhase {
        if self.state.stopped {
            CarPhase::Stopped
        } else {
            CarPhase::Moving
        }
    }

    pub fn stop(&mut self) {
        self.set_stopped(true);
    }

    pub fn resume(&mut self) {
        self.set_stopped(false);
    }

    /// Enters or leaves `Stopped`. Position is never touched here.
    pub fn set_stopped(&mut self, stopped: bool) {
        self.state.stopped = stopped;
    }

    /// Advances one scheduled frame. Returns true if the car wrapped.
    pub fn tick(&mut self) -> bool {
        if self.state.stopped {
            return false;
        }
        let position = &mut self.state.position;
        position.x += self.state.speed * self.fixed_step;
        if position.x > self.wrap_max {
            position.x = self.wrap_min;
            return true;
        }
        false
    }
}

impl Default for CarMotion {
    fn default() -> Self {
        Self::new(&CarConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    fn car_at(x: f32) -> CarMotion {
        CarMotion::with_state(
            &CarConfig::default(),
            CarState {
                position: Vec3::new(x, 0.1, 0.0),
                speed: 1.0,
                stopped: false,
            },
        )
    }

    #[test]
    fn advances_by_speed_times_fixed_step() {
        let mut car = CarMotion::default();
        assert_eq!(car.phase(), CarPhase::Moving);
        assert!(!car.tick());
        assert_abs_diff_eq!(car.position().x, -49.9, epsilon = 1e-5);
        assert_eq!(car.position().y, 0.1);
    }

    #[test]
    fn wraps_to_exact_minimum_without_carry() {
        let mut car = car_at(49.95);
        assert!(car.tick());
        assert_eq!(car.position().x, -50.0);
    }

    #[test]
    fn exactly_at_maximum_does_not_wrap() {
        let mut car = car_at(50.0);
        car.fixed_step = 0.0;
        assert!(!car.tick());
        assert_eq!(car.position().x, 50.0);
    }

    #[test]
    fn stopped_freezes_position() {
        let mut car = car_at(10.0);
        car.stop();
        assert_eq!(car.phase(), CarPhase::Stopped);
        for _ in 0..5 {
            assert!(!car.tick());
        }
        assert_eq!(car.position().x, 10.0);
        car.resume();
        car.tick();
        assert_abs_diff_eq!(car.position().x, 10.1, epsilon = 1e-5);
    }

    #[test]
    fn toggling_without_ticks_leaves_state_unchanged() {
        let mut car = car_at(3.0);
        let before = car.state();
        car.set_stopped(true);
        car.set_stopped(false);
        assert_eq!(car.state(), before);
    }

    #[test]
    fn full_lap_returns_to_start_region() {
        let mut car = CarMotion::default();
        let mut wraps = 0;
        for _ in 0..1001 {
            if car.tick() {
                wraps += 1;
            }
        }
        assert_eq!(wraps, 1);
        assert!(car.position().x < -49.0);
    }
}
