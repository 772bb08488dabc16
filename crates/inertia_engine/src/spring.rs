//! Damped-spring parameters and the fixed-timestep integration step
//!
//! The restoring force is nonlinear in the distance to the target:
//! `k * sign(d) * |d|^p`, where `p` is derived from the configured distance
//! exponent and always lies in [0, 2]. Damping is linear in velocity.
//! Integration is semi-implicit Euler: the updated velocity feeds the
//! position update.

use crate::error::{EngineError, Result};

/// Validated parameter set for the spring integrator
///
/// Construction and every partial update run the same validation: all fields
/// finite, `mass` and `dt` strictly positive. Negative `elasticity` or
/// `friction` are accepted; they invert the physical meaning (anti-spring,
/// anti-damping) but the integrator is well-defined for them.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpringConfig {
    elasticity: f64,
    friction: f64,
    mass: f64,
    target: f64,
    distance_exponent: f64,
    dt: f64,
}

impl SpringConfig {
    /// Create a new configuration, validating every field
    pub fn new(
        elasticity: f64,
        friction: f64,
        mass: f64,
        target: f64,
        distance_exponent: f64,
        dt: f64,
    ) -> Result<Self> {
        let config = Self {
            elasticity,
            friction,
            mass,
            target,
            distance_exponent,
            dt,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("elasticity", self.elasticity),
            ("friction", self.friction),
            ("mass", self.mass),
            ("target", self.target),
            ("distance_exponent", self.distance_exponent),
            ("dt", self.dt),
        ] {
            if !value.is_finite() {
                return Err(EngineError::InvalidConfiguration(format!(
                    "{name} must be finite, got {value}"
                )));
            }
        }
        if self.mass <= 0.0 {
            return Err(EngineError::InvalidConfiguration(format!(
                "mass must be > 0, got {}",
                self.mass
            )));
        }
        if self.dt <= 0.0 {
            return Err(EngineError::InvalidConfiguration(format!(
                "dt must be > 0, got {}",
                self.dt
            )));
        }
        Ok(())
    }

    /// Merge a partial update into a copy of this configuration
    ///
    /// The merged result is validated as a whole before it is returned, so an
    /// invalid update never yields a half-applied configuration.
    pub fn apply(&self, update: &ConfigUpdate) -> Result<Self> {
        let merged = Self {
            elasticity: update.elasticity.unwrap_or(self.elasticity),
            friction: update.friction.unwrap_or(self.friction),
            mass: update.mass.unwrap_or(self.mass),
            target: update.target.unwrap_or(self.target),
            distance_exponent: update.distance_exponent.unwrap_or(self.distance_exponent),
            dt: update.dt.unwrap_or(self.dt),
        };
        merged.validate()?;
        Ok(merged)
    }

    pub fn elasticity(&self) -> f64 {
        self.elasticity
    }

    pub fn friction(&self) -> f64 {
        self.friction
    }

    pub fn mass(&self) -> f64 {
        self.mass
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    pub fn distance_exponent(&self) -> f64 {
        self.distance_exponent
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// Effective exponent applied to `|distance|`, always in [0, 2]
    pub fn effective_exponent(&self) -> f64 {
        self.distance_exponent.clamp(-1.0, 1.0) + 1.0
    }

    /// Critical damping coefficient for this stiffness and mass
    pub fn critical_damping(&self) -> f64 {
        2.0 * (self.elasticity * self.mass).sqrt()
    }

    /// Check if the spring is underdamped (will oscillate)
    pub fn is_underdamped(&self) -> bool {
        self.friction < self.critical_damping()
    }

    /// Check if the spring is overdamped (slow settling, no oscillation)
    pub fn is_overdamped(&self) -> bool {
        self.friction > self.critical_damping()
    }
}

impl Default for SpringConfig {
    /// The reference simulator defaults: a critically damped spring reaching
    /// its target in a fraction of a second of simulated time
    fn default() -> Self {
        Self {
            elasticity: 1.0,
            friction: 0.2,
            mass: 0.01,
            target: 1.0,
            distance_exponent: 0.0,
            dt: 0.01,
        }
    }
}

/// Partial configuration update
///
/// `None` fields keep their current value. Applied atomically via
/// [`SpringConfig::apply`]: either every field lands or none do.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ConfigUpdate {
    pub elasticity: Option<f64>,
    pub friction: Option<f64>,
    pub mass: Option<f64>,
    pub target: Option<f64>,
    pub distance_exponent: Option<f64>,
    pub dt: Option<f64>,
}

impl ConfigUpdate {
    /// Update that only moves the target
    pub fn target(target: f64) -> Self {
        Self {
            target: Some(target),
            ..Self::default()
        }
    }
}

/// Scalar motion state advanced by the integrator
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MotionState {
    pub position: f64,
    pub velocity: f64,
}

impl MotionState {
    pub fn new(position: f64, velocity: f64) -> Self {
        Self { position, velocity }
    }
}

/// Advance the state by one fixed timestep
///
/// Pure function: the caller commits the returned state. Returns the new
/// state and the acceleration that produced it.
///
/// The sign of the distance is applied outside the power so a fractional
/// exponent never sees a negative base, and a zero distance yields exactly
/// zero spring force even at effective exponent 0 (where `|0|^0` would
/// otherwise be 1).
pub fn step(state: MotionState, config: &SpringConfig) -> (MotionState, f64) {
    let d = config.target - state.position;
    let p = config.effective_exponent();

    let spring_force = if d == 0.0 {
        0.0
    } else {
        config.elasticity * d.signum() * d.abs().powf(p)
    };
    let damping_force = -config.friction * state.velocity;
    let acceleration = (spring_force + damping_force) / config.mass;

    // Semi-implicit: position integrates the already-updated velocity.
    let velocity = state.velocity + acceleration * config.dt;
    let position = state.position + velocity * config.dt;

    (MotionState { position, velocity }, acceleration)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(elasticity: f64, friction: f64, mass: f64, target: f64, de: f64) -> SpringConfig {
        SpringConfig::new(elasticity, friction, mass, target, de, 0.01).unwrap()
    }

    #[test]
    fn test_rejects_invalid_mass_and_dt() {
        assert!(matches!(
            SpringConfig::new(1.0, 0.2, 0.0, 1.0, 0.0, 0.01),
            Err(EngineError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            SpringConfig::new(1.0, 0.2, -0.5, 1.0, 0.0, 0.01),
            Err(EngineError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            SpringConfig::new(1.0, 0.2, 0.01, 1.0, 0.0, 0.0),
            Err(EngineError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            SpringConfig::new(1.0, 0.2, 0.01, 1.0, 0.0, -0.01),
            Err(EngineError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_rejects_non_finite_fields() {
        assert!(SpringConfig::new(f64::NAN, 0.2, 0.01, 1.0, 0.0, 0.01).is_err());
        assert!(SpringConfig::new(1.0, f64::INFINITY, 0.01, 1.0, 0.0, 0.01).is_err());
        assert!(SpringConfig::new(1.0, 0.2, 0.01, f64::NEG_INFINITY, 0.0, 0.01).is_err());
    }

    #[test]
    fn test_negative_elasticity_and_friction_accepted() {
        assert!(SpringConfig::new(-1.0, -0.2, 0.01, 1.0, 0.0, 0.01).is_ok());
    }

    #[test]
    fn test_spring_force_sign_matches_distance() {
        // For each raw exponent, acceleration from rest has the sign of
        // the distance to the target (no damping, vel = 0).
        for de in [-1.0, -0.5, 0.0, 0.5, 1.0] {
            for (position, target) in [(0.0, 1.0), (2.0, 1.0), (-3.0, -1.0), (0.5, 0.75)] {
                let cfg = config(1.0, 0.0, 1.0, target, de);
                let state = MotionState::new(position, 0.0);
                let (_, accel) = step(state, &cfg);
                let d = target - position;
                assert_eq!(
                    accel.signum(),
                    d.signum(),
                    "de={de} position={position} target={target}"
                );
                assert!(accel.is_finite());
            }
        }
    }

    #[test]
    fn test_zero_distance_zero_force_for_all_exponents() {
        // At the target, every effective exponent in [0, 2] must give
        // exactly zero force, including exponent 0 where |0|^0 == 1.
        for de in [-1.0, -0.5, 0.0, 0.5, 1.0] {
            let cfg = config(1.0, 0.0, 1.0, 2.5, de);
            let state = MotionState::new(2.5, 0.0);
            let (next, accel) = step(state, &cfg);
            assert_eq!(accel, 0.0, "de={de}");
            assert_eq!(next, state, "de={de}");
        }
    }

    #[test]
    fn test_exponent_clamped_outside_raw_range() {
        // Raw exponents beyond [-1, 1] behave as if clamped.
        let state = MotionState::new(0.0, 0.0);
        let (_, wild) = step(state, &config(1.0, 0.0, 1.0, 3.0, 7.0));
        let (_, clamped) = step(state, &config(1.0, 0.0, 1.0, 3.0, 1.0));
        assert_eq!(wild, clamped);
    }

    #[test]
    fn test_linear_case_manual_steps() {
        // Effective exponent 1: plain linear damped spring. Three steps from
        // rest, checked against hand-computed values.
        let cfg = SpringConfig::new(1.0, 0.2, 0.01, 1.0, 0.0, 0.01).unwrap();
        let state = MotionState::new(0.0, 0.0);

        let (s1, a1) = step(state, &cfg);
        assert!((a1 - 100.0).abs() < 1e-9);
        assert!((s1.velocity - 1.0).abs() < 1e-9);
        assert!((s1.position - 0.01).abs() < 1e-9);

        let (s2, a2) = step(s1, &cfg);
        assert!((a2 - 79.0).abs() < 1e-9);
        assert!((s2.velocity - 1.79).abs() < 1e-9);
        assert!((s2.position - 0.0279).abs() < 1e-9);

        let (s3, a3) = step(s2, &cfg);
        assert!((a3 - 61.41).abs() < 1e-9);
        assert!((s3.velocity - 2.4041).abs() < 1e-9);
        assert!((s3.position - 0.051941).abs() < 1e-9);
    }

    #[test]
    fn test_step_is_deterministic() {
        let cfg = SpringConfig::new(0.8, 0.15, 0.02, 1.5, 0.3, 0.005).unwrap();
        let mut a = MotionState::default();
        let mut b = MotionState::default();
        for _ in 0..1000 {
            let (na, aa) = step(a, &cfg);
            let (nb, ab) = step(b, &cfg);
            assert_eq!(na, nb);
            assert_eq!(aa.to_bits(), ab.to_bits());
            a = na;
            b = nb;
        }
    }

    #[test]
    fn test_default_config_settles_at_target() {
        // zeta = c / (2 * sqrt(k * m)) = 0.2 / 0.2 = 1: critically damped.
        let cfg = SpringConfig::default();
        assert!(!cfg.is_underdamped());
        assert!(!cfg.is_overdamped());

        let mut state = MotionState::default();
        for _ in 0..10_000 {
            state = step(state, &cfg).0;
        }
        assert!((state.position - 1.0).abs() < 1e-3);
        assert!(state.velocity.abs() < 1e-3);
    }

    #[test]
    fn test_apply_merges_and_rejects_whole() {
        let cfg = SpringConfig::default();

        let merged = cfg
            .apply(&ConfigUpdate {
                friction: Some(0.5),
                target: Some(2.0),
                ..ConfigUpdate::default()
            })
            .unwrap();
        assert_eq!(merged.friction(), 0.5);
        assert_eq!(merged.target(), 2.0);
        assert_eq!(merged.elasticity(), cfg.elasticity());
        assert_eq!(merged.dt(), cfg.dt());

        // One bad field rejects the whole update.
        let err = cfg.apply(&ConfigUpdate {
            friction: Some(0.5),
            mass: Some(0.0),
            ..ConfigUpdate::default()
        });
        assert!(matches!(err, Err(EngineError::InvalidConfiguration(_))));
    }
}
