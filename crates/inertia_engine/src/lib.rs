//! Inertial Easing Engine
//!
//! Fixed-timestep damped-spring integration for animation easing, control
//! smoothing, and procedural motion.
//!
//! # Features
//!
//! - **Nonlinear spring**: restoring force `k * sign(d) * |d|^p` with a
//!   configurable distance exponent (effective range [0, 2])
//! - **Semi-implicit Euler**: velocity update feeds the position update for
//!   better numerical damping than explicit Euler
//! - **Sample History**: bounded ring of recent samples, resizable in place
//! - **Step Scheduler**: background thread ticking at a fixed wall-clock
//!   cadence, decoupled from the simulated `dt`
//! - **Publish Throttle**: forward every Nth sample to subscribers
//! - **Validated Configuration**: partial updates applied atomically,
//!   rejected whole on any invalid field

pub mod error;
pub mod history;
pub mod scheduler;
pub mod spring;

pub use error::{EngineError, Result};
pub use history::{History, Sample};
pub use scheduler::{
    ConfigUpdate, EngineHandle, RunState, SampleCallback, StepScheduler, SubscriberId,
};
pub use spring::{step, MotionState, SpringConfig};
