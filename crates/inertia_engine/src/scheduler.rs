//! Step scheduler
//!
//! Drives the spring integrator at a fixed wall-clock cadence on a background
//! thread, records every sample in the bounded history, and forwards every
//! Nth sample to registered subscribers.
//!
//! The tick cadence is chosen independently of the simulated `dt`: each tick
//! advances simulated time by exactly `dt` no matter how much wall-clock time
//! passed, and a missed deadline delays the next tick rather than running
//! catch-up steps.

use crate::error::{EngineError, Result};
use crate::history::{History, Sample};
use crate::spring::{self, MotionState, SpringConfig};
use slotmap::{new_key_type, SlotMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

pub use crate::spring::ConfigUpdate;

/// History capacity a freshly constructed scheduler starts with
pub const DEFAULT_HISTORY_CAPACITY: usize = 8000;

/// Wall-clock tick rate a freshly constructed scheduler starts with
pub const DEFAULT_TICK_RATE: u32 = 120;

new_key_type! {
    /// Handle to a registered sample subscriber
    pub struct SubscriberId;
}

/// Callback invoked with each published sample
pub type SampleCallback = Arc<dyn Fn(&Sample) + Send + Sync>;

/// Whether the scheduler's tick thread is running
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
}

/// Everything a tick touches, behind one mutex
///
/// Parameter updates and commands serialize through this lock, so a tick
/// observes either the fully-old or the fully-new configuration, never a mix.
struct EngineInner {
    config: SpringConfig,
    state: MotionState,
    step_index: u64,
    history: History,
    publish_every: u32,
    publish_counter: u32,
    subscribers: SlotMap<SubscriberId, SampleCallback>,
    tick_interval: Duration,
}

/// Run one tick: integrate, commit, record, and collect callbacks due
///
/// Callbacks are cloned out and invoked after the lock is released, so a
/// subscriber may call back into the engine without deadlocking. Returns the
/// tick interval in effect, for the thread loop's sleep.
fn run_tick(inner: &Mutex<EngineInner>) -> Duration {
    let (sample, callbacks, interval) = {
        let mut guard = inner.lock().unwrap();

        let (next, acceleration) = spring::step(guard.state, &guard.config);
        guard.state = next;

        let sample = Sample {
            position: next.position,
            velocity: next.velocity,
            acceleration,
            target: guard.config.target(),
            step_index: guard.step_index,
        };
        guard.history.push(sample);
        guard.step_index += 1;

        guard.publish_counter += 1;
        let callbacks: Vec<SampleCallback> = if guard.publish_counter >= guard.publish_every {
            guard.publish_counter = 0;
            guard.subscribers.values().cloned().collect()
        } else {
            Vec::new()
        };

        (sample, callbacks, guard.tick_interval)
    };

    for callback in &callbacks {
        callback(&sample);
    }
    interval
}

/// Fixed-cadence driver for the spring integrator
///
/// Owns the motion state, the sample history, the publish throttle, and the
/// subscriber registry. `start()` spawns a background thread that ticks until
/// `stop()`; `tick()` runs a single step synchronously for callers that drive
/// the engine themselves (or for deterministic tests).
///
/// ```ignore
/// use inertia_engine::{SpringConfig, StepScheduler};
///
/// let mut scheduler = StepScheduler::new(SpringConfig::default());
/// let _id = scheduler.subscribe(|sample| println!("{}", sample.position));
/// scheduler.start();
/// // ... later
/// scheduler.stop();
/// ```
pub struct StepScheduler {
    inner: Arc<Mutex<EngineInner>>,
    /// Stop signal for the tick thread
    stop_flag: Arc<AtomicBool>,
    /// Tick thread handle (if running)
    thread_handle: Option<JoinHandle<()>>,
}

impl StepScheduler {
    pub fn new(config: SpringConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(EngineInner {
                config,
                state: MotionState::default(),
                step_index: 0,
                history: History::new(DEFAULT_HISTORY_CAPACITY)
                    .expect("default capacity is nonzero"),
                publish_every: 1,
                publish_counter: 0,
                subscribers: SlotMap::with_key(),
                tick_interval: Duration::from_micros(1_000_000 / DEFAULT_TICK_RATE as u64),
            })),
            stop_flag: Arc::new(AtomicBool::new(false)),
            thread_handle: None,
        }
    }

    // =========================================================================
    // Run state
    // =========================================================================

    /// Start ticking on a background thread
    ///
    /// No-op if already running. The thread ticks once per tick interval
    /// until `stop()`.
    pub fn start(&mut self) {
        if self.thread_handle.is_some() {
            return; // Already running
        }
        self.stop_flag.store(false, Ordering::Relaxed);

        let inner = Arc::clone(&self.inner);
        let stop_flag = Arc::clone(&self.stop_flag);

        self.thread_handle = Some(thread::spawn(move || {
            tracing::debug!("tick thread started");
            let mut ticks: u64 = 0;

            while !stop_flag.load(Ordering::Relaxed) {
                let start = Instant::now();

                let interval = run_tick(&inner);

                ticks += 1;
                if ticks % 1024 == 0 {
                    tracing::debug!(ticks, "tick thread heartbeat");
                }

                // Sleep the remainder of the interval. A missed deadline
                // just delays the next tick; there is no catch-up.
                let elapsed = start.elapsed();
                if elapsed < interval {
                    thread::sleep(interval - elapsed);
                }
            }
            tracing::debug!(ticks, "tick thread stopped");
        }));
    }

    /// Stop the tick thread
    ///
    /// No-op if idle. An in-flight tick completes before this returns.
    pub fn stop(&mut self) {
        self.stop_flag.store(true, Ordering::Relaxed);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
        self.stop_flag.store(false, Ordering::Relaxed);
    }

    pub fn run_state(&self) -> RunState {
        if self.thread_handle.is_some() {
            RunState::Running
        } else {
            RunState::Idle
        }
    }

    pub fn is_running(&self) -> bool {
        self.run_state() == RunState::Running
    }

    /// Run exactly one tick synchronously
    ///
    /// Same code path as the background thread: integrate, record, publish.
    /// Intended for callers that drive the engine from their own loop.
    pub fn tick(&self) {
        run_tick(&self.inner);
    }

    /// Reset the motion state and the sample pipeline
    ///
    /// Clears the history and zeroes the step index and the publish counter.
    /// Valid whether idle or running; the run state is unchanged.
    pub fn reset(&self, position: f64, velocity: f64) {
        let mut guard = self.inner.lock().unwrap();
        guard.state = MotionState::new(position, velocity);
        guard.history.clear();
        guard.step_index = 0;
        guard.publish_counter = 0;
        tracing::debug!(position, velocity, "engine reset");
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    /// Apply a partial parameter update atomically
    ///
    /// The merged configuration is validated as a whole before it replaces
    /// the current one; on error nothing changes and no tick ever observes a
    /// partial mix.
    pub fn set_config(&self, update: &ConfigUpdate) -> Result<()> {
        let mut guard = self.inner.lock().unwrap();
        guard.config = guard.config.apply(update)?;
        tracing::debug!(?update, "configuration updated");
        Ok(())
    }

    /// Move the equilibrium target
    pub fn set_target(&self, target: f64) -> Result<()> {
        self.set_config(&ConfigUpdate::target(target))
    }

    /// Change the history capacity in place (no reset required)
    pub fn set_history_capacity(&self, capacity: usize) -> Result<()> {
        self.inner.lock().unwrap().history.resize(capacity)
    }

    /// Publish every `n`th sample to subscribers
    ///
    /// The in-flight counter is clamped to the new threshold, not reset, so
    /// accumulated progress is preserved; a counter already at or past the
    /// new threshold publishes on the next tick.
    pub fn set_publish_every(&self, n: u32) -> Result<()> {
        if n < 1 {
            return Err(EngineError::InvalidArgument(
                "publish interval must be >= 1".into(),
            ));
        }
        let mut guard = self.inner.lock().unwrap();
        guard.publish_every = n;
        guard.publish_counter = guard.publish_counter.min(n);
        Ok(())
    }

    /// Set the wall-clock tick rate in ticks per second
    ///
    /// Independent of the simulated `dt`. Takes effect on the next tick.
    pub fn set_tick_rate(&self, ticks_per_second: u32) -> Result<()> {
        if ticks_per_second < 1 {
            return Err(EngineError::InvalidArgument(
                "tick rate must be >= 1".into(),
            ));
        }
        self.inner.lock().unwrap().tick_interval =
            Duration::from_micros(1_000_000 / ticks_per_second as u64);
        Ok(())
    }

    // =========================================================================
    // Subscribers
    // =========================================================================

    /// Register a callback invoked with each published sample
    pub fn subscribe<F>(&self, callback: F) -> SubscriberId
    where
        F: Fn(&Sample) + Send + Sync + 'static,
    {
        self.inner
            .lock()
            .unwrap()
            .subscribers
            .insert(Arc::new(callback))
    }

    /// Remove a subscriber; returns whether it was registered
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.inner.lock().unwrap().subscribers.remove(id).is_some()
    }

    // =========================================================================
    // Observation
    // =========================================================================

    /// Owned copy of the history, oldest first
    pub fn snapshot(&self) -> Vec<Sample> {
        self.inner.lock().unwrap().history.snapshot()
    }

    /// Most recent sample, if any tick has run since the last reset
    pub fn latest_sample(&self) -> Option<Sample> {
        self.inner.lock().unwrap().history.latest().copied()
    }

    pub fn motion_state(&self) -> MotionState {
        self.inner.lock().unwrap().state
    }

    pub fn config(&self) -> SpringConfig {
        self.inner.lock().unwrap().config
    }

    /// Get a weak handle for passing to the presentation layer
    pub fn handle(&self) -> EngineHandle {
        EngineHandle {
            inner: Arc::downgrade(&self.inner),
        }
    }
}

impl Default for StepScheduler {
    fn default() -> Self {
        Self::new(SpringConfig::default())
    }
}

impl Drop for StepScheduler {
    fn drop(&mut self) {
        // Stop the tick thread when the scheduler is dropped
        self.stop();
    }
}

/// A weak handle to a running engine
///
/// Carries the inbound command surface for a presentation layer without
/// keeping the engine alive. Once the owning [`StepScheduler`] is dropped,
/// setters become no-ops and getters return `None`.
#[derive(Clone)]
pub struct EngineHandle {
    inner: Weak<Mutex<EngineInner>>,
}

impl EngineHandle {
    /// Apply a partial parameter update atomically
    ///
    /// Returns `Ok(())` without effect if the engine is gone.
    pub fn set_config(&self, update: &ConfigUpdate) -> Result<()> {
        if let Some(inner) = self.inner.upgrade() {
            let mut guard = inner.lock().unwrap();
            guard.config = guard.config.apply(update)?;
        }
        Ok(())
    }

    /// Move the equilibrium target
    pub fn set_target(&self, target: f64) -> Result<()> {
        self.set_config(&ConfigUpdate::target(target))
    }

    /// Change the history capacity in place
    pub fn set_history_capacity(&self, capacity: usize) -> Result<()> {
        if let Some(inner) = self.inner.upgrade() {
            inner.lock().unwrap().history.resize(capacity)?;
        }
        Ok(())
    }

    /// Publish every `n`th sample; the in-flight counter is clamped
    pub fn set_publish_every(&self, n: u32) -> Result<()> {
        if n < 1 {
            return Err(EngineError::InvalidArgument(
                "publish interval must be >= 1".into(),
            ));
        }
        if let Some(inner) = self.inner.upgrade() {
            let mut guard = inner.lock().unwrap();
            guard.publish_every = n;
            guard.publish_counter = guard.publish_counter.min(n);
        }
        Ok(())
    }

    /// Reset the motion state and the sample pipeline
    pub fn reset(&self, position: f64, velocity: f64) {
        if let Some(inner) = self.inner.upgrade() {
            let mut guard = inner.lock().unwrap();
            guard.state = MotionState::new(position, velocity);
            guard.history.clear();
            guard.step_index = 0;
            guard.publish_counter = 0;
        }
    }

    /// Register a sample callback; `None` if the engine is gone
    pub fn subscribe<F>(&self, callback: F) -> Option<SubscriberId>
    where
        F: Fn(&Sample) + Send + Sync + 'static,
    {
        self.inner
            .upgrade()
            .map(|inner| inner.lock().unwrap().subscribers.insert(Arc::new(callback)))
    }

    /// Remove a subscriber
    pub fn unsubscribe(&self, id: SubscriberId) {
        if let Some(inner) = self.inner.upgrade() {
            inner.lock().unwrap().subscribers.remove(id);
        }
    }

    /// Owned copy of the history, oldest first
    pub fn snapshot(&self) -> Option<Vec<Sample>> {
        self.inner
            .upgrade()
            .map(|inner| inner.lock().unwrap().history.snapshot())
    }

    /// Most recent sample
    pub fn latest_sample(&self) -> Option<Sample> {
        self.inner
            .upgrade()
            .and_then(|inner| inner.lock().unwrap().history.latest().copied())
    }

    pub fn motion_state(&self) -> Option<MotionState> {
        self.inner.upgrade().map(|inner| inner.lock().unwrap().state)
    }
}
