//! Learning rate scheduler trait and implementations
//!
//! The trainer asks the scheduler for the learning rate at the start of every
//! epoch and advances it once the epoch qualifies for decay.

/// Core trait for learning rate schedulers.
///
/// # Example
///
/// ```
/// use ndnet::utils::lr_scheduler::{ExponentialDecay, LRScheduler};
///
/// let mut scheduler = ExponentialDecay::new(0.1, 0.5).with_min_lr(0.03);
/// scheduler.step();
/// assert!((scheduler.get_lr() - 0.05).abs() < 1e-7);
/// scheduler.step();
/// assert!((scheduler.get_lr() - 0.03).abs() < 1e-7);
/// ```
pub trait LRScheduler {
    /// Learning rate for the current epoch.
    fn get_lr(&self) -> f32;

    /// Advance to the next decay step.
    fn step(&mut self);

    /// Return to the initial learning rate.
    fn reset(&mut self);
}

/// Learning rate that never changes.
#[derive(Debug, Clone)]
pub struct ConstantLR {
    lr: f32,
}

impl ConstantLR {
    pub fn new(lr: f32) -> Self {
        Self { lr }
    }
}

impl LRScheduler for ConstantLR {
    fn get_lr(&self) -> f32 {
        self.lr
    }

    fn step(&mut self) {}

    fn reset(&mut self) {}
}

/// Exponential decay learning rate scheduler with an optional floor.
///
/// Formula: lr = max(min_lr, initial_lr * gamma^steps)
///
/// # Fields
///
/// * `initial_lr` - Starting learning rate
/// * `gamma` - Multiplicative decay factor applied each step (typically 0.95 to 0.99)
/// * `min_lr` - Floor the learning rate never drops below
/// * `steps` - Number of decay steps taken
#[derive(Debug, Clone)]
pub struct ExponentialDecay {
    initial_lr: f32,
    gamma: f32,
    min_lr: f32,
    steps: usize,
    current_lr: f32,
}

impl ExponentialDecay {
    /// Creates a new exponential decay scheduler without a floor.
    ///
    /// # Arguments
    ///
    /// * `initial_lr` - Starting learning rate (must be positive)
    /// * `gamma` - Decay factor applied each step
    pub fn new(initial_lr: f32, gamma: f32) -> Self {
        Self {
            initial_lr,
            gamma,
            min_lr: 0.0,
            steps: 0,
            current_lr: initial_lr,
        }
    }

    /// Clamp the decayed rate to at least `min_lr`.
    pub fn with_min_lr(mut self, min_lr: f32) -> Self {
        self.min_lr = min_lr;
        self.current_lr = self.current_lr.max(min_lr);
        self
    }
}

impl LRScheduler for ExponentialDecay {
    fn get_lr(&self) -> f32 {
        self.current_lr
    }

    fn step(&mut self) {
        self.steps += 1;
        self.current_lr = (self.initial_lr * self.gamma.powi(self.steps as i32)).max(self.min_lr);
    }

    fn reset(&mut self) {
        self.steps = 0;
        self.current_lr = self.initial_lr.max(self.min_lr);
    }
}
