//! Shared utilities: random numbers, activation functions and learning rate
//! schedules.

pub mod activations;
pub mod lr_scheduler;
pub mod rng;

pub use activations::Activation;
pub use rng::SimpleRng;
