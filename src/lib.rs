//! ndnet: a strided tensor engine and a single-sample CNN training pipeline
//!
//! Everything is written from scratch on `f32` buffers: no BLAS, no autodiff
//! graph, no batching. Gradients are computed layer by layer in a fixed
//! pipeline.
//!
//! # Modules
//!
//! - `tensor`: N-dimensional strided tensor, elementwise ops, matrix product, convolutions
//! - `layers`: Layer trait and the Dense, Convolution and Flatten layers
//! - `network`: Fixed pipeline with forward, backward and update
//! - `loss`: Cross-entropy and mean squared error
//! - `optimizers`: Optimizer trait and implementations (SGD, Momentum, RMSProp, Adam)
//! - `utils`: Shared utilities (RNG, activation functions, learning rate schedules)
//! - `architecture`: Network configuration and presets
//! - `config`: Training configuration
//! - `persist`: Plain-text model files
//! - `data`: Text dataset loading
//! - `trainer`: Training loop and evaluation
//! - `error`: Crate-wide error type

pub mod architecture;
pub mod config;
pub mod data;
pub mod error;
pub mod layers;
pub mod loss;
pub mod network;
pub mod optimizers;
pub mod persist;
pub mod tensor;
pub mod trainer;
pub mod utils;

pub use error::{Error, Result};
pub use network::Network;
pub use tensor::Tensor;
