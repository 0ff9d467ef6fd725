//! Single-sample training loop and evaluation.

use crate::architecture::NetworkConfig;
use crate::config::TrainingConfig;
use crate::data::{one_hot, Dataset};
use crate::error::{Error, Result};
use crate::network::Network;
use crate::tensor;
use crate::utils::lr_scheduler::{ConstantLR, ExponentialDecay, LRScheduler};
use crate::utils::SimpleRng;
use log::info;
use std::fmt;

/// Fraction of `dataset` whose argmax prediction equals the label.
pub fn evaluate(network: &mut Network, dataset: &Dataset) -> Result<f32> {
    if dataset.is_empty() {
        return Ok(0.0);
    }
    let mut correct = 0usize;
    for sample in dataset {
        if network.predict(&sample.image)? == sample.label {
            correct += 1;
        }
    }
    Ok(correct as f32 / dataset.len() as f32)
}

/// Metrics of one training epoch.
#[derive(Debug, Clone, PartialEq)]
pub struct EpochReport {
    pub epoch: usize,
    /// Mean per-sample loss
    pub loss: f32,
    pub train_accuracy: f32,
    pub val_accuracy: Option<f32>,
    /// Learning rate used during the epoch
    pub learning_rate: f32,
}

impl fmt::Display for EpochReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Epoch {}: loss = {:.6}, train acc = {:.2}%",
            self.epoch,
            self.loss,
            self.train_accuracy * 100.0
        )?;
        if let Some(val) = self.val_accuracy {
            write!(f, ", val acc = {:.2}%", val * 100.0)?;
        }
        write!(f, ", learning rate = {:.6}", self.learning_rate)
    }
}

/// Result of [`Trainer::fit`].
#[derive(Debug)]
pub struct TrainingSummary {
    pub reports: Vec<EpochReport>,
    /// Epoch whose parameters `best` holds
    pub best_epoch: usize,
    /// Validation accuracy of `best` (training accuracy without a validation set)
    pub best_accuracy: f32,
    /// Deep copy of the network at its best epoch
    pub best: Network,
}

/// Drives a network through epochs of per-sample SGD-style updates.
pub struct Trainer {
    config: TrainingConfig,
    rng: SimpleRng,
    scheduler: Box<dyn LRScheduler>,
}

impl Trainer {
    pub fn new(config: TrainingConfig) -> Result<Self> {
        config.validate()?;
        let rng = match config.seed {
            Some(seed) => SimpleRng::new(seed),
            None => SimpleRng::from_time(),
        };
        let scheduler: Box<dyn LRScheduler> = if config.lr_decay >= 1.0 {
            Box::new(ConstantLR::new(config.learning_rate))
        } else {
            Box::new(
                ExponentialDecay::new(config.learning_rate, config.lr_decay)
                    .with_min_lr(config.min_learning_rate),
            )
        };
        Ok(Self {
            config,
            rng,
            scheduler,
        })
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Network for `architecture` using the configured optimizer and learning rate.
    pub fn build_network(&self, architecture: NetworkConfig) -> Result<Network> {
        let optimizer = self.config.optimizer.build(self.config.learning_rate);
        Network::with_optimizer(architecture, optimizer)
    }

    /// One pass over `train`; returns `(mean loss, accuracy)`.
    ///
    /// Accuracy counts the predictions made by each forward pass, i.e. before
    /// that sample's update.
    pub fn train_epoch(&mut self, network: &mut Network, train: &mut Dataset) -> Result<(f32, f32)> {
        if train.is_empty() {
            return Err(Error::config("training set is empty"));
        }
        if self.config.shuffle {
            train.shuffle(&mut self.rng);
        }
        let classes = network.config().output_size();
        let mut total_loss = 0.0f32;
        let mut correct = 0usize;
        for sample in train.iter() {
            let target = one_hot(sample.label, classes)?;
            total_loss += network.train_step(&sample.image, &target)?;
            if tensor::argmax(network.output()) == sample.label {
                correct += 1;
            }
        }
        let n = train.len() as f32;
        Ok((total_loss / n, correct as f32 / n))
    }

    /// Train for the configured number of epochs.
    ///
    /// After every epoch the network is evaluated on `validation` (when
    /// given), `on_epoch` receives the report, the best network so far is
    /// snapshotted and the learning rate decays once training accuracy
    /// exceeds `decay_after_accuracy`.
    pub fn fit(
        &mut self,
        network: &mut Network,
        train: &mut Dataset,
        validation: Option<&Dataset>,
        mut on_epoch: impl FnMut(&EpochReport),
    ) -> Result<TrainingSummary> {
        self.scheduler.reset();
        let mut best = self.build_network(network.config().clone())?;
        let mut best_epoch = 0;
        let mut best_accuracy = f32::NEG_INFINITY;
        let mut reports = Vec::with_capacity(self.config.epochs);

        for epoch in 1..=self.config.epochs {
            let learning_rate = self.scheduler.get_lr();
            network.set_learning_rate(learning_rate);

            let (loss, train_accuracy) = self.train_epoch(network, train)?;
            let val_accuracy = match validation {
                Some(val) => Some(evaluate(network, val)?),
                None => None,
            };
            let report = EpochReport {
                epoch,
                loss,
                train_accuracy,
                val_accuracy,
                learning_rate,
            };
            info!("{}", report);
            on_epoch(&report);

            if train_accuracy > self.config.decay_after_accuracy {
                self.scheduler.step();
            }
            let score = val_accuracy.unwrap_or(train_accuracy);
            if score > best_accuracy {
                best_accuracy = score;
                best_epoch = epoch;
                best.copy_parameters_from(network)?;
            }
            reports.push(report);
        }

        Ok(TrainingSummary {
            reports,
            best_epoch,
            best_accuracy,
            best,
        })
    }
}
