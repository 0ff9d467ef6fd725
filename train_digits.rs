// train_digits.rs
// Train a digit classifier on a text dataset and save the best model.
//
// Usage:
//   train_digits <train_index> <val_index> [training.json] [architecture.json]
//
// Index files list `image_path label` per line (see ndnet::data).
// Without an architecture file the digits_cnn preset (1x20x20 input) is used.
//
// Output:
//   - logs/log_<unix_secs>.txt (one line per epoch)
//   - models/network_<unix_secs>.txt (parameters of the best validation epoch)

use ndnet::architecture::{load_architecture, NetworkConfig};
use ndnet::config::{load_config, TrainingConfig};
use ndnet::data::Dataset;
use ndnet::persist::save_network;
use ndnet::trainer::Trainer;
use ndnet::Result;
use std::env;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::process;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

fn usage() -> ! {
    eprintln!("Usage: train_digits <train_index> <val_index> [training.json] [architecture.json]");
    process::exit(1);
}

fn run(args: &[String]) -> Result<()> {
    let (train_index, val_index) = match args {
        [train, val, ..] => (train, val),
        _ => usage(),
    };
    let training = match args.get(2) {
        Some(path) => load_config(path)?,
        None => TrainingConfig::default(),
    };
    let architecture = match args.get(3) {
        Some(path) => load_architecture(path)?,
        None => NetworkConfig::digits_cnn(),
    };
    let classes = architecture.output_size();

    println!("Loading data...");
    let load_start = Instant::now();
    let mut train = Dataset::load(train_index, &architecture.input_shape, classes)?;
    let val = Dataset::load(val_index, &architecture.input_shape, classes)?;
    println!(
        "Train: {} | Val: {} ({:.2}s)",
        train.len(),
        val.len(),
        load_start.elapsed().as_secs_f64()
    );

    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    fs::create_dir_all("logs")?;
    fs::create_dir_all("models")?;
    let log_path = format!("logs/log_{}.txt", stamp);
    let model_path = format!("models/network_{}.txt", stamp);
    let mut log = BufWriter::new(File::create(&log_path)?);

    println!(
        "Training: epochs={} lr={} optimizer={:?}",
        training.epochs, training.learning_rate, training.optimizer
    );
    let mut trainer = Trainer::new(training)?;
    let mut network = trainer.build_network(architecture)?;

    let train_start = Instant::now();
    let mut log_error = None;
    let summary = trainer.fit(&mut network, &mut train, Some(&val), |report| {
        println!("{}", report);
        if let Err(e) = writeln!(log, "{}", report) {
            log_error.get_or_insert(e);
        }
    })?;
    if let Some(e) = log_error {
        eprintln!("Could not write {}: {}", log_path, e);
    }
    log.flush()?;
    println!(
        "Training finished in {:.2}s. Best val acc = {:.2}% at epoch {}",
        train_start.elapsed().as_secs_f64(),
        summary.best_accuracy * 100.0,
        summary.best_epoch
    );

    save_network(&summary.best, &model_path)?;
    println!("Saved network to {}", model_path);
    Ok(())
}

fn main() {
    env_logger::init();
    let args: Vec<String> = env::args().skip(1).collect();
    if let Err(e) = run(&args) {
        eprintln!("train_digits: {}", e);
        process::exit(1);
    }
}
