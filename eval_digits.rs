// eval_digits.rs
// Evaluate a saved digit classifier and optionally classify one image.
//
// Usage:
//   eval_digits <model> <test_index> [architecture.json] [image]
//
// The architecture must be the one the model was trained with
// (digits_cnn preset by default).

use ndnet::architecture::{load_architecture, NetworkConfig};
use ndnet::data::{read_image, Dataset};
use ndnet::persist::load_network;
use ndnet::trainer::evaluate;
use ndnet::{Network, Result};
use std::env;
use std::process;

fn usage() -> ! {
    eprintln!("Usage: eval_digits <model> <test_index> [architecture.json] [image]");
    process::exit(1);
}

fn run(args: &[String]) -> Result<()> {
    let (model_path, test_index) = match args {
        [model, test, ..] => (model, test),
        _ => usage(),
    };
    let architecture = match args.get(2) {
        Some(path) => load_architecture(path)?,
        None => NetworkConfig::digits_cnn(),
    };
    let input_shape = architecture.input_shape.clone();
    let classes = architecture.output_size();

    let mut network = Network::new(architecture, 0.0)?;
    load_network(&mut network, model_path)?;
    println!("Loaded network from {}", model_path);

    let test = Dataset::load(test_index, &input_shape, classes)?;
    println!("Test data loaded ({} samples).", test.len());
    let accuracy = evaluate(&mut network, &test)?;
    println!("Test accuracy: {:.2}%", accuracy * 100.0);

    if let Some(image_path) = args.get(3) {
        let image = read_image(image_path, &input_shape)?;
        println!("Prediction: {}", network.predict(&image)?);
    }
    Ok(())
}

fn main() {
    env_logger::init();
    let args: Vec<String> = env::args().skip(1).collect();
    if let Err(e) = run(&args) {
        eprintln!("eval_digits: {}", e);
        process::exit(1);
    }
}
