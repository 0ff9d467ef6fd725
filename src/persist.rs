//! Plain-text model files.
//!
//! A model file lists the trainable layers in pipeline order (convolutions,
//! then dense layers; the flatten stage has nothing to store). There are no
//! type tags: the reader walks the network it loads into and expects each
//! block to match the layer at that position.
//!
//! ```text
//! dense:        rows cols          (weights)
//!               rows cols          (bias)
//!               rows cols          (linear output)
//!               weight values, bias values
//!               ---
//! convolution:  filters channels k k
//!               filters out_h out_w
//!               weight values, bias values
//!               ---
//! ```
//!
//! Values are separated by arbitrary whitespace.

use crate::error::{Error, Result};
use crate::layers::{Layer, NetworkLayer};
use crate::network::Network;
use crate::tensor::Tensor;
use log::info;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;
use std::str::SplitWhitespace;

const SEPARATOR: &str = "---";

fn write_values<W: Write>(out: &mut W, t: &Tensor) -> Result<()> {
    let row = t.shape().last().copied().unwrap_or(1).max(1);
    for chunk in t.to_contiguous().data().chunks(row) {
        let line: Vec<String> = chunk.iter().map(|v| v.to_string()).collect();
        writeln!(out, "{}", line.join(" "))?;
    }
    Ok(())
}

fn write_dims<W: Write>(out: &mut W, dims: &[usize]) -> Result<()> {
    let line: Vec<String> = dims.iter().map(usize::to_string).collect();
    writeln!(out, "{}", line.join(" "))?;
    Ok(())
}

/// Serialize every trainable layer of `network` to `out`.
///
/// # Errors
///
/// [`Error::Uninitialized`] if a layer has no parameters yet.
pub fn write_model<W: Write>(network: &Network, mut out: W) -> Result<()> {
    for (i, layer) in network.layers().iter().enumerate() {
        let linear_shape = match layer {
            NetworkLayer::Flatten(_) => continue,
            NetworkLayer::Dense(dense) => Some(dense.linear().shape().to_vec()),
            NetworkLayer::Convolution(_) => None,
        };
        let params = layer
            .parameters()
            .ok_or_else(|| Error::uninitialized(format!("{} ({})", i, layer.name())))?;
        write_dims(&mut out, params.weights.shape())?;
        write_dims(&mut out, params.bias.shape())?;
        if let Some(linear) = linear_shape {
            write_dims(&mut out, &linear)?;
        }
        write_values(&mut out, &params.weights)?;
        write_values(&mut out, &params.bias)?;
        writeln!(out, "{}", SEPARATOR)?;
    }
    out.flush()?;
    Ok(())
}

/// Whitespace token stream with model-format errors.
struct Tokens<'a> {
    inner: SplitWhitespace<'a>,
}

impl<'a> Tokens<'a> {
    fn next(&mut self, what: &str) -> Result<&'a str> {
        self.inner
            .next()
            .ok_or_else(|| Error::ModelFormat(format!("unexpected end of file while reading {}", what)))
    }

    fn dims(&mut self, count: usize, what: &str) -> Result<Vec<usize>> {
        (0..count)
            .map(|_| {
                let token = self.next(what)?;
                token
                    .parse::<usize>()
                    .map_err(|_| Error::ModelFormat(format!("bad dimension {:?} in {}", token, what)))
            })
            .collect()
    }

    fn tensor(&mut self, shape: &[usize], what: &str) -> Result<Tensor> {
        let size = shape
            .iter()
            .try_fold(1usize, |acc, &d| acc.checked_mul(d))
            .ok_or_else(|| Error::ModelFormat(format!("{} shape {:?} is too large", what, shape)))?;
        let mut values = Vec::new();
        for _ in 0..size {
            let token = self.next(what)?;
            let v = token
                .parse::<f32>()
                .map_err(|_| Error::ModelFormat(format!("bad value {:?} in {}", token, what)))?;
            values.push(v);
        }
        Tensor::from_vec(shape, values)
    }

    fn separator(&mut self, layer: usize) -> Result<()> {
        match self.next("separator")? {
            SEPARATOR => Ok(()),
            other => Err(Error::ModelFormat(format!(
                "expected {:?} after layer {}, found {:?}",
                SEPARATOR, layer, other
            ))),
        }
    }
}

fn expect_dims(layer: usize, what: &str, expected: &[usize], got: &[usize]) -> Result<()> {
    if expected != got {
        return Err(Error::ModelFormat(format!(
            "layer {}: {} shape {:?} does not fit the network (expected {:?})",
            layer, what, got, expected
        )));
    }
    Ok(())
}

/// Parse the block of the trainable layer at `index`, whose input has `input_shape`.
fn read_block(
    tokens: &mut Tokens<'_>,
    index: usize,
    layer: &NetworkLayer,
    input_shape: &[usize],
) -> Result<(Tensor, Tensor)> {
    let output_shape = layer.output_shape(input_shape)?;
    let (weight_shape, bias_shape) = match layer {
        NetworkLayer::Dense(dense) => {
            let w = tokens.dims(2, "dense weight shape")?;
            let b = tokens.dims(2, "dense bias shape")?;
            let linear = tokens.dims(2, "dense linear shape")?;
            expect_dims(index, "weight", &[dense.units(), input_shape[0]], &w)?;
            expect_dims(index, "bias", &output_shape, &b)?;
            expect_dims(index, "linear", &output_shape, &linear)?;
            (w, b)
        }
        NetworkLayer::Convolution(conv) => {
            let w = tokens.dims(4, "convolution weight shape")?;
            let b = tokens.dims(3, "convolution bias shape")?;
            let k = conv.kernel_size();
            expect_dims(index, "weight", &[conv.kernel_count(), input_shape[0], k, k], &w)?;
            expect_dims(index, "bias", &output_shape, &b)?;
            (w, b)
        }
        NetworkLayer::Flatten(_) => {
            return Err(Error::ModelFormat(format!("layer {} has no parameters to read", index)))
        }
    };
    let weights = tokens.tensor(&weight_shape, "weights")?;
    let bias = tokens.tensor(&bias_shape, "bias")?;
    tokens.separator(index)?;
    Ok((weights, bias))
}

/// Load parameters for every trainable layer of `network` from `input`.
///
/// The network must have the architecture the file was written from. The
/// whole file is parsed and checked against the network before any layer is
/// touched, so on error the network keeps its previous parameters.
pub fn read_model<R: Read>(network: &mut Network, mut input: R) -> Result<()> {
    let mut text = String::new();
    input.read_to_string(&mut text)?;
    let mut tokens = Tokens {
        inner: text.split_whitespace(),
    };

    let mut blocks = Vec::new();
    let mut shape = network.input_shape().to_vec();
    for (i, layer) in network.layers().iter().enumerate() {
        if !matches!(layer, NetworkLayer::Flatten(_)) {
            blocks.push((i, read_block(&mut tokens, i, layer, &shape)?));
        }
        shape = layer.output_shape(&shape)?;
    }
    if let Some(extra) = tokens.inner.next() {
        return Err(Error::ModelFormat(format!(
            "trailing data after the last layer: {:?}",
            extra
        )));
    }

    let layers = network.layers_mut();
    for (i, (weights, bias)) in blocks {
        layers[i].set_parameters(&weights, &bias)?;
    }
    Ok(())
}

/// Write `network` to the file at `path`.
pub fn save_network(network: &Network, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)?;
    write_model(network, BufWriter::new(file))?;
    info!("saved model to {}", path.display());
    Ok(())
}

/// Read parameters for `network` from the file at `path`.
pub fn load_network(network: &mut Network, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let file = File::open(path)?;
    read_model(network, file)?;
    info!("loaded model from {}", path.display());
    Ok(())
}
