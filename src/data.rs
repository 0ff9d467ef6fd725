//! Labelled image datasets stored as plain text.
//!
//! An index file lists one sample per line, `image_path label`. Each image
//! file holds whitespace-separated pixel values. Relative image paths are
//! resolved against the directory of the index file.

use crate::error::{Error, Result};
use crate::tensor::Tensor;
use crate::utils::SimpleRng;
use log::{info, warn};
use std::fs;
use std::path::{Path, PathBuf};

/// One image with its class label.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub image: Tensor,
    pub label: usize,
}

/// In-memory list of samples.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    samples: Vec<Sample>,
}

impl Dataset {
    pub fn new(samples: Vec<Sample>) -> Self {
        Self { samples }
    }

    /// Load every entry of an index file, reading images into `input_shape`.
    ///
    /// # Arguments
    ///
    /// * `index` - Path of the `image_path label` index file
    /// * `input_shape` - Shape each image is read into (its element count must match the file)
    /// * `classes` - Number of classes; larger labels are rejected
    pub fn load(index: impl AsRef<Path>, input_shape: &[usize], classes: usize) -> Result<Self> {
        let index = index.as_ref();
        let entries = load_index(index)?;
        let mut samples = Vec::with_capacity(entries.len());
        for (path, label) in entries {
            if label >= classes {
                return Err(Error::Dataset {
                    path: index.to_path_buf(),
                    reason: format!("label {} for {} exceeds {} classes", label, path.display(), classes),
                });
            }
            let image = read_image(&path, input_shape)?;
            samples.push(Sample { image, label });
        }
        info!("loaded {} samples from {}", samples.len(), index.display());
        Ok(Self { samples })
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Sample> {
        self.samples.iter()
    }

    /// Reorder the samples in place (images and labels move together).
    pub fn shuffle(&mut self, rng: &mut SimpleRng) {
        rng.shuffle(&mut self.samples);
    }
}

impl<'a> IntoIterator for &'a Dataset {
    type Item = &'a Sample;
    type IntoIter = std::slice::Iter<'a, Sample>;

    fn into_iter(self) -> Self::IntoIter {
        self.samples.iter()
    }
}

/// Parse an index file into `(image path, label)` pairs.
///
/// Blank lines are ignored; malformed lines are skipped with a warning.
pub fn load_index(path: impl AsRef<Path>) -> Result<Vec<(PathBuf, usize)>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| Error::Dataset {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let base = path.parent().unwrap_or_else(|| Path::new(""));

    let mut entries = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        match fields[..] {
            [] => continue,
            [image, label] => match label.parse::<usize>() {
                Ok(label) => entries.push((base.join(image), label)),
                Err(_) => warn!(
                    "{}:{}: skipping line with bad label {:?}",
                    path.display(),
                    line_no + 1,
                    label
                ),
            },
            _ => warn!(
                "{}:{}: skipping line, expected `image_path label`",
                path.display(),
                line_no + 1
            ),
        }
    }
    Ok(entries)
}

/// Read whitespace-separated pixel values into a tensor of `shape`.
pub fn read_image(path: impl AsRef<Path>, shape: &[usize]) -> Result<Tensor> {
    let path = path.as_ref();
    let dataset_error = |reason: String| Error::Dataset {
        path: path.to_path_buf(),
        reason,
    };
    let text = fs::read_to_string(path).map_err(|e| dataset_error(e.to_string()))?;
    let values = text
        .split_whitespace()
        .map(|token| {
            token
                .parse::<f32>()
                .map_err(|_| dataset_error(format!("bad pixel value {:?}", token)))
        })
        .collect::<Result<Vec<f32>>>()?;
    let expected: usize = shape.iter().product();
    if values.len() != expected {
        return Err(dataset_error(format!(
            "expected {} values for shape {:?}, found {}",
            expected,
            shape,
            values.len()
        )));
    }
    Tensor::from_vec(shape, values)
}

/// Column vector of `classes` zeros with a one at `label`.
pub fn one_hot(label: usize, classes: usize) -> Result<Tensor> {
    if label >= classes {
        return Err(Error::config(format!(
            "label {} out of range for {} classes",
            label, classes
        )));
    }
    let mut target = Tensor::zeros(&[classes, 1]);
    target.data_mut()[label] = 1.0;
    Ok(target)
}
