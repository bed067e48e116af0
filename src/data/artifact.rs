//! SafeTensors-backed example artifacts.
//!
//! Clean splits and per-attack adversarial splits share one on-disk layout:
//! a SafeTensors file holding an image tensor (`f32`, `n×c×h×w`) and a
//! `label` tensor (`i64`, `n`), loaded wholesale into memory.

use crate::data::Dataset;
use crate::{Error, Result};
use ndarray::{Array1, Array4, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use safetensors::tensor::TensorView;
use safetensors::{Dtype, SafeTensors};
use std::path::Path;

/// Tensor key for clean splits.
pub const CLEAN_IMAGE_KEY: &str = "images";
/// Tensor key for adversarial splits.
pub const ADV_IMAGE_KEY: &str = "adv";
/// Tensor key for labels in either kind of artifact.
pub const LABEL_KEY: &str = "label";

/// An in-memory `(images, labels)` example set.
///
/// Invariant: the image and label leading dimensions always match; every
/// constructor and combinator preserves it.
#[derive(Debug, Clone)]
pub struct ExampleSet {
    /// Stacked images, `(n, channels, height, width)`.
    pub images: Array4<f32>,
    /// Labels, `(n,)`.
    pub labels: Array1<i64>,
}

impl ExampleSet {
    /// Create a set, checking the leading-dimension invariant.
    pub fn new(images: Array4<f32>, labels: Array1<i64>) -> Result<Self> {
        if images.len_of(Axis(0)) != labels.len() {
            return Err(Error::ShapeMismatch {
                expected: vec![labels.len()],
                actual: vec![images.len_of(Axis(0))],
            });
        }
        Ok(Self { images, labels })
    }

    /// Load a set from a SafeTensors file.
    ///
    /// `image_key` selects between clean (`images`) and adversarial (`adv`)
    /// artifacts.
    pub fn load(path: &Path, image_key: &str) -> Result<Self> {
        let data = std::fs::read(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::ArtifactNotFound { path: path.to_path_buf() }
            } else {
                Error::io(format!("reading {}", path.display()), e)
            }
        })?;
        let st = SafeTensors::deserialize(&data)
            .map_err(|e| Error::Serialization { message: format!("{}: {e}", path.display()) })?;

        let images = st
            .tensor(image_key)
            .map_err(|e| Error::Serialization { message: format!("{}: {e}", path.display()) })?;
        let labels = st
            .tensor(LABEL_KEY)
            .map_err(|e| Error::Serialization { message: format!("{}: {e}", path.display()) })?;

        let shape = images.shape().to_vec();
        if shape.len() != 4 || images.dtype() != Dtype::F32 {
            return Err(Error::Serialization {
                message: format!(
                    "{}: tensor '{image_key}' must be a 4-d f32 tensor, got {:?} {:?}",
                    path.display(),
                    images.dtype(),
                    shape
                ),
            });
        }
        if labels.dtype() != Dtype::I64 {
            return Err(Error::Serialization {
                message: format!(
                    "{}: tensor '{LABEL_KEY}' must be i64, got {:?}",
                    path.display(),
                    labels.dtype()
                ),
            });
        }

        let image_data: Vec<f32> = bytemuck::pod_collect_to_vec(images.data());
        let label_data: Vec<i64> = bytemuck::pod_collect_to_vec(labels.data());
        let images = Array4::from_shape_vec((shape[0], shape[1], shape[2], shape[3]), image_data)
            .map_err(|e| Error::Serialization { message: format!("{}: {e}", path.display()) })?;
        Self::new(images, Array1::from(label_data))
    }

    /// Write the set to a SafeTensors file under the given image key.
    ///
    /// Utility for preparing artifacts; the training path only reads.
    pub fn save(&self, path: &Path, image_key: &str) -> Result<()> {
        let (n, c, h, w) = self.images.dim();
        let image_data = self.images.as_standard_layout().to_owned();
        let image_bytes: &[u8] = bytemuck::cast_slice(
            image_data.as_slice().expect("owned standard-layout array is contiguous"),
        );
        let label_data = self.labels.to_vec();
        let label_bytes: &[u8] = bytemuck::cast_slice(&label_data);

        let tensors = vec![
            (
                image_key.to_string(),
                TensorView::new(Dtype::F32, vec![n, c, h, w], image_bytes)
                    .map_err(|e| Error::Serialization { message: e.to_string() })?,
            ),
            (
                LABEL_KEY.to_string(),
                TensorView::new(Dtype::I64, vec![self.labels.len()], label_bytes)
                    .map_err(|e| Error::Serialization { message: e.to_string() })?,
            ),
        ];
        let bytes = safetensors::serialize(tensors, &None)
            .map_err(|e| Error::Serialization { message: e.to_string() })?;
        std::fs::write(path, bytes)
            .map_err(|e| Error::io(format!("writing {}", path.display()), e))?;
        Ok(())
    }

    /// Number of examples.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Append another set, keeping image/label rows aligned.
    pub fn append(&mut self, other: &ExampleSet) -> Result<()> {
        let (_, c, h, w) = self.images.dim();
        let (_, oc, oh, ow) = other.images.dim();
        if (c, h, w) != (oc, oh, ow) {
            return Err(Error::ShapeMismatch {
                expected: vec![c, h, w],
                actual: vec![oc, oh, ow],
            });
        }
        self.images
            .append(Axis(0), other.images.view())
            .map_err(|e| Error::Serialization { message: e.to_string() })?;
        self.labels
            .append(Axis(0), other.labels.view())
            .map_err(|e| Error::Serialization { message: e.to_string() })?;
        Ok(())
    }

    /// Draw `n` examples with replacement, seeded deterministically.
    ///
    /// Image and label rows are drawn by the same index sequence, so pairs
    /// stay aligned and repeated runs reproduce identical subsets.
    pub fn resample(&self, n: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let len = self.len();
        let (_, c, h, w) = self.images.dim();
        let mut images = Array4::zeros((n, c, h, w));
        let mut labels = Array1::zeros(n);
        for i in 0..n {
            let j = rng.random_range(0..len);
            images.index_axis_mut(Axis(0), i).assign(&self.images.index_axis(Axis(0), j));
            labels[i] = self.labels[j];
        }
        Self { images, labels }
    }

    /// Convert into a [`Dataset`] of individual samples.
    pub fn into_dataset(self) -> Dataset {
        Dataset::from_arrays(self.images, self.labels.as_slice().expect("1-d array is contiguous"))
            .expect("leading dimensions match by construction")
    }
}
