//! Reference linear softmax classifier.

use super::Classifier;
use crate::Param;
use ndarray::{Array1, Array2, Array4, Axis};
use rand::rngs::StdRng;
use rand::Rng;

/// A linear probe with a learnable per-feature input affine.
///
/// `z = bn.weight ⊙ x + bn.bias`, `logits = z·Wᵀ + fc.bias`. Small enough to
/// have exact hand-derived gradients, yet it exercises every contract the
/// training loop relies on: named parameters (including `bn`/`bias` names for
/// decay and L1 exclusion), forward/backward, and mode toggling.
pub struct LinearClassifier {
    bn_weight: Param,
    bn_bias: Param,
    fc_weight: Param,
    fc_bias: Param,
    features: usize,
    classes: usize,
    train_mode: bool,
    // stashed activations from the last forward pass
    last_input: Option<Array2<f32>>,
    last_scaled: Option<Array2<f32>>,
}

impl LinearClassifier {
    /// Create a classifier for images of the given shape.
    ///
    /// Weights are drawn uniformly from `±1/sqrt(features)`.
    pub fn new(image_shape: (usize, usize, usize), classes: usize, rng: &mut StdRng) -> Self {
        let (c, h, w) = image_shape;
        let features = c * h * w;
        let bound = 1.0 / (features as f32).sqrt();
        let fc_weight: Vec<f32> =
            (0..classes * features).map(|_| rng.random_range(-bound..bound)).collect();
        Self {
            bn_weight: Param::from_vec(vec![1.0; features]),
            bn_bias: Param::zeros(features),
            fc_weight: Param::from_vec(fc_weight),
            fc_bias: Param::zeros(classes),
            features,
            classes,
            train_mode: true,
            last_input: None,
            last_scaled: None,
        }
    }

    fn flatten(&self, input: &Array4<f32>) -> Array2<f32> {
        let n = input.len_of(Axis(0));
        let mut out = Array2::zeros((n, self.features));
        for (i, image) in input.outer_iter().enumerate() {
            assert_eq!(image.len(), self.features, "input size must match classifier features");
            for (j, &v) in image.iter().enumerate() {
                out[[i, j]] = v;
            }
        }
        out
    }

    fn weight_matrix(&self) -> Array2<f32> {
        Array2::from_shape_vec((self.classes, self.features), self.fc_weight.data().to_vec())
            .expect("fc.weight length equals classes × features")
    }
}

impl Classifier for LinearClassifier {
    fn forward(&mut self, input: &Array4<f32>) -> Array2<f32> {
        let x = self.flatten(input);
        let gamma = self.bn_weight.data();
        let beta = self.bn_bias.data();
        let mut z = x.clone();
        for mut row in z.outer_iter_mut() {
            row *= &*gamma;
            row += &*beta;
        }
        let logits = z.dot(&self.weight_matrix().t()) + &self.fc_bias.data().view();
        self.last_input = Some(x);
        self.last_scaled = Some(z);
        logits
    }

    fn backward(&mut self, grad_logits: &Array2<f32>) {
        let x = self.last_input.as_ref().expect("backward requires a prior forward pass");
        let z = self.last_scaled.as_ref().expect("backward requires a prior forward pass");
        let w = self.weight_matrix();

        // dW = Gᵀ·z, db = Σ_n G, dz = G·W
        let dw = grad_logits.t().dot(z);
        let db = grad_logits.sum_axis(Axis(0));
        let dz = grad_logits.dot(&w);

        // input affine: dγ = Σ_n dz ⊙ x, dβ = Σ_n dz
        let dgamma = (&dz * x).sum_axis(Axis(0));
        let dbeta = dz.sum_axis(Axis(0));

        self.fc_weight.add_grad(&Array1::from_iter(dw.iter().copied()));
        self.fc_bias.add_grad(&db);
        self.bn_weight.add_grad(&dgamma);
        self.bn_bias.add_grad(&dbeta);
    }

    fn named_parameters(&self) -> Vec<(String, Param)> {
        vec![
            ("bn.weight".to_string(), self.bn_weight.clone()),
            ("bn.bias".to_string(), self.bn_bias.clone()),
            ("fc.weight".to_string(), self.fc_weight.clone()),
            ("fc.bias".to_string(), self.fc_bias.clone()),
        ]
    }

    fn set_train_mode(&mut self, train: bool) {
        self.train_mode = train;
    }

    fn num_classes(&self) -> usize {
        self.classes
    }
}
