//! Cross-entropy criterion over logits, with mixup weighting.

use ndarray::{Array1, Array2};

/// Mean softmax cross-entropy and its logits gradient.
///
/// Targets are integer class indices. The gradient is
/// `(softmax(logits) − onehot(target)) / n`, matching mean reduction.
///
/// # Example
///
/// ```
/// use endurecer::train::cross_entropy;
/// use ndarray::{arr1, arr2};
///
/// let logits = arr2(&[[5.0_f32, 0.0], [0.0, 5.0]]);
/// let (loss, grad) = cross_entropy(&logits, &arr1(&[0, 1]));
/// assert!(loss < 0.01);
/// assert_eq!(grad.dim(), (2, 2));
/// ```
pub fn cross_entropy(logits: &Array2<f32>, targets: &Array1<i64>) -> (f32, Array2<f32>) {
    assert_eq!(
        logits.nrows(),
        targets.len(),
        "logits and targets must have the same batch dimension"
    );
    let n = logits.nrows();
    let mut grad = Array2::zeros(logits.dim());
    let mut loss = 0.0_f64;

    for (i, row) in logits.outer_iter().enumerate() {
        let max = row.fold(f32::NEG_INFINITY, |a, &b| a.max(b));
        let exps: Vec<f32> = row.iter().map(|&v| (v - max).exp()).collect();
        let sum: f32 = exps.iter().sum();
        let target = targets[i] as usize;
        assert!(target < row.len(), "target class out of range");

        let p_target = (exps[target] / sum).max(f32::MIN_POSITIVE);
        loss -= f64::from(p_target.ln());

        for (j, &e) in exps.iter().enumerate() {
            let p = e / sum;
            let indicator = if j == target { 1.0 } else { 0.0 };
            grad[[i, j]] = (p - indicator) / n as f32;
        }
    }

    ((loss / n as f64) as f32, grad)
}

/// λ-weighted two-target criterion for mixup-blended batches:
/// `λ·L(pred, a) + (1−λ)·L(pred, b)`, value and gradient alike.
pub fn mixup_cross_entropy(
    logits: &Array2<f32>,
    target_a: &Array1<i64>,
    target_b: &Array1<i64>,
    lam: f32,
) -> (f32, Array2<f32>) {
    let (loss_a, grad_a) = cross_entropy(logits, target_a);
    let (loss_b, grad_b) = cross_entropy(logits, target_b);
    let loss = lam * loss_a + (1.0 - lam) * loss_b;
    let grad = &grad_a * lam + &grad_b * (1.0 - lam);
    (loss, grad)
}

/// How many rows' argmax equals the target class.
pub fn correct_count(logits: &Array2<f32>, targets: &Array1<i64>) -> usize {
    assert_eq!(logits.nrows(), targets.len());
    let mut correct = 0;
    for (row, &target) in logits.outer_iter().zip(targets.iter()) {
        let mut best = 0;
        for (j, &v) in row.iter().enumerate() {
            if v > row[best] {
                best = j;
            }
        }
        if best as i64 == target {
            correct += 1;
        }
    }
    correct
}
