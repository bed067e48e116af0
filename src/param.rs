//! Named parameter tensors with shared gradient cells.
//!
//! A [`Param`] is a flat `f32` tensor whose storage and gradient live behind
//! `Rc<RefCell<..>>` cells, so clones held by the optimizer, the model, and
//! the regularizers all observe the same values. Training is single-threaded,
//! so no synchronization is needed.

use ndarray::Array1;
use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;

/// A flat parameter tensor with an accumulating gradient cell.
///
/// # Example
///
/// ```
/// use endurecer::Param;
/// use ndarray::Array1;
///
/// let p = Param::from_vec(vec![1.0, -2.0]);
/// p.add_grad(&Array1::from(vec![0.5, 0.5]));
/// p.add_grad(&Array1::from(vec![0.5, 0.5]));
/// assert_eq!(p.grad().unwrap()[0], 1.0);
/// ```
#[derive(Clone)]
pub struct Param {
    data: Rc<RefCell<Array1<f32>>>,
    grad: Rc<RefCell<Option<Array1<f32>>>>,
}

impl Param {
    /// Create a parameter from a plain vector.
    pub fn from_vec(data: Vec<f32>) -> Self {
        Self {
            data: Rc::new(RefCell::new(Array1::from(data))),
            grad: Rc::new(RefCell::new(None)),
        }
    }

    /// Create a zero-initialized parameter of the given length.
    pub fn zeros(len: usize) -> Self {
        Self::from_vec(vec![0.0; len])
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.data.borrow().len()
    }

    /// Whether the parameter is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Borrow the underlying data.
    pub fn data(&self) -> Ref<'_, Array1<f32>> {
        self.data.borrow()
    }

    /// Mutably borrow the underlying data.
    pub fn data_mut(&self) -> RefMut<'_, Array1<f32>> {
        self.data.borrow_mut()
    }

    /// Clone out the current gradient, if any.
    pub fn grad(&self) -> Option<Array1<f32>> {
        self.grad.borrow().clone()
    }

    /// Accumulate a gradient contribution.
    ///
    /// Gradients add across calls until [`Param::zero_grad`].
    pub fn add_grad(&self, g: &Array1<f32>) {
        assert_eq!(g.len(), self.len(), "gradient length must match parameter length");
        let mut cell = self.grad.borrow_mut();
        match cell.as_mut() {
            Some(existing) => *existing += g,
            None => *cell = Some(g.clone()),
        }
    }

    /// Clear the gradient.
    pub fn zero_grad(&self) {
        *self.grad.borrow_mut() = None;
    }

    /// Sum of absolute values of the data.
    pub fn l1_norm(&self) -> f32 {
        self.data.borrow().iter().map(|v| v.abs()).sum()
    }

    /// Replace the data in place (used by checkpoint restore).
    pub fn set_data(&self, data: Array1<f32>) {
        assert_eq!(data.len(), self.len(), "restored data length must match parameter length");
        *self.data.borrow_mut() = data;
    }
}
