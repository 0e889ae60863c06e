use ndarray::{Array2, ArrayView2};
use serde::{Serialize, Deserialize};

/// Trait defining the interface for regression losses
pub trait Loss: Send + Sync {
    /// Compute the mean loss over every element of a batch
    fn compute_batch(&self, predictions: ArrayView2<f32>, targets: ArrayView2<f32>) -> f32;

    /// Gradient of `compute_batch` with respect to the predictions
    fn gradient_batch(&self, predictions: ArrayView2<f32>, targets: ArrayView2<f32>) -> Array2<f32>;
}

fn element_count(predictions: &ArrayView2<f32>) -> f32 {
    predictions.len().max(1) as f32
}

/// Mean Squared Error loss
pub struct MSE;

impl Loss for MSE {
    fn compute_batch(&self, predictions: ArrayView2<f32>, targets: ArrayView2<f32>) -> f32 {
        let diff = &predictions - &targets;
        diff.mapv(|x| x * x).sum() / element_count(&predictions)
    }

    fn gradient_batch(&self, predictions: ArrayView2<f32>, targets: ArrayView2<f32>) -> Array2<f32> {
        (&predictions - &targets) * (2.0 / element_count(&predictions))
    }
}

/// Huber loss (smooth L1)
pub struct HuberLoss {
    pub delta: f32,
}

impl HuberLoss {
    pub fn new(delta: f32) -> Self {
        HuberLoss { delta }
    }
}

impl Loss for HuberLoss {
    fn compute_batch(&self, predictions: ArrayView2<f32>, targets: ArrayView2<f32>) -> f32 {
        let diff = &predictions - &targets;
        diff.mapv(|x| {
            let abs_x = x.abs();
            if abs_x <= self.delta {
                0.5 * x * x
            } else {
                self.delta * abs_x - 0.5 * self.delta * self.delta
            }
        }).sum() / element_count(&predictions)
    }

    fn gradient_batch(&self, predictions: ArrayView2<f32>, targets: ArrayView2<f32>) -> Array2<f32> {
        let diff = &predictions - &targets;
        let n = element_count(&predictions);
        diff.mapv(|x| {
            if x.abs() <= self.delta {
                x
            } else {
                self.delta * x.signum()
            }
        }) / n
    }
}

/// Serializable choice of loss, used by the network configuration
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LossKind {
    #[default]
    Mse,
    Huber { delta: f32 },
}

impl LossKind {
    pub fn compute_batch(&self, predictions: ArrayView2<f32>, targets: ArrayView2<f32>) -> f32 {
        match self {
            LossKind::Mse => MSE.compute_batch(predictions, targets),
            LossKind::Huber { delta } => HuberLoss::new(*delta).compute_batch(predictions, targets),
        }
    }

    pub fn gradient_batch(&self, predictions: ArrayView2<f32>, targets: ArrayView2<f32>) -> Array2<f32> {
        match self {
            LossKind::Mse => MSE.gradient_batch(predictions, targets),
            LossKind::Huber { delta } => HuberLoss::new(*delta).gradient_batch(predictions, targets),
        }
    }
}
