//! The function-approximator seam between the training engine and a Q-value model.
//!
//! The engine only ever talks to a [`FunctionApproximator`]: it predicts
//! Q-values for batches of states, fits towards regression targets, and
//! exchanges parameters as an opaque [`Weights`] blob for target-network
//! synchronization. [`QNetwork`] is the built-in dense implementation.

use ndarray::{Array1, Array2, ArrayD, ArrayView1, ArrayView2, Axis};
use rand::Rng;
use serde::{Serialize, Deserialize};
use std::path::Path;

use crate::activations::Activation;
use crate::batch::Batch;
use crate::config::NetworkConfig;
use crate::error::{QError, Result};
use crate::loss::LossKind;
use crate::network::NeuralNetwork;
use crate::optimizer::{GradientClipper, OptimizerWrapper};

/// Parameter set of an approximator, as a flat list of tensors.
///
/// The layout of the list belongs to the approximator that produced it; the
/// engine only relies on two blobs from structurally identical models having
/// the same tensor shapes in the same order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Weights {
    tensors: Vec<ArrayD<f32>>,
}

impl Weights {
    pub fn new(tensors: Vec<ArrayD<f32>>) -> Self {
        Weights { tensors }
    }

    pub fn tensors(&self) -> &[ArrayD<f32>] {
        &self.tensors
    }

    pub fn into_tensors(self) -> Vec<ArrayD<f32>> {
        self.tensors
    }

    pub fn num_parameters(&self) -> usize {
        self.tensors.iter().map(|t| t.len()).sum()
    }

    /// Fails unless `other` has the same number of tensors with the same shapes.
    pub fn check_compatible(&self, other: &Weights) -> Result<()> {
        let ours: Vec<&[usize]> = self.tensors.iter().map(|t| t.shape()).collect();
        let theirs: Vec<&[usize]> = other.tensors.iter().map(|t| t.shape()).collect();
        if ours != theirs {
            return Err(QError::dimension_mismatch(format!("{:?}", ours), format!("{:?}", theirs)));
        }
        Ok(())
    }

    /// `self <- tau * online + (1 - tau) * self`, tensor by tensor.
    pub fn blend_towards(&mut self, online: &Weights, tau: f32) -> Result<()> {
        self.check_compatible(online)?;
        for (target, source) in self.tensors.iter_mut().zip(online.tensors.iter()) {
            target.zip_mut_with(source, |t, &o| *t = tau * o + (1.0 - tau) * *t);
        }
        Ok(())
    }
}

/// A differentiable Q-value model over `num_features` inputs and `num_actions` outputs.
pub trait FunctionApproximator {
    /// Feature-vector length F
    fn num_features(&self) -> usize;

    /// Action-space size A
    fn num_actions(&self) -> usize;

    /// Q-values for a `[B, F]` batch of states, shaped `[B, A]`.
    fn predict(&self, states: ArrayView2<f32>) -> Result<Array2<f32>>;

    /// One optimizer step towards `targets`; returns the regression loss.
    fn fit(&mut self, inputs: ArrayView2<f32>, targets: ArrayView2<f32>) -> Result<f32>;

    fn get_weights(&self) -> Weights;

    fn set_weights(&mut self, weights: &Weights) -> Result<()>;

    fn save(&self, path: &Path) -> Result<()>;

    fn load(&mut self, path: &Path) -> Result<()>;

    /// Q-values for a single state.
    fn predict_one(&self, state: ArrayView1<f32>) -> Result<Array1<f32>> {
        let batch = state.insert_axis(Axis(0));
        let q_values = self.predict(batch)?;
        Ok(q_values.row(0).to_owned())
    }
}

/// One optimizer step of `online` on a batch's states towards `targets`.
///
/// Only the online approximator is touched; the target network changes
/// through [`crate::sync`] alone.
pub fn train_step<F>(online: &mut F, batch: &Batch, targets: &Array2<f32>) -> Result<f32>
where
    F: FunctionApproximator + ?Sized,
{
    let expected = (batch.len(), online.num_actions());
    if targets.dim() != expected || batch.num_features() != online.num_features() {
        return Err(QError::dimension_mismatch(
            format!("states [{}, {}], targets {:?}", batch.len(), online.num_features(), expected),
            format!("states {:?}, targets {:?}", batch.states.shape(), targets.shape()),
        ));
    }
    online.fit(batch.states.view(), targets.view())
}

/// Built-in Q-network: dense ReLU hidden layers and a linear output layer.
///
/// # Example
///
/// ```
/// use qtrainer::approximator::{FunctionApproximator, QNetwork};
/// use qtrainer::config::NetworkConfig;
/// use ndarray::array;
///
/// let net = QNetwork::from_config(5, 2, &NetworkConfig::default()).unwrap();
/// let q = net.predict(array![[0.1, 0.2, 0.3, 0.4, 0.5]].view()).unwrap();
/// assert_eq!(q.shape(), &[1, 2]);
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QNetwork {
    pub network: NeuralNetwork,
    pub learning_rate: f32,
    pub loss: LossKind,
    pub clipper: GradientClipper,
}

impl QNetwork {
    pub fn new(network: NeuralNetwork, learning_rate: f32, loss: LossKind, clipper: GradientClipper) -> Self {
        QNetwork { network, learning_rate, loss, clipper }
    }

    /// Build a `[num_features, hidden..., num_actions]` network.
    pub fn from_config(num_features: usize, num_actions: usize, config: &NetworkConfig) -> Result<Self> {
        Self::from_config_with_rng(num_features, num_actions, config, &mut rand::thread_rng())
    }

    /// Like [`QNetwork::from_config`], drawing the initial weights from `rng`.
    pub fn from_config_with_rng<R: Rng + ?Sized>(
        num_features: usize,
        num_actions: usize,
        config: &NetworkConfig,
        rng: &mut R,
    ) -> Result<Self> {
        let mut layer_sizes = Vec::with_capacity(config.hidden_layers.len() + 2);
        layer_sizes.push(num_features);
        layer_sizes.extend_from_slice(&config.hidden_layers);
        layer_sizes.push(num_actions);

        let mut activations = vec![config.hidden_activation; layer_sizes.len() - 2];
        activations.push(Activation::Linear);

        let network = NeuralNetwork::new_using(
            &layer_sizes,
            &activations,
            config.weight_init,
            OptimizerWrapper::from_kind(config.optimizer),
            rng,
        )?;

        Ok(QNetwork::new(network, config.learning_rate, config.loss, config.grad_clip))
    }
}

impl FunctionApproximator for QNetwork {
    fn num_features(&self) -> usize {
        self.network.input_size()
    }

    fn num_actions(&self) -> usize {
        self.network.output_size()
    }

    fn predict(&self, states: ArrayView2<f32>) -> Result<Array2<f32>> {
        let q_values = self.network.predict(states)?;
        if q_values.iter().any(|q| !q.is_finite()) {
            return Err(QError::Approximator("network produced non-finite Q-values".to_string()));
        }
        Ok(q_values)
    }

    fn fit(&mut self, inputs: ArrayView2<f32>, targets: ArrayView2<f32>) -> Result<f32> {
        self.network.train_minibatch(inputs, targets, self.learning_rate, &self.loss, &self.clipper)
    }

    fn get_weights(&self) -> Weights {
        self.network.weights()
    }

    fn set_weights(&mut self, weights: &Weights) -> Result<()> {
        self.network.set_weights(weights)
    }

    fn save(&self, path: &Path) -> Result<()> {
        self.network.save(path)
    }

    /// Replaces the network only if the file holds one of the same shape.
    fn load(&mut self, path: &Path) -> Result<()> {
        let loaded = NeuralNetwork::load(path)?;
        self.network.weights().check_compatible(&loaded.weights())?;
        self.network = loaded;
        Ok(())
    }
}
