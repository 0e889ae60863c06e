use ndarray::{Array1, Array2, ArrayView2, Ix1, Ix2};
use rand::Rng;
use serde::{Serialize, Deserialize};
use std::fs;
use std::io::Write;
use std::path::Path;

use crate::activations::Activation;
use crate::approximator::Weights;
use crate::error::{QError, Result};
use crate::layers::{DenseLayer, WeightInit};
use crate::loss::LossKind;
use crate::optimizer::{GradientClipper, Optimizer, OptimizerWrapper};

/// A feed-forward network of dense layers with its optimizer state.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct NeuralNetwork {
    pub layers: Vec<DenseLayer>,
    pub optimizer: OptimizerWrapper,
}

impl NeuralNetwork {
    /// Create a new network from `layer_sizes` (input, hidden..., output)
    /// and one activation per weight layer.
    pub fn new(layer_sizes: &[usize], activations: &[Activation], optimizer: OptimizerWrapper) -> Result<Self> {
        Self::new_using(layer_sizes, activations, None, optimizer, &mut rand::thread_rng())
    }

    /// Like [`NeuralNetwork::new`], drawing initial weights from `rng`.
    ///
    /// `weight_init` applies to every layer; `None` picks the initializer
    /// suited to each layer's activation.
    pub fn new_using<R: Rng + ?Sized>(
        layer_sizes: &[usize],
        activations: &[Activation],
        weight_init: Option<WeightInit>,
        optimizer: OptimizerWrapper,
        rng: &mut R,
    ) -> Result<Self> {
        if layer_sizes.len() < 2 {
            return Err(QError::invalid_parameter("layer_sizes", "must have at least 2 layers"));
        }
        if layer_sizes.iter().any(|&size| size == 0) {
            return Err(QError::invalid_parameter("layer_sizes", "every layer needs at least one unit"));
        }
        if layer_sizes.len() - 1 != activations.len() {
            return Err(QError::dimension_mismatch(
                format!("{} activations", layer_sizes.len() - 1),
                format!("{} activations", activations.len()),
            ));
        }

        let layers = layer_sizes
            .windows(2)
            .zip(activations.iter())
            .map(|(window, &activation)| {
                let init = weight_init.unwrap_or_else(|| WeightInit::for_activation(&activation));
                DenseLayer::new_with_init(window[0], window[1], activation, init, &mut *rng)
            })
            .collect();

        Ok(NeuralNetwork { layers, optimizer })
    }

    pub fn input_size(&self) -> usize {
        self.layers.first().map_or(0, |layer| layer.input_size())
    }

    pub fn output_size(&self) -> usize {
        self.layers.last().map_or(0, |layer| layer.output_size())
    }

    fn check_inputs(&self, inputs: &ArrayView2<f32>) -> Result<()> {
        if inputs.ncols() != self.input_size() {
            return Err(QError::dimension_mismatch(
                format!("[*, {}]", self.input_size()),
                format!("{:?}", inputs.shape()),
            ));
        }
        Ok(())
    }

    /// Forward pass for a batch without touching any cached training state.
    pub fn predict(&self, inputs: ArrayView2<f32>) -> Result<Array2<f32>> {
        self.check_inputs(&inputs)?;
        let mut current_output = inputs.to_owned();
        for layer in &self.layers {
            current_output = layer.predict_batch(current_output.view());
        }
        Ok(current_output)
    }

    fn forward_batch(&mut self, inputs: ArrayView2<f32>) -> Array2<f32> {
        let mut current_output = inputs.to_owned();
        for layer in &mut self.layers {
            current_output = layer.forward_batch(current_output.view());
        }
        current_output
    }

    /// Backpropagate output errors, returning `(weight, bias)` gradients in layer order.
    fn backward_batch(&mut self, output_errors: Array2<f32>) -> Result<Vec<(Array2<f32>, Array1<f32>)>> {
        let mut gradients = Vec::with_capacity(self.layers.len());
        let mut current_error = output_errors;

        for i in (0..self.layers.len()).rev() {
            let layer = &mut self.layers[i];
            let (adjusted_error, weight_gradients, bias_gradients) = layer
                .backward_batch(current_error.view())
                .ok_or_else(|| QError::Approximator("backward pass without a forward pass".to_string()))?;
            if i != 0 {
                current_error = adjusted_error.dot(&layer.weights.t());
            }
            gradients.push((weight_gradients, bias_gradients));
        }

        gradients.reverse();
        Ok(gradients)
    }

    /// One optimizer step on a batch. Returns the loss measured before the update.
    pub fn train_minibatch(
        &mut self,
        inputs: ArrayView2<f32>,
        targets: ArrayView2<f32>,
        learning_rate: f32,
        loss: &LossKind,
        clipper: &GradientClipper,
    ) -> Result<f32> {
        self.check_inputs(&inputs)?;
        if targets.dim() != (inputs.nrows(), self.output_size()) {
            return Err(QError::dimension_mismatch(
                format!("[{}, {}]", inputs.nrows(), self.output_size()),
                format!("{:?}", targets.shape()),
            ));
        }

        let outputs = self.forward_batch(inputs);
        let loss_value = loss.compute_batch(outputs.view(), targets);
        if !loss_value.is_finite() {
            return Err(QError::Approximator(format!("non-finite loss {}", loss_value)));
        }

        let output_errors = loss.gradient_batch(outputs.view(), targets);
        let mut gradients = self.backward_batch(output_errors)?;
        clipper.clip(&mut gradients);

        for (index, (layer, (weight_gradients, bias_gradients))) in
            self.layers.iter_mut().zip(gradients).enumerate()
        {
            self.optimizer.update_weights(index, &mut layer.weights, &weight_gradients, learning_rate);
            self.optimizer.update_biases(index, &mut layer.biases, &bias_gradients, learning_rate);
        }
        self.optimizer.end_step();

        Ok(loss_value)
    }

    /// Flatten parameters into a weight blob: `[w0, b0, w1, b1, ...]`.
    pub fn weights(&self) -> Weights {
        let tensors = self
            .layers
            .iter()
            .flat_map(|layer| [layer.weights.clone().into_dyn(), layer.biases.clone().into_dyn()])
            .collect();
        Weights::new(tensors)
    }

    /// Overwrite all parameters from a blob produced by a structurally identical network.
    pub fn set_weights(&mut self, weights: &Weights) -> Result<()> {
        self.weights().check_compatible(weights)?;

        let mut tensors = weights.tensors().iter();
        for layer in &mut self.layers {
            let (w, b) = match (tensors.next(), tensors.next()) {
                (Some(w), Some(b)) => (w, b),
                _ => return Err(QError::dimension_mismatch("weight and bias per layer", "truncated blob")),
            };
            layer.weights = w
                .clone()
                .into_dimensionality::<Ix2>()
                .map_err(|e| QError::Serialization(e.to_string()))?;
            layer.biases = b
                .clone()
                .into_dimensionality::<Ix1>()
                .map_err(|e| QError::Serialization(e.to_string()))?;
        }
        Ok(())
    }

    /// Save the network (layers and optimizer state) with bincode.
    ///
    /// The bytes go to a temporary file in the destination directory which is
    /// renamed over `path` only after a successful write, so a failed save
    /// never leaves a truncated file behind.
    pub fn save(&self, path: &Path) -> Result<()> {
        let serialized = bincode::serialize(self)?;
        write_atomically(path, &serialized)
    }

    /// Load a network saved with [`NeuralNetwork::save`].
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read(path)?;
        Ok(bincode::deserialize(&data)?)
    }
}

pub(crate) fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(bytes)?;
    file.as_file().sync_all()?;
    file.persist(path)?;
    Ok(())
}
