use ndarray::{Array1, Array2, ArrayView2, Axis};
use rand::Rng;
use serde::{Serialize, Deserialize};

use crate::activations::Activation;
use super::initialization::WeightInit;

/// A fully connected (dense) layer: `activation(inputs · W + b)`.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct DenseLayer {
    pub weights: Array2<f32>,
    pub biases: Array1<f32>,
    pub activation: Activation,
    #[serde(skip)]
    pre_activation_output: Option<Array2<f32>>,
    #[serde(skip)]
    inputs: Option<Array2<f32>>,
}

impl DenseLayer {
    /// Create a new dense layer, initializing weights for the given activation.
    pub fn new(input_size: usize, output_size: usize, activation: Activation) -> Self {
        let init = WeightInit::for_activation(&activation);
        Self::new_with_init(input_size, output_size, activation, init, &mut rand::thread_rng())
    }

    /// Create a dense layer with an explicit initializer, drawing weights from `rng`.
    pub fn new_with_init<R: Rng + ?Sized>(
        input_size: usize,
        output_size: usize,
        activation: Activation,
        init: WeightInit,
        rng: &mut R,
    ) -> Self {
        DenseLayer {
            weights: init.initialize_weights_using((input_size, output_size), rng),
            biases: init.initialize_biases(output_size),
            activation,
            pre_activation_output: None,
            inputs: None,
        }
    }

    pub fn input_size(&self) -> usize {
        self.weights.nrows()
    }

    pub fn output_size(&self) -> usize {
        self.weights.ncols()
    }

    /// Forward pass without caching anything for backpropagation.
    pub fn predict_batch(&self, inputs: ArrayView2<f32>) -> Array2<f32> {
        let mut outputs = inputs.dot(&self.weights) + &self.biases.view().insert_axis(Axis(0));
        self.activation.apply_batch(&mut outputs);
        outputs
    }

    /// Forward pass that remembers inputs and pre-activations for `backward_batch`.
    pub fn forward_batch(&mut self, inputs: ArrayView2<f32>) -> Array2<f32> {
        self.inputs = Some(inputs.to_owned());
        let mut outputs = inputs.dot(&self.weights) + &self.biases.view().insert_axis(Axis(0));
        self.pre_activation_output = Some(outputs.clone());
        self.activation.apply_batch(&mut outputs);
        outputs
    }

    /// Returns `(adjusted_error, weight_gradients, bias_gradients)`, or `None`
    /// when `forward_batch` has not been called since the last backward pass.
    pub fn backward_batch(
        &mut self,
        output_errors: ArrayView2<f32>,
    ) -> Option<(Array2<f32>, Array2<f32>, Array1<f32>)> {
        let pre_activation_output = self.pre_activation_output.take()?;
        let inputs = self.inputs.take()?;

        let activation_deriv = self.activation.derivative_batch(pre_activation_output.view());
        let adjusted_error = &output_errors * &activation_deriv;
        let weight_gradients = inputs.t().dot(&adjusted_error);
        let bias_gradients = adjusted_error.sum_axis(Axis(0));

        Some((adjusted_error, weight_gradients, bias_gradients))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_predict_matches_forward() {
        let mut layer = DenseLayer::new(3, 2, Activation::Relu);
        let inputs = array![[1.0, -2.0, 0.5], [0.0, 0.3, 0.7]];
        let cached = layer.forward_batch(inputs.view());
        let pure = layer.predict_batch(inputs.view());
        assert_eq!(cached, pure);
    }

    #[test]
    fn test_backward_requires_forward() {
        let mut layer = DenseLayer::new(2, 2, Activation::Linear);
        assert!(layer.backward_batch(array![[1.0, 1.0]].view()).is_none());

        layer.forward_batch(array![[1.0, 2.0]].view());
        let (_, wg, bg) = layer.backward_batch(array![[1.0, 0.0]].view()).unwrap();
        assert_eq!(wg, array![[1.0, 0.0], [2.0, 0.0]]);
        assert_eq!(bg, array![1.0, 0.0]);
    }
}
