//! Activation functions for the built-in Q-network.
//!
//! Hidden layers default to ReLU; the output layer of a Q-network is always
//! `Linear` because Q-values are unbounded regression targets.

pub mod functions;

pub use functions::Activation;

#[cfg(test)]
mod tests {
    use super::Activation;
    use ndarray::array;

    #[test]
    fn test_relu_and_derivative() {
        let mut x = array![[-1.0, 0.0, 2.0]];
        Activation::Relu.apply_batch(&mut x);
        assert_eq!(x, array![[0.0, 0.0, 2.0]]);

        let d = Activation::Relu.derivative_batch(array![[-1.0, 0.5]].view());
        assert_eq!(d, array![[0.0, 1.0]]);
    }

    #[test]
    fn test_linear_is_identity() {
        let mut x = array![[-3.5, 4.25]];
        Activation::Linear.apply_batch(&mut x);
        assert_eq!(x, array![[-3.5, 4.25]]);
        assert_eq!(Activation::Linear.derivative_batch(x.view()), array![[1.0, 1.0]]);
    }

    #[test]
    fn test_leaky_relu_keeps_negative_slope() {
        let act = Activation::LeakyRelu { alpha: 0.1 };
        let mut x = array![[-2.0, 3.0]];
        act.apply_batch(&mut x);
        assert!((x[[0, 0]] + 0.2).abs() < 1e-6);
        assert_eq!(x[[0, 1]], 3.0);
    }
}
