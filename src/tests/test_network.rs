use ndarray::array;

use crate::activations::Activation;
use crate::error::QError;
use crate::loss::LossKind;
use crate::network::NeuralNetwork;
use crate::optimizer::{GradientClipper, OptimizerKind, OptimizerWrapper, SGD};

fn small_network() -> NeuralNetwork {
    NeuralNetwork::new(
        &[3, 8, 2],
        &[Activation::Relu, Activation::Linear],
        OptimizerWrapper::from_kind(OptimizerKind::default()),
    )
    .unwrap()
}

#[test]
fn test_network_construction() {
    let network = small_network();
    assert_eq!(network.layers.len(), 2);
    assert_eq!(network.input_size(), 3);
    assert_eq!(network.output_size(), 2);
}

#[test]
fn test_network_rejects_bad_layout() {
    let optimizer = OptimizerWrapper::SGD(SGD::new());
    assert!(matches!(
        NeuralNetwork::new(&[3], &[], optimizer.clone()),
        Err(QError::InvalidParameter { .. })
    ));
    assert!(matches!(
        NeuralNetwork::new(&[3, 0, 2], &[Activation::Relu, Activation::Linear], optimizer.clone()),
        Err(QError::InvalidParameter { .. })
    ));
    assert!(matches!(
        NeuralNetwork::new(&[3, 4, 2], &[Activation::Relu], optimizer),
        Err(QError::DimensionMismatch { .. })
    ));
}

#[test]
fn test_predict_does_not_change_weights() {
    let network = small_network();
    let before = network.weights();
    let outputs = network.predict(array![[0.1, 0.2, 0.3], [1.0, -1.0, 0.0]].view()).unwrap();
    assert_eq!(outputs.shape(), &[2, 2]);
    assert_eq!(network.weights(), before);
}

#[test]
fn test_train_minibatch_with_sgd_and_huber() {
    let mut network = NeuralNetwork::new(
        &[2, 8, 1],
        &[Activation::Tanh, Activation::Linear],
        OptimizerWrapper::SGD(SGD::new()),
    )
    .unwrap();
    let inputs = array![[0.0, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0]];
    let targets = array![[0.0], [1.0], [1.0], [2.0]];
    let loss = LossKind::Huber { delta: 1.0 };

    let first = network
        .train_minibatch(inputs.view(), targets.view(), 0.05, &loss, &GradientClipper::None)
        .unwrap();
    let mut last = first;
    for _ in 0..300 {
        last = network
            .train_minibatch(inputs.view(), targets.view(), 0.05, &loss, &GradientClipper::None)
            .unwrap();
    }
    assert!(last < first, "loss went from {} to {}", first, last);
}

#[test]
fn test_train_minibatch_rejects_target_shape() {
    let mut network = small_network();
    let result = network.train_minibatch(
        array![[0.1, 0.2, 0.3]].view(),
        array![[1.0]].view(),
        0.01,
        &LossKind::Mse,
        &GradientClipper::None,
    );
    assert!(matches!(result, Err(QError::DimensionMismatch { .. })));
}

#[test]
fn test_save_and_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("network.bin");

    let network = small_network();
    network.save(&path).unwrap();
    let loaded = NeuralNetwork::load(&path).unwrap();
    assert_eq!(loaded.weights(), network.weights());

    let input = array![[0.5, -0.5, 0.25]];
    assert_eq!(loaded.predict(input.view()).unwrap(), network.predict(input.view()).unwrap());
}

#[test]
fn test_failed_save_leaves_no_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing").join("network.bin");
    assert!(matches!(small_network().save(&path), Err(QError::Io(_))));
    assert!(!path.exists());
}

#[test]
fn test_load_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        NeuralNetwork::load(&dir.path().join("nope.bin")),
        Err(QError::Io(_))
    ));
}
