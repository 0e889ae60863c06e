//! Regression losses for the train step.
//!
//! The targets built by the TD computation equal the current predictions in
//! every column except the taken action, so any element-wise loss here only
//! produces gradient through that one column per row.

pub mod functions;

pub use functions::{HuberLoss, Loss, LossKind, MSE};
