use ndarray::{Array1, Array2};
use serde::{Serialize, Deserialize};

/// Gradient clipping methods
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GradientClipper {
    /// Clip gradients element-wise
    ClipByValue { min: f32, max: f32 },

    /// Rescale all gradients of one train step so their joint L2 norm is at most `max_norm`
    ClipByGlobalNorm { max_norm: f32 },

    /// No clipping
    #[default]
    None,
}

impl GradientClipper {
    /// Clip one train step's `(weight, bias)` gradients for every layer in place.
    pub fn clip(&self, gradients: &mut [(Array2<f32>, Array1<f32>)]) {
        match self {
            GradientClipper::ClipByValue { min, max } => {
                for (wg, bg) in gradients.iter_mut() {
                    wg.mapv_inplace(|g| g.max(*min).min(*max));
                    bg.mapv_inplace(|g| g.max(*min).min(*max));
                }
            }

            GradientClipper::ClipByGlobalNorm { max_norm } => {
                let norm = global_norm(gradients);
                if norm > *max_norm && norm > 0.0 {
                    let scale = max_norm / norm;
                    for (wg, bg) in gradients.iter_mut() {
                        wg.mapv_inplace(|g| g * scale);
                        bg.mapv_inplace(|g| g * scale);
                    }
                }
            }

            GradientClipper::None => {}
        }
    }
}

/// Joint L2 norm over all weight and bias gradients
pub fn global_norm(gradients: &[(Array2<f32>, Array1<f32>)]) -> f32 {
    gradients
        .iter()
        .map(|(wg, bg)| {
            wg.iter().map(|g| g * g).sum::<f32>() + bg.iter().map(|g| g * g).sum::<f32>()
        })
        .sum::<f32>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_clip_by_global_norm() {
        let mut grads = vec![(array![[3.0, 0.0]], array![4.0])];
        GradientClipper::ClipByGlobalNorm { max_norm: 1.0 }.clip(&mut grads);
        assert!((global_norm(&grads) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_clip_by_value() {
        let mut grads = vec![(array![[3.0, -5.0]], array![0.5])];
        GradientClipper::ClipByValue { min: -1.0, max: 1.0 }.clip(&mut grads);
        assert_eq!(grads[0].0, array![[1.0, -1.0]]);
        assert_eq!(grads[0].1, array![0.5]);
    }

    #[test]
    fn test_none_leaves_gradients() {
        let mut grads = vec![(array![[30.0]], array![40.0])];
        GradientClipper::None.clip(&mut grads);
        assert_eq!(grads[0].0, array![[30.0]]);
    }
}
