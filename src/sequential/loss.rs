use super::tensor::Tensor;
use serde::{Serialize, Deserialize};

#[typetag::serde(tag = "type")]
pub trait Loss {
    fn calculate(&self, y_pred: &Tensor, y_true: &Tensor) -> f32;
    fn gradient(&self, y_pred: &Tensor, y_true: &Tensor) -> Tensor;
}


// mean squared error, averaged over the batch rows

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct MeanSquaredError;

#[typetag::serde]
impl Loss for MeanSquaredError {
    fn calculate(&self, y_pred: &Tensor, y_true: &Tensor) -> f32 {
        let diff = y_pred.map2(y_true, |pred_x, true_x| pred_x - true_x);
        let squared_errors = diff.map(|x| x * x);
        squared_errors.read().iter().sum::<f32>() / y_pred.shape[0] as f32
    }

    fn gradient(&self, y_pred: &Tensor, y_true: &Tensor) -> Tensor {
        let rows = y_pred.shape[0] as f32;
        y_pred.map2(y_true, |pred_x, true_x| pred_x - true_x).map(|x| 2.0 * x / rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_vec_approx_eq(a: &[f32], b: &[f32]) {
        let tolerance = 1e-6;
        assert_eq!(a.len(), b.len(), "vectors have different lengths");
        for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
            assert!((x - y).abs() < tolerance, "mismatch at index {}: {} vs {}", i, x, y);
        }
    }

    #[test]
    fn test_mse_calculation() {
        let y_pred = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0], vec![1, 4]);
        let y_true = Tensor::from_vec(vec![1.0, 2.0, 5.0, 4.0], vec![1, 4]);

        assert!((MeanSquaredError.calculate(&y_pred, &y_true) - 4.0).abs() < 1e-6);
    }

    #[test]
    fn test_mse_gradient_only_on_changed_output() {
        // a Q-learning target differs from the prediction at a single index
        let y_pred = Tensor::from_vec(vec![0.5, -0.2, 0.1, 0.3], vec![1, 4]);
        let y_true = Tensor::from_vec(vec![0.5, -0.2, 1.1, 0.3], vec![1, 4]);

        let gradient = MeanSquaredError.gradient(&y_pred, &y_true);

        assert_eq!(gradient.shape, vec![1, 4]);
        assert_vec_approx_eq(&gradient.read(), &[0.0, 0.0, -2.0, 0.0]);
    }
}
