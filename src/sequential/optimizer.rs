use super::layer::{Layer, Dense};
use super::tensor::Tensor;
use serde::{Serialize, Deserialize};

#[typetag::serde(tag = "type")]
pub trait Optimizer {
    fn step(&mut self, layers: &mut [Box<dyn Layer>]);
}


// Adam

#[derive(Serialize, Deserialize, Clone, Debug)]
struct Moments {
    m_weights: Tensor,
    v_weights: Tensor,
    m_biases: Tensor,
    v_biases: Tensor,
}

impl Moments {
    fn zeros_like(dense: &Dense) -> Self {
        Self {
            m_weights: Tensor::zeros(dense.weights.shape.clone()),
            v_weights: Tensor::zeros(dense.weights.shape.clone()),
            m_biases: Tensor::zeros(dense.biases.shape.clone()),
            v_biases: Tensor::zeros(dense.biases.shape.clone()),
        }
    }
}

#[derive(Clone, Copy)]
struct StepParams {
    learning_rate: f32,
    beta1: f32,
    beta2: f32,
    epsilon: f32,
    bias_correction1: f32,
    bias_correction2: f32,
}

/// Adam with per-dense-layer first and second moment estimates. The moments
/// are serialized with the model so a restored network resumes identically.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Adam {
    learning_rate: f32,
    beta1: f32,
    beta2: f32,
    epsilon: f32,
    step_count: u64,
    moments: Vec<Moments>,
}

impl Adam {
    pub fn new(learning_rate: f32) -> Self {
        Self {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
            step_count: 0,
            moments: Vec::new(),
        }
    }

    pub fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    pub fn step_count(&self) -> u64 {
        self.step_count
    }
}

fn adam_update(param: &Tensor, grad: &Tensor, m: &Tensor, v: &Tensor, p: StepParams) -> Tensor {
    assert_eq!(param.shape, grad.shape, "gradient shape must match parameter shape");

    let param_data = param.read();
    let grad_data = grad.read();
    let mut m_data = m.write();
    let mut v_data = v.write();

    let mut updated = Vec::with_capacity(param_data.len());
    for i in 0..param_data.len() {
        let g = grad_data[i];
        m_data[i] = p.beta1 * m_data[i] + (1.0 - p.beta1) * g;
        v_data[i] = p.beta2 * v_data[i] + (1.0 - p.beta2) * g * g;

        let m_hat = m_data[i] / p.bias_correction1;
        let v_hat = v_data[i] / p.bias_correction2;
        updated.push(param_data[i] - p.learning_rate * m_hat / (v_hat.sqrt() + p.epsilon));
    }

    Tensor::from_vec(updated, param.shape.clone())
}

#[typetag::serde]
impl Optimizer for Adam {
    fn step(&mut self, layers: &mut [Box<dyn Layer>]) {
        self.step_count += 1;
        let t = self.step_count as f32;
        let params = StepParams {
            learning_rate: self.learning_rate,
            beta1: self.beta1,
            beta2: self.beta2,
            epsilon: self.epsilon,
            bias_correction1: 1.0 - self.beta1.powf(t),
            bias_correction2: 1.0 - self.beta2.powf(t),
        };

        let mut dense_index = 0;
        for layer in layers {
            let Some(dense_layer) = layer.as_any_mut().downcast_mut::<Dense>() else {
                continue;
            };

            if self.moments.len() <= dense_index {
                self.moments.push(Moments::zeros_like(dense_layer));
            }
            let moments = &self.moments[dense_index];
            dense_index += 1;

            if let (Some(d_weights), Some(d_biases)) = (&dense_layer.d_weights, &dense_layer.d_biases) {
                let new_weights = adam_update(&dense_layer.weights, d_weights, &moments.m_weights, &moments.v_weights, params);
                let new_biases = adam_update(&dense_layer.biases, d_biases, &moments.m_biases, &moments.v_biases, params);

                dense_layer.weights = new_weights;
                dense_layer.biases = new_biases;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_vec_approx_eq(a: &[f32], b: &[f32]) {
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x - y).abs() < 1e-5, "{} vs {}", x, y);
        }
    }

    fn dense_with_gradients() -> Dense {
        let mut dense_layer = Dense::from_parts(
            Tensor::from_vec(vec![10.0, 20.0, 30.0, 40.0], vec![2, 2]),
            Tensor::from_vec(vec![5.0, 6.0], vec![1, 2]),
        );
        dense_layer.d_weights = Some(Tensor::from_vec(vec![2.0, -3.0, 4.0, 0.0], vec![2, 2]));
        dense_layer.d_biases = Some(Tensor::from_vec(vec![0.5, -1.5], vec![1, 2]));
        dense_layer
    }

    #[test]
    fn test_adam_first_step_moves_by_learning_rate() {
        let mut optimizer = Adam::new(0.1);
        let mut layers: Vec<Box<dyn Layer>> = vec![Box::new(dense_with_gradients())];
        optimizer.step(&mut layers);
        let updated_layer = layers[0].as_any().downcast_ref::<Dense>().unwrap();

        // after bias correction the first update is lr * g / |g|
        assert_vec_approx_eq(&updated_layer.weights.read(), &[9.9, 20.1, 29.9, 40.0]);
        assert_vec_approx_eq(&updated_layer.biases.read(), &[4.9, 6.1]);
        assert_eq!(optimizer.step_count(), 1);
        assert_eq!(optimizer.moments.len(), 1);
    }

    #[test]
    fn test_adam_skips_layers_without_gradients() {
        let mut optimizer = Adam::new(0.1);
        let untouched = Dense::from_parts(
            Tensor::from_vec(vec![1.0, 2.0], vec![1, 2]),
            Tensor::from_vec(vec![0.0, 0.0], vec![1, 2]),
        );
        let mut layers: Vec<Box<dyn Layer>> = vec![Box::new(untouched)];
        optimizer.step(&mut layers);

        let layer = layers[0].as_any().downcast_ref::<Dense>().unwrap();
        assert_eq!(*layer.weights.read(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_adam_state_survives_serialization() {
        let mut optimizer = Adam::new(0.01);
        let mut layers: Vec<Box<dyn Layer>> = vec![Box::new(dense_with_gradients())];
        optimizer.step(&mut layers);

        let bytes = bincode::serialize(&optimizer).unwrap();
        let restored: Adam = bincode::deserialize(&bytes).unwrap();

        assert_eq!(restored.step_count(), 1);
        assert_eq!(restored.learning_rate(), 0.01);
        assert_eq!(restored.moments[0].m_weights, optimizer.moments[0].m_weights);
        assert_eq!(restored.moments[0].v_biases, optimizer.moments[0].v_biases);
    }
}
