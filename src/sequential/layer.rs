use super::tensor::Tensor;
use std::any::Any;
use rand::Rng;
use rayon::prelude::*;
use serde::{Serialize, Deserialize};

#[typetag::serde(tag = "type")]
pub trait Layer {
    fn forward(&mut self, input: &Tensor) -> Tensor;
    fn backward(&mut self, d_output: &Tensor) -> Tensor;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn as_any(&self) -> &dyn Any;
}


// dense layer

#[derive(Serialize, Deserialize)]
pub struct Dense {
    pub weights: Tensor,
    pub biases: Tensor,
    #[serde(skip)]
    cached_input: Option<Tensor>, // for back propagation
    #[serde(skip)]
    pub d_weights: Option<Tensor>,
    #[serde(skip)]
    pub d_biases: Option<Tensor>,
}

impl Dense {
    /// Xavier/Glorot normal weights, zero biases.
    pub fn new<R: Rng + ?Sized>(input_size: usize, output_size: usize, rng: &mut R) -> Self {
        let std = (2.0 / (input_size + output_size) as f32).sqrt();
        Self::from_parts(
            Tensor::random(vec![input_size, output_size], std, rng),
            Tensor::zeros(vec![1, output_size]),
        )
    }

    pub fn from_parts(weights: Tensor, biases: Tensor) -> Self {
        assert_eq!(weights.shape.len(), 2, "weights must be a 2D tensor");
        assert_eq!(biases.shape, vec![1, weights.shape[1]], "biases must be [1, output_size]");
        Self {
            weights,
            biases,
            cached_input: None,
            d_weights: None,
            d_biases: None,
        }
    }

    pub fn input_size(&self) -> usize {
        self.weights.shape[0]
    }

    pub fn output_size(&self) -> usize {
        self.weights.shape[1]
    }
}

#[typetag::serde]
impl Layer for Dense {
    fn forward(&mut self, input: &Tensor) -> Tensor {
        self.cached_input = Some(input.clone());

        let output = input.matmul(&self.weights);

        // add biases
        {
            let mut output_data = output.write();
            let biases_data = self.biases.read();
            let output_size = output.shape[1];

            output_data.par_chunks_mut(output_size).for_each(|row_chunk| {
                for j in 0..output_size {
                    row_chunk[j] += biases_data[j];
                }
            });
        }

        output
    }

    fn backward(&mut self, d_output: &Tensor) -> Tensor {
        let Some(cached_input) = &self.cached_input else {
            panic!("complete forward pass first.");
        };

        // dL/dW = input.T @ dL/dY
        self.d_weights = Some(cached_input.transpose().matmul(d_output));

        // dL/db = dL/dY summed over the batch
        self.d_biases = Some(d_output.sum_rows());

        // dL/dX = dL/dY @ weights.T
        d_output.matmul(&self.weights.transpose())
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}


// relu layer

#[derive(Serialize, Deserialize, Default)]
pub struct ReLU {
    #[serde(skip)]
    cached_input: Option<Tensor>,
}

impl ReLU {
    pub fn new() -> Self {
        Self::default()
    }
}

#[typetag::serde]
impl Layer for ReLU {
    fn forward(&mut self, input: &Tensor) -> Tensor {
        self.cached_input = Some(input.clone());
        input.map(|x| x.max(0.0))
    }

    fn backward(&mut self, d_output: &Tensor) -> Tensor {
        let Some(cached_input) = &self.cached_input else {
            panic!("complete forward pass first.");
        };

        cached_input.map2(d_output, |input_val, output_val| {
            if input_val > 0.0 {
                output_val
            } else {
                0.0
            }
        })
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
