pub mod tensor;
pub mod layer;
pub mod loss;
pub mod optimizer;

use tensor::Tensor;
use layer::{Layer, Dense, ReLU};
use loss::{Loss, MeanSquaredError};
use optimizer::{Optimizer, Adam};

use rand::Rng;
use serde::{Serialize, Deserialize};

#[derive(Serialize, Deserialize)]
pub struct Sequential {
    pub layers: Vec<Box<dyn Layer>>,
    pub loss: Box<dyn Loss>,
    pub optimizer: Box<dyn Optimizer>,
}

impl Sequential {
    pub fn new(layers: Vec<Box<dyn Layer>>, loss: Box<dyn Loss>, optimizer: Box<dyn Optimizer>) -> Self {
        Self {
            layers,
            loss,
            optimizer,
        }
    }

    /// The value network: one ReLU hidden layer, linear output, MSE loss, Adam.
    pub fn q_network<R: Rng + ?Sized>(input_size: usize, hidden_size: usize, output_size: usize, learning_rate: f32, rng: &mut R) -> Self {
        let layers: Vec<Box<dyn Layer>> = vec![
            Box::new(Dense::new(input_size, hidden_size, rng)),
            Box::new(ReLU::new()),
            Box::new(Dense::new(hidden_size, output_size, rng)),
        ];
        Self::new(layers, Box::new(MeanSquaredError), Box::new(Adam::new(learning_rate)))
    }

    pub fn predict(&mut self, input: &Tensor) -> Tensor {
        let mut output = input.clone();
        for layer in &mut self.layers {
            output = layer.forward(&output);
        }
        output
    }

    /// One gradient step towards `y_batch`; returns the loss before the update.
    pub fn train_on_batch(&mut self, x_batch: &Tensor, y_batch: &Tensor) -> f32 {
        let y_pred = self.predict(x_batch);
        let loss = self.loss.calculate(&y_pred, y_batch);
        let mut d_output = self.loss.gradient(&y_pred, y_batch);
        for layer in self.layers.iter_mut().rev() {
            d_output = layer.backward(&d_output);
        }
        self.optimizer.step(&mut self.layers);
        loss
    }

    fn dense_layers(&self) -> impl Iterator<Item = &Dense> {
        self.layers.iter().filter_map(|layer| layer.as_any().downcast_ref::<Dense>())
    }

    pub fn input_size(&self) -> Option<usize> {
        self.dense_layers().next().map(Dense::input_size)
    }

    pub fn output_size(&self) -> Option<usize> {
        self.dense_layers().last().map(Dense::output_size)
    }
}
