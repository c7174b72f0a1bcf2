use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use rand::Rng;
use rand_distr::{Normal, Distribution};
use rayon::prelude::*;
use std::fmt;
use serde::{Serialize, Deserialize, Serializer, Deserializer};

/// Row-major f32 tensor. Cloning shares the underlying buffer; use
/// `deep_clone` for an independent copy.
pub struct Tensor {
    pub data: Arc<RwLock<Vec<f32>>>,
    pub shape: Vec<usize>,
    pub strides: Vec<usize>,
}

impl Tensor {
    pub fn zeros(shape: Vec<usize>) -> Self {
        let data: Vec<f32> = vec![0.0; shape.iter().product()];
        Self {
            data: Arc::new(RwLock::new(data)),
            strides: Tensor::calc_strides(&shape),
            shape,
        }
    }

    /// Samples every element from N(0, std^2).
    pub fn random<R: Rng + ?Sized>(shape: Vec<usize>, std: f32, rng: &mut R) -> Self {
        let normal = Normal::new(0.0, std).expect("std must be finite and non-negative");
        let data: Vec<f32> = (0..shape.iter().product()).map(|_| normal.sample(rng)).collect();

        Self {
            data: Arc::new(RwLock::new(data)),
            strides: Tensor::calc_strides(&shape),
            shape,
        }
    }

    pub fn from_vec(data: Vec<f32>, shape: Vec<usize>) -> Self {
        assert_eq!(data.len(), shape.iter().product::<usize>(), "data length must match shape");
        Self {
            data: Arc::new(RwLock::new(data)),
            strides: Tensor::calc_strides(&shape),
            shape,
        }
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Vec<f32>> {
        self.data.read().expect("tensor lock poisoned")
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Vec<f32>> {
        self.data.write().expect("tensor lock poisoned")
    }

    pub fn to_vec(&self) -> Vec<f32> {
        self.read().clone()
    }

    pub fn transpose(&self) -> Self {
        let mut new_shape = self.shape.clone();
        new_shape.reverse();
        let mut new_strides = self.strides.clone();
        new_strides.reverse();

        Self {
            data: Arc::clone(&self.data),
            shape: new_shape,
            strides: new_strides,
        }
    }

    pub fn matmul(&self, other: &Tensor) -> Tensor {
        assert_eq!(self.shape.len(), 2, "self must be a 2D tensor.");
        assert_eq!(other.shape.len(), 2, "other must be a 2D tensor.");
        assert_eq!(self.shape[1], other.shape[0], "self columns must equal other rows");

        let k = self.shape[1];
        let n = other.shape[1];

        let c = Tensor::zeros(vec![self.shape[0], n]);

        let a_data = self.read();
        let b_data = other.read();

        {
            let mut c_data_guard = c.write();
            let c_slice: &mut [f32] = &mut c_data_guard;

            c_slice.par_chunks_mut(n).enumerate().for_each(|(m_idx, c_row)| {
                for k_idx in 0..k {
                    let a_val = a_data[m_idx * self.strides[0] + k_idx * self.strides[1]];
                    for n_idx in 0..n {
                        let b_val = b_data[k_idx * other.strides[0] + n_idx * other.strides[1]];
                        c_row[n_idx] += a_val * b_val;
                    }
                }
            });
        }

        c
    }

    // column sums of a 2D tensor, shape [1, n]
    pub fn sum_rows(&self) -> Tensor {
        assert_eq!(self.shape.len(), 2, "sum_rows only works for 2D tensors");

        let data = self.read();
        let n = self.shape[1];

        let partial_sum = data.par_chunks(n).map(|row_slice| {
            row_slice.to_vec()
        }).reduce(
            || vec![0.0; n],
            |mut acc, row| {
                for i in 0..n {
                    acc[i] += row[i];
                }
                acc
            },
        );

        Tensor::from_vec(partial_sum, vec![1, n])
    }

    pub fn map<F>(&self, f: F) -> Tensor
    where F: Fn(f32) -> f32 + Sync + Send {
        let input_data = self.read();
        let new_data: Vec<f32> = input_data.par_iter().map(|&x| f(x)).collect();
        Tensor::from_vec(new_data, self.shape.clone())
    }

    // map through self allowing access to second tensor
    pub fn map2<F>(&self, other: &Tensor, f: F) -> Tensor
    where F: Fn(f32, f32) -> f32 + Sync + Send {
        assert_eq!(self.shape, other.shape, "tensors must have the same shape");

        let data1 = self.read();
        let data2 = other.read();
        let new_data: Vec<f32> = data1.par_iter().zip(data2.par_iter()).map(|(&x1, &x2)| f(x1, x2)).collect();
        Tensor::from_vec(new_data, self.shape.clone())
    }

    pub fn deep_clone(&self) -> Tensor {
        let data_clone = self.read().clone();
        Tensor::from_vec(data_clone, self.shape.clone())
    }

    fn calc_strides(shape: &[usize]) -> Vec<usize> {
        let mut strides: Vec<usize> = vec![1; shape.len()];
        for i in (0..strides.len().saturating_sub(1)).rev() {
            strides[i] = strides[i+1] * shape[i+1];
        }
        strides
    }
}

impl Clone for Tensor {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
            shape: self.shape.clone(),
            strides: self.strides.clone(),
        }
    }
}

impl PartialEq for Tensor {
    fn eq(&self, other: &Self) -> bool {
        if self.shape != other.shape {
            return false;
        }

        *self.read() == *other.read()
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tensor")
         .field("shape", &self.shape)
         .field("data", &*self.read())
         .finish()
    }
}

#[derive(Serialize, Deserialize)]
struct SerializableTensor {
    shape: Vec<usize>,
    data: Vec<f32>,
}

impl Serialize for Tensor {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where S: Serializer {
        let s_tensor = SerializableTensor {
            shape: self.shape.clone(),
            data: self.read().clone(),
        };
        s_tensor.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Tensor {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where D: Deserializer<'de> {
        let s_tensor = SerializableTensor::deserialize(deserializer)?;
        if s_tensor.data.len() != s_tensor.shape.iter().product::<usize>() {
            return Err(serde::de::Error::custom("tensor data length does not match shape"));
        }
        Ok(Tensor::from_vec(s_tensor.data, s_tensor.shape))
    }
}
