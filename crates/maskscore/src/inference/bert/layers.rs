//! Dense building blocks for the CPU encoder.

use std::str::FromStr;

use anyhow::{Result, anyhow};
use libm::{erff, tanhf};
use ndarray::{Array1, Array2};

use super::weights::CheckpointWeights;

const SQRT_2_INV: f32 = 0.7071067811865475;
const SQRT_2_OVER_PI: f32 = 0.7978845608;
const GELU_COEFF: f32 = 0.044715;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    Gelu,
    GeluNew,
    Relu,
    Tanh,
}

impl FromStr for Activation {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "gelu" => Ok(Activation::Gelu),
            "gelu_new" | "gelu_fast" | "gelu_pytorch_tanh" => Ok(Activation::GeluNew),
            "relu" => Ok(Activation::Relu),
            "tanh" => Ok(Activation::Tanh),
            _ => Err(anyhow!("unknown activation function: {}", s)),
        }
    }
}

impl Activation {
    #[inline]
    pub fn apply(self, x: f32) -> f32 {
        match self {
            Activation::Gelu => 0.5 * x * (1.0 + erff(x * SQRT_2_INV)),
            Activation::GeluNew => {
                let inner = SQRT_2_OVER_PI * (x + GELU_COEFF * x * x * x);
                0.5 * x * (1.0 + tanhf(inner))
            }
            Activation::Relu => x.max(0.0),
            Activation::Tanh => tanhf(x),
        }
    }

    pub fn apply_inplace(self, x: &mut Array2<f32>) {
        x.mapv_inplace(|v| self.apply(v));
    }
}

/// `y = x W^T + b`, weight stored `[out, in]`.
pub struct Linear {
    pub weight: Array2<f32>,
    pub bias: Array1<f32>,
}

impl Linear {
    pub fn load(weights: &CheckpointWeights, prefix: &str, out: usize, inp: usize) -> Result<Self> {
        Ok(Self {
            weight: weights.matrix(&format!("{}.weight", prefix), (out, inp))?,
            bias: weights.vector(&format!("{}.bias", prefix), out)?,
        })
    }

    pub fn forward(&self, x: &Array2<f32>) -> Array2<f32> {
        x.dot(&self.weight.t()) + &self.bias
    }
}

/// Row-wise layer normalization.
pub struct LayerNorm {
    pub weight: Array1<f32>,
    pub bias: Array1<f32>,
    pub eps: f32,
}

impl LayerNorm {
    pub fn load(weights: &CheckpointWeights, prefix: &str, dim: usize, eps: f32) -> Result<Self> {
        Ok(Self {
            weight: weights.vector(&format!("{}.weight", prefix), dim)?,
            bias: weights.vector(&format!("{}.bias", prefix), dim)?,
            eps,
        })
    }

    pub fn forward(&self, x: &Array2<f32>) -> Array2<f32> {
        let mut out = x.clone();
        for mut row in out.rows_mut() {
            let n = row.len() as f32;
            let mean = row.sum() / n;
            let var = row.iter().map(|v| (v - mean) * (v - mean)).sum::<f32>() / n;
            let inv_std = 1.0 / (var + self.eps).sqrt();
            for ((v, w), b) in row.iter_mut().zip(&self.weight).zip(&self.bias) {
                *v = (*v - mean) * inv_std * w + b;
            }
        }
        out
    }
}

/// Softmax over each row, in place.
pub fn softmax_rows_inplace(x: &mut Array2<f32>) {
    for mut row in x.rows_mut() {
        let max = row.fold(f32::NEG_INFINITY, |a, &b| a.max(b));
        let mut sum = 0.0;
        for v in row.iter_mut() {
            *v = (*v - max).exp();
            sum += *v;
        }
        if sum > 0.0 {
            row.mapv_inplace(|v| v / sum);
        }
    }
}

/// Log-softmax over each row, in place.
pub fn log_softmax_rows_inplace(x: &mut Array2<f32>) {
    for mut row in x.rows_mut() {
        let max = row.fold(f32::NEG_INFINITY, |a, &b| a.max(b));
        let log_sum = row.iter().map(|v| (v - max).exp()).sum::<f32>().ln();
        row.mapv_inplace(|v| v - max - log_sum);
    }
}
