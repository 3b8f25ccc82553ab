//! Candle feed-forward regressor for resale prices.
//!
//! Layers are named `fc1`, `fc2`, … in the safetensors file, each with a
//! `weight` of shape `[out, in]` and an optional `bias` of shape `[out]`.
//! ReLU sits between layers; the last layer has width 1 and no activation.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{bail, ensure, Context, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::{linear, Linear, Module, VarBuilder};

/// In-process price model.
pub struct PriceRegressor {
    layers: Vec<Linear>,
    in_features: usize,
    device: Device,
}

impl PriceRegressor {
    /// Create a model with trainable weights: `in_features → hidden… → 1`.
    pub fn new(vb: VarBuilder<'_>, in_features: usize, hidden: &[usize]) -> Result<Self> {
        let mut layers = Vec::with_capacity(hidden.len() + 1);
        let mut width = in_features;
        for (i, &out) in hidden.iter().chain(std::iter::once(&1)).enumerate() {
            layers.push(linear(width, out, vb.pp(format!("fc{}", i + 1)))?);
            width = out;
        }
        Ok(Self {
            layers,
            in_features,
            device: vb.device().clone(),
        })
    }

    /// Load a trained model from a safetensors file, discovering its layers.
    pub fn load(path: &Path, device: &Device) -> Result<Self> {
        let tensors = candle_core::safetensors::load(path, device)
            .with_context(|| format!("failed to read model weights from {}", path.display()))?;
        Self::from_tensors(tensors, device)
    }

    fn from_tensors(mut tensors: HashMap<String, Tensor>, device: &Device) -> Result<Self> {
        let mut layers = Vec::new();
        let mut in_features = None;
        let mut width = None;

        for i in 1.. {
            let Some(weight) = tensors.remove(&format!("fc{i}.weight")) else {
                break;
            };
            let weight = weight.to_dtype(DType::F32)?;
            let (out, inp) = weight
                .dims2()
                .with_context(|| format!("fc{i}.weight must be 2-dimensional"))?;
            if let Some(prev) = width {
                ensure!(
                    inp == prev,
                    "fc{i} expects {inp} inputs but fc{} produces {prev}",
                    i - 1
                );
            }
            let bias = match tensors.remove(&format!("fc{i}.bias")) {
                Some(b) => {
                    ensure!(
                        b.dims() == [out],
                        "fc{i}.bias has shape {:?}, expected [{out}]",
                        b.dims()
                    );
                    Some(b.to_dtype(DType::F32)?)
                }
                None => None,
            };
            in_features.get_or_insert(inp);
            width = Some(out);
            layers.push(Linear::new(weight, bias));
        }

        let Some(in_features) = in_features else {
            bail!("model has no fc1.weight tensor");
        };
        ensure!(
            width == Some(1),
            "model output width is {width:?}, expected 1"
        );

        Ok(Self {
            layers,
            in_features,
            device: device.clone(),
        })
    }

    /// Width of the input the model was trained on.
    pub fn in_features(&self) -> usize {
        self.in_features
    }

    /// Forward pass over a `[batch, in_features]` tensor.
    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let last = self.layers.len() - 1;
        let mut x = x.clone();
        for (i, layer) in self.layers.iter().enumerate() {
            x = layer.forward(&x)?;
            if i < last {
                x = x.relu()?;
            }
        }
        Ok(x)
    }

    /// Predict a price for a single scaled feature vector.
    pub fn predict_one(&self, features: &[f32]) -> Result<f32> {
        ensure!(
            features.len() == self.in_features,
            "got {} features, model expects {}",
            features.len(),
            self.in_features
        );
        let input = Tensor::from_slice(features, (1, self.in_features), &self.device)?;
        let output = self.forward(&input)?;
        let values = output.flatten_all()?.to_vec1::<f32>()?;
        values
            .first()
            .copied()
            .context("model produced an empty output")
    }
}
