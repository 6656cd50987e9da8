//! Checkpoint discovery and safetensors loading.

use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use half::{bf16, f16};
use memmap2::Mmap;
use ndarray::{Array1, Array2, ArrayD, Ix1, Ix2, IxDyn};
use safetensors::tensor::TensorView;
use safetensors::{Dtype, SafeTensors};

pub const DEFAULT_CHECKPOINT: &str = "model.safetensors";

/// Pick the checkpoint to restore from a model directory: `model.safetensors`
/// if present, otherwise the `.safetensors` file with the highest trailing
/// step number.
pub fn latest_checkpoint(model_dir: &Path) -> Result<PathBuf> {
    let default = model_dir.join(DEFAULT_CHECKPOINT);
    if default.is_file() {
        return Ok(default);
    }

    let entries = std::fs::read_dir(model_dir)
        .with_context(|| format!("failed to read model directory {:?}", model_dir))?;

    let mut best: Option<(Option<u64>, String, PathBuf)> = None;
    for entry in entries {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("safetensors") {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let key = (trailing_step(stem), stem.to_string());
        if best.as_ref().is_none_or(|(step, name, _)| key > (*step, name.clone())) {
            best = Some((key.0, key.1, path));
        }
    }

    best.map(|(_, _, path)| path)
        .ok_or_else(|| anyhow!("no .safetensors checkpoint found in {:?}", model_dir))
}

fn trailing_step(stem: &str) -> Option<u64> {
    let digits: String = stem
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit())
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    digits.parse().ok()
}

/// All tensors of one checkpoint, widened to f32.
pub struct CheckpointWeights {
    tensors: HashMap<String, ArrayD<f32>>,
}

impl CheckpointWeights {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("failed to open checkpoint {:?}", path))?;
        // The file is only read while the map is alive, inside this function.
        let mmap = unsafe { Mmap::map(&file) }
            .with_context(|| format!("failed to mmap checkpoint {:?}", path))?;
        let weights = Self::from_bytes(&mmap).with_context(|| format!("in {:?}", path))?;
        log::info!("restored {} tensors from {:?}", weights.len(), path);
        Ok(weights)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let st = SafeTensors::deserialize(bytes).context("failed to parse safetensors")?;
        let tensors = st
            .tensors()
            .into_iter()
            .map(|(name, view)| {
                let array = to_f32(&view).with_context(|| format!("tensor '{}'", name))?;
                Ok((name, array))
            })
            .collect::<Result<HashMap<_, _>>>()?;
        Ok(Self { tensors })
    }

    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tensors.contains_key(name)
    }

    fn get(&self, name: &str) -> Result<&ArrayD<f32>> {
        self.tensors
            .get(name)
            .ok_or_else(|| anyhow!("checkpoint is missing tensor '{}'", name))
    }

    pub fn matrix(&self, name: &str, shape: (usize, usize)) -> Result<Array2<f32>> {
        let array = self.get(name)?.clone().into_dimensionality::<Ix2>()?;
        if array.dim() != shape {
            bail!("tensor '{}' has shape {:?}, expected {:?}", name, array.dim(), shape);
        }
        Ok(array)
    }

    pub fn vector(&self, name: &str, len: usize) -> Result<Array1<f32>> {
        let array = self.get(name)?.clone().into_dimensionality::<Ix1>()?;
        if array.len() != len {
            bail!("tensor '{}' has length {}, expected {}", name, array.len(), len);
        }
        Ok(array)
    }
}

fn to_f32(view: &TensorView<'_>) -> Result<ArrayD<f32>> {
    let data = view.data();
    let values: Vec<f32> = match view.dtype() {
        Dtype::F32 => data
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect(),
        Dtype::F16 => data
            .chunks_exact(2)
            .map(|b| f16::from_le_bytes([b[0], b[1]]).to_f32())
            .collect(),
        Dtype::BF16 => data
            .chunks_exact(2)
            .map(|b| bf16::from_le_bytes([b[0], b[1]]).to_f32())
            .collect(),
        other => bail!("unsupported dtype {:?}", other),
    };
    Ok(ArrayD::from_shape_vec(IxDyn(view.shape()), values)?)
}
