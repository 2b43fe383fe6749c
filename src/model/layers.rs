//! TensorFlow.js layers-model loader and inference
//!
//! Reads the `model.json` written by `model.save('file://...')` (or by
//! `tensorflowjs_converter` from a Keras model) together with its binary
//! weight shards, and evaluates Sequential stacks of dense layers.

use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

use super::{ModelError, RiskModel};

const SELU_ALPHA: f64 = 1.673_263_242_354_377_3;
const SELU_SCALE: f64 = 1.050_700_987_355_480_5;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelJson {
    model_topology: Value,
    #[serde(default)]
    weights_manifest: Vec<WeightGroup>,
}

#[derive(Debug, Deserialize)]
struct WeightGroup {
    paths: Vec<String>,
    weights: Vec<WeightSpec>,
}

#[derive(Debug, Deserialize)]
struct WeightSpec {
    name: String,
    shape: Vec<usize>,
    #[serde(default = "default_dtype")]
    dtype: String,
    #[serde(default)]
    quantization: Option<Value>,
}

fn default_dtype() -> String {
    "float32".to_string()
}

/// A decoded weight tensor
#[derive(Debug, Clone)]
struct Tensor {
    shape: Vec<usize>,
    values: Vec<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Activation {
    Linear,
    Relu,
    Sigmoid,
    Tanh,
    Softmax,
    Softplus,
    Elu,
    Selu,
    HardSigmoid,
}

impl Activation {
    fn from_config(value: Option<&Value>) -> Result<Self, ModelError> {
        let name = match value {
            None | Some(Value::Null) => return Ok(Activation::Linear),
            Some(Value::String(s)) => s.as_str(),
            Some(other) => return Err(ModelError::UnsupportedActivation(other.to_string())),
        };

        match name {
            "linear" => Ok(Activation::Linear),
            "relu" => Ok(Activation::Relu),
            "sigmoid" => Ok(Activation::Sigmoid),
            "tanh" => Ok(Activation::Tanh),
            "softmax" => Ok(Activation::Softmax),
            "softplus" => Ok(Activation::Softplus),
            "elu" => Ok(Activation::Elu),
            "selu" => Ok(Activation::Selu),
            "hard_sigmoid" | "hardSigmoid" => Ok(Activation::HardSigmoid),
            other => Err(ModelError::UnsupportedActivation(other.to_string())),
        }
    }

    fn apply(&self, values: &mut [f64]) {
        match self {
            Activation::Linear => {}
            Activation::Relu => values.iter_mut().for_each(|v| *v = v.max(0.0)),
            Activation::Sigmoid => values.iter_mut().for_each(|v| *v = sigmoid(*v)),
            Activation::Tanh => values.iter_mut().for_each(|v| *v = v.tanh()),
            Activation::Softplus => values.iter_mut().for_each(|v| *v = v.exp().ln_1p()),
            Activation::Elu => values
                .iter_mut()
                .for_each(|v| *v = if *v > 0.0 { *v } else { v.exp_m1() }),
            Activation::Selu => values.iter_mut().for_each(|v| {
                *v = SELU_SCALE * if *v > 0.0 { *v } else { SELU_ALPHA * v.exp_m1() }
            }),
            Activation::HardSigmoid => values
                .iter_mut()
                .for_each(|v| *v = (0.2 * *v + 0.5).clamp(0.0, 1.0)),
            Activation::Softmax => {
                let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                values.iter_mut().for_each(|v| *v = (*v - max).exp());
                let sum: f64 = values.iter().sum();
                if sum > 0.0 {
                    values.iter_mut().for_each(|v| *v /= sum);
                }
            }
        }
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

#[derive(Debug, Clone)]
enum Layer {
    Dense {
        /// Row-major `[inputs, units]`
        kernel: Vec<f64>,
        bias: Option<Vec<f64>>,
        inputs: usize,
        units: usize,
        activation: Activation,
    },
    Activation(Activation),
}

impl Layer {
    fn forward(&self, input: Vec<f64>) -> Vec<f64> {
        match self {
            Layer::Dense {
                kernel,
                bias,
                inputs,
                units,
                activation,
            } => {
                let mut output = match bias {
                    Some(b) => b.clone(),
                    None => vec![0.0; *units],
                };
                for (i, x) in input.iter().enumerate().take(*inputs) {
                    let row = &kernel[i * units..(i + 1) * units];
                    for (out, w) in output.iter_mut().zip(row) {
                        *out += x * w;
                    }
                }
                activation.apply(&mut output);
                output
            }
            Layer::Activation(activation) => {
                let mut output = input;
                activation.apply(&mut output);
                output
            }
        }
    }
}

/// A Sequential TensorFlow.js layers model
#[derive(Debug, Clone)]
pub struct LayersModel {
    layers: Vec<Layer>,
    input_width: usize,
}

impl LayersModel {
    /// Load `model.json` and the weight shards next to it
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ModelError> {
        log::debug!("Loading layers model from {:?}", path.as_ref());
        let path = path.as_ref();
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let json = std::fs::read_to_string(path).map_err(|source| ModelError::Io {
            path: path.display().to_string(),
            source,
        })?;

        Self::from_json(&json, |shard| {
            let shard_path = dir.join(shard);
            std::fs::read(&shard_path).map_err(|source| ModelError::Io {
                path: shard_path.display().to_string(),
                source,
            })
        })
    }

    /// Build a model from `model.json` text; `read_shard` returns the bytes
    /// of a shard named in the weights manifest.
    pub fn from_json<F>(json: &str, read_shard: F) -> Result<Self, ModelError>
    where
        F: Fn(&str) -> Result<Vec<u8>, ModelError>,
    {
        let model: ModelJson = serde_json::from_str(json)?;
        let weights = decode_weights(&model.weights_manifest, read_shard)?;
        let layer_configs = layer_configs(&model.model_topology)?;

        let mut layers = Vec::new();
        let mut width: Option<usize> = None;
        let mut input_width: Option<usize> = None;

        for layer in layer_configs {
            let class_name = layer
                .get("class_name")
                .and_then(Value::as_str)
                .ok_or_else(|| ModelError::Topology("layer without class_name".to_string()))?;
            let config = layer.get("config").ok_or_else(|| {
                ModelError::Topology(format!("{} layer without config", class_name))
            })?;

            if width.is_none() {
                width = declared_input_width(config);
            }

            match class_name {
                "InputLayer" | "Dropout" | "Flatten" => {}
                "Activation" => {
                    layers.push(Layer::Activation(Activation::from_config(
                        config.get("activation"),
                    )?));
                }
                "Dense" => {
                    let dense = build_dense(config, &weights, width)?;
                    if let Layer::Dense { inputs, units, .. } = &dense {
                        input_width.get_or_insert(*inputs);
                        width = Some(*units);
                    }
                    layers.push(dense);
                }
                other => return Err(ModelError::UnsupportedLayer(other.to_string())),
            }
        }

        let input_width = input_width
            .ok_or_else(|| ModelError::Topology("model has no Dense layer".to_string()))?;

        Ok(LayersModel {
            layers,
            input_width,
        })
    }

    /// Number of features the model expects
    pub fn input_width(&self) -> usize {
        self.input_width
    }
}

impl RiskModel for LayersModel {
    fn predict(&self, features: &[f64]) -> Result<f64, ModelError> {
        if features.len() != self.input_width {
            return Err(ModelError::Shape(format!(
                "expected {} features, got {}",
                self.input_width,
                features.len()
            )));
        }

        let output = self
            .layers
            .iter()
            .fold(features.to_vec(), |x, layer| layer.forward(x));

        output.first().copied().ok_or(ModelError::EmptyOutput)
    }
}

/// The layer list of a Sequential topology, in any of the layouts the
/// converters produce
fn layer_configs(topology: &Value) -> Result<&Vec<Value>, ModelError> {
    let topology = topology.get("model_config").unwrap_or(topology);

    if let Some(class_name) = topology.get("class_name").and_then(Value::as_str) {
        if class_name != "Sequential" {
            return Err(ModelError::Topology(format!(
                "only Sequential models are supported, got {}",
                class_name
            )));
        }
    }

    match topology.get("config") {
        Some(Value::Array(layers)) => Ok(layers),
        Some(config) => config
            .get("layers")
            .and_then(Value::as_array)
            .ok_or_else(|| ModelError::Topology("config has no layers".to_string())),
        None => Err(ModelError::Topology("missing config".to_string())),
    }
}

fn declared_input_width(config: &Value) -> Option<usize> {
    config
        .get("batch_input_shape")
        .or_else(|| config.get("batchInputShape"))
        .or_else(|| config.get("batch_shape"))
        .and_then(Value::as_array)
        .and_then(|shape| shape.last())
        .and_then(Value::as_u64)
        .map(|w| w as usize)
}

fn build_dense(
    config: &Value,
    weights: &HashMap<String, Tensor>,
    width: Option<usize>,
) -> Result<Layer, ModelError> {
    let name = config
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| ModelError::Topology("Dense layer without name".to_string()))?;

    let kernel = find_weight(weights, name, "kernel")
        .ok_or_else(|| ModelError::Weights(format!("no kernel for layer {}", name)))?;
    let (inputs, units) = match kernel.shape.as_slice() {
        [inputs, units] => (*inputs, *units),
        other => {
            return Err(ModelError::Shape(format!(
                "kernel of {} has shape {:?}",
                name, other
            )))
        }
    };

    if inputs.checked_mul(units) != Some(kernel.values.len()) {
        return Err(ModelError::Shape(format!(
            "kernel of {} has {} values for shape {:?}",
            name,
            kernel.values.len(),
            kernel.shape
        )));
    }

    if let Some(declared) = config.get("units").and_then(Value::as_u64) {
        if declared as usize != units {
            return Err(ModelError::Shape(format!(
                "layer {} declares {} units, kernel has {}",
                name, declared, units
            )));
        }
    }
    if let Some(width) = width {
        if width != inputs {
            return Err(ModelError::Shape(format!(
                "layer {} expects {} inputs, previous layer produces {}",
                name, inputs, width
            )));
        }
    }

    let use_bias = config
        .get("use_bias")
        .or_else(|| config.get("useBias"))
        .and_then(Value::as_bool)
        .unwrap_or(true);
    let bias = if use_bias {
        let bias = find_weight(weights, name, "bias")
            .ok_or_else(|| ModelError::Weights(format!("no bias for layer {}", name)))?;
        if bias.values.len() != units {
            return Err(ModelError::Shape(format!(
                "bias of {} has {} values, expected {}",
                name,
                bias.values.len(),
                units
            )));
        }
        Some(bias.values.clone())
    } else {
        None
    };

    Ok(Layer::Dense {
        kernel: kernel.values.clone(),
        bias,
        inputs,
        units,
        activation: Activation::from_config(config.get("activation"))?,
    })
}

/// `<layer>/<kind>`, possibly under a scope such as `model/<layer>/<kind>`
fn find_weight<'a>(
    weights: &'a HashMap<String, Tensor>,
    layer: &str,
    kind: &str,
) -> Option<&'a Tensor> {
    let exact = format!("{}/{}", layer, kind);
    let scoped = format!("/{}", exact);
    weights.get(&exact).or_else(|| {
        weights
            .iter()
            .find(|(name, _)| name.ends_with(&scoped))
            .map(|(_, tensor)| tensor)
    })
}

fn decode_weights<F>(
    manifest: &[WeightGroup],
    read_shard: F,
) -> Result<HashMap<String, Tensor>, ModelError>
where
    F: Fn(&str) -> Result<Vec<u8>, ModelError>,
{
    let mut weights = HashMap::new();

    for group in manifest {
        let mut buffer = Vec::new();
        for path in &group.paths {
            buffer.extend(read_shard(path)?);
        }

        let mut offset = 0;
        for spec in &group.weights {
            if spec.dtype != "float32" {
                return Err(ModelError::Weights(format!(
                    "{} has unsupported dtype {}",
                    spec.name, spec.dtype
                )));
            }
            if spec.quantization.is_some() {
                return Err(ModelError::Weights(format!(
                    "{} is quantized",
                    spec.name
                )));
            }

            let end = spec
                .shape
                .iter()
                .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
                .and_then(|count| count.checked_mul(4))
                .and_then(|len| len.checked_add(offset))
                .ok_or_else(|| {
                    ModelError::Weights(format!("{} has oversized shape {:?}", spec.name, spec.shape))
                })?;
            let bytes = buffer.get(offset..end).ok_or_else(|| {
                ModelError::Weights(format!(
                    "shards end before {} ({} of {} bytes)",
                    spec.name,
                    buffer.len(),
                    end
                ))
            })?;

            let values = bytes
                .chunks_exact(4)
                .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]) as f64)
                .collect();
            weights.insert(
                spec.name.clone(),
                Tensor {
                    shape: spec.shape.clone(),
                    values,
                },
            );
            offset = end;
        }

        if offset != buffer.len() {
            return Err(ModelError::Weights(format!(
                "{} trailing bytes in weight group",
                buffer.len() - offset
            )));
        }
    }

    Ok(weights)
}
