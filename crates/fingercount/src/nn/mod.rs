//! ONNX network loading and CPU inference via `tract`.

pub mod tensor;

use std::{ops::RangeInclusive, path::Path, sync::Arc};

use anyhow::{bail, Context};
use tensor::Tensor;
use tract_onnx::prelude::{
    tvec, Framework, Graph, InferenceModelExt, OutletId, SimplePlan, TValue, TVec, TypedFact,
    TypedOp,
};

use crate::image::{AsImageView, Color, ImageView, Resolution};

type Plan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Builder returned by [`NeuralNetwork::from_path`] and [`NeuralNetwork::from_onnx`].
pub struct Loader {
    onnx: Vec<u8>,
    selection: Option<Vec<usize>>,
}

impl Loader {
    /// Restricts inference to the outputs at `indices`, in that order.
    ///
    /// Outputs that are not selected are not computed, and [`Outputs`] only holds the selected
    /// tensors.
    pub fn with_output_selection(mut self, indices: impl Into<Vec<usize>>) -> Self {
        self.selection = Some(indices.into());
        self
    }

    /// Parses and optimizes the network.
    ///
    /// Fails on malformed ONNX data, unsupported operators, out of range output indices, and
    /// inputs or outputs without a fixed shape.
    pub fn load(self) -> anyhow::Result<NeuralNetwork> {
        let graph = tract_onnx::onnx()
            .model_for_read(&mut self.onnx.as_slice())?
            .into_optimized()?;

        let all = graph.output_outlets()?;
        let selected: Vec<OutletId> = match &self.selection {
            None => all.to_vec(),
            Some(indices) => indices
                .iter()
                .map(|&i| {
                    all.get(i).copied().with_context(|| {
                        format!("network has {} outputs, cannot select output {i}", all.len())
                    })
                })
                .collect::<anyhow::Result<_>>()?,
        };
        let plan = SimplePlan::new_for_outputs(graph, &selected)?;

        let model = plan.model();
        let inputs = model
            .inputs
            .iter()
            .map(|outlet| node_info(&plan, *outlet))
            .collect::<anyhow::Result<_>>()?;
        let outputs = model
            .outputs
            .iter()
            .map(|outlet| node_info(&plan, *outlet))
            .collect::<anyhow::Result<_>>()?;

        Ok(NeuralNetwork(Arc::new(Loaded {
            plan,
            inputs,
            outputs,
        })))
    }
}

fn node_info(plan: &Plan, outlet: OutletId) -> anyhow::Result<NodeInfo> {
    let model = plan.model();
    let name = model.node(outlet.node).name.clone();
    let fact = model.outlet_fact(outlet)?;
    let Some(shape) = fact.shape.as_concrete() else {
        bail!("shape of network node '{name}' is not fixed");
    };
    Ok(NodeInfo {
        shape: shape.to_vec(),
        name,
    })
}

/// A loaded network. Clones share the same network.
#[derive(Clone)]
pub struct NeuralNetwork(Arc<Loaded>);

struct Loaded {
    plan: Plan,
    inputs: Vec<NodeInfo>,
    outputs: Vec<NodeInfo>,
}

impl NeuralNetwork {
    /// Reads an ONNX file. Paths without an `.onnx` extension are rejected.
    pub fn from_path(path: impl AsRef<Path>) -> anyhow::Result<Loader> {
        let path = path.as_ref();
        if path.extension().map_or(true, |ext| ext != "onnx") {
            bail!("'{}' is not an `.onnx` file", path.display());
        }

        let onnx = std::fs::read(path)
            .with_context(|| format!("failed to read network from '{}'", path.display()))?;
        Ok(Self::from_onnx(onnx))
    }

    pub fn from_onnx(onnx: impl Into<Vec<u8>>) -> Loader {
        Loader {
            onnx: onnx.into(),
            selection: None,
        }
    }

    pub fn inputs(&self) -> &[NodeInfo] {
        &self.0.inputs
    }

    /// The selected outputs, see [`Loader::with_output_selection`].
    pub fn outputs(&self) -> &[NodeInfo] {
        &self.0.outputs
    }

    /// Runs inference. `inputs` must match [`NeuralNetwork::inputs`].
    pub fn estimate(&self, inputs: &Inputs) -> anyhow::Result<Outputs> {
        let values = inputs
            .tensors
            .iter()
            .map(|tensor| Ok(TValue::from_const(Arc::new(tensor.to_tract()?))))
            .collect::<anyhow::Result<TVec<_>>>()?;
        let results = self.0.plan.run(values)?;
        let tensors = results
            .iter()
            .map(|value| Tensor::from_tract(value))
            .collect::<anyhow::Result<_>>()?;
        Ok(Outputs { tensors })
    }
}

/// Name and fixed shape of a network input or output.
#[derive(Debug, Clone)]
pub struct NodeInfo {
    name: String,
    shape: Vec<usize>,
}

impl NodeInfo {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }
}

/// Input tensors, one per network input.
#[derive(Debug)]
pub struct Inputs {
    tensors: TVec<Tensor>,
}

impl From<Tensor> for Inputs {
    fn from(tensor: Tensor) -> Self {
        Self {
            tensors: tvec![tensor],
        }
    }
}

impl FromIterator<Tensor> for Inputs {
    fn from_iter<I: IntoIterator<Item = Tensor>>(iter: I) -> Self {
        Self {
            tensors: iter.into_iter().collect(),
        }
    }
}

/// Output tensors of one inference run.
#[derive(Debug)]
pub struct Outputs {
    tensors: TVec<Tensor>,
}

impl Outputs {
    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    /// Returns output `index`, failing if it is missing or its shape is not `shape`.
    pub fn expect_shape(&self, index: usize, shape: &[usize]) -> anyhow::Result<&Tensor> {
        let Some(tensor) = self.tensors.get(index) else {
            bail!("expected output {index}, but the network has {}", self.len());
        };
        if tensor.shape() != shape {
            bail!(
                "expected output {index} to have shape {shape:?}, got {:?}",
                tensor.shape()
            );
        }
        Ok(tensor)
    }
}

impl FromIterator<Tensor> for Outputs {
    fn from_iter<I: IntoIterator<Item = Tensor>>(iter: I) -> Self {
        Self {
            tensors: iter.into_iter().collect(),
        }
    }
}

/// A network taking a single RGB image.
#[derive(Clone)]
pub struct Cnn {
    nn: NeuralNetwork,
    layout: CnnInputShape,
    input_res: Resolution,
    colors: ColorMapper,
}

impl Cnn {
    /// Fails unless `nn` has exactly one input, shaped like a single 3-channel image in `layout`.
    pub fn new(
        nn: NeuralNetwork,
        layout: CnnInputShape,
        colors: ColorMapper,
    ) -> anyhow::Result<Self> {
        let input_res = match nn.inputs() {
            [input] => layout.resolution(input.shape())?,
            inputs => bail!("expected a network with 1 input, this one has {}", inputs.len()),
        };
        Ok(Self {
            nn,
            layout,
            input_res,
            colors,
        })
    }

    pub fn input_resolution(&self) -> Resolution {
        self.input_res
    }

    /// Resamples `image` to the input resolution and runs the network on it.
    ///
    /// The image is stretched if its aspect ratio differs from the input's.
    pub fn estimate<V: AsImageView>(&self, image: &V) -> anyhow::Result<Outputs> {
        let tensor = image_to_tensor(image.as_view(), self.layout, self.input_res, &self.colors);
        self.nn.estimate(&tensor.into())
    }
}

/// Nearest-neighbour samples `view` into an image tensor of resolution `res`.
fn image_to_tensor(
    view: ImageView<'_>,
    layout: CnnInputShape,
    res: Resolution,
    colors: &ColorMapper,
) -> Tensor {
    let (w, h) = (res.width() as usize, res.height() as usize);
    let sx = view.width() as f32 / w as f32;
    let sy = view.height() as f32 / h as f32;
    let sample = |x: usize, y: usize| {
        let u = (x as f32 + 0.5) * sx;
        let v = (y as f32 + 0.5) * sy;
        colors.map(view.get(u as u32, v as u32))
    };

    match layout {
        CnnInputShape::NCHW => {
            Tensor::from_array_shape_fn([1, 3, h, w], |[_, c, y, x]| sample(x, y)[c])
        }
        CnnInputShape::NHWC => {
            Tensor::from_array_shape_fn([1, h, w, 3], |[_, y, x, c]| sample(x, y)[c])
        }
    }
}

/// Converts 8-bit color channels to network input values.
#[derive(Debug, Clone)]
pub struct ColorMapper {
    offset: f32,
    step: f32,
}

impl ColorMapper {
    /// Maps channel value 0 to the start of `range` and 255 to its end, linearly in between.
    ///
    /// # Panics
    ///
    /// Panics if `range` is empty or a single point.
    pub fn linear(range: RangeInclusive<f32>) -> Self {
        let (start, end) = range.into_inner();
        assert!(start < end, "color range {start}..={end} is empty");
        Self {
            offset: start,
            step: (end - start) / 255.0,
        }
    }

    fn map(&self, color: Color) -> [f32; 3] {
        color.rgb().map(|c| self.offset + c as f32 * self.step)
    }
}

/// Memory layout of an image tensor: batch size `N` (always 1), channels `C` (3), height `H` and
/// width `W`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CnnInputShape {
    /// `[1, 3, H, W]`
    NCHW,
    /// `[1, H, W, 3]`
    NHWC,
}

impl CnnInputShape {
    fn resolution(self, shape: &[usize]) -> anyhow::Result<Resolution> {
        let (w, h) = match (self, shape) {
            (Self::NCHW, &[1, 3, h, w]) | (Self::NHWC, &[1, h, w, 3]) => (w, h),
            _ => bail!("input shape {shape:?} is not a single RGB image in {self:?} layout"),
        };
        Ok(Resolution::new(w.try_into()?, h.try_into()?))
    }
}
