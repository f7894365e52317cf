// ============================================================
// Layer 5 — Pretrained Weight Import
// ============================================================
// Copies the tensors of a Hugging Face `model.safetensors`
// file into a randomly initialised T5Model.
//
// Layout differences handled here:
//   • PyTorch nn.Linear stores weight as [out, in]; Burn's
//     Linear stores [in, out]. Every projection is transposed.
//   • Embedding tables ([vocab, d_model]) and the relative
//     bias tables ([buckets, heads]) have the same layout in
//     both and are copied as is.
//   • Checkpoints may be F32, F16 or BF16; everything is
//     widened to f32 and then converted by the backend.
//
// Tensor names follow the transformers T5 naming, e.g.
//   encoder.block.0.layer.0.SelfAttention.q.weight
//   decoder.block.3.layer.1.EncDecAttention.v.weight
//   decoder.block.3.layer.2.DenseReluDense.wi_0.weight
//
// A missing tensor or a shape mismatch is an error naming the
// tensor; nothing is silently left at its random init.
//
// Reference: safetensors crate documentation

use anyhow::{bail, ensure, Context, Result};
use burn::{
    module::Param,
    nn::{Embedding, Linear},
    prelude::*,
};
use safetensors::{Dtype, SafeTensors};
use std::path::Path;

use crate::ml::lora::AdaptedLinear;
use crate::ml::t5::{T5Attention, T5Block, T5FeedForward, T5LayerNorm, T5Model, T5Stack};

/// Read `path` and copy every tensor into `model`.
pub fn load_pretrained<B: Backend>(model: T5Model<B>, path: &Path) -> Result<T5Model<B>> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Cannot read weights file '{}'", path.display()))?;
    let tensors = SafeTensors::deserialize(&bytes)
        .with_context(|| format!("Invalid safetensors file '{}'", path.display()))?;

    let device = model.shared.weight.val().device();
    let store  = WeightStore { tensors, device };

    let model = store.load_model(model)?;
    tracing::info!("Loaded pretrained weights from {}", path.display());
    Ok(model)
}

struct WeightStore<'a, B: Backend> {
    tensors: SafeTensors<'a>,
    device:  B::Device,
}

impl<B: Backend> WeightStore<'_, B> {
    /// Raw tensor widened to f32, checked against rank D
    fn tensor<const D: usize>(&self, name: &str) -> Result<Tensor<B, D>> {
        let view = self
            .tensors
            .tensor(name)
            .with_context(|| format!("Missing tensor '{name}' in pretrained weights"))?;

        let shape = view.shape().to_vec();
        ensure!(
            shape.len() == D,
            "Tensor '{name}' has rank {}, expected {D}",
            shape.len()
        );

        let raw = view.data();
        let values: Vec<f32> = match view.dtype() {
            Dtype::F32 => raw
                .chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect(),
            Dtype::F16 => raw
                .chunks_exact(2)
                .map(|b| half::f16::from_le_bytes([b[0], b[1]]).to_f32())
                .collect(),
            Dtype::BF16 => raw
                .chunks_exact(2)
                .map(|b| half::bf16::from_le_bytes([b[0], b[1]]).to_f32())
                .collect(),
            other => bail!("Tensor '{name}' has unsupported dtype {other:?}"),
        };

        Ok(Tensor::from_data(TensorData::new(values, shape), &self.device))
    }

    /// Replace `target` with the named tensor after a shape check
    fn param<const D: usize>(
        &self,
        name:      &str,
        target:    &Param<Tensor<B, D>>,
        transpose: bool,
    ) -> Result<Param<Tensor<B, D>>> {
        let mut tensor = self.tensor::<D>(name)?;
        if transpose {
            tensor = tensor.transpose();
        }

        let expected = target.val().dims();
        ensure!(
            tensor.dims() == expected,
            "Tensor '{name}' has shape {:?}, model expects {:?}",
            tensor.dims(),
            expected
        );
        Ok(Param::from_tensor(tensor))
    }

    fn linear(&self, mut linear: Linear<B>, name: &str) -> Result<Linear<B>> {
        linear.weight = self.param(&format!("{name}.weight"), &linear.weight, true)?;
        Ok(linear)
    }

    fn adapted(&self, mut proj: AdaptedLinear<B>, name: &str) -> Result<AdaptedLinear<B>> {
        proj.base = self.linear(proj.base, name)?;
        Ok(proj)
    }

    fn embedding(&self, mut embedding: Embedding<B>, name: &str) -> Result<Embedding<B>> {
        embedding.weight = self.param(&format!("{name}.weight"), &embedding.weight, false)?;
        Ok(embedding)
    }

    fn norm(&self, mut norm: T5LayerNorm<B>, name: &str) -> Result<T5LayerNorm<B>> {
        norm.weight = self.param(&format!("{name}.weight"), &norm.weight, false)?;
        Ok(norm)
    }

    fn attention(&self, mut attn: T5Attention<B>, name: &str) -> Result<T5Attention<B>> {
        attn.q = self.adapted(attn.q, &format!("{name}.q"))?;
        attn.k = self.adapted(attn.k, &format!("{name}.k"))?;
        attn.v = self.adapted(attn.v, &format!("{name}.v"))?;
        attn.o = self.adapted(attn.o, &format!("{name}.o"))?;
        attn.relative_attention_bias = match attn.relative_attention_bias {
            Some(table) => Some(self.embedding(table, &format!("{name}.relative_attention_bias"))?),
            None        => None,
        };
        Ok(attn)
    }

    fn feed_forward(&self, mut ff: T5FeedForward<B>, name: &str) -> Result<T5FeedForward<B>> {
        match ff.wi_1.take() {
            Some(gate) => {
                ff.wi_0 = self.linear(ff.wi_0, &format!("{name}.wi_0"))?;
                ff.wi_1 = Some(self.linear(gate, &format!("{name}.wi_1"))?);
            }
            None => {
                ff.wi_0 = self.linear(ff.wi_0, &format!("{name}.wi"))?;
            }
        }
        ff.wo = self.linear(ff.wo, &format!("{name}.wo"))?;
        Ok(ff)
    }

    fn block(&self, mut block: T5Block<B>, name: &str) -> Result<T5Block<B>> {
        block.self_attention      = self.attention(block.self_attention, &format!("{name}.layer.0.SelfAttention"))?;
        block.self_attention_norm = self.norm(block.self_attention_norm, &format!("{name}.layer.0.layer_norm"))?;

        // Decoder blocks put cross-attention at layer.1 and push the FFN to layer.2
        let ff_layer = match (block.cross_attention.take(), block.cross_attention_norm.take()) {
            (Some(cross), Some(norm)) => {
                block.cross_attention      = Some(self.attention(cross, &format!("{name}.layer.1.EncDecAttention"))?);
                block.cross_attention_norm = Some(self.norm(norm, &format!("{name}.layer.1.layer_norm"))?);
                2
            }
            _ => 1,
        };

        block.feed_forward      = self.feed_forward(block.feed_forward, &format!("{name}.layer.{ff_layer}.DenseReluDense"))?;
        block.feed_forward_norm = self.norm(block.feed_forward_norm, &format!("{name}.layer.{ff_layer}.layer_norm"))?;
        Ok(block)
    }

    fn stack(&self, mut stack: T5Stack<B>, name: &str) -> Result<T5Stack<B>> {
        stack.blocks = stack
            .blocks
            .into_iter()
            .enumerate()
            .map(|(i, block)| self.block(block, &format!("{name}.block.{i}")))
            .collect::<Result<_>>()?;
        stack.final_layer_norm = self.norm(stack.final_layer_norm, &format!("{name}.final_layer_norm"))?;
        Ok(stack)
    }

    fn load_model(&self, mut model: T5Model<B>) -> Result<T5Model<B>> {
        model.shared  = self.embedding(model.shared, "shared")?;
        model.encoder = self.stack(model.encoder, "encoder")?;
        model.decoder = self.stack(model.decoder, "decoder")?;
        model.lm_head = match model.lm_head {
            Some(head) => Some(self.linear(head, "lm_head")?),
            None       => None,
        };
        Ok(model)
    }
}
