// ============================================================
// Layer 5 — T5 Encoder-Decoder
// ============================================================
// The pretrained sequence-to-sequence transformer, written
// with Burn modules so the same code runs on Wgpu or NdArray
// and under Autodiff for training.
//
// Architecture (one encoder block / one decoder block):
//
//   encoder block:                 decoder block:
//     x += SelfAttn(RMSNorm(x))      y += CausalSelfAttn(RMSNorm(y))
//     x += FFN(RMSNorm(x))           y += CrossAttn(RMSNorm(y), enc)
//                                    y += FFN(RMSNorm(y))
//
// How T5 differs from the classic transformer:
//   • RMS layer norm: no mean subtraction, no bias
//   • Attention scores are NOT divided by √d_kv
//   • No absolute positions. Each head learns a scalar bias
//     per "distance bucket", added to the scores. Only the
//     first block of a stack owns the bias table, and the
//     computed bias is shared by every block of that stack.
//   • Feed-forward is either relu or gated-gelu:
//       relu       : wo(relu(wi x))
//       gated-gelu : wo(gelu_new(wi_0 x) ⊙ wi_1 x)
//
// Masks are additive: 0 where attention is allowed, a large
// negative number where it is not, summed into the position
// bias before the softmax.
//
// Reference: Raffel et al. (2020) Exploring the Limits of
//            Transfer Learning with a Unified Text-to-Text
//            Transformer
//            Burn Book §3 (Building Blocks)

use anyhow::{bail, Context, Result};
use burn::{
    module::Param,
    nn::{Dropout, DropoutConfig, Embedding, EmbeddingConfig, Initializer, Linear, LinearConfig},
    prelude::*,
    tensor::activation::{log_softmax, relu, softmax},
};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::data::batcher::Seq2SeqBatch;
use crate::ml::lora::{AdaptedLinear, LoraConfig};

/// Additive mask value for blocked attention positions
const MASK_VALUE: f32 = -1.0e9;

// ─── T5Config ─────────────────────────────────────────────────────────────────
/// Hyperparameters as found in a Hugging Face `config.json`.
/// Missing keys fall back to the flan-t5-small values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct T5Config {
    pub vocab_size:                     usize,
    pub d_model:                        usize,
    pub d_kv:                           usize,
    pub d_ff:                           usize,
    pub num_layers:                     usize,
    pub num_decoder_layers:             Option<usize>,
    pub num_heads:                      usize,
    pub relative_attention_num_buckets: usize,
    pub relative_attention_max_distance: usize,
    pub dropout_rate:                   f64,
    pub layer_norm_epsilon:             f64,
    pub feed_forward_proj:              String,
    pub tie_word_embeddings:            bool,
    pub pad_token_id:                   u32,
    pub eos_token_id:                   u32,
    pub decoder_start_token_id:         u32,
}

impl Default for T5Config {
    fn default() -> Self {
        Self {
            vocab_size:                      32128,
            d_model:                         512,
            d_kv:                            64,
            d_ff:                            1024,
            num_layers:                      8,
            num_decoder_layers:              Some(8),
            num_heads:                       6,
            relative_attention_num_buckets:  32,
            relative_attention_max_distance: 128,
            dropout_rate:                    0.1,
            layer_norm_epsilon:              1e-6,
            feed_forward_proj:               "gated-gelu".to_string(),
            tie_word_embeddings:             false,
            pad_token_id:                    0,
            eos_token_id:                    1,
            decoder_start_token_id:          0,
        }
    }
}

/// Feed-forward flavour parsed from `feed_forward_proj`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedForwardKind {
    pub gated: bool,
    pub gelu:  bool,
}

impl T5Config {
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read model config '{}'", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Invalid model config '{}'", path.display()))
    }

    pub fn decoder_layers(&self) -> usize {
        self.num_decoder_layers.unwrap_or(self.num_layers)
    }

    pub fn inner_dim(&self) -> usize {
        self.num_heads * self.d_kv
    }

    pub fn feed_forward_kind(&self) -> Result<FeedForwardKind> {
        let (gated, act) = match self.feed_forward_proj.strip_prefix("gated-") {
            Some(act) => (true, act),
            None      => (false, self.feed_forward_proj.as_str()),
        };
        let gelu = match act {
            "gelu" | "gelu_new" => true,
            "relu"              => false,
            other => bail!("Unsupported feed_forward_proj activation '{other}'"),
        };
        Ok(FeedForwardKind { gated, gelu })
    }

    /// Randomly initialised model with this shape
    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<T5Model<B>> {
        let ff = self.feed_forward_kind()?;

        let shared  = EmbeddingConfig::new(self.vocab_size, self.d_model).init(device);
        let encoder = self.build_stack(self.num_layers, false, ff, device);
        let decoder = self.build_stack(self.decoder_layers(), true, ff, device);
        let lm_head = (!self.tie_word_embeddings).then(|| {
            LinearConfig::new(self.d_model, self.vocab_size).with_bias(false).init(device)
        });

        Ok(T5Model { shared, encoder, decoder, lm_head, d_model: self.d_model })
    }

    fn build_stack<B: Backend>(
        &self,
        num_blocks: usize,
        is_decoder: bool,
        ff:         FeedForwardKind,
        device:     &B::Device,
    ) -> T5Stack<B> {
        let blocks = (0..num_blocks)
            .map(|i| self.build_block(i == 0, is_decoder, ff, device))
            .collect();

        T5Stack {
            blocks,
            final_layer_norm: self.build_norm(device),
            dropout:          DropoutConfig::new(self.dropout_rate).init(),
            num_heads:        self.num_heads,
            is_decoder,
        }
    }

    fn build_block<B: Backend>(
        &self,
        has_relative_bias: bool,
        is_decoder:        bool,
        ff:                FeedForwardKind,
        device:            &B::Device,
    ) -> T5Block<B> {
        let cross_attention = is_decoder.then(|| self.build_attention(false, true, device));
        let cross_attention_norm = is_decoder.then(|| self.build_norm(device));

        T5Block {
            self_attention:      self.build_attention(has_relative_bias, is_decoder, device),
            self_attention_norm: self.build_norm(device),
            cross_attention,
            cross_attention_norm,
            feed_forward:        self.build_feed_forward(ff, device),
            feed_forward_norm:   self.build_norm(device),
            dropout:             DropoutConfig::new(self.dropout_rate).init(),
        }
    }

    fn build_attention<B: Backend>(
        &self,
        has_relative_bias: bool,
        is_decoder:        bool,
        device:            &B::Device,
    ) -> T5Attention<B> {
        let proj = |d_in: usize, d_out: usize| {
            AdaptedLinear::new(LinearConfig::new(d_in, d_out).with_bias(false).init(device))
        };
        let relative_attention_bias = has_relative_bias.then(|| {
            EmbeddingConfig::new(self.relative_attention_num_buckets, self.num_heads).init(device)
        });

        T5Attention {
            q: proj(self.d_model, self.inner_dim()),
            k: proj(self.d_model, self.inner_dim()),
            v: proj(self.d_model, self.inner_dim()),
            o: proj(self.inner_dim(), self.d_model),
            relative_attention_bias,
            dropout:      DropoutConfig::new(self.dropout_rate).init(),
            num_heads:    self.num_heads,
            d_kv:         self.d_kv,
            num_buckets:  self.relative_attention_num_buckets,
            max_distance: self.relative_attention_max_distance,
            is_decoder,
        }
    }

    fn build_feed_forward<B: Backend>(&self, ff: FeedForwardKind, device: &B::Device) -> T5FeedForward<B> {
        let linear = |d_in: usize, d_out: usize| {
            LinearConfig::new(d_in, d_out).with_bias(false).init(device)
        };
        T5FeedForward {
            wi_0:    linear(self.d_model, self.d_ff),
            wi_1:    ff.gated.then(|| linear(self.d_model, self.d_ff)),
            wo:      linear(self.d_ff, self.d_model),
            dropout: DropoutConfig::new(self.dropout_rate).init(),
            gelu:    ff.gelu,
        }
    }

    fn build_norm<B: Backend>(&self, device: &B::Device) -> T5LayerNorm<B> {
        T5LayerNorm {
            weight: Initializer::Ones.init([self.d_model], device),
            eps:    self.layer_norm_epsilon,
        }
    }
}

// ─── Relative position buckets ────────────────────────────────────────────────
/// Map a key-minus-query distance to a bias bucket.
///
/// Half of the buckets hold exact small distances, the other
/// half grow logarithmically up to `max_distance`, beyond which
/// everything shares the last bucket. Bidirectional (encoder)
/// attention splits the buckets between keys before and after
/// the query. Causal (decoder) attention maps every future key
/// to bucket 0.
pub fn relative_position_bucket(
    relative_position: i64,
    bidirectional:     bool,
    num_buckets:       usize,
    max_distance:      usize,
) -> usize {
    let mut num_buckets = num_buckets;
    let mut bucket      = 0usize;

    let distance = if bidirectional {
        num_buckets /= 2;
        if relative_position > 0 {
            bucket += num_buckets;
        }
        relative_position.unsigned_abs() as usize
    } else {
        (-relative_position.min(0)) as usize
    };

    let max_exact = num_buckets / 2;
    if distance < max_exact {
        return bucket + distance;
    }

    let scaled = (distance as f32 / max_exact as f32).ln()
        / (max_distance as f32 / max_exact as f32).ln()
        * (num_buckets - max_exact) as f32;
    let large = (max_exact + scaled as usize).min(num_buckets - 1);

    bucket + large
}

// ─── T5LayerNorm ──────────────────────────────────────────────────────────────
/// Root-mean-square norm: x / √(mean(x²) + ε) · weight
#[derive(Module, Debug)]
pub struct T5LayerNorm<B: Backend> {
    pub weight: Param<Tensor<B, 1>>,
    pub eps:    f64,
}

impl<B: Backend> T5LayerNorm<B> {
    pub fn forward<const D: usize>(&self, x: Tensor<B, D>) -> Tensor<B, D> {
        let variance = x.clone().powi_scalar(2).mean_dim(D - 1);
        let inv_rms  = variance.add_scalar(self.eps).sqrt().recip();
        x * inv_rms * self.weight.val().unsqueeze()
    }
}

// ─── T5Attention ──────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct T5Attention<B: Backend> {
    pub q: AdaptedLinear<B>,
    pub k: AdaptedLinear<B>,
    pub v: AdaptedLinear<B>,
    pub o: AdaptedLinear<B>,
    /// Bucket → per-head bias, only in the first block of a stack
    pub relative_attention_bias: Option<Embedding<B>>,
    pub dropout:      Dropout,
    pub num_heads:    usize,
    pub d_kv:         usize,
    pub num_buckets:  usize,
    pub max_distance: usize,
    pub is_decoder:   bool,
}

impl<B: Backend> T5Attention<B> {
    /// hidden: [batch, q_len, d_model]
    /// key_value: [batch, k_len, d_model] for cross-attention, None for self-attention
    /// bias: [batch, heads, q_len, k_len], position bias plus mask
    pub fn forward(
        &self,
        hidden:    Tensor<B, 3>,
        key_value: Option<Tensor<B, 3>>,
        bias:      Tensor<B, 4>,
    ) -> Tensor<B, 3> {
        let [batch_size, q_len, _] = hidden.dims();
        let key_value = key_value.unwrap_or_else(|| hidden.clone());
        let k_len     = key_value.dims()[1];

        let q = self.split_heads(self.q.forward(hidden), batch_size, q_len);
        let k = self.split_heads(self.k.forward(key_value.clone()), batch_size, k_len);
        let v = self.split_heads(self.v.forward(key_value), batch_size, k_len);

        // No 1/√d_kv here, T5 folds it into the weight init
        let scores  = q.matmul(k.swap_dims(2, 3)) + bias;
        let weights = self.dropout.forward(softmax(scores, 3));

        let context = weights
            .matmul(v)
            .swap_dims(1, 2)
            .reshape([batch_size, q_len, self.num_heads * self.d_kv]);

        self.o.forward(context)
    }

    /// [batch, len, heads·d_kv] → [batch, heads, len, d_kv]
    fn split_heads(&self, x: Tensor<B, 3>, batch_size: usize, len: usize) -> Tensor<B, 4> {
        x.reshape([batch_size, len, self.num_heads, self.d_kv]).swap_dims(1, 2)
    }

    /// Learned bias for every (query, key) pair — shape: [1, heads, q_len, k_len].
    /// None when this block does not own a bias table.
    pub fn compute_bias(&self, q_len: usize, k_len: usize, device: &B::Device) -> Option<Tensor<B, 4>> {
        let table = self.relative_attention_bias.as_ref()?;

        let buckets: Vec<i64> = (0..q_len)
            .flat_map(|i| {
                (0..k_len).map(move |j| {
                    relative_position_bucket(
                        j as i64 - i as i64,
                        !self.is_decoder,
                        self.num_buckets,
                        self.max_distance,
                    ) as i64
                })
            })
            .collect();

        let buckets = Tensor::<B, 2, Int>::from_data(TensorData::new(buckets, [q_len, k_len]), device);

        // [q_len, k_len, heads] → [1, heads, q_len, k_len]
        Some(table.forward(buckets).permute([2, 0, 1]).unsqueeze())
    }

    pub fn with_lora(mut self, config: &LoraConfig, device: &B::Device) -> Self {
        if config.targets("q") { self.q = self.q.attach(config, device); }
        if config.targets("k") { self.k = self.k.attach(config, device); }
        if config.targets("v") { self.v = self.v.attach(config, device); }
        if config.targets("o") { self.o = self.o.attach(config, device); }
        self
    }

    pub fn adapter_params(&self) -> usize {
        [&self.q, &self.k, &self.v, &self.o]
            .iter()
            .map(|p| p.adapter_params())
            .sum()
    }
}

// ─── T5FeedForward ────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct T5FeedForward<B: Backend> {
    /// `wi` in the relu variant, `wi_0` in the gated one
    pub wi_0:    Linear<B>,
    /// Gate projection, gated variants only
    pub wi_1:    Option<Linear<B>>,
    pub wo:      Linear<B>,
    pub dropout: Dropout,
    pub gelu:    bool,
}

impl<B: Backend> T5FeedForward<B> {
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        let hidden = self.wi_0.forward(x.clone());
        let hidden = if self.gelu { gelu_new(hidden) } else { relu(hidden) };
        let hidden = match &self.wi_1 {
            Some(gate) => hidden * gate.forward(x),
            None       => hidden,
        };
        self.wo.forward(self.dropout.forward(hidden))
    }
}

/// Tanh approximation of GELU
fn gelu_new<B: Backend, const D: usize>(x: Tensor<B, D>) -> Tensor<B, D> {
    let cube  = x.clone() * x.clone() * x.clone();
    let inner = (x.clone() + cube.mul_scalar(0.044715)).mul_scalar((2.0 / std::f64::consts::PI).sqrt());
    x.mul_scalar(0.5) * inner.tanh().add_scalar(1.0)
}

// ─── T5Block ──────────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct T5Block<B: Backend> {
    pub self_attention:       T5Attention<B>,
    pub self_attention_norm:  T5LayerNorm<B>,
    pub cross_attention:      Option<T5Attention<B>>,
    pub cross_attention_norm: Option<T5LayerNorm<B>>,
    pub feed_forward:         T5FeedForward<B>,
    pub feed_forward_norm:    T5LayerNorm<B>,
    pub dropout:              Dropout,
}

impl<B: Backend> T5Block<B> {
    pub fn forward(
        &self,
        x:         Tensor<B, 3>,
        self_bias: Tensor<B, 4>,
        encoder:   Option<(Tensor<B, 3>, Tensor<B, 4>)>,
    ) -> Tensor<B, 3> {
        let attn = self.self_attention.forward(self.self_attention_norm.forward(x.clone()), None, self_bias);
        let mut x = x + self.dropout.forward(attn);

        if let (Some(cross), Some(norm), Some((enc_hidden, cross_bias))) =
            (&self.cross_attention, &self.cross_attention_norm, encoder)
        {
            let attn = cross.forward(norm.forward(x.clone()), Some(enc_hidden), cross_bias);
            x = x + self.dropout.forward(attn);
        }

        let ff = self.feed_forward.forward(self.feed_forward_norm.forward(x.clone()));
        x + self.dropout.forward(ff)
    }

    pub fn with_lora(mut self, config: &LoraConfig, device: &B::Device) -> Self {
        self.self_attention  = self.self_attention.with_lora(config, device);
        self.cross_attention = self.cross_attention.map(|c| c.with_lora(config, device));
        self
    }

    pub fn adapter_params(&self) -> usize {
        self.self_attention.adapter_params()
            + self.cross_attention.as_ref().map_or(0, |c| c.adapter_params())
    }
}

// ─── T5Stack ──────────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct T5Stack<B: Backend> {
    pub blocks:           Vec<T5Block<B>>,
    pub final_layer_norm: T5LayerNorm<B>,
    pub dropout:          Dropout,
    pub num_heads:        usize,
    pub is_decoder:       bool,
}

impl<B: Backend> T5Stack<B> {
    /// embeds: [batch, len, d_model]
    /// mask:   [batch, 1, 1 or len, len] additive self-attention mask
    pub fn forward(
        &self,
        embeds:  Tensor<B, 3>,
        mask:    Tensor<B, 4>,
        encoder: Option<(Tensor<B, 3>, Tensor<B, 4>)>,
    ) -> Tensor<B, 3> {
        let device = embeds.device();
        let [batch_size, len, _] = embeds.dims();
        let full = [batch_size, self.num_heads, len, len];

        let position_bias = self
            .blocks
            .first()
            .and_then(|b| b.self_attention.compute_bias(len, len, &device))
            .unwrap_or_else(|| Tensor::zeros([1, self.num_heads, len, len], &device));
        let self_bias = position_bias.expand(full) + mask.expand(full);

        let mut x = self.dropout.forward(embeds);
        for block in &self.blocks {
            x = block.forward(x, self_bias.clone(), encoder.clone());
        }

        self.dropout.forward(self.final_layer_norm.forward(x))
    }
}

// ─── Masks ────────────────────────────────────────────────────────────────────
/// [batch, len] 1/0 mask → [batch, 1, 1, len] additive mask
fn padding_mask<B: Backend>(attention_mask: Tensor<B, 2, Int>) -> Tensor<B, 4> {
    let [batch_size, len] = attention_mask.dims();
    attention_mask
        .float()
        .neg()
        .add_scalar(1.0)
        .mul_scalar(MASK_VALUE)
        .reshape([batch_size, 1, 1, len])
}

/// [1, 1, len, len] additive mask hiding future positions
fn causal_mask<B: Backend>(len: usize, device: &B::Device) -> Tensor<B, 4> {
    let values: Vec<f32> = (0..len)
        .flat_map(|i| (0..len).map(move |j| if j > i { MASK_VALUE } else { 0.0 }))
        .collect();
    Tensor::from_data(TensorData::new(values, [1, 1, len, len]), device)
}

// ─── T5Model ──────────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct T5Model<B: Backend> {
    pub shared:  Embedding<B>,
    pub encoder: T5Stack<B>,
    pub decoder: T5Stack<B>,
    /// None when the output projection is tied to `shared`
    pub lm_head: Option<Linear<B>>,
    pub d_model: usize,
}

impl<B: Backend> T5Model<B> {
    /// input_ids, attention_mask: [batch, src_len] → [batch, src_len, d_model]
    pub fn encode(&self, input_ids: Tensor<B, 2, Int>, attention_mask: Tensor<B, 2, Int>) -> Tensor<B, 3> {
        let embeds = self.shared.forward(input_ids);
        self.encoder.forward(embeds, padding_mask(attention_mask), None)
    }

    /// decoder_input_ids: [batch, tgt_len] → logits [batch, tgt_len, vocab]
    pub fn decode(
        &self,
        decoder_input_ids: Tensor<B, 2, Int>,
        encoder_hidden:    Tensor<B, 3>,
        attention_mask:    Tensor<B, 2, Int>,
    ) -> Tensor<B, 3> {
        let device = encoder_hidden.device();
        let [batch_size, tgt_len] = decoder_input_ids.dims();
        let src_len = encoder_hidden.dims()[1];

        // Cross-attention has no position bias, only the padding mask
        let cross_bias = padding_mask(attention_mask)
            .expand([batch_size, self.decoder.num_heads, tgt_len, src_len]);

        let embeds = self.shared.forward(decoder_input_ids);
        let hidden = self.decoder.forward(
            embeds,
            causal_mask(tgt_len, &device),
            Some((encoder_hidden, cross_bias)),
        );

        self.project(hidden)
    }

    fn project(&self, hidden: Tensor<B, 3>) -> Tensor<B, 3> {
        match &self.lm_head {
            Some(head) => head.forward(hidden),
            None => {
                // Tied embeddings are rescaled by d_model^-0.5
                let hidden = hidden.mul_scalar((self.d_model as f64).powf(-0.5));
                hidden.matmul(self.shared.weight.val().transpose().unsqueeze())
            }
        }
    }

    pub fn forward(
        &self,
        input_ids:         Tensor<B, 2, Int>,
        attention_mask:    Tensor<B, 2, Int>,
        decoder_input_ids: Tensor<B, 2, Int>,
    ) -> Tensor<B, 3> {
        let encoder_hidden = self.encode(input_ids, attention_mask.clone());
        self.decode(decoder_input_ids, encoder_hidden, attention_mask)
    }

    /// Mean token cross-entropy over unmasked label positions
    pub fn forward_loss(&self, batch: Seq2SeqBatch<B>) -> (Tensor<B, 1>, Tensor<B, 3>) {
        let logits = self.forward(batch.input_ids, batch.attention_mask, batch.decoder_input_ids);
        let loss   = masked_cross_entropy(logits.clone(), batch.labels, batch.label_mask);
        (loss, logits)
    }

    /// Attach adapters to every targeted attention projection
    pub fn with_lora(mut self, config: &LoraConfig) -> Result<Self> {
        config.validate()?;
        let device = self.shared.weight.val().device();

        self.encoder.blocks = self.encoder.blocks.into_iter().map(|b| b.with_lora(config, &device)).collect();
        self.decoder.blocks = self.decoder.blocks.into_iter().map(|b| b.with_lora(config, &device)).collect();
        Ok(self)
    }

    /// Parameters that live in adapters, the only ones trained
    pub fn trainable_params(&self) -> usize {
        self.encoder
            .blocks
            .iter()
            .chain(&self.decoder.blocks)
            .map(|b| b.adapter_params())
            .sum()
    }
}

/// logits: [batch, len, vocab], labels: [batch, len], mask: [batch, len] of 0/1
pub fn masked_cross_entropy<B: Backend>(
    logits: Tensor<B, 3>,
    labels: Tensor<B, 2, Int>,
    mask:   Tensor<B, 2>,
) -> Tensor<B, 1> {
    let [batch_size, len, _] = logits.dims();

    let log_probs = log_softmax(logits, 2);
    let picked    = log_probs
        .gather(2, labels.reshape([batch_size, len, 1]))
        .reshape([batch_size, len]);

    let token_count = mask.clone().sum().clamp_min(1.0);
    (picked.neg() * mask).sum() / token_count
}
