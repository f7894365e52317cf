// ============================================================
// Layer 5 — Low-Rank Adapters (LoRA)
// ============================================================
// A LoRA adapter adds a small trainable correction next to a
// frozen linear projection:
//
//     y = x W  +  (dropout(x) A B) · (alpha / r)
//
//   W : [d_in, d_out]  frozen pretrained weight
//   A : [d_in, r]      trainable, Kaiming-uniform init
//   B : [r, d_out]     trainable, zero init
//
// Because B starts at zero the adapted layer computes exactly
// the pretrained function on step 0. Only A and B receive
// gradients, so with r = 16 the trainable share of the model
// is well under 1%.
//
// Burn stores Linear weights as [d_in, d_out] (input first),
// so the adapter product is written x·A·B rather than B·A·x.
//
// Reference: Hu et al. (2021) LoRA: Low-Rank Adaptation of
//            Large Language Models
//            Burn Book §3 (Modules)

use anyhow::{bail, Result};
use burn::{
    module::Param,
    nn::{Dropout, DropoutConfig, Initializer, Linear},
    prelude::*,
};

/// Projections inside an attention block that can carry an adapter
pub const ADAPTABLE_PROJECTIONS: [&str; 4] = ["q", "k", "v", "o"];

// ─── LoraConfig ───────────────────────────────────────────────────────────────
#[derive(Config, Debug)]
pub struct LoraConfig {
    /// Projection names to adapt, e.g. ["q", "v"]
    pub target_modules: Vec<String>,
    /// Rank r of the low-rank update
    #[config(default = 16)]
    pub rank: usize,
    /// Scaling numerator; the update is multiplied by alpha / r
    #[config(default = 32.0)]
    pub alpha: f64,
    /// Dropout applied to the adapter input only
    #[config(default = 0.05)]
    pub dropout: f64,
}

impl LoraConfig {
    pub fn scaling(&self) -> f64 {
        self.alpha / self.rank as f64
    }

    pub fn targets(&self, projection: &str) -> bool {
        self.target_modules.iter().any(|t| t == projection)
    }

    /// Reject a zero rank and projection names no attention block has
    pub fn validate(&self) -> Result<()> {
        if self.rank == 0 {
            bail!("LoRA rank must be at least 1");
        }
        for target in &self.target_modules {
            if !ADAPTABLE_PROJECTIONS.contains(&target.as_str()) {
                bail!(
                    "Unknown LoRA target '{target}', expected one of {:?}",
                    ADAPTABLE_PROJECTIONS
                );
            }
        }
        Ok(())
    }

    /// Fresh adapter for a d_in → d_out projection
    pub fn init_adapter<B: Backend>(&self, d_in: usize, d_out: usize, device: &B::Device) -> LoraAdapter<B> {
        // kaiming_uniform(a = √5) reduces to U(-1/√fan_in, 1/√fan_in)
        let bound  = 1.0 / (d_in as f64).sqrt();
        let lora_a = Initializer::Uniform { min: -bound, max: bound }.init([d_in, self.rank], device);
        let lora_b = Initializer::Zeros.init([self.rank, d_out], device);

        LoraAdapter {
            lora_a,
            lora_b,
            dropout: DropoutConfig::new(self.dropout).init(),
            scaling: self.scaling(),
        }
    }
}

// ─── LoraAdapter ──────────────────────────────────────────────────────────────
#[derive(Module, Debug)]
pub struct LoraAdapter<B: Backend> {
    /// Down projection — shape: [d_in, r]
    pub lora_a:  Param<Tensor<B, 2>>,
    /// Up projection — shape: [r, d_out]
    pub lora_b:  Param<Tensor<B, 2>>,
    pub dropout: Dropout,
    pub scaling: f64,
}

impl<B: Backend> LoraAdapter<B> {
    /// [..., d_in] → [..., d_out]
    pub fn forward<const D: usize>(&self, x: Tensor<B, D>) -> Tensor<B, D> {
        self.dropout
            .forward(x)
            .matmul(self.lora_a.val().unsqueeze())
            .matmul(self.lora_b.val().unsqueeze())
            .mul_scalar(self.scaling)
    }
}

// ─── AdaptedLinear ────────────────────────────────────────────────────────────
/// A frozen projection with an optional adapter beside it.
#[derive(Module, Debug)]
pub struct AdaptedLinear<B: Backend> {
    pub base:    Linear<B>,
    pub adapter: Option<LoraAdapter<B>>,
}

impl<B: Backend> AdaptedLinear<B> {
    pub fn new(base: Linear<B>) -> Self {
        Self { base, adapter: None }
    }

    pub fn forward<const D: usize>(&self, x: Tensor<B, D>) -> Tensor<B, D> {
        match &self.adapter {
            Some(adapter) => self.base.forward(x.clone()) + adapter.forward(x),
            None          => self.base.forward(x),
        }
    }

    /// Attach a fresh adapter sized to the base weight
    pub fn attach(mut self, config: &LoraConfig, device: &B::Device) -> Self {
        let [d_in, d_out] = self.base.weight.val().dims();
        self.adapter = Some(config.init_adapter(d_in, d_out, device));
        self
    }

    /// Parameters living in the adapter, 0 when none is attached
    pub fn adapter_params(&self) -> usize {
        self.adapter.as_ref().map_or(0, |a| a.num_params())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::nn::LinearConfig;
    use burn::tensor::Distribution;

    type TestBackend = NdArray;

    fn config() -> LoraConfig {
        LoraConfig::new(vec!["q".to_string(), "v".to_string()])
    }

    fn max_abs_diff(a: Tensor<TestBackend, 3>, b: Tensor<TestBackend, 3>) -> f32 {
        (a - b).abs().max().into_scalar()
    }

    #[test]
    fn test_defaults() {
        let cfg = config();
        assert_eq!(cfg.rank, 16);
        assert_eq!(cfg.alpha, 32.0);
        assert_eq!(cfg.dropout, 0.05);
        assert_eq!(cfg.scaling(), 2.0);
        assert!(cfg.targets("q") && cfg.targets("v"));
        assert!(!cfg.targets("k"));
    }

    #[test]
    fn test_validate_rejects_bad_targets() {
        assert!(config().validate().is_ok());
        assert!(LoraConfig::new(vec!["wi".to_string()]).validate().is_err());
        assert!(config().with_rank(0).validate().is_err());
    }

    #[test]
    fn test_zero_initialised_adapter_keeps_output() {
        let device  = Default::default();
        let base    = LinearConfig::new(12, 10).with_bias(false).init::<TestBackend>(&device);
        let plain   = AdaptedLinear::new(base.clone());
        let adapted = AdaptedLinear::new(base).attach(&config().with_rank(4), &device);

        let x = Tensor::<TestBackend, 3>::random([2, 5, 12], Distribution::Default, &device);
        assert!(max_abs_diff(plain.forward(x.clone()), adapted.forward(x)) < 1e-6);
    }

    #[test]
    fn test_non_zero_adapter_changes_output() {
        let device  = Default::default();
        let base    = LinearConfig::new(12, 10).with_bias(false).init::<TestBackend>(&device);
        let plain   = AdaptedLinear::new(base.clone());
        let mut adapted = AdaptedLinear::new(base).attach(&config().with_rank(4).with_dropout(0.0), &device);

        if let Some(adapter) = adapted.adapter.as_mut() {
            adapter.lora_b = Param::from_tensor(Tensor::ones([4, 10], &device));
        }

        let x = Tensor::<TestBackend, 3>::random([2, 5, 12], Distribution::Default, &device);
        assert!(max_abs_diff(plain.forward(x.clone()), adapted.forward(x)) > 1e-4);
    }

    #[test]
    fn test_adapter_param_count() {
        let device  = Default::default();
        let base    = LinearConfig::new(12, 10).with_bias(false).init::<TestBackend>(&device);
        let adapted = AdaptedLinear::new(base).attach(&config().with_rank(4), &device);

        // r · (d_in + d_out)
        assert_eq!(adapted.adapter_params(), 4 * (12 + 10));
        assert_eq!(adapted.num_params(), 12 * 10 + 4 * (12 + 10));
    }
}
