// ============================================================
// Layer 5 — Adafactor Optimiser
// ============================================================
// Adafactor keeps only a factored estimate of the squared
// gradient and needs no learning rate schedule by default.
//
// Per parameter tensor p with gradient g, at step t:
//
//   ρ_t   = min(1e-2, 1/√t)             relative step size
//           (min(1e-6·t, 1/√t) with warm-up init)
//   α_t   = max(ε₂, RMS(p)) · ρ_t        scaled by parameter size
//   β₂_t  = 1 − t^(−0.8)
//   G     = g² + ε₁
//
//   matrices (rank ≥ 2), factored:
//     R_t = β₂_t R + (1−β₂_t) mean_cols(G)     [rows, 1]
//     C_t = β₂_t C + (1−β₂_t) mean_rows(G)     [1, cols]
//     V̂   = (R_t / mean(R_t)) · C_t
//   vectors:
//     V̂   = β₂_t V + (1−β₂_t) G
//
//   U     = g / √V̂
//   U     = U / max(1, RMS(U) / d)          update clipping
//   p     = p − α_t · U
//
// There is no first moment, so state per matrix is one row
// vector plus one column vector instead of a full copy of p.
//
// Passing an explicit learning rate turns off the relative
// step and the parameter scaling; the rate is then used as is.
//
// Reference: Shazeer & Stern (2018) Adafactor: Adaptive
//            Learning Rates with Sublinear Memory Cost
//            Burn Book §5 (Custom Optimizers)

use burn::{
    module::AutodiffModule,
    optim::{adaptor::OptimizerAdaptor, SimpleOptimizer},
    prelude::*,
    record::Record,
    tensor::backend::AutodiffBackend,
};

#[derive(Config, Debug)]
pub struct AdafactorConfig {
    /// Regulariser added to the squared gradient (ε₁)
    #[config(default = 1e-30)]
    pub eps_update: f64,
    /// Lower bound on the parameter RMS used for scaling (ε₂)
    #[config(default = 1e-3)]
    pub eps_scale: f64,
    /// Threshold d of the update RMS clipping
    #[config(default = 1.0)]
    pub clip_threshold: f64,
    /// Exponent of the β₂ schedule
    #[config(default = "-0.8")]
    pub decay_rate: f64,
    /// Derive the step size from the step count
    #[config(default = true)]
    pub relative_step: bool,
    /// Multiply the step size by RMS(p)
    #[config(default = true)]
    pub scale_parameter: bool,
    /// Ramp the relative step up linearly from 1e-6
    #[config(default = false)]
    pub warmup_init: bool,
}

impl AdafactorConfig {
    /// Config for a fixed learning rate, or relative steps when None
    pub fn for_learning_rate(learning_rate: Option<f64>) -> Self {
        let relative = learning_rate.is_none();
        Self::new()
            .with_relative_step(relative)
            .with_scale_parameter(relative)
    }

    pub fn init<B: AutodiffBackend, M: AutodiffModule<B>>(&self) -> OptimizerAdaptor<Adafactor, M, B> {
        OptimizerAdaptor::from(Adafactor {
            eps_update:      self.eps_update,
            eps_scale:       self.eps_scale,
            clip_threshold:  self.clip_threshold,
            decay_rate:      self.decay_rate,
            relative_step:   self.relative_step,
            scale_parameter: self.scale_parameter,
            warmup_init:     self.warmup_init,
        })
    }
}

#[derive(Clone)]
pub struct Adafactor {
    eps_update:      f64,
    eps_scale:       f64,
    clip_threshold:  f64,
    decay_rate:      f64,
    relative_step:   bool,
    scale_parameter: bool,
    warmup_init:     bool,
}

/// Second-moment state of one parameter tensor.
/// Matrices fill the row/col pair, vectors fill `exp_avg_sq`.
#[derive(Record, Clone)]
pub struct AdafactorState<B: Backend, const D: usize> {
    pub step:           usize,
    pub exp_avg_sq_row: Option<Tensor<B, D>>,
    pub exp_avg_sq_col: Option<Tensor<B, D>>,
    pub exp_avg_sq:     Option<Tensor<B, D>>,
}

/// Root mean square, reshaped to broadcast against rank D
fn rms<B: Backend, const D: usize>(x: Tensor<B, D>) -> Tensor<B, D> {
    x.powi_scalar(2).mean().sqrt().reshape([1usize; D])
}

/// β·old + (1−β)·new, or (1−β)·new on the first step
fn ema<B: Backend, const D: usize>(old: Option<Tensor<B, D>>, new: Tensor<B, D>, beta: f64) -> Tensor<B, D> {
    let fresh = new.mul_scalar(1.0 - beta);
    match old {
        Some(old) => old.mul_scalar(beta) + fresh,
        None      => fresh,
    }
}

impl Adafactor {
    fn relative_step_size(&self, t: f64) -> f64 {
        let min_step = if self.warmup_init { 1e-6 * t } else { 1e-2 };
        min_step.min(1.0 / t.sqrt())
    }
}

impl<B: Backend> SimpleOptimizer<B> for Adafactor {
    type State<const D: usize> = AdafactorState<B, D>;

    fn step<const D: usize>(
        &self,
        lr:     f64,
        tensor: Tensor<B, D>,
        grad:   Tensor<B, D>,
        state:  Option<Self::State<D>>,
    ) -> (Tensor<B, D>, Option<Self::State<D>>) {
        let dims = tensor.dims();
        let (prev_step, mut row, mut col, mut full) = match state {
            Some(s) => (s.step, s.exp_avg_sq_row, s.exp_avg_sq_col, s.exp_avg_sq),
            None    => (0, None, None, None),
        };

        let step = prev_step + 1;
        let t    = step as f64;

        // ── Step size ─────────────────────────────────────────────────────────
        let base_step = if self.relative_step { self.relative_step_size(t) } else { lr };
        let step_size = if self.scale_parameter {
            rms(tensor.clone()).clamp_min(self.eps_scale).mul_scalar(base_step)
        } else {
            Tensor::<B, D>::ones([1usize; D], &tensor.device()).mul_scalar(base_step)
        };

        let beta2t = 1.0 - t.powf(self.decay_rate);
        let sq     = grad.clone().powi_scalar(2).add_scalar(self.eps_update);

        // ── Second moment ─────────────────────────────────────────────────────
        let update = if D >= 2 {
            let r = ema(row.take(), sq.clone().mean_dim(D - 1), beta2t);
            let c = ema(col.take(), sq.mean_dim(D - 2), beta2t);

            let r_factor = (r.clone() / r.clone().mean_dim(D - 2)).sqrt().recip();
            let c_factor = c.clone().sqrt().recip();

            row = Some(r);
            col = Some(c);
            r_factor.expand(dims) * c_factor.expand(dims) * grad
        } else {
            let v = ema(full.take(), sq, beta2t);
            let update = v.clone().sqrt().recip() * grad;
            full = Some(v);
            update
        };

        // ── Clip and apply ────────────────────────────────────────────────────
        let clip   = rms(update.clone()).div_scalar(self.clip_threshold).clamp_min(1.0);
        let update = update / clip.expand(dims) * step_size.expand(dims);

        let state = AdafactorState {
            step,
            exp_avg_sq_row: row,
            exp_avg_sq_col: col,
            exp_avg_sq:     full,
        };

        (tensor - update, Some(state))
    }

    fn to_device<const D: usize>(mut state: Self::State<D>, device: &B::Device) -> Self::State<D> {
        state.exp_avg_sq_row = state.exp_avg_sq_row.map(|t| t.to_device(device));
        state.exp_avg_sq_col = state.exp_avg_sq_col.map(|t| t.to_device(device));
        state.exp_avg_sq     = state.exp_avg_sq.map(|t| t.to_device(device));
        state
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn optimiser() -> Adafactor {
        Adafactor {
            eps_update:      1e-30,
            eps_scale:       1e-3,
            clip_threshold:  1.0,
            decay_rate:      -0.8,
            relative_step:   true,
            scale_parameter: true,
            warmup_init:     false,
        }
    }

    /// loss = Σ (p − 1)², gradient = 2 (p − 1)
    fn quadratic<const D: usize>(p: &Tensor<TestBackend, D>) -> (f32, Tensor<TestBackend, D>) {
        let diff = p.clone().sub_scalar(1.0);
        let loss = diff.clone().powi_scalar(2).sum().into_scalar();
        (loss, diff.mul_scalar(2.0))
    }

    #[test]
    fn test_relative_step_schedule() {
        let opt = optimiser();
        assert_eq!(opt.relative_step_size(1.0), 1e-2);
        assert!((opt.relative_step_size(1e6) - 1e-3).abs() < 1e-12);

        let warm = Adafactor { warmup_init: true, ..optimiser() };
        assert!((warm.relative_step_size(10.0) - 1e-5).abs() < 1e-12);
    }

    #[test]
    fn test_reduces_quadratic_loss_for_matrix() {
        let device = Default::default();
        let opt    = optimiser();
        let mut p  = Tensor::<TestBackend, 2>::full([4, 3], 3.0, &device);
        let mut state = None;

        let (initial, _) = quadratic(&p);
        for _ in 0..50 {
            let (_, grad) = quadratic(&p);
            let (next, next_state) = SimpleOptimizer::<TestBackend>::step(&opt, 0.0, p, grad, state);
            p     = next;
            state = next_state;
        }
        let (last, _) = quadratic(&p);
        assert!(last < initial);
    }

    #[test]
    fn test_reduces_quadratic_loss_for_vector() {
        let device = Default::default();
        let opt    = optimiser();
        let mut p  = Tensor::<TestBackend, 1>::full([5], -2.0, &device);
        let mut state = None;

        let (initial, _) = quadratic(&p);
        for _ in 0..50 {
            let (_, grad) = quadratic(&p);
            let (next, next_state) = SimpleOptimizer::<TestBackend>::step(&opt, 0.0, p, grad, state);
            p     = next;
            state = next_state;
        }
        let (last, _) = quadratic(&p);
        assert!(last < initial);
    }

    #[test]
    fn test_matrix_state_is_factored() {
        let device = Default::default();
        let opt    = optimiser();
        let p      = Tensor::<TestBackend, 2>::full([4, 3], 3.0, &device);
        let (_, grad) = quadratic(&p);

        let (_, state) = SimpleOptimizer::<TestBackend>::step(&opt, 0.0, p, grad, None);
        let state = state.unwrap();
        assert_eq!(state.step, 1);
        assert_eq!(state.exp_avg_sq_row.unwrap().dims(), [4, 1]);
        assert_eq!(state.exp_avg_sq_col.unwrap().dims(), [1, 3]);
        assert!(state.exp_avg_sq.is_none());
    }

    #[test]
    fn test_vector_state_is_full() {
        let device = Default::default();
        let opt    = optimiser();
        let p      = Tensor::<TestBackend, 1>::full([5], 3.0, &device);
        let (_, grad) = quadratic(&p);

        let (_, state) = SimpleOptimizer::<TestBackend>::step(&opt, 0.0, p, grad, None);
        let state = state.unwrap();
        assert!(state.exp_avg_sq_row.is_none());
        assert_eq!(state.exp_avg_sq.unwrap().dims(), [5]);
    }

    #[test]
    fn test_explicit_learning_rate_is_used_as_is() {
        let cfg = AdafactorConfig::for_learning_rate(Some(1e-3));
        assert!(!cfg.relative_step && !cfg.scale_parameter);

        let opt = Adafactor {
            relative_step:   false,
            scale_parameter: false,
            ..optimiser()
        };
        let device = Default::default();
        let p      = Tensor::<TestBackend, 1>::full([4], 3.0, &device);
        let grad   = Tensor::<TestBackend, 1>::full([4], 1.0, &device);

        // uniform gradient → normalised update of exactly 1 per element
        let (next, _) = SimpleOptimizer::<TestBackend>::step(&opt, 0.1, p, grad, None);
        let values: Vec<f32> = next.into_data().iter::<f32>().collect();
        assert!(values.iter().all(|&v| (v - 2.9).abs() < 1e-5));
    }
}
