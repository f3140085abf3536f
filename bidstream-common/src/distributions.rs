//! Statistical distributions for synthetic attribute generation
//!
//! Provides the sampling primitives used by:
//! - Delay generation (bounded exponential for win/click delays)
//! - Price and identifier generation (bounded exponential, uniform)
//! - Categorical choices such as device type (weighted choice)
//! - Poisson arrivals (exponential inter-arrival times)

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution as RandDistribution, Exp, Exp1, Uniform};

/// Maximum draws a bounded distribution makes before falling back to its maximum
pub const MAX_SAMPLE_ATTEMPTS: usize = 10;

/// Trait for all scalar distributions
pub trait Distribution: Send {
    /// Sample a value from this distribution
    fn sample(&mut self) -> f64;

    /// Get distribution name
    fn name(&self) -> &'static str;
}

fn make_rng(seed: Option<u64>) -> SmallRng {
    match seed {
        Some(s) => SmallRng::seed_from_u64(s),
        None => SmallRng::from_os_rng(),
    }
}

/// Exponential distribution skewed toward small values with a hard upper bound
///
/// Each draw is `Exp(1) * max / skew`, so the mean is `max / skew` and a larger
/// skew concentrates samples near zero. Draws above the bound are rejected and
/// retried up to [`MAX_SAMPLE_ATTEMPTS`] times; if none lands in range the
/// maximum itself is returned. Samples therefore always lie in `[0, max]`.
///
/// ```
/// use bidstream_common::BoundedExponentialDistribution;
///
/// let mut dist = BoundedExponentialDistribution::with_seed(100.0, 300.0, Some(7)).unwrap();
/// let delay = dist.sample_bounded();
/// assert!((0.0..=300.0).contains(&delay));
/// ```
#[derive(Debug, Clone)]
pub struct BoundedExponentialDistribution {
    skew: f64,
    max: f64,
    rng: SmallRng,
}

impl BoundedExponentialDistribution {
    /// Create a new bounded exponential distribution with entropy-based seed
    pub fn new(skew: f64, max: f64) -> anyhow::Result<Self> {
        Self::with_seed(skew, max, None)
    }

    /// Create a new bounded exponential distribution with explicit seed
    pub fn with_seed(skew: f64, max: f64, seed: Option<u64>) -> anyhow::Result<Self> {
        if !(skew.is_finite() && skew > 0.0) {
            anyhow::bail!("Bounded exponential skew must be finite and > 0, got {skew}");
        }
        if !(max.is_finite() && max > 0.0) {
            anyhow::bail!("Bounded exponential max must be finite and > 0, got {max}");
        }

        Ok(Self { skew, max, rng: make_rng(seed) })
    }

    /// Sample in `[0, max]` using the configured maximum
    pub fn sample_bounded(&mut self) -> f64 {
        self.sample_up_to(self.max)
    }

    /// Sample in `[0, max]` for an explicit maximum, keeping the configured skew
    ///
    /// Used when one skew parameter drives several ranges (table indexes of
    /// different lengths, for instance).
    pub fn sample_up_to(&mut self, max: f64) -> f64 {
        for _ in 0..MAX_SAMPLE_ATTEMPTS {
            let unit: f64 = Exp1.sample(&mut self.rng);
            let draw = unit * max / self.skew;
            if draw <= max {
                return draw;
            }
        }
        max
    }

    /// Sample an index into a table of `len` entries
    ///
    /// The fallback value equals `len` itself, so the result is clamped to the
    /// last valid index.
    pub fn sample_index(&mut self, len: usize) -> usize {
        let draw = self.sample_up_to(len as f64).floor() as usize;
        draw.min(len.saturating_sub(1))
    }

    pub fn skew(&self) -> f64 {
        self.skew
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}

impl Distribution for BoundedExponentialDistribution {
    fn sample(&mut self) -> f64 {
        self.sample_bounded()
    }

    fn name(&self) -> &'static str {
        "BoundedExponential"
    }
}

/// Exponential distribution (Poisson inter-arrival times)
pub struct ExponentialDistribution {
    lambda: f64,
    rng: SmallRng,
    dist: Exp<f64>,
}

impl ExponentialDistribution {
    pub fn new(lambda: f64) -> anyhow::Result<Self> {
        Self::with_seed(lambda, None)
    }

    pub fn with_seed(lambda: f64, seed: Option<u64>) -> anyhow::Result<Self> {
        if lambda <= 0.0 {
            anyhow::bail!("Exponential lambda must be > 0");
        }

        let dist = Exp::new(lambda)?;
        Ok(Self { lambda, rng: make_rng(seed), dist })
    }

    pub fn sample_inter_arrival(&mut self) -> f64 {
        self.dist.sample(&mut self.rng)
    }

    pub fn lambda(&self) -> f64 {
        self.lambda
    }
}

impl Distribution for ExponentialDistribution {
    fn sample(&mut self) -> f64 {
        self.dist.sample(&mut self.rng)
    }

    fn name(&self) -> &'static str {
        "Exponential"
    }
}

/// Uniform distribution over `[min, max)`
pub struct UniformDistribution {
    min: f64,
    max: f64,
    rng: SmallRng,
    dist: Uniform<f64>,
}

impl UniformDistribution {
    pub fn new(min: f64, max: f64) -> anyhow::Result<Self> {
        Self::with_seed(min, max, None)
    }

    pub fn with_seed(min: f64, max: f64, seed: Option<u64>) -> anyhow::Result<Self> {
        if min >= max {
            anyhow::bail!("Uniform min must be < max");
        }

        let dist = Uniform::new(min, max)?;
        Ok(Self { min, max, rng: make_rng(seed), dist })
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}

impl Distribution for UniformDistribution {
    fn sample(&mut self) -> f64 {
        self.dist.sample(&mut self.rng)
    }

    fn name(&self) -> &'static str {
        "Uniform"
    }
}

/// Categorical choice over a normalized cumulative weight table
///
/// A uniform draw in `[0, 1)` is located in the cumulative table with a binary
/// search. Rounding can leave the final cumulative entry fractionally below
/// the draw, in which case the last choice is returned.
pub struct WeightedChoice<T> {
    choices: Vec<T>,
    cumulative: Vec<f64>,
    rng: SmallRng,
}

impl<T> WeightedChoice<T> {
    /// Create a weighted choice with entropy-based seed
    pub fn new(weighted: Vec<(T, f64)>) -> anyhow::Result<Self> {
        Self::with_seed(weighted, None)
    }

    /// Create a weighted choice with explicit seed
    pub fn with_seed(weighted: Vec<(T, f64)>, seed: Option<u64>) -> anyhow::Result<Self> {
        if weighted.is_empty() {
            anyhow::bail!("WeightedChoice requires at least one choice");
        }

        let mut total = 0.0;
        for (i, (_, weight)) in weighted.iter().enumerate() {
            if !weight.is_finite() || *weight < 0.0 {
                anyhow::bail!("Weight {} is invalid: {}", i, weight);
            }
            total += weight;
        }
        if total <= 0.0 {
            anyhow::bail!("All weights are zero");
        }

        let mut choices = Vec::with_capacity(weighted.len());
        let mut cumulative = Vec::with_capacity(weighted.len());
        let mut running = 0.0;
        for (choice, weight) in weighted {
            running += weight / total;
            choices.push(choice);
            cumulative.push(running);
        }
        if let Some(last) = cumulative.last_mut() {
            *last = 1.0;
        }

        Ok(Self { choices, cumulative, rng: make_rng(seed) })
    }

    /// Pick one choice according to its weight
    pub fn choose(&mut self) -> &T {
        let u: f64 = self.rng.random();
        &self.choices[self.index_for(u)]
    }

    fn index_for(&self, u: f64) -> usize {
        let idx = self.cumulative.partition_point(|&c| c <= u);
        idx.min(self.choices.len() - 1)
    }

    pub fn len(&self) -> usize {
        self.choices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.choices.is_empty()
    }
}
