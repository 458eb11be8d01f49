//! R-compatible Random Number Generator
//!
//! Implements R's Mersenne Twister with R's `set.seed()` scrambling, plus the
//! sampling primitives the pipeline needs: R's rejection-sampled
//! `R_unif_index`, sampling without replacement, permutation and weighted
//! sampling with replacement.
//!
//! A run owns exactly one master generator. Parallel stages never share it:
//! the master draws one child seed per task up front, sequentially, so the
//! result does not depend on how rayon schedules the tasks.

use crate::error::{PipelineError, Result};

/// R's Mersenne Twister RNG
///
/// Matches R's Mersenne-Twister as defined in RNG.c, including the LCG used
/// by `set.seed()` to fill the 624-word state.
#[derive(Debug, Clone)]
pub struct RMersenneTwister {
    state: [u32; 624],
    index: usize,
}

impl RMersenneTwister {
    const N: usize = 624;
    const M: usize = 397;
    const MATRIX_A: u32 = 0x9908B0DF;
    const UPPER_MASK: u32 = 0x80000000;
    const LOWER_MASK: u32 = 0x7FFFFFFF;
    const I2_32M1: f64 = 2.3283064365386963e-10;

    /// Create a new RNG with the same seed as R's set.seed()
    pub fn new(seed: u32) -> Self {
        let mut mt = RMersenneTwister {
            state: [0; Self::N],
            index: Self::N,
        };
        mt.r_init_seed(seed);
        mt
    }

    /// R's Setseed(): 50 LCG warm-up rounds, one value for the position
    /// word (discarded, reset to 624), then 624 state words
    fn r_init_seed(&mut self, seed: u32) {
        let mut r_i1: u32 = seed;

        for _ in 0..50 {
            r_i1 = r_i1.wrapping_mul(69069).wrapping_add(1);
        }

        r_i1 = r_i1.wrapping_mul(69069).wrapping_add(1);

        for i in 0..Self::N {
            r_i1 = r_i1.wrapping_mul(69069).wrapping_add(1);
            self.state[i] = r_i1;
        }

        self.index = Self::N;
    }

    /// Generate the next 624 words of the state array
    fn generate_numbers(&mut self) {
        for i in 0..Self::N {
            let y = (self.state[i] & Self::UPPER_MASK)
                  | (self.state[(i + 1) % Self::N] & Self::LOWER_MASK);
            self.state[i] = self.state[(i + Self::M) % Self::N] ^ (y >> 1);
            if y & 1 != 0 {
                self.state[i] ^= Self::MATRIX_A;
            }
        }
        self.index = 0;
    }

    /// Generate a random 32-bit integer
    pub fn next_u32(&mut self) -> u32 {
        if self.index >= Self::N {
            self.generate_numbers();
        }

        let mut y = self.state[self.index];
        self.index += 1;

        // Tempering
        y ^= y >> 11;
        y ^= (y << 7) & 0x9D2C5680;
        y ^= (y << 15) & 0xEFC60000;
        y ^= y >> 18;

        y
    }

    /// Uniform random number in (0, 1), with R's fixup away from 0 and 1
    pub fn runif(&mut self) -> f64 {
        let u = self.next_u32();
        let mut result = u as f64 * Self::I2_32M1;

        if result <= 0.0 {
            result = 0.5 * Self::I2_32M1;
        }
        if result >= 1.0 {
            result = 1.0 - 0.5 * Self::I2_32M1;
        }
        result
    }

    /// Standard normal via inversion, R's default normal kind
    pub fn rnorm(&mut self) -> f64 {
        let u = self.runif();
        qnorm(u)
    }

    /// Seed for a child generator owned by one parallel task
    pub fn child_seed(&mut self) -> u32 {
        self.next_u32()
    }

    /// `bits` random bits assembled 16 at a time (R's rbits)
    fn rbits(&mut self, bits: u32) -> u64 {
        let mut v: u64 = 0;
        let mut n = 0;
        while n <= bits {
            let v1 = (self.runif() * 65536.0).floor() as u64;
            v = v.wrapping_mul(65536).wrapping_add(v1);
            n += 16;
        }
        v & ((1u64 << bits) - 1)
    }

    /// Uniform integer in `0..n` by rejection sampling (R's R_unif_index,
    /// sample.kind = "Rejection")
    pub fn unif_index(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        let bits = (n as f64).log2().ceil() as u32;
        loop {
            let dv = self.rbits(bits);
            if (dv as usize) < n {
                return dv as usize;
            }
        }
    }

    /// Draw `k` distinct indices from `0..n` in draw order (R's sample(n, k))
    pub fn sample_without_replacement(&mut self, n: usize, k: usize) -> Vec<usize> {
        let k = k.min(n);
        let mut pool: Vec<usize> = (0..n).collect();
        let mut remaining = n;
        let mut out = Vec::with_capacity(k);
        for _ in 0..k {
            let j = self.unif_index(remaining);
            out.push(pool[j]);
            remaining -= 1;
            pool[j] = pool[remaining];
        }
        out
    }

    /// Shuffle a slice in place using a full R-style permutation
    pub fn shuffle<T: Clone>(&mut self, values: &mut [T]) {
        let order = self.sample_without_replacement(values.len(), values.len());
        let original = values.to_vec();
        for (slot, &src) in values.iter_mut().zip(order.iter()) {
            *slot = original[src].clone();
        }
    }
}

/// Sampling with replacement with probability proportional to weight.
///
/// Like R's ProbSampleReplace, categories are visited in descending weight
/// order (stable by index) over the cumulative distribution.
#[derive(Debug, Clone)]
pub struct WeightedSampler {
    order: Vec<usize>,
    cumulative: Vec<f64>,
}

impl WeightedSampler {
    /// Build a sampler. Weights must be finite and non-negative with a
    /// positive total.
    pub fn new(weights: &[f64]) -> Result<Self> {
        if let Some(w) = weights.iter().find(|w| !w.is_finite() || **w < 0.0) {
            return Err(PipelineError::InvalidInput {
                reason: format!("sampling weight {} is not a finite non-negative number", w),
            });
        }
        let total: f64 = weights.iter().sum();
        if total <= 0.0 {
            return Err(PipelineError::InvalidInput {
                reason: "sampling weights sum to zero".to_string(),
            });
        }

        let mut order: Vec<usize> = (0..weights.len()).collect();
        order.sort_by(|&a, &b| weights[b].total_cmp(&weights[a]));

        let mut cumulative = Vec::with_capacity(weights.len());
        let mut acc = 0.0;
        for &i in &order {
            acc += weights[i] / total;
            cumulative.push(acc);
        }

        Ok(Self { order, cumulative })
    }

    /// Draw one index
    pub fn draw(&self, rng: &mut RMersenneTwister) -> usize {
        let u = rng.runif();
        let pos = self
            .cumulative
            .partition_point(|&c| c < u)
            .min(self.order.len() - 1);
        self.order[pos]
    }

    /// Draw `n` indices with replacement
    pub fn draw_n(&self, rng: &mut RMersenneTwister, n: usize) -> Vec<usize> {
        (0..n).map(|_| self.draw(rng)).collect()
    }
}

/// Inverse normal CDF (quantile function)
///
/// Wichura's Algorithm AS 241, matching R's qnorm.c.
fn qnorm(p: f64) -> f64 {
    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }
    if p.is_nan() {
        return f64::NAN;
    }

    fn horner(coeffs: &[f64], x: f64) -> f64 {
        let mut result = coeffs[coeffs.len() - 1];
        for i in (0..coeffs.len() - 1).rev() {
            result = result * x + coeffs[i];
        }
        result
    }

    const A: [f64; 8] = [
        3.3871328727963666080e0,
        1.3314166789178437745e2,
        1.9715909503065514427e3,
        1.3731693765509461125e4,
        4.5921953931549871457e4,
        6.7265770927008700853e4,
        3.3430575583588128105e4,
        2.5090809287301226727e3,
    ];
    const B: [f64; 8] = [
        1.0,
        4.2313330701600911252e1,
        6.8718700749205790830e2,
        5.3941960214247511077e3,
        2.1213794301586595867e4,
        3.9307895800092710610e4,
        2.8729085735721942674e4,
        5.2264952788528545610e3,
    ];
    const C: [f64; 8] = [
        1.42343711074968357734e0,
        4.63033784615654529590e0,
        5.76949722146069140550e0,
        3.64784832476320460504e0,
        1.27045825245236838258e0,
        2.41780725177450611770e-1,
        2.27238260553211220900e-2,
        7.74545014427727025900e-4,
    ];
    const D: [f64; 8] = [
        1.0,
        2.05319162663775882187e0,
        1.67638483018380162246e0,
        6.89767334985100004550e-1,
        1.48103976427480074590e-1,
        1.51986665636164571966e-2,
        5.47593808499534494600e-4,
        1.05075007164441684324e-9,
    ];
    const E: [f64; 8] = [
        6.65790464350110377720e0,
        5.46378491116411436990e0,
        1.78482653991729133580e0,
        2.96560571828504891230e-1,
        2.65321895265761230930e-2,
        1.24266094738807843860e-3,
        2.71155556874348757815e-5,
        2.01033439929228813265e-7,
    ];
    const F: [f64; 8] = [
        1.0,
        5.99832206555887937690e-1,
        1.36929880922735805310e-1,
        1.48753612908506508198e-2,
        7.86869131145613259100e-4,
        1.84631831751005468180e-5,
        1.42151175831644588870e-7,
        2.04426310338993978564e-15,
    ];

    let q = p - 0.5;

    if q.abs() <= 0.425 {
        let r = 0.180625 - q * q;
        q * horner(&A, r) / horner(&B, r)
    } else {
        let r = if q < 0.0 { p } else { 1.0 - p };
        let r = (-r.ln()).sqrt();

        let val = if r <= 5.0 {
            let r = r - 1.6;
            horner(&C, r) / horner(&D, r)
        } else {
            let r = r - 5.0;
            horner(&E, r) / horner(&F, r)
        };

        if q < 0.0 { -val } else { val }
    }
}
