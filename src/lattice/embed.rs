//! Feature embedding into the permutohedral lattice.
//!
//! A D-dimensional feature `f` is elevated onto the hyperplane
//! `Σ y = 0` in D+1 dimensions (`y = E·f`, with `E` scaled so that the
//! lattice approximates a unit-bandwidth Gaussian). The enclosing simplex is
//! found by rounding to the nearest 0-colored lattice point and sorting the
//! residuals; its D+1 corners and barycentric weights form the splat
//! address of the point.
//!
//! Rank ties: when two residuals compare equal the coordinate with the
//! larger index receives the higher rank. The rule is arbitrary but fixed,
//! so identical inputs always land on identical simplices.
//!
//! Complexity: O(D²) per point for the pairwise ranking, O(D²) for the
//! corner keys.

/// Bound on elevated coordinates. Below it f32 keeps an eighth of a lattice
/// step of residual precision and the integer keys, with their neighbour
/// shifts, stay far inside i32.
pub const MAX_ELEVATED: f32 = (1u32 << 20) as f32;

/// Precomputed per-dimension tables for one feature dimensionality.
#[derive(Clone, Debug)]
pub struct Embedder {
    dim: usize,
    scale: Vec<f32>,
    /// `(D+1) × (D+1)` canonical simplex, row = remainder, col = rank.
    canonical: Vec<i32>,
}

/// Reusable per-thread buffers for [`Embedder::embed_into`].
#[derive(Clone, Debug)]
pub struct EmbedScratch {
    elevated: Vec<f32>,
    rem0: Vec<i32>,
    rank: Vec<i32>,
    barycentric: Vec<f32>,
}

impl EmbedScratch {
    pub fn new(dim: usize) -> Self {
        Self {
            elevated: vec![0.0; dim + 1],
            rem0: vec![0; dim + 1],
            rank: vec![0; dim + 1],
            barycentric: vec![0.0; dim + 2],
        }
    }
}

/// Splat address of a single feature vector.
#[derive(Clone, Debug, PartialEq)]
pub struct SimplexEmbedding {
    /// `(D+1) × (D+1)` lattice keys, one row per simplex corner.
    pub keys: Vec<i32>,
    /// Barycentric weight of each corner; sums to 1.
    pub weights: Vec<f32>,
}

impl SimplexEmbedding {
    pub fn corners(&self) -> usize {
        self.weights.len()
    }

    pub fn key(&self, corner: usize) -> &[i32] {
        let n = self.corners();
        &self.keys[corner * n..(corner + 1) * n]
    }
}

impl Embedder {
    pub fn new(dim: usize) -> Self {
        let d1 = dim + 1;
        let mut canonical = vec![0i32; d1 * d1];
        for i in 0..d1 {
            for j in 0..d1 {
                canonical[i * d1 + j] = if j + i <= dim {
                    i as i32
                } else {
                    i as i32 - d1 as i32
                };
            }
        }

        // Expected standard deviation of the lattice filter; the diagonal of E
        // is rescaled so that unit feature distance means unit kernel bandwidth.
        let inv_std_dev = (2.0f32 / 3.0).sqrt() * d1 as f32;
        let scale = (0..dim)
            .map(|i| inv_std_dev / (((i + 2) * (i + 1)) as f32).sqrt())
            .collect();

        Self {
            dim,
            scale,
            canonical,
        }
    }

    #[inline]
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of simplex corners (and key length): D+1.
    #[inline]
    pub fn corners(&self) -> usize {
        self.dim + 1
    }

    /// Largest absolute elevated coordinate of `feature`.
    ///
    /// Features are only embeddable while this stays within
    /// [`MAX_ELEVATED`].
    pub fn elevated_magnitude(&self, feature: &[f32], scratch: &mut EmbedScratch) -> f32 {
        self.elevate(feature, &mut scratch.elevated);
        scratch
            .elevated
            .iter()
            .fold(0.0f32, |m, &v| m.max(v.abs()))
    }

    /// Running sum from the last dimension backwards.
    fn elevate(&self, feature: &[f32], elevated: &mut [f32]) {
        let d = self.dim;
        let mut sm = 0.0f32;
        for j in (1..=d).rev() {
            let cf = feature[j - 1] * self.scale[j - 1];
            elevated[j] = sm - j as f32 * cf;
            sm += cf;
        }
        elevated[0] = sm;
    }

    /// Embed one feature vector, allocating the result.
    pub fn embed(&self, feature: &[f32]) -> SimplexEmbedding {
        let d1 = self.corners();
        let mut out = SimplexEmbedding {
            keys: vec![0; d1 * d1],
            weights: vec![0.0; d1],
        };
        let mut scratch = EmbedScratch::new(self.dim);
        self.embed_into(feature, &mut scratch, &mut out.keys, &mut out.weights);
        out
    }

    /// Embed one feature vector into caller-provided buffers.
    ///
    /// `keys` receives `(D+1)²` integers (corner-major), `weights` D+1 values.
    pub fn embed_into(
        &self,
        feature: &[f32],
        scratch: &mut EmbedScratch,
        keys: &mut [i32],
        weights: &mut [f32],
    ) {
        let d = self.dim;
        let d1 = d + 1;
        debug_assert_eq!(feature.len(), d);
        debug_assert_eq!(keys.len(), d1 * d1);
        debug_assert_eq!(weights.len(), d1);

        let EmbedScratch {
            elevated,
            rem0,
            rank,
            barycentric,
        } = scratch;

        self.elevate(feature, elevated);

        // Nearest 0-colored lattice point.
        let down = 1.0 / d1 as f32;
        let mut sum = 0i32;
        for i in 0..d1 {
            let rd = (down * elevated[i]).round() as i32;
            rem0[i] = rd * d1 as i32;
            sum += rd;
        }

        // Rank residuals by pairwise comparison.
        rank.fill(0);
        for i in 0..d {
            let di = elevated[i] - rem0[i] as f32;
            for j in (i + 1)..d1 {
                if di < elevated[j] - rem0[j] as f32 {
                    rank[i] += 1;
                } else {
                    rank[j] += 1;
                }
            }
        }

        // Bring the point back onto the plane when the rounding sum is off.
        for i in 0..d1 {
            rank[i] += sum;
            if rank[i] < 0 {
                rank[i] += d1 as i32;
                rem0[i] += d1 as i32;
            } else if rank[i] > d as i32 {
                rank[i] -= d1 as i32;
                rem0[i] -= d1 as i32;
            }
        }

        barycentric.fill(0.0);
        for i in 0..d1 {
            let v = (elevated[i] - rem0[i] as f32) * down;
            let r = rank[i] as usize;
            barycentric[d - r] += v;
            barycentric[d - r + 1] -= v;
        }
        // Wrap-around folds into the first corner.
        barycentric[0] += 1.0 + barycentric[d1];

        for remainder in 0..d1 {
            let row = &self.canonical[remainder * d1..(remainder + 1) * d1];
            let key = &mut keys[remainder * d1..(remainder + 1) * d1];
            for i in 0..d1 {
                key[i] = rem0[i] + row[rank[i] as usize];
            }
            weights[remainder] = barycentric[remainder];
        }
    }
}
