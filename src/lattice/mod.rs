//! Permutohedral lattice: sparse high-dimensional Gaussian filtering.
//!
//! Overview
//! - [`Lattice::new`] embeds every feature vector (see [`embed`]) and
//!   registers the D+1 corners of its enclosing simplex in a
//!   [`registry::VertexRegistry`], recording one `(vertex, weight)` binding
//!   per corner. Once every point is registered, the two blur neighbours of
//!   each vertex along each of the D+1 lattice axes are resolved.
//! - [`Lattice::compute`] filters a per-point value matrix in three passes:
//!   splat (scatter weighted values onto vertices), blur (a `[1 2 1]/2`
//!   kernel along each axis, ping-ponging two buffers), slice (gather
//!   interpolated values back to points).
//! - Source and target point ranges may differ, which lets a single lattice
//!   built over the union of two feature sets filter one set onto the other.
//!
//! Cost: construction O(N·D²) plus amortized O(1) per registry access;
//! filtering O((N + M)·D·C) time and O(M·C) memory for M vertices and C
//! channels.

pub mod embed;
pub mod registry;

use crate::error::CrfError;
use crate::matrix::RowMatrix;
use crate::parallel::ParallelOptions;
use embed::{EmbedScratch, Embedder, MAX_ELEVATED};
use log::debug;
use registry::VertexRegistry;
use serde::Serialize;
use std::ops::Range;
use std::time::Instant;

/// Points embedded per batch before their corners are registered.
const EMBED_CHUNK: usize = 4096;

/// Buffer slots of the two blur neighbours of a vertex along one axis.
/// Slot 0 is the always-zero guard row standing in for a missing vertex.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Neighbors {
    lo: usize,
    hi: usize,
}

/// Summary of a built lattice.
#[derive(Clone, Copy, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LatticeStats {
    pub points: usize,
    pub dim: usize,
    pub vertices: usize,
    pub build_ms: f64,
}

#[derive(Clone, Debug)]
pub struct Lattice {
    dim: usize,
    points: usize,
    vertices: usize,
    /// Vertex id of each corner, `points × (dim + 1)`.
    offsets: Vec<usize>,
    /// Barycentric weight of each corner, `points × (dim + 1)`.
    weights: Vec<f32>,
    /// Blur neighbours, axis-major: `(dim + 1) × vertices`.
    neighbors: Vec<Neighbors>,
    parallel: ParallelOptions,
    build_ms: f64,
}

/// Scratch value buffers for [`Lattice::compute_with`].
///
/// Each buffer has `vertices + 2` rows; row 0 and the last row stay zero.
/// Reusing one workspace across calls avoids per-call allocation.
#[derive(Clone, Debug, Default)]
pub struct LatticeWorkspace {
    values: Vec<f32>,
    blurred: Vec<f32>,
}

impl LatticeWorkspace {
    pub fn new() -> Self {
        Self::default()
    }

    fn reset(&mut self, len: usize) {
        for buf in [&mut self.values, &mut self.blurred] {
            buf.clear();
            buf.resize(len, 0.0);
        }
    }
}

impl Lattice {
    /// Build a lattice over `features` (`N × D`, one row per point).
    pub fn new(features: &RowMatrix) -> Result<Self, CrfError> {
        Self::with_parallel(features, ParallelOptions::default())
    }

    pub fn with_parallel(
        features: &RowMatrix,
        parallel: ParallelOptions,
    ) -> Result<Self, CrfError> {
        validate_features(features)?;
        let start = Instant::now();
        let n = features.rows;
        let dim = features.cols;
        let d1 = dim + 1;
        let embedder = Embedder::new(dim);
        check_feature_range(&embedder, features)?;

        let mut registry = VertexRegistry::with_capacity(d1, n * d1 / 24);
        let mut offsets = vec![0usize; n * d1];
        let mut weights = vec![0.0f32; n * d1];
        let mut chunk_keys = vec![0i32; EMBED_CHUNK.min(n) * d1 * d1];

        for chunk_start in (0..n).step_by(EMBED_CHUNK) {
            let chunk = chunk_start..(chunk_start + EMBED_CHUNK).min(n);
            let len = chunk.len();
            let keys = &mut chunk_keys[..len * d1 * d1];
            embed_chunk(
                &embedder,
                features,
                chunk.clone(),
                keys,
                &mut weights[chunk.start * d1..chunk.end * d1],
                parallel,
            );
            // Registration stays sequential and in point order so vertex ids
            // do not depend on the execution mode.
            let point_offsets = &mut offsets[chunk.start * d1..chunk.end * d1];
            for (slot, key) in point_offsets.iter_mut().zip(keys.chunks_exact(d1)) {
                *slot = registry.insert(key);
            }
        }

        let vertices = registry.len();
        let neighbors = resolve_neighbors(&registry, dim, parallel);
        let build_ms = start.elapsed().as_secs_f64() * 1000.0;
        debug!(
            "Lattice::new points={} dim={} vertices={} in {:.3} ms",
            n, dim, vertices, build_ms
        );

        Ok(Self {
            dim,
            points: n,
            vertices,
            offsets,
            weights,
            neighbors,
            parallel,
            build_ms,
        })
    }

    #[inline]
    pub fn dim(&self) -> usize {
        self.dim
    }

    #[inline]
    pub fn points(&self) -> usize {
        self.points
    }

    /// Number of distinct lattice vertices M.
    #[inline]
    pub fn vertices(&self) -> usize {
        self.vertices
    }

    pub fn stats(&self) -> LatticeStats {
        LatticeStats {
            points: self.points,
            dim: self.dim,
            vertices: self.vertices,
            build_ms: self.build_ms,
        }
    }

    /// Vertex ids of the D+1 simplex corners of `point`.
    pub fn point_vertices(&self, point: usize) -> &[usize] {
        let d1 = self.dim + 1;
        &self.offsets[point * d1..(point + 1) * d1]
    }

    /// Barycentric weights matching [`Lattice::point_vertices`].
    pub fn point_weights(&self, point: usize) -> &[f32] {
        let d1 = self.dim + 1;
        &self.weights[point * d1..(point + 1) * d1]
    }

    /// Filter `input` (`N × C`) over every point into a fresh `N × C` matrix.
    pub fn compute(&self, input: &RowMatrix) -> Result<RowMatrix, CrfError> {
        let mut output = RowMatrix::new(self.points, input.cols);
        let mut workspace = LatticeWorkspace::new();
        self.compute_with(
            input,
            &mut output,
            0..self.points,
            0..self.points,
            &mut workspace,
        )?;
        Ok(output)
    }

    /// Splat `input` rows onto the `source` points, blur, and slice the
    /// `target` points into `output`.
    ///
    /// `input` must be `source.len() × C` and `output` `target.len() × C`;
    /// `output` is overwritten.
    pub fn compute_with(
        &self,
        input: &RowMatrix,
        output: &mut RowMatrix,
        source: Range<usize>,
        target: Range<usize>,
        workspace: &mut LatticeWorkspace,
    ) -> Result<(), CrfError> {
        self.check_range(&source)?;
        self.check_range(&target)?;
        input.ensure_shape("lattice input", source.len(), input.cols)?;
        output.ensure_shape("lattice output", target.len(), input.cols)?;
        self.run(input, output, source, target, workspace);
        Ok(())
    }

    /// Filtering core; shapes and ranges are validated by the caller.
    pub(crate) fn run(
        &self,
        input: &RowMatrix,
        output: &mut RowMatrix,
        source: Range<usize>,
        target: Range<usize>,
        workspace: &mut LatticeWorkspace,
    ) {
        let channels = input.cols;
        debug_assert_eq!(output.cols, channels);
        debug_assert_eq!(input.rows, source.len());
        debug_assert_eq!(output.rows, target.len());
        if channels == 0 {
            return;
        }
        workspace.reset((self.vertices + 2) * channels);

        self.splat(input, source, &mut workspace.values, channels);
        for axis in 0..=self.dim {
            self.blur_axis(axis, &workspace.values, &mut workspace.blurred, channels);
            std::mem::swap(&mut workspace.values, &mut workspace.blurred);
        }
        self.slice(&workspace.values, output, target, channels);
    }

    fn check_range(&self, range: &Range<usize>) -> Result<(), CrfError> {
        if range.start > range.end || range.end > self.points {
            return Err(CrfError::RangeOutOfBounds {
                start: range.start,
                end: range.end,
                points: self.points,
            });
        }
        Ok(())
    }

    // Sequential on purpose: points sharing a vertex write the same row.
    fn splat(&self, input: &RowMatrix, source: Range<usize>, values: &mut [f32], channels: usize) {
        for (row, point) in input.rows().zip(source) {
            for (&vertex, &w) in self
                .point_vertices(point)
                .iter()
                .zip(self.point_weights(point))
            {
                let slot = (vertex + 1) * channels;
                for (acc, &v) in values[slot..slot + channels].iter_mut().zip(row) {
                    *acc += w * v;
                }
            }
        }
    }

    fn blur_axis(&self, axis: usize, old: &[f32], new: &mut [f32], channels: usize) {
        let neighbors = &self.neighbors[axis * self.vertices..(axis + 1) * self.vertices];
        let rows = &mut new[channels..(self.vertices + 1) * channels];

        let blur_row = |i: usize, dst: &mut [f32]| {
            let nb = neighbors[i];
            let center = &old[(i + 1) * channels..(i + 2) * channels];
            let lo = &old[nb.lo * channels..(nb.lo + 1) * channels];
            let hi = &old[nb.hi * channels..(nb.hi + 1) * channels];
            for k in 0..channels {
                dst[k] = center[k] + 0.5 * (lo[k] + hi[k]);
            }
        };

        if self.parallel.should_parallelize(self.vertices) {
            #[cfg(feature = "parallel")]
            {
                use rayon::prelude::*;
                rows.par_chunks_mut(channels)
                    .enumerate()
                    .for_each(|(i, dst)| blur_row(i, dst));
                return;
            }
        }
        for (i, dst) in rows.chunks_exact_mut(channels).enumerate() {
            blur_row(i, dst);
        }
    }

    fn slice(&self, values: &[f32], output: &mut RowMatrix, target: Range<usize>, channels: usize) {
        // Corrects the self-contribution accumulated over D+1 blur passes.
        let alpha = 1.0 / (1.0 + 2.0f32.powi(-(self.dim as i32)));
        let offset = target.start;

        let slice_row = |i: usize, dst: &mut [f32]| {
            let point = offset + i;
            dst.fill(0.0);
            for (&vertex, &w) in self
                .point_vertices(point)
                .iter()
                .zip(self.point_weights(point))
            {
                let slot = (vertex + 1) * channels;
                for (out, &v) in dst.iter_mut().zip(&values[slot..slot + channels]) {
                    *out += w * v * alpha;
                }
            }
        };

        if self.parallel.should_parallelize(target.len()) {
            #[cfg(feature = "parallel")]
            {
                use rayon::prelude::*;
                output
                    .data
                    .par_chunks_mut(channels)
                    .enumerate()
                    .for_each(|(i, dst)| slice_row(i, dst));
                return;
            }
        }
        for (i, dst) in output.data.chunks_exact_mut(channels).enumerate() {
            slice_row(i, dst);
        }
    }
}

fn validate_features(features: &RowMatrix) -> Result<(), CrfError> {
    if features.rows == 0 {
        return Err(CrfError::EmptyFeatures);
    }
    if features.cols == 0 {
        return Err(CrfError::ZeroFeatureDimension);
    }
    for (point, row) in features.rows().enumerate() {
        if let Some(dim) = row.iter().position(|v| !v.is_finite()) {
            return Err(CrfError::NonFiniteFeature { point, dim });
        }
    }
    Ok(())
}

fn check_feature_range(embedder: &Embedder, features: &RowMatrix) -> Result<(), CrfError> {
    let mut scratch = EmbedScratch::new(embedder.dim());
    for (point, row) in features.rows().enumerate() {
        if embedder.elevated_magnitude(row, &mut scratch) > MAX_ELEVATED {
            return Err(CrfError::FeatureOutOfRange {
                point,
                limit: MAX_ELEVATED,
            });
        }
    }
    Ok(())
}

fn embed_chunk(
    embedder: &Embedder,
    features: &RowMatrix,
    chunk: Range<usize>,
    keys: &mut [i32],
    weights: &mut [f32],
    parallel: ParallelOptions,
) {
    let d1 = embedder.corners();
    let first = chunk.start;

    if parallel.should_parallelize(chunk.len()) {
        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            keys.par_chunks_mut(d1 * d1)
                .zip(weights.par_chunks_mut(d1))
                .enumerate()
                .for_each_init(
                    || EmbedScratch::new(embedder.dim()),
                    |scratch, (i, (k, w))| {
                        embedder.embed_into(features.row(first + i), scratch, k, w)
                    },
                );
            return;
        }
    }

    let mut scratch = EmbedScratch::new(embedder.dim());
    for (i, (k, w)) in keys
        .chunks_exact_mut(d1 * d1)
        .zip(weights.chunks_exact_mut(d1))
        .enumerate()
    {
        embedder.embed_into(features.row(first + i), &mut scratch, k, w);
    }
}

/// For each axis `j`, the neighbours of a vertex are the keys shifted by
/// `+D` on axis `j` and `-1` elsewhere, and the opposite shift.
fn resolve_neighbors(
    registry: &VertexRegistry,
    dim: usize,
    parallel: ParallelOptions,
) -> Vec<Neighbors> {
    let d1 = dim + 1;
    let m = registry.len();
    let mut neighbors = vec![Neighbors::default(); d1 * m];

    let resolve = |axis: usize, vertex: usize, n1: &mut Vec<i32>, n2: &mut Vec<i32>| {
        let key = registry.key(vertex);
        n1.clear();
        n2.clear();
        n1.extend(key.iter().map(|k| k - 1));
        n2.extend(key.iter().map(|k| k + 1));
        n1[axis] = key[axis] + dim as i32;
        n2[axis] = key[axis] - dim as i32;
        Neighbors {
            lo: registry.find(n1).map_or(0, |id| id + 1),
            hi: registry.find(n2).map_or(0, |id| id + 1),
        }
    };

    for (axis, per_axis) in neighbors.chunks_exact_mut(m.max(1)).enumerate().take(d1) {
        if parallel.should_parallelize(m) {
            #[cfg(feature = "parallel")]
            {
                use rayon::prelude::*;
                per_axis.par_iter_mut().enumerate().for_each_init(
                    || (Vec::with_capacity(d1), Vec::with_capacity(d1)),
                    |(n1, n2), (vertex, slot)| *slot = resolve(axis, vertex, n1, n2),
                );
                continue;
            }
        }
        let (mut n1, mut n2) = (Vec::with_capacity(d1), Vec::with_capacity(d1));
        for (vertex, slot) in per_axis.iter_mut().enumerate() {
            *slot = resolve(axis, vertex, &mut n1, &mut n2);
        }
    }
    neighbors
}
