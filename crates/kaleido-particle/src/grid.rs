//! Background lattice for particle-grid transfers.
//!
//! The grid is pure scratch space: it is cleared and rebuilt every substep
//! and carries no state between substeps.

use kaleido_math::Vec2;
use rayon::prelude::*;

use crate::{MpmError, Result};

/// Empty cells kept around the cap's bounding box on every side.
pub const GRID_PADDING: usize = 3;

/// Node mass below which a node is treated as empty.
pub const MASS_EPSILON: f64 = 1e-12;

/// Uniform M×M node lattice centered on the cap.
#[derive(Debug, Clone)]
pub struct Grid {
    res: usize,
    dx: f64,
    origin: Vec2,
    /// Node mass.
    pub(crate) mass: Vec<f64>,
    /// Node momentum after P2G, node velocity after the grid update.
    pub(crate) velocity: Vec<Vec2>,
}

impl Grid {
    /// Lattice of `res × res` nodes covering a disk of `radius` centered at
    /// the origin, with [`GRID_PADDING`] spare cells per side. Node
    /// `(res/2, res/2)` sits on the disk center, so `res` must be even.
    pub fn covering_disk(res: usize, radius: f64) -> Result<Self> {
        if res % 2 != 0 || res < 2 * GRID_PADDING + 4 {
            return Err(MpmError::InvalidParameter(format!(
                "grid resolution must be even and at least {}, got {res}",
                2 * GRID_PADDING + 4
            )));
        }
        if !(radius.is_finite() && radius > 0.0) {
            return Err(MpmError::InvalidParameter(format!(
                "grid radius must be positive, got {radius}"
            )));
        }

        let dx = 2.0 * radius / (res - 2 * GRID_PADDING) as f64;
        let half = (res / 2) as f64 * dx;
        Ok(Self {
            res,
            dx,
            origin: Vec2::new(-half, -half),
            mass: vec![0.0; res * res],
            velocity: vec![Vec2::zeros(); res * res],
        })
    }

    /// Zeroed lattice with the same geometry.
    pub(crate) fn empty_like(&self) -> Self {
        Self {
            res: self.res,
            dx: self.dx,
            origin: self.origin,
            mass: vec![0.0; self.mass.len()],
            velocity: vec![Vec2::zeros(); self.velocity.len()],
        }
    }

    /// Nodes per side.
    pub fn res(&self) -> usize {
        self.res
    }

    /// Node spacing.
    pub fn dx(&self) -> f64 {
        self.dx
    }

    pub fn inv_dx(&self) -> f64 {
        1.0 / self.dx
    }

    /// Position of node (0, 0).
    pub fn origin(&self) -> Vec2 {
        self.origin
    }

    /// Flat index of node (i, j).
    #[inline]
    pub fn index(&self, i: usize, j: usize) -> usize {
        i * self.res + j
    }

    /// Position of the node with flat index `k`.
    #[inline]
    pub fn node_position(&self, k: usize) -> Vec2 {
        self.origin + Vec2::new((k / self.res) as f64, (k % self.res) as f64) * self.dx
    }

    pub fn mass(&self, i: usize, j: usize) -> f64 {
        self.mass[self.index(i, j)]
    }

    pub fn velocity(&self, i: usize, j: usize) -> Vec2 {
        self.velocity[self.index(i, j)]
    }

    pub fn total_mass(&self) -> f64 {
        self.mass.iter().sum()
    }

    /// Zero every node.
    pub fn clear(&mut self) {
        self.mass.fill(0.0);
        self.velocity.fill(Vec2::zeros());
    }

    /// Sum partial lattices node by node, in slice order.
    pub(crate) fn reduce_from(&mut self, parts: &[Grid]) {
        self.mass
            .par_iter_mut()
            .zip(self.velocity.par_iter_mut())
            .enumerate()
            .for_each(|(k, (m, v))| {
                for part in parts {
                    *m += part.mass[k];
                    *v += part.velocity[k];
                }
            });
    }

    /// Quadratic B-spline stencil of a particle at `x`.
    ///
    /// The base node is clamped into the lattice so that a stray position can
    /// never index outside it.
    pub fn stencil(&self, x: &Vec2) -> Stencil {
        let xr = (x - self.origin) * self.inv_dx();
        let max_base = (self.res - 3) as f64;
        let bx = (xr.x - 0.5).floor().clamp(0.0, max_base) as usize;
        let by = (xr.y - 0.5).floor().clamp(0.0, max_base) as usize;
        let fx = xr - Vec2::new(bx as f64, by as f64);

        let w = [
            (Vec2::repeat(1.5) - fx).map(|d| 0.5 * d * d),
            (fx - Vec2::repeat(1.0)).map(|d| 0.75 - d * d),
            (fx - Vec2::repeat(0.5)).map(|d| 0.5 * d * d),
        ];

        Stencil {
            base: (bx, by),
            stride: self.res,
            fx,
            w,
        }
    }
}

/// Interpolation weights of one particle over its 3×3 node neighborhood.
#[derive(Debug, Clone, Copy)]
pub struct Stencil {
    /// Lower-left node of the neighborhood.
    pub base: (usize, usize),
    stride: usize,
    /// Particle position relative to the base node, in cells.
    pub fx: Vec2,
    /// Per-axis weights for offsets 0, 1, 2.
    pub w: [Vec2; 3],
}

impl Stencil {
    /// `(flat node index, weight, node offset from the particle in cells)`.
    pub fn nodes(&self) -> impl Iterator<Item = (usize, f64, Vec2)> + '_ {
        (0..3).flat_map(move |i| {
            (0..3).map(move |j| {
                let k = (self.base.0 + i) * self.stride + self.base.1 + j;
                let weight = self.w[i].x * self.w[j].y;
                let offset = Vec2::new(i as f64, j as f64) - self.fx;
                (k, weight, offset)
            })
        })
    }
}
