//! Frame composition: cap contents → color field → kaleidoscope image.
//!
//! The color field is a raster of the cap as seen from above: a white disk,
//! a grey surround with dark tick marks that turn with the cap, and every
//! particle splatted in its own color. Output pixels are traced back through
//! the mirror tube and look up the field at their source point.

use std::f64::consts::PI;

use kaleido_math::{Rgb, Vec2, polar_angle, wrap_angle};
use kaleido_mirror::ReflectionSolver;
use kaleido_particle::{CapBoundary, MpmSolver, ParticleSet};
use log::debug;
use rayon::prelude::*;

/// Color of pixels whose trace-back finds no cap point.
pub const BACKGROUND: [f64; 3] = [0.0, 0.0, 0.0];
const CAP_COLOR: [f64; 3] = [1.0, 1.0, 1.0];
const OUTSIDE_COLOR: [f64; 3] = [0.6, 0.6, 0.6];
const TICK_COLOR: [f64; 3] = [0.2, 0.2, 0.2];
const MIRROR_COLOR: [f64; 3] = [0.0, 0.0, 0.0];

/// Width of the tick band outside the rim, in cells.
pub const RIM_CELLS: usize = 10;
/// Angular width of one tick mark.
const TICK_WIDTH: f64 = PI / 30.0;
/// Radius of a particle splat, in cells.
const SPLAT_RADIUS: i64 = 5;
/// Smallest field: the cap plus the tick band plus spare cells on each side.
pub const MIN_FIELD_RES: usize = 2 * (RIM_CELLS + 2) + 8;

/// Square RGB raster centered on the cap, row-major from the bottom row.
#[derive(Debug, Clone)]
pub struct ColorField {
    res: usize,
    cell: f64,
    origin: Vec2,
    cap_radius: f64,
    cells: Vec<Rgb>,
}

impl ColorField {
    /// Blank field of `res × res` cells (at least [`MIN_FIELD_RES`]) that fits
    /// the cap and its tick band.
    pub fn new(res: usize, cap: &CapBoundary) -> Self {
        let res = res.max(MIN_FIELD_RES);
        let cell = 2.0 * cap.radius() / (res - 2 * (RIM_CELLS + 2)) as f64;
        let half = (res / 2) as f64 * cell;
        Self {
            res,
            cell,
            origin: Vec2::new(-half, -half),
            cap_radius: cap.radius(),
            cells: vec![Rgb::from(OUTSIDE_COLOR); res * res],
        }
    }

    /// Field of the solver's current cap and particles.
    pub fn from_solver(solver: &MpmSolver, res: usize) -> Self {
        let mut field = Self::new(res, solver.cap());
        field.rasterize(solver.particles(), solver.cap());
        field
    }

    pub fn res(&self) -> usize {
        self.res
    }

    pub fn cell_size(&self) -> f64 {
        self.cell
    }

    pub fn cell(&self, i: usize, j: usize) -> Rgb {
        self.cells[j * self.res + i]
    }

    pub fn cell_center(&self, i: usize, j: usize) -> Vec2 {
        self.origin + Vec2::new(i as f64 + 0.5, j as f64 + 0.5) * self.cell
    }

    /// Cell containing `p`, if it lies on the field.
    pub fn cell_of(&self, p: &Vec2) -> Option<(usize, usize)> {
        let q = (p - self.origin) / self.cell;
        let inside = q.x >= 0.0 && q.y >= 0.0 && q.x < self.res as f64 && q.y < self.res as f64;
        inside.then(|| (q.x as usize, q.y as usize))
    }

    /// Color at cap-space point `p`; off-field points are outside the cap.
    pub fn sample(&self, p: &Vec2) -> Rgb {
        match self.cell_of(p) {
            Some((i, j)) => self.cell(i, j),
            None => Rgb::from(OUTSIDE_COLOR),
        }
    }

    /// Redraw the field for the given particles and cap orientation.
    pub fn rasterize(&mut self, particles: &ParticleSet, cap: &CapBoundary) {
        let (res, radius) = (self.res, self.cap_radius);
        let band = RIM_CELLS as f64 * self.cell;
        let angle = cap.angle();
        let (origin, cell) = (self.origin, self.cell);

        self.cells.par_iter_mut().enumerate().for_each(|(k, c)| {
            let x = origin + Vec2::new((k % res) as f64 + 0.5, (k / res) as f64 + 0.5) * cell;
            let r = x.norm();
            *c = if r < radius {
                Rgb::from(CAP_COLOR)
            } else {
                let theta = wrap_angle(polar_angle(&x) - angle).abs();
                let sector = ((theta + 0.5 * TICK_WIDTH) / TICK_WIDTH).floor() as usize;
                if r - radius < band && sector % 2 == 0 {
                    Rgb::from(TICK_COLOR)
                } else {
                    Rgb::from(OUTSIDE_COLOR)
                }
            };
        });

        // Later particles blend over earlier ones.
        for p in particles {
            if let Some((ci, cj)) = self.cell_of(&p.x) {
                self.splat(ci, cj, &p.color);
            }
        }
        debug!(
            "Rasterized {} particles into a {}x{} color field",
            particles.len(),
            res,
            res
        );
    }

    fn splat(&mut self, ci: usize, cj: usize, color: &Rgb) {
        let res = self.res as i64;
        for di in -SPLAT_RADIUS..=SPLAT_RADIUS {
            for dj in -SPLAT_RADIUS..=SPLAT_RADIUS {
                let d = ((di * di + dj * dj) as f64).sqrt().max(1e-3);
                if d >= SPLAT_RADIUS as f64 {
                    continue;
                }
                let (x, y) = (ci as i64 + di, cj as i64 + dj);
                if x < 0 || y < 0 || x >= res || y >= res {
                    continue;
                }
                let w = 1.0 / (d + 1.0);
                let k = y as usize * self.res + x as usize;
                self.cells[k] = color * w + self.cells[k] * (1.0 - w);
            }
        }
    }
}

/// An RGB image, row-major from the bottom row.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    width: usize,
    height: usize,
    pixels: Vec<Rgb>,
}

impl Frame {
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn pixel(&self, i: usize, j: usize) -> Rgb {
        self.pixels[j * self.width + i]
    }

    pub fn pixels(&self) -> &[Rgb] {
        &self.pixels
    }

    /// 8-bit pixels, channels clamped to [0, 1].
    pub fn to_rgb8(&self) -> Vec<[u8; 3]> {
        self.pixels
            .iter()
            .map(|c| {
                let q = |v: f64| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
                [q(c.x), q(c.y), q(c.z)]
            })
            .collect()
    }
}

/// The kaleidoscope image: every camera pixel shows the field color at its
/// traced-back source, or `background` when the trace finds none.
///
/// `window` is the tube axis in cap coordinates; a source point `s` in the
/// cross-section shows the cap at `window + s`.
pub fn compose_image(
    solver: &ReflectionSolver,
    field: &ColorField,
    window: Vec2,
    background: Rgb,
) -> Frame {
    let camera = solver.camera();
    let (w, h) = (camera.width(), camera.height());
    let pixels = (0..w * h)
        .into_par_iter()
        .map(|k| {
            let p = camera.pixel_to_point(k % w, k / w);
            solver
                .source_of(p)
                .map_or(background, |src| field.sample(&(window + src)))
        })
        .collect();
    Frame {
        width: w,
        height: h,
        pixels,
    }
}

/// The untraced view: the color field through the same camera, with the
/// mirror outline drawn over it.
pub fn compose_pre_image(solver: &ReflectionSolver, field: &ColorField, window: Vec2) -> Frame {
    let camera = solver.camera();
    let (w, h) = (camera.width(), camera.height());
    let line = 0.5 * camera.scale();
    let mirrors = solver.tube().mirrors();
    let pixels = (0..w * h)
        .into_par_iter()
        .map(|k| {
            let p = camera.pixel_to_point(k % w, k / w);
            if mirrors.iter().any(|m| m.distance_to_segment(&p) <= line) {
                Rgb::from(MIRROR_COLOR)
            } else {
                field.sample(&(window + p))
            }
        })
        .collect();
    Frame {
        width: w,
        height: h,
        pixels,
    }
}
