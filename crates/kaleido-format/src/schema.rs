//! Kaleidoscope configuration schema and loader.

use kaleido_math::Vec2;
use kaleido_mirror::{CrossSectionCamera, MirrorTube, ReflectionSolver};
use kaleido_particle::{Material, MpmParams, MpmSolver, Seed, SeedRaster, SeedSample, sample_seed};
use log::info;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::error::{FormatError, Result};

/// Top-level kaleidoscope configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KaleidoSpec {
    /// Format version.
    pub version: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub material: MaterialConfig,
    #[serde(default)]
    pub cap: CapConfig,
    #[serde(default)]
    pub tube: TubeConfig,
    #[serde(default)]
    pub camera: CameraConfig,
}

/// Particle simulation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Grid nodes per side (even).
    #[serde(default = "default_grid_resolution")]
    pub grid_resolution: usize,
    #[serde(default = "default_substep_dt")]
    pub substep_dt: f64,
    /// Simulated time per rendered frame.
    #[serde(default = "default_frame_dt")]
    pub frame_dt: f64,
    #[serde(default = "default_particle_count")]
    pub particle_count: usize,
    #[serde(default = "default_density")]
    pub density: f64,
    /// Gravity vector [x, y].
    #[serde(default = "default_gravity")]
    pub gravity: [f64; 2],
    /// Seed of the particle placement RNG.
    #[serde(default)]
    pub seed: u64,
}

fn default_grid_resolution() -> usize {
    128
}

fn default_substep_dt() -> f64 {
    1e-4
}

fn default_frame_dt() -> f64 {
    2e-3
}

fn default_particle_count() -> usize {
    20_000
}

fn default_density() -> f64 {
    1.0
}

fn default_gravity() -> [f64; 2] {
    [0.0, -kaleido_math::GRAVITY]
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            grid_resolution: default_grid_resolution(),
            substep_dt: default_substep_dt(),
            frame_dt: default_frame_dt(),
            particle_count: default_particle_count(),
            density: default_density(),
            gravity: default_gravity(),
            seed: 0,
        }
    }
}

/// Snow-like elastoplastic material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialConfig {
    #[serde(default = "default_youngs_modulus")]
    pub youngs_modulus: f64,
    #[serde(default = "default_poisson_ratio")]
    pub poisson_ratio: f64,
    #[serde(default = "default_hardening")]
    pub hardening: f64,
    #[serde(default = "default_critical_compression")]
    pub critical_compression: f64,
    #[serde(default = "default_critical_stretch")]
    pub critical_stretch: f64,
}

fn default_youngs_modulus() -> f64 {
    Material::snow().youngs_modulus
}

fn default_poisson_ratio() -> f64 {
    Material::snow().poisson_ratio
}

fn default_hardening() -> f64 {
    Material::snow().hardening
}

fn default_critical_compression() -> f64 {
    Material::snow().critical_compression
}

fn default_critical_stretch() -> f64 {
    Material::snow().critical_stretch
}

impl Default for MaterialConfig {
    fn default() -> Self {
        Self {
            youngs_modulus: default_youngs_modulus(),
            poisson_ratio: default_poisson_ratio(),
            hardening: default_hardening(),
            critical_compression: default_critical_compression(),
            critical_stretch: default_critical_stretch(),
        }
    }
}

impl MaterialConfig {
    pub fn to_material(&self) -> Material {
        Material {
            youngs_modulus: self.youngs_modulus,
            poisson_ratio: self.poisson_ratio,
            hardening: self.hardening,
            critical_compression: self.critical_compression,
            critical_stretch: self.critical_stretch,
        }
    }
}

/// The rotating cap holding the particles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapConfig {
    #[serde(default = "default_cap_radius")]
    pub radius: f64,
    #[serde(default = "default_wall_friction")]
    pub wall_friction: f64,
    #[serde(default)]
    pub wall_margin: f64,
    /// Angular velocity limit (rad/s).
    #[serde(default = "default_max_angular_speed")]
    pub max_angular_speed: f64,
    /// Angular velocity at startup (rad/s, counter-clockwise positive).
    #[serde(default = "default_max_angular_speed")]
    pub initial_angular_velocity: f64,
}

fn default_cap_radius() -> f64 {
    0.5
}

fn default_wall_friction() -> f64 {
    0.8
}

fn default_max_angular_speed() -> f64 {
    8.0
}

impl Default for CapConfig {
    fn default() -> Self {
        Self {
            radius: default_cap_radius(),
            wall_friction: default_wall_friction(),
            wall_margin: 0.0,
            max_angular_speed: default_max_angular_speed(),
            initial_angular_velocity: default_max_angular_speed(),
        }
    }
}

/// Regular polygon of mirrors looking down onto part of the cap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TubeConfig {
    #[serde(default = "default_mirror_count")]
    pub mirror_count: usize,
    #[serde(default = "default_tube_radius")]
    pub circumradius: f64,
    /// Tube axis in cap coordinates.
    #[serde(default = "default_tube_center")]
    pub center: [f64; 2],
    /// Radius of the cap disk seen directly through the tube; the tube's
    /// apothem when absent.
    #[serde(default)]
    pub view_radius: Option<f64>,
    #[serde(default = "default_max_bounces")]
    pub max_bounces: usize,
}

fn default_mirror_count() -> usize {
    5
}

fn default_tube_radius() -> f64 {
    0.15
}

fn default_tube_center() -> [f64; 2] {
    [0.0, -1.0 / 3.0]
}

fn default_max_bounces() -> usize {
    kaleido_mirror::DEFAULT_MAX_BOUNCES
}

impl Default for TubeConfig {
    fn default() -> Self {
        Self {
            mirror_count: default_mirror_count(),
            circumradius: default_tube_radius(),
            center: default_tube_center(),
            view_radius: None,
            max_bounces: default_max_bounces(),
        }
    }
}

/// Output image and its mapping onto the tube cross-section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraConfig {
    #[serde(default = "default_image_size")]
    pub width: usize,
    #[serde(default = "default_image_size")]
    pub height: usize,
    /// Cross-section units per pixel.
    #[serde(default = "default_pixel_scale")]
    pub scale: f64,
    /// Pixel over the tube axis; the image center when absent.
    #[serde(default)]
    pub center: Option<[f64; 2]>,
}

fn default_image_size() -> usize {
    512
}

fn default_pixel_scale() -> f64 {
    1.0 / 512.0
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            width: default_image_size(),
            height: default_image_size(),
            scale: default_pixel_scale(),
            center: None,
        }
    }
}

impl KaleidoSpec {
    /// Default configuration under a name.
    pub fn named(name: &str) -> Self {
        Self {
            version: "1.0".to_string(),
            name: name.to_string(),
            description: String::new(),
            simulation: SimulationConfig::default(),
            material: MaterialConfig::default(),
            cap: CapConfig::default(),
            tube: TubeConfig::default(),
            camera: CameraConfig::default(),
        }
    }

    /// Parse and validate a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        let spec: KaleidoSpec = serde_json::from_str(json)?;
        spec.validate()?;
        Ok(spec)
    }

    /// Check every construction contract before anything is built.
    pub fn validate(&self) -> Result<()> {
        if self.version.is_empty() {
            return Err(FormatError::InvalidFormat("missing version".to_string()));
        }
        let sim = &self.simulation;
        if sim.particle_count == 0 {
            return Err(FormatError::InvalidFormat(
                "particle_count must be positive".to_string(),
            ));
        }
        if !(sim.frame_dt.is_finite() && sim.frame_dt > 0.0) {
            return Err(FormatError::InvalidFormat(format!(
                "frame_dt must be positive, got {}",
                sim.frame_dt
            )));
        }
        if self.cap.initial_angular_velocity.abs() > self.cap.max_angular_speed {
            return Err(FormatError::InvalidFormat(format!(
                "initial angular velocity {} exceeds the limit {}",
                self.cap.initial_angular_velocity, self.cap.max_angular_speed
            )));
        }

        self.mpm_params().validate()?;
        kaleido_particle::Grid::covering_disk(sim.grid_resolution, self.cap.radius)?;
        kaleido_particle::CapBoundary::new(self.cap.radius, self.cap.max_angular_speed)?
            .with_wall(self.cap.wall_friction, self.cap.wall_margin)?;
        let tube = self.tube()?;
        if self.window_center().norm() + tube.circumradius() > self.cap.radius {
            return Err(FormatError::InvalidFormat(format!(
                "tube of radius {} at {:?} does not fit inside the cap",
                tube.circumradius(),
                self.tube.center
            )));
        }
        let view = self.view_radius(&tube);
        if !(view.is_finite() && view > 0.0 && view <= tube.circumradius()) {
            return Err(FormatError::InvalidFormat(format!(
                "view radius must lie in (0, {}], got {view}",
                tube.circumradius()
            )));
        }
        self.camera()?;
        Ok(())
    }

    pub fn mpm_params(&self) -> MpmParams {
        let sim = &self.simulation;
        MpmParams {
            grid_resolution: sim.grid_resolution,
            substep_dt: sim.substep_dt,
            gravity: Vec2::new(sim.gravity[0], sim.gravity[1]),
            density: sim.density,
            material: self.material.to_material(),
            cap_radius: self.cap.radius,
            wall_friction: self.cap.wall_friction,
            wall_margin: self.cap.wall_margin,
            max_angular_speed: self.cap.max_angular_speed,
        }
    }

    pub fn tube(&self) -> Result<MirrorTube> {
        Ok(MirrorTube::regular(
            self.tube.mirror_count,
            self.tube.circumradius,
        )?)
    }

    /// Tube axis in cap coordinates; add it to a traced source point to get
    /// the cap point it shows.
    pub fn window_center(&self) -> Vec2 {
        Vec2::new(self.tube.center[0], self.tube.center[1])
    }

    fn view_radius(&self, tube: &MirrorTube) -> f64 {
        self.tube.view_radius.unwrap_or_else(|| tube.apothem())
    }

    pub fn camera(&self) -> Result<CrossSectionCamera> {
        let cam = &self.camera;
        let camera = CrossSectionCamera::new(cam.width, cam.height, cam.scale)?;
        Ok(match cam.center {
            Some([cx, cy]) => camera.with_center(cx, cy),
            None => camera,
        })
    }

    /// Draw the configured number of particles from `raster`, seeded by
    /// `simulation.seed`.
    pub fn seed_particles(&self, raster: &SeedRaster) -> Result<Seed> {
        let mut rng = StdRng::seed_from_u64(self.simulation.seed);
        Ok(sample_seed(
            raster,
            self.simulation.particle_count,
            self.cap.radius,
            &mut rng,
        )?)
    }

    pub fn build_simulator<I, S>(&self, samples: I) -> Result<MpmSolver>
    where
        I: IntoIterator<Item = S>,
        S: Into<SeedSample>,
    {
        Ok(MpmSolver::new(self.mpm_params(), samples)?)
    }

    pub fn build_solver(&self) -> Result<ReflectionSolver> {
        let tube = self.tube()?;
        let view = self.view_radius(&tube);
        let solver = ReflectionSolver::new(tube, view, self.camera()?)?;
        Ok(solver.with_max_bounces(self.tube.max_bounces))
    }
}

/// Load a kaleidoscope configuration from file.
pub fn load_kaleido_spec(path: &str) -> Result<KaleidoSpec> {
    let json = std::fs::read_to_string(path)?;
    let spec = KaleidoSpec::from_json(&json)?;
    info!("Loaded configuration '{}' from {}", spec.name, path);
    Ok(spec)
}

/// Save a kaleidoscope configuration to file.
pub fn save_kaleido_spec(path: &str, spec: &KaleidoSpec) -> Result<()> {
    let json = export_kaleido_spec(spec)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Export a configuration to a JSON string.
pub fn export_kaleido_spec(spec: &KaleidoSpec) -> Result<String> {
    Ok(serde_json::to_string_pretty(spec)?)
}
