//! What a monitored step says about the cap.

use log::warn;

use crate::conservation::ParticleMonitor;

/// The worst problem a [`ParticleMonitor`] shows, most severe first.
///
/// Wall distances are fractions of the cap radius.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CapHealth {
    /// Particles were created or destroyed.
    CountChanged(isize),
    /// Particles whose position or velocity is no longer finite.
    NonFinite(usize),
    /// Some particle is past the wall by more than the tolerance.
    Escaping(f64),
    /// Past the wall, but only by rounding.
    Grazing(f64),
    /// Every particle is on or inside the wall.
    Contained,
}

impl CapHealth {
    /// Classify a monitor, allowing particles `tolerance · cap_radius` past
    /// the wall before calling them escaped.
    pub fn of(monitor: &ParticleMonitor, cap_radius: f64, tolerance: f64) -> Self {
        let health = if monitor.count_delta != 0 {
            Self::CountChanged(monitor.count_delta)
        } else if monitor.non_finite > 0 {
            Self::NonFinite(monitor.non_finite)
        } else if monitor.radial_excess <= 0.0 {
            Self::Contained
        } else {
            let past = monitor.radial_excess / cap_radius;
            if past > tolerance {
                Self::Escaping(past)
            } else {
                Self::Grazing(past)
            }
        };
        if let Self::Escaping(past) = health {
            warn!("Particles are {past:.3e} cap radii past the wall");
        }
        health
    }

    /// The cloud is intact and held by the wall.
    pub fn is_contained(&self) -> bool {
        matches!(self, Self::Contained | Self::Grazing(_))
    }
}
