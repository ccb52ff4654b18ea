//! Incident light capability injected into the probe field

use glam::Vec3;

use crate::core::Color;

/// Light arriving along one ray
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct IncidentLight {
    pub direct: Color,
    pub indirect: Color,
}

impl IncidentLight {
    pub const ZERO: IncidentLight = IncidentLight { direct: Vec3::ZERO, indirect: Vec3::ZERO };

    pub fn new(direct: Color, indirect: Color) -> Self {
        Self { direct, indirect }
    }
}

/// Answers "what light arrives at `origin` from `direction`".
///
/// Called from worker threads, so implementations must be thread-safe.
pub trait LightQuery: Send + Sync {
    fn sample_incident_light(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> IncidentLight;
}

/// Same light from every direction
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ConstantLight(pub IncidentLight);

impl LightQuery for ConstantLight {
    fn sample_incident_light(&self, _origin: Vec3, _direction: Vec3, _max_distance: f32) -> IncidentLight {
        self.0
    }
}

/// Open-sky lighting: direct light from the upper hemisphere, a flat bounce
/// color from below.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SkyDome {
    pub sky: Color,
    pub ground: Color,
}

impl Default for SkyDome {
    fn default() -> Self {
        Self {
            sky: Color::new(0.6, 0.7, 0.9),
            ground: Color::new(0.15, 0.12, 0.1),
        }
    }
}

impl LightQuery for SkyDome {
    fn sample_incident_light(&self, _origin: Vec3, direction: Vec3, _max_distance: f32) -> IncidentLight {
        let up = direction.normalize_or_zero().y;
        if up > 0.0 {
            IncidentLight::new(self.sky * up, Color::ZERO)
        } else {
            IncidentLight::new(Color::ZERO, self.ground * -up)
        }
    }
}

impl<F> LightQuery for F
where
    F: Fn(Vec3, Vec3, f32) -> IncidentLight + Send + Sync,
{
    fn sample_incident_light(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> IncidentLight {
        self(origin, direction, max_distance)
    }
}
