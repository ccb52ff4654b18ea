//! Vertex light baking and hero-light uniforms
//!
//! Detail lights and probe light are summed per vertex and packed into two
//! extra UV channels. Hero lights stay dynamic: they are handed to the
//! renderer as per-material uniforms instead of being baked.

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::core::Color;
use crate::lighting::field::{nearest_probe, ProbeLight};
use crate::math::{Aabb, Ray};
use crate::mesh::buffer::ChunkSurfaces;
use crate::mesh::config::LightingConfig;
use crate::mesh::snapshot::PaddedSnapshot;

/// Maximum number of unbaked lights per chunk
pub const MAX_HERO_LIGHTS: usize = 2;

/// Offset along the normal before shadow rays leave a surface
const SHADOW_BIAS: f32 = 1e-3;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PointLight {
    /// World-space position
    pub position: Vec3,
    pub color: Color,
    pub intensity: f32,
    /// Influence radius; contribution is zero at and beyond it
    pub radius: f32,
    /// Occlusion-test against voxels when baking
    pub shadowed: bool,
}

impl PointLight {
    pub fn new(position: Vec3, color: Color, intensity: f32, radius: f32) -> Self {
        Self { position, color, intensity, radius, shadowed: false }
    }

    pub fn with_shadows(mut self, shadowed: bool) -> Self {
        self.shadowed = shadowed;
        self
    }

    /// Bounding box of the influence sphere
    pub fn bounds(&self) -> Aabb {
        Aabb::from_center_half_extent(self.position, Vec3::splat(self.radius))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LightClass {
    /// Dynamic, rendered through material uniforms
    Hero,
    /// Baked into vertex light channels
    Detail,
}

/// Lights referenced by one chunk
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LightSet {
    hero: Vec<PointLight>,
    detail: Vec<PointLight>,
}

impl LightSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a light. Hero lights past [`MAX_HERO_LIGHTS`] are demoted to
    /// detail lights; the class actually used is returned.
    pub fn add(&mut self, light: PointLight, class: LightClass) -> LightClass {
        match class {
            LightClass::Hero if self.hero.len() < MAX_HERO_LIGHTS => {
                self.hero.push(light);
                LightClass::Hero
            }
            LightClass::Hero => {
                log::debug!("Hero light limit reached, baking light at {:?}", light.position);
                self.detail.push(light);
                LightClass::Detail
            }
            LightClass::Detail => {
                self.detail.push(light);
                LightClass::Detail
            }
        }
    }

    pub fn clear(&mut self) {
        self.hero.clear();
        self.detail.clear();
    }

    pub fn hero(&self) -> &[PointLight] {
        &self.hero
    }

    pub fn detail(&self) -> &[PointLight] {
        &self.detail
    }

    pub fn is_empty(&self) -> bool {
        self.hero.is_empty() && self.detail.is_empty()
    }
}

/// Windowed inverse-square falloff: 1/(d^2+1) scaled by (1-(d/r)^4)^2
pub fn falloff(distance: f32, radius: f32) -> f32 {
    if radius <= 0.0 || distance >= radius {
        return 0.0;
    }
    let ratio = distance / radius;
    let window = (1.0 - ratio.powi(4)).clamp(0.0, 1.0);
    window * window / (distance * distance + 1.0)
}

/// Split a color into the two light channels: A = (r, g), B = (b, 0)
#[inline]
pub fn pack_light(color: Color) -> (Vec2, Vec2) {
    (Vec2::new(color.x, color.y), Vec2::new(color.z, 0.0))
}

#[inline]
pub fn unpack_light(a: Vec2, b: Vec2) -> Color {
    Color::new(a.x, a.y, b.x)
}

/// Per-vertex light accumulator for one job
pub struct LightBaker<'a> {
    snapshot: &'a PaddedSnapshot,
    lights: &'a [PointLight],
    probes: &'a [ProbeLight],
    config: &'a LightingConfig,
    origin: Vec3,
}

impl<'a> LightBaker<'a> {
    pub fn new(snapshot: &'a PaddedSnapshot, lights: &'a LightSet, probes: &'a [ProbeLight], config: &'a LightingConfig) -> Self {
        Self {
            snapshot,
            lights: lights.detail(),
            probes,
            config,
            origin: snapshot.origin().as_vec3(),
        }
    }

    /// Light arriving at a chunk-local vertex
    pub fn bake_vertex(&self, local: Vec3, normal: Vec3) -> Color {
        let world = self.origin + local;
        let mut total = Color::ZERO;

        for light in self.lights {
            total += self.light_contribution(light, world, normal);
        }

        if let Some(probe) = nearest_probe(self.probes, world) {
            total += probe.color() * self.config.radiosity_intensity;
        }
        total
    }

    fn light_contribution(&self, light: &PointLight, world: Vec3, normal: Vec3) -> Color {
        let to_light = light.position - world;
        let distance = to_light.length();
        let attenuation = falloff(distance, light.radius);
        if attenuation <= 0.0 {
            return Color::ZERO;
        }
        let n_dot_l = if distance > f32::EPSILON { normal.dot(to_light / distance).max(0.0) } else { 1.0 };
        if n_dot_l <= 0.0 {
            return Color::ZERO;
        }
        if light.shadowed && self.occluded(self.shadow_origin(world, normal), light.position) {
            return Color::ZERO;
        }
        light.color * light.intensity * attenuation * n_dot_l
    }

    /// Start of a shadow ray: just off the surface, inside an open cell in
    /// front of it. Vertices on cell corners touch several cells, and the one
    /// the biased point floors into may be solid.
    fn shadow_origin(&self, world: Vec3, normal: Vec3) -> Vec3 {
        let start = world + normal * SHADOW_BIAS;
        let is_open = |p: Vec3| !self.snapshot.is_solid((p - self.origin).floor().as_ivec3());
        if is_open(start) {
            return start;
        }
        (0..8)
            .map(|corner: u32| {
                let sign = |bit: u32| if corner & bit == 0 { -SHADOW_BIAS } else { SHADOW_BIAS };
                Vec3::new(sign(1), sign(2), sign(4))
            })
            .filter(|offset| offset.dot(normal) >= 0.0)
            .map(|offset| start + offset)
            .find(|&p| is_open(p))
            .unwrap_or(start)
    }

    /// Whether a solid cell lies between `from` and `to` (world space)
    fn occluded(&self, from: Vec3, to: Vec3) -> bool {
        let Some((ray, distance)) = Ray::between(from - self.origin, to - self.origin) else {
            return false;
        };
        let target = (to - self.origin).floor().as_ivec3();
        for cell in ray.cells(distance) {
            if cell == target {
                return false;
            }
            if self.snapshot.is_solid(cell) {
                return true;
            }
        }
        false
    }
}

/// One hero light as the renderer consumes it
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct HeroLightUniform {
    /// xyz = world position, w = radius
    pub position_radius: [f32; 4],
    /// rgb = color x intensity, a = 1 if shadowed
    pub color_shadow: [f32; 4],
}

impl From<&PointLight> for HeroLightUniform {
    fn from(light: &PointLight) -> Self {
        let c = light.color * light.intensity;
        Self {
            position_radius: [light.position.x, light.position.y, light.position.z, light.radius],
            color_shadow: [c.x, c.y, c.z, if light.shadowed { 1.0 } else { 0.0 }],
        }
    }
}

/// Hero lights touching one material's geometry
#[derive(Clone, Debug, PartialEq)]
pub struct MaterialLights {
    pub material: String,
    pub lights: [HeroLightUniform; MAX_HERO_LIGHTS],
    pub count: u32,
}

/// Dynamic light uniforms for every material of a chunk
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MaterialUniforms {
    pub materials: Vec<MaterialLights>,
}

impl MaterialUniforms {
    pub fn get(&self, material: &str) -> Option<&MaterialLights> {
        self.materials.iter().find(|m| m.material == material)
    }
}

/// Assign hero lights to each material whose geometry lies inside the light's radius
pub fn material_uniforms(surfaces: &ChunkSurfaces, lights: &LightSet, origin: Vec3) -> MaterialUniforms {
    let mut uniforms = MaterialUniforms::default();
    for material in surfaces.materials() {
        let mut bounds: Option<Aabb> = None;
        for surface in [&surfaces.main, &surfaces.detail[0], &surfaces.detail[1]] {
            for group in surface.groups.iter().filter(|g| g.material == material) {
                for p in &group.buffers.positions {
                    let world = origin + *p;
                    match bounds.as_mut() {
                        Some(b) => b.expand(world),
                        None => bounds = Some(Aabb::new(world, world)),
                    }
                }
            }
        }

        let mut entry = MaterialLights {
            material: material.to_string(),
            lights: [HeroLightUniform::default(); MAX_HERO_LIGHTS],
            count: 0,
        };
        if let Some(bounds) = bounds {
            for light in lights.hero().iter().filter(|l| l.bounds().intersects(&bounds)) {
                entry.lights[entry.count as usize] = HeroLightUniform::from(light);
                entry.count += 1;
            }
        }
        uniforms.materials.push(entry);
    }
    uniforms
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::buffer::{MeshGroup, VertexBuffers};
    use crate::voxel::cell::VoxelCell;
    use glam::{IVec3, UVec3};

    fn open_snapshot() -> PaddedSnapshot {
        PaddedSnapshot::new(UVec3::splat(4), IVec3::ZERO)
    }

    #[test]
    fn test_falloff_window() {
        assert_eq!(falloff(0.0, 10.0), 1.0);
        assert!(falloff(2.0, 10.0) < falloff(1.0, 10.0));
        assert_eq!(falloff(10.0, 10.0), 0.0);
        assert_eq!(falloff(1.0, 0.0), 0.0);
    }

    #[test]
    fn test_hero_limit_demotes() {
        let mut set = LightSet::new();
        let light = PointLight::new(Vec3::ZERO, Color::ONE, 1.0, 4.0);
        assert_eq!(set.add(light, LightClass::Hero), LightClass::Hero);
        assert_eq!(set.add(light, LightClass::Hero), LightClass::Hero);
        assert_eq!(set.add(light, LightClass::Hero), LightClass::Detail);
        assert_eq!(set.hero().len(), MAX_HERO_LIGHTS);
        assert_eq!(set.detail().len(), 1);
    }

    #[test]
    fn test_pack_light() {
        let (a, b) = pack_light(Color::new(0.1, 0.2, 0.3));
        assert_eq!(a, Vec2::new(0.1, 0.2));
        assert_eq!(b, Vec2::new(0.3, 0.0));
        assert_eq!(unpack_light(a, b), Color::new(0.1, 0.2, 0.3));
    }

    #[test]
    fn test_detail_light_respects_normal() {
        let snapshot = open_snapshot();
        let mut set = LightSet::new();
        set.add(PointLight::new(Vec3::new(2.0, 3.0, 2.0), Color::ONE, 1.0, 8.0), LightClass::Detail);
        let config = LightingConfig::default();
        let baker = LightBaker::new(&snapshot, &set, &[], &config);
        let facing = baker.bake_vertex(Vec3::new(2.0, 1.0, 2.0), Vec3::Y);
        let away = baker.bake_vertex(Vec3::new(2.0, 1.0, 2.0), Vec3::NEG_Y);
        assert!(facing.x > 0.0);
        assert_eq!(away, Color::ZERO);
    }

    #[test]
    fn test_hero_lights_are_not_baked() {
        let snapshot = open_snapshot();
        let mut set = LightSet::new();
        set.add(PointLight::new(Vec3::new(2.0, 3.0, 2.0), Color::ONE, 1.0, 8.0), LightClass::Hero);
        let config = LightingConfig::default();
        let baker = LightBaker::new(&snapshot, &set, &[], &config);
        assert_eq!(baker.bake_vertex(Vec3::new(2.0, 1.0, 2.0), Vec3::Y), Color::ZERO);
    }

    #[test]
    fn test_shadowed_light_blocked_by_wall() {
        let mut snapshot = open_snapshot();
        // wall at y = 2 between the floor vertex and the light
        for x in -1..=4 {
            for z in -1..=4 {
                snapshot.set(IVec3::new(x, 2, z), VoxelCell::solid(1));
            }
        }
        let light = PointLight::new(Vec3::new(2.5, 3.5, 2.5), Color::ONE, 1.0, 8.0);
        let config = LightingConfig::default();
        let vertex = Vec3::new(2.5, 1.0, 2.5);

        let mut unshadowed = LightSet::new();
        unshadowed.add(light, LightClass::Detail);
        assert!(LightBaker::new(&snapshot, &unshadowed, &[], &config).bake_vertex(vertex, Vec3::Y).x > 0.0);

        let mut shadowed = LightSet::new();
        shadowed.add(light.with_shadows(true), LightClass::Detail);
        assert_eq!(LightBaker::new(&snapshot, &shadowed, &[], &config).bake_vertex(vertex, Vec3::Y), Color::ZERO);
    }

    #[test]
    fn test_corner_vertex_not_shadowed_by_diagonal_cell() {
        let mut snapshot = open_snapshot();
        for x in -1..=4 {
            for z in -1..=4 {
                snapshot.set(IVec3::new(x, 0, z), VoxelCell::solid(1));
            }
        }
        // block sitting on the floor, touching the vertex only at its corner
        snapshot.set(IVec3::new(2, 1, 2), VoxelCell::solid(1));
        let mut set = LightSet::new();
        set.add(PointLight::new(Vec3::new(0.5, 3.5, 0.5), Color::ONE, 1.0, 8.0).with_shadows(true), LightClass::Detail);
        let config = LightingConfig::default();
        let baker = LightBaker::new(&snapshot, &set, &[], &config);
        assert!(baker.bake_vertex(Vec3::new(2.0, 1.0, 2.0), Vec3::Y).x > 0.0);

        // an open corner keeps the plain biased start
        assert!(baker.bake_vertex(Vec3::new(1.0, 1.0, 1.0), Vec3::Y).x > 0.0);
    }

    #[test]
    fn test_probe_light_scaled_by_intensity() {
        let snapshot = open_snapshot();
        let probes = [
            ProbeLight { position: Vec3::splat(1.5), direct: Vec3::splat(0.5), indirect: Vec3::splat(0.25) },
            ProbeLight { position: Vec3::splat(30.0), direct: Vec3::splat(9.0), indirect: Vec3::ZERO },
        ];
        let config = LightingConfig { radiosity_intensity: 2.0, ..Default::default() };
        let lights = LightSet::new();
        let baker = LightBaker::new(&snapshot, &lights, &probes, &config);
        assert_eq!(baker.bake_vertex(Vec3::ONE, Vec3::Y), Vec3::splat(1.5));
    }

    #[test]
    fn test_material_uniforms_by_reach() {
        let mut surfaces = ChunkSurfaces::default();
        let mut near = VertexBuffers::default();
        near.positions = vec![Vec3::ZERO, Vec3::ONE];
        let mut far = VertexBuffers::default();
        far.positions = vec![Vec3::splat(14.0), Vec3::splat(15.0)];
        surfaces.main.groups.push(MeshGroup { material: "stone".into(), buffers: near });
        surfaces.main.groups.push(MeshGroup { material: "grass".into(), buffers: far });

        let mut set = LightSet::new();
        set.add(PointLight::new(Vec3::splat(-1.0), Color::ONE, 2.0, 3.0), LightClass::Hero);

        let uniforms = material_uniforms(&surfaces, &set, Vec3::ZERO);
        assert_eq!(uniforms.get("stone").unwrap().count, 1);
        assert_eq!(uniforms.get("stone").unwrap().lights[0].color_shadow, [2.0, 2.0, 2.0, 0.0]);
        assert_eq!(uniforms.get("grass").unwrap().count, 0);
    }
}
