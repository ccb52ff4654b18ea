use criterion::{criterion_group, criterion_main, Criterion, black_box};

use voxbake::lighting::directions::SampleDirections;
use voxbake::lighting::field::{compute_placements, ProbeField};
use voxbake::lighting::query::SkyDome;
use voxbake::lighting::RadiosityConfig;
use voxbake::mesh::processor::build_surfaces;
use voxbake::mesh::{LightingConfig, MeshTables, PaddedSnapshot};
use voxbake::voxel::block::{BlockDefinition, BlockRegistry};
use voxbake::voxel::cell::VoxelCell;
use voxbake::voxel::collision::{generate_collision_boxes, SolidMask};

use glam::{IVec3, UVec3, Vec3};

/// Rolling heightfield with a stone base and dirt top, plus a few holes
fn terrain_cell(p: IVec3) -> VoxelCell {
    let height = 6.0 + (p.x as f32 * 0.4).sin() * 3.0 + (p.z as f32 * 0.3).cos() * 3.0;
    let y = p.y as f32;
    if y > height || (p.x * 7 + p.z * 13 + p.y * 3) % 29 == 0 {
        VoxelCell::AIR
    } else if y > height - 2.0 {
        VoxelCell::solid(2)
    } else {
        VoxelCell::solid(1)
    }
}

fn registry() -> BlockRegistry {
    let mut registry = BlockRegistry::new();
    registry.register(BlockDefinition::cube(1, "stone", "stone")).unwrap();
    registry.register(BlockDefinition::cube(2, "dirt", "dirt")).unwrap();
    registry
}

fn bench_mesh_terrain_chunk(c: &mut Criterion) {
    let snapshot = PaddedSnapshot::from_fn(UVec3::splat(16), IVec3::ZERO, terrain_cell);
    let registry = registry();
    let tables = MeshTables::new();
    let config = LightingConfig::default();

    c.bench_function("mesh_terrain_chunk", |b| {
        b.iter(|| build_surfaces(black_box(&snapshot), &registry, &tables, &config));
    });
}

fn bench_collision_terrain_chunk(c: &mut Criterion) {
    let mask = SolidMask::from_fn(UVec3::splat(16), |p| terrain_cell(p).is_solid());

    c.bench_function("collision_terrain_chunk", |b| {
        b.iter(|| generate_collision_boxes(black_box(&mask), Vec3::ZERO));
    });
}

fn bench_probe_batch(c: &mut Criterion) {
    let snapshot = PaddedSnapshot::from_fn(UVec3::splat(16), IVec3::ZERO, terrain_cell);
    let config = RadiosityConfig::default();
    let directions = SampleDirections::generate(config.direction_count as usize, config.direction_seed);
    let sky = SkyDome { sky: Vec3::new(0.6, 0.7, 0.9), ground: Vec3::new(0.2, 0.15, 0.1) };
    let mut field = ProbeField::new(IVec3::ZERO, config.max_samples as usize);
    field.place(&compute_placements(&snapshot), 0);

    c.bench_function("probe_batch_terrain_chunk", |b| {
        b.iter(|| field.update(&sky, &directions, &config));
    });
}

criterion_group!(
    benches,
    bench_mesh_terrain_chunk,
    bench_collision_terrain_chunk,
    bench_probe_batch,
);
criterion_main!(benches);
