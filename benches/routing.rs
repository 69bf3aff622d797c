use cartridge_loader::engine::SpriteMemory;
use cartridge_loader::{FileFlags, FileRouter, LoaderSettings, RuleSet};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;

/// A listing shaped like a large cartridge: folder sprites, tilemap layers, sounds.
fn cartridge_listing(sprites: usize) -> Vec<String> {
    let mut files = vec![
        "/Game/data.json".to_string(),
        "/Game/colors.png".to_string(),
        "/Game/sprites.png".to_string(),
        "/Game/tilemap.png".to_string(),
        "/Game/tilemap.flags.png".to_string(),
        "/Game/large.font.png".to_string(),
        "/Game/info.json".to_string(),
        "/Game/sounds.json".to_string(),
        "/App/Sprites/flags.png".to_string(),
    ];
    for i in 0..sprites {
        files.push(format!("/Game/Sprites/sprite{i}.png"));
        files.push(format!("/Game/Tilemaps/level{i}.png"));
        files.push(format!("/Game/Sounds/effect{i}.wav"));
        files.push(format!("/Game/Notes/note{i}.txt"));
    }
    files
}

pub fn route_listing(c: &mut Criterion) {
    let router = FileRouter::new(RuleSet::standard(&LoaderSettings::default()));
    let mut group = c.benchmark_group("route");

    for size in [10, 100, 1000] {
        let files = cartridge_listing(size);
        group.bench_with_input(BenchmarkId::from_parameter(files.len()), &files, |b, files| {
            b.iter(|| router.route(black_box(files), FileFlags::all()))
        });
    }
    group.finish();
}

pub fn sprite_dedup(c: &mut Criterion) {
    let mut memory = SpriteMemory::new();
    for i in 0..256 {
        memory.update_sprite_at(i, &vec![i % 16; 64]);
    }
    let probe = vec![15; 64];

    c.bench_function("find_sprite", |b| {
        b.iter(|| memory.find_sprite(black_box(&probe), false))
    });
}

criterion_group!(benches, route_listing, sprite_dedup);
criterion_main!(benches);
