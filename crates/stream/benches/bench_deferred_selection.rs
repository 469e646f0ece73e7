use std::hint::black_box;
use std::time::Instant;

use glam::Vec3;
use metaspace_common::EntityDefinition;
use metaspace_stream::{DeferredEntry, DeferredSet, ProximityStreamer, StreamConfig};

fn make_set(entity_count: usize, spacing: f32, distance: f32) -> DeferredSet {
    let mut set = DeferredSet::new(16.0);
    let side = (entity_count as f32).sqrt().ceil() as usize;
    for i in 0..entity_count {
        let x = (i % side) as f32 * spacing;
        let z = (i / side) as f32 * spacing;
        set.insert(DeferredEntry {
            uuid: format!("entity-{i}").into(),
            definition: EntityDefinition::new(format!("entity-{i}")),
            position: Vec3::new(x, 0.0, z),
            trigger_distance_squared: distance * distance,
            order: i,
        });
    }
    set
}

fn bench_insert(entity_count: usize, iterations: usize) {
    let start = Instant::now();
    for _ in 0..iterations {
        black_box(make_set(black_box(entity_count), 4.0, 10.0));
    }
    let elapsed = start.elapsed();
    let per_iter = elapsed / iterations as u32;
    println!(
        "  insert ({entity_count} entities, {iterations} iters): {per_iter:?}/iter, total {elapsed:?}"
    );
}

fn bench_due(entity_count: usize, distance: f32, iterations: usize) {
    let set = make_set(entity_count, 4.0, distance);

    let start = Instant::now();
    for i in 0..iterations {
        let observer = Vec3::new((i % 100) as f32, 0.0, 0.0);
        let _ = black_box(set.due(black_box(observer), 64));
    }
    let elapsed = start.elapsed();
    let per_iter = elapsed / iterations as u32;
    println!(
        "  due ({entity_count} entities, d={distance}, {iterations} iters): {per_iter:?}/iter, total {elapsed:?}"
    );
}

fn bench_streamer(entity_count: usize, iterations: usize) {
    let set = make_set(entity_count, 4.0, 12.0);
    let mut streamer = ProximityStreamer::new(StreamConfig {
        cell_size: 16.0,
        load_budget: 8,
    });

    let start = Instant::now();
    for i in 0..iterations {
        // Simulate observer walking along x
        let observer = Vec3::new((i % 200) as f32 * 2.0, 0.0, 8.0);
        let _ = black_box(streamer.update(black_box(observer), black_box(&set)));
    }
    let elapsed = start.elapsed();
    let per_iter = elapsed / iterations as u32;
    println!(
        "  streamer update ({entity_count} entities, {iterations} iters): {per_iter:?}/iter, total {elapsed:?}"
    );
}

fn main() {
    println!("=== Deferred Selection Benchmarks ===\n");

    println!("Insert:");
    bench_insert(100, 100);
    bench_insert(1000, 10);
    bench_insert(10000, 2);

    println!("\nDue query:");
    bench_due(1000, 5.0, 10000);
    bench_due(1000, 20.0, 10000);
    bench_due(10000, 20.0, 1000);

    println!("\nStreamer update (budgeted):");
    bench_streamer(100, 10000);
    bench_streamer(1000, 1000);
    bench_streamer(10000, 100);

    println!("\n=== Done ===");
}
