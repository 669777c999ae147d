//! Measure mouse feature extraction throughput on synthetic input

use std::time::Instant;

use stress_sense::features::FeatureExtractor;
use stress_sense::types::MovementEvent;

const NUM_EVENTS: usize = 100_000;

/// 100 Hz movements scattered over a 1920x1080 screen
fn synthetic_movements(count: usize) -> Vec<MovementEvent> {
    let start = stress_sense::capture::now_epoch_secs();
    (0..count)
        .map(|i| {
            let phase = i as f64;
            let x = ((phase * 12.9898).sin() * 43758.5453).fract().abs() * 1920.0;
            let y = ((phase * 78.233).sin() * 43758.5453).fract().abs() * 1080.0;
            MovementEvent::new(x.floor(), y.floor(), start + phase * 0.01)
        })
        .collect()
}

fn main() {
    println!("Generating {NUM_EVENTS} synthetic mouse events...");
    let movements = synthetic_movements(NUM_EVENTS);

    println!("{}", "-".repeat(40));
    println!("Benchmarking FeatureExtractor::mouse_features...");
    let start = Instant::now();
    let features = FeatureExtractor::mouse_features(&movements);
    let elapsed = start.elapsed().as_secs_f64();
    println!("Time taken: {elapsed:.4} seconds");
    println!("Throughput: {:.2} events/second", NUM_EVENTS as f64 / elapsed);
    println!("Features: {}", features.len());

    println!("{}", "-".repeat(40));
    println!("Benchmarking FeatureExtractor::path_efficiency...");
    let start = Instant::now();
    let efficiency = FeatureExtractor::path_efficiency(&movements);
    let elapsed = start.elapsed().as_secs_f64();
    println!("Time taken: {elapsed:.4} seconds");
    println!("Throughput: {:.2} events/second", NUM_EVENTS as f64 / elapsed);
    println!("Path efficiency: {efficiency:.3}");
    println!("{}", "-".repeat(40));
}
