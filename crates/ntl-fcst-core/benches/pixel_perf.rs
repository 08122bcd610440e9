//! Performance benchmark for pixel-wise fitting over large rasters
//!
//! Run with: cargo bench --bench pixel_perf

use std::time::{Duration, Instant};

use ntl_fcst_core::{
    assemble, fit_and_forecast, fit_pixel, observed_years, ExpandedFeatures, ForecastOptions,
    Grid, ModelType, NoopFeedback, NormalizationType,
};

fn generate_stack(rows: usize, cols: usize, n_years: usize) -> Vec<Grid> {
    (0..n_years)
        .map(|t| {
            let data = (0..rows * cols)
                .map(|i| {
                    let base = (i % 97) as f64 * 0.5;
                    let growth = 0.01 * (i % 13) as f64;
                    base * (1.0 + growth * t as f64) + ((i + t) % 5) as f64 * 0.1
                })
                .collect();
            Grid::from_vec(rows, cols, data).unwrap()
        })
        .collect()
}

fn benchmark_fn<F, R>(name: &str, iterations: usize, mut f: F) -> Duration
where
    F: FnMut() -> R,
{
    // Warmup
    let _ = f();

    let start = Instant::now();
    for _ in 0..iterations {
        let _ = std::hint::black_box(f());
    }
    let elapsed = start.elapsed();
    let per_iter = elapsed / iterations as u32;
    println!(
        "{}: total={:?}, per_iter={:?}, iters={}",
        name, elapsed, per_iter, iterations
    );
    elapsed
}

fn main() {
    println!("=== Pixel Regression Performance Benchmark ===\n");

    let years = observed_years(2013, 11);
    let future = [2028, 2033, 2038, 2043];
    let series: Vec<f64> = (0..11).map(|t| 3.0 + 0.4 * t as f64).collect();

    println!("--- 1. Single Pixel Fits ---\n");

    for model in ModelType::ALL {
        let features = ExpandedFeatures::new(model, &years, &future);
        let options = ForecastOptions {
            model,
            normalization: NormalizationType::ZScore,
            ..Default::default()
        };
        benchmark_fn(&format!("fit_pixel({})", model), 10_000, || {
            fit_pixel(&series, &features, &options)
        });
    }

    println!("\n--- 2. Whole Raster ---\n");

    for &(rows, cols) in &[(100, 100), (500, 500)] {
        let (volume, mask) = assemble(generate_stack(rows, cols, years.len()), None).unwrap();
        println!("Raster {}x{}:", rows, cols);

        for model in [ModelType::Linear, ModelType::Lasso] {
            for parallel in [false, true] {
                let options = ForecastOptions {
                    model,
                    normalization: NormalizationType::MinMax,
                    parallel,
                    ..Default::default()
                };
                benchmark_fn(
                    &format!("  fit_and_forecast({}, parallel={})", model, parallel),
                    1,
                    || fit_and_forecast(&volume, &mask, &years, &future, &options, &NoopFeedback),
                );
            }
        }
        println!();
    }

    println!("=== Benchmark Complete ===");
}
