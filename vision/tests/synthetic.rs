//! End-to-end estimator runs on synthetic textured frames.

use std::sync::Arc;
use std::time::Duration;

use nalgebra::Vector3;
use ndarray::Array2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use shared::camera_model::{CameraModel, ImageSize};
use shared::collaborators::CapturedFrame;
use shared::telemetry::{LogChannel, MemoryTelemetrySink};
use vision::{AngularSample, FrameGeometry, VisionConfig, VisionError, VisionEstimator};

const FRAME: usize = 160;
const WAIT: Duration = Duration::from_secs(30);

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Surface texture made of randomly placed Gaussian blobs
fn texture(size: usize, seed: u64) -> Array2<f64> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let blobs: Vec<(f64, f64, f64, f64)> = (0..size * size / 250)
        .map(|_| {
            (
                rng.random_range(0.0..size as f64),
                rng.random_range(0.0..size as f64),
                rng.random_range(1.5..4.0),
                rng.random_range(-1.0..1.0),
            )
        })
        .collect();

    let mut tex = Array2::<f64>::zeros((size, size));
    for &(bx, by, sigma, amplitude) in &blobs {
        let r = (3.0 * sigma).ceil() as isize;
        for y in (by as isize - r).max(0)..(by as isize + r + 1).min(size as isize) {
            for x in (bx as isize - r).max(0)..(bx as isize + r + 1).min(size as isize) {
                let d2 = (x as f64 - bx).powi(2) + (y as f64 - by).powi(2);
                tex[[y as usize, x as usize]] += amplitude * (-d2 / (2.0 * sigma * sigma)).exp();
            }
        }
    }
    tex
}

/// Crop a frame whose top-left corner sits at `(x0, y0)` in the texture
fn crop(tex: &Array2<f64>, x0: usize, y0: usize, sequence: u64) -> CapturedFrame {
    let image = Array2::from_shape_fn((FRAME, FRAME), |(y, x)| {
        (20000.0 + 8000.0 * tex[[y + y0, x + x0]]).clamp(0.0, 65535.0) as u16
    });
    CapturedFrame {
        sequence,
        timestamp: sequence as f64 * 2.0,
        image,
    }
}

fn camera() -> CameraModel {
    CameraModel {
        size: ImageSize::from_width_height(FRAME, FRAME),
        ..Default::default()
    }
}

fn geometry() -> FrameGeometry {
    FrameGeometry {
        altitude: 100.0,
        radius: 500.0,
        asteroid_scale: 1,
    }
}

fn single_sample_config() -> VisionConfig {
    VisionConfig {
        target_samples: 1,
        ..Default::default()
    }
}

fn submit(estimator: &VisionEstimator, frame: CapturedFrame) {
    estimator.on_frame_available(frame, geometry()).unwrap();
    assert!(estimator.wait_until_idle(WAIT));
}

/// Top-left corners of the first frame of successive pairs
const PAIR_ORIGINS: [(usize, usize); 8] = [
    (40, 40),
    (50, 45),
    (60, 50),
    (45, 60),
    (70, 42),
    (55, 70),
    (66, 58),
    (48, 52),
];

/// Feed pairs whose content moves by `(dx, dy)` pixels until an estimate is
/// published.
///
/// A pure shift has no depth change, so round-off in the fitted translation
/// can push a pair over the receding-depth cut and leave it without a sample.
fn submit_shifted_pairs(estimator: &VisionEstimator, tex: &Array2<f64>, dx: isize, dy: isize) {
    for (pair, &(x0, y0)) in PAIR_ORIGINS.iter().enumerate() {
        let sequence = 2 * pair as u64;
        let x1 = (x0 as isize - dx) as usize;
        let y1 = (y0 as isize - dy) as usize;
        submit(estimator, crop(tex, x0, y0, sequence));
        submit(estimator, crop(tex, x1, y1, sequence + 1));
        if estimator.final_estimate().is_some() {
            return;
        }
    }
}

fn expected_rate(pixels: f64) -> f64 {
    let config = single_sample_config();
    camera().world_per_pixel(geometry().altitude, 1) * pixels / geometry().radius / config.imaging_period
}

#[test]
fn test_identical_frames_give_no_rotation() {
    init_logging();
    let tex = texture(240, 11);
    let estimator = VisionEstimator::new(
        single_sample_config(),
        camera(),
        Arc::new(MemoryTelemetrySink::new()),
    )
    .unwrap();

    submit(&estimator, crop(&tex, 40, 40, 0));
    submit(&estimator, crop(&tex, 40, 40, 1));

    for sample in estimator.samples() {
        if let AngularSample::Measured(omega) = sample {
            assert_eq!(omega, Vector3::zeros(), "identical frames registered {omega:?}");
        }
    }
    assert!(estimator.is_active());
    assert!(estimator.final_estimate().is_none());
    assert_eq!(estimator.pending_frames(), 0);
}

#[test]
fn test_horizontal_shift_gives_positive_y_rate() {
    init_logging();
    let tex = texture(240, 12);
    let telemetry = Arc::new(MemoryTelemetrySink::new());
    let estimator = VisionEstimator::new(single_sample_config(), camera(), telemetry.clone()).unwrap();

    // Content moves 6 px to the right between the frames
    submit_shifted_pairs(&estimator, &tex, 6, 0);

    let estimate = estimator.final_estimate().expect("estimate published");
    let expected = expected_rate(6.0);
    assert!(!estimator.is_active());
    assert_eq!(estimate.x, 0.0);
    assert_eq!(estimate.z, 0.0);
    assert!(
        (estimate.y - expected).abs() < 0.2 * expected,
        "estimate {estimate:?}, expected y = {expected}"
    );
    assert_eq!(telemetry.lines(LogChannel::Estimation).len(), 1);
}

#[test]
fn test_vertical_shift_gives_negative_x_rate() {
    init_logging();
    let tex = texture(240, 13);
    let estimator = VisionEstimator::new(
        single_sample_config(),
        camera(),
        Arc::new(MemoryTelemetrySink::new()),
    )
    .unwrap();

    // Content moves 5 px down the image
    submit_shifted_pairs(&estimator, &tex, 0, 5);

    let estimate = estimator.final_estimate().expect("estimate published");
    let expected = -expected_rate(5.0);
    assert_eq!(estimate.y, 0.0);
    assert!(
        (estimate.x - expected).abs() < 0.2 * expected.abs(),
        "estimate {estimate:?}, expected x = {expected}"
    );
}

#[test]
fn test_featureless_pair_is_abandoned() {
    init_logging();
    let estimator = VisionEstimator::new(
        single_sample_config(),
        camera(),
        Arc::new(MemoryTelemetrySink::new()),
    )
    .unwrap();
    let flat = |sequence| CapturedFrame {
        sequence,
        timestamp: sequence as f64,
        image: Array2::from_elem((FRAME, FRAME), 1000u16),
    };

    submit(&estimator, flat(0));
    assert_eq!(estimator.pending_frames(), 1);
    submit(&estimator, flat(1));

    assert!(estimator.samples().is_empty());
    assert_eq!(estimator.pending_frames(), 0);
    assert!(estimator.is_active());
}

#[test]
fn test_second_frame_in_flight_is_contention() {
    init_logging();
    let tex = texture(400, 14);
    let big_camera = CameraModel {
        size: ImageSize::from_width_height(320, 320),
        ..Default::default()
    };
    let estimator = VisionEstimator::new(
        single_sample_config(),
        big_camera,
        Arc::new(MemoryTelemetrySink::new()),
    )
    .unwrap();
    let frame = CapturedFrame {
        sequence: 0,
        timestamp: 0.0,
        image: tex.mapv(|v| (20000.0 + 8000.0 * v).clamp(0.0, 65535.0) as u16),
    };

    estimator.on_frame_available(frame.clone(), geometry()).unwrap();
    let second = estimator.on_frame_available(frame, geometry());
    assert!(matches!(second, Err(VisionError::Contention)));

    assert!(estimator.wait_until_idle(WAIT));
    assert_eq!(estimator.pending_frames(), 1);
}

#[test]
fn test_inactive_estimator_ignores_frames() {
    init_logging();
    let tex = texture(240, 15);
    let estimator = VisionEstimator::new(
        single_sample_config(),
        camera(),
        Arc::new(MemoryTelemetrySink::new()),
    )
    .unwrap();

    submit_shifted_pairs(&estimator, &tex, -6, 0);
    assert!(!estimator.is_active());
    let samples = estimator.samples().len();

    estimator.on_frame_available(crop(&tex, 40, 40, 100), geometry()).unwrap();
    assert!(estimator.wait_until_idle(WAIT));
    assert_eq!(estimator.samples().len(), samples);
    assert_eq!(estimator.pending_frames(), 0);
}
