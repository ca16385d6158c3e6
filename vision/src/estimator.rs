//! Frame intake and the background worker that turns frame pairs into
//! angular-velocity samples.
//!
//! The simulation thread only ever `try_lock`s the working set, so a frame
//! arriving while the previous one is still being processed is refused with
//! [`VisionError::Contention`] instead of stalling the tick. The worker holds
//! the lock for the whole of its processing run and clears the busy flag when
//! done, even if processing panics. A panicked worker is reported as
//! [`VisionError::WorkerStopped`] on the next submission.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use lander_math::{
    cross_check_match, decompose_homography, find_homography_ransac, keep_best_matches,
};
use nalgebra::{Vector2, Vector3};
use shared::camera_model::CameraModel;
use shared::collaborators::CapturedFrame;
use shared::telemetry::{telemetry_line, LogChannel, TelemetrySink};

use crate::aggregation::{aggregate_samples, AngularSample};
use crate::features::{detect_and_describe, Descriptor, Keypoint};
use crate::motion::{select_angular_velocity, MotionContext};
use crate::{VisionConfig, VisionError};

/// Geometry measured when a capture was requested
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameGeometry {
    /// Distance from the camera to the surface along the optical axis
    pub altitude: f64,
    /// Distance from the asteroid centre to the surface point under the camera
    pub radius: f64,
    pub asteroid_scale: i32,
}

/// Lock-stepped per-frame queues plus the accumulated samples
#[derive(Default)]
struct WorkingSet {
    frames: VecDeque<CapturedFrame>,
    keypoints: VecDeque<Vec<Keypoint>>,
    descriptors: VecDeque<Vec<Descriptor>>,
    geometry: VecDeque<FrameGeometry>,
    samples: Vec<AngularSample>,
    busy: bool,
}

impl WorkingSet {
    fn measured_count(&self) -> usize {
        self.samples.iter().filter(|s| s.measured().is_some()).count()
    }

    fn pop_front_pair(&mut self) {
        for _ in 0..2 {
            self.frames.pop_front();
            self.keypoints.pop_front();
            self.descriptors.pop_front();
            self.geometry.pop_front();
        }
    }
}

struct Shared {
    working: Mutex<WorkingSet>,
    estimate: Mutex<Option<Vector3<f64>>>,
    complete: AtomicBool,
    /// Set when the worker dies mid-frame
    stopped: AtomicBool,
}

/// Working set held by the worker for one frame.
///
/// Dropping it clears the busy flag; during a panic it first marks the
/// worker stopped.
struct InFlight<'a> {
    shared: &'a Shared,
    working: MutexGuard<'a, WorkingSet>,
}

impl<'a> InFlight<'a> {
    fn acquire(shared: &'a Shared) -> Self {
        let working = shared.working.lock().unwrap_or_else(PoisonError::into_inner);
        Self { shared, working }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.shared.stopped.store(true, Ordering::Release);
        }
        self.working.busy = false;
    }
}

/// State the worker needs besides the shared working set
struct WorkerContext {
    shared: Arc<Shared>,
    config: VisionConfig,
    camera: CameraModel,
    telemetry: Arc<dyn TelemetrySink>,
}

/// Estimates the asteroid's angular velocity from consecutive nadir frames.
pub struct VisionEstimator {
    shared: Arc<Shared>,
    sender: Option<Sender<CapturedFrame>>,
    worker: Option<JoinHandle<()>>,
}

impl VisionEstimator {
    /// Validate the configuration and start the worker thread.
    pub fn new(
        config: VisionConfig,
        camera: CameraModel,
        telemetry: Arc<dyn TelemetrySink>,
    ) -> Result<Self, VisionError> {
        config.validate()?;

        let shared = Arc::new(Shared {
            working: Mutex::new(WorkingSet::default()),
            estimate: Mutex::new(None),
            complete: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
        });
        let (sender, receiver) = bounded::<CapturedFrame>(1);
        let context = WorkerContext {
            shared: shared.clone(),
            config,
            camera,
            telemetry,
        };

        let worker = thread::Builder::new()
            .name("vision-worker".to_string())
            .spawn(move || run_worker(context, receiver))?;

        Ok(Self {
            shared,
            sender: Some(sender),
            worker: Some(worker),
        })
    }

    /// Submit a captured frame with the geometry recorded at capture time.
    ///
    /// Does nothing once the estimate is complete.
    ///
    /// # Errors
    /// * `VisionError::Contention` - A previous frame is still being processed
    /// * `VisionError::WorkerStopped` - The worker thread has exited
    pub fn on_frame_available(
        &self,
        frame: CapturedFrame,
        geometry: FrameGeometry,
    ) -> Result<(), VisionError> {
        if !self.is_active() {
            return Ok(());
        }
        if self.shared.stopped.load(Ordering::Acquire) {
            return Err(VisionError::WorkerStopped);
        }

        let mut working = match self.shared.working.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => return Err(VisionError::Contention),
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        };
        if working.busy {
            return Err(VisionError::Contention);
        }

        let sender = self.sender.as_ref().ok_or(VisionError::WorkerStopped)?;
        working.busy = true;
        working.geometry.push_back(geometry);

        match sender.try_send(frame) {
            Ok(()) => Ok(()),
            Err(e) => {
                working.busy = false;
                working.geometry.pop_back();
                match e {
                    TrySendError::Full(_) => Err(VisionError::Contention),
                    TrySendError::Disconnected(_) => Err(VisionError::WorkerStopped),
                }
            }
        }
    }

    /// False once the target sample count has been reached
    pub fn is_active(&self) -> bool {
        !self.shared.complete.load(Ordering::Acquire)
    }

    /// Aggregated estimate, available once the estimator is inactive
    pub fn final_estimate(&self) -> Option<Vector3<f64>> {
        if !self.shared.complete.load(Ordering::Acquire) {
            return None;
        }
        *self
            .shared
            .estimate
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of every sample recorded so far
    pub fn samples(&self) -> Vec<AngularSample> {
        self.lock_working().samples.clone()
    }

    pub fn measured_sample_count(&self) -> usize {
        self.lock_working().measured_count()
    }

    /// Frames waiting for a partner
    pub fn pending_frames(&self) -> usize {
        self.lock_working().frames.len()
    }

    /// Block until no frame is in flight or `timeout` elapses.
    ///
    /// Returns `true` if the worker went idle.
    pub fn wait_until_idle(&self, timeout: Duration) -> bool {
        let start = Instant::now();
        loop {
            if !self.lock_working().busy {
                return true;
            }
            if start.elapsed() >= timeout {
                return false;
            }
            thread::sleep(Duration::from_millis(1));
        }
    }

    fn lock_working(&self) -> MutexGuard<'_, WorkingSet> {
        self.shared
            .working
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for VisionEstimator {
    fn drop(&mut self) {
        // Closing the channel ends the worker loop
        self.sender.take();
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                log::error!("Vision worker panicked");
            }
        }
    }
}

fn run_worker(context: WorkerContext, receiver: Receiver<CapturedFrame>) {
    log::debug!("Vision worker started");
    for frame in receiver.iter() {
        let mut in_flight = InFlight::acquire(&context.shared);
        process_frame(&context, &mut in_flight.working, frame);
    }
    log::debug!("Vision worker stopped");
}

fn process_frame(context: &WorkerContext, working: &mut WorkingSet, frame: CapturedFrame) {
    let features = detect_and_describe(&frame.image, &context.config.detector);
    log::debug!(
        "Frame {} at t = {:.3}: {} keypoints",
        frame.sequence,
        frame.timestamp,
        features.len()
    );

    working.frames.push_back(frame);
    working.keypoints.push_back(features.keypoints);
    working.descriptors.push_back(features.descriptors);

    if working.frames.len() < 2 || working.geometry.len() < 2 {
        return;
    }

    if let Some(sample) = process_pair(context, working) {
        if let AngularSample::Measured(omega) = sample {
            let timestamp = working.frames[1].timestamp;
            context.telemetry.append(
                LogChannel::Estimation,
                &telemetry_line(timestamp, &[omega.x, omega.y, omega.z]),
            );
        }
        working.samples.push(sample);
    }
    working.pop_front_pair();

    let measured = working.measured_count();
    if measured >= context.config.target_samples {
        publish_estimate(context, working);
    }
}

/// Match, fit and decompose the two oldest frames.
///
/// `None` means the pair was abandoned before decomposition.
fn process_pair(context: &WorkerContext, working: &WorkingSet) -> Option<AngularSample> {
    let config = &context.config;
    let matches = keep_best_matches(
        cross_check_match(&working.descriptors[0], &working.descriptors[1]),
        config.max_matches,
    );
    if matches.len() < config.min_matches {
        log::warn!(
            "Only {} matches between frames {} and {}, need {}",
            matches.len(),
            working.frames[0].sequence,
            working.frames[1].sequence,
            config.min_matches
        );
        return None;
    }

    let (src, dst): (Vec<Vector2<f64>>, Vec<Vector2<f64>>) = matches
        .iter()
        .map(|m| {
            let a = &working.keypoints[0][m.query_idx];
            let b = &working.keypoints[1][m.train_idx];
            (Vector2::new(a.x, a.y), Vector2::new(b.x, b.y))
        })
        .unzip();

    let fit = match find_homography_ransac(&src, &dst, &config.ransac_config()) {
        Ok(fit) => fit,
        Err(e) => {
            log::warn!("Homography fit failed: {e}");
            return None;
        }
    };

    let (g0, g1) = (working.geometry[0], working.geometry[1]);
    let motion = MotionContext {
        altitude: 0.5 * (g0.altitude + g1.altitude),
        radius: 0.5 * (g0.radius + g1.radius),
        asteroid_scale: g1.asteroid_scale,
        period: config.imaging_period,
    };
    let intrinsics = context.camera.intrinsics(motion.asteroid_scale);

    let candidates = match decompose_homography(&fit.homography, &intrinsics) {
        Ok(candidates) => candidates,
        Err(e) => {
            log::warn!("Homography decomposition failed: {e}");
            return Some(AngularSample::NoSolution);
        }
    };

    match select_angular_velocity(&candidates, &context.camera, &motion, config) {
        Some(omega) => {
            log::info!(
                "Angular velocity sample ({:.6}, {:.6}, {:.6}) from {} inliers",
                omega.x,
                omega.y,
                omega.z,
                fit.inlier_count
            );
            Some(AngularSample::Measured(omega))
        }
        None => {
            log::debug!("No plausible motion among {} candidates", candidates.len());
            Some(AngularSample::NoSolution)
        }
    }
}

fn publish_estimate(context: &WorkerContext, working: &WorkingSet) {
    let Some(estimate) = aggregate_samples(&working.samples) else {
        return;
    };
    log::info!(
        "Angular velocity estimate ({:.6}, {:.6}, {:.6}) from {} samples",
        estimate.x,
        estimate.y,
        estimate.z,
        working.measured_count()
    );
    *context
        .shared
        .estimate
        .lock()
        .unwrap_or_else(PoisonError::into_inner) = Some(estimate);
    context.shared.complete.store(true, Ordering::Release);
}
