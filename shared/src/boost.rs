//! Boost commands and the thread-safe impulse queue that carries them.

use nalgebra::Vector3;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A discrete linear or angular impulse request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LanderBoostCommand {
    /// Carried for interface compatibility; impulses are instantaneous
    pub duration_unused: f64,
    /// Body-frame direction and relative magnitude
    pub vector: Vector3<f64>,
    /// Reaction-wheel torque instead of a booster fire
    pub is_torque: bool,
}

impl LanderBoostCommand {
    pub fn linear(vector: Vector3<f64>) -> Self {
        Self {
            duration_unused: 0.0,
            vector,
            is_torque: false,
        }
    }

    pub fn torque(vector: Vector3<f64>) -> Self {
        Self {
            duration_unused: 0.0,
            vector,
            is_torque: true,
        }
    }
}

/// FIFO of boost commands shared between producers and the control unit.
///
/// Cloning yields another handle to the same queue, so input handlers on other
/// threads can push while the simulation thread drains.
#[derive(Debug, Clone, Default)]
pub struct ImpulseQueue {
    inner: Arc<Mutex<VecDeque<LanderBoostCommand>>>,
}

impl ImpulseQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> MutexGuard<'_, VecDeque<LanderBoostCommand>> {
        // A panicking producer cannot leave a VecDeque half-written
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a command at the back of the queue
    pub fn push(&self, command: LanderBoostCommand) {
        self.guard().push_back(command);
    }

    /// Convenience wrapper matching the manual-input call shape
    pub fn enqueue(&self, duration_unused: f64, x: f64, y: f64, z: f64, is_torque: bool) {
        self.push(LanderBoostCommand {
            duration_unused,
            vector: Vector3::new(x, y, z),
            is_torque,
        });
    }

    /// Remove and return the oldest command
    pub fn pop(&self) -> Option<LanderBoostCommand> {
        self.guard().pop_front()
    }

    pub fn len(&self) -> usize {
        self.guard().len()
    }

    pub fn is_empty(&self) -> bool {
        self.guard().is_empty()
    }

    /// Drop every pending command
    pub fn clear(&self) {
        self.guard().clear();
    }
}
