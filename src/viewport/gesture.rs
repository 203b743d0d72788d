//! Touch input as delivered by the host's gesture recognizer

use crate::page::{PointF, Rect};

/// Direction of a fling
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Diagonal,
    Up,
    Right,
    Down,
    Left,
}

/// Minimum travel (px) and speed (px/s) for a fling to count as directional
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FlingThresholds {
    pub distance: i32,
    pub velocity: i32,
}

impl Default for FlingThresholds {
    fn default() -> Self {
        Self {
            distance: 120,
            velocity: 1000,
        }
    }
}

/// Dominance ratio one axis needs over the other
const AXIS_DOMINANCE: f32 = 1.5;

impl FlingThresholds {
    /// Classify a gesture by its total travel and release velocity
    #[must_use]
    pub fn classify(&self, delta: PointF, velocity: PointF) -> Direction {
        let distance = self.distance as f32;
        let speed = self.velocity as f32;
        if delta.x.abs() > distance
            && velocity.x.abs() > speed
            && velocity.x.abs() > AXIS_DOMINANCE * velocity.y.abs()
        {
            if delta.x > 0.0 {
                Direction::Right
            } else {
                Direction::Left
            }
        } else if delta.y.abs() > distance
            && velocity.y.abs() > speed
            && velocity.y.abs() > AXIS_DOMINANCE * velocity.x.abs()
        {
            if delta.y > 0.0 {
                Direction::Down
            } else {
                Direction::Up
            }
        } else {
            Direction::Diagonal
        }
    }
}

/// Whether scroll `bounds` still allow travel in `direction`
#[must_use]
pub fn within_bounds_in_direction(bounds: &Rect, direction: Direction) -> bool {
    match direction {
        Direction::Diagonal => bounds.contains(0, 0),
        Direction::Left => bounds.left <= 0,
        Direction::Right => bounds.right >= 0,
        Direction::Up => bounds.top <= 0,
        Direction::Down => bounds.bottom >= 0,
    }
}

/// Drag step with a clearly dominant axis locked to that axis
#[must_use]
pub fn axis_locked(distance_x: f32, distance_y: f32) -> (f32, f32) {
    if distance_x.abs() > AXIS_DOMINANCE * distance_y.abs() {
        (distance_x, 0.0)
    } else if distance_y.abs() > AXIS_DOMINANCE * distance_x.abs() {
        (0.0, distance_y)
    } else {
        (distance_x, distance_y)
    }
}

/// How a touch sequence ended
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Release {
    /// Short touch without movement
    Tap,
    /// Release with velocity in px/s; `start` is where the touch went down
    Fling { start: PointF, velocity: PointF },
    /// Anything else
    Plain,
}

/// Recognized touch input
///
/// Drag distances follow the usual recognizer convention: previous position
/// minus current position.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TouchEvent {
    Down {
        position: PointF,
    },
    Drag {
        start: PointF,
        current: PointF,
        distance_x: f32,
        distance_y: f32,
    },
    Up {
        position: PointF,
        release: Release,
    },
    /// A tap not followed by a second one
    SingleTapConfirmed {
        position: PointF,
    },
    DoubleTap {
        position: PointF,
    },
    PinchBegin {
        focus: PointF,
    },
    Pinch {
        factor: f32,
        focus: PointF,
    },
    PinchEnd,
}
