//! Time-driven scroll physics: eased scrolls and decelerating flings

use std::time::Duration;

use crate::page::Point;

/// Deceleration applied to flings, in px/s²
pub const FLING_DECELERATION: f32 = 4000.0;

#[derive(Clone, Copy, Debug, PartialEq)]
enum Motion {
    Scroll {
        start: Point,
        delta: Point,
        duration: Duration,
    },
    Fling {
        start: Point,
        /// Unit direction of travel
        direction: (f32, f32),
        speed: f32,
        duration: Duration,
        min: Point,
        max: Point,
    },
}

/// Scroll animation driven by an explicit clock
#[derive(Clone, Debug, PartialEq)]
pub struct Scroller {
    motion: Option<Motion>,
    started: Duration,
    current: Point,
    finished: bool,
}

impl Default for Scroller {
    fn default() -> Self {
        Self {
            motion: None,
            started: Duration::ZERO,
            current: Point::default(),
            finished: true,
        }
    }
}

fn ease_out_cubic(t: f32) -> f32 {
    let inv = 1.0 - t;
    1.0 - inv * inv * inv
}

impl Scroller {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Stop where the animation currently is
    pub fn force_finished(&mut self) {
        self.finished = true;
    }

    pub fn current(&self) -> Point {
        self.current
    }

    /// Move by `delta` from `start` over `duration`
    pub fn start_scroll(&mut self, now: Duration, start: Point, delta: Point, duration: Duration) {
        self.motion = Some(Motion::Scroll {
            start,
            delta,
            duration,
        });
        self.started = now;
        self.current = start;
        self.finished = false;
    }

    /// Coast from `start` at `velocity` px/s, staying within `min`..=`max`
    pub fn fling(&mut self, now: Duration, start: Point, velocity: Point, min: Point, max: Point) {
        let (vx, vy) = (velocity.x as f32, velocity.y as f32);
        let speed = vx.hypot(vy);
        let direction = if speed > 0.0 {
            (vx / speed, vy / speed)
        } else {
            (0.0, 0.0)
        };
        self.motion = Some(Motion::Fling {
            start,
            direction,
            speed,
            duration: Duration::from_secs_f32(speed / FLING_DECELERATION),
            min,
            max,
        });
        self.started = now;
        self.current = start;
        self.finished = false;
    }

    /// Update the current position for `now`; false once the animation is over
    pub fn compute_offset(&mut self, now: Duration) -> bool {
        if self.finished {
            return false;
        }
        let Some(motion) = self.motion else {
            self.finished = true;
            return false;
        };
        let elapsed = now.saturating_sub(self.started);

        match motion {
            Motion::Scroll {
                start,
                delta,
                duration,
            } => {
                if elapsed >= duration {
                    self.current = Point::new(start.x + delta.x, start.y + delta.y);
                    self.finished = true;
                } else {
                    let t = ease_out_cubic(elapsed.as_secs_f32() / duration.as_secs_f32());
                    self.current = Point::new(
                        start.x + (delta.x as f32 * t).round() as i32,
                        start.y + (delta.y as f32 * t).round() as i32,
                    );
                }
            }
            Motion::Fling {
                start,
                direction,
                speed,
                duration,
                min,
                max,
            } => {
                let t = elapsed.min(duration).as_secs_f32();
                let travelled = speed * t - FLING_DECELERATION * t * t / 2.0;
                let x = start.x + (direction.0 * travelled).round() as i32;
                let y = start.y + (direction.1 * travelled).round() as i32;
                self.current = Point::new(x.max(min.x).min(max.x), y.max(min.y).min(max.y));
                if elapsed >= duration {
                    self.finished = true;
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    #[test]
    fn scroll_reaches_target() {
        let mut scroller = Scroller::new();
        scroller.start_scroll(ms(0), Point::new(0, 0), Point::new(100, -40), ms(400));
        assert!(!scroller.is_finished());

        assert!(scroller.compute_offset(ms(200)));
        let mid = scroller.current();
        assert!(mid.x > 50 && mid.x < 100);

        assert!(scroller.compute_offset(ms(400)));
        assert_eq!(scroller.current(), Point::new(100, -40));
        assert!(scroller.is_finished());
        assert!(!scroller.compute_offset(ms(500)));
    }

    #[test]
    fn fling_decelerates_and_is_clamped() {
        let mut scroller = Scroller::new();
        scroller.fling(
            ms(0),
            Point::new(0, 0),
            Point::new(2000, 0),
            Point::new(-300, 0),
            Point::new(300, 0),
        );
        scroller.compute_offset(ms(100));
        let early = scroller.current().x;
        assert!(early > 0 && early < 300);

        scroller.compute_offset(ms(1000));
        assert_eq!(scroller.current(), Point::new(300, 0));
        assert!(scroller.is_finished());
    }

    #[test]
    fn force_finished_keeps_position() {
        let mut scroller = Scroller::new();
        scroller.start_scroll(ms(0), Point::new(0, 0), Point::new(100, 0), ms(400));
        scroller.compute_offset(ms(100));
        let at = scroller.current();
        scroller.force_finished();
        assert!(scroller.is_finished());
        assert!(!scroller.compute_offset(ms(400)));
        assert_eq!(scroller.current(), at);
    }
}
