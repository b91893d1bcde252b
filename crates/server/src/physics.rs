//! Geometry and physics primitives.
//!
//! Mass drives everything: radius grows with the square root of mass and
//! speed falls off logarithmically. Overlap is measured against the
//! smaller circle so that a graze never counts as an eat.

use crate::config::Config;
use glam::Vec2;

/// Mass-derived radius and speed curves.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MassCurve {
    pub radius_base: f32,
    pub radius_scale: f32,
    pub base_speed: f32,
    pub slow_base: f32,
    pub start_mass: f32,
    pub min_speed: f32,
    pub max_speed: f32,
}

impl MassCurve {
    pub fn from_config(config: &Config) -> Self {
        let m = &config.movement;
        Self {
            radius_base: m.radius_base,
            radius_scale: m.radius_scale,
            base_speed: m.base_speed,
            slow_base: m.slow_base,
            start_mass: config.player.start_mass,
            min_speed: m.min_speed,
            max_speed: m.max_speed,
        }
    }

    /// Radius for a mass. Monotonic increasing and concave.
    #[inline]
    pub fn radius(&self, mass: f32) -> f32 {
        self.radius_base + mass.max(0.0).sqrt() * self.radius_scale
    }

    /// Speed in world units per second. Monotonic decreasing in mass,
    /// clamped to `[min_speed, max_speed]`.
    pub fn speed(&self, mass: f32) -> f32 {
        let base = self.slow_base.ln();
        let slow_down = (mass.max(f32::MIN_POSITIVE).ln() - self.start_mass.max(f32::MIN_POSITIVE).ln()) / base + 1.0;
        if slow_down <= 0.0 {
            return self.max_speed;
        }
        (self.base_speed / slow_down).clamp(self.min_speed, self.max_speed)
    }
}

impl Default for MassCurve {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Exact overlap between two circles.
#[derive(Debug, Clone, Copy)]
pub struct Overlap {
    /// Vector from the first centre to the second.
    pub delta: Vec2,
    /// Distance between the centres.
    pub distance: f32,
    /// Combined radius minus distance; positive when the circles intersect.
    pub depth: f32,
    /// How much of the smaller circle's diameter is inside the other, in `[0, 1]`.
    pub fraction: f32,
}

impl Overlap {
    /// True when the circles intersect and at least `threshold` of the
    /// smaller one has sunk in.
    #[inline]
    pub fn covers(&self, threshold: f32) -> bool {
        self.depth > 0.0 && self.fraction >= threshold
    }
}

/// Measure the overlap of two circles.
#[inline]
pub fn overlap(a: Vec2, a_radius: f32, b: Vec2, b_radius: f32) -> Overlap {
    let delta = b - a;
    let distance = delta.length();
    let depth = a_radius + b_radius - distance;
    let smaller = a_radius.min(b_radius);
    let fraction = if depth <= 0.0 {
        0.0
    } else if smaller <= 0.0 {
        1.0
    } else {
        (depth / (2.0 * smaller)).min(1.0)
    };
    Overlap {
        delta,
        distance,
        depth,
        fraction,
    }
}

/// Unit vector from `from` to `to`, or `fallback` when they coincide.
#[inline]
pub fn direction(from: Vec2, to: Vec2, fallback: Vec2) -> Vec2 {
    (to - from).try_normalize().unwrap_or(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_radius_is_increasing_and_concave() {
        let curve = MassCurve::default();
        let r10 = curve.radius(10.0);
        let r20 = curve.radius(20.0);
        let r30 = curve.radius(30.0);
        assert!(r20 > r10 && r30 > r20);
        assert!(r30 - r20 < r20 - r10);
    }

    #[test]
    fn test_speed_is_decreasing_and_clamped() {
        let curve = MassCurve::default();
        assert!(curve.speed(10.0) > curve.speed(100.0));
        assert!(curve.speed(100.0) > curve.speed(1000.0));
        assert_eq!(curve.speed(0.01), curve.max_speed);
        assert_eq!(curve.speed(1.0e12), curve.min_speed);
        assert!((curve.speed(curve.start_mass) - curve.base_speed).abs() < 1e-3);
    }

    #[test]
    fn test_overlap_fraction() {
        // Centre of the small circle exactly on the big one's edge.
        let o = overlap(Vec2::ZERO, 50.0, Vec2::new(50.0, 0.0), 10.0);
        assert!((o.fraction - 0.5).abs() < 1e-6);
        assert!(o.covers(0.5));
        assert!(!o.covers(0.6));

        let inside = overlap(Vec2::ZERO, 50.0, Vec2::new(5.0, 0.0), 10.0);
        assert_eq!(inside.fraction, 1.0);
    }

    #[test]
    fn test_graze_is_not_overlap() {
        let o = overlap(Vec2::ZERO, 10.0, Vec2::new(20.0, 0.0), 10.0);
        assert_eq!(o.depth, 0.0);
        assert!(!o.covers(0.0));
    }

    #[test]
    fn test_direction_fallback() {
        let fallback = Vec2::X;
        assert_eq!(direction(Vec2::ONE, Vec2::ONE, fallback), fallback);
        let d = direction(Vec2::ZERO, Vec2::new(0.0, 3.0), fallback);
        assert!((d - Vec2::Y).length() < 1e-6);
    }
}
