//! Mathematical structs and functions.

use cgmath::{InnerSpace, Vector2};

/// A 2D vector
pub type Vector2d = Vector2<f64>;

/// The signed angle from `a` to `b` in radians, in `(-pi, pi]`.
/// Positive angles are counter-clockwise.
pub fn signed_angle(a: Vector2d, b: Vector2d) -> f64 {
    f64::atan2(a.perp_dot(b), a.dot(b))
}

/// The clockwise bearing of a vector, in `[0, 2*pi)`, with zero at the
/// positive y axis. Used to order approaches around an intersection.
pub fn clockwise_bearing(v: Vector2d) -> f64 {
    let angle = f64::atan2(v.x, v.y);
    if angle < 0.0 {
        angle + 2.0 * std::f64::consts::PI
    } else {
        angle
    }
}
