//! Elementary potential flows evaluated at a point.
//!
//! Every flow returns the velocity induced at `point` by a singularity placed
//! at `source`. Singular points yield a zero vector instead of infinities.

use reconflow_core::Vector2;

/// Counter-rotating vortex centred on `source`.
#[must_use]
pub fn vortex(source: Vector2, point: Vector2) -> Vector2 {
    let offset = point - source;
    let r2 = offset.length_squared();
    if r2 == 0.0 {
        return Vector2::ZERO;
    }
    Vector2::new(offset.y() / r2, -offset.x() / r2)
}

/// Radial source centred on `source`; negate it for a sink.
#[must_use]
pub fn source(source: Vector2, point: Vector2) -> Vector2 {
    let offset = point - source;
    let r2 = offset.length_squared();
    if r2 == 0.0 {
        return Vector2::ZERO;
    }
    offset / r2
}

/// Circle theorem image of a vortex around a round obstacle.
///
/// `a2` is the squared obstacle radius and `center` the point the flow
/// circulates around.
#[must_use]
pub fn obstacle_vortex(obstacle: Vector2, point: Vector2, center: Vector2, a2: f64) -> Vector2 {
    let Some(terms) = ImageTerms::new(obstacle, point, center, a2) else {
        return Vector2::ZERO;
    };
    Vector2::new(terms.along_y() / terms.deno, -terms.along_x() / terms.deno)
}

/// Circle theorem image of a source around a round obstacle.
#[must_use]
pub fn obstacle_source(obstacle: Vector2, point: Vector2, center: Vector2, a2: f64) -> Vector2 {
    let Some(terms) = ImageTerms::new(obstacle, point, center, a2) else {
        return Vector2::ZERO;
    };
    Vector2::new(-terms.along_x() / terms.deno, -terms.along_y() / terms.deno)
}

/// Source whose strength is focused along the direction `source -> target`.
///
/// `bias` is the ratio between the attack range and the emitter's radius;
/// larger values give a narrower, longer needle.
#[must_use]
pub fn needle(source_at: Vector2, point: Vector2, target: Vector2, bias: f64) -> Vector2 {
    let aim = target - source_at;
    let offset = point - source_at;
    if aim.is_zero() || offset.is_zero() {
        return Vector2::ZERO;
    }

    let radial = source(source_at, point);
    let cosn = 1.0 / bias.max(1.0);
    let cost = aim.cos(offset);
    if cost < cosn {
        return radial;
    }

    let sinn = (1.0 - cosn * cosn).max(0.0).sqrt();
    let sint = aim.sin(offset);
    let spread = if sint >= 0.0 {
        cosn * cost + sinn * sint
    } else {
        cosn * cost - sinn * sint
    };
    if spread == 0.0 {
        return radial;
    }
    radial * (1.0 / spread)
}

struct ImageTerms {
    x: f64,
    y: f64,
    xc: f64,
    yc: f64,
    a2: f64,
    deno: f64,
}

impl ImageTerms {
    fn new(obstacle: Vector2, point: Vector2, center: Vector2, a2: f64) -> Option<Self> {
        let (x, y) = (point.x() - obstacle.x(), point.y() - obstacle.y());
        let (xc, yc) = (center.x() - obstacle.x(), center.y() - obstacle.y());
        let r2 = x * x + y * y;
        let deno = r2 * (a2 * a2 - 2.0 * a2 * (x * xc + y * yc) + r2 * (xc * xc + yc * yc));
        (deno != 0.0 && deno.is_finite()).then_some(Self {
            x,
            y,
            xc,
            yc,
            a2,
            deno,
        })
    }

    fn along_x(&self) -> f64 {
        let Self { x, y, xc, yc, a2, .. } = *self;
        a2 * (a2 * x - 2.0 * x * y * yc - x * x * xc + y * y * xc)
    }

    fn along_y(&self) -> f64 {
        let Self { x, y, xc, yc, a2, .. } = *self;
        a2 * (a2 * y - 2.0 * x * y * xc - y * y * yc + x * x * yc)
    }
}
