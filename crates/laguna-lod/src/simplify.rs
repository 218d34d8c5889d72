//! Polygon ring simplification.

use glam::Vec2;

/// Simplification never returns fewer points than this.
pub const MIN_POINTS: usize = 3;

/// When the target keeps at least this share of the points, uniform
/// decimation is used instead of Douglas-Peucker.
pub const UNIFORM_DECIMATION_RATIO: f32 = 0.7;

/// Reduce `points` for a detail level in `(0, 1]`.
///
/// Light reductions stride through the ring; heavy reductions run
/// Douglas-Peucker with `epsilon`. Inputs with three or fewer points are
/// returned unchanged, and the result never has fewer than [`MIN_POINTS`].
pub fn simplify(points: &[Vec2], detail: f32, epsilon: f32) -> Vec<Vec2> {
    let n = points.len();
    if n <= MIN_POINTS {
        return points.to_vec();
    }

    let detail = if detail.is_finite() {
        detail.clamp(0.0, 1.0)
    } else {
        1.0
    };
    let target = ((n as f32 * detail).ceil() as usize).clamp(MIN_POINTS, n);
    if target == n {
        return points.to_vec();
    }

    if target as f32 >= UNIFORM_DECIMATION_RATIO * n as f32 {
        return uniform_decimate(points, target);
    }

    let reduced = douglas_peucker(points, epsilon);
    if reduced.len() < MIN_POINTS {
        uniform_decimate(points, MIN_POINTS)
    } else {
        reduced
    }
}

/// Keep the first and last points and stride evenly through the rest.
pub fn uniform_decimate(points: &[Vec2], target: usize) -> Vec<Vec2> {
    let n = points.len();
    let target = target.max(MIN_POINTS.min(n));
    if target >= n {
        return points.to_vec();
    }
    if target < 2 {
        return points[..target].to_vec();
    }

    let step = (n - 1) as f32 / (target - 1) as f32;
    let mut out = Vec::with_capacity(target);
    out.push(points[0]);
    for i in 1..target - 1 {
        let idx = (i as f32 * step).round() as usize;
        out.push(points[idx.min(n - 2)]);
    }
    out.push(points[n - 1]);
    out
}

/// Iterative Douglas-Peucker over an open polyline.
pub fn douglas_peucker(points: &[Vec2], epsilon: f32) -> Vec<Vec2> {
    let n = points.len();
    if n < 3 {
        return points.to_vec();
    }

    let mut keep = vec![false; n];
    keep[0] = true;
    keep[n - 1] = true;

    let mut stack = vec![(0usize, n - 1)];
    while let Some((start, end)) = stack.pop() {
        if end <= start + 1 {
            continue;
        }
        let (a, b) = (points[start], points[end]);
        let mut max_dist = 0.0f32;
        let mut max_idx = start;
        for (i, p) in points.iter().enumerate().take(end).skip(start + 1) {
            let d = perpendicular_distance(*p, a, b);
            if d > max_dist {
                max_dist = d;
                max_idx = i;
            }
        }
        if max_dist > epsilon {
            keep[max_idx] = true;
            stack.push((start, max_idx));
            stack.push((max_idx, end));
        }
    }

    points
        .iter()
        .zip(keep)
        .filter_map(|(p, k)| k.then_some(*p))
        .collect()
}

fn perpendicular_distance(p: Vec2, a: Vec2, b: Vec2) -> f32 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq <= f32::EPSILON {
        return p.distance(a);
    }
    (ab.perp_dot(p - a)).abs() / len_sq.sqrt()
}
