//! Time of impact by conservative advancement along separating axes.

use std::time::Instant;

use crate::common::settings::{LINEAR_SLOP, MAX_POLYGON_VERTICES};
use crate::math::{Real, Scalar, Sweep, Vec2};

use super::distance::{distance, DistanceInput, DistanceProxy, SimplexCache};

/// Outer iterations before the root finder is considered stuck.
pub const MAX_TOI_ITERATIONS: usize = 20;
/// Root finder iterations per push-back step.
pub const MAX_ROOT_ITERATIONS: usize = 50;

/// Input parameters for [`time_of_impact`].
#[derive(Debug, Clone, Copy)]
pub struct ToiInput<'a> {
    pub proxy_a: DistanceProxy<'a>,
    pub proxy_b: DistanceProxy<'a>,
    pub sweep_a: Sweep,
    pub sweep_b: Sweep,
    /// Defines the sweep interval `[0, t_max]`.
    pub t_max: Real,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToiState {
    Unknown,
    Failed,
    Overlapped,
    Touching,
    Separated,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToiOutput {
    pub state: ToiState,
    pub time: Real,
}

/// Counters describing TOI workload. Owned by the caller and passed in
/// explicitly, typically one per world.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ToiStats {
    pub calls: u32,
    pub iters: u32,
    pub max_iters: u32,
    pub root_iters: u32,
    pub max_root_iters: u32,
    /// Accumulated wall time in milliseconds.
    pub time: f64,
    pub max_time: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SeparationType {
    Points,
    FaceA,
    FaceB,
}

struct SeparationFunction<'a> {
    proxy_a: &'a DistanceProxy<'a>,
    proxy_b: &'a DistanceProxy<'a>,
    sweep_a: Sweep,
    sweep_b: Sweep,
    kind: SeparationType,
    local_point: Vec2,
    axis: Vec2,
}

impl<'a> SeparationFunction<'a> {
    fn new(
        cache: &SimplexCache,
        proxy_a: &'a DistanceProxy<'a>,
        sweep_a: Sweep,
        proxy_b: &'a DistanceProxy<'a>,
        sweep_b: Sweep,
        t1: Real,
    ) -> Self {
        let count = cache.count;
        debug_assert!(0 < count && count < 3);

        let xf_a = sweep_a.get_transform(t1);
        let xf_b = sweep_b.get_transform(t1);

        let mut f = SeparationFunction {
            proxy_a,
            proxy_b,
            sweep_a,
            sweep_b,
            kind: SeparationType::Points,
            local_point: Vec2::ZERO,
            axis: Vec2::ZERO,
        };

        if count == 1 {
            let point_a = xf_a.apply(proxy_a.vertex(cache.index_a[0] as usize));
            let point_b = xf_b.apply(proxy_b.vertex(cache.index_b[0] as usize));
            f.axis = point_b - point_a;
            f.axis.normalize_mut();
        } else if cache.index_a[0] == cache.index_a[1] {
            // Two points on B and one on A.
            f.kind = SeparationType::FaceB;
            let local_point_b1 = proxy_b.vertex(cache.index_b[0] as usize);
            let local_point_b2 = proxy_b.vertex(cache.index_b[1] as usize);

            f.axis = (local_point_b2 - local_point_b1).cross_scalar(Real::ONE).normalize();
            let normal = xf_b.q.apply(f.axis);

            f.local_point = (local_point_b1 + local_point_b2) * Real::HALF;
            let point_b = xf_b.apply(f.local_point);
            let point_a = xf_a.apply(proxy_a.vertex(cache.index_a[0] as usize));

            if (point_a - point_b).dot(normal) < Real::ZERO {
                f.axis = -f.axis;
            }
        } else {
            // Two points on A and one or two points on B.
            f.kind = SeparationType::FaceA;
            let local_point_a1 = proxy_a.vertex(cache.index_a[0] as usize);
            let local_point_a2 = proxy_a.vertex(cache.index_a[1] as usize);

            f.axis = (local_point_a2 - local_point_a1).cross_scalar(Real::ONE).normalize();
            let normal = xf_a.q.apply(f.axis);

            f.local_point = (local_point_a1 + local_point_a2) * Real::HALF;
            let point_a = xf_a.apply(f.local_point);
            let point_b = xf_b.apply(proxy_b.vertex(cache.index_b[0] as usize));

            if (point_b - point_a).dot(normal) < Real::ZERO {
                f.axis = -f.axis;
            }
        }
        f
    }

    /// Deepest points at `t` along the axis, with their separation.
    fn find_min_separation(&self, t: Real) -> (usize, usize, Real) {
        let xf_a = self.sweep_a.get_transform(t);
        let xf_b = self.sweep_b.get_transform(t);

        match self.kind {
            SeparationType::Points => {
                let axis_a = xf_a.q.apply_inverse(self.axis);
                let axis_b = xf_b.q.apply_inverse(-self.axis);

                let index_a = self.proxy_a.support(axis_a);
                let index_b = self.proxy_b.support(axis_b);

                let point_a = xf_a.apply(self.proxy_a.vertex(index_a));
                let point_b = xf_b.apply(self.proxy_b.vertex(index_b));

                (index_a, index_b, (point_b - point_a).dot(self.axis))
            }
            SeparationType::FaceA => {
                let normal = xf_a.q.apply(self.axis);
                let point_a = xf_a.apply(self.local_point);

                let axis_b = xf_b.q.apply_inverse(-normal);
                let index_b = self.proxy_b.support(axis_b);
                let point_b = xf_b.apply(self.proxy_b.vertex(index_b));

                (0, index_b, (point_b - point_a).dot(normal))
            }
            SeparationType::FaceB => {
                let normal = xf_b.q.apply(self.axis);
                let point_b = xf_b.apply(self.local_point);

                let axis_a = xf_a.q.apply_inverse(-normal);
                let index_a = self.proxy_a.support(axis_a);
                let point_a = xf_a.apply(self.proxy_a.vertex(index_a));

                (index_a, 0, (point_a - point_b).dot(normal))
            }
        }
    }

    fn evaluate(&self, index_a: usize, index_b: usize, t: Real) -> Real {
        let xf_a = self.sweep_a.get_transform(t);
        let xf_b = self.sweep_b.get_transform(t);

        match self.kind {
            SeparationType::Points => {
                let point_a = xf_a.apply(self.proxy_a.vertex(index_a));
                let point_b = xf_b.apply(self.proxy_b.vertex(index_b));
                (point_b - point_a).dot(self.axis)
            }
            SeparationType::FaceA => {
                let normal = xf_a.q.apply(self.axis);
                let point_a = xf_a.apply(self.local_point);
                let point_b = xf_b.apply(self.proxy_b.vertex(index_b));
                (point_b - point_a).dot(normal)
            }
            SeparationType::FaceB => {
                let normal = xf_b.q.apply(self.axis);
                let point_b = xf_b.apply(self.local_point);
                let point_a = xf_a.apply(self.proxy_a.vertex(index_a));
                (point_a - point_b).dot(normal)
            }
        }
    }
}

/// Compute the upper bound on time before two shapes penetrate. Time is
/// represented as a fraction in `[0, t_max]`. This uses a swept separating
/// axis and may miss some intermediate, non-tunneling collisions. If you
/// change the time interval, call this again.
///
/// Use [`distance`] to compute the contact point and normal at the time of impact.
pub fn time_of_impact(input: &ToiInput<'_>, stats: Option<&mut ToiStats>) -> ToiOutput {
    let timer = Instant::now();
    let mut iters = 0u32;
    let mut root_iters = 0u32;
    let mut max_root_iters = 0u32;

    let mut output = ToiOutput {
        state: ToiState::Unknown,
        time: input.t_max,
    };

    let proxy_a = &input.proxy_a;
    let proxy_b = &input.proxy_b;

    // Large rotations can make the root finder fail, so we normalize the sweep angles.
    let mut sweep_a = input.sweep_a;
    let mut sweep_b = input.sweep_b;
    sweep_a.normalize();
    sweep_b.normalize();

    let t_max = input.t_max;

    let total_radius = proxy_a.radius + proxy_b.radius;
    let target = LINEAR_SLOP.max(total_radius - Real::from_f32(3.0) * LINEAR_SLOP);
    let tolerance = Real::from_f32(0.25) * LINEAR_SLOP;
    debug_assert!(target > tolerance);

    let mut t1: Real = Real::ZERO;

    // Prepare input for distance query.
    let mut cache = SimplexCache::default();
    let mut distance_input = DistanceInput {
        proxy_a: input.proxy_a,
        proxy_b: input.proxy_b,
        transform_a: sweep_a.get_transform(t1),
        transform_b: sweep_b.get_transform(t1),
        use_radii: false,
    };

    // The outer loop progressively attempts to compute new separating axes.
    // This loop terminates when an axis is repeated (no progress is made).
    loop {
        distance_input.transform_a = sweep_a.get_transform(t1);
        distance_input.transform_b = sweep_b.get_transform(t1);

        // Get the distance between shapes. We can also use the results
        // to get a separating axis.
        let distance_output = distance(&distance_input, &mut cache);

        // If the shapes are overlapped, we give up on continuous collision.
        if distance_output.distance <= Real::ZERO {
            // Failure!
            output = ToiOutput {
                state: ToiState::Overlapped,
                time: Real::ZERO,
            };
            break;
        }

        if distance_output.distance < target + tolerance {
            // Victory!
            output = ToiOutput {
                state: ToiState::Touching,
                time: t1,
            };
            break;
        }

        // Initialize the separating axis.
        let fcn = SeparationFunction::new(&cache, proxy_a, sweep_a, proxy_b, sweep_b, t1);

        // Compute the TOI on the separating axis. We do this by successively
        // resolving the deepest point. This loop is bounded by the number of vertices.
        let mut done = false;
        let mut t2 = t_max;
        let mut push_back_iter = 0;
        loop {
            // Find the deepest point at t2. Store the witness point indices.
            let (index_a, index_b, mut s2) = fcn.find_min_separation(t2);

            // Is the final configuration separated?
            if s2 > target + tolerance {
                // Victory!
                output = ToiOutput {
                    state: ToiState::Separated,
                    time: t_max,
                };
                done = true;
                break;
            }

            // Has the separation reached tolerance?
            if s2 > target - tolerance {
                // Advance the sweeps
                t1 = t2;
                break;
            }

            // Compute the initial separation of the witness points.
            let mut s1 = fcn.evaluate(index_a, index_b, t1);

            // Check for initial overlap. This might happen if the root finder
            // runs out of iterations.
            if s1 < target - tolerance {
                output = ToiOutput {
                    state: ToiState::Failed,
                    time: t1,
                };
                done = true;
                break;
            }

            // Check for touching
            if s1 <= target + tolerance {
                // Victory! t1 should hold the TOI (could be 0.0).
                output = ToiOutput {
                    state: ToiState::Touching,
                    time: t1,
                };
                done = true;
                break;
            }

            // Compute 1D root of: f(x) - target = 0
            let mut root_iter_count = 0u32;
            let mut a1 = t1;
            let mut a2 = t2;
            loop {
                // Use a mix of the secant rule and bisection.
                let t = if root_iter_count & 1 == 1 {
                    // Secant rule to improve convergence.
                    a1 + (target - s1) * (a2 - a1) / (s2 - s1)
                } else {
                    // Bisection to guarantee progress.
                    Real::HALF * (a1 + a2)
                };
                root_iter_count += 1;
                root_iters += 1;

                let s = fcn.evaluate(index_a, index_b, t);

                if (s - target).abs() < tolerance {
                    // t2 holds a tentative value for t1
                    t2 = t;
                    break;
                }

                // Ensure we continue to bracket the root.
                if s > target {
                    a1 = t;
                    s1 = s;
                } else {
                    a2 = t;
                    s2 = s;
                }

                if root_iter_count as usize == MAX_ROOT_ITERATIONS {
                    break;
                }
            }

            max_root_iters = max_root_iters.max(root_iter_count);

            push_back_iter += 1;
            if push_back_iter == MAX_POLYGON_VERTICES {
                break;
            }
        }

        iters += 1;

        if done {
            break;
        }

        if iters as usize == MAX_TOI_ITERATIONS {
            // Root finder got stuck. Semi-victory.
            output = ToiOutput {
                state: ToiState::Failed,
                time: t1,
            };
            break;
        }
    }

    if let Some(stats) = stats {
        let elapsed = timer.elapsed().as_secs_f64() * 1000.0;
        stats.calls += 1;
        stats.iters += iters;
        stats.max_iters = stats.max_iters.max(iters);
        stats.root_iters += root_iters;
        stats.max_root_iters = stats.max_root_iters.max(max_root_iters);
        stats.time += elapsed;
        stats.max_time = stats.max_time.max(elapsed);
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::{Circle, Polygon};
    use approx::assert_abs_diff_eq;

    fn sweep(from: Vec2, to: Vec2, a0: Real, a: Real) -> Sweep {
        Sweep {
            local_center: Vec2::ZERO,
            c0: from,
            c: to,
            a0,
            a,
            alpha0: 0.0,
        }
    }

    #[test]
    fn test_head_on_circles_touch() {
        let a = Circle::new(0.5);
        let b = Circle::new(0.5);
        let input = ToiInput {
            proxy_a: DistanceProxy::new(std::slice::from_ref(&a.position), a.radius),
            proxy_b: DistanceProxy::new(std::slice::from_ref(&b.position), b.radius),
            sweep_a: sweep(Vec2::new(-5.0, 0.0), Vec2::new(5.0, 0.0), 0.0, 0.0),
            sweep_b: sweep(Vec2::new(5.0, 0.0), Vec2::new(-5.0, 0.0), 0.0, 0.0),
            t_max: 1.0,
        };
        let mut stats = ToiStats::default();
        let out = time_of_impact(&input, Some(&mut stats));
        assert_eq!(out.state, ToiState::Touching);

        // Closing speed 20, gap 10, stop at target = r1 + r2 - 3 * slop.
        let target = 1.0 - 3.0 * LINEAR_SLOP;
        assert_abs_diff_eq!(out.time * 20.0, 10.0 - target, epsilon = 0.25 * LINEAR_SLOP * 2.0);
        assert_eq!(stats.calls, 1);
        assert!(stats.iters >= 1);
        assert!(stats.max_iters <= MAX_TOI_ITERATIONS as u32);
    }

    #[test]
    fn test_receding_bodies_are_separated() {
        let a = Polygon::new_box(0.5, 0.5);
        let b = Polygon::new_box(0.5, 0.5);
        let input = ToiInput {
            proxy_a: DistanceProxy::new(&a.vertices, a.radius),
            proxy_b: DistanceProxy::new(&b.vertices, b.radius),
            sweep_a: sweep(Vec2::new(-2.0, 0.0), Vec2::new(-3.0, 0.0), 0.0, 0.3),
            sweep_b: sweep(Vec2::new(2.0, 0.0), Vec2::new(3.0, 0.0), 0.0, -0.3),
            t_max: 1.0,
        };
        let out = time_of_impact(&input, None);
        assert_eq!(out.state, ToiState::Separated);
        assert_eq!(out.time, 1.0);
    }

    #[test]
    fn test_overlapping_start_reports_overlapped() {
        let a = Polygon::new_box(1.0, 1.0);
        let b = Polygon::new_box(1.0, 1.0);
        let input = ToiInput {
            proxy_a: DistanceProxy::new(&a.vertices, a.radius),
            proxy_b: DistanceProxy::new(&b.vertices, b.radius),
            sweep_a: sweep(Vec2::ZERO, Vec2::ZERO, 0.0, 0.0),
            sweep_b: sweep(Vec2::new(0.5, 0.0), Vec2::new(5.0, 0.0), 0.0, 0.0),
            t_max: 1.0,
        };
        let out = time_of_impact(&input, None);
        assert_eq!(out.state, ToiState::Overlapped);
        assert_eq!(out.time, 0.0);
    }

    #[test]
    fn test_fast_box_through_thin_wall_is_caught() {
        let wall = Polygon::new_box(0.05, 2.0);
        let bullet = Polygon::new_box(0.1, 0.1);
        let input = ToiInput {
            proxy_a: DistanceProxy::new(&wall.vertices, wall.radius),
            proxy_b: DistanceProxy::new(&bullet.vertices, bullet.radius),
            sweep_a: sweep(Vec2::ZERO, Vec2::ZERO, 0.0, 0.0),
            sweep_b: sweep(Vec2::new(-10.0, 0.0), Vec2::new(10.0, 0.0), 0.0, 0.0),
            t_max: 1.0,
        };
        let out = time_of_impact(&input, None);
        assert_eq!(out.state, ToiState::Touching);
        assert!(out.time > 0.4 && out.time < 0.5);
    }
}
