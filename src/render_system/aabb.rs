use nalgebra::{Point3, Vector3};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Aabb {
    Empty,
    NonEmpty { min: Point3<f32>, max: Point3<f32> },
}

impl Aabb {
    /// The cube `[-half_extent, half_extent]^3`.
    pub fn cube(half_extent: f32) -> Aabb {
        Aabb::NonEmpty {
            min: Point3::new(-half_extent, -half_extent, -half_extent),
            max: Point3::new(half_extent, half_extent, half_extent),
        }
    }

    pub fn from_points(points: &[Point3<f32>]) -> Aabb {
        if points.is_empty() {
            Aabb::Empty
        } else {
            let mut min = points[0];
            let mut max = points[0];
            for point in points {
                min = min.inf(point);
                max = max.sup(point);
            }
            Aabb::NonEmpty { min, max }
        }
    }

    pub fn union(a: &Aabb, b: &Aabb) -> Aabb {
        match (a, b) {
            (Aabb::Empty, _) => *b,
            (_, Aabb::Empty) => *a,
            (
                Aabb::NonEmpty {
                    min: amin,
                    max: amax,
                },
                Aabb::NonEmpty {
                    min: bmin,
                    max: bmax,
                },
            ) => Aabb::NonEmpty {
                min: amin.inf(bmin),
                max: amax.sup(bmax),
            },
        }
    }

    pub fn diagonal(&self) -> Vector3<f32> {
        match self {
            Aabb::Empty => Vector3::zeros(),
            Aabb::NonEmpty { min, max } => max - min,
        }
    }

    pub fn min(&self) -> Point3<f32> {
        match self {
            Aabb::Empty => Point3::origin(),
            Aabb::NonEmpty { min, .. } => *min,
        }
    }

    pub fn max(&self) -> Point3<f32> {
        match self {
            Aabb::Empty => Point3::origin(),
            Aabb::NonEmpty { max, .. } => *max,
        }
    }

    pub fn contains(&self, p: &Point3<f32>) -> bool {
        match self {
            Aabb::Empty => false,
            Aabb::NonEmpty { min, max } => (0..3).all(|i| p[i] >= min[i] && p[i] <= max[i]),
        }
    }

    /// Slab test. Returns the entry and exit distances along `dir`, with the entry
    /// clamped to 0 when `origin` is inside the box.
    pub fn ray_intersection(&self, origin: &Point3<f32>, dir: &Vector3<f32>) -> Option<(f32, f32)> {
        let (min, max) = match self {
            Aabb::Empty => return None,
            Aabb::NonEmpty { min, max } => (min, max),
        };
        let mut t_enter = 0.0f32;
        let mut t_exit = f32::INFINITY;
        for i in 0..3 {
            if dir[i].abs() < 1e-12 {
                // parallel to this slab: either always inside or never
                if origin[i] < min[i] || origin[i] > max[i] {
                    return None;
                }
                continue;
            }
            let inv = 1.0 / dir[i];
            let mut t0 = (min[i] - origin[i]) * inv;
            let mut t1 = (max[i] - origin[i]) * inv;
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }
            t_enter = t_enter.max(t0);
            t_exit = t_exit.min(t1);
            if t_enter > t_exit {
                return None;
            }
        }
        Some((t_enter, t_exit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn ray_enters_and_leaves_the_cube() {
        let cube = Aabb::cube(1.0);
        let hit = cube.ray_intersection(&Point3::new(-5.0, 0.0, 0.0), &Vector3::x());
        assert_eq!(hit, Some((4.0, 6.0)));
        assert_eq!(
            cube.ray_intersection(&Point3::new(-5.0, 3.0, 0.0), &Vector3::x()),
            None
        );
        assert_eq!(
            cube.ray_intersection(&Point3::new(-5.0, 0.0, 0.0), &-Vector3::x()),
            None
        );
    }

    #[test]
    fn ray_from_inside_starts_at_zero() {
        let cube = Aabb::cube(2.0);
        let (t0, t1) = cube
            .ray_intersection(&Point3::origin(), &Vector3::new(0.0, 0.0, -1.0))
            .unwrap();
        assert_eq!(t0, 0.0);
        assert_eq!(t1, 2.0);
        assert!(cube.contains(&Point3::new(2.0, -2.0, 0.0)));
    }

    #[test]
    fn union_covers_both() {
        let a = Aabb::from_points(&[Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0)]);
        let b = Aabb::from_points(&[Point3::new(-1.0, 2.0, 0.5)]);
        let u = Aabb::union(&a, &b);
        assert_eq!(u.diagonal(), Vector3::new(2.0, 2.0, 1.0));
        assert_eq!(Aabb::union(&Aabb::Empty, &a), a);
        assert_eq!(Aabb::from_points(&[]), Aabb::Empty);
    }
}
