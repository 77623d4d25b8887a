use glam::{Mat3, Vec3};

/// Below this squared length of `n × z`, the normal is treated as (anti)parallel to the z axis in
/// [`BoundingBox::align`].
const ALIGN_EPSILON: f32 = 1e-4;

/// An axis-aligned bounding box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    /// Minimum corner of the box.
    pub min: Vec3,
    /// Maximum corner of the box.
    pub max: Vec3,
}

impl Default for BoundingBox {
    /// Returns the empty box, the identity of [`BoundingBox::merge`].
    #[inline]
    fn default() -> Self {
        Self::new(Vec3::INFINITY, Vec3::NEG_INFINITY)
    }
}

impl BoundingBox {
    /// Creates a new [`BoundingBox`] with the given min and max values.
    #[inline]
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Creates a degenerate [`BoundingBox`] containing a single point.
    #[inline]
    pub const fn point(position: Vec3) -> Self {
        Self::new(position, position)
    }

    /// Creates a new [`BoundingBox`] that contains the given positions.
    #[inline]
    pub fn with<I>(positions: I) -> Self
    where
        I: IntoIterator<Item = Vec3>,
    {
        let mut result = Self::default();
        for position in positions {
            result.extend(position);
        }
        result
    }

    /// Extends the [`BoundingBox`] so that it contains the given position.
    #[inline]
    pub fn extend(&mut self, position: Vec3) {
        self.min = self.min.min(position);
        self.max = self.max.max(position);
    }

    /// Returns the smallest [`BoundingBox`] containing both boxes.
    #[inline]
    pub fn merge(&self, other: &Self) -> Self {
        Self::new(self.min.min(other.min), self.max.max(other.max))
    }

    /// Returns true if the position is inside or on the boundary of the box.
    #[inline]
    pub fn contains(&self, position: Vec3) -> bool {
        position.cmpge(self.min).all() && position.cmple(self.max).all()
    }

    /// Returns the size of the [`BoundingBox`].
    #[inline]
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Returns the squared length of the diagonal of the box.
    #[inline]
    pub fn diagonal_sqr(&self) -> f32 {
        self.min.distance_squared(self.max)
    }

    /// Returns the squared distance between the position and the closest point of the box, zero if
    /// the position is inside.
    #[inline]
    pub fn dist_sqr(&self, position: Vec3) -> f32 {
        position.distance_squared(position.clamp(self.min, self.max))
    }

    /// Re-expresses the box in the tangent frame of a shading point.
    ///
    /// The returned box bounds the corners of this box once translated so that `p` is the origin
    /// and rotated so that the normal `n` becomes the z axis.
    pub fn align(&self, p: Vec3, n: Vec3) -> Self {
        let rotation = rotation_to_z(n);

        let min = self.min - p;
        let max = self.max - p;

        let mut aligned = Self::point(Vec3::ZERO);
        for j in 0..3 {
            let column = rotation.col(j);

            for i in 0..3 {
                let a = column[i] * min[j];
                let b = column[i] * max[j];

                aligned.min[i] += a.min(b);
                aligned.max[i] += a.max(b);
            }
        }

        aligned
    }

    /// Returns an upper bound of the cosine between the z axis and the direction towards any point
    /// of this box, as seen from the origin. Meant to be used on the result of
    /// [`BoundingBox::align`].
    pub fn bound_cos_theta(&self) -> f32 {
        let (x2, y2) = if self.max.z > 0.0 {
            let closest = Vec3::ZERO.clamp(self.min, self.max);
            let min_sqr = |c: f32, lo: f32, hi: f32| (c * c).min(lo * lo).min(hi * hi);

            (
                min_sqr(closest.x, self.min.x, self.max.x),
                min_sqr(closest.y, self.min.y, self.max.y),
            )
        } else {
            let max_sqr = |lo: f32, hi: f32| (lo * lo).max(hi * hi);

            (
                max_sqr(self.min.x, self.max.x),
                max_sqr(self.min.y, self.max.y),
            )
        };

        let z = self.max.z;
        let length = (x2 + y2 + z * z).sqrt();

        if length > 0.0 {
            z / length
        } else {
            1.0
        }
    }
}

/// Rotation matrix mapping the unit vector `n` onto the z axis.
fn rotation_to_z(n: Vec3) -> Mat3 {
    // n × z
    let v = Vec3::new(n.y, -n.x, 0.0);
    let sin_sqr = v.length_squared();
    let cos = n.z;

    if sin_sqr < ALIGN_EPSILON {
        return if cos < 0.0 {
            Mat3::from_diagonal(Vec3::new(-1.0, 1.0, -1.0))
        } else {
            Mat3::IDENTITY
        };
    }

    let skew = Mat3::from_cols(
        Vec3::new(0.0, v.z, -v.y),
        Vec3::new(-v.z, 0.0, v.x),
        Vec3::new(v.y, -v.x, 0.0),
    );

    Mat3::IDENTITY + skew + skew * skew * ((1.0 - cos) / sin_sqr)
}
