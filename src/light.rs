use glam::Vec3;

/// Trait to describe a point light which consists of a [position](Light::position), a
/// [normal](Light::normal) and an [intensity](Light::intensity).
///
/// #### Deriving:
///
/// Used in most cases, when the type has fields named `position`, `normal` and `intensity`:
///
/// ```
/// # use lightcuts::prelude::*;
/// # use lightcuts::Vec3;
/// #
/// #[derive(Light)]
/// struct Vpl {
///     position: Vec3,
///     normal: Vec3,
///     intensity: Vec3,
///     bounce: u32,
/// }
/// ```
///
/// #### Manual implementation:
///
/// Used when the type cannot directly provide its values, e.g. when the intensity is the product
/// of a colour and a path throughput.
///
/// ```
/// # use lightcuts::prelude::*;
/// # use lightcuts::Vec3;
/// #
/// struct PathVertex {
///     position: Vec3,
///     normal: Vec3,
///     throughput: Vec3,
///     albedo: Vec3,
/// }
///
/// impl Light for PathVertex {
///     fn position(&self) -> Vec3 {
///         self.position
///     }
///
///     fn normal(&self) -> Vec3 {
///         self.normal
///     }
///
///     fn intensity(&self) -> Vec3 {
///         self.throughput * self.albedo
///     }
/// }
/// ```
///
/// If you can't implement [`Light`] on a type, you can use the fact that it is implemented for
/// tuples of three vectors instead of creating an intermediate type.
///
/// ```
/// # use lightcuts::prelude::*;
/// # use lightcuts::Vec3;
/// let light = (Vec3::ZERO, Vec3::Z, Vec3::ONE);
///
/// assert_eq!(light.position(), Vec3::ZERO);
/// assert_eq!(light.normal(), Vec3::Z);
/// assert_eq!(light.intensity(), Vec3::ONE);
/// ```
pub trait Light {
    /// The position of the light in space.
    fn position(&self) -> Vec3;

    /// The normal of the surface the light lies on.
    fn normal(&self) -> Vec3;

    /// The RGB intensity of the light.
    fn intensity(&self) -> Vec3;
}

impl Light for (Vec3, Vec3, Vec3) {
    #[inline]
    fn position(&self) -> Vec3 {
        self.0
    }

    #[inline]
    fn normal(&self) -> Vec3 {
        self.1
    }

    #[inline]
    fn intensity(&self) -> Vec3 {
        self.2
    }
}

impl<L: Light + ?Sized> Light for &L {
    #[inline]
    fn position(&self) -> Vec3 {
        (**self).position()
    }

    #[inline]
    fn normal(&self) -> Vec3 {
        (**self).normal()
    }

    #[inline]
    fn intensity(&self) -> Vec3 {
        (**self).intensity()
    }
}

/// A virtual point light, the owned representation of a [`Light`] stored in a
/// [`LightTree`](crate::tree::LightTree).
#[derive(crate::Light, Clone, Copy, Debug, Default, PartialEq)]
pub struct VirtualLight {
    /// Position of the light.
    pub position: Vec3,
    /// Normal of the surface the light lies on.
    pub normal: Vec3,
    /// RGB intensity of the light.
    pub intensity: Vec3,
}

impl VirtualLight {
    /// Creates a new [`VirtualLight`] with the given position, normal and intensity.
    #[inline]
    pub const fn new(position: Vec3, normal: Vec3, intensity: Vec3) -> Self {
        Self {
            position,
            normal,
            intensity,
        }
    }

    /// Creates a new [`VirtualLight`] by copying the values of the given [`Light`].
    #[inline]
    pub fn from_light<L: Light>(light: &L) -> Self {
        Self::new(light.position(), light.normal(), light.intensity())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_tuple() {
        let light = (Vec3::X, Vec3::Y, Vec3::splat(2.0));
        let vpl = VirtualLight::from_light(&light);

        assert_eq!(vpl, VirtualLight::new(Vec3::X, Vec3::Y, Vec3::splat(2.0)));
    }

    #[test]
    fn derived_light() {
        let vpl = VirtualLight::new(Vec3::X, Vec3::NEG_Z, Vec3::new(1.0, 2.0, 3.0));

        assert_eq!(vpl.position(), Vec3::X);
        assert_eq!(vpl.normal(), Vec3::NEG_Z);
        assert_eq!((&vpl).intensity(), Vec3::new(1.0, 2.0, 3.0));
    }
}
