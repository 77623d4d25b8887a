use glam::Vec3;

/// Rec. 709 luminance weights.
const LUMA_WEIGHTS: Vec3 = Vec3::new(0.212671, 0.715160, 0.072169);

/// Colour stops of the [`heatmap`] ramp, evenly spaced over `[0, 1]`.
const HEATMAP_STOPS: [Vec3; 5] = [
    Vec3::new(0.0, 0.0, 1.0),
    Vec3::new(0.0, 1.0, 1.0),
    Vec3::new(0.0, 1.0, 0.0),
    Vec3::new(1.0, 1.0, 0.0),
    Vec3::new(1.0, 0.0, 0.0),
];

/// Returns the relative luminance of a linear RGB colour.
///
/// # Example
///
/// ```
/// # use lightcuts::{color::luma, Vec3};
/// assert!((luma(Vec3::ONE) - 1.0).abs() < 1e-5);
/// assert_eq!(luma(Vec3::ZERO), 0.0);
/// ```
#[inline]
pub fn luma(rgb: Vec3) -> f32 {
    rgb.dot(LUMA_WEIGHTS)
}

/// Maps `t` to a false colour going from blue (0) through cyan, green and yellow to red (1).
///
/// Values outside of `[0, 1]` are clamped, NaN maps to blue.
pub fn heatmap(t: f32) -> Vec3 {
    let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };

    let scaled = t * (HEATMAP_STOPS.len() - 1) as f32;
    let i = (scaled as usize).min(HEATMAP_STOPS.len() - 2);

    HEATMAP_STOPS[i].lerp(HEATMAP_STOPS[i + 1], scaled - i as f32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn luma_weights_green_most() {
        assert!(luma(Vec3::Y) > luma(Vec3::X));
        assert!(luma(Vec3::X) > luma(Vec3::Z));
    }

    #[test]
    fn heatmap_endpoints() {
        assert_eq!(heatmap(0.0), Vec3::Z);
        assert_eq!(heatmap(1.0), Vec3::X);
        assert_eq!(heatmap(0.5), Vec3::Y);
    }

    #[test]
    fn heatmap_clamps() {
        assert_eq!(heatmap(-3.0), heatmap(0.0));
        assert_eq!(heatmap(7.0), heatmap(1.0));
        assert_eq!(heatmap(f32::NAN), heatmap(0.0));
        assert!(heatmap(0.6).is_finite());
    }
}
