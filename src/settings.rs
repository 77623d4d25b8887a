use crate::{
    error::{Error, Result},
    tree::{MAX_CUT, THRESHOLD},
};
use std::path::PathBuf;

/// Settings of the [`LightCuts`](crate::integrator::LightCuts) integrator.
///
/// With the `serde` feature, missing fields of a deserialized document take their default value.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct Settings {
    /// Maximum number of clusters in a cut.
    pub max_cut: usize,
    /// Relative error under which a cluster is not refined.
    pub threshold: f32,
    /// Log the progress of the light tree build.
    pub print_progress: bool,
    /// Write the binary dump of every built light tree.
    pub print_tree_bin: bool,
    /// Write the Graphviz dump of every built light tree.
    pub print_tree_dot: bool,
    /// Shade with a heatmap of the cut size instead of the illumination.
    pub debug_cut_size: bool,
    /// Directory the dumps are written to.
    pub dump_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_cut: MAX_CUT,
            threshold: THRESHOLD,
            print_progress: true,
            print_tree_bin: false,
            print_tree_dot: false,
            debug_cut_size: false,
            dump_dir: PathBuf::from("."),
        }
    }
}

impl Settings {
    /// Sets the maximum number of clusters in a cut.
    #[inline]
    pub fn with_max_cut(mut self, max_cut: usize) -> Self {
        self.max_cut = max_cut;
        self
    }

    /// Sets the relative error under which a cluster is not refined.
    #[inline]
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Sets whether the progress of the build is logged.
    #[inline]
    pub fn with_print_progress(mut self, print_progress: bool) -> Self {
        self.print_progress = print_progress;
        self
    }

    /// Sets whether the binary dump is written after each build.
    #[inline]
    pub fn with_print_tree_bin(mut self, print_tree_bin: bool) -> Self {
        self.print_tree_bin = print_tree_bin;
        self
    }

    /// Sets whether the Graphviz dump is written after each build.
    #[inline]
    pub fn with_print_tree_dot(mut self, print_tree_dot: bool) -> Self {
        self.print_tree_dot = print_tree_dot;
        self
    }

    /// Sets whether the cut size heatmap is shaded instead of the illumination.
    #[inline]
    pub fn with_debug_cut_size(mut self, debug_cut_size: bool) -> Self {
        self.debug_cut_size = debug_cut_size;
        self
    }

    /// Sets the directory the dumps are written to.
    #[inline]
    pub fn with_dump_dir(mut self, dump_dir: impl Into<PathBuf>) -> Self {
        self.dump_dir = dump_dir.into();
        self
    }

    /// Checks that the maximum cut size is positive and that the threshold is finite and not
    /// negative.
    pub fn validate(&self) -> Result<()> {
        if self.max_cut == 0 {
            return Err(Error::InvalidSettings(
                "max_cut must be at least 1".to_string(),
            ));
        }

        if !self.threshold.is_finite() || self.threshold < 0.0 {
            return Err(Error::InvalidSettings(format!(
                "threshold must be finite and positive, got {}",
                self.threshold
            )));
        }

        Ok(())
    }
}
