use std::time::Instant;

/// Number of steps reported by a [`Progress`] over its whole run.
const SEGMENTS: usize = 10;

/// Timer of a phase of the preparation of a [`LightTree`](crate::tree::LightTree), logged with
/// the number of lights involved once dropped.
///
/// ```
/// # use lightcuts::progress::Timed;
/// let timed = Timed::info("clustering").with_lights(1024);
/// assert_eq!(timed.label(), "LightCuts: clustering (1024 lights)");
/// ```
#[derive(Debug)]
pub struct Timed {
    phase: &'static str,
    lights: Option<usize>,
    start: Instant,
    level: log::Level,
}

impl Timed {
    /// Starts timing a phase reported at INFO level.
    pub fn info(phase: &'static str) -> Self {
        Self::start(phase, log::Level::Info)
    }

    /// Starts timing a phase reported at DEBUG level.
    pub fn debug(phase: &'static str) -> Self {
        Self::start(phase, log::Level::Debug)
    }

    fn start(phase: &'static str, level: log::Level) -> Self {
        log::trace!("LightCuts: {phase} started");
        Self {
            phase,
            lights: None,
            start: Instant::now(),
            level,
        }
    }

    /// Sets the number of lights reported with the phase.
    #[inline]
    pub fn with_lights(mut self, lights: usize) -> Self {
        self.lights = Some(lights);
        self
    }

    /// Sets the number of lights once known, for phases that produce them.
    #[inline]
    pub fn set_lights(&mut self, lights: usize) {
        self.lights = Some(lights);
    }

    /// Returns the text logged before the elapsed time.
    pub fn label(&self) -> String {
        match self.lights {
            Some(1) => format!("LightCuts: {} (1 light)", self.phase),
            Some(lights) => format!("LightCuts: {} ({lights} lights)", self.phase),
            None => format!("LightCuts: {}", self.phase),
        }
    }
}

impl Drop for Timed {
    fn drop(&mut self) {
        if log::log_enabled!(self.level) {
            log::log!(self.level, "{}: {:.3?}", self.label(), self.start.elapsed());
        }
    }
}

/// Progress of a task made of a known number of steps, logged at INFO level every tenth of the
/// way when enabled.
#[derive(Debug)]
pub struct Progress {
    name: &'static str,
    total: usize,
    current: usize,
    segment: usize,
    enabled: bool,
}

impl Progress {
    /// Creates a new [`Progress`] for a task of `total` steps.
    pub fn new(name: &'static str, total: usize, enabled: bool) -> Self {
        if enabled {
            log::info!("{name}: 0%");
        }

        Self {
            name,
            total,
            current: 0,
            segment: 0,
            enabled,
        }
    }

    /// Returns the number of steps done.
    #[inline]
    pub const fn current(&self) -> usize {
        self.current
    }

    /// Advances the task by one step.
    #[inline]
    pub fn advance(&mut self) {
        self.current += 1;

        if !self.enabled || self.total == 0 {
            return;
        }

        let segment = (self.current * SEGMENTS / self.total).min(SEGMENTS);
        if segment > self.segment {
            self.segment = segment;
            log::info!("{}: {}%", self.name, 100 * segment / SEGMENTS);
        }
    }

    /// Marks the task as done.
    pub fn finish(self) {
        if self.enabled && self.segment < SEGMENTS {
            log::info!("{}: 100%", self.name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timed_label() {
        let mut timed = Timed::debug("tracing");
        assert_eq!(timed.label(), "LightCuts: tracing");

        timed.set_lights(1);
        assert_eq!(timed.label(), "LightCuts: tracing (1 light)");

        let timed = Timed::info("clustering").with_lights(300);
        assert_eq!(timed.label(), "LightCuts: clustering (300 lights)");
        assert_eq!(timed.level, log::Level::Info);
    }

    #[test]
    fn progress_counts_steps() {
        let mut progress = Progress::new("test", 3, true);
        for _ in 0..5 {
            progress.advance();
        }

        assert_eq!(progress.current(), 5);
        assert_eq!(progress.segment, SEGMENTS);
        progress.finish();
    }

    #[test]
    fn disabled_progress() {
        let mut progress = Progress::new("test", 0, false);
        progress.advance();

        assert_eq!(progress.segment, 0);
    }
}
