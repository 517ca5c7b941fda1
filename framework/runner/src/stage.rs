use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::time::Duration;

/// Problems with a stage or duration given on the command line or to the scenario builder.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StageError {
    #[error("Empty duration")]
    EmptyDuration,
    #[error("Invalid duration [{0}], expected something like `10s`, `1m30s` or `500ms`")]
    InvalidDuration(String),
    #[error("Duration [{0}] is too long")]
    DurationOverflow(String),
    #[error("Unknown duration unit [{0}], expected one of `ms`, `s`, `m` or `h`")]
    UnknownUnit(String),
    #[error("Invalid stage [{0}], expected `<duration>:<target>`, for example `10s:500`")]
    InvalidStage(String),
    #[error("Invalid stage target [{0}], expected a whole number of virtual users")]
    InvalidTarget(String),
    #[error("Stage {0} has a zero duration")]
    ZeroDuration(usize),
    #[error("At least one stage is required")]
    NoStages,
    #[error("The stages add up to more time than can be represented")]
    TotalDurationOverflow,
}

/// A window of time over which the number of virtual users moves towards `target`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stage {
    pub duration: Duration,
    pub target: usize,
}

impl Stage {
    pub fn new(duration: Duration, target: usize) -> Self {
        Self { duration, target }
    }

    /// Shorthand for a stage measured in whole seconds.
    pub fn secs(duration_s: u64, target: usize) -> Self {
        Self::new(Duration::from_secs(duration_s), target)
    }
}

impl Display for Stage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", format_duration(self.duration), self.target)
    }
}

impl FromStr for Stage {
    type Err = StageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_stage(s)
    }
}

/// Parse a stage in the form `<duration>:<target>`, such as `20s:1000`.
pub fn parse_stage(s: &str) -> Result<Stage, StageError> {
    let (duration, target) = s
        .split_once(':')
        .ok_or_else(|| StageError::InvalidStage(s.to_string()))?;

    let duration = parse_duration(duration.trim())?;
    let target = target
        .trim()
        .parse::<usize>()
        .map_err(|_| StageError::InvalidTarget(target.to_string()))?;

    Ok(Stage::new(duration, target))
}

/// Parse a human readable duration made of `<number><unit>` parts, such as `1m30s`.
///
/// A bare number is read as seconds.
pub fn parse_duration(s: &str) -> Result<Duration, StageError> {
    if s.is_empty() {
        return Err(StageError::EmptyDuration);
    }

    if let Ok(secs) = s.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    let mut total = Duration::ZERO;
    let mut rest = s;
    while !rest.is_empty() {
        let digits_end = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        if digits_end == 0 {
            return Err(StageError::InvalidDuration(s.to_string()));
        }
        let value = rest[..digits_end]
            .parse::<u64>()
            .map_err(|_| StageError::InvalidDuration(s.to_string()))?;
        rest = &rest[digits_end..];

        let unit_end = rest
            .find(|c: char| c.is_ascii_digit())
            .unwrap_or(rest.len());
        let unit = &rest[..unit_end];
        rest = &rest[unit_end..];

        let part = match unit {
            "ms" => Some(Duration::from_millis(value)),
            "s" => Some(Duration::from_secs(value)),
            "m" => value.checked_mul(60).map(Duration::from_secs),
            "h" => value.checked_mul(3600).map(Duration::from_secs),
            "" => return Err(StageError::InvalidDuration(s.to_string())),
            other => return Err(StageError::UnknownUnit(other.to_string())),
        };
        total = part
            .and_then(|part| total.checked_add(part))
            .ok_or_else(|| StageError::DurationOverflow(s.to_string()))?;
    }

    Ok(total)
}

fn format_duration(duration: Duration) -> String {
    if duration.subsec_millis() != 0 {
        format!("{}ms", duration.as_millis())
    } else {
        format!("{}s", duration.as_secs())
    }
}

/// Check that a list of stages can be run.
pub(crate) fn validate_stages(stages: &[Stage]) -> Result<(), StageError> {
    if stages.is_empty() {
        return Err(StageError::NoStages);
    }

    if let Some(index) = stages.iter().position(|s| s.duration.is_zero()) {
        return Err(StageError::ZeroDuration(index));
    }

    stages
        .iter()
        .try_fold(Duration::ZERO, |total, s| total.checked_add(s.duration))
        .ok_or(StageError::TotalDurationOverflow)?;

    Ok(())
}

/// The number of virtual users that should be active at any point in a run.
///
/// Within each stage the count moves linearly from the previous stage's target, or from the
/// start count for the first stage, to the stage's own target. Ramping up rounds down and ramping
/// down rounds up, so the count never runs ahead of the curve. Once the last stage is over the
/// count stays at the final target.
#[derive(Debug, Clone)]
pub struct RampSchedule {
    start_vus: usize,
    stages: Vec<Stage>,
}

impl RampSchedule {
    pub fn new(start_vus: usize, stages: Vec<Stage>) -> Self {
        Self { start_vus, stages }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Saturates at [Duration::MAX].
    pub fn total_duration(&self) -> Duration {
        self.stages
            .iter()
            .fold(Duration::ZERO, |total, s| total.saturating_add(s.duration))
    }

    /// The largest number of virtual users the schedule ever asks for.
    pub fn max_vus(&self) -> usize {
        self.stages
            .iter()
            .map(|s| s.target)
            .fold(self.start_vus, usize::max)
    }

    /// True if any stage asks for fewer virtual users than the one before it.
    pub fn ramps_down(&self) -> bool {
        let mut previous = self.start_vus;
        for stage in &self.stages {
            if stage.target < previous {
                return true;
            }
            previous = stage.target;
        }
        false
    }

    pub fn vus_at(&self, elapsed: Duration) -> usize {
        let mut from = self.start_vus;
        let mut stage_start = Duration::ZERO;

        for stage in &self.stages {
            let stage_end = stage_start.saturating_add(stage.duration);
            if elapsed < stage_end {
                let progress =
                    (elapsed - stage_start).as_secs_f64() / stage.duration.as_secs_f64();
                return interpolate(from, stage.target, progress);
            }

            from = stage.target;
            stage_start = stage_end;
        }

        from
    }
}

fn interpolate(from: usize, to: usize, progress: f64) -> usize {
    let progress = progress.clamp(0.0, 1.0);
    if to >= from {
        from + ((to - from) as f64 * progress).floor() as usize
    } else {
        from - ((from - to) as f64 * progress).floor() as usize
    }
}
