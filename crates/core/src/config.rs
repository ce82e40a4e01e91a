use std::fmt;
use std::str::FromStr;
use thiserror::Error;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("session duration must be > 0 seconds")]
    InvalidDuration,

    #[error("passing score must be between 0 and 100, got {provided}")]
    InvalidPassingScore { provided: u32 },

    #[error("unknown submit gate: {0} (expected `at-least-one` or `all`)")]
    InvalidSubmitGate(String),

    #[error("unknown correct-answer policy: {0} (expected `strict` or `first-flagged`)")]
    InvalidCorrectAnswerPolicy(String),
}

//
// ─── KNOBS ─────────────────────────────────────────────────────────────────────
//

/// How many questions must be answered before an explicit submit is accepted.
///
/// Never applies to the automatic submit on timeout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SubmitGate {
    #[default]
    AtLeastOne,
    AllAnswered,
}

impl fmt::Display for SubmitGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitGate::AtLeastOne => f.write_str("at-least-one"),
            SubmitGate::AllAnswered => f.write_str("all"),
        }
    }
}

impl FromStr for SubmitGate {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "at-least-one" | "any" => Ok(Self::AtLeastOne),
            "all" | "all-answered" => Ok(Self::AllAnswered),
            other => Err(ConfigError::InvalidSubmitGate(other.to_owned())),
        }
    }
}

/// What to do with questions whose answer set does not flag exactly one correct answer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CorrectAnswerPolicy {
    /// Reject the question set at load time.
    #[default]
    Strict,
    /// Accept it and score against the first answer flagged correct.
    FirstFlagged,
}

impl FromStr for CorrectAnswerPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "strict" => Ok(Self::Strict),
            "first-flagged" => Ok(Self::FirstFlagged),
            other => Err(ConfigError::InvalidCorrectAnswerPolicy(other.to_owned())),
        }
    }
}

//
// ─── SESSION CONFIG ────────────────────────────────────────────────────────────
//

pub const DEFAULT_DURATION_SECS: u32 = 30 * 60;
pub const DEFAULT_PASSING_SCORE: u8 = 70;

/// Per-session knobs that used to be hard-coded per screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    duration_secs: u32,
    passing_score: u8,
    submit_gate: SubmitGate,
    correct_answer_policy: CorrectAnswerPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            duration_secs: DEFAULT_DURATION_SECS,
            passing_score: DEFAULT_PASSING_SCORE,
            submit_gate: SubmitGate::default(),
            correct_answer_policy: CorrectAnswerPolicy::default(),
        }
    }
}

impl SessionConfig {
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidDuration` for a zero duration and
    /// `ConfigError::InvalidPassingScore` above 100.
    pub fn new(
        duration_secs: u32,
        passing_score: u32,
        submit_gate: SubmitGate,
        correct_answer_policy: CorrectAnswerPolicy,
    ) -> Result<Self, ConfigError> {
        Self::default()
            .with_duration_secs(duration_secs)?
            .with_passing_score(passing_score)
            .map(|config| {
                config
                    .with_submit_gate(submit_gate)
                    .with_correct_answer_policy(correct_answer_policy)
            })
    }

    /// # Errors
    ///
    /// Returns `ConfigError::InvalidDuration` when `secs` is zero.
    pub fn with_duration_secs(mut self, secs: u32) -> Result<Self, ConfigError> {
        if secs == 0 {
            return Err(ConfigError::InvalidDuration);
        }
        self.duration_secs = secs;
        Ok(self)
    }

    /// # Errors
    ///
    /// Returns `ConfigError::InvalidPassingScore` above 100.
    pub fn with_passing_score(mut self, score: u32) -> Result<Self, ConfigError> {
        self.passing_score = u8::try_from(score)
            .ok()
            .filter(|s| *s <= 100)
            .ok_or(ConfigError::InvalidPassingScore { provided: score })?;
        Ok(self)
    }

    #[must_use]
    pub fn with_submit_gate(mut self, gate: SubmitGate) -> Self {
        self.submit_gate = gate;
        self
    }

    #[must_use]
    pub fn with_correct_answer_policy(mut self, policy: CorrectAnswerPolicy) -> Self {
        self.correct_answer_policy = policy;
        self
    }

    #[must_use]
    pub fn duration_secs(&self) -> u32 {
        self.duration_secs
    }

    #[must_use]
    pub fn passing_score(&self) -> u8 {
        self.passing_score
    }

    #[must_use]
    pub fn submit_gate(&self) -> SubmitGate {
        self.submit_gate
    }

    #[must_use]
    pub fn correct_answer_policy(&self) -> CorrectAnswerPolicy {
        self.correct_answer_policy
    }
}
