//! Test plan types and validation
//!
//! A [`TestPlan`] is immutable once constructed: the control surface parses
//! an external [`TestPlanRequest`], maps its `test_type` string onto a
//! [`LoadProfile`] variant, and validates every bound before the engine ever
//! sees the plan. Unknown disciplines and out-of-range fields are rejected
//! here, so the scheduler can match on the profile exhaustively.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{PlanError, PlanResult};

const MAX_TARGET_URL_LEN: usize = 2048;

/// Target endpoint description shared by every discipline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetSpec {
    /// Absolute http/https URL of the endpoint under test
    pub url: String,
    /// HTTP method name; unrecognized values fall back to GET at execution time
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub query_params: HashMap<String, String>,
    /// Request body, attached for POST/PUT/PATCH only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

/// Load discipline with its discipline-specific parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "test_type", rename_all = "UPPERCASE")]
pub enum LoadProfile {
    /// Constant user count for a fixed duration, optionally ramped up
    Load {
        virtual_users: u32,
        duration_seconds: u64,
        ramp_up_seconds: u64,
    },
    /// Same shape as LOAD, run long to expose leaks and drift
    Soak {
        virtual_users: u32,
        duration_seconds: u64,
        ramp_up_seconds: u64,
    },
    /// Stepped increase from start_users toward max_users
    Stress {
        start_users: u32,
        max_users: u32,
        step_duration_seconds: u64,
        step_increment: u32,
    },
    /// Base load, sudden burst to spike_users, then recovery observation
    Spike {
        base_users: u32,
        spike_users: u32,
        spike_duration_seconds: u64,
        recovery_duration_seconds: u64,
    },
}

impl LoadProfile {
    /// Discipline name as it appears on the wire
    pub fn kind(&self) -> &'static str {
        match self {
            LoadProfile::Load { .. } => "LOAD",
            LoadProfile::Soak { .. } => "SOAK",
            LoadProfile::Stress { .. } => "STRESS",
            LoadProfile::Spike { .. } => "SPIKE",
        }
    }

    /// Number of stepped stages a STRESS run schedules
    ///
    /// `ceil((max - start) / increment) + 1`: the initial stage plus one per
    /// increment needed to reach `max_users`.
    pub fn total_steps(&self) -> Option<u64> {
        match self {
            LoadProfile::Stress {
                start_users,
                max_users,
                step_increment,
                ..
            } => {
                let span = u64::from(max_users - start_users);
                Some(span.div_ceil(u64::from(*step_increment)) + 1)
            }
            _ => None,
        }
    }

    /// The run horizon in seconds: the monitor force-stops the run here
    pub fn total_duration_seconds(&self) -> u64 {
        match self {
            LoadProfile::Load {
                duration_seconds, ..
            }
            | LoadProfile::Soak {
                duration_seconds, ..
            } => *duration_seconds,
            LoadProfile::Stress {
                step_duration_seconds,
                ..
            } => self.total_steps().unwrap_or(0) * step_duration_seconds,
            LoadProfile::Spike {
                spike_duration_seconds,
                recovery_duration_seconds,
                ..
            } => 2 * recovery_duration_seconds + spike_duration_seconds,
        }
    }

    fn validate(&self) -> PlanResult<()> {
        match *self {
            LoadProfile::Load {
                virtual_users,
                duration_seconds,
                ramp_up_seconds,
            }
            | LoadProfile::Soak {
                virtual_users,
                duration_seconds,
                ramp_up_seconds,
            } => {
                if virtual_users < 1 {
                    return Err(PlanError::invalid("virtual_users", "must be at least 1"));
                }
                if duration_seconds < 1 {
                    return Err(PlanError::invalid("duration_seconds", "must be at least 1"));
                }
                if ramp_up_seconds > duration_seconds {
                    return Err(PlanError::invalid(
                        "ramp_up_seconds",
                        format!(
                            "must not exceed duration_seconds ({duration_seconds}), got {ramp_up_seconds}"
                        ),
                    ));
                }
            }
            LoadProfile::Stress {
                start_users,
                max_users,
                step_duration_seconds,
                step_increment,
            } => {
                if start_users < 1 {
                    return Err(PlanError::invalid("start_users", "must be at least 1"));
                }
                if max_users <= start_users {
                    return Err(PlanError::invalid(
                        "max_users",
                        format!("must be greater than start_users ({start_users}), got {max_users}"),
                    ));
                }
                if step_duration_seconds < 1 {
                    return Err(PlanError::invalid(
                        "step_duration_seconds",
                        "must be at least 1",
                    ));
                }
                if step_increment < 1 {
                    return Err(PlanError::invalid("step_increment", "must be at least 1"));
                }
            }
            LoadProfile::Spike {
                base_users,
                spike_users,
                spike_duration_seconds,
                ..
            } => {
                if base_users < 1 {
                    return Err(PlanError::invalid("base_users", "must be at least 1"));
                }
                if spike_users <= base_users {
                    return Err(PlanError::invalid(
                        "spike_users",
                        format!("must be greater than base_users ({base_users}), got {spike_users}"),
                    ));
                }
                if spike_duration_seconds < 1 {
                    return Err(PlanError::invalid(
                        "spike_duration_seconds",
                        "must be at least 1",
                    ));
                }
                // recovery_duration_seconds may be 0
            }
        }
        Ok(())
    }
}

/// A complete, validated description of one load test run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestPlan {
    /// Unique id for this run, assigned by the caller
    pub test_id: String,
    pub target: TargetSpec,
    #[serde(flatten)]
    pub profile: LoadProfile,
}

impl TestPlan {
    /// Validate every bound the engine relies on.
    ///
    /// Called by [`TestPlanRequest::into_plan`]; the engine re-checks at
    /// start so plans built directly in code get the same treatment.
    pub fn validate(&self) -> PlanResult<()> {
        if self.test_id.trim().is_empty() {
            return Err(PlanError::invalid("test_id", "must not be empty"));
        }
        validate_target_url(&self.target.url)?;
        self.profile.validate()
    }
}

fn validate_target_url(raw: &str) -> PlanResult<()> {
    if raw.is_empty() {
        return Err(PlanError::InvalidTargetUrl("url is empty".to_string()));
    }
    if raw.len() > MAX_TARGET_URL_LEN {
        return Err(PlanError::InvalidTargetUrl(format!(
            "url exceeds {MAX_TARGET_URL_LEN} characters"
        )));
    }

    let parsed = url::Url::parse(raw)
        .map_err(|e| PlanError::InvalidTargetUrl(format!("{raw}: {e}")))?;

    match parsed.scheme() {
        "http" | "https" => {}
        other => {
            return Err(PlanError::InvalidTargetUrl(format!(
                "scheme '{other}' is not supported (only http/https)"
            )));
        }
    }

    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(PlanError::InvalidTargetUrl(
            "url must have a valid host".to_string(),
        ));
    }

    // Url::parse already caps ports at u16; 0 is the one invalid survivor.
    if parsed.port() == Some(0) {
        return Err(PlanError::InvalidTargetUrl(
            "port must be in 1-65535".to_string(),
        ));
    }

    Ok(())
}

/// Flat wire request for starting a test, as sent by the orchestrator
///
/// Discipline-specific fields are optional here; [`into_plan`] checks that
/// the fields required by the requested `test_type` are present.
///
/// [`into_plan`]: TestPlanRequest::into_plan
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TestPlanRequest {
    pub test_id: String,
    pub test_type: String,
    pub target_url: String,
    pub http_method: String,
    pub headers: HashMap<String, String>,
    pub query_params: HashMap<String, String>,
    pub request_body: Option<String>,

    // LOAD / SOAK
    pub virtual_users: Option<u32>,
    pub duration_seconds: Option<u64>,
    pub ramp_up_seconds: Option<u64>,

    // STRESS
    pub start_users: Option<u32>,
    pub max_users: Option<u32>,
    pub step_duration_seconds: Option<u64>,
    pub step_increment: Option<u32>,

    // SPIKE
    pub base_users: Option<u32>,
    pub spike_users: Option<u32>,
    pub spike_duration_seconds: Option<u64>,
    pub recovery_duration_seconds: Option<u64>,
}

impl TestPlanRequest {
    /// Map the flat request onto a validated [`TestPlan`].
    pub fn into_plan(self) -> PlanResult<TestPlan> {
        let kind: &'static str = match self.test_type.to_uppercase().as_str() {
            "LOAD" => "LOAD",
            "SOAK" => "SOAK",
            "STRESS" => "STRESS",
            "SPIKE" => "SPIKE",
            _ => return Err(PlanError::UnknownTestType(self.test_type)),
        };
        let profile = match kind {
            "LOAD" | "SOAK" => {
                let virtual_users = require(self.virtual_users, kind, "virtual_users")?;
                let duration_seconds = require(self.duration_seconds, kind, "duration_seconds")?;
                let ramp_up_seconds = self.ramp_up_seconds.unwrap_or(0);
                if kind == "LOAD" {
                    LoadProfile::Load {
                        virtual_users,
                        duration_seconds,
                        ramp_up_seconds,
                    }
                } else {
                    LoadProfile::Soak {
                        virtual_users,
                        duration_seconds,
                        ramp_up_seconds,
                    }
                }
            }
            "STRESS" => LoadProfile::Stress {
                start_users: require(self.start_users, kind, "start_users")?,
                max_users: require(self.max_users, kind, "max_users")?,
                step_duration_seconds: require(
                    self.step_duration_seconds,
                    kind,
                    "step_duration_seconds",
                )?,
                step_increment: require(self.step_increment, kind, "step_increment")?,
            },
            _ => LoadProfile::Spike {
                base_users: require(self.base_users, kind, "base_users")?,
                spike_users: require(self.spike_users, kind, "spike_users")?,
                spike_duration_seconds: require(
                    self.spike_duration_seconds,
                    kind,
                    "spike_duration_seconds",
                )?,
                recovery_duration_seconds: self.recovery_duration_seconds.unwrap_or(0),
            },
        };

        let plan = TestPlan {
            test_id: self.test_id,
            target: TargetSpec {
                url: self.target_url,
                method: self.http_method,
                headers: self.headers,
                query_params: self.query_params,
                body: self.request_body,
            },
            profile,
        };
        plan.validate()?;
        Ok(plan)
    }
}

fn require<T>(value: Option<T>, test_type: &'static str, field: &'static str) -> PlanResult<T> {
    value.ok_or(PlanError::MissingField { test_type, field })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load_request() -> TestPlanRequest {
        TestPlanRequest {
            test_id: "run-1".to_string(),
            test_type: "load".to_string(),
            target_url: "http://api.example.com/orders".to_string(),
            http_method: "GET".to_string(),
            virtual_users: Some(50),
            duration_seconds: Some(60),
            ramp_up_seconds: Some(10),
            ..Default::default()
        }
    }

    #[test]
    fn test_type_is_case_insensitive() {
        let plan = load_request().into_plan().unwrap();
        assert_eq!(plan.profile.kind(), "LOAD");
        assert_eq!(plan.profile.total_duration_seconds(), 60);
    }

    #[test]
    fn unknown_test_type_is_rejected() {
        let mut req = load_request();
        req.test_type = "CHAOS".to_string();
        assert!(matches!(
            req.into_plan(),
            Err(PlanError::UnknownTestType(t)) if t == "CHAOS"
        ));
    }

    #[test]
    fn missing_discipline_field_is_rejected() {
        let mut req = load_request();
        req.test_type = "STRESS".to_string();
        req.start_users = Some(10);
        req.max_users = Some(50);
        req.step_increment = Some(10);
        // step_duration_seconds absent
        let err = req.into_plan().unwrap_err();
        assert!(matches!(
            err,
            PlanError::MissingField {
                field: "step_duration_seconds",
                ..
            }
        ));
    }

    #[test]
    fn ramp_up_may_not_exceed_duration() {
        let mut req = load_request();
        req.ramp_up_seconds = Some(61);
        assert!(req.into_plan().is_err());
    }

    #[test]
    fn stress_step_math() {
        let profile = LoadProfile::Stress {
            start_users: 10,
            max_users: 50,
            step_duration_seconds: 30,
            step_increment: 10,
        };
        assert_eq!(profile.total_steps(), Some(5));
        assert_eq!(profile.total_duration_seconds(), 150);

        // Non-divisible span rounds the step count up
        let profile = LoadProfile::Stress {
            start_users: 10,
            max_users: 55,
            step_duration_seconds: 30,
            step_increment: 10,
        };
        assert_eq!(profile.total_steps(), Some(6));
    }

    #[test]
    fn stress_bounds() {
        let mut req = load_request();
        req.test_type = "STRESS".to_string();
        req.start_users = Some(50);
        req.max_users = Some(50);
        req.step_duration_seconds = Some(10);
        req.step_increment = Some(5);
        assert!(matches!(
            req.into_plan(),
            Err(PlanError::InvalidField {
                field: "max_users",
                ..
            })
        ));
    }

    #[test]
    fn spike_recovery_may_be_zero() {
        let mut req = load_request();
        req.test_type = "SPIKE".to_string();
        req.base_users = Some(10);
        req.spike_users = Some(100);
        req.spike_duration_seconds = Some(30);
        req.recovery_duration_seconds = None;
        let plan = req.into_plan().unwrap();
        assert_eq!(plan.profile.total_duration_seconds(), 30);
    }

    #[test]
    fn target_url_bounds() {
        let mut req = load_request();
        req.target_url = "ftp://files.example.com".to_string();
        assert!(matches!(
            req.clone().into_plan(),
            Err(PlanError::InvalidTargetUrl(_))
        ));

        req.target_url = "not a url".to_string();
        assert!(req.clone().into_plan().is_err());

        req.target_url = format!("http://example.com/{}", "a".repeat(2048));
        assert!(req.clone().into_plan().is_err());

        req.target_url = "http://example.com:0/".to_string();
        assert!(req.clone().into_plan().is_err());

        req.target_url = "https://example.com:8443/health".to_string();
        assert!(req.into_plan().is_ok());
    }

    #[test]
    fn plan_round_trips_through_json() {
        let plan = load_request().into_plan().unwrap();
        let json = serde_json::to_string(&plan).unwrap();
        assert!(json.contains("\"test_type\":\"LOAD\""));
        let back: TestPlan = serde_json::from_str(&json).unwrap();
        assert_eq!(back, plan);
    }
}
