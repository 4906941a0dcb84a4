//! Built-in fault templates.

use crate::model::{clamp_probability, FaultScenario, FaultTiming, FaultType};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// A named fault archetype with defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaultTemplate {
    /// Template name (`network_timeout`, `api_error_5xx`, ...).
    pub name: String,
    /// What the template models.
    pub description: String,
    /// Kind of fault.
    pub fault_type: FaultType,
    /// Default firing probability.
    pub default_probability: f64,
    /// Default timing phase.
    pub default_timing: FaultTiming,
    /// Default parameters.
    pub parameters: Map<String, Value>,
}

impl FaultTemplate {
    fn new(
        name: &str,
        description: &str,
        fault_type: FaultType,
        default_probability: f64,
        default_timing: FaultTiming,
        parameters: Value,
    ) -> Self {
        let parameters = match parameters {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            name: name.to_string(),
            description: description.to_string(),
            fault_type,
            default_probability,
            default_timing,
            parameters,
        }
    }

    /// Instantiates a scenario for `node_id`, merging overrides over the
    /// template defaults.
    #[must_use]
    pub fn instantiate(&self, node_id: &str, overrides: FaultOverrides) -> FaultScenario {
        let mut parameters = self.parameters.clone();
        parameters.extend(overrides.parameters);

        FaultScenario {
            id: uuid::Uuid::new_v4().to_string(),
            name: self.name.clone(),
            node_id: node_id.to_string(),
            fault_type: self.fault_type,
            probability: clamp_probability(
                overrides.probability.unwrap_or(self.default_probability),
            ),
            timing: overrides.timing.unwrap_or(self.default_timing),
            parameters,
            enabled: overrides.enabled.unwrap_or(true),
            duration_ms: overrides.duration_ms,
        }
    }
}

/// Fields that replace template defaults. Parameters are merged key by key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FaultOverrides {
    /// Replacement probability.
    pub probability: Option<f64>,
    /// Replacement timing.
    pub timing: Option<FaultTiming>,
    /// Parameters merged over the template's.
    pub parameters: Map<String, Value>,
    /// Replacement enabled flag.
    pub enabled: Option<bool>,
    /// Fault duration.
    pub duration_ms: Option<u64>,
}

impl FaultOverrides {
    /// Sets the probability.
    #[must_use]
    pub const fn with_probability(mut self, probability: f64) -> Self {
        self.probability = Some(probability);
        self
    }

    /// Sets the timing.
    #[must_use]
    pub const fn with_timing(mut self, timing: FaultTiming) -> Self {
        self.timing = Some(timing);
        self
    }

    /// Sets a parameter.
    #[must_use]
    pub fn with_parameter(mut self, key: impl Into<String>, value: Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }
}

/// The built-in catalog.
#[must_use]
pub fn builtin_templates() -> Vec<FaultTemplate> {
    use FaultTiming::{After, Before, During};
    use FaultType::{
        ApiError, AuthFailure, CascadingFailure, DataCorruption, IntermittentFailure,
        InvalidData, NetworkTimeout, PartialData, ResourceExhaustion, SlowResponse,
    };

    vec![
        FaultTemplate::new(
            "network_timeout",
            "Connection hangs until the client gives up",
            NetworkTimeout,
            0.1,
            During,
            json!({"timeoutMs": 30_000}),
        ),
        FaultTemplate::new(
            "invalid_data",
            "Input fails schema validation",
            InvalidData,
            0.05,
            Before,
            json!({"field": "payload", "reason": "schema mismatch"}),
        ),
        FaultTemplate::new(
            "api_error_4xx",
            "Upstream rejects the request",
            ApiError,
            0.1,
            During,
            json!({"statusCode": 400, "message": "Bad Request"}),
        ),
        FaultTemplate::new(
            "api_error_5xx",
            "Upstream fails internally",
            ApiError,
            0.1,
            During,
            json!({"statusCode": 503, "message": "Service Unavailable"}),
        ),
        FaultTemplate::new(
            "auth_expired",
            "Access token has expired",
            AuthFailure,
            0.05,
            Before,
            json!({"reason": "token_expired"}),
        ),
        FaultTemplate::new(
            "auth_invalid",
            "Credentials are rejected",
            AuthFailure,
            0.02,
            Before,
            json!({"reason": "invalid_credentials"}),
        ),
        FaultTemplate::new(
            "memory_exhaustion",
            "Worker runs out of memory",
            ResourceExhaustion,
            0.02,
            During,
            json!({"resource": "memory", "limitMb": 512}),
        ),
        FaultTemplate::new(
            "rate_limit_exceeded",
            "Upstream quota is exhausted",
            ResourceExhaustion,
            0.1,
            Before,
            json!({"resource": "rate_limit", "retryAfterMs": 60_000}),
        ),
        FaultTemplate::new(
            "data_corruption",
            "Output bytes are silently damaged",
            DataCorruption,
            0.01,
            After,
            json!({"corruptionRate": 0.1}),
        ),
        FaultTemplate::new(
            "cascading_failure",
            "A dependency failure spreads downstream",
            CascadingFailure,
            0.05,
            During,
            json!({"affectedNodes": 3}),
        ),
        FaultTemplate::new(
            "intermittent_failure",
            "Transient error that clears on retry",
            IntermittentFailure,
            0.2,
            During,
            json!({"failureRate": 0.3}),
        ),
        FaultTemplate::new(
            "slow_response",
            "Response arrives well past expected latency",
            SlowResponse,
            0.3,
            During,
            json!({"delayMs": 5_000}),
        ),
        FaultTemplate::new(
            "partial_data",
            "Only part of the payload arrives",
            PartialData,
            0.1,
            After,
            json!({"completeness": 0.6}),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_covers_every_fault_type() {
        let templates = builtin_templates();
        assert_eq!(templates.len(), 13);
        for fault_type in FaultType::ALL {
            assert!(
                templates.iter().any(|t| t.fault_type == fault_type),
                "no template for {fault_type}"
            );
        }
    }

    #[test]
    fn overrides_merge_over_defaults() {
        let template = builtin_templates()
            .into_iter()
            .find(|t| t.name == "api_error_5xx")
            .unwrap();

        let overrides = FaultOverrides::default()
            .with_probability(2.0)
            .with_parameter("statusCode", json!(502));
        let scenario = template.instantiate("fetch", overrides);

        assert!((scenario.probability - 1.0).abs() < f64::EPSILON);
        assert_eq!(scenario.timing, FaultTiming::During);
        assert_eq!(scenario.param_u64("statusCode"), Some(502));
        assert_eq!(scenario.param_str("message"), Some("Service Unavailable"));
        assert!(scenario.enabled);
    }
}
