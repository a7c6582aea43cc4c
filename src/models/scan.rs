//! Scan configuration sent once to the external scan process.

use serde::Serialize;

use crate::{AppError, Result};

/// Immutable per-session scan configuration.
///
/// Serialized as a flat JSON object with keys `target`, `objective`,
/// `provider` and `model`. Unset optional keys are omitted from the wire,
/// never encoded as empty strings.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ScanConfig {
    target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    objective: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<String>,
}

impl ScanConfig {
    /// Validate and build a configuration.
    ///
    /// Surrounding whitespace is trimmed; blank optional values are treated
    /// as unset.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` if `target` is empty.
    pub fn new(
        target: &str,
        objective: Option<&str>,
        provider: Option<&str>,
        model: Option<&str>,
    ) -> Result<Self> {
        let target = target.trim();
        if target.is_empty() {
            return Err(AppError::Validation("scan target must not be empty".into()));
        }

        Ok(Self {
            target: target.to_owned(),
            objective: normalize(objective),
            provider: normalize(provider),
            model: normalize(model),
        })
    }

    /// Convenience constructor for a target-only configuration.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Validation` if `target` is empty.
    pub fn for_target(target: &str) -> Result<Self> {
        Self::new(target, None, None, None)
    }

    /// Scan target (URL or host).
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Optional focus objective.
    #[must_use]
    pub fn objective(&self) -> Option<&str> {
        self.objective.as_deref()
    }

    /// Optional LLM provider name.
    #[must_use]
    pub fn provider(&self) -> Option<&str> {
        self.provider.as_deref()
    }

    /// Optional LLM model name.
    #[must_use]
    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    /// Serialize to the single outbound protocol line, newline included.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Bridge` if serialization fails.
    pub fn to_wire_line(&self) -> Result<String> {
        let mut line = serde_json::to_string(self)
            .map_err(|err| AppError::Bridge(format!("failed to serialize scan config: {err}")))?;
        line.push('\n');
        Ok(line)
    }
}

fn normalize(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}
