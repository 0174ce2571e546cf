//! Composable input guardrails: injection detection, then loop detection

mod injection;
mod loopdetect;

pub use injection::{Detection, InjectionDetector, Severity};
pub use loopdetect::{LoopCheck, LoopDetector};

use crate::types::{LlmDetectionConfig, LoopDetectionConfig};
use serde_json::Value;
use tracing::warn;

/// Verdict of the composite validator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardrailVerdict {
    Allowed,
    Blocked(String),
}

impl GuardrailVerdict {
    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Blocked(_))
    }
}

/// Composite guardrail front-ending the invocation pipeline
pub struct Guardrails {
    injection: InjectionDetector,
    loops: LoopDetector,
}

impl Guardrails {
    pub fn new(llm: LlmDetectionConfig, loops: LoopDetectionConfig) -> Self {
        Self {
            injection: InjectionDetector::new(llm),
            loops: LoopDetector::new(loops),
        }
    }

    /// Injection check first, short-circuiting on detection; then the loop
    /// check. Returns a human-readable blocking reason.
    pub async fn validate_tool_input(&self, tool: &str, args: &Value) -> GuardrailVerdict {
        let detection = self.injection.validate_tool_input(tool, args).await;
        if detection.detected {
            warn!(tool, patterns = ?detection.patterns, "injection patterns matched");
            let reason = if detection.high_severity {
                "High-risk prompt injection detected"
            } else {
                "Prompt injection detected"
            };
            return GuardrailVerdict::Blocked(reason.to_string());
        }

        let check = self.loops.check_for_loop(tool, args);
        if check.is_loop {
            warn!(tool, cooldown_until = ?check.cooldown_until, "loop detected");
            return GuardrailVerdict::Blocked(check.message);
        }

        GuardrailVerdict::Allowed
    }
}
