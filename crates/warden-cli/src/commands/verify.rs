//! verify command - evaluate one login attempt

use super::CommandContext;
use anyhow::Result;
use colored::Colorize;
use serde::Serialize;
use warden_auth::{AttemptInput, AuthDecision, PolicyEngine};

#[derive(Serialize)]
struct VerifyResult {
    username: String,
    outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
}

impl From<&AuthDecision> for VerifyResult {
    fn from(decision: &AuthDecision) -> Self {
        Self {
            username: decision.username().to_string(),
            outcome: decision.outcome(),
            reason: decision.reason().map(|r| r.to_string()),
        }
    }
}

/// Returns whether the attempt succeeded
pub async fn execute(ctx: &CommandContext, username: &str, password: &str) -> Result<bool> {
    let engine = PolicyEngine::new(ctx.config.clone());
    let decision = engine
        .evaluate(AttemptInput::new(username, password))
        .await;

    if ctx.is_json() {
        ctx.print_json(&VerifyResult::from(&decision))?;
    } else {
        match decision.reason() {
            None => println!("{} {}", "✓".green(), decision.username().bold()),
            Some(reason) => ctx.error(&format!(
                "{} {} ({})",
                "✗".red(),
                decision.username().bold(),
                reason.as_str().yellow()
            )),
        }
    }

    Ok(decision.is_success())
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::ReasonCode;

    #[test]
    fn test_result_shape() {
        let result = VerifyResult::from(&AuthDecision::failure("bob", ReasonCode::LdapBind));
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["username"], "bob");
        assert_eq!(json["outcome"], "failure");
        assert_eq!(json["reason"], "ldap-bind");

        let result = VerifyResult::from(&AuthDecision::success("alice"));
        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("reason").is_none());
    }

    #[tokio::test]
    async fn test_unconfigured_engine_denies() {
        let ctx = CommandContext {
            config: None,
            output_format: crate::OutputFormat::Json,
        };

        assert!(!execute(&ctx, "alice", "secret").await.unwrap());
    }
}
