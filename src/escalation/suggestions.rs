//! Remediation suggestions per error category.

use crate::error::{ErrorKind, OrchestratorError};

/// Appended to every suggestion list, in this order.
pub const UNIVERSAL_SUGGESTIONS: [&str; 2] = [
    "Check logs for details",
    "Contact support if the issue persists",
];

/// Ordered remediation steps for `error`: category-specific first, then
/// the universal steps.
pub fn suggested_actions(error: &OrchestratorError) -> Vec<String> {
    let mut actions: Vec<String> = match error.kind() {
        ErrorKind::LlmApi {
            status_code,
            provider,
        } => {
            let mut steps = vec![
                format!("Check {} API credentials", provider),
                format!("Verify {} quota and billing limits", provider),
                "Check network connectivity to the provider".to_string(),
            ];
            if *status_code == Some(429) {
                steps.push("Wait for the rate limit to reset before retrying".to_string());
            }
            steps
        }
        ErrorKind::ExternalTool { command, .. } => vec![
            format!("Check credentials used by `{}`", command),
            "Check file and repository permissions".to_string(),
            "Check connectivity to remote services".to_string(),
        ],
        ErrorKind::Parse {
            file_path,
            line_number,
        } => {
            let mut steps = vec![
                "Fix syntax errors in the input".to_string(),
                "Validate the input against its schema".to_string(),
            ];
            match (file_path, line_number) {
                (Some(path), Some(line)) => {
                    steps.push(format!("Check {} at line {}", path.display(), line))
                }
                (Some(path), None) => steps.push(format!("Check {}", path.display())),
                (None, Some(line)) => steps.push(format!("Check line {}", line)),
                (None, None) => {}
            }
            steps
        }
        ErrorKind::StateCorruption {
            state_file_path, ..
        } => vec![
            "Restore state from history".to_string(),
            format!(
                "Delete {} and restart the workflow",
                state_file_path.display()
            ),
        ],
        ErrorKind::ResourceExhausted { resource_type, .. } => vec![
            format!("Free up {} resources", resource_type),
            format!("Scale infrastructure to raise the {} limit", resource_type),
        ],
        ErrorKind::Network | ErrorKind::Permission | ErrorKind::Unknown | ErrorKind::Cancelled => {
            Vec::new()
        }
    };

    actions.extend(UNIVERSAL_SUGGESTIONS.iter().map(|s| s.to_string()));
    actions
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn ends_with_universal(actions: &[String]) -> bool {
        actions.len() >= 2
            && actions[actions.len() - 2] == UNIVERSAL_SUGGESTIONS[0]
            && actions[actions.len() - 1] == UNIVERSAL_SUGGESTIONS[1]
    }

    #[test]
    fn test_llm_suggestions() {
        let actions = suggested_actions(&OrchestratorError::llm_api("x", "openai", Some(500)));
        assert_eq!(actions.len(), 5);
        assert!(actions[0].contains("credentials"));
        assert!(actions[1].contains("quota"));
        assert!(actions[2].contains("network"));
        assert!(ends_with_universal(&actions));
    }

    #[test]
    fn test_llm_rate_limit_adds_wait() {
        let actions = suggested_actions(&OrchestratorError::llm_api("x", "openai", Some(429)));
        assert_eq!(actions.len(), 6);
        assert!(actions[3].contains("rate limit"));
        assert!(ends_with_universal(&actions));
    }

    #[test]
    fn test_tool_suggestions() {
        let actions = suggested_actions(&OrchestratorError::external_tool("x", "git push", "denied"));
        assert!(actions[0].contains("git push"));
        assert!(actions[1].contains("permissions"));
        assert!(actions[2].contains("connectivity"));
        assert!(ends_with_universal(&actions));
    }

    #[test]
    fn test_parse_suggestions_cite_location() {
        let actions = suggested_actions(&OrchestratorError::parse(
            "x",
            Some(PathBuf::from("workflow.yaml")),
            Some(42),
        ));
        assert!(actions.iter().any(|a| a == "Check workflow.yaml at line 42"));

        let no_location = suggested_actions(&OrchestratorError::parse("x", None, None));
        assert_eq!(no_location.len(), 4);
    }

    #[test]
    fn test_state_and_resource_suggestions() {
        let state = suggested_actions(&OrchestratorError::state_corruption(
            "x",
            ".workflow/state.json",
            "truncated",
        ));
        assert!(state[0].contains("history"));
        assert!(state[1].contains(".workflow/state.json"));

        let resource = suggested_actions(&OrchestratorError::resource_exhausted("x", "disk", 1.0, 1.0));
        assert_eq!(resource[0], "Free up disk resources");
        assert!(resource[1].contains("Scale"));
        assert!(ends_with_universal(&resource));
    }

    #[test]
    fn test_uncategorized_get_only_universal() {
        for error in [
            OrchestratorError::network("x"),
            OrchestratorError::permission("x"),
            OrchestratorError::unknown("x"),
        ] {
            assert_eq!(
                suggested_actions(&error),
                UNIVERSAL_SUGGESTIONS.iter().map(|s| s.to_string()).collect::<Vec<_>>()
            );
        }
    }
}
