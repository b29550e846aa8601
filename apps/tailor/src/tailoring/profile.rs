use tracing::warn;

use crate::errors::AppError;
use crate::llm_client::prompts::profile_selection_input;
use crate::llm_client::{PromptKind, TextCompletion};
use crate::retry::{Attempt, RetryPolicy};

/// Picks the resume profile for a role. The answer must name one of `profiles`
/// (trimmed, case-insensitive); the configured spelling is returned.
pub async fn pick_profile(
    completion: &dyn TextCompletion,
    role: Option<&str>,
    profiles: &[String],
    retry: &RetryPolicy,
) -> Result<String, AppError> {
    let Some(first) = profiles.first() else {
        return Err(AppError::Validation(
            "no resume profiles are configured".to_string(),
        ));
    };
    let Some(role) = role.map(str::trim).filter(|r| !r.is_empty()) else {
        warn!("Posting has no role; using profile '{first}'");
        return Ok(first.clone());
    };
    if profiles.len() == 1 {
        return Ok(first.clone());
    }

    let input = profile_selection_input(role, profiles);
    let input = input.as_str();
    retry
        .run("profile selection", |_| async move {
            let kind = PromptKind::ProfileSelection;
            let answer = completion
                .complete(kind, input, kind.default_temperature())
                .await?;
            let answer = answer.trim().trim_matches(|c: char| c == '"' || c == '\'' || c == '.');
            Ok::<_, AppError>(
                match profiles.iter().find(|p| p.eq_ignore_ascii_case(answer)) {
                    Some(profile) => Attempt::Done(profile.clone()),
                    None => Attempt::Mismatch(format!("'{answer}' is not a known profile")),
                },
            )
        })
        .await
}
