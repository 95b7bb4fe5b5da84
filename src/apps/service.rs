use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::apps::dto::GenerateRequest;
use crate::apps::repo::GeneratedApp;
use crate::auth::repo::User;
use crate::generation::GenerationError;
use crate::state::AppState;

const DEFAULT_APP_NAME: &str = "My App";
const DESCRIPTION_MAX_CHARS: usize = 100;

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("prompt must not be empty")]
    EmptyPrompt,
    #[error("no credits remaining")]
    InsufficientCredit,
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error("storage error: {0}")]
    Store(#[from] anyhow::Error),
}

pub struct GenerationOutcome {
    pub app: GeneratedApp,
    pub credits_left: i32,
}

/// The generation pipeline, stages in strict order, short-circuiting on
/// failure: validate, admit (credit check + deduction), call the gateway,
/// persist. The credit spent at admission stays spent if the gateway call
/// fails.
pub async fn run_generation(
    state: &AppState,
    user_id: Uuid,
    req: GenerateRequest,
) -> Result<GenerationOutcome, GenerateError> {
    if req.prompt.trim().is_empty() {
        return Err(GenerateError::EmptyPrompt);
    }

    let credits_left = User::try_deduct_credit(&state.db, user_id)
        .await?
        .ok_or(GenerateError::InsufficientCredit)?;

    let code = state.generator.generate(&req.prompt).await?;

    let name = req
        .name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_APP_NAME.to_string());
    let description = derive_description(&req.prompt);

    let app = GeneratedApp::insert(
        &state.db,
        user_id,
        &name,
        &description,
        &req.prompt,
        &code,
        req.is_public,
    )
    .await?;

    info!(user_id = %user_id, app_id = %app.id, credits_left, "app generated");
    Ok(GenerationOutcome { app, credits_left })
}

/// First 100 characters of the prompt, cut on a char boundary.
fn derive_description(prompt: &str) -> String {
    prompt.chars().take(DESCRIPTION_MAX_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_prompt_is_its_own_description() {
        assert_eq!(derive_description("calculator"), "calculator");
    }

    #[test]
    fn long_prompt_is_truncated_to_100_chars() {
        let prompt = "x".repeat(250);
        let description = derive_description(&prompt);
        assert_eq!(description.chars().count(), 100);
        assert!(prompt.starts_with(&description));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let prompt = "é".repeat(150);
        let description = derive_description(&prompt);
        assert_eq!(description.chars().count(), 100);
    }
}
