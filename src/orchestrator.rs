//! Primary/fallback image generation with a critique running alongside.

use std::fmt;
use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{info, warn, error};

use crate::compositor::BakedImage;
use crate::config::Config;
use crate::critique::CritiqueRequester;
use crate::error::InkError;
use crate::models::{Analysis, GenerationResult};
use crate::provider::{preview, wait_for_prediction, Credential, PollPolicy, PredictionApi, ProviderError};
use crate::selection::SelectionBox;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Primary,
    Fallback,
}

/// Where a single simulate call currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Submitting(Tier),
    Polling(Tier),
    Succeeded,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Idle => write!(f, "idle"),
            Stage::Submitting(t) => write!(f, "submitting ({:?})", t),
            Stage::Polling(t) => write!(f, "polling ({:?})", t),
            Stage::Succeeded => write!(f, "succeeded"),
            Stage::Failed => write!(f, "failed"),
        }
    }
}

pub fn primary_prompt(style: &str, prompt: &str, has_selection: bool) -> String {
    let area = if has_selection { "in the selected area" } else { "naturally placed on the body" };
    format!(
        "A photorealistic photo of a person with a {style} style tattoo of {prompt} {area}. \
        The tattoo looks like fresh ink on real skin, professional tattoo photography, high quality, detailed linework, realistic skin texture"
    )
}

pub fn fallback_prompt(style: &str, prompt: &str) -> String {
    format!(
        "Add a {style} style tattoo of {prompt} on the person in this image. \
        Make the tattoo look realistic as fresh ink on skin. Keep the same person, same pose, same scene. \
        Only add the tattoo naturally on visible skin."
    )
}

pub struct Orchestrator {
    api: Arc<dyn PredictionApi>,
    critic: Arc<CritiqueRequester>,
    credential: Option<Credential>,
    primary_model: String,
    fallback_model: String,
    poll: PollPolicy,
}

impl Orchestrator {
    pub fn new(config: &Config, api: Arc<dyn PredictionApi>) -> Self {
        let critic = CritiqueRequester::new(api.clone(), config.critique_model.clone(), config.critique_poll);
        Self::with_critic(config, api, Arc::new(critic))
    }

    pub fn with_critic(config: &Config, api: Arc<dyn PredictionApi>, critic: Arc<CritiqueRequester>) -> Self {
        Self {
            api,
            critic,
            credential: config.credential.clone(),
            primary_model: config.primary_model.clone(),
            fallback_model: config.fallback_model.clone(),
            poll: config.generation_poll,
        }
    }

    pub fn is_configured(&self) -> bool { self.credential.is_some() }

    /// Generates a mockup and critique for `prompt` (already enriched with
    /// the placement clause). Tries the primary model once, then the
    /// fallback once; the critique is requested exactly once either way.
    pub async fn generate_tattoo_mockup(
        &self,
        image: &BakedImage,
        prompt: &str,
        style: &str,
        selection: Option<&SelectionBox>,
    ) -> Result<GenerationResult, InkError> {
        if image.is_empty() {
            return Err(InkError::InvalidRequest("no image to submit".into()));
        }
        if prompt.trim().is_empty() {
            return Err(InkError::InvalidRequest("describe the tattoo concept first".into()));
        }
        let credential = self.credential.clone().ok_or(InkError::MissingCredential)?;

        info!("🎯 Stage {} → simulating '{}' in {} style", Stage::Idle, preview(prompt, 80), style);

        let critique = {
            let critic = self.critic.clone();
            let credential = credential.clone();
            let (style, prompt) = (style.to_string(), prompt.to_string());
            tokio::spawn(async move { critic.critique(&credential, &style, &prompt).await })
        };

        let primary_input = json!({
            "prompt": primary_prompt(style, prompt, selection.is_some()),
            "aspect_ratio": "1:1",
            "image_input": [image.data_uri],
        });
        let url = match self.run_tier(&credential, Tier::Primary, &self.primary_model, primary_input).await {
            Ok(url) => url,
            Err(primary) => {
                warn!("🔄 {} failed ({}), falling back to {}", self.primary_model, primary, self.fallback_model);
                let fallback_input = json!({
                    "prompt": fallback_prompt(style, prompt),
                    "image_input": [image.data_uri],
                });
                match self.run_tier(&credential, Tier::Fallback, &self.fallback_model, fallback_input).await {
                    Ok(url) => url,
                    Err(fallback) => {
                        critique.abort();
                        error!("❌ Stage {}: both models failed (primary: {}; fallback: {})", Stage::Failed, primary, fallback);
                        return Err(InkError::GenerationExhausted { primary, fallback });
                    }
                }
            }
        };

        let analysis = match critique.await {
            Ok(analysis) => analysis,
            Err(e) => {
                warn!("⚠️ Critique task ended abnormally ({}), using local heuristic", e);
                self.fallback_analysis(style, prompt)
            }
        };
        info!("✅ Stage {}: {}", Stage::Succeeded, preview(&url, 120));
        Ok(GenerationResult { result_image_url: url, analysis })
    }

    fn fallback_analysis(&self, style: &str, prompt: &str) -> Analysis {
        self.critic.fallback(style, prompt)
    }

    async fn run_tier(&self, credential: &Credential, tier: Tier, model: &str, input: Value) -> Result<String, ProviderError> {
        info!("📤 Stage {} with {}", Stage::Submitting(tier), model);
        let submitted = self.api.create_prediction(credential, model, input).await?;

        info!("⏳ Stage {} for prediction {}", Stage::Polling(tier), submitted.id);
        let done = wait_for_prediction(&*self.api, credential, submitted, &self.poll).await?;

        done.output
            .as_ref()
            .and_then(|o| o.artifact_url())
            .ok_or_else(|| ProviderError::Malformed(format!("{} returned no usable output", model)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_prompt_mentions_area() {
        assert!(primary_prompt("Blackwork", "a raven", true).contains("a raven in the selected area."));
        assert!(primary_prompt("Blackwork", "a raven", false).contains("naturally placed on the body"));
    }

    #[test]
    fn fallback_prompt_keeps_scene() {
        let p = fallback_prompt("Geometric", "a fox");
        assert!(p.starts_with("Add a Geometric style tattoo of a fox on the person"));
        assert!(p.contains("Keep the same person"));
    }
}
