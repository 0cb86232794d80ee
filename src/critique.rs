//! Structured critique of a tattoo concept from a text model, with a local
//! fallback so the caller always gets a usable analysis.

use std::sync::Arc;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::models::Analysis;
use crate::provider::{wait_for_prediction, Credential, PollPolicy, PredictionApi, ProviderError};

pub const PROS_LEN: usize = 3;
pub const CONS_LEN: usize = 2;

const FALLBACK_RATINGS: [f64; 5] = [7.5, 8.0, 8.5, 9.0, 9.5];

const FALLBACK_PROS: [[&str; PROS_LEN]; 4] = [
    ["Natural skin integration", "Clean line work", "Balanced composition"],
    ["Excellent contrast", "Anatomically aware placement", "Style consistency"],
    ["Dynamic flow", "Proper sizing for the area", "Detail preservation"],
    ["Professional appearance", "Skin tone harmony", "Clear visual hierarchy"],
];

const FALLBACK_CONS: [[&str; CONS_LEN]; 4] = [
    ["Consider adjusting position slightly", "May need touch-up after healing"],
    ["Edges might blur over time", "Could explore more detail in corners"],
    ["Contrast may fade with sun exposure", "Consider slightly larger scale"],
    ["Some areas may stretch with muscle movement", "Minor opacity adjustments recommended"],
];

fn consultation_prompt(style: &str, concept: &str) -> String {
    format!(
        "You are a world-class tattoo artist giving a consultation. \
        Analyze this tattoo idea: Style: \"{style}\", Concept: \"{concept}\". \
        Provide a JSON response with: \
        - \"rating\": number 1-10 \
        - \"feedback\": Professional artistic critique (max 2 sentences) \
        - \"pros\": Array of 3 specific strengths (short phrases) \
        - \"cons\": Array of 2 considerations/warnings (short phrases) \
        Do not output markdown code blocks. Output ONLY raw JSON."
    )
}

/// Locally generated critique used whenever the text model cannot be trusted.
pub fn heuristic_analysis<R: Rng + ?Sized>(style: &str, concept: &str, rng: &mut R) -> Analysis {
    let feedbacks = [
        format!("The {style} style works beautifully with your concept of \"{concept}\". The placement follows natural body contours."),
        format!("Excellent visualization! The tattoo integrates naturally with your skin and the {style} aesthetic shines through."),
        format!("Great composition. The {style} interpretation of \"{concept}\" creates a striking visual impact."),
        format!("The design flows well with your body's anatomy. {style} elements are clearly defined and balanced."),
    ];
    let rating = *FALLBACK_RATINGS.choose(rng).unwrap_or(&8.5);
    let feedback = feedbacks.choose(rng).cloned().unwrap_or_default();
    let pros = FALLBACK_PROS.choose(rng).unwrap_or(&FALLBACK_PROS[0]);
    let cons = FALLBACK_CONS.choose(rng).unwrap_or(&FALLBACK_CONS[0]);
    Analysis {
        rating,
        feedback,
        pros: pros.iter().map(|s| s.to_string()).collect(),
        cons: cons.iter().map(|s| s.to_string()).collect(),
    }
}

#[derive(Debug, Deserialize)]
struct RawCritique {
    rating: Option<f64>,
    feedback: Option<String>,
    pros: Option<Vec<String>>,
    cons: Option<Vec<String>>,
}

/// Parses model text into an analysis. Missing fields get defaults; a field
/// that is present but out of shape rejects the whole payload.
pub fn parse_critique(text: &str, style: &str) -> Result<Analysis, ProviderError> {
    let cleaned = text.replace("```json", "").replace("```", "");
    let raw: RawCritique = serde_json::from_str(cleaned.trim())
        .map_err(|e| ProviderError::Malformed(format!("critique is not JSON: {e}")))?;

    let rating = raw.rating.unwrap_or(8.5);
    if !(1.0..=10.0).contains(&rating) {
        return Err(ProviderError::Malformed(format!("rating {rating} outside 1-10")));
    }
    let pros = raw.pros.unwrap_or_else(|| vec!["Strong concept".into(), "Good flow".into(), "Clear style".into()]);
    let cons = raw.cons.unwrap_or_else(|| vec!["Consider placement size".into(), "Detailed care needed".into()]);
    if pros.len() != PROS_LEN || cons.len() != CONS_LEN {
        return Err(ProviderError::Malformed(format!("expected {PROS_LEN} pros and {CONS_LEN} cons, got {} and {}", pros.len(), cons.len())));
    }
    let feedback = raw
        .feedback
        .filter(|f| !f.trim().is_empty())
        .unwrap_or_else(|| format!("Excellent {style} design concept."));

    Ok(Analysis { rating, feedback, pros, cons })
}

/// Asks the text model for a critique. Infallible from the caller's view.
pub struct CritiqueRequester {
    api: Arc<dyn PredictionApi>,
    model: String,
    policy: PollPolicy,
    rng: Mutex<StdRng>,
}

impl CritiqueRequester {
    pub fn new(api: Arc<dyn PredictionApi>, model: impl Into<String>, policy: PollPolicy) -> Self {
        Self::with_rng(api, model, policy, StdRng::from_entropy())
    }

    pub fn with_rng(api: Arc<dyn PredictionApi>, model: impl Into<String>, policy: PollPolicy, rng: StdRng) -> Self {
        Self { api, model: model.into(), policy, rng: Mutex::new(rng) }
    }

    pub async fn critique(&self, credential: &Credential, style: &str, concept: &str) -> Analysis {
        match self.request(credential, style, concept).await {
            Ok(analysis) => {
                info!("✅ Critique received: rating {}", analysis.rating);
                analysis
            }
            Err(e) => {
                warn!("🔄 Critique unavailable ({}), using local heuristic", e);
                self.fallback(style, concept)
            }
        }
    }

    pub fn fallback(&self, style: &str, concept: &str) -> Analysis {
        heuristic_analysis(style, concept, &mut *self.rng.lock())
    }

    async fn request(&self, credential: &Credential, style: &str, concept: &str) -> Result<Analysis, ProviderError> {
        let input = json!({
            "prompt": consultation_prompt(style, concept),
            "max_tokens": 300,
            "temperature": 0.7,
            "top_p": 0.9
        });
        let submitted = self.api.create_prediction(credential, &self.model, input).await?;
        let done = wait_for_prediction(&*self.api, credential, submitted, &self.policy).await?;
        let text = done
            .output
            .as_ref()
            .and_then(|o| o.joined_text())
            .ok_or_else(|| ProviderError::Malformed("critique returned no text".into()))?;
        parse_critique(&text, style)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_fenced_json() {
        let text = "```json\n{\"rating\": 9, \"feedback\": \"Crisp.\", \"pros\": [\"a\",\"b\",\"c\"], \"cons\": [\"d\",\"e\"]}\n```";
        let a = parse_critique(text, "Fineline").unwrap();
        assert_eq!(a.rating, 9.0);
        assert_eq!(a.feedback, "Crisp.");
        assert_eq!(a.cons, vec!["d", "e"]);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let a = parse_critique(r#"{"rating": 6.5}"#, "Blackwork").unwrap();
        assert_eq!(a.feedback, "Excellent Blackwork design concept.");
        assert_eq!(a.pros.len(), PROS_LEN);
        assert_eq!(a.cons.len(), CONS_LEN);
    }

    #[test]
    fn out_of_shape_payloads_are_rejected() {
        assert!(parse_critique("Sure! Here is my critique:", "Realism").is_err());
        assert!(parse_critique(r#"{"rating": 42}"#, "Realism").is_err());
        assert!(parse_critique(r#"{"pros": ["only one"]}"#, "Realism").is_err());
    }

    #[test]
    fn heuristic_is_reproducible_and_well_shaped() {
        let a = heuristic_analysis("Cyberpunk", "neon koi", &mut StdRng::seed_from_u64(7));
        let b = heuristic_analysis("Cyberpunk", "neon koi", &mut StdRng::seed_from_u64(7));
        assert_eq!(a, b);
        for seed in 0..32 {
            let h = heuristic_analysis("Cyberpunk", "neon koi", &mut StdRng::seed_from_u64(seed));
            assert!(FALLBACK_RATINGS.contains(&h.rating));
            assert_eq!(h.pros.len(), PROS_LEN);
            assert_eq!(h.cons.len(), CONS_LEN);
            assert!(!h.feedback.is_empty());
        }
    }
}
