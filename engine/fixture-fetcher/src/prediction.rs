//! Match outcome predictions from a generative model.
//!
//! Predictions are decoration: a failure for one fixture yields the
//! "unavailable" placeholder for that fixture and the batch carries on.

use crate::backoff::Sleeper;
use crate::config::FetcherConfig;
use crate::error::{FetcherError, Result};
use crate::models::{Fixture, MatchBoard, Prediction, Rank};
use anyhow::{anyhow, Context};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Produces a prediction for one fixture
#[async_trait::async_trait]
pub trait Predictor: Send + Sync {
    async fn predict(&self, fixture: &Fixture) -> anyhow::Result<Prediction>;
}

/// Shape the model is asked to answer with
#[derive(Debug, Deserialize)]
struct RawPrediction {
    winner: String,
    confidence: Value,
    #[serde(default)]
    reasoning: String,
}

fn describe_rank(rank: Rank) -> String {
    match rank {
        Rank::Ranked(n) => format!("ranked #{n}"),
        Rank::Unranked => "unranked".to_string(),
    }
}

/// Prompt sent for one fixture
pub fn build_prompt(fixture: &Fixture) -> String {
    format!(
        "Act as a professional tennis analyst.\n\
         Match: {} ({}) vs {} ({})\n\
         Tournament: {}\n\
         Surface: {:?}\n\n\
         Predict the winner based on general knowledge of these players.\n\
         Output JSON with these keys: winner, confidence (number 0-100), reasoning (max 15 words).",
        fixture.participant_a.name,
        describe_rank(fixture.participant_a.rank),
        fixture.participant_b.name,
        describe_rank(fixture.participant_b.rank),
        fixture.tournament_name,
        fixture.surface,
    )
}

/// Used when the model gives no usable reasoning
pub const DEFAULT_REASONING: &str = "No reasoning provided.";

/// First sentence of `text`, terminator included. A terminator only ends the
/// sentence when followed by whitespace, so "2.5" stays intact.
fn first_sentence(text: &str) -> String {
    let text = text.trim();
    let mut chars = text.char_indices().peekable();
    while let Some((index, c)) = chars.next() {
        let at_boundary = chars.peek().map_or(true, |(_, next)| next.is_whitespace());
        if matches!(c, '.' | '!' | '?') && at_boundary {
            return text[..=index].to_string();
        }
    }
    if text.is_empty() {
        DEFAULT_REASONING.to_string()
    } else {
        text.to_string()
    }
}

fn confidence_from(value: &Value) -> Option<u8> {
    let raw = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s
            .trim()
            .trim_end_matches('%')
            .trim()
            .parse::<f64>()
            .ok()?,
        _ => return None,
    };
    raw.is_finite().then(|| raw.round().clamp(0.0, 100.0) as u8)
}

/// Parse the model's JSON answer
pub fn parse_prediction(text: &str) -> anyhow::Result<Prediction> {
    let text = text.trim();
    let text = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .map(|inner| inner.trim_end_matches("```"))
        .unwrap_or(text);

    let raw: RawPrediction =
        serde_json::from_str(text.trim()).context("prediction is not the expected JSON")?;

    let winner = raw.winner.trim();
    if winner.is_empty() {
        return Err(anyhow!("prediction has no winner"));
    }
    let confidence = confidence_from(&raw.confidence)
        .ok_or_else(|| anyhow!("unusable confidence {}", raw.confidence))?;

    Ok(Prediction {
        winner: winner.to_string(),
        confidence,
        reasoning: first_sentence(&raw.reasoning),
    })
}

/// Text of the first candidate in a `generateContent` response
pub fn response_text(response: &Value) -> Option<&str> {
    response
        .pointer("/candidates/0/content/parts/0/text")
        .and_then(Value::as_str)
}

/// Request body asking for a JSON answer
pub fn request_body(prompt: &str) -> Value {
    json!({
        "contents": [{"parts": [{"text": prompt}]}],
        "generationConfig": {"responseMimeType": "application/json"}
    })
}

/// Gemini `generateContent` REST client.
///
/// The API key travels in a header, never in the URL, so request errors that
/// echo the URL cannot leak it into the logs.
pub struct GeminiPredictor {
    client: Client,
    endpoint: String,
}

impl GeminiPredictor {
    pub fn new(api_key: String, model: &str, base_url: &str, timeout: Duration) -> Result<Self> {
        let mut key = HeaderValue::from_str(&api_key)
            .map_err(|e| FetcherError::config(format!("invalid prediction API key header: {e}")))?;
        key.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(HeaderName::from_static("x-goog-api-key"), key);

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;
        let endpoint = format!(
            "{}/models/{}:generateContent",
            base_url.trim_end_matches('/'),
            model
        );
        Ok(Self { client, endpoint })
    }

    /// Predictor from configuration; `None` when no API key is set
    pub fn from_config(config: &FetcherConfig) -> Result<Option<Self>> {
        let Some(api_key) = config.get_prediction_api_key() else {
            info!("{} not set, predictions disabled", config.prediction.api_key_env);
            return Ok(None);
        };
        let predictor = Self::new(
            api_key,
            &config.prediction.model,
            &config.prediction.base_url,
            config.http_timeout(),
        )?;
        Ok(Some(predictor))
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait::async_trait]
impl Predictor for GeminiPredictor {
    async fn predict(&self, fixture: &Fixture) -> anyhow::Result<Prediction> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&request_body(&build_prompt(fixture)))
            .send()
            .await
            .context("Failed to reach the prediction API")?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("prediction API returned {status}"));
        }

        let body: Value = response.json().await.context("Failed to parse prediction response")?;
        let text = response_text(&body)
            .ok_or_else(|| anyhow!("prediction response has no candidate text"))?;
        parse_prediction(text)
    }
}

/// Predict fixtures in board order, pausing `delay` between calls.
///
/// At most `limit` fixtures are sent; the rest, and every failure, end up
/// with the placeholder when the report is built.
pub async fn enrich_board(
    board: &MatchBoard,
    predictor: &dyn Predictor,
    sleeper: &dyn Sleeper,
    delay: Duration,
    limit: usize,
) -> HashMap<String, Prediction> {
    let mut predictions = HashMap::new();

    for (index, fixture) in board.fixtures().take(limit).enumerate() {
        if index > 0 {
            sleeper.sleep(delay).await;
        }

        info!("Analyzing {} vs {}...", fixture.participant_a.name, fixture.participant_b.name);
        let prediction = match predictor.predict(fixture).await {
            Ok(prediction) => {
                debug!("Prediction for {}: {:?}", fixture.id, prediction);
                prediction
            }
            Err(e) => {
                warn!("Prediction failed for {}: {:#}", fixture.id, e);
                Prediction::unavailable()
            }
        };
        predictions.insert(fixture.id.clone(), prediction);
    }

    predictions
}


#[cfg(test)]
mod tests {
    use super::testing::FavoritePredictor;
    use super::*;
    use crate::backoff::testing::RecordingSleeper;
    use crate::models::{Division, Participant, Surface};

    fn fixture(id: &str) -> Fixture {
        let participant = |name: &str, rank| Participant {
            name: name.to_string(),
            rank,
            image_url: "https://img.test/p.png".to_string(),
        };
        Fixture::new(
            id.to_string(),
            "US Open".to_string(),
            Surface::Hard,
            participant(&format!("{id}-a"), Rank::Ranked(4)),
            participant(&format!("{id}-b"), Rank::Unranked),
            None,
        )
    }

    fn board(ids: &[&str]) -> MatchBoard {
        let mut division = Division::new("wta", "WTA Tour");
        for id in ids {
            division.insert(fixture(id));
        }
        MatchBoard {
            divisions: vec![division],
        }
    }

    #[test]
    fn test_parse_prediction() {
        let text = r#"{
            "winner": "Coco Gauff",
            "confidence": 72,
            "reasoning": "Stronger serve. Also fitter."
        }"#;
        let prediction = parse_prediction(text).unwrap();
        assert_eq!(prediction.winner, "Coco Gauff");
        assert_eq!(prediction.confidence, 72);
        assert_eq!(prediction.reasoning, "Stronger serve.");
    }

    #[test]
    fn test_parse_prediction_tolerates_fences_and_odd_confidence() {
        let text = concat!(
            "```json\n",
            r#"{"winner": "A", "confidence": "85%", "reasoning": "Form"}"#,
            "\n```"
        );
        let prediction = parse_prediction(text).unwrap();
        assert_eq!(prediction.confidence, 85);
        assert_eq!(prediction.reasoning, "Form");

        let missing = parse_prediction(r#"{"winner": "A", "confidence": 50}"#).unwrap();
        assert_eq!(missing.reasoning, DEFAULT_REASONING);
        let blank =
            parse_prediction(r#"{"winner": "A", "confidence": 50, "reasoning": "  "}"#).unwrap();
        assert_eq!(blank.reasoning, DEFAULT_REASONING);

        let clamped = parse_prediction(r#"{"winner": "A", "confidence": 140.4}"#).unwrap();
        assert_eq!(clamped.confidence, 100);
        let clamped = parse_prediction(r#"{"winner": "A", "confidence": -3}"#).unwrap();
        assert_eq!(clamped.confidence, 0);
    }

    #[test]
    fn test_parse_prediction_rejects_garbage() {
        assert!(parse_prediction("I think A wins").is_err());
        assert!(parse_prediction(r#"{"winner": " ", "confidence": 50}"#).is_err());
        assert!(parse_prediction(r#"{"winner": "A", "confidence": "high"}"#).is_err());
    }

    #[test]
    fn test_response_text_and_request_body() {
        let response = json!({
            "candidates": [{"content": {"parts": [{"text": "{\"winner\": \"A\"}"}]}}]
        });
        assert_eq!(response_text(&response), Some("{\"winner\": \"A\"}"));
        assert_eq!(response_text(&json!({"candidates": []})), None);

        let body = request_body("hello");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "hello");
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
    }

    #[test]
    fn test_decimal_point_does_not_end_sentence() {
        let text =
            r#"{"winner": "A", "confidence": 60, "reasoning": "Ranked 2.5 places higher. Tired."}"#;
        let prediction = parse_prediction(text).unwrap();
        assert_eq!(prediction.reasoning, "Ranked 2.5 places higher.");

        let text = r#"{"winner": "A", "confidence": 60, "reasoning": "Wins 6.4% more points"}"#;
        assert_eq!(parse_prediction(text).unwrap().reasoning, "Wins 6.4% more points");
    }

    #[tokio::test]
    async fn test_failed_request_does_not_expose_api_key() {
        let predictor = GeminiPredictor::new(
            "SECRET123".to_string(),
            "gemini-1.5-flash",
            "http://127.0.0.1:1/v1beta",
            Duration::from_secs(2),
        )
        .unwrap();

        let error = predictor.predict(&fixture("m1")).await.unwrap_err();
        let logged = format!("{error:#} {error:?}");

        assert!(logged.contains("generateContent"));
        assert!(!logged.contains("SECRET123"));
        assert!(!predictor.endpoint().contains("SECRET123"));
    }

    #[test]
    fn test_prompt_mentions_players_and_surface() {
        let prompt = build_prompt(&fixture("m1"));
        assert!(prompt.contains("m1-a (ranked #4) vs m1-b (unranked)"));
        assert!(prompt.contains("Surface: Hard"));
    }

    #[test]
    fn test_endpoint() {
        let predictor = GeminiPredictor::new(
            "k".to_string(),
            "gemini-1.5-flash",
            "https://api.test/v1beta/",
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(
            predictor.endpoint(),
            "https://api.test/v1beta/models/gemini-1.5-flash:generateContent"
        );
    }

    #[tokio::test]
    async fn test_enrich_isolates_failures_and_paces_calls() {
        let predictor = FavoritePredictor::failing_for(&["m2"]);
        let sleeper = RecordingSleeper::default();
        let board = board(&["m1", "m2", "m3"]);

        let delay = Duration::from_millis(4000);
        let predictions = enrich_board(&board, &predictor, &sleeper, delay, 10).await;

        assert_eq!(predictions.len(), 3);
        assert_eq!(predictions["m1"].winner, "m1-a");
        assert_eq!(predictions["m2"], Prediction::unavailable());
        assert_eq!(predictions["m3"].confidence, 65);
        assert_eq!(sleeper.recorded(), vec![Duration::from_millis(4000); 2]);
    }

    #[tokio::test]
    async fn test_enrich_respects_limit() {
        let predictor = FavoritePredictor::default();
        let sleeper = RecordingSleeper::default();
        let board = board(&["m1", "m2", "m3"]);

        let delay = Duration::from_millis(10);
        let predictions = enrich_board(&board, &predictor, &sleeper, delay, 2).await;

        assert_eq!(predictions.len(), 2);
        assert_eq!(predictor.call_count(), 2);
        assert_eq!(sleeper.recorded().len(), 1);
    }
}
