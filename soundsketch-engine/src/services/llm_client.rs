//! Language-model client
//!
//! OpenAI-compatible chat-completions client implementing the four call
//! shapes the pipeline uses: tag analysis, candidate relevance scoring,
//! fallback tag generation, and mix refinement, plus the cosmetic scene
//! backdrop image. Responses are parsed strictly and clamped defensively;
//! anything malformed surfaces as a `ProviderError` for the caller's
//! fallback tier to absorb.

use crate::providers::{
    CandidateSummary, GeneratedImage, LanguageModel, LayerSummary, LlmAnalysis, MixRefinement,
    ProviderError, RelevanceScore,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use soundsketch_common::config::LlmConfig;
use std::time::Duration;

/// Fixed system instruction for the sound-design domain.
const SYSTEM_PROMPT: &str = "\
You are an expert sound designer working with a library of field recordings. \
You analyze atmospheric scene descriptions and select concrete, recordable \
sound sources: what would someone actually point a microphone at to capture \
this atmosphere? Never suggest musical material (melody, beat, chord, song) \
and avoid emotional adjectives that appear in song titles. Respond ONLY with \
valid JSON matching the requested schema.";

const FALLBACK_SYSTEM_PROMPT: &str = "\
You suggest alternative audio search tags likely to have field recordings \
available on a community sound library. Favor common single-word tags such \
as rain, wind, room, eating, metal, wood, traffic. Return only a \
comma-separated list of single-word tags.";

fn tag_analysis_prompt(user_prompt: &str) -> String {
    format!(
        "ANALYZE: \"{user_prompt}\"\n\n\
         Identify 3-5 concrete sound sources a field recording artist would \
         capture in this scene, considering location, time of day, weather \
         and human activity. Single-word tags work best.\n\n\
         Respond with JSON:\n\
         {{\n\
           \"tags\": [\"tag1\", \"tag2\", ...],\n\
           \"gainScale\": 1.0,\n\
           \"confidence\": 0.9,\n\
           \"reasoning\": \"1-2 sentences\",\n\
           \"tagsToAvoid\": [\"music\", \"song\"],\n\
           \"tagGains\": {{\"tag1\": 0.5, \"tag2\": 0.3}}\n\
         }}\n\
         gainScale is the overall energy (0.5 quiet, 1.0 normal, 1.3 busy). \
         tagGains maps each tag to its layer gain: dominant 0.4-0.6, \
         supporting 0.2-0.4, background 0.1-0.2."
    )
}

fn relevance_prompt(user_prompt: &str, candidates: &[CandidateSummary]) -> String {
    let mut listing = String::new();
    for (i, c) in candidates.iter().enumerate() {
        listing.push_str(&format!(
            "{}. ID: {}\n   Name: \"{}\"\n   Tags: {}\n   By: {}\n\n",
            i + 1,
            c.id,
            c.name,
            c.tags.join(", "),
            c.username
        ));
    }
    format!(
        "Original atmosphere prompt: \"{user_prompt}\"\n\n\
         Rank these audio options by relevance for the intended atmosphere. \
         Prefer field recordings over music; check that the tags match \
         environmental content.\n\n{listing}\
         Respond with JSON:\n\
         {{\"rankings\": [{{\"audioId\": \"123\", \"relevanceScore\": 0.9, \
         \"reasoning\": \"why\"}}]}}"
    )
}

fn refinement_prompt(user_prompt: &str, layers: &[LayerSummary]) -> String {
    let mut listing = String::new();
    for layer in layers {
        listing.push_str(&format!(
            "- {}: {:.0}%{}\n",
            layer.tag,
            layer.gain * 100.0,
            layer
                .audio_name
                .as_deref()
                .map(|n| format!(" (\"{n}\")"))
                .unwrap_or_default()
        ));
    }
    format!(
        "Original prompt: \"{user_prompt}\"\n\nCurrent mix layers:\n{listing}\n\
         Suggest gain changes that better match the intended atmosphere.\n\n\
         Respond with JSON:\n\
         {{\"suggestions\": [{{\"tag\": \"rain\", \"newGain\": 0.45, \
         \"reasoning\": \"why\"}}], \"overallGainScale\": 0.8, \
         \"confidence\": 0.85}}"
    )
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct RankingsEnvelope {
    rankings: Vec<RelevanceScore>,
}

#[derive(Serialize)]
struct ImageRequest<'a> {
    model: &'static str,
    prompt: &'a str,
    size: &'static str,
    quality: &'static str,
    n: u32,
}

#[derive(Deserialize)]
struct ImageResponse {
    data: Vec<ImageDatum>,
}

#[derive(Deserialize)]
struct ImageDatum {
    url: Option<String>,
    revised_prompt: Option<String>,
}

/// OpenAI-compatible language-model client.
pub struct LlmClient {
    http_client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl LlmClient {
    pub fn new(config: &LlmConfig) -> Result<Self, ProviderError> {
        if !config.enabled {
            return Err(ProviderError::NotConfigured("LLM disabled".into()));
        }
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| ProviderError::NotConfigured("LLM API key missing".into()))?;

        let http_client = reqwest::Client::builder()
            .user_agent(concat!("SoundSketch/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    async fn chat(
        &self,
        system: &str,
        user: String,
        json_mode: bool,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, ProviderError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            max_tokens,
            temperature,
            response_format: json_mode.then_some(ResponseFormat {
                format_type: "json_object",
            }),
        };

        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api(status.as_u16(), text));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|content| !content.is_empty())
            .ok_or_else(|| ProviderError::Empty("no completion content".into()))
    }
}

#[async_trait]
impl LanguageModel for LlmClient {
    async fn analyze_prompt(&self, prompt: &str) -> Result<LlmAnalysis, ProviderError> {
        tracing::debug!(prompt = %prompt, "LLM tag analysis");

        let content = self
            .chat(
                SYSTEM_PROMPT,
                tag_analysis_prompt(prompt),
                true,
                self.max_tokens,
                self.temperature,
            )
            .await?;

        let mut analysis: LlmAnalysis =
            serde_json::from_str(&content).map_err(|e| ProviderError::Parse(e.to_string()))?;

        if analysis.tags.is_empty() {
            return Err(ProviderError::Empty("no tags in LLM response".into()));
        }

        analysis.gain_scale = Some(analysis.gain_scale.unwrap_or(1.0).clamp(0.3, 2.0));
        analysis.confidence = Some(analysis.confidence.unwrap_or(0.5).clamp(0.0, 1.0));

        tracing::info!(
            tags = ?analysis.tags,
            gain_scale = analysis.gain_scale,
            confidence = analysis.confidence,
            "LLM analysis parsed"
        );

        Ok(analysis)
    }

    async fn score_candidates(
        &self,
        prompt: &str,
        candidates: &[CandidateSummary],
    ) -> Result<Vec<RelevanceScore>, ProviderError> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let content = self
            .chat(
                SYSTEM_PROMPT,
                relevance_prompt(prompt, candidates),
                true,
                self.max_tokens,
                self.temperature,
            )
            .await?;

        let envelope: RankingsEnvelope =
            serde_json::from_str(&content).map_err(|e| ProviderError::Parse(e.to_string()))?;

        Ok(envelope
            .rankings
            .into_iter()
            .map(|mut r| {
                r.relevance_score = r.relevance_score.clamp(0.0, 1.0);
                r
            })
            .collect())
    }

    async fn fallback_tags(
        &self,
        prompt: &str,
        failed_tags: &[String],
        count: usize,
    ) -> Result<Vec<String>, ProviderError> {
        let user = format!(
            "The prompt was: \"{prompt}\". These tags found no usable \
             recordings: {}. Suggest {count} different single-word tags \
             likely to have recordings available.",
            failed_tags.join(", ")
        );

        let content = self
            .chat(FALLBACK_SYSTEM_PROMPT, user, false, 100, 0.7)
            .await?;

        let tags: Vec<String> = content
            .split(',')
            .map(|tag| {
                tag.trim()
                    .to_lowercase()
                    .chars()
                    .filter(|c| c.is_ascii_alphabetic())
                    .collect::<String>()
            })
            .filter(|tag| tag.len() > 2)
            .take(count)
            .collect();

        tracing::info!(tags = ?tags, "LLM fallback tags generated");
        Ok(tags)
    }

    async fn refine_mix(
        &self,
        prompt: &str,
        layers: &[LayerSummary],
    ) -> Result<MixRefinement, ProviderError> {
        let content = self
            .chat(
                SYSTEM_PROMPT,
                refinement_prompt(prompt, layers),
                true,
                self.max_tokens,
                self.temperature,
            )
            .await?;

        let mut refinement: MixRefinement =
            serde_json::from_str(&content).map_err(|e| ProviderError::Parse(e.to_string()))?;

        refinement.overall_gain_scale =
            Some(refinement.overall_gain_scale.unwrap_or(1.0).clamp(0.3, 2.0));
        refinement.confidence = Some(refinement.confidence.unwrap_or(0.5).clamp(0.0, 1.0));

        Ok(refinement)
    }

    async fn generate_image(&self, prompt: &str) -> Result<GeneratedImage, ProviderError> {
        let request = ImageRequest {
            model: "dall-e-3",
            prompt,
            size: "1792x1024",
            quality: "standard",
            n: 1,
        };

        let response = self
            .http_client
            .post(format!("{}/images/generations", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api(status.as_u16(), text));
        }

        let parsed: ImageResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        let datum = parsed
            .data
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Empty("no image data returned".into()))?;
        let url = datum
            .url
            .ok_or_else(|| ProviderError::Empty("no image URL returned".into()))?;

        Ok(GeneratedImage {
            url,
            revised_prompt: datum.revised_prompt,
        })
    }
}
