//! Food analysis and nutrition tips from the Gemini `generateContent` API.
//!
//! The model is asked for JSON, but nothing guarantees it returns JSON, so
//! every response goes through [`parse_food_analysis`] or [`parse_tips`]. Both
//! validate the shape and return a [`ParseError`] instead of guessing.

use anyhow::{anyhow, Result};
use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};

use crate::error::ParseError;
use crate::models::{Macros, MealRecord, NewMeal};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-lite";

/// Shown when nothing has been logged today.
pub const DEFAULT_TIPS: [&str; 4] = [
    "Start your day with a balanced meal!",
    "Remember to include vegetables in every meal",
    "Keep a regular meal schedule",
    "Drink enough water throughout the day",
];

/// Shown when tips could not be generated.
pub const FALLBACK_TIPS: [&str; 3] = [
    "Keep your meals nutritionally balanced",
    "Include lean protein in every meal",
    "Don't forget fruit and vegetables",
];

const ANALYSIS_PROMPT: &str = "Analyze this meal and estimate its calories and main \
macronutrients (protein, carbs, fat, fiber, sugar) for the whole portion. \
Then give 2-3 recommendations for a healthier next meal.\n\
Reply with JSON only, using exactly this structure:\n\
{\n\
  \"foodName\": \"name of the dish\",\n\
  \"calories\": number,\n\
  \"macros\": {\n\
    \"protein\": number,\n\
    \"carbs\": number,\n\
    \"fat\": number,\n\
    \"fiber\": number,\n\
    \"sugar\": number\n\
  },\n\
  \"recommendations\": [\"recommendation 1\", \"recommendation 2\", \"recommendation 3\"]\n\
}";

#[derive(Debug, Clone)]
pub struct ImageInput {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl ImageInput {
    pub fn jpeg(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            mime_type: "image/jpeg".to_string(),
        }
    }

    /// Guess the MIME type from a file name, defaulting to JPEG.
    pub fn from_path_bytes(path: &str, bytes: Vec<u8>) -> Self {
        let lower = path.to_ascii_lowercase();
        let mime_type = if lower.ends_with(".png") {
            "image/png"
        } else if lower.ends_with(".webp") {
            "image/webp"
        } else if lower.ends_with(".heic") {
            "image/heic"
        } else {
            "image/jpeg"
        };
        Self {
            bytes,
            mime_type: mime_type.to_string(),
        }
    }
}

/// What to analyze. At least one of `image` or `text` is required.
#[derive(Debug, Clone, Default)]
pub struct FoodQuery {
    pub image: Option<ImageInput>,
    /// Name of the dish as typed by the user
    pub text: Option<String>,
    /// Free-form extra context, e.g. portion size
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodAnalysis {
    pub food_name: String,
    pub calories: f64,
    pub macros: Macros,
    pub recommendations: Vec<String>,
}

impl FoodAnalysis {
    pub fn into_new_meal(self, image_url: Option<String>) -> NewMeal {
        NewMeal {
            food_name: self.food_name,
            image_url,
            calories: self.calories,
            macros: self.macros,
            recommendations: self.recommendations,
        }
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    InlineData { inline_data: InlineData },
}

#[derive(Debug, Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: String) -> Self {
        Self::with_model(api_key, DEFAULT_MODEL.to_string(), DEFAULT_BASE_URL.to_string())
    }

    pub fn with_model(api_key: String, model: String, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Estimate calories, macros and recommendations for a meal.
    pub async fn analyze(&self, query: &FoodQuery) -> Result<FoodAnalysis> {
        if query.image.is_none() && query.text.as_deref().map_or(true, |t| t.trim().is_empty()) {
            return Err(anyhow!("an image or a dish name is required"));
        }

        let mut parts = vec![Part::Text {
            text: ANALYSIS_PROMPT.to_string(),
        }];
        if let Some(ref image) = query.image {
            tracing::debug!(bytes = image.bytes.len(), mime = %image.mime_type, "attaching image");
            parts.push(Part::InlineData {
                inline_data: InlineData {
                    mime_type: image.mime_type.clone(),
                    data: general_purpose::STANDARD.encode(&image.bytes),
                },
            });
        }
        if let Some(ref text) = query.text {
            parts.push(Part::Text {
                text: format!("Name of the dish: {}", text.trim()),
            });
        }
        if let Some(ref description) = query.description {
            parts.push(Part::Text {
                text: format!("Additional details: {}", description.trim()),
            });
        }

        let reply = self.generate(parts).await?;
        let analysis = parse_food_analysis(&reply, query.text.as_deref())?;
        tracing::info!(food = %analysis.food_name, calories = analysis.calories, "analyzed meal");
        Ok(analysis)
    }

    /// Personalised tips for the meals logged today.
    pub async fn tips(&self, meals: &[MealRecord], total_calories: f64) -> Result<Vec<String>> {
        let summary: Vec<String> = meals
            .iter()
            .map(|m| {
                format!(
                    "- {}: {:.0} kcal, protein {:.0} g, carbs {:.0} g, fat {:.0} g",
                    m.food_name, m.calories, m.macros.protein, m.macros.carbs, m.macros.fat
                )
            })
            .collect();

        let prompt = format!(
            "These are the meals a user logged today ({:.0} kcal in total):\n{}\n\
             Give 3 to 5 short, positive and practical nutrition tips based on them. \
             Reply with a JSON array of strings only.",
            total_calories,
            summary.join("\n")
        );

        let reply = self.generate(vec![Part::Text { text: prompt }]).await?;
        Ok(parse_tips(&reply)?)
    }

    async fn generate(&self, parts: Vec<Part>) -> Result<String> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );
        let request = GenerateRequest {
            contents: vec![Content { parts }],
        };

        tracing::debug!(model = %self.model, "sending generateContent request");
        let resp = self.client.post(&url).json(&request).send().await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow!("generateContent failed: {} - {}", status, body));
        }

        let body: GenerateResponse = resp.json().await?;
        Ok(candidate_text(body)?)
    }
}

fn candidate_text(body: GenerateResponse) -> Result<String, ParseError> {
    body.candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .and_then(|c| c.parts.into_iter().find_map(|p| p.text))
        .filter(|t| !t.trim().is_empty())
        .ok_or(ParseError::EmptyResponse)
}

/// The first balanced `open ... close` span, which skips prose and code
/// fences around the JSON. Delimiters inside string literals are ignored.
fn extract_span(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        if c == '"' {
            in_string = true;
        } else if c == open {
            depth += 1;
        } else if c == close {
            depth -= 1;
            if depth == 0 {
                let end = start + i + c.len_utf8();
                return Some(&text[start..end]);
            }
        }
    }
    None
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAnalysis {
    food_name: Option<String>,
    calories: Option<f64>,
    macros: Option<RawMacros>,
    #[serde(default)]
    recommendations: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawMacros {
    protein: Option<f64>,
    carbs: Option<f64>,
    fat: Option<f64>,
    fiber: Option<f64>,
    sugar: Option<f64>,
}

fn checked(field: &'static str, value: Option<f64>) -> Result<f64, ParseError> {
    let value = value.ok_or(ParseError::MissingField(field))?;
    if !value.is_finite() || value < 0.0 {
        return Err(ParseError::InvalidNumber { field, value });
    }
    Ok(value)
}

/// Validate a model reply as a [`FoodAnalysis`].
///
/// `calories`, `protein`, `carbs` and `fat` are required; `fiber` and
/// `sugar` read as 0 when absent. A blank `foodName` falls back to
/// `fallback_name` when one is given.
pub fn parse_food_analysis(
    text: &str,
    fallback_name: Option<&str>,
) -> Result<FoodAnalysis, ParseError> {
    let json = extract_span(text, '{', '}').ok_or(ParseError::NoJson("object"))?;
    let raw: RawAnalysis =
        serde_json::from_str(json).map_err(|e| ParseError::Malformed(e.to_string()))?;

    let food_name = raw
        .food_name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .or_else(|| {
            fallback_name
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty())
        })
        .ok_or(ParseError::MissingField("foodName"))?;

    let calories = checked("calories", raw.calories)?;
    let macros = raw.macros.ok_or(ParseError::MissingField("macros"))?;

    Ok(FoodAnalysis {
        food_name,
        calories,
        macros: Macros {
            protein: checked("protein", macros.protein)?,
            carbs: checked("carbs", macros.carbs)?,
            fat: checked("fat", macros.fat)?,
            fiber: checked("fiber", macros.fiber.or(Some(0.0)))?,
            sugar: checked("sugar", macros.sugar.or(Some(0.0)))?,
        },
        recommendations: raw
            .recommendations
            .into_iter()
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .collect(),
    })
}

/// Validate a model reply as a non-empty list of tips.
pub fn parse_tips(text: &str) -> Result<Vec<String>, ParseError> {
    let json = extract_span(text, '[', ']').ok_or(ParseError::NoJson("array"))?;
    let tips: Vec<String> =
        serde_json::from_str(json).map_err(|e| ParseError::Malformed(e.to_string()))?;

    let tips: Vec<String> = tips
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();
    if tips.is_empty() {
        return Err(ParseError::MissingField("tips"));
    }
    Ok(tips)
}

pub fn default_tips() -> Vec<String> {
    DEFAULT_TIPS.iter().map(|t| t.to_string()).collect()
}

pub fn fallback_tips() -> Vec<String> {
    FALLBACK_TIPS.iter().map(|t| t.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_uses_inline_data_parts() {
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text {
                        text: "hi".to_string(),
                    },
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: "image/png".to_string(),
                            data: "AAAA".to_string(),
                        },
                    },
                ],
            }],
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"contents": [{"parts": [
                {"text": "hi"},
                {"inline_data": {"mime_type": "image/png", "data": "AAAA"}}
            ]}]})
        );
    }

    #[test]
    fn candidate_text_takes_first_text_part() {
        let body: GenerateResponse = serde_json::from_value(json!({
            "candidates": [{"content": {"parts": [{"text": "{\"a\":1}"}]}}]
        }))
        .unwrap();
        assert_eq!(candidate_text(body).unwrap(), "{\"a\":1}");
    }

    #[test]
    fn candidate_text_rejects_empty_reply() {
        let body: GenerateResponse = serde_json::from_value(json!({"candidates": []})).unwrap();
        assert_eq!(candidate_text(body), Err(ParseError::EmptyResponse));
    }

    #[test]
    fn guesses_image_mime_type() {
        assert_eq!(ImageInput::from_path_bytes("a.PNG", vec![]).mime_type, "image/png");
        assert_eq!(ImageInput::from_path_bytes("a.jpg", vec![]).mime_type, "image/jpeg");
    }
}
