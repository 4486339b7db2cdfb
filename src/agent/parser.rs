use serde_json::{Map, Value};
use tracing::{debug, warn};
use super::intent::Intent;
use super::result::Outcome;

pub const CONTENT_FALLBACK: &str = "Unable to help with this at the moment.";

/// A validated `(intent, response)` pair recovered from a completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedResponse {
    pub intent: Intent,
    pub response: String,
    pub outcome: Outcome,
}

impl ParsedResponse {
    pub fn fallback() -> Self {
        Self {
            intent: Intent::Unknown,
            response: CONTENT_FALLBACK.to_string(),
            outcome: Outcome::ContentFallback,
        }
    }

    pub fn into_pair(self) -> (Intent, String) {
        (self.intent, self.response)
    }
}

/// Turns a raw completion into a validated pair. Never fails.
///
/// Tried in order: the whole text as a JSON object, the first balanced
/// `{...}` span inside it, then the first line as the intent token with the
/// remaining lines as the response.
pub fn parse_intent_response(raw: &str) -> ParsedResponse {
    if let Some(parsed) = parse_json(raw) {
        return parsed;
    }

    if let Some(parsed) = parse_lines(raw) {
        debug!("Recovered intent {} from line format", parsed.intent);
        return parsed;
    }

    warn!(
        "Could not interpret completion, using fallback. First 200 chars: {:?}",
        raw.chars().take(200).collect::<String>()
    );
    ParsedResponse::fallback()
}

fn parse_json(raw: &str) -> Option<ParsedResponse> {
    let object = decode_object(raw)?;

    let response = object
        .get("response")
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default();

    if response.is_empty() {
        debug!("JSON completion has no usable response field");
        return None;
    }

    let (intent, replaced) = match object.get("intent").and_then(Value::as_str) {
        Some(token) => Intent::validate(token),
        None => {
            warn!("JSON completion has no intent field, defaulting to general_inquiry");
            (Intent::GeneralInquiry, true)
        }
    };

    Some(ParsedResponse {
        intent,
        response: response.to_string(),
        outcome: if replaced { Outcome::Normalized } else { Outcome::Parsed },
    })
}

fn decode_object(raw: &str) -> Option<Map<String, Value>> {
    let trimmed = raw.trim();

    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(object)) => return Some(object),
        Ok(_) => debug!("Completion is JSON but not an object"),
        Err(e) => debug!("Completion is not bare JSON: {}", e),
    }

    let span = first_object_span(trimmed)?;
    match serde_json::from_str::<Value>(span) {
        Ok(Value::Object(object)) => Some(object),
        Ok(_) => None,
        Err(e) => {
            debug!("Embedded JSON span failed to decode: {}", e);
            None
        }
    }
}

/// Returns the first balanced `{...}` span, honoring string literals and escapes.
fn first_object_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }

    None
}

fn parse_lines(raw: &str) -> Option<ParsedResponse> {
    let mut lines = raw
        .trim()
        .lines()
        .filter(|line| !line.trim_start().starts_with("```"));
    let first = lines.next()?.trim();

    // a broken JSON object is neither an intent token nor a response
    if looks_like_json(first) {
        return None;
    }

    let response = lines.collect::<Vec<_>>().join("\n").trim().to_string();
    if response.is_empty() || looks_like_json(&response) {
        return None;
    }

    let (intent, _) = Intent::validate(first);
    Some(ParsedResponse {
        intent,
        response,
        outcome: Outcome::LineFallback,
    })
}

fn looks_like_json(text: &str) -> bool {
    text.starts_with('{') || text.starts_with('[')
}
