//! `RefreshModels`: best-effort live model-catalog fetch per provider,
//! merged over the hardcoded defaults each provider module ships. A failed
//! or empty fetch is not an error — it just leaves the hardcoded catalog in
//! place.

use serde_json::Value;

use forge_common::ForgeError;

use crate::types::*;

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(10))
        .build()
        .unwrap_or_default()
}

/// Live-fetches `provider_id`'s model catalog. Returns an empty vec (not an
/// error) whenever the provider has no API key yet or the endpoint is
/// unreachable -- those are exactly the conditions under which falling back
/// to the hardcoded catalog is the right behavior.
pub async fn fetch_models(provider_id: &str, base_url: &str, api_key: Option<&str>) -> Result<Vec<ModelInfo>, ForgeError> {
    match provider_id {
        "openai" | "openrouter" | "qwen" | "localai" => fetch_openai_compat(provider_id, base_url, api_key).await,
        "gemini" => fetch_gemini(base_url, api_key).await,
        _ => Ok(vec![]),
    }
}

/// GET `/models` (OpenAI-compatible list format, shared by openai, openrouter, qwen, localai).
async fn fetch_openai_compat(provider_id: &str, base_url: &str, api_key: Option<&str>) -> Result<Vec<ModelInfo>, ForgeError> {
    let url = if base_url.contains("/v1") {
        format!("{}/models", base_url.trim_end_matches('/'))
    } else {
        format!("{}/v1/models", base_url.trim_end_matches('/'))
    };

    let mut req = client().get(&url);
    if let Some(key) = api_key.filter(|k| !k.is_empty()) {
        req = req.header("Authorization", format!("Bearer {key}"));
    }

    let resp = match req.send().await {
        Ok(resp) => resp,
        Err(_) => return Ok(vec![]),
    };
    if !resp.status().is_success() {
        return Ok(vec![]);
    }

    let data: Value = resp.json().await.map_err(|e| crate::error::malformed(format!("invalid model list JSON: {e}")))?;
    let models = data["data"].as_array().cloned().unwrap_or_default();

    Ok(models
        .iter()
        .filter_map(|m| {
            let id = m["id"].as_str()?;
            Some(ModelInfo {
                id: id.to_string(),
                name: humanize_model_id(id),
                provider: provider_id.to_string(),
                context_window: 128_000,
                max_output_tokens: 16_384,
                supports_tools: true,
                supports_streaming: true,
                supports_vision: false,
                input_price_per_m: 0.0,
                output_price_per_m: 0.0,
                cache_read_price_per_m: 0.0,
                tier: ModelTier::Medium,
                thinking: None,
            })
        })
        .collect())
}

/// GET `/v1beta/models` (Gemini's own listing format).
async fn fetch_gemini(base_url: &str, api_key: Option<&str>) -> Result<Vec<ModelInfo>, ForgeError> {
    let key = api_key.unwrap_or_default();
    if key.is_empty() {
        return Ok(vec![]);
    }

    let base = if base_url.is_empty() { "https://generativelanguage.googleapis.com" } else { base_url.trim_end_matches('/') };
    let url = format!("{base}/v1beta/models?key={key}&pageSize=100");

    let resp = match client().get(&url).send().await {
        Ok(resp) => resp,
        Err(_) => return Ok(vec![]),
    };
    if !resp.status().is_success() {
        return Ok(vec![]);
    }

    let data: Value = resp.json().await.map_err(|e| crate::error::malformed(format!("invalid model list JSON: {e}")))?;
    let models = data["models"].as_array().cloned().unwrap_or_default();

    Ok(models
        .iter()
        .filter_map(|m| {
            let name = m["name"].as_str()?;
            let id = name.strip_prefix("models/").unwrap_or(name);
            let methods = m["supportedGenerationMethods"].as_array()?;
            if !methods.iter().any(|v| v.as_str() == Some("generateContent")) {
                return None;
            }
            let display = m["displayName"].as_str().unwrap_or(id);
            Some(ModelInfo {
                id: id.to_string(),
                name: display.to_string(),
                provider: "gemini".to_string(),
                context_window: m["inputTokenLimit"].as_u64().unwrap_or(32_000) as u32,
                max_output_tokens: m["outputTokenLimit"].as_u64().unwrap_or(8_192) as u32,
                supports_tools: true,
                supports_streaming: true,
                supports_vision: true,
                input_price_per_m: 0.0,
                output_price_per_m: 0.0,
                cache_read_price_per_m: 0.0,
                tier: if id.contains("pro") { ModelTier::High } else { ModelTier::Medium },
                thinking: None,
            })
        })
        .collect())
}

fn humanize_model_id(id: &str) -> String {
    let name = id.rsplit('/').next().unwrap_or(id).replace(['-', '_', ':'], " ");

    let mut result = String::with_capacity(name.len());
    let mut capitalize_next = true;
    for ch in name.chars() {
        if ch == ' ' {
            result.push(' ');
            capitalize_next = true;
        } else if capitalize_next {
            result.extend(ch.to_uppercase());
            capitalize_next = false;
        } else {
            result.push(ch);
        }
    }
    result
}

/// Merges API-fetched models with hardcoded defaults: fetched models take
/// priority but inherit hardcoded pricing/tier/thinking metadata the list
/// endpoint doesn't report; hardcoded entries not seen in the fetch fill gaps.
pub fn merge_models(fetched: Vec<ModelInfo>, hardcoded: &[ModelInfo]) -> Vec<ModelInfo> {
    let mut merged: Vec<ModelInfo> = Vec::with_capacity(fetched.len() + hardcoded.len());
    let mut seen_ids: std::collections::HashSet<String> = std::collections::HashSet::new();

    for mut model in fetched {
        if let Some(hc) = hardcoded.iter().find(|h| h.id == model.id) {
            if model.context_window == 0 || model.context_window == 128_000 {
                model.context_window = hc.context_window;
            }
            if model.max_output_tokens == 0 || model.max_output_tokens == 16_384 {
                model.max_output_tokens = hc.max_output_tokens;
            }
            if model.input_price_per_m == 0.0 && hc.input_price_per_m > 0.0 {
                model.input_price_per_m = hc.input_price_per_m;
                model.output_price_per_m = hc.output_price_per_m;
                model.cache_read_price_per_m = hc.cache_read_price_per_m;
            }
            if model.thinking.is_none() && hc.thinking.is_some() {
                model.thinking = hc.thinking.clone();
            }
            model.tier = hc.tier;
            model.name = hc.name.clone();
            model.supports_vision = hc.supports_vision;
        }
        seen_ids.insert(model.id.clone());
        merged.push(model);
    }

    for hc in hardcoded {
        if !seen_ids.contains(&hc.id) {
            merged.push(hc.clone());
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn humanizes_hyphenated_id() {
        assert_eq!(humanize_model_id("gpt-5.2-codex"), "Gpt 5.2 Codex");
    }

    #[test]
    fn merge_prefers_hardcoded_pricing_for_known_model() {
        let hc = vec![ModelInfo {
            id: "gpt-5.2".into(),
            name: "GPT-5.2".into(),
            provider: "openai".into(),
            context_window: 272_000,
            max_output_tokens: 100_000,
            supports_tools: true,
            supports_streaming: true,
            supports_vision: true,
            input_price_per_m: 2.0,
            output_price_per_m: 8.0,
            cache_read_price_per_m: 0.5,
            tier: ModelTier::Medium,
            thinking: None,
        }];
        let fetched = vec![ModelInfo {
            id: "gpt-5.2".into(),
            name: "gpt-5.2".into(),
            provider: "openai".into(),
            context_window: 128_000,
            max_output_tokens: 16_384,
            supports_tools: true,
            supports_streaming: true,
            supports_vision: false,
            input_price_per_m: 0.0,
            output_price_per_m: 0.0,
            cache_read_price_per_m: 0.0,
            tier: ModelTier::Low,
            thinking: None,
        }];
        let merged = merge_models(fetched, &hc);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].input_price_per_m, 2.0);
        assert_eq!(merged[0].context_window, 272_000);
    }
}
