use std::collections::HashMap;

/// `charsPerToken` + a fixed safety buffer, registered per model profile.
/// Mirrors the `len/4`-style heuristic this codebase already uses for
/// thread/message token accounting, generalized to a pluggable registry so a
/// profile with an exact tokenizer can still slot in behind the same
/// `estimate` call.
#[derive(Debug, Clone, Copy)]
pub struct TokenProfile {
    pub chars_per_token: usize,
    pub safety_buffer: usize,
}

impl Default for TokenProfile {
    fn default() -> Self {
        Self {
            chars_per_token: 4,
            safety_buffer: 100,
        }
    }
}

pub struct TokenProfileRegistry {
    profiles: HashMap<String, TokenProfile>,
}

impl Default for TokenProfileRegistry {
    fn default() -> Self {
        let mut profiles = HashMap::new();
        profiles.insert("default".to_string(), TokenProfile::default());
        profiles.insert(
            "openai".to_string(),
            TokenProfile {
                chars_per_token: 4,
                safety_buffer: 100,
            },
        );
        profiles.insert(
            "gemini".to_string(),
            TokenProfile {
                chars_per_token: 4,
                safety_buffer: 150,
            },
        );
        // Qwen's BPE tends to run denser on non-Latin text; pad the buffer.
        profiles.insert(
            "qwen".to_string(),
            TokenProfile {
                chars_per_token: 3,
                safety_buffer: 150,
            },
        );
        Self { profiles }
    }
}

impl TokenProfileRegistry {
    pub fn get(&self, model_profile: &str) -> TokenProfile {
        self.profiles.get(model_profile).copied().unwrap_or_default()
    }

    pub fn register(&mut self, model_profile: impl Into<String>, profile: TokenProfile) {
        self.profiles.insert(model_profile.into(), profile);
    }
}

/// `Estimate(text) -> int`: `ceil(len(text) / charsPerToken) + safetyBuffer`.
pub fn estimate(text: &str, profile: TokenProfile) -> usize {
    let chars = text.chars().count();
    chars.div_ceil(profile.chars_per_token.max(1)) + profile.safety_buffer
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_uses_ceiling_division_plus_buffer() {
        let profile = TokenProfile {
            chars_per_token: 4,
            safety_buffer: 100,
        };
        assert_eq!(estimate("abcd", profile), 1 + 100);
        assert_eq!(estimate("abcde", profile), 2 + 100);
        assert_eq!(estimate("", profile), 0 + 100);
    }

    #[test]
    fn registry_falls_back_to_default_for_unknown_profile() {
        let registry = TokenProfileRegistry::default();
        let unknown = registry.get("some-unregistered-model");
        assert_eq!(unknown.chars_per_token, TokenProfile::default().chars_per_token);
        let qwen = registry.get("qwen");
        assert_eq!(qwen.chars_per_token, 3);
    }
}
