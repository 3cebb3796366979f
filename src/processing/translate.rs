//! Target-language handling for translation.

use crate::config::LanguagePolicy;

use super::types::TranslateError;

/// Language codes offered by every surface, in display order.
pub const SUPPORTED_LANGUAGES: [&str; 5] = ["fr", "en", "es", "de", "it"];

/// English display name for a supported code.
pub fn language_name(code: &str) -> Option<&'static str> {
    match code {
        "fr" => Some("French"),
        "en" => Some("English"),
        "es" => Some("Spanish"),
        "de" => Some("German"),
        "it" => Some("Italian"),
        _ => None,
    }
}

/// Trim and lower-case `code`, then apply `policy`.
///
/// An empty code always fails. Under [`LanguagePolicy::Strict`] codes outside
/// [`SUPPORTED_LANGUAGES`] fail too; under [`LanguagePolicy::Forward`] they pass through.
pub fn resolve_language(code: &str, policy: LanguagePolicy) -> Result<String, TranslateError> {
    let normalized = code.trim().to_lowercase();
    if normalized.is_empty() {
        return Err(TranslateError::EmptyLanguage);
    }
    match policy {
        LanguagePolicy::Strict if !SUPPORTED_LANGUAGES.contains(&normalized.as_str()) => {
            Err(TranslateError::UnsupportedLanguage(normalized))
        }
        LanguagePolicy::Strict | LanguagePolicy::Forward => {
            if language_name(&normalized).is_none() {
                tracing::debug!(language = %normalized, "Forwarding unlisted language code");
            }
            Ok(normalized)
        }
    }
}
