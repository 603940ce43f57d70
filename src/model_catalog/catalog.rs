use serde::Serialize;
use std::sync::LazyLock;

/// Thinking-budget profile a base model belongs to; see `thinking.rs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThinkingProfile {
    /// Flash and other "newer family" models: 0 / -1 / 24576.
    Flash,
    /// `pro`: 128 / -1 / 32768.
    Pro,
    /// `pro-preview` (next generation): 128 / -1 / 45000.
    ProPreview,
}

/// One base model known to the catalogue.
#[derive(Debug, Clone, Copy)]
struct BaseModel {
    name: &'static str,
    display_name: &'static str,
    input_token_limit: u64,
    output_token_limit: u64,
    supports_thinking: bool,
    supports_search: bool,
    thinking_profile: ThinkingProfile,
}

/// A published catalogue entry — either a base model or a synthesized
/// variant derived from one.
#[derive(Debug, Clone, Serialize)]
pub struct ModelDescriptor {
    pub name: String,
    pub display_name: String,
    pub input_token_limit: u64,
    pub output_token_limit: u64,
    pub supports_thinking: bool,
    pub supports_search: bool,
}

/// The outcome of resolving an inbound (possibly suffixed) model name.
#[derive(Debug, Clone)]
pub struct ResolvedModel {
    pub base_name: &'static str,
    pub descriptor: ModelDescriptor,
    pub thinking_profile: ThinkingProfile,
    pub search: bool,
    pub variant: Variant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    Default,
    Search,
    NoThinking,
    MaxThinking,
}

/// Suffixes considered during resolution, longest first so a name like
/// `gemini-2.0-flash-lite-nothinking` strips `-nothinking` and never a
/// shorter, wrong candidate.
const SUFFIXES: &[(&str, Variant)] = &[
    ("-nothinking", Variant::NoThinking),
    ("-maxthinking", Variant::MaxThinking),
    ("-search", Variant::Search),
];

const BASE_MODELS: &[BaseModel] = &[
    BaseModel {
        name: "gemini-2.0-flash",
        display_name: "Gemini 2.0 Flash",
        input_token_limit: 1_048_576,
        output_token_limit: 8_192,
        supports_thinking: false,
        supports_search: true,
        thinking_profile: ThinkingProfile::Flash,
    },
    BaseModel {
        name: "gemini-2.0-flash-lite",
        display_name: "Gemini 2.0 Flash Lite",
        input_token_limit: 1_048_576,
        output_token_limit: 8_192,
        supports_thinking: false,
        supports_search: true,
        thinking_profile: ThinkingProfile::Flash,
    },
    BaseModel {
        name: "gemini-2.0-pro",
        display_name: "Gemini 2.0 Pro",
        input_token_limit: 1_048_576,
        output_token_limit: 65_535,
        supports_thinking: true,
        supports_search: true,
        thinking_profile: ThinkingProfile::Pro,
    },
    BaseModel {
        name: "gemini-2.5-flash",
        display_name: "Gemini 2.5 Flash",
        input_token_limit: 1_048_576,
        output_token_limit: 65_535,
        supports_thinking: true,
        supports_search: true,
        thinking_profile: ThinkingProfile::Flash,
    },
    BaseModel {
        name: "gemini-2.5-pro",
        display_name: "Gemini 2.5 Pro",
        input_token_limit: 1_048_576,
        output_token_limit: 65_535,
        supports_thinking: true,
        supports_search: true,
        thinking_profile: ThinkingProfile::Pro,
    },
    BaseModel {
        name: "gemini-3-pro-preview",
        display_name: "Gemini 3 Pro Preview",
        input_token_limit: 1_048_576,
        output_token_limit: 65_535,
        supports_thinking: true,
        supports_search: true,
        thinking_profile: ThinkingProfile::ProPreview,
    },
];

pub struct Catalog {
    bases: &'static [BaseModel],
    published: Vec<ModelDescriptor>,
}

impl Catalog {
    fn build() -> Self {
        let mut published = Vec::new();
        for base in BASE_MODELS {
            published.push(descriptor_for(base, None));
            published.push(descriptor_for(base, Some(Variant::Search)));
            if base.supports_thinking {
                published.push(descriptor_for(base, Some(Variant::NoThinking)));
                published.push(descriptor_for(base, Some(Variant::MaxThinking)));
            }
        }
        published.sort_by(|a, b| a.name.cmp(&b.name));
        Self {
            bases: BASE_MODELS,
            published,
        }
    }

    pub fn published(&self) -> &[ModelDescriptor] {
        &self.published
    }

    /// Strip the longest matching suffix and look up the remainder among
    /// known base models. Falls back to treating the whole name as a base
    /// name when no suffix matches.
    pub fn resolve(&self, name: &str) -> Option<ResolvedModel> {
        let mut candidates: Vec<(&'static str, Variant)> = SUFFIXES
            .iter()
            .filter(|(suffix, _)| name.ends_with(suffix))
            .map(|(suffix, variant)| (*suffix, *variant))
            .collect();
        candidates.sort_by_key(|(suffix, _)| std::cmp::Reverse(suffix.len()));

        for (suffix, variant) in candidates {
            let stripped = &name[..name.len() - suffix.len()];
            if let Some(base) = self.find_base(stripped) {
                if matches!(variant, Variant::NoThinking | Variant::MaxThinking)
                    && !base.supports_thinking
                {
                    continue;
                }
                return Some(self.resolved(base, variant));
            }
        }

        let base = self.find_base(name)?;
        Some(self.resolved(base, Variant::Default))
    }

    fn find_base(&self, name: &str) -> Option<&'static BaseModel> {
        self.bases.iter().find(|b| b.name == name)
    }

    fn resolved(&self, base: &'static BaseModel, variant: Variant) -> ResolvedModel {
        ResolvedModel {
            base_name: base.name,
            descriptor: descriptor_for(base, Some(variant)),
            thinking_profile: base.thinking_profile,
            search: matches!(variant, Variant::Search),
            variant,
        }
    }
}

fn descriptor_for(base: &BaseModel, variant: Option<Variant>) -> ModelDescriptor {
    let (suffix, label_suffix) = match variant {
        None => ("", ""),
        Some(Variant::Default) => ("", ""),
        Some(Variant::Search) => ("-search", " (Search)"),
        Some(Variant::NoThinking) => ("-nothinking", " (No Thinking)"),
        Some(Variant::MaxThinking) => ("-maxthinking", " (Max Thinking)"),
    };
    ModelDescriptor {
        name: format!("{}{}", base.name, suffix),
        display_name: format!("{}{}", base.display_name, label_suffix),
        input_token_limit: base.input_token_limit,
        output_token_limit: base.output_token_limit,
        supports_thinking: base.supports_thinking,
        supports_search: base.supports_search,
    }
}

pub static CATALOG: LazyLock<Catalog> = LazyLock::new(Catalog::build);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn published_catalogue_is_sorted_and_filters_thinking_variants() {
        let names: Vec<&str> = CATALOG.published().iter().map(|d| d.name.as_str()).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);

        // gemini-2.0-flash does not support thinking: no -nothinking/-maxthinking entries.
        assert!(!names.contains(&"gemini-2.0-flash-nothinking"));
        assert!(!names.contains(&"gemini-2.0-flash-maxthinking"));
        assert!(names.contains(&"gemini-2.0-flash-search"));

        // gemini-2.5-pro supports thinking: all four variants present.
        assert!(names.contains(&"gemini-2.5-pro"));
        assert!(names.contains(&"gemini-2.5-pro-search"));
        assert!(names.contains(&"gemini-2.5-pro-nothinking"));
        assert!(names.contains(&"gemini-2.5-pro-maxthinking"));
    }

    #[test]
    fn resolve_strips_longest_suffix_first() {
        let r = CATALOG.resolve("gemini-2.5-pro-maxthinking").unwrap();
        assert_eq!(r.base_name, "gemini-2.5-pro");
        assert_eq!(r.variant, Variant::MaxThinking);
        assert!(!r.search);
    }

    #[test]
    fn resolve_search_variant() {
        let r = CATALOG.resolve("gemini-2.5-flash-search").unwrap();
        assert_eq!(r.base_name, "gemini-2.5-flash");
        assert!(r.search);
        assert_eq!(r.variant, Variant::Search);
    }

    #[test]
    fn resolve_rejects_thinking_variant_on_unsupported_base() {
        assert!(CATALOG.resolve("gemini-2.0-flash-nothinking").is_none());
    }

    #[test]
    fn resolve_unknown_base_fails() {
        assert!(CATALOG.resolve("gemini-unknown-model").is_none());
    }

    #[test]
    fn every_published_name_resolves() {
        for d in CATALOG.published() {
            assert!(
                CATALOG.resolve(&d.name).is_some(),
                "failed to resolve {}",
                d.name
            );
        }
    }

    #[test]
    fn lite_variant_does_not_get_chopped_to_flash() {
        // Ensure suffix stripping only ever touches the known suffix set,
        // never misparses the "-lite" portion of the base name itself.
        let r = CATALOG.resolve("gemini-2.0-flash-lite-search").unwrap();
        assert_eq!(r.base_name, "gemini-2.0-flash-lite");
    }
}
