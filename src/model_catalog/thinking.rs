use super::catalog::{ResolvedModel, ThinkingProfile, Variant};

/// `thinkingConfig` the translator attaches to an upstream request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThinkingPolicy {
    pub budget_tokens: i64,
    pub include_thoughts: bool,
}

const UNBOUNDED: i64 = -1;

fn budgets(profile: ThinkingProfile) -> (i64, i64) {
    // (nothinking, max)
    match profile {
        ThinkingProfile::Flash => (0, 24_576),
        ThinkingProfile::Pro => (128, 32_768),
        ThinkingProfile::ProPreview => (128, 45_000),
    }
}

/// Resolve the thinking policy for an already-resolved model, honoring an
/// optional inbound `reasoning_effort`. A variant suffix in the model name
/// wins over an explicit `reasoning_effort` when both are present.
pub fn thinking_for(resolved: &ResolvedModel, reasoning_effort: Option<&str>) -> Option<ThinkingPolicy> {
    if !resolved.descriptor.supports_thinking {
        return None;
    }

    let (nothinking, max) = budgets(resolved.thinking_profile);

    let budget_tokens = match resolved.variant {
        Variant::NoThinking => nothinking,
        Variant::MaxThinking => max,
        Variant::Default | Variant::Search => match reasoning_effort {
            Some("minimal") => nothinking,
            Some("low") => 1000,
            Some("medium") => UNBOUNDED,
            Some("high") => max,
            _ => UNBOUNDED,
        },
    };

    let include_thoughts = !matches!(resolved.variant, Variant::NoThinking)
        && budget_tokens != 0
        && !matches!(reasoning_effort, Some("minimal"));

    Some(ThinkingPolicy {
        budget_tokens,
        include_thoughts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model_catalog::CATALOG;

    #[test]
    fn maxthinking_variant_wins_over_reasoning_effort() {
        let r = CATALOG.resolve("gemini-2.5-pro-maxthinking").unwrap();
        let policy = thinking_for(&r, Some("minimal")).unwrap();
        assert_eq!(policy.budget_tokens, 32_768);
        assert!(policy.include_thoughts);
    }

    #[test]
    fn reasoning_effort_high_uses_profile_max() {
        let r = CATALOG.resolve("gemini-2.5-flash").unwrap();
        let policy = thinking_for(&r, Some("high")).unwrap();
        assert_eq!(policy.budget_tokens, 24_576);
    }

    #[test]
    fn reasoning_effort_minimal_uses_profile_floor() {
        let r = CATALOG.resolve("gemini-2.5-pro").unwrap();
        let policy = thinking_for(&r, Some("minimal")).unwrap();
        assert_eq!(policy.budget_tokens, 128);
        assert!(!policy.include_thoughts);
    }

    #[test]
    fn non_thinking_model_yields_no_policy() {
        let r = CATALOG.resolve("gemini-2.0-flash").unwrap();
        assert!(thinking_for(&r, Some("high")).is_none());
    }

    #[test]
    fn default_variant_with_no_reasoning_effort_lets_upstream_choose() {
        let r = CATALOG.resolve("gemini-2.5-flash").unwrap();
        let policy = thinking_for(&r, None).unwrap();
        assert_eq!(policy.budget_tokens, -1);
        assert!(policy.include_thoughts);
    }
}
