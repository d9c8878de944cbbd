//! Renderer configuration.
//!
//! Two policies the observed behavior leaves open:
//! - how a state setter decides a value is unchanged ([`UpdatePolicy`]);
//! - what happens when a component calls hooks in a different order than on
//!   its previous render (`strict_hooks`).
//!
//! Both can be set in code or read from the environment:
//!
//! ```text
//! SPARK_DOM_UPDATE_POLICY=skip-unchanged | always
//! SPARK_DOM_STRICT_HOOKS=1 | 0
//! ```

use tracing::warn;

pub const UPDATE_POLICY_VAR: &str = "SPARK_DOM_UPDATE_POLICY";
pub const STRICT_HOOKS_VAR: &str = "SPARK_DOM_STRICT_HOOKS";

/// Equality policy used by state setters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdatePolicy {
    /// Compare with `PartialEq`; an equal value schedules nothing.
    #[default]
    SkipUnchanged,
    /// Every set schedules an update.
    AlwaysRerender,
}

impl UpdatePolicy {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "skip-unchanged" | "skip_unchanged" | "structural" => Some(Self::SkipUnchanged),
            "always" | "always-rerender" => Some(Self::AlwaysRerender),
            _ => None,
        }
    }
}

/// Configuration for a [`Renderer`](crate::pipeline::Renderer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RendererConfig {
    pub update_policy: UpdatePolicy,
    /// Fail the pass on hook-order violations instead of resetting the slot.
    pub strict_hooks: bool,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            update_policy: UpdatePolicy::SkipUnchanged,
            strict_hooks: true,
        }
    }
}

impl RendererConfig {
    pub fn update_policy(mut self, policy: UpdatePolicy) -> Self {
        self.update_policy = policy;
        self
    }

    pub fn strict_hooks(mut self, strict: bool) -> Self {
        self.strict_hooks = strict;
        self
    }

    /// Defaults overridden by `SPARK_DOM_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable.
    ///
    /// Unrecognized values are ignored with a warning.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = lookup(UPDATE_POLICY_VAR) {
            match UpdatePolicy::parse(&raw) {
                Some(policy) => config.update_policy = policy,
                None => warn!(variable = UPDATE_POLICY_VAR, value = %raw, "ignoring unknown update policy"),
            }
        }

        if let Some(raw) = lookup(STRICT_HOOKS_VAR) {
            match raw.trim() {
                "1" | "true" | "yes" => config.strict_hooks = true,
                "0" | "false" | "no" => config.strict_hooks = false,
                _ => warn!(variable = STRICT_HOOKS_VAR, value = %raw, "ignoring unknown flag value"),
            }
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RendererConfig::default();
        assert_eq!(config.update_policy, UpdatePolicy::SkipUnchanged);
        assert!(config.strict_hooks);
    }

    #[test]
    fn test_from_lookup() {
        let config = RendererConfig::from_lookup(|name| match name {
            UPDATE_POLICY_VAR => Some("always".into()),
            STRICT_HOOKS_VAR => Some("0".into()),
            _ => None,
        });
        assert_eq!(config.update_policy, UpdatePolicy::AlwaysRerender);
        assert!(!config.strict_hooks);
    }

    #[test]
    fn test_unknown_values_keep_defaults() {
        let config = RendererConfig::from_lookup(|_| Some("sometimes".into()));
        assert_eq!(config, RendererConfig::default());
    }
}
