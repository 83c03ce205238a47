//! Environment overrides for node identity
//!
//! Downward-API style variables win over file values when set and non-empty.

use contracts::AgentConfig;

pub const NODE_NAME_ENV: &str = "NODE_NAME";
pub const POD_NAME_ENV: &str = "POD_NAME";
pub const NAMESPACE_ENV: &str = "POD_NAMESPACE";

/// Apply overrides from the process environment
pub fn apply_env_overrides(config: &mut AgentConfig) {
    apply_overrides_from(config, |key| std::env::var(key).ok());
}

/// Apply overrides from an arbitrary lookup
pub fn apply_overrides_from<F>(config: &mut AgentConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

    if let Some(node) = get(NODE_NAME_ENV) {
        config.agent.node_name = node;
    }
    if let Some(pod) = get(POD_NAME_ENV) {
        config.agent.pod_name = pod;
    }
    if let Some(namespace) = get(NAMESPACE_ENV) {
        config.agent.namespace = namespace;
    }
}
