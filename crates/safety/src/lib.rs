#[derive(Debug, Clone)]
pub struct SafetyContext {
    pub force_mode: bool,
}

#[derive(Debug, Clone)]
pub enum SafetyDecision {
    Allow,
    Deny(String),
}

pub fn can_replicate(
    ctx: &SafetyContext,
    source: &str,
    target: &str,
    existing_target_snapshots: &[String],
) -> SafetyDecision {
    if source == target {
        return SafetyDecision::Deny(format!(
            "Denied: source and target are the same machine ({})",
            source
        ));
    }

    if !existing_target_snapshots.is_empty() && !ctx.force_mode {
        return SafetyDecision::Deny(format!(
            "Denied: {} already has {} snapshot(s) ({}); redefining would replace records with the same name, use force-mode",
            target,
            existing_target_snapshots.len(),
            existing_target_snapshots.join(", ")
        ));
    }

    SafetyDecision::Allow
}
