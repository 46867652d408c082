//! Local-mutation strategies for remote persistence.
//!
//! Two patterns coexist in this system: gallery-style scoring flips state
//! immediately and rolls back if the save fails (fast keyboard-driven
//! flow), while multi-metric overlay scoring only applies state after the
//! save confirms (a wrong flip would misrepresent completion). The choice
//! is an explicit policy, not two divergent code paths.

use std::future::Future;

use crate::error::EvalError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationPolicy {
    /// Apply locally first, roll back to a snapshot on persistence failure.
    Optimistic,
    /// Persist first, apply locally only after the backend confirms.
    Confirmed,
}

/// Run one persistence-backed mutation under the given policy. On failure
/// `target` is left exactly as it was before the call.
pub async fn apply_mutation<T, F, Fut>(
    policy: MutationPolicy,
    target: &mut T,
    apply: F,
    persist: Fut,
) -> Result<(), EvalError>
where
    T: Clone,
    F: FnOnce(&mut T),
    Fut: Future<Output = Result<(), EvalError>>,
{
    match policy {
        MutationPolicy::Optimistic => {
            let snapshot = target.clone();
            apply(target);
            if let Err(e) = persist.await {
                *target = snapshot;
                return Err(e);
            }
            Ok(())
        }
        MutationPolicy::Confirmed => {
            persist.await?;
            apply(target);
            Ok(())
        }
    }
}
