use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use vistaar_core::{
    ids::AreaId,
    payload::OverridePayload,
    scope::{EntityRef, Scope, Variant},
};
use vistaar_storage::OverrideStore;

use crate::error::EngineError;
use crate::hierarchy::HierarchyIndex;

const RETRY_ATTEMPTS: u32 = 3;
const RETRY_BASE_DELAY_MS: u64 = 10;

/// The effective value selected for an entity at a target area, plus
/// the scope it was found at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub payload: OverridePayload,
    pub scope: Scope,
}

/// Walk the target's ancestor chain (most specific first), then the
/// global sentinel, and return the first active override. Exhausting
/// the chain yields `Ok(None)`: absence, never a default value.
///
/// Read-only; never mutates override records.
pub fn resolve_with<S: OverrideStore>(
    store: &S,
    hierarchy: &HierarchyIndex,
    entity: EntityRef,
    variant: Variant,
    target_area: AreaId,
) -> Result<Option<Resolved>, EngineError> {
    let chain = hierarchy.ancestor_chain(target_area)?;
    let scopes = chain
        .into_iter()
        .map(Scope::Area)
        .chain(std::iter::once(Scope::Global));

    for scope in scopes {
        let mut rows = query_with_retry(store, entity, variant, scope)?;
        if rows.len() > 1 {
            // The partial unique index should make this impossible;
            // never pick one arbitrarily.
            return Err(EngineError::AmbiguousOverride(format!(
                "{} active rows for {entity} {variant} at {scope}",
                rows.len()
            )));
        }
        if let Some(row) = rows.pop() {
            debug!(%entity, %variant, area = %target_area, %scope, "override resolved");
            return Ok(Some(Resolved {
                payload: row.payload,
                scope,
            }));
        }
    }

    debug!(%entity, %variant, area = %target_area, "no override at any scope");
    Ok(None)
}

/// Retry busy/locked store reads with bounded backoff. Data-integrity
/// and decode errors surface immediately.
fn query_with_retry<S: OverrideStore>(
    store: &S,
    entity: EntityRef,
    variant: Variant,
    scope: Scope,
) -> Result<Vec<vistaar_storage::OverrideRow>, EngineError> {
    let mut attempt = 0;
    loop {
        match store.active_overrides_at(entity, variant, scope) {
            Ok(rows) => return Ok(rows),
            Err(e) if e.is_transient() && attempt + 1 < RETRY_ATTEMPTS => {
                attempt += 1;
                let delay = Duration::from_millis(RETRY_BASE_DELAY_MS << (attempt - 1));
                warn!(%entity, %variant, %scope, %attempt, error = %e, "transient store error, retrying");
                thread::sleep(delay);
            }
            // A persistently failing store must never read as "absent
            // override".
            Err(e) => return Err(EngineError::Storage(e)),
        }
    }
}
