//! Spawn safety (spec §4.1 invariant, §8 property 2).
//!
//! The checks are pure functions over data the store already has to fetch
//! (the parent's ancestry chain, and whatever siblings/terminal-lineage rows
//! exist). `TaskStore::try_spawn` calls these after loading that data so the
//! actual decision logic is unit-testable without a database.

use uuid::Uuid;

use crate::task::{AncestryChain, TaskKind};

pub const DEFAULT_MAX_SPAWN_DEPTH: u32 = 10;

/// Why a spawn attempt was rejected. Logged by the caller; never surfaced as
/// a task failure — a rejected spawn is deduplication, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnRejection {
    DepthExceeded,
    AncestorTargetsSameUrl,
    DuplicatePendingOrProcessingSibling,
    TargetAlreadyTerminalInLineage,
}

/// Everything the spawn-safety check needs about the lineage beyond the
/// parent's own depth/ancestry, which the caller already has on `Task`.
pub struct SpawnContext<'a> {
    pub parent_ancestry: &'a AncestryChain,
    pub parent_depth: u32,
    pub max_spawn_depth: u32,
    /// Normalized target URLs already seen in this lineage, keyed by the
    /// task id they belong to, so `AncestorTargetsSameUrl` can be checked
    /// against the parent's own ancestors specifically.
    pub ancestor_target_urls: &'a [(Uuid, TaskKind, String)],
    /// Any Pending/Processing sibling sharing `(tracking_id, target_url, kind)`.
    pub has_pending_or_processing_sibling: bool,
    /// Whether `target_url` already reached a terminal state somewhere in
    /// this lineage (not necessarily as a direct ancestor).
    pub target_already_terminal_in_lineage: bool,
}

/// Evaluate the four spawn-safety checks from spec §4.1 in order, returning
/// the first that fails.
pub fn check_spawn_safety(
    child_kind: TaskKind,
    child_target_url: Option<&str>,
    ctx: &SpawnContext,
) -> Result<(), SpawnRejection> {
    let child_depth = ctx.parent_depth + 1;
    if child_depth > ctx.max_spawn_depth {
        return Err(SpawnRejection::DepthExceeded);
    }

    if let Some(url) = child_target_url {
        let ancestor_hit = ctx
            .ancestor_target_urls
            .iter()
            .any(|(id, kind, seen_url)| {
                ctx.parent_ancestry.contains(*id) && *kind == child_kind && seen_url == url
            });
        if ancestor_hit {
            return Err(SpawnRejection::AncestorTargetsSameUrl);
        }
    }

    if ctx.has_pending_or_processing_sibling {
        return Err(SpawnRejection::DuplicatePendingOrProcessingSibling);
    }

    if ctx.target_already_terminal_in_lineage {
        return Err(SpawnRejection::TargetAlreadyTerminalInLineage);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(ids: &[Uuid]) -> AncestryChain {
        AncestryChain(ids.to_vec())
    }

    #[test]
    fn rejects_when_depth_would_exceed_max() {
        let ancestry = chain(&[]);
        let ctx = SpawnContext {
            parent_ancestry: &ancestry,
            parent_depth: 10,
            max_spawn_depth: 10,
            ancestor_target_urls: &[],
            has_pending_or_processing_sibling: false,
            target_already_terminal_in_lineage: false,
        };
        assert_eq!(
            check_spawn_safety(TaskKind::Company, None, &ctx),
            Err(SpawnRejection::DepthExceeded)
        );
    }

    #[test]
    fn rejects_when_ancestor_already_targets_same_url_and_kind() {
        let ancestor_id = Uuid::new_v4();
        let ancestry = chain(&[ancestor_id]);
        let targets = vec![(ancestor_id, TaskKind::SourceDiscovery, "https://foo.com/careers".to_string())];
        let ctx = SpawnContext {
            parent_ancestry: &ancestry,
            parent_depth: 1,
            max_spawn_depth: 10,
            ancestor_target_urls: &targets,
            has_pending_or_processing_sibling: false,
            target_already_terminal_in_lineage: false,
        };
        assert_eq!(
            check_spawn_safety(TaskKind::SourceDiscovery, Some("https://foo.com/careers"), &ctx),
            Err(SpawnRejection::AncestorTargetsSameUrl)
        );
    }

    #[test]
    fn allows_spawn_when_all_checks_pass() {
        let ancestry = chain(&[Uuid::new_v4()]);
        let ctx = SpawnContext {
            parent_ancestry: &ancestry,
            parent_depth: 2,
            max_spawn_depth: 10,
            ancestor_target_urls: &[],
            has_pending_or_processing_sibling: false,
            target_already_terminal_in_lineage: false,
        };
        assert_eq!(check_spawn_safety(TaskKind::Company, Some("https://bar.com"), &ctx), Ok(()));
    }

    #[test]
    fn rejects_duplicate_pending_sibling() {
        let ancestry = chain(&[]);
        let ctx = SpawnContext {
            parent_ancestry: &ancestry,
            parent_depth: 0,
            max_spawn_depth: 10,
            ancestor_target_urls: &[],
            has_pending_or_processing_sibling: true,
            target_already_terminal_in_lineage: false,
        };
        assert_eq!(
            check_spawn_safety(TaskKind::JobListing, None, &ctx),
            Err(SpawnRejection::DuplicatePendingOrProcessingSibling)
        );
    }
}
