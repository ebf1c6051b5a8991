//! Pending-set selection

use super::registry::Migration;

/// Select the migrations that still need to run
///
/// Returns every migration with `version > current`, sorted ascending by
/// version. The sort is stable, so equal versions keep registration order.
pub fn select_pending(migrations: &[Migration], current: i64) -> Vec<&Migration> {
    let mut pending: Vec<&Migration> = migrations
        .iter()
        .filter(|m| m.version > current)
        .collect();
    pending.sort_by_key(|m| m.version);
    pending
}
