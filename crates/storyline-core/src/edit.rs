#![forbid(unsafe_code)]

//! Card deletion and the create-cascade.
//!
//! Deleting a `create` action also deletes every other editable action that
//! references the block it created, otherwise replay would update or delete
//! a block that never exists. Dependents are marked latest first and removed
//! by a single sweep.

use std::collections::BTreeSet;

use crate::action::{ActionId, ActionRecord, BlockId, Payload};
use crate::error::{Result, TimelineError};
use crate::timeline::{JumpTarget, Timeline};

/// Outcome of [`delete_record`].
#[derive(Debug, Clone, PartialEq)]
pub struct Deletion {
    /// Timeline after the sweep.
    pub timeline: Timeline,
    /// Ids removed by the sweep, in the order they were marked.
    pub removed: Vec<ActionId>,
    /// Record chosen before the delete to take over as current, if any.
    pub fallback: Option<ActionId>,
}

/// Ids of editable records that reference `block`, in staged order.
pub fn dependents(timeline: &Timeline, block: &BlockId) -> Vec<ActionId> {
    timeline
        .records()
        .iter()
        .filter(|r| r.payload.block_id() == Some(block))
        .map(|r| r.id)
        .collect()
}

/// Record to select once `removing` is gone: the closest survivor after
/// `anchor`, else the closest one before it.
///
/// Records that are already skipped do not survive either, since the sweep
/// that completes a delete removes them too.
pub fn fallback_target(
    timeline: &Timeline,
    anchor: ActionId,
    removing: &BTreeSet<ActionId>,
) -> Option<ActionId> {
    let survives = |id: &ActionId| !removing.contains(id) && !timeline.is_skipped(*id);
    let records = timeline.records();
    let pos = timeline.position(anchor)?;

    records[pos + 1..]
        .iter()
        .map(|r| r.id)
        .find(survives)
        .or_else(|| records[..pos].iter().rev().map(|r| r.id).find(survives))
}

/// Delete the card `id`, cascading through dependents of a created block.
pub fn delete_record(timeline: &Timeline, id: ActionId) -> Result<Deletion> {
    let record = timeline.get(id).ok_or(TimelineError::UnknownId(id))?;

    let mut marked: Vec<ActionId> = match (record.payload.is_create(), record.payload.block_id()) {
        (true, Some(block)) => dependents(timeline, block),
        _ => vec![id],
    };
    marked.reverse();

    let removing: BTreeSet<ActionId> = marked.iter().copied().collect();
    let fallback = fallback_target(timeline, id, &removing);
    let cursor_removed = timeline
        .current()
        .is_some_and(|r| removing.contains(&r.id) || timeline.is_skipped(r.id));

    let mut staged = timeline.clone();
    for dependent in &marked {
        staged = staged.skip(*dependent)?;
    }
    let mut removed: Vec<ActionId> = marked.clone();
    removed.extend(
        timeline
            .skipped()
            .iter()
            .copied()
            .filter(|skipped| !removing.contains(skipped)),
    );

    let mut swept = staged.sweep();
    if cursor_removed {
        swept = match fallback {
            Some(target) => swept.jump_to(JumpTarget::Id(target)),
            None => swept.jump_to(JumpTarget::Initial),
        };
    }

    tracing::debug!(
        timeline_event = "delete",
        id = id.get(),
        kind = %record.kind(),
        removed = removed.len(),
        fallback = fallback.map(ActionId::get),
    );
    Ok(Deletion {
        timeline: swept,
        removed,
        fallback,
    })
}

/// Replace the value of a transform card with `payload`, re-captured as
/// `new_id`.
///
/// Returns `Ok(None)` when the payload is unchanged.
pub fn edit_payload(
    timeline: &Timeline,
    id: ActionId,
    payload: Payload,
    new_id: ActionId,
) -> Result<Option<Timeline>> {
    let record = timeline.get(id).ok_or(TimelineError::UnknownId(id))?;
    if !record.payload.is_transform() {
        return Err(TimelineError::NotEditable {
            id,
            kind: record.kind(),
        });
    }
    if record.payload == payload {
        return Ok(None);
    }
    let replacement = ActionRecord::new(new_id, payload, record.timestamp);
    timeline.replace(id, replacement).map(Some)
}

/// Block ids referenced by update/delete records with no surviving create.
pub fn dangling_references(timeline: &Timeline) -> BTreeSet<BlockId> {
    let created: BTreeSet<&BlockId> = timeline
        .records()
        .iter()
        .filter(|r| r.payload.is_create())
        .filter_map(|r| r.payload.block_id())
        .collect();
    timeline
        .records()
        .iter()
        .filter(|r| !r.payload.is_create())
        .filter_map(|r| r.payload.block_id())
        .filter(|block| !created.contains(block))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{Block, BlockPatch, Position};

    fn create(id: u64, block: &str, ts: i64) -> ActionRecord {
        ActionRecord::new(
            ActionId(id),
            Payload::Create(Block {
                id: BlockId::new(block),
                text: block.to_uppercase(),
                x: 0.0,
                y: 0.0,
            }),
            ts,
        )
    }

    fn update(id: u64, block: &str, ts: i64) -> ActionRecord {
        ActionRecord::new(
            ActionId(id),
            Payload::Update(BlockPatch {
                id: BlockId::new(block),
                text: Some(format!("{block}-{id}")),
                ..BlockPatch::default()
            }),
            ts,
        )
    }

    fn scale(id: u64, ts: i64) -> ActionRecord {
        ActionRecord::new(ActionId(id), Payload::SetScale(2.0), ts)
    }

    fn canvas() -> Timeline {
        Timeline::from_records(
            ActionId(0),
            [
                create(1, "a", 0),
                create(2, "b", 10),
                update(3, "a", 20),
                scale(4, 30),
                update(5, "b", 40),
                ActionRecord::new(ActionId(6), Payload::Delete { id: BlockId::new("a") }, 50),
            ],
        )
        .unwrap()
    }

    fn ids(timeline: &Timeline) -> Vec<u64> {
        timeline.records().iter().map(|r| r.id.get()).collect()
    }

    #[test]
    fn dependents_are_in_staged_order() {
        assert_eq!(
            dependents(&canvas(), &BlockId::new("a")),
            vec![ActionId(1), ActionId(3), ActionId(6)]
        );
    }

    #[test]
    fn deleting_create_removes_dependents_latest_first() {
        let deletion = delete_record(&canvas(), ActionId(1)).unwrap();
        assert_eq!(deletion.removed, vec![ActionId(6), ActionId(3), ActionId(1)]);
        assert_eq!(ids(&deletion.timeline), vec![2, 4, 5]);
        assert!(dangling_references(&deletion.timeline).is_empty());
        assert_eq!(
            deletion.timeline.time_diffs().len(),
            deletion.timeline.editable_count() - 1
        );
    }

    #[test]
    fn deleting_plain_record_removes_only_it() {
        let deletion = delete_record(&canvas(), ActionId(4)).unwrap();
        assert_eq!(deletion.removed, vec![ActionId(4)]);
        assert_eq!(ids(&deletion.timeline), vec![1, 2, 3, 5, 6]);
        // 20 -> 30 -> 40 collapses to a single 20ms gap.
        assert_eq!(deletion.timeline.time_diff_of(ActionId(3)), Some(20));
    }

    #[test]
    fn cascade_does_not_resurrect_already_skipped_dependents() {
        let t = canvas().toggle_skip(ActionId(3)).unwrap();
        let deletion = delete_record(&t, ActionId(1)).unwrap();
        assert_eq!(ids(&deletion.timeline), vec![2, 4, 5]);
        assert!(deletion.timeline.skipped().is_empty());
    }

    #[test]
    fn delete_sweeps_previously_skipped_records_too() {
        let t = canvas().toggle_skip(ActionId(2)).unwrap();
        let deletion = delete_record(&t, ActionId(4)).unwrap();
        assert_eq!(deletion.removed, vec![ActionId(4), ActionId(2)]);
        assert_eq!(ids(&deletion.timeline), vec![1, 3, 5, 6]);
    }

    #[test]
    fn fallback_prefers_following_then_preceding() {
        let t = canvas();
        let one = |id| BTreeSet::from([ActionId(id)]);
        assert_eq!(fallback_target(&t, ActionId(4), &one(4)), Some(ActionId(5)));
        assert_eq!(fallback_target(&t, ActionId(6), &one(6)), Some(ActionId(5)));
        let single = Timeline::from_records(ActionId(0), [scale(1, 0)]).unwrap();
        assert_eq!(fallback_target(&single, ActionId(1), &one(1)), None);
    }

    #[test]
    fn fallback_skips_records_already_marked() {
        let t = canvas().toggle_skip(ActionId(5)).unwrap();
        assert_eq!(
            fallback_target(&t, ActionId(4), &BTreeSet::from([ActionId(4)])),
            Some(ActionId(6))
        );
    }

    #[test]
    fn cascade_fallback_is_relative_to_deleted_card() {
        let t = canvas().jump_to(JumpTarget::Id(ActionId(3)));
        let deletion = delete_record(&t, ActionId(1)).unwrap();
        assert_eq!(deletion.fallback, Some(ActionId(2)));
        assert_eq!(deletion.timeline.current_id(), ActionId(2));
    }

    #[test]
    fn cursor_moves_to_fallback_when_current_is_deleted() {
        let t = canvas().jump_to(JumpTarget::Id(ActionId(4)));
        let deletion = delete_record(&t, ActionId(4)).unwrap();
        assert_eq!(deletion.fallback, Some(ActionId(5)));
        assert_eq!(deletion.timeline.current_id(), ActionId(5));

        let t = canvas();
        let deletion = delete_record(&t, ActionId(6)).unwrap();
        assert_eq!(deletion.timeline.current_id(), ActionId(5));
    }

    #[test]
    fn cursor_untouched_when_current_survives() {
        let t = canvas().jump_to(JumpTarget::Id(ActionId(2)));
        let deletion = delete_record(&t, ActionId(4)).unwrap();
        assert_eq!(deletion.timeline.current_id(), ActionId(2));
    }

    #[test]
    fn delete_unknown_is_rejected() {
        assert_eq!(
            delete_record(&canvas(), ActionId(99)).unwrap_err(),
            TimelineError::UnknownId(ActionId(99))
        );
    }

    #[test]
    fn dangling_references_detects_orphans() {
        let t = canvas().toggle_skip(ActionId(1)).unwrap().sweep();
        assert_eq!(
            dangling_references(&t),
            BTreeSet::from([BlockId::new("a")])
        );
    }

    #[test]
    fn edit_payload_replaces_transform_in_place() {
        let t = canvas();
        let edited = edit_payload(&t, ActionId(4), Payload::SetScale(3.0), ActionId(7))
            .unwrap()
            .unwrap();
        assert_eq!(ids(&edited), vec![1, 2, 3, 7, 5, 6]);
        assert_eq!(edited.get(ActionId(7)).unwrap().payload, Payload::SetScale(3.0));
        assert_eq!(edited.time_diffs(), t.time_diffs());
    }

    #[test]
    fn edit_payload_unchanged_is_noop() {
        let t = canvas();
        assert_eq!(
            edit_payload(&t, ActionId(4), Payload::SetScale(2.0), ActionId(7)).unwrap(),
            None
        );
    }

    #[test]
    fn edit_payload_validation() {
        let t = canvas();
        assert!(matches!(
            edit_payload(&t, ActionId(1), Payload::SetScale(1.0), ActionId(7)).unwrap_err(),
            TimelineError::NotEditable { .. }
        ));
        assert!(matches!(
            edit_payload(
                &t,
                ActionId(4),
                Payload::SetPosition(Position::new(1.0, 1.0)),
                ActionId(7)
            )
            .unwrap_err(),
            TimelineError::PayloadKindMismatch { .. }
        ));
    }
}
