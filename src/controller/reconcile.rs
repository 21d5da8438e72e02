//! Merging the remote message list with local-only state.
//!
//! Three inputs:
//! - the latest remote snapshot
//! - provisional messages not yet confirmed by the store
//! - overlays: local copies that win over the remote row they match (the
//!   streaming assistant message, and final copies waiting for the store
//!   to report them complete)
//!
//! Matching uses [`Message::same_logical`]; each logical message appears once.

use crate::models::Message;

/// Build the display list, ordered by `created_at` then role.
pub fn merge_display(remote: &[Message], provisional: &[Message], overlays: &[Message]) -> Vec<Message> {
    let mut used = vec![false; overlays.len()];
    let mut merged: Vec<Message> = Vec::with_capacity(remote.len() + provisional.len() + overlays.len());

    for row in remote {
        match overlays.iter().position(|overlay| overlay.same_logical(row)) {
            Some(index) => {
                used[index] = true;
                merged.push(substitute(row, &overlays[index]));
            }
            None => merged.push(row.clone()),
        }
    }

    for pending in provisional {
        let shadowed = merged.iter().any(|m| m.same_logical(pending))
            || overlays.iter().any(|o| o.same_logical(pending));
        if !shadowed {
            merged.push(pending.clone());
        }
    }

    for (overlay, used) in overlays.iter().zip(used) {
        if !used && !merged.iter().any(|m| m.same_logical(overlay)) {
            merged.push(overlay.clone());
        }
    }

    merged.sort_by_key(|m| (m.created_at, m.role.rank()));
    merged
}

/// The remote row with the local copy's content.
fn substitute(row: &Message, local: &Message) -> Message {
    Message {
        content: local.content.clone(),
        is_complete: local.is_complete,
        metadata: local.metadata.clone().or_else(|| row.metadata.clone()),
        ..row.clone()
    }
}

/// Drop provisional messages the remote list now contains.
pub fn prune_confirmed(provisional: &mut Vec<Message>, remote: &[Message]) {
    provisional.retain(|pending| !remote.iter().any(|row| row.same_logical(pending)));
}

/// Drop settled overlays whose remote row is complete.
pub fn prune_settled(settled: &mut Vec<Message>, remote: &[Message]) {
    settled.retain(|overlay| {
        !remote
            .iter()
            .any(|row| row.is_complete && row.same_logical(overlay))
    });
}
