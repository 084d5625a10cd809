//! Character diffs expressed as positioned changes.

use similar::{ChangeTag, TextDiff};
use weaver_editor_bridge::PositionedChange;

/// Changes that turn `old` into `new`, in `old`'s char coordinates.
///
/// Adjacent deletes and inserts merge into one replacement. The result is
/// ascending and non-overlapping, so it applies as a single batch.
pub fn diff_changes(old: &str, new: &str) -> Vec<PositionedChange> {
    if old == new {
        return Vec::new();
    }

    let diff = TextDiff::from_chars(old, new);
    let mut changes = Vec::new();
    // (from, to, insert) of the hunk being built.
    let mut hunk: Option<(usize, usize, String)> = None;
    let mut old_pos = 0;

    for change in diff.iter_all_changes() {
        match change.tag() {
            ChangeTag::Equal => {
                if let Some((from, to, insert)) = hunk.take() {
                    changes.push(PositionedChange::new(from, to, insert));
                }
                old_pos += change.value().chars().count();
            }
            ChangeTag::Delete => {
                let len = change.value().chars().count();
                let (_, to, _) = hunk.get_or_insert_with(|| (old_pos, old_pos, String::new()));
                *to += len;
                old_pos += len;
            }
            ChangeTag::Insert => {
                let (_, _, insert) =
                    hunk.get_or_insert_with(|| (old_pos, old_pos, String::new()));
                insert.push_str(change.value());
            }
        }
    }
    if let Some((from, to, insert)) = hunk {
        changes.push(PositionedChange::new(from, to, insert));
    }

    changes
}
