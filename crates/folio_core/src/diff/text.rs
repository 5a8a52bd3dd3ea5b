//! Character-level text diff.
//!
//! Myers' O(ND) bisection over chars, followed by a merge pass and a semantic
//! cleanup pass that removes small equalities trapped between edits and slides
//! the remaining edits onto word and line boundaries.

/// Kind of one diff fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOp {
    /// Text present in both inputs
    Equal,
    /// Text only present in the new input
    Insert,
    /// Text only present in the old input
    Delete,
}

/// One fragment of a diff.
pub type Edit = (EditOp, String);

/// Diff `old` against `new`, cleaned up for human review.
///
/// Concatenating the `Equal` and `Delete` fragments yields `old`; the `Equal`
/// and `Insert` fragments yield `new`.
pub fn diff_text(old: &str, new: &str) -> Vec<Edit> {
    let old: Vec<char> = old.chars().collect();
    let new: Vec<char> = new.chars().collect();
    let mut edits = diff_main(&old, &new);
    cleanup_semantic(&mut edits);
    edits
}

fn collect(chars: &[char]) -> String {
    chars.iter().collect()
}

fn diff_main(old: &[char], new: &[char]) -> Vec<Edit> {
    if old == new {
        if old.is_empty() {
            return Vec::new();
        }
        return vec![(EditOp::Equal, collect(old))];
    }

    let prefix = old.iter().zip(new).take_while(|(a, b)| a == b).count();
    let (old_rest, new_rest) = (&old[prefix..], &new[prefix..]);
    let suffix = old_rest
        .iter()
        .rev()
        .zip(new_rest.iter().rev())
        .take_while(|(a, b)| a == b)
        .count();
    let old_mid = &old_rest[..old_rest.len() - suffix];
    let new_mid = &new_rest[..new_rest.len() - suffix];

    let mut edits = Vec::new();
    if prefix > 0 {
        edits.push((EditOp::Equal, collect(&old[..prefix])));
    }
    edits.extend(diff_compute(old_mid, new_mid));
    if suffix > 0 {
        edits.push((EditOp::Equal, collect(&old_rest[old_rest.len() - suffix..])));
    }
    cleanup_merge(&mut edits);
    edits
}

/// Diff two inputs that share no common prefix or suffix.
fn diff_compute(old: &[char], new: &[char]) -> Vec<Edit> {
    if old.is_empty() {
        return vec![(EditOp::Insert, collect(new))];
    }
    if new.is_empty() {
        return vec![(EditOp::Delete, collect(old))];
    }

    let old_longer = old.len() > new.len();
    let (long, short) = if old_longer { (old, new) } else { (new, old) };
    if let Some(index) = find(long, short) {
        let op = if old_longer {
            EditOp::Delete
        } else {
            EditOp::Insert
        };
        return vec![
            (op, collect(&long[..index])),
            (EditOp::Equal, collect(short)),
            (op, collect(&long[index + short.len()..])),
        ];
    }

    if short.len() == 1 {
        return vec![
            (EditOp::Delete, collect(old)),
            (EditOp::Insert, collect(new)),
        ];
    }

    bisect(old, new)
}

fn find(haystack: &[char], needle: &[char]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Find the middle snake of the edit graph and diff both halves.
fn bisect(old: &[char], new: &[char]) -> Vec<Edit> {
    let n = old.len() as isize;
    let m = new.len() as isize;
    let max_d = (n + m + 1) / 2;
    let v_offset = max_d;
    let v_length = (2 * max_d + 2) as usize;
    let mut v1 = vec![-1isize; v_length];
    let mut v2 = vec![-1isize; v_length];
    v1[(v_offset + 1) as usize] = 0;
    v2[(v_offset + 1) as usize] = 0;

    let delta = n - m;
    // With an odd delta the forward path detects the overlap, otherwise the
    // reverse one does.
    let front = delta % 2 != 0;
    let (mut k1_start, mut k1_end, mut k2_start, mut k2_end) = (0isize, 0isize, 0isize, 0isize);

    for d in 0..max_d {
        let mut k1 = -d + k1_start;
        while k1 <= d - k1_end {
            let k1_offset = (v_offset + k1) as usize;
            let mut x1 = if k1 == -d || (k1 != d && v1[k1_offset - 1] < v1[k1_offset + 1]) {
                v1[k1_offset + 1]
            } else {
                v1[k1_offset - 1] + 1
            };
            let mut y1 = x1 - k1;
            while x1 < n && y1 < m && old[x1 as usize] == new[y1 as usize] {
                x1 += 1;
                y1 += 1;
            }
            v1[k1_offset] = x1;
            if x1 > n {
                k1_end += 2;
            } else if y1 > m {
                k1_start += 2;
            } else if front {
                let k2_offset = v_offset + delta - k1;
                if (0..v_length as isize).contains(&k2_offset) && v2[k2_offset as usize] != -1 {
                    let x2 = n - v2[k2_offset as usize];
                    if x1 >= x2 {
                        return bisect_split(old, new, x1 as usize, y1 as usize);
                    }
                }
            }
            k1 += 2;
        }

        let mut k2 = -d + k2_start;
        while k2 <= d - k2_end {
            let k2_offset = (v_offset + k2) as usize;
            let mut x2 = if k2 == -d || (k2 != d && v2[k2_offset - 1] < v2[k2_offset + 1]) {
                v2[k2_offset + 1]
            } else {
                v2[k2_offset - 1] + 1
            };
            let mut y2 = x2 - k2;
            while x2 < n
                && y2 < m
                && old[(n - x2 - 1) as usize] == new[(m - y2 - 1) as usize]
            {
                x2 += 1;
                y2 += 1;
            }
            v2[k2_offset] = x2;
            if x2 > n {
                k2_end += 2;
            } else if y2 > m {
                k2_start += 2;
            } else if !front {
                let k1_offset = v_offset + delta - k2;
                if (0..v_length as isize).contains(&k1_offset) && v1[k1_offset as usize] != -1 {
                    let x1 = v1[k1_offset as usize];
                    let y1 = v_offset + x1 - k1_offset;
                    if x1 >= n - x2 {
                        return bisect_split(old, new, x1 as usize, y1 as usize);
                    }
                }
            }
            k2 += 2;
        }
    }

    // No commonality at all.
    vec![
        (EditOp::Delete, collect(old)),
        (EditOp::Insert, collect(new)),
    ]
}

fn bisect_split(old: &[char], new: &[char], x: usize, y: usize) -> Vec<Edit> {
    let (x, y) = (x.min(old.len()), y.min(new.len()));
    if (x, y) == (0, 0) || (x, y) == (old.len(), new.len()) {
        return vec![
            (EditOp::Delete, collect(old)),
            (EditOp::Insert, collect(new)),
        ];
    }
    let mut edits = diff_main(&old[..x], &new[..y]);
    edits.extend(diff_main(&old[x..], &new[y..]));
    edits
}

/// Byte length of the common prefix of `a` and `b`.
fn common_prefix(a: &str, b: &str) -> usize {
    a.chars()
        .zip(b.chars())
        .take_while(|(x, y)| x == y)
        .map(|(x, _)| x.len_utf8())
        .sum()
}

/// Byte length of the common suffix of `a` and `b`.
fn common_suffix(a: &str, b: &str) -> usize {
    a.chars()
        .rev()
        .zip(b.chars().rev())
        .take_while(|(x, y)| x == y)
        .map(|(x, _)| x.len_utf8())
        .sum()
}

fn push_equal(edits: &mut Vec<Edit>, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some((EditOp::Equal, last)) = edits.last_mut() {
        last.push_str(text);
    } else {
        edits.push((EditOp::Equal, text.to_string()));
    }
}

/// Merge adjacent fragments of the same kind and factor text shared by
/// neighbouring deletions and insertions out into equalities.
fn cleanup_merge(edits: &mut Vec<Edit>) {
    loop {
        merge_runs(edits);
        if !shift_single_edits(edits) {
            break;
        }
    }
}

/// Collapse every run of edits between two equalities into at most one
/// deletion followed by one insertion.
fn merge_runs(edits: &mut Vec<Edit>) {
    let mut merged: Vec<Edit> = Vec::with_capacity(edits.len());
    let mut deleted = String::new();
    let mut inserted = String::new();

    let terminator = (EditOp::Equal, String::new());
    for (op, text) in edits.drain(..).chain(std::iter::once(terminator)) {
        match op {
            EditOp::Delete => deleted.push_str(&text),
            EditOp::Insert => inserted.push_str(&text),
            EditOp::Equal => {
                let mut equal = text;
                if !deleted.is_empty() && !inserted.is_empty() {
                    let prefix = common_prefix(&deleted, &inserted);
                    if prefix > 0 {
                        push_equal(&mut merged, &inserted[..prefix]);
                        deleted.drain(..prefix);
                        inserted.drain(..prefix);
                    }
                    let suffix = common_suffix(&deleted, &inserted);
                    if suffix > 0 {
                        equal.insert_str(0, &inserted[inserted.len() - suffix..]);
                        deleted.truncate(deleted.len() - suffix);
                        inserted.truncate(inserted.len() - suffix);
                    }
                }
                if !deleted.is_empty() {
                    merged.push((EditOp::Delete, std::mem::take(&mut deleted)));
                }
                if !inserted.is_empty() {
                    merged.push((EditOp::Insert, std::mem::take(&mut inserted)));
                }
                push_equal(&mut merged, &equal);
            }
        }
    }
    *edits = merged;
}

/// Slide single edits surrounded by equalities so one of the equalities
/// disappears, e.g. `A<ins>BA</ins>C` becomes `<ins>AB</ins>AC`.
fn shift_single_edits(edits: &mut Vec<Edit>) -> bool {
    let mut changed = false;
    let mut i = 1;
    while i + 1 < edits.len() {
        if edits[i - 1].0 == EditOp::Equal && edits[i + 1].0 == EditOp::Equal {
            let before = edits[i - 1].1.clone();
            let after = edits[i + 1].1.clone();
            let text = edits[i].1.clone();
            if text.ends_with(&before) {
                edits[i].1 = format!("{before}{}", &text[..text.len() - before.len()]);
                edits[i + 1].1 = format!("{before}{after}");
                edits.remove(i - 1);
                changed = true;
            } else if text.starts_with(&after) {
                edits[i - 1].1.push_str(&after);
                edits[i].1 = format!("{}{after}", &text[after.len()..]);
                edits.remove(i + 1);
                changed = true;
            }
        }
        i += 1;
    }
    changed
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Drop equalities no longer than the edits on either side of them, turning
/// them into a deletion and an insertion.
fn cleanup_semantic(edits: &mut Vec<Edit>) {
    let mut changed = false;
    let mut equalities: Vec<usize> = Vec::new();
    let mut last_equality: Option<String> = None;
    let (mut inserted_before, mut deleted_before) = (0usize, 0usize);
    let (mut inserted_after, mut deleted_after) = (0usize, 0usize);

    let mut i = 0usize;
    while i < edits.len() {
        if edits[i].0 == EditOp::Equal {
            equalities.push(i);
            inserted_before = inserted_after;
            deleted_before = deleted_after;
            inserted_after = 0;
            deleted_after = 0;
            last_equality = Some(edits[i].1.clone());
            i += 1;
            continue;
        }

        let len = char_len(&edits[i].1);
        if edits[i].0 == EditOp::Insert {
            inserted_after += len;
        } else {
            deleted_after += len;
        }

        let collapse = last_equality.as_deref().is_some_and(|equal| {
            let equal_len = char_len(equal);
            equal_len <= inserted_before.max(deleted_before)
                && equal_len <= inserted_after.max(deleted_after)
        });
        if collapse && let (Some(equal), Some(&at)) = (last_equality.take(), equalities.last()) {
            edits.insert(at, (EditOp::Delete, equal));
            edits[at + 1].0 = EditOp::Insert;
            // Forget the collapsed equality and re-examine the one before it.
            equalities.pop();
            equalities.pop();
            i = equalities.last().map_or(0, |&prev| prev + 1);
            inserted_before = 0;
            deleted_before = 0;
            inserted_after = 0;
            deleted_after = 0;
            changed = true;
            continue;
        }
        i += 1;
    }

    if changed {
        cleanup_merge(edits);
    }
    cleanup_semantic_lossless(edits);
    coalesce(edits);
}

/// Slide single edits surrounded by equalities to the position that lines up
/// best with word and line boundaries.
fn cleanup_semantic_lossless(edits: &mut Vec<Edit>) {
    let mut i = 1;
    while i + 1 < edits.len() {
        if edits[i - 1].0 != EditOp::Equal || edits[i + 1].0 != EditOp::Equal {
            i += 1;
            continue;
        }

        let mut before = edits[i - 1].1.clone();
        let mut edit = edits[i].1.clone();
        let mut after = edits[i + 1].1.clone();

        // Shift the edit as far left as possible.
        let common = common_suffix(&before, &edit);
        if common > 0 {
            let shared = edit[edit.len() - common..].to_string();
            before.truncate(before.len() - common);
            edit = format!("{shared}{}", &edit[..edit.len() - common]);
            after.insert_str(0, &shared);
        }

        // Then step right one char at a time, keeping the best position.
        let mut best = (before.clone(), edit.clone(), after.clone());
        let mut best_score = boundary_score(&before, &edit) + boundary_score(&edit, &after);
        while let (Some(e), Some(a)) = (edit.chars().next(), after.chars().next()) {
            if e != a {
                break;
            }
            before.push(e);
            edit = format!("{}{e}", &edit[e.len_utf8()..]);
            after.drain(..a.len_utf8());
            let score = boundary_score(&before, &edit) + boundary_score(&edit, &after);
            // Ties go right, so edits end up after whitespace.
            if score >= best_score {
                best_score = score;
                best = (before.clone(), edit.clone(), after.clone());
            }
        }

        if edits[i - 1].1 != best.0 {
            let (best_before, best_edit, best_after) = best;
            let mut at = i;
            if best_before.is_empty() {
                edits.remove(at - 1);
                at -= 1;
            } else {
                edits[at - 1].1 = best_before;
            }
            edits[at].1 = best_edit;
            if best_after.is_empty() {
                edits.remove(at + 1);
            } else {
                edits[at + 1].1 = best_after;
            }
            i = at.max(1);
        }
        i += 1;
    }
}

/// How well the seam between `one` and `two` falls on a natural boundary,
/// from 6 (edge of the text) down to 0 (inside a word).
fn boundary_score(one: &str, two: &str) -> u8 {
    let (Some(c1), Some(c2)) = (one.chars().last(), two.chars().next()) else {
        return 6;
    };

    let non_alnum1 = !c1.is_alphanumeric();
    let non_alnum2 = !c2.is_alphanumeric();
    let space1 = non_alnum1 && c1.is_whitespace();
    let space2 = non_alnum2 && c2.is_whitespace();
    let line_break1 = space1 && (c1 == '\n' || c1 == '\r');
    let line_break2 = space2 && (c2 == '\n' || c2 == '\r');
    let blank_line1 = line_break1 && (one.ends_with("\n\n") || one.ends_with("\n\r\n"));
    let blank_line2 = line_break2 && (two.starts_with("\n\n") || two.starts_with("\r\n\r\n") || two.starts_with("\n\r\n") || two.starts_with("\r\n\n"));

    if blank_line1 || blank_line2 {
        5
    } else if line_break1 || line_break2 {
        4
    } else if non_alnum1 && !space1 && space2 {
        3
    } else if space1 || space2 {
        2
    } else if non_alnum1 || non_alnum2 {
        1
    } else {
        0
    }
}

/// Join neighbouring fragments of the same kind.
fn coalesce(edits: &mut Vec<Edit>) {
    let mut joined: Vec<Edit> = Vec::with_capacity(edits.len());
    for (op, text) in edits.drain(..) {
        if text.is_empty() {
            continue;
        }
        match joined.last_mut() {
            Some((last_op, last)) if *last_op == op => last.push_str(&text),
            _ => joined.push((op, text)),
        }
    }
    *edits = joined;
}
