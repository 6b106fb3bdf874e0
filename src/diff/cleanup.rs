//! Semantic cleanup passes over a raw character edit script.
//!
//! The passes follow the classic "cleanup for human readability" approach:
//! merge neighbouring edits, eliminate equalities that are shorter than the
//! edits around them, slide lone edits to natural word or line boundaries,
//! and pull overlaps between a deletion and the following insertion out into
//! an equality. All lengths are counted in `char`s.

use super::segment::{DiffSegment, Operation};

/// Working representation of a segment while the cleanup passes run
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Edit {
    pub op: Operation,
    pub text: Vec<char>,
}

impl Edit {
    pub fn new(op: Operation, text: Vec<char>) -> Self {
        Self { op, text }
    }

    pub fn from_slices(op: Operation, slices: &[&str]) -> Self {
        Self::new(op, slices.iter().flat_map(|s| s.chars()).collect())
    }

    pub fn into_segment(self) -> DiffSegment {
        DiffSegment::new(self.op, self.text.into_iter().collect::<String>())
    }
}

fn common_prefix(a: &[char], b: &[char]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

fn common_suffix(a: &[char], b: &[char]) -> usize {
    a.iter()
        .rev()
        .zip(b.iter().rev())
        .take_while(|(x, y)| x == y)
        .count()
}

fn find(haystack: &[char], needle: &[char]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Length of the longest suffix of `a` that is also a prefix of `b`
fn common_overlap(a: &[char], b: &[char]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }

    let len = a.len().min(b.len());
    let a = &a[a.len() - len..];
    let b = &b[..len];
    if a == b {
        return len;
    }

    let mut best = 0;
    let mut length = 1;
    while length <= len {
        let pattern = &a[len - length..];
        let found = match find(b, pattern) {
            Some(found) => found,
            None => return best,
        };
        length += found;
        if found == 0 || a[len - length..] == b[..length] {
            best = length;
            length += 1;
        }
    }
    best
}

/// Coalesce runs of the same operation and factor shared text out of
/// delete/insert runs into the surrounding equalities.
pub(crate) fn cleanup_merge(edits: &mut Vec<Edit>) {
    edits.push(Edit::new(Operation::Equal, Vec::new()));

    let mut pointer = 0;
    let mut count_delete = 0;
    let mut count_insert = 0;
    let mut text_delete: Vec<char> = Vec::new();
    let mut text_insert: Vec<char> = Vec::new();

    while pointer < edits.len() {
        match edits[pointer].op {
            Operation::Insert => {
                count_insert += 1;
                text_insert.extend_from_slice(&edits[pointer].text);
                pointer += 1;
            }
            Operation::Delete => {
                count_delete += 1;
                text_delete.extend_from_slice(&edits[pointer].text);
                pointer += 1;
            }
            Operation::Equal => {
                if count_delete + count_insert > 1 {
                    if count_delete != 0 && count_insert != 0 {
                        let common = common_prefix(&text_insert, &text_delete);
                        if common != 0 {
                            let start = pointer - count_delete - count_insert;
                            if start > 0 && edits[start - 1].op == Operation::Equal {
                                edits[start - 1]
                                    .text
                                    .extend_from_slice(&text_insert[..common]);
                            } else {
                                edits.insert(
                                    0,
                                    Edit::new(Operation::Equal, text_insert[..common].to_vec()),
                                );
                                pointer += 1;
                            }
                            text_insert.drain(..common);
                            text_delete.drain(..common);
                        }

                        let common = common_suffix(&text_insert, &text_delete);
                        if common != 0 {
                            let mut shared = text_insert.split_off(text_insert.len() - common);
                            text_delete.truncate(text_delete.len() - common);
                            shared.extend_from_slice(&edits[pointer].text);
                            edits[pointer].text = shared;
                        }
                    }

                    pointer -= count_delete + count_insert;
                    edits.drain(pointer..pointer + count_delete + count_insert);
                    if !text_delete.is_empty() {
                        edits.insert(
                            pointer,
                            Edit::new(Operation::Delete, std::mem::take(&mut text_delete)),
                        );
                        pointer += 1;
                    }
                    if !text_insert.is_empty() {
                        edits.insert(
                            pointer,
                            Edit::new(Operation::Insert, std::mem::take(&mut text_insert)),
                        );
                        pointer += 1;
                    }
                    pointer += 1;
                } else if pointer != 0 && edits[pointer - 1].op == Operation::Equal {
                    let text = edits.remove(pointer).text;
                    edits[pointer - 1].text.extend(text);
                } else {
                    pointer += 1;
                }
                count_delete = 0;
                count_insert = 0;
                text_delete.clear();
                text_insert.clear();
            }
        }
    }

    if edits.last().map_or(false, |edit| edit.text.is_empty()) {
        edits.pop();
    }

    // Slide lone edits over a neighbouring equality they fully repeat,
    // e.g. A<ins>BA</ins>C -> <ins>AB</ins>AC
    let mut changes = false;
    let mut pointer = 1;
    while pointer + 1 < edits.len() {
        if edits[pointer - 1].op == Operation::Equal && edits[pointer + 1].op == Operation::Equal {
            let prev = edits[pointer - 1].text.clone();
            let next = edits[pointer + 1].text.clone();

            if edits[pointer].text.ends_with(&prev) {
                let current = &edits[pointer].text;
                let mut shifted = prev.clone();
                shifted.extend_from_slice(&current[..current.len() - prev.len()]);
                edits[pointer].text = shifted;

                let mut following = prev;
                following.extend(next);
                edits[pointer + 1].text = following;

                edits.remove(pointer - 1);
                changes = true;
            } else if edits[pointer].text.starts_with(&next) {
                edits[pointer - 1].text.extend_from_slice(&next);

                let current = &edits[pointer].text;
                let mut shifted = current[next.len()..].to_vec();
                shifted.extend_from_slice(&next);
                edits[pointer].text = shifted;

                edits.remove(pointer + 1);
                changes = true;
            }
        }
        pointer += 1;
    }

    if changes {
        cleanup_merge(edits);
    }
}

/// Reduce the number of edits by eliminating semantically trivial equalities,
/// then align edits to boundaries and extract delete/insert overlaps.
pub(crate) fn cleanup_semantic(edits: &mut Vec<Edit>) {
    let mut changes = false;
    let mut equalities: Vec<usize> = Vec::new();
    let mut last_equality: Option<Vec<char>> = None;
    // Edit lengths before and after the last equality
    let mut inserted_before = 0;
    let mut deleted_before = 0;
    let mut inserted_after = 0;
    let mut deleted_after = 0;

    let mut pointer = 0;
    while pointer < edits.len() {
        if edits[pointer].op == Operation::Equal {
            equalities.push(pointer);
            inserted_before = inserted_after;
            deleted_before = deleted_after;
            inserted_after = 0;
            deleted_after = 0;
            last_equality = Some(edits[pointer].text.clone());
            pointer += 1;
            continue;
        }

        if edits[pointer].op == Operation::Insert {
            inserted_after += edits[pointer].text.len();
        } else {
            deleted_after += edits[pointer].text.len();
        }

        let eliminate = match (&last_equality, equalities.last()) {
            (Some(equality), Some(&at))
                if equality.len() <= inserted_before.max(deleted_before)
                    && equality.len() <= inserted_after.max(deleted_after) =>
            {
                Some((at, equality.clone()))
            }
            _ => None,
        };

        if let Some((at, equality)) = eliminate {
            edits.insert(at, Edit::new(Operation::Delete, equality));
            edits[at + 1].op = Operation::Insert;

            // Drop the equality just replaced and the one before it,
            // which has to be re-evaluated.
            equalities.pop();
            equalities.pop();
            inserted_before = 0;
            deleted_before = 0;
            inserted_after = 0;
            deleted_after = 0;
            last_equality = None;
            changes = true;

            pointer = equalities.last().map_or(0, |&i| i + 1);
            continue;
        }
        pointer += 1;
    }

    if changes {
        cleanup_merge(edits);
    }
    cleanup_semantic_lossless(edits);
    extract_overlaps(edits);
}

/// Shift single edits surrounded by equalities sideways so they sit on the
/// best-scoring boundary.
pub(crate) fn cleanup_semantic_lossless(edits: &mut Vec<Edit>) {
    let mut pointer = 1;
    while pointer + 1 < edits.len() {
        if edits[pointer - 1].op == Operation::Equal && edits[pointer + 1].op == Operation::Equal {
            let mut equality1 = edits[pointer - 1].text.clone();
            let mut edit = edits[pointer].text.clone();
            let mut equality2 = edits[pointer + 1].text.clone();

            // Shift the edit as far left as possible first
            let common = common_suffix(&equality1, &edit);
            if common != 0 {
                let shared = edit[edit.len() - common..].to_vec();
                equality1.truncate(equality1.len() - common);

                let mut shifted = shared.clone();
                shifted.extend_from_slice(&edit[..edit.len() - common]);
                edit = shifted;

                let mut following = shared;
                following.extend(equality2);
                equality2 = following;
            }

            let mut best = (equality1.clone(), edit.clone(), equality2.clone());
            let mut best_score =
                semantic_score(&equality1, &edit) + semantic_score(&edit, &equality2);

            while !edit.is_empty() && !equality2.is_empty() && edit[0] == equality2[0] {
                equality1.push(edit.remove(0));
                edit.push(equality2.remove(0));

                let score = semantic_score(&equality1, &edit) + semantic_score(&edit, &equality2);
                // >= favours the rightmost of equally good positions
                if score >= best_score {
                    best_score = score;
                    best = (equality1.clone(), edit.clone(), equality2.clone());
                }
            }

            if edits[pointer - 1].text != best.0 {
                let (best_equality1, best_edit, best_equality2) = best;
                if best_equality1.is_empty() {
                    edits.remove(pointer - 1);
                    pointer -= 1;
                } else {
                    edits[pointer - 1].text = best_equality1;
                }
                edits[pointer].text = best_edit;
                if best_equality2.is_empty() {
                    edits.remove(pointer + 1);
                    pointer = pointer.saturating_sub(1);
                } else {
                    edits[pointer + 1].text = best_equality2;
                }
            }
        }
        pointer += 1;
    }
}

/// Score how natural the boundary between `one` and `two` is, from 6 (edge
/// of text) down to 0 (inside a word).
fn semantic_score(one: &[char], two: &[char]) -> u8 {
    let (Some(&last), Some(&first)) = (one.last(), two.first()) else {
        return 6;
    };

    let non_alnum1 = !last.is_alphanumeric();
    let non_alnum2 = !first.is_alphanumeric();
    let whitespace1 = non_alnum1 && last.is_whitespace();
    let whitespace2 = non_alnum2 && first.is_whitespace();
    let line_break1 = whitespace1 && matches!(last, '\n' | '\r');
    let line_break2 = whitespace2 && matches!(first, '\n' | '\r');
    let blank_line1 = line_break1 && (one.ends_with(&['\n', '\n']) || one.ends_with(&['\n', '\r', '\n']));
    let blank_line2 = line_break2
        && (two.starts_with(&['\n', '\n'])
            || two.starts_with(&['\n', '\r', '\n'])
            || two.starts_with(&['\r', '\n', '\n'])
            || two.starts_with(&['\r', '\n', '\r', '\n']));

    if blank_line1 || blank_line2 {
        5
    } else if line_break1 || line_break2 {
        4
    } else if non_alnum1 && !whitespace1 && whitespace2 {
        3
    } else if whitespace1 || whitespace2 {
        2
    } else if non_alnum1 || non_alnum2 {
        1
    } else {
        0
    }
}

/// Pull the overlap between a deletion and the following insertion out into
/// an equality when it covers at least half of either text.
fn extract_overlaps(edits: &mut Vec<Edit>) {
    let mut pointer = 1;
    while pointer < edits.len() {
        if edits[pointer - 1].op == Operation::Delete && edits[pointer].op == Operation::Insert {
            let deletion = edits[pointer - 1].text.clone();
            let insertion = edits[pointer].text.clone();
            let overlap1 = common_overlap(&deletion, &insertion);
            let overlap2 = common_overlap(&insertion, &deletion);

            if overlap1 >= overlap2 {
                if overlap1 > 0
                    && (overlap1 * 2 >= deletion.len() || overlap1 * 2 >= insertion.len())
                {
                    edits.insert(
                        pointer,
                        Edit::new(Operation::Equal, insertion[..overlap1].to_vec()),
                    );
                    edits[pointer - 1].text = deletion[..deletion.len() - overlap1].to_vec();
                    edits[pointer + 1].text = insertion[overlap1..].to_vec();
                    pointer += 1;
                }
            } else if overlap2 * 2 >= deletion.len() || overlap2 * 2 >= insertion.len() {
                // Reverse overlap: the insertion now comes first
                edits.insert(
                    pointer,
                    Edit::new(Operation::Equal, deletion[..overlap2].to_vec()),
                );
                edits[pointer - 1] = Edit::new(
                    Operation::Insert,
                    insertion[..insertion.len() - overlap2].to_vec(),
                );
                edits[pointer + 1] = Edit::new(Operation::Delete, deletion[overlap2..].to_vec());
                pointer += 1;
            }
            pointer += 1;
        }
        pointer += 1;
    }
}

/// Drop empty edits and join neighbours that share an operation
pub(crate) fn compact(edits: Vec<Edit>) -> Vec<Edit> {
    let mut out: Vec<Edit> = Vec::with_capacity(edits.len());
    for edit in edits.into_iter().filter(|edit| !edit.text.is_empty()) {
        match out.last_mut() {
            Some(last) if last.op == edit.op => last.text.extend(edit.text),
            _ => out.push(edit),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edit(op: Operation, text: &str) -> Edit {
        Edit::new(op, text.chars().collect())
    }

    fn eq(text: &str) -> Edit {
        edit(Operation::Equal, text)
    }

    fn del(text: &str) -> Edit {
        edit(Operation::Delete, text)
    }

    fn ins(text: &str) -> Edit {
        edit(Operation::Insert, text)
    }

    fn chars(text: &str) -> Vec<char> {
        text.chars().collect()
    }

    #[test]
    fn test_common_overlap() {
        assert_eq!(common_overlap(&chars(""), &chars("abcd")), 0);
        assert_eq!(common_overlap(&chars("abc"), &chars("abcd")), 3);
        assert_eq!(common_overlap(&chars("123456"), &chars("abcd")), 0);
        assert_eq!(common_overlap(&chars("123456xxx"), &chars("xxxabcd")), 3);
        assert_eq!(common_overlap(&chars("fi"), &chars("\u{fb01}i")), 0);
    }

    #[test]
    fn test_merge_leaves_clean_script_alone() {
        let mut edits = vec![eq("a"), del("b"), ins("c")];
        cleanup_merge(&mut edits);
        assert_eq!(edits, vec![eq("a"), del("b"), ins("c")]);
    }

    #[test]
    fn test_merge_coalesces_runs() {
        let mut edits = vec![eq("a"), eq("b"), eq("c")];
        cleanup_merge(&mut edits);
        assert_eq!(edits, vec![eq("abc")]);

        let mut edits = vec![del("a"), ins("b"), del("c"), ins("d"), eq("e"), eq("f")];
        cleanup_merge(&mut edits);
        assert_eq!(edits, vec![del("ac"), ins("bd"), eq("ef")]);
    }

    #[test]
    fn test_merge_factors_prefix_and_suffix() {
        let mut edits = vec![del("a"), ins("abc"), del("dc")];
        cleanup_merge(&mut edits);
        assert_eq!(edits, vec![eq("a"), del("d"), ins("b"), eq("c")]);
    }

    #[test]
    fn test_merge_slides_edits() {
        let mut edits = vec![eq("a"), ins("ba"), eq("c")];
        cleanup_merge(&mut edits);
        assert_eq!(edits, vec![ins("ab"), eq("ac")]);

        let mut edits = vec![eq("c"), ins("ab"), eq("a")];
        cleanup_merge(&mut edits);
        assert_eq!(edits, vec![eq("ca"), ins("ba")]);
    }

    #[test]
    fn test_semantic_keeps_meaningful_equalities() {
        let mut edits = vec![del("ab"), ins("cd"), eq("12"), del("e")];
        cleanup_semantic(&mut edits);
        assert_eq!(edits, vec![del("ab"), ins("cd"), eq("12"), del("e")]);
    }

    #[test]
    fn test_semantic_eliminates_short_equality() {
        let mut edits = vec![del("a"), eq("b"), del("c")];
        cleanup_semantic(&mut edits);
        assert_eq!(edits, vec![del("abc"), ins("b")]);
    }

    #[test]
    fn test_semantic_extracts_overlaps() {
        let mut edits = vec![del("abcxxx"), ins("xxxdef")];
        cleanup_semantic(&mut edits);
        assert_eq!(edits, vec![del("abc"), eq("xxx"), ins("def")]);

        let mut edits = vec![del("xxxabc"), ins("defxxx")];
        cleanup_semantic(&mut edits);
        assert_eq!(edits, vec![ins("def"), eq("xxx"), del("abc")]);
    }

    #[test]
    fn test_lossless_aligns_to_word_boundary() {
        let mut edits = vec![eq("The c"), ins("ow and the c"), eq("at.")];
        cleanup_semantic_lossless(&mut edits);
        assert_eq!(edits, vec![eq("The "), ins("cow and the "), eq("cat.")]);
    }

    #[test]
    fn test_lossless_prefers_line_breaks() {
        let mut edits = vec![eq("AAA\r\n\r\nBBB"), ins("\r\nDDD\r\n\r\nBBB"), eq("\r\nEEE")];
        cleanup_semantic_lossless(&mut edits);
        assert_eq!(
            edits,
            vec![eq("AAA\r\n\r\n"), ins("BBB\r\nDDD\r\n\r\n"), eq("BBB\r\nEEE")]
        );
    }

    #[test]
    fn test_compact_drops_empty_edits() {
        let edits = vec![del("a"), eq(""), del("b"), ins("")];
        assert_eq!(compact(edits), vec![del("ab")]);
    }
}
