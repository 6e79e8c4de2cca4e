use crate::lcs;
use crate::ops::{DiffKind, DiffOp, DiffResult};

/// Compare two texts line by line.
///
/// Every DELETE run immediately followed by an INSERT run is diffed again
/// at word granularity and the result is attached to the DELETE.
pub fn diff(original: &str, suggested: &str) -> DiffResult {
    let src: Vec<&str> = original.split_inclusive('\n').collect();
    let dst: Vec<&str> = suggested.split_inclusive('\n').collect();

    let mut ops = lcs::coalesce(lcs::edits(&src, &dst));

    for i in 0..ops.len().saturating_sub(1) {
        if ops[i].kind == DiffKind::Delete && ops[i + 1].kind == DiffKind::Insert {
            let words = diff_words(&ops[i].text, &ops[i + 1].text);
            ops[i].words = Some(words);
        }
    }

    DiffResult { ops }
}

/// Word-granularity diff of a single modify pair
pub fn diff_words(original: &str, suggested: &str) -> Vec<DiffOp> {
    let src = tokenize(original);
    let dst = tokenize(suggested);

    absorb_short_equalities(lcs::coalesce(lcs::edits(&src, &dst)))
}

/// Split into alternating runs of whitespace and non-whitespace.
pub fn tokenize(text: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut start = 0;
    let mut in_space: Option<bool> = None;

    for (idx, ch) in text.char_indices() {
        let space = ch.is_whitespace();
        if in_space.is_some_and(|prev| prev != space) {
            tokens.push(&text[start..idx]);
            start = idx;
        }
        in_space = Some(space);
    }
    if start < text.len() {
        tokens.push(&text[start..]);
    }

    tokens
}

/// Fold equal runs of at most one word that sit between two change hunks
/// into both sides of the surrounding change.
///
/// `the quick brown` -> `a slow brown` reads as one replacement of
/// `the quick` instead of two one-word flickers around a shared space.
fn absorb_short_equalities(ops: Vec<DiffOp>) -> Vec<DiffOp> {
    let last = ops.len().saturating_sub(1);
    let mut expanded: Vec<(DiffKind, &str)> = Vec::with_capacity(ops.len() + 2);

    for (i, op) in ops.iter().enumerate() {
        let bridged = op.kind == DiffKind::Equal
            && i > 0
            && i < last
            && ops[i - 1].kind != DiffKind::Equal
            && ops[i + 1].kind != DiffKind::Equal
            && op.text.split_whitespace().count() <= 1;

        if bridged {
            expanded.push((DiffKind::Delete, &op.text));
            expanded.push((DiffKind::Insert, &op.text));
        } else {
            expanded.push((op.kind, &op.text));
        }
    }

    lcs::coalesce(expanded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_alternates_runs() {
        assert_eq!(
            tokenize("  two words\n"),
            vec!["  ", "two", " ", "words", "\n"]
        );
        assert!(tokenize("").is_empty());
    }

    #[test]
    fn test_identical_text_is_single_equal() {
        let result = diff("line one\nline two\n", "line one\nline two\n");

        assert_eq!(result.ops, vec![DiffOp::equal("line one\nline two\n")]);
    }

    #[test]
    fn test_changed_line_becomes_modify_pair() {
        let result = diff("a\nold line\nc\n", "a\nnew line\nc\n");

        assert_eq!(result.ops.len(), 4);
        assert_eq!(result.ops[1].kind, DiffKind::Delete);
        assert_eq!(result.ops[2].kind, DiffKind::Insert);

        let words = result.ops[1].words.as_ref().unwrap();
        assert_eq!(
            words,
            &vec![
                DiffOp::delete("old"),
                DiffOp::insert("new"),
                DiffOp::equal(" line\n"),
            ]
        );
    }

    #[test]
    fn test_unpaired_insert_stays_block_level() {
        let result = diff("a\n", "a\nb\n");

        assert_eq!(result.ops, vec![DiffOp::equal("a\n"), DiffOp::insert("b\n")]);
    }

    #[test]
    fn test_single_space_between_changes_is_absorbed() {
        let words = diff_words("the quick brown", "a slow brown");

        assert_eq!(
            words,
            vec![
                DiffOp::delete("the quick"),
                DiffOp::insert("a slow"),
                DiffOp::equal(" brown"),
            ]
        );
    }

    #[test]
    fn test_long_equal_run_is_kept() {
        let words = diff_words("one two three four", "uno two three cuatro");

        assert_eq!(words[1], DiffOp::insert("uno"));
        assert_eq!(words[2], DiffOp::equal(" two three "));
    }
}
