use proptest::prelude::*;
use redline_diff::{diff, DiffKind, DiffOp};

fn report_text() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop_oneof![
            Just("concrete"),
            Just("was"),
            Just("were"),
            Just("poured"),
            Just("the slab"),
            Just(" "),
            Just("\n"),
            Just("  "),
            Just("é"),
        ],
        0..24,
    )
    .prop_map(|parts| parts.concat())
}

proptest! {
    #[test]
    fn test_self_diff_is_all_equal(a in report_text()) {
        let result = diff(&a, &a);
        prop_assert!(result.ops.iter().all(|op| op.kind == DiffKind::Equal));
        prop_assert!(result.is_unchanged());
    }

    #[test]
    fn test_reconstructs_both_sides(a in report_text(), b in report_text()) {
        let result = diff(&a, &b);
        prop_assert_eq!(result.original(), a.clone());
        prop_assert_eq!(result.suggested(), b.clone());
    }

    #[test]
    fn test_flattened_reconstructs_both_sides(a in report_text(), b in report_text()) {
        let flat = diff(&a, &b).flattened();
        let side = |skip: DiffKind| -> String {
            flat.iter().filter(|op| op.kind != skip).map(|op| op.text.as_str()).collect()
        };
        prop_assert_eq!(side(DiffKind::Insert), a);
        prop_assert_eq!(side(DiffKind::Delete), b);
    }

    #[test]
    fn test_words_only_on_delete_before_insert(a in report_text(), b in report_text()) {
        let result = diff(&a, &b);
        for (i, op) in result.ops.iter().enumerate() {
            if op.words.is_some() {
                prop_assert_eq!(op.kind, DiffKind::Delete);
                prop_assert_eq!(result.ops[i + 1].kind, DiffKind::Insert);
            }
        }
    }
}

#[test]
fn test_grammar_fix_is_single_modify_pair() {
    let result = diff(
        "25 cubic yards of concrete was poured",
        "25 cubic yards of concrete were poured",
    );

    assert_eq!(result.ops.len(), 2);
    assert_eq!(result.modify_pairs(), 1);

    let words = result.ops[0].words.as_ref().unwrap();
    assert!(words.contains(&DiffOp::delete("was")));
    assert!(words.contains(&DiffOp::insert("were")));

    let stats = result.stats();
    assert_eq!((stats.added, stats.removed), (1, 1));
}

#[test]
fn test_deleting_everything_is_one_block() {
    let result = diff("foundation appears sound", "");

    assert_eq!(result.ops, vec![DiffOp::delete("foundation appears sound")]);
    assert_eq!(result.stats().removed, 3);
    assert_eq!(result.stats().added, 0);
}

#[test]
fn test_added_paragraph_is_unpaired_insert() {
    let original = "Site was dry.\n";
    let suggested = "Site was dry.\nNo standing water was observed.\n";
    let result = diff(original, suggested);

    assert_eq!(result.modify_pairs(), 0);
    assert_eq!(result.ops.last().unwrap().kind, DiffKind::Insert);
    assert_eq!(result.stats().added, 5);
}

#[test]
fn test_multiline_rewrite_keeps_untouched_lines_equal() {
    let original = "### Foundation\nPoured on site.\n- No cracking observed\n";
    let suggested = "### Foundation\nPoured on site.\n- Minor hairline cracking observed\n";
    let result = diff(original, suggested);

    assert_eq!(result.ops[0], DiffOp::equal("### Foundation\nPoured on site.\n"));
    assert_eq!(result.modify_pairs(), 1);
}
