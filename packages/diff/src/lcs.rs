//! Token-level longest common subsequence.

use crate::ops::{DiffKind, DiffOp};
use tracing::debug;

/// Largest LCS table built before a hunk is reported as one delete and one
/// insert (about 32 MiB of cells).
pub const MAX_TABLE_CELLS: usize = 1 << 22;

/// Edit script between two token sequences
///
/// The common prefix and suffix are peeled off before the quadratic table
/// is built. On ties the backtrack prefers deleting, so removed tokens come
/// out ahead of the tokens that replace them.
pub fn edits<'a>(src: &[&'a str], dst: &[&'a str]) -> Vec<(DiffKind, &'a str)> {
    edits_within(src, dst, MAX_TABLE_CELLS)
}

/// [`edits`] with an explicit bound on the table size
pub fn edits_within<'a>(src: &[&'a str], dst: &[&'a str], max_cells: usize) -> Vec<(DiffKind, &'a str)> {
    let prefix = src.iter().zip(dst).take_while(|(a, b)| a == b).count();
    let suffix = src[prefix..]
        .iter()
        .rev()
        .zip(dst[prefix..].iter().rev())
        .take_while(|(a, b)| a == b)
        .count();

    let a = &src[prefix..src.len() - suffix];
    let b = &dst[prefix..dst.len() - suffix];

    let mut out = Vec::with_capacity(src.len() + dst.len());
    out.extend(src[..prefix].iter().map(|t| (DiffKind::Equal, *t)));
    out.extend(middle(a, b, max_cells));
    out.extend(src[src.len() - suffix..].iter().map(|t| (DiffKind::Equal, *t)));
    out
}

fn middle<'a>(a: &[&'a str], b: &[&'a str], max_cells: usize) -> Vec<(DiffKind, &'a str)> {
    let n = a.len();
    let m = b.len();

    if n == 0 || m == 0 || (n + 1).saturating_mul(m + 1) > max_cells {
        if n > 0 && m > 0 {
            debug!(src_tokens = n, dst_tokens = m, "Hunk too large for LCS, diffing as one block");
        }
        let deletes = a.iter().map(|t| (DiffKind::Delete, *t));
        let inserts = b.iter().map(|t| (DiffKind::Insert, *t));
        return deletes.chain(inserts).collect();
    }

    let mut dp = vec![vec![0usize; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            dp[i][j] = if a[i] == b[j] {
                1 + dp[i + 1][j + 1]
            } else {
                dp[i + 1][j].max(dp[i][j + 1])
            };
        }
    }

    let mut out = Vec::with_capacity(n + m);
    let (mut i, mut j) = (0usize, 0usize);
    while i < n && j < m {
        if a[i] == b[j] {
            out.push((DiffKind::Equal, a[i]));
            i += 1;
            j += 1;
        } else if dp[i + 1][j] >= dp[i][j + 1] {
            out.push((DiffKind::Delete, a[i]));
            i += 1;
        } else {
            out.push((DiffKind::Insert, b[j]));
            j += 1;
        }
    }
    out.extend(a[i..].iter().map(|t| (DiffKind::Delete, *t)));
    out.extend(b[j..].iter().map(|t| (DiffKind::Insert, *t)));
    out
}

/// Merge an edit script into runs.
///
/// Between two equal runs all deleted text is emitted first, then all
/// inserted text, so every change hunk is at most one DELETE followed by
/// one INSERT.
pub fn coalesce<'a, I>(edits: I) -> Vec<DiffOp>
where
    I: IntoIterator<Item = (DiffKind, &'a str)>,
{
    let mut ops: Vec<DiffOp> = Vec::new();
    let mut deleted = String::new();
    let mut inserted = String::new();

    for (kind, text) in edits {
        match kind {
            DiffKind::Delete => deleted.push_str(text),
            DiffKind::Insert => inserted.push_str(text),
            DiffKind::Equal => {
                flush_hunk(&mut ops, &mut deleted, &mut inserted);
                match ops.last_mut() {
                    Some(last) if last.kind == DiffKind::Equal => last.text.push_str(text),
                    _ => ops.push(DiffOp::equal(text)),
                }
            }
        }
    }
    flush_hunk(&mut ops, &mut deleted, &mut inserted);

    ops.retain(|op| !op.text.is_empty());
    ops
}

fn flush_hunk(ops: &mut Vec<DiffOp>, deleted: &mut String, inserted: &mut String) {
    if !deleted.is_empty() {
        ops.push(DiffOp::delete(std::mem::take(deleted)));
    }
    if !inserted.is_empty() {
        ops.push(DiffOp::insert(std::mem::take(inserted)));
    }
}
