use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DiffKind {
    Equal,
    Insert,
    Delete,
}

/// One run of text in a diff
///
/// `words` is only ever set on a DELETE that is immediately followed by an
/// INSERT. It holds the word-level diff between the two, and the pair is
/// then reviewed as a single modification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffOp {
    pub kind: DiffKind,
    pub text: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub words: Option<Vec<DiffOp>>,
}

impl DiffOp {
    pub fn new(kind: DiffKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
            words: None,
        }
    }

    pub fn equal(text: impl Into<String>) -> Self {
        Self::new(DiffKind::Equal, text)
    }

    pub fn insert(text: impl Into<String>) -> Self {
        Self::new(DiffKind::Insert, text)
    }

    pub fn delete(text: impl Into<String>) -> Self {
        Self::new(DiffKind::Delete, text)
    }

    pub fn is_modify(&self) -> bool {
        self.words.is_some()
    }
}

/// Line-level diff with word-level detail for modify pairs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffResult {
    pub ops: Vec<DiffOp>,
}

impl DiffResult {
    /// Operation sequence with every modify pair replaced by its word diff
    pub fn flattened(&self) -> Vec<DiffOp> {
        let mut flat = Vec::with_capacity(self.ops.len());
        let mut iter = self.ops.iter().peekable();

        while let Some(op) = iter.next() {
            match &op.words {
                Some(words) => {
                    flat.extend(words.iter().cloned());
                    // The paired insert is covered by the word diff
                    if matches!(iter.peek(), Some(next) if next.kind == DiffKind::Insert) {
                        iter.next();
                    }
                }
                None => flat.push(DiffOp::new(op.kind, op.text.clone())),
            }
        }

        flat
    }

    pub fn stats(&self) -> DiffStats {
        let mut stats = DiffStats::default();

        for op in self.flattened() {
            let words = op.text.split_whitespace().count();
            match op.kind {
                DiffKind::Insert => stats.added += words,
                DiffKind::Delete => stats.removed += words,
                DiffKind::Equal => {}
            }
        }

        stats
    }

    /// Concatenation of DELETE and EQUAL runs
    pub fn original(&self) -> String {
        self.collect(DiffKind::Delete)
    }

    /// Concatenation of INSERT and EQUAL runs
    pub fn suggested(&self) -> String {
        self.collect(DiffKind::Insert)
    }

    pub fn is_unchanged(&self) -> bool {
        self.ops.iter().all(|op| op.kind == DiffKind::Equal)
    }

    pub fn modify_pairs(&self) -> usize {
        self.ops.iter().filter(|op| op.is_modify()).count()
    }

    fn collect(&self, side: DiffKind) -> String {
        self.ops
            .iter()
            .filter(|op| op.kind == DiffKind::Equal || op.kind == side)
            .map(|op| op.text.as_str())
            .collect()
    }
}

/// Word counts over the flattened diff
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffStats {
    pub added: usize,
    pub removed: usize,
}

impl DiffStats {
    pub fn has_changes(&self) -> bool {
        self.added > 0 || self.removed > 0
    }

    pub fn change_summary(&self) -> String {
        if self.has_changes() {
            format!("+{} words, -{} words", self.added, self.removed)
        } else {
            "No significant changes detected.".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn modify_pair() -> DiffResult {
        let mut delete = DiffOp::delete("it was late");
        delete.words = Some(vec![
            DiffOp::equal("it "),
            DiffOp::delete("was"),
            DiffOp::insert("is"),
            DiffOp::equal(" late"),
        ]);

        DiffResult {
            ops: vec![DiffOp::equal("intro\n"), delete, DiffOp::insert("it is late")],
        }
    }

    #[test]
    fn test_flattened_replaces_modify_pair() {
        let flat = modify_pair().flattened();

        assert_eq!(flat.len(), 5);
        assert_eq!(flat[0], DiffOp::equal("intro\n"));
        assert_eq!(flat[2], DiffOp::delete("was"));
        assert_eq!(flat[3], DiffOp::insert("is"));
    }

    #[test]
    fn test_stats_count_flattened_words() {
        let stats = modify_pair().stats();

        assert_eq!(stats, DiffStats { added: 1, removed: 1 });
        assert_eq!(stats.change_summary(), "+1 words, -1 words");
    }

    #[test]
    fn test_change_summary_without_changes() {
        let stats = DiffResult {
            ops: vec![DiffOp::equal("same")],
        }
        .stats();

        assert!(!stats.has_changes());
        assert_eq!(stats.change_summary(), "No significant changes detected.");
    }

    #[test]
    fn test_reconstruction_uses_block_level_ops() {
        let result = modify_pair();

        assert_eq!(result.original(), "intro\nit was late");
        assert_eq!(result.suggested(), "intro\nit is late");
        assert_eq!(result.modify_pairs(), 1);
    }

    #[test]
    fn test_serialized_kind_is_uppercase() {
        let json = serde_json::to_value(DiffOp::insert("x")).unwrap();

        assert_eq!(json["kind"], "INSERT");
        assert!(json.get("words").is_none());
    }
}
