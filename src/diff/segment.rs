use serde::Serialize;

/// Kind of edit a segment represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Operation {
    Insert,
    Delete,
    Equal,
}

/// One contiguous span of a diff
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffSegment {
    pub operation: Operation,
    pub text: String,
}

impl DiffSegment {
    pub fn new(operation: Operation, text: impl Into<String>) -> Self {
        Self {
            operation,
            text: text.into(),
        }
    }

    pub fn insert(text: impl Into<String>) -> Self {
        Self::new(Operation::Insert, text)
    }

    pub fn delete(text: impl Into<String>) -> Self {
        Self::new(Operation::Delete, text)
    }

    pub fn equal(text: impl Into<String>) -> Self {
        Self::new(Operation::Equal, text)
    }

    pub fn is_delete(&self) -> bool {
        self.operation == Operation::Delete
    }
}

/// Rebuild the "before" text from a segment sequence
pub fn source_text(segments: &[DiffSegment]) -> String {
    segments
        .iter()
        .filter(|s| s.operation != Operation::Insert)
        .map(|s| s.text.as_str())
        .collect()
}

/// Rebuild the "after" text from a segment sequence
pub fn target_text(segments: &[DiffSegment]) -> String {
    segments
        .iter()
        .filter(|s| s.operation != Operation::Delete)
        .map(|s| s.text.as_str())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconstruct_both_sides() {
        let segments = vec![
            DiffSegment::equal("foo.bar"),
            DiffSegment::delete(" "),
            DiffSegment::insert("baz"),
        ];

        assert_eq!(source_text(&segments), "foo.bar ");
        assert_eq!(target_text(&segments), "foo.barbaz");
    }
}
