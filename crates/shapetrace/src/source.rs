//! Source references attached to IR nodes, constraints, and log entries.

use std::fmt;

/// Identifier of a source file registered with the host.
///
/// The analyzer never opens files itself; the parser collaborator assigns
/// file ids and the reporting layer maps them back to paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct FileId(pub u32);

/// A character range inside one source file.
///
/// `start` and `end` are char offsets, end-exclusive. Ranges are carried by
/// IR nodes and flow into constraints and diagnostics so a failed
/// precondition can be pinned to the call that introduced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct SourceRange {
    pub file: FileId,
    pub start: u32,
    pub end: u32,
}

impl SourceRange {
    #[must_use]
    pub fn new(file: FileId, start: u32, end: u32) -> Self {
        Self { file, start, end }
    }

    /// Widens `self` to cover `other` as well. Both ranges must belong to the
    /// same file; if they do not, `self` is returned unchanged.
    #[must_use]
    pub fn cover(self, other: Self) -> Self {
        if self.file != other.file {
            return self;
        }
        Self {
            file: self.file,
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

impl fmt::Display for SourceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "file {}:{}..{}", self.file.0, self.start, self.end)
    }
}
