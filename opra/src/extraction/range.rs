//! Page range selection.

use std::fmt;
use std::ops::RangeInclusive;

use serde::Serialize;

/// An inclusive, 1-indexed range of pages within a document.
///
/// Built through [`PageRange::new`], which clamps instead of rejecting: both
/// bounds are pulled into `[1, total]` and `end` is raised to `start` if it
/// falls below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageRange {
    pub start: u32,
    pub end: u32,
    pub total: u32,
}

impl PageRange {
    /// Clamp a requested range into a document of `total` pages.
    pub fn new(start: i64, end: i64, total: u32) -> Self {
        let upper = i64::from(total.max(1));
        let start = start.clamp(1, upper);
        let end = end.clamp(start, upper);

        Self {
            start: start as u32,
            end: end as u32,
            total,
        }
    }

    /// Every page of a document.
    pub fn whole(total: u32) -> Self {
        Self::new(1, i64::from(total), total)
    }

    /// Whether the range satisfies `1 <= start <= end <= total`.
    pub fn is_valid(&self) -> bool {
        self.start >= 1 && self.start <= self.end && self.end <= self.total
    }

    /// Number of pages covered.
    pub fn len(&self) -> u32 {
        if self.end >= self.start {
            self.end - self.start + 1
        } else {
            0
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Page numbers in order.
    pub fn pages(&self) -> RangeInclusive<u32> {
        self.start..=self.end
    }
}

impl fmt::Display for PageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "page {} of {}", self.start, self.total)
        } else {
            write!(f, "pages {}-{} of {}", self.start, self.end, self.total)
        }
    }
}
