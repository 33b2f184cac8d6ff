//! Z intervals occupied by placed hazards, kept per lane.

/// Closed-open span `[start, end)` along world Z.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Interval {
    /// Near end.
    pub start: f32,
    /// Far end.
    pub end: f32,
}

impl Interval {
    /// Span between two values, in either order.
    #[must_use]
    pub fn new(a: f32, b: f32) -> Self {
        Self {
            start: a.min(b),
            end: a.max(b),
        }
    }

    /// Span of `length` centred on `center`.
    #[must_use]
    pub fn centered(center: f32, length: f32) -> Self {
        let half = length.abs() * 0.5;
        Self::new(center - half, center + half)
    }

    /// Length of the span.
    #[inline]
    #[must_use]
    pub fn len(&self) -> f32 {
        self.end - self.start
    }

    /// Midpoint.
    #[inline]
    #[must_use]
    pub fn center(&self) -> f32 {
        (self.start + self.end) * 0.5
    }

    /// Strict overlap: spans that only touch do not overlap.
    #[inline]
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Span grown by `margin` at both ends.
    #[must_use]
    pub fn expanded(&self, margin: f32) -> Self {
        Self::new(self.start - margin, self.end + margin)
    }
}

/// Sorted, pairwise non-overlapping spans of one lane.
#[derive(Clone, Debug, Default)]
pub struct LaneFootprints {
    spans: Vec<Interval>,
}

impl LaneFootprints {
    /// Does `span` overlap anything already recorded?
    #[must_use]
    pub fn overlaps_any(&self, span: &Interval) -> bool {
        // first recorded span that ends after `span` starts
        let i = self.spans.partition_point(|s| s.end <= span.start);
        self.spans.get(i).is_some_and(|s| s.overlaps(span))
    }

    /// Records a span, keeping the list sorted by start.
    pub fn insert(&mut self, span: Interval) {
        let i = self.spans.partition_point(|s| s.start < span.start);
        self.spans.insert(i, span);
    }

    /// Recorded spans.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[Interval] {
        &self.spans
    }

    /// Forgets every span (keeps capacity).
    pub fn clear(&mut self) {
        self.spans.clear();
    }

    /// Sorted and pairwise non-overlapping?
    #[must_use]
    pub fn is_sorted_disjoint(&self) -> bool {
        self.spans.windows(2).all(|w| w[0].end <= w[1].start)
    }
}
