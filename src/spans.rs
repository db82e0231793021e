//! Span - sparse sets of integer token positions.
//!
//! A Span is a set of non-negative integers (token positions) with interval
//! arithmetic on top: overlap, containment, resemblance, touching, distance,
//! merging with a bridging tolerance. Spans are the bookkeeping structure for
//! every alignment step: matched query positions, matched rule positions and
//! high-token subsets are all Spans.

use std::hash::{Hash, Hasher};

use bit_set::BitSet;

/// A sparse set of non-negative integer positions.
///
/// A Span is equivalent to a sparse closed interval: `start` is the smallest
/// member, `end` the largest, and any integer in between may or may not be a
/// member. Spans are not modified once created; all operations return new
/// values. Equality and hashing are by member set, not by construction: two
/// Spans holding the same integers are equal however they were built.
#[derive(Debug, Clone, Eq)]
pub struct Span {
    set: BitSet,
}

impl Span {
    /// Create an empty span.
    pub fn new() -> Self {
        Self { set: BitSet::new() }
    }

    /// Create a span holding every integer in the closed range `start..=end`.
    pub fn from_range(start: usize, end: usize) -> Self {
        let mut set = BitSet::with_capacity(end + 1);
        for pos in start..=end {
            set.insert(pos);
        }
        Self { set }
    }

    /// Create a span holding a single position.
    pub fn from_pos(pos: usize) -> Self {
        let mut set = BitSet::with_capacity(pos + 1);
        set.insert(pos);
        Self { set }
    }

    /// Create a span from arbitrary positions. Duplicates collapse and order
    /// is irrelevant.
    pub fn from_positions(positions: impl IntoIterator<Item = usize>) -> Self {
        let mut set = BitSet::new();
        for pos in positions {
            set.insert(pos);
        }
        Self { set }
    }

    /// Number of member positions.
    pub fn len(&self) -> usize {
        self.set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    /// Iterate members in increasing order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.set.iter()
    }

    /// Smallest member. Panics on an empty span, like indexing an empty slice.
    pub fn start(&self) -> usize {
        self.set.iter().next().expect("empty span has no start")
    }

    /// Largest member. Panics on an empty span.
    pub fn end(&self) -> usize {
        self.set.iter().last().expect("empty span has no end")
    }

    pub fn contains_pos(&self, pos: usize) -> bool {
        self.set.contains(pos)
    }

    /// True if every member of `other` is a member of self.
    pub fn contains_span(&self, other: &Span) -> bool {
        other.set.is_subset(&self.set)
    }

    pub fn is_subset(&self, other: &Span) -> bool {
        self.set.is_subset(&other.set)
    }

    /// Union of self and other as a new span.
    pub fn union(&self, other: &Span) -> Span {
        let mut set = self.set.clone();
        set.union_with(&other.set);
        Span { set }
    }

    /// Members of self not in other, as a new span.
    pub fn difference(&self, other: &Span) -> Span {
        let mut set = self.set.clone();
        set.difference_with(&other.set);
        Span { set }
    }

    /// Count of members shared with other.
    pub fn overlap(&self, other: &Span) -> usize {
        self.set.intersection(&other.set).count()
    }

    /// The length of the contiguous range implied by the endpoints,
    /// `end - start + 1`, independent of how sparse the set is. Zero for an
    /// empty span.
    pub fn magnitude(&self) -> usize {
        if self.is_empty() {
            return 0;
        }
        self.end() - self.start() + 1
    }

    /// Ratio of member count to magnitude: 1.0 for a fully contiguous span,
    /// lower for sparse ones, 0.0 for an empty span.
    pub fn density(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        self.len() as f64 / self.magnitude() as f64
    }

    /// Jaccard-like resemblance: `overlap / |union|`, between 0 for disjoint
    /// spans and 1 for equal spans.
    pub fn resemblance(&self, other: &Span) -> f64 {
        if self.set.is_disjoint(&other.set) {
            return 0.0;
        }
        if self.set == other.set {
            return 1.0;
        }
        let union_len = self.set.union(&other.set).count();
        self.overlap(other) as f64 / union_len as f64
    }

    /// How much of `other` is contained in self: `overlap / |other|`,
    /// 1.0 iff other is a subset of self.
    pub fn containment(&self, other: &Span) -> f64 {
        if self.set.is_disjoint(&other.set) {
            return 0.0;
        }
        if self.set == other.set {
            return 1.0;
        }
        self.overlap(other) as f64 / other.len() as f64
    }

    /// True if this span's bounding range covers other's bounding range.
    /// Unlike containment this says nothing about membership: a span can
    /// surround another while sharing no positions with it.
    pub fn surround(&self, other: &Span) -> bool {
        self.start() <= other.start() && self.end() >= other.end()
    }

    pub fn is_before(&self, other: &Span) -> bool {
        self.end() < other.start()
    }

    pub fn is_after(&self, other: &Span) -> bool {
        self.start() > other.end()
    }

    /// True if the bounding ranges are adjacent with no gap and no overlap.
    pub fn touch(&self, other: &Span) -> bool {
        self.start() == other.end() + 1 || self.end() + 1 == other.start()
    }

    /// Absolute distance between the nearer edges of the two spans.
    /// Overlapping and touching spans have a zero distance.
    pub fn distance_to(&self, other: &Span) -> usize {
        if self.overlap(other) > 0 || self.touch(other) {
            return 0;
        }
        if self.is_before(other) {
            other.start() - self.end()
        } else {
            self.start() - other.end()
        }
    }

    /// Decompose into one span per maximal run of contiguous members.
    pub fn subspans(&self) -> Vec<Span> {
        Span::from_ints(self.iter())
    }

    /// The complement of this span within its own bounding range: every
    /// position between start and end that is not a member.
    pub fn gaps(&self) -> Span {
        if self.is_empty() {
            return Span::new();
        }
        Span::from_positions((self.start()..=self.end()).filter(|&p| !self.contains_pos(p)))
    }

    /// Sort spans by (start, -len): on equal starts the longer span first.
    pub fn sort(spans: &mut [Span]) {
        spans.sort_by(|a, b| {
            a.start()
                .cmp(&b.start())
                .then_with(|| b.len().cmp(&a.len()))
        });
    }

    /// Fuse spans whose distance is at most `bridge`, returning the maximally
    /// merged list sorted by start. A singleton input is returned unchanged.
    pub fn merge(spans: &[Span], bridge: usize) -> Vec<Span> {
        let mut sorted: Vec<Span> = spans.iter().filter(|s| !s.is_empty()).cloned().collect();
        if sorted.len() <= 1 {
            return sorted;
        }
        Span::sort(&mut sorted);

        let mut merged: Vec<Span> = Vec::with_capacity(sorted.len());
        let mut current = sorted[0].clone();
        for next in &sorted[1..] {
            if current.distance_to(next) <= bridge {
                current = current.union(next);
            } else {
                merged.push(current);
                current = next.clone();
            }
        }
        merged.push(current);
        merged
    }

    /// Build one Span per run of consecutive integers in `ints`.
    pub fn from_ints(ints: impl IntoIterator<Item = usize>) -> Vec<Span> {
        let mut sorted: Vec<usize> = ints.into_iter().collect();
        sorted.sort_unstable();
        sorted.dedup();

        let mut spans = Vec::new();
        let mut run: Vec<usize> = Vec::new();
        for pos in sorted {
            if let Some(&last) = run.last() {
                if pos != last + 1 {
                    spans.push(Span::from_positions(run.drain(..)));
                }
            }
            run.push(pos);
        }
        if !run.is_empty() {
            spans.push(Span::from_positions(run));
        }
        spans
    }
}

impl Default for Span {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Span {
    fn eq(&self, other: &Self) -> bool {
        self.set == other.set
    }
}

impl Hash for Span {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for pos in self.set.iter() {
            pos.hash(state);
        }
    }
}

impl FromIterator<usize> for Span {
    fn from_iter<T: IntoIterator<Item = usize>>(iter: T) -> Self {
        Span::from_positions(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_from_range() {
        let span = Span::from_range(1, 3);
        assert_eq!(span.start(), 1);
        assert_eq!(span.end(), 3);
        assert_eq!(span.len(), 3);
    }

    #[test]
    fn test_span_from_positions_unordered_with_duplicates() {
        let span = Span::from_positions(vec![6, 5, 1, 2, 2]);
        assert_eq!(span.start(), 1);
        assert_eq!(span.end(), 6);
        assert_eq!(span.len(), 4);
    }

    #[test]
    fn test_span_equality_by_members() {
        let a = Span::from_range(5, 12);
        let b = Span::from_positions(vec![5, 6, 7, 8, 9, 10, 11, 12]);
        assert_eq!(a, b);

        use std::collections::hash_map::DefaultHasher;
        let mut ha = DefaultHasher::new();
        let mut hb = DefaultHasher::new();
        a.hash(&mut ha);
        b.hash(&mut hb);
        assert_eq!(ha.finish(), hb.finish());
    }

    #[test]
    fn test_span_contains() {
        let span = Span::from_positions(vec![4, 5, 6, 7, 8]);
        assert!(span.contains_pos(6));
        assert!(!span.contains_pos(2));

        let sparse = Span::from_positions(vec![4, 8]);
        assert!(sparse.contains_pos(8));
        assert!(!sparse.contains_pos(5));
        assert!(span.contains_span(&sparse));
        assert!(!sparse.contains_span(&span));
    }

    #[test]
    fn test_magnitude_and_density() {
        assert_eq!(Span::from_positions(vec![4, 8]).magnitude(), 5);
        assert_eq!(Span::from_positions(vec![4, 8]).len(), 2);
        assert_eq!(Span::from_positions(vec![4, 5, 6, 14, 12, 128]).magnitude(), 125);
        assert_eq!(Span::from_pos(0).magnitude(), 1);
        assert_eq!(Span::new().magnitude(), 0);

        assert!((Span::from_positions(vec![4, 8]).density() - 0.4).abs() < 1e-9);
        assert!((Span::from_range(4, 8).density() - 1.0).abs() < 1e-9);
        assert_eq!(Span::new().density(), 0.0);
    }

    #[test]
    fn test_overlap() {
        assert_eq!(Span::from_range(1, 2).overlap(&Span::from_range(5, 6)), 0);
        assert_eq!(Span::from_range(5, 6).overlap(&Span::from_range(5, 6)), 2);
        assert_eq!(Span::from_range(4, 7).overlap(&Span::from_range(5, 6)), 2);
        assert_eq!(Span::from_range(4, 6).overlap(&Span::from_pos(6)), 1);
    }

    #[test]
    fn test_overlap_with_self_is_len() {
        let span = Span::from_positions(vec![1, 3, 7, 8]);
        assert_eq!(span.overlap(&span), span.len());
    }

    #[test]
    fn test_resemblance_is_symmetric() {
        let a = Span::from_range(4, 6);
        let b = Span::from_range(5, 7);
        assert!((a.resemblance(&b) - b.resemblance(&a)).abs() < 1e-9);
        assert!((a.resemblance(&b) - 0.5).abs() < 1e-9);
        assert_eq!(a.resemblance(&Span::from_range(10, 12)), 0.0);
        assert_eq!(a.resemblance(&a.clone()), 1.0);
    }

    #[test]
    fn test_containment() {
        let outer = Span::from_range(1, 10);
        let inner = Span::from_range(3, 5);
        assert!((outer.containment(&inner) - 1.0).abs() < 1e-9);
        assert!(inner.containment(&outer) < 1.0);
        assert_eq!(outer.containment(&Span::from_range(20, 22)), 0.0);
    }

    #[test]
    fn test_surround() {
        assert!(Span::from_positions(vec![4, 8]).surround(&Span::from_positions(vec![4, 8])));
        assert!(Span::from_positions(vec![3, 9]).surround(&Span::from_positions(vec![4, 8])));
        assert!(!Span::from_positions(vec![5, 8]).surround(&Span::from_positions(vec![4, 8])));
        assert!(!Span::from_positions(vec![4, 7]).surround(&Span::from_positions(vec![4, 8])));
        // surround is about bounding ranges, not membership
        assert!(Span::from_positions(vec![4, 8]).surround(&Span::from_positions(vec![5, 6, 7])));
    }

    #[test]
    fn test_touch() {
        let span = Span::from_positions(vec![5, 7]);
        assert!(!span.touch(&Span::from_pos(5)));
        assert!(!span.touch(&Span::from_positions(vec![5, 8])));
        assert!(!span.touch(&Span::from_positions(vec![7, 8])));
        assert!(span.touch(&Span::from_positions(vec![8, 9])));
        assert!(Span::from_positions(vec![8, 9]).touch(&span));
    }

    #[test]
    fn test_distance_to() {
        let a = Span::from_range(8, 9);
        let b = Span::from_range(5, 7);
        assert_eq!(a.distance_to(&b), 0);
        assert_eq!(b.distance_to(&a), 0);
        assert_eq!(Span::from_range(5, 6).distance_to(&Span::from_range(8, 9)), 2);
        assert_eq!(Span::from_range(8, 9).distance_to(&Span::from_range(5, 6)), 2);
        assert_eq!(Span::from_range(5, 7).distance_to(&Span::from_range(10, 12)), 3);
        assert_eq!(Span::from_range(5, 7).distance_to(&Span::from_range(5, 7)), 0);
    }

    #[test]
    fn test_union_and_difference() {
        let a = Span::from_range(1, 3);
        let b = Span::from_range(3, 5);
        let union = a.union(&b);
        assert_eq!(union, Span::from_range(1, 5));

        let diff = union.difference(&b);
        assert_eq!(diff, Span::from_range(1, 2));
    }

    #[test]
    fn test_subspans() {
        let span = Span::from_positions(vec![1, 2, 3, 10, 11, 12]);
        let subs = span.subspans();
        assert_eq!(subs.len(), 2);
        assert_eq!(subs[0], Span::from_range(1, 3));
        assert_eq!(subs[1], Span::from_range(10, 12));
    }

    #[test]
    fn test_gaps() {
        let span = Span::from_positions(vec![1, 2, 5, 6, 9]);
        assert_eq!(span.gaps(), Span::from_positions(vec![3, 4, 7, 8]));
        assert!(Span::from_range(1, 5).gaps().is_empty());
        assert!(Span::new().gaps().is_empty());
    }

    #[test]
    fn test_from_ints() {
        let spans = Span::from_ints(vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]);
        assert_eq!(spans.len(), 1);

        let spans = Span::from_ints(vec![1, 2, 3, 5, 6, 7, 8, 9, 10, 11, 12]);
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0], Span::from_range(1, 3));
        assert_eq!(spans[1], Span::from_range(5, 12));

        let spans = Span::from_ints(vec![0, 2, 3, 5, 6, 7, 8, 9, 10, 11, 13]);
        assert_eq!(spans.len(), 4);
        assert_eq!(spans[0], Span::from_pos(0));
        assert_eq!(spans[3], Span::from_pos(13));
    }

    #[test]
    fn test_from_ints_union_covers_input() {
        let ints = vec![3, 1, 4, 1, 5, 9, 2, 6];
        let spans = Span::from_ints(ints.clone());
        assert!(spans.len() <= ints.len());
        let mut union = Span::new();
        for span in &spans {
            union = union.union(span);
        }
        assert_eq!(union, Span::from_positions(ints));
    }

    #[test]
    fn test_sort() {
        let mut spans = vec![
            Span::from_range(5, 10),
            Span::from_range(1, 2),
            Span::from_range(3, 5),
            Span::from_range(3, 6),
            Span::from_range(8, 10),
        ];
        Span::sort(&mut spans);
        assert_eq!(spans[0], Span::from_range(1, 2));
        // longer span first on equal starts
        assert_eq!(spans[1], Span::from_range(3, 6));
        assert_eq!(spans[2], Span::from_range(3, 5));
    }

    #[test]
    fn test_merge_singleton_is_noop() {
        let spans = vec![Span::from_range(1, 3)];
        let merged = Span::merge(&spans, 0);
        assert_eq!(merged, spans);
    }

    #[test]
    fn test_merge_fuses_touching() {
        let spans = vec![Span::from_range(1, 3), Span::from_range(4, 6)];
        let merged = Span::merge(&spans, 0);
        assert_eq!(merged, vec![Span::from_range(1, 6)]);
    }

    #[test]
    fn test_merge_with_bridge() {
        // distance from (1,3) to (6,8) is 3: bridged at 3, not at 2
        let spans = vec![
            Span::from_range(1, 3),
            Span::from_range(6, 8),
            Span::from_range(20, 22),
        ];
        let merged = Span::merge(&spans, 2);
        assert_eq!(merged.len(), 3);

        let merged = Span::merge(&spans, 3);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].start(), 1);
        assert_eq!(merged[0].end(), 8);
        assert_eq!(merged[1], Span::from_range(20, 22));
    }

    #[test]
    fn test_merge_keeps_distant_spans_apart() {
        let spans = vec![Span::from_range(1, 2), Span::from_range(10, 12)];
        let merged = Span::merge(&spans, 3);
        assert_eq!(merged.len(), 2);
    }
}
