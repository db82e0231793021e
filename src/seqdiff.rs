//! Sequence diffing over token id slices.
//!
//! A Myers O(ND) bisection diff with the classic speedups: equality check,
//! common prefix and suffix trimming, containment of the shorter sequence in
//! the longer, and a half-match heuristic that splits the problem around a
//! shared subsequence at least half the longer input. The recursion of the
//! textbook algorithm is replaced by an explicit work stack so the depth is
//! bounded for adversarial inputs. The whole computation runs against a
//! wall-clock deadline: when it expires, whatever remains un-aligned is
//! emitted as one wholesale delete plus insert instead of failing.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffOp {
    Equal,
    Insert,
    Delete,
}

/// An edit run: the operation and its token count.
pub type Diff = (DiffOp, usize);

/// A matching block: positions in `a` and `b` and the shared length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    pub a: usize,
    pub b: usize,
    pub size: usize,
}

/// Return matching blocks of `a[a_start..a_end]` within `b`.
///
/// Trailing non-equal edits are trimmed; `a` positions in the returned
/// blocks are absolute (offset by `a_start`).
pub fn match_blocks(
    a: &[u16],
    b: &[u16],
    a_start: usize,
    a_end: usize,
    timeout: Duration,
) -> Vec<Block> {
    let differ = Differ::new(timeout);
    let mut diffs = differ.diff(&a[a_start..a_end], b);

    // drop trailing inserts and deletes
    while let Some(&(op, _)) = diffs.last() {
        if op == DiffOp::Equal {
            break;
        }
        diffs.pop();
    }

    let mut apos = a_start;
    let mut bpos = 0;
    let mut blocks = Vec::new();
    for (op, size) in diffs {
        if size == 0 {
            continue;
        }
        match op {
            DiffOp::Equal => {
                blocks.push(Block {
                    a: apos,
                    b: bpos,
                    size,
                });
                apos += size;
                bpos += size;
            }
            DiffOp::Insert => bpos += size,
            DiffOp::Delete => apos += size,
        }
    }
    blocks
}

/// Work items processed LIFO; pushing in reverse keeps output in order.
enum Task {
    Diff {
        a: std::ops::Range<usize>,
        b: std::ops::Range<usize>,
    },
    Emit(Diff),
}

pub struct Differ {
    timeout: Duration,
}

impl Differ {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Compute the edit script turning `a` into `b`, as (op, length) runs.
    pub fn diff(&self, a: &[u16], b: &[u16]) -> Vec<Diff> {
        let deadline = Instant::now() + self.timeout;
        let mut out: Vec<Diff> = Vec::new();
        let mut stack: Vec<Task> = vec![Task::Diff {
            a: 0..a.len(),
            b: 0..b.len(),
        }];

        while let Some(task) = stack.pop() {
            match task {
                Task::Emit(diff) => push_diff(&mut out, diff),
                Task::Diff { a: ar, b: br } => {
                    if Instant::now() > deadline {
                        // out of time: coarse-align the remainder
                        if !ar.is_empty() {
                            push_diff(&mut out, (DiffOp::Delete, ar.len()));
                        }
                        if !br.is_empty() {
                            push_diff(&mut out, (DiffOp::Insert, br.len()));
                        }
                        continue;
                    }
                    self.step(a, b, ar, br, &mut stack, &mut out, deadline);
                }
            }
        }
        out
    }

    fn step(
        &self,
        a: &[u16],
        b: &[u16],
        ar: std::ops::Range<usize>,
        br: std::ops::Range<usize>,
        stack: &mut Vec<Task>,
        out: &mut Vec<Diff>,
        deadline: Instant,
    ) {
        let sa = &a[ar.clone()];
        let sb = &b[br.clone()];

        if sa == sb {
            if !sa.is_empty() {
                push_diff(out, (DiffOp::Equal, sa.len()));
            }
            return;
        }
        if sa.is_empty() {
            push_diff(out, (DiffOp::Insert, sb.len()));
            return;
        }
        if sb.is_empty() {
            push_diff(out, (DiffOp::Delete, sa.len()));
            return;
        }

        // trim the common prefix and suffix before the expensive part
        let prefix = common_prefix(sa, sb);
        let suffix = common_suffix(&sa[prefix..], &sb[prefix..]);
        if prefix > 0 || suffix > 0 {
            let core_a = ar.start + prefix..ar.end - suffix;
            let core_b = br.start + prefix..br.end - suffix;
            if suffix > 0 {
                stack.push(Task::Emit((DiffOp::Equal, suffix)));
            }
            stack.push(Task::Diff {
                a: core_a,
                b: core_b,
            });
            if prefix > 0 {
                push_diff(out, (DiffOp::Equal, prefix));
            }
            return;
        }

        // one sequence contained in the other
        let (long_is_a, long, short) = if sa.len() > sb.len() {
            (true, sa, sb)
        } else {
            (false, sb, sa)
        };
        if let Some(at) = find_subslice(long, short) {
            let (head, tail) = (at, long.len() - at - short.len());
            let surround = if long_is_a {
                DiffOp::Delete
            } else {
                DiffOp::Insert
            };
            if tail > 0 {
                stack.push(Task::Emit((surround, tail)));
            }
            stack.push(Task::Emit((DiffOp::Equal, short.len())));
            if head > 0 {
                stack.push(Task::Emit((surround, head)));
            }
            return;
        }
        if short.len() == 1 {
            // after the containment check the single token cannot match
            push_diff(out, (DiffOp::Delete, sa.len()));
            push_diff(out, (DiffOp::Insert, sb.len()));
            return;
        }

        if let Some(half) = half_match(sa, sb) {
            // split around the common middle and diff both halves
            stack.push(Task::Diff {
                a: ar.start + half.a_tail_start..ar.end,
                b: br.start + half.b_tail_start..br.end,
            });
            stack.push(Task::Emit((DiffOp::Equal, half.mid_len)));
            stack.push(Task::Diff {
                a: ar.start..ar.start + half.a_head_len,
                b: br.start..br.start + half.b_head_len,
            });
            return;
        }

        self.bisect(sa, sb, ar, br, stack, out, deadline);
    }

    /// Find the middle snake and split, or give up into delete+insert when
    /// the deadline passes or nothing is shared.
    #[allow(clippy::too_many_arguments)]
    fn bisect(
        &self,
        sa: &[u16],
        sb: &[u16],
        ar: std::ops::Range<usize>,
        br: std::ops::Range<usize>,
        stack: &mut Vec<Task>,
        out: &mut Vec<Diff>,
        deadline: Instant,
    ) {
        let len_a = sa.len() as isize;
        let len_b = sb.len() as isize;
        let max_d = (len_a + len_b + 1) / 2;
        let v_offset = max_d;
        let v_length = 2 * max_d;
        let mut v1 = vec![-1isize; v_length as usize];
        let mut v2 = vec![-1isize; v_length as usize];
        v1[(v_offset + 1) as usize] = 0;
        v2[(v_offset + 1) as usize] = 0;
        let delta = len_a - len_b;
        let front = delta % 2 != 0;
        let (mut k1start, mut k1end, mut k2start, mut k2end) = (0isize, 0isize, 0isize, 0isize);

        for d in 0..max_d {
            if Instant::now() > deadline {
                break;
            }

            // forward path
            let mut k1 = -d + k1start;
            while k1 <= d - k1end {
                let k1_offset = (v_offset + k1) as usize;
                let mut x1 = if k1 == -d || (k1 != d && v1[k1_offset - 1] < v1[k1_offset + 1]) {
                    v1[k1_offset + 1]
                } else {
                    v1[k1_offset - 1] + 1
                };
                let mut y1 = x1 - k1;
                while x1 < len_a && y1 < len_b && sa[x1 as usize] == sb[y1 as usize] {
                    x1 += 1;
                    y1 += 1;
                }
                v1[k1_offset] = x1;
                if x1 > len_a {
                    k1end += 2;
                } else if y1 > len_b {
                    k1start += 2;
                } else if front {
                    let k2_offset = v_offset + delta - k1;
                    if k2_offset >= 0 && k2_offset < v_length && v2[k2_offset as usize] != -1 {
                        let x2 = len_a - v2[k2_offset as usize];
                        if x1 >= x2 {
                            self.split(ar, br, x1 as usize, y1 as usize, stack);
                            return;
                        }
                    }
                }
                k1 += 2;
            }

            // reverse path
            let mut k2 = -d + k2start;
            while k2 <= d - k2end {
                let k2_offset = (v_offset + k2) as usize;
                let mut x2 = if k2 == -d || (k2 != d && v2[k2_offset - 1] < v2[k2_offset + 1]) {
                    v2[k2_offset + 1]
                } else {
                    v2[k2_offset - 1] + 1
                };
                let mut y2 = x2 - k2;
                while x2 < len_a
                    && y2 < len_b
                    && sa[(len_a - x2 - 1) as usize] == sb[(len_b - y2 - 1) as usize]
                {
                    x2 += 1;
                    y2 += 1;
                }
                v2[k2_offset] = x2;
                if x2 > len_a {
                    k2end += 2;
                } else if y2 > len_b {
                    k2start += 2;
                } else if !front {
                    let k1_offset = v_offset + delta - k2;
                    if k1_offset >= 0 && k1_offset < v_length && v1[k1_offset as usize] != -1 {
                        let x1 = v1[k1_offset as usize];
                        let y1 = v_offset + x1 - k1_offset;
                        let x2 = len_a - x2;
                        if x1 >= x2 {
                            self.split(ar, br, x1 as usize, y1 as usize, stack);
                            return;
                        }
                    }
                }
                k2 += 2;
            }
        }

        // deadline hit, or the sequences share nothing at all
        push_diff(out, (DiffOp::Delete, sa.len()));
        push_diff(out, (DiffOp::Insert, sb.len()));
    }

    fn split(
        &self,
        ar: std::ops::Range<usize>,
        br: std::ops::Range<usize>,
        x: usize,
        y: usize,
        stack: &mut Vec<Task>,
    ) {
        stack.push(Task::Diff {
            a: ar.start + x..ar.end,
            b: br.start + y..br.end,
        });
        stack.push(Task::Diff {
            a: ar.start..ar.start + x,
            b: br.start..br.start + y,
        });
    }
}

/// Append a diff run, coalescing with the previous run of the same op.
fn push_diff(out: &mut Vec<Diff>, diff: Diff) {
    if diff.1 == 0 {
        return;
    }
    if let Some(last) = out.last_mut() {
        if last.0 == diff.0 {
            last.1 += diff.1;
            return;
        }
    }
    out.push(diff);
}

fn common_prefix(a: &[u16], b: &[u16]) -> usize {
    a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count()
}

fn common_suffix(a: &[u16], b: &[u16]) -> usize {
    a.iter()
        .rev()
        .zip(b.iter().rev())
        .take_while(|(x, y)| x == y)
        .count()
}

fn find_subslice(haystack: &[u16], needle: &[u16]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

struct HalfMatch {
    a_head_len: usize,
    a_tail_start: usize,
    b_head_len: usize,
    b_tail_start: usize,
    mid_len: usize,
}

/// Do the two sequences share a subsequence at least half the longer one?
/// A positive answer splits the diff into two much smaller problems at the
/// cost of a possibly non-minimal script.
fn half_match(a: &[u16], b: &[u16]) -> Option<HalfMatch> {
    let a_is_long = a.len() > b.len();
    let (long, short) = if a_is_long { (a, b) } else { (b, a) };
    if long.len() < 4 || short.len() * 2 < long.len() {
        return None;
    }

    let hm1 = half_match_at(long, short, (long.len() + 3) / 4);
    let hm2 = half_match_at(long, short, (long.len() + 1) / 2);
    let hm = match (hm1, hm2) {
        (None, None) => return None,
        (Some(hm), None) | (None, Some(hm)) => hm,
        (Some(hm1), Some(hm2)) => {
            if hm1.4 > hm2.4 {
                hm1
            } else {
                hm2
            }
        }
    };

    let (long_head, long_tail, short_head, short_tail, mid_len) = hm;
    if a_is_long {
        Some(HalfMatch {
            a_head_len: long_head,
            a_tail_start: long_tail,
            b_head_len: short_head,
            b_tail_start: short_tail,
            mid_len,
        })
    } else {
        Some(HalfMatch {
            a_head_len: short_head,
            a_tail_start: short_tail,
            b_head_len: long_head,
            b_tail_start: long_tail,
            mid_len,
        })
    }
}

/// Check for a half match seeded at the quarter-length window starting at
/// `i` in the longer sequence. Returns (long head len, long tail start,
/// short head len, short tail start, common length).
fn half_match_at(
    long: &[u16],
    short: &[u16],
    i: usize,
) -> Option<(usize, usize, usize, usize, usize)> {
    let seed_len = long.len() / 4;
    if i + seed_len > long.len() {
        return None;
    }
    let seed = &long[i..i + seed_len];

    let mut best: Option<(usize, usize, usize, usize, usize)> = None;
    let mut best_common = 0usize;

    let mut search_from = 0usize;
    while let Some(offset) = find_subslice(&short[search_from..], seed) {
        let j = search_from + offset;
        let prefix_len = common_prefix(&long[i..], &short[j..]);
        let suffix_len = common_suffix(&long[..i], &short[..j]);
        if best_common < suffix_len + prefix_len {
            best_common = suffix_len + prefix_len;
            best = Some((
                i - suffix_len,
                i + prefix_len,
                j - suffix_len,
                j + prefix_len,
                best_common,
            ));
        }
        search_from = j + 1;
    }

    if best_common * 2 >= long.len() { best } else { None }
}
