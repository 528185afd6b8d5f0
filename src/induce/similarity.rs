//! Ratcliff/Obershelp "matching blocks" ratio.
//!
//! The longest common contiguous block is found first, then the regions to
//! its left and right are matched recursively. The score is
//! `2 * matched / (len(a) + len(b))`.

use std::collections::HashMap;

/// Second strings at least this long ignore over-represented characters
/// when seeding matches.
const POPULAR_MIN_LEN: usize = 200;

/// Similarity in `[0, 1]`; `1.0` exactly when `a == b`.
pub fn similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    // Evaluate in a fixed order so the score does not depend on argument order.
    let (a, b) = if a <= b { (a, b) } else { (b, a) };
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    let matched = Matcher::new(&a, &b).matched_len();
    2.0 * matched as f64 / total as f64
}

struct Matcher<'a> {
    a: &'a [char],
    b: &'a [char],
    /// Positions of each character of `b`, ascending.
    b2j: HashMap<char, Vec<usize>>,
}

impl<'a> Matcher<'a> {
    fn new(a: &'a [char], b: &'a [char]) -> Self {
        let mut b2j: HashMap<char, Vec<usize>> = HashMap::new();
        for (j, &c) in b.iter().enumerate() {
            b2j.entry(c).or_default().push(j);
        }
        if b.len() >= POPULAR_MIN_LEN {
            let limit = b.len() / 100 + 1;
            b2j.retain(|_, js| js.len() <= limit);
        }
        Self { a, b, b2j }
    }

    /// Total length of all matching blocks.
    fn matched_len(&self) -> usize {
        let mut total = 0;
        let mut queue = vec![(0, self.a.len(), 0, self.b.len())];
        while let Some((alo, ahi, blo, bhi)) = queue.pop() {
            let (i, j, k) = self.longest_match(alo, ahi, blo, bhi);
            if k == 0 {
                continue;
            }
            total += k;
            if alo < i && blo < j {
                queue.push((alo, i, blo, j));
            }
            if i + k < ahi && j + k < bhi {
                queue.push((i + k, ahi, j + k, bhi));
            }
        }
        total
    }

    /// Longest block `a[i..i+k] == b[j..j+k]` inside the given windows,
    /// earliest in `a` (then in `b`) on ties.
    fn longest_match(&self, alo: usize, ahi: usize, blo: usize, bhi: usize) -> (usize, usize, usize) {
        let (mut besti, mut bestj, mut bestk) = (alo, blo, 0);
        // Run length of the match ending at b[j], for the previous row of a.
        let mut j2len: HashMap<usize, usize> = HashMap::new();
        for i in alo..ahi {
            let mut next: HashMap<usize, usize> = HashMap::new();
            if let Some(js) = self.b2j.get(&self.a[i]) {
                for &j in js {
                    if j < blo {
                        continue;
                    }
                    if j >= bhi {
                        break;
                    }
                    let k = j
                        .checked_sub(1)
                        .and_then(|p| j2len.get(&p))
                        .copied()
                        .unwrap_or(0)
                        + 1;
                    next.insert(j, k);
                    if k > bestk {
                        besti = i + 1 - k;
                        bestj = j + 1 - k;
                        bestk = k;
                    }
                }
            }
            j2len = next;
        }

        // Popular characters never seed a match but may still extend one.
        while besti > alo && bestj > blo && self.a[besti - 1] == self.b[bestj - 1] {
            besti -= 1;
            bestj -= 1;
            bestk += 1;
        }
        while besti + bestk < ahi && bestj + bestk < bhi && self.a[besti + bestk] == self.b[bestj + bestk] {
            bestk += 1;
        }
        (besti, bestj, bestk)
    }
}
