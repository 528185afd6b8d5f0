use super::similarity::similarity;
use super::{Block, SimilarityThreshold};

/// Partition candidates into blocks of mutually similar items.
///
/// Candidates are deduplicated and sorted so that structurally similar
/// strings sit next to each other, then a single linear pass grows a block
/// while each item stays within `threshold` of the block's anchor (its first
/// item). The first item that falls below the threshold closes the block and
/// becomes the next anchor.
///
/// Items that are similar but not adjacent after sorting can end up in
/// different blocks; the pass never compares beyond the current anchor.
pub fn cluster(candidates: Vec<String>, threshold: SimilarityThreshold) -> Vec<Block> {
    let mut items = candidates;
    items.sort();
    items.dedup();

    if items.len() <= 1 {
        return items.into_iter().map(|c| Block::new(vec![c])).collect();
    }

    let mut blocks = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut anchor = 0;

    for i in 0..items.len() {
        if similarity(&items[anchor], &items[i]) >= threshold.value() {
            current.push(items[i].clone());
            continue;
        }
        anchor = i;
        blocks.push(Block::new(std::mem::take(&mut current)));
        current.push(items[i].clone());
    }
    if !current.is_empty() {
        blocks.push(Block::new(current));
    }

    blocks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(v: f64) -> SimilarityThreshold {
        SimilarityThreshold::new(v).unwrap()
    }

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn empty_input() {
        assert!(cluster(Vec::new(), t(0.6)).is_empty());
    }

    #[test]
    fn single_item() {
        let blocks = cluster(strings(&["https://a.com/x.html"]), t(0.6));
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].items, strings(&["https://a.com/x.html"]));
    }

    #[test]
    fn duplicates_collapse() {
        let blocks = cluster(strings(&["https://a.com/x.html"; 4]), t(0.6));
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].len(), 1);
    }

    #[test]
    fn similar_items_share_a_block() {
        let blocks = cluster(
            strings(&["https://a.com/issues/show.html", "https://a.com/issues/index.html"]),
            t(0.6),
        );
        assert_eq!(blocks.len(), 1);
        // Sorted order, not input order.
        assert_eq!(
            blocks[0].items,
            strings(&["https://a.com/issues/index.html", "https://a.com/issues/show.html"])
        );
    }

    #[test]
    fn kinds_split_apart() {
        let input = strings(&[
            "https://a.com/issues/index.html",
            r#"href="/issues/index.html""#,
            "https://a.com/issues/show.html",
            r#"href="/issues/show.html""#,
        ]);
        let blocks = cluster(input.clone(), t(0.8));
        assert_eq!(blocks.len(), 2);
        assert!(blocks[0].items.iter().all(|s| s.starts_with("href")));
        assert!(blocks[1].items.iter().all(|s| s.starts_with("https")));

        // A looser threshold lets the first URL join the tag block.
        let loose = cluster(input, t(0.6));
        assert_eq!(loose[0].items.len(), 3);
        assert_eq!(loose[0].items[2], "https://a.com/issues/index.html");
    }

    #[test]
    fn threshold_granularity() {
        let input = strings(&[
            "https://a.com/a/1.html",
            "https://a.com/a/2.html",
            "https://a.com/b/1.html",
        ]);
        assert_eq!(cluster(input.clone(), t(0.5)).len(), 1);
        assert_eq!(cluster(input.clone(), t(1.0)).len(), 3);
        // Zero accepts everything.
        assert_eq!(cluster(input, t(0.0)).len(), 1);
    }

    #[test]
    fn anchor_invariant_holds() {
        let input = strings(&[
            "https://a.com/issues/index.html",
            "https://a.com/issues/show.html",
            "https://a.com/news/2024/01.html",
            "https://a.com/news/2024/02.html",
            "ftp://mirror.org/pub/tool-1.0.html",
            "ftp://mirror.org/pub/tool-1.1.html",
            r#"href="/docs/intro.html""#,
        ]);
        let threshold = t(0.7);
        let blocks = cluster(input, threshold);
        for (k, block) in blocks.iter().enumerate() {
            let anchor = &block.items[0];
            for item in &block.items {
                assert!(similarity(anchor, item) >= threshold.value());
            }
            // The next anchor is the item that broke this block.
            if let Some(next) = blocks.get(k + 1) {
                assert!(similarity(anchor, &next.items[0]) < threshold.value());
            }
        }
    }

    #[test]
    fn deterministic() {
        let input = strings(&[
            "https://a.com/issues/show.html",
            "https://b.org/x/1.zip",
            "https://a.com/issues/index.html",
            r#"src="/img/1.html""#,
            "https://b.org/x/2.zip",
        ]);
        let mut reversed = input.clone();
        reversed.reverse();
        let first = cluster(input.clone(), t(0.6));
        assert_eq!(first, cluster(input, t(0.6)));
        assert_eq!(first, cluster(reversed, t(0.6)));
    }

    #[test]
    fn sort_order_limitation_preserved() {
        // "1z" sorts between two near-identical items and breaks the run,
        // so the similar pair is never compared.
        let blocks = cluster(strings(&["2/abcdefgh", "1z", "1/abcdefgh"]), t(0.8));
        assert!(similarity("1/abcdefgh", "2/abcdefgh") >= 0.8);
        assert_eq!(blocks.len(), 3);
    }
}
