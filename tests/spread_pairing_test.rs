mod common;

use std::collections::BTreeSet;

use common::Book;
use spreadview::page::{PageContentProvider, SpreadOptions, SpreadProvider};

fn provider(pages: usize, reverse: bool, single_on_first_page: bool) -> SpreadProvider {
    SpreadProvider::new(
        Book::new(pages),
        SpreadOptions {
            reverse,
            single_on_first_page,
            ..SpreadOptions::default()
        },
    )
}

#[test]
fn every_page_lands_in_exactly_one_spread() {
    for pages in 0..14 {
        for reverse in [false, true] {
            for single in [false, true] {
                let spreads = provider(pages, reverse, single);
                let mut seen = Vec::new();
                for i in 0..spreads.count() {
                    let pair = spreads.page_indices(i);
                    assert!(
                        pair.left.is_some() || pair.right.is_some(),
                        "spread {i} of {pages} pages (reverse={reverse}, single={single}) is empty"
                    );
                    seen.extend(pair.left);
                    seen.extend(pair.right);
                }
                let unique: BTreeSet<_> = seen.iter().copied().collect();
                assert_eq!(seen.len(), pages, "{pages} pages, reverse={reverse}, single={single}");
                assert_eq!(unique, (0..pages).collect::<BTreeSet<_>>());
            }
        }
    }
}

#[test]
fn spread_count_follows_pairing() {
    assert_eq!(provider(0, false, false).count(), 0);
    assert_eq!(provider(0, false, true).count(), 0);
    assert_eq!(provider(1, false, false).count(), 1);
    assert_eq!(provider(4, false, false).count(), 2);
    assert_eq!(provider(5, false, false).count(), 3);
    assert_eq!(provider(4, false, true).count(), 3);
    assert_eq!(provider(5, false, true).count(), 3);
}

#[test]
fn reverse_swaps_sides() {
    for pages in 1..10 {
        for single in [false, true] {
            let forward = provider(pages, false, single);
            let backward = provider(pages, true, single);
            for i in 0..forward.count() {
                let f = forward.page_indices(i);
                let b = backward.page_indices(i);
                assert_eq!((f.left, f.right), (b.right, b.left));
            }
        }
    }
}

#[test]
fn cover_stands_alone() {
    let spreads = provider(6, false, true);
    let cover = spreads.page_indices(0);
    assert_eq!((cover.left, cover.right), (None, Some(0)));
    let second = spreads.page_indices(1);
    assert_eq!((second.left, second.right), (Some(1), Some(2)));
    let last = spreads.page_indices(3);
    assert_eq!((last.left, last.right), (Some(5), None));
}

#[test]
fn out_of_range_spread_has_no_content() {
    let spreads = provider(3, false, false);
    assert!(spreads.content_of(2).is_none());
    assert!(spreads.size_of(2).is_none());
}
