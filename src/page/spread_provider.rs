//! Pairing of single pages into spreads

use std::sync::Arc;

use log::{debug, warn};

use super::bitmap::Color;
use super::content::{DummyContent, PageContentProvider, SharedContent};
use super::fit::SpreadSizePolicy;
use super::geometry::SizeF;
use super::spread::Spread;

/// How pages are paired
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpreadOptions {
    /// Right-to-left reading order
    pub reverse: bool,
    /// Cover is shown alone
    pub single_on_first_page: bool,
    /// Pad an unpaired page with a blank partner
    pub use_dummy_content: bool,
    pub size_policy: SpreadSizePolicy,
    pub paper_color: Color,
}

impl Default for SpreadOptions {
    fn default() -> Self {
        Self {
            reverse: false,
            single_on_first_page: false,
            use_dummy_content: false,
            size_policy: SpreadSizePolicy::default(),
            paper_color: Color::WHITE,
        }
    }
}

/// Underlying page indices shown by one spread
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpreadPages {
    pub left: Option<usize>,
    pub right: Option<usize>,
}

/// Presents a single-page provider as a provider of spreads
pub struct SpreadProvider {
    pages: Arc<dyn PageContentProvider>,
    options: SpreadOptions,
}

impl SpreadProvider {
    #[must_use]
    pub fn new(pages: Arc<dyn PageContentProvider>, options: SpreadOptions) -> Self {
        Self { pages, options }
    }

    pub fn options(&self) -> &SpreadOptions {
        &self.options
    }

    pub fn set_single_on_first_page(&mut self, single: bool) {
        self.options.single_on_first_page = single;
    }

    /// Raw left index, possibly -1 or past the end
    #[must_use]
    pub fn left_page_index(&self, index: usize) -> i64 {
        let base = index as i64 * 2;
        let single = i64::from(self.options.single_on_first_page);
        if self.options.reverse {
            base + 1 - single
        } else {
            base - single
        }
    }

    /// Raw right index, possibly -1 or past the end
    #[must_use]
    pub fn right_page_index(&self, index: usize) -> i64 {
        let base = index as i64 * 2;
        let single = i64::from(self.options.single_on_first_page);
        if self.options.reverse {
            base - single
        } else {
            base + 1 - single
        }
    }

    /// Pages that exist on either side of `index`
    #[must_use]
    pub fn page_indices(&self, index: usize) -> SpreadPages {
        let n = self.pages.count();
        let resolve = |raw: i64| usize::try_from(raw).ok().filter(|&i| i < n);
        SpreadPages {
            left: resolve(self.left_page_index(index)),
            right: resolve(self.right_page_index(index)),
        }
    }

    /// Look up both sides; `None` when a resolvable side fails or the index is out of range
    fn sides<T>(
        &self,
        index: usize,
        fetch: impl Fn(usize) -> Option<T>,
    ) -> Option<(Option<T>, Option<T>)> {
        if index >= self.count() {
            return None;
        }
        let pages = self.page_indices(index);
        let side = |page: Option<usize>| -> Option<Option<T>> {
            match page {
                Some(i) => match fetch(i) {
                    Some(value) => Some(Some(value)),
                    None => {
                        warn!("Page {i} of spread {index} is unavailable");
                        None
                    }
                },
                None => Some(None),
            }
        };
        let left = side(pages.left)?;
        let right = side(pages.right)?;
        Some((left, right))
    }
}

impl PageContentProvider for SpreadProvider {
    fn count(&self) -> usize {
        let n = self.pages.count();
        if n == 0 {
            return 0;
        }
        let mut count = n / 2 + n % 2;
        if self.options.single_on_first_page && n % 2 == 0 {
            count += 1;
        }
        count
    }

    fn size_of(&self, index: usize) -> Option<SizeF> {
        let policy = self.options.size_policy;
        match self.sides(index, |i| self.pages.size_of(i))? {
            (Some(left), Some(right)) => Some(policy.compute_size(left, right)),
            (Some(lone), None) | (None, Some(lone)) => {
                if self.options.use_dummy_content {
                    Some(policy.compute_size(lone, lone))
                } else {
                    Some(lone)
                }
            }
            (None, None) => None,
        }
    }

    fn content_of(&self, index: usize) -> Option<SharedContent> {
        let SpreadOptions {
            size_policy,
            paper_color,
            use_dummy_content,
            ..
        } = self.options;
        let (left, right) = match self.sides(index, |i| self.pages.content_of(i))? {
            (Some(left), Some(right)) => (left, right),
            (Some(left), None) if use_dummy_content => {
                let dummy: SharedContent = Arc::new(DummyContent::sized_like(left.as_ref()));
                (left, dummy)
            }
            (None, Some(right)) if use_dummy_content => {
                let dummy: SharedContent = Arc::new(DummyContent::sized_like(right.as_ref()));
                (dummy, right)
            }
            (Some(lone), None) | (None, Some(lone)) => {
                debug!("Spread {index} shows a lone page");
                return Some(lone);
            }
            (None, None) => return None,
        };
        Some(Spread::new(left, right, size_policy, paper_color).into_shared())
    }
}

impl std::fmt::Debug for SpreadProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpreadProvider")
            .field("pages", &self.pages.count())
            .field("options", &self.options)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::bitmap::Bitmap;
    use crate::page::content::{PageContent, RenderRequest};

    struct Page(SizeF);

    impl PageContent for Page {
        fn size(&self) -> SizeF {
            self.0
        }

        fn render_to_bitmap(&self, _request: &RenderRequest) -> Option<Bitmap> {
            None
        }
    }

    /// Provider with per-page sizes; `broken` pages fail to load
    struct Pages {
        sizes: Vec<SizeF>,
        broken: Vec<usize>,
    }

    impl PageContentProvider for Pages {
        fn count(&self) -> usize {
            self.sizes.len()
        }

        fn size_of(&self, index: usize) -> Option<SizeF> {
            if self.broken.contains(&index) {
                return None;
            }
            self.sizes.get(index).copied()
        }

        fn content_of(&self, index: usize) -> Option<SharedContent> {
            self.size_of(index)
                .map(|size| Arc::new(Page(size)) as SharedContent)
        }
    }

    fn provider(n: usize, options: SpreadOptions) -> SpreadProvider {
        let pages = Pages {
            sizes: vec![SizeF::new(100.0, 200.0); n],
            broken: Vec::new(),
        };
        SpreadProvider::new(Arc::new(pages), options)
    }

    fn options(reverse: bool, single: bool) -> SpreadOptions {
        SpreadOptions {
            reverse,
            single_on_first_page: single,
            ..SpreadOptions::default()
        }
    }

    #[test]
    fn count_matches_pairing() {
        assert_eq!(provider(10, options(false, false)).count(), 5);
        assert_eq!(provider(10, options(false, true)).count(), 6);
        assert_eq!(provider(11, options(false, false)).count(), 6);
        assert_eq!(provider(11, options(false, true)).count(), 6);
        assert_eq!(provider(0, options(false, true)).count(), 0);
    }

    #[test]
    fn cover_stands_alone() {
        let p = provider(4, options(false, true));
        assert_eq!(
            p.page_indices(0),
            SpreadPages {
                left: None,
                right: Some(0)
            }
        );
        assert_eq!(
            p.page_indices(2),
            SpreadPages {
                left: Some(3),
                right: None
            }
        );
    }

    #[test]
    fn reverse_swaps_sides() {
        let p = provider(4, options(true, false));
        assert_eq!(
            p.page_indices(0),
            SpreadPages {
                left: Some(1),
                right: Some(0)
            }
        );
    }

    #[test]
    fn lone_page_without_dummy_keeps_its_size() {
        let p = provider(3, options(false, false));
        assert_eq!(p.size_of(1), Some(SizeF::new(100.0, 200.0)));
        assert_eq!(p.size_of(0), Some(SizeF::new(200.0, 200.0)));
    }

    #[test]
    fn lone_page_with_dummy_is_paired() {
        let p = provider(
            3,
            SpreadOptions {
                use_dummy_content: true,
                ..SpreadOptions::default()
            },
        );
        assert_eq!(p.size_of(1), Some(SizeF::new(200.0, 200.0)));
        let content = p.content_of(1).unwrap();
        assert_eq!(content.size(), SizeF::new(200.0, 200.0));
    }

    #[test]
    fn failing_side_fails_the_whole_spread() {
        let pages = Pages {
            sizes: vec![SizeF::new(100.0, 200.0); 4],
            broken: vec![3],
        };
        let p = SpreadProvider::new(Arc::new(pages), SpreadOptions::default());
        assert!(p.size_of(1).is_none());
        assert!(p.content_of(1).is_none());
        assert!(p.content_of(0).is_some());
    }

    #[test]
    fn out_of_range_spread_is_none() {
        let p = provider(4, SpreadOptions::default());
        assert!(p.content_of(2).is_none());
        assert!(p.size_of(99).is_none());
    }
}
