//! Fixed-size pages over a filtered list. Pages are 1-indexed.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageMarker {
    Page(usize),
    Ellipsis,
}

pub fn page_count(total_items: usize, page_size: usize) -> usize {
    if page_size == 0 {
        return 0;
    }
    total_items.div_ceil(page_size)
}

/// Page numbers to show in the navigation bar, with ellipses for skipped runs.
/// Empty when there is nothing to paginate.
pub fn compressed_pages(current: usize, total_pages: usize) -> Vec<PageMarker> {
    use PageMarker::{Ellipsis, Page};

    if total_pages == 0 {
        return Vec::new();
    }
    if total_pages <= 5 {
        return (1..=total_pages).map(Page).collect();
    }

    let current = current.clamp(1, total_pages);
    if current <= 3 {
        let mut pages: Vec<_> = (1..=4).map(Page).collect();
        pages.extend([Ellipsis, Page(total_pages)]);
        pages
    } else if current > total_pages - 3 {
        let mut pages = vec![Page(1), Ellipsis];
        pages.extend((total_pages - 3..=total_pages).map(Page));
        pages
    } else {
        vec![
            Page(1),
            Ellipsis,
            Page(current - 1),
            Page(current),
            Page(current + 1),
            Ellipsis,
            Page(total_pages),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paginator {
    page_size: usize,
    current: usize,
}

impl Paginator {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
            current: 1,
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn reset(&mut self) {
        self.current = 1;
    }

    /// Moves to `page`, clamped into range. Stays on page 1 when `total_items` is 0.
    pub fn go_to(&mut self, page: usize, total_items: usize) {
        let pages = page_count(total_items, self.page_size);
        if pages == 0 {
            self.current = 1;
            return;
        }
        self.current = page.clamp(1, pages);
    }

    pub fn page<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let start = (self.current - 1).saturating_mul(self.page_size);
        if start >= items.len() {
            return &[];
        }
        let end = (start + self.page_size).min(items.len());
        &items[start..end]
    }

    pub fn markers(&self, total_items: usize) -> Vec<PageMarker> {
        compressed_pages(self.current, page_count(total_items, self.page_size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use PageMarker::{Ellipsis, Page};

    #[test]
    fn thirty_seven_items_in_pages_of_fifteen() {
        let items: Vec<u32> = (0..37).collect();
        let mut paginator = Paginator::new(15);
        assert_eq!(page_count(items.len(), 15), 3);

        paginator.go_to(3, items.len());
        assert_eq!(paginator.page(&items).len(), 7);
        assert_eq!(paginator.page(&items)[0], 30);
    }

    #[test]
    fn go_to_clamps_into_range() {
        let mut paginator = Paginator::new(12);
        paginator.go_to(9, 25);
        assert_eq!(paginator.current(), 3);
        paginator.go_to(0, 25);
        assert_eq!(paginator.current(), 1);
    }

    #[test]
    fn empty_results_have_no_navigation() {
        let mut paginator = Paginator::new(12);
        paginator.go_to(4, 0);
        let items: Vec<u32> = Vec::new();
        assert!(paginator.page(&items).is_empty());
        assert!(paginator.markers(0).is_empty());
    }

    #[test]
    fn small_page_counts_list_everything() {
        assert_eq!(compressed_pages(2, 5), (1..=5).map(Page).collect::<Vec<_>>());
    }

    #[test]
    fn compresses_near_the_start() {
        assert_eq!(
            compressed_pages(3, 10),
            vec![Page(1), Page(2), Page(3), Page(4), Ellipsis, Page(10)]
        );
    }

    #[test]
    fn compresses_near_the_end() {
        assert_eq!(
            compressed_pages(8, 10),
            vec![Page(1), Ellipsis, Page(7), Page(8), Page(9), Page(10)]
        );
    }

    #[test]
    fn compresses_in_the_middle() {
        assert_eq!(
            compressed_pages(5, 10),
            vec![Page(1), Ellipsis, Page(4), Page(5), Page(6), Ellipsis, Page(10)]
        );
    }

    #[test]
    fn six_pages_switch_from_head_to_tail_between_three_and_four() {
        assert_eq!(
            compressed_pages(3, 6),
            vec![Page(1), Page(2), Page(3), Page(4), Ellipsis, Page(6)]
        );
        assert_eq!(
            compressed_pages(4, 6),
            vec![Page(1), Ellipsis, Page(3), Page(4), Page(5), Page(6)]
        );
    }

    #[test]
    fn current_page_and_both_ends_are_always_listed() {
        for total in 6..=9 {
            for current in 1..=total {
                let markers = compressed_pages(current, total);
                assert!(markers.contains(&Page(current)), "{current} of {total}");
                assert_eq!(markers.first(), Some(&Page(1)));
                assert_eq!(markers.last(), Some(&Page(total)));
            }
        }
    }
}
