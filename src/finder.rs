//! A listing page's state: base array, active filters and current page.

use crate::filter::{Criterion, FilterSet, Filterable, Slot};
use crate::paginate::{page_count, PageMarker, Paginator};

#[derive(Debug, Clone)]
pub struct Finder<T: Filterable> {
    base: Vec<T>,
    filters: FilterSet<T::Field>,
    paginator: Paginator,
}

impl<T: Filterable> Finder<T> {
    pub fn new(base: Vec<T>, page_size: usize) -> Self {
        Self {
            base,
            filters: FilterSet::new(),
            paginator: Paginator::new(page_size),
        }
    }

    pub fn base(&self) -> &[T] {
        &self.base
    }

    pub fn filters(&self) -> &FilterSet<T::Field> {
        &self.filters
    }

    /// Swaps in a freshly fetched base array and returns to the first page.
    pub fn replace_base(&mut self, base: Vec<T>) {
        self.base = base;
        self.paginator.reset();
    }

    pub fn set_criterion(&mut self, criterion: Criterion<T::Field>) {
        self.filters.set(criterion);
        self.paginator.reset();
    }

    pub fn clear_criterion(&mut self, slot: Slot<T::Field>) {
        self.filters.clear(slot);
        self.paginator.reset();
    }

    /// Filtered records, recomputed from the base array on every call.
    pub fn results(&self) -> Vec<&T> {
        self.filters.apply(&self.base)
    }

    pub fn current_page(&self) -> usize {
        self.paginator.current()
    }

    pub fn page_count(&self) -> usize {
        page_count(self.results().len(), self.paginator.page_size())
    }

    pub fn go_to(&mut self, page: usize) {
        let total = self.results().len();
        self.paginator.go_to(page, total);
    }

    pub fn page_items(&self) -> Vec<&T> {
        let results = self.results();
        self.paginator.page(&results).to_vec()
    }

    pub fn markers(&self) -> Vec<PageMarker> {
        self.paginator.markers(self.results().len())
    }
}
