use std::cmp::Ordering;
use std::collections::BTreeSet;

use crate::filter::Filterable;

/// Distinct, trimmed, non-blank values of `field`, sorted ascending.
pub fn distinct_options<T: Filterable>(records: &[T], field: T::Field) -> Vec<String> {
    collect_distinct(records, field).into_iter().collect()
}

/// Like [`distinct_options`], but ordered numerically with the newest year
/// first. Values that are not numbers sink to the end in lexical order.
pub fn distinct_years<T: Filterable>(records: &[T], field: T::Field) -> Vec<String> {
    let mut years: Vec<String> = collect_distinct(records, field).into_iter().collect();
    years.sort_by(|a, b| match (a.parse::<i64>(), b.parse::<i64>()) {
        (Ok(x), Ok(y)) => y.cmp(&x),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    });
    years
}

fn collect_distinct<T: Filterable>(records: &[T], field: T::Field) -> BTreeSet<String> {
    records
        .iter()
        .filter_map(|record| record.field(field))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .collect()
}
