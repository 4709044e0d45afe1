/// The `n` highest-valued entries, largest first.
///
/// The sort is stable, so equal values keep their input order. For the
/// `BTreeMap` aggregates this puts ties in ascending key order.
pub fn top_n<K, I>(grouped: I, n: usize) -> Vec<(K, f64)>
where
    I: IntoIterator<Item = (K, f64)>,
{
    let mut entries: Vec<(K, f64)> = grouped.into_iter().collect();
    entries.sort_by(|a, b| b.1.total_cmp(&a.1));
    entries.truncate(n);
    entries
}
