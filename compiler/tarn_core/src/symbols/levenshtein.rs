//! Bounded Levenshtein edit distance for fuzzy member search.

/// Edit distance between `a` and `b`, bounded by `limit`.
///
/// Returns `None` as soon as the distance is provably `>= limit`, so callers
/// can tighten a best-distance bound while scanning many candidates.
pub(crate) fn distance_under(a: &str, b: &str, limit: usize) -> Option<usize> {
    let a_len = a.chars().count();
    let b_len = b.chars().count();

    if a_len.abs_diff(b_len) >= limit {
        return None;
    }
    if a_len == 0 {
        return (b_len < limit).then_some(b_len);
    }
    if b_len == 0 {
        return (a_len < limit).then_some(a_len);
    }

    // Two-row DP; bail out when a whole row exceeds the bound.
    let mut prev_row: Vec<usize> = (0..=b_len).collect();
    let mut curr_row: Vec<usize> = vec![0; b_len + 1];

    for (i, a_char) in a.chars().enumerate() {
        curr_row[0] = i + 1;
        let mut row_min = curr_row[0];

        for (j, b_char) in b.chars().enumerate() {
            let cost = usize::from(a_char != b_char);
            curr_row[j + 1] = (prev_row[j + 1] + 1)
                .min(curr_row[j] + 1)
                .min(prev_row[j] + cost);
            row_min = row_min.min(curr_row[j + 1]);
        }

        if row_min >= limit {
            return None;
        }
        std::mem::swap(&mut prev_row, &mut curr_row);
    }

    (prev_row[b_len] < limit).then_some(prev_row[b_len])
}
