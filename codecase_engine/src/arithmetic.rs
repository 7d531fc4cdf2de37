/// CodeCase Engine — Arithmetic Primitives
///
/// Integer only. Scores and point costs never touch floats.

/// `round(100 × part / total)` with halves rounding up.
/// An empty total is treated as fully satisfied.
pub fn percent_rounded(part: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    let part = part.min(total) as u64;
    let total = total as u64;
    ((200 * part + total) / (2 * total)) as u8
}

/// `value × numerator / denominator`, multiplying first, `None` on overflow
/// or a zero denominator.
pub fn checked_scale(value: i64, numerator: i64, denominator: i64) -> Option<i64> {
    if denominator == 0 {
        return None;
    }
    value.checked_mul(numerator)?.checked_div(denominator)
}
