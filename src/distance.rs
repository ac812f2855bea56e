/// Levenshtein distance over token sequences.
///
/// Each insertion, deletion or substitution of a whole token costs 1.
/// Runs the classic dynamic program with two rows sized by the shorter input,
/// so memory is O(min(len_a, len_b)) and time O(len_a * len_b).
pub fn edit_distance<T: PartialEq>(a: &[T], b: &[T]) -> usize {
    // Keep the row over the shorter sequence; distance is symmetric.
    let (long, short) = if a.len() >= b.len() { (a, b) } else { (b, a) };
    if short.is_empty() {
        return long.len();
    }

    let mut prev: Vec<usize> = (0..=short.len()).collect();
    let mut curr: Vec<usize> = vec![0; short.len() + 1];

    for (i, lt) in long.iter().enumerate() {
        curr[0] = i + 1;
        for (j, st) in short.iter().enumerate() {
            let substitution = prev[j] + usize::from(lt != st);
            let deletion = prev[j + 1] + 1;
            let insertion = curr[j] + 1;
            curr[j + 1] = substitution.min(deletion).min(insertion);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[short.len()]
}
