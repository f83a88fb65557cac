/// One-based ranks with ties given the average of the ranks they span.
pub(crate) fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; values.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && values[order[j + 1]] == values[order[i]] {
            j += 1;
        }
        // positions i..=j hold ranks i+1..=j+1
        let rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = rank;
        }
        i = j + 1;
    }
    ranks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distinct_values() {
        assert_eq!(average_ranks(&[30.0, 10.0, 20.0]), vec![3.0, 1.0, 2.0]);
    }

    #[test]
    fn test_ties_share_average_rank() {
        assert_eq!(
            average_ranks(&[1.0, 2.0, 2.0, 3.0, 2.0]),
            vec![1.0, 3.0, 3.0, 5.0, 3.0]
        );
        assert_eq!(average_ranks(&[5.0, 5.0]), vec![1.5, 1.5]);
    }

    #[test]
    fn test_empty() {
        assert!(average_ranks(&[]).is_empty());
    }
}
