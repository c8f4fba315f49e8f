use itertools::Itertools;
use rand::seq::SliceRandom;
use rand::Rng;
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::stats::SymbolStat;

/// Up to `count` symbols that need the most practice, hardest first.
///
/// Attempted symbols are ordered by ascending success rate; on equal rates the
/// symbol asked more often ranks first. When fewer than `count` symbols have
/// been attempted, the rest is drawn at random from never-asked symbols.
pub fn rank_hardest<R: Rng + ?Sized>(
    stats: &BTreeMap<char, SymbolStat>,
    count: usize,
    rng: &mut R,
) -> Vec<char> {
    let mut hardest: Vec<char> = stats
        .iter()
        .filter_map(|(&symbol, stat)| stat.success_rate().map(|rate| (symbol, rate, stat.attempts)))
        .sorted_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b.2.cmp(&a.2))
        })
        .take(count)
        .map(|(symbol, _, _)| symbol)
        .collect();

    if hardest.len() < count {
        let unseen: Vec<char> = stats
            .iter()
            .filter(|(_, stat)| stat.attempts == 0)
            .map(|(&symbol, _)| symbol)
            .collect();
        let missing = count - hardest.len();
        hardest.extend(unseen.choose_multiple(rng, missing).copied());
    }

    hardest
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::UserProfile;
    use crate::symbols::Category;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn letters_with(entries: &[(char, u32, u32)]) -> BTreeMap<char, SymbolStat> {
        let mut stats = UserProfile::new("test").letter_stats;
        for &(symbol, correct, attempts) in entries {
            stats.insert(symbol, SymbolStat::new(correct, attempts));
        }
        stats
    }

    #[test]
    fn weakest_symbol_comes_first() {
        let stats = letters_with(&[('B', 1, 10)]);
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(rank_hardest(&stats, 1, &mut rng), vec!['B']);
    }

    #[test]
    fn equal_rates_keep_attempted_symbols_ahead_of_unseen() {
        let stats = letters_with(&[('A', 2, 4), ('C', 2, 4)]);
        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let ranked: HashSet<char> = rank_hardest(&stats, 2, &mut rng).into_iter().collect();
            assert_eq!(ranked, HashSet::from(['A', 'C']));
        }
    }

    #[test]
    fn ties_prefer_more_attempts() {
        let stats = letters_with(&[('D', 1, 2), ('E', 5, 10), ('F', 0, 3)]);
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(rank_hardest(&stats, 3, &mut rng), vec!['F', 'E', 'D']);
    }

    #[test]
    fn backfill_uses_only_unseen_symbols_without_duplicates() {
        let stats = letters_with(&[('A', 3, 3), ('M', 0, 2)]);
        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let ranked = rank_hardest(&stats, 10, &mut rng);
            assert_eq!(ranked.len(), 10);
            assert_eq!(&ranked[..2], &['M', 'A']);
            let unique: HashSet<char> = ranked.iter().copied().collect();
            assert_eq!(unique.len(), ranked.len());
            assert!(ranked[2..]
                .iter()
                .all(|s| stats[s].attempts == 0));
        }
    }

    #[test]
    fn never_exceeds_alphabet_or_count() {
        let stats = UserProfile::new("test").digit_stats;
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(rank_hardest(&stats, 25, &mut rng).len(), 10);
        assert!(rank_hardest(&stats, 0, &mut rng).is_empty());

        let attempted = letters_with(&[('A', 0, 1), ('B', 0, 1), ('C', 0, 1)]);
        assert_eq!(rank_hardest(&attempted, 2, &mut rng).len(), 2);
    }

    #[test]
    fn every_symbol_attempted_means_no_backfill() {
        let mut stats = UserProfile::new("test").digit_stats;
        for (i, stat) in stats.values_mut().enumerate() {
            *stat = SymbolStat::new(i as u32 % 3, 3);
        }
        let mut rng = StdRng::seed_from_u64(9);
        let ranked = rank_hardest(&stats, Category::Digits.hard_pool_size(), &mut rng);
        assert_eq!(ranked.len(), 5);
        assert!(ranked.iter().all(|s| stats[s].correct == 0 || stats[s].correct == 1));
        // the four 0% symbols lead
        assert!(ranked[..4].iter().all(|s| stats[s].correct == 0));
    }
}
