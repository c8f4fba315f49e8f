use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{Result, TutorError};
use crate::symbols::Category;

/// Minimum success rate for a symbol to count as mastered
pub const MASTERY_THRESHOLD: f64 = 0.7;

/// Accumulated answers for one symbol
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolStat {
    pub correct: u32,
    pub attempts: u32,
}

impl SymbolStat {
    pub fn new(correct: u32, attempts: u32) -> Self {
        Self { correct, attempts }
    }

    /// `None` until the symbol has been asked at least once
    pub fn success_rate(&self) -> Option<f64> {
        if self.attempts == 0 {
            None
        } else {
            Some(self.correct as f64 / self.attempts as f64)
        }
    }

    pub fn is_mastered(&self) -> bool {
        self.success_rate()
            .is_some_and(|rate| rate >= MASTERY_THRESHOLD)
    }

    /// The stat after one more answer, or `None` when a count would overflow
    fn recorded(self, correct: bool) -> Option<Self> {
        Some(Self {
            correct: self.correct.checked_add(u32::from(correct))?,
            attempts: self.attempts.checked_add(1)?,
        })
    }
}

/// Mastered symbols out of the whole alphabet of a category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub mastered: usize,
    pub total: usize,
}

impl Progress {
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.mastered as f64 / self.total as f64
        }
    }

    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.mastered == self.total
    }
}

/// One child's progress across both categories
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub name: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_played_at: Option<DateTime<Utc>>,
    pub letter_stats: BTreeMap<char, SymbolStat>,
    pub digit_stats: BTreeMap<char, SymbolStat>,
    pub total_correct_letters: u32,
    pub total_attempts_letters: u32,
    pub total_correct_digits: u32,
    pub total_attempts_digits: u32,
}

fn zeroed(category: Category) -> BTreeMap<char, SymbolStat> {
    category
        .alphabet()
        .iter()
        .map(|&symbol| (symbol, SymbolStat::default()))
        .collect()
}

impl UserProfile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            created_at: Utc::now(),
            last_played_at: None,
            letter_stats: zeroed(Category::Letters),
            digit_stats: zeroed(Category::Digits),
            total_correct_letters: 0,
            total_attempts_letters: 0,
            total_correct_digits: 0,
            total_attempts_digits: 0,
        }
    }

    pub fn stats(&self, category: Category) -> &BTreeMap<char, SymbolStat> {
        match category {
            Category::Letters => &self.letter_stats,
            Category::Digits => &self.digit_stats,
        }
    }

    pub fn stat(&self, category: Category, symbol: char) -> Option<SymbolStat> {
        self.stats(category).get(&symbol).copied()
    }

    /// `(total_correct, total_attempts)` for a category
    pub fn totals(&self, category: Category) -> (u32, u32) {
        match category {
            Category::Letters => (self.total_correct_letters, self.total_attempts_letters),
            Category::Digits => (self.total_correct_digits, self.total_attempts_digits),
        }
    }

    /// Count one graded answer for `symbol`.
    ///
    /// The per-symbol stat and the category totals move together; nothing is
    /// touched when the symbol is outside the category or a count is full.
    pub fn record_answer(&mut self, category: Category, symbol: char, correct: bool) -> Result<()> {
        let (stats, total_correct, total_attempts) = match category {
            Category::Letters => (
                &mut self.letter_stats,
                &mut self.total_correct_letters,
                &mut self.total_attempts_letters,
            ),
            Category::Digits => (
                &mut self.digit_stats,
                &mut self.total_correct_digits,
                &mut self.total_attempts_digits,
            ),
        };

        if !category.contains(symbol) {
            return Err(TutorError::UnknownSymbol { symbol, category });
        }

        let overflow = || TutorError::CountOverflow { symbol, category };
        let stat = stats
            .get(&symbol)
            .copied()
            .unwrap_or_default()
            .recorded(correct)
            .ok_or_else(overflow)?;
        let new_correct = total_correct
            .checked_add(u32::from(correct))
            .ok_or_else(overflow)?;
        let new_attempts = total_attempts.checked_add(1).ok_or_else(overflow)?;

        stats.insert(symbol, stat);
        *total_correct = new_correct;
        *total_attempts = new_attempts;
        self.last_played_at = Some(Utc::now());
        Ok(())
    }

    pub fn progress(&self, category: Category) -> Progress {
        Progress {
            mastered: self
                .stats(category)
                .values()
                .filter(|stat| stat.is_mastered())
                .count(),
            total: category.alphabet().len(),
        }
    }

    /// Fill in symbols missing from older files with zero stats
    pub(crate) fn fill_missing_symbols(&mut self) {
        for category in [Category::Letters, Category::Digits] {
            let stats = match category {
                Category::Letters => &mut self.letter_stats,
                Category::Digits => &mut self.digit_stats,
            };
            for &symbol in category.alphabet() {
                stats.entry(symbol).or_default();
            }
        }
    }

    /// Describe the first broken invariant, if any
    pub fn check_invariants(&self) -> Option<String> {
        if self.name.is_empty() {
            return Some("profile with an empty name".to_string());
        }
        for category in [Category::Letters, Category::Digits] {
            let stats = self.stats(category);
            if let Some(symbol) = stats.keys().find(|s| !category.contains(**s)) {
                return Some(format!(
                    "{}: {symbol:?} is not a {category} symbol",
                    self.name
                ));
            }
            if let Some((symbol, _)) = stats.iter().find(|(_, s)| s.correct > s.attempts) {
                return Some(format!(
                    "{}: {symbol:?} has more correct answers than attempts",
                    self.name
                ));
            }
            let correct: u64 = stats.values().map(|s| u64::from(s.correct)).sum();
            let attempts: u64 = stats.values().map(|s| u64::from(s.attempts)).sum();
            let (total_correct, total_attempts) = self.totals(category);
            if attempts > u64::from(u32::MAX) {
                return Some(format!(
                    "{}: {category} attempts add up past the counter limit",
                    self.name
                ));
            }
            if (correct, attempts) != (u64::from(total_correct), u64::from(total_attempts)) {
                return Some(format!(
                    "{}: {category} totals do not match the per-symbol counts",
                    self.name
                ));
            }
        }
        None
    }
}
