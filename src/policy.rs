use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::BTreeMap;

use crate::difficulty::rank_hardest;
use crate::error::{Result, TutorError};
use crate::stats::{SymbolStat, UserProfile};
use crate::symbols::Category;

/// Number of answers offered for each question
pub const CHOICE_COUNT: usize = 4;

/// Chance of drawing the target from the hardest symbols
pub const DEFAULT_HARD_PICK_PROBABILITY: f64 = 0.6;

/// A multiple-choice question about one symbol
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub symbol: char,
    pub choices: Vec<char>,
    pub correct_index: usize,
}

impl Question {
    pub fn is_correct(&self, choice_index: usize) -> bool {
        choice_index == self.correct_index
    }

    pub fn index_of(&self, symbol: char) -> Option<usize> {
        self.choices.iter().position(|&c| c == symbol)
    }
}

/// Picks the next symbol to ask, leaning toward the ones a child struggles with
#[derive(Debug, Clone, Copy)]
pub struct QuestionPolicy {
    pub hard_pick_probability: f64,
}

impl Default for QuestionPolicy {
    fn default() -> Self {
        Self {
            hard_pick_probability: DEFAULT_HARD_PICK_PROBABILITY,
        }
    }
}

impl QuestionPolicy {
    pub fn new(hard_pick_probability: f64) -> Self {
        Self {
            hard_pick_probability: hard_pick_probability.clamp(0.0, 1.0),
        }
    }

    pub fn next_question<R: Rng + ?Sized>(
        &self,
        profile: &UserProfile,
        category: Category,
        rng: &mut R,
    ) -> Result<Question> {
        self.question_from(
            category.alphabet(),
            profile.stats(category),
            category.hard_pool_size(),
            rng,
        )
    }

    /// Build a question over an arbitrary alphabet
    pub fn question_from<R: Rng + ?Sized>(
        &self,
        alphabet: &[char],
        stats: &BTreeMap<char, SymbolStat>,
        hard_pool_size: usize,
        rng: &mut R,
    ) -> Result<Question> {
        if alphabet.len() < CHOICE_COUNT {
            return Err(TutorError::InsufficientAlphabet {
                size: alphabet.len(),
                needed: CHOICE_COUNT,
            });
        }

        let hard = if rng.gen::<f64>() < self.hard_pick_probability {
            rank_hardest(stats, hard_pool_size, rng)
                .choose(rng)
                .copied()
                .filter(|symbol| alphabet.contains(symbol))
        } else {
            None
        };
        let symbol = match hard {
            Some(symbol) => symbol,
            None => *alphabet
                .choose(rng)
                .ok_or(TutorError::InsufficientAlphabet {
                    size: 0,
                    needed: CHOICE_COUNT,
                })?,
        };

        let others: Vec<char> = alphabet.iter().copied().filter(|&c| c != symbol).collect();
        let mut choices: Vec<char> = others
            .choose_multiple(rng, CHOICE_COUNT - 1)
            .copied()
            .collect();
        choices.push(symbol);
        choices.shuffle(rng);

        let correct_index = choices
            .iter()
            .position(|&c| c == symbol)
            .unwrap_or_default();

        Ok(Question {
            symbol,
            choices,
            correct_index,
        })
    }
}
