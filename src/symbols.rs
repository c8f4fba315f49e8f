use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// The uppercase Latin alphabet quizzed in the letters category
pub const LETTERS: [char; 26] = [
    'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O', 'P', 'Q', 'R',
    'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z',
];

pub const DIGITS: [char; 10] = ['0', '1', '2', '3', '4', '5', '6', '7', '8', '9'];

/// A family of quizzable symbols
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    ValueEnum,
    strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Category {
    Letters,
    Digits,
}

impl Category {
    pub fn alphabet(self) -> &'static [char] {
        match self {
            Category::Letters => &LETTERS,
            Category::Digits => &DIGITS,
        }
    }

    pub fn contains(self, symbol: char) -> bool {
        self.alphabet().contains(&symbol)
    }

    /// How many "hard" candidates the question policy draws from
    pub fn hard_pool_size(self) -> usize {
        match self {
            Category::Letters => 10,
            Category::Digits => 5,
        }
    }

    /// Noun used when telling the child which symbol it was
    pub fn noun(self) -> &'static str {
        match self {
            Category::Letters => "la lettre",
            Category::Digits => "le chiffre",
        }
    }
}

const LETTER_NAMES: [(char, &[&str]); 26] = [
    ('A', &["a", "ah"]),
    ('B', &["be", "bé", "bee"]),
    ('C', &["ce", "cé", "c'est", "ces", "ses"]),
    ('D', &["de", "dé", "des"]),
    ('E', &["e", "eu", "euh"]),
    ('F', &["effe", "ef", "f"]),
    ('G', &["ge", "gé", "j'ai"]),
    ('H', &["ache", "hache", "h"]),
    ('I', &["i", "hi"]),
    ('J', &["ji", "gi", "j'y"]),
    ('K', &["ka", "ca", "k"]),
    ('L', &["elle", "el", "l", "aile"]),
    ('M', &["emme", "em", "m", "aime"]),
    ('N', &["enne", "en", "n", "haine"]),
    ('O', &["o", "oh", "eau", "au"]),
    ('P', &["pe", "pé", "paix"]),
    ('Q', &["ku", "cu", "q"]),
    ('R', &["erre", "er", "r", "air", "aire"]),
    ('S', &["esse", "es", "s", "est"]),
    ('T', &["te", "té", "thé", "t"]),
    ('U', &["u", "eu"]),
    ('V', &["ve", "vé", "v"]),
    ('W', &["double ve", "double vé", "w"]),
    ('X', &["ixe", "iks", "x"]),
    ('Y', &["i grec", "igrec", "y"]),
    ('Z', &["zede", "zède", "zed", "z"]),
];

const DIGIT_NAMES: [(char, &[&str]); 10] = [
    ('0', &["zero", "zéro"]),
    ('1', &["un", "une", "hein"]),
    ('2', &["deux", "de"]),
    ('3', &["trois"]),
    ('4', &["quatre"]),
    ('5', &["cinq", "saint", "sein"]),
    ('6', &["six", "ci"]),
    ('7', &["sept", "cette", "set"]),
    ('8', &["huit"]),
    ('9', &["neuf"]),
];

const FILLER_PREFIXES: [&str; 6] = [
    "c'est la lettre ",
    "c'est le chiffre ",
    "la lettre ",
    "le chiffre ",
    "c'est ",
    "le ",
];

/// Lowercase, trim and drop surrounding punctuation from recognized speech
pub fn normalize_utterance(text: &str) -> String {
    text.trim()
        .trim_matches(|c: char| matches!(c, '.' | ',' | '?' | '!' | ';' | ':' | '"'))
        .trim()
        .to_lowercase()
}

/// Map a recognized utterance onto a symbol of `category`.
///
/// Accepts the bare symbol ("b", "7") or its French name ("bé", "sept"),
/// optionally preceded by a filler such as "la lettre".
pub fn symbol_from_utterance(text: &str, category: Category) -> Option<char> {
    let normalized = normalize_utterance(text);
    if normalized.is_empty() {
        return None;
    }

    let mut candidates = vec![normalized.as_str()];
    for prefix in FILLER_PREFIXES {
        if let Some(rest) = normalized.strip_prefix(prefix) {
            candidates.push(rest.trim());
        }
    }

    candidates
        .into_iter()
        .find_map(|candidate| match_symbol(candidate, category))
}

fn match_symbol(candidate: &str, category: Category) -> Option<char> {
    let mut chars = candidate.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        let upper = c.to_ascii_uppercase();
        if category.contains(upper) {
            return Some(upper);
        }
    }

    let names: &[(char, &[&str])] = match category {
        Category::Letters => &LETTER_NAMES,
        Category::Digits => &DIGIT_NAMES,
    };
    names
        .iter()
        .find(|(_, spoken)| spoken.contains(&candidate))
        .map(|(symbol, _)| *symbol)
}
