//! What the tutor says to the child.

use crate::error::RecognitionError;
use crate::symbols::Category;

pub const CORRECT: &str = "Bravo, c'est correct !";
pub const LISTENING: &str = "Écoute en cours...";
pub const ALL_DONE: &str = "Bravo, tu as tout fini !";

pub fn welcome(name: &str) -> String {
    format!("Bienvenue {name} !")
}

pub fn incorrect(category: Category, symbol: char) -> String {
    format!("Dommage ! C'est {} {symbol}.", category.noun())
}

pub fn recognition_retry(error: &RecognitionError) -> &'static str {
    match error {
        RecognitionError::Timeout => "Je n'ai rien entendu. Essaie encore !",
        RecognitionError::Unintelligible => "Je n'ai pas bien compris. Peux-tu répéter ?",
        RecognitionError::Service(_) => "Erreur de connexion. Vérifie internet.",
    }
}

pub fn heard_something_else(heard: &str) -> String {
    format!("Ce n'est pas tout à fait ça. J'ai entendu '{heard}'. Essaie encore !")
}

pub fn alphabet_complete(category: Category) -> String {
    match category {
        Category::Letters => {
            "Tu as réussi à reconnaître les 26 lettres de l'alphabet ! Tu peux passer au niveau suivant !"
                .to_string()
        }
        Category::Digits => {
            "Tu as réussi à reconnaître les 10 chiffres ! Tu peux passer au niveau suivant !"
                .to_string()
        }
    }
}

pub fn farewell(correct: u32) -> String {
    format!("Merci d'avoir joué ! Tu as gagné {correct} point(s).")
}
