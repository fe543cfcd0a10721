//! Detections that never need translating: bare numbers, weights, prices.

use regex::Regex;
use std::sync::LazyLock;

static CURRENCY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:([£$€¥]|USD|usd|Usd|元)\s*)?[\d,.，]+\s*(?:([£$€¥]|USD|usd|Usd|元))?$")
        .unwrap_or_else(|e| panic!("invalid currency pattern: {e}"))
});

static WEIGHT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?i)^(?:[+-]?(?:\d+(?:\.\d*)?|\.\d+))?",
        r"(?:mg|milligrams?|g|grams?|kg|kilograms?|t|tons?|tonnes?",
        r"|lbs?|pounds?|oz|ounces?|ct|carats?|克|千克|公斤|斤)$",
    ))
    .unwrap_or_else(|e| panic!("invalid weight pattern: {e}"))
});

fn remove_spaces(text: &str) -> String {
    text.replace(' ', "")
}

pub fn is_number(text: &str) -> bool {
    remove_spaces(text).trim().parse::<f64>().is_ok()
}

/// A mass unit, optionally preceded by a quantity. A bare unit such as
/// `kg` still reads as a weight.
pub fn is_weight(text: &str) -> bool {
    WEIGHT.is_match(&remove_spaces(text))
}

pub fn is_currency(text: &str) -> bool {
    CURRENCY.is_match(&remove_spaces(text))
}

/// Whether a detected line is worth sending to the translator.
pub fn needs_translation(text: &str) -> bool {
    !text.trim().is_empty() && !is_number(text) && !is_weight(text) && !is_currency(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_ignore_inner_spaces() {
        assert!(is_number("12"));
        assert!(is_number(" 3 .5 "));
        assert!(is_number("-0.25"));
        assert!(!is_number("12a"));
        assert!(!is_number(""));
    }

    #[test]
    fn weights_need_a_quantity_and_a_mass_unit() {
        assert!(is_weight("500g"));
        assert!(is_weight("1.5 KG"));
        assert!(is_weight("2斤"));
        assert!(is_weight("10 lbs"));
        assert!(!is_weight("5 cm"));
        assert!(!is_weight(""));
    }

    #[test]
    fn spelled_out_and_bare_mass_units_are_weights() {
        assert!(is_weight("500 grams"));
        assert!(is_weight("2 pounds"));
        assert!(is_weight("3 kilograms"));
        assert!(is_weight("12 ounces"));
        assert!(is_weight("1 Tonne"));
        assert!(is_weight("0.5 carat"));
        assert!(is_weight("kg"));
        assert!(!is_weight("grammar"));
        assert!(!is_weight("pound cake"));
        assert!(!needs_translation("500 grams"));
    }

    #[test]
    fn currency_accepts_leading_or_trailing_symbols() {
        assert!(is_currency("$19.99"));
        assert!(is_currency("19,99 €"));
        assert!(is_currency("USD 1,000"));
        assert!(is_currency("99元"));
        assert!(is_currency("1，299"));
        assert!(!is_currency("$ off"));
        assert!(!is_currency("SALE"));
    }

    #[test]
    fn only_real_text_is_translated() {
        assert!(needs_translation("SALE"));
        assert!(needs_translation("限时特价"));
        assert!(!needs_translation("  "));
        assert!(!needs_translation("€5"));
        assert!(!needs_translation("250 mg"));
    }
}
