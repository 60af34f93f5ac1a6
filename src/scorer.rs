use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::HashSet;

use crate::utils::error::{AppError, Result};

/// Inputs shared by both scorers. `threshold` is domain-specific: percent
/// drop magnitude for prices, match score for jobs.
#[derive(Debug, Clone)]
pub struct ScoreConfig {
    pub threshold: f64,
    pub skills: Vec<String>,
    pub skill_bonus: f64,
}

impl ScoreConfig {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold: threshold.abs(),
            skills: Vec::new(),
            skill_bonus: 5.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Signal {
    pub value: f64,
    pub alert_worthy: bool,
}

/// Percent change between two observed prices. Negative means a drop.
/// A zero previous price cannot be scored and surfaces as `DivideByZero`;
/// the caller reclassifies that observation as new rather than updated.
pub fn price_delta(old: Decimal, new: Decimal, config: &ScoreConfig) -> Result<Signal> {
    if old.is_zero() {
        return Err(AppError::DivideByZero);
    }
    let percent = ((new - old) / old * Decimal::from(100))
        .to_f64()
        .unwrap_or(0.0);
    Ok(Signal {
        value: percent,
        // Drops alert, increases are recorded but never alert.
        alert_worthy: percent <= -config.threshold,
    })
}

/// Jaccard similarity between the reference document and a listing
/// description, scaled to [0, 100], plus an additive bonus per configured
/// skill found in the description. The total is capped at 100.
pub fn text_match(reference: &str, description: &str, config: &ScoreConfig) -> Signal {
    let reference_terms = tokenize(reference);
    let description_terms = tokenize(description);

    let intersection = reference_terms.intersection(&description_terms).count();
    let union = reference_terms.union(&description_terms).count();

    let jaccard = if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64 * 100.0
    };

    let bonus = config
        .skills
        .iter()
        .filter(|skill| description_terms.contains(&skill.to_lowercase()))
        .count() as f64
        * config.skill_bonus;

    let score = (jaccard + bonus).min(100.0);
    Signal {
        value: score,
        alert_worthy: score >= config.threshold,
    }
}

const STOPWORDS: &[&str] = &[
    "a", "an", "the", "and", "or", "but", "if", "then", "of", "to", "in", "on", "at", "for",
    "with", "by", "from", "as", "is", "are", "was", "were", "be", "been", "being", "it", "its",
    "this", "that", "these", "those", "we", "you", "your", "they", "their", "our", "i", "will",
    "would", "can", "could", "should", "have", "has", "had", "do", "does", "did", "not", "no",
    "so", "than", "too", "very", "about", "into", "over", "under", "more", "most", "other",
    "some", "such", "only", "own", "same", "all", "each", "per", "us",
];

fn tokenize(text: &str) -> HashSet<String> {
    // '+' and '#' stay so terms like c++ and c# survive tokenization.
    text.split(|c: char| !c.is_alphanumeric() && c != '+' && c != '#')
        .map(str::to_lowercase)
        .filter(|t| !t.is_empty() && !STOPWORDS.contains(&t.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[rstest]
    #[case("100", "75", -25.0, true)]
    #[case("100", "90", -10.0, false)]
    #[case("100", "120", 20.0, false)]
    #[case("50", "50", 0.0, false)]
    fn test_price_delta(
        #[case] old: &str,
        #[case] new: &str,
        #[case] expected: f64,
        #[case] alert: bool,
    ) {
        let config = ScoreConfig::new(20.0);
        let signal = price_delta(dec(old), dec(new), &config).unwrap();
        assert!((signal.value - expected).abs() < 1e-9);
        assert_eq!(signal.alert_worthy, alert);
    }

    #[test]
    fn test_price_delta_zero_old_price() {
        let config = ScoreConfig::new(20.0);
        let result = price_delta(dec("0"), dec("75"), &config);
        assert!(matches!(result, Err(AppError::DivideByZero)));
    }

    #[test]
    fn test_price_increase_never_alerts() {
        let config = ScoreConfig::new(20.0);
        let signal = price_delta(dec("100"), dec("300"), &config).unwrap();
        assert_eq!(signal.value, 200.0);
        assert!(!signal.alert_worthy);
    }

    #[test]
    fn test_text_match_jaccard() {
        let config = ScoreConfig::new(70.0);
        // {python, sql, aws} vs {python, sql, azure}: 2 shared of 4 total.
        let signal = text_match("python sql aws", "python sql azure", &config);
        assert!((signal.value - 50.0).abs() < 1e-9);
        assert!(!signal.alert_worthy);
    }

    #[test]
    fn test_text_match_strips_stopwords() {
        let config = ScoreConfig::new(70.0);
        let signal = text_match(
            "experience with python and the aws cloud",
            "python aws cloud experience",
            &config,
        );
        // Stopwords gone, the two term sets are identical.
        assert!((signal.value - 100.0).abs() < 1e-9);
        assert!(signal.alert_worthy);
    }

    #[test]
    fn test_text_match_skill_bonus_applied() {
        let mut config = ScoreConfig::new(70.0);
        config.skills = vec!["python".to_string(), "sql".to_string()];
        config.skill_bonus = 10.0;

        let without_bonus = text_match("python sql aws", "python sql azure", &ScoreConfig::new(70.0));
        let with_bonus = text_match("python sql aws", "python sql azure", &config);
        assert!((with_bonus.value - (without_bonus.value + 20.0)).abs() < 1e-9);
        assert!(with_bonus.alert_worthy);
    }

    #[test]
    fn test_text_match_score_capped_at_100() {
        let mut config = ScoreConfig::new(70.0);
        config.skills = vec!["python".to_string(), "sql".to_string(), "aws".to_string()];
        config.skill_bonus = 50.0;

        let signal = text_match("python sql aws", "python sql aws", &config);
        assert_eq!(signal.value, 100.0);
    }

    #[test]
    fn test_text_match_empty_inputs() {
        let config = ScoreConfig::new(70.0);
        let signal = text_match("", "", &config);
        assert_eq!(signal.value, 0.0);
        assert!(!signal.alert_worthy);
    }

    #[test]
    fn test_tokenize_keeps_symbol_terms() {
        let terms = tokenize("C# and c++ developers");
        assert!(terms.contains("c#"));
        assert!(terms.contains("c++"));
        assert!(!terms.contains("and"));
    }
}
