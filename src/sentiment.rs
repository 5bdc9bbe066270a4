//! Text → (polarity, subjectivity) scoring behind a small trait, so the record processor
//! does not care which off-the-shelf model is plugged in.

use vader_sentiment::SentimentIntensityAnalyzer;

/// Sentiment of one text body.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sentiment {
    /// -1.0 (negative) ..= 1.0 (positive)
    pub polarity: f64,
    /// 0.0 (factual) ..= 1.0 (opinionated)
    pub subjectivity: f64,
}

/// A pure function of the text: same input and model version, same output.
pub trait SentimentModel: Send + Sync {
    fn score(&self, text: &str) -> Sentiment;
}

/// VADER lexicon/rule-based scorer.
///
/// polarity is the normalized compound score; subjectivity is the share of the text's
/// valence that is non-neutral (`pos + neg`). Text with no polar words (subjectivity 0)
/// scores polarity 0, whatever emphasis punctuation does to the compound score.
pub struct VaderModel {
    analyzer: SentimentIntensityAnalyzer<'static>,
}

impl VaderModel {
    pub fn new() -> Self {
        Self { analyzer: SentimentIntensityAnalyzer::new() }
    }
}

impl Default for VaderModel {
    fn default() -> Self {
        Self::new()
    }
}

impl SentimentModel for VaderModel {
    fn score(&self, text: &str) -> Sentiment {
        if text.trim().is_empty() {
            return Sentiment { polarity: 0.0, subjectivity: 0.0 };
        }
        let scores = self.analyzer.polarity_scores(text);
        let get = |k: &str| scores.get(k).copied().unwrap_or(0.0);
        let subjectivity = (get("pos") + get("neg")).clamp(0.0, 1.0);
        if subjectivity == 0.0 {
            return Sentiment { polarity: 0.0, subjectivity };
        }
        Sentiment { polarity: get("compound").clamp(-1.0, 1.0), subjectivity }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scoring_is_deterministic() {
        let m = VaderModel::new();
        let text = "I love Rust, but the borrow checker is sometimes terrible!";
        let a = m.score(text);
        for _ in 0..5 {
            assert_eq!(m.score(text), a);
        }
        assert_eq!(VaderModel::new().score(text), a);
    }

    #[test]
    fn scores_stay_in_range_and_have_the_right_sign() {
        let m = VaderModel::new();
        let pos = m.score("This is great, I love it. Wonderful work!");
        let neg = m.score("This is awful. I hate it, terrible and horrible.");
        let neutral = m.score("The meeting is on Tuesday.");
        let empty = m.score("");

        assert!(pos.polarity > 0.0 && pos.polarity <= 1.0);
        assert!(neg.polarity < 0.0 && neg.polarity >= -1.0);
        for s in [pos, neg, neutral, empty] {
            assert!((-1.0..=1.0).contains(&s.polarity));
            assert!((0.0..=1.0).contains(&s.subjectivity));
        }
        assert!(pos.subjectivity > neutral.subjectivity);
        assert_eq!(empty, Sentiment { polarity: 0.0, subjectivity: 0.0 });
    }

    #[test]
    fn punctuation_alone_carries_no_sentiment() {
        let m = VaderModel::new();
        for text in ["!!!!", "?!?!", "..."] {
            assert_eq!(m.score(text), Sentiment { polarity: 0.0, subjectivity: 0.0 }, "{text:?}");
        }
    }
}
