//! Pure keyword/severity risk analyzer. No I/O: every function here takes
//! plain strings and returns plain data, so it can be exercised without a
//! database, cache, or network connection.

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use regex::Regex;

use crate::lexicon::{keyword_severity, keyword_to_category, lexicon, RiskCategory};

fn word_regex() -> &'static Regex {
  static RE: OnceLock<Regex> = OnceLock::new();
  RE.get_or_init(|| Regex::new(r"\b\w+\b").expect("static pattern compiles"))
}

/// Finds every lexicon keyword present in `text`, deduplicated. Multi-word
/// phrases are matched by substring; single words by word-boundary
/// tokenization so "hat" does not match inside "chat".
pub fn matching_keywords(text: &str) -> HashSet<&'static str> {
  let mut found = HashSet::new();
  if text.is_empty() {
    return found;
  }

  let lower = text.to_lowercase();
  let lex = lexicon();

  for keyword in lex.multi_word {
    if lower.contains(keyword) {
      found.insert(*keyword);
    }
  }

  let tokens: HashSet<&str> = word_regex().find_iter(&lower).map(|m| m.as_str()).collect();
  for keyword in lex.single_word {
    if tokens.contains(keyword) {
      found.insert(*keyword);
    }
  }

  found
}

pub fn categorize(matched: &HashSet<&'static str>) -> HashMap<RiskCategory, Vec<&'static str>> {
  let map = keyword_to_category();
  let mut categorized: HashMap<RiskCategory, Vec<&'static str>> = HashMap::new();
  for keyword in matched {
    if let Some(category) = map.get(keyword) {
      categorized.entry(*category).or_default().push(keyword);
    }
  }
  categorized
}

/// `confidence = min(1.0, 0.3 * log2(1 + total_weight))`.
pub fn risk_score(matched: &HashSet<&'static str>) -> f64 {
  if matched.is_empty() {
    return 0.0;
  }
  let total_weight: u32 = matched.iter().map(|k| keyword_severity(k) as u32).sum();
  (0.3 * (1.0 + total_weight as f64).log2()).min(1.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
  High,
  Medium,
  Low,
}

pub fn severity_for_score(score: f64) -> Severity {
  if score >= 0.7 {
    Severity::High
  } else if score >= 0.4 {
    Severity::Medium
  } else {
    Severity::Low
  }
}

#[derive(Debug, Clone)]
pub struct AnalysisVerdict {
  pub has_risk: bool,
  pub risk_categories: Vec<RiskCategory>,
  pub categorized_keywords: HashMap<RiskCategory, Vec<&'static str>>,
  pub overall_severity: Severity,
  pub confidence_score: f64,
  pub total_keywords_matched: usize,
}

/// Analyzes a video's `title`/`description` pair. Title is weighted twice
/// relative to description, matching the combined-text construction this
/// analysis approach has always used.
pub fn analyze_content(title: &str, description: &str) -> AnalysisVerdict {
  let combined = format!("{title} {title} {description}");
  let matched = matching_keywords(&combined);
  let categorized = categorize(&matched);
  let score = risk_score(&matched);

  AnalysisVerdict {
    has_risk: !matched.is_empty(),
    risk_categories: categorized.keys().copied().collect(),
    categorized_keywords: categorized,
    overall_severity: severity_for_score(score),
    confidence_score: score,
    total_keywords_matched: matched.len(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_content_has_no_risk() {
    let verdict = analyze_content("", "");
    assert!(!verdict.has_risk);
    assert_eq!(verdict.overall_severity, Severity::Low);
    assert_eq!(verdict.confidence_score, 0.0);
  }

  #[test]
  fn benign_content_has_no_risk() {
    let verdict = analyze_content("Baking sourdough bread", "A step by step guide to baking bread at home.");
    assert!(!verdict.has_risk);
  }

  #[test]
  fn single_word_keyword_respects_word_boundary() {
    // "hat" must not match inside "chat".
    let verdict = analyze_content("Live chat with fans", "Join our weekly chat session.");
    assert!(!verdict.categorized_keywords.contains_key(&RiskCategory::HateSpeech));
  }

  #[test]
  fn single_word_keyword_matches_as_its_own_token() {
    let verdict = analyze_content("The hat is red", "hat");
    assert!(verdict.categorized_keywords.is_empty());
  }

  #[test]
  fn multi_word_phrase_matches_via_substring() {
    let verdict = analyze_content("Warning: dangerous challenge going viral", "injuries reported");
    assert!(verdict.has_risk);
    assert!(verdict.categorized_keywords.contains_key(&RiskCategory::DangerousChallenges));
  }

  #[test]
  fn high_severity_keyword_drives_high_overall_severity() {
    let verdict = analyze_content("suicide method explained", "step by step");
    assert_eq!(verdict.overall_severity, Severity::High);
  }

  #[test]
  fn duplicate_keyword_mentions_do_not_double_count() {
    let verdict = analyze_content("troll troll troll", "trolling trolling");
    // "troll" and "trolling" are distinct keywords but each counted once.
    assert_eq!(verdict.total_keywords_matched, 2);
  }

  #[test]
  fn severity_thresholds_match_score_boundaries() {
    assert_eq!(severity_for_score(0.95), Severity::High);
    assert_eq!(severity_for_score(0.7), Severity::High);
    assert_eq!(severity_for_score(0.55), Severity::Medium);
    assert_eq!(severity_for_score(0.4), Severity::Medium);
    assert_eq!(severity_for_score(0.1), Severity::Low);
  }
}
