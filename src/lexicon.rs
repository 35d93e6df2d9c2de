//! Static keyword corpus for the risk analyzer: seven risk categories, each
//! with its own keyword list, plus per-keyword severity overrides. Built
//! once into lookup tables the analyzer can query cheaply per video.

use std::collections::HashMap;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskCategory {
  HateSpeech,
  SelfHarm,
  GraphicViolence,
  ExplicitContent,
  Bullying,
  DangerousChallenges,
  Misinformation,
}

impl RiskCategory {
  pub fn all() -> [RiskCategory; 7] {
    [
      RiskCategory::HateSpeech,
      RiskCategory::SelfHarm,
      RiskCategory::GraphicViolence,
      RiskCategory::ExplicitContent,
      RiskCategory::Bullying,
      RiskCategory::DangerousChallenges,
      RiskCategory::Misinformation,
    ]
  }

  /// Canonical wire form, `SCREAMING_SNAKE_CASE`. The lowercase value form
  /// used elsewhere in this domain's original implementation is rejected —
  /// this is the one canonical form accepted at deserialization boundaries.
  pub fn as_wire_str(&self) -> &'static str {
    match self {
      RiskCategory::HateSpeech => "HATE_SPEECH",
      RiskCategory::SelfHarm => "SELF_HARM",
      RiskCategory::GraphicViolence => "GRAPHIC_VIOLENCE",
      RiskCategory::ExplicitContent => "EXPLICIT_CONTENT",
      RiskCategory::Bullying => "BULLYING",
      RiskCategory::DangerousChallenges => "DANGEROUS_CHALLENGES",
      RiskCategory::Misinformation => "MISINFORMATION",
    }
  }

  pub fn from_wire_str(value: &str) -> Option<RiskCategory> {
    Some(match value {
      "HATE_SPEECH" => RiskCategory::HateSpeech,
      "SELF_HARM" => RiskCategory::SelfHarm,
      "GRAPHIC_VIOLENCE" => RiskCategory::GraphicViolence,
      "EXPLICIT_CONTENT" => RiskCategory::ExplicitContent,
      "BULLYING" => RiskCategory::Bullying,
      "DANGEROUS_CHALLENGES" => RiskCategory::DangerousChallenges,
      "MISINFORMATION" => RiskCategory::Misinformation,
      _ => return None,
    })
  }
}

fn category_keywords(category: RiskCategory) -> &'static [&'static str] {
  match category {
    RiskCategory::HateSpeech => &[
      "hate", "extremist", "radical", "supremacy", "nazi", "racism", "racist",
      "antisemitism", "antisemitic", "bigot", "bigotry", "discrimination",
      "homophobia", "homophobic", "islamophobia", "islamophobic", "xenophobia",
      "xenophobic", "white power", "ethnic cleansing", "genocide", "kkk",
      "neo-nazi", "racial slur", "racial hatred", "religious hatred", "hate group",
      "hate speech", "hate crime", "ethnic hatred", "racial superiority",
    ],
    RiskCategory::SelfHarm => &[
      "suicide", "suicidal", "self-harm", "self harm", "cutting", "kill myself",
      "end my life", "take my own life", "don't want to live", "ways to die",
      "how to kill", "painless death", "suicide method", "suicide note",
      "suicide plan", "suicide pact", "anorexia tips", "bulimia tips",
      "pro-ana", "pro-mia", "thinspiration", "depression", "hopeless",
      "self-injury", "self-mutilation", "self-destruction",
    ],
    RiskCategory::GraphicViolence => &[
      "gore", "graphic violence", "brutal", "brutality", "torture", "beheading",
      "execution", "murder", "killing", "blood", "bloody", "massacre", "slaughter",
      "dismemberment", "mutilation", "gruesome", "gory", "horrific", "violent death",
      "extreme violence", "deadly assault", "violent attack", "shooting footage",
      "stabbing video", "real death", "real murder", "real killing", "snuff",
    ],
    RiskCategory::ExplicitContent => &[
      "pornography", "porn", "xxx", "adult content", "explicit content", "nude",
      "nudity", "sexual content", "sexual activity", "sexual act", "sex video",
      "sex tape", "onlyfans", "adult film", "adult video", "adult movie",
      "sexually explicit", "erotic", "erotica", "strip", "striptease",
      "webcam show", "cam girl", "cam boy", "adult performer", "adult star",
    ],
    RiskCategory::Bullying => &[
      "bullying", "cyberbullying", "harassment", "harassing", "troll", "trolling",
      "hater", "hating", "mock", "mocking", "ridicule", "ridiculing", "humiliate",
      "humiliation", "shame", "shaming", "body shaming", "fat shaming", "insult",
      "insulting", "taunt", "taunting", "name calling", "verbal abuse", "bully victim",
      "online harassment", "internet troll", "hate comment", "hate message",
    ],
    RiskCategory::DangerousChallenges => &[
      "dangerous challenge", "viral challenge", "tide pod", "tide pod challenge",
      "fire challenge", "choking challenge", "blackout challenge", "pass out challenge",
      "skull breaker", "skull breaker challenge", "salt and ice", "salt and ice challenge",
      "cinnamon challenge", "bird box challenge", "kiki challenge", "car surfing",
      "blue whale", "blue whale challenge", "momo", "momo challenge", "outlet challenge",
      "penny challenge", "benadryl challenge", "milk crate challenge", "devious lick",
    ],
    RiskCategory::Misinformation => &[
      "fake news", "misinformation", "disinformation", "conspiracy", "conspiracy theory",
      "hoax", "propaganda", "misleading", "false information", "false claim", "debunked",
      "fact check", "pseudoscience", "anti-vax", "anti-vaccine", "climate denial",
      "climate change denial", "flat earth", "false flag", "crisis actor", "deep state",
      "qanon", "q-anon", "deep fake", "doctored video", "manipulated media",
    ],
  }
}

/// Severity weight overrides; anything absent defaults to 1.
fn keyword_severity_overrides() -> &'static HashMap<&'static str, u8> {
  static OVERRIDES: OnceLock<HashMap<&'static str, u8>> = OnceLock::new();
  OVERRIDES.get_or_init(|| {
    HashMap::from([
      ("suicide method", 3), ("suicide plan", 3), ("kill myself", 3), ("ways to die", 3),
      ("how to kill", 3), ("genocide", 3), ("ethnic cleansing", 3), ("beheading", 3),
      ("execution", 3), ("murder", 3), ("pornography", 3), ("xxx", 3), ("blue whale challenge", 3),
      ("tide pod challenge", 3), ("choking challenge", 3), ("blackout challenge", 3),
      ("suicide", 2), ("self-harm", 2), ("cutting", 2), ("hate speech", 2), ("hate crime", 2),
      ("racist", 2), ("antisemitic", 2), ("homophobic", 2), ("gore", 2), ("torture", 2),
      ("explicit content", 2), ("sexual content", 2), ("bullying", 2), ("cyberbullying", 2),
      ("dangerous challenge", 2), ("viral challenge", 2), ("skull breaker challenge", 2),
    ])
  })
}

pub fn keyword_severity(keyword: &str) -> u8 {
  *keyword_severity_overrides().get(keyword).unwrap_or(&1)
}

pub fn keyword_to_category() -> &'static HashMap<&'static str, RiskCategory> {
  static MAP: OnceLock<HashMap<&'static str, RiskCategory>> = OnceLock::new();
  MAP.get_or_init(|| {
    let mut map = HashMap::new();
    for category in RiskCategory::all() {
      for keyword in category_keywords(category) {
        map.insert(*keyword, category);
      }
    }
    map
  })
}

pub struct Lexicon {
  pub multi_word: &'static [&'static str],
  pub single_word: &'static [&'static str],
}

pub fn lexicon() -> &'static Lexicon {
  static LEXICON: OnceLock<Lexicon> = OnceLock::new();
  static MULTI: OnceLock<Vec<&'static str>> = OnceLock::new();
  static SINGLE: OnceLock<Vec<&'static str>> = OnceLock::new();

  LEXICON.get_or_init(|| {
    let all: Vec<&'static str> = RiskCategory::all()
      .into_iter()
      .flat_map(category_keywords)
      .copied()
      .collect();

    let multi = MULTI.get_or_init(|| all.iter().filter(|k| k.split(' ').count() > 1).copied().collect());
    let single = SINGLE.get_or_init(|| all.iter().filter(|k| k.split(' ').count() == 1).copied().collect());

    Lexicon {
      multi_word: multi.as_slice(),
      single_word: single.as_slice(),
    }
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn wire_form_round_trips_for_every_category() {
    for category in RiskCategory::all() {
      let wire = category.as_wire_str();
      assert_eq!(RiskCategory::from_wire_str(wire), Some(category));
    }
  }

  #[test]
  fn lowercase_wire_form_is_rejected() {
    assert_eq!(RiskCategory::from_wire_str("hate_speech"), None);
  }

  #[test]
  fn every_keyword_maps_back_to_its_category() {
    let map = keyword_to_category();
    for category in RiskCategory::all() {
      for keyword in category_keywords(category) {
        assert_eq!(map.get(keyword), Some(&category));
      }
    }
  }

  #[test]
  fn unweighted_keyword_defaults_to_one() {
    assert_eq!(keyword_severity("troll"), 1);
  }

  #[test]
  fn weighted_keyword_overrides_apply() {
    assert_eq!(keyword_severity("suicide"), 2);
    assert_eq!(keyword_severity("suicide method"), 3);
  }
}
