//! Ground-truth labels supplied by an evaluation harness.
//!
//! Two on-disk layouts are accepted:
//!
//! ```text
//! { "poisoned_files": { "backdoor_triggers": ["12.txt"], ... },
//!   "clean_files": ["1.txt", ...] }
//!
//! { "labels": { "12.txt": { "poisoned": true, "attack_type": "spam_links" } } }
//! ```
//!
//! The first is what the dataset poisoning generator writes; extra keys such
//! as `poison_statistics` are ignored.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::error::{AntidoteError, Result};
use super::file::FileId;

/// Category of poisoning applied to a file.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AttackType {
    BackdoorTriggers,
    BiasInjection,
    SpamLinks,
    Misinformation,
    ExpressionBombing,
    SleeperAgent,
    GradientInjection,
    SemanticBackdoor,
    InvisibleCharacters,
    Homoglyphs,
    ModelExtraction,
    AdversarialSuffix,
    PiiLeakage,
    InstructionHijack,
    TokenizerAttack,
    Other(String),
}

impl AttackType {
    pub fn as_str(&self) -> &str {
        match self {
            AttackType::BackdoorTriggers => "backdoor_triggers",
            AttackType::BiasInjection => "bias_injection",
            AttackType::SpamLinks => "spam_links",
            AttackType::Misinformation => "misinformation",
            AttackType::ExpressionBombing => "expression_bombing",
            AttackType::SleeperAgent => "sleeper_agent",
            AttackType::GradientInjection => "gradient_injection",
            AttackType::SemanticBackdoor => "semantic_backdoor",
            AttackType::InvisibleCharacters => "invisible_characters",
            AttackType::Homoglyphs => "homoglyphs",
            AttackType::ModelExtraction => "model_extraction",
            AttackType::AdversarialSuffix => "adversarial_suffix",
            AttackType::PiiLeakage => "pii_leakage",
            AttackType::InstructionHijack => "instruction_hijack",
            AttackType::TokenizerAttack => "tokenizer_attack",
            AttackType::Other(name) => name,
        }
    }
}

impl From<String> for AttackType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "backdoor_triggers" | "backdoor" => AttackType::BackdoorTriggers,
            "bias_injection" | "bias" => AttackType::BiasInjection,
            "spam_links" | "spam" => AttackType::SpamLinks,
            "misinformation" => AttackType::Misinformation,
            "expression_bombing" => AttackType::ExpressionBombing,
            "sleeper_agent" => AttackType::SleeperAgent,
            "gradient_injection" => AttackType::GradientInjection,
            "semantic_backdoor" => AttackType::SemanticBackdoor,
            "invisible_characters" | "invisible_character" => AttackType::InvisibleCharacters,
            "homoglyphs" | "homoglyph" => AttackType::Homoglyphs,
            "model_extraction" => AttackType::ModelExtraction,
            "adversarial_suffix" => AttackType::AdversarialSuffix,
            "pii_leakage" => AttackType::PiiLeakage,
            "instruction_hijack" => AttackType::InstructionHijack,
            "tokenizer_attack" => AttackType::TokenizerAttack,
            _ => AttackType::Other(s),
        }
    }
}

impl From<AttackType> for String {
    fn from(t: AttackType) -> Self {
        t.as_str().to_string()
    }
}

impl fmt::Display for AttackType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Label for one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundTruthLabel {
    pub poisoned: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attack_type: Option<AttackType>,
}

/// Read-only mapping of file id to poisoned/clean label.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroundTruthSet {
    labels: BTreeMap<FileId, GroundTruthLabel>,
    poisoned: BTreeSet<FileId>,
}

#[derive(Deserialize)]
struct GeneratorLayout {
    poisoned_files: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    clean_files: Vec<String>,
}

#[derive(Deserialize)]
struct FlatLayout {
    labels: BTreeMap<String, GroundTruthLabel>,
}

impl GroundTruthSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a label (builder style, used by harnesses and tests).
    pub fn with_label(mut self, file: impl Into<FileId>, label: GroundTruthLabel) -> Self {
        self.insert(file.into(), label);
        self
    }

    pub fn with_poisoned(self, file: impl Into<FileId>, attack_type: AttackType) -> Self {
        self.with_label(
            file,
            GroundTruthLabel {
                poisoned: true,
                attack_type: Some(attack_type),
            },
        )
    }

    pub fn with_clean(self, file: impl Into<FileId>) -> Self {
        self.with_label(
            file,
            GroundTruthLabel {
                poisoned: false,
                attack_type: None,
            },
        )
    }

    fn insert(&mut self, file: FileId, label: GroundTruthLabel) {
        if label.poisoned {
            self.poisoned.insert(file.clone());
        } else {
            self.poisoned.remove(&file);
        }
        self.labels.insert(file, label);
    }

    /// Parse either supported layout.
    pub fn from_json(raw: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(raw)?;
        let mut set = Self::new();

        if value.get("labels").is_some() {
            let flat: FlatLayout = serde_json::from_value(value)?;
            for (file, label) in flat.labels {
                set.insert(FileId(file), label);
            }
            return Ok(set);
        }

        if value.get("poisoned_files").is_some() {
            let gen: GeneratorLayout = serde_json::from_value(value)?;
            for file in gen.clean_files {
                set.insert(
                    FileId(file),
                    GroundTruthLabel {
                        poisoned: false,
                        attack_type: None,
                    },
                );
            }
            for (attack, files) in gen.poisoned_files {
                let attack_type = AttackType::from(attack);
                for file in files {
                    set.insert(
                        FileId(file),
                        GroundTruthLabel {
                            poisoned: true,
                            attack_type: Some(attack_type.clone()),
                        },
                    );
                }
            }
            return Ok(set);
        }

        Err(AntidoteError::GroundTruth(
            "expected a `labels` or `poisoned_files` object".to_string(),
        ))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn label(&self, file: &FileId) -> Option<&GroundTruthLabel> {
        self.labels.get(file)
    }

    pub fn is_poisoned(&self, file: &FileId) -> bool {
        self.poisoned.contains(file)
    }

    pub fn poisoned(&self) -> &BTreeSet<FileId> {
        &self.poisoned
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Poisoned files grouped by attack type. Files without an attack type
    /// are grouped under `Other("unknown")`.
    pub fn poisoned_by_attack_type(&self) -> BTreeMap<AttackType, BTreeSet<FileId>> {
        let mut out: BTreeMap<AttackType, BTreeSet<FileId>> = BTreeMap::new();
        for file in &self.poisoned {
            let attack = self
                .labels
                .get(file)
                .and_then(|l| l.attack_type.clone())
                .unwrap_or_else(|| AttackType::Other("unknown".to_string()));
            out.entry(attack).or_default().insert(file.clone());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_generator_layout() {
        let raw = r#"{
            "total_files": 4,
            "poisoned_files": { "spam_links": ["2.txt"], "backdoor_triggers": ["3.txt"] },
            "clean_files": ["1.txt", "4.txt"],
            "poison_statistics": { "total_poisoned": 2 }
        }"#;
        let gt = GroundTruthSet::from_json(raw).unwrap();
        assert_eq!(gt.len(), 4);
        assert!(gt.is_poisoned(&"2.txt".into()));
        assert!(!gt.is_poisoned(&"1.txt".into()));
        assert_eq!(
            gt.label(&"3.txt".into()).unwrap().attack_type,
            Some(AttackType::BackdoorTriggers)
        );
    }

    #[test]
    fn parses_flat_layout() {
        let raw = r#"{ "labels": {
            "a.txt": { "poisoned": true, "attack_type": "homoglyph" },
            "b.txt": { "poisoned": false }
        } }"#;
        let gt = GroundTruthSet::from_json(raw).unwrap();
        assert_eq!(gt.poisoned().len(), 1);
        assert_eq!(
            gt.label(&"a.txt".into()).unwrap().attack_type,
            Some(AttackType::Homoglyphs)
        );
    }

    #[test]
    fn rejects_unknown_layout() {
        let err = GroundTruthSet::from_json(r#"{"files": []}"#).unwrap_err();
        assert!(err.to_string().contains("invalid ground truth"));
    }

    #[test]
    fn unknown_attack_type_is_preserved() {
        let t = AttackType::from("prompt_smuggling".to_string());
        assert_eq!(t, AttackType::Other("prompt_smuggling".into()));
        assert_eq!(t.to_string(), "prompt_smuggling");
    }

    #[test]
    fn groups_by_attack_type() {
        let gt = GroundTruthSet::new()
            .with_poisoned("1.txt", AttackType::SpamLinks)
            .with_poisoned("2.txt", AttackType::SpamLinks)
            .with_poisoned("3.txt", AttackType::PiiLeakage)
            .with_clean("4.txt");
        let groups = gt.poisoned_by_attack_type();
        assert_eq!(groups[&AttackType::SpamLinks].len(), 2);
        assert_eq!(groups[&AttackType::PiiLeakage].len(), 1);
    }
}
