//! Question bank collaborator interface
//!
//! The engine never loads question files itself; it talks to a bank
//! through the [`QuestionBank`] trait. This module defines the question
//! model shared with the bank provider, the stable question-id contract,
//! and an [`InMemoryBank`] implementation that understands the host
//! tool's JSON bank format (useful both as the default provider and for
//! tests).

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants;

/// A stable identifier for a question, shared between the engine and the
/// bank provider
///
/// The format is a contract both sides derive identically:
/// `sectionKey::number`. It stays stable across reloads of the same bank
/// file, which is what lets a mid-round snapshot resume after a reload.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    derive_more::Display,
    derive_more::From,
)]
#[serde(transparent)]
pub struct QuestionId(String);

impl QuestionId {
    /// Derives the id for a question from its section key and number
    pub fn derive(section_key: &str, number: &str) -> Self {
        Self(format!(
            "{section_key}{sep}{number}",
            sep = constants::bank::QUESTION_ID_SEPARATOR
        ))
    }

    /// Returns the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Label of one of the up to six answer options of a question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionKey {
    /// Option "a"
    A,
    /// Option "b"
    B,
    /// Option "c"
    C,
    /// Option "d"
    D,
    /// Option "e"
    E,
    /// Option "f"
    F,
}

impl std::fmt::Display for OptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let c = match self {
            Self::A => 'a',
            Self::B => 'b',
            Self::C => 'c',
            Self::D => 'd',
            Self::E => 'e',
            Self::F => 'f',
        };
        write!(f, "{c}")
    }
}

/// A single multiple-choice question as supplied by the bank
///
/// The engine only needs the option set and the correct label; answer
/// text and explanation are carried through for the presentation layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    /// The question's number within its section (stable across reloads)
    pub number: String,
    /// The question text
    pub text: String,
    /// The labeled answer options (2–6 entries)
    pub options: BTreeMap<OptionKey, String>,
    /// Which option is the correct one
    pub correct_option: OptionKey,
    /// Free-text answer shown on reveal, if any
    pub answer_text: Option<String>,
    /// Explanation shown on reveal, if any
    pub explanation: Option<String>,
}

impl Question {
    /// Returns whether the given option label is the correct one
    pub fn is_correct(&self, key: OptionKey) -> bool {
        self.correct_option == key
    }

    /// Returns the labels of all wrong options, in label order
    pub fn wrong_options(&self) -> Vec<OptionKey> {
        self.options
            .keys()
            .copied()
            .filter(|k| *k != self.correct_option)
            .collect()
    }
}

/// Per-section summary reported to callers choosing sections for a round
#[derive(Debug, Clone, Serialize)]
pub struct SectionInfo {
    /// The section's stable key
    pub key: String,
    /// Total number of questions in the section
    pub total: usize,
    /// Questions not yet reserved by the asked-exclusion set
    pub available: usize,
}

/// The interface the engine requires from a question bank provider
///
/// Implementations must derive question ids with [`QuestionId::derive`]
/// so that ids stay stable between the engine's persisted state and a
/// reloaded bank.
pub trait QuestionBank {
    /// Returns the keys of all sections, in bank order
    fn section_keys(&self) -> Vec<String>;

    /// Returns the ids of all questions in a section, in bank order
    ///
    /// An unknown section key yields an empty list.
    fn question_ids(&self, section_key: &str) -> Vec<QuestionId>;

    /// Looks up a question by id
    fn question(&self, id: &QuestionId) -> Option<&Question>;

    /// Summarizes every section, subtracting the asked set from the
    /// available count
    fn sections(&self, asked: &HashSet<QuestionId>) -> Vec<SectionInfo> {
        self.section_keys()
            .into_iter()
            .map(|key| {
                let ids = self.question_ids(&key);
                let available = ids.iter().filter(|id| !asked.contains(id)).count();
                SectionInfo {
                    key,
                    total: ids.len(),
                    available,
                }
            })
            .collect()
    }
}

/// Errors produced while parsing a bank file
#[derive(Debug, Error)]
pub enum ParseError {
    /// The file is not valid JSON or misses required structure
    #[error("invalid bank: {0}")]
    Json(#[from] serde_json::Error),
    /// A question carries no options at all
    #[error("invalid bank: question {0} has no options")]
    NoOptions(QuestionId),
    /// A question's correct option is not among its options
    #[error("invalid bank: question {0} marks a missing option as correct")]
    MissingCorrectOption(QuestionId),
    /// Two questions in one section share a number
    #[error("invalid bank: duplicate question id {0}")]
    DuplicateId(QuestionId),
}

/// Question number as found in bank files: either a JSON string or a number
#[derive(Deserialize)]
#[serde(untagged)]
enum NumberField {
    Text(String),
    Numeric(i64),
}

impl NumberField {
    fn into_string(self) -> String {
        match self {
            Self::Text(s) => s,
            Self::Numeric(n) => n.to_string(),
        }
    }
}

#[derive(Deserialize)]
struct QuestionFile {
    number: NumberField,
    question: String,
    options: BTreeMap<OptionKey, String>,
    correct_option: OptionKey,
    #[serde(default)]
    answer_text: Option<String>,
    #[serde(default)]
    explanation: Option<String>,
}

#[derive(Deserialize)]
struct SectionFile {
    title: String,
    questions: Vec<QuestionFile>,
}

#[derive(Deserialize)]
struct BankFile {
    sections: Vec<SectionFile>,
}

/// One section of an in-memory bank
#[derive(Debug, Clone)]
struct Section {
    key: String,
    questions: Vec<Question>,
}

/// A fully-loaded question bank held in memory
///
/// Section keys follow the host tool's convention of `title|index`, so a
/// bank file produces the same keys every time it is loaded.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBank {
    sections: Vec<Section>,
    by_id: HashMap<QuestionId, (usize, usize)>,
}

impl InMemoryBank {
    /// Parses a bank from the JSON bank-file format
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] when the JSON is malformed, a question
    /// has no options, its correct option is missing from the option
    /// set, or a question id collides.
    pub fn from_json(text: &str) -> Result<Self, ParseError> {
        let file: BankFile = serde_json::from_str(text)?;

        let mut sections = Vec::with_capacity(file.sections.len());
        let mut by_id = HashMap::new();

        for (index, section) in file.sections.into_iter().enumerate() {
            let key = format!("{title}|{index}", title = section.title.trim());
            let mut questions = Vec::with_capacity(section.questions.len());

            for question in section.questions {
                let number = question.number.into_string();
                let id = QuestionId::derive(&key, &number);

                if question.options.is_empty() {
                    return Err(ParseError::NoOptions(id));
                }
                if !question.options.contains_key(&question.correct_option) {
                    return Err(ParseError::MissingCorrectOption(id));
                }
                if by_id
                    .insert(id.clone(), (sections.len(), questions.len()))
                    .is_some()
                {
                    return Err(ParseError::DuplicateId(id));
                }

                questions.push(Question {
                    number,
                    text: question.question,
                    options: question.options,
                    correct_option: question.correct_option,
                    answer_text: question.answer_text,
                    explanation: question.explanation,
                });
            }

            sections.push(Section { key, questions });
        }

        Ok(Self { sections, by_id })
    }

    /// Returns whether the bank contains no sections
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

impl QuestionBank for InMemoryBank {
    fn section_keys(&self) -> Vec<String> {
        self.sections.iter().map(|s| s.key.clone()).collect()
    }

    fn question_ids(&self, section_key: &str) -> Vec<QuestionId> {
        self.sections
            .iter()
            .find(|s| s.key == section_key)
            .map(|s| {
                s.questions
                    .iter()
                    .map(|q| QuestionId::derive(&s.key, &q.number))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn question(&self, id: &QuestionId) -> Option<&Question> {
        let (section, index) = *self.by_id.get(id)?;
        self.sections.get(section)?.questions.get(index)
    }
}
