//! Shared curriculum types for CyberQuest.
//!
//! The curriculum itself is authored outside this crate and crosses the wasm
//! boundary as plain records; everything here is read-only data plus lookup
//! helpers. Nothing in this crate performs I/O.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(
    Copy, Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Ord, PartialOrd, Hash, tsify::Tsify,
)]
#[tsify(into_wasm_abi, from_wasm_abi)]
pub enum QuestionType {
    #[serde(rename = "MCQ")]
    Mcq,
    #[serde(rename = "TRUE_FALSE")]
    TrueFalse,
}

/// How well the user felt they understood a lesson, reported when finishing
/// the reader view.
#[derive(
    Copy, Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Ord, PartialOrd, tsify::Tsify,
)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnderstandingLevel {
    NotSet,
    Understood,
    Partial,
    NotUnderstood,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub text: String,
    pub options: Vec<String>,
    pub correct_answer_index: usize,
    /// Authored explanation. The AI tutor may supply a richer one at runtime.
    pub explanation: String,
}

impl Question {
    /// A question is answerable only if it has at least two options and its
    /// answer index points at one of them.
    pub fn is_well_formed(&self) -> bool {
        self.options.len() >= 2 && self.correct_answer_index < self.options.len()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
    pub id: String,
    pub title: String,
    /// Markdown body, rendered on the JS side.
    pub content: String,
    pub summary: String,
    pub xp_reward: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub book_reference: Option<String>,
    pub questions: Vec<Question>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "camelCase")]
pub struct Module {
    pub id: String,
    pub title: String,
    pub description: String,
    pub lessons: Vec<Lesson>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: String,
    pub title: String,
    pub description: String,
    pub modules: Vec<Module>,
    pub is_locked: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "camelCase")]
pub struct Level {
    pub id: u32,
    pub title: String,
    pub description: String,
    pub courses: Vec<Course>,
    pub is_locked: bool,
}

/// The full authored curriculum: the leveled standard track plus the
/// standalone Kali lab course.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, tsify::Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "camelCase")]
pub struct Curriculum {
    pub levels: Vec<Level>,
    pub kali_course: Course,
}

impl Curriculum {
    /// Flat lookup from lesson id to lesson, covering both the standard
    /// track and the Kali course.
    pub fn all_lessons(&self) -> BTreeMap<&str, &Lesson> {
        let mut lessons = BTreeMap::new();
        for lesson in self.standard_lessons() {
            lessons.insert(lesson.id.as_str(), lesson);
        }
        for module in &self.kali_course.modules {
            for lesson in &module.lessons {
                lessons.insert(lesson.id.as_str(), lesson);
            }
        }
        lessons
    }

    pub fn lesson(&self, id: &str) -> Option<&Lesson> {
        self.all_lessons().get(id).copied()
    }

    /// Ordered ids defining the linear next/previous traversal. Kali lessons
    /// are standalone and deliberately not part of this flow.
    pub fn lesson_order(&self) -> Vec<&str> {
        self.standard_lessons()
            .map(|lesson| lesson.id.as_str())
            .collect()
    }

    pub fn next_lesson(&self, id: &str) -> Option<&str> {
        let order = self.lesson_order();
        let index = order.iter().position(|lesson_id| *lesson_id == id)?;
        order.get(index + 1).copied()
    }

    pub fn prev_lesson(&self, id: &str) -> Option<&str> {
        let order = self.lesson_order();
        let index = order.iter().position(|lesson_id| *lesson_id == id)?;
        index.checked_sub(1).and_then(|i| order.get(i).copied())
    }

    fn standard_lessons(&self) -> impl Iterator<Item = &Lesson> {
        self.levels
            .iter()
            .flat_map(|level| &level.courses)
            .flat_map(|course| &course.modules)
            .flat_map(|module| &module.lessons)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lesson(id: &str, num_questions: usize) -> Lesson {
        Lesson {
            id: id.to_string(),
            title: format!("Lesson {id}"),
            content: "body".to_string(),
            summary: "summary".to_string(),
            xp_reward: 50,
            book_reference: None,
            questions: (0..num_questions)
                .map(|i| Question {
                    id: format!("{id}-q{i}"),
                    question_type: QuestionType::Mcq,
                    text: format!("Question {i}?"),
                    options: vec!["a".to_string(), "b".to_string(), "c".to_string()],
                    correct_answer_index: 1,
                    explanation: "because".to_string(),
                })
                .collect(),
        }
    }

    fn fixture() -> Curriculum {
        Curriculum {
            levels: vec![Level {
                id: 1,
                title: "Foundations".to_string(),
                description: String::new(),
                is_locked: false,
                courses: vec![Course {
                    id: "c1".to_string(),
                    title: "Networking".to_string(),
                    description: String::new(),
                    is_locked: false,
                    modules: vec![Module {
                        id: "m1".to_string(),
                        title: "Basics".to_string(),
                        description: String::new(),
                        lessons: vec![lesson("l1", 3), lesson("l2", 0)],
                    }],
                }],
            }],
            kali_course: Course {
                id: "kali".to_string(),
                title: "Kali Labs".to_string(),
                description: String::new(),
                is_locked: false,
                modules: vec![Module {
                    id: "km1".to_string(),
                    title: "Recon".to_string(),
                    description: String::new(),
                    lessons: vec![lesson("k1", 2)],
                }],
            },
        }
    }

    #[test]
    fn test_all_lessons_includes_kali_lessons() {
        let curriculum = fixture();
        let lessons = curriculum.all_lessons();
        assert!(lessons.contains_key("l1"));
        assert!(lessons.contains_key("l2"));
        assert!(lessons.contains_key("k1"), "Kali lessons must be reachable by id");
    }

    #[test]
    fn test_lesson_order_excludes_kali_lessons() {
        let curriculum = fixture();
        assert_eq!(curriculum.lesson_order(), vec!["l1", "l2"]);
    }

    #[test]
    fn test_next_and_prev_lesson() {
        let curriculum = fixture();
        assert_eq!(curriculum.next_lesson("l1"), Some("l2"));
        assert_eq!(curriculum.next_lesson("l2"), None);
        assert_eq!(curriculum.prev_lesson("l2"), Some("l1"));
        assert_eq!(curriculum.prev_lesson("l1"), None);
        // Kali lessons are outside the linear flow entirely
        assert_eq!(curriculum.next_lesson("k1"), None);
    }

    #[test]
    fn test_question_well_formedness() {
        let mut question = fixture().levels[0].courses[0].modules[0].lessons[0].questions[0].clone();
        assert!(question.is_well_formed());

        question.correct_answer_index = 3;
        assert!(!question.is_well_formed());

        question.correct_answer_index = 0;
        question.options.truncate(1);
        assert!(!question.is_well_formed());
    }

    #[test]
    fn test_question_serde_uses_original_field_names() {
        let question = fixture().levels[0].courses[0].modules[0].lessons[0].questions[0].clone();
        let json = serde_json::to_value(&question).unwrap();
        assert_eq!(json["type"], "MCQ");
        assert!(json.get("correctAnswerIndex").is_some());
    }
}
