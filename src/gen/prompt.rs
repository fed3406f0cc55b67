//! Learner profile context assembly.
//!
//! Every call to the generation service carries a context string. When a
//! learner profile is known, a mandatory-instructions block is prepended so
//! the service adapts language, complexity, and presentation to the student.

use chrono::{Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Reminder appended to the question when a profile is present.
pub const PROFILE_REMINDER: &str =
    "[Remember to follow the student profile instructions provided in the context]";

/// Education level of the student, with the answer complexity it implies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GradeLevel {
    #[serde(rename = "1ciclo")]
    FirstCycle,
    #[serde(rename = "2ciclo")]
    SecondCycle,
    #[serde(rename = "3ciclo")]
    ThirdCycle,
    #[serde(rename = "secundario")]
    Secondary,
    #[serde(rename = "superior")]
    Higher,
}

impl GradeLevel {
    fn name(self) -> &'static str {
        match self {
            Self::FirstCycle => "1st Cycle (ages 6-10)",
            Self::SecondCycle => "2nd Cycle (ages 10-12)",
            Self::ThirdCycle => "3rd Cycle (ages 12-15)",
            Self::Secondary => "Secondary Education (ages 15-18)",
            Self::Higher => "Higher Education",
        }
    }

    fn complexity(self) -> &'static str {
        match self {
            Self::FirstCycle => "very simple, use short sentences and basic vocabulary",
            Self::SecondCycle => "simple, avoid complex terms",
            Self::ThirdCycle => {
                "moderate, you can introduce some technical terms with explanations"
            }
            Self::Secondary => "intermediate, use proper academic vocabulary",
            Self::Higher => "advanced, use technical and academic language",
        }
    }
}

fn region_language(region: &str) -> &'static str {
    match region {
        "Portugal" => "Portuguese (Portugal)",
        "Brasil" => "Portuguese (Brazil)",
        "Spain" => "Spanish",
        "France" => "French",
        "Germany" => "German",
        "Italy" => "Italian",
        "UK" => "English (British)",
        "USA" => "English (American)",
        _ => "Portuguese",
    }
}

/// What is known about the student reading the answers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LearnerProfile {
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub grade_level: Option<GradeLevel>,
    #[serde(default)]
    pub special_needs: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
}

impl LearnerProfile {
    pub fn is_empty(&self) -> bool {
        self.region.is_none()
            && self.grade_level.is_none()
            && self
                .special_needs
                .as_deref()
                .map_or(true, |needs| needs.trim().is_empty())
            && self.date_of_birth.is_none()
    }

    pub fn age(&self) -> Option<u32> {
        let dob = self.date_of_birth?;
        let today = Utc::now().date_naive();
        let mut age = today.year() - dob.year();
        if (today.month(), today.day()) < (dob.month(), dob.day()) {
            age -= 1;
        }
        (age > 0).then_some(age as u32)
    }

    /// The mandatory-instructions block sent ahead of any other context.
    pub fn context_block(&self) -> String {
        if self.is_empty() {
            return String::new();
        }

        let mut lines = vec![
            "=== MANDATORY INSTRUCTIONS ===".to_string(),
            "YOU MUST follow these guidelines when responding:".to_string(),
            String::new(),
        ];

        if let Some(region) = &self.region {
            lines.push(format!(
                "1. LANGUAGE: Respond ONLY in {}",
                region_language(region)
            ));
        }

        if let Some(grade) = self.grade_level {
            lines.push(format!("2. EDUCATION LEVEL: Student is in {}", grade.name()));
            lines.push(format!("   - Complexity: {}", grade.complexity()));
        }

        if let Some(needs) = self.special_needs.as_deref().filter(|n| !n.trim().is_empty()) {
            lines.push(format!("3. SPECIAL NEEDS: This student has {}", needs));
            lines.push("   YOU MUST adapt your response:".to_string());

            let lowered = needs.to_lowercase();
            if lowered.contains("adhd") {
                lines.push("   - Use ONLY short sentences (max 15 words)".to_string());
                lines.push("   - Use bullet points and numbered lists".to_string());
                lines.push("   - Break information into 3-5 small steps".to_string());
                lines.push("   - Start with concrete examples before theory".to_string());
            }
            if lowered.contains("dyslexia") || lowered.contains("dislexia") {
                lines.push("   - Use simple, common words (avoid complex vocabulary)".to_string());
                lines.push("   - Keep paragraphs to 2-3 sentences maximum".to_string());
                lines.push("   - Use analogies and visual descriptions".to_string());
                lines.push("   - Avoid long, dense text blocks".to_string());
            }
            if lowered.contains("autism") || lowered.contains("autismo") {
                lines.push("   - Be extremely literal and specific".to_string());
                lines.push("   - NO metaphors, idioms, or abstract language".to_string());
                lines.push("   - Use clear structure with headings".to_string());
                lines.push("   - Provide step-by-step instructions".to_string());
            }
            if lowered.contains("dyscalculia") || lowered.contains("discalculia") {
                lines.push("   - For math: use visual representations and diagrams".to_string());
                lines.push("   - Show ALL calculation steps (never skip steps)".to_string());
                lines.push("   - Use real-world examples and analogies".to_string());
                lines.push("   - Relate numbers to tangible objects".to_string());
            }
        }

        if let Some(age) = self.age() {
            lines.push(format!(
                "4. AGE: Student is {} years old - use age-appropriate examples and references",
                age
            ));
        }

        lines.push(String::new());
        lines.push("=== END OF MANDATORY INSTRUCTIONS ===".to_string());
        lines.push(String::new());
        lines.join("\n")
    }
}

/// Join the profile block with free-form session context, skipping blanks.
pub fn compose_context(profile: &LearnerProfile, session_context: &str) -> String {
    let block = profile.context_block();
    [block.as_str(), session_context]
        .iter()
        .filter(|part| !part.trim().is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Attach the profile reminder to the outgoing question.
pub fn enhance_question(question: &str, profile: &LearnerProfile) -> String {
    if profile.is_empty() {
        question.to_string()
    } else {
        format!("{question}\n\n{PROFILE_REMINDER}")
    }
}
