//! Turns a severity result into the reply text sent back to the user.

use lazy_static::lazy_static;

use crate::classifier::{Assessment, SeverityResult};

const LEVEL_PLACEHOLDER: &str = "{level}";

lazy_static! {
    static ref DEFAULT_TEMPLATES: ResponseTemplates = ResponseTemplates::default();
}

/// Group of ESI levels sharing one reply template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SeverityBand {
    /// ESI 1-2
    Emergency,
    /// ESI 3
    Urgent,
    /// ESI 4-5
    Routine,
    /// No usable level
    Clarify,
}

impl SeverityBand {
    pub fn of(result: &SeverityResult) -> Self {
        match result.assessment {
            Assessment::Level(level) => match level.get() {
                1 | 2 => SeverityBand::Emergency,
                3 => SeverityBand::Urgent,
                _ => SeverityBand::Routine,
            },
            Assessment::Indeterminate => SeverityBand::Clarify,
        }
    }
}

/// Reply templates, one per band. `{level}` is replaced with the ESI number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseTemplates {
    pub emergency: String,
    pub urgent: String,
    pub routine: String,
    pub clarify: String,
}

impl Default for ResponseTemplates {
    fn default() -> Self {
        Self {
            emergency: "🚨 อาการของคุณจำเป็นต้องเข้ารับการรักษาที่ห้องฉุกเฉินทันที! (ESI {level})".to_string(),
            urgent: "🩺 ควรได้รับการประเมินโดยแพทย์โดยเร็ว (ESI {level})".to_string(),
            routine: "💊 แนะนำให้เข้ารับการตรวจที่โรงพยาบาลในวันถัดไป (ESI {level})".to_string(),
            clarify: "❓ ขออภัย ไม่สามารถประเมินอาการได้ กรุณาอธิบายอาการของคุณเพิ่มเติม".to_string(),
        }
    }
}

impl ResponseTemplates {
    pub fn template(&self, band: SeverityBand) -> &str {
        match band {
            SeverityBand::Emergency => &self.emergency,
            SeverityBand::Urgent => &self.urgent,
            SeverityBand::Routine => &self.routine,
            SeverityBand::Clarify => &self.clarify,
        }
    }

    pub fn format(&self, result: &SeverityResult) -> String {
        let template = self.template(SeverityBand::of(result));
        match result.severity() {
            Some(level) => template.replace(LEVEL_PLACEHOLDER, &level.to_string()),
            None => template.to_string(),
        }
    }
}

/// Formats `result` with the default Thai templates.
pub fn format(result: &SeverityResult) -> String {
    DEFAULT_TEMPLATES.format(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::SeverityLevel;

    fn level(n: u8) -> SeverityResult {
        SeverityResult::level(SeverityLevel::new(n).unwrap())
    }

    #[test]
    fn test_bands() {
        assert_eq!(SeverityBand::of(&level(1)), SeverityBand::Emergency);
        assert_eq!(SeverityBand::of(&level(2)), SeverityBand::Emergency);
        assert_eq!(SeverityBand::of(&level(3)), SeverityBand::Urgent);
        assert_eq!(SeverityBand::of(&level(4)), SeverityBand::Routine);
        assert_eq!(SeverityBand::of(&level(5)), SeverityBand::Routine);
        assert_eq!(SeverityBand::of(&SeverityResult::indeterminate()), SeverityBand::Clarify);
    }

    #[test]
    fn test_format_every_outcome() {
        let mut outcomes: Vec<SeverityResult> = (1..=5).map(level).collect();
        outcomes.push(SeverityResult::indeterminate());

        for result in &outcomes {
            let text = format(result);
            assert!(!text.is_empty());
            assert!(!text.contains(LEVEL_PLACEHOLDER));
            assert_eq!(text, format(result));
            if let Some(level) = result.severity() {
                assert!(text.ends_with(&format!("(ESI {})", level)));
            }
        }

        assert!(format(&level(1)).starts_with("🚨"));
        assert!(format(&level(3)).starts_with("🩺"));
        assert!(format(&level(5)).starts_with("💊"));
    }

    #[test]
    fn test_rationale_not_in_reply() {
        let result = level(2).with_rationale("confidence 0.91");
        assert_eq!(format(&result), format(&level(2)));
    }

    #[test]
    fn test_custom_templates() {
        let templates = ResponseTemplates {
            emergency: "Go to the ER now (level {level})".into(),
            clarify: "Tell me more".into(),
            ..ResponseTemplates::default()
        };
        assert_eq!(templates.format(&level(2)), "Go to the ER now (level 2)");
        assert_eq!(templates.format(&SeverityResult::indeterminate()), "Tell me more");
        assert_eq!(templates.format(&level(4)), format(&level(4)));
    }
}
