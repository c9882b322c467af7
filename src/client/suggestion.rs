//! Structured view of a completed suggestion.
//!
//! The relay asks the model for a fixed six-line template. Parsing is
//! lenient: lines may arrive in any order, unknown lines are ignored, and
//! missing keys simply stay empty.

use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Suggestion {
    /// Proposed next set, e.g. `77.5kg x 8 (RPE 8)`.
    pub next_set: Option<String>,
    pub progression: Option<String>,
    /// `None` when the model reported no anomaly.
    pub anomaly: Option<String>,
    /// SUMMARY1..SUMMARY3, in key order.
    pub summary: Vec<String>,
}

impl Suggestion {
    /// Parse accumulated delta text.
    pub fn parse(text: &str) -> Self {
        let mut suggestion = Suggestion::default();
        let mut summary: [Option<String>; 3] = Default::default();

        for line in text.lines() {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let value = value.trim();
            if value.is_empty() {
                continue;
            }

            match key.trim().to_ascii_uppercase().as_str() {
                "NEXT_SET" => suggestion.next_set = Some(value.to_string()),
                "PROGRESSION" => suggestion.progression = Some(value.to_string()),
                "ANOMALY" => {
                    let none = value.trim_matches(|c| c == '\'' || c == '"' || c == '.');
                    if !none.eq_ignore_ascii_case("none") {
                        suggestion.anomaly = Some(value.to_string());
                    }
                }
                "SUMMARY1" => summary[0] = Some(value.to_string()),
                "SUMMARY2" => summary[1] = Some(value.to_string()),
                "SUMMARY3" => summary[2] = Some(value.to_string()),
                _ => {}
            }
        }

        suggestion.summary = summary.into_iter().flatten().collect();
        suggestion
    }

    /// True when none of the template keys were found.
    pub fn is_empty(&self) -> bool {
        self.next_set.is_none()
            && self.progression.is_none()
            && self.anomaly.is_none()
            && self.summary.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_template() {
        let text = "NEXT_SET: 75kg x 8 (RPE 8)\n\
                    PROGRESSION: +2.5kg vs last session\n\
                    ANOMALY: none\n\
                    SUMMARY1: 2 sets logged\n\
                    SUMMARY2: Reps dropped on set 2\n\
                    SUMMARY3: Volume 1125kg";
        let s = Suggestion::parse(text);

        assert_eq!(s.next_set.as_deref(), Some("75kg x 8 (RPE 8)"));
        assert_eq!(s.progression.as_deref(), Some("+2.5kg vs last session"));
        assert_eq!(s.anomaly, None);
        assert_eq!(
            s.summary,
            vec!["2 sets logged", "Reps dropped on set 2", "Volume 1125kg"]
        );
    }

    #[test]
    fn test_partial_and_reordered() {
        let text = "SUMMARY2: second\nnoise line\nANOMALY: Reps fell 3 below target\nSUMMARY1: first";
        let s = Suggestion::parse(text);

        assert_eq!(s.next_set, None);
        assert_eq!(s.anomaly.as_deref(), Some("Reps fell 3 below target"));
        assert_eq!(s.summary, vec!["first", "second"]);
    }

    #[test]
    fn test_quoted_none() {
        assert_eq!(Suggestion::parse("ANOMALY: 'none'").anomaly, None);
        assert!(Suggestion::parse("ANOMALY: 'none'").is_empty());
    }

    #[test]
    fn test_free_text() {
        assert!(Suggestion::parse("I could not follow the format.").is_empty());
    }
}
