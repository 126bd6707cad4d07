use crate::validation::{MessageSink, ValidationIssue, ValidationSeverity};

pub const CONCEPT_DISPLAY_PRESENCE_MIXED: &str = "concept-display-presence-mixed";

const MIXED_MESSAGE: &str = "This code system has a mix of concepts with and without displays, \
                             which may indicate that the displays are incomplete";

/// Tracks whether the concepts of one code system consistently carry display
/// text.
///
/// One tracker belongs to one validation pass over one concept list. It only
/// ever produces an information-level hint, never an error.
#[derive(Debug, Clone, Default)]
pub struct ConceptDisplayTracker {
    saw_missing_display: bool,
    saw_present_display: bool,
}

impl ConceptDisplayTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Note one concept
    pub fn observe(&mut self, has_display: bool) {
        if has_display {
            self.saw_present_display = true;
        } else {
            self.saw_missing_display = true;
        }
    }

    /// Note one concept by its display value; only absent or empty text
    /// counts as missing
    pub fn observe_display(&mut self, display: Option<&str>) {
        self.observe(display.is_some_and(|d| !d.is_empty()));
    }

    pub fn is_mixed(&self) -> bool {
        self.saw_missing_display && self.saw_present_display
    }

    /// Finish the pass, yielding the hint when displays were mixed
    pub fn finish(&self, path: &str) -> Option<ValidationIssue> {
        self.is_mixed().then(|| {
            ValidationIssue::information(CONCEPT_DISPLAY_PRESENCE_MIXED, MIXED_MESSAGE)
                .with_path(path)
        })
    }

    /// Finish the pass into `messages`, located at the concept list.
    ///
    /// Returns `false` when the hint was recorded.
    pub fn report(
        &self,
        messages: &mut dyn MessageSink,
        line: Option<u32>,
        column: Option<u32>,
        path: &str,
    ) -> bool {
        messages.record(
            ValidationSeverity::Information,
            CONCEPT_DISPLAY_PRESENCE_MIXED,
            line,
            column,
            path,
            !self.is_mixed(),
            MIXED_MESSAGE,
        )
    }
}
