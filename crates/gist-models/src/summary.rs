//! Downstream summary scheduling requests.

use serde::{Deserialize, Serialize};

use crate::job::ProcessingOptions;

/// Summary flavour requested from the summarization stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryType {
    Short,
    Long,
}

impl SummaryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SummaryType::Short => "short",
            SummaryType::Long => "long",
        }
    }

    /// Summary types enabled by the given options, short first.
    pub fn requested_by(options: &ProcessingOptions) -> Vec<SummaryType> {
        let mut types = Vec::new();
        if options.generate_short_form {
            types.push(SummaryType::Short);
        }
        if options.generate_long_form {
            types.push(SummaryType::Long);
        }
        types
    }
}

impl std::fmt::Display for SummaryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Payload handed to the summarization stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryRequest {
    pub user_id: String,
    pub document_id: String,
    pub text: String,
    pub summary_type: SummaryType,
    pub processing_options: ProcessingOptions,
}
