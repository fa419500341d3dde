#[cfg(test)]
#[path = "output_format_test.rs"]
mod tests;

use serde::Deserialize;
use serde::Serialize;
use strum::EnumIter;
use strum::EnumString;
use strum::EnumVariantNames;

/// How a prompt participates in a request for a given output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptPolicy {
    Required,
    Optional,
    Ignored,
}

#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumIter,
    EnumString,
    EnumVariantNames,
    strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Markdown,
    Ocr,
    FreeOcr,
    Figure,
    General,
    Rec,
}

impl OutputFormat {
    /// Localization output returns an annotated image reference and no text.
    pub fn is_localization(&self) -> bool {
        return *self == OutputFormat::Rec;
    }

    /// Paginated outputs collect one `PageResult` per streamed page.
    pub fn is_paginated(&self) -> bool {
        return !self.is_localization();
    }

    pub fn prompt_policy(&self) -> PromptPolicy {
        return match self {
            OutputFormat::Rec => PromptPolicy::Required,
            OutputFormat::General => PromptPolicy::Ignored,
            _ => PromptPolicy::Optional,
        };
    }
}
