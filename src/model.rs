//! Request payloads accepted by the pipeline.
//!
//! Two payload shapes exist:
//!
//! * [`MarkupRequest`]: raw LaTeX plus an engine selector, compiled as-is.
//! * [`QuestionPaperRequest`]: structured question-paper data rendered
//!   through the fixed template.
//!
//! The structured payload serialises with the long field names
//! (`qp_code`, `qp_parts[].part_name`, ...) because that is the schema the
//! template's Lua block reads back from `Reports/question.json`. Both the
//! long and the short names (`code`, `parts[].name`, ...) are accepted on
//! input.

use crate::config::Engine;
use crate::error::Qp2PdfError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Name used for the raw-markup artifact.
pub const DEFAULT_FILE_NAME: &str = "document.pdf";

/// Raw LaTeX source compiled with a caller-selected engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkupRequest {
    #[serde(alias = "latex")]
    pub source_text: String,
    #[serde(default = "default_engine")]
    pub engine: String,
}

fn default_engine() -> String {
    Engine::default().binary().to_string()
}

impl MarkupRequest {
    /// Parse the engine selector.
    pub fn engine(&self) -> Result<Engine, Qp2PdfError> {
        self.engine.parse()
    }

    /// Check the payload before any workspace is created.
    pub fn validate(&self) -> Result<Engine, Qp2PdfError> {
        let engine = self.engine()?;
        if self.source_text.trim().is_empty() {
            return Err(Qp2PdfError::InvalidInput("source_text is empty".into()));
        }
        Ok(engine)
    }
}

/// One section of a question paper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionPart {
    #[serde(rename = "part_name", alias = "name")]
    pub name: String,
    #[serde(rename = "part_title", alias = "title")]
    pub title: String,
    #[serde(rename = "part_description", alias = "description")]
    pub description: String,
    /// Ordered content fragments: plain markup or `tabular` blocks.
    pub content: Vec<String>,
    pub footer: String,
}

/// Optional font families overriding the template defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FontOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arabic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arabic_scale: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hindi: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hindi_scale: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub malayalam: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub malayalam_scale: Option<String>,
}

/// Structured question-paper document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionPaperRequest {
    #[serde(rename = "qp_code", alias = "code")]
    pub code: String,
    #[serde(rename = "qp_name", alias = "title")]
    pub title: String,
    #[serde(rename = "qp_stream", alias = "stream")]
    pub stream: String,
    pub course_name: String,
    pub admission_year: String,
    pub time: String,
    pub max_marks: String,
    #[serde(rename = "qp_parts", alias = "parts")]
    pub parts: Vec<QuestionPart>,
    /// Image name → source (URL, `data:image/...;base64,` payload, or local path).
    #[serde(default, skip_serializing)]
    pub images: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fonts: Option<FontOverrides>,
    /// Encrypt the artifact with the date-derived password.
    #[serde(default, skip_serializing)]
    pub password: bool,
}

impl QuestionPaperRequest {
    /// Check field invariants before any workspace is created.
    pub fn validate(&self) -> Result<(), Qp2PdfError> {
        if self.code.trim().is_empty() {
            return Err(Qp2PdfError::InvalidInput("qp_code is empty".into()));
        }
        for (i, part) in self.parts.iter().enumerate() {
            let fields = [
                ("part_name", &part.name),
                ("part_title", &part.title),
                ("part_description", &part.description),
                ("footer", &part.footer),
            ];
            for (field, value) in fields {
                if value.trim().is_empty() {
                    return Err(Qp2PdfError::InvalidInput(format!(
                        "qp_parts[{i}].{field} is empty"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Attachment name derived from the paper code.
    pub fn file_name(&self) -> String {
        let safe: String = self
            .code
            .trim()
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        format!("{safe}.pdf")
    }
}

/// Either payload shape, as received on `/convert`.
#[derive(Debug, Clone)]
pub enum ConvertRequest {
    Markup(MarkupRequest),
    QuestionPaper(Box<QuestionPaperRequest>),
}

impl ConvertRequest {
    /// Parse and validate a JSON body.
    ///
    /// Objects carrying `source_text` (or `latex`) are raw-markup requests;
    /// everything else must be a question paper.
    pub fn from_json(body: &[u8]) -> Result<Self, Qp2PdfError> {
        let value: serde_json::Value = serde_json::from_slice(body)
            .map_err(|e| Qp2PdfError::InvalidInput(format!("Malformed JSON: {e}")))?;

        let Some(obj) = value.as_object() else {
            return Err(Qp2PdfError::InvalidInput(
                "Request body must be a JSON object".into(),
            ));
        };

        let request = if obj.contains_key("source_text") || obj.contains_key("latex") {
            let req: MarkupRequest = serde_json::from_value(value)
                .map_err(|e| Qp2PdfError::InvalidInput(e.to_string()))?;
            ConvertRequest::Markup(req)
        } else {
            let req: QuestionPaperRequest = serde_json::from_value(value)
                .map_err(|e| Qp2PdfError::InvalidInput(e.to_string()))?;
            ConvertRequest::QuestionPaper(Box::new(req))
        };

        request.validate()?;
        Ok(request)
    }

    pub fn validate(&self) -> Result<(), Qp2PdfError> {
        match self {
            ConvertRequest::Markup(req) => req.validate().map(|_| ()),
            ConvertRequest::QuestionPaper(req) => req.validate(),
        }
    }

    /// Attachment name for the compiled artifact.
    pub fn file_name(&self) -> String {
        match self {
            ConvertRequest::Markup(_) => DEFAULT_FILE_NAME.to_string(),
            ConvertRequest::QuestionPaper(req) => req.file_name(),
        }
    }
}
