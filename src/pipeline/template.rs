//! Template rendering: turn a request into the `.tex` file the engine reads.
//!
//! * Raw markup is written verbatim to `document.tex`.
//! * A question paper is serialised to `Reports/question.json` and paired
//!   with the fixed template in `question.tex`.
//!
//! ## Template modes
//!
//! In [`TemplateMode::Lua`] the `.tex` body is a `luacode*` block that reads
//! the data file back at compile time and prints the header, part banners,
//! fragments and footers. If the data file is missing or malformed the
//! block prints an error marker into the document instead of failing the
//! run. [`TemplateMode::Direct`] emits the same body in-process so the
//! source can be inspected without running Lua; the data file is still
//! written.

use crate::config::TemplateMode;
use crate::error::Qp2PdfError;
use crate::model::{FontOverrides, QuestionPaperRequest};
use crate::pipeline::workspace::Workspace;
use std::path::Path;
use tracing::debug;

/// Source stem for raw markup.
pub const MARKUP_STEM: &str = "document";

/// Source stem for question papers.
pub const DOCUMENT_STEM: &str = "question";

/// Data file name inside the reports directory.
pub const DATA_FILE: &str = "question.json";

/// Marker that makes a fragment a pre-formatted table.
const TABLE_MARKER: &str = r"\begin{tabular}";

// ── Template text ────────────────────────────────────────────────────────

/// Shared preamble: page geometry, graphics defaults and the multilingual
/// font setup.
pub const PREAMBLE: &str = r"\documentclass[11pt]{article}
\usepackage[a4paper,margin=1.4cm]{geometry}
\usepackage{zref-totpages}
\usepackage{array}
\usepackage{polyglossia}
\usepackage{fontspec}
\usepackage{tabularray}
\usepackage{tikz}
\usepackage{enumitem}
\usepackage{luacode}
\usepackage{luapackageloader}
\usepackage{multicol}
\usepackage[draft=false]{graphicx}
\graphicspath{{./Photo/Qpbank/}}
\setkeys{Gin}{keepaspectratio,width=0.3\textwidth,height=0.3\textheight}
\usepackage{lastpage}
\usepackage{tabularx}
\usepackage{booktabs}
\usepackage{multirow}
\usepackage{amsmath}

\setdefaultlanguage{english}
\setotherlanguage{hindi}
\setotherlanguage{malayalam}
\setotherlanguage{arabic}

\newfontfamily\arabicfont[Script=Arabic,Scale=1.3]{Lateef}
\newfontfamily\devanagarifont[Script=Devanagari,Scale=1.2]{Lohit Devanagari}
\newfontfamily\hindifont[Script=Devanagari,Scale=1.2]{Lohit Devanagari}
\newfontfamily\malayalamfont[Script=Malayalam,Scale=1.2]{Rachana}

";

/// Body that renders the paper from `Reports/question.json` at compile time.
const LUA_BODY: &str = r#"\begin{luacode*}
    json = require('dkjson')
    lfs = require('lfs')
    local jsonPath = lfs.currentdir() .. "/Reports/question.json"

    local function readAll(file)
        local f = io.open(file, "rb")
        if not f then return nil end
        local content = f:read("*all")
        f:close()
        return content
    end

    local contents = readAll(jsonPath)
    if not contents then
        tex.print("Error: Could not read JSON data from " .. jsonPath)
        return
    end

    local data, pos, err = json.decode(contents, 1, nil)
    if err or type(data) ~= "table" then
        tex.print("Error decoding JSON: " .. tostring(err))
        return
    end

    local fonts = data.fonts or {}
    if fonts.arabic then
        tex.print("\\newfontfamily\\arabicfont[Script=Arabic,Scale=" .. (fonts.arabic_scale or "1.3") .. "]{" .. fonts.arabic .. "}")
    end
    if fonts.hindi then
        tex.print("\\newfontfamily\\hindifont[Script=Devanagari,Scale=" .. (fonts.hindi_scale or "1.2") .. "]{" .. fonts.hindi .. "}")
    end
    if fonts.malayalam then
        tex.print("\\newfontfamily\\malayalamfont[Script=Malayalam,Scale=" .. (fonts.malayalam_scale or "1.2") .. "]{" .. fonts.malayalam .. "}")
    end

    tex.print(data.qp_code .. "\\hfill  Name .............................")
    tex.print("\\begin{flushright}")
    tex.print("Reg.No .............................\\\\")
    tex.print("\\end{flushright}")
    tex.print("\\begin{center}")
    tex.print("\\begin{minipage}{5in}")
    tex.print("\\centering")
    tex.print(data.qp_name)
    tex.print("\\end{minipage} \\\\")
    tex.print("\\vspace{0.3cm}")
    tex.print("\\end{center}")
    tex.print("Time : " .. data.time .. " \\hfill " .. "Max marks : " .. data.max_marks)
    tex.print("\\begin{enumerate}")
    for _, row in ipairs(data.qp_parts or {}) do
        tex.print("\\begin{center}")
        tex.print("\\textbf{" .. row.part_name .. "} \\\\")
        tex.print("\\texttt{" .. row.part_description .. "} \\\\")
        tex.print("\\end{center}")
        for _, part in ipairs(row.content or {}) do
            if string.find(part, "\\begin{tabular}", 1, true) then
                tex.print(part)
            else
                tex.print(part .. " \\\\")
                tex.print(" \\\\")
            end
        end
        tex.print("\\begin{flushright}")
        tex.print("\\texttt{\\textbf{" .. row.footer .. "}} \\\\")
        tex.print("\\end{flushright}")
    end
    tex.print("\\end{enumerate}")
\end{luacode*}
"#;

// ── Fragments ────────────────────────────────────────────────────────────

/// How a content fragment is emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentKind {
    /// Printed followed by a line break and a blank spacer line.
    Markup,
    /// A `tabular` block, printed verbatim.
    Table,
}

impl FragmentKind {
    pub fn of(fragment: &str) -> Self {
        if fragment.contains(TABLE_MARKER) {
            FragmentKind::Table
        } else {
            FragmentKind::Markup
        }
    }
}

// ── Rendering ────────────────────────────────────────────────────────────

/// Full `.tex` source for a question paper.
pub fn render_source(doc: &QuestionPaperRequest, mode: TemplateMode) -> String {
    let body = match mode {
        TemplateMode::Lua => LUA_BODY.to_string(),
        TemplateMode::Direct => render_body(doc),
    };
    format!("{PREAMBLE}\\begin{{document}}\n{body}\\end{{document}}\n")
}

/// Document body as the Lua block would print it.
pub fn render_body(doc: &QuestionPaperRequest) -> String {
    let mut out = String::new();

    if let Some(fonts) = &doc.fonts {
        out.push_str(&font_overrides(fonts));
    }

    out.push_str(&format!("{}\\hfill  Name .............................\n", doc.code));
    out.push_str("\\begin{flushright}\n");
    out.push_str("Reg.No .............................\\\\\n");
    out.push_str("\\end{flushright}\n");
    out.push_str("\\begin{center}\n");
    out.push_str("\\begin{minipage}{5in}\n");
    out.push_str("\\centering\n");
    out.push_str(&format!("{}\n", doc.title));
    out.push_str("\\end{minipage} \\\\\n");
    out.push_str("\\vspace{0.3cm}\n");
    out.push_str("\\end{center}\n");
    out.push_str(&format!("Time : {} \\hfill Max marks : {}\n", doc.time, doc.max_marks));

    out.push_str("\\begin{enumerate}\n");
    for part in &doc.parts {
        out.push_str("\\begin{center}\n");
        out.push_str(&format!("\\textbf{{{}}} \\\\\n", part.name));
        out.push_str(&format!("\\texttt{{{}}} \\\\\n", part.description));
        out.push_str("\\end{center}\n");
        for fragment in &part.content {
            match FragmentKind::of(fragment) {
                FragmentKind::Table => {
                    out.push_str(fragment);
                    out.push('\n');
                }
                FragmentKind::Markup => {
                    out.push_str(&format!("{fragment} \\\\\n"));
                    out.push_str(" \\\\\n");
                }
            }
        }
        out.push_str("\\begin{flushright}\n");
        out.push_str(&format!("\\texttt{{\\textbf{{{}}}}} \\\\\n", part.footer));
        out.push_str("\\end{flushright}\n");
    }
    out.push_str("\\end{enumerate}\n");
    out
}

fn font_overrides(fonts: &FontOverrides) -> String {
    let families = [
        ("arabic", "Arabic", &fonts.arabic, &fonts.arabic_scale, "1.3"),
        ("hindi", "Devanagari", &fonts.hindi, &fonts.hindi_scale, "1.2"),
        ("malayalam", "Malayalam", &fonts.malayalam, &fonts.malayalam_scale, "1.2"),
    ];
    let mut out = String::new();
    for (lang, script, family, scale, default_scale) in families {
        if let Some(family) = family {
            let scale = scale.as_deref().unwrap_or(default_scale);
            out.push_str(&format!(
                "\\newfontfamily\\{lang}font[Script={script},Scale={scale}]{{{family}}}\n"
            ));
        }
    }
    out
}

// ── Writing ──────────────────────────────────────────────────────────────

/// Write raw markup unchanged; returns the source stem.
pub async fn write_markup(source: &str, workspace: &Workspace) -> Result<&'static str, Qp2PdfError> {
    let path = workspace.source_path(MARKUP_STEM);
    write_file(&path, source.as_bytes()).await?;
    debug!("Wrote {} bytes of markup to {}", source.len(), path.display());
    Ok(MARKUP_STEM)
}

/// Write the data file and the templated source; returns the source stem.
///
/// Call after image resolution so the serialised fragments already point at
/// local files.
pub async fn render_question_paper(
    doc: &QuestionPaperRequest,
    workspace: &Workspace,
    mode: TemplateMode,
) -> Result<&'static str, Qp2PdfError> {
    let data = serde_json::to_vec(doc)
        .map_err(|e| Qp2PdfError::Internal(format!("Failed to serialise document: {e}")))?;
    let data_path = workspace.reports_dir().join(DATA_FILE);
    write_file(&data_path, &data).await?;

    let source = render_source(doc, mode);
    let path = workspace.source_path(DOCUMENT_STEM);
    write_file(&path, source.as_bytes()).await?;

    debug!(
        "Rendered {} parts ({:?} template) to {}",
        doc.parts.len(),
        mode,
        path.display()
    );
    Ok(DOCUMENT_STEM)
}

async fn write_file(path: &Path, bytes: &[u8]) -> Result<(), Qp2PdfError> {
    tokio::fs::write(path, bytes)
        .await
        .map_err(|e| Qp2PdfError::workspace(path, e))
}
