//! HTML pages: the upload form, the result page and the error page.
//!
//! Every piece of user-derived text (extracted text, translations, file
//! names, language codes, error details) goes through [`escape_html`].

use crate::orchestrator::Rendition;
use crate::pipeline::languages::LanguageSet;
use std::fmt::Write;

const STYLE: &str = "body{font-family:sans-serif;max-width:48rem;margin:2rem auto;padding:0 1rem;line-height:1.5}\
pre{white-space:pre-wrap;background:#f6f6f6;padding:1rem;border-radius:4px}\
.error{color:#a40000}label{display:block;margin-top:1rem}";

/// Escape `&`, `<`, `>`, `"` and `'` for use in text and attribute values.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
<title>{}</title>\n<style>{STYLE}</style>\n</head>\n<body>\n{body}</body>\n</html>\n",
        escape_html(title)
    )
}

/// The upload form, with `selected` preselected in the language list.
pub fn index_page(languages: &LanguageSet, selected: Option<&str>) -> String {
    let mut options = String::new();
    for (code, name) in languages {
        let sel = if selected == Some(code.as_str()) {
            " selected"
        } else {
            ""
        };
        let _ = writeln!(
            options,
            "<option value=\"{}\"{sel}>{} ({})</option>",
            escape_html(code),
            escape_html(name),
            escape_html(code)
        );
    }

    let body = format!(
        "<h1>PDF to voice</h1>\n\
<p>Upload a PDF, pick a language, and listen to the original and the translation.</p>\n\
<form method=\"post\" action=\"/\" enctype=\"multipart/form-data\">\n\
<label for=\"pdf\">PDF file</label>\n\
<input type=\"file\" id=\"pdf\" name=\"pdf\" accept=\"application/pdf,.pdf\" required>\n\
<label for=\"language\">Translate to</label>\n\
<select id=\"language\" name=\"language\" required>\n{options}</select>\n\
<p><button type=\"submit\">Translate and speak</button></p>\n\
</form>\n"
    );
    page("PDF to voice", &body)
}

/// Both texts and both audio players.
pub fn result_page(rendition: &Rendition) -> String {
    let body = format!(
        "<h1>Result</h1>\n\
<h2>Original text</h2>\n<pre id=\"original-text\">{}</pre>\n\
<audio controls src=\"{}\"></audio>\n\
<h2>Translated text ({})</h2>\n<pre id=\"translated-text\">{}</pre>\n\
<audio controls src=\"{}\"></audio>\n\
<p><a href=\"/?language={}\">Convert another document</a></p>\n",
        escape_html(&rendition.original_text),
        escape_html(&rendition.original_audio.url),
        escape_html(&rendition.language),
        escape_html(&rendition.translated_text),
        escape_html(&rendition.translated_audio.url),
        escape_html(&rendition.language),
    );
    page("Result", &body)
}

/// A page showing `message` and a link back to the form.
pub fn error_page(message: &str) -> String {
    let body = format!(
        "<h1>Something went wrong</h1>\n\
<p class=\"error\">{}</p>\n\
<p><a href=\"/\">Back</a></p>\n",
        escape_html(message)
    );
    page("Error", &body)
}
