//! PDF text extraction for the fetch pipeline.
//!
//! PDFs never reach the browser tier; bytes are parsed directly and the
//! text handed downstream wrapped in `<pre>` so the HTML converters pass
//! it through untouched.

use crate::error::FetchError;

/// Extract text from PDF bytes and wrap it for the HTML pipeline.
pub fn pdf_to_html(url: &str, bytes: &[u8]) -> Result<String, FetchError> {
    let text = pdf_extract::extract_text_from_mem(bytes).map_err(|e| FetchError::Pdf {
        url: url.to_string(),
        message: e.to_string(),
    })?;
    Ok(wrap_pre(&text))
}

fn wrap_pre(text: &str) -> String {
    let escaped = text
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;");
    format!("<pre>{}</pre>", escaped.trim())
}

/// Content-Type check used by the simple tier.
pub fn is_pdf_content_type(content_type: Option<&str>) -> bool {
    content_type
        .map(|ct| ct.split(';').next().unwrap_or("").trim() == "application/pdf")
        .unwrap_or(false)
}
