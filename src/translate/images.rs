//! Markdown inline-image extraction: `![alt](data:<mime>;base64,<b64>)`
//! embedded in plain text content is pulled out into a separate inline-data
//! part, leaving the surrounding text intact with the marker removed. No
//! regex dependency is pulled in for this — the grammar is small enough to
//! scan by hand, and the example pack's translators favor hand-written
//! scanners over adding a crate for a single pattern.

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedImage {
    pub mime_type: String,
    pub data: String,
}

/// Returns the text with every recognized inline data-URL image marker
/// stripped out, plus the images found, in order of appearance.
pub fn extract_markdown_images(text: &str) -> (String, Vec<ExtractedImage>) {
    let mut out = String::with_capacity(text.len());
    let mut images = Vec::new();
    let mut rest = text;

    while let Some(bang_idx) = rest.find("![") {
        out.push_str(&rest[..bang_idx]);
        let after_bang = &rest[bang_idx + 2..];

        let Some(close_bracket) = after_bang.find("](") else {
            out.push_str("![");
            rest = after_bang;
            continue;
        };
        let after_alt = &after_bang[close_bracket + 2..];

        let Some(close_paren) = after_alt.find(')') else {
            out.push_str("![");
            rest = after_bang;
            continue;
        };
        let url = &after_alt[..close_paren];

        match parse_data_url(url) {
            Some(image) => {
                images.push(image);
                rest = &after_alt[close_paren + 1..];
            }
            None => {
                // Not a data URL we understand; keep the markdown verbatim
                // and resume scanning just past this "![" so we don't loop.
                out.push_str("![");
                rest = after_bang;
            }
        }
    }
    out.push_str(rest);
    (out, images)
}

fn parse_data_url(url: &str) -> Option<ExtractedImage> {
    let body = url.strip_prefix("data:")?;
    let (mime_type, data) = body.split_once(";base64,")?;
    if mime_type.is_empty() || data.is_empty() {
        return None;
    }
    Some(ExtractedImage {
        mime_type: mime_type.to_string(),
        data: data.to_string(),
    })
}
