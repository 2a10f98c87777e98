use std::collections::BTreeMap;

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::Result;
use crate::FlowText;

/// Glyph prepended to numbered and bulleted paragraphs.
pub const LIST_PREFIX: &str = "• ";

/// Walk state for `word/document.xml`.
#[derive(Default)]
struct Walker {
    lines: Vec<String>,
    paragraph: String,
    in_text: bool,
    in_properties: bool,
    numbered: bool,
    table_depth: usize,
    row: Vec<String>,
    cell: String,
    // Drawings and fallback markup are skipped wholesale, nested text boxes included.
    skip_depth: usize,
    skipped: BTreeMap<&'static str, usize>,
}

impl Walker {
    fn open(&mut self, name: &[u8]) {
        if self.skip_depth > 0 {
            self.skip_depth += 1;
            return;
        }
        match name {
            b"w:p" => {
                self.paragraph.clear();
                self.numbered = false;
            }
            b"w:pPr" => self.in_properties = true,
            b"w:numPr" if self.in_properties => self.numbered = true,
            b"w:t" => self.in_text = true,
            b"w:tbl" => self.table_depth += 1,
            b"w:tc" if self.table_depth == 1 => self.cell.clear(),
            b"w:drawing" | b"w:object" | b"w:pict" => {
                self.skip(name);
                self.skip_depth = 1;
            }
            b"mc:Fallback" => self.skip_depth = 1,
            _ => {}
        }
    }

    /// Self-closing elements. Only run-level breaks and markers carry meaning here.
    fn empty(&mut self, name: &[u8]) {
        if self.skip_depth > 0 {
            return;
        }
        match name {
            b"w:numPr" if self.in_properties => self.numbered = true,
            b"w:tab" if !self.in_properties => self.paragraph.push('\t'),
            b"w:br" | b"w:cr" => self.paragraph.push('\n'),
            b"w:p" => self.finish_paragraph(),
            b"w:drawing" | b"w:object" | b"w:pict" => self.skip(name),
            _ => {}
        }
    }

    fn close(&mut self, name: &[u8]) {
        if self.skip_depth > 0 {
            self.skip_depth -= 1;
            return;
        }
        match name {
            b"w:t" => self.in_text = false,
            b"w:pPr" => self.in_properties = false,
            b"w:p" => self.finish_paragraph(),
            b"w:tc" if self.table_depth == 1 => {
                let cell = std::mem::take(&mut self.cell);
                self.row.push(cell);
            }
            b"w:tr" if self.table_depth == 1 => {
                let row = std::mem::take(&mut self.row);
                self.lines.push(row.join("\t"));
            }
            b"w:tbl" => self.table_depth = self.table_depth.saturating_sub(1),
            _ => {}
        }
    }

    fn text(&mut self, text: &str) {
        if self.in_text && self.skip_depth == 0 {
            self.paragraph.push_str(text);
        }
    }

    fn finish_paragraph(&mut self) {
        let text = std::mem::take(&mut self.paragraph);
        if self.table_depth > 0 {
            if !text.is_empty() {
                if !self.cell.is_empty() {
                    self.cell.push(' ');
                }
                self.cell.push_str(&text);
            }
        } else if self.numbered && !text.is_empty() {
            self.lines.push(format!("{LIST_PREFIX}{text}"));
        } else {
            self.lines.push(text);
        }
        self.numbered = false;
    }

    fn skip(&mut self, name: &[u8]) {
        let kind = match name {
            b"w:drawing" => "drawing",
            _ => "embedded object",
        };
        *self.skipped.entry(kind).or_default() += 1;
    }

    fn finish(self) -> FlowText {
        let messages = self
            .skipped
            .into_iter()
            .map(|(kind, count)| format!("Skipped {count} unsupported {kind} element(s)"))
            .collect::<Vec<_>>();
        for message in &messages {
            log::warn!("{message}");
        }
        FlowText {
            text: self.lines.join("\n"),
            messages,
        }
    }
}

/// Flatten the main document part into plain paragraph text.
pub fn document_text(xml: &str) -> Result<FlowText> {
    let mut reader = Reader::from_str(xml);
    let mut walker = Walker::default();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => walker.open(e.name().as_ref()),
            Event::Empty(e) => walker.empty(e.name().as_ref()),
            Event::End(e) => walker.close(e.name().as_ref()),
            Event::Text(e) => {
                let text = e.unescape()?;
                walker.text(&text);
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    let flow = walker.finish();
    log::debug!(
        "docx: {} paragraph lines, {} messages",
        flow.text.lines().count(),
        flow.messages.len()
    );
    Ok(flow)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wrap(body: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}</w:body></w:document>"#
        )
    }

    fn para(text: &str) -> String {
        format!(r#"<w:p><w:r><w:t xml:space="preserve">{text}</w:t></w:r></w:p>"#)
    }

    // =====================================================================
    // paragraphs
    // =====================================================================

    #[test]
    fn test_paragraphs_joined_by_newline() {
        let xml = wrap(&format!("{}{}", para("First one."), para("Second one.")));
        let flow = document_text(&xml).unwrap();
        assert_eq!(flow.text, "First one.\nSecond one.");
        assert!(flow.messages.is_empty());
    }

    #[test]
    fn test_runs_concatenate_and_keep_spacing() {
        let xml = wrap(
            r#"<w:p><w:r><w:t xml:space="preserve">Hello </w:t></w:r><w:r><w:rPr><w:b/></w:rPr><w:t>world</w:t></w:r></w:p>"#,
        );
        assert_eq!(document_text(&xml).unwrap().text, "Hello world");
    }

    #[test]
    fn test_empty_paragraphs_preserved() {
        let xml = wrap(&format!("{}<w:p/>{}<w:p></w:p>{}", para("a"), para("b"), para("c")));
        assert_eq!(document_text(&xml).unwrap().text, "a\n\nb\n\nc");
    }

    #[test]
    fn test_entities_unescaped() {
        let xml = wrap(&para("Fish &amp; chips &lt;3"));
        assert_eq!(document_text(&xml).unwrap().text, "Fish & chips <3");
    }

    // =====================================================================
    // run-level markers
    // =====================================================================

    #[test]
    fn test_tab_and_break() {
        let xml = wrap(
            r#"<w:p><w:r><w:t>Name</w:t><w:tab/><w:t>Value</w:t><w:br/><w:t>next</w:t></w:r></w:p>"#,
        );
        assert_eq!(document_text(&xml).unwrap().text, "Name\tValue\nnext");
    }

    #[test]
    fn test_tab_stops_in_properties_ignored() {
        let xml = wrap(
            r#"<w:p><w:pPr><w:tabs><w:tab w:val="left" w:pos="720"/></w:tabs></w:pPr><w:r><w:t>plain</w:t></w:r></w:p>"#,
        );
        assert_eq!(document_text(&xml).unwrap().text, "plain");
    }

    #[test]
    fn test_numbered_paragraph_prefixed() {
        let xml = wrap(&format!(
            r#"<w:p><w:pPr><w:numPr><w:ilvl w:val="0"/><w:numId w:val="1"/></w:numPr></w:pPr><w:r><w:t>first item</w:t></w:r></w:p>{}"#,
            para("after")
        ));
        assert_eq!(document_text(&xml).unwrap().text, "• first item\nafter");
    }

    // =====================================================================
    // tables
    // =====================================================================

    #[test]
    fn test_table_cells_tab_joined() {
        let row = |a: &str, b: &str| {
            format!(
                "<w:tr><w:tc>{}</w:tc><w:tc>{}{}</w:tc></w:tr>",
                para(a),
                para(b),
                para("more")
            )
        };
        let xml = wrap(&format!(
            "{}<w:tbl>{}{}</w:tbl>{}",
            para("before"),
            row("Region", "Total"),
            row("North", "12"),
            para("after")
        ));
        assert_eq!(
            document_text(&xml).unwrap().text,
            "before\nRegion\tTotal more\nNorth\t12 more\nafter"
        );
    }

    // =====================================================================
    // unsupported content
    // =====================================================================

    #[test]
    fn test_drawings_reported_and_skipped() {
        let xml = wrap(&format!(
            r#"<w:p><w:r><w:t>Figure:</w:t></w:r><w:r><w:drawing><wp:inline><w:txbxContent>{}</w:txbxContent></wp:inline></w:drawing></w:r></w:p><w:p><w:r><w:drawing/></w:r></w:p>"#,
            para("caption inside")
        ));
        let flow = document_text(&xml).unwrap();
        assert_eq!(flow.text, "Figure:\n");
        assert_eq!(flow.messages, vec!["Skipped 2 unsupported drawing element(s)"]);
    }

    #[test]
    fn test_fallback_markup_not_double_counted() {
        let xml = wrap(
            r#"<w:p><w:r><mc:AlternateContent><mc:Choice><w:drawing></w:drawing></mc:Choice><mc:Fallback><w:pict></w:pict></mc:Fallback></mc:AlternateContent></w:r></w:p>"#,
        );
        let flow = document_text(&xml).unwrap();
        assert_eq!(flow.messages.len(), 1);
        assert!(flow.messages[0].contains("1 unsupported drawing"));
    }

    #[test]
    fn test_malformed_xml_is_error() {
        let xml = wrap("<w:p><w:r><w:t>oops</w:r></w:p>");
        assert!(document_text(&xml).is_err());
    }

    #[test]
    fn test_empty_body() {
        let flow = document_text(&wrap("")).unwrap();
        assert_eq!(flow.text, "");
        assert!(flow.messages.is_empty());
    }
}
