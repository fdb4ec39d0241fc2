// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Plain text → PDF rendering using `printpdf` 0.8.
//
// Some print helpers only accept page-description input, so text documents
// are laid out as monospace pages first.  The layout is deliberately fixed:
// A4, 36 pt margins, Courier 10 pt on a 13 pt line pitch, and a hard wrap at
// 110 characters (no word wrapping, so column-aligned text stays aligned).

use std::path::Path;

use printpdf::{
    BuiltinFont, Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, PdfWarnMsg, Point, Pt, TextItem,
};
use tracing::{debug, info, instrument};

use webprinter_core::error::{Result, WebPrinterError};

/// A4 width in millimetres.
const PAGE_WIDTH_MM: f32 = 210.0;
/// A4 height in millimetres.
const PAGE_HEIGHT_MM: f32 = 297.0;

/// Fixed page geometry for text rendering.
#[derive(Debug, Clone, Copy, PartialEq)]
struct TextLayout {
    /// Left and top/bottom margin in points.
    margin_pt: f32,
    font_size_pt: f32,
    line_height_pt: f32,
    /// Lines longer than this many characters are hard-wrapped.
    wrap_chars: usize,
}

impl Default for TextLayout {
    fn default() -> Self {
        Self {
            margin_pt: 36.0,
            font_size_pt: 10.0,
            line_height_pt: 13.0,
            wrap_chars: 110,
        }
    }
}

impl TextLayout {
    fn page_height_pt(&self) -> f32 {
        Mm(PAGE_HEIGHT_MM).into_pt().0
    }

    fn top_pt(&self) -> f32 {
        self.page_height_pt() - self.margin_pt
    }
}

/// Renders plain text into a paginated PDF.
#[derive(Debug, Clone, Default)]
pub struct TextPdfRenderer {
    layout: TextLayout,
}

impl TextPdfRenderer {
    /// Split text into pages of already-wrapped lines.
    ///
    /// A new page starts when the next line would fall below the bottom
    /// margin.  Empty input still yields one (blank) page.
    pub fn paginate(&self, text: &str) -> Vec<Vec<String>> {
        let top = self.layout.top_pt();
        let mut pages: Vec<Vec<String>> = vec![Vec::new()];
        let mut y = top;

        for line in text.lines() {
            for chunk in hard_wrap(line, self.layout.wrap_chars) {
                if y < self.layout.margin_pt {
                    pages.push(Vec::new());
                    y = top;
                }
                if let Some(page) = pages.last_mut() {
                    page.push(chunk);
                }
                y -= self.layout.line_height_pt;
            }
        }

        pages
    }

    /// Render text to PDF bytes.
    #[instrument(skip(self, text), fields(text_len = text.len()))]
    pub fn render(&self, text: &str) -> Result<Vec<u8>> {
        let layout = self.layout;
        let pages_of_lines = self.paginate(text);

        let mut doc = PdfDocument::new("WebPrinter text document");
        let mut pages: Vec<PdfPage> = Vec::with_capacity(pages_of_lines.len());

        for lines in &pages_of_lines {
            let mut ops: Vec<Op> = Vec::new();
            for (index, line) in lines.iter().enumerate() {
                let y_pt = layout.top_pt() - index as f32 * layout.line_height_pt;

                ops.push(Op::StartTextSection);
                ops.push(Op::SetTextCursor {
                    pos: Point {
                        x: Pt(layout.margin_pt),
                        y: Pt(y_pt),
                    },
                });
                ops.push(Op::SetFontSizeBuiltinFont {
                    size: Pt(layout.font_size_pt),
                    font: BuiltinFont::Courier,
                });
                ops.push(Op::WriteTextBuiltinFont {
                    items: vec![TextItem::Text(line.clone())],
                    font: BuiltinFont::Courier,
                });
                ops.push(Op::EndTextSection);
            }
            pages.push(PdfPage::new(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), ops));
        }

        doc.with_pages(pages);
        debug!(pages = pages_of_lines.len(), "text layout complete");

        let mut warnings: Vec<PdfWarnMsg> = Vec::new();
        let output = doc.save(&PdfSaveOptions::default(), &mut warnings);
        if output.is_empty() {
            return Err(WebPrinterError::Render("PDF serialisation produced no output".into()));
        }
        Ok(output)
    }

    /// Read a text file (invalid UTF-8 is replaced) and render it.
    pub fn render_file(&self, path: impl AsRef<Path>) -> Result<Vec<u8>> {
        let bytes = std::fs::read(path.as_ref())?;
        let text = String::from_utf8_lossy(&bytes);
        info!(path = %path.as_ref().display(), "rendering text file to PDF");
        self.render(&text)
    }

    /// Render a text file straight into another file.
    pub fn render_file_to(&self, source: impl AsRef<Path>, target: impl AsRef<Path>) -> Result<()> {
        let bytes = self.render_file(source)?;
        std::fs::write(target.as_ref(), bytes)?;
        Ok(())
    }
}

/// Cut a line into chunks of at most `width` characters.  An empty line
/// yields a single empty chunk so blank lines keep their vertical space.
fn hard_wrap(line: &str, width: usize) -> Vec<String> {
    let chars: Vec<char> = line.chars().collect();
    if chars.is_empty() || width == 0 {
        return vec![String::new()];
    }
    chars.chunks(width).map(|c| c.iter().collect()).collect()
}
