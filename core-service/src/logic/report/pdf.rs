//! Minimal PDF writer
//!
//! Single-page documents with the standard Helvetica fonts and raw RGB image
//! XObjects. Content streams are left uncompressed and nothing time-dependent
//! is written, so equal inputs give byte-identical output.

use std::fmt::Write as _;

use image::RgbImage;

/// A4 in points
pub const PAGE_WIDTH: f32 = 595.0;
pub const PAGE_HEIGHT: f32 = 842.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Font {
    Regular,
    Bold,
}

impl Font {
    fn resource(&self) -> &'static str {
        match self {
            Font::Regular => "F1",
            Font::Bold => "F2",
        }
    }
}

/// WinAnsiEncoding code for `ch`, if the standard fonts can show it
pub fn win_ansi(ch: char) -> Option<u8> {
    let code = match ch {
        ' '..='~' => ch as u8,
        '\u{A0}'..='\u{FF}' => ch as u32 as u8,
        '€' => 0x80,
        '‚' => 0x82,
        'ƒ' => 0x83,
        '„' => 0x84,
        '…' => 0x85,
        '†' => 0x86,
        '‡' => 0x87,
        'ˆ' => 0x88,
        '‰' => 0x89,
        'Š' => 0x8A,
        '‹' => 0x8B,
        'Œ' => 0x8C,
        'Ž' => 0x8E,
        '‘' => 0x91,
        '’' => 0x92,
        '“' => 0x93,
        '”' => 0x94,
        '•' => 0x95,
        '–' => 0x96,
        '—' => 0x97,
        '˜' => 0x98,
        '™' => 0x99,
        'š' => 0x9A,
        '›' => 0x9B,
        'œ' => 0x9C,
        'ž' => 0x9E,
        'Ÿ' => 0x9F,
        _ => return None,
    };
    Some(code)
}

/// True when `escape_text` can represent every character
pub fn is_encodable(text: &str) -> bool {
    text.chars().all(|c| matches!(c, '\n' | '\r' | '\t') || win_ansi(c).is_some())
}

/// Escape a string for a PDF literal. Non-ASCII WinAnsi characters are
/// written as octal escapes; anything else becomes '?', so user-supplied
/// text must pass `is_encodable` first.
pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '(' => out.push_str("\\("),
            ')' => out.push_str("\\)"),
            '\n' | '\r' | '\t' => out.push(' '),
            c => match win_ansi(c) {
                Some(code) if code.is_ascii() => out.push(code as char),
                Some(code) => {
                    let _ = write!(out, "\\{:03o}", code);
                }
                None => out.push('?'),
            },
        }
    }
    out
}

/// Greedy word wrap by character count. A word longer than a line fills
/// the current line and continues on the next.
pub fn wrap(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let len = word.chars().count();
        if current_len > 0 {
            let overflows = if len > max_chars {
                current_len + 2 > max_chars
            } else {
                current_len + 1 + len > max_chars
            };
            if overflows {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
            } else {
                current.push(' ');
                current_len += 1;
            }
        }
        for ch in word.chars() {
            if current_len == max_chars {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
            }
            current.push(ch);
            current_len += 1;
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

// ============================================================================
// PAGE CONTENT
// ============================================================================

#[derive(Debug, Default)]
pub struct PageContent {
    ops: String,
    images: Vec<RgbImage>,
}

impl PageContent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Text baseline at (x, y) from the bottom-left corner
    pub fn text(&mut self, x: f32, y: f32, size: f32, font: Font, text: &str) -> &mut Self {
        let _ = writeln!(
            self.ops,
            "BT /{} {:.1} Tf {:.2} {:.2} Td ({}) Tj ET",
            font.resource(),
            size,
            x,
            y,
            escape_text(text)
        );
        self
    }

    pub fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, rgb: [f32; 3]) -> &mut Self {
        let _ = writeln!(
            self.ops,
            "q {:.3} {:.3} {:.3} rg {:.2} {:.2} {:.2} {:.2} re f Q",
            rgb[0], rgb[1], rgb[2], x, y, w, h
        );
        self
    }

    pub fn line(&mut self, x1: f32, y1: f32, x2: f32, y2: f32) -> &mut Self {
        let _ = writeln!(self.ops, "q 0.6 G 0.5 w {:.2} {:.2} m {:.2} {:.2} l S Q", x1, y1, x2, y2);
        self
    }

    /// Draw `image` scaled into a w x h box with its lower-left at (x, y)
    pub fn image(&mut self, x: f32, y: f32, w: f32, h: f32, image: RgbImage) -> &mut Self {
        let name = format!("Im{}", self.images.len() + 1);
        let _ = writeln!(self.ops, "q {:.2} 0 0 {:.2} {:.2} {:.2} cm /{} Do Q", w, h, x, y, name);
        self.images.push(image);
        self
    }
}

// ============================================================================
// DOCUMENT
// ============================================================================

#[derive(Debug, Default)]
struct ObjectTable {
    bodies: Vec<Vec<u8>>,
}

impl ObjectTable {
    /// 1-based object id
    fn add(&mut self, body: Vec<u8>) -> usize {
        self.bodies.push(body);
        self.bodies.len()
    }

    fn reserve(&mut self) -> usize {
        self.add(Vec::new())
    }

    fn set(&mut self, id: usize, body: Vec<u8>) {
        self.bodies[id - 1] = body;
    }
}

fn stream(dict: &str, data: &[u8]) -> Vec<u8> {
    let mut out = format!("<< {} /Length {} >>\nstream\n", dict, data.len()).into_bytes();
    out.extend_from_slice(data);
    out.extend_from_slice(b"\nendstream");
    out
}

/// Serialize one page into a complete PDF file
pub fn render_single_page(page: PageContent, title: &str) -> Vec<u8> {
    let mut objects = ObjectTable::default();

    let catalog = objects.reserve();
    let pages = objects.reserve();
    let font_regular = objects.add(b"<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>".to_vec());
    let font_bold = objects.add(b"<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica-Bold /Encoding /WinAnsiEncoding >>".to_vec());

    let mut xobjects = String::new();
    for (i, image) in page.images.iter().enumerate() {
        let dict = format!(
            "/Type /XObject /Subtype /Image /Width {} /Height {} /ColorSpace /DeviceRGB /BitsPerComponent 8",
            image.width(),
            image.height()
        );
        let id = objects.add(stream(&dict, image.as_raw()));
        let _ = write!(xobjects, "/Im{} {} 0 R ", i + 1, id);
    }

    let content = objects.add(stream("", page.ops.as_bytes()));
    let page_id = objects.add(
        format!(
            "<< /Type /Page /Parent {} 0 R /MediaBox [0 0 {} {}] /Resources << /Font << /F1 {} 0 R /F2 {} 0 R >> /XObject << {}>> >> /Contents {} 0 R >>",
            pages, PAGE_WIDTH, PAGE_HEIGHT, font_regular, font_bold, xobjects, content
        )
        .into_bytes(),
    );
    objects.set(pages, format!("<< /Type /Pages /Kids [{} 0 R] /Count 1 >>", page_id).into_bytes());
    objects.set(catalog, format!("<< /Type /Catalog /Pages {} 0 R >>", pages).into_bytes());
    let info = objects.add(format!("<< /Title ({}) /Producer (NeuroScan) >>", escape_text(title)).into_bytes());

    let mut out: Vec<u8> = "%PDF-1.4\n%âãÏÓ\n".as_bytes().to_vec();
    let mut offsets = Vec::with_capacity(objects.bodies.len());
    for (i, body) in objects.bodies.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n", i + 1).as_bytes());
        out.extend_from_slice(body);
        out.extend_from_slice(b"\nendobj\n");
    }

    let xref_at = out.len();
    let mut xref = format!("xref\n0 {}\n0000000000 65535 f \n", objects.bodies.len() + 1);
    for offset in offsets {
        let _ = write!(xref, "{:010} 00000 n \n", offset);
    }
    let _ = write!(
        xref,
        "trailer\n<< /Size {} /Root {} 0 R /Info {} 0 R >>\nstartxref\n{}\n%%EOF\n",
        objects.bodies.len() + 1,
        catalog,
        info,
        xref_at
    );
    out.extend_from_slice(xref.as_bytes());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_escape_special_characters() {
        assert_eq!(escape_text(r"a(b)c\d"), r"a\(b\)c\\d");
        assert_eq!(escape_text("Moyamoya/IVH"), "Moyamoya/IVH");
        assert_eq!(escape_text("IRM_crâne_Müller.png"), r"IRM_cr\342ne_M\374ller.png");
        assert_eq!(escape_text("5 €"), r"5 \200");
        assert_eq!(escape_text("脑.png"), "?.png");
    }

    #[test]
    fn test_encodable_text() {
        assert!(is_encodable("Müller (2).png"));
        assert!(!is_encodable("脑部扫描.png"));
        assert!(!is_encodable("scan_🧠.png"));
    }

    #[test]
    fn test_wrap_respects_width() {
        let lines = wrap("the quick brown fox jumps over the lazy dog", 10);
        assert!(lines.iter().all(|l| l.len() <= 10));
        assert_eq!(lines.join(" "), "the quick brown fox jumps over the lazy dog");
    }

    #[test]
    fn test_wrap_splits_long_words() {
        let name = "x".repeat(25);
        let lines = wrap(&format!("Image: {}", name), 10);
        assert!(lines.iter().all(|l| l.chars().count() <= 10));
        assert_eq!(lines.concat().replace(' ', ""), format!("Image:{}", name));

        let lines = wrap("ééééé", 2);
        assert_eq!(lines, vec!["éé", "éé", "é"]);
    }

    #[test]
    fn test_document_structure() {
        let mut page = PageContent::new();
        page.text(50.0, 800.0, 12.0, Font::Bold, "Hello (PDF)")
            .image(50.0, 500.0, 100.0, 100.0, RgbImage::from_pixel(2, 2, Rgb([255, 0, 0])));
        let bytes = render_single_page(page, "Test");
        let text = String::from_utf8_lossy(&bytes);

        assert!(bytes.starts_with(b"%PDF-1.4"));
        assert!(text.trim_end().ends_with("%%EOF"));
        assert!(text.contains("(Hello \\(PDF\\)) Tj"));
        assert!(text.contains("/Subtype /Image /Width 2 /Height 2"));
        assert!(text.contains("/Im1 Do"));
    }

    #[test]
    fn test_xref_offsets_point_at_objects() {
        let mut page = PageContent::new();
        page.text(10.0, 10.0, 10.0, Font::Regular, "x");
        let bytes = render_single_page(page, "Offsets");
        let text = String::from_utf8_lossy(&bytes).to_string();

        let xref_pos = text.rfind("startxref\n").unwrap();
        let declared: usize = text[xref_pos + 10..].lines().next().unwrap().parse().unwrap();
        assert!(text[declared..].starts_with("xref"));

        let first_entry = text[declared..].lines().nth(3).unwrap();
        let offset: usize = first_entry[..10].parse().unwrap();
        assert!(text[offset..].starts_with("1 0 obj"));
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let build = || {
            let mut page = PageContent::new();
            page.text(10.0, 10.0, 10.0, Font::Regular, "same");
            render_single_page(page, "Same")
        };
        assert_eq!(build(), build());
    }
}
