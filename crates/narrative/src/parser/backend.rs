use std::collections::BTreeMap;

use lopdf::content::Content;

use crate::NarrativeError;

/// A page identifier mirroring `lopdf::ObjectId`.
pub type PageId = (u32, u16);

/// A lopdf-independent content-stream operand.
#[derive(Debug, Clone, PartialEq)]
pub enum PdfValue {
    Null,
    Number(f32),
    Name(Vec<u8>),
    Str(Vec<u8>),
    Array(Vec<PdfValue>),
    Other,
}

impl PdfValue {
    pub fn as_number(&self) -> Option<f32> {
        match self {
            PdfValue::Number(n) => Some(*n),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContentOp {
    pub operator: String,
    pub operands: Vec<PdfValue>,
}

impl ContentOp {
    /// Operand `i` as a number, if present and numeric.
    pub fn number(&self, i: usize) -> Option<f32> {
        self.operands.get(i).and_then(PdfValue::as_number)
    }
}

/// The page's MediaBox in user space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageBox {
    pub left: f32,
    pub bottom: f32,
    pub right: f32,
    pub top: f32,
}

impl PageBox {
    /// US Letter, used when a page declares no usable MediaBox.
    pub const LETTER: PageBox = PageBox {
        left: 0.0,
        bottom: 0.0,
        right: 612.0,
        top: 792.0,
    };

    /// Build from `[llx lly urx ury]`, accepting corners in either order.
    pub fn from_corners(values: [f32; 4]) -> Self {
        let [x0, y0, x1, y1] = values;
        Self {
            left: x0.min(x1),
            bottom: y0.min(y1),
            right: x0.max(x1),
            top: y0.max(y1),
        }
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.top - self.bottom
    }
}

pub fn convert_object(obj: &lopdf::Object) -> PdfValue {
    match obj {
        lopdf::Object::Null => PdfValue::Null,
        lopdf::Object::Integer(i) => PdfValue::Number(*i as f32),
        lopdf::Object::Real(f) => PdfValue::Number(*f),
        lopdf::Object::Name(n) => PdfValue::Name(n.clone()),
        lopdf::Object::String(s, _) => PdfValue::Str(s.clone()),
        lopdf::Object::Array(arr) => PdfValue::Array(arr.iter().map(convert_object).collect()),
        _ => PdfValue::Other,
    }
}

/// Best-effort decoding of string bytes: UTF-16BE with BOM, then UTF-8,
/// then Latin-1.
pub fn decode_text_simple(bytes: &[u8]) -> String {
    if let Some(payload) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        return decode_utf16_be(payload);
    }
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

/// Trailing odd bytes are ignored.
fn decode_utf16_be(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();
    String::from_utf16_lossy(&units)
}

/// Abstraction over the PDF parser so the run state machine can be tested
/// with mock content streams.
pub trait PdfBackend {
    /// 1-based page number to page id.
    fn pages(&self) -> BTreeMap<u32, PageId>;

    fn page_box(&self, page: PageId) -> PageBox;

    /// Decoded content-stream operations of a page.
    fn page_ops(&self, page: PageId) -> Result<Vec<ContentOp>, NarrativeError>;

    /// Decode the bytes of a text-showing operand set in `font_key`.
    fn decode_text(&self, page: PageId, font_key: &[u8], bytes: &[u8]) -> String;
}

pub struct LopdfBackend {
    doc: lopdf::Document,
}

impl LopdfBackend {
    pub fn load_bytes(data: &[u8]) -> Result<Self, NarrativeError> {
        let doc = lopdf::Document::load_mem(data).map_err(|e| NarrativeError::Parse(e.to_string()))?;
        if doc.is_encrypted() {
            return Err(NarrativeError::Encrypted);
        }
        Ok(Self { doc })
    }

    /// Walk up the page tree until a MediaBox is found.
    fn find_media_box(&self, dict: &lopdf::Dictionary) -> Option<[f32; 4]> {
        if let Some(values) = dict.get(b"MediaBox").ok().and_then(|o| self.numbers(o)) {
            return Some(values);
        }
        let parent = dict.get(b"Parent").ok()?.as_reference().ok()?;
        let parent_dict = self.doc.get_object(parent).ok()?.as_dict().ok()?;
        self.find_media_box(parent_dict)
    }

    fn numbers(&self, obj: &lopdf::Object) -> Option<[f32; 4]> {
        let array = match obj {
            lopdf::Object::Reference(id) => self.doc.get_object(*id).ok()?.as_array().ok()?,
            other => other.as_array().ok()?,
        };
        let values: Vec<f32> = array
            .iter()
            .filter_map(|o| match o {
                lopdf::Object::Integer(i) => Some(*i as f32),
                lopdf::Object::Real(f) => Some(*f),
                _ => None,
            })
            .collect();
        values.try_into().ok()
    }

    fn font_encoding(&self, page: PageId, font_key: &[u8]) -> Option<Vec<u8>> {
        let fonts = self.doc.get_page_fonts(page).ok()?;
        let font = fonts.get(font_key)?;
        font.get(b"Encoding").ok()?.as_name().ok().map(<[u8]>::to_vec)
    }
}

impl PdfBackend for LopdfBackend {
    fn pages(&self) -> BTreeMap<u32, PageId> {
        self.doc.get_pages()
    }

    fn page_box(&self, page: PageId) -> PageBox {
        self.doc
            .get_object(page)
            .ok()
            .and_then(|o| o.as_dict().ok())
            .and_then(|d| self.find_media_box(d))
            .map(PageBox::from_corners)
            .filter(|b| b.width() > 0.0 && b.height() > 0.0)
            .unwrap_or(PageBox::LETTER)
    }

    fn page_ops(&self, page: PageId) -> Result<Vec<ContentOp>, NarrativeError> {
        let data = self
            .doc
            .get_page_content(page)
            .map_err(|e| NarrativeError::Parse(format!("cannot read page content: {e}")))?;
        let content = Content::decode(&data)
            .map_err(|e| NarrativeError::Parse(format!("content stream decode error: {e}")))?;
        Ok(content
            .operations
            .into_iter()
            .map(|op| ContentOp {
                operands: op.operands.iter().map(convert_object).collect(),
                operator: op.operator,
            })
            .collect())
    }

    fn decode_text(&self, page: PageId, font_key: &[u8], bytes: &[u8]) -> String {
        // Identity-encoded fonts mostly carry two-byte codes that map
        // straight to UTF-16.
        let identity = self
            .font_encoding(page, font_key)
            .is_some_and(|e| e.starts_with(b"Identity"));
        if identity && bytes.len() >= 2 && bytes.len() % 2 == 0 {
            let decoded = decode_utf16_be(bytes);
            if decoded.chars().any(|c| c != '\u{FFFD}' && c != '\0') {
                return decoded;
            }
        }
        decode_text_simple(bytes)
    }
}
