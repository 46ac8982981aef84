//! Font decoding: shown byte strings to Unicode text and glyph advances.
//!
//! Only what is needed to place and read text runs is supported: ToUnicode
//! CMaps (`bfchar` / `bfrange`), simple-font encodings with `/Differences`,
//! `/Widths` for simple fonts and `/DW` + `/W` for composite fonts.

use std::collections::HashMap;

use lopdf::{Dictionary, Document, Object};
use tracing::debug;

use super::encoding::{glyph_name_to_char, win_ansi_decode};
use super::objects::{get, get_name, get_number, name, number, resolve, resolve_array, resolve_dict, resolve_stream, stream_bytes};

/// Advance used when a font carries no width for a code, in 1/1000 em.
const FALLBACK_WIDTH: f64 = 500.0;
const FALLBACK_ASCENT: f64 = 0.8;
const FALLBACK_DESCENT: f64 = -0.2;

/// One decoded glyph.
#[derive(Debug, Clone, PartialEq)]
pub struct Glyph {
    pub text: String,
    /// Horizontal advance in 1/1000 text-space units.
    pub width: f64,
    /// Single-byte code 32, which receives word spacing.
    pub is_word_space: bool,
}

#[derive(Debug, Clone)]
enum GlyphWidths {
    Simple {
        first_char: u32,
        widths: Vec<f64>,
        missing: f64,
    },
    Composite {
        default: f64,
        widths: HashMap<u32, f64>,
        /// `first last width` entries, kept as spans.
        ranges: Vec<(u32, u32, f64)>,
    },
}

/// Decoder for one font resource.
#[derive(Debug, Clone)]
pub struct FontDecoder {
    composite: bool,
    to_unicode: ToUnicode,
    differences: HashMap<u8, char>,
    widths: GlyphWidths,
    ascent: f64,
    descent: f64,
}

impl Default for FontDecoder {
    fn default() -> Self {
        Self::fallback()
    }
}

impl FontDecoder {
    /// Decoder for a missing or unusable font: WinAnsi text, uniform widths.
    pub fn fallback() -> Self {
        Self {
            composite: false,
            to_unicode: ToUnicode::default(),
            differences: HashMap::new(),
            widths: GlyphWidths::Simple {
                first_char: 0,
                widths: Vec::new(),
                missing: FALLBACK_WIDTH,
            },
            ascent: FALLBACK_ASCENT,
            descent: FALLBACK_DESCENT,
        }
    }

    pub fn from_dict(doc: &Document, font: &Dictionary) -> Self {
        let composite = get_name(doc, font, b"Subtype") == Some(b"Type0".as_slice());
        let descendant = if composite {
            get(doc, font, b"DescendantFonts")
                .and_then(|o| match o {
                    Object::Array(items) => items.first(),
                    _ => None,
                })
                .and_then(|o| resolve_dict(doc, o))
        } else {
            None
        };

        let to_unicode = font
            .get(b"ToUnicode")
            .ok()
            .and_then(|o| resolve_stream(doc, o))
            .and_then(|(_, stream)| stream_bytes(doc, stream).ok())
            .map(|bytes| parse_to_unicode(&bytes))
            .unwrap_or_default();

        let widths = match descendant {
            Some(cid_font) => composite_widths(doc, cid_font),
            None => simple_widths(doc, font),
        };

        let descriptor = descendant
            .unwrap_or(font)
            .get(b"FontDescriptor")
            .ok()
            .and_then(|o| resolve_dict(doc, o));
        let metric = |key: &[u8], fallback: f64| {
            descriptor
                .and_then(|d| get_number(doc, d, key))
                .filter(|v| *v != 0.0)
                .map(|v| v / 1000.0)
                .unwrap_or(fallback)
        };

        let decoder = Self {
            composite,
            differences: if composite { HashMap::new() } else { differences(doc, font) },
            to_unicode,
            widths,
            ascent: metric(b"Ascent", FALLBACK_ASCENT),
            descent: metric(b"Descent", FALLBACK_DESCENT),
        };
        debug!(
            composite,
            to_unicode = decoder.to_unicode.len(),
            "Loaded font decoder"
        );
        decoder
    }

    /// Ascender height as a fraction of the font size.
    pub fn ascent(&self) -> f64 {
        self.ascent
    }

    /// Descender depth (negative) as a fraction of the font size.
    pub fn descent(&self) -> f64 {
        self.descent
    }

    pub fn decode(&self, bytes: &[u8]) -> Vec<Glyph> {
        if self.composite {
            bytes
                .chunks(2)
                .map(|pair| {
                    let code = pair.iter().fold(0u32, |acc, b| (acc << 8) | u32::from(*b));
                    self.glyph(code, false)
                })
                .collect()
        } else {
            bytes
                .iter()
                .map(|&b| self.glyph(u32::from(b), b == b' '))
                .collect()
        }
    }

    fn glyph(&self, code: u32, is_word_space: bool) -> Glyph {
        Glyph {
            text: self.text_for(code),
            width: self.width_for(code),
            is_word_space,
        }
    }

    fn text_for(&self, code: u32) -> String {
        if let Some(text) = self.to_unicode.lookup(code) {
            return text;
        }
        if self.composite {
            return char::from_u32(code)
                .filter(|c| !c.is_control())
                .map(String::from)
                .unwrap_or_default();
        }
        let byte = code as u8;
        self.differences
            .get(&byte)
            .copied()
            .or_else(|| win_ansi_decode(byte))
            .map(String::from)
            .unwrap_or_default()
    }

    fn width_for(&self, code: u32) -> f64 {
        match &self.widths {
            GlyphWidths::Simple {
                first_char,
                widths,
                missing,
            } => code
                .checked_sub(*first_char)
                .and_then(|i| widths.get(i as usize))
                .copied()
                .unwrap_or(*missing),
            GlyphWidths::Composite {
                default,
                widths,
                ranges,
            } => widths
                .get(&code)
                .copied()
                .or_else(|| {
                    ranges
                        .iter()
                        .find(|(first, last, _)| (*first..=*last).contains(&code))
                        .map(|(_, _, w)| *w)
                })
                .unwrap_or(*default),
        }
    }
}

fn simple_widths(doc: &Document, font: &Dictionary) -> GlyphWidths {
    // Type3 glyph space is scaled by the font matrix rather than 1/1000.
    let scale = get(doc, font, b"FontMatrix")
        .and_then(|o| match o {
            Object::Array(items) => items.first().and_then(number),
            _ => None,
        })
        .map(|a| a * 1000.0)
        .unwrap_or(1.0);
    let first_char = get_number(doc, font, b"FirstChar").unwrap_or(0.0).max(0.0) as u32;
    let widths = get(doc, font, b"Widths")
        .and_then(|o| match o {
            Object::Array(items) => Some(
                items
                    .iter()
                    .map(|w| resolve(doc, w).and_then(|(_, o)| number(o)).unwrap_or(0.0) * scale)
                    .collect(),
            ),
            _ => None,
        })
        .unwrap_or_default();
    let missing = get(doc, font, b"FontDescriptor")
        .and_then(|o| match o {
            Object::Dictionary(d) => get_number(doc, d, b"MissingWidth"),
            _ => None,
        })
        .filter(|w| *w > 0.0)
        .unwrap_or(FALLBACK_WIDTH);
    GlyphWidths::Simple {
        first_char,
        widths,
        missing,
    }
}

fn composite_widths(doc: &Document, cid_font: &Dictionary) -> GlyphWidths {
    let default = get_number(doc, cid_font, b"DW").unwrap_or(1000.0);
    let mut widths = HashMap::new();
    let mut ranges = Vec::new();
    if let Some(items) = get(doc, cid_font, b"W").and_then(|o| resolve_array(doc, o)) {
        let value = |o: &Object| resolve(doc, o).and_then(|(_, o)| number(o));
        let mut i = 0;
        while i < items.len() {
            let Some(first) = value(&items[i]) else { break };
            match items.get(i + 1).and_then(|o| resolve(doc, o)).map(|(_, o)| o) {
                Some(Object::Array(list)) => {
                    let first = first as u32;
                    for (offset, w) in list.iter().enumerate() {
                        let code = u32::try_from(offset).ok().and_then(|o| first.checked_add(o));
                        if let (Some(code), Some(w)) = (code, value(w)) {
                            widths.insert(code, w);
                        }
                    }
                    i += 2;
                }
                Some(last) => {
                    let (Some(last), Some(w)) = (number(last), items.get(i + 2).and_then(value)) else {
                        break;
                    };
                    ranges.push((first as u32, last as u32, w));
                    i += 3;
                }
                None => break,
            }
        }
    }
    GlyphWidths::Composite {
        default,
        widths,
        ranges,
    }
}

fn differences(doc: &Document, font: &Dictionary) -> HashMap<u8, char> {
    let mut map = HashMap::new();
    let Some(Object::Dictionary(encoding)) = get(doc, font, b"Encoding") else {
        return map;
    };
    let Some(items) = get(doc, encoding, b"Differences").and_then(|o| resolve_array(doc, o)) else {
        return map;
    };
    let mut code: u32 = 0;
    for item in items {
        match item {
            Object::Integer(start) => code = (*start).clamp(0, 255) as u32,
            other => {
                if let Some(glyph) = name(other).and_then(|n| std::str::from_utf8(n).ok()) {
                    if let (Ok(byte), Some(ch)) = (u8::try_from(code), glyph_name_to_char(glyph)) {
                        map.insert(byte, ch);
                    }
                    code += 1;
                }
            }
        }
    }
    map
}

#[derive(Debug, Clone, PartialEq)]
enum CMapToken {
    Hex(Vec<u8>),
    ArrayStart,
    ArrayEnd,
    Word(String),
}

fn tokenize_cmap(bytes: &[u8]) -> Vec<CMapToken> {
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'<' if bytes.get(i + 1) == Some(&b'<') => i += 2,
            b'>' if bytes.get(i + 1) == Some(&b'>') => i += 2,
            b'<' => {
                let end = bytes[i + 1..]
                    .iter()
                    .position(|&b| b == b'>')
                    .map_or(bytes.len(), |p| i + 1 + p);
                let digits: Vec<u8> = bytes[i + 1..end]
                    .iter()
                    .copied()
                    .filter(u8::is_ascii_hexdigit)
                    .collect();
                let value = digits
                    .chunks(2)
                    .filter_map(|pair| {
                        let s = std::str::from_utf8(pair).ok()?;
                        let padded = if s.len() == 1 { format!("{}0", s) } else { s.to_string() };
                        u8::from_str_radix(&padded, 16).ok()
                    })
                    .collect();
                tokens.push(CMapToken::Hex(value));
                i = end + 1;
            }
            b'[' => {
                tokens.push(CMapToken::ArrayStart);
                i += 1;
            }
            b']' => {
                tokens.push(CMapToken::ArrayEnd);
                i += 1;
            }
            b'%' => {
                while i < bytes.len() && bytes[i] != b'\n' && bytes[i] != b'\r' {
                    i += 1;
                }
            }
            b if b.is_ascii_whitespace() => i += 1,
            _ => {
                let start = i;
                while i < bytes.len()
                    && !bytes[i].is_ascii_whitespace()
                    && !matches!(bytes[i], b'<' | b'>' | b'[' | b']' | b'%')
                {
                    i += 1;
                }
                tokens.push(CMapToken::Word(
                    String::from_utf8_lossy(&bytes[start..i]).into_owned(),
                ));
            }
        }
    }
    tokens
}

fn code_value(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0u32, |acc, b| (acc << 8) | u32::from(*b))
}

fn utf16_text(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks(2)
        .map(|pair| match *pair {
            [hi, lo] => u16::from_be_bytes([hi, lo]),
            [single] => u16::from(single),
            _ => 0,
        })
        .collect();
    String::from_utf16_lossy(&units)
}

/// Code-to-text mappings of a ToUnicode CMap. Incrementing `bfrange`
/// entries are kept as spans and expanded on lookup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToUnicode {
    chars: HashMap<u32, String>,
    ranges: Vec<(u32, u32, Vec<u8>)>,
}

impl ToUnicode {
    pub fn lookup(&self, code: u32) -> Option<String> {
        if let Some(text) = self.chars.get(&code) {
            return Some(text.clone());
        }
        self.ranges
            .iter()
            .find(|(lo, hi, _)| (*lo..=*hi).contains(&code))
            .map(|(lo, _, dst)| range_target(dst, code - lo))
    }

    /// Number of single mappings and spans.
    fn len(&self) -> usize {
        self.chars.len() + self.ranges.len()
    }
}

/// Text for the code `offset` places into a range starting at `dst`; the
/// last byte is incremented and carries into the bytes before it.
fn range_target(dst: &[u8], offset: u32) -> String {
    let Some((last, prefix)) = dst.split_last() else {
        return String::new();
    };
    match u8::try_from(u32::from(*last).saturating_add(offset)) {
        Ok(byte) => {
            let mut target = prefix.to_vec();
            target.push(byte);
            utf16_text(&target)
        }
        Err(_) => {
            let carried = code_value(dst).wrapping_add(offset);
            utf16_text(&carried.to_be_bytes()[4 - dst.len().min(4)..])
        }
    }
}

/// Parses the `bfchar` and `bfrange` sections of a ToUnicode CMap.
pub fn parse_to_unicode(bytes: &[u8]) -> ToUnicode {
    let tokens = tokenize_cmap(bytes);
    let mut map = ToUnicode::default();
    let mut i = 0;
    while i < tokens.len() {
        match &tokens[i] {
            CMapToken::Word(w) if w == "beginbfchar" => {
                i += 1;
                while let (Some(CMapToken::Hex(src)), Some(CMapToken::Hex(dst))) =
                    (tokens.get(i), tokens.get(i + 1))
                {
                    map.chars.insert(code_value(src), utf16_text(dst));
                    i += 2;
                }
            }
            CMapToken::Word(w) if w == "beginbfrange" => {
                i += 1;
                while let (Some(CMapToken::Hex(lo)), Some(CMapToken::Hex(hi))) =
                    (tokens.get(i), tokens.get(i + 1))
                {
                    let (lo, hi) = (code_value(lo), code_value(hi));
                    match tokens.get(i + 2) {
                        Some(CMapToken::Hex(dst)) => {
                            if lo <= hi && !dst.is_empty() {
                                map.ranges.push((lo, hi, dst.clone()));
                            }
                            i += 3;
                        }
                        Some(CMapToken::ArrayStart) => {
                            let mut j = i + 3;
                            let mut code = Some(lo);
                            while let Some(CMapToken::Hex(dst)) = tokens.get(j) {
                                if let Some(c) = code.filter(|c| *c <= hi) {
                                    map.chars.insert(c, utf16_text(dst));
                                }
                                code = code.and_then(|c| c.checked_add(1));
                                j += 1;
                            }
                            i = j + 1;
                        }
                        _ => break,
                    }
                }
            }
            _ => i += 1,
        }
    }
    map
}
