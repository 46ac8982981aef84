//! Small helpers for reading loosely-typed lopdf objects.

use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

use crate::geometry::Rect;

/// Reference chains longer than this are treated as broken.
const MAX_REFERENCE_DEPTH: usize = 32;

/// Page-tree depth limit when looking up inherited attributes.
const MAX_PARENT_DEPTH: usize = 64;

/// US Letter, used when a page carries no usable box at all.
pub const DEFAULT_PAGE_BOX: Rect = Rect {
    x0: 0.0,
    y0: 0.0,
    x1: 612.0,
    y1: 792.0,
};

/// Follows references until a direct object is reached. Returns the id of
/// the last reference followed, if any.
pub fn resolve<'a>(doc: &'a Document, object: &'a Object) -> Option<(Option<ObjectId>, &'a Object)> {
    let mut current = object;
    let mut id = None;
    for _ in 0..MAX_REFERENCE_DEPTH {
        match current {
            Object::Reference(r) => {
                id = Some(*r);
                current = doc.get_object(*r).ok()?;
            }
            other => return Some((id, other)),
        }
    }
    None
}

/// Resolves `object` and returns it only if it is a dictionary. Streams
/// yield their dictionary.
pub fn resolve_dict<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Dictionary> {
    match resolve(doc, object)?.1 {
        Object::Dictionary(dict) => Some(dict),
        Object::Stream(stream) => Some(&stream.dict),
        _ => None,
    }
}

pub fn resolve_stream<'a>(doc: &'a Document, object: &'a Object) -> Option<(Option<ObjectId>, &'a Stream)> {
    match resolve(doc, object)? {
        (id, Object::Stream(stream)) => Some((id, stream)),
        _ => None,
    }
}

pub fn resolve_array<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Vec<Object>> {
    match resolve(doc, object)?.1 {
        Object::Array(items) => Some(items),
        _ => None,
    }
}

/// Looks up `key` in `dict` and resolves the value.
pub fn get<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
    let value = dict.get(key).ok()?;
    resolve(doc, value).map(|(_, object)| object)
}

/// Numeric value of an integer or real object.
pub fn number(object: &Object) -> Option<f64> {
    match object {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(f64::from(*r)),
        _ => None,
    }
}

pub fn get_number(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<f64> {
    get(doc, dict, key).and_then(number)
}

pub fn name(object: &Object) -> Option<&[u8]> {
    match object {
        Object::Name(n) => Some(n.as_slice()),
        _ => None,
    }
}

pub fn get_name<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a [u8]> {
    get(doc, dict, key).and_then(name)
}

/// Builds a PDF real from an `f64`, whatever precision lopdf stores.
pub fn real(value: f64) -> Object {
    Object::Real(value as _)
}

/// Four-number array as a rectangle.
pub fn rect_from_array(doc: &Document, object: &Object) -> Option<Rect> {
    let items = resolve_array(doc, object)?;
    if items.len() != 4 {
        return None;
    }
    let mut values = [0.0; 4];
    for (slot, item) in values.iter_mut().zip(items) {
        *slot = resolve(doc, item).and_then(|(_, o)| number(o))?;
    }
    let rect = Rect::new(values[0], values[1], values[2], values[3]);
    (!rect.is_empty()).then_some(rect)
}

pub fn rect_to_array(rect: &Rect) -> Object {
    Object::Array(rect.to_array().iter().map(|v| real(*v)).collect())
}

/// Finds a page attribute, walking up the page tree for inheritable keys
/// (`Resources`, `MediaBox`, `CropBox`, `Rotate`).
pub fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_PARENT_DEPTH {
        if let Ok(value) = node.get(key) {
            return resolve(doc, value).map(|(_, object)| object);
        }
        let parent = node.get(b"Parent").ok()?;
        node = resolve_dict(doc, parent)?;
    }
    None
}

/// The visible page rectangle: the crop box clipped to the media box, or
/// the media box alone.
pub fn page_box(doc: &Document, page_id: ObjectId) -> Rect {
    let media = inherited(doc, page_id, b"MediaBox")
        .and_then(|o| rect_from_array(doc, o))
        .unwrap_or(DEFAULT_PAGE_BOX);
    let crop = inherited(doc, page_id, b"CropBox").and_then(|o| rect_from_array(doc, o));
    match crop {
        Some(crop) if crop.intersects(&media) => Rect::new(
            crop.x0.max(media.x0),
            crop.y0.max(media.y0),
            crop.x1.min(media.x1),
            crop.y1.min(media.y1),
        ),
        _ => media,
    }
}

pub fn page_rotation(doc: &Document, page_id: ObjectId) -> i64 {
    match inherited(doc, page_id, b"Rotate") {
        Some(Object::Integer(r)) => r.rem_euclid(360),
        _ => 0,
    }
}

/// The filter names of a stream, in application order.
pub fn stream_filters(doc: &Document, stream: &Stream) -> Vec<Vec<u8>> {
    match get(doc, &stream.dict, b"Filter") {
        Some(Object::Name(n)) => vec![n.clone()],
        Some(Object::Array(items)) => items
            .iter()
            .filter_map(|item| resolve(doc, item).and_then(|(_, o)| name(o)).map(<[u8]>::to_vec))
            .collect(),
        _ => Vec::new(),
    }
}

/// Decoded bytes of a content-like stream (form XObjects, CMaps).
pub fn stream_bytes(doc: &Document, stream: &Stream) -> Result<Vec<u8>, lopdf::Error> {
    if stream_filters(doc, stream).is_empty() {
        Ok(stream.content.clone())
    } else {
        stream.decompressed_content()
    }
}
