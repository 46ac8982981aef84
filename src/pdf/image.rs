//! Image XObject sample decoding for the raster classifier.
//!
//! Produces an interleaved 8-bit sample buffer and immediately reduces it
//! to [`PixelStats`]; the buffer never outlives the call.

use image::ImageFormat;
use lopdf::{Document, Object, Stream};

use crate::classify::PixelStats;
use crate::error::DecodeError;

use super::objects::{get, get_number, name, resolve, resolve_array, resolve_stream, stream_bytes, stream_filters};

/// How raw samples map to color channels.
#[derive(Debug, Clone, PartialEq)]
enum SampleSpace {
    Direct { channels: usize, invert: bool },
    Indexed { base_channels: usize, palette: Vec<u8> },
}

/// Decodes an image stream and computes its brightness statistics.
pub fn decode_pixel_stats(doc: &Document, stream: &Stream) -> Result<PixelStats, DecodeError> {
    let filters = stream_filters(doc, stream);
    let is_jpeg = matches!(filters.last().map(Vec::as_slice), Some(b"DCTDecode" | b"DCT"));

    if is_jpeg {
        if filters.len() > 1 {
            return Err(DecodeError::UnsupportedFilter(
                "DCTDecode in a filter chain".to_string(),
            ));
        }
        let decoded = image::load_from_memory_with_format(&stream.content, ImageFormat::Jpeg)
            .map_err(|e| DecodeError::Jpeg(e.to_string()))?;
        let rgb = decoded.to_rgb8();
        return PixelStats::from_samples(rgb.as_raw(), 3, false);
    }

    if let Some(unsupported) = filters
        .iter()
        .find(|f| !matches!(f.as_slice(), b"FlateDecode" | b"Fl" | b"LZWDecode" | b"LZW"))
    {
        return Err(DecodeError::UnsupportedFilter(
            String::from_utf8_lossy(unsupported).into_owned(),
        ));
    }

    let data = stream_bytes(doc, stream).map_err(|e| DecodeError::Decompression(e.to_string()))?;

    let dict = &stream.dict;
    let width = get_number(doc, dict, b"Width").ok_or(DecodeError::MissingAttribute("Width"))?;
    let height = get_number(doc, dict, b"Height").ok_or(DecodeError::MissingAttribute("Height"))?;
    if width < 1.0 || height < 1.0 {
        return Err(DecodeError::Empty);
    }
    let (width, height) = (width as usize, height as usize);

    let is_mask = matches!(get(doc, dict, b"ImageMask"), Some(Object::Boolean(true)));
    let (space, bits) = if is_mask {
        (
            SampleSpace::Direct {
                channels: 1,
                invert: false,
            },
            1,
        )
    } else {
        let space = match get(doc, dict, b"ColorSpace") {
            Some(cs) => sample_space(doc, cs)?,
            None => return Err(DecodeError::MissingAttribute("ColorSpace")),
        };
        let bits = get_number(doc, dict, b"BitsPerComponent").unwrap_or(8.0) as i64;
        (space, bits)
    };
    if !matches!(bits, 1 | 2 | 4 | 8 | 16) {
        return Err(DecodeError::UnsupportedBitDepth(bits));
    }

    let components = match &space {
        SampleSpace::Direct { channels, .. } => *channels,
        SampleSpace::Indexed { .. } => 1,
    };
    let raw = unpack_samples(&data, width, height, components, bits as u32)?;

    match space {
        SampleSpace::Direct { channels, invert } => {
            let samples: Vec<u8> = raw
                .into_iter()
                .map(|v| {
                    let v = if bits < 8 { scale_to_byte(v, bits as u32) } else { v };
                    if invert {
                        255 - v
                    } else {
                        v
                    }
                })
                .collect();
            PixelStats::from_samples(&samples, channels, false)
        }
        SampleSpace::Indexed {
            base_channels,
            palette,
        } => {
            let mut expanded = Vec::with_capacity(raw.len() * base_channels);
            for index in raw {
                let start = usize::from(index) * base_channels;
                match palette.get(start..start + base_channels) {
                    Some(entry) => expanded.extend_from_slice(entry),
                    None => expanded.extend(std::iter::repeat(0).take(base_channels)),
                }
            }
            PixelStats::from_samples(&expanded, base_channels, false)
        }
    }
}

/// Unpacks rows of `bits`-wide samples into one byte per sample. Sub-byte
/// values are returned unscaled since palette indices must stay raw;
/// 16-bit samples keep their high byte.
///
/// The declared dimensions must fit in `data`; buffers are never sized from
/// the dimensions alone.
fn unpack_samples(
    data: &[u8],
    width: usize,
    height: usize,
    components: usize,
    bits: u32,
) -> Result<Vec<u8>, DecodeError> {
    let truncated = || DecodeError::Truncated {
        width,
        height,
        actual: data.len(),
    };
    let per_row = width.checked_mul(components).ok_or_else(truncated)?;
    let samples = per_row.checked_mul(height).ok_or_else(truncated)?;
    let row_bytes = per_row
        .checked_mul(bits as usize)
        .map(|row_bits| row_bits.div_ceil(8))
        .ok_or_else(truncated)?;
    let required = row_bytes.checked_mul(height).ok_or_else(truncated)?;
    if required > data.len() {
        return Err(truncated());
    }

    Ok(match bits {
        8 => data[..samples].to_vec(),
        16 => data.chunks_exact(2).take(samples).map(|pair| pair[0]).collect(),
        _ => {
            let max = (1u32 << bits) - 1;
            let mut out = Vec::with_capacity(samples);
            for row in data.chunks(row_bytes).take(height) {
                for i in 0..per_row {
                    let bit = i * bits as usize;
                    let shift = 8 - bits as usize - (bit % 8);
                    let value = (u32::from(row[bit / 8]) >> shift) & max;
                    out.push(value as u8);
                }
            }
            out
        }
    })
}

fn scale_to_byte(value: u8, bits: u32) -> u8 {
    let max = (1u32 << bits) - 1;
    (u32::from(value) * 255 / max) as u8
}

fn sample_space(doc: &Document, cs: &Object) -> Result<SampleSpace, DecodeError> {
    if let Some(family) = name(cs) {
        return direct_channels(family).map(|channels| SampleSpace::Direct {
            channels,
            invert: false,
        });
    }
    let items = resolve_array(doc, cs)
        .ok_or_else(|| DecodeError::UnsupportedColorSpace("malformed".to_string()))?;
    let family = items
        .first()
        .and_then(|o| resolve(doc, o))
        .and_then(|(_, o)| name(o))
        .ok_or_else(|| DecodeError::UnsupportedColorSpace("unnamed".to_string()))?;

    match family {
        b"ICCBased" => {
            let channels = items
                .get(1)
                .and_then(|o| resolve_stream(doc, o))
                .and_then(|(_, s)| get_number(doc, &s.dict, b"N"))
                .ok_or(DecodeError::MissingAttribute("N"))?;
            Ok(SampleSpace::Direct {
                channels: channels as usize,
                invert: false,
            })
        }
        b"Separation" => Ok(SampleSpace::Direct {
            channels: 1,
            invert: true,
        }),
        b"Indexed" | b"I" => {
            let base = items
                .get(1)
                .and_then(|o| resolve(doc, o))
                .map(|(_, o)| o)
                .ok_or(DecodeError::MissingAttribute("Indexed base"))?;
            let base_channels = match sample_space(doc, base)? {
                SampleSpace::Direct { channels, .. } => channels,
                SampleSpace::Indexed { .. } => {
                    return Err(DecodeError::UnsupportedColorSpace("nested Indexed".to_string()))
                }
            };
            let palette = match items.get(3).and_then(|o| resolve(doc, o)).map(|(_, o)| o) {
                Some(Object::String(bytes, _)) => bytes.clone(),
                Some(Object::Stream(s)) => {
                    stream_bytes(doc, s).map_err(|e| DecodeError::Decompression(e.to_string()))?
                }
                _ => return Err(DecodeError::MissingAttribute("Indexed lookup")),
            };
            Ok(SampleSpace::Indexed {
                base_channels,
                palette,
            })
        }
        other => direct_channels(other).map(|channels| SampleSpace::Direct {
            channels,
            invert: false,
        }),
    }
}

fn direct_channels(family: &[u8]) -> Result<usize, DecodeError> {
    match family {
        b"DeviceGray" | b"CalGray" | b"G" => Ok(1),
        b"DeviceRGB" | b"CalRGB" | b"Lab" | b"RGB" => Ok(3),
        b"DeviceCMYK" | b"CMYK" => Ok(4),
        other => Err(DecodeError::UnsupportedColorSpace(
            String::from_utf8_lossy(other).into_owned(),
        )),
    }
}
