use std::fs::File;
use std::io::{BufWriter, Cursor, Write};
use std::path::Path;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use memmap2::Mmap;
use ndarray::Array2;
use tracing::debug;

use crate::error::{CcdError, Result};
use crate::frame::{Frame, Header, HeaderValue};

pub const FITS_BLOCK_SIZE: usize = 2880;
const CARD_SIZE: usize = 80;

/// Keywords owned by the codec. They describe the on-disk layout and are
/// never carried in a [`Header`].
const STRUCTURAL_KEYWORDS: &[&str] = &[
    "SIMPLE", "BITPIX", "NAXIS", "NAXIS1", "NAXIS2", "EXTEND", "BSCALE", "BZERO", "END",
];

/// Layout of the primary HDU data unit.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FitsLayout {
    pub bitpix: i32,
    pub width: usize,
    pub height: usize,
    pub bscale: f64,
    pub bzero: f64,
    /// Byte offset of the first pixel.
    pub data_offset: usize,
}

impl FitsLayout {
    pub fn bytes_per_pixel(&self) -> usize {
        (self.bitpix.unsigned_abs() / 8) as usize
    }

    pub fn data_byte_size(&self) -> usize {
        self.width * self.height * self.bytes_per_pixel()
    }
}

/// Memory-mapped reader for the primary image of a FITS file.
pub struct FitsReader {
    mmap: Mmap,
    pub layout: FitsLayout,
    pub header: Header,
}

impl FitsReader {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };

        if mmap.len() < FITS_BLOCK_SIZE || !mmap.starts_with(b"SIMPLE  =") {
            return Err(CcdError::InvalidFits(format!(
                "{} is not a FITS file",
                path.display()
            )));
        }

        let (layout, header) = parse_header(&mmap)?;
        let end = layout.data_offset + layout.data_byte_size();
        if mmap.len() < end {
            return Err(CcdError::InvalidFits(format!(
                "File truncated: expected at least {} bytes, got {}",
                end,
                mmap.len()
            )));
        }

        Ok(Self {
            mmap,
            layout,
            header,
        })
    }

    /// Decode the image, applying BSCALE/BZERO.
    pub fn read_data(&self) -> Result<Array2<f32>> {
        let l = self.layout;
        let raw = &self.mmap[l.data_offset..l.data_offset + l.data_byte_size()];
        let n = l.width * l.height;
        let mut cursor = Cursor::new(raw);
        let mut values = Vec::with_capacity(n);
        for _ in 0..n {
            let physical = match l.bitpix {
                8 => cursor.read_u8()? as f64,
                16 => cursor.read_i16::<BigEndian>()? as f64,
                32 => cursor.read_i32::<BigEndian>()? as f64,
                -32 => cursor.read_f32::<BigEndian>()? as f64,
                -64 => cursor.read_f64::<BigEndian>()?,
                other => {
                    return Err(CcdError::InvalidFits(format!("unsupported BITPIX {other}")))
                }
            };
            values.push((l.bzero + l.bscale * physical) as f32);
        }
        // NAXIS1 is the fastest varying axis, i.e. columns.
        Array2::from_shape_vec((l.height, l.width), values)
            .map_err(|e| CcdError::InvalidFits(e.to_string()))
    }

    pub fn into_frame(self, filename: impl Into<String>) -> Result<Frame> {
        let data = self.read_data()?;
        Ok(Frame::new(data, self.header).with_filename(filename))
    }
}

/// Read a FITS file into a [`Frame`] named after the file.
pub fn read_fits(path: &Path) -> Result<Frame> {
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let reader = FitsReader::open(path)?;
    debug!(
        file = %filename,
        bitpix = reader.layout.bitpix,
        width = reader.layout.width,
        height = reader.layout.height,
        "Reading FITS"
    );
    reader.into_frame(filename)
}

fn parse_header(buf: &[u8]) -> Result<(FitsLayout, Header)> {
    let mut header = Header::new();
    let mut bitpix = None;
    let mut naxis = None;
    let mut naxis1 = None;
    let mut naxis2 = None;
    let mut bscale = 1.0;
    let mut bzero = 0.0;
    let mut end_card = None;

    for (i, raw) in buf.chunks_exact(CARD_SIZE).enumerate() {
        let card: String = raw
            .iter()
            .map(|&b| if b.is_ascii() { b as char } else { '?' })
            .collect();
        let keyword = card[..8].trim_end();

        if keyword == "END" {
            end_card = Some(i);
            break;
        }
        if keyword == "HISTORY" {
            header.add_history(card[8..].trim());
            continue;
        }
        if keyword.is_empty() || keyword == "COMMENT" || &card[8..10] != "= " {
            continue;
        }

        let value = parse_value(&card[10..]);
        match keyword {
            "BITPIX" => bitpix = value.as_i64(),
            "NAXIS" => naxis = value.as_i64(),
            "NAXIS1" => naxis1 = value.as_i64(),
            "NAXIS2" => naxis2 = value.as_i64(),
            "BSCALE" => bscale = value.as_f64().unwrap_or(1.0),
            "BZERO" => bzero = value.as_f64().unwrap_or(0.0),
            k if STRUCTURAL_KEYWORDS.contains(&k) => {}
            k => header.set(k, value),
        }
    }

    let end_card = end_card.ok_or_else(|| CcdError::InvalidFits("missing END card".into()))?;
    let bitpix = bitpix.ok_or(CcdError::MissingKeyword("BITPIX"))? as i32;
    if !matches!(bitpix, 8 | 16 | 32 | -32 | -64) {
        return Err(CcdError::InvalidFits(format!("unsupported BITPIX {bitpix}")));
    }
    if naxis.ok_or(CcdError::MissingKeyword("NAXIS"))? != 2 {
        return Err(CcdError::InvalidFits(
            "only two-dimensional images are supported".into(),
        ));
    }
    let width = naxis1.ok_or(CcdError::MissingKeyword("NAXIS1"))?;
    let height = naxis2.ok_or(CcdError::MissingKeyword("NAXIS2"))?;
    if width <= 0 || height <= 0 {
        return Err(CcdError::InvalidFits(format!(
            "invalid image size {width}x{height}"
        )));
    }

    let header_bytes = (end_card + 1) * CARD_SIZE;
    let layout = FitsLayout {
        bitpix,
        width: width as usize,
        height: height as usize,
        bscale,
        bzero,
        data_offset: padded_len(header_bytes),
    };
    Ok((layout, header))
}

/// Value field of a card (everything after `= `), comment stripped.
fn parse_value(field: &str) -> HeaderValue {
    let field = field.trim_start();

    if let Some(rest) = field.strip_prefix('\'') {
        // Quotes inside a string are doubled.
        let mut out = String::new();
        let mut chars = rest.chars().peekable();
        while let Some(c) = chars.next() {
            if c == '\'' {
                if chars.peek() == Some(&'\'') {
                    out.push('\'');
                    chars.next();
                } else {
                    break;
                }
            } else {
                out.push(c);
            }
        }
        return HeaderValue::Str(out.trim_end().to_string());
    }

    let value = field.split('/').next().unwrap_or("").trim();
    match value {
        "T" => HeaderValue::Bool(true),
        "F" => HeaderValue::Bool(false),
        v => {
            if let Ok(i) = v.parse::<i64>() {
                HeaderValue::Int(i)
            } else if let Ok(f) = v.replace(['D', 'd'], "E").parse::<f64>() {
                HeaderValue::Float(f)
            } else {
                HeaderValue::Str(v.to_string())
            }
        }
    }
}

fn padded_len(len: usize) -> usize {
    len.div_ceil(FITS_BLOCK_SIZE) * FITS_BLOCK_SIZE
}

/// Write a frame as a single-HDU FITS file with 32-bit float pixels.
pub fn write_fits(frame: &Frame, path: &Path) -> Result<()> {
    let file = File::create(path)?;
    let mut w = BufWriter::new(file);
    let (height, width) = frame.shape();

    let mut cards = 0usize;
    let mut put = |w: &mut BufWriter<File>, card: [u8; CARD_SIZE]| -> Result<()> {
        w.write_all(&card)?;
        cards += 1;
        Ok(())
    };

    put(&mut w, value_card("SIMPLE", &HeaderValue::Bool(true)))?;
    put(&mut w, value_card("BITPIX", &HeaderValue::Int(-32)))?;
    put(&mut w, value_card("NAXIS", &HeaderValue::Int(2)))?;
    put(&mut w, value_card("NAXIS1", &HeaderValue::from(width)))?;
    put(&mut w, value_card("NAXIS2", &HeaderValue::from(height)))?;
    for (key, value) in frame.header.iter() {
        if STRUCTURAL_KEYWORDS.contains(&key) {
            continue;
        }
        put(&mut w, value_card(key, value))?;
    }
    for entry in frame.header.history() {
        // Long entries continue on following HISTORY cards.
        let chars: Vec<char> = entry.chars().collect();
        for chunk in chars.chunks(CARD_SIZE - 8) {
            let text: String = chunk.iter().collect();
            put(&mut w, text_card("HISTORY", &text))?;
        }
        if chars.is_empty() {
            put(&mut w, text_card("HISTORY", ""))?;
        }
    }
    put(&mut w, text_card("END", ""))?;

    let header_bytes = cards * CARD_SIZE;
    w.write_all(&vec![b' '; padded_len(header_bytes) - header_bytes])?;

    for &v in frame.data.iter() {
        w.write_f32::<BigEndian>(v)?;
    }
    let data_bytes = frame.data.len() * 4;
    w.write_all(&vec![0u8; padded_len(data_bytes) - data_bytes])?;

    w.flush()?;
    debug!(file = %path.display(), width, height, "Wrote FITS");
    Ok(())
}

fn text_card(keyword: &str, text: &str) -> [u8; CARD_SIZE] {
    let mut card = [b' '; CARD_SIZE];
    put_ascii(&mut card[..8], keyword);
    put_ascii(&mut card[8..], text);
    card
}

fn value_card(keyword: &str, value: &HeaderValue) -> [u8; CARD_SIZE] {
    let mut card = [b' '; CARD_SIZE];
    put_ascii(&mut card[..8], keyword);
    card[8] = b'=';
    let rendered = match value {
        HeaderValue::Str(s) => format!("'{:<8}'", s.replace('\'', "''")),
        HeaderValue::Int(i) => format!("{i:>20}"),
        HeaderValue::Float(f) => format!("{:>20}", format_float(*f)),
        HeaderValue::Bool(b) => format!("{:>20}", if *b { "T" } else { "F" }),
    };
    put_ascii(&mut card[10..], &rendered);
    card
}

/// Floats always carry a decimal point or exponent so they read back as floats.
fn format_float(f: f64) -> String {
    let s = format!("{f:?}");
    if s.contains(['.', 'e', 'E']) || !f.is_finite() {
        s
    } else {
        format!("{s}.0")
    }
}

fn put_ascii(dst: &mut [u8], text: &str) {
    for (d, c) in dst.iter_mut().zip(text.chars()) {
        *d = if c.is_ascii() && !c.is_ascii_control() {
            c as u8
        } else {
            b'?'
        };
    }
}
