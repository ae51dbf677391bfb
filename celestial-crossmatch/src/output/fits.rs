//! FITS binary table output.
//!
//! The file holds an empty primary HDU followed by one `BINTABLE` extension
//! named `CROSSMATCH`. Column formats:
//!
//! | Column data | TFORM | Null |
//! |-------------|-------|------|
//! | float | `D` | IEEE NaN |
//! | integer | `K` | `TNULLn` = `i64::MIN` |
//! | boolean | `L` | byte 0 |
//! | text, object | `nA` | empty string |
//!
//! Text and object columns are coerced to strings before writing, so `n` is
//! the longest value in bytes (at least 1). Non-ASCII characters are written
//! as `?`.

use super::write_atomic;
use crate::error::{CrossmatchError, Result};
use celestial_catalog::{CatalogueTable, Column, ColumnData};
use std::io::Write;
use std::path::Path;

const FITS_BLOCK_SIZE: usize = 2880;
const CARD_SIZE: usize = 80;
const MAX_FIELDS: usize = 999;
const INT_NULL: i64 = i64::MIN;
pub const EXTNAME: &str = "CROSSMATCH";

#[derive(Debug, Clone)]
enum CardValue {
    Logical(bool),
    Integer(i64),
    String(String),
}

#[derive(Debug, Clone)]
struct Card {
    keyword: String,
    value: Option<CardValue>,
    comment: Option<String>,
}

impl Card {
    fn new(keyword: impl Into<String>, value: CardValue) -> Self {
        Self {
            keyword: keyword.into(),
            value: Some(value),
            comment: None,
        }
    }

    fn logical(keyword: &str, value: bool) -> Self {
        Self::new(keyword, CardValue::Logical(value))
    }

    fn integer(keyword: impl Into<String>, value: i64) -> Self {
        Self::new(keyword, CardValue::Integer(value))
    }

    fn string(keyword: impl Into<String>, value: &str) -> Self {
        Self::new(keyword, CardValue::String(value.to_string()))
    }

    fn with_comment(mut self, comment: &str) -> Self {
        self.comment = Some(comment.to_string());
        self
    }

    fn end() -> Self {
        Self {
            keyword: "END".to_string(),
            value: None,
            comment: None,
        }
    }
}

/// One binary table column, laid out for writing.
struct Field<'a> {
    column: &'a Column,
    tform: String,
    width: usize,
}

impl<'a> Field<'a> {
    fn new(column: &'a Column) -> Result<Self> {
        let (tform, width) = match &column.data {
            ColumnData::Float(_) => ("D".to_string(), 8),
            ColumnData::Int(_) => ("K".to_string(), 8),
            ColumnData::Bool(_) => ("L".to_string(), 1),
            ColumnData::Text(values) => {
                let width = values
                    .iter()
                    .map(|v| v.as_deref().map(str::len).unwrap_or(0))
                    .max()
                    .unwrap_or(0)
                    .max(1);
                (format!("{}A", width), width)
            }
            ColumnData::Object(_) => {
                return Err(CrossmatchError::Output(format!(
                    "column '{}' must be coerced to text before writing",
                    column.name
                )))
            }
        };
        Ok(Self {
            column,
            tform,
            width,
        })
    }

    fn encode(&self, row: usize, out: &mut Vec<u8>) {
        match &self.column.data {
            ColumnData::Float(v) => out.extend_from_slice(&v[row].to_be_bytes()),
            ColumnData::Int(v) => out.extend_from_slice(&v[row].unwrap_or(INT_NULL).to_be_bytes()),
            ColumnData::Bool(v) => out.push(match v[row] {
                Some(true) => b'T',
                Some(false) => b'F',
                None => 0,
            }),
            ColumnData::Text(v) => {
                let start = out.len();
                out.extend(v[row].as_deref().unwrap_or("").chars().map(ascii_byte));
                out.resize(start + self.width, b' ');
            }
            ColumnData::Object(_) => {}
        }
    }
}

fn ascii_byte(c: char) -> u8 {
    if c.is_ascii() && !c.is_ascii_control() {
        c as u8
    } else {
        b'?'
    }
}

/// Write `table` to `path` as a FITS binary table, replacing any existing
/// file.
pub fn write_fits(table: &CatalogueTable, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let mut table = table.clone();
    table.coerce_text();

    if table.columns().len() > MAX_FIELDS {
        return Err(CrossmatchError::Output(format!(
            "{} columns exceed the FITS limit of {}",
            table.columns().len(),
            MAX_FIELDS
        )));
    }

    let fields = table
        .columns()
        .iter()
        .map(Field::new)
        .collect::<Result<Vec<_>>>()?;
    let row_size: usize = fields.iter().map(|f| f.width).sum();

    let mut bytes = encode_header(&primary_header())?;
    bytes.extend(encode_header(&bintable_header(&fields, row_size, table.len()))?);

    let data_start = bytes.len();
    bytes.reserve(row_size * table.len());
    for row in 0..table.len() {
        for field in &fields {
            field.encode(row, &mut bytes);
        }
    }
    pad_block(&mut bytes, data_start, 0);

    write_atomic(path, |w| Ok(w.write_all(&bytes)?))?;
    tracing::info!(
        path = %path.display(),
        rows = table.len(),
        columns = fields.len(),
        "wrote FITS table"
    );
    Ok(())
}

fn primary_header() -> Vec<Card> {
    vec![
        Card::logical("SIMPLE", true).with_comment("conforms to FITS standard"),
        Card::integer("BITPIX", 8),
        Card::integer("NAXIS", 0),
        Card::logical("EXTEND", true),
    ]
}

fn bintable_header(fields: &[Field<'_>], row_size: usize, rows: usize) -> Vec<Card> {
    let mut cards = vec![
        Card::string("XTENSION", "BINTABLE").with_comment("binary table extension"),
        Card::integer("BITPIX", 8),
        Card::integer("NAXIS", 2),
        Card::integer("NAXIS1", row_size as i64).with_comment("bytes per row"),
        Card::integer("NAXIS2", rows as i64).with_comment("number of rows"),
        Card::integer("PCOUNT", 0),
        Card::integer("GCOUNT", 1),
        Card::integer("TFIELDS", fields.len() as i64),
    ];

    for (i, field) in fields.iter().enumerate() {
        let n = i + 1;
        cards.push(Card::string(format!("TTYPE{}", n), &field.column.name));
        cards.push(Card::string(format!("TFORM{}", n), &field.tform));
        if let Some(unit) = &field.column.unit {
            cards.push(Card::string(format!("TUNIT{}", n), unit));
        }
        if matches!(field.column.data, ColumnData::Int(_)) {
            cards.push(Card::integer(format!("TNULL{}", n), INT_NULL));
        }
    }

    cards.push(Card::string("EXTNAME", EXTNAME));
    cards
}

fn encode_header(cards: &[Card]) -> Result<Vec<u8>> {
    let mut bytes = Vec::with_capacity(FITS_BLOCK_SIZE);
    for card in cards.iter().chain(std::iter::once(&Card::end())) {
        bytes.extend_from_slice(&format_card(card)?);
    }
    pad_block(&mut bytes, 0, b' ');
    Ok(bytes)
}

/// Pad `bytes[start..]` with `fill` to a whole number of FITS blocks.
fn pad_block(bytes: &mut Vec<u8>, start: usize, fill: u8) {
    let used = (bytes.len() - start) % FITS_BLOCK_SIZE;
    if used != 0 {
        bytes.resize(bytes.len() + FITS_BLOCK_SIZE - used, fill);
    }
}

fn valid_keyword(keyword: &str) -> bool {
    keyword.len() <= 8
        && keyword
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit() || b == b'_' || b == b'-')
}

fn format_card(card: &Card) -> Result<[u8; CARD_SIZE]> {
    let mut out = [b' '; CARD_SIZE];

    if !valid_keyword(&card.keyword) {
        return Err(CrossmatchError::Output(format!("invalid FITS keyword '{}'", card.keyword)));
    }
    out[..card.keyword.len()].copy_from_slice(card.keyword.as_bytes());

    let Some(value) = &card.value else {
        return Ok(out);
    };
    out[8] = b'=';

    // Fixed format: numbers and logicals right-justified to column 30,
    // strings start at column 11
    let text = match value {
        CardValue::Logical(b) => format!("{:>20}", if *b { "T" } else { "F" }),
        CardValue::Integer(i) => format!("{:>20}", i),
        CardValue::String(s) => {
            let escaped = s
                .chars()
                .map(|c| ascii_byte(c) as char)
                .collect::<String>()
                .replace('\'', "''");
            format!("'{:<8}'", escaped)
        }
    };
    if text.len() > CARD_SIZE - 10 {
        return Err(CrossmatchError::Output(format!(
            "value for {} does not fit in one card",
            card.keyword
        )));
    }
    out[10..10 + text.len()].copy_from_slice(text.as_bytes());

    if let Some(comment) = &card.comment {
        let start = (10 + text.len()).max(30) + 1;
        if start + 2 < CARD_SIZE {
            out[start] = b'/';
            let room = CARD_SIZE - start - 2;
            let bytes: Vec<u8> = comment.chars().map(ascii_byte).take(room).collect();
            out[start + 2..start + 2 + bytes.len()].copy_from_slice(&bytes);
        }
    }

    Ok(out)
}
