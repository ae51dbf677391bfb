//! VOTable `TABLEDATA` reader.
//!
//! Cone-search services answer with a VOTable document. Only the first
//! `TABLE` is read: its `FIELD` elements give column names and datatypes, and
//! its `TABLEDATA` rows give the cells. Binary serialisations are rejected.
//! The whole document is scanned for a `QUERY_STATUS` error, including any
//! `INFO` placed after the table.
//!
//! A numeric cell equal to its field's `<VALUES null="...">` sentinel is read
//! as null (`None` for integers, `NaN` for floats).
//!
//! Datatype mapping:
//!
//! | VOTable `datatype` | [`ColumnData`] |
//! |--------------------|----------------|
//! | `double`, `float` | `Float` |
//! | `short`, `int`, `long`, `unsignedByte` | `Int` |
//! | `boolean` | `Bool` |
//! | `char`, `unicodeChar` | `Text` |
//! | numeric arrays, anything else | `Object` |

use crate::error::{CatalogError, Result};
use crate::table::{CatalogueTable, Column, ColumnData, Value};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

#[derive(Debug, Clone, Default)]
struct FieldDef {
    name: String,
    datatype: Option<String>,
    arraysize: Option<String>,
    unit: Option<String>,
    ucd: Option<String>,
    null: Option<String>,
}

impl FieldDef {
    fn is_scalar(&self) -> bool {
        matches!(self.arraysize.as_deref(), None | Some("1"))
    }

    fn is_null(&self, cell: &str) -> bool {
        self.null.as_deref().map(str::trim) == Some(cell)
    }
}

#[derive(Default)]
struct ParseState {
    fields: Vec<FieldDef>,
    rows: Vec<Vec<Option<String>>>,
    current_row: Option<Vec<Option<String>>>,
    current_cell: Option<String>,
    in_table: bool,
    in_field: bool,
    seen_table: bool,
    error_info: Option<String>,
    in_error_info: bool,
}

/// Parse a VOTable document into a table named `catalogue`.
pub fn parse_votable(catalogue: &str, xml: &str) -> Result<CatalogueTable> {
    let fail = |message: String| CatalogError::query_failure(catalogue, message);

    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut state = ParseState::default();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => handle_start(&e, &mut state, false).map_err(fail)?,
            Ok(Event::Empty(e)) => {
                handle_start(&e, &mut state, true).map_err(fail)?;
                if e.local_name().as_ref() == b"TABLE" {
                    state.in_table = false;
                }
            }
            Ok(Event::Text(e)) => {
                let text = e
                    .unescape()
                    .map_err(|err| fail(format!("invalid text content: {}", err)))?;
                append_text(&mut state, &text);
            }
            Ok(Event::CData(e)) => {
                let text = String::from_utf8_lossy(&e.into_inner()).to_string();
                append_text(&mut state, &text);
            }
            Ok(Event::End(e)) => handle_end(e.local_name().as_ref(), &mut state).map_err(fail)?,
            Ok(Event::Eof) => {
                if state.in_table {
                    return Err(fail("truncated VOTable: TABLE is not closed".to_string()));
                }
                break;
            }
            Err(e) => return Err(fail(format!("malformed VOTable: {}", e))),
            _ => {}
        }
    }

    if let Some(message) = state.error_info {
        let message = if message.trim().is_empty() {
            "service reported QUERY_STATUS=ERROR".to_string()
        } else {
            message.trim().to_string()
        };
        return Err(fail(message));
    }

    if !state.seen_table {
        return Err(fail("response contains no TABLE element".to_string()));
    }

    build_table(catalogue, &state.fields, &state.rows)
}

fn handle_start(
    element: &BytesStart,
    state: &mut ParseState,
    empty: bool,
) -> std::result::Result<(), String> {
    match element.local_name().as_ref() {
        // Later tables are skipped
        b"TABLE" if !state.seen_table => {
            state.in_table = true;
            state.seen_table = true;
        }
        b"FIELD" if state.in_table => {
            let field = parse_field(element, state.fields.len())?;
            state.fields.push(field);
            state.in_field = !empty;
        }
        b"VALUES" if state.in_field => {
            let null = attribute(element, b"null")?;
            if let Some(field) = state.fields.last_mut() {
                field.null = null;
            }
        }
        b"INFO" => {
            let name = attribute(element, b"name")?;
            let value = attribute(element, b"value")?;
            if name.as_deref() == Some("QUERY_STATUS") && value.as_deref() == Some("ERROR") {
                state.error_info = Some(String::new());
                state.in_error_info = !empty;
            }
        }
        b"BINARY" | b"BINARY2" | b"FITS" if state.in_table => {
            return Err(format!(
                "unsupported VOTable serialisation {}",
                String::from_utf8_lossy(element.local_name().as_ref())
            ));
        }
        b"TR" if state.in_table => state.current_row = Some(Vec::new()),
        b"TD" if state.in_table => {
            if empty {
                if let Some(row) = state.current_row.as_mut() {
                    row.push(None);
                }
            } else {
                state.current_cell = Some(String::new());
            }
        }
        _ => {}
    }
    Ok(())
}

fn handle_end(name: &[u8], state: &mut ParseState) -> std::result::Result<(), String> {
    match name {
        b"TD" => {
            if let (Some(row), Some(cell)) = (state.current_row.as_mut(), state.current_cell.take())
            {
                row.push(if cell.is_empty() { None } else { Some(cell) });
            }
        }
        b"TR" => {
            if let Some(row) = state.current_row.take() {
                if row.len() != state.fields.len() {
                    return Err(format!(
                        "row {} has {} cells, expected {}",
                        state.rows.len(),
                        row.len(),
                        state.fields.len()
                    ));
                }
                state.rows.push(row);
            }
        }
        b"INFO" => state.in_error_info = false,
        b"FIELD" => state.in_field = false,
        b"TABLE" => state.in_table = false,
        _ => {}
    }
    Ok(())
}

fn append_text(state: &mut ParseState, text: &str) {
    if let Some(cell) = state.current_cell.as_mut() {
        cell.push_str(text);
    } else if state.in_error_info {
        if let Some(message) = state.error_info.as_mut() {
            message.push_str(text);
        }
    }
}

fn parse_field(element: &BytesStart, position: usize) -> std::result::Result<FieldDef, String> {
    let name = match attribute(element, b"name")? {
        Some(name) => name,
        None => attribute(element, b"ID")?.unwrap_or_else(|| format!("col{}", position + 1)),
    };
    Ok(FieldDef {
        name,
        datatype: attribute(element, b"datatype")?,
        arraysize: attribute(element, b"arraysize")?,
        unit: attribute(element, b"unit")?,
        ucd: attribute(element, b"ucd")?,
        null: None,
    })
}

fn attribute(element: &BytesStart, key: &[u8]) -> std::result::Result<Option<String>, String> {
    for attr in element.attributes() {
        let attr = attr.map_err(|e| format!("invalid attribute: {}", e))?;
        if attr.key.as_ref() == key {
            return Ok(Some(String::from_utf8_lossy(&attr.value).to_string()));
        }
    }
    Ok(None)
}

fn build_table(
    catalogue: &str,
    fields: &[FieldDef],
    rows: &[Vec<Option<String>>],
) -> Result<CatalogueTable> {
    let columns = fields
        .iter()
        .enumerate()
        .map(|(i, field)| {
            let cells: Vec<Option<&str>> = rows.iter().map(|row| row[i].as_deref()).collect();
            let data = convert_cells(field, &cells)
                .map_err(|message| CatalogError::query_failure(catalogue, message))?;
            Ok(Column {
                name: field.name.clone(),
                unit: field.unit.clone(),
                ucd: field.ucd.clone(),
                data,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    CatalogueTable::new(catalogue, columns)
        .map_err(|e| CatalogError::query_failure(catalogue, e.to_string()))
}

fn convert_cells(field: &FieldDef, cells: &[Option<&str>]) -> std::result::Result<ColumnData, String> {
    let datatype = field.datatype.as_deref().unwrap_or("");
    let scalar = field.is_scalar();

    match datatype {
        "char" | "unicodeChar" => Ok(ColumnData::Text(
            cells.iter().map(|c| c.map(str::to_string)).collect(),
        )),
        "double" | "float" if scalar => cells
            .iter()
            .map(|c| match c.map(str::trim) {
                None => Ok(f64::NAN),
                Some(s) if field.is_null(s) => Ok(f64::NAN),
                Some(s) => s
                    .trim()
                    .parse::<f64>()
                    .map_err(|_| format!("field {}: '{}' is not a number", field.name, s)),
            })
            .collect::<std::result::Result<Vec<_>, _>>()
            .map(ColumnData::Float),
        "short" | "int" | "long" | "unsignedByte" if scalar => cells
            .iter()
            .map(|c| match c.map(str::trim) {
                None => Ok(None),
                Some(s) if field.is_null(s) => Ok(None),
                Some(s) => s
                    .trim()
                    .parse::<i64>()
                    .map(Some)
                    .map_err(|_| format!("field {}: '{}' is not an integer", field.name, s)),
            })
            .collect::<std::result::Result<Vec<_>, _>>()
            .map(ColumnData::Int),
        "boolean" if scalar => cells
            .iter()
            .map(|c| parse_boolean(&field.name, *c))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map(ColumnData::Bool),
        _ => Ok(ColumnData::Object(
            cells
                .iter()
                .map(|c| match c {
                    None => Value::Null,
                    Some(s) => Value::Text(s.to_string()),
                })
                .collect(),
        )),
    }
}

fn parse_boolean(field: &str, cell: Option<&str>) -> std::result::Result<Option<bool>, String> {
    match cell.map(str::trim) {
        None | Some("") | Some("?") => Ok(None),
        Some("T" | "t" | "1" | "true" | "TRUE" | "True") => Ok(Some(true)),
        Some("F" | "f" | "0" | "false" | "FALSE" | "False") => Ok(Some(false)),
        Some(other) => Err(format!("field {}: '{}' is not a boolean", field, other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<VOTABLE version="1.3" xmlns="http://www.ivoa.net/xml/VOTable/v1.3">
  <RESOURCE type="results">
    <INFO name="QUERY_STATUS" value="OK"/>
    <TABLE name="results">
      <FIELD name="Source_Name" datatype="char" arraysize="*"/>
      <FIELD name="RA" datatype="double" unit="deg" ucd="pos.eq.ra;meta.main"/>
      <FIELD name="DEC" datatype="double" unit="deg" ucd="pos.eq.dec;meta.main">
        <DESCRIPTION>Declination</DESCRIPTION>
      </FIELD>
      <FIELD name="Total_flux" datatype="float" unit="mJy"/>
      <FIELD name="n_comp" datatype="int"/>
      <FIELD name="resolved" datatype="boolean"/>
      <FIELD name="pos" datatype="double" arraysize="2"/>
      <DATA>
        <TABLEDATA>
          <TR><TD>ILTJ124500.00+250000.0</TD><TD>191.25</TD><TD>25.0</TD><TD>12.5</TD><TD>1</TD><TD>T</TD><TD>191.25 25.0</TD></TR>
          <TR><TD>A &amp; B</TD><TD>191.30</TD><TD>25.1</TD><TD></TD><TD/><TD>?</TD><TD/></TR>
        </TABLEDATA>
      </DATA>
    </TABLE>
  </RESOURCE>
</VOTABLE>"#;

    #[test]
    fn test_parse_sample_columns() {
        let table = parse_votable("LOTSS_DR2", SAMPLE).unwrap();
        assert_eq!(table.name(), "LOTSS_DR2");
        assert_eq!(table.len(), 2);
        assert_eq!(
            table.column_names(),
            vec!["Source_Name", "RA", "DEC", "Total_flux", "n_comp", "resolved", "pos"]
        );

        let ra = table.column("RA").unwrap();
        assert_eq!(ra.unit.as_deref(), Some("deg"));
        assert_eq!(ra.ucd.as_deref(), Some("pos.eq.ra;meta.main"));
        assert_eq!(table.numeric_values("DEC").unwrap(), vec![25.0, 25.1]);
    }

    #[test]
    fn test_parse_sample_values_and_nulls() {
        let table = parse_votable("LOTSS_DR2", SAMPLE).unwrap();

        assert_eq!(
            table.column("Source_Name").unwrap().data,
            ColumnData::Text(vec![
                Some("ILTJ124500.00+250000.0".to_string()),
                Some("A & B".to_string())
            ])
        );

        let flux = table.numeric_values("Total_flux").unwrap();
        assert_eq!(flux[0], 12.5);
        assert!(flux[1].is_nan());

        assert_eq!(
            table.column("n_comp").unwrap().data,
            ColumnData::Int(vec![Some(1), None])
        );
        assert_eq!(
            table.column("resolved").unwrap().data,
            ColumnData::Bool(vec![Some(true), None])
        );
        assert_eq!(
            table.column("pos").unwrap().data,
            ColumnData::Object(vec![Value::Text("191.25 25.0".to_string()), Value::Null])
        );
    }

    #[test]
    fn test_empty_result_keeps_schema() {
        let xml = r#"<VOTABLE><RESOURCE><TABLE>
            <FIELD name="ra" datatype="double"/><FIELD name="dec" datatype="double"/>
            <DATA><TABLEDATA></TABLEDATA></DATA>
        </TABLE></RESOURCE></VOTABLE>"#;
        let table = parse_votable("GAIA_DR3", xml).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.column_names(), vec!["ra", "dec"]);
    }

    #[test]
    fn test_query_status_error() {
        let xml = r#"<VOTABLE><RESOURCE type="results">
            <INFO name="QUERY_STATUS" value="ERROR">Radius too large</INFO>
        </RESOURCE></VOTABLE>"#;
        let err = parse_votable("2MASS", xml).unwrap_err();
        match err {
            CatalogError::QueryFailure { catalogue, message } => {
                assert_eq!(catalogue, "2MASS");
                assert_eq!(message, "Radius too large");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_query_status_error_without_text() {
        let xml = r#"<VOTABLE><INFO name="QUERY_STATUS" value="ERROR"/></VOTABLE>"#;
        let err = parse_votable("2MASS", xml).unwrap_err();
        assert!(err.to_string().contains("QUERY_STATUS=ERROR"));
    }

    #[test]
    fn test_missing_table_is_failure() {
        let err = parse_votable("2MASS", "<html><body>Bad gateway</body></html>").unwrap_err();
        assert!(err.to_string().contains("no TABLE"));
    }

    #[test]
    fn test_binary_serialisation_rejected() {
        let xml = r#"<VOTABLE><RESOURCE><TABLE>
            <FIELD name="ra" datatype="double"/>
            <DATA><BINARY><STREAM encoding="base64">AAAA</STREAM></BINARY></DATA>
        </TABLE></RESOURCE></VOTABLE>"#;
        let err = parse_votable("GAIA_DR3", xml).unwrap_err();
        assert!(err.to_string().contains("BINARY"));
    }

    #[test]
    fn test_ragged_row_rejected() {
        let xml = r#"<VOTABLE><RESOURCE><TABLE>
            <FIELD name="ra" datatype="double"/><FIELD name="dec" datatype="double"/>
            <DATA><TABLEDATA><TR><TD>1.0</TD></TR></TABLEDATA></DATA>
        </TABLE></RESOURCE></VOTABLE>"#;
        let err = parse_votable("GAIA_DR3", xml).unwrap_err();
        assert!(err.to_string().contains("row 0 has 1 cells, expected 2"));
    }

    #[test]
    fn test_bad_number_rejected() {
        let xml = r#"<VOTABLE><RESOURCE><TABLE>
            <FIELD name="ra" datatype="double"/>
            <DATA><TABLEDATA><TR><TD>abc</TD></TR></TABLEDATA></DATA>
        </TABLE></RESOURCE></VOTABLE>"#;
        assert!(parse_votable("GAIA_DR3", xml).is_err());
    }

    #[test]
    fn test_truncated_document_rejected() {
        let truncated = &SAMPLE[..SAMPLE.len() / 2];
        assert!(parse_votable("LOTSS_DR2", truncated).is_err());
    }

    #[test]
    fn test_only_first_table_is_read() {
        let xml = r#"<VOTABLE><RESOURCE>
            <TABLE><FIELD name="a" datatype="int"/><DATA><TABLEDATA><TR><TD>1</TD></TR></TABLEDATA></DATA></TABLE>
            <TABLE><FIELD name="b" datatype="int"/><DATA><TABLEDATA><TR><TD>2</TD></TR></TABLEDATA></DATA></TABLE>
        </RESOURCE></VOTABLE>"#;
        let table = parse_votable("X", xml).unwrap();
        assert_eq!(table.column_names(), vec!["a"]);
    }

    #[test]
    fn test_declared_null_values_are_masked() {
        let xml = r#"<VOTABLE><RESOURCE><TABLE>
            <FIELD name="n" datatype="int"><VALUES null="-2147483648"/></FIELD>
            <FIELD name="flux" datatype="double"><VALUES null="-99"></VALUES></FIELD>
            <FIELD name="m" datatype="int"/>
            <DATA><TABLEDATA>
              <TR><TD>-2147483648</TD><TD>-99</TD><TD>-2147483648</TD></TR>
              <TR><TD>5</TD><TD>1.5</TD><TD>7</TD></TR>
            </TABLEDATA></DATA>
        </TABLE></RESOURCE></VOTABLE>"#;
        let table = parse_votable("X", xml).unwrap();
        assert_eq!(table.column("n").unwrap().data, ColumnData::Int(vec![None, Some(5)]));
        let flux = table.numeric_values("flux").unwrap();
        assert!(flux[0].is_nan());
        assert_eq!(flux[1], 1.5);
        assert_eq!(
            table.column("m").unwrap().data,
            ColumnData::Int(vec![Some(-2147483648), Some(7)])
        );
    }

    #[test]
    fn test_query_status_error_after_table() {
        let xml = r#"<VOTABLE><RESOURCE type="results">
            <TABLE><FIELD name="ra" datatype="double"/><DATA><TABLEDATA></TABLEDATA></DATA></TABLE>
            <INFO name="QUERY_STATUS" value="ERROR">Service timed out</INFO>
        </RESOURCE></VOTABLE>"#;
        match parse_votable("TGSS_ADR", xml).unwrap_err() {
            CatalogError::QueryFailure { catalogue, message } => {
                assert_eq!(catalogue, "TGSS_ADR");
                assert_eq!(message, "Service timed out");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_unnamed_field_falls_back() {
        let xml = r#"<VOTABLE><RESOURCE><TABLE>
            <FIELD ID="ident" datatype="int"/><FIELD datatype="int"/>
            <DATA><TABLEDATA><TR><TD>1</TD><TD>2</TD></TR></TABLEDATA></DATA>
        </TABLE></RESOURCE></VOTABLE>"#;
        let table = parse_votable("X", xml).unwrap();
        assert_eq!(table.column_names(), vec!["ident", "col2"]);
    }
}
