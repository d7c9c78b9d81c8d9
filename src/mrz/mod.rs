//! MRZ Parsing Layer
//!
//! Turns raw OCR text into typed document fields using the two-line
//! ICAO 9303 layout. Parsing is pure: no I/O, no state.
//!
//! Slicing is lenient. A line that is too short yields truncated or empty
//! fields instead of an error; the only failures are not finding two
//! MRZ-shaped lines at all.

pub mod date;

pub use date::{CenturyPolicy, MrzDate};

use chrono::{Datelike, Local};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// MRZ padding character
pub const FILLER: char = '<';

/// Separates surname from given names on the name line
const NAME_SEPARATOR: &str = "<<";

/// Which two lines of the OCR text are treated as the MRZ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineSelection {
    /// The last two non-empty lines (the zone sits at the bottom of the page)
    #[default]
    LastTwo,
    /// The first line containing `<<` and the line after it
    SeparatorScan,
}

/// Parser settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Line selection policy
    pub line_selection: LineSelection,
    /// Century resolution for two-digit years
    pub century: CenturyPolicy,
    /// Year used by [`CenturyPolicy::Sliding`]; the local current year when unset
    #[serde(skip)]
    pub reference_year: Option<i32>,
}

/// Why no document could be produced
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("expected at least 2 non-empty lines, found {found}")]
    TooFewLines { found: usize },
    #[error("could not find two consecutive MRZ lines")]
    NoMrzPairFound,
}

/// Fields read from the machine-readable zone
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MrzDocument {
    /// "P" for passports
    pub document_type: String,
    /// Issuing state or organisation
    pub country_code: String,
    pub surname: String,
    /// Empty when the name field has no separator
    pub given_names: String,
    /// Fillers removed
    pub document_number: String,
    pub nationality: String,
    pub date_of_birth: MrzDate,
    /// M, F, X or filler
    pub sex: String,
    pub date_of_expiry: MrzDate,
}

/// Parse OCR text into an [`MrzDocument`]
pub fn parse(text: &str, config: &ParserConfig) -> Result<MrzDocument, ParseError> {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    if lines.len() < 2 {
        return Err(ParseError::TooFewLines { found: lines.len() });
    }

    let (name_line, data_line) = select_lines(&lines, config.line_selection)?;
    let reference_year = config
        .reference_year
        .unwrap_or_else(|| Local::now().year());

    // Name line: type, issuing state, then SURNAME<<GIVEN<NAMES
    let name_field = column(name_line, 5, usize::MAX);
    let mut names = name_field.split(NAME_SEPARATOR);
    let surname = normalize_name(names.next().unwrap_or_default());
    let given_names = normalize_name(names.next().unwrap_or_default());

    // Data line: fixed columns
    let document_number = column(data_line, 0, 9).replace(FILLER, "");
    let date_of_birth = MrzDate::parse(&column(data_line, 13, 19), config.century, reference_year);
    let date_of_expiry = MrzDate::parse(&column(data_line, 21, 27), config.century, reference_year);

    Ok(MrzDocument {
        document_type: column(name_line, 0, 1),
        country_code: column(name_line, 2, 5),
        surname,
        given_names,
        document_number,
        nationality: column(data_line, 10, 13),
        date_of_birth,
        sex: column(data_line, 20, 21),
        date_of_expiry,
    })
}

fn select_lines<'a>(
    lines: &[&'a str],
    policy: LineSelection,
) -> Result<(&'a str, &'a str), ParseError> {
    match policy {
        LineSelection::LastTwo => match lines {
            [.., first, second] => Ok((*first, *second)),
            _ => Err(ParseError::TooFewLines { found: lines.len() }),
        },
        LineSelection::SeparatorScan => {
            let index = lines
                .iter()
                .position(|line| line.contains(NAME_SEPARATOR))
                .ok_or(ParseError::NoMrzPairFound)?;
            let next = lines.get(index + 1).ok_or(ParseError::NoMrzPairFound)?;
            Ok((lines[index], *next))
        }
    }
}

/// Characters `start..end` of a line; short lines give a shorter (possibly empty) slice
fn column(line: &str, start: usize, end: usize) -> String {
    line.chars()
        .skip(start)
        .take(end.saturating_sub(start))
        .collect()
}

/// Fillers become single spaces between name parts
fn normalize_name(raw: &str) -> String {
    raw.split(FILLER)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const NAME_LINE: &str = "P<UTORESIDENT<<JOHN<<<<<<<<<<<<<<<<<<<<<<<";
    const DATA_LINE: &str = "L898902C36UTO7408122M1204159ZE184226B<<<<<10";

    fn config() -> ParserConfig {
        ParserConfig {
            reference_year: Some(2026),
            ..Default::default()
        }
    }

    fn sample_text() -> String {
        format!(
            "PASSPORT\nUtopia\nRESIDENT JOHN\n{}\n{}\n",
            NAME_LINE, DATA_LINE
        )
    }

    #[test]
    fn test_parse_icao_sample() {
        let doc = parse(&sample_text(), &config()).unwrap();

        assert_eq!(doc.document_type, "P");
        assert_eq!(doc.country_code, "UTO");
        assert_eq!(doc.surname, "RESIDENT");
        assert_eq!(doc.given_names, "JOHN");
        assert_eq!(doc.document_number, "L898902C3");
        assert_eq!(doc.nationality, "UTO");
        assert_eq!(
            doc.date_of_birth.as_date(),
            NaiveDate::from_ymd_opt(1974, 8, 12)
        );
        assert_eq!(doc.sex, "M");
        assert_eq!(
            doc.date_of_expiry.as_date(),
            NaiveDate::from_ymd_opt(2012, 4, 15)
        );
    }

    #[test]
    fn test_parse_is_idempotent() {
        let text = sample_text();
        let first = parse(&text, &config()).unwrap();
        let second = parse(&text, &config()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_too_few_lines() {
        assert_eq!(
            parse(DATA_LINE, &config()),
            Err(ParseError::TooFewLines { found: 1 })
        );
        assert_eq!(
            parse("", &config()),
            Err(ParseError::TooFewLines { found: 0 })
        );
        assert_eq!(
            parse("  \n\n\t\n", &config()),
            Err(ParseError::TooFewLines { found: 0 })
        );
        assert_eq!(
            parse(&format!("\n  {}  \n\n", NAME_LINE), &config()),
            Err(ParseError::TooFewLines { found: 1 })
        );
    }

    #[test]
    fn test_lines_are_trimmed() {
        let text = format!("   {}   \r\n\t{}\t\r\n", NAME_LINE, DATA_LINE);
        let doc = parse(&text, &config()).unwrap();
        assert_eq!(doc.document_type, "P");
        assert_eq!(doc.document_number, "L898902C3");
    }

    #[test]
    fn test_multiple_given_names() {
        let text = format!("P<UTOERIKSSON<<ANNA<MARIA<<<<<<<<<<<<<<<<<<<\n{}", DATA_LINE);
        let doc = parse(&text, &config()).unwrap();
        assert_eq!(doc.surname, "ERIKSSON");
        assert_eq!(doc.given_names, "ANNA MARIA");
    }

    #[test]
    fn test_compound_surname() {
        let text = format!("P<UTODE<LA<CRUZ<<MARIA<<<<<<<<<<<<<<<<<<<<<\n{}", DATA_LINE);
        let doc = parse(&text, &config()).unwrap();
        assert_eq!(doc.surname, "DE LA CRUZ");
        assert_eq!(doc.given_names, "MARIA");
    }

    #[test]
    fn test_missing_name_separator() {
        let text = format!("P<UTORESIDENT<<<\n{}", DATA_LINE);
        let doc = parse(&text, &config()).unwrap();
        assert_eq!(doc.surname, "RESIDENT");
        assert_eq!(doc.given_names, "");

        let text = format!("P<UTORESIDENT\n{}", DATA_LINE);
        let doc = parse(&text, &config()).unwrap();
        assert_eq!(doc.surname, "RESIDENT");
        assert_eq!(doc.given_names, "");
    }

    #[test]
    fn test_document_number_fillers_stripped() {
        let text = format!("{}\nD23145<<<7UTO7408122F1204159<<<<<<<<<<<<<<06", NAME_LINE);
        let doc = parse(&text, &config()).unwrap();
        assert_eq!(doc.document_number, "D23145");
        assert_eq!(doc.sex, "F");
    }

    #[test]
    fn test_short_lines_are_lenient() {
        let doc = parse("P<\nL8989", &config()).unwrap();
        assert_eq!(doc.document_type, "P");
        assert_eq!(doc.country_code, "");
        assert_eq!(doc.surname, "");
        assert_eq!(doc.given_names, "");
        assert_eq!(doc.document_number, "L8989");
        assert_eq!(doc.nationality, "");
        assert_eq!(doc.sex, "");
        assert!(!doc.date_of_birth.is_valid());
        assert!(!doc.date_of_expiry.is_valid());
    }

    #[test]
    fn test_non_ascii_does_not_panic() {
        let doc = parse(
            "P<ÜTÖRÉSIDENT<<JÖHN\nL898902C36ÜTO7408122M1204159",
            &config(),
        )
        .unwrap();
        assert_eq!(doc.country_code, "ÜTÖ");
        assert_eq!(doc.surname, "RÉSIDENT");
        assert_eq!(doc.nationality, "ÜTO");
    }

    #[test]
    fn test_invalid_dates_do_not_fail_the_record() {
        let text = format!("{}\nL898902C36UTO7413122M1299159ZE184226B<<<<<10", NAME_LINE);
        let doc = parse(&text, &config()).unwrap();
        assert_eq!(doc.document_number, "L898902C3");
        assert_eq!(
            doc.date_of_birth,
            MrzDate::Unparseable {
                raw: "741312".to_string()
            }
        );
        assert!(!doc.date_of_expiry.is_valid());
        assert_eq!(doc.sex, "M");
    }

    #[test]
    fn test_last_two_ignores_earlier_mrz_like_lines() {
        let text = format!("NOISE<<LINE\n{}\n{}", NAME_LINE, DATA_LINE);
        let doc = parse(&text, &config()).unwrap();
        assert_eq!(doc.surname, "RESIDENT");
    }

    #[test]
    fn test_policies_disagree_on_trailing_noise() {
        let text = format!("{}\n{}\nScanned with OCR", NAME_LINE, DATA_LINE);

        let last_two = parse(&text, &config()).unwrap();
        assert_eq!(last_two.document_type, "L");

        let scan = ParserConfig {
            line_selection: LineSelection::SeparatorScan,
            ..config()
        };
        let doc = parse(&text, &scan).unwrap();
        assert_eq!(doc.document_type, "P");
        assert_eq!(doc.surname, "RESIDENT");
        assert_eq!(doc.document_number, "L898902C3");
    }

    #[test]
    fn test_separator_scan_without_pair() {
        let scan = ParserConfig {
            line_selection: LineSelection::SeparatorScan,
            ..config()
        };
        assert_eq!(
            parse("PASSPORT\nUTOPIA", &scan),
            Err(ParseError::NoMrzPairFound)
        );
        assert_eq!(
            parse(&format!("PASSPORT\n{}", NAME_LINE), &scan),
            Err(ParseError::NoMrzPairFound)
        );
    }

    #[test]
    fn test_always_two_thousands_policy() {
        let cfg = ParserConfig {
            century: CenturyPolicy::AlwaysTwoThousands,
            ..config()
        };
        let doc = parse(&sample_text(), &cfg).unwrap();
        assert_eq!(
            doc.date_of_birth.as_date(),
            NaiveDate::from_ymd_opt(2074, 8, 12)
        );
    }

    #[test]
    fn test_default_reference_year_is_current_year() {
        let current = Local::now().year();
        let yy = current.rem_euclid(100);
        let data = format!("L898902C36UTO{:02}0101M{:02}0101", yy, (yy + 1) % 100);
        let doc = parse(&format!("{}\n{}", NAME_LINE, data), &ParserConfig::default()).unwrap();

        assert_eq!(
            doc.date_of_birth.as_date(),
            NaiveDate::from_ymd_opt(2000 + yy, 1, 1)
        );
        let expected_expiry = if yy == 99 { 2000 } else { 1900 + yy + 1 };
        assert_eq!(
            doc.date_of_expiry.as_date(),
            NaiveDate::from_ymd_opt(expected_expiry, 1, 1)
        );
    }

    #[test]
    fn test_document_serializes_camel_case() {
        let doc = parse(&sample_text(), &config()).unwrap();
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["documentNumber"], "L898902C3");
        assert_eq!(json["givenNames"], "JOHN");
        assert_eq!(json["dateOfBirth"], "12/08/1974");
        assert_eq!(json["dateOfExpiry"], "15/04/2012");
    }
}
