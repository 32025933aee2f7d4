//! # Semantic Coordinate Parsers
//!
//! The number lexicon of the region language. Each shape argument is read by
//! the parser matching its semantic role (see [`SemanticCoordType`]); the
//! result is a [`NumericLiteral`] that keeps the source text next to the
//! resolved value, so a shape can be written back out exactly as it was read
//! and the frame classifier can tell sky literals from plain numbers.

use nom::{
    branch::alt,
    bytes::complete::tag_no_case,
    character::complete::{char as nom_char, digit0, digit1, one_of},
    combinator::{consumed, map, map_res, not, opt, recognize},
    error::context,
    sequence::{pair, preceded, terminated, tuple},
};
use std::fmt;

use crate::shape::SemanticCoordType;
use crate::{Input, ParserResult};

/// A numeric argument as it appeared in the region text.
#[derive(Debug, Clone, PartialEq)]
pub enum NumericLiteral {
    /// Plain decimal number, e.g. `109` or `-2.5e3`.
    SimpleNumber { text: String, value: f64 },
    /// Integer argument (panda subdivision counts).
    SimpleInteger { text: String, value: i64 },
    /// Hour angle, `12h34m56.7s` or `12:34:56.7` in a longitude slot. `hours` is unscaled.
    Hms { text: String, hours: f64 },
    /// Degree angle, `-12d34m56.7s` or `-12:34:56.7` in a latitude slot.
    Dms { text: String, degrees: f64 },
    /// Size with an angular unit: `3'`, `3'5"`, `5"`, `2d`, `0.1r`.
    AngularDistance { text: String, degrees: f64 },
}

impl NumericLiteral {
    pub fn text(&self) -> &str {
        match self {
            NumericLiteral::SimpleNumber { text, .. }
            | NumericLiteral::SimpleInteger { text, .. }
            | NumericLiteral::Hms { text, .. }
            | NumericLiteral::Dms { text, .. }
            | NumericLiteral::AngularDistance { text, .. } => text,
        }
    }

    /// The value without unit scaling: hours for HMS literals, the number itself otherwise.
    pub fn value(&self) -> f64 {
        match self {
            NumericLiteral::SimpleNumber { value, .. } => *value,
            NumericLiteral::SimpleInteger { value, .. } => *value as f64,
            NumericLiteral::Hms { hours, .. } => *hours,
            NumericLiteral::Dms { degrees, .. } | NumericLiteral::AngularDistance { degrees, .. } => *degrees,
        }
    }

    /// The value in decimal degrees. Plain numbers are returned as-is.
    pub fn degrees(&self) -> f64 {
        match self {
            NumericLiteral::Hms { hours, .. } => hours * 15.0,
            other => other.value(),
        }
    }

    /// True for sexagesimal and unit-carrying literals, which can only mean sky coordinates.
    pub fn is_angular(&self) -> bool {
        matches!(
            self,
            NumericLiteral::Hms { .. } | NumericLiteral::Dms { .. } | NumericLiteral::AngularDistance { .. }
        )
    }
}

impl fmt::Display for NumericLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

// --- Helper Parsers for Numbers ---

/// `digits[.digits][exponent]` or `.digits[exponent]`, no sign.
fn unsigned_number<'a>(input: Input<'a>) -> ParserResult<'a, &'a str> {
    recognize(pair(
        alt((
            recognize(pair(digit1, opt(pair(nom_char('.'), digit0)))),
            recognize(pair(nom_char('.'), digit1)),
        )),
        opt(tuple((one_of("eE"), opt(one_of("+-")), digit1))),
    ))(input)
}

fn unsigned_value<'a>(input: Input<'a>) -> ParserResult<'a, f64> {
    map_res(unsigned_number, |s: &str| s.parse::<f64>())(input)
}

/// Parses an optional sign (+ or -) into a multiplier.
fn parse_optional_sign<'a>(input: Input<'a>) -> ParserResult<'a, f64> {
    map(opt(one_of("+-")), |sign| if sign == Some('-') { -1.0 } else { 1.0 })(input)
}

fn sexagesimal_value(sign: f64, a: f64, b: f64, c: f64) -> f64 {
    sign * (a + (b + c / 60.0) / 60.0)
}

/// Signed decimal number.
pub(crate) fn simple_number<'a>(input: Input<'a>) -> ParserResult<'a, NumericLiteral> {
    context(
        "number",
        map_res(recognize(pair(opt(one_of("+-")), unsigned_number)), |text: &str| {
            text.parse::<f64>().map(|value| NumericLiteral::SimpleNumber {
                text: text.to_string(),
                value,
            })
        }),
    )(input)
}

/// Signed integer. Fails when the digits continue as a decimal or exponent.
pub(crate) fn simple_integer<'a>(input: Input<'a>) -> ParserResult<'a, NumericLiteral> {
    context(
        "integer",
        map_res(
            terminated(recognize(pair(opt(one_of("+-")), digit1)), not(one_of(".eE"))),
            |text: &str| {
                text.parse::<i64>().map(|value| NumericLiteral::SimpleInteger {
                    text: text.to_string(),
                    value,
                })
            },
        ),
    )(input)
}

// --- Parsers for Sexagesimal-like and Unit-based Formats ---

/// Parses `HHh[MMm[SSs]]` or `DDd[MMm[SSs]]` depending on `primary_unit`.
/// Returns the consumed text and the unscaled value.
fn parse_sexagesimal_units_format<'a>(
    primary_unit: &'static str,
) -> impl FnMut(Input<'a>) -> ParserResult<'a, (&'a str, f64)> {
    move |i: Input<'a>| {
        map(
            consumed(tuple((
                parse_optional_sign,
                terminated(unsigned_value, tag_no_case(primary_unit)),
                opt(pair(
                    terminated(unsigned_value, tag_no_case("m")),
                    opt(terminated(unsigned_value, tag_no_case("s"))),
                )),
            ))),
            |(text, (sign, a, minutes_seconds))| {
                let (b, c) = match minutes_seconds {
                    Some((b, c)) => (b, c.unwrap_or(0.0)),
                    None => (0.0, 0.0),
                };
                (text, sexagesimal_value(sign, a, b, c))
            },
        )(i)
    }
}

/// Parses `V1:V2[:V3]`. The caller decides whether it is an hour or a degree angle.
fn parse_colon_sexagesimal_format<'a>(input: Input<'a>) -> ParserResult<'a, (&'a str, f64)> {
    map(
        consumed(tuple((
            parse_optional_sign,
            unsigned_value,
            preceded(nom_char(':'), unsigned_value),
            opt(preceded(nom_char(':'), unsigned_value)),
        ))),
        |(text, (sign, a, b, c))| (text, sexagesimal_value(sign, a, b, c.unwrap_or(0.0))),
    )(input)
}

/// Parses a value with an angular unit (', ", d, r) and converts it to degrees.
fn parse_angular_distance_units_format<'a>(input: Input<'a>) -> ParserResult<'a, NumericLiteral> {
    context(
        "angular distance with unit",
        map(
            consumed(alt((
                map(
                    pair(
                        terminated(unsigned_value, nom_char('\'')),
                        opt(terminated(unsigned_value, nom_char('"'))),
                    ),
                    |(minutes, seconds)| (minutes + seconds.unwrap_or(0.0) / 60.0) / 60.0,
                ),
                map(terminated(unsigned_value, nom_char('"')), |seconds| seconds / 3600.0),
                terminated(unsigned_value, tag_no_case("d")),
                map(terminated(unsigned_value, tag_no_case("r")), f64::to_degrees),
            ))),
            |(text, degrees)| NumericLiteral::AngularDistance {
                text: text.to_string(),
                degrees,
            },
        ),
    )(input)
}

// --- Semantic Coordinate Parsers ---

pub(crate) fn parse_coord_odd<'a>(input: Input<'a>) -> ParserResult<'a, NumericLiteral> {
    context(
        "CoordOdd (RA-like)",
        alt((
            map(parse_sexagesimal_units_format("h"), |(text, hours)| NumericLiteral::Hms {
                text: text.to_string(),
                hours,
            }),
            map(parse_colon_sexagesimal_format, |(text, hours)| NumericLiteral::Hms {
                text: text.to_string(),
                hours,
            }),
            simple_number,
        )),
    )(input)
}

pub(crate) fn parse_coord_even<'a>(input: Input<'a>) -> ParserResult<'a, NumericLiteral> {
    context(
        "CoordEven (Dec-like)",
        alt((
            map(parse_sexagesimal_units_format("d"), |(text, degrees)| NumericLiteral::Dms {
                text: text.to_string(),
                degrees,
            }),
            map(parse_colon_sexagesimal_format, |(text, degrees)| NumericLiteral::Dms {
                text: text.to_string(),
                degrees,
            }),
            simple_number,
        )),
    )(input)
}

pub(crate) fn parse_distance<'a>(input: Input<'a>) -> ParserResult<'a, NumericLiteral> {
    context(
        "Distance (angular size)",
        alt((parse_angular_distance_units_format, simple_number)),
    )(input)
}

pub(crate) fn parse_angle<'a>(input: Input<'a>) -> ParserResult<'a, NumericLiteral> {
    context("Angle", simple_number)(input)
}

/// Dispatches to the parser for the requested argument role.
pub(crate) fn dispatch_semantic_parser<'a>(
    semantic_type: SemanticCoordType,
) -> impl FnMut(Input<'a>) -> ParserResult<'a, NumericLiteral> {
    move |i: Input<'a>| match semantic_type {
        SemanticCoordType::CoordOdd => parse_coord_odd(i),
        SemanticCoordType::CoordEven => parse_coord_even(i),
        SemanticCoordType::Distance => parse_distance(i),
        SemanticCoordType::Angle => parse_angle(i),
        SemanticCoordType::Integer => simple_integer(i),
    }
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;

    macro_rules! assert_parser_ok {
        ($parser:expr, $input:expr, $expected_degrees:expr, $expected_remaining:expr) => {
            match $parser($input) {
                Ok((remaining, literal)) => {
                    assert_eq!(remaining, $expected_remaining, "Remaining input mismatch for '{}'", $input);
                    assert!(
                        (literal.degrees() - $expected_degrees).abs() < 1e-9,
                        "Parsed value mismatch for '{}': got {}, expected {}",
                        $input,
                        literal.degrees(),
                        $expected_degrees
                    );
                }
                Err(e) => {
                    let e_str = match e {
                        nom::Err::Error(ve) | nom::Err::Failure(ve) => nom::error::convert_error($input, ve),
                        nom::Err::Incomplete(_) => "Incomplete".to_string(),
                    };
                    panic!("Parser failed for '{}': {}", $input, e_str);
                }
            }
        };
    }

    macro_rules! assert_parser_err {
        ($parser:expr, $input:expr) => {
            assert!($parser($input).is_err(), "Parser should have failed for input '{}'", $input);
        };
    }

    #[test]
    fn test_simple_number_forms() {
        assert_parser_ok!(simple_number, "123.45", 123.45, "");
        assert_parser_ok!(simple_number, "-10", -10.0, "");
        assert_parser_ok!(simple_number, "+.5", 0.5, "");
        assert_parser_ok!(simple_number, "12304.3e10,", 12304.3e10, ",");
        assert_parser_ok!(simple_number, "7.", 7.0, "");
        assert_parser_err!(simple_number, "abc");
    }

    #[test]
    fn test_simple_number_keeps_text() {
        let (_, literal) = simple_number("28.950304").unwrap();
        assert_eq!(literal.text(), "28.950304");
        assert!(!literal.is_angular());
    }

    #[test]
    fn test_simple_integer() {
        assert_parser_ok!(simple_integer, "5", 5.0, "");
        assert_parser_ok!(simple_integer, "-100)", -100.0, ")");
        assert_parser_err!(simple_integer, "5.5");
        assert_parser_err!(simple_integer, "1e3");
    }

    #[test]
    fn test_parse_sexagesimal_units_format_hms() {
        let (_, (text, hours)) = parse_sexagesimal_units_format("h")("-2h30m").unwrap();
        assert_eq!(text, "-2h30m");
        assert!((hours + 2.5).abs() < 1e-12);

        assert_parser_ok!(parse_coord_odd, "1h", 15.0, "");
        assert_parser_ok!(parse_coord_odd, "+1h0m36s", (1.0 + 36.0 / 3600.0) * 15.0, "");
        assert_parser_ok!(parse_coord_odd, "12H30M", 187.5, "");
    }

    #[test]
    fn test_parse_sexagesimal_units_format_dms() {
        assert_parser_ok!(parse_coord_even, "150d", 150.0, "");
        assert_parser_ok!(parse_coord_even, "-10d30m", -10.5, "");
        assert_parser_ok!(parse_coord_even, "+14d01m09s", 14.0 + 1.0 / 60.0 + 9.0 / 3600.0, "");
    }

    #[test]
    fn test_colon_format_depends_on_role() {
        assert_parser_ok!(parse_coord_odd, "2:00:00", 30.0, "");
        assert_parser_ok!(parse_coord_odd, "01:30:00,", 22.5, ",");
        assert_parser_ok!(parse_coord_even, "10:30", 10.5, "");
        assert_parser_ok!(parse_coord_even, "-5:15:36", -(5.0 + 15.0 / 60.0 + 36.0 / 3600.0), "");

        let (_, odd) = parse_coord_odd("19:23:40.2").unwrap();
        assert!(matches!(odd, NumericLiteral::Hms { .. }));
        let (_, even) = parse_coord_even("+14:01:09").unwrap();
        assert!(matches!(even, NumericLiteral::Dms { .. }));
    }

    #[test]
    fn test_hms_value_is_unscaled() {
        let (_, literal) = parse_coord_odd("12:30:00").unwrap();
        assert!((literal.value() - 12.5).abs() < 1e-12);
        assert!((literal.degrees() - 187.5).abs() < 1e-12);
    }

    #[test]
    fn test_parse_angular_distance_units_format() {
        assert_parser_ok!(parse_distance, "10d", 10.0, "");
        assert_parser_ok!(parse_distance, "20.5'", 20.5 / 60.0, "");
        assert_parser_ok!(parse_distance, "30\"", 30.0 / 3600.0, "");
        assert_parser_ok!(parse_distance, "3'5\"", (3.0 + 5.0 / 60.0) / 60.0, "");
        assert_parser_ok!(parse_distance, "1.5r", 1.5_f64.to_degrees(), "");
        assert_parser_ok!(parse_distance, "1R", 1.0_f64.to_degrees(), "");
        assert_parser_ok!(parse_distance, "843.31194\")", 843.31194 / 3600.0, ")");
    }

    #[test]
    fn test_distance_without_unit_is_plain() {
        let (_, literal) = parse_distance("28.95").unwrap();
        assert!(matches!(literal, NumericLiteral::SimpleNumber { .. }));
    }

    #[test]
    fn test_angle_rejects_units() {
        let (remaining, literal) = parse_angle("45d").unwrap();
        assert_eq!(remaining, "d");
        assert!(!literal.is_angular());
    }

    #[test]
    fn test_dispatch_semantic_parser() {
        let mut integer = dispatch_semantic_parser(SemanticCoordType::Integer);
        assert!(matches!(integer("4").unwrap().1, NumericLiteral::SimpleInteger { value: 4, .. }));
        let mut odd = dispatch_semantic_parser(SemanticCoordType::CoordOdd);
        assert!(odd("10h").unwrap().1.is_angular());
    }
}
