//! # Region Grammar
//!
//! Line-level grammar of DS9 region text. A line is a `global` statement, a
//! `;`-separated list of frame commands and shapes (optionally ending in
//! `||` and a `#` comment), a bare comment, or nothing.
//!
//! Shape arguments are read by role, following the shape's
//! [`ShapeSignature`](crate::shape::ShapeSignature).

use log::warn;
use nom::{
    branch::alt,
    bytes::complete::{tag, tag_no_case},
    character::complete::{alphanumeric1, char as nom_char, multispace0, not_line_ending, space1},
    combinator::{cut, eof, map, map_opt, opt, rest, value},
    error::{context, convert_error, ContextError, ErrorKind, ParseError as NomParseErrorTrait, VerboseError},
    multi::separated_list1,
    sequence::{delimited, pair, preceded, terminated, tuple},
    Finish,
};

use crate::error::{RegionError, Result};
use crate::frames::CoordFrame;
use crate::semantic_parsers::{dispatch_semantic_parser, NumericLiteral};
use crate::shape::{SemanticCoordType, Shape, ShapeKind, ShapeSignature};
use crate::{Input, ParserResult};

/// One statement on a region line.
#[derive(Debug, Clone, PartialEq)]
pub enum Atom {
    Frame(CoordFrame),
    Shape(Shape),
    /// Raw attribute text following `global`.
    Global(String),
}

/// Everything found on one line.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedLine {
    pub atoms: Vec<Atom>,
    pub comment: Option<String>,
    pub continued: bool,
}

/// Stream element handed to the attribute resolver.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Frame(CoordFrame),
    Global(String),
    Shape(Shape),
    /// A line holding only a comment.
    Comment(String),
}

impl ParsedLine {
    /// The line's comment and continuation belong to its last shape.
    pub fn into_statements(self) -> Vec<Statement> {
        let ParsedLine { atoms, comment, continued } = self;
        if atoms.is_empty() {
            return comment.map(Statement::Comment).into_iter().collect();
        }
        let last_shape = atoms.iter().rposition(|atom| matches!(atom, Atom::Shape(_)));
        let mut comment = comment;
        atoms
            .into_iter()
            .enumerate()
            .map(|(index, atom)| match atom {
                Atom::Frame(frame) => Statement::Frame(frame),
                Atom::Global(text) => Statement::Global(text),
                Atom::Shape(shape) if Some(index) == last_shape => {
                    Statement::Shape(shape.with_comment(comment.take()).with_continued(continued))
                }
                Atom::Shape(shape) => Statement::Shape(shape),
            })
            .collect()
    }
}

// --- Basic Parsers ---
pub(crate) fn ws<'a>(input: Input<'a>) -> ParserResult<'a, &'a str> {
    multispace0(input)
}

type Separator<'a> = fn(Input<'a>) -> ParserResult<'a, ()>;

fn comma_sep<'a>(input: Input<'a>) -> ParserResult<'a, ()> {
    value((), tuple((ws, nom_char(','), ws)))(input)
}

/// Separator of the parenthesis-free form, `circle 100 100 20`.
fn bare_sep<'a>(input: Input<'a>) -> ParserResult<'a, ()> {
    alt((comma_sep, value((), space1)))(input)
}

fn arity_error<'a>(input: Input<'a>, message: &'static str) -> nom::Err<VerboseError<Input<'a>>> {
    let base = <VerboseError<Input<'a>> as NomParseErrorTrait<Input<'a>>>::from_error_kind(input, ErrorKind::ManyMN);
    nom::Err::Error(<VerboseError<Input<'a>> as ContextError<Input<'a>>>::add_context(input, message, base))
}

// --- Component Parsers (for shapes) ---

/// Reads one literal per role. `leading` asks for a separator before the first one.
fn parse_semantic_sequence<'a>(
    roles: &[SemanticCoordType],
    separator: Separator<'a>,
    leading: bool,
    input: Input<'a>,
) -> ParserResult<'a, Vec<NumericLiteral>> {
    let mut i = input;
    let mut literals = Vec::with_capacity(roles.len());
    for (k, &role) in roles.iter().enumerate() {
        if leading || k > 0 {
            let (next_i, _) = separator(i)?;
            i = next_i;
        }
        let (next_i, literal) = dispatch_semantic_parser(role)(i)?;
        literals.push(literal);
        i = next_i;
    }
    Ok((i, literals))
}

/// Head, then as many repeat units as parse, then the tail. When the tail
/// fails, repeat units are given back one at a time (down to the minimum)
/// so `ellipse(x,y,a,b,angle)` does not lose its angle to the repeat.
fn parse_coordinates_by_signature<'a>(
    signature: &'static ShapeSignature,
    separator: Separator<'a>,
) -> impl FnMut(Input<'a>) -> ParserResult<'a, Vec<NumericLiteral>> {
    move |input: Input<'a>| {
        let (mut i, mut args) = parse_semantic_sequence(signature.fixed_head, separator, false, input)?;

        let mut checkpoints = vec![(i, args.len())];
        if let Some(unit) = signature.repeat_unit {
            while signature.max_repeats.map_or(true, |max| checkpoints.len() <= max) {
                match parse_semantic_sequence(unit, separator, !args.is_empty(), i) {
                    Ok((next_i, unit_args)) => {
                        args.extend(unit_args);
                        i = next_i;
                        checkpoints.push((i, args.len()));
                    }
                    Err(nom::Err::Error(_)) => break,
                    Err(e) => return Err(e),
                }
            }
        }

        loop {
            if checkpoints.len() - 1 < signature.min_repeats {
                return Err(arity_error(input, "not enough repeated arguments"));
            }
            match parse_semantic_sequence(signature.fixed_tail, separator, !args.is_empty(), i) {
                Ok((next_i, tail_args)) => {
                    args.extend(tail_args);
                    return Ok((next_i, args));
                }
                Err(nom::Err::Error(e)) => {
                    if checkpoints.len() - 1 <= signature.min_repeats {
                        return Err(nom::Err::Error(e));
                    }
                    checkpoints.pop();
                    if let Some(&(prev_i, len)) = checkpoints.last() {
                        i = prev_i;
                        args.truncate(len);
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// `[-] name ( '(' args ')' | args )` for the shapes `allowed` accepts.
fn parse_shape<'a>(allowed: fn(&ShapeSignature) -> bool) -> impl FnMut(Input<'a>) -> ParserResult<'a, Shape> {
    move |input: Input<'a>| {
        let (i, exclusion) = opt(terminated(nom_char('-'), ws))(input)?;
        let (i, kind) = context(
            "shape name",
            map_opt(alphanumeric1, |name: &str| {
                ShapeKind::from_name(name).filter(|kind| allowed(kind.signature()))
            }),
        )(i)?;
        let signature = kind.signature();
        let (i, params) = cut(context(
            signature.name,
            alt((
                delimited(
                    tuple((ws, nom_char('('), ws)),
                    parse_coordinates_by_signature(signature, comma_sep),
                    context("closing parenthesis", tuple((ws, nom_char(')')))),
                ),
                preceded(space1, parse_coordinates_by_signature(signature, bare_sep)),
            )),
        ))(i)?;
        Ok((i, Shape::new(kind, params).with_exclude(exclusion.is_some())))
    }
}

fn in_region_line(signature: &ShapeSignature) -> bool {
    signature.in_region_line
}

fn in_comment(signature: &ShapeSignature) -> bool {
    signature.in_comment
}

// --- Line Parsers ---

fn parse_frame_command<'a>(input: Input<'a>) -> ParserResult<'a, CoordFrame> {
    context("coordinate frame", map_opt(alphanumeric1, CoordFrame::from_command))(input)
}

fn parse_global_line<'a>(input: Input<'a>) -> ParserResult<'a, Atom> {
    map(
        preceded(tag_no_case("global"), alt((preceded(space1, not_line_ending), eof))),
        |attrs: &str| Atom::Global(attrs.trim().to_string()),
    )(input)
}

fn parse_atom<'a>(input: Input<'a>) -> ParserResult<'a, Atom> {
    alt((
        map(parse_frame_command, Atom::Frame),
        map(parse_shape(in_region_line), Atom::Shape),
    ))(input)
}

fn parse_atom_list<'a>(input: Input<'a>) -> ParserResult<'a, Vec<Atom>> {
    terminated(
        separated_list1(tuple((ws, nom_char(';'), ws)), parse_atom),
        opt(pair(ws, nom_char(';'))),
    )(input)
}

fn parse_comment<'a>(input: Input<'a>) -> ParserResult<'a, String> {
    map(preceded(nom_char('#'), not_line_ending), |text: &str| text.trim().to_string())(input)
}

fn parse_line_content<'a>(input: Input<'a>) -> ParserResult<'a, ParsedLine> {
    preceded(
        ws,
        alt((
            map(parse_global_line, |atom| ParsedLine {
                atoms: vec![atom],
                ..ParsedLine::default()
            }),
            map(
                tuple((parse_atom_list, ws, opt(tag("||")), ws, opt(parse_comment))),
                |(atoms, _, continuation, _, comment)| ParsedLine {
                    atoms,
                    comment,
                    continued: continuation.is_some(),
                },
            ),
            map(parse_comment, |comment| ParsedLine {
                comment: Some(comment),
                ..ParsedLine::default()
            }),
            map(eof, |_| ParsedLine::default()),
        )),
    )(input)
}

/// Parses a single region line.
pub fn parse_line(line: &str) -> Result<ParsedLine> {
    match terminated(parse_line_content, preceded(ws, eof))(line).finish() {
        Ok((_remaining, parsed)) => Ok(parsed),
        Err(e) => Err(RegionError::Syntax {
            line: line.to_string(),
            message: convert_error(line, e),
        }),
    }
}

/// Parses region text line by line. Lines that fail to parse are logged and dropped.
pub fn parse_statements(text: &str) -> Vec<Statement> {
    let mut statements = Vec::new();
    for (number, line) in text.lines().enumerate() {
        match parse_line(line) {
            Ok(parsed) => statements.extend(parsed.into_statements()),
            Err(err) => warn!("skipping line {}: {}", number + 1, err),
        }
    }
    statements
}

/// Reads a shape embedded in a comment, e.g. `# text(1,2) text={label}` or
/// `# composite(1,2,0) || composite=1`. The text after the shape becomes
/// the shape's comment.
pub(crate) fn parse_comment_shape(comment: &str) -> Option<Shape> {
    let parsed = tuple((ws, parse_shape(in_comment), ws, opt(tag("||")), rest))(comment);
    match parsed {
        Ok((_, (_, shape, _, continuation, remainder))) => {
            let remainder = remainder.trim();
            let comment = (!remainder.is_empty()).then(|| remainder.to_string());
            Some(shape.with_continued(continuation.is_some()).with_comment(comment))
        }
        Err(_) => None,
    }
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;

    fn single_shape(line: &str) -> Shape {
        let parsed = parse_line(line).unwrap_or_else(|e| panic!("{}", e));
        match parsed.into_statements().into_iter().find_map(|s| match s {
            Statement::Shape(shape) => Some(shape),
            _ => None,
        }) {
            Some(shape) => shape,
            None => panic!("no shape parsed from '{}'", line),
        }
    }

    macro_rules! assert_parses_shape {
        ($input:expr, $expected_kind:expr, $expected_exclude:expr, $expected_len:expr) => {
            let shape = single_shape($input);
            assert_eq!(shape.kind(), $expected_kind, "Shape kind mismatch for '{}'", $input);
            assert_eq!(shape.exclude(), $expected_exclude, "Exclusion flag mismatch for '{}'", $input);
            assert_eq!(
                shape.params().len(),
                $expected_len,
                "Argument count mismatch for '{}'. Got: {:?}",
                $input,
                shape.params()
            );
        };
    }

    macro_rules! assert_line_fails {
        ($input:expr) => {
            assert!(
                matches!(parse_line($input), Err(RegionError::Syntax { .. })),
                "Line should have failed to parse: '{}'",
                $input
            );
        };
    }

    #[test]
    fn test_circle_with_comment() {
        let shape = single_shape("circle(109,253,28.950304) # comment 1");
        assert_eq!(shape.kind(), ShapeKind::Circle);
        assert_eq!(shape.params().len(), 3);
        assert_eq!(shape.comment(), Some("comment 1"));
    }

    #[test]
    fn test_excluded_rotbox() {
        assert_parses_shape!("-rotbox(162,96.5,134,41,43.801537)", ShapeKind::RotBox, true, 5);
        assert_parses_shape!("- circle(1,2,3)", ShapeKind::Circle, true, 3);
    }

    #[test]
    fn test_repeating_arguments() {
        assert_parses_shape!("ellipse(1,2,3,4,5)", ShapeKind::Ellipse, false, 5);
        assert_parses_shape!("ellipse(1,2,3,4,5,6,7)", ShapeKind::Ellipse, false, 7);
        assert_parses_shape!("box(1,2,3,4,5,6,7)", ShapeKind::Box, false, 7);
        assert_parses_shape!("annulus(1,2,3,4,5,6)", ShapeKind::Annulus, false, 6);
        assert_parses_shape!("polygon(1,2,3,4,5,6,7,8)", ShapeKind::Polygon, false, 8);
        assert_line_fails!("box(1,2,3,4,5,6)");
        assert_line_fails!("polygon(1,2,3,4)");
        assert_line_fails!("annulus(1,2,3)");
    }

    #[test]
    fn test_panda_family() {
        assert_parses_shape!("panda(100,100,0,360,4,0,20,2)", ShapeKind::Panda, false, 8);
        assert_parses_shape!("epanda(1,2,0,360,4,3,4,6,8,1,30)", ShapeKind::Epanda, false, 11);
        assert_line_fails!("panda(100,100,0,360,4.5,0,20,2)");
    }

    #[test]
    fn test_bare_arguments() {
        assert_parses_shape!("circle 100 100 20", ShapeKind::Circle, false, 3);
        assert_parses_shape!("box 10 10 4 4 0 # color=red", ShapeKind::Box, false, 5);
    }

    #[test]
    fn test_case_insensitive_names() {
        assert_parses_shape!("CIRCLE(1,2,3)", ShapeKind::Circle, false, 3);
        let parsed = parse_line("FK5").unwrap();
        assert_eq!(parsed.atoms, vec![Atom::Frame(CoordFrame::Fk5)]);
    }

    #[test]
    fn test_sexagesimal_arguments() {
        let shape = single_shape("fk5;circle(19:23:40.2,+14:01:09,3')");
        assert!(shape.params().iter().all(NumericLiteral::is_angular));
        assert!((shape.coord_list()[0] - 290.9175).abs() < 1e-9);
    }

    #[test]
    fn test_multiple_statements_on_a_line() {
        let parsed = parse_line("fk5; circle(1,2,3) ; -box(1,2,3,4,0); # color=red").unwrap();
        assert_eq!(parsed.atoms.len(), 3);
        assert_eq!(parsed.comment.as_deref(), Some("color=red"));

        let statements = parsed.into_statements();
        assert!(matches!(statements[0], Statement::Frame(CoordFrame::Fk5)));
        match (&statements[1], &statements[2]) {
            (Statement::Shape(first), Statement::Shape(last)) => {
                assert_eq!(first.comment(), None);
                assert_eq!(last.comment(), Some("color=red"));
                assert!(last.exclude());
            }
            other => panic!("unexpected statements {:?}", other),
        }
    }

    #[test]
    fn test_global_line() {
        let parsed = parse_line("global color=green font=\"helvetica 10 normal\" tag={group 1}").unwrap();
        assert_eq!(
            parsed.atoms,
            vec![Atom::Global("color=green font=\"helvetica 10 normal\" tag={group 1}".to_string())]
        );
        assert_eq!(parse_line("global").unwrap().atoms, vec![Atom::Global(String::new())]);
    }

    #[test]
    fn test_continuation() {
        let parsed = parse_line("circle(1,2,3) || # color=red").unwrap();
        assert!(parsed.continued);
        assert_eq!(parsed.comment.as_deref(), Some("color=red"));
        let shape = single_shape("circle(1,2,3) ||");
        assert!(shape.continued());
    }

    #[test]
    fn test_comment_and_empty_lines() {
        let parsed = parse_line("# Region file format: DS9 version 4.1").unwrap();
        assert!(parsed.atoms.is_empty());
        assert_eq!(parsed.comment.as_deref(), Some("Region file format: DS9 version 4.1"));
        assert_eq!(parse_line("   ").unwrap(), ParsedLine::default());
    }

    #[test]
    fn test_syntax_errors() {
        assert_line_fails!("circle(1,2");
        assert_line_fails!("circle(1,2,abc)");
        assert_line_fails!("composite(1,2,3)");
        assert_line_fails!("unknown(1,2,3)");
    }

    #[test]
    fn test_parse_statements_skips_bad_lines() {
        let _ = env_logger::builder().is_test(true).try_init();
        let statements = parse_statements("image\ncircle(1,2\ncircle(1,2,3)\n# just a comment\n");
        assert_eq!(statements.len(), 3);
        assert!(matches!(statements[0], Statement::Frame(CoordFrame::Image)));
        assert!(matches!(statements[1], Statement::Shape(_)));
        assert_eq!(statements[2], Statement::Comment("just a comment".to_string()));
    }

    #[test]
    fn test_comment_shapes() {
        let shape = parse_comment_shape("composite(202.5,47.2,317.0) || composite=1").unwrap();
        assert_eq!(shape.kind(), ShapeKind::Composite);
        assert!(shape.continued());
        assert_eq!(shape.comment(), Some("composite=1"));

        let shape = parse_comment_shape("text(10,20) text={Hello world}").unwrap();
        assert_eq!(shape.kind(), ShapeKind::Text);
        assert!(!shape.continued());
        assert_eq!(shape.comment(), Some("text={Hello world}"));

        assert!(parse_comment_shape("circle(1,2,3)").is_none());
        assert!(parse_comment_shape("Region file format: DS9 version 4.1").is_none());
    }
}
