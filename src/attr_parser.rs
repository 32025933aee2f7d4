//! # Attribute Lexicon
//!
//! Reads the `key[=value]` lists found in `global` lines and in the comment
//! that trails a shape (`circle(1,2,3) # color=red tag={a} source`).
//! The lexicon keeps every token in order, duplicates included; folding them
//! into a [`ShapeAttributes`] set is the resolver's job.

use log::debug;
use nom::{
    branch::alt,
    bytes::complete::{take_until, take_while, take_while1},
    character::complete::{alpha1, alphanumeric1, char as nom_char, digit1, multispace0, one_of, space0, space1},
    combinator::{map, opt, recognize},
    error::{ErrorKind, ParseError as NomParseErrorTrait, VerboseError},
    multi::{many0, many1},
    sequence::{delimited, pair, preceded, tuple},
};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::{Input, ParserResult};

/// Value on the right-hand side of `key=value`.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Text(String),
    /// Several parenthesized groups, e.g. `dashlist=(8)(4)`.
    List(Vec<String>),
}

impl AttrValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Text(s) => Some(s),
            AttrValue::List(_) => None,
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Text(s) if s.is_empty() || s.contains(char::is_whitespace) => write!(f, "{{{}}}", s),
            AttrValue::Text(s) => f.write_str(s),
            AttrValue::List(items) => items.iter().try_for_each(|item| write!(f, "({})", item)),
        }
    }
}

/// One lexed attribute: a bare flag (`source`) or a key with a value.
#[derive(Debug, Clone, PartialEq)]
pub struct AttrToken {
    pub key: String,
    pub value: Option<AttrValue>,
}

/// Resolved attributes of a shape.
///
/// `tag` never lives in `values`: every `tag=` adds to the tag set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShapeAttributes {
    flags: Vec<String>,
    values: BTreeMap<String, AttrValue>,
    tags: BTreeSet<String>,
}

impl ShapeAttributes {
    pub fn flags(&self) -> &[String] {
        &self.flags
    }

    pub fn has_flag(&self, flag: &str) -> bool {
        self.flags.iter().any(|f| f == flag)
    }

    pub fn values(&self) -> &BTreeMap<String, AttrValue> {
        &self.values
    }

    pub fn get(&self, key: &str) -> Option<&AttrValue> {
        self.values.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(AttrValue::as_str)
    }

    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty() && self.values.is_empty() && self.tags.is_empty()
    }

    /// Folds lexed tokens in: flags are appended once, values overwrite, tags accumulate.
    pub fn apply(&mut self, tokens: &[AttrToken]) {
        for token in tokens {
            match &token.value {
                None => {
                    if !self.has_flag(&token.key) {
                        self.flags.push(token.key.clone());
                    }
                }
                Some(value) if token.key == "tag" => match value {
                    AttrValue::Text(tag) => {
                        self.tags.insert(tag.clone());
                    }
                    AttrValue::List(tags) => self.tags.extend(tags.iter().cloned()),
                },
                Some(value) => {
                    self.values.insert(token.key.clone(), value.clone());
                }
            }
        }
    }

    /// A copy of `self` with `tokens` folded on top.
    pub fn merged(&self, tokens: &[AttrToken]) -> ShapeAttributes {
        let mut attrs = self.clone();
        attrs.apply(tokens);
        attrs
    }
}

// --- Value Parsers ---

fn braced_value<'a>(input: Input<'a>) -> ParserResult<'a, AttrValue> {
    map(delimited(nom_char('{'), take_until("}"), nom_char('}')), |s: &str| {
        AttrValue::Text(s.to_string())
    })(input)
}

fn quoted_value<'a>(input: Input<'a>) -> ParserResult<'a, AttrValue> {
    map(
        alt((
            delimited(nom_char('"'), take_until("\""), nom_char('"')),
            delimited(nom_char('\''), take_until("'"), nom_char('\'')),
        )),
        |s: &str| AttrValue::Text(s.to_string()),
    )(input)
}

fn parenthesized_value<'a>(input: Input<'a>) -> ParserResult<'a, AttrValue> {
    map(
        many1(preceded(space0, delimited(nom_char('('), take_until(")"), nom_char(')')))),
        |mut groups: Vec<&str>| {
            if groups.len() == 1 {
                AttrValue::Text(groups.remove(0).to_string())
            } else {
                AttrValue::List(groups.into_iter().map(str::to_string).collect())
            }
        },
    )(input)
}

fn hex_color_value<'a>(input: Input<'a>) -> ParserResult<'a, AttrValue> {
    map(recognize(pair(nom_char('#'), alphanumeric1)), |s: &str| AttrValue::Text(s.to_string()))(input)
}

/// `point=circle 5`
fn word_then_number<'a>(input: Input<'a>) -> ParserResult<'a, &'a str> {
    recognize(tuple((alpha1, space1, digit1)))(input)
}

/// `dashlist=8 3`
fn digit_run<'a>(input: Input<'a>) -> ParserResult<'a, &'a str> {
    recognize(pair(digit1, take_while(|c: char| c.is_ascii_digit() || c == ' ')))(input)
}

/// `width=1.5`, `textangle=-30`
fn decimal_run<'a>(input: Input<'a>) -> ParserResult<'a, &'a str> {
    recognize(pair(opt(one_of("+-")), take_while1(|c: char| c.is_ascii_digit() || c == '.')))(input)
}

/// Unquoted values can be read several ways; the longest reading wins.
fn bare_value<'a>(input: Input<'a>) -> ParserResult<'a, AttrValue> {
    let candidates: [for<'b> fn(Input<'b>) -> ParserResult<'b, &'b str>; 4] =
        [word_then_number, digit_run, decimal_run, |i| alphanumeric1(i)];
    let mut best: Option<(Input<'a>, &'a str)> = None;
    for candidate in candidates {
        if let Ok((rest, matched)) = candidate(input) {
            if best.map_or(true, |(best_rest, _)| rest.len() < best_rest.len()) {
                best = Some((rest, matched));
            }
        }
    }
    match best {
        Some((rest, matched)) => Ok((rest, AttrValue::Text(matched.trim().to_string()))),
        None => Err(nom::Err::Error(VerboseError::from_error_kind(input, ErrorKind::Alt))),
    }
}

fn attr_value<'a>(input: Input<'a>) -> ParserResult<'a, AttrValue> {
    alt((braced_value, quoted_value, parenthesized_value, hex_color_value, bare_value))(input)
}

/// Parses a single attribute: `key`, or `key=value`.
fn parse_attribute_pair<'a>(input: Input<'a>) -> ParserResult<'a, AttrToken> {
    map(
        pair(
            alpha1,
            opt(preceded(tuple((multispace0, nom_char('='), multispace0)), attr_value)),
        ),
        |(key, value): (&str, Option<AttrValue>)| AttrToken {
            key: key.to_string(),
            value,
        },
    )(input)
}

pub(crate) fn parse_attribute_tokens<'a>(input: Input<'a>) -> ParserResult<'a, Vec<AttrToken>> {
    many0(preceded(multispace0, parse_attribute_pair))(input)
}

/// Reads as many attributes as possible from `input`.
///
/// Returns the tokens and the trimmed text the lexicon stopped at.
pub fn parse_attribute_list(input: &str) -> (Vec<AttrToken>, &str) {
    match parse_attribute_tokens(input) {
        Ok((rest, tokens)) => {
            let rest = rest.trim();
            if !rest.is_empty() {
                debug!("attribute text not understood: '{}'", rest);
            }
            (tokens, rest)
        }
        Err(_) => (Vec::new(), input.trim()),
    }
}
