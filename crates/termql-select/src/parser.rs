//! Parser for the comma-separated projection language.
//!
//! ```text
//! selects   := (select ("," select)*)?
//! select    := "*" | id | type | field | group
//! id        := "node.id" | "nodeId" | "id"
//! field     := "code" | "uri" | "number" | "n" | "createdBy" | "createdDate"
//!            | "lastModifiedBy" | "lastModifiedDate"
//! group     := qualifier ("properties" | "props" | "p") "." ("*" | CODE)
//!            | qualifier ("references" | "refs" | "r") "." ("*" | CODE depth?)
//!            | qualifier ("referrers" | "refrs") "." ("*" | CODE depth?)
//! qualifier := (UUID "." CODE "." | CODE ".")?
//! depth     := ":" [1-9][0-9]*
//! ```
//!
//! Alternatives are tried in order and the first match wins. Keywords must end
//! at a token boundary, so `idx.p.foo` is a qualified property rather than
//! `id` followed by garbage.

use nom::branch::alt;
use nom::bytes::complete::{tag, take_while1};
use nom::character::complete::{char as pchar, digit1, multispace0, satisfy};
use nom::combinator::{all_consuming, map, map_res, not, opt, peek, value, verify};
use nom::multi::separated_list0;
use nom::sequence::{delimited, pair, preceded, terminated, tuple};
use nom::IResult;
use thiserror::Error;
use uuid::Uuid;

use crate::select::{Qualifier, Select, DEFAULT_DEPTH};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid select at offset {offset} near `{fragment}`")]
pub struct SelectParseError {
    pub offset: usize,
    pub fragment: String,
}

/// Parse a projection string. The whole input must be consumed; an empty or
/// blank string selects nothing.
pub fn parse_selects(input: &str) -> Result<Vec<Select>, SelectParseError> {
    let parser = delimited(
        multispace0,
        separated_list0(tuple((multispace0, pchar(','), multispace0)), select),
        multispace0,
    );
    match all_consuming(parser)(input) {
        Ok((_, selects)) => Ok(selects),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            let offset = input.len().saturating_sub(e.input.len());
            let fragment = if e.input.is_empty() {
                "<end of input>".to_string()
            } else {
                e.input.chars().take(24).collect()
            };
            Err(SelectParseError { offset, fragment })
        }
        Err(nom::Err::Incomplete(_)) => Err(SelectParseError {
            offset: input.len(),
            fragment: "<end of input>".to_string(),
        }),
    }
}

fn select(input: &str) -> IResult<&str, Select> {
    alt((
        value(Select::All, pchar('*')),
        value(Select::Id, alt((keyword("node.id"), keyword("nodeId"), keyword("id")))),
        map(field, Select::field),
        value(Select::Type, keyword("type")),
        group_with_qualifier,
    ))(input)
}

fn field(input: &str) -> IResult<&str, &'static str> {
    alt((
        value("code", keyword("code")),
        value("uri", keyword("uri")),
        value("number", alt((keyword("number"), keyword("n")))),
        value("createdBy", keyword("createdBy")),
        value("createdDate", keyword("createdDate")),
        value("lastModifiedBy", keyword("lastModifiedBy")),
        value("lastModifiedDate", keyword("lastModifiedDate")),
    ))(input)
}

/// `kw` not followed by another identifier character or a dot.
fn keyword<'a>(kw: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    terminated(
        tag(kw),
        not(peek(satisfy(|c| is_code_char(c) || c == '.'))),
    )
}

fn is_code_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

fn code(input: &str) -> IResult<&str, String> {
    map(take_while1(is_code_char), str::to_string)(input)
}

fn uuid(input: &str) -> IResult<&str, Uuid> {
    map_res(
        verify(
            take_while1(|c: char| c.is_ascii_hexdigit() || c == '-'),
            |s: &str| s.len() == 36,
        ),
        Uuid::parse_str,
    )(input)
}

// =============================================================================
// Qualified groups
// =============================================================================

/// Qualifiers are tried most specific first; if the group after a qualifier
/// does not parse, the shorter qualifier (down to none) is tried.
fn group_with_qualifier(input: &str) -> IResult<&str, Select> {
    alt((
        map(
            pair(
                terminated(pair(terminated(uuid, pchar('.')), code), pchar('.')),
                group,
            ),
            |((graph, ty), s)| s.qualified_by(Qualifier::GraphType(graph, ty)),
        ),
        map(pair(terminated(code, pchar('.')), group), |(ty, s)| {
            s.qualified_by(Qualifier::Type(ty))
        }),
        group,
    ))(input)
}

/// A group without qualifier; the returned token carries `Qualifier::Any`.
fn group(input: &str) -> IResult<&str, Select> {
    alt((
        preceded(
            alt((tag("properties."), tag("props."), tag("p."))),
            alt((
                value(
                    Select::AllProperties {
                        qualifier: Qualifier::Any,
                    },
                    pchar('*'),
                ),
                map(code, Select::property),
            )),
        ),
        preceded(
            alt((tag("references."), tag("refs."), tag("r."))),
            alt((
                value(
                    Select::AllReferences {
                        qualifier: Qualifier::Any,
                    },
                    pchar('*'),
                ),
                map(pair(code, depth), |(name, d)| Select::reference(name, d)),
            )),
        ),
        preceded(
            alt((tag("referrers."), tag("refrs."))),
            alt((
                value(
                    Select::AllReferrers {
                        qualifier: Qualifier::Any,
                    },
                    pchar('*'),
                ),
                map(pair(code, depth), |(name, d)| Select::referrer(name, d)),
            )),
        ),
    ))(input)
}

/// Optional `:N`; zero is rejected.
fn depth(input: &str) -> IResult<&str, u32> {
    map(
        opt(preceded(
            pchar(':'),
            verify(map_res(digit1, str::parse::<u32>), |d| *d > 0),
        )),
        |d| d.unwrap_or(DEFAULT_DEPTH),
    )(input)
}
