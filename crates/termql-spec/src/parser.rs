//! Textual node-query language.
//!
//! ```text
//! query  := term ("OR" term)*
//! term   := factor ("AND" factor)*
//! factor := "NOT" factor | "(" query ")" | atom
//! ```
//!
//! Atoms are `field:value` pairs, e.g. `type.id:Concept`,
//! `p.prefLabel.en.string:"Cat"*`, `p.prefLabel:ca*`,
//! `createdDate:[2024-01-01 TO *]` or `r.broader.id:null`. A reference
//! followed by another atom, `r.broader.code:C1`, is a reference path.
//! Single-clause `AND`/`OR` are returned unwrapped.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use nom::branch::alt;
use nom::bytes::complete::{tag, take_while1};
use nom::character::complete::{char as pchar, digit1, multispace0, multispace1};
use nom::combinator::{all_consuming, map, map_res, opt, peek, recognize, value};
use nom::multi::separated_list1;
use nom::sequence::{delimited, pair, preceded, separated_pair, terminated, tuple};
use nom::IResult;
use thiserror::Error;
use uuid::Uuid;

use crate::node::{NodeLeaf, NodeSpecification};
use crate::spec::Specification;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid node query at offset {offset} near `{fragment}`")]
pub struct QueryParseError {
    pub offset: usize,
    pub fragment: String,
}

impl QueryParseError {
    fn at(input: &str, rest: &str) -> Self {
        let offset = input.len().saturating_sub(rest.len());
        let fragment = if rest.is_empty() {
            "<end of input>".to_string()
        } else {
            rest.chars().take(24).collect()
        };
        Self { offset, fragment }
    }
}

pub fn parse_node_query(input: &str) -> Result<NodeSpecification, QueryParseError> {
    match all_consuming(delimited(multispace0, query, multispace0))(input) {
        Ok((_, spec)) => Ok(spec),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(QueryParseError::at(input, e.input)),
        Err(nom::Err::Incomplete(_)) => Err(QueryParseError::at(input, "")),
    }
}

// =============================================================================
// Boolean structure
// =============================================================================

fn query(input: &str) -> IResult<&str, NodeSpecification> {
    map(separated_list1(keyword("OR"), term), |xs| {
        collapse(xs, Specification::Or)
    })(input)
}

fn term(input: &str) -> IResult<&str, NodeSpecification> {
    map(separated_list1(keyword("AND"), factor), |xs| {
        collapse(xs, Specification::And)
    })(input)
}

fn factor(input: &str) -> IResult<&str, NodeSpecification> {
    alt((
        map(
            preceded(
                terminated(tag("NOT"), alt((multispace1, recognize(peek(pchar('(')))))),
                factor,
            ),
            Specification::not,
        ),
        delimited(
            pair(pchar('('), multispace0),
            query,
            pair(multispace0, pchar(')')),
        ),
        map(atom, Specification::Leaf),
    ))(input)
}

fn keyword<'a>(kw: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    delimited(multispace1, tag(kw), multispace1)
}

fn collapse(
    mut xs: Vec<NodeSpecification>,
    wrap: fn(Vec<NodeSpecification>) -> NodeSpecification,
) -> NodeSpecification {
    if xs.len() == 1 {
        if let Some(only) = xs.pop() {
            return only;
        }
    }
    wrap(xs)
}

// =============================================================================
// Atoms
// =============================================================================

fn atom(input: &str) -> IResult<&str, NodeLeaf> {
    alt((
        map(
            preceded(alt((tag("urn:uuid:"), tag("node.id:"), tag("nodeId:"), tag("id:"))), uuid),
            NodeLeaf::ById,
        ),
        map(
            preceded(alt((tag("type.graph.id:"), tag("graph.id:"), tag("graphId:"))), uuid),
            NodeLeaf::ByGraphId,
        ),
        map(preceded(alt((tag("type.id:"), tag("typeId:"))), code), NodeLeaf::ByTypeId),
        map(preceded(tag("code:"), alt((quoted, code))), NodeLeaf::ByCode),
        map(preceded(tag("uri:"), alt((quoted, bare))), NodeLeaf::ByUri),
        map(preceded(alt((tag("number:"), tag("n:"))), integer), NodeLeaf::ByNumber),
        map(preceded(tag("createdDate:"), date_range), |(lower, upper)| {
            NodeLeaf::ByCreatedDate { lower, upper }
        }),
        map(preceded(tag("lastModifiedDate:"), date_range), |(lower, upper)| {
            NodeLeaf::ByLastModifiedDate { lower, upper }
        }),
        property_atom,
        reference_atom,
    ))(input)
}

fn property_atom(input: &str) -> IResult<&str, NodeLeaf> {
    let (rest, path) = preceded(
        alt((tag("properties."), tag("props."), tag("p."))),
        terminated(separated_list1(pchar('.'), code), pchar(':')),
    )(input)?;

    match path.as_slice() {
        [attr, lang @ .., last] if last == "string" && lang.len() <= 1 => {
            let attr = attr.clone();
            let lang = lang.first().cloned().unwrap_or_default();
            string_value(attr, lang)(rest)
        }
        [attr] => words_value(attr.clone(), String::new())(rest),
        [attr, lang] => words_value(attr.clone(), lang.clone())(rest),
        _ => Err(nom::Err::Failure(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Verify,
        ))),
    }
}

fn string_value<'a>(attr: String, lang: String) -> impl FnMut(&'a str) -> IResult<&'a str, NodeLeaf> {
    move |input: &'a str| {
        if let Ok((rest, (lower, upper))) = range(string_bound)(input) {
            return Ok((
                rest,
                NodeLeaf::ByPropertyStringRange {
                    attr: attr.clone(),
                    lang: lang.clone(),
                    lower,
                    upper,
                },
            ));
        }
        let (rest, (text, star)) = pair(alt((quoted, bare)), opt(pchar('*')))(input)?;
        let leaf = if star.is_some() {
            NodeLeaf::ByPropertyStringPrefix {
                attr: attr.clone(),
                lang: lang.clone(),
                prefix: text,
            }
        } else {
            NodeLeaf::ByPropertyString {
                attr: attr.clone(),
                lang: lang.clone(),
                value: text,
            }
        };
        Ok((rest, leaf))
    }
}

fn words_value<'a>(attr: String, lang: String) -> impl FnMut(&'a str) -> IResult<&'a str, NodeLeaf> {
    move |input: &'a str| {
        let empty_before_star = map(peek(pchar('*')), |_| String::new());
        let (rest, (text, star)) =
            pair(alt((quoted, bare, empty_before_star)), opt(pchar('*')))(input)?;
        let leaf = if star.is_some() {
            NodeLeaf::ByPropertyWordPrefix {
                attr: attr.clone(),
                lang: lang.clone(),
                prefix: text,
            }
        } else {
            NodeLeaf::ByPropertyWords {
                attr: attr.clone(),
                lang: lang.clone(),
                text,
            }
        };
        Ok((rest, leaf))
    }
}

fn reference_atom(input: &str) -> IResult<&str, NodeLeaf> {
    let (rest, attr) = terminated(
        preceded(alt((tag("references."), tag("refs."), tag("r."))), code),
        pchar('.'),
    )(input)?;

    let mut id_target = preceded(tag("id:"), alt((value(None, tag("null")), map(uuid, Some))));
    if let Ok((rest, target)) = id_target(rest) {
        let leaf = match target {
            Some(target) => NodeLeaf::ByReference { attr, target },
            None => NodeLeaf::WithoutReferences { attr },
        };
        return Ok((rest, leaf));
    }

    let (rest, path) = atom(rest)?;
    Ok((
        rest,
        NodeLeaf::ByReferencePath {
            attr,
            path: Box::new(path),
        },
    ))
}

// =============================================================================
// Values
// =============================================================================

fn is_code_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

fn code(input: &str) -> IResult<&str, String> {
    map(take_while1(is_code_char), str::to_string)(input)
}

fn bare(input: &str) -> IResult<&str, String> {
    map(
        take_while1(|c: char| !c.is_whitespace() && !"()[]\"*".contains(c)),
        str::to_string,
    )(input)
}

fn uuid(input: &str) -> IResult<&str, Uuid> {
    map_res(
        take_while1(|c: char| c.is_ascii_hexdigit() || c == '-'),
        Uuid::parse_str,
    )(input)
}

fn integer(input: &str) -> IResult<&str, i64> {
    map_res(recognize(pair(opt(pchar('-')), digit1)), str::parse::<i64>)(input)
}

/// `"..."` with `\"` and `\\` escapes.
fn quoted(input: &str) -> IResult<&str, String> {
    let (mut rest, _) = pchar('"')(input)?;
    let mut out = String::new();
    loop {
        let mut chars = rest.chars();
        match chars.next() {
            Some('"') => return Ok((chars.as_str(), out)),
            Some('\\') => match chars.next() {
                Some(c) => out.push(c),
                None => break,
            },
            Some(c) => out.push(c),
            None => break,
        }
        rest = chars.as_str();
    }
    Err(nom::Err::Error(nom::error::Error::new(
        input,
        nom::error::ErrorKind::Char,
    )))
}

/// `[lower TO upper]`, `*` for an open bound.
fn range<'a, T, F>(bound: F) -> impl FnMut(&'a str) -> IResult<&'a str, (Option<T>, Option<T>)>
where
    T: Clone,
    F: FnMut(&'a str) -> IResult<&'a str, T> + Clone,
{
    let open_or = move |inner: F| alt((value(None, pchar('*')), map(inner, Some)));
    delimited(
        pair(pchar('['), multispace0),
        separated_pair(
            open_or(bound.clone()),
            tuple((multispace1, tag("TO"), multispace1)),
            open_or(bound),
        ),
        pair(multispace0, pchar(']')),
    )
}

fn string_bound(input: &str) -> IResult<&str, String> {
    alt((quoted, bare))(input)
}

fn date_range(input: &str) -> IResult<&str, (Option<NaiveDateTime>, Option<NaiveDateTime>)> {
    range(datetime)(input)
}

fn datetime(input: &str) -> IResult<&str, NaiveDateTime> {
    map_res(
        take_while1(|c: char| c.is_ascii_alphanumeric() || "-:.".contains(c)),
        parse_datetime,
    )(input)
}

fn parse_datetime(text: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S"))
        .or_else(|_| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d").map(|d| d.and_time(NaiveTime::default()))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(l: NodeLeaf) -> NodeSpecification {
        Specification::Leaf(l)
    }

    #[test]
    fn parses_precedence_and_grouping() {
        let g = Uuid::new_v4();
        let text = format!("graph.id:{g} AND (type.id:Concept OR typeId:Term) AND NOT code:x-1");
        let spec = parse_node_query(&text).expect("query");
        assert_eq!(
            spec,
            Specification::and([
                leaf(NodeLeaf::ByGraphId(g)),
                Specification::or([
                    leaf(NodeLeaf::ByTypeId("Concept".into())),
                    leaf(NodeLeaf::ByTypeId("Term".into())),
                ]),
                Specification::not(leaf(NodeLeaf::ByCode("x-1".into()))),
            ])
        );
    }

    #[test]
    fn single_clauses_are_unwrapped() {
        let spec = parse_node_query("  (number:-3)  ").expect("query");
        assert_eq!(spec, leaf(NodeLeaf::ByNumber(-3)));
    }

    #[test]
    fn parses_property_forms() {
        let cases = [
            (
                "p.prefLabel.string:\"Cat \\\"Family\\\"\"",
                NodeLeaf::ByPropertyString {
                    attr: "prefLabel".into(),
                    lang: String::new(),
                    value: "Cat \"Family\"".into(),
                },
            ),
            (
                "p.prefLabel.en.string:Ca*",
                NodeLeaf::ByPropertyStringPrefix {
                    attr: "prefLabel".into(),
                    lang: "en".into(),
                    prefix: "Ca".into(),
                },
            ),
            (
                "props.notation.string:[a TO *]",
                NodeLeaf::ByPropertyStringRange {
                    attr: "notation".into(),
                    lang: String::new(),
                    lower: Some("a".into()),
                    upper: None,
                },
            ),
            (
                "p.prefLabel.fi:\"kissa koira\"",
                NodeLeaf::ByPropertyWords {
                    attr: "prefLabel".into(),
                    lang: "fi".into(),
                    text: "kissa koira".into(),
                },
            ),
        ];
        for (text, expected) in cases {
            assert_eq!(parse_node_query(text), Ok(leaf(expected)), "{text}");
        }
    }

    #[test]
    fn parses_references_and_dates() {
        let t = Uuid::new_v4();
        assert_eq!(
            parse_node_query(&format!("r.broader.id:{t}")),
            Ok(leaf(NodeLeaf::ByReference {
                attr: "broader".into(),
                target: t
            }))
        );
        assert_eq!(
            parse_node_query("refs.broader.id:null"),
            Ok(leaf(NodeLeaf::WithoutReferences {
                attr: "broader".into()
            }))
        );
        let spec = parse_node_query("createdDate:[2024-01-01 TO 2024-02-01T12:30:00]").expect("dates");
        let Specification::Leaf(NodeLeaf::ByCreatedDate { lower, upper }) = spec else {
            panic!("expected date leaf, got {spec:?}");
        };
        assert_eq!(lower.map(|d| d.to_string()), Some("2024-01-01 00:00:00".into()));
        assert_eq!(upper.map(|d| d.to_string()), Some("2024-02-01 12:30:00".into()));
    }

    #[test]
    fn parses_word_prefixes() {
        assert_eq!(
            parse_node_query("p.prefLabel:ca*"),
            Ok(leaf(NodeLeaf::ByPropertyWordPrefix {
                attr: "prefLabel".into(),
                lang: String::new(),
                prefix: "ca".into(),
            }))
        );
        assert_eq!(
            parse_node_query("props.prefLabel.fi:\"kis\"* AND p.altLabel:*"),
            Ok(Specification::and([
                leaf(NodeLeaf::ByPropertyWordPrefix {
                    attr: "prefLabel".into(),
                    lang: "fi".into(),
                    prefix: "kis".into(),
                }),
                leaf(NodeLeaf::ByPropertyWordPrefix {
                    attr: "altLabel".into(),
                    lang: String::new(),
                    prefix: String::new(),
                }),
            ]))
        );
    }

    #[test]
    fn parses_reference_paths() {
        assert_eq!(
            parse_node_query("r.broader.code:C1"),
            Ok(leaf(NodeLeaf::ByReferencePath {
                attr: "broader".into(),
                path: Box::new(NodeLeaf::ByCode("C1".into())),
            }))
        );
        let spec = parse_node_query("refs.member.r.broader.p.prefLabel.en:cat OR number:1").expect("query");
        assert_eq!(
            spec,
            Specification::or([
                leaf(NodeLeaf::ByReferencePath {
                    attr: "member".into(),
                    path: Box::new(NodeLeaf::ByReferencePath {
                        attr: "broader".into(),
                        path: Box::new(NodeLeaf::ByPropertyWords {
                            attr: "prefLabel".into(),
                            lang: "en".into(),
                            text: "cat".into(),
                        }),
                    }),
                }),
                leaf(NodeLeaf::ByNumber(1)),
            ])
        );
        assert!(parse_node_query("r.broader.").is_err());
        assert!(parse_node_query("r.broader.id:nope").is_err());
    }

    #[test]
    fn displayed_leaves_parse_back() {
        let leaves = [
            NodeLeaf::ById(Uuid::new_v4()),
            NodeLeaf::ByUri("http://example.org/c/1".into()),
            NodeLeaf::ByPropertyStringPrefix {
                attr: "prefLabel".into(),
                lang: "en".into(),
                prefix: "a b".into(),
            },
            NodeLeaf::ByLastModifiedDate {
                lower: None,
                upper: parse_datetime("2020-05-06T07:08:09").ok(),
            },
            NodeLeaf::ByPropertyWordPrefix {
                attr: "prefLabel".into(),
                lang: String::new(),
                prefix: "do".into(),
            },
            NodeLeaf::ByReferencePath {
                attr: "broader".into(),
                path: Box::new(NodeLeaf::ByTypeId("Concept".into())),
            },
        ];
        for l in leaves {
            assert_eq!(parse_node_query(&l.to_string()), Ok(leaf(l.clone())), "{l}");
        }
    }

    #[test]
    fn reports_offset_of_trailing_garbage() {
        let err = parse_node_query("code:a AND").unwrap_err();
        assert_eq!(err.offset, 7);
        assert_eq!(err.fragment, "AND");

        let err = parse_node_query("").unwrap_err();
        assert_eq!(err.offset, 0);
    }

    #[test]
    fn rejects_overlong_property_paths() {
        assert!(parse_node_query("p.a.b.c.d:x").is_err());
        assert!(parse_node_query("bogus:1").is_err());
    }
}
