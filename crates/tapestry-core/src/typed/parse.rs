//! nom grammar for type strings.
//!
//! # EBNF Grammar
//!
//! ```ebnf
//! type    = pointer | map | slice | array | named ;
//! pointer = "*", type ;
//! map     = "map[", type, "]", type ;
//! slice   = "[", "]", type ;
//! array   = "[", size, "]", type ;
//! named   = [ import_path, "." ], identifier ;
//! size    = decimal | "0x" hex | "0o" octal | "0" octal | "0b" binary ;
//! ```
//!
//! An import path and a name are split at the last `.` following the last
//! `/`; a path without any `/` must contain at most one `.`.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while1},
    character::complete::char,
    combinator::{cut, map_res, opt},
    error::{ErrorKind, FromExternalError, ParseError},
    IResult,
};

use super::{ArrayType, MapType, NamedType, PointerType, SliceType, Type, TypeParseError};

#[derive(Debug)]
enum GrammarError<'a> {
    Nom(&'a str, ErrorKind),
    Invalid(TypeParseError),
}

impl<'a> ParseError<&'a str> for GrammarError<'a> {
    fn from_error_kind(input: &'a str, kind: ErrorKind) -> Self {
        GrammarError::Nom(input, kind)
    }

    fn append(_: &'a str, _: ErrorKind, other: Self) -> Self {
        other
    }
}

impl<'a> FromExternalError<&'a str, TypeParseError> for GrammarError<'a> {
    fn from_external_error(_: &'a str, _: ErrorKind, e: TypeParseError) -> Self {
        GrammarError::Invalid(e)
    }
}

type PResult<'a, T> = IResult<&'a str, T, GrammarError<'a>>;

pub(super) fn parse_type(input: &str) -> Result<Type, TypeParseError> {
    match parse_any(input) {
        Ok(("", ty)) => Ok(ty),
        Ok((rest, _)) => Err(TypeParseError::Trailing {
            input: input.to_string(),
            rest: rest.to_string(),
        }),
        Err(nom::Err::Error(err)) | Err(nom::Err::Failure(err)) => Err(match err {
            GrammarError::Invalid(err) => err,
            GrammarError::Nom(at, _) => match at.chars().next() {
                None => TypeParseError::UnexpectedEnd {
                    input: input.to_string(),
                },
                Some(found) => TypeParseError::Unexpected {
                    input: input.to_string(),
                    offset: input.len() - at.len(),
                    found,
                },
            },
        }),
        Err(nom::Err::Incomplete(_)) => Err(TypeParseError::UnexpectedEnd {
            input: input.to_string(),
        }),
    }
}

fn parse_any(input: &str) -> PResult<'_, Type> {
    alt((parse_pointer, parse_map, parse_slice_or_array, parse_named))(input)
}

fn parse_pointer(input: &str) -> PResult<'_, Type> {
    let (input, _) = char('*')(input)?;
    let (input, elem) = cut(parse_any)(input)?;
    Ok((
        input,
        Type::Pointer(PointerType {
            elem: Box::new(elem),
        }),
    ))
}

fn parse_map(input: &str) -> PResult<'_, Type> {
    let (input, _) = tag("map[")(input)?;
    cut(parse_map_tail)(input)
}

fn parse_map_tail(input: &str) -> PResult<'_, Type> {
    let (input, key) = parse_any(input)?;
    let (input, _) = char(']')(input)?;
    let (input, value) = parse_any(input)?;
    Ok((
        input,
        Type::Map(MapType {
            key: Box::new(key),
            value: Box::new(value),
        }),
    ))
}

fn parse_slice_or_array(input: &str) -> PResult<'_, Type> {
    let (input, _) = char('[')(input)?;
    cut(parse_array_tail)(input)
}

fn parse_array_tail(input: &str) -> PResult<'_, Type> {
    let (input, close) = opt(char(']'))(input)?;
    if close.is_some() {
        let (input, elem) = parse_any(input)?;
        return Ok((
            input,
            Type::Slice(SliceType {
                elem: Box::new(elem),
            }),
        ));
    }
    let (input, size) = map_res(
        take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_'),
        parse_size,
    )(input)?;
    let (input, _) = char(']')(input)?;
    let (input, elem) = parse_any(input)?;
    Ok((
        input,
        Type::Array(ArrayType {
            size,
            elem: Box::new(elem),
        }),
    ))
}

fn parse_named(input: &str) -> PResult<'_, Type> {
    let (input, named) = map_res(
        take_while1(|c: char| c.is_alphanumeric() || matches!(c, '_' | '.' | '/' | '-' | '~')),
        split_named,
    )(input)?;
    Ok((input, Type::Named(named)))
}

fn split_named(token: &str) -> Result<NamedType, TypeParseError> {
    let invalid = |reason: &str| TypeParseError::InvalidName {
        name: token.to_string(),
        reason: reason.to_string(),
    };

    let (path, name) = match token.rfind('/') {
        Some(slash) => {
            let tail = &token[slash + 1..];
            match tail.rfind('.') {
                Some(dot) => (Some(&token[..slash + 1 + dot]), &tail[dot + 1..]),
                None => return Err(invalid("import path is not followed by a type name")),
            }
        }
        None => {
            let parts: Vec<&str> = token.split('.').collect();
            match parts.as_slice() {
                [name] => (None, *name),
                [path, name] => (Some(*path), *name),
                _ => return Err(invalid("ambiguous qualified name")),
            }
        }
    };

    if path.is_some_and(|p| p.is_empty() || p.ends_with('/')) {
        return Err(invalid("empty import path"));
    }
    if !is_identifier(name) {
        return Err(invalid("type name is not an identifier"));
    }
    Ok(NamedType {
        import_path: path.map(str::to_string),
        name: name.to_string(),
    })
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' => {
            chars.all(|c| c.is_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

/// Parses a Go integer literal as used for array lengths.
pub(super) fn parse_size(literal: &str) -> Result<u64, TypeParseError> {
    let invalid = |reason: &str| TypeParseError::InvalidSize {
        literal: literal.to_string(),
        reason: reason.to_string(),
    };

    let prefixed = |lower: &str, upper: &str| {
        literal
            .strip_prefix(lower)
            .or_else(|| literal.strip_prefix(upper))
    };
    let (digits, radix) = if let Some(rest) = prefixed("0x", "0X") {
        (rest, 16)
    } else if let Some(rest) = prefixed("0o", "0O") {
        (rest, 8)
    } else if let Some(rest) = prefixed("0b", "0B") {
        (rest, 2)
    } else if literal.len() > 1 && literal.starts_with('0') {
        (&literal[1..], 8)
    } else {
        (literal, 10)
    };
    // A separator may follow the base prefix or the leading octal zero.
    let digits = match radix {
        10 => digits,
        _ => digits.strip_prefix('_').unwrap_or(digits),
    };

    if digits.is_empty() {
        return Err(invalid("missing digits"));
    }
    if digits.starts_with('_') || digits.ends_with('_') || digits.contains("__") {
        return Err(invalid("misplaced digit separator"));
    }
    let cleaned: String = digits.chars().filter(|c| *c != '_').collect();
    u64::from_str_radix(&cleaned, radix).map_err(|err| invalid(&err.to_string()))
}
