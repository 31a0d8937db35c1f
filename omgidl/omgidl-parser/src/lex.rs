//! Low-level token parsers shared by the IDL grammar.

use nom::{
    IResult,
    branch::alt,
    bytes::complete::tag,
    character::complete::{alpha1, alphanumeric1, char, digit0, digit1},
    combinator::{map_res, opt, recognize},
    multi::many0,
    sequence::{pair, tuple},
};

/// Advance past whitespace and `//` / `/* */` comments.
pub fn skip_ws(mut input: &str) -> &str {
    loop {
        let trimmed = input.trim_start();
        if let Some(rest) = trimmed.strip_prefix("//") {
            match rest.find('\n') {
                Some(i) => input = &rest[i + 1..],
                None => return "",
            }
        } else if let Some(rest) = trimmed.strip_prefix("/*") {
            match rest.find("*/") {
                Some(i) => input = &rest[i + 2..],
                None => return "",
            }
        } else {
            return trimmed;
        }
    }
}

/// Parse an identifier (alphanumeric + underscore, must start with alpha or `_`).
pub fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        alt((alpha1, tag("_"))),
        many0(alt((alphanumeric1, tag("_")))),
    ))(input)
}

pub fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Parse an unsigned decimal number (array lengths, bounds).
pub fn number(input: &str) -> IResult<&str, usize> {
    map_res(digit1, str::parse)(input)
}

/// Parse a decimal integer with an optional sign.
pub fn signed_int(input: &str) -> IResult<&str, i64> {
    map_res(
        recognize(pair(opt(alt((char('+'), char('-')))), digit1)),
        str::parse,
    )(input)
}

/// Parse a float literal. A `.` or an exponent is required so plain
/// integers are left to [`signed_int`].
pub fn float_lit(input: &str) -> IResult<&str, f64> {
    map_res(
        recognize(tuple((
            opt(alt((char('+'), char('-')))),
            digit1,
            alt((
                recognize(tuple((char('.'), digit0, opt(exponent)))),
                recognize(exponent),
            )),
        ))),
        str::parse,
    )(input)
}

fn exponent(input: &str) -> IResult<&str, &str> {
    recognize(tuple((
        alt((char('e'), char('E'))),
        opt(alt((char('+'), char('-')))),
        digit1,
    )))(input)
}

/// Parse a double-quoted string literal with `\"`, `\\`, `\n`, `\t`, `\r`
/// escapes. Returns the unescaped content.
pub fn string_lit(input: &str) -> IResult<&str, String> {
    let mut chars = input.strip_prefix('"').ok_or_else(|| nom_error(input))?;
    let mut out = String::new();
    loop {
        let mut it = chars.char_indices();
        match it.next() {
            None => return Err(nom_error(input)),
            Some((_, '"')) => return Ok((&chars[1..], out)),
            Some((_, '\\')) => match it.next() {
                Some((i, esc)) => {
                    out.push(match esc {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        other => other,
                    });
                    chars = &chars[i + esc.len_utf8()..];
                }
                None => return Err(nom_error(input)),
            },
            Some((i, c)) => {
                out.push(c);
                chars = &chars[i + c.len_utf8()..];
            }
        }
    }
}

fn nom_error(input: &str) -> nom::Err<nom::error::Error<&str>> {
    nom::Err::Error(nom::error::Error::new(
        input,
        nom::error::ErrorKind::Verify,
    ))
}
