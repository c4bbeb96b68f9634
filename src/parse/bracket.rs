//! Bracket atoms: `[isotope? symbol chirality? hcount? charge? class?]`.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while1, take_while_m_n},
    character::complete::{char, digit1, one_of, satisfy},
    combinator::{all_consuming, map, map_res, opt, recognize},
    sequence::{pair, preceded, tuple},
    IResult,
};

use crate::{Atom, Element, SmilesError};

/// The error type for these small grammars.
type Res<'a, T> = IResult<&'a str, T>;

fn isotope(input: &str) -> Res<u16> {
    map_res(digit1, |digits: &str| digits.parse::<u16>())(input)
}

/// Element symbol, either capitalized (`C`, `Cl`) or aromatic (`c`, `se`).
fn symbol(input: &str) -> Res<&str> {
    alt((
        recognize(pair(
            satisfy(|c: char| c.is_ascii_uppercase()),
            opt(satisfy(|c: char| c.is_ascii_lowercase())),
        )),
        tag("se"),
        tag("as"),
        recognize(one_of("bcnops")),
    ))(input)
}

/// `@`, `@@`, or an extended class such as `@TH1`. Stereo is parsed and dropped.
fn chirality(input: &str) -> Res<&str> {
    recognize(pair(
        take_while1(|c: char| c == '@'),
        opt(pair(take_while_m_n(2, 2, |c: char| c.is_ascii_uppercase()), digit1)),
    ))(input)
}

fn hydrogen_count(input: &str) -> Res<u8> {
    map(
        preceded(char('H'), opt(map_res(digit1, |digits: &str| digits.parse::<u8>()))),
        |count: Option<u8>| count.unwrap_or(1),
    )(input)
}

fn charge(input: &str) -> Res<i8> {
    alt((
        map(
            pair(one_of("+-"), map_res(digit1, |digits: &str| digits.parse::<i8>())),
            |(sign, magnitude): (char, i8)| if sign == '-' { -magnitude } else { magnitude },
        ),
        map_res(take_while1(|c: char| c == '+'), |signs: &str| i8::try_from(signs.len())),
        map_res(take_while1(|c: char| c == '-'), |signs: &str| {
            i8::try_from(signs.len()).map(|count| -count)
        }),
    ))(input)
}

fn atom_class(input: &str) -> Res<u16> {
    preceded(char(':'), map_res(digit1, |digits: &str| digits.parse::<u16>()))(input)
}

/// Parse the content between `[` and `]` into an [`Atom`].
pub fn parse_bracket_atom(content: &str) -> Result<Atom, SmilesError> {
    let malformed = || SmilesError::MalformedBracket(content.to_string());

    let (_, (isotope, symbol, _chirality, hydrogens, charge, _class)) = all_consuming(tuple((
        opt(isotope),
        symbol,
        opt(chirality),
        opt(hydrogen_count),
        opt(charge),
        opt(atom_class),
    )))(content)
    .map_err(|_| malformed())?;

    let aromatic = symbol.starts_with(|c: char| c.is_ascii_lowercase());
    let capitalized = {
        let mut chars = symbol.chars();
        match chars.next() {
            Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
            None => return Err(malformed()),
        }
    };
    let element = Element::from_symbol(&capitalized)
        .ok_or_else(|| SmilesError::UnknownElement(symbol.to_string()))?;
    if aromatic && !element.can_be_aromatic() {
        return Err(malformed());
    }

    Ok(Atom {
        element,
        aromatic,
        charge: charge.unwrap_or(0),
        isotope,
        hydrogens: hydrogens.unwrap_or(0),
        bracket: true,
    })
}
