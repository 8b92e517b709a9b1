//! Module for the lexer implementation.
//!
//! The lexer produces a flat token snapshot with line/column positions.
//! Trivia (whitespace and comments) is dropped from the snapshot; the
//! parser only ever sees meaningful tokens.

use logos::Logos;
use tracing::debug;

use crate::error::LexError;
use crate::error::LexErrorKind;
use crate::token::Token;
use crate::token::TokenKind;
use crate::token::TokenPosition;

/// Represents a set of token kinds as a bitset.
///
/// As Rust does not currently support const functions in traits, `TokenSet`
/// operates on "raw" forms of token kinds (i.e. `u8`). This allows sets to
/// be created in const contexts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TokenSet(u128);

impl TokenSet {
    /// An empty token set.
    pub const EMPTY: Self = Self(0);

    /// Constructs a token set from a slice of token kinds.
    pub const fn new(tokens: &[TokenKind]) -> Self {
        let mut bits = 0u128;
        let mut i = 0;
        while i < tokens.len() {
            bits |= Self::mask(tokens[i] as u8);
            i += 1;
        }
        Self(bits)
    }

    /// Unions two token sets together.
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Checks if the token kind is contained in the set.
    pub const fn contains(&self, token: TokenKind) -> bool {
        self.0 & Self::mask(token as u8) != 0
    }

    /// Gets the count of token kinds in the set.
    pub const fn count(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Iterates the token kinds in the set.
    pub fn iter(&self) -> impl Iterator<Item = TokenKind> {
        let mut bits = self.0;
        std::iter::from_fn(move || {
            if bits == 0 {
                return None;
            }

            let raw = u8::try_from(bits.trailing_zeros())
                .expect("the maximum token value should be less than 128");
            bits ^= bits & bits.overflowing_neg().0;
            Some(TokenKind::from_raw(raw))
        })
    }

    /// Collects the token kinds in the set into a vector.
    pub fn to_vec(&self) -> Vec<TokenKind> {
        self.iter().collect()
    }

    /// Masks the given raw token value to a `u128`.
    const fn mask(token: u8) -> u128 {
        1u128 << (token as usize)
    }
}

impl FromIterator<TokenKind> for TokenSet {
    fn from_iter<I: IntoIterator<Item = TokenKind>>(iter: I) -> Self {
        let mut bits = 0u128;
        for kind in iter {
            bits |= Self::mask(kind.into_raw());
        }
        Self(bits)
    }
}

/// Tracks line/column positions while walking the source in byte order.
struct PositionTracker<'a> {
    /// The source being tracked.
    source: &'a str,
    /// The byte offset the tracker has advanced to.
    byte_offset: usize,
    /// The zero-based line number at the current offset.
    line_number: u32,
    /// The UTF-16 offset within the current line.
    line_code_unit: u32,
    /// The absolute UTF-16 offset from the start of the source.
    code_unit: u32,
}

impl<'a> PositionTracker<'a> {
    /// Creates a tracker positioned at the start of the source.
    fn new(source: &'a str) -> Self {
        Self {
            source,
            byte_offset: 0,
            line_number: 0,
            line_code_unit: 0,
            code_unit: 0,
        }
    }

    /// Advances the tracker to the given byte offset and returns the
    /// position there.
    ///
    /// Offsets must be visited in nondecreasing order.
    fn advance_to(&mut self, offset: usize) -> TokenPosition {
        for ch in self.source[self.byte_offset..offset].chars() {
            let units = ch.len_utf16() as u32;
            self.code_unit += units;
            if ch == '\n' {
                self.line_number += 1;
                self.line_code_unit = 0;
            } else {
                self.line_code_unit += units;
            }
        }
        self.byte_offset = offset;

        TokenPosition {
            line_number: self.line_number,
            line_code_unit: self.line_code_unit,
            code_unit: self.code_unit,
        }
    }
}

/// Lexes the given source into a token snapshot.
///
/// Trivia is dropped. The first malformed piece of input aborts the lex
/// with a [`LexError`]; a successful lex covers the entire source.
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    let mut tokens = Vec::new();
    let mut tracker = PositionTracker::new(source);
    let mut lexer = TokenKind::lexer(source);

    while let Some(result) = lexer.next() {
        let span = lexer.span();
        let position_start = tracker.advance_to(span.start);

        let kind = match result {
            Ok(kind) if kind.is_trivia() => continue,
            Ok(kind) if kind.is_unterminated() => {
                return Err(LexError::new(
                    match kind {
                        TokenKind::UnterminatedText => LexErrorKind::UnterminatedText,
                        TokenKind::UnterminatedQuotedIdentifier => {
                            LexErrorKind::UnterminatedQuotedIdentifier
                        }
                        _ => LexErrorKind::UnterminatedBlockComment,
                    },
                    position_start,
                ));
            }
            Ok(kind) => kind,
            Err(()) => return Err(LexError::new(LexErrorKind::UnknownToken, position_start)),
        };

        let position_end = tracker.advance_to(span.end);
        tokens.push(Token {
            kind,
            data: source[span].to_string(),
            position_start,
            position_end,
        });
    }

    debug!(tokens = tokens.len(), "lexed source");
    Ok(tokens)
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source)
            .expect("source should lex")
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn keywords_and_identifiers() {
        assert_eq!(
            kinds("let x = each _ in x"),
            vec![
                TokenKind::KeywordLet,
                TokenKind::Identifier,
                TokenKind::Equal,
                TokenKind::KeywordEach,
                TokenKind::Identifier,
                TokenKind::KeywordIn,
                TokenKind::Identifier,
            ]
        );
    }

    #[test]
    fn dotted_identifier_is_one_token() {
        let tokens = tokenize("Table.AddColumn").expect("source should lex");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::Identifier);
        assert_eq!(tokens[0].data, "Table.AddColumn");
    }

    #[test]
    fn quoted_identifier() {
        let tokens = tokenize(r#"#"with ""quotes"" and spaces""#).expect("source should lex");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::Identifier);
    }

    #[test]
    fn numeric_literals() {
        assert_eq!(
            kinds("1 1.5 .5 1e3 1.5e-3 0xDEAD"),
            vec![
                TokenKind::NumericLiteral,
                TokenKind::NumericLiteral,
                TokenKind::NumericLiteral,
                TokenKind::NumericLiteral,
                TokenKind::NumericLiteral,
                TokenKind::HexLiteral,
            ]
        );
    }

    #[test]
    fn range_does_not_split_numbers() {
        assert_eq!(
            kinds("{1..2}"),
            vec![
                TokenKind::LeftBrace,
                TokenKind::NumericLiteral,
                TokenKind::DotDot,
                TokenKind::NumericLiteral,
                TokenKind::RightBrace,
            ]
        );
    }

    #[test]
    fn text_literal_with_escaped_quotes() {
        let tokens = tokenize(r#""a""b""#).expect("source should lex");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::TextLiteral);
        assert_eq!(tokens[0].data, r#""a""b""#);
    }

    #[test]
    fn comments_are_trivia() {
        assert_eq!(
            kinds("1 // line\n/* block */ + 2"),
            vec![
                TokenKind::NumericLiteral,
                TokenKind::Plus,
                TokenKind::NumericLiteral,
            ]
        );
    }

    #[test]
    fn unterminated_text_is_an_error() {
        let err = tokenize(r#"1 + "abc"#).expect_err("lex should fail");
        assert_eq!(err.kind(), LexErrorKind::UnterminatedText);
        assert_eq!(err.position().line_code_unit, 4);
    }

    #[test]
    fn unknown_token_is_an_error() {
        let err = tokenize("1 ! 2").expect_err("lex should fail");
        assert_eq!(err.kind(), LexErrorKind::UnknownToken);
    }

    #[test]
    fn positions_are_utf16() {
        // '😀' is two UTF-16 code units.
        let tokens = tokenize("\"😀\" x").expect("source should lex");
        assert_eq!(tokens[1].position_start.line_code_unit, 5);
        assert_eq!(tokens[1].position_start.code_unit, 5);
    }

    #[test]
    fn positions_track_lines() {
        let tokens = tokenize("1 +\n  2").expect("source should lex");
        let two = &tokens[2];
        assert_eq!(two.position_start.line_number, 1);
        assert_eq!(two.position_start.line_code_unit, 2);
        assert_eq!(two.position_start.code_unit, 6);
    }
}
