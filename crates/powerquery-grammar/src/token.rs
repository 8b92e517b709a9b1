//! Tokens for the Power Query (M) formula language.

use std::fmt;

use logos::Logos;
use serde::Serialize;
use strum::VariantArray;

/// A cursor position inside a document.
///
/// Lines are zero-based; `line_code_unit` is the UTF-16 code-unit offset
/// within the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Position {
    /// The zero-based line number.
    pub line_number: u32,
    /// The UTF-16 code-unit offset within the line.
    pub line_code_unit: u32,
}

impl Position {
    /// Creates a new position from a line number and a UTF-16 offset within
    /// that line.
    pub const fn new(line_number: u32, line_code_unit: u32) -> Self {
        Self {
            line_number,
            line_code_unit,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{line}:{column}",
            line = self.line_number,
            column = self.line_code_unit
        )
    }
}

/// The position of a token boundary.
///
/// In addition to the line-relative coordinates this carries `code_unit`,
/// the absolute UTF-16 code-unit offset from the start of the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TokenPosition {
    /// The zero-based line number.
    pub line_number: u32,
    /// The UTF-16 code-unit offset within the line.
    pub line_code_unit: u32,
    /// The absolute UTF-16 code-unit offset from the start of the document.
    pub code_unit: u32,
}

impl TokenPosition {
    /// Views the token position as a line-relative [`Position`].
    pub const fn to_position(self) -> Position {
        Position {
            line_number: self.line_number,
            line_code_unit: self.line_code_unit,
        }
    }
}

impl PartialOrd for TokenPosition {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TokenPosition {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.code_unit.cmp(&other.code_unit)
    }
}

impl fmt::Display for TokenPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.to_position().fmt(f)
    }
}

/// The span of consecutive tokens covered by a node.
///
/// `token_index_end` is exclusive; positions are the start of the first
/// token and the end of the last token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TokenRange {
    /// The index of the first token covered by the node.
    pub token_index_start: usize,
    /// The exclusive index of the last token covered by the node.
    pub token_index_end: usize,
    /// The position of the start of the first covered token.
    pub position_start: TokenPosition,
    /// The position of the end of the last covered token.
    pub position_end: TokenPosition,
}

/// Represents a Power Query (M) token.
///
/// The variants double as the lexer definition; trivia variants
/// ([`Whitespace`][TokenKind::Whitespace] and the comment kinds) and the
/// unterminated-input variants never appear in a token snapshot: the former
/// are dropped and the latter are converted into lex errors.
#[derive(
    Logos, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, VariantArray,
)]
#[repr(u8)]
pub enum TokenKind {
    /// Contiguous whitespace.
    #[regex(r"[ \t\r\n\u{feff}]+")]
    Whitespace,

    /// A line comment.
    #[regex(r"//[^\r\n]*", allow_greedy = true)]
    LineComment,

    /// A block comment.
    #[regex(r"/\*([^*]|\*+[^*/])*\*+/")]
    BlockComment,

    /// A block comment that is missing its closing `*/`.
    #[regex(r"/\*([^*]|\*+[^*/])*\**")]
    UnterminatedBlockComment,

    /// A text literal that is missing its closing quote.
    #[regex(r#""([^"]|"")*"#)]
    UnterminatedText,

    /// A quoted identifier that is missing its closing quote.
    #[regex(r#"#"([^"]|"")*"#)]
    UnterminatedQuotedIdentifier,

    /// The `&` operator.
    #[token("&")]
    Ampersand,
    /// The `*` operator.
    #[token("*")]
    Asterisk,
    /// The `@` inclusive-identifier prefix.
    #[token("@")]
    AtSign,
    /// The `,` separator.
    #[token(",")]
    Comma,
    /// The `/` operator.
    #[token("/")]
    Division,
    /// The `..` range operator.
    #[token("..")]
    DotDot,
    /// The `...` open-record marker and not-implemented expression.
    #[token("...")]
    Ellipsis,
    /// The `=` symbol.
    #[token("=")]
    Equal,
    /// The `=>` symbol.
    #[token("=>")]
    FatArrow,
    /// The `>` operator.
    #[token(">")]
    GreaterThan,
    /// The `>=` operator.
    #[token(">=")]
    GreaterThanEqualTo,
    /// A hexadecimal literal.
    #[regex(r"0[xX][0-9a-fA-F]+")]
    HexLiteral,
    /// An identifier, including dotted (`Table.AddColumn`) and quoted
    /// (`#"with spaces"`) forms.
    #[regex(r"[\p{L}_][\p{L}\p{N}_]*(\.[\p{L}_][\p{L}\p{N}_]*)*")]
    #[regex(r##"#"([^"]|"")*""##)]
    Identifier,
    /// The `and` keyword.
    #[token("and")]
    KeywordAnd,
    /// The `as` keyword.
    #[token("as")]
    KeywordAs,
    /// The `each` keyword.
    #[token("each")]
    KeywordEach,
    /// The `else` keyword.
    #[token("else")]
    KeywordElse,
    /// The `error` keyword.
    #[token("error")]
    KeywordError,
    /// The `false` keyword.
    #[token("false")]
    KeywordFalse,
    /// The `#binary` constructor keyword.
    #[token("#binary")]
    KeywordHashBinary,
    /// The `#date` constructor keyword.
    #[token("#date")]
    KeywordHashDate,
    /// The `#datetime` constructor keyword.
    #[token("#datetime")]
    KeywordHashDateTime,
    /// The `#datetimezone` constructor keyword.
    #[token("#datetimezone")]
    KeywordHashDateTimeZone,
    /// The `#duration` constructor keyword.
    #[token("#duration")]
    KeywordHashDuration,
    /// The `#infinity` literal keyword.
    #[token("#infinity")]
    KeywordHashInfinity,
    /// The `#nan` literal keyword.
    #[token("#nan")]
    KeywordHashNan,
    /// The `#sections` keyword.
    #[token("#sections")]
    KeywordHashSections,
    /// The `#shared` keyword.
    #[token("#shared")]
    KeywordHashShared,
    /// The `#table` constructor keyword.
    #[token("#table")]
    KeywordHashTable,
    /// The `#time` constructor keyword.
    #[token("#time")]
    KeywordHashTime,
    /// The `if` keyword.
    #[token("if")]
    KeywordIf,
    /// The `in` keyword.
    #[token("in")]
    KeywordIn,
    /// The `is` keyword.
    #[token("is")]
    KeywordIs,
    /// The `let` keyword.
    #[token("let")]
    KeywordLet,
    /// The `meta` keyword.
    #[token("meta")]
    KeywordMeta,
    /// The `not` keyword.
    #[token("not")]
    KeywordNot,
    /// The `or` keyword.
    #[token("or")]
    KeywordOr,
    /// The `otherwise` keyword.
    #[token("otherwise")]
    KeywordOtherwise,
    /// The `section` keyword.
    #[token("section")]
    KeywordSection,
    /// The `shared` keyword.
    #[token("shared")]
    KeywordShared,
    /// The `then` keyword.
    #[token("then")]
    KeywordThen,
    /// The `true` keyword.
    #[token("true")]
    KeywordTrue,
    /// The `try` keyword.
    #[token("try")]
    KeywordTry,
    /// The `type` keyword.
    #[token("type")]
    KeywordType,
    /// The `{` symbol.
    #[token("{")]
    LeftBrace,
    /// The `[` symbol.
    #[token("[")]
    LeftBracket,
    /// The `(` symbol.
    #[token("(")]
    LeftParenthesis,
    /// The `<` operator.
    #[token("<")]
    LessThan,
    /// The `<=` operator.
    #[token("<=")]
    LessThanEqualTo,
    /// The `-` operator.
    #[token("-")]
    Minus,
    /// The `<>` operator.
    #[token("<>")]
    NotEqual,
    /// The `??` operator.
    #[token("??")]
    NullCoalescingOperator,
    /// The `null` literal keyword.
    #[token("null")]
    NullLiteral,
    /// A numeric literal.
    #[regex(r"[0-9]+(\.[0-9]+)?([eE][+-]?[0-9]+)?")]
    #[regex(r"\.[0-9]+([eE][+-]?[0-9]+)?")]
    NumericLiteral,
    /// The `+` operator.
    #[token("+")]
    Plus,
    /// The `?` optional-access suffix.
    #[token("?")]
    QuestionMark,
    /// The `}` symbol.
    #[token("}")]
    RightBrace,
    /// The `]` symbol.
    #[token("]")]
    RightBracket,
    /// The `)` symbol.
    #[token(")")]
    RightParenthesis,
    /// The `;` separator.
    #[token(";")]
    Semicolon,
    /// A text literal.
    #[regex(r#""([^"]|"")*""#)]
    TextLiteral,

    // WARNING: this must always be the last variant.
    /// The exclusive maximum token value.
    MAX,
}

/// Asserts that TokenKind can fit in a `TokenSet`.
const _: () = assert!(TokenKind::MAX as u8 <= 128);

impl TokenKind {
    /// Converts the token kind into its "raw" representation.
    pub const fn into_raw(self) -> u8 {
        self as u8
    }

    /// Converts from a raw value into the token kind.
    ///
    /// # Panics
    ///
    /// Panics if the value is not a valid token kind.
    pub fn from_raw(raw: u8) -> Self {
        assert!(raw < Self::MAX as u8, "invalid token value");
        // SAFETY: the enum is `repr(u8)` and the value was just bounds checked.
        unsafe { std::mem::transmute(raw) }
    }

    /// Determines if the kind is trivia dropped from token snapshots.
    pub fn is_trivia(self) -> bool {
        matches!(self, Self::Whitespace | Self::LineComment | Self::BlockComment)
    }

    /// Determines if the kind marks input the lexer could not terminate.
    pub fn is_unterminated(self) -> bool {
        matches!(
            self,
            Self::UnterminatedBlockComment
                | Self::UnterminatedText
                | Self::UnterminatedQuotedIdentifier
        )
    }

    /// Describes the token kind for use in diagnostics.
    pub fn describe(self) -> &'static str {
        match self {
            Self::Whitespace => "whitespace",
            Self::LineComment | Self::BlockComment => "a comment",
            Self::UnterminatedBlockComment => "an unterminated comment",
            Self::UnterminatedText => "an unterminated text literal",
            Self::UnterminatedQuotedIdentifier => "an unterminated quoted identifier",
            Self::Ampersand => "`&`",
            Self::Asterisk => "`*`",
            Self::AtSign => "`@`",
            Self::Comma => "`,`",
            Self::Division => "`/`",
            Self::DotDot => "`..`",
            Self::Ellipsis => "`...`",
            Self::Equal => "`=`",
            Self::FatArrow => "`=>`",
            Self::GreaterThan => "`>`",
            Self::GreaterThanEqualTo => "`>=`",
            Self::HexLiteral => "a hexadecimal literal",
            Self::Identifier => "an identifier",
            Self::KeywordAnd => "`and` keyword",
            Self::KeywordAs => "`as` keyword",
            Self::KeywordEach => "`each` keyword",
            Self::KeywordElse => "`else` keyword",
            Self::KeywordError => "`error` keyword",
            Self::KeywordFalse => "`false` keyword",
            Self::KeywordHashBinary => "`#binary` keyword",
            Self::KeywordHashDate => "`#date` keyword",
            Self::KeywordHashDateTime => "`#datetime` keyword",
            Self::KeywordHashDateTimeZone => "`#datetimezone` keyword",
            Self::KeywordHashDuration => "`#duration` keyword",
            Self::KeywordHashInfinity => "`#infinity` keyword",
            Self::KeywordHashNan => "`#nan` keyword",
            Self::KeywordHashSections => "`#sections` keyword",
            Self::KeywordHashShared => "`#shared` keyword",
            Self::KeywordHashTable => "`#table` keyword",
            Self::KeywordHashTime => "`#time` keyword",
            Self::KeywordIf => "`if` keyword",
            Self::KeywordIn => "`in` keyword",
            Self::KeywordIs => "`is` keyword",
            Self::KeywordLet => "`let` keyword",
            Self::KeywordMeta => "`meta` keyword",
            Self::KeywordNot => "`not` keyword",
            Self::KeywordOr => "`or` keyword",
            Self::KeywordOtherwise => "`otherwise` keyword",
            Self::KeywordSection => "`section` keyword",
            Self::KeywordShared => "`shared` keyword",
            Self::KeywordThen => "`then` keyword",
            Self::KeywordTrue => "`true` keyword",
            Self::KeywordTry => "`try` keyword",
            Self::KeywordType => "`type` keyword",
            Self::LeftBrace => "`{`",
            Self::LeftBracket => "`[`",
            Self::LeftParenthesis => "`(`",
            Self::LessThan => "`<`",
            Self::LessThanEqualTo => "`<=`",
            Self::Minus => "`-`",
            Self::NotEqual => "`<>`",
            Self::NullCoalescingOperator => "`??`",
            Self::NullLiteral => "`null` keyword",
            Self::NumericLiteral => "a numeric literal",
            Self::Plus => "`+`",
            Self::QuestionMark => "`?`",
            Self::RightBrace => "`}`",
            Self::RightBracket => "`]`",
            Self::RightParenthesis => "`)`",
            Self::Semicolon => "`;`",
            Self::TextLiteral => "a text literal",
            Self::MAX => unreachable!(),
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// A token in a token snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    /// The kind of the token.
    pub kind: TokenKind,
    /// The verbatim source text of the token.
    pub data: String,
    /// The position of the first code unit of the token.
    pub position_start: TokenPosition,
    /// The position one code unit past the last code unit of the token.
    pub position_end: TokenPosition,
}

impl Token {
    /// Determines if the given line-relative position falls on or inside the
    /// token, with both bounds inclusive.
    pub fn contains_position_inclusive(&self, position: Position) -> bool {
        position >= self.position_start.to_position()
            && position <= self.position_end.to_position()
    }
}

/// An M keyword that may begin or continue an expression.
///
/// The closed set backs keyword autocomplete; the conjunction keywords
/// (`and`, `as`, `is`, `meta`, `or`) are the ones offered after a completed
/// expression.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, VariantArray,
)]
pub enum Keyword {
    /// The `and` keyword.
    And,
    /// The `as` keyword.
    As,
    /// The `each` keyword.
    Each,
    /// The `else` keyword.
    Else,
    /// The `error` keyword.
    Error,
    /// The `false` keyword.
    False,
    /// The `if` keyword.
    If,
    /// The `in` keyword.
    In,
    /// The `is` keyword.
    Is,
    /// The `let` keyword.
    Let,
    /// The `meta` keyword.
    Meta,
    /// The `not` keyword.
    Not,
    /// The `null` keyword.
    Null,
    /// The `or` keyword.
    Or,
    /// The `otherwise` keyword.
    Otherwise,
    /// The `section` keyword.
    Section,
    /// The `shared` keyword.
    Shared,
    /// The `then` keyword.
    Then,
    /// The `true` keyword.
    True,
    /// The `try` keyword.
    Try,
    /// The `type` keyword.
    Type,
}

impl Keyword {
    /// The keywords that may begin an expression.
    pub const EXPRESSION: &'static [Keyword] = &[
        Keyword::Each,
        Keyword::Error,
        Keyword::False,
        Keyword::If,
        Keyword::Let,
        Keyword::Not,
        Keyword::Null,
        Keyword::True,
        Keyword::Try,
        Keyword::Type,
    ];

    /// The keywords that may directly follow a completed expression.
    pub const CONJUNCTION: &'static [Keyword] = &[
        Keyword::And,
        Keyword::As,
        Keyword::Is,
        Keyword::Meta,
        Keyword::Or,
    ];

    /// Gets the keyword's source text.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::And => "and",
            Self::As => "as",
            Self::Each => "each",
            Self::Else => "else",
            Self::Error => "error",
            Self::False => "false",
            Self::If => "if",
            Self::In => "in",
            Self::Is => "is",
            Self::Let => "let",
            Self::Meta => "meta",
            Self::Not => "not",
            Self::Null => "null",
            Self::Or => "or",
            Self::Otherwise => "otherwise",
            Self::Section => "section",
            Self::Shared => "shared",
            Self::Then => "then",
            Self::True => "true",
            Self::Try => "try",
            Self::Type => "type",
        }
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
