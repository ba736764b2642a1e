/// Lexical tokens of the expression language.
///
/// Produced by [`crate::lexer::Lexer`] from the text inside template tags
/// (`{$x + 1}`, `{if $a and $b}`, ...). Keywords (`and`, `or`, `not`,
/// `true`, `false`, `null`) are recognized by the lexer and never appear as
/// plain identifiers.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    Integer(i64),
    Float(f64),
    Str(String),
    Boolean(bool),
    Null,

    /// Bare name: function call head or property name
    Identifier(String),
    /// `$name` variable reference
    Variable(String),

    // Arithmetic
    Plus,
    Minus,
    Star,
    Slash,
    Percent,

    // Comparison
    EqEq,
    NotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,

    // Logical keywords
    And,
    Or,
    Not,

    // Ternary
    Question,
    Colon,

    // Structure
    Dot,
    Comma,
    Pipe,
    LParen,
    RParen,
    LBracket,
    RBracket,

    Eof,
}
