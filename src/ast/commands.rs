use crate::ast::Expr;
use crate::value::Value;

/// An ordered sequence of commands forming one block of template body.
///
/// Whitespace handling is applied once, at parse time: leading and trailing
/// text of the block is trimmed, and text next to a substitution code is
/// trimmed on the adjacent side only. Empty text pieces are dropped.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CodeBlock(pub Vec<Command>);

/// A single output-producing command in a template body.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Plain text; runs of whitespace are collapsed to a single space at
    /// parse time
    Text(String),

    /// Whitespace / brace substitution code (`{sp}`, `{nil}`, `{\n}`, ...)
    Substitution(Sub),

    /// `{literal}...{/literal}` - verbatim text, never re-parsed
    LiteralBlock(String),

    /// `{expr ...}` or `{print expr ...}` with pipe-separated directives
    Print {
        expr: Expr,
        directives: Vec<(String, DirectiveArg)>,
    },

    /// `{if}/{elseif}/{else}` chain. Each entry is a guarded block; a
    /// trailing `{else}` is stored with a `true` literal guard.
    If(Vec<(Expr, CodeBlock)>),

    /// `{switch}` with its ordered cases
    Switch { expr: Expr, cases: Vec<SwitchCase> },

    /// `{foreach $var in expr}` with optional `{ifempty}` block
    Foreach {
        var: String,
        expr: Expr,
        body: CodeBlock,
        if_empty: Option<CodeBlock>,
    },

    /// `{for $var in range(a[,b[,c]])}`
    For {
        var: String,
        range: Vec<Expr>,
        body: CodeBlock,
    },

    /// `{call ...}` - invoke another template
    Call {
        target: CallTarget,
        data: CallData,
        params: Vec<(String, ParamValue)>,
    },
}

/// Substitution codes usable in template bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sub {
    /// `{sp}` - a single space
    Space,
    /// `{nil}` - nothing; exists to cut whitespace around it
    Nil,
    /// `{\r}`
    CarriageReturn,
    /// `{\n}`
    Newline,
    /// `{\t}`
    Tab,
    /// `{lb}` - a literal `{`
    LeftBrace,
    /// `{rb}` - a literal `}`
    RightBrace,
}

impl Sub {
    /// The text this code produces.
    pub fn as_str(&self) -> &'static str {
        match self {
            Sub::Space => " ",
            Sub::Nil => "",
            Sub::CarriageReturn => "\r",
            Sub::Newline => "\n",
            Sub::Tab => "\t",
            Sub::LeftBrace => "{",
            Sub::RightBrace => "}",
        }
    }
}

/// Argument of a print directive: a bare flag or a literal value.
#[derive(Debug, Clone, PartialEq)]
pub enum DirectiveArg {
    Flag,
    Literal(Value),
}

/// One arm of a `{switch}`.
#[derive(Debug, Clone, PartialEq)]
pub enum SwitchCase {
    /// `{case v1, v2, ...}` - literal values, matched by exact equality
    Case { values: Vec<Value>, body: CodeBlock },
    /// `{default}`
    Default(CodeBlock),
}

/// Callee of a `{call}`: a static template name or an expression resolved
/// at render time.
#[derive(Debug, Clone, PartialEq)]
pub enum CallTarget {
    Static(String),
    Dynamic(Expr),
}

/// The `data` attribute of a `{call}`.
#[derive(Debug, Clone, PartialEq)]
pub enum CallData {
    /// `data="all"` - the callee sees the whole caller environment
    All,
    /// No `data` attribute - the callee starts from an empty environment
    Empty,
    /// `data="expr"` - the evaluated value becomes the callee's base
    /// environment
    Expr(Expr),
}

/// A `{param}` value: an inline expression or a rendered block.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Expr(Expr),
    Block(CodeBlock),
}

/// A named template: one compiled artifact per template.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub name: String,
    /// HTML-escape printed values unless a directive overrides it.
    /// Defaults to true.
    pub autoescape: bool,
    /// Not renderable through the registry's public entry points.
    pub private: bool,
    pub code: CodeBlock,
}

/// A parsed source file: a dotted namespace name and its templates.
#[derive(Debug, Clone, PartialEq)]
pub struct Namespace {
    pub name: String,
    pub templates: Vec<Template>,
}

impl Namespace {
    /// The dot-separated segments of the namespace name.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.name.split('.')
    }
}
