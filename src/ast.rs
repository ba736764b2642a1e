//! # Stencil Template Language - Abstract Syntax Tree
//!
//! This module defines the Abstract Syntax Tree (AST) for the stencil
//! templating language. A source file declares one dotted namespace holding a
//! set of named templates; each template body is a tree of commands that
//! produce output, and commands embed expressions where values are needed.
//!
//! The AST is built once by the parsers and is read-only afterwards: both
//! backends (JavaScript emission and direct closure rendering) walk the same
//! immutable tree.
//!
//! ## Submodules
//!
//! - **[tokens]** - Lexical tokens of the expression language
//! - **[expressions]** - Expression nodes (literals, references, operators, functions)
//! - **[operators]** - Binary operators and the precedence tiers
//! - **[commands]** - Command nodes (text, print, control flow, calls) plus
//!   templates and namespaces
//!
//! ## Shape of a document
//!
//! ```text
//! {namespace shop.cart}
//!
//! {template itemList}
//!   {foreach $item in $items}
//!     {$item.title} - {$item.price}
//!   {ifempty}
//!     Nothing here.
//!   {/foreach}
//! {/template}
//! ```

pub mod commands;
pub mod expressions;
pub mod operators;
pub mod tokens;

pub use commands::{
    CallData, CallTarget, CodeBlock, Command, DirectiveArg, Namespace, ParamValue, Sub,
    SwitchCase, Template,
};
pub use expressions::{Expr, Func, LoopProp};
pub use operators::BinOp;
pub use tokens::Token;
