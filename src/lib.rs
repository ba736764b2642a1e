pub mod ast;
pub mod cli;
pub mod codegen;
pub mod env;
pub mod escape;
pub mod evaluator;
pub mod lexer;
pub mod parser;
pub mod registry;
pub mod template;
pub mod value;

pub use ast::{BinOp, Command, Expr, Namespace, Template, Token};
pub use codegen::compile_namespace_to_js;
pub use env::Env;
pub use evaluator::{compile_namespace, RenderError};
pub use lexer::{LexError, Lexer};
pub use parser::{ParseError, Parser};
pub use registry::{RegistrationError, Registry};
pub use template::{parse_namespace, parse_single_template};
pub use value::Value;
