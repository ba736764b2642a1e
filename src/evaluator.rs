//! Closure-compilation backend: builds, once per template, a tree of
//! composed closures that render directly against an [`Env`] and an output
//! sink.
//!
//! Expression nodes compile to functions from an environment to a value;
//! command nodes compile to functions over (environment, sink, registry)
//! that perform output side effects. Composition is purely structural: a
//! code block closure calls its children in order, an `if` closure
//! dispatches to the first truthy branch, loops push one environment frame
//! per iteration.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use log::debug;

use crate::ast::{
    BinOp, CallData, CallTarget, CodeBlock, Command, DirectiveArg, Expr, Func, LoopProp,
    Namespace, ParamValue, SwitchCase, Template,
};
use crate::env::Env;
use crate::escape;
use crate::registry::{CompiledTemplate, RegistrationError, Registry};
use crate::value::Value;

/// Failures raised while rendering. Compilation itself cannot fail: every
/// name and arity problem is caught at parse time.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderError {
    /// Call to a template name not present in the registry or its
    /// prototype chain
    TemplateNotFound(String),

    /// Top-level render of a `private="true"` template
    PrivateTemplate(String),

    /// Operand or argument of the wrong type
    TypeError(String),

    /// `index`/`isFirst`/`isLast` on a variable no enclosing foreach
    /// introduced
    NoLoopMetadata(String),

    /// Division or modulo by zero
    DivisionByZero,

    /// Bad `range(...)` bounds
    BadRange(String),

    /// The caller-supplied output sink failed
    Output(fmt::Error),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::TemplateNotFound(name) => write!(f, "Template {} is not registered", name),
            RenderError::PrivateTemplate(name) => {
                write!(f, "Template {} is private and cannot be rendered directly", name)
            }
            RenderError::TypeError(msg) => write!(f, "Type error: {}", msg),
            RenderError::NoLoopMetadata(var) => {
                write!(f, "${} is not a loop variable in scope", var)
            }
            RenderError::DivisionByZero => write!(f, "Division by zero"),
            RenderError::BadRange(msg) => write!(f, "Bad range: {}", msg),
            RenderError::Output(e) => write!(f, "Output sink failed: {}", e),
        }
    }
}

impl std::error::Error for RenderError {}

impl From<fmt::Error> for RenderError {
    fn from(e: fmt::Error) -> Self {
        RenderError::Output(e)
    }
}

/// Compiled expression: environment to value.
pub(crate) type ExprFn =
    Box<dyn for<'a> Fn(&Env<'a>) -> Result<Value, RenderError> + Send + Sync>;

/// Compiled command: writes its output for one environment. The registry is
/// threaded through so `{call}` dispatches against the registry the render
/// started from, letting prototype-registered templates call overrides.
pub(crate) type CommandFn = Box<
    dyn for<'a> Fn(&Env<'a>, &mut dyn fmt::Write, &Registry) -> Result<(), RenderError>
        + Send
        + Sync,
>;

/// Box an expression closure, guiding inference toward the higher-ranked
/// environment lifetime.
fn boxed_expr<F>(f: F) -> ExprFn
where
    F: for<'a> Fn(&Env<'a>) -> Result<Value, RenderError> + Send + Sync + 'static,
{
    Box::new(f)
}

/// Box a command closure, see [`boxed_expr`].
fn boxed_command<F>(f: F) -> CommandFn
where
    F: for<'a> Fn(&Env<'a>, &mut dyn fmt::Write, &Registry) -> Result<(), RenderError>
        + Send
        + Sync
        + 'static,
{
    Box::new(f)
}

/// Compile every template of a namespace and register the results.
pub fn compile_namespace(
    namespace: &Namespace,
    registry: &Registry,
    supersede: bool,
) -> Result<(), RegistrationError> {
    debug!(
        "compiling namespace {} ({} templates)",
        namespace.name,
        namespace.templates.len()
    );
    for template in &namespace.templates {
        registry.register(compile_template(template), supersede)?;
    }
    Ok(())
}

/// Compile a single template into its registry artifact.
pub fn compile_template(template: &Template) -> CompiledTemplate {
    CompiledTemplate::new(
        template.name.clone(),
        template.private,
        compile_block(&template.code, template.autoescape),
    )
}

pub(crate) fn compile_block(block: &CodeBlock, autoescape: bool) -> CommandFn {
    let commands: Vec<CommandFn> = block
        .0
        .iter()
        .map(|command| compile_command(command, autoescape))
        .collect();
    boxed_command(move |env, out, registry| {
        for command in &commands {
            command(env, out, registry)?;
        }
        Ok(())
    })
}

fn compile_command(command: &Command, autoescape: bool) -> CommandFn {
    match command {
        Command::Text(text) => {
            let text = text.clone();
            boxed_command(move |_env, out, _registry| Ok(out.write_str(&text)?))
        }
        Command::Substitution(sub) => {
            let text = sub.as_str();
            boxed_command(move |_env, out, _registry| Ok(out.write_str(text)?))
        }
        Command::LiteralBlock(text) => {
            let text = text.clone();
            boxed_command(move |_env, out, _registry| Ok(out.write_str(&text)?))
        }
        Command::Print { expr, directives } => {
            let value_fn = compile_expr(expr);
            let mode = escape_mode(directives, autoescape);
            boxed_command(move |env, out, _registry| {
                let text = value_fn(env)?.as_string();
                let escaped = match mode {
                    EscapeMode::Id => escape::encode_id(&text),
                    EscapeMode::Uri => escape::encode_uri(&text),
                    EscapeMode::Html => escape::escape_html(&text),
                    EscapeMode::Raw => text,
                };
                Ok(out.write_str(&escaped)?)
            })
        }
        Command::If(branches) => {
            let compiled: Vec<(ExprFn, CommandFn)> = branches
                .iter()
                .map(|(cond, block)| (compile_expr(cond), compile_block(block, autoescape)))
                .collect();
            boxed_command(move |env, out, registry| {
                for (cond, block) in &compiled {
                    if cond(env)?.is_truthy() {
                        return block(env, out, registry);
                    }
                }
                Ok(())
            })
        }
        Command::Switch { expr, cases } => {
            let value_fn = compile_expr(expr);
            let mut arms: Vec<(Vec<Value>, CommandFn)> = Vec::new();
            let mut default: Option<CommandFn> = None;
            for case in cases {
                match case {
                    SwitchCase::Case { values, body } => {
                        arms.push((values.clone(), compile_block(body, autoescape)));
                    }
                    SwitchCase::Default(body) => {
                        default = Some(compile_block(body, autoescape));
                    }
                }
            }
            boxed_command(move |env, out, registry| {
                let value = value_fn(env)?;
                // first match wins; exact equality, no numeric coercion
                for (candidates, block) in &arms {
                    if candidates.iter().any(|candidate| *candidate == value) {
                        return block(env, out, registry);
                    }
                }
                if let Some(block) = &default {
                    return block(env, out, registry);
                }
                Ok(())
            })
        }
        Command::Foreach {
            var,
            expr,
            body,
            if_empty,
        } => {
            let var = var.clone();
            let seq_fn = compile_expr(expr);
            let body_fn = compile_block(body, autoescape);
            let empty_fn = if_empty
                .as_ref()
                .map(|block| compile_block(block, autoescape));
            boxed_command(move |env, out, registry| {
                let seq = seq_fn(env)?;
                if !seq.is_truthy() {
                    if let Some(empty) = &empty_fn {
                        empty(env, out, registry)?;
                    }
                    return Ok(());
                }
                let items = match seq {
                    Value::Array(items) => items,
                    other => {
                        return Err(RenderError::TypeError(format!(
                            "foreach needs an array, got {}",
                            other.type_name()
                        )))
                    }
                };
                let len = items.len();
                for (index, item) in items.into_iter().enumerate() {
                    let frame = Env::loop_iteration(env, &var, item, index, len);
                    body_fn(&frame, out, registry)?;
                }
                Ok(())
            })
        }
        Command::For { var, range, body } => {
            let var = var.clone();
            let range_fns: Vec<ExprFn> = range.iter().map(compile_expr).collect();
            let body_fn = compile_block(body, autoescape);
            boxed_command(move |env, out, registry| {
                let mut bounds = Vec::with_capacity(range_fns.len());
                for range_fn in &range_fns {
                    let value = range_fn(env)?;
                    bounds.push(value.as_int().ok_or_else(|| {
                        RenderError::BadRange(format!(
                            "range() arguments must be integers, got {}",
                            value.type_name()
                        ))
                    })?);
                }
                let (start, stop, step) = match bounds.as_slice() {
                    [stop] => (0, *stop, 1),
                    [start, stop] => (*start, *stop, 1),
                    [start, stop, step] => (*start, *stop, *step),
                    _ => return Err(RenderError::BadRange("range() takes 1 to 3 arguments".into())),
                };
                if step <= 0 {
                    return Err(RenderError::BadRange("range() step must be positive".into()));
                }
                let mut i = start;
                while i < stop {
                    let frame = Env::for_iteration(env, &var, i);
                    body_fn(&frame, out, registry)?;
                    i += step;
                }
                Ok(())
            })
        }
        Command::Call {
            target,
            data,
            params,
        } => compile_call(target, data, params, autoescape),
    }
}

enum TargetFn {
    Static(String),
    Dynamic(ExprFn),
}

enum DataFn {
    All,
    Empty,
    Expr(ExprFn),
}

enum ParamFn {
    Expr(ExprFn),
    Block(CommandFn),
}

fn compile_call(
    target: &CallTarget,
    data: &CallData,
    params: &[(String, ParamValue)],
    autoescape: bool,
) -> CommandFn {
    let target = match target {
        CallTarget::Static(name) => TargetFn::Static(name.clone()),
        CallTarget::Dynamic(expr) => TargetFn::Dynamic(compile_expr(expr)),
    };
    let data = match data {
        CallData::All => DataFn::All,
        CallData::Empty => DataFn::Empty,
        CallData::Expr(expr) => DataFn::Expr(compile_expr(expr)),
    };
    let params: Vec<(String, ParamFn)> = params
        .iter()
        .map(|(name, value)| {
            let param = match value {
                ParamValue::Expr(expr) => ParamFn::Expr(compile_expr(expr)),
                ParamValue::Block(block) => ParamFn::Block(compile_block(block, autoescape)),
            };
            (name.clone(), param)
        })
        .collect();

    boxed_command(move |env, out, registry| {
        let name = match &target {
            TargetFn::Static(name) => name.clone(),
            TargetFn::Dynamic(name_fn) => name_fn(env)?.as_string(),
        };

        // params evaluate in the caller's environment; block params render
        // into a buffered string
        let mut bindings = HashMap::new();
        for (param_name, param_fn) in &params {
            let value = match param_fn {
                ParamFn::Expr(expr_fn) => expr_fn(env)?,
                ParamFn::Block(block_fn) => {
                    let mut buffer = String::new();
                    block_fn(env, &mut buffer, registry)?;
                    Value::String(buffer)
                }
            };
            bindings.insert(param_name.clone(), value);
        }

        match &data {
            DataFn::All => {
                let callee_env = Env::call_all(env, bindings);
                registry.call_template(&name, &callee_env, out)
            }
            DataFn::Empty => {
                let callee_env = Env::call_empty(bindings);
                registry.call_template(&name, &callee_env, out)
            }
            DataFn::Expr(data_fn) => {
                let data_value = data_fn(env)?;
                let callee_env = Env::call_with_data(&data_value, bindings);
                registry.call_template(&name, &callee_env, out)
            }
        }
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EscapeMode {
    Id,
    Uri,
    Html,
    Raw,
}

/// Exactly one escaping mode per print: `id`, else `escapeUri`, else
/// `escapeHtml` or the ambient autoescape (unless `noAutoescape`), else raw.
fn escape_mode(directives: &[(String, DirectiveArg)], autoescape: bool) -> EscapeMode {
    let has = |name: &str| directives.iter().any(|(n, _)| n == name);
    if has("id") {
        EscapeMode::Id
    } else if has("escapeUri") {
        EscapeMode::Uri
    } else if has("escapeHtml") || (autoescape && !has("noAutoescape")) {
        EscapeMode::Html
    } else {
        EscapeMode::Raw
    }
}

pub(crate) fn compile_expr(expr: &Expr) -> ExprFn {
    match expr {
        Expr::Integer(n) => {
            let n = *n;
            boxed_expr(move |_env| Ok(Value::Integer(n)))
        }
        Expr::Float(n) => {
            let n = *n;
            boxed_expr(move |_env| Ok(Value::Float(n)))
        }
        Expr::Str(s) => {
            let s = s.clone();
            boxed_expr(move |_env| Ok(Value::String(s.clone())))
        }
        Expr::Boolean(b) => {
            let b = *b;
            boxed_expr(move |_env| Ok(Value::Boolean(b)))
        }
        Expr::Null => boxed_expr(|_env| Ok(Value::Null)),
        Expr::Variable(name) => {
            let name = name.clone();
            boxed_expr(move |env| Ok(env.lookup(&name).unwrap_or(Value::Null)))
        }
        Expr::DotRef { base, name } => {
            let base_fn = compile_expr(base);
            let name = name.clone();
            boxed_expr(move |env| fetch_property(&base_fn(env)?, &name))
        }
        Expr::IndexRef { base, index } => {
            let base_fn = compile_expr(base);
            let index_fn = compile_expr(index);
            boxed_expr(move |env| fetch_index(&base_fn(env)?, &index_fn(env)?))
        }
        Expr::Neg(operand) => {
            let operand_fn = compile_expr(operand);
            boxed_expr(move |env| match operand_fn(env)? {
                Value::Integer(n) => Ok(Value::Integer(-n)),
                Value::Float(n) => Ok(Value::Float(-n)),
                other => Err(RenderError::TypeError(format!(
                    "cannot negate {}",
                    other.type_name()
                ))),
            })
        }
        Expr::Not(operand) => {
            let operand_fn = compile_expr(operand);
            boxed_expr(move |env| Ok(Value::Boolean(!operand_fn(env)?.is_truthy())))
        }
        Expr::BinaryOp { op, left, right } => {
            let left_fn = compile_expr(left);
            let right_fn = compile_expr(right);
            match op {
                BinOp::And => boxed_expr(move |env| {
                    let left = left_fn(env)?;
                    if left.is_truthy() {
                        right_fn(env)
                    } else {
                        Ok(left)
                    }
                }),
                BinOp::Or => boxed_expr(move |env| {
                    let left = left_fn(env)?;
                    if left.is_truthy() {
                        Ok(left)
                    } else {
                        right_fn(env)
                    }
                }),
                op => {
                    let op = *op;
                    boxed_expr(move |env| apply_binop(op, &left_fn(env)?, &right_fn(env)?))
                }
            }
        }
        Expr::Conditional {
            cond,
            then_branch,
            else_branch,
        } => {
            let cond_fn = compile_expr(cond);
            let then_fn = compile_expr(then_branch);
            let else_fn = compile_expr(else_branch);
            boxed_expr(move |env| {
                if cond_fn(env)?.is_truthy() {
                    then_fn(env)
                } else {
                    else_fn(env)
                }
            })
        }
        Expr::HasData => boxed_expr(|env| Ok(Value::Boolean(env.has_data()))),
        Expr::LoopMeta { prop, var } => {
            let prop = *prop;
            let var = var.clone();
            boxed_expr(move |env| {
                let frame = env
                    .loop_meta(&var)
                    .ok_or_else(|| RenderError::NoLoopMetadata(var.clone()))?;
                Ok(match prop {
                    LoopProp::Index => Value::Integer(frame.index as i64 + 1),
                    LoopProp::IsFirst => Value::Boolean(frame.index == 0),
                    LoopProp::IsLast => Value::Boolean(frame.index + 1 == frame.len),
                })
            })
        }
        Expr::Funcall { func, args } => compile_funcall(*func, args),
    }
}

fn fetch_property(value: &Value, name: &str) -> Result<Value, RenderError> {
    match value {
        Value::Object(map) => Ok(map.get(name).cloned().unwrap_or(Value::Null)),
        other => Err(RenderError::TypeError(format!(
            "cannot read property '{}' of {}",
            name,
            other.type_name()
        ))),
    }
}

fn fetch_index(value: &Value, index: &Value) -> Result<Value, RenderError> {
    match value {
        Value::Array(items) => {
            let position = index.as_int().ok_or_else(|| {
                RenderError::TypeError(format!(
                    "array index must be an integer, got {}",
                    index.type_name()
                ))
            })?;
            if position < 0 {
                return Ok(Value::Null);
            }
            Ok(items.get(position as usize).cloned().unwrap_or(Value::Null))
        }
        Value::Object(map) => match index {
            Value::String(key) => Ok(map.get(key).cloned().unwrap_or(Value::Null)),
            other => Err(RenderError::TypeError(format!(
                "object key must be a string, got {}",
                other.type_name()
            ))),
        },
        other => Err(RenderError::TypeError(format!(
            "cannot index into {}",
            other.type_name()
        ))),
    }
}

fn numeric_operands(
    op: BinOp,
    a: &Value,
    b: &Value,
) -> Result<(f64, f64), RenderError> {
    match (a.as_float(), b.as_float()) {
        (Some(x), Some(y)) => Ok((x, y)),
        _ => Err(RenderError::TypeError(format!(
            "cannot apply '{}' to {} and {}",
            op.symbol(),
            a.type_name(),
            b.type_name()
        ))),
    }
}

fn apply_binop(op: BinOp, a: &Value, b: &Value) -> Result<Value, RenderError> {
    match op {
        BinOp::Add => match (a, b) {
            (Value::Integer(x), Value::Integer(y)) => Ok(Value::Integer(x + y)),
            _ => match (a.as_float(), b.as_float()) {
                (Some(x), Some(y)) => Ok(Value::Float(x + y)),
                // concatenation for anything non-numeric
                _ => Ok(Value::String(format!("{}{}", a.as_string(), b.as_string()))),
            },
        },
        BinOp::Subtract => match (a, b) {
            (Value::Integer(x), Value::Integer(y)) => Ok(Value::Integer(x - y)),
            _ => {
                let (x, y) = numeric_operands(op, a, b)?;
                Ok(Value::Float(x - y))
            }
        },
        BinOp::Multiply => match (a, b) {
            (Value::Integer(x), Value::Integer(y)) => Ok(Value::Integer(x * y)),
            _ => {
                let (x, y) = numeric_operands(op, a, b)?;
                Ok(Value::Float(x * y))
            }
        },
        BinOp::Divide => {
            let (x, y) = numeric_operands(op, a, b)?;
            if y == 0.0 {
                return Err(RenderError::DivisionByZero);
            }
            Ok(Value::Float(x / y))
        }
        BinOp::Modulo => match (a, b) {
            (Value::Integer(x), Value::Integer(y)) => {
                if *y == 0 {
                    return Err(RenderError::DivisionByZero);
                }
                Ok(Value::Integer(x % y))
            }
            _ => {
                let (x, y) = numeric_operands(op, a, b)?;
                if y == 0.0 {
                    return Err(RenderError::DivisionByZero);
                }
                Ok(Value::Float(x % y))
            }
        },
        BinOp::Equal => Ok(Value::Boolean(a.loose_eq(b))),
        BinOp::NotEqual => Ok(Value::Boolean(!a.loose_eq(b))),
        BinOp::LessThan | BinOp::GreaterThan | BinOp::LessEqual | BinOp::GreaterEqual => {
            let ordering = match (a, b) {
                (Value::String(x), Value::String(y)) => x.cmp(y),
                _ => {
                    let (x, y) = numeric_operands(op, a, b)?;
                    x.partial_cmp(&y).ok_or_else(|| {
                        RenderError::TypeError("cannot compare NaN".to_string())
                    })?
                }
            };
            Ok(Value::Boolean(match op {
                BinOp::LessThan => ordering.is_lt(),
                BinOp::GreaterThan => ordering.is_gt(),
                BinOp::LessEqual => ordering.is_le(),
                BinOp::GreaterEqual => ordering.is_ge(),
                _ => false,
            }))
        }
        // short-circuited by the compiled closures; value semantics kept
        // for completeness
        BinOp::And => Ok(if a.is_truthy() { b.clone() } else { a.clone() }),
        BinOp::Or => Ok(if a.is_truthy() { a.clone() } else { b.clone() }),
    }
}

fn compile_funcall(func: Func, args: &[Expr]) -> ExprFn {
    let compiled: Vec<ExprFn> = args.iter().map(compile_expr).collect();
    match func {
        Func::Round => boxed_expr(move |env| {
            let value = compiled[0](env)?;
            let number = require_number(func, &value)?;
            if compiled.len() == 2 {
                let digits_value = compiled[1](env)?;
                // falsy digits (absent, null, zero) mean plain rounding
                if !digits_value.is_truthy() {
                    return Ok(Value::Integer(number.round() as i64));
                }
                let digits = digits_value.as_int().ok_or_else(|| {
                    RenderError::TypeError("round() digits must be an integer".to_string())
                })?;
                let factor = 10f64.powi(digits as i32);
                Ok(Value::Float((number * factor).round() / factor))
            } else {
                Ok(Value::Integer(number.round() as i64))
            }
        }),
        Func::RandomInt => boxed_expr(move |env| {
            let value = compiled[0](env)?;
            let limit = value.as_int().filter(|n| *n > 0).ok_or_else(|| {
                RenderError::TypeError("randomInt() needs a positive integer".to_string())
            })?;
            Ok(Value::Integer(random_below(limit)))
        }),
        Func::Length => boxed_expr(move |env| {
            let value = compiled[0](env)?;
            let len = match &value {
                Value::String(s) => s.chars().count(),
                Value::Array(items) => items.len(),
                Value::Object(map) => map.len(),
                other => {
                    return Err(RenderError::TypeError(format!(
                        "length() needs a string, array or object, got {}",
                        other.type_name()
                    )))
                }
            };
            Ok(Value::Integer(len as i64))
        }),
        Func::Keys => boxed_expr(move |env| {
            let value = compiled[0](env)?;
            match value {
                Value::Object(map) => {
                    let mut keys: Vec<String> = map.keys().cloned().collect();
                    keys.sort();
                    Ok(Value::Array(keys.into_iter().map(Value::String).collect()))
                }
                other => Err(RenderError::TypeError(format!(
                    "keys() needs an object, got {}",
                    other.type_name()
                ))),
            }
        }),
        Func::Floor => boxed_expr(move |env| {
            let value = compiled[0](env)?;
            Ok(Value::Integer(require_number(func, &value)?.floor() as i64))
        }),
        Func::Ceiling => boxed_expr(move |env| {
            let value = compiled[0](env)?;
            Ok(Value::Integer(require_number(func, &value)?.ceil() as i64))
        }),
        Func::Min | Func::Max => boxed_expr(move |env| {
            let mut best: Option<(Value, f64)> = None;
            for arg in &compiled {
                let value = arg(env)?;
                let key = require_number(func, &value)?;
                let replace = match &best {
                    None => true,
                    Some((_, current)) => match func {
                        Func::Min => key < *current,
                        _ => key > *current,
                    },
                };
                if replace {
                    best = Some((value, key));
                }
            }
            best.map(|(value, _)| value).ok_or_else(|| {
                RenderError::TypeError(format!("{}() needs arguments", func.name()))
            })
        }),
    }
}

fn require_number(func: Func, value: &Value) -> Result<f64, RenderError> {
    value.as_float().ok_or_else(|| {
        RenderError::TypeError(format!(
            "{}() needs a number, got {}",
            func.name(),
            value.type_name()
        ))
    })
}

static RANDOM_TICK: AtomicU64 = AtomicU64::new(0);

/// Uniform-ish draw from `[0, limit)` without an RNG dependency: a
/// SplitMix64 scramble of the clock mixed with a process-wide tick so
/// back-to-back draws differ.
fn random_below(limit: i64) -> i64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0x9E37_79B9);
    let tick = RANDOM_TICK.fetch_add(1, Ordering::Relaxed);
    let mut z = nanos.wrapping_add(tick.wrapping_mul(0x9E37_79B9_7F4A_7C15));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^= z >> 31;
    (z % limit as u64) as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_expression_str;

    fn eval(source: &str, data: Value) -> Result<Value, RenderError> {
        let expr = parse_expression_str(source).unwrap();
        let compiled = compile_expr(&expr);
        let env = Env::from_data(&data);
        compiled(&env)
    }

    fn obj(pairs: &[(&str, Value)]) -> Value {
        let mut map = HashMap::new();
        for (k, v) in pairs {
            map.insert(k.to_string(), v.clone());
        }
        Value::Object(map)
    }

    #[test]
    fn arithmetic_keeps_integers() {
        assert_eq!(eval("(2 + 3) * 4", obj(&[])).unwrap(), Value::Integer(20));
        assert_eq!(eval("(20 - 3) % 5", obj(&[])).unwrap(), Value::Integer(2));
    }

    #[test]
    fn division_is_float() {
        assert_eq!(eval("5 / 2", obj(&[])).unwrap(), Value::Float(2.5));
        assert_eq!(eval("4 / 2", obj(&[])).unwrap(), Value::Float(2.0));
        assert_eq!(eval("1 / 0", obj(&[])), Err(RenderError::DivisionByZero));
    }

    #[test]
    fn plus_concatenates_non_numbers() {
        assert_eq!(
            eval("$x + $y", obj(&[("x", Value::String("Number: ".into())), ("y", Value::Integer(6))]))
                .unwrap(),
            Value::String("Number: 6".into())
        );
    }

    #[test]
    fn logic_returns_operands() {
        assert_eq!(
            eval("$x or 'fallback'", obj(&[])).unwrap(),
            Value::String("fallback".into())
        );
        assert_eq!(
            eval("$x and $x.y", obj(&[])).unwrap(),
            Value::Null,
            "short-circuit must skip the property access"
        );
    }

    #[test]
    fn missing_variables_are_null() {
        assert_eq!(eval("$missing", obj(&[])).unwrap(), Value::Null);
    }

    #[test]
    fn random_int_stays_in_range() {
        for _ in 0..200 {
            let value = eval("randomInt(10)", obj(&[])).unwrap();
            let Value::Integer(n) = value else {
                panic!("randomInt must produce an integer");
            };
            assert!((0..10).contains(&n));
        }
    }

    #[test]
    fn round_matches_both_backends() {
        let e = std::f64::consts::E;
        assert_eq!(
            eval("round($num)", obj(&[("num", Value::Float(e))])).unwrap(),
            Value::Integer(3)
        );
        assert_eq!(
            eval("round($num, 2)", obj(&[("num", Value::Float(e))])).unwrap(),
            Value::Float(2.72)
        );
    }
}
