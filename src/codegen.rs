//! Source-emission backend: walks the AST once and emits a JavaScript
//! module with identical rendering semantics to the closure backend.
//!
//! Per namespace the module sets up the dotted container objects, defines
//! the shared helper routines (emptiness, truthiness, escaping, rounding,
//! prototype-delegating environments - generated code has no access to a
//! runtime library, so these are inlined once per namespace), then one
//! function per template taking `($env$, $target$)`: data plus an optional
//! external accumulator array. With no accumulator the function returns the
//! joined output string.
//!
//! Conditions, `and`/`or` and ternaries route through the emitted
//! `$truthy$` helper so emitted semantics agree with the direct backend
//! (empty arrays and objects are falsy, unlike raw JavaScript).

use log::debug;

use crate::ast::{
    BinOp, CallData, CallTarget, CodeBlock, Command, DirectiveArg, Expr, Func, LoopProp,
    Namespace, ParamValue, Sub, SwitchCase, Template,
};
use crate::value::Value;

/// Compile one namespace into JavaScript module source.
pub fn compile_namespace_to_js(namespace: &Namespace) -> String {
    debug!(
        "emitting namespace {} ({} templates)",
        namespace.name,
        namespace.templates.len()
    );
    JsBackend::new(namespace.name.clone()).compile(namespace)
}

/// One emission pass. Owns the fresh-symbol counter (scoped to this pass,
/// never process-wide) and the stack of loop variables currently in
/// lexical scope.
pub struct JsBackend {
    namespace: String,
    symbols: u32,
    locals: Vec<String>,
}

impl JsBackend {
    pub fn new(namespace: String) -> Self {
        JsBackend {
            namespace,
            symbols: 0,
            locals: Vec::new(),
        }
    }

    fn fresh_symbol(&mut self) -> u32 {
        self.symbols += 1;
        self.symbols
    }

    pub fn compile(&mut self, namespace: &Namespace) -> String {
        let mut out = String::new();

        let mut prefix = String::new();
        for segment in namespace.segments() {
            if !prefix.is_empty() {
                prefix.push('.');
            }
            prefix.push_str(segment);
            out.push_str(&format!(
                "if (typeof {} == 'undefined') {{ {} = {{}}; }}\n",
                prefix, prefix
            ));
        }

        self.write_helpers(&mut out);

        for template in &namespace.templates {
            self.write_template(template, &mut out);
        }

        out
    }

    fn write_helpers(&self, out: &mut String) {
        let ns = &self.namespace;

        out.push_str(&format!("\n{}.$isEmpty$ = function(obj) {{\n", ns));
        out.push_str("    for (var prop in obj) if (obj.hasOwnProperty(prop)) return false;\n");
        out.push_str("    return true;\n};\n");

        out.push_str(&format!("\n{}.$truthy$ = function(val) {{\n", ns));
        out.push_str("    if (val == null) return false;\n");
        out.push_str(&format!(
            "    if (typeof val == 'object') return !{}.$isEmpty$(val);\n",
            ns
        ));
        out.push_str("    return !!val;\n};\n");

        out.push_str(&format!("\n{}.$hasData$ = function(env) {{\n", ns));
        out.push_str("    if (!env) return false;\n");
        out.push_str("    var root = env;\n");
        out.push_str("    var proto = Object.getPrototypeOf(root);\n");
        out.push_str("    while (proto && proto !== Object.prototype) {\n");
        out.push_str("        root = proto;\n");
        out.push_str("        proto = Object.getPrototypeOf(root);\n");
        out.push_str("    }\n");
        out.push_str(&format!("    return !{}.$isEmpty$(root);\n}};\n", ns));

        out.push_str(&format!("\n{}.$escapeHTML$ = function(obj) {{\n", ns));
        out.push_str("    if (typeof obj == 'string') return String(obj)");
        out.push_str(".split(\"&\").join(\"&amp;\")");
        out.push_str(".split(\"<\").join(\"&lt;\")");
        out.push_str(".split(\">\").join(\"&gt;\")");
        out.push_str(".split(\"\\\"\").join(\"&quot;\")");
        out.push_str(".split(\"'\").join(\"&#039;\");\n");
        out.push_str("    else return obj;\n};\n");

        out.push_str(&format!("\n{}.$encode$ = function(text, safe) {{\n", ns));
        out.push_str("    var result = '';\n");
        out.push_str("    var i = 0;\n");
        out.push_str("    while (i < text.length) {\n");
        out.push_str("        var ch = text.charAt(i);\n");
        out.push_str("        var width = 1;\n");
        out.push_str(
            "        if (ch >= '\\uD800' && ch <= '\\uDBFF' && i + 1 < text.length) {\n",
        );
        out.push_str("            ch = text.substr(i, 2);\n");
        out.push_str("            width = 2;\n");
        out.push_str("        }\n");
        out.push_str("        if (/^[A-Za-z0-9]$/.test(ch) || safe.indexOf(ch) >= 0) {\n");
        out.push_str("            result += ch;\n");
        out.push_str("        } else {\n");
        out.push_str("            var encoded = encodeURIComponent(ch);\n");
        out.push_str("            if (encoded.charAt(0) == '%') {\n");
        out.push_str("                result += encoded.toUpperCase();\n");
        out.push_str("            } else {\n");
        out.push_str("                var code = ch.charCodeAt(0);\n");
        out.push_str(
            "                result += '%' + (code < 16 ? '0' : '') + code.toString(16).toUpperCase();\n",
        );
        out.push_str("            }\n");
        out.push_str("        }\n");
        out.push_str("        i += width;\n");
        out.push_str("    }\n");
        out.push_str("    return result;\n};\n");

        out.push_str(&format!(
            "\n{}.$encodeURI$ = function(obj) {{ return {}.$encode$(String(obj), \"~!@#$&*()=:/,;?+'\"); }};\n",
            ns, ns
        ));
        out.push_str(&format!(
            "{}.$encodeId$ = function(obj) {{ return {}.$encode$(String(obj), \"~!*()'\"); }};\n",
            ns, ns
        ));

        out.push_str(&format!("\n{}.$round$ = function(number, ndigits) {{\n", ns));
        out.push_str("    if (ndigits) {\n");
        out.push_str("        var factor = Math.pow(10.0, ndigits);\n");
        out.push_str("        return Math.round(number * factor) / factor;\n");
        out.push_str("    }\n");
        out.push_str("    else return Math.round(number);\n};\n");

        out.push_str(&format!(
            "\n{}.$objectFromPrototype$ = function(obj) {{\n",
            ns
        ));
        out.push_str("    function C () {}\n");
        out.push_str("    C.prototype = obj;\n");
        out.push_str("    return new C;\n};\n");
    }

    fn write_template(&mut self, template: &Template, out: &mut String) {
        out.push_str(&format!(
            "\n{}.{} = function($env$, $target$) {{\n",
            self.namespace, template.name
        ));
        write_indent(1, out);
        out.push_str("if (!$env$) { $env$ = {}; }\n");
        write_indent(1, out);
        out.push_str("var $result$ = $target$ || [];\n\n");

        self.write_block(&template.code, template.autoescape, 1, out);

        out.push('\n');
        write_indent(1, out);
        out.push_str("if (!$target$) return $result$.join(\"\");\n");
        write_indent(1, out);
        out.push_str("else return null;\n");
        out.push_str("};\n");
    }

    fn write_block(
        &mut self,
        block: &CodeBlock,
        autoescape: bool,
        indent: usize,
        out: &mut String,
    ) {
        for command in &block.0 {
            self.write_command(command, autoescape, indent, out);
        }
    }

    fn write_command(
        &mut self,
        command: &Command,
        autoescape: bool,
        indent: usize,
        out: &mut String,
    ) {
        match command {
            Command::Text(text) => self.write_push(&js_string(text), indent, out),
            Command::Substitution(sub) => {
                if *sub != Sub::Nil {
                    self.write_push(&js_string(sub.as_str()), indent, out);
                }
            }
            Command::LiteralBlock(text) => self.write_push(&js_string(text), indent, out),
            Command::Print { expr, directives } => {
                self.write_print(expr, directives, autoescape, indent, out)
            }
            Command::If(branches) => self.write_if(branches, autoescape, indent, out),
            Command::Switch { expr, cases } => {
                self.write_switch(expr, cases, autoescape, indent, out)
            }
            Command::Foreach {
                var,
                expr,
                body,
                if_empty,
            } => self.write_foreach(var, expr, body, if_empty.as_ref(), autoescape, indent, out),
            Command::For { var, range, body } => {
                self.write_for(var, range, body, autoescape, indent, out)
            }
            Command::Call {
                target,
                data,
                params,
            } => self.write_call(target, data, params, autoescape, indent, out),
        }
    }

    fn write_push(&self, value: &str, indent: usize, out: &mut String) {
        write_indent(indent, out);
        out.push_str("$result$.push(");
        out.push_str(value);
        out.push_str(");\n");
    }

    fn write_print(
        &mut self,
        expr: &Expr,
        directives: &[(String, DirectiveArg)],
        autoescape: bool,
        indent: usize,
        out: &mut String,
    ) {
        let has = |name: &str| directives.iter().any(|(n, _)| n == name);

        write_indent(indent, out);
        out.push_str("$result$.push(");
        if has("id") {
            out.push_str(&format!("{}.$encodeId$(", self.namespace));
            self.write_expr(expr, out);
            out.push(')');
        } else if has("escapeUri") {
            out.push_str(&format!("{}.$encodeURI$(", self.namespace));
            self.write_expr(expr, out);
            out.push(')');
        } else if has("escapeHtml") || (autoescape && !has("noAutoescape")) {
            out.push_str(&format!("{}.$escapeHTML$(", self.namespace));
            self.write_expr(expr, out);
            out.push(')');
        } else {
            self.write_expr(expr, out);
        }
        out.push_str(");\n");
    }

    fn write_if(
        &mut self,
        branches: &[(Expr, CodeBlock)],
        autoescape: bool,
        indent: usize,
        out: &mut String,
    ) {
        for (i, (cond, block)) in branches.iter().enumerate() {
            write_indent(indent, out);
            if i == 0 {
                out.push_str("if (");
                self.write_truthy(cond, out);
                out.push(')');
            } else if *cond == Expr::Boolean(true) {
                out.push_str("else");
            } else {
                out.push_str("else if (");
                self.write_truthy(cond, out);
                out.push(')');
            }
            out.push_str(" {\n");
            self.write_block(block, autoescape, indent + 1, out);
            write_indent(indent, out);
            out.push_str("}\n");
        }
    }

    fn write_switch(
        &mut self,
        expr: &Expr,
        cases: &[SwitchCase],
        autoescape: bool,
        indent: usize,
        out: &mut String,
    ) {
        write_indent(indent, out);
        out.push_str("switch (");
        self.write_expr(expr, out);
        out.push_str(") {\n");

        for case in cases {
            match case {
                SwitchCase::Case { values, body } => {
                    for value in values {
                        write_indent(indent + 1, out);
                        out.push_str("case ");
                        out.push_str(&js_value(value));
                        out.push_str(":\n");
                    }
                    self.write_block(body, autoescape, indent + 2, out);
                    write_indent(indent + 2, out);
                    out.push_str("break;\n");
                }
                SwitchCase::Default(body) => {
                    write_indent(indent + 1, out);
                    out.push_str("default:\n");
                    self.write_block(body, autoescape, indent + 2, out);
                    write_indent(indent + 2, out);
                    out.push_str("break;\n");
                }
            }
        }

        write_indent(indent, out);
        out.push_str("}\n");
    }

    fn write_foreach(
        &mut self,
        var: &str,
        expr: &Expr,
        body: &CodeBlock,
        if_empty: Option<&CodeBlock>,
        autoescape: bool,
        indent: usize,
        out: &mut String,
    ) {
        let seq = format!("$sequence_{}$", var);
        let counter = format!("$counter_{}$", var);

        write_indent(indent, out);
        out.push_str(&format!("var {} = ", seq));
        self.write_expr(expr, out);
        out.push_str(";\n");

        write_indent(indent, out);
        out.push_str(&format!("if (!{}.$isEmpty$({})) {{\n", self.namespace, seq));

        write_indent(indent + 1, out);
        out.push_str(&format!(
            "for (var {} = 0; {} < {}.length; ++{}) {{\n",
            counter, counter, seq, counter
        ));

        write_indent(indent + 2, out);
        out.push_str(&format!("var {} = {}[{}];\n", var, seq, counter));

        self.locals.push(var.to_string());
        self.write_block(body, autoescape, indent + 2, out);
        self.locals.pop();

        write_indent(indent + 1, out);
        out.push_str("}\n");
        write_indent(indent, out);
        out.push_str("}\n");

        if let Some(empty) = if_empty {
            write_indent(indent, out);
            out.push_str("else {\n");
            self.write_block(empty, autoescape, indent + 1, out);
            write_indent(indent, out);
            out.push_str("}\n");
        }
    }

    fn write_for(
        &mut self,
        var: &str,
        range: &[Expr],
        body: &CodeBlock,
        autoescape: bool,
        indent: usize,
        out: &mut String,
    ) {
        write_indent(indent, out);
        match range {
            [stop] => {
                out.push_str(&format!("for (var {} = 0; {} < ", var, var));
                self.write_expr(stop, out);
                out.push_str(&format!("; ++{}) {{\n", var));
            }
            [start, stop] => {
                out.push_str(&format!("for (var {} = ", var));
                self.write_expr(start, out);
                out.push_str(&format!("; {} < ", var));
                self.write_expr(stop, out);
                out.push_str(&format!("; ++{}) {{\n", var));
            }
            [start, stop, step] => {
                out.push_str(&format!("for (var {} = ", var));
                self.write_expr(start, out);
                out.push_str(&format!("; {} < ", var));
                self.write_expr(stop, out);
                out.push_str(&format!("; {} += ", var));
                self.write_expr(step, out);
                out.push_str(") {\n");
            }
            _ => {}
        }

        self.locals.push(var.to_string());
        self.write_block(body, autoescape, indent + 1, out);
        self.locals.pop();

        write_indent(indent, out);
        out.push_str("}\n");
    }

    fn write_call(
        &mut self,
        target: &CallTarget,
        data: &CallData,
        params: &[(String, ParamValue)],
        autoescape: bool,
        indent: usize,
        out: &mut String,
    ) {
        if params.is_empty() {
            write_indent(indent, out);
            self.write_call_target(target, out);
            out.push('(');
            match data {
                CallData::All => out.push_str("$env$"),
                CallData::Empty => out.push_str("{}"),
                CallData::Expr(expr) => self.write_expr(expr, out),
            }
            out.push_str(", $result$);\n");
            return;
        }

        let env_name = format!("$env_{}$", self.fresh_symbol());

        write_indent(indent, out);
        out.push_str(&format!("var {} = ", env_name));
        match data {
            CallData::All => {
                out.push_str(&format!("{}.$objectFromPrototype$($env$)", self.namespace))
            }
            // delegate from an empty object so $hasData$ still sees an
            // empty root after params are assigned
            CallData::Empty => {
                out.push_str(&format!("{}.$objectFromPrototype$({{}})", self.namespace))
            }
            CallData::Expr(expr) => {
                out.push_str(&format!("{}.$objectFromPrototype$(", self.namespace));
                self.write_expr(expr, out);
                out.push(')');
            }
        }
        out.push_str(";\n");

        for (name, value) in params {
            match value {
                ParamValue::Expr(expr) => {
                    write_indent(indent, out);
                    out.push_str(&format!("{}.{} = ", env_name, name));
                    self.write_expr(expr, out);
                    out.push_str(";\n");
                }
                ParamValue::Block(block) => {
                    write_indent(indent, out);
                    out.push_str(&format!("{}.{} = function () {{\n", env_name, name));
                    write_indent(indent + 1, out);
                    out.push_str("var $result$ = [];\n");
                    self.write_block(block, autoescape, indent + 1, out);
                    write_indent(indent + 1, out);
                    out.push_str("return $result$.join(\"\");\n");
                    write_indent(indent, out);
                    out.push_str("}();\n");
                }
            }
        }

        write_indent(indent, out);
        self.write_call_target(target, out);
        out.push_str(&format!("({}, $result$);\n", env_name));
    }

    fn write_call_target(&self, target: &CallTarget, out: &mut String) {
        match target {
            CallTarget::Static(name) => {
                out.push_str(&format!("{}.{}", self.namespace, name));
            }
            CallTarget::Dynamic(expr) => {
                out.push_str(&self.namespace);
                out.push('[');
                self.write_expr(expr, out);
                out.push(']');
            }
        }
    }

    fn write_truthy(&self, expr: &Expr, out: &mut String) {
        out.push_str(&format!("{}.$truthy$(", self.namespace));
        self.write_expr(expr, out);
        out.push(')');
    }

    fn write_expr(&self, expr: &Expr, out: &mut String) {
        match expr {
            Expr::Integer(n) => out.push_str(&n.to_string()),
            Expr::Float(n) => out.push_str(&n.to_string()),
            Expr::Str(s) => out.push_str(&js_string(s)),
            Expr::Boolean(b) => out.push_str(if *b { "true" } else { "false" }),
            Expr::Null => out.push_str("null"),
            Expr::Variable(name) => {
                if !self.locals.contains(name) {
                    out.push_str("$env$.");
                }
                out.push_str(name);
            }
            Expr::DotRef { base, name } => {
                self.write_expr(base, out);
                out.push('.');
                out.push_str(name);
            }
            Expr::IndexRef { base, index } => {
                self.write_expr(base, out);
                out.push('[');
                self.write_expr(index, out);
                out.push(']');
            }
            Expr::Neg(operand) => {
                out.push('-');
                self.write_expr(operand, out);
            }
            Expr::Not(operand) => {
                out.push('!');
                self.write_truthy(operand, out);
            }
            Expr::BinaryOp { op, left, right } => match op {
                BinOp::And => {
                    out.push('(');
                    self.write_truthy(left, out);
                    out.push_str(" ? ");
                    self.write_expr(right, out);
                    out.push_str(" : ");
                    self.write_expr(left, out);
                    out.push(')');
                }
                BinOp::Or => {
                    out.push('(');
                    self.write_truthy(left, out);
                    out.push_str(" ? ");
                    self.write_expr(left, out);
                    out.push_str(" : ");
                    self.write_expr(right, out);
                    out.push(')');
                }
                op => {
                    out.push('(');
                    self.write_expr(left, out);
                    out.push_str(&format!(" {} ", op.symbol()));
                    self.write_expr(right, out);
                    out.push(')');
                }
            },
            Expr::Conditional {
                cond,
                then_branch,
                else_branch,
            } => {
                out.push('(');
                self.write_truthy(cond, out);
                out.push_str(" ? ");
                self.write_expr(then_branch, out);
                out.push_str(" : ");
                self.write_expr(else_branch, out);
                out.push(')');
            }
            Expr::HasData => {
                out.push_str(&format!("{}.$hasData$($env$)", self.namespace));
            }
            Expr::LoopMeta { prop, var } => match prop {
                LoopProp::Index => out.push_str(&format!("($counter_{}$ + 1)", var)),
                LoopProp::IsFirst => out.push_str(&format!("($counter_{}$ == 0)", var)),
                LoopProp::IsLast => out.push_str(&format!(
                    "($counter_{}$ == ($sequence_{}$.length - 1))",
                    var, var
                )),
            },
            Expr::Funcall { func, args } => self.write_funcall(*func, args, out),
        }
    }

    fn write_funcall(&self, func: Func, args: &[Expr], out: &mut String) {
        match func {
            Func::Round => {
                out.push_str(&format!("{}.$round$(", self.namespace));
                self.write_args(args, out);
                out.push(')');
            }
            Func::RandomInt => {
                out.push_str("Math.floor(Math.random() * (");
                self.write_args(args, out);
                out.push_str("))");
            }
            Func::Length => {
                out.push('(');
                self.write_args(args, out);
                out.push_str(").length");
            }
            Func::Keys => {
                out.push_str("Object.keys(");
                self.write_args(args, out);
                out.push(')');
            }
            Func::Floor => {
                out.push_str("Math.floor(");
                self.write_args(args, out);
                out.push(')');
            }
            Func::Ceiling => {
                out.push_str("Math.ceil(");
                self.write_args(args, out);
                out.push(')');
            }
            Func::Min => {
                out.push_str("Math.min(");
                self.write_args(args, out);
                out.push(')');
            }
            Func::Max => {
                out.push_str("Math.max(");
                self.write_args(args, out);
                out.push(')');
            }
        }
    }

    fn write_args(&self, args: &[Expr], out: &mut String) {
        for (i, arg) in args.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            self.write_expr(arg, out);
        }
    }
}

fn write_indent(level: usize, out: &mut String) {
    for _ in 0..level {
        out.push_str("    ");
    }
}

/// JavaScript string literal via JSON escaping.
fn js_string(text: &str) -> String {
    serde_json::Value::String(text.to_string()).to_string()
}

/// A switch case value as a JavaScript literal.
fn js_value(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Boolean(b) => b.to_string(),
        Value::Integer(n) => n.to_string(),
        Value::Float(n) => n.to_string(),
        Value::String(s) => js_string(s),
        // switch cases hold literals only; these cannot be parsed
        Value::Array(_) | Value::Object(_) => "null".to_string(),
    }
}
