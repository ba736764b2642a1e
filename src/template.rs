//! Command grammar: parses template markup into the command AST.
//!
//! The body of a template is a sequence of plain text, comments,
//! substitution codes, `{literal}` blocks, print tags and control tags.
//! Expressions inside tags are handed to [`crate::parser::Parser`]; this
//! module owns the markup layer: tag recognition, attribute syntax,
//! whitespace collapsing and the parse-time trimming rules.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::ast::{
    CallData, CallTarget, CodeBlock, Command, Expr, Namespace, ParamValue, Sub, SwitchCase,
    Template,
};
use crate::lexer::Lexer;
use crate::parser::{ParseError, Parser};
use crate::value::Value;

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace pattern"));

/// Tags that close or continue an enclosing construct; a code block never
/// consumes them.
const CONTINUATION_WORDS: &[&str] = &["elseif", "else", "case", "default", "ifempty", "param"];

/// Parse a whole source file: one `{namespace a.b.c}` declaration followed
/// by its templates.
pub fn parse_namespace(source: &str) -> Result<Namespace, ParseError> {
    let mut parser = TemplateParser::new(source);
    parser.parse_namespace()
}

/// Parse a single `{template ...}...{/template}` without a surrounding
/// namespace.
pub fn parse_single_template(source: &str) -> Result<Template, ParseError> {
    let mut parser = TemplateParser::new(source);
    parser.skip_trivia()?;
    let template = parser.parse_template()?;
    parser.skip_trivia()?;
    if !parser.at_end() {
        return Err(parser.error("unexpected input after {/template}"));
    }
    Ok(template)
}

pub struct TemplateParser {
    chars: Vec<char>,
    pos: usize,
}

impl TemplateParser {
    pub fn new(source: &str) -> Self {
        TemplateParser {
            chars: source.chars().collect(),
            pos: 0,
        }
    }

    fn current(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn error(&self, message: &str) -> ParseError {
        ParseError::Syntax {
            message: message.to_string(),
            position: self.pos,
        }
    }

    fn region_starts_with(&self, at: usize, text: &str) -> bool {
        let mut i = at;
        for ch in text.chars() {
            if self.chars.get(i) != Some(&ch) {
                return false;
            }
            i += 1;
        }
        true
    }

    fn starts_with(&self, text: &str) -> bool {
        self.region_starts_with(self.pos, text)
    }

    fn consume_str(&mut self, text: &str) -> bool {
        if self.starts_with(text) {
            self.pos += text.chars().count();
            true
        } else {
            false
        }
    }

    fn expect_str(&mut self, text: &str) -> Result<(), ParseError> {
        if self.consume_str(text) {
            Ok(())
        } else {
            Err(self.error(&format!("expected {}", text)))
        }
    }

    fn skip_whitespace(&mut self) {
        while self.current().is_some_and(|c| c.is_whitespace()) {
            self.advance();
        }
    }

    fn skip_line_comment(&mut self) {
        while let Some(ch) = self.current() {
            if ch == '\n' {
                break;
            }
            self.advance();
        }
    }

    fn skip_block_comment(&mut self) -> Result<(), ParseError> {
        let start = self.pos;
        self.pos += 2; // the "/*"
        while !self.at_end() {
            if self.starts_with("*/") {
                self.pos += 2;
                return Ok(());
            }
            self.advance();
        }
        self.pos = start;
        Err(self.error("unterminated /* comment"))
    }

    /// Skip whitespace and comments between declarations.
    fn skip_trivia(&mut self) -> Result<(), ParseError> {
        loop {
            self.skip_whitespace();
            if self.starts_with("//") {
                self.skip_line_comment();
            } else if self.starts_with("/*") {
                self.skip_block_comment()?;
            } else {
                return Ok(());
            }
        }
    }

    /// A name: a letter followed by letters, digits or underscores.
    fn read_simple_name(&mut self) -> Result<String, ParseError> {
        if !self.current().is_some_and(|c| c.is_alphabetic()) {
            return Err(self.error("expected a name"));
        }
        let mut name = String::new();
        while let Some(ch) = self.current() {
            if ch.is_alphanumeric() || ch == '_' {
                name.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        Ok(name)
    }

    fn read_dotted_name(&mut self) -> Result<String, ParseError> {
        let mut name = self.read_simple_name()?;
        while self.current() == Some('.') {
            self.advance();
            name.push('.');
            name.push_str(&self.read_simple_name()?);
        }
        Ok(name)
    }

    /// Read tag content up to the closing `}` and consume it. Quoted
    /// sections (either quote kind) may contain `}` freely.
    fn read_tag_body(&mut self) -> Result<String, ParseError> {
        let (body, self_closing) = self.read_tag_body_with_close()?;
        if self_closing {
            return Err(self.error("this tag cannot be self-closing"));
        }
        Ok(body)
    }

    /// Like [`read_tag_body`], also reporting whether the tag ended in `/}`.
    fn read_tag_body_with_close(&mut self) -> Result<(String, bool), ParseError> {
        let start = self.pos;
        let mut body = String::new();
        let mut quote: Option<char> = None;

        loop {
            let Some(ch) = self.current() else {
                self.pos = start;
                return Err(self.error("unclosed tag"));
            };
            match quote {
                Some(q) => {
                    body.push(ch);
                    self.advance();
                    if ch == '\\' {
                        if let Some(escaped) = self.current() {
                            body.push(escaped);
                            self.advance();
                        }
                    } else if ch == q {
                        quote = None;
                    }
                }
                None => match ch {
                    '}' => {
                        self.advance();
                        break;
                    }
                    '\'' | '"' => {
                        quote = Some(ch);
                        body.push(ch);
                        self.advance();
                    }
                    _ => {
                        body.push(ch);
                        self.advance();
                    }
                },
            }
        }

        let trimmed = body.trim_end();
        if let Some(stripped) = trimmed.strip_suffix('/') {
            Ok((stripped.to_string(), true))
        } else {
            Ok((body, false))
        }
    }

    fn parse_full_expression(&self, body: &str) -> Result<Expr, ParseError> {
        let mut parser = Parser::new(Lexer::new(body))?;
        parser.parse()
    }

    /// `{namespace a.b.c}` followed by templates, with comments allowed
    /// in between.
    pub fn parse_namespace(&mut self) -> Result<Namespace, ParseError> {
        self.skip_trivia()?;
        self.expect_str("{namespace")?;
        self.skip_whitespace();
        let name = self.read_dotted_name()?;
        self.skip_whitespace();
        self.expect_str("}")?;

        let mut templates = Vec::new();
        loop {
            self.skip_trivia()?;
            if self.at_end() {
                break;
            }
            if self.starts_with("{template") {
                templates.push(self.parse_template()?);
            } else {
                return Err(self.error("expected {template ...}"));
            }
        }

        Ok(Namespace { name, templates })
    }

    /// `{template name [autoescape="..."] [private="..."]}body{/template}`
    pub fn parse_template(&mut self) -> Result<Template, ParseError> {
        self.expect_str("{template")?;
        self.skip_whitespace();
        let name = self.read_simple_name()?;

        let mut autoescape = true;
        let mut private = false;
        loop {
            self.skip_whitespace();
            if self.consume_str("}") {
                break;
            }
            if self.consume_str("autoescape=\"") {
                autoescape = self.read_quoted_bool()?;
            } else if self.consume_str("private=\"") {
                private = self.read_quoted_bool()?;
            } else {
                return Err(self.error("expected autoescape=\"...\", private=\"...\" or '}'"));
            }
        }

        let code = self.parse_code_block()?;
        self.expect_str("{/template}")?;

        Ok(Template {
            name,
            autoescape,
            private,
            code,
        })
    }

    fn read_quoted_bool(&mut self) -> Result<bool, ParseError> {
        let value = if self.consume_str("true") {
            true
        } else if self.consume_str("false") {
            false
        } else {
            return Err(self.error("expected \"true\" or \"false\""));
        };
        self.expect_str("\"")?;
        Ok(value)
    }

    /// Parse commands until a continuation or closing tag. Trimming rules
    /// are applied to the collected items before returning.
    fn parse_code_block(&mut self) -> Result<CodeBlock, ParseError> {
        let mut items: Vec<Command> = Vec::new();

        loop {
            if self.at_end() {
                break;
            }
            match self.current() {
                Some('{') => {
                    if self.at_continuation_tag() {
                        break;
                    }
                    if let Some(sub) = self.try_substitution() {
                        items.push(Command::Substitution(sub));
                        continue;
                    }
                    if self.starts_with("{literal}") {
                        items.push(self.parse_literal_block()?);
                        continue;
                    }
                    let word = self.peek_tag_word();
                    match word.as_str() {
                        "if" => items.push(self.parse_if()?),
                        "switch" => items.push(self.parse_switch()?),
                        "foreach" => items.push(self.parse_foreach()?),
                        "for" => items.push(self.parse_for()?),
                        "call" => items.push(self.parse_call()?),
                        "template" | "namespace" => {
                            return Err(self.error(&format!(
                                "{{{}}} cannot appear inside a template body",
                                word
                            )))
                        }
                        "print" => items.push(self.parse_print(true)?),
                        _ => items.push(self.parse_print(false)?),
                    }
                }
                Some('}') => return Err(self.error("unexpected '}' in template body")),
                _ => {
                    if self.starts_with("//") {
                        self.skip_line_comment();
                        continue;
                    }
                    if self.starts_with("/*") {
                        self.skip_block_comment()?;
                        continue;
                    }
                    let text = self.read_text_run()?;
                    if !text.is_empty() {
                        items.push(Command::Text(text));
                    }
                }
            }
        }

        Ok(trim_code_block(items))
    }

    /// True when the cursor sits on a tag the current block does not own:
    /// any `{/...}` closer, or a continuation like `{else}` or `{case ...}`.
    fn at_continuation_tag(&self) -> bool {
        if self.region_starts_with(self.pos + 1, "/") {
            return true;
        }
        let word = self.peek_tag_word();
        CONTINUATION_WORDS.contains(&word.as_str())
    }

    /// The identifier directly after `{`, without consuming anything.
    fn peek_tag_word(&self) -> String {
        let mut word = String::new();
        let mut i = self.pos + 1;
        while let Some(ch) = self.chars.get(i) {
            if ch.is_alphanumeric() || *ch == '_' {
                word.push(*ch);
                i += 1;
            } else {
                break;
            }
        }
        word
    }

    fn try_substitution(&mut self) -> Option<Sub> {
        const SUBS: &[(&str, Sub)] = &[
            ("{sp}", Sub::Space),
            ("{nil}", Sub::Nil),
            (r"{\r}", Sub::CarriageReturn),
            (r"{\n}", Sub::Newline),
            (r"{\t}", Sub::Tab),
            ("{lb}", Sub::LeftBrace),
            ("{rb}", Sub::RightBrace),
        ];
        for (code, sub) in SUBS {
            if self.consume_str(code) {
                return Some(*sub);
            }
        }
        None
    }

    /// Plain text up to the next tag. Runs of whitespace collapse to one
    /// space; a comment preceded by whitespace is dropped together with
    /// that whitespace.
    fn read_text_run(&mut self) -> Result<String, ParseError> {
        let mut raw = String::new();

        while let Some(ch) = self.current() {
            if ch == '{' || ch == '}' {
                break;
            }
            if ch.is_whitespace() {
                let mut j = self.pos;
                while self.chars.get(j).is_some_and(|c| c.is_whitespace()) {
                    j += 1;
                }
                if self.region_starts_with(j, "//") {
                    self.pos = j;
                    self.skip_line_comment();
                    continue;
                }
                if self.region_starts_with(j, "/*") {
                    self.pos = j;
                    self.skip_block_comment()?;
                    continue;
                }
            }
            raw.push(ch);
            self.advance();
        }

        Ok(WHITESPACE_RUN.replace_all(&raw, " ").into_owned())
    }

    fn parse_literal_block(&mut self) -> Result<Command, ParseError> {
        self.expect_str("{literal}")?;
        let start = self.pos;
        while !self.at_end() && !self.starts_with("{/literal}") {
            self.advance();
        }
        if self.at_end() {
            return Err(self.error("unclosed {literal}"));
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        self.expect_str("{/literal}")?;
        Ok(Command::LiteralBlock(text))
    }

    fn parse_print(&mut self, explicit: bool) -> Result<Command, ParseError> {
        self.advance(); // the '{'
        if explicit {
            self.expect_str("print")?;
        }
        let body = self.read_tag_body()?;

        let mut parser = Parser::new(Lexer::new(&body))?;
        let expr = parser.parse_expression()?;
        let directives = parser.parse_directives()?;
        parser.expect_eof()?;

        Ok(Command::Print { expr, directives })
    }

    fn parse_if(&mut self) -> Result<Command, ParseError> {
        self.expect_str("{if")?;
        let cond = {
            let body = self.read_tag_body()?;
            self.parse_full_expression(&body)?
        };
        let block = self.parse_code_block()?;
        let mut branches = vec![(cond, block)];

        loop {
            if self.consume_str("{elseif") {
                let body = self.read_tag_body()?;
                let cond = self.parse_full_expression(&body)?;
                let block = self.parse_code_block()?;
                branches.push((cond, block));
            } else if self.consume_str("{else}") {
                let block = self.parse_code_block()?;
                branches.push((Expr::Boolean(true), block));
                self.expect_str("{/if}")?;
                return Ok(Command::If(branches));
            } else if self.consume_str("{/if}") {
                return Ok(Command::If(branches));
            } else {
                return Err(self.error("expected {elseif ...}, {else} or {/if}"));
            }
        }
    }

    fn parse_switch(&mut self) -> Result<Command, ParseError> {
        self.expect_str("{switch")?;
        let expr = {
            let body = self.read_tag_body()?;
            self.parse_full_expression(&body)?
        };

        let mut cases = Vec::new();
        let mut saw_default = false;
        loop {
            self.skip_whitespace();
            if self.consume_str("{/switch}") {
                break;
            }
            if self.consume_str("{case") {
                if saw_default {
                    return Err(self.error("{case} after {default}"));
                }
                let body = self.read_tag_body()?;
                let values = parse_case_values(&body)?;
                let block = self.parse_code_block()?;
                cases.push(SwitchCase::Case {
                    values,
                    body: block,
                });
            } else if self.consume_str("{default}") {
                if saw_default {
                    return Err(self.error("duplicate {default}"));
                }
                saw_default = true;
                let block = self.parse_code_block()?;
                cases.push(SwitchCase::Default(block));
            } else {
                return Err(self.error("expected {case ...}, {default} or {/switch}"));
            }
        }

        Ok(Command::Switch { expr, cases })
    }

    fn parse_foreach(&mut self) -> Result<Command, ParseError> {
        self.expect_str("{foreach")?;
        let body = self.read_tag_body()?;

        let mut parser = Parser::new(Lexer::new(&body))?;
        let var = parser.parse_variable_name()?;
        parser.expect_keyword("in")?;
        let expr = parser.parse_expression()?;
        parser.expect_eof()?;

        let block = self.parse_code_block()?;
        let if_empty = if self.consume_str("{ifempty}") {
            Some(self.parse_code_block()?)
        } else {
            None
        };
        self.expect_str("{/foreach}")?;

        Ok(Command::Foreach {
            var,
            expr,
            body: block,
            if_empty,
        })
    }

    fn parse_for(&mut self) -> Result<Command, ParseError> {
        self.expect_str("{for")?;
        let body = self.read_tag_body()?;

        let mut parser = Parser::new(Lexer::new(&body))?;
        let var = parser.parse_variable_name()?;
        parser.expect_keyword("in")?;
        parser.expect_keyword("range")?;
        parser.expect(&crate::ast::Token::LParen)?;
        let mut range = Vec::new();
        loop {
            range.push(parser.parse_expression()?);
            if parser.check(&crate::ast::Token::Comma) {
                parser.expect(&crate::ast::Token::Comma)?;
            } else {
                break;
            }
        }
        parser.expect(&crate::ast::Token::RParen)?;
        parser.expect_eof()?;
        if range.is_empty() || range.len() > 3 {
            return Err(self.error("range() takes 1 to 3 arguments"));
        }

        let block = self.parse_code_block()?;
        self.expect_str("{/for}")?;

        Ok(Command::For {
            var,
            range,
            body: block,
        })
    }

    fn parse_call(&mut self) -> Result<Command, ParseError> {
        self.expect_str("{call")?;
        let (body, self_closing) = self.read_tag_body_with_close()?;
        let (target, data) = parse_call_attributes(body.trim(), |expr| {
            self.parse_full_expression(expr)
        })?;

        let mut params = Vec::new();
        if !self_closing {
            loop {
                self.skip_whitespace();
                if self.consume_str("{/call}") {
                    break;
                }
                self.expect_str("{param")?;
                self.skip_whitespace();
                let name = self.read_simple_name()?;
                self.skip_whitespace();
                if self.consume_str(":") {
                    let (value, closed) = self.read_tag_body_with_close()?;
                    if !closed {
                        return Err(
                            self.error("expression params are self-closing: {param x: expr /}")
                        );
                    }
                    let expr = self.parse_full_expression(&value)?;
                    params.push((name, ParamValue::Expr(expr)));
                } else if self.consume_str("}") {
                    let block = self.parse_code_block()?;
                    self.expect_str("{/param}")?;
                    params.push((name, ParamValue::Block(block)));
                } else {
                    return Err(self.error("expected ':' or '}' after param name"));
                }
            }
        }

        Ok(Command::Call {
            target,
            data,
            params,
        })
    }
}

/// Parse the attribute text of a `{call}` tag: a static or `name="expr"`
/// target, then an optional `data="all"` / `data="expr"`.
fn parse_call_attributes(
    body: &str,
    mut parse_expr: impl FnMut(&str) -> Result<Expr, ParseError>,
) -> Result<(CallTarget, CallData), ParseError> {
    let syntax = |message: &str| ParseError::Syntax {
        message: message.to_string(),
        position: 0,
    };

    let (target, rest) = if let Some(rest) = body.strip_prefix("name=\"") {
        let end = find_attribute_end(rest).ok_or_else(|| syntax("unclosed name=\"...\""))?;
        let expr = parse_expr(&rest[..end])?;
        (CallTarget::Dynamic(expr), &rest[end + 1..])
    } else {
        let name_len = body
            .char_indices()
            .find(|(_, c)| !c.is_alphanumeric() && *c != '_')
            .map(|(i, _)| i)
            .unwrap_or(body.len());
        if name_len == 0 {
            return Err(syntax("expected a template name after {call"));
        }
        (
            CallTarget::Static(body[..name_len].to_string()),
            &body[name_len..],
        )
    };

    let rest = rest.trim();
    if rest.is_empty() {
        return Ok((target, CallData::Empty));
    }

    let Some(rest) = rest.strip_prefix("data=\"") else {
        return Err(syntax("expected data=\"...\" or the end of the {call} tag"));
    };
    let end = find_attribute_end(rest).ok_or_else(|| syntax("unclosed data=\"...\""))?;
    let content = &rest[..end];
    if !rest[end + 1..].trim().is_empty() {
        return Err(syntax("unexpected input after data=\"...\""));
    }

    let data = if content == "all" {
        CallData::All
    } else {
        CallData::Expr(parse_expr(content)?)
    };
    Ok((target, data))
}

/// Index of the closing `"` of an attribute value, skipping over
/// single-quoted strings inside the expression.
fn find_attribute_end(text: &str) -> Option<usize> {
    let mut in_single = false;
    let mut skip_next = false;
    for (i, ch) in text.char_indices() {
        if skip_next {
            skip_next = false;
            continue;
        }
        match ch {
            '\\' if in_single => skip_next = true,
            '\'' => in_single = !in_single,
            '"' if !in_single => return Some(i),
            _ => {}
        }
    }
    None
}

/// `{case v1, v2, ...}` values: literals only.
fn parse_case_values(body: &str) -> Result<Vec<Value>, ParseError> {
    let mut parser = Parser::new(Lexer::new(body))?;
    let mut values = vec![parser.parse_literal_value()?];
    while parser.check(&crate::ast::Token::Comma) {
        parser.expect(&crate::ast::Token::Comma)?;
        values.push(parser.parse_literal_value()?);
    }
    parser.expect_eof()?;
    Ok(values)
}

/// The parse-time whitespace rules: trim the block's leading and trailing
/// text, trim text on the side adjacent to a substitution code, then drop
/// text that became empty.
fn trim_code_block(mut items: Vec<Command>) -> CodeBlock {
    if let Some(Command::Text(text)) = items.first_mut() {
        *text = text.trim_start().to_string();
    }
    if let Some(Command::Text(text)) = items.last_mut() {
        *text = text.trim_end().to_string();
    }

    for i in 0..items.len() {
        if !matches!(items[i], Command::Substitution(_)) {
            continue;
        }
        if i > 0 {
            if let Command::Text(text) = &mut items[i - 1] {
                *text = text.trim_end().to_string();
            }
        }
        if i + 1 < items.len() {
            if let Command::Text(text) = &mut items[i + 1] {
                *text = text.trim_start().to_string();
            }
        }
    }

    items.retain(|item| !matches!(item, Command::Text(text) if text.is_empty()));
    CodeBlock(items)
}
