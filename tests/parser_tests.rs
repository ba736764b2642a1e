use stencil_lang::ast::{
    BinOp, CallData, CallTarget, Command, DirectiveArg, Expr, Func, ParamValue, Sub, SwitchCase,
};
use stencil_lang::parser::{parse_expression_str, ParseError};
use stencil_lang::template::{parse_namespace, parse_single_template};
use stencil_lang::Value;

fn var(name: &str) -> Expr {
    Expr::Variable(name.to_string())
}

fn dot(base: Expr, name: &str) -> Expr {
    Expr::DotRef {
        base: Box::new(base),
        name: name.to_string(),
    }
}

fn index(base: Expr, index: Expr) -> Expr {
    Expr::IndexRef {
        base: Box::new(base),
        index: Box::new(index),
    }
}

#[test]
fn literals() {
    assert_eq!(
        parse_expression_str("'Hello world'").unwrap(),
        Expr::Str("Hello world".to_string())
    );
    assert_eq!(parse_expression_str("''").unwrap(), Expr::Str(String::new()));
    assert_eq!(parse_expression_str("5").unwrap(), Expr::Integer(5));
    assert_eq!(parse_expression_str("3.14").unwrap(), Expr::Float(3.14));
    assert_eq!(parse_expression_str("0x1F").unwrap(), Expr::Integer(31));
    assert_eq!(parse_expression_str("null").unwrap(), Expr::Null);
    assert_eq!(parse_expression_str("true").unwrap(), Expr::Boolean(true));
}

#[test]
fn variables_and_refs() {
    assert_eq!(parse_expression_str(" $var ").unwrap(), var("var"));
    assert_eq!(parse_expression_str("$x.y").unwrap(), dot(var("x"), "y"));
    assert_eq!(
        parse_expression_str("$x.1.y").unwrap(),
        dot(index(var("x"), Expr::Integer(1)), "y")
    );
    assert_eq!(
        parse_expression_str("$x[0].y").unwrap(),
        dot(index(var("x"), Expr::Integer(0)), "y")
    );
    assert_eq!(
        parse_expression_str("$x[$z].y").unwrap(),
        dot(index(var("x"), var("z")), "y")
    );
    assert_eq!(
        parse_expression_str("$x[0][1]").unwrap(),
        index(index(var("x"), Expr::Integer(0)), Expr::Integer(1))
    );
    assert_eq!(
        parse_expression_str("$x[0][1][$y]").unwrap(),
        index(
            index(index(var("x"), Expr::Integer(0)), Expr::Integer(1)),
            var("y")
        )
    );
    // [name] is a static property access
    assert_eq!(parse_expression_str("$x[foo]").unwrap(), dot(var("x"), "foo"));
}

#[test]
fn operators() {
    assert_eq!(
        parse_expression_str("-$x").unwrap(),
        Expr::Neg(Box::new(var("x")))
    );
    assert_eq!(
        parse_expression_str("not $x").unwrap(),
        Expr::Not(Box::new(var("x")))
    );

    let symbols = [
        ("$x + $y", BinOp::Add),
        ("$x - $y", BinOp::Subtract),
        ("$x * $y", BinOp::Multiply),
        ("$x/$y", BinOp::Divide),
        ("$x % $y", BinOp::Modulo),
        ("$x > $y", BinOp::GreaterThan),
        ("$x < $y", BinOp::LessThan),
        ("$x>=$y", BinOp::GreaterEqual),
        ("$x<=$y", BinOp::LessEqual),
        ("$x==$y", BinOp::Equal),
        ("$x!=$y", BinOp::NotEqual),
        ("$x and $y", BinOp::And),
        ("$x or $y", BinOp::Or),
    ];
    for (source, op) in symbols {
        assert_eq!(
            parse_expression_str(source).unwrap(),
            Expr::BinaryOp {
                op,
                left: Box::new(var("x")),
                right: Box::new(var("y")),
            },
            "parsing {:?}",
            source
        );
    }
}

#[test]
fn nested_ternary() {
    // max(2, $x ? min($x, $y ? 3 : 5 + 4, 6) : 4)
    let expr = parse_expression_str("max(2, $x ? min($x, $y ? 3 : 5 + 4, 6) : 4)").unwrap();

    let Expr::Funcall { func: Func::Max, args } = expr else {
        panic!("expected max() call");
    };
    assert_eq!(args[0], Expr::Integer(2));

    let Expr::Conditional {
        cond,
        then_branch,
        else_branch,
    } = &args[1]
    else {
        panic!("expected ternary");
    };
    assert_eq!(**cond, var("x"));
    assert_eq!(**else_branch, Expr::Integer(4));

    let Expr::Funcall { func: Func::Min, args: min_args } = &**then_branch else {
        panic!("expected min() call");
    };
    assert_eq!(min_args[0], var("x"));
    assert_eq!(min_args[2], Expr::Integer(6));

    let Expr::Conditional {
        cond,
        then_branch,
        else_branch,
    } = &min_args[1]
    else {
        panic!("expected inner ternary");
    };
    assert_eq!(**cond, var("y"));
    assert_eq!(**then_branch, Expr::Integer(3));
    assert_eq!(
        **else_branch,
        Expr::BinaryOp {
            op: BinOp::Add,
            left: Box::new(Expr::Integer(5)),
            right: Box::new(Expr::Integer(4)),
        }
    );
}

#[test]
fn functions() {
    assert_eq!(parse_expression_str("hasData()").unwrap(), Expr::HasData);
    assert_eq!(
        parse_expression_str("min($x, $y)").unwrap(),
        Expr::Funcall {
            func: Func::Min,
            args: vec![var("x"), var("y")],
        }
    );
    assert_eq!(
        parse_expression_str("min($x, max(5, $y))").unwrap(),
        Expr::Funcall {
            func: Func::Min,
            args: vec![
                var("x"),
                Expr::Funcall {
                    func: Func::Max,
                    args: vec![Expr::Integer(5), var("y")],
                }
            ],
        }
    );
}

#[test]
fn compile_time_failures() {
    assert!(matches!(
        parse_expression_str("nope(1)"),
        Err(ParseError::UnknownFunction(_))
    ));
    assert_eq!(parse_expression_str("$x ? 1"), Err(ParseError::MissingColon));
    assert!(matches!(
        parse_expression_str("round()"),
        Err(ParseError::WrongArity { .. })
    ));
    assert!(matches!(
        parse_expression_str("hasData(1)"),
        Err(ParseError::WrongArity { .. })
    ));
    assert!(matches!(
        parse_expression_str("isLast($x.y)"),
        Err(ParseError::LoopFunctionArg(_))
    ));
}

#[test]
fn template_props() {
    let a = parse_single_template("{template testA autoescape=\"true\"}{/template}").unwrap();
    assert_eq!(a.name, "testA");
    assert!(a.autoescape);
    assert!(!a.private);

    let b = parse_single_template("{template testB private=\"false\"}{/template}").unwrap();
    assert_eq!(b.name, "testB");
    assert!(!b.private);

    let c = parse_single_template(
        "{template testC autoescape=\"false\" private=\"true\"}{/template}",
    )
    .unwrap();
    assert!(!c.autoescape);
    assert!(c.private);

    let d = parse_single_template("{template testD}\n    Hello\n{/template}").unwrap();
    assert!(d.autoescape, "autoescape defaults to on");
    assert_eq!(d.code.0, vec![Command::Text("Hello".to_string())]);
}

#[test]
fn substitutions() {
    let t = parse_single_template("{template subs}{sp}{nil}{\\r}{\\n}{\\t}{lb}{rb}{/template}")
        .unwrap();
    let collected: String = t
        .code
        .0
        .iter()
        .map(|item| match item {
            Command::Substitution(sub) => sub.as_str(),
            _ => panic!("expected only substitutions"),
        })
        .collect();
    assert_eq!(collected, " \r\n\t{}");
}

#[test]
fn print_with_directives() {
    let t = parse_single_template(
        "{template test}\n   {2 + 2 |noAutoescape |id |escapeHtml |escapeUri |escapeJs  |insertWordBreaks:5}\n{/template}",
    )
    .unwrap();
    let Command::Print { expr, directives } = &t.code.0[0] else {
        panic!("expected print");
    };
    assert_eq!(
        *expr,
        Expr::BinaryOp {
            op: BinOp::Add,
            left: Box::new(Expr::Integer(2)),
            right: Box::new(Expr::Integer(2)),
        }
    );
    let names: Vec<&str> = directives.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(
        names,
        vec!["noAutoescape", "id", "escapeHtml", "escapeUri", "escapeJs", "insertWordBreaks"]
    );
    assert_eq!(
        directives.last().unwrap().1,
        DirectiveArg::Literal(Value::Integer(5))
    );
}

#[test]
fn unknown_directive_fails() {
    assert!(matches!(
        parse_single_template("{template t}{$x |frobnicate}{/template}"),
        Err(ParseError::UnknownDirective(_))
    ));
}

#[test]
fn explicit_print_tag() {
    let t = parse_single_template("{template t}{print $x}{/template}").unwrap();
    assert!(matches!(
        &t.code.0[0],
        Command::Print { expr, .. } if *expr == var("x")
    ));
}

#[test]
fn if_chain_structure() {
    let t = parse_single_template(
        "{template t}{if $x}Hello {$x}{elseif $y}By {$y}{else}Hello world{/if}{/template}",
    )
    .unwrap();
    let Command::If(branches) = &t.code.0[0] else {
        panic!("expected if");
    };
    assert_eq!(branches.len(), 3);
    assert_eq!(branches[0].0, var("x"));
    assert_eq!(
        branches[0].1 .0,
        vec![
            Command::Text("Hello ".to_string()),
            Command::Print {
                expr: var("x"),
                directives: vec![],
            }
        ]
    );
    assert_eq!(branches[1].0, var("y"));
    assert_eq!(branches[2].0, Expr::Boolean(true));
    assert_eq!(branches[2].1 .0[0], Command::Text("Hello world".to_string()));
}

#[test]
fn switch_structure() {
    let t = parse_single_template(
        "{template t}{switch $x}{case 1}hello world{case 2, 3, 4}by-by{/switch}{/template}",
    )
    .unwrap();
    let Command::Switch { expr, cases } = &t.code.0[0] else {
        panic!("expected switch");
    };
    assert_eq!(*expr, var("x"));
    assert_eq!(
        cases[0],
        SwitchCase::Case {
            values: vec![Value::Integer(1)],
            body: stencil_lang::ast::CodeBlock(vec![Command::Text("hello world".to_string())]),
        }
    );
    let SwitchCase::Case { values, .. } = &cases[1] else {
        panic!("expected case");
    };
    assert_eq!(
        *values,
        vec![Value::Integer(2), Value::Integer(3), Value::Integer(4)]
    );
}

#[test]
fn foreach_structure() {
    let t = parse_single_template(
        "{template test}{foreach $x in $y.foo }{$x}{ifempty}Hello{/foreach}{/template}",
    )
    .unwrap();
    let Command::Foreach {
        var: loop_var,
        expr,
        body,
        if_empty,
    } = &t.code.0[0]
    else {
        panic!("expected foreach");
    };
    assert_eq!(loop_var, "x");
    assert_eq!(*expr, dot(var("y"), "foo"));
    assert!(matches!(&body.0[0], Command::Print { .. }));
    assert_eq!(
        if_empty.as_ref().unwrap().0,
        vec![Command::Text("Hello".to_string())]
    );
}

#[test]
fn for_ranges() {
    for (source, len) in [
        ("{template t}{for $x in range(10)} ! {/for}{/template}", 1),
        ("{template t}{for $x in range(4, 10)} ! {/for}{/template}", 2),
        ("{template t}{for $x in range(4, 10, 2)} ! {/for}{/template}", 3),
    ] {
        let t = parse_single_template(source).unwrap();
        let Command::For { var: v, range, body } = &t.code.0[0] else {
            panic!("expected for");
        };
        assert_eq!(v, "x");
        assert_eq!(range.len(), len);
        assert_eq!(body.0, vec![Command::Text("!".to_string())]);
    }
}

#[test]
fn call_forms() {
    let a = parse_single_template("{template t}{call helloName1 data=\"$x\" /}{/template}")
        .unwrap();
    assert_eq!(
        a.code.0[0],
        Command::Call {
            target: CallTarget::Static("helloName1".to_string()),
            data: CallData::Expr(var("x")),
            params: vec![],
        }
    );

    let b = parse_single_template(
        "{template t}{call helloName2}{param name: $x /}{/call}{/template}",
    )
    .unwrap();
    assert_eq!(
        b.code.0[0],
        Command::Call {
            target: CallTarget::Static("helloName2".to_string()),
            data: CallData::Empty,
            params: vec![("name".to_string(), ParamValue::Expr(var("x")))],
        }
    );

    let c = parse_single_template(
        "{template t}
           {call helloName3 data=\"$data\"}
               {param a: $x /}
               {param b}Hello {$y}{/param}
           {/call}
        {/template}",
    )
    .unwrap();
    let Command::Call { target, data, params } = &c.code.0[0] else {
        panic!("expected call");
    };
    assert_eq!(*target, CallTarget::Static("helloName3".to_string()));
    assert_eq!(*data, CallData::Expr(var("data")));
    assert_eq!(params.len(), 2);
    assert_eq!(params[0].0, "a");
    let ParamValue::Block(block) = &params[1].1 else {
        panic!("expected block param");
    };
    assert_eq!(block.0[0], Command::Text("Hello ".to_string()));

    let d = parse_single_template("{template t}{call name=\"$name\"  /}{/template}").unwrap();
    assert_eq!(
        d.code.0[0],
        Command::Call {
            target: CallTarget::Dynamic(var("name")),
            data: CallData::Empty,
            params: vec![],
        }
    );

    let e = parse_single_template("{template t}{call name=\"$x\" data=\"all\"  /}{/template}")
        .unwrap();
    assert_eq!(
        e.code.0[0],
        Command::Call {
            target: CallTarget::Dynamic(var("x")),
            data: CallData::All,
            params: vec![],
        }
    );
}

#[test]
fn namespace_declaration() {
    let ns = parse_namespace(
        "// header comment
        {namespace shop.cart.view}

        /* block comment between declarations */

        {template one}1{/template}
        {template two}2{/template}",
    )
    .unwrap();
    assert_eq!(ns.name, "shop.cart.view");
    assert_eq!(ns.templates.len(), 2);
    assert_eq!(ns.templates[1].name, "two");
}

#[test]
fn malformed_markup_fails() {
    assert!(parse_single_template("{template t}{if $x}open{/template}").is_err());
    assert!(parse_single_template("{template t}{foreach $x in}{/foreach}{/template}").is_err());
    assert!(parse_single_template("{template t}{unknowntag $x}{/template}").is_err());
    assert!(parse_namespace("{namespace }").is_err());
    assert!(parse_single_template("{template t}{for $x in range()}{/for}{/template}").is_err());
}

#[test]
fn sub_kinds_are_distinct() {
    let t = parse_single_template("{template t}a{nil}b{/template}").unwrap();
    assert_eq!(
        t.code.0,
        vec![
            Command::Text("a".to_string()),
            Command::Substitution(Sub::Nil),
            Command::Text("b".to_string()),
        ]
    );
}
