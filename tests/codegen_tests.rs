use stencil_lang::{compile_namespace_to_js, parse_namespace};

fn emit(source: &str) -> String {
    compile_namespace_to_js(&parse_namespace(source).unwrap())
}

#[test]
fn namespace_containers_for_every_prefix() {
    let js = emit("{namespace shop.cart.view}{template t}x{/template}");
    assert!(js.contains("if (typeof shop == 'undefined') { shop = {}; }"));
    assert!(js.contains("if (typeof shop.cart == 'undefined') { shop.cart = {}; }"));
    assert!(js.contains("if (typeof shop.cart.view == 'undefined') { shop.cart.view = {}; }"));
}

#[test]
fn helpers_are_inlined_once_per_namespace() {
    let js = emit("{namespace ns}{template t}x{/template}");
    for helper in [
        "ns.$isEmpty$ = function",
        "ns.$truthy$ = function",
        "ns.$hasData$ = function",
        "ns.$escapeHTML$ = function",
        "ns.$encodeURI$ = function",
        "ns.$encodeId$ = function",
        "ns.$round$ = function",
        "ns.$objectFromPrototype$ = function",
    ] {
        assert_eq!(js.matches(helper).count(), 1, "missing helper: {}", helper);
    }
}

#[test]
fn template_function_shape() {
    let js = emit("{namespace ns}{template greet}hi{/template}");
    assert!(js.contains("ns.greet = function($env$, $target$) {"));
    assert!(js.contains("if (!$env$) { $env$ = {}; }"));
    assert!(js.contains("var $result$ = $target$ || [];"));
    assert!(js.contains("$result$.push(\"hi\");"));
    assert!(js.contains("if (!$target$) return $result$.join(\"\");"));
    assert!(js.contains("else return null;"));
}

#[test]
fn autoescape_wraps_prints() {
    let js = emit("{namespace ns}{template t}{$x}{/template}");
    assert!(js.contains("$result$.push(ns.$escapeHTML$($env$.x));"));

    let raw = emit("{namespace ns}{template t autoescape=\"false\"}{$x}{/template}");
    assert!(raw.contains("$result$.push($env$.x);"));

    let no = emit("{namespace ns}{template t}{$x |noAutoescape}{/template}");
    assert!(no.contains("$result$.push($env$.x);"));
}

#[test]
fn directive_priority_in_emission() {
    let js = emit("{namespace ns}{template t}{$x |escapeHtml |escapeUri |id}{/template}");
    assert!(js.contains("$result$.push(ns.$encodeId$($env$.x));"));
    assert!(!js.contains("$encodeURI$($env$.x)"));

    let uri = emit("{namespace ns}{template t}{$x |escapeHtml |escapeUri}{/template}");
    assert!(uri.contains("$result$.push(ns.$encodeURI$($env$.x));"));
}

#[test]
fn conditions_use_the_truthiness_helper() {
    let js = emit("{namespace ns}{template t}{if $x}A{elseif $y}B{else}C{/if}{/template}");
    assert!(js.contains("if (ns.$truthy$($env$.x)) {"));
    assert!(js.contains("else if (ns.$truthy$($env$.y)) {"));
    assert!(js.contains("else {"));
}

#[test]
fn logic_operators_preserve_operand_values() {
    let js = emit("{namespace ns}{template t autoescape=\"false\"}{$a or $b}{/template}");
    assert!(js.contains("(ns.$truthy$($env$.a) ? $env$.a : $env$.b)"));

    let and = emit("{namespace ns}{template t autoescape=\"false\"}{$a and $b}{/template}");
    assert!(and.contains("(ns.$truthy$($env$.a) ? $env$.b : $env$.a)"));
}

#[test]
fn foreach_tracks_local_scope() {
    let js = emit(
        "{namespace ns}{template t}{foreach $o in $items}{$o}{$other}{/foreach}{$o}{/template}",
    );
    assert!(js.contains("var $sequence_o$ = $env$.items;"));
    assert!(js.contains("if (!ns.$isEmpty$($sequence_o$)) {"));
    assert!(js.contains(
        "for (var $counter_o$ = 0; $counter_o$ < $sequence_o$.length; ++$counter_o$) {"
    ));
    assert!(js.contains("var o = $sequence_o$[$counter_o$];"));
    // inside the loop the variable is local, outside it reads the env
    assert!(js.contains("$result$.push(ns.$escapeHTML$(o));"));
    assert!(js.contains("$result$.push(ns.$escapeHTML$($env$.other));"));
    assert!(js.contains("$result$.push(ns.$escapeHTML$($env$.o));"));
}

#[test]
fn foreach_ifempty_emits_else() {
    let js = emit(
        "{namespace ns}{template t}{foreach $o in $xs}{$o}{ifempty}none{/foreach}{/template}",
    );
    assert!(js.contains("else {\n        $result$.push(\"none\");\n    }"));
}

#[test]
fn loop_metadata_uses_counter_variables() {
    let js = emit(
        "{namespace ns}{template t autoescape=\"false\"}{foreach $o in $xs}{index($o)}{isFirst($o) ? 1 : 2}{isLast($o) ? 1 : 2}{/foreach}{/template}",
    );
    assert!(js.contains("$result$.push(($counter_o$ + 1));"));
    assert!(js.contains("($counter_o$ == 0)"));
    assert!(js.contains("($counter_o$ == ($sequence_o$.length - 1))"));
}

#[test]
fn for_range_shapes() {
    let one = emit("{namespace ns}{template t}{for $i in range(5)}{$i}{/for}{/template}");
    assert!(one.contains("for (var i = 0; i < 5; ++i) {"));

    let two = emit("{namespace ns}{template t}{for $i in range(4, 10)}{$i}{/for}{/template}");
    assert!(two.contains("for (var i = 4; i < 10; ++i) {"));

    let three =
        emit("{namespace ns}{template t}{for $i in range(4, 10, 2)}{$i}{/for}{/template}");
    assert!(three.contains("for (var i = 4; i < 10; i += 2) {"));
}

#[test]
fn switch_emits_breaks_and_default() {
    let js = emit(
        "{namespace ns}{template t}{switch $x}{case 1, 'two'}A{default}B{/switch}{/template}",
    );
    assert!(js.contains("switch ($env$.x) {"));
    assert!(js.contains("case 1:"));
    assert!(js.contains("case \"two\":"));
    assert!(js.contains("default:"));
    assert_eq!(js.matches("break;").count(), 2);
}

#[test]
fn simple_call_passes_env_and_result() {
    let js = emit(
        "{namespace ns}
         {template inner}x{/template}
         {template all}{call inner data=\"all\" /}{/template}
         {template none}{call inner /}{/template}
         {template expr}{call inner data=\"$d\" /}{/template}",
    );
    assert!(js.contains("ns.inner($env$, $result$);"));
    assert!(js.contains("ns.inner({}, $result$);"));
    assert!(js.contains("ns.inner($env$.d, $result$);"));
}

#[test]
fn call_with_params_builds_prototype_env() {
    let js = emit(
        "{namespace ns}
         {template inner}{$a}{$b}{/template}
         {template outer}{call inner data=\"all\"}{param a: $x /}{param b}text{/param}{/call}{/template}",
    );
    assert!(js.contains("var $env_1$ = ns.$objectFromPrototype$($env$);"));
    assert!(js.contains("$env_1$.a = $env$.x;"));
    assert!(js.contains("$env_1$.b = function () {"));
    assert!(js.contains("return $result$.join(\"\");"));
    assert!(js.contains("ns.inner($env_1$, $result$);"));
}

#[test]
fn call_without_data_delegates_from_empty_root() {
    let js = emit(
        "{namespace ns}
         {template inner}{$a}{/template}
         {template outer}{call inner}{param a: 1 /}{/call}{/template}",
    );
    assert!(js.contains("var $env_1$ = ns.$objectFromPrototype$({});"));
}

#[test]
fn symbol_counter_is_fresh_per_call_site() {
    let js = emit(
        "{namespace ns}
         {template inner}{$a}{/template}
         {template outer}{call inner}{param a: 1 /}{/call}{call inner}{param a: 2 /}{/call}{/template}",
    );
    assert!(js.contains("var $env_1$ ="));
    assert!(js.contains("var $env_2$ ="));
}

#[test]
fn dynamic_call_target_indexes_the_namespace() {
    let js = emit(
        "{namespace ns}
         {template inner}x{/template}
         {template outer}{call name=\"$which\" /}{/template}",
    );
    assert!(js.contains("ns[$env$.which]($env$, $result$);"));
}

#[test]
fn string_literals_are_json_escaped() {
    let js = emit("{namespace ns}{template t}a\"b\\c{/template}");
    assert!(js.contains("$result$.push(\"a\\\"b\\\\c\");"));
}

#[test]
fn function_emission() {
    let js = emit(
        "{namespace ns}{template t autoescape=\"false\"}{round($x, 2)}{length($xs)}{keys($m)}{floor($x)}{ceiling($x)}{min($x, $y)}{randomInt(10)}{/template}",
    );
    assert!(js.contains("ns.$round$($env$.x, 2)"));
    assert!(js.contains("($env$.xs).length"));
    assert!(js.contains("Object.keys($env$.m)"));
    assert!(js.contains("Math.floor($env$.x)"));
    assert!(js.contains("Math.ceil($env$.x)"));
    assert!(js.contains("Math.min($env$.x, $env$.y)"));
    assert!(js.contains("Math.floor(Math.random() * (10))"));
}

#[test]
fn has_data_uses_the_helper() {
    let js = emit("{namespace ns}{template t}{if hasData()}y{/if}{/template}");
    assert!(js.contains("if (ns.$truthy$(ns.$hasData$($env$))) {"));
}

#[test]
fn substitutions_emit_their_text() {
    let js = emit("{namespace ns}{template t}{sp}{nil}{\\n}{lb}{rb}{/template}");
    assert!(js.contains("$result$.push(\" \");"));
    assert!(js.contains("$result$.push(\"\\n\");"));
    assert!(js.contains("$result$.push(\"{\");"));
    assert!(js.contains("$result$.push(\"}\");"));
    // {nil} produces nothing
    assert!(!js.contains("$result$.push(\"\");"));
}
