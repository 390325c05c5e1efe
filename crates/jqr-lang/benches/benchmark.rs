use jqr_lang::Value;

fn main() {
    divan::main();
}

fn numbers(n: usize) -> Value {
    Value::from((0..n).map(Value::from).collect::<Vec<_>>())
}

#[divan::bench(args = [1_000, 100_000])]
fn eval_map(bencher: divan::Bencher, n: usize) {
    let program = jqr_lang::compile("[.[] + 1]").unwrap();
    let input = numbers(n);

    bencher.bench(|| program.execute(input.clone()).first().unwrap());
}

#[divan::bench(args = [100_000])]
fn eval_first_of_many(bencher: divan::Bencher, n: usize) {
    let program = jqr_lang::compile(".[] | select(. > 10)").unwrap();
    let input = numbers(n);

    bencher.bench(|| program.execute(input.clone()).first().unwrap());
}

#[divan::bench(name = "eval_object_construction")]
fn eval_object_construction() -> String {
    jqr_lang::execute(
        "[.[] | {name: .name, upper: (.name | ascii_upcase), match: (.name | test(\"^d\"; \"i\"))}]",
        serde_json::from_str::<Value>(
            r#"[{"name": "dragon"}, {"name": "Drake"}, {"name": "wyvern"}, {"name": "‽"}]"#,
        )
        .unwrap(),
    )
    .text()
    .unwrap()
}

#[divan::bench(args = [1_000])]
fn eval_text_mode(bencher: divan::Bencher, n: usize) {
    let program = jqr_lang::compile(".a + 1").unwrap();
    let text = (0..n).map(|i| format!("{{\"a\": {i}}}")).collect::<Vec<_>>().join("\n");

    bencher.bench(|| program.execute_text(text.clone()).all().unwrap());
}

#[divan::bench(name = "compile")]
fn compile() -> jqr_lang::Program {
    jqr_lang::compile(
        r#".items[] as $item | if $item.price > 10 then {name: $item.name, total: ($item.price * $item.count)} elif $item.free then empty else $item.name // "unknown" end"#,
    )
    .unwrap()
}

#[divan::bench(name = "compile_unoptimized")]
fn compile_unoptimized() -> jqr_lang::Program {
    jqr_lang::Compiler::new()
        .optimize(false)
        .compile("[range(10)] | map(. * 2 + 1 - 3 / 4) | add")
        .unwrap()
}
