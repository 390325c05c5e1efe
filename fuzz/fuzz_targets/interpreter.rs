#![no_main]

use arbitrary::Arbitrary;
use itertools::Itertools;
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Clone, Arbitrary)]
enum Expr {
    Field(String),
    Iterate,
    Binary(String, Box<Expr>, Box<Expr>),
    Call(String, Vec<String>),
    Bind(String, String),
    Raw(String),
}

impl Expr {
    fn to_filter(&self) -> String {
        match self {
            Expr::Field(name) => format!(".{}", name),
            Expr::Iterate => ".[]".to_string(),
            Expr::Binary(op, lhs, rhs) => format!("({} {} {})", lhs.to_filter(), op, rhs.to_filter()),
            Expr::Call(name, args) if args.is_empty() => name.clone(),
            Expr::Call(name, args) => format!("{}({})", name, args.join("; ")),
            Expr::Bind(source, name) => format!("{} as ${} | ${}", source, name, name),
            Expr::Raw(code) => code.clone(),
        }
    }
}

#[derive(Debug, Clone, Arbitrary)]
struct Context {
    raw_filter: Option<String>,
    generated_filter: Option<Vec<Expr>>,
    input: String,
}

fuzz_target!(|context: Context| {
    let filter = match (&context.raw_filter, &context.generated_filter) {
        (Some(raw), _) => raw.clone(),
        (_, Some(generated)) => generated.iter().map(Expr::to_filter).join(" | "),
        _ => ".".to_string(),
    };

    let Ok(program) = jqr_lang::compile(&filter) else {
        return;
    };

    // Bounded, since filters such as `range(1e18)` never end.
    let _ = program.execute_text(context.input.clone()).take(1024).count();
    let _ = program.execute(serde_json::json!({"a": [1, "‽", null]})).take(1024).count();
});
