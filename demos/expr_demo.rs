//! Prints the parse and simplification of a small arithmetic expression,
//! in the style of `session.rs::print_tokens`/`print_ast`. Not part of
//! the library's public contract — a usage aid only.

use fluxcore::expr::{parse_expr, simplify};

fn print_expr(label: &str, text: &str) {
    println!("[{label}]");
    println!("╭────────────────────────────┬────────────────────────────╮");
    println!("│ input                       │ simplified                  │");
    println!("╞════════════════════════════╪════════════════════════════╡");

    match parse_expr(text) {
        Ok(e) => {
            let s = simplify(&e);
            println!("│ {:<27.27} │ {:<27.27} │", e.to_string(), s.to_string());
        }
        Err(err) => println!("│ {:<27.27} │ parse error: {err:<15} │", text),
    }
    println!("╰────────────────────────────┴────────────────────────────╯");
}

fn main() {
    print_expr("fold", "2 * 3 + 1");
    print_expr("cancel", "x / x ^ 2");
    print_expr("expand", "(a + b) ^ 2");
}
