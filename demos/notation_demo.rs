//! Prints the dispatched measurement group for a few short-notation
//! specifications, in the style of `session.rs::print_tokens`/
//! `print_ast`. Not part of the library's public contract — a usage aid
//! only.

use fluxcore::notation::check_spec;

fn print_spec(text: &str) {
    println!("[{text}]");
    match check_spec(text) {
        Ok(group) => {
            let common = group.common();
            println!("  pool      : {}", common.id);
            println!("  dimension : {}", common.dimension);
            println!("  group     : {group:?}");
        }
        Err(err) => println!("  error: {err}"),
    }
}

fn main() {
    print_spec("Glu[1-5]#M0,1,2");
    print_spec("Glu[1-5:2-4]#M(3,2),(5,3)");
    print_spec("Ala#S1,DL2,DR3");
    print_spec("Glu#1x01");
}
