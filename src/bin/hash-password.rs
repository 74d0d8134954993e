//! Helper for bootstrapping credentials: prints the bcrypt hash of the
//! password given on the command line.

use bcrypt::{hash, DEFAULT_COST};

fn main() {
    let password = match std::env::args().nth(1) {
        Some(p) => p,
        None => {
            eprintln!("Usage: hash-password <password>");
            std::process::exit(1);
        }
    };

    match hash(&password, DEFAULT_COST) {
        Ok(hashed) => println!("{}", hashed),
        Err(e) => {
            eprintln!("Failed to hash password: {}", e);
            std::process::exit(1);
        }
    }
}
