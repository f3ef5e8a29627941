extern crate pax_engine;

use std::io::stdin;

use pax_engine::Archive;

fn main() {
    let mut arch = Archive::new(stdin().lock());
    for file in arch.entries().unwrap() {
        let f = file.unwrap();
        let header = f.header();
        println!(
            "{:>10} {:>8} {}",
            header.kind.to_string(),
            header.size,
            header.display_name()
        );
    }
    let format = arch.format().map(|f| f.descriptor().name).unwrap_or("?");
    let session = arch.session();
    eprintln!("{}: {} entries", format, session.files());
    for warning in session.warnings() {
        eprintln!("warning: {}", warning);
    }
}
