extern crate pax_engine;

use std::env::args;
use std::io::{stdin, stdout};

use pax_engine::{Archive, Builder, FormatRegistry, Outcome};

fn main() {
    let name = args().nth(1).unwrap_or_else(|| "ustar".to_string());
    let format = FormatRegistry::by_name(&name).expect("unknown format name");

    let mut src = Archive::new(stdin().lock());
    let mut dst = Builder::new(stdout().lock(), format);
    for file in src.entries().unwrap() {
        let f = file.unwrap();
        let header = f.header().clone();
        if let Outcome::Skipped(e) = dst.append(&header, f).unwrap() {
            eprintln!("skipped {}: {}", header.display_name(), e);
        }
    }
    dst.finish().unwrap();
    eprintln!(
        "{} entries read, {} written, {} skipped",
        src.session().files(),
        dst.session().files(),
        dst.session().skipped()
    );
}
