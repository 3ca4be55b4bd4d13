//! Text renderings of the syntax and bound trees.

use std::io::{self, Write};

pub mod bound;
pub mod tree;

const INDENT_WIDTH: usize = 2;

fn sp(w: &mut impl Write, i: usize) -> io::Result<()> {
    write!(w, "{:1$}", "", i * INDENT_WIDTH)
}

/// Runs a printer against an in-memory buffer.
fn to_string(print: impl FnOnce(&mut Vec<u8>) -> io::Result<()>) -> String {
    let mut buf = Vec::with_capacity(512);
    print(&mut buf).expect("writing to a vec never fails");
    String::from_utf8(buf).expect("printers only write utf-8")
}
