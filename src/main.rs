use std::env;
use std::fs;
use std::io::{self, Read};
use std::process;

use rscc::compile;

/// Read the named file, or standard input when no argument is given,
/// compile it, and write the assembly to standard output. Diagnostics go
/// to standard error, and any error makes the exit status nonzero.
fn main() {
  env_logger::init();

  let args: Vec<String> = env::args().collect();
  if args.len() > 2 {
    let program = args.first().map(String::as_str).unwrap_or("rscc");
    eprintln!("usage: {program} [file]");
    process::exit(1);
  }

  let source = match args.get(1) {
    Some(path) => fs::read_to_string(path),
    None => {
      let mut buffer = String::new();
      io::stdin().read_to_string(&mut buffer).map(|_| buffer)
    }
  };

  let source = match source {
    Ok(source) => source,
    Err(err) => {
      eprintln!("rscc: {err}");
      process::exit(1);
    }
  };

  match compile(&source) {
    Ok(compilation) => {
      for diagnostic in &compilation.diagnostics {
        eprintln!("{diagnostic}");
      }
      match compilation.assembly {
        Some(assembly) => print!("{assembly}"),
        None => process::exit(1),
      }
    }
    Err(err) => {
      eprintln!("{err}");
      process::exit(1);
    }
  }
}
