//! # Folio CLI
//!
//! Usage:
//!   folio input.json -o layout.json
//!   echo '{ ... }' | folio
//!   folio --example > document.json
//!
//! Prints the layout report (pages, child locations, positioned items) as
//! JSON. Set `RUST_LOG=folio=debug` to watch the passes.

use std::env;
use std::fs;
use std::io::{self, Read};

use folio::FolioError;

fn main() {
    env_logger::init();
    let args: Vec<String> = env::args().collect();

    if args.iter().any(|a| a == "--example") {
        print!("{}", example_document_json());
        return;
    }

    if let Err(e) = run(&args) {
        eprintln!("✗ {e}");
        std::process::exit(1);
    }
}

fn run(args: &[String]) -> Result<(), FolioError> {
    let input = if args.len() > 1 && !args[1].starts_with('-') {
        fs::read_to_string(&args[1])?
    } else {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        buf
    };

    let output_path = args
        .windows(2)
        .find(|w| w[0] == "-o")
        .map(|w| w[1].clone());

    let report = folio::layout_json(&input)?;
    let json = serde_json::to_string_pretty(&report)?;
    match output_path {
        Some(path) => {
            fs::write(&path, &json)?;
            eprintln!(
                "✓ Laid out {} page(s), report written to {}",
                report.page_count, path
            );
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn example_document_json() -> &'static str {
    r##"{
  "pages": {
    "default": {
      "size": "A5",
      "margin": { "top": 36, "right": 36, "bottom": 36, "left": 36 }
    }
  },
  "session": { "justify": true },
  "format": { "fontFamily": "Helvetica", "fontSize": 12 },
  "children": [
    {
      "kind": { "type": "Text", "content": "The roots of a quadratic follow from completing the square. For the equation below the discriminant decides how many real roots exist." }
    },
    {
      "kind": { "type": "Operator", "form": "Binary", "glyph": "=" },
      "format": { "topSpacing": 8 },
      "children": [
        { "kind": { "type": "Literal", "text": "x" } },
        {
          "kind": { "type": "Operator", "form": "Binary", "glyph": "±" },
          "format": { "parenthesis": "Parentheses" },
          "children": [
            {
              "kind": { "type": "Operator", "form": "Prefix", "glyph": "−" },
              "children": [ { "kind": { "type": "Literal", "text": "b" } } ]
            },
            {
              "kind": { "type": "Operator", "form": "Superscript", "glyph": "2" },
              "children": [ { "kind": { "type": "Literal", "text": "b" } } ]
            }
          ]
        }
      ]
    },
    {
      "kind": { "type": "Value" },
      "format": { "topSpacing": 8 },
      "value": { "type": "Tuple", "value": [ { "type": "Real", "value": -1.5 }, { "type": "Real", "value": 2.0 } ] }
    },
    {
      "kind": { "type": "Grid", "columns": 2, "gap": 6 },
      "format": { "topSpacing": 8 },
      "children": [
        { "kind": { "type": "Literal", "text": "a" } },
        { "kind": { "type": "Value" }, "value": { "type": "Integer", "value": 1 } },
        { "kind": { "type": "Literal", "text": "c" } },
        { "kind": { "type": "Value" } }
      ]
    },
    { "kind": { "type": "PageBreak" } },
    {
      "kind": { "type": "Text", "content": "A second page starts after the explicit break." },
      "diagnostic": { "severity": "Information", "message": "Moved by a page break" }
    }
  ]
}
"##
}
