//! Copies crate READMEs into `OUT_DIR` without their frontmatter so they can
//! be pulled into rustdoc with `include_str!`.

use std::path::PathBuf;

const DOC_SOURCES: &[(&str, &str)] = &[
    ("README.md", "README.md"),
    ("src/crdt/README.md", "crdt_README.md"),
];

fn main() -> std::io::Result<()> {
    let out_dir = PathBuf::from(std::env::var_os("OUT_DIR").unwrap_or_default());

    for &(source, target) in DOC_SOURCES {
        println!("cargo:rerun-if-changed={source}");
        let text = std::fs::read_to_string(source)?;
        std::fs::write(out_dir.join(target), without_frontmatter(&text))?;
    }
    Ok(())
}

fn without_frontmatter(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("---") else {
        return text;
    };
    match rest.split_once("\n---") {
        Some((_, body)) => body.trim_start(),
        None => text,
    }
}
