use std::collections::HashSet;

use forge_symbols::SymbolIndex;

/// Files containing a symbol that calls (directly or transitively, up to
/// `max_depth`) a symbol declared in one of `changed_files`. Used to narrow
/// the test stage to what the call graph says is actually affected.
pub fn affected_files(index: &SymbolIndex, changed_files: &[String], max_depth: usize) -> Vec<String> {
    let mut affected = HashSet::new();
    for changed in changed_files {
        for symbol in index.symbols_in_file(changed) {
            let mut frontier = vec![symbol.id()];
            for _ in 0..max_depth {
                let mut next = Vec::new();
                for id in &frontier {
                    for edge in index.callers_of(id) {
                        if affected.insert(edge.file.clone()) {
                            next.push(edge.caller_symbol_id.clone());
                        }
                    }
                }
                if next.is_empty() {
                    break;
                }
                frontier = next;
            }
        }
    }
    affected.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn finds_callers_of_a_changed_symbol() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("lib.rs"),
            "pub fn add(a: i32, b: i32) -> i32 { a + b }\n\npub fn sum_all(xs: &[i32]) -> i32 {\n    let mut total = 0;\n    for x in xs { total = add(total, *x); }\n    total\n}\n",
        )
        .unwrap();
        let mut index = SymbolIndex::new(dir.path());
        index.index().unwrap();

        let affected = affected_files(&index, &["lib.rs".to_string()], 2);
        assert!(affected.contains(&"lib.rs".to_string()));
    }
}
