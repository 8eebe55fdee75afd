use std::collections::HashMap;
use std::path::Path;

use crate::{CallEdge, Symbol, SymbolsError};

/// Capability bundle a language plugs into the index with. Each method is an
/// independent query over one parse of the same source; there is no shared
/// base class, just this trait's five operations.
pub trait LanguageAnalyzer: Send + Sync {
    fn language(&self) -> &'static str;
    fn extensions(&self) -> &'static [&'static str];

    fn extract_symbols(&self, path: &Path, source: &[u8]) -> Result<Vec<Symbol>, SymbolsError>;

    /// Call edges originating from `symbols` (already extracted from the same file).
    fn extract_calls(
        &self,
        path: &Path,
        source: &[u8],
        symbols: &[Symbol],
    ) -> Result<Vec<CallEdge>, SymbolsError>;

    fn get_imports(&self, path: &Path, source: &[u8]) -> Result<Vec<String>, SymbolsError>;
    fn get_exports(&self, path: &Path, source: &[u8]) -> Result<Vec<String>, SymbolsError>;

    /// Source text of a single function/method body, looked up by qualified name.
    fn get_function_body(
        &self,
        path: &Path,
        source: &[u8],
        qualified_name: &str,
    ) -> Result<Option<String>, SymbolsError>;
}

#[derive(Default)]
pub struct LanguageRegistry {
    analyzers: Vec<Box<dyn LanguageAnalyzer>>,
    by_ext: HashMap<String, usize>,
}

impl LanguageRegistry {
    pub fn with_defaults() -> Self {
        let mut reg = Self::default();
        reg.register(Box::new(crate::lang::rust::RustAnalyzer));
        reg.register(Box::new(crate::lang::typescript::TypeScriptAnalyzer));
        reg.register(Box::new(crate::lang::python::PythonAnalyzer));
        reg.register(Box::new(crate::lang::go::GoAnalyzer));
        reg
    }

    pub fn register(&mut self, analyzer: Box<dyn LanguageAnalyzer>) {
        let idx = self.analyzers.len();
        for ext in analyzer.extensions() {
            self.by_ext.insert(ext.to_string(), idx);
        }
        self.analyzers.push(analyzer);
    }

    pub fn for_path(&self, path: &Path) -> Option<&dyn LanguageAnalyzer> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        self.by_ext.get(&ext).map(|&i| self.analyzers[i].as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn dispatches_by_extension() {
        let reg = LanguageRegistry::with_defaults();
        assert!(reg.for_path(&PathBuf::from("src/main.rs")).is_some());
        assert!(reg.for_path(&PathBuf::from("src/app.ts")).is_some());
        assert!(reg.for_path(&PathBuf::from("src/app.py")).is_some());
        assert!(reg.for_path(&PathBuf::from("src/main.go")).is_some());
        assert!(reg.for_path(&PathBuf::from("README.md")).is_none());
    }
}
