//! File extension to language tag mapping shared by every provider client.

use lazy_static::lazy_static;
use std::collections::HashMap;

lazy_static! {
    static ref EXTENSION_LANGUAGES: HashMap<&'static str, &'static str> = {
        let mut table = HashMap::new();
        // Scripting
        table.insert("php", "php");
        table.insert("js", "javascript");
        table.insert("jsx", "javascript");
        table.insert("mjs", "javascript");
        table.insert("ts", "typescript");
        table.insert("tsx", "typescript");
        table.insert("py", "python");
        table.insert("rb", "ruby");
        table.insert("pl", "perl");
        table.insert("lua", "lua");
        table.insert("sh", "bash");
        table.insert("bash", "bash");
        table.insert("ps1", "powershell");
        // Markup and styles
        table.insert("html", "html");
        table.insert("htm", "html");
        table.insert("vue", "vue");
        table.insert("css", "css");
        table.insert("scss", "scss");
        table.insert("less", "less");
        table.insert("md", "markdown");
        table.insert("markdown", "markdown");
        // Config and data
        table.insert("json", "json");
        table.insert("xml", "xml");
        table.insert("yml", "yaml");
        table.insert("yaml", "yaml");
        table.insert("toml", "toml");
        table.insert("ini", "ini");
        table.insert("sql", "sql");
        // Compiled
        table.insert("java", "java");
        table.insert("kt", "kotlin");
        table.insert("scala", "scala");
        table.insert("c", "c");
        table.insert("h", "c");
        table.insert("cpp", "cpp");
        table.insert("cc", "cpp");
        table.insert("hpp", "cpp");
        table.insert("cs", "csharp");
        table.insert("go", "go");
        table.insert("rs", "rust");
        table.insert("swift", "swift");
        table.insert("dart", "dart");
        table
    };
}

/// Language for a file name or path, matched on its lowercased extension.
pub fn classify(file_name: &str) -> Option<&'static str> {
    let base = file_name.rsplit('/').next().unwrap_or(file_name);
    let (stem, ext) = base.rsplit_once('.')?;
    // ".gitignore" style dotfiles carry no extension
    if stem.is_empty() {
        return None;
    }
    EXTENSION_LANGUAGES
        .get(ext.to_ascii_lowercase().as_str())
        .copied()
}

/// Language tag for DTOs: empty when the extension is unknown.
pub fn language_tag(file_name: &str) -> String {
    classify(file_name).unwrap_or_default().to_string()
}

pub fn supported_extensions() -> Vec<&'static str> {
    let mut exts: Vec<_> = EXTENSION_LANGUAGES.keys().copied().collect();
    exts.sort_unstable();
    exts
}
