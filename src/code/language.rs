//! Language detection from file extensions

use std::path::Path;

const EXTENSIONS: &[(&str, &str)] = &[
    ("py", "python"),
    ("js", "javascript"),
    ("jsx", "javascript"),
    ("ts", "typescript"),
    ("tsx", "typescript"),
    ("cs", "csharp"),
    ("java", "java"),
    ("cpp", "cpp"),
    ("cc", "cpp"),
    ("cxx", "cpp"),
    ("c", "c"),
    ("h", "c"),
    ("hpp", "cpp"),
    ("go", "go"),
    ("rs", "rust"),
    ("rb", "ruby"),
    ("php", "php"),
    ("swift", "swift"),
    ("kt", "kotlin"),
    ("scala", "scala"),
    ("sh", "shell"),
    ("bash", "shell"),
    ("ps1", "powershell"),
    ("sql", "sql"),
    ("html", "html"),
    ("htm", "html"),
    ("css", "css"),
    ("scss", "scss"),
    ("sass", "sass"),
    ("less", "less"),
    ("xml", "xml"),
    ("json", "json"),
    ("yaml", "yaml"),
    ("yml", "yaml"),
    ("md", "markdown"),
    ("r", "r"),
    ("dart", "dart"),
    ("lua", "lua"),
    ("vim", "vim"),
    ("el", "elisp"),
    ("clj", "clojure"),
    ("ex", "elixir"),
    ("erl", "erlang"),
    ("fs", "fsharp"),
    ("vue", "vue"),
    ("svelte", "svelte"),
];

pub fn language_for_path(path: &str) -> Option<&'static str> {
    let ext = Path::new(path).extension()?.to_str()?.to_ascii_lowercase();
    EXTENSIONS
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, lang)| *lang)
}

/// Unique languages across `paths`, most frequent first, ties in first-seen order
pub fn detect_languages<'a>(paths: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut counts: Vec<(&'static str, usize)> = Vec::new();
    for lang in paths.into_iter().filter_map(language_for_path) {
        match counts.iter_mut().find(|(l, _)| *l == lang) {
            Some((_, n)) => *n += 1,
            None => counts.push((lang, 1)),
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts.into_iter().map(|(l, _)| l.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_for_path() {
        assert_eq!(language_for_path("src/main.rs"), Some("rust"));
        assert_eq!(language_for_path("analysis.R"), Some("r"));
        assert_eq!(language_for_path("Makefile"), None);
        assert_eq!(language_for_path("notes.txt"), None);
    }

    #[test]
    fn test_most_common_first() {
        let langs = detect_languages(["a.md", "b.py", "c.py", "d.txt"]);
        assert_eq!(langs, vec!["python", "markdown"]);
    }
}
