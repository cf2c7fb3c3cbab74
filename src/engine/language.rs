/// Language id used when nothing in the extension table matches.
pub const PLAINTEXT: &str = "plaintext";

/// Extension (lowercase, without the dot) → language id.
const EXTENSIONS: &[(&str, &str)] = &[
    ("md", "markdown"),
    ("markdown", "markdown"),
    ("mdx", "markdown"),
    ("ts", "typescript"),
    ("tsx", "typescript"),
    ("mts", "typescript"),
    ("cts", "typescript"),
    ("js", "javascript"),
    ("jsx", "javascript"),
    ("mjs", "javascript"),
    ("cjs", "javascript"),
    ("json", "json"),
    ("jsonc", "json"),
    ("json5", "json"),
    ("css", "css"),
    ("scss", "scss"),
    ("less", "less"),
    ("html", "html"),
    ("htm", "html"),
    ("py", "python"),
    ("rs", "rust"),
    ("go", "go"),
    ("java", "java"),
    ("c", "c"),
    ("h", "c"),
    ("cpp", "cpp"),
    ("cc", "cpp"),
    ("hpp", "cpp"),
    ("rb", "ruby"),
    ("yaml", "yaml"),
    ("yml", "yaml"),
    ("sql", "sql"),
    ("psql", "sql"),
    ("plsql", "sql"),
    ("sh", "shell"),
    ("bash", "shell"),
    ("zsh", "shell"),
    ("xml", "xml"),
    ("ini", "ini"),
    ("conf", "ini"),
    ("config", "ini"),
    ("env", "ini"),
];

/// Resolve the language id for a file path.
///
/// Only the final path segment is considered, and only the text after its last
/// `.`; `archive.tar.gz` resolves by `gz`. Empty paths, names without a dot and
/// unknown extensions all resolve to [`PLAINTEXT`].
pub fn language_for_path<'a>(path: impl Into<Option<&'a str>>) -> &'static str {
    let Some(path) = path.into() else {
        return PLAINTEXT;
    };

    let name = path.rsplit(['/', '\\']).next().unwrap_or("");
    let Some((_, ext)) = name.rsplit_once('.') else {
        return PLAINTEXT;
    };
    if ext.is_empty() {
        return PLAINTEXT;
    }

    let ext = ext.to_ascii_lowercase();
    EXTENSIONS
        .iter()
        .find(|(candidate, _)| *candidate == ext)
        .map(|(_, language)| *language)
        .unwrap_or(PLAINTEXT)
}
