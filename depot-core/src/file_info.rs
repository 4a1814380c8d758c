//! File-info resolution: MIME type and compression flags from a path.

use serde::Serialize;

/// Extension -> MIME type table for the assets a registry serves.
const MIME_TYPES: &[(&str, &str)] = &[
    (".js", "application/javascript"),
    (".mjs", "application/javascript"),
    (".cjs", "application/javascript"),
    (".json", "application/json"),
    (".map", "application/json"),
    (".css", "text/css"),
    (".html", "text/html"),
    (".htm", "text/html"),
    (".txt", "text/plain"),
    (".md", "text/markdown"),
    (".csv", "text/csv"),
    (".xml", "application/xml"),
    (".yaml", "application/x-yaml"),
    (".yml", "application/x-yaml"),
    (".svg", "image/svg+xml"),
    (".png", "image/png"),
    (".jpg", "image/jpeg"),
    (".jpeg", "image/jpeg"),
    (".gif", "image/gif"),
    (".ico", "image/x-icon"),
    (".webp", "image/webp"),
    (".woff", "font/woff"),
    (".woff2", "font/woff2"),
    (".ttf", "font/ttf"),
    (".otf", "font/otf"),
    (".eot", "application/vnd.ms-fontobject"),
    (".wasm", "application/wasm"),
    (".pdf", "application/pdf"),
    (".zip", "application/zip"),
    (".tar", "application/x-tar"),
    (".gz", "application/gzip"),
];

const GZIP_EXTENSION: &str = ".gz";
const BROTLI_EXTENSION: &str = ".br";

/// What a path says about the file it names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileInfo {
    /// MIME type for the (uncompressed) extension, if known.
    pub mime_type: Option<&'static str>,
    /// Path ends in `.gz`.
    pub gzip: bool,
    /// Path ends in `.br` (after any `.gz` suffix is removed).
    pub br: bool,
    /// Lowercased extension of the payload, including the leading dot.
    /// Empty when the path has no extension.
    pub extname: String,
}

/// Look up the MIME type for a lowercased extension such as `".css"`.
pub fn mime_type_for(extension: &str) -> Option<&'static str> {
    MIME_TYPES
        .iter()
        .find(|(ext, _)| *ext == extension)
        .map(|(_, mime)| *mime)
}

/// Extension of the last path segment, including the dot.
///
/// Dotfiles such as `.npmrc` have no extension.
pub fn extname(path: &str) -> &str {
    let base = path.rsplit('/').next().unwrap_or(path);
    match base.rfind('.') {
        Some(idx) if base[..idx].chars().any(|c| c != '.') => &base[idx..],
        _ => "",
    }
}

/// Resolve MIME type and compression flags for `path`.
///
/// Never fails: unknown extensions produce `mime_type: None` and no
/// compression flags.
pub fn get_file_info(path: &str) -> FileInfo {
    let mut stem = path;
    let mut ext = extname(stem).to_ascii_lowercase();
    let mut gzip = false;
    let mut br = false;

    if ext == GZIP_EXTENSION {
        gzip = true;
        stem = &stem[..stem.len() - GZIP_EXTENSION.len()];
        ext = extname(stem).to_ascii_lowercase();
    }
    if ext == BROTLI_EXTENSION {
        br = true;
        stem = &stem[..stem.len() - BROTLI_EXTENSION.len()];
        ext = extname(stem).to_ascii_lowercase();
    }

    FileInfo {
        mime_type: mime_type_for(&ext),
        gzip,
        br,
        extname: ext,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_gzipped_javascript() {
        let info = get_file_info("app.js.gz");
        assert!(info.gzip);
        assert!(!info.br);
        assert_eq!(info.extname, ".js");
        assert_eq!(info.mime_type, Some("application/javascript"));
    }

    #[test]
    fn test_plain_css() {
        let info = get_file_info("style.css");
        assert!(!info.gzip);
        assert!(!info.br);
        assert_eq!(info.extname, ".css");
        assert_eq!(info.mime_type, Some("text/css"));
    }

    #[test]
    fn test_brotli_html() {
        let info = get_file_info("components/foo/1.0.0/template.HTML.br");
        assert!(info.br);
        assert!(!info.gzip);
        assert_eq!(info.extname, ".html");
        assert_eq!(info.mime_type, Some("text/html"));
    }

    #[test]
    fn test_brotli_then_gzip() {
        let info = get_file_info("bundle.js.br.gz");
        assert!(info.gzip);
        assert!(info.br);
        assert_eq!(info.extname, ".js");
    }

    #[test]
    fn test_unknown_extension() {
        let info = get_file_info("data.unknownext");
        assert_eq!(info.mime_type, None);
        assert_eq!(info.extname, ".unknownext");
        assert!(!info.gzip);
    }

    #[test]
    fn test_no_extension_and_dotfiles() {
        assert_eq!(extname("Makefile"), "");
        assert_eq!(extname("dir.v1/.npmrc"), "");
        assert_eq!(extname("dir.v1/file"), "");
        assert_eq!(get_file_info("LICENSE").mime_type, None);
    }

    #[test]
    fn test_bare_gz_is_gzip_without_payload_type() {
        let info = get_file_info("archive.gz");
        assert!(info.gzip);
        assert_eq!(info.extname, "");
        assert_eq!(info.mime_type, None);
    }

    #[test]
    fn test_uppercase_extension() {
        let info = get_file_info("IMAGE.PNG");
        assert_eq!(info.extname, ".png");
        assert_eq!(info.mime_type, Some("image/png"));
    }

    proptest! {
        #[test]
        fn prop_get_file_info_never_panics(path in "\\PC{0,64}") {
            let _ = get_file_info(&path);
        }

        #[test]
        fn prop_gz_suffix_sets_gzip(stem in "[a-z]{1,12}", ext in "(js|css|html|json)") {
            let plain = get_file_info(&format!("{}.{}", stem, ext));
            let gzipped = get_file_info(&format!("{}.{}.gz", stem, ext));
            prop_assert!(gzipped.gzip);
            prop_assert!(!plain.gzip);
            prop_assert_eq!(plain.extname, gzipped.extname);
            prop_assert_eq!(plain.mime_type, gzipped.mime_type);
        }
    }
}
