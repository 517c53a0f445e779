//! Request path mapping and HTML directory listings

use std::io;
use std::path::{Component, Path, PathBuf};

/// Why a request path can't be mapped onto the served directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    /// Percent-encoding doesn't decode to UTF-8
    Undecodable,
    /// `..`, a separator or a drive prefix inside a segment
    Traversal,
}

/// Percent-decode the path part of a request URI
pub fn decode(request_path: &str) -> Result<String, PathError> {
    urlencoding::decode(request_path)
        .map(|p| p.into_owned())
        .map_err(|_| PathError::Undecodable)
}

/// Map a decoded request path onto `root`. Never escapes `root`.
pub fn resolve(root: &Path, decoded_path: &str) -> Result<PathBuf, PathError> {
    let mut path = root.to_path_buf();

    for segment in decoded_path.split('/') {
        if segment.is_empty() || segment == "." {
            continue;
        }
        if segment.contains('\\') || segment.contains('\0') {
            return Err(PathError::Traversal);
        }

        let mut components = Path::new(segment).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) => path.push(name),
            _ => return Err(PathError::Traversal),
        }
    }

    Ok(path)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
}

/// Entries of `dir`, sorted by name. Symlinks are followed to decide `is_dir`.
pub async fn read_entries(dir: &Path) -> io::Result<Vec<DirEntry>> {
    let mut read_dir = tokio::fs::read_dir(dir).await?;
    let mut entries = Vec::new();

    while let Some(entry) = read_dir.next_entry().await? {
        let is_dir = tokio::fs::metadata(entry.path())
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);

        entries.push(DirEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            is_dir,
        });
    }

    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

/// Render the listing page for `decoded_path`.
///
/// Links are relative, so `decoded_path` must end with `/`.
pub fn render(decoded_path: &str, entries: &[DirEntry]) -> String {
    let title = html_escape(decoded_path);
    let mut html = format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width">
<title>Index of {}</title>
</head>
<body>
<h1>Index of {}</h1>
<pre>
"#,
        title, title
    );

    if decoded_path != "/" {
        html.push_str("<a href=\"../\">../</a>\n");
    }

    for entry in entries {
        let suffix = if entry.is_dir { "/" } else { "" };
        html.push_str(&format!(
            "<a href=\"{}{}\">{}{}</a>\n",
            html_escape(&urlencoding::encode(&entry.name)),
            suffix,
            html_escape(&entry.name),
            suffix
        ));
    }

    html.push_str("</pre>\n</body>\n</html>\n");
    html
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode() {
        assert_eq!(decode("/a%20b/c.txt").unwrap(), "/a b/c.txt");
        assert_eq!(decode("/%FF"), Err(PathError::Undecodable));
    }

    #[test]
    fn test_resolve_stays_under_root() {
        let root = Path::new("/srv/files");

        assert_eq!(resolve(root, "/").unwrap(), PathBuf::from("/srv/files"));
        assert_eq!(
            resolve(root, "/docs/./a b.txt").unwrap(),
            PathBuf::from("/srv/files/docs/a b.txt")
        );
        assert_eq!(
            resolve(root, "//docs//").unwrap(),
            PathBuf::from("/srv/files/docs")
        );
    }

    #[test]
    fn test_resolve_rejects_traversal() {
        let root = Path::new("/srv/files");

        assert_eq!(resolve(root, "/../etc/passwd"), Err(PathError::Traversal));
        assert_eq!(resolve(root, "/docs/../../x"), Err(PathError::Traversal));
        assert_eq!(resolve(root, "/..\\x"), Err(PathError::Traversal));
        assert_eq!(resolve(root, "/a\0b"), Err(PathError::Traversal));
    }

    #[test]
    fn test_render_escapes_and_encodes() {
        let entries = vec![
            DirEntry {
                name: "<b>&.txt".to_string(),
                is_dir: false,
            },
            DirEntry {
                name: "sub dir".to_string(),
                is_dir: true,
            },
        ];

        let html = render("/docs/", &entries);

        assert!(html.contains("<title>Index of /docs/</title>"));
        assert!(html.contains(r#"<a href="../">../</a>"#));
        assert!(html.contains(r#"<a href="%3Cb%3E%26.txt">&lt;b&gt;&amp;.txt</a>"#));
        assert!(html.contains(r#"<a href="sub%20dir/">sub dir/</a>"#));
    }

    #[test]
    fn test_render_root_has_no_parent_link() {
        let html = render("/", &[]);
        assert!(!html.contains("../"));
    }

    #[tokio::test]
    async fn test_read_entries_sorted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), "b").unwrap();
        std::fs::write(dir.path().join("a.txt"), "a").unwrap();
        std::fs::create_dir(dir.path().join("c")).unwrap();

        let entries = read_entries(dir.path()).await.unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();

        assert_eq!(names, vec!["a.txt", "b.txt", "c"]);
        assert!(entries[2].is_dir);
        assert!(!entries[0].is_dir);
    }
}
