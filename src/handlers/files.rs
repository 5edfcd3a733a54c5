use super::response::Reply;
use super::ServeContext;
use html_escape::{encode_double_quoted_attribute, encode_text};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use smol::stream::StreamExt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Characters escaped in listing hrefs. `/` is kept so directory links stay relative.
const HREF_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct TranslatedPath {
    pub path: PathBuf,
    pub trailing_slash: bool,
}

/// Maps a request target onto the filesystem below `root`.
///
/// Query and fragment are dropped and the path is percent-decoded. Empty,
/// `.` and `..` segments are skipped, so the result never leaves `root`.
pub(super) fn translate_path(root: &Path, target: &str) -> TranslatedPath {
    let raw_path = split_target(target).0;
    let decoded = percent_decode_str(raw_path).decode_utf8_lossy();
    let trailing_slash = decoded.trim_end().ends_with('/');

    let mut path = root.to_path_buf();
    for segment in decoded.split('/') {
        if segment.is_empty()
            || segment == "."
            || segment == ".."
            || segment.contains('\\')
            || segment.contains('\0')
        {
            continue;
        }
        path.push(segment);
    }

    TranslatedPath {
        path,
        trailing_slash,
    }
}

/// Splits a target into its path and the remainder starting at `?` or `#`.
fn split_target(target: &str) -> (&str, &str) {
    match target.find(|c: char| c == '?' || c == '#') {
        Some(pos) => target.split_at(pos),
        None => (target, ""),
    }
}

pub(super) async fn serve_target(ctx: &ServeContext, target: &str) -> Reply {
    let translated = translate_path(&ctx.root, target);
    let metadata = match smol::fs::metadata(&translated.path).await {
        Ok(metadata) => metadata,
        Err(e) => {
            debug!(path = %translated.path.display(), error = %e, "Path not found");
            return Reply::error(404, "File not found");
        }
    };

    if metadata.is_dir() {
        let (raw_path, rest) = split_target(target);
        if !translated.trailing_slash {
            return Reply::redirect(format!("{}/{}", raw_path, rest));
        }
        for index in &ctx.config.index_files {
            let candidate = translated.path.join(index);
            if smol::fs::metadata(&candidate)
                .await
                .map(|m| m.is_file())
                .unwrap_or(false)
            {
                return serve_file(&candidate).await;
            }
        }
        if !ctx.config.directory_listing {
            return Reply::error(404, "No permission to list directory");
        }
        let display_path = percent_decode_str(raw_path).decode_utf8_lossy();
        return match list_directory(&translated.path).await {
            Ok(entries) => Reply::bytes(
                200,
                "text/html; charset=utf-8",
                render_listing(&display_path, entries).into_bytes(),
            ),
            Err(e) => {
                debug!(path = %translated.path.display(), error = %e, "Directory listing failed");
                Reply::error(404, "No permission to list directory")
            }
        };
    }

    if translated.trailing_slash {
        return Reply::error(404, "File not found");
    }
    serve_file(&translated.path).await
}

async fn serve_file(path: &Path) -> Reply {
    let file = match smol::fs::File::open(path).await {
        Ok(file) => file,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Failed to open file");
            return Reply::error(404, "File not found");
        }
    };
    let len = match file.metadata().await {
        Ok(metadata) => metadata.len(),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Failed to stat file");
            return Reply::error(404, "File not found");
        }
    };
    let content_type = mime_guess::from_path(path).first_or_octet_stream();
    Reply::file(file, len, content_type.essence_str())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct ListingEntry {
    pub name: String,
    pub is_dir: bool,
    pub is_symlink: bool,
}

async fn list_directory(dir: &Path) -> std::io::Result<Vec<ListingEntry>> {
    let mut entries = Vec::new();
    let mut read_dir = smol::fs::read_dir(dir).await?;
    while let Some(entry) = read_dir.next().await {
        let entry = entry?;
        let is_symlink = entry
            .file_type()
            .await
            .map(|t| t.is_symlink())
            .unwrap_or(false);
        let is_dir = smol::fs::metadata(entry.path())
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        entries.push(ListingEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            is_dir,
            is_symlink,
        });
    }
    Ok(entries)
}

pub(super) fn render_listing(display_path: &str, mut entries: Vec<ListingEntry>) -> String {
    entries.sort_by_key(|entry| entry.name.to_lowercase());

    let title = format!("Directory listing for {}", encode_text(display_path));
    let mut html = String::with_capacity(256 + entries.len() * 64);
    html.push_str("<!DOCTYPE HTML>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str(&format!("<title>{}</title>\n</head>\n<body>\n", title));
    html.push_str(&format!("<h1>{}</h1>\n<hr>\n<ul>\n", title));

    for entry in &entries {
        let mut display_name = entry.name.clone();
        let mut link_name = entry.name.clone();
        if entry.is_dir {
            display_name.push('/');
            link_name.push('/');
        }
        if entry.is_symlink {
            display_name = format!("{}@", entry.name);
        }
        let href = utf8_percent_encode(&link_name, HREF_ENCODE_SET).to_string();
        html.push_str(&format!(
            "<li><a href=\"{}\">{}</a></li>\n",
            encode_double_quoted_attribute(&href),
            encode_text(&display_name)
        ));
    }

    html.push_str("</ul>\n<hr>\n</body>\n</html>\n");
    html
}
