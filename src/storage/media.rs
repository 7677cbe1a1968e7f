//! Extension based media type guessing for generic HTTP downloads.
//!
//! Suffix aliases are expanded first (`.tgz` is `.tar.gz`), then a content
//! encoding is peeled off the end, then `mime_guess` maps the remaining
//! extension. Only encodings the archive extractor can decode are peeled.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Tar,
    Zip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentEncoding {
    Gzip,
    Bzip2,
}

const SUFFIX_ALIASES: [(&str, &str); 3] = [
    (".tgz", ".tar.gz"),
    (".taz", ".tar.gz"),
    (".tbz2", ".tar.bz2"),
];

const ENCODINGS: [(&str, ContentEncoding); 2] = [
    (".gz", ContentEncoding::Gzip),
    (".bz2", ContentEncoding::Bzip2),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MediaGuess {
    /// Set only for archive types, everything else is opaque.
    pub media_type: Option<MediaType>,
    pub encoding: Option<ContentEncoding>,
}

impl MediaGuess {
    pub fn from_path(path: &str) -> Self {
        let (mut base, mut ext) = split_ext(path);
        while let Some((_, alias)) = SUFFIX_ALIASES.iter().find(|(s, _)| *s == ext) {
            (base, ext) = split_ext(&format!("{base}{alias}"));
        }

        let encoding = ENCODINGS
            .iter()
            .find(|(s, _)| *s == ext)
            .map(|(_, encoding)| *encoding);
        if encoding.is_some() {
            ext = split_ext(&base).1;
        }

        let media_type = ext.strip_prefix('.').and_then(|ext| {
            mime_guess::from_ext(ext)
                .iter_raw()
                .find_map(|mime| match mime {
                    "application/x-tar" => Some(MediaType::Tar),
                    "application/zip" | "application/x-zip-compressed" => Some(MediaType::Zip),
                    _ => None,
                })
        });

        Self {
            media_type,
            encoding,
        }
    }

    pub fn is_archive(&self) -> bool {
        self.media_type.is_some()
    }

    /// Content-Type prefix the server must answer with.
    pub fn expected_content_type(&self) -> &'static str {
        match self.media_type {
            Some(MediaType::Zip) => "application/zip",
            Some(MediaType::Tar) => "application/x-tar",
            None => "application/octet-stream",
        }
    }
}

fn split_ext(path: &str) -> (String, String) {
    let name_start = path.rfind('/').map_or(0, |i| i + 1);
    let name = &path[name_start..];
    match name.rfind('.') {
        // leading dots belong to the name (".bashrc" has no extension)
        Some(dot) if name[..dot].chars().any(|c| c != '.') => (
            path[..name_start + dot].to_owned(),
            path[name_start + dot..].to_owned(),
        ),
        _ => (path.to_owned(), String::new()),
    }
}
