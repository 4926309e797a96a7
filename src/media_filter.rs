//! Media classification for catalog attachment.
//!
//! Every asset coming off the feed gets exactly one kind:
//! 1. Declared MIME type wins when it carries an `image/` or `video/` prefix
//! 2. Otherwise the filename extension decides against two fixed sets
//! 3. Anything left over is EXTERNAL_VIDEO — the catalog accepts that kind
//!    for arbitrary externally-hosted media, so it is the safe fallback

/// Media kinds understood by the catalog's create-media call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Image,
    Video,
    ExternalVideo,
}

const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "webp", "gif"];
const VIDEO_EXTENSIONS: [&str; 4] = ["mp4", "mov", "webm", "m4v"];

impl MediaKind {
    /// Wire value expected by the catalog API.
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "IMAGE",
            MediaKind::Video => "VIDEO",
            MediaKind::ExternalVideo => "EXTERNAL_VIDEO",
        }
    }
}

/// Classify an asset from its declared type and filename. Total: every input
/// maps to exactly one kind.
pub fn classify(declared_type: Option<&str>, filename: &str) -> MediaKind {
    if let Some(raw) = declared_type {
        let mime = raw.trim().to_ascii_lowercase();
        if mime.starts_with("image/") {
            return MediaKind::Image;
        }
        if mime.starts_with("video/") {
            return MediaKind::Video;
        }
        // Non-media MIME (application/pdf etc.) falls through to the extension.
    }

    if let Some(ext) = extension_of(filename) {
        if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            return MediaKind::Image;
        }
        if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            return MediaKind::Video;
        }
    }

    MediaKind::ExternalVideo
}

fn extension_of(filename: &str) -> Option<String> {
    let (stem, ext) = filename.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Last path segment of a URL, percent-decoded. Falls back to plain string
/// slicing when the URL does not parse as absolute.
pub fn filename_from_url(url: &str) -> String {
    let segment = match url::Url::parse(url) {
        Ok(parsed) => parsed
            .path_segments()
            .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
            .map(|s| s.to_string())
            .unwrap_or_default(),
        Err(_) => {
            // Relative or otherwise unparseable: strip query/fragment by hand.
            let without_extra = url.split(|c: char| c == '?' || c == '#').next().unwrap_or("");
            without_extra
                .rsplit('/')
                .find(|s| !s.is_empty())
                .unwrap_or("")
                .to_string()
        }
    };
    match urlencoding::decode(&segment) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => segment,
    }
}
