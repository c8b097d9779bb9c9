/// Number of leading bytes needed by [`detect_media_type`].
pub const SNIFF_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Jpeg,
    Png,
    Gif,
    WebP,
    Bmp,
    Tiff,
    Heic,
    Mp4,
    Unknown,
}

impl MediaType {
    pub fn content_type(&self) -> &'static str {
        match self {
            MediaType::Jpeg => "image/jpeg",
            MediaType::Png => "image/png",
            MediaType::Gif => "image/gif",
            MediaType::WebP => "image/webp",
            MediaType::Bmp => "image/bmp",
            MediaType::Tiff => "image/tiff",
            MediaType::Heic => "image/heic",
            MediaType::Mp4 => "video/mp4",
            MediaType::Unknown => "application/octet-stream",
        }
    }
}

/// Detect an image format from the first bytes of an object.
pub fn detect_media_type(header: &[u8]) -> MediaType {
    if header.len() >= 3 && header[0..3] == [0xFF, 0xD8, 0xFF] {
        return MediaType::Jpeg;
    }

    if header.len() >= 8 && header[0..8] == [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A] {
        return MediaType::Png;
    }

    if header.len() >= 6 && (&header[0..6] == b"GIF87a" || &header[0..6] == b"GIF89a") {
        return MediaType::Gif;
    }

    // RIFF container: "RIFF" <size:4> "WEBP"
    if header.len() >= 12 && &header[0..4] == b"RIFF" && &header[8..12] == b"WEBP" {
        return MediaType::WebP;
    }

    // ISO-BMFF: bytes 4..8 == "ftyp", major brand at 8..12
    if header.len() >= 12 && &header[4..8] == b"ftyp" {
        return match &header[8..12] {
            b"heic" | b"heix" | b"mif1" | b"msf1" => MediaType::Heic,
            _ => MediaType::Mp4,
        };
    }

    if header.len() >= 4 && (header[0..4] == *b"II*\0" || header[0..4] == *b"MM\0*") {
        return MediaType::Tiff;
    }

    if header.len() >= 2 && &header[0..2] == b"BM" {
        return MediaType::Bmp;
    }

    MediaType::Unknown
}
