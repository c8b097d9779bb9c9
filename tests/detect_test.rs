use gallery_gate::storage::detect::{detect_media_type, MediaType};

#[test]
fn test_detect_jpeg() {
    let header = [0xFF, 0xD8, 0xFF, 0xE1, 0x00, 0x10, b'E', b'x', b'i', b'f'];
    assert_eq!(detect_media_type(&header), MediaType::Jpeg);
    assert_eq!(MediaType::Jpeg.content_type(), "image/jpeg");
}

#[test]
fn test_detect_png() {
    let header = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 13];
    assert_eq!(detect_media_type(&header), MediaType::Png);
}

#[test]
fn test_detect_gif_and_webp() {
    assert_eq!(detect_media_type(b"GIF89a\x01\x00"), MediaType::Gif);
    assert_eq!(detect_media_type(b"GIF87a\x01\x00"), MediaType::Gif);

    let mut webp = Vec::new();
    webp.extend_from_slice(b"RIFF");
    webp.extend_from_slice(&1024u32.to_le_bytes());
    webp.extend_from_slice(b"WEBPVP8 ");
    assert_eq!(detect_media_type(&webp), MediaType::WebP);
}

#[test]
fn test_detect_iso_bmff_brands() {
    // ISO-BMFF: size, "ftyp", major brand.
    let mut heic = vec![0u8; 16];
    heic[0..4].copy_from_slice(&24u32.to_be_bytes());
    heic[4..8].copy_from_slice(b"ftyp");
    heic[8..12].copy_from_slice(b"heic");
    assert_eq!(detect_media_type(&heic), MediaType::Heic);

    let mut mp4 = heic.clone();
    mp4[8..12].copy_from_slice(b"isom");
    assert_eq!(detect_media_type(&mp4), MediaType::Mp4);
}

#[test]
fn test_detect_tiff_and_bmp() {
    assert_eq!(detect_media_type(b"II*\0\x08\0\0\0"), MediaType::Tiff);
    assert_eq!(detect_media_type(b"MM\0*\0\0\0\x08"), MediaType::Tiff);
    assert_eq!(detect_media_type(b"BM\x36\x00"), MediaType::Bmp);
}

#[test]
fn test_detect_unknown() {
    assert_eq!(detect_media_type(&[]), MediaType::Unknown);
    assert_eq!(detect_media_type(b"hello world"), MediaType::Unknown);
    assert_eq!(
        MediaType::Unknown.content_type(),
        "application/octet-stream"
    );
}
