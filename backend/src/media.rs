use axum::http::header;
use axum::response::{IntoResponse, Response};

/// Guesses an image MIME type from its leading bytes.
pub fn sniff_content_type(bytes: &[u8]) -> &'static str {
    match bytes {
        [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, ..] => "image/png",
        [0xFF, 0xD8, 0xFF, ..] => "image/jpeg",
        [b'G', b'I', b'F', b'8', b'7' | b'9', b'a', ..] => "image/gif",
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => "image/webp",
        _ => "application/octet-stream",
    }
}

/// Serves stored image bytes with a sniffed content type.
pub fn image_response(bytes: Vec<u8>) -> Response {
    let content_type = sniff_content_type(&bytes);
    (
        [
            (header::CONTENT_TYPE, content_type),
            (header::CACHE_CONTROL, "public, max-age=3600"),
        ],
        bytes,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0x00], "image/png")]
    #[case(&[0xFF, 0xD8, 0xFF, 0xE0], "image/jpeg")]
    #[case(b"GIF89a....", "image/gif")]
    #[case(b"RIFF\x10\x00\x00\x00WEBPVP8 ", "image/webp")]
    #[case(b"%PDF-1.7", "application/octet-stream")]
    #[case(&[], "application/octet-stream")]
    fn sniffs_common_image_formats(#[case] bytes: &[u8], #[case] expected: &str) {
        assert_eq!(sniff_content_type(bytes), expected);
    }

    #[test]
    fn image_response_sets_content_type() {
        let response = image_response(vec![0xFF, 0xD8, 0xFF, 0xDB]);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/jpeg");
    }
}
