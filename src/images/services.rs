use anyhow::Context;
use bytes::Bytes;
use rand::Rng;
use time::{macros::format_description, OffsetDateTime};
use tracing::{debug, warn};

use crate::state::AppState;

pub const PROFILE_IMAGE_TYPES: &[&str] = &["image/png", "image/jpeg"];
pub const PROFILE_IMAGE_MAX_KB: usize = 5120;

/// One file part taken from a multipart request.
#[derive(Debug, Clone)]
pub struct UploadItem {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub body: Bytes,
}

/// Detects the image type from magic bytes; the client-declared type is not trusted.
pub fn sniff_mime(body: &[u8]) -> Option<&'static str> {
    if body.starts_with(b"\x89PNG\r\n\x1a\n") {
        Some("image/png")
    } else if body.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if body.starts_with(b"GIF87a") || body.starts_with(b"GIF89a") {
        Some("image/gif")
    } else if body.len() >= 12 && &body[..4] == b"RIFF" && &body[8..12] == b"WEBP" {
        Some("image/webp")
    } else {
        None
    }
}

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        _ => None,
    }
}

fn sanitize_username(username: &str) -> String {
    username
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect()
}

/// `{username}_{ddmmyy}{unix_seconds}_{20 hex}.{ext}`
fn generate_filename(username: &str, ext: &str, now: OffsetDateTime) -> anyhow::Result<String> {
    let date = now
        .format(format_description!("[day][month][year repr:last_two]"))
        .context("format upload date")?;
    let suffix: [u8; 10] = rand::thread_rng().gen();
    let hex: String = suffix.iter().map(|b| format!("{:02x}", b)).collect();
    Ok(format!(
        "{}_{}{}_{}.{}",
        sanitize_username(username),
        date,
        now.unix_timestamp(),
        hex,
        ext
    ))
}

/// Writes an accepted profile image and returns its generated filename.
/// Uploads that are empty or not PNG/JPEG within the size limit are skipped.
pub async fn store_profile_image(
    st: &AppState,
    upload: &UploadItem,
    username: &str,
) -> anyhow::Result<Option<String>> {
    if upload.body.is_empty() || upload.body.len() > PROFILE_IMAGE_MAX_KB * 1024 {
        return Ok(None);
    }
    let Some(ext) = sniff_mime(&upload.body)
        .filter(|m| PROFILE_IMAGE_TYPES.contains(m))
        .and_then(ext_from_mime)
    else {
        return Ok(None);
    };

    let file_name = generate_filename(username, ext, OffsetDateTime::now_utc())?;
    st.storage
        .put_object(&file_name, upload.body.clone())
        .await
        .with_context(|| format!("store profile image {}", file_name))?;
    debug!(
        file_name = %file_name,
        original = ?upload.file_name,
        declared = ?upload.content_type,
        bytes = upload.body.len(),
        "profile image stored"
    );
    Ok(Some(file_name))
}

/// Public URL for a stored filename; an empty name stays empty.
pub fn profile_image_url(st: &AppState, file_name: &str) -> String {
    if file_name.is_empty() {
        return String::new();
    }
    st.storage.public_url(file_name)
}

/// Best effort: nothing to do without a filename, and failures are only logged.
pub async fn delete_profile_image(st: &AppState, file_name: Option<&str>) {
    let Some(file_name) = file_name.filter(|f| !f.is_empty()) else {
        return;
    };
    if let Err(e) = st.storage.delete_object(file_name).await {
        warn!(error = ?e, file_name, "failed to delete profile image");
    }
}

#[cfg(test)]
mod image_tests {
    use super::*;
    use crate::state::AppState;
    use time::macros::datetime;

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";
    const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0, 0x10, b'J', b'F', b'I', b'F'];

    fn item(body: &[u8]) -> UploadItem {
        UploadItem {
            file_name: Some("me.bin".into()),
            content_type: Some("application/octet-stream".into()),
            body: Bytes::copy_from_slice(body),
        }
    }

    #[test]
    fn test_sniff_mime() {
        assert_eq!(sniff_mime(PNG), Some("image/png"));
        assert_eq!(sniff_mime(JPEG), Some("image/jpeg"));
        assert_eq!(sniff_mime(b"GIF89a\x01\x00"), Some("image/gif"));
        assert_eq!(sniff_mime(b"RIFF\0\0\0\0WEBPVP8 "), Some("image/webp"));
        assert_eq!(sniff_mime(b"%PDF-1.7"), None);
        assert_eq!(sniff_mime(b""), None);
    }

    #[test]
    fn test_ext_from_mime() {
        assert_eq!(ext_from_mime("image/jpeg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/png"), Some("png"));
        assert_eq!(ext_from_mime("image/gif"), None);
    }

    #[test]
    fn filename_layout() {
        let now = datetime!(2023-04-18 06:02:07 UTC);
        let name = generate_filename("../bob", "png", now).unwrap();
        let prefix = format!("bob_180423{}_", now.unix_timestamp());
        assert!(name.starts_with(&prefix), "{}", name);
        assert!(name.ends_with(".png"));
        let hex = &name[prefix.len()..name.len() - ".png".len()];
        assert_eq!(hex.len(), 20);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn store_writes_accepted_images() {
        let state = AppState::fake();
        let name = store_profile_image(&state, &item(JPEG), "alice")
            .await
            .unwrap()
            .expect("jpeg accepted");
        assert!(name.starts_with("alice_"));
        assert!(name.ends_with(".jpg"));
        assert!(state.image_path(&name).exists());
    }

    #[tokio::test]
    async fn store_skips_invalid_uploads() {
        let state = AppState::fake();
        assert_eq!(store_profile_image(&state, &item(b""), "a").await.unwrap(), None);
        assert_eq!(
            store_profile_image(&state, &item(b"GIF89a\x01\x00"), "a").await.unwrap(),
            None
        );
        let mut big = PNG.to_vec();
        big.resize(PROFILE_IMAGE_MAX_KB * 1024 + 1, 0);
        assert_eq!(store_profile_image(&state, &item(&big), "a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn url_and_delete() {
        let state = AppState::fake();
        assert_eq!(profile_image_url(&state, ""), "");
        assert_eq!(
            profile_image_url(&state, "a.jpg"),
            "https://fake.local/images/user/a.jpg"
        );

        let name = store_profile_image(&state, &item(PNG), "carol")
            .await
            .unwrap()
            .unwrap();
        delete_profile_image(&state, Some(name.as_str())).await;
        assert!(!state.image_path(&name).exists());

        // no reference, or reference to a file that is already gone
        delete_profile_image(&state, None).await;
        delete_profile_image(&state, Some("")).await;
        delete_profile_image(&state, Some(name.as_str())).await;
    }
}
