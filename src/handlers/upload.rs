use actix_multipart::{Field, Multipart};
use actix_web::web::{Data, Json};
use actix_web::HttpRequest;
use bytes::Bytes;
use futures_util::TryStreamExt;
use serde::Serialize;

use crate::context::UserInfo;
use crate::error::Error;
use crate::storer::FileStorer;

pub const MAX_IMAGE_BYTES: usize = 2 * 1024 * 1024;
pub const MAX_IMAGES_PER_POLL: usize = 4;

const ALLOWED_EXTENSIONS: [&str; 5] = ["jpeg", "jpg", "png", "gif", "webp"];
const ALLOWED_MIMES: [&str; 5] = ["image/jpeg", "image/jpg", "image/png", "image/gif", "image/webp"];

/// Extension of an accepted image file name, lowercased and including the
/// dot, or None when the name has no extension or the type is not allowed.
pub fn allowed_extension(filename: &str) -> Option<String> {
    let ext = filename.rsplit_once('.')?.1.to_ascii_lowercase();
    ALLOWED_EXTENSIONS.contains(&ext.as_str()).then(|| format!(".{}", ext))
}

pub fn allowed_mime(mime: &str) -> bool {
    ALLOWED_MIMES.contains(&mime)
}

fn append_chunk(buf: &mut Vec<u8>, chunk: &[u8]) -> Result<(), Error> {
    if buf.len() + chunk.len() > MAX_IMAGE_BYTES {
        return Err(Error::Validation("image exceeds the 2MB size limit".into()));
    }
    buf.extend_from_slice(chunk);
    Ok(())
}

/// Drains one multipart file field, enforcing the image type and size
/// rules. Returns the extension to store under and the file content.
pub async fn read_image_field(field: &mut Field) -> Result<(String, Bytes), Error> {
    let filename = field
        .content_disposition()
        .get_filename()
        .map(|s| s.to_owned())
        .ok_or_else(|| Error::Validation("image field without a file name".into()))?;
    let ext = allowed_extension(&filename)
        .ok_or_else(|| Error::Validation("only image files are allowed (jpeg, jpg, png, gif, webp)".into()))?;
    let mime_ok = field
        .content_type()
        .map(|m| allowed_mime(m.essence_str()))
        .unwrap_or(false);
    if !mime_ok {
        return Err(Error::Validation("only image files are allowed (jpeg, jpg, png, gif, webp)".into()));
    }
    let mut content = Vec::new();
    while let Some(chunk) = field.try_next().await? {
        append_chunk(&mut content, &chunk)?;
    }
    Ok((ext, Bytes::from(content)))
}

pub fn upload_url(req: &HttpRequest, name: &str) -> String {
    let conn = req.connection_info();
    format!("{}://{}/uploads/{}", conn.scheme(), conn.host(), name)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    image_url: String,
}

/// Stand-alone image upload, used by the client to stage a profile image
/// before register/update-profile.
pub async fn create<S: FileStorer + 'static>(
    _user_info: UserInfo,
    req: HttpRequest,
    mut payload: Multipart,
    storer: Data<S>,
) -> Result<Json<UploadResponse>, Error> {
    while let Some(mut field) = payload.try_next().await? {
        if field.content_disposition().get_filename().is_none() {
            continue;
        }
        let (ext, content) = read_image_field(&mut field).await?;
        let name = storer.write(&ext, content)?;
        return Ok(Json(UploadResponse {
            image_url: upload_url(&req, &name),
        }));
    }
    Err(Error::Validation("no image file in request".into()))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_accepts_listed_image_extensions() {
        for name in ["a.jpeg", "b.jpg", "c.png", "d.gif", "e.webp", "f.PNG"] {
            assert!(allowed_extension(name).is_some(), "{} should be accepted", name);
        }
    }

    #[test]
    fn test_rejects_other_extensions() {
        for name in ["a.pdf", "b.svg", "c.txt", "noextension", "d.png.exe"] {
            assert!(allowed_extension(name).is_none(), "{} should be rejected", name);
        }
    }

    #[test]
    fn test_extension_is_normalized() {
        assert_eq!(allowed_extension("photo.JPEG").unwrap(), ".jpeg");
    }

    #[test]
    fn test_rejects_non_image_mime() {
        assert!(allowed_mime("image/png"));
        assert!(!allowed_mime("application/pdf"));
        assert!(!allowed_mime("image/svg+xml"));
    }

    #[test]
    fn test_three_megabytes_exceed_the_size_gate() {
        let mut buf = Vec::new();
        let chunk = vec![0u8; 1024 * 1024];
        assert!(append_chunk(&mut buf, &chunk).is_ok());
        assert!(append_chunk(&mut buf, &chunk).is_ok());
        assert!(append_chunk(&mut buf, &chunk).is_err());
    }

    #[test]
    fn test_two_megabytes_pass_the_size_gate() {
        let mut buf = Vec::new();
        let chunk = vec![0u8; MAX_IMAGE_BYTES / 2];
        assert!(append_chunk(&mut buf, &chunk).is_ok());
        assert!(append_chunk(&mut buf, &chunk).is_ok());
        assert_eq!(buf.len(), MAX_IMAGE_BYTES);
    }
}
