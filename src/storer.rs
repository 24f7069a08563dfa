use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use rand::Rng;

use crate::error::Error;

/// Destination for uploaded image bytes. `write` returns the generated
/// file name under which the file can be fetched from `/uploads`.
pub trait FileStorer {
    fn write(&self, ext: &str, bytes: Bytes) -> Result<String, Error>;
}

pub struct LocalStorer {
    path: PathBuf,
}

impl LocalStorer {
    pub fn new(path: &str) -> Self {
        Self {
            path: PathBuf::from(path),
        }
    }
}

// images-<millis>-<random><ext>; originals are kept forever
fn unique_name(ext: &str) -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000_000);
    format!("images-{}-{}{}", millis, suffix, ext)
}

impl FileStorer for LocalStorer {
    fn write(&self, ext: &str, bytes: Bytes) -> Result<String, Error> {
        let name = unique_name(ext);
        let mut file = File::create(Path::new(&self.path).join(&name))?;
        file.write_all(&bytes)?;
        Ok(name)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_unique_name_keeps_extension() {
        let name = unique_name(".png");
        assert!(name.starts_with("images-"));
        assert!(name.ends_with(".png"));
    }

    #[test]
    fn test_names_do_not_collide() {
        let a = unique_name(".jpg");
        let b = unique_name(".jpg");
        assert_ne!(a, b);
    }

    #[test]
    fn test_write_persists_bytes() {
        let dir = std::env::temp_dir().join(format!("storer-test-{}", unique_name("")));
        std::fs::create_dir_all(&dir).unwrap();
        let storer = LocalStorer::new(dir.to_str().unwrap());
        let name = storer.write(".gif", Bytes::from_static(b"GIF89a")).unwrap();
        let stored = std::fs::read(dir.join(&name)).unwrap();
        assert_eq!(stored, b"GIF89a");
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
