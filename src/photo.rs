use std::{
	path::{Path, PathBuf},
	sync::Arc,
};

use uuid::Uuid;

/// Largest accepted profile photo, in bytes.
pub const MAX_PHOTO_BYTES: usize = 5 * 1024 * 1024;

/// The path uploaded photos are served under.
pub const PUBLIC_PATH: &str = "/uploads";

const IMAGE_TYPES: [(&str, &str); 4] = [
	("jpg", "image/jpeg"),
	("jpeg", "image/jpeg"),
	("png", "image/png"),
	("gif", "image/gif"),
];

/// Returns the extension to store an upload under, if both its file name and
/// content type say it is a JPEG, PNG or GIF image.
pub fn image_extension(file_name: Option<&str>, content_type: Option<&str>) -> Option<&'static str> {
	let extension = Path::new(file_name?).extension()?.to_str()?.to_ascii_lowercase();
	let content_type = content_type?;

	IMAGE_TYPES
		.iter()
		.find(|(ext, mime)| *ext == extension && mime.eq_ignore_ascii_case(content_type))
		.map(|(ext, _)| *ext)
}

/// Profile photos kept on the local filesystem.
#[derive(Clone)]
pub struct PhotoStorage {
	dir: Arc<PathBuf>,
}

impl PhotoStorage {
	pub fn new(dir: impl Into<PathBuf>) -> Self {
		Self {
			dir: Arc::new(dir.into()),
		}
	}

	pub fn dir(&self) -> &Path {
		&self.dir
	}

	/// Writes a photo under a fresh name, returning the URL it is served at.
	pub async fn save(&self, extension: &str, bytes: &[u8]) -> Result<String, std::io::Error> {
		let name = format!("profile-{}.{extension}", Uuid::new_v4());

		tokio::fs::create_dir_all(self.dir()).await?;
		tokio::fs::write(self.dir.join(&name), bytes).await?;

		Ok(format!("{PUBLIC_PATH}/{name}"))
	}
}
