//! Table QR links
//!
//! Images are rendered by an external service; this only builds URLs.

use serde::Serialize;

/// Default edge length of generated QR images, in pixels
pub const QR_IMAGE_SIZE: u32 = 300;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QrCode {
    pub table_number: i32,
    /// Deep link encoded in the image
    pub link: String,
    pub image_url: String,
}

#[derive(Debug, Clone)]
pub struct QrLinks {
    public_base_url: String,
    qr_service_url: String,
}

impl QrLinks {
    pub fn new(public_base_url: impl Into<String>, qr_service_url: impl Into<String>) -> Self {
        Self {
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
            qr_service_url: qr_service_url.into(),
        }
    }

    /// `{public_base_url}/table/{n}`
    pub fn table_link(&self, table_number: i32) -> String {
        format!("{}/table/{}", self.public_base_url, table_number)
    }

    /// Image URL on the rendering service, or `None` if its URL is malformed
    pub fn image_url(&self, table_number: i32) -> Option<String> {
        let size = format!("{QR_IMAGE_SIZE}x{QR_IMAGE_SIZE}");
        let link = self.table_link(table_number);
        match reqwest::Url::parse_with_params(
            &self.qr_service_url,
            &[("size", size.as_str()), ("data", link.as_str())],
        ) {
            Ok(url) => Some(url.to_string()),
            Err(e) => {
                tracing::warn!(url = %self.qr_service_url, error = %e, "invalid QR service URL");
                None
            }
        }
    }

    pub fn for_table(&self, table_number: i32) -> Option<QrCode> {
        Some(QrCode {
            table_number,
            link: self.table_link(table_number),
            image_url: self.image_url(table_number)?,
        })
    }
}
