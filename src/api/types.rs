use serde::{Deserialize, Serialize};

/// Response envelope the server wraps every JSON body in.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub status: i32,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: Option<T>,
}

/// One stored file as the listing endpoint returns it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub id: i64,
    pub original_name: String,
    pub mime_type: String,
    /// Server-relative path under `/static`.
    pub file_path: String,
    #[serde(default)]
    pub file_size: u64,
    #[serde(default)]
    pub uploaded_at: String,
}

impl FileEntry {
    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image")
    }

    pub fn is_video(&self) -> bool {
        self.mime_type.starts_with("video")
    }
}

/// One page of the gallery listing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilePage {
    pub files: Vec<FileEntry>,
    pub has_next: bool,
    pub next_page: u32,
}

/// Per-user storage totals from the stats endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageStats {
    pub username: String,
    pub count: i64,
    pub size: u64,
    pub readable_size: String,
}

#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameRequest<'a> {
    pub new_name: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Date,
    Name,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Date => "date",
            SortOrder::Name => "name",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SortOrder::Date => "Latest First",
            SortOrder::Name => "Name",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeFilter {
    All,
    Image,
    Video,
}

impl TypeFilter {
    pub fn as_str(self) -> &'static str {
        match self {
            TypeFilter::All => "all",
            TypeFilter::Image => "image",
            TypeFilter::Video => "video",
        }
    }
}

/// Query parameters for one gallery page fetch.
#[derive(Debug, Clone)]
pub struct GalleryQuery {
    pub limit: u32,
    pub page: u32,
    pub sort: SortOrder,
    pub kind: TypeFilter,
    pub search: String,
}

impl Default for GalleryQuery {
    fn default() -> Self {
        Self {
            limit: 20,
            page: 0,
            sort: SortOrder::Date,
            kind: TypeFilter::All,
            search: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_listing_envelope() {
        let body = r#"{
            "status": 200,
            "message": "ok",
            "data": {
                "files": [{
                    "id": 7,
                    "hash": "abc",
                    "originalName": "cat.png",
                    "mimeType": "image/png",
                    "filePath": "/kang/170000_42.png",
                    "fileSize": 12345,
                    "uploadedAt": "2024-05-01T10:00:00Z"
                }],
                "hasNext": true,
                "nextPage": 1
            }
        }"#;

        let envelope: Envelope<FilePage> = serde_json::from_str(body).unwrap();
        let page = envelope.data.unwrap();
        assert!(page.has_next);
        assert_eq!(page.next_page, 1);
        assert_eq!(page.files.len(), 1);
        let file = &page.files[0];
        assert_eq!(file.original_name, "cat.png");
        assert!(file.is_image());
        assert!(!file.is_video());
        assert_eq!(file.file_size, 12345);
    }

    #[test]
    fn decodes_error_envelope_without_data() {
        let body = r#"{"status":500,"message":"file already exists"}"#;
        let envelope: Envelope<serde_json::Value> = serde_json::from_str(body).unwrap();
        assert_eq!(envelope.status, 500);
        assert_eq!(envelope.message, "file already exists");
        assert!(envelope.data.is_none());
    }

    #[test]
    fn decodes_usage_stats() {
        let body = r#"{
            "status": 200,
            "message": "ok",
            "data": {"username":"kang","count":42,"size":1048576,"readableSize":"1.0 MB"}
        }"#;
        let envelope: Envelope<UsageStats> = serde_json::from_str(body).unwrap();
        let usage = envelope.data.unwrap();
        assert_eq!(usage.username, "kang");
        assert_eq!(usage.count, 42);
        assert_eq!(usage.size, 1048576);
    }
}
