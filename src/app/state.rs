use eframe::egui;

use crate::api::{FileEntry, SortOrder, TypeFilter};

/// Which screen the client is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Login,
    Upload,
    Gallery,
}

/// Outcome of a background auth call.
#[derive(Debug)]
pub enum AuthEvent {
    SessionValid,
    SessionMissing,
    LoginFailed(String),
    LoggedOut,
}

/// Outcome of background gallery work. Page and load-failure events carry
/// the generation they were requested under so stale responses from an
/// abandoned query are dropped.
pub enum GalleryEvent {
    PageLoaded {
        generation: u64,
        replace: bool,
        files: Vec<FileEntry>,
        has_next: bool,
        next_page: u32,
    },
    LoadFailed {
        generation: u64,
        error: String,
    },
    MutationDone,
    MutationFailed(String),
    ImageLoaded {
        file_id: i64,
        image: egui::ColorImage,
    },
    ImageFailed {
        file_id: i64,
        error: String,
    },
}

#[derive(Default)]
pub struct LoginState {
    pub username: String,
    pub password: String,
    pub error: Option<String>,
    pub in_flight: bool,
}

pub struct GalleryState {
    pub files: Vec<FileEntry>,
    pub has_next: bool,
    pub next_page: u32,
    pub sort: SortOrder,
    pub kind: TypeFilter,
    pub search: String,
    pub loading: bool,
    pub mutating: bool,
    pub error: Option<String>,
    pub lightbox: Option<Lightbox>,
    /// Bumped whenever the query changes; responses from older generations
    /// are ignored.
    pub generation: u64,
}

impl Default for GalleryState {
    fn default() -> Self {
        Self {
            files: Vec::new(),
            has_next: false,
            next_page: 0,
            sort: SortOrder::Date,
            kind: TypeFilter::All,
            search: String::new(),
            loading: false,
            mutating: false,
            error: None,
            lightbox: None,
            generation: 0,
        }
    }
}

/// Fullscreen viewer over the currently loaded gallery files.
pub struct Lightbox {
    pub idx: usize,
    pub texture: Option<egui::TextureHandle>,
    pub loading: bool,
    pub error: Option<String>,
    pub settings_open: bool,
    pub renaming: bool,
    pub new_name: String,
}

impl Lightbox {
    pub fn new(idx: usize) -> Self {
        Self {
            idx,
            texture: None,
            loading: false,
            error: None,
            settings_open: false,
            renaming: false,
            new_name: String::new(),
        }
    }
}
