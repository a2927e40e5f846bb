mod state;
mod ui;

use std::future::Future;
use std::path::PathBuf;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::time::Duration;

use eframe::{egui, App};
use tokio::runtime::Runtime;
use tracing::{info, warn};
use uuid::Uuid;

use crate::api::{ApiClient, GalleryQuery, UsageStats};
use crate::config::Config;
use crate::upload::{self, FilePayload, UploadEvent, UploadJob, UploadQueue};
use crate::utils::filename::content_type_for;

pub use state::{AuthEvent, GalleryEvent, GalleryState, Lightbox, LoginState, Screen};

pub struct KmemGallery {
    config: Config,
    api: ApiClient,

    screen: Screen,
    /// True while the startup session probe is still out.
    probing: bool,
    login: LoginState,
    gallery: GalleryState,
    /// After uploads or mutations the loaded pages are stale; refetch when
    /// the gallery is (or becomes) visible.
    gallery_dirty: bool,

    queue: UploadQueue,
    uploading: bool,
    /// Items of the active run that have not settled yet.
    run_remaining: usize,
    usage: Option<UsageStats>,

    auth_tx: Sender<AuthEvent>,
    auth_rx: Receiver<AuthEvent>,
    gallery_tx: Sender<GalleryEvent>,
    gallery_rx: Receiver<GalleryEvent>,
    usage_tx: Sender<Result<UsageStats, String>>,
    usage_rx: Receiver<Result<UsageStats, String>>,
    upload_rx: Option<Receiver<UploadEvent>>,
}

/// Run an async task to completion on its own worker thread.
fn spawn_worker<F>(task: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    std::thread::spawn(move || {
        let rt = Runtime::new().unwrap();
        rt.block_on(task);
    });
}

impl KmemGallery {
    pub fn new(_cc: &eframe::CreationContext<'_>, config: Config) -> Self {
        let api = ApiClient::new(&config.server_url);
        let (auth_tx, auth_rx) = channel();
        let (gallery_tx, gallery_rx) = channel();
        let (usage_tx, usage_rx) = channel();

        let mut app = Self {
            config,
            api,
            screen: Screen::Login,
            probing: false,
            login: LoginState::default(),
            gallery: GalleryState::default(),
            gallery_dirty: false,
            queue: UploadQueue::default(),
            uploading: false,
            run_remaining: 0,
            usage: None,
            auth_tx,
            auth_rx,
            gallery_tx,
            gallery_rx,
            usage_tx,
            usage_rx,
            upload_rx: None,
        };
        app.probe_session();
        app
    }

    // ---- auth ----

    fn probe_session(&mut self) {
        self.probing = true;
        let api = self.api.clone();
        let tx = self.auth_tx.clone();
        spawn_worker(async move {
            let event = match api.me().await {
                Ok(()) => AuthEvent::SessionValid,
                Err(_) => AuthEvent::SessionMissing,
            };
            let _ = tx.send(event);
        });
    }

    pub(crate) fn start_login(&mut self) {
        if self.login.in_flight {
            return;
        }

        let username = self.login.username.trim().to_string();
        let password = self.login.password.clone();
        // Same bounds the server enforces; skip the round-trip entirely.
        if username.len() < 4 || password.len() < 8 {
            self.login.error = Some("invalid username or password".to_string());
            return;
        }

        self.login.error = None;
        self.login.in_flight = true;
        let api = self.api.clone();
        let tx = self.auth_tx.clone();
        spawn_worker(async move {
            let event = match api.login(&username, &password).await {
                Ok(()) => AuthEvent::SessionValid,
                Err(err) => {
                    warn!(error = %err, "login failed");
                    let message = if err.server_message().is_some() {
                        "invalid username or password".to_string()
                    } else {
                        err.to_string()
                    };
                    AuthEvent::LoginFailed(message)
                }
            };
            let _ = tx.send(event);
        });
    }

    pub(crate) fn start_logout(&mut self) {
        let api = self.api.clone();
        let tx = self.auth_tx.clone();
        spawn_worker(async move {
            if let Err(err) = api.logout().await {
                warn!(error = %err, "logout request failed");
            }
            let _ = tx.send(AuthEvent::LoggedOut);
        });
    }

    fn apply_auth_event(&mut self, event: AuthEvent) {
        match event {
            AuthEvent::SessionValid => {
                self.probing = false;
                self.login = LoginState::default();
                self.screen = Screen::Upload;
                self.fetch_usage();
                self.refresh_gallery();
            }
            AuthEvent::SessionMissing => {
                self.probing = false;
                self.screen = Screen::Login;
            }
            AuthEvent::LoginFailed(message) => {
                self.probing = false;
                self.login.in_flight = false;
                self.login.password.clear();
                self.login.error = Some(message);
            }
            AuthEvent::LoggedOut => {
                info!("session closed");
                self.screen = Screen::Login;
                self.login = LoginState::default();
                self.gallery = GalleryState::default();
                self.gallery_dirty = false;
                self.usage = None;
                self.queue.clear();
            }
        }
    }

    // ---- upload screen ----

    pub(crate) fn pick_files(&mut self) {
        let picked = rfd::FileDialog::new()
            .add_filter(
                "media",
                &["jpg", "jpeg", "png", "gif", "webp", "mp4", "avi", "mov", "mkv", "webm"],
            )
            .pick_files();
        if let Some(paths) = picked {
            self.add_paths(paths);
        }
    }

    fn add_paths(&mut self, paths: Vec<PathBuf>) {
        let payloads: Vec<FilePayload> = paths
            .into_iter()
            .filter_map(|path| {
                let name = path.file_name()?.to_str()?.to_string();
                let size = std::fs::metadata(&path).map(|meta| meta.len()).unwrap_or(0);
                let content_type = content_type_for(&name).to_string();
                Some(FilePayload {
                    name,
                    path,
                    size,
                    content_type,
                })
            })
            .collect();
        info!(count = payloads.len(), "files added to the queue");
        self.queue.add_files(payloads);
    }

    pub(crate) fn remove_item(&mut self, id: Uuid) {
        if !self.queue.remove(id) {
            warn!(%id, "cannot remove an item while it is uploading");
        }
    }

    pub(crate) fn clear_queue(&mut self) {
        self.queue.clear();
    }

    pub(crate) fn start_upload_run(&mut self) {
        if self.uploading {
            return;
        }
        let jobs: Vec<UploadJob> = self.queue.retryable_jobs();
        if jobs.is_empty() {
            return;
        }

        let (tx, rx) = channel();
        self.upload_rx = Some(rx);
        self.uploading = true;
        self.run_remaining = jobs.len();

        let api = self.api.clone();
        spawn_worker(async move {
            upload::run_all(&api, &jobs, &tx).await;
        });
    }

    fn fetch_usage(&mut self) {
        let api = self.api.clone();
        let tx = self.usage_tx.clone();
        spawn_worker(async move {
            let _ = tx.send(api.usage().await.map_err(|err| err.to_string()));
        });
    }

    // ---- gallery ----

    pub(crate) fn refresh_gallery(&mut self) {
        self.gallery.generation += 1;
        self.gallery.lightbox = None;
        self.fetch_gallery_page(0, true);
    }

    pub(crate) fn load_more(&mut self) {
        if self.gallery.has_next && !self.gallery.loading {
            self.fetch_gallery_page(self.gallery.next_page, false);
        }
    }

    fn fetch_gallery_page(&mut self, page: u32, replace: bool) {
        self.gallery.loading = true;
        self.gallery.error = None;

        let generation = self.gallery.generation;
        let query = GalleryQuery {
            limit: self.config.page_size,
            page,
            sort: self.gallery.sort,
            kind: self.gallery.kind,
            search: self.gallery.search.trim().to_string(),
        };
        let api = self.api.clone();
        let tx = self.gallery_tx.clone();
        spawn_worker(async move {
            let event = match api.list_files(&query).await {
                Ok(page_data) => GalleryEvent::PageLoaded {
                    generation,
                    replace,
                    files: page_data.files,
                    has_next: page_data.has_next,
                    next_page: page_data.next_page,
                },
                Err(err) => GalleryEvent::LoadFailed {
                    generation,
                    error: err.to_string(),
                },
            };
            let _ = tx.send(event);
        });
    }

    pub(crate) fn open_lightbox(&mut self, idx: usize) {
        self.gallery.lightbox = Some(Lightbox::new(idx));
        self.load_lightbox_image();
    }

    pub(crate) fn close_lightbox(&mut self) {
        self.gallery.lightbox = None;
    }

    /// Move the viewer left or right, clamped to the loaded files.
    pub(crate) fn lightbox_step(&mut self, delta: i64) {
        let total = self.gallery.files.len();
        let Some(lightbox) = &self.gallery.lightbox else {
            return;
        };
        if total == 0 {
            return;
        }
        let idx = (lightbox.idx as i64 + delta).clamp(0, total as i64 - 1) as usize;
        if idx != lightbox.idx {
            self.open_lightbox(idx);
        }
    }

    fn load_lightbox_image(&mut self) {
        let Some(lightbox) = &mut self.gallery.lightbox else {
            return;
        };
        let Some(file) = self.gallery.files.get(lightbox.idx) else {
            return;
        };
        if !file.is_image() {
            // Videos are handed to the browser instead of decoded here.
            lightbox.loading = false;
            return;
        }

        lightbox.loading = true;
        let file_id = file.id;
        let file_path = file.file_path.clone();
        let api = self.api.clone();
        let tx = self.gallery_tx.clone();
        spawn_worker(async move {
            let event = match api.fetch_static(&file_path).await {
                Ok(bytes) => match decode_image(&bytes) {
                    Ok(image) => GalleryEvent::ImageLoaded { file_id, image },
                    Err(error) => GalleryEvent::ImageFailed { file_id, error },
                },
                Err(err) => GalleryEvent::ImageFailed {
                    file_id,
                    error: err.to_string(),
                },
            };
            let _ = tx.send(event);
        });
    }

    pub(crate) fn start_rename(&mut self, file_id: i64, new_name: String) {
        let new_name = new_name.trim().to_string();
        if new_name.is_empty() {
            return;
        }
        self.gallery.mutating = true;
        let api = self.api.clone();
        let tx = self.gallery_tx.clone();
        spawn_worker(async move {
            let event = match api.rename_file(file_id, &new_name).await {
                Ok(()) => GalleryEvent::MutationDone,
                Err(err) => {
                    warn!(file_id, error = %err, "rename failed");
                    GalleryEvent::MutationFailed(err.to_string())
                }
            };
            let _ = tx.send(event);
        });
    }

    pub(crate) fn start_delete(&mut self, file_id: i64) {
        self.gallery.mutating = true;
        let api = self.api.clone();
        let tx = self.gallery_tx.clone();
        spawn_worker(async move {
            let event = match api.delete_file(file_id).await {
                Ok(()) => GalleryEvent::MutationDone,
                Err(err) => {
                    warn!(file_id, error = %err, "delete failed");
                    GalleryEvent::MutationFailed(err.to_string())
                }
            };
            let _ = tx.send(event);
        });
    }

    fn lightbox_file_id(&self) -> Option<i64> {
        let lightbox = self.gallery.lightbox.as_ref()?;
        self.gallery.files.get(lightbox.idx).map(|file| file.id)
    }

    fn apply_gallery_event(&mut self, ctx: &egui::Context, event: GalleryEvent) {
        match event {
            GalleryEvent::PageLoaded {
                generation,
                replace,
                files,
                has_next,
                next_page,
            } => {
                if generation != self.gallery.generation {
                    return;
                }
                self.gallery.loading = false;
                if replace {
                    self.gallery.files = files;
                } else {
                    self.gallery.files.extend(files);
                }
                self.gallery.has_next = has_next;
                self.gallery.next_page = next_page;
            }
            GalleryEvent::LoadFailed { generation, error } => {
                if generation != self.gallery.generation {
                    return;
                }
                self.gallery.loading = false;
                self.gallery.error = Some(error);
            }
            GalleryEvent::MutationDone => {
                self.gallery.mutating = false;
                self.close_lightbox();
                self.fetch_usage();
                self.refresh_gallery();
            }
            GalleryEvent::MutationFailed(error) => {
                self.gallery.mutating = false;
                if let Some(lightbox) = &mut self.gallery.lightbox {
                    lightbox.error = Some(error);
                } else {
                    self.gallery.error = Some(error);
                }
            }
            GalleryEvent::ImageLoaded { file_id, image } => {
                if self.lightbox_file_id() != Some(file_id) {
                    return;
                }
                let texture = ctx.load_texture(
                    format!("media-{file_id}"),
                    image,
                    egui::TextureOptions::LINEAR,
                );
                if let Some(lightbox) = &mut self.gallery.lightbox {
                    lightbox.loading = false;
                    lightbox.texture = Some(texture);
                }
            }
            GalleryEvent::ImageFailed { file_id, error } => {
                if self.lightbox_file_id() != Some(file_id) {
                    return;
                }
                if let Some(lightbox) = &mut self.gallery.lightbox {
                    lightbox.loading = false;
                    lightbox.error = Some(error);
                }
            }
        }
    }

    // ---- event pump ----

    fn update_state(&mut self, ctx: &egui::Context) {
        while let Ok(event) = self.auth_rx.try_recv() {
            self.apply_auth_event(event);
        }
        while let Ok(event) = self.gallery_rx.try_recv() {
            self.apply_gallery_event(ctx, event);
        }
        while let Ok(result) = self.usage_rx.try_recv() {
            match result {
                Ok(usage) => self.usage = Some(usage),
                Err(err) => warn!(error = %err, "usage fetch failed"),
            }
        }

        let mut run_finished = false;
        if let Some(rx) = &self.upload_rx {
            while let Ok(event) = rx.try_recv() {
                if matches!(event, UploadEvent::Settled(..)) {
                    self.run_remaining = self.run_remaining.saturating_sub(1);
                    if self.run_remaining == 0 {
                        run_finished = true;
                    }
                }
                self.queue.apply(event);
            }
        }
        if run_finished {
            self.uploading = false;
            self.upload_rx = None;
            self.gallery_dirty = true;
            self.fetch_usage();
            info!("upload run finished");
        }

        if self.screen == Screen::Gallery && self.gallery_dirty && !self.gallery.loading {
            self.gallery_dirty = false;
            self.refresh_gallery();
        }

        // Background threads report over channels; keep the frame loop
        // ticking so their results are picked up without user input.
        let tick = if self.background_active() {
            Duration::from_millis(100)
        } else {
            Duration::from_secs(1)
        };
        ctx.request_repaint_after(tick);
    }

    fn background_active(&self) -> bool {
        self.probing
            || self.uploading
            || self.login.in_flight
            || self.gallery.loading
            || self.gallery.mutating
            || self
                .gallery
                .lightbox
                .as_ref()
                .map(|lightbox| lightbox.loading)
                .unwrap_or(false)
    }
}

fn decode_image(bytes: &[u8]) -> Result<egui::ColorImage, String> {
    let decoded = image::load_from_memory(bytes).map_err(|err| err.to_string())?;
    let rgba = decoded.to_rgba8();
    let size = [rgba.width() as usize, rgba.height() as usize];
    Ok(egui::ColorImage::from_rgba_unmultiplied(
        size,
        rgba.as_flat_samples().as_slice(),
    ))
}

impl App for KmemGallery {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.update_state(ctx);
        self.render(ctx);
    }
}
