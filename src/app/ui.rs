use eframe::egui::{self, Color32, RichText};
use tracing::warn;
use uuid::Uuid;

use super::{KmemGallery, Screen};
use crate::api::{FileEntry, SortOrder, TypeFilter};
use crate::upload::{UploadItem, UploadStatus};
use crate::utils::file_size::format_size;

const ERROR_RED: Color32 = Color32::from_rgb(220, 50, 50);
const SUCCESS_GREEN: Color32 = Color32::from_rgb(0, 180, 0);
const TAG_ORANGE: Color32 = Color32::from_rgb(230, 140, 30);

enum LightboxAction {
    Close,
    Prev,
    Next,
    Rename(i64, String),
    Delete(i64),
}

impl KmemGallery {
    pub(crate) fn render(&mut self, ctx: &egui::Context) {
        if self.screen != Screen::Login {
            egui::TopBottomPanel::top("top-nav").show(ctx, |ui| self.render_top_nav(ui));
        }

        egui::CentralPanel::default().show(ctx, |ui| match self.screen {
            Screen::Login => self.render_login(ui),
            Screen::Upload => self.render_upload(ui),
            Screen::Gallery => self.render_gallery(ui),
        });

        if self.screen == Screen::Gallery {
            self.render_lightbox(ctx);
        }
    }

    fn render_top_nav(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.label(RichText::new("kmem").heading().strong());
            ui.separator();
            if ui
                .selectable_label(self.screen == Screen::Upload, "Upload")
                .clicked()
            {
                self.screen = Screen::Upload;
            }
            if ui
                .selectable_label(self.screen == Screen::Gallery, "Gallery")
                .clicked()
            {
                self.screen = Screen::Gallery;
            }

            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if ui
                    .add_enabled(!self.uploading, egui::Button::new("Logout"))
                    .clicked()
                {
                    self.start_logout();
                }
                if let Some(usage) = &self.usage {
                    ui.label(
                        RichText::new(format!(
                            "{} · {} files · {}",
                            usage.username, usage.count, usage.readable_size
                        ))
                        .weak(),
                    )
                    .on_hover_text(format!("{} bytes stored", usage.size));
                }
            });
        });
    }

    fn render_login(&mut self, ui: &mut egui::Ui) {
        ui.add_space(80.0);
        ui.vertical_centered(|ui| {
            ui.heading("Sign In");
            ui.add_space(20.0);
            ui.group(|ui| {
                ui.set_width(280.0);

                let username = ui.add(
                    egui::TextEdit::singleline(&mut self.login.username).hint_text("username"),
                );
                ui.add_space(6.0);
                let password = ui.add(
                    egui::TextEdit::singleline(&mut self.login.password)
                        .password(true)
                        .hint_text("password"),
                );
                if username.changed() || password.changed() {
                    self.login.error = None;
                }

                if let Some(error) = &self.login.error {
                    ui.add_space(6.0);
                    ui.colored_label(ERROR_RED, error.as_str());
                }

                ui.add_space(10.0);
                let label = if self.login.in_flight {
                    "signing in..."
                } else {
                    "sign in"
                };
                let submit = ui.add_enabled(
                    !self.login.in_flight,
                    egui::Button::new(label).min_size(egui::vec2(260.0, 32.0)),
                );
                let submitted_with_enter = (username.lost_focus() || password.lost_focus())
                    && ui.input(|i| i.key_pressed(egui::Key::Enter));
                if submit.clicked() || submitted_with_enter {
                    self.start_login();
                }
            });

            if self.probing {
                ui.add_space(10.0);
                ui.spinner();
            }
        });
    }

    fn render_upload(&mut self, ui: &mut egui::Ui) {
        ui.add_space(10.0);
        ui.horizontal(|ui| {
            if ui.button("📁 Select Files").clicked() {
                self.pick_files();
            }

            let stats = self.queue.stats();
            let label = if self.uploading {
                "⏳ Uploading..."
            } else if stats.failed > 0 {
                "🔄 Retry Upload"
            } else {
                "📤 Upload Files"
            };
            let can_upload = !self.uploading && self.queue.retryable_count() > 0;
            if ui
                .add_enabled(can_upload, egui::Button::new(label))
                .clicked()
            {
                self.start_upload_run();
            }

            let can_clear = !self.uploading && !self.queue.is_empty();
            if ui
                .add_enabled(can_clear, egui::Button::new("🗑 Clear All"))
                .clicked()
            {
                self.clear_queue();
            }
        });

        let stats = self.queue.stats();
        if stats.total == 0 {
            ui.add_space(40.0);
            ui.vertical_centered(|ui| {
                ui.label(RichText::new("Select photos and videos to upload").weak());
            });
            return;
        }

        ui.add_space(10.0);
        ui.group(|ui| {
            let progress = stats.settled() as f32 / stats.total as f32;
            ui.add(egui::ProgressBar::new(progress).show_percentage());
            ui.label(format!(
                "Progress: {}/{} files | ✅ Success: {} | ❌ Failed: {}",
                stats.settled(),
                stats.total,
                stats.succeeded,
                stats.failed
            ));
            if stats.all_complete() && stats.failed == 0 {
                ui.colored_label(SUCCESS_GREEN, "All uploads completed");
            }
        });

        ui.add_space(10.0);
        let mut removed: Option<Uuid> = None;
        egui::ScrollArea::vertical().show(ui, |ui| {
            egui::Frame::none()
                .fill(ui.style().visuals.extreme_bg_color)
                .show(ui, |ui| {
                    ui.add_space(8.0);
                    for item in self.queue.items() {
                        let progress = self.queue.progress(item.id);
                        if upload_row(ui, item, progress) {
                            removed = Some(item.id);
                        }
                        ui.add_space(4.0);
                    }
                    ui.add_space(8.0);
                });
        });
        if let Some(id) = removed {
            self.remove_item(id);
        }
    }

    fn render_gallery(&mut self, ui: &mut egui::Ui) {
        ui.add_space(10.0);

        let mut needs_refresh = false;
        ui.horizontal(|ui| {
            let search = ui.add(
                egui::TextEdit::singleline(&mut self.gallery.search)
                    .hint_text("Search files...")
                    .desired_width(220.0),
            );
            if search.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
                needs_refresh = true;
            }
            if !self.gallery.search.is_empty() && ui.button("✖").clicked() {
                self.gallery.search.clear();
                needs_refresh = true;
            }

            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                egui::ComboBox::from_id_source("gallery-sort")
                    .selected_text(self.gallery.sort.label())
                    .show_ui(ui, |ui| {
                        for sort in [SortOrder::Date, SortOrder::Name] {
                            if ui
                                .selectable_value(&mut self.gallery.sort, sort, sort.label())
                                .changed()
                            {
                                needs_refresh = true;
                            }
                        }
                    });
                egui::ComboBox::from_id_source("gallery-type")
                    .selected_text(self.gallery.kind.as_str())
                    .show_ui(ui, |ui| {
                        for kind in [TypeFilter::All, TypeFilter::Image, TypeFilter::Video] {
                            if ui
                                .selectable_value(&mut self.gallery.kind, kind, kind.as_str())
                                .changed()
                            {
                                needs_refresh = true;
                            }
                        }
                    });
            });
        });
        if needs_refresh {
            self.refresh_gallery();
        }

        if let Some(error) = &self.gallery.error {
            ui.add_space(6.0);
            ui.colored_label(ERROR_RED, error.as_str());
        }

        ui.add_space(10.0);
        let mut clicked_idx: Option<usize> = None;
        let mut load_more = false;
        egui::ScrollArea::vertical().show(ui, |ui| {
            if self.gallery.files.is_empty() && !self.gallery.loading {
                ui.add_space(40.0);
                ui.vertical_centered(|ui| {
                    ui.label(RichText::new("No files uploaded yet").weak());
                });
            } else {
                let cols = ((ui.available_width() / 185.0).floor() as usize).max(1);
                for (row_idx, row) in self.gallery.files.chunks(cols).enumerate() {
                    ui.horizontal(|ui| {
                        for (col_idx, file) in row.iter().enumerate() {
                            if gallery_cell(ui, file) {
                                clicked_idx = Some(row_idx * cols + col_idx);
                            }
                        }
                    });
                    ui.add_space(6.0);
                }
            }

            ui.add_space(10.0);
            ui.vertical_centered(|ui| {
                if self.gallery.loading {
                    ui.spinner();
                } else if self.gallery.has_next && ui.button("Load More").clicked() {
                    load_more = true;
                }
            });
        });
        if let Some(idx) = clicked_idx {
            self.open_lightbox(idx);
        }
        if load_more {
            self.load_more();
        }
    }

    fn render_lightbox(&mut self, ctx: &egui::Context) {
        if self.gallery.lightbox.is_none() {
            return;
        }

        let (escape, left, right) = ctx.input(|i| {
            (
                i.key_pressed(egui::Key::Escape),
                i.key_pressed(egui::Key::ArrowLeft),
                i.key_pressed(egui::Key::ArrowRight),
            )
        });
        if escape {
            self.close_lightbox();
            return;
        }
        if left {
            self.lightbox_step(-1);
        }
        if right {
            self.lightbox_step(1);
        }

        let Some(idx) = self.gallery.lightbox.as_ref().map(|lightbox| lightbox.idx) else {
            return;
        };
        let Some(file) = self.gallery.files.get(idx).cloned() else {
            self.close_lightbox();
            return;
        };
        let total = self.gallery.files.len();
        let media_url = self.api.static_url(&file.file_path);
        let mutating = self.gallery.mutating;

        let mut action: Option<LightboxAction> = None;

        egui::Area::new(egui::Id::new("lightbox"))
            .order(egui::Order::Foreground)
            .fixed_pos(egui::pos2(0.0, 0.0))
            .show(ctx, |ui| {
                let screen = ctx.screen_rect();
                egui::Frame::none()
                    .fill(Color32::from_black_alpha(230))
                    .show(ui, |ui| {
                        ui.set_min_size(screen.size());
                        ui.vertical_centered(|ui| {
                            ui.add_space(10.0);
                            ui.horizontal(|ui| {
                                ui.add_space(10.0);
                                if let Some(lightbox) = self.gallery.lightbox.as_mut() {
                                    if ui.button("⚙").clicked() {
                                        lightbox.settings_open = !lightbox.settings_open;
                                        lightbox.renaming = false;
                                    }
                                }
                                ui.with_layout(
                                    egui::Layout::right_to_left(egui::Align::Center),
                                    |ui| {
                                        ui.add_space(10.0);
                                        if ui.button("✖").clicked() {
                                            action = Some(LightboxAction::Close);
                                        }
                                    },
                                );
                            });

                            let mut rename_request: Option<String> = None;
                            if let Some(lightbox) = self.gallery.lightbox.as_mut() {
                                if lightbox.settings_open {
                                    ui.group(|ui| {
                                        if lightbox.renaming {
                                            ui.horizontal(|ui| {
                                                ui.text_edit_singleline(&mut lightbox.new_name);
                                                if ui
                                                    .add_enabled(
                                                        !mutating,
                                                        egui::Button::new("Save"),
                                                    )
                                                    .clicked()
                                                {
                                                    rename_request =
                                                        Some(lightbox.new_name.clone());
                                                }
                                                if ui.button("Cancel").clicked() {
                                                    lightbox.renaming = false;
                                                    lightbox.new_name.clear();
                                                }
                                            });
                                        } else {
                                            ui.horizontal(|ui| {
                                                if ui.button("✏ Rename").clicked() {
                                                    lightbox.renaming = true;
                                                    lightbox.new_name =
                                                        file.original_name.clone();
                                                }
                                                if ui
                                                    .add_enabled(
                                                        !mutating,
                                                        egui::Button::new("🗑 Delete"),
                                                    )
                                                    .clicked()
                                                {
                                                    action =
                                                        Some(LightboxAction::Delete(file.id));
                                                }
                                            });
                                        }
                                    });
                                }
                                if let Some(error) = &lightbox.error {
                                    ui.colored_label(ERROR_RED, error.as_str());
                                }
                            }
                            if let Some(new_name) = rename_request {
                                action = Some(LightboxAction::Rename(file.id, new_name));
                            }

                            ui.add_space(10.0);
                            let max_size =
                                egui::vec2(screen.width() * 0.9, screen.height() * 0.7);
                            if file.is_image() {
                                if let Some(lightbox) = self.gallery.lightbox.as_ref() {
                                    if let Some(texture) = &lightbox.texture {
                                        ui.add(egui::Image::new(texture).max_size(max_size));
                                    } else if lightbox.loading {
                                        ui.add_space(max_size.y * 0.4);
                                        ui.spinner();
                                    }
                                }
                            } else if file.is_video() {
                                ui.add_space(60.0);
                                ui.label(RichText::new("🎥").size(64.0));
                                ui.add_space(10.0);
                                if ui.button("▶ Open in browser").clicked() {
                                    if let Err(err) = open::that(&media_url) {
                                        warn!(error = %err, "failed to open browser");
                                    }
                                }
                            }

                            ui.add_space(10.0);
                            ui.label(
                                RichText::new(&file.original_name).color(Color32::WHITE),
                            );
                            if !file.uploaded_at.is_empty() {
                                ui.label(RichText::new(&file.uploaded_at).weak().small());
                            }
                            ui.label(RichText::new(format!("{} / {}", idx + 1, total)).weak());
                            ui.add_space(6.0);
                            ui.horizontal(|ui| {
                                ui.add_space(screen.width() / 2.0 - 50.0);
                                if ui
                                    .add_enabled(idx > 0, egui::Button::new("‹"))
                                    .clicked()
                                {
                                    action = Some(LightboxAction::Prev);
                                }
                                if ui
                                    .add_enabled(idx + 1 < total, egui::Button::new("›"))
                                    .clicked()
                                {
                                    action = Some(LightboxAction::Next);
                                }
                            });
                        });
                    });
            });

        match action {
            Some(LightboxAction::Close) => self.close_lightbox(),
            Some(LightboxAction::Prev) => self.lightbox_step(-1),
            Some(LightboxAction::Next) => self.lightbox_step(1),
            Some(LightboxAction::Rename(file_id, new_name)) => {
                self.start_rename(file_id, new_name)
            }
            Some(LightboxAction::Delete(file_id)) => self.start_delete(file_id),
            None => {}
        }
    }
}

/// One row of the upload queue. Returns true when the remove button fired.
fn upload_row(ui: &mut egui::Ui, item: &UploadItem, progress: Option<u8>) -> bool {
    let mut remove = false;
    ui.horizontal(|ui| {
        ui.label(type_icon(&item.payload.content_type));
        ui.vertical(|ui| {
            ui.label(RichText::new(&item.payload.name).strong());
            ui.horizontal(|ui| {
                ui.label(RichText::new(format_size(item.payload.size)).weak());
                if let Some(message) = item.message() {
                    ui.colored_label(TAG_ORANGE, message);
                }
            });
        });
        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
            let removable = item.status != UploadStatus::Uploading;
            if ui.add_enabled(removable, egui::Button::new("✖")).clicked() {
                remove = true;
            }
            match &item.status {
                UploadStatus::Pending => {
                    ui.label(RichText::new("pending").weak());
                }
                UploadStatus::Uploading => {
                    match progress {
                        // Bytes are all out; the server is still working.
                        Some(100) => {
                            ui.label(RichText::new("processing...").weak());
                        }
                        Some(percent) => {
                            ui.label(format!("{percent}%"));
                        }
                        None => {}
                    }
                    ui.spinner();
                }
                UploadStatus::Success => {
                    ui.colored_label(SUCCESS_GREEN, "✅");
                }
                UploadStatus::Error(_) => {
                    ui.colored_label(ERROR_RED, "❌");
                }
            }
        });
    });
    remove
}

/// One gallery grid cell. Returns true when clicked.
fn gallery_cell(ui: &mut egui::Ui, file: &FileEntry) -> bool {
    let text = format!(
        "{}\n{}\n{}",
        type_icon(&file.mime_type),
        truncate_name(&file.original_name, 20),
        format_size(file.file_size)
    );
    ui.add_sized([175.0, 84.0], egui::Button::new(text)).clicked()
}

fn type_icon(mime_type: &str) -> &'static str {
    if mime_type.starts_with("image") {
        "🖼"
    } else if mime_type.starts_with("video") {
        "🎥"
    } else {
        "📄"
    }
}

fn truncate_name(name: &str, max_chars: usize) -> String {
    if name.chars().count() <= max_chars {
        return name.to_string();
    }
    let head: String = name.chars().take(max_chars.saturating_sub(1)).collect();
    format!("{head}…")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn icons_follow_mime_prefix() {
        assert_eq!(type_icon("image/png"), "🖼");
        assert_eq!(type_icon("video/mp4"), "🎥");
        assert_eq!(type_icon("application/octet-stream"), "📄");
    }

    #[test]
    fn long_names_are_truncated_on_char_boundaries() {
        assert_eq!(truncate_name("short.png", 20), "short.png");
        let truncated = truncate_name("a-very-long-filename-from-a-camera.png", 20);
        assert_eq!(truncated.chars().count(), 20);
        assert!(truncated.ends_with('…'));
        // multi-byte names must not split a character
        let unicode = truncate_name("사진사진사진사진사진사진사진사진사진사진사진.png", 10);
        assert_eq!(unicode.chars().count(), 10);
    }
}
