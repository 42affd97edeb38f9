//! Pure application core for a catalog image picker: paginated, filtered
//! asset retrieval from a remote media catalog plus a sequential upload
//! queue. The UI shell sends [`Event`]s in and reads [`ViewModel`]
//! snapshots; all I/O goes through capabilities the shell fulfils.

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::too_many_lines)]

pub mod capabilities;
pub mod debounce;
pub mod gallery;
pub mod upload;

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

pub use crate::app::App;
pub use crate::capabilities::{Capabilities, Effect};
use crate::capabilities::HttpResult;
use crate::debounce::CoalescingSlot;
use crate::gallery::{AssetRecord, GalleryState, Source, SourceId};
use crate::upload::{ItemKey, SelectedFile, UploadQueue};

pub const PAGE_SIZE: u64 = 18;
pub const DEBOUNCE_WINDOW_MS: u64 = 1_000;
pub const API_BASE: &str = "https://api.imgix.com/api/v1";
pub const UPLOAD_BASE: &str = "https://api.imgix.com/api/v1/sources/upload";
pub const DELIVERY_DOMAIN: &str = "imgix.net";
pub const SOURCES_TIMEOUT_MS: u64 = 15_000;
pub const CATALOG_TIMEOUT_MS: u64 = 30_000;
pub const UPLOAD_TIMEOUT_MS: u64 = 120_000;

#[must_use]
pub fn get_current_time_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// --- Errors -------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorSeverity {
    Informational,
    Recoverable,
    Fatal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    InvalidApiKey,
    NoSources,
    NoOriginImages,
    Retrieval,
    Upload,
    Validation,
    Internal,
}

impl ErrorKind {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::InvalidApiKey => "INVALID_API_KEY",
            Self::NoSources => "NO_SOURCES",
            Self::NoOriginImages => "NO_ORIGIN_IMAGES",
            Self::Retrieval => "RETRIEVAL_ERROR",
            Self::Upload => "UPLOAD_ERROR",
            Self::Validation => "VALIDATION_ERROR",
            Self::Internal => "INTERNAL_ERROR",
        }
    }

    #[must_use]
    pub const fn default_severity(self) -> ErrorSeverity {
        match self {
            Self::InvalidApiKey => ErrorSeverity::Fatal,

            Self::NoSources | Self::Upload | Self::Validation | Self::Internal => {
                ErrorSeverity::Recoverable
            }

            Self::NoOriginImages | Self::Retrieval => ErrorSeverity::Informational,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppError {
    pub kind: ErrorKind,
    pub severity: ErrorSeverity,
    pub message: String,
    pub internal_message: Option<String>,
}

impl AppError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: kind.default_severity(),
            message: message.into(),
            internal_message: None,
        }
    }

    #[must_use]
    pub fn invalid_api_key() -> Self {
        Self::new(
            ErrorKind::InvalidApiKey,
            "The configured API key is missing or has not been validated.",
        )
    }

    #[must_use]
    pub fn no_sources() -> Self {
        Self::new(
            ErrorKind::NoSources,
            "This account has no enabled sources to browse.",
        )
    }

    #[must_use]
    pub fn no_origin_images() -> Self {
        Self::new(
            ErrorKind::NoOriginImages,
            "This source has no images yet. Upload some to get started.",
        )
    }

    #[must_use]
    pub fn with_internal(mut self, internal: impl Into<String>) -> Self {
        self.internal_message = Some(internal.into());
        self
    }

    #[must_use]
    pub fn with_severity(mut self, severity: ErrorSeverity) -> Self {
        self.severity = severity;
        self
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.kind.code()
    }

    #[must_use]
    pub fn user_facing_message(&self) -> String {
        match self.kind {
            ErrorKind::InvalidApiKey => {
                "Your API key is invalid. Please verify it in the app configuration.".into()
            }
            ErrorKind::NoSources => {
                "No enabled sources were found for this account.".into()
            }
            ErrorKind::NoOriginImages | ErrorKind::Validation => self.message.clone(),
            ErrorKind::Retrieval => {
                "Unable to load images right now. Please try again.".into()
            }
            ErrorKind::Upload => "The upload could not be completed.".into(),
            ErrorKind::Internal => {
                "An unexpected error occurred. Please try again.".into()
            }
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code(), self.message)?;
        if let Some(internal) = &self.internal_message {
            write!(f, " (internal: {internal})")?;
        }
        Ok(())
    }
}

impl std::error::Error for AppError {}

/// Projection of the oldest queued error for the shell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserFacingError {
    pub code: String,
    pub message: String,
    pub is_fatal: bool,
}

impl From<&AppError> for UserFacingError {
    fn from(error: &AppError) -> Self {
        Self {
            code: error.code().to_string(),
            message: error.user_facing_message(),
            is_fatal: matches!(error.severity, ErrorSeverity::Fatal),
        }
    }
}

// --- Session ------------------------------------------------------------

/// API credential. Debug output is redacted and the backing string is
/// wiped on drop.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Secret([REDACTED])")
    }
}

impl Drop for Secret {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// Host-provided installation parameters, delivered once at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub api_key: Option<Secret>,
    /// The host validated the key against the API when it was configured.
    pub key_verified: bool,
    pub default_source: Option<Source>,
    pub disable_source_selection: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    #[default]
    Idle,
    MissingCredential,
    LoadingSources,
    Ready,
}

// --- Model --------------------------------------------------------------

#[derive(Debug)]
pub struct Model {
    pub session: SessionState,
    pub api_key: Option<Secret>,
    pub sources: Vec<Source>,
    pub selected_source: Option<Source>,
    pub source_selection_locked: bool,
    pub gallery: GalleryState,
    pub page_debounce: CoalescingSlot<usize>,
    pub filter_debounce: CoalescingSlot<String>,
    pub uploads: UploadQueue,
    pub errors: VecDeque<AppError>,
    pub selected_asset: Option<AssetRecord>,
    pub confirmed_selection: Option<AssetRecord>,
}

impl Default for Model {
    fn default() -> Self {
        Self {
            session: SessionState::Idle,
            api_key: None,
            sources: Vec::new(),
            selected_source: None,
            source_selection_locked: false,
            gallery: GalleryState::default(),
            page_debounce: CoalescingSlot::leading(),
            filter_debounce: CoalescingSlot::trailing(),
            uploads: UploadQueue::default(),
            errors: VecDeque::new(),
            selected_asset: None,
            confirmed_selection: None,
        }
    }
}

impl Model {
    /// Queue an error. Consecutive duplicates collapse so a retried action
    /// cannot flood the queue with the same failure.
    pub fn push_error(&mut self, error: AppError) {
        let duplicate = self
            .errors
            .back()
            .is_some_and(|last| last.kind == error.kind && last.message == error.message);
        if !duplicate {
            self.errors.push_back(error);
        }
    }

    /// Dismiss the `count` oldest errors.
    pub fn dismiss_errors(&mut self, count: usize) {
        for _ in 0..count {
            if self.errors.pop_front().is_none() {
                break;
            }
        }
    }
}

// --- Events -------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    SessionStarted { config: SessionConfig },
    SourcesResponse { result: Box<HttpResult> },
    SourceSelected { source_id: SourceId },

    PageRequested { index: usize },
    PageDebounceElapsed { generation: u64 },
    FilterChanged { text: String },
    FilterDebounceElapsed { generation: u64 },
    GalleryResponse { seq: u64, result: Box<HttpResult> },
    AssetSelected { url: String },
    SelectionConfirmed,
    SelectionCleared,

    FilesAdded { files: Vec<SelectedFile> },
    UploadConfirmed { destination: String },
    PreviewCancelled,
    UploadResponse { key: ItemKey, result: Box<HttpResult> },

    ErrorsDismissed { count: usize },
}

impl Event {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Event::SessionStarted { .. } => "session_started",
            Event::SourcesResponse { .. } => "sources_response",
            Event::SourceSelected { .. } => "source_selected",
            Event::PageRequested { .. } => "page_requested",
            Event::PageDebounceElapsed { .. } => "page_debounce_elapsed",
            Event::FilterChanged { .. } => "filter_changed",
            Event::FilterDebounceElapsed { .. } => "filter_debounce_elapsed",
            Event::GalleryResponse { .. } => "gallery_response",
            Event::AssetSelected { .. } => "asset_selected",
            Event::SelectionConfirmed => "selection_confirmed",
            Event::SelectionCleared => "selection_cleared",
            Event::FilesAdded { .. } => "files_added",
            Event::UploadConfirmed { .. } => "upload_confirmed",
            Event::PreviewCancelled => "preview_cancelled",
            Event::UploadResponse { .. } => "upload_response",
            Event::ErrorsDismissed { .. } => "errors_dismissed",
        }
    }
}

// --- Formatters ---------------------------------------------------------

#[must_use]
pub fn format_size(bytes: u64) -> String {
    const MIB: f64 = 1024.0 * 1024.0;
    let bytes = bytes as f64;
    if bytes < MIB {
        format!("{:.1} KB", bytes / 1024.0)
    } else {
        format!("{:.1} MB", bytes / MIB)
    }
}

/// HH:MM:SS (UTC) from epoch milliseconds.
#[must_use]
pub fn format_time_of_day(timestamp_ms: u64) -> String {
    let seconds = timestamp_ms / 1000;
    let (h, m, s) = ((seconds / 3600) % 24, (seconds / 60) % 60, seconds % 60);
    format!("{h:02}:{m:02}:{s:02}")
}

// --- ViewModel ----------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceView {
    pub id: String,
    pub name: String,
    pub domain: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GalleryView {
    pub assets: Vec<AssetRecord>,
    pub page_index: usize,
    pub total_page_count: usize,
    pub total_records: u64,
    pub is_fetching: bool,
    pub active_filter: String,
    /// The source genuinely has nothing to show (fetch succeeded,
    /// unfiltered, zero records). Never set after a failed fetch.
    pub show_empty_state: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewRow {
    pub key: String,
    pub file_name: String,
    pub content_type: String,
    pub size_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRow {
    pub key: String,
    pub file_name: String,
    pub destination: String,
    pub size_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveUploadRow {
    pub key: String,
    pub file_name: String,
    pub destination: String,
    pub size_text: String,
    pub started_at_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinishedRow {
    pub key: String,
    pub full_path: String,
    pub size_text: String,
    pub started_at_text: String,
    pub succeeded: bool,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadView {
    pub preview: Vec<PreviewRow>,
    pub pending: Vec<PendingRow>,
    pub active: Option<ActiveUploadRow>,
    pub finished: Vec<FinishedRow>,
    /// Queued items not yet started.
    pub uploads_in_progress: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewModel {
    pub needs_api_key: bool,
    pub is_loading_sources: bool,
    pub sources: Vec<SourceView>,
    pub selected_source_id: Option<String>,
    pub source_selection_enabled: bool,
    pub gallery: GalleryView,
    pub upload: UploadView,
    pub selected_asset_url: Option<String>,
    pub confirmed_asset: Option<AssetRecord>,
    pub error: Option<UserFacingError>,
    pub error_count: usize,
}

pub mod app {
    use super::*;
    use crate::capabilities::HttpRequest;
    use crate::upload::{DestinationPath, UploadFailure};

    #[derive(Default)]
    pub struct App;

    impl App {
        fn send_sources_request(model: &mut Model, caps: &Capabilities) {
            let Some(key) = model.api_key.as_ref() else {
                caps.telemetry()
                    .warn("sources_request_without_credential", "api key missing");
                return;
            };

            let request = HttpRequest::get(gallery::sources_url())
                .and_then(|r| {
                    r.with_header("Authorization", format!("Bearer {}", key.expose()))
                })
                .and_then(|r| r.with_timeout_ms(SOURCES_TIMEOUT_MS));

            match request {
                Ok(request) => {
                    caps.http().execute(request, move |result| Event::SourcesResponse {
                        result: Box::new(result),
                    });
                }
                Err(e) => {
                    caps.telemetry()
                        .error("sources_request_build_failed", e.to_string());
                    model.session = SessionState::Ready;
                    model.push_error(
                        AppError::new(ErrorKind::Internal, "Unable to contact the catalog.")
                            .with_internal(e.to_string()),
                    );
                }
            }
        }

        /// Issue a catalog page fetch for the selected source, superseding
        /// any fetch still in flight.
        fn send_gallery_fetch(model: &mut Model, caps: &Capabilities, page_index: usize) {
            let Some(source) = model.selected_source.clone() else {
                caps.telemetry()
                    .warn("gallery_fetch_without_source", "no source selected");
                return;
            };
            let Some(key) = model.api_key.as_ref() else {
                caps.telemetry()
                    .warn("gallery_fetch_without_credential", "api key missing");
                return;
            };

            model.gallery.page.current_index = page_index;
            let seq = model.gallery.begin_fetch();
            let url = gallery::catalog_page_url(&source.id, page_index, &model.gallery.filter);

            let request = HttpRequest::get(url)
                .and_then(|r| {
                    r.with_header("Authorization", format!("Bearer {}", key.expose()))
                })
                .and_then(|r| r.with_timeout_ms(CATALOG_TIMEOUT_MS));

            match request {
                Ok(request) => {
                    caps.http().execute(request, move |result| Event::GalleryResponse {
                        seq,
                        result: Box::new(result),
                    });
                }
                Err(e) => {
                    caps.telemetry()
                        .error("gallery_request_build_failed", e.to_string());
                    model.gallery.apply_failure();
                    model.push_error(
                        AppError::new(ErrorKind::Retrieval, "Unable to load images.")
                            .with_internal(e.to_string()),
                    );
                }
            }
        }

        /// Claim the transfer slot for the queue head and put it on the
        /// wire. Items whose request cannot even be built complete as
        /// failed immediately and the next one is tried.
        fn pump_uploads(model: &mut Model, caps: &Capabilities) {
            let Some(api_key) = model.api_key.as_ref().map(|k| k.expose().to_string())
            else {
                caps.telemetry()
                    .warn("upload_without_credential", "api key missing");
                return;
            };

            while let Some(started) = model.uploads.start_next(get_current_time_ms()) {
                let request = HttpRequest::post(started.url.clone())
                    .and_then(|r| r.with_header("Authorization", format!("Bearer {api_key}")))
                    .and_then(|r| {
                        if started.content_type.is_empty() {
                            Ok(r)
                        } else {
                            r.with_header("Content-Type", started.content_type.clone())
                        }
                    })
                    .and_then(|r| r.with_timeout_ms(UPLOAD_TIMEOUT_MS))
                    .and_then(|r| r.with_body(started.body.into_vec()));

                match request {
                    Ok(request) => {
                        let key = started.key.clone();
                        caps.http().execute(request, move |result| Event::UploadResponse {
                            key,
                            result: Box::new(result),
                        });
                        break;
                    }
                    Err(e) => {
                        caps.telemetry()
                            .error("upload_request_build_failed", e.to_string());
                        model.uploads.complete(
                            &started.key,
                            Some(UploadFailure {
                                status: None,
                                message: e.to_string(),
                            }),
                        );
                    }
                }
            }
        }

        fn build_upload_view(model: &Model) -> UploadView {
            let preview = model
                .uploads
                .preview()
                .iter()
                .map(|item| PreviewRow {
                    key: item.key.to_string(),
                    file_name: item.file_name.clone(),
                    content_type: item.content_type.clone(),
                    size_text: format_size(item.size),
                })
                .collect();

            let pending = model
                .uploads
                .queued()
                .map(|item| PendingRow {
                    key: item.key.to_string(),
                    file_name: item.file_name.clone(),
                    destination: item.destination.to_string(),
                    size_text: format_size(item.size),
                })
                .collect();

            let active = model.uploads.in_flight().map(|item| ActiveUploadRow {
                key: item.key.to_string(),
                file_name: item.file_name.clone(),
                destination: item.destination.to_string(),
                size_text: format_size(item.size),
                started_at_text: format_time_of_day(item.started_at_ms),
            });

            let finished = model
                .uploads
                .completed()
                .iter()
                .map(|item| FinishedRow {
                    key: item.key.to_string(),
                    full_path: item.full_path.clone(),
                    size_text: format_size(item.size),
                    started_at_text: format_time_of_day(item.started_at_ms),
                    succeeded: item.succeeded(),
                    error_message: item.error.as_ref().map(|e| e.message.clone()),
                })
                .collect();

            UploadView {
                preview,
                pending,
                active,
                finished,
                uploads_in_progress: model.uploads.pending_count(),
            }
        }
    }

    impl crux_core::App for App {
        type Event = Event;
        type Model = Model;
        type ViewModel = ViewModel;
        type Capabilities = Capabilities;

        fn update(&self, event: Event, model: &mut Model, caps: &Capabilities) {
            match event {
                Event::SessionStarted { config } => {
                    model.source_selection_locked = config.disable_source_selection;
                    model.selected_source = config.default_source;

                    match config.api_key {
                        Some(key) if config.key_verified && !key.is_empty() => {
                            model.api_key = Some(key);
                            model.session = SessionState::LoadingSources;
                            Self::send_sources_request(model, caps);
                        }
                        _ => {
                            caps.telemetry()
                                .warn("session_missing_credential", "key absent or unverified");
                            model.session = SessionState::MissingCredential;
                            model.push_error(AppError::invalid_api_key());
                        }
                    }
                    caps.render().render();
                }

                Event::SourcesResponse { result } => {
                    model.session = SessionState::Ready;
                    match *result {
                        Ok(response) if response.is_success() => {
                            match gallery::parse_sources(response.body()) {
                                Ok(sources) if sources.is_empty() => {
                                    caps.telemetry().warn("sources_empty", "no enabled sources");
                                    model.sources = Vec::new();
                                    model.selected_source = None;
                                    model.push_error(AppError::no_sources());
                                }
                                Ok(sources) => {
                                    // A configured default wins if it still
                                    // resolves; a lone source auto-selects.
                                    let preselected =
                                        model.selected_source.as_ref().and_then(|chosen| {
                                            sources.iter().find(|s| s.id == chosen.id).cloned()
                                        });
                                    model.selected_source = match preselected {
                                        Some(source) => Some(source),
                                        None if sources.len() == 1 => Some(sources[0].clone()),
                                        None => None,
                                    };
                                    model.sources = sources;

                                    if model.selected_source.is_some() {
                                        model.gallery.reset_for_source();
                                        Self::send_gallery_fetch(model, caps, 0);
                                    }
                                }
                                Err(e) => {
                                    caps.telemetry()
                                        .error("sources_parse_failed", e.to_string());
                                    model.push_error(
                                        AppError::new(
                                            ErrorKind::Retrieval,
                                            "Unable to load sources.",
                                        )
                                        .with_internal(e.to_string()),
                                    );
                                }
                            }
                        }
                        Ok(response) if matches!(response.status(), 401 | 403) => {
                            caps.telemetry()
                                .warn("sources_unauthorized", response.status().to_string());
                            model.session = SessionState::MissingCredential;
                            model.push_error(AppError::invalid_api_key());
                        }
                        Ok(response) => {
                            caps.telemetry()
                                .error("sources_fetch_failed", response.status().to_string());
                            model.push_error(
                                AppError::new(ErrorKind::Retrieval, "Unable to load sources.")
                                    .with_internal(format!("status {}", response.status())),
                            );
                        }
                        Err(e) => {
                            caps.telemetry().error("sources_fetch_failed", e.to_string());
                            model.push_error(
                                AppError::new(ErrorKind::Retrieval, "Unable to load sources.")
                                    .with_internal(e.to_string()),
                            );
                        }
                    }
                    caps.render().render();
                }

                Event::SourceSelected { source_id } => {
                    match model.sources.iter().find(|s| s.id == source_id).cloned() {
                        Some(source) => {
                            model.selected_source = Some(source);
                            model.errors.clear();
                            model.selected_asset = None;
                            model.gallery.reset_for_source();
                            model.page_debounce.reset();
                            model.filter_debounce.reset();
                            Self::send_gallery_fetch(model, caps, 0);
                        }
                        None => {
                            caps.telemetry()
                                .warn("unknown_source_selected", source_id.as_str());
                        }
                    }
                    caps.render().render();
                }

                Event::PageRequested { index } => {
                    let total = model.gallery.page.total_page_count;
                    let index = if total > 0 { index.min(total - 1) } else { index };

                    let action = model.page_debounce.trigger(index);
                    if let Some(index) = action.fire {
                        Self::send_gallery_fetch(model, caps, index);
                    }
                    if let Some(generation) = action.schedule {
                        caps.delay().start(DEBOUNCE_WINDOW_MS, move |_| {
                            Event::PageDebounceElapsed { generation }
                        });
                    }
                    caps.render().render();
                }

                Event::PageDebounceElapsed { generation } => {
                    let action = model.page_debounce.elapsed(generation);
                    if let Some(index) = action.fire {
                        Self::send_gallery_fetch(model, caps, index);
                    }
                    if let Some(generation) = action.schedule {
                        caps.delay().start(DEBOUNCE_WINDOW_MS, move |_| {
                            Event::PageDebounceElapsed { generation }
                        });
                    }
                    caps.render().render();
                }

                Event::FilterChanged { text } => {
                    let action = model.filter_debounce.trigger(text);
                    if let Some(generation) = action.schedule {
                        caps.delay().start(DEBOUNCE_WINDOW_MS, move |_| {
                            Event::FilterDebounceElapsed { generation }
                        });
                    }
                    caps.render().render();
                }

                Event::FilterDebounceElapsed { generation } => {
                    let action = model.filter_debounce.elapsed(generation);
                    if let Some(text) = action.fire {
                        model.gallery.filter = text;
                        // A new filter always restarts from the first page.
                        Self::send_gallery_fetch(model, caps, 0);
                    }
                    caps.render().render();
                }

                Event::GalleryResponse { seq, result } => {
                    if !model.gallery.is_current(seq) {
                        caps.telemetry().event("gallery_response_stale");
                        return;
                    }

                    let outcome = match *result {
                        Ok(response) if response.is_success() => {
                            match model.selected_source.as_ref() {
                                Some(source) => {
                                    gallery::parse_asset_page(source, response.body())
                                        .map_err(|e| e.to_string())
                                }
                                None => Err("no source selected".to_string()),
                            }
                        }
                        Ok(response) => {
                            Err(format!("catalog returned status {}", response.status()))
                        }
                        Err(e) => Err(e.to_string()),
                    };

                    match outcome {
                        Ok(page) => {
                            model.gallery.apply_page(page);
                            if model.gallery.should_report_no_images() {
                                model.push_error(AppError::no_origin_images());
                            }
                        }
                        Err(detail) => {
                            caps.telemetry().error("gallery_fetch_failed", &detail);
                            model.gallery.apply_failure();
                            model.push_error(
                                AppError::new(
                                    ErrorKind::Retrieval,
                                    "Unable to load images from this source.",
                                )
                                .with_internal(detail),
                            );
                        }
                    }
                    caps.render().render();
                }

                Event::AssetSelected { url } => {
                    match model.gallery.assets.iter().find(|a| a.url == url).cloned() {
                        Some(asset) => model.selected_asset = Some(asset),
                        None => {
                            caps.telemetry().warn("unknown_asset_selected", url);
                        }
                    }
                    caps.render().render();
                }

                Event::SelectionConfirmed => {
                    model.confirmed_selection = model.selected_asset.clone();
                    caps.render().render();
                }

                Event::SelectionCleared => {
                    model.selected_asset = None;
                    model.confirmed_selection = None;
                    caps.render().render();
                }

                Event::FilesAdded { files } => {
                    model.uploads.add_files(files, get_current_time_ms());
                    caps.render().render();
                }

                Event::UploadConfirmed { destination } => {
                    match model.selected_source.clone() {
                        Some(source) => {
                            model
                                .uploads
                                .confirm(source.id, DestinationPath::new(destination));
                            Self::pump_uploads(model, caps);
                        }
                        None => {
                            caps.telemetry()
                                .warn("upload_confirm_without_source", "no source selected");
                            model.push_error(AppError::new(
                                ErrorKind::Validation,
                                "Select a source before uploading.",
                            ));
                        }
                    }
                    caps.render().render();
                }

                Event::PreviewCancelled => {
                    model.uploads.cancel_preview();
                    caps.render().render();
                }

                Event::UploadResponse { key, result } => {
                    let error = match *result {
                        Ok(response) if response.is_success() => None,
                        Ok(response) => Some(UploadFailure {
                            status: Some(response.status()),
                            message: format!("upload returned status {}", response.status()),
                        }),
                        Err(e) => Some(UploadFailure {
                            status: None,
                            message: e.to_string(),
                        }),
                    };

                    match &error {
                        Some(failure) => {
                            caps.telemetry().error("upload_failed", &failure.message);
                        }
                        None => caps.telemetry().event("upload_succeeded"),
                    }

                    if !model.uploads.complete(&key, error) {
                        caps.telemetry()
                            .warn("upload_completion_mismatch", key.as_str());
                    }
                    Self::pump_uploads(model, caps);
                    caps.render().render();
                }

                Event::ErrorsDismissed { count } => {
                    model.dismiss_errors(count);
                    caps.render().render();
                }
            }
        }

        fn view(&self, model: &Model) -> ViewModel {
            let gallery = GalleryView {
                assets: model.gallery.assets.clone(),
                page_index: model.gallery.page.current_index,
                total_page_count: model.gallery.page.total_page_count,
                total_records: model.gallery.total_records,
                is_fetching: model.gallery.is_fetching,
                active_filter: model.gallery.filter.clone(),
                show_empty_state: model.gallery.has_loaded
                    && !model.gallery.is_fetching
                    && !model.gallery.last_fetch_failed
                    && model.gallery.page.total_page_count == 0
                    && model.gallery.filter.is_empty(),
            };

            ViewModel {
                needs_api_key: matches!(model.session, SessionState::MissingCredential),
                is_loading_sources: matches!(model.session, SessionState::LoadingSources),
                sources: model
                    .sources
                    .iter()
                    .map(|s| SourceView {
                        id: s.id.as_str().to_string(),
                        name: s.name.clone(),
                        domain: s.domain.clone(),
                    })
                    .collect(),
                selected_source_id: model
                    .selected_source
                    .as_ref()
                    .map(|s| s.id.as_str().to_string()),
                source_selection_enabled: !model.source_selection_locked,
                gallery,
                upload: Self::build_upload_view(model),
                selected_asset_url: model.selected_asset.as_ref().map(|a| a.url.clone()),
                confirmed_asset: model.confirmed_selection.clone(),
                error: model.errors.front().map(UserFacingError::from),
                error_count: model.errors.len(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod formatter_tests {
        use super::*;

        #[test]
        fn test_format_size_kb_below_one_mib() {
            assert_eq!(format_size(0), "0.0 KB");
            assert_eq!(format_size(512), "0.5 KB");
            assert_eq!(format_size(1024), "1.0 KB");
            assert_eq!(format_size(1024 * 1024 - 1), "1024.0 KB");
        }

        #[test]
        fn test_format_size_mb_above_one_mib() {
            assert_eq!(format_size(1024 * 1024), "1.0 MB");
            assert_eq!(format_size(5 * 1024 * 1024 + 512 * 1024), "5.5 MB");
        }

        #[test]
        fn test_format_time_of_day() {
            assert_eq!(format_time_of_day(0), "00:00:00");
            // 2021-01-01 10:20:30 UTC
            assert_eq!(format_time_of_day(1_609_496_430_000), "10:20:30");
        }
    }

    mod error_tests {
        use super::*;

        #[test]
        fn test_invalid_api_key_is_fatal() {
            let error = AppError::invalid_api_key();
            assert_eq!(error.severity, ErrorSeverity::Fatal);
            assert_eq!(error.code(), "INVALID_API_KEY");
        }

        #[test]
        fn test_retrieval_is_informational() {
            let error = AppError::new(ErrorKind::Retrieval, "nope");
            assert_eq!(error.severity, ErrorSeverity::Informational);
        }

        #[test]
        fn test_display_includes_internal_detail() {
            let error = AppError::new(ErrorKind::Upload, "failed").with_internal("status 500");
            let rendered = error.to_string();
            assert!(rendered.contains("UPLOAD_ERROR"));
            assert!(rendered.contains("status 500"));
        }

        #[test]
        fn test_consecutive_duplicates_collapse() {
            let mut model = Model::default();
            model.push_error(AppError::invalid_api_key());
            model.push_error(AppError::invalid_api_key());
            assert_eq!(model.errors.len(), 1);

            model.push_error(AppError::no_sources());
            assert_eq!(model.errors.len(), 2);
        }

        #[test]
        fn test_dismiss_more_than_queued() {
            let mut model = Model::default();
            model.push_error(AppError::no_sources());
            model.dismiss_errors(10);
            assert!(model.errors.is_empty());
        }

        #[test]
        fn test_oldest_error_dismissed_first() {
            let mut model = Model::default();
            model.push_error(AppError::no_sources());
            model.push_error(AppError::no_origin_images());
            model.dismiss_errors(1);
            assert_eq!(model.errors.front().map(|e| e.kind), Some(ErrorKind::NoOriginImages));
        }
    }

    mod secret_tests {
        use super::*;

        #[test]
        fn test_debug_is_redacted() {
            let secret = Secret::new("ak_live_1234567890");
            let rendered = format!("{secret:?}");
            assert!(!rendered.contains("1234567890"));
            assert!(rendered.contains("REDACTED"));
        }

        #[test]
        fn test_expose_returns_value() {
            let secret = Secret::new("key");
            assert_eq!(secret.expose(), "key");
            assert!(!secret.is_empty());
        }
    }
}
