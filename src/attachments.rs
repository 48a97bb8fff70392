// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Attachment staging for a pending record
//!
//! Files are registered synchronously and keep insertion order. Image
//! previews render on a task per attachment; removing the attachment aborts
//! its task, and a preview that lands for an id no longer staged is dropped.

use crate::error::ValidationError;
use crate::types::{AttachmentId, AttachmentState, MimeClass, PendingFile, StagedAttachment};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;

/// Hard ceiling on the size of a single staged file (10 MiB)
pub const MAX_ATTACHMENT_BYTES: u64 = 10 * 1024 * 1024;

/// Renders a presentation-only preview for a staged file
#[async_trait]
pub trait PreviewRenderer: Send + Sync {
    /// Preview for `file`, or `None` if it cannot be rendered
    async fn render(&self, file: &PendingFile) -> Option<String>;
}

/// Inline `data:` URL preview
#[derive(Debug, Clone, Copy, Default)]
pub struct InlinePreview;

#[async_trait]
impl PreviewRenderer for InlinePreview {
    async fn render(&self, file: &PendingFile) -> Option<String> {
        let data = Arc::clone(&file.data);
        let encoded = tokio::task::spawn_blocking(move || STANDARD.encode(&data[..]))
            .await
            .ok()?;
        Some(format!("data:{};base64,{}", file.mime_type, encoded))
    }
}

type Entries = Arc<Mutex<Vec<StagedAttachment>>>;

fn lock(entries: &Mutex<Vec<StagedAttachment>>) -> MutexGuard<'_, Vec<StagedAttachment>> {
    entries.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Write a rendered preview into its entry. Returns `false` if the entry is
/// gone or already resolved.
fn patch_preview(entries: &Mutex<Vec<StagedAttachment>>, id: &AttachmentId, preview: Option<String>) -> bool {
    let mut entries = lock(entries);
    match entries.iter_mut().find(|e| &e.id == id) {
        Some(entry) if entry.state == AttachmentState::Pending => {
            entry.preview = preview;
            entry.state = AttachmentState::Ready;
            true
        }
        Some(_) => false,
        None => {
            tracing::trace!(attachment = %id, "preview resolved after removal; dropped");
            false
        }
    }
}

/// Session-local list of files waiting to be submitted with a record
pub struct AttachmentStager {
    session_tag: String,
    limit: u64,
    renderer: Option<Arc<dyn PreviewRenderer>>,
    entries: Entries,
    tasks: HashMap<AttachmentId, JoinHandle<()>>,
    seq: u64,
}

impl std::fmt::Debug for AttachmentStager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttachmentStager")
            .field("session_tag", &self.session_tag)
            .field("limit", &self.limit)
            .field("previews", &self.renderer.is_some())
            .field("entries", &lock(&self.entries).len())
            .field("tasks", &self.tasks.len())
            .finish()
    }
}

impl AttachmentStager {
    /// Empty stager with the default limit and inline previews
    pub fn new(session_tag: impl Into<String>) -> Self {
        Self {
            session_tag: session_tag.into(),
            limit: MAX_ATTACHMENT_BYTES,
            renderer: Some(Arc::new(InlinePreview)),
            entries: Arc::new(Mutex::new(Vec::new())),
            tasks: HashMap::new(),
            seq: 0,
        }
    }

    /// Lower the per-file limit. Values above [`MAX_ATTACHMENT_BYTES`] are clamped.
    #[must_use]
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = limit.min(MAX_ATTACHMENT_BYTES);
        self
    }

    /// Use a custom preview renderer
    #[must_use]
    pub fn with_renderer(mut self, renderer: Arc<dyn PreviewRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Stage files without rendering previews
    #[must_use]
    pub fn without_previews(mut self) -> Self {
        self.renderer = None;
        self
    }

    /// Swap the preview renderer. Staged entries and running previews are
    /// kept; only files added afterwards use the new renderer.
    pub fn set_renderer(&mut self, renderer: Option<Arc<dyn PreviewRenderer>>) {
        self.renderer = renderer;
    }

    /// Whether image previews are rendered
    #[must_use]
    pub fn previews_enabled(&self) -> bool {
        self.renderer.is_some()
    }

    /// Effective per-file size limit in bytes
    #[must_use]
    pub fn limit(&self) -> u64 {
        self.limit
    }

    fn next_id(&mut self, name: &str) -> AttachmentId {
        self.seq += 1;
        let mut hasher = Sha256::new();
        hasher.update(self.session_tag.as_bytes());
        hasher.update(self.seq.to_be_bytes());
        hasher.update(name.as_bytes());
        let hash = hex::encode(hasher.finalize());
        AttachmentId(format!("att:{}", &hash[..12]))
    }

    fn prune_finished(&mut self) {
        self.tasks.retain(|_, task| !task.is_finished());
    }

    /// Stage a batch of files.
    ///
    /// If any file exceeds the limit the whole batch is rejected and nothing
    /// is staged. Accepted entries start without a preview; image previews
    /// are rendered in the background when a Tokio runtime is available.
    pub fn add(&mut self, files: Vec<PendingFile>) -> Result<Vec<StagedAttachment>, ValidationError> {
        if let Some(file) = files.iter().find(|f| f.size() > self.limit) {
            tracing::debug!(file = %file.name, size = file.size(), limit = self.limit, "attachment batch rejected");
            return Err(ValidationError::SizeLimitExceeded {
                name: file.name.clone(),
                size: file.size(),
                limit: self.limit,
            });
        }

        self.prune_finished();
        let runtime = tokio::runtime::Handle::try_current().ok();
        let mut added = Vec::with_capacity(files.len());

        for file in files {
            let id = self.next_id(&file.name);
            let mime_class = MimeClass::from_mime(&file.mime_type);
            let renderer = match (&self.renderer, &runtime) {
                (Some(r), Some(_)) if mime_class == MimeClass::Image => Some(Arc::clone(r)),
                _ => None,
            };

            let entry = StagedAttachment {
                id: id.clone(),
                name: file.name.clone(),
                size: file.size(),
                mime_type: file.mime_type.clone(),
                mime_class,
                preview: None,
                state: if renderer.is_some() { AttachmentState::Pending } else { AttachmentState::Ready },
                data: Arc::clone(&file.data),
            };
            lock(&self.entries).push(entry.clone());
            added.push(entry);

            if let (Some(renderer), Some(handle)) = (renderer, &runtime) {
                let entries = Arc::clone(&self.entries);
                let task_id = id.clone();
                let task = handle.spawn(async move {
                    let preview = renderer.render(&file).await;
                    patch_preview(&entries, &task_id, preview);
                });
                self.tasks.insert(id, task);
            }
        }

        tracing::debug!(count = added.len(), "attachments staged");
        Ok(added)
    }

    /// Remove an attachment and cancel its preview. Returns `false` for an
    /// unknown id.
    pub fn remove(&mut self, id: &AttachmentId) -> bool {
        if let Some(task) = self.tasks.remove(id) {
            task.abort();
        }
        self.prune_finished();
        let mut entries = lock(&self.entries);
        let before = entries.len();
        entries.retain(|e| &e.id != id);
        let removed = entries.len() < before;
        if removed {
            tracing::debug!(attachment = %id, "attachment removed");
        }
        removed
    }

    /// Snapshot of the staged attachments in insertion order
    #[must_use]
    pub fn list(&self) -> Vec<StagedAttachment> {
        lock(&self.entries).clone()
    }

    /// Snapshot of a single attachment
    #[must_use]
    pub fn get(&self, id: &AttachmentId) -> Option<StagedAttachment> {
        lock(&self.entries).iter().find(|e| &e.id == id).cloned()
    }

    /// Number of staged attachments
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    /// Whether nothing is staged
    #[must_use]
    pub fn is_empty(&self) -> bool {
        lock(&self.entries).is_empty()
    }

    /// Number of attachments still waiting on a preview
    #[must_use]
    pub fn pending_previews(&self) -> usize {
        lock(&self.entries)
            .iter()
            .filter(|e| e.state == AttachmentState::Pending)
            .count()
    }

    /// Wait for every outstanding preview task to finish
    pub async fn settle(&mut self) {
        let tasks: Vec<_> = self.tasks.drain().map(|(_, t)| t).collect();
        for task in tasks {
            // Aborted tasks report a cancellation error; nothing to do.
            let _ = task.await;
        }
    }

    /// Drop every attachment and cancel all preview work
    pub fn clear(&mut self) {
        for (_, task) in self.tasks.drain() {
            task.abort();
        }
        lock(&self.entries).clear();
    }
}

impl Drop for AttachmentStager {
    fn drop(&mut self) {
        for task in self.tasks.values() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Semaphore;

    const MIB: usize = 1024 * 1024;

    /// Renderer that blocks until the test hands out permits
    struct GatedRenderer {
        gate: Semaphore,
        renders: AtomicUsize,
    }

    impl GatedRenderer {
        fn new() -> Arc<Self> {
            Arc::new(Self { gate: Semaphore::new(0), renders: AtomicUsize::new(0) })
        }
    }

    #[async_trait]
    impl PreviewRenderer for GatedRenderer {
        async fn render(&self, file: &PendingFile) -> Option<String> {
            let _permit = self.gate.acquire().await.ok()?;
            self.renders.fetch_add(1, Ordering::SeqCst);
            Some(format!("preview:{}", file.name))
        }
    }

    fn file(name: &str, mime: &str, size: usize) -> PendingFile {
        PendingFile::new(name, mime, vec![0u8; size])
    }

    #[tokio::test]
    async fn test_finished_preview_handles_are_released() {
        let renderer = GatedRenderer::new();
        let mut stager = AttachmentStager::new("s1").with_renderer(renderer.clone());
        stager.add(vec![file("a.jpg", "image/jpeg", 10), file("b.jpg", "image/jpeg", 10)]).unwrap();
        assert_eq!(stager.tasks.len(), 2);

        renderer.gate.add_permits(2);
        for _ in 0..50 {
            if stager.pending_previews() == 0 && stager.tasks.values().all(JoinHandle::is_finished) {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(stager.pending_previews(), 0);

        stager.add(vec![file("notes.txt", "text/plain", 10)]).unwrap();
        assert!(stager.tasks.is_empty());
        assert_eq!(stager.len(), 3);
    }

    #[tokio::test]
    async fn test_set_renderer_keeps_staged_files() {
        let renderer = GatedRenderer::new();
        let mut stager = AttachmentStager::new("s1").without_previews();
        assert!(!stager.previews_enabled());
        stager.add(vec![file("a.jpg", "image/jpeg", 10)]).unwrap();

        stager.set_renderer(Some(renderer.clone()));
        assert!(stager.previews_enabled());
        stager.add(vec![file("b.jpg", "image/jpeg", 10)]).unwrap();
        renderer.gate.add_permits(1);
        stager.settle().await;

        let listed = stager.list();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].preview, None);
        assert_eq!(listed[1].preview.as_deref(), Some("preview:b.jpg"));
        assert_eq!(renderer.renders.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_oversized_file_rejects_whole_batch() {
        let mut stager = AttachmentStager::new("s1");
        stager.add(vec![file("keep.jpg", "image/jpeg", 10)]).unwrap();

        let err = stager
            .add(vec![file("ok.pdf", "application/pdf", MIB), file("big.mov", "video/quicktime", 11 * MIB)])
            .unwrap_err();

        assert!(matches!(err, ValidationError::SizeLimitExceeded { ref name, .. } if name == "big.mov"));
        assert_eq!(stager.len(), 1);
        assert_eq!(stager.list()[0].name, "keep.jpg");
    }

    #[tokio::test]
    async fn test_exactly_at_limit_is_accepted() {
        let mut stager = AttachmentStager::new("s1").without_previews();
        let added = stager.add(vec![file("edge.bin", "application/octet-stream", 10 * MIB)]).unwrap();
        assert_eq!(added[0].size, MAX_ATTACHMENT_BYTES);
    }

    #[tokio::test]
    async fn test_images_preview_exactly_once() {
        let renderer = GatedRenderer::new();
        let mut stager = AttachmentStager::new("s1").with_renderer(renderer.clone());

        let added = stager
            .add(vec![file("a.jpg", "image/jpeg", MIB), file("b.png", "image/png", 2 * MIB)])
            .unwrap();
        assert_eq!(added.len(), 2);
        assert!(stager.list().iter().all(|a| a.preview.is_none() && a.state == AttachmentState::Pending));
        assert_eq!(stager.pending_previews(), 2);

        renderer.gate.add_permits(2);
        stager.settle().await;

        let listed = stager.list();
        assert_eq!(listed[0].preview.as_deref(), Some("preview:a.jpg"));
        assert_eq!(listed[1].preview.as_deref(), Some("preview:b.png"));
        assert!(listed.iter().all(|a| a.state == AttachmentState::Ready));
        assert_eq!(renderer.renders.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_non_images_are_ready_immediately() {
        let renderer = GatedRenderer::new();
        let mut stager = AttachmentStager::new("s1").with_renderer(renderer.clone());
        stager.add(vec![file("spray-log.pdf", "application/pdf", 100)]).unwrap();

        let entry = &stager.list()[0];
        assert_eq!(entry.state, AttachmentState::Ready);
        assert_eq!(entry.mime_class, MimeClass::Document);
        assert!(entry.preview.is_none());
        assert_eq!(renderer.renders.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_remove_cancels_pending_preview() {
        let renderer = GatedRenderer::new();
        let mut stager = AttachmentStager::new("s1").with_renderer(renderer.clone());
        let added = stager
            .add(vec![file("a.jpg", "image/jpeg", 10), file("b.jpg", "image/jpeg", 10)])
            .unwrap();

        assert!(stager.remove(&added[0].id));
        renderer.gate.add_permits(2);
        stager.settle().await;

        let listed = stager.list();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, added[1].id);
        assert_eq!(renderer.renders.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_late_preview_for_removed_id_is_noop() {
        let entries = Mutex::new(Vec::new());
        let gone = AttachmentId("att:gone".into());
        assert!(!patch_preview(&entries, &gone, Some("data:".into())));
        assert!(lock(&entries).is_empty());
    }

    #[tokio::test]
    async fn test_remove_keeps_insertion_order() {
        let mut stager = AttachmentStager::new("s1").without_previews();
        let added = stager
            .add(vec![
                file("1.txt", "text/plain", 1),
                file("2.txt", "text/plain", 1),
                file("3.txt", "text/plain", 1),
            ])
            .unwrap();
        stager.remove(&added[1].id);
        let names: Vec<_> = stager.list().into_iter().map(|a| a.name).collect();
        assert_eq!(names, ["1.txt", "3.txt"]);
        assert!(!stager.remove(&added[1].id));
    }

    #[tokio::test]
    async fn test_ids_are_unique_for_duplicate_names() {
        let mut stager = AttachmentStager::new("s1").without_previews();
        let added = stager
            .add(vec![file("IMG_0001.jpg", "image/jpeg", 1), file("IMG_0001.jpg", "image/jpeg", 1)])
            .unwrap();
        assert_ne!(added[0].id, added[1].id);
        assert!(added[0].id.0.starts_with("att:"));
    }

    #[test]
    fn test_add_without_runtime_skips_previews() {
        let mut stager = AttachmentStager::new("s1");
        stager.add(vec![file("a.jpg", "image/jpeg", 4)]).unwrap();
        let entry = &stager.list()[0];
        assert_eq!(entry.state, AttachmentState::Ready);
        assert!(entry.preview.is_none());
    }

    #[tokio::test]
    async fn test_inline_preview_is_data_url() {
        let mut stager = AttachmentStager::new("s1");
        stager.add(vec![PendingFile::new("dot.png", "image/png", b"abc".to_vec())]).unwrap();
        stager.settle().await;
        assert_eq!(stager.list()[0].preview.as_deref(), Some("data:image/png;base64,YWJj"));
    }

    #[test]
    fn test_limit_is_clamped_to_ceiling() {
        let stager = AttachmentStager::new("s1").with_limit(u64::MAX);
        assert_eq!(stager.limit(), MAX_ATTACHMENT_BYTES);
        let stager = AttachmentStager::new("s1").with_limit(1024);
        assert_eq!(stager.limit(), 1024);
    }
}
