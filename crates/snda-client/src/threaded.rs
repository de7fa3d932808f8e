//! Multipart transfers driven by the transfer engine
//!
//! Each transfer becomes an [`Operation`] of parts, run by a
//! [`TransferCoordinator`] whose workers issue one storage request per unit.
//! The caller's observer sees the engine's events unchanged.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use snda_core::types::{
    plan_parts, ByteRange, MultipartCompleted, MultipartUpload, ObjectMetadata, PartETag,
};
use snda_core::TransferSettings;
use snda_transfer::{
    CancelHandle, CompletedUnit, EventKind, Operation, TransferConfig, TransferCoordinator,
    TransferEvent, TransferObserver, TransferUnit, UnitExecutor, UnitId, UnitOutput, UnitPayload,
};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::error::{ClientError, ClientResult};
use crate::service::StorageService;

/// Where upload data comes from
#[derive(Debug, Clone)]
pub enum PartSource {
    File(PathBuf),
    Memory(Bytes),
}

impl PartSource {
    pub async fn len(&self) -> ClientResult<u64> {
        match self {
            PartSource::File(path) => Ok(fs::metadata(path).await?.len()),
            PartSource::Memory(data) => Ok(data.len() as u64),
        }
    }

    /// Guessed from the file extension
    pub fn content_type(&self) -> Option<String> {
        match self {
            PartSource::File(path) => mime_guess::from_path(path)
                .first()
                .map(|m| m.essence_str().to_string()),
            PartSource::Memory(_) => None,
        }
    }

    async fn read_range(&self, range: ByteRange) -> ClientResult<Bytes> {
        match self {
            PartSource::Memory(data) => {
                let end = usize::try_from(range.end).unwrap_or(usize::MAX);
                if end >= data.len() {
                    return Err(snda_core::Error::InvalidRange(format!(
                        "bytes {}-{} past end of {} byte source",
                        range.start,
                        range.end,
                        data.len()
                    ))
                    .into());
                }
                Ok(data.slice(range.start as usize..=end))
            }
            PartSource::File(path) => {
                let mut file = File::open(path).await?;
                file.seek(SeekFrom::Start(range.start)).await?;
                let mut buf = vec![0u8; range.len() as usize];
                file.read_exact(&mut buf).await?;
                Ok(Bytes::from(buf))
            }
        }
    }
}

/// How a transfer that did not fail ended
#[derive(Debug, Clone, PartialEq)]
pub enum TransferOutcome<T> {
    Completed(T),
    /// Parts never completed, in part order
    Cancelled(Vec<TransferUnit>),
}

impl<T> TransferOutcome<T> {
    pub fn is_completed(&self) -> bool {
        matches!(self, TransferOutcome::Completed(_))
    }
}

fn part_of(unit: &TransferUnit) -> ClientResult<(u32, ByteRange)> {
    match (unit.id(), unit.payload()) {
        (UnitId::Part(n), UnitPayload::Range { start, end }) => Ok((
            *n,
            ByteRange {
                start: *start,
                end: *end,
            },
        )),
        _ => Err(snda_core::Error::InvalidArgument(format!(
            "unit {} is not an object part",
            unit.id()
        ))
        .into()),
    }
}

fn upload_of(unit: &TransferUnit) -> ClientResult<MultipartUpload> {
    match unit.payload() {
        UnitPayload::Upload {
            bucket,
            key,
            upload_id,
        } => Ok(MultipartUpload::new(bucket, key, upload_id)),
        UnitPayload::Range { .. } => Err(snda_core::Error::InvalidArgument(format!(
            "unit {} is not a multipart upload",
            unit.id()
        ))
        .into()),
    }
}

/// Uploads one part of a multipart upload
pub struct PartUploader {
    service: StorageService,
    upload: MultipartUpload,
    source: PartSource,
}

#[async_trait]
impl UnitExecutor for PartUploader {
    type Output = PartETag;
    type Error = ClientError;

    async fn execute(&self, unit: &TransferUnit) -> ClientResult<UnitOutput<PartETag>> {
        let (part_number, range) = part_of(unit)?;
        let body = self.source.read_range(range).await?;
        let sent = body.len() as u64;
        let etag = self.service.upload_part(&self.upload, part_number, body).await?;
        Ok(UnitOutput::new(etag, sent))
    }
}

/// Downloads one range of an object into its place in a pre-sized file
pub struct PartDownloader {
    service: StorageService,
    bucket: String,
    key: String,
    dest: PathBuf,
}

#[async_trait]
impl UnitExecutor for PartDownloader {
    type Output = ByteRange;
    type Error = ClientError;

    async fn execute(&self, unit: &TransferUnit) -> ClientResult<UnitOutput<ByteRange>> {
        let (_, range) = part_of(unit)?;
        let object = self
            .service
            .get_object(&self.bucket, &self.key, Some(range))
            .await?;
        if object.body.len() as u64 != range.len() {
            return Err(ClientError::Decode(format!(
                "expected {} bytes for {}, got {}",
                range.len(),
                range.to_header(),
                object.body.len()
            )));
        }

        let mut file = OpenOptions::new().write(true).open(&self.dest).await?;
        file.seek(SeekFrom::Start(range.start)).await?;
        file.write_all(&object.body).await?;
        file.flush().await?;
        Ok(UnitOutput::new(range, range.len()))
    }
}

/// Completes an upload from the parts the service already holds
pub struct UploadFinisher {
    service: StorageService,
}

#[async_trait]
impl UnitExecutor for UploadFinisher {
    type Output = MultipartCompleted;
    type Error = ClientError;

    async fn execute(&self, unit: &TransferUnit) -> ClientResult<UnitOutput<MultipartCompleted>> {
        let upload = upload_of(unit)?;
        let parts = self.service.list_parts(&upload).await?;
        let completed = self.service.complete_multipart_upload(&upload, &parts).await?;
        Ok(UnitOutput::new(completed, 0))
    }
}

pub struct UploadAborter {
    service: StorageService,
}

#[async_trait]
impl UnitExecutor for UploadAborter {
    type Output = MultipartUpload;
    type Error = ClientError;

    async fn execute(&self, unit: &TransferUnit) -> ClientResult<UnitOutput<MultipartUpload>> {
        let upload = upload_of(unit)?;
        self.service.abort_multipart_upload(&upload).await?;
        Ok(UnitOutput::new(upload, 0))
    }
}

/// Keeps every completed unit's output while forwarding events
struct Collecting<'a, O, E> {
    inner: &'a mut dyn TransferObserver<O, E>,
    completed: Vec<CompletedUnit<O>>,
}

impl<'a, O, E> Collecting<'a, O, E> {
    fn new(inner: &'a mut dyn TransferObserver<O, E>) -> Self {
        Self {
            inner,
            completed: Vec::new(),
        }
    }
}

impl<O, E> TransferObserver<O, E> for Collecting<'_, O, E>
where
    O: Clone + Send,
    E: Send,
{
    fn on_event(&mut self, event: &TransferEvent<O, E>) {
        if let Some(units) = event.try_completed_units() {
            self.completed.extend(units.iter().cloned());
        }
        self.inner.on_event(event);
    }
}

fn abandoned_parts(units: &[TransferUnit]) -> Vec<u32> {
    units
        .iter()
        .filter_map(|u| match u.id() {
            UnitId::Part(n) => Some(*n),
            UnitId::Upload(_) => None,
        })
        .collect()
}

/// Object transfers split into parts and run concurrently
#[derive(Clone)]
pub struct ThreadedService {
    service: StorageService,
    settings: TransferSettings,
}

impl ThreadedService {
    pub fn new(service: StorageService, settings: TransferSettings) -> Self {
        Self { service, settings }
    }

    pub fn service(&self) -> &StorageService {
        &self.service
    }

    pub fn settings(&self) -> &TransferSettings {
        &self.settings
    }

    fn coordinator(&self) -> ClientResult<TransferCoordinator> {
        let config = TransferConfig::default()
            .with_concurrency(self.settings.concurrency)
            .with_max_attempts(self.settings.max_attempts)
            .with_progress_interval(self.settings.progress_interval())
            .with_retry_base_delay(self.settings.retry_base_delay());
        TransferCoordinator::new(config)
            .map_err(|e| snda_core::Error::Config(e.to_string()).into())
    }

    /// Upload `source` to `bucket/key`.
    ///
    /// Sources smaller than the multipart threshold go in one request and
    /// produce no events. Otherwise every part is a unit; on failure,
    /// cancellation or abandoned parts the multipart upload is aborted.
    pub async fn upload_object(
        &self,
        bucket: &str,
        key: &str,
        source: PartSource,
        cancel: &CancelHandle,
        observer: &mut dyn TransferObserver<PartETag, ClientError>,
    ) -> ClientResult<TransferOutcome<MultipartCompleted>> {
        let size = source.len().await?;
        let content_type = source.content_type();

        if size == 0 || size < self.settings.multipart_threshold {
            let body = if size == 0 {
                Bytes::new()
            } else {
                source.read_range(ByteRange::new(0, size)).await?
            };
            let etag = self
                .service
                .put_object(bucket, key, body, content_type.as_deref())
                .await?;
            debug!(bucket, key, size, "uploaded in a single request");
            return Ok(TransferOutcome::Completed(MultipartCompleted {
                location: None,
                bucket: bucket.to_string(),
                key: key.to_string(),
                etag,
            }));
        }

        let coordinator = self.coordinator()?;
        let parts = plan_parts(size, self.settings.part_size)?;
        let upload = self
            .service
            .initiate_multipart_upload(bucket, key, content_type.as_deref())
            .await?;
        info!(
            bucket,
            key,
            size,
            parts = parts.len(),
            upload_id = %upload.upload_id,
            "multipart upload started"
        );

        let units = parts
            .iter()
            .map(|p| TransferUnit::upload_part(p.part_number, p.range.start, p.range.end))
            .collect();
        let operation = Operation::new(units).with_cancel_handle(cancel.clone());
        let executor = Arc::new(PartUploader {
            service: self.service.clone(),
            upload: upload.clone(),
            source,
        });

        let mut collecting = Collecting::new(observer);
        let terminal = coordinator
            .execute(operation, executor, ClientError::is_transient, &mut collecting)
            .await;

        match terminal.into_kind() {
            EventKind::Completed { abandoned } if abandoned.is_empty() => {
                let etags: Vec<PartETag> =
                    collecting.completed.into_iter().map(|c| c.output).collect();
                match self.service.complete_multipart_upload(&upload, &etags).await {
                    Ok(completed) => Ok(TransferOutcome::Completed(completed)),
                    Err(e) => {
                        self.abort_quietly(&upload).await;
                        Err(e)
                    }
                }
            }
            EventKind::Completed { abandoned } => {
                self.abort_quietly(&upload).await;
                Err(ClientError::PartsAbandoned(abandoned_parts(&abandoned)))
            }
            EventKind::Cancelled(incomplete) => {
                self.abort_quietly(&upload).await;
                Ok(TransferOutcome::Cancelled(incomplete))
            }
            EventKind::Error(cause) => {
                self.abort_quietly(&upload).await;
                Err(cause)
            }
            kind => unreachable!("{} is not a terminal event", kind.code()),
        }
    }

    async fn abort_quietly(&self, upload: &MultipartUpload) {
        if let Err(e) = self.service.abort_multipart_upload(upload).await {
            warn!(
                upload_id = %upload.upload_id,
                error = %e,
                "failed to abort multipart upload"
            );
        }
    }

    /// Download `bucket/key` into `dest`, one ranged GET per part.
    ///
    /// `dest` is created at its final size up front and removed again
    /// unless the download completes.
    pub async fn download_object(
        &self,
        bucket: &str,
        key: &str,
        dest: &Path,
        cancel: &CancelHandle,
        observer: &mut dyn TransferObserver<ByteRange, ClientError>,
    ) -> ClientResult<TransferOutcome<ObjectMetadata>> {
        let coordinator = self.coordinator()?;
        let metadata = self.service.head_object(bucket, key).await?;
        let size = metadata.content_length;

        let file = File::create(dest).await?;
        file.set_len(size).await?;
        drop(file);

        if size == 0 {
            return Ok(TransferOutcome::Completed(metadata));
        }

        let units = plan_parts(size, self.settings.part_size)?
            .iter()
            .map(|p| TransferUnit::download_part(p.part_number, p.range.start, p.range.end))
            .collect();
        let operation = Operation::new(units).with_cancel_handle(cancel.clone());
        let executor = Arc::new(PartDownloader {
            service: self.service.clone(),
            bucket: bucket.to_string(),
            key: key.to_string(),
            dest: dest.to_path_buf(),
        });

        let terminal = coordinator
            .execute(operation, executor, ClientError::is_transient, observer)
            .await;

        let outcome = match terminal.into_kind() {
            EventKind::Completed { abandoned } if abandoned.is_empty() => {
                return Ok(TransferOutcome::Completed(metadata));
            }
            EventKind::Completed { abandoned } => {
                Err(ClientError::PartsAbandoned(abandoned_parts(&abandoned)))
            }
            EventKind::Cancelled(incomplete) => Ok(TransferOutcome::Cancelled(incomplete)),
            EventKind::Error(cause) => Err(cause),
            kind => unreachable!("{} is not a terminal event", kind.code()),
        };

        if let Err(e) = fs::remove_file(dest).await {
            warn!(path = %dest.display(), error = %e, "failed to remove partial download");
        }
        outcome
    }

    /// Complete each upload from its already uploaded parts. The returned
    /// event is the terminal one.
    pub async fn complete_uploads(
        &self,
        uploads: &[MultipartUpload],
        cancel: &CancelHandle,
        observer: &mut dyn TransferObserver<MultipartCompleted, ClientError>,
    ) -> ClientResult<TransferEvent<MultipartCompleted, ClientError>> {
        let coordinator = self.coordinator()?;
        let executor = Arc::new(UploadFinisher {
            service: self.service.clone(),
        });
        let units = uploads
            .iter()
            .map(|u| TransferUnit::complete(&u.bucket, &u.key, &u.upload_id))
            .collect();
        let operation = Operation::new(units).with_cancel_handle(cancel.clone());

        Ok(coordinator
            .execute(operation, executor, ClientError::is_transient, observer)
            .await)
    }

    pub async fn abort_uploads(
        &self,
        uploads: &[MultipartUpload],
        cancel: &CancelHandle,
        observer: &mut dyn TransferObserver<MultipartUpload, ClientError>,
    ) -> ClientResult<TransferEvent<MultipartUpload, ClientError>> {
        let coordinator = self.coordinator()?;
        let executor = Arc::new(UploadAborter {
            service: self.service.clone(),
        });
        let units = uploads
            .iter()
            .map(|u| TransferUnit::abort(&u.bucket, &u.key, &u.upload_id))
            .collect();
        let operation = Operation::new(units).with_cancel_handle(cancel.clone());

        Ok(coordinator
            .execute(operation, executor, ClientError::is_transient, observer)
            .await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTransport;
    use snda_core::{DEFAULT_REGION, MIN_PART_SIZE};
    use snda_transfer::{EventCode, EventCollector};

    const MIB: u64 = 1024 * 1024;

    fn settings() -> TransferSettings {
        TransferSettings {
            concurrency: 3,
            multipart_threshold: MIN_PART_SIZE,
            part_size: MIN_PART_SIZE,
            max_attempts: 3,
            progress_interval_ms: 0,
            retry_base_delay_ms: 1,
        }
    }

    async fn setup(settings: TransferSettings) -> (Arc<MockTransport>, ThreadedService) {
        let transport = Arc::new(MockTransport::new());
        let service = StorageService::with_transport(transport.clone(), DEFAULT_REGION);
        service.create_bucket("b").await.unwrap();
        (transport, ThreadedService::new(service, settings))
    }

    fn data(len: u64) -> Bytes {
        (0..len).map(|i| (i % 251) as u8).collect::<Vec<u8>>().into()
    }

    fn uploads() -> EventCollector<PartETag, ClientError> {
        EventCollector::new()
    }

    fn downloads() -> EventCollector<ByteRange, ClientError> {
        EventCollector::new()
    }

    fn codes<O, E>(events: &[TransferEvent<O, E>]) -> Vec<EventCode> {
        events.iter().map(|e| e.code()).collect()
    }

    #[tokio::test]
    async fn test_multipart_upload_from_memory() {
        let (transport, threaded) = setup(settings()).await;
        let body = data(12 * MIB);
        let mut events = uploads();

        let outcome = threaded
            .upload_object(
                "b",
                "big.bin",
                PartSource::Memory(body.clone()),
                &CancelHandle::new(),
                &mut events,
            )
            .await
            .unwrap();

        match outcome {
            TransferOutcome::Completed(done) => assert!(done.etag.ends_with("-3")),
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(transport.object("b", "big.bin").unwrap(), body);
        assert_eq!(transport.pending_uploads(), 0);

        let events = events.into_events();
        assert_eq!(events.first().unwrap().code(), EventCode::Started);
        assert_eq!(events.last().unwrap().code(), EventCode::Completed);
        let parts: usize = events
            .iter()
            .filter_map(|e| e.try_completed_units())
            .map(|u| u.len())
            .sum();
        assert_eq!(parts, 3);
        assert_eq!(events.last().unwrap().watcher().bytes_transferred, 12 * MIB);
    }

    #[tokio::test]
    async fn test_small_upload_is_a_single_put() {
        let (transport, threaded) = setup(settings()).await;
        let mut events = uploads();

        let outcome = threaded
            .upload_object(
                "b",
                "small.txt",
                PartSource::Memory(Bytes::from_static(b"tiny")),
                &CancelHandle::new(),
                &mut events,
            )
            .await
            .unwrap();

        assert!(outcome.is_completed());
        assert!(events.events().is_empty());
        assert_eq!(&transport.object("b", "small.txt").unwrap()[..], b"tiny");

        threaded
            .upload_object(
                "b",
                "empty",
                PartSource::Memory(Bytes::new()),
                &CancelHandle::new(),
                &mut events,
            )
            .await
            .unwrap();
        assert_eq!(transport.object("b", "empty").unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_transient_part_failure_is_retried() {
        let (transport, threaded) = setup(settings()).await;
        transport.fail_part(2, ClientError::Timeout("slow".into()), 1);
        let mut events = uploads();

        let outcome = threaded
            .upload_object(
                "b",
                "k",
                PartSource::Memory(data(11 * MIB)),
                &CancelHandle::new(),
                &mut events,
            )
            .await
            .unwrap();

        assert!(outcome.is_completed());
        assert!(codes(events.events()).contains(&EventCode::IgnoredErrors));
        assert_eq!(transport.object("b", "k").unwrap().len() as u64, 11 * MIB);
    }

    #[tokio::test]
    async fn test_fatal_part_failure_aborts_upload() {
        let (transport, threaded) = setup(settings()).await;
        let denied = ClientError::Service {
            status: 403,
            error: snda_core::Error::AccessDenied,
            request_id: None,
        };
        transport.fail_part(1, denied.clone(), 1);
        let mut events = uploads();

        let err = threaded
            .upload_object(
                "b",
                "k",
                PartSource::Memory(data(11 * MIB)),
                &CancelHandle::new(),
                &mut events,
            )
            .await
            .unwrap_err();

        assert_eq!(err, denied);
        assert_eq!(events.events().last().unwrap().code(), EventCode::Error);
        assert_eq!(transport.pending_uploads(), 0);
        assert!(transport.object("b", "k").is_none());
    }

    #[tokio::test]
    async fn test_abandoned_parts_fail_the_upload() {
        let (transport, threaded) = setup(TransferSettings {
            max_attempts: 2,
            ..settings()
        })
        .await;
        transport.fail_part(3, ClientError::Transport("reset".into()), 10);

        let err = threaded
            .upload_object(
                "b",
                "k",
                PartSource::Memory(data(11 * MIB)),
                &CancelHandle::new(),
                &mut uploads(),
            )
            .await
            .unwrap_err();

        assert_eq!(err, ClientError::PartsAbandoned(vec![3]));
        assert_eq!(transport.pending_uploads(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_upload_is_aborted() {
        let (transport, threaded) = setup(settings()).await;
        let cancel = CancelHandle::new();
        cancel.cancel();

        let outcome = threaded
            .upload_object(
                "b",
                "k",
                PartSource::Memory(data(11 * MIB)),
                &cancel,
                &mut uploads(),
            )
            .await
            .unwrap();

        match outcome {
            TransferOutcome::Cancelled(units) => assert_eq!(units.len(), 3),
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(transport.pending_uploads(), 0);
    }

    #[tokio::test]
    async fn test_upload_from_file() {
        let (transport, threaded) = setup(settings()).await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.jpg");
        let body = data(6 * MIB);
        std::fs::write(&path, &body).unwrap();

        let source = PartSource::File(path);
        assert_eq!(source.content_type().as_deref(), Some("image/jpeg"));
        threaded
            .upload_object("b", "photo.jpg", source, &CancelHandle::new(), &mut uploads())
            .await
            .unwrap();

        assert_eq!(transport.object("b", "photo.jpg").unwrap(), body);
    }

    #[tokio::test]
    async fn test_download_into_file() {
        let (_, threaded) = setup(settings()).await;
        let body = data(11 * MIB);
        threaded
            .service()
            .put_object("b", "obj", body.clone(), None)
            .await
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("obj");
        let mut events = downloads();
        let outcome = threaded
            .download_object("b", "obj", &dest, &CancelHandle::new(), &mut events)
            .await
            .unwrap();

        assert!(outcome.is_completed());
        assert_eq!(std::fs::read(&dest).unwrap(), body.to_vec());
        let ranges: usize = events
            .events()
            .iter()
            .filter_map(|e| e.try_completed_units())
            .map(|u| u.len())
            .sum();
        assert_eq!(ranges, 3);
    }

    #[tokio::test]
    async fn test_failed_download_leaves_no_file() {
        let (transport, threaded) = setup(settings()).await;
        threaded
            .service()
            .put_object("b", "obj", data(11 * MIB), None)
            .await
            .unwrap();
        transport.fail_when(
            |r| r.headers.get("range").is_some_and(|h| h.starts_with("bytes=0-")),
            ClientError::Service {
                status: 403,
                error: snda_core::Error::AccessDenied,
                request_id: None,
            },
            1,
        );

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("obj");
        let err = threaded
            .download_object("b", "obj", &dest, &CancelHandle::new(), &mut downloads())
            .await
            .unwrap_err();

        assert_eq!(err.service_code(), Some("AccessDenied"));
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_download_missing_object() {
        let (_, threaded) = setup(settings()).await;
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("nothing");

        let err = threaded
            .download_object("b", "nothing", &dest, &CancelHandle::new(), &mut downloads())
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(404));
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_complete_and_abort_uploads() {
        let (transport, threaded) = setup(settings()).await;
        let service = threaded.service().clone();

        let mut to_complete = Vec::new();
        for key in ["one", "two"] {
            let upload = service.initiate_multipart_upload("b", key, None).await.unwrap();
            service
                .upload_part(&upload, 1, Bytes::from(key.as_bytes().to_vec()))
                .await
                .unwrap();
            to_complete.push(upload);
        }
        let stale = service.initiate_multipart_upload("b", "stale", None).await.unwrap();

        let mut events: EventCollector<MultipartCompleted, ClientError> = EventCollector::new();
        let terminal = threaded
            .complete_uploads(&to_complete, &CancelHandle::new(), &mut events)
            .await
            .unwrap();
        assert_eq!(terminal.code(), EventCode::Completed);
        assert!(terminal.abandoned_units().is_empty());
        assert_eq!(&transport.object("b", "two").unwrap()[..], b"two");

        let completed: Vec<String> = events
            .events()
            .iter()
            .filter_map(|e| e.try_completed_units())
            .flatten()
            .map(|c| c.output.key.clone())
            .collect();
        assert_eq!(completed.len(), 2);

        let terminal = threaded
            .abort_uploads(&[stale], &CancelHandle::new(), &mut EventCollector::<MultipartUpload, ClientError>::new())
            .await
            .unwrap();
        assert_eq!(terminal.code(), EventCode::Completed);
        assert_eq!(transport.pending_uploads(), 0);
    }

    #[tokio::test]
    async fn test_completing_unknown_upload_is_fatal() {
        let (_, threaded) = setup(settings()).await;
        let bogus = MultipartUpload::new("b", "k", "missing");

        let terminal = threaded
            .complete_uploads(&[bogus], &CancelHandle::new(), &mut EventCollector::<MultipartCompleted, ClientError>::new())
            .await
            .unwrap();
        assert_eq!(terminal.code(), EventCode::Error);
        assert_eq!(terminal.error_cause().service_code(), Some("NoSuchUpload"));
    }

    #[tokio::test]
    async fn test_zero_concurrency_is_a_config_error() {
        let (_, threaded) = setup(TransferSettings {
            concurrency: 0,
            ..settings()
        })
        .await;
        let err = threaded
            .abort_uploads(&[], &CancelHandle::new(), &mut EventCollector::<MultipartUpload, ClientError>::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Invalid(snda_core::Error::Config(_))));
    }
}
