//! Object handles
//!
//! A handle wraps one object for the duration of one logical operation. The
//! backend streams it opens along the way (a download stream, a pending
//! upload) are tracked in acquisition order and released together when the
//! handle is closed.

use std::collections::VecDeque;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};

use crate::error::Result;
use crate::locator::Locator;
use crate::storage::gcs::GcsClient;
use crate::storage::{ObjectLister, ObjectMeta, StorageHandle};

/// Handle on one Cloud Storage object.
pub struct ObjectHandle {
    client: GcsClient,
    locator: Locator,
    bucket: String,
    key: String,
    reader: Option<ObjectReader>,
    writer: Option<ObjectWriter>,
    /// Sub-resource acquisition order, drained on close.
    acquired: Vec<Acquired>,
}

enum Acquired {
    Reader,
    Writer,
}

impl ObjectHandle {
    pub(crate) fn new(client: GcsClient, locator: Locator, key: String) -> Self {
        let bucket = locator.bucket().to_string();
        Self {
            client,
            locator,
            bucket,
            key,
            reader: None,
            writer: None,
            acquired: Vec::new(),
        }
    }
}

#[async_trait]
impl StorageHandle for ObjectHandle {
    fn locator(&self) -> &Locator {
        &self.locator
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.reader.is_none() {
            let reader = ObjectReader::open(&self.client, &self.bucket, &self.key).await?;
            self.reader = Some(reader);
            self.acquired.push(Acquired::Reader);
        }
        let Some(reader) = self.reader.as_mut() else {
            return Ok(0);
        };
        reader.read(buf).await
    }

    async fn write(&mut self, buf: &[u8]) -> Result<usize> {
        if self.writer.is_none() {
            self.writer = Some(ObjectWriter::new());
            self.acquired.push(Acquired::Writer);
        }
        let Some(writer) = self.writer.as_mut() else {
            return Ok(0);
        };
        Ok(writer.write(buf))
    }

    async fn metadata(&self) -> Result<ObjectMeta> {
        let attrs = self.client.object_attrs(&self.bucket, &self.key).await?;
        Ok(attrs.to_meta())
    }

    async fn list(&self) -> Result<Box<dyn ObjectLister>> {
        Ok(Box::new(GcsLister::new(
            self.client.clone(),
            self.bucket.clone(),
            self.key.clone(),
        )))
    }

    async fn set_property(&self, name: &str, value: &str) -> Result<()> {
        let attrs = self.client.object_attrs(&self.bucket, &self.key).await?;
        let mut metadata = attrs.metadata;
        metadata.insert(name.to_string(), value.to_string());
        self.client
            .patch_metadata(&self.bucket, &self.key, &metadata)
            .await?;
        tracing::debug!(key = %self.key, name, "updated object metadata");
        Ok(())
    }

    async fn property(&self, name: &str) -> Result<Option<String>> {
        let attrs = self.client.object_attrs(&self.bucket, &self.key).await?;
        Ok(attrs.metadata.get(name).cloned())
    }

    async fn delete(&self) -> Result<()> {
        self.client.delete_object(&self.bucket, &self.key).await
    }

    async fn close(&mut self) -> Result<()> {
        let mut last_err = None;
        for tag in std::mem::take(&mut self.acquired) {
            let released = match tag {
                // Dropping the download stream closes the connection.
                Acquired::Reader => {
                    self.reader.take();
                    Ok(())
                }
                Acquired::Writer => match self.writer.take() {
                    Some(writer) => writer.commit(&self.client, &self.bucket, &self.key).await,
                    None => Ok(()),
                },
            };
            if let Err(e) = released {
                tracing::error!(key = %self.key, "release failed during close: {e}");
                last_err = Some(e);
            }
        }
        match last_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Incremental reader over a media download stream.
struct ObjectReader {
    stream: Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>,
    pending: Bytes,
}

impl ObjectReader {
    async fn open(client: &GcsClient, bucket: &str, key: &str) -> Result<Self> {
        let response = client.download(bucket, key).await?;
        Ok(Self {
            stream: Box::pin(response.bytes_stream()),
            pending: Bytes::new(),
        })
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        while self.pending.is_empty() {
            match self.stream.next().await {
                Some(Ok(chunk)) => self.pending = chunk,
                Some(Err(e)) => return Err(e.into()),
                None => return Ok(0),
            }
        }
        let n = buf.len().min(self.pending.len());
        let chunk = self.pending.split_to(n);
        buf[..n].copy_from_slice(&chunk);
        Ok(n)
    }
}

/// Buffered writer; the object content is uploaded in one request at commit.
struct ObjectWriter {
    buffer: Vec<u8>,
}

impl ObjectWriter {
    fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    fn write(&mut self, buf: &[u8]) -> usize {
        self.buffer.extend_from_slice(buf);
        buf.len()
    }

    async fn commit(self, client: &GcsClient, bucket: &str, key: &str) -> Result<()> {
        let len = self.buffer.len();
        client.upload(bucket, key, self.buffer).await?;
        tracing::debug!(key, len, "committed object content");
        Ok(())
    }
}

/// Paged listing over `objects.list`, yielding entries lazily.
pub(crate) struct GcsLister {
    client: GcsClient,
    bucket: String,
    prefix: String,
    entries: VecDeque<ObjectMeta>,
    next_page_token: Option<String>,
    exhausted: bool,
}

impl GcsLister {
    pub(crate) fn new(client: GcsClient, bucket: String, prefix: String) -> Self {
        Self {
            client,
            bucket,
            prefix,
            entries: VecDeque::new(),
            next_page_token: None,
            exhausted: false,
        }
    }

    /// The marker object of the queried prefix lists itself; skip it so a
    /// folder listing never contains the folder.
    fn is_self_marker(&self, name: &str) -> bool {
        !self.prefix.is_empty() && (name == self.prefix || *name == format!("{}/", self.prefix))
    }
}

#[async_trait]
impl ObjectLister for GcsLister {
    async fn next(&mut self) -> Result<Option<ObjectMeta>> {
        loop {
            while let Some(entry) = self.entries.pop_front() {
                if self.is_self_marker(&entry.name) {
                    continue;
                }
                return Ok(Some(entry));
            }
            if self.exhausted {
                return Ok(None);
            }

            let page = self
                .client
                .list_page(&self.bucket, &self.prefix, self.next_page_token.as_deref())
                .await?;
            self.next_page_token = page.next_page_token;
            self.exhausted = self.next_page_token.is_none();

            for attrs in &page.items {
                self.entries.push_back(attrs.to_meta());
            }
            for prefix in &page.prefixes {
                self.entries.push_back(ObjectMeta {
                    name: prefix.clone(),
                    size: 0,
                    updated: None,
                    is_dir: true,
                });
            }
        }
    }
}
