use super::ImagingError;
use crate::config::WorkerConfig;
use async_trait::async_trait;
use futures::StreamExt;
use std::time::Duration;
use tracing::debug;

/// Source of raw image bytes for a reference
#[async_trait]
pub trait ImageFetcher: Send + Sync + 'static {
    async fn fetch(&self, reference: &str) -> Result<Vec<u8>, ImagingError>;
}

/// HTTP(S) fetcher with a per-request deadline and a size cap
#[derive(Debug, Clone)]
pub struct HttpImageFetcher {
    client: reqwest::Client,
    timeout: Duration,
    max_bytes: usize,
}

impl HttpImageFetcher {
    pub fn new(config: &WorkerConfig) -> Result<Self, ImagingError> {
        let timeout = config.fetch_timeout();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("catalog-core/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ImagingError::fetch("-", format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            timeout,
            max_bytes: config.max_image_bytes,
        })
    }

    fn too_large(&self, reference: &str, size: usize) -> ImagingError {
        ImagingError::TooLarge {
            reference: reference.to_string(),
            size,
            limit: self.max_bytes,
        }
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, reference: &str) -> Result<Vec<u8>, ImagingError> {
        if !(reference.starts_with("http://") || reference.starts_with("https://")) {
            return Err(ImagingError::UnsupportedReference(reference.to_string()));
        }

        let map_err = |e: reqwest::Error| {
            if e.is_timeout() {
                ImagingError::Timeout {
                    reference: reference.to_string(),
                    timeout_ms: self.timeout.as_millis() as u64,
                }
            } else {
                ImagingError::fetch(reference, e.to_string())
            }
        };

        let response = self.client.get(reference).send().await.map_err(map_err)?;

        if !response.status().is_success() {
            return Err(ImagingError::fetch(
                reference,
                format!("HTTP {}", response.status()),
            ));
        }

        if let Some(length) = response.content_length() {
            if length as usize > self.max_bytes {
                return Err(self.too_large(reference, length as usize));
            }
        }

        // Content-Length may be absent (chunked) or wrong; enforce the cap per chunk
        let mut bytes = Vec::with_capacity(
            response
                .content_length()
                .map_or(0, |length| length as usize)
                .min(self.max_bytes),
        );
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_err)?;
            let received = bytes.len() + chunk.len();
            if received > self.max_bytes {
                return Err(self.too_large(reference, received));
            }
            bytes.extend_from_slice(&chunk);
        }

        debug!(reference = reference, bytes = bytes.len(), "Fetched source image");
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    const CHUNK: usize = 16 * 1024;

    /// Serve one chunked response without Content-Length, up to `total`
    /// bytes; returns how many body bytes were written before the client
    /// went away
    async fn chunked_origin(total: usize) -> (String, JoinHandle<usize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/big.png", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 4096];
            let _ = socket.read(&mut request).await;

            let head = b"HTTP/1.1 200 OK\r\nContent-Type: image/png\r\nTransfer-Encoding: chunked\r\n\r\n";
            if socket.write_all(head).await.is_err() {
                return 0;
            }

            let chunk = vec![0u8; CHUNK];
            let mut sent = 0;
            while sent < total {
                let frame = format!("{:x}\r\n", CHUNK);
                let written = async {
                    socket.write_all(frame.as_bytes()).await?;
                    socket.write_all(&chunk).await?;
                    socket.write_all(b"\r\n").await
                };
                if written.await.is_err() {
                    return sent;
                }
                sent += CHUNK;
            }
            let _ = socket.write_all(b"0\r\n\r\n").await;
            sent
        });

        (url, handle)
    }

    fn capped(max_image_bytes: usize) -> HttpImageFetcher {
        HttpImageFetcher::new(&WorkerConfig {
            max_image_bytes,
            fetch_timeout_ms: 10_000,
            ..WorkerConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_chunked_body_over_cap_is_rejected_early() {
        let total = 64 * 1024 * 1024;
        let (url, origin) = chunked_origin(total).await;

        let err = capped(1024).fetch(&url).await.unwrap_err();
        assert!(matches!(err, ImagingError::TooLarge { limit: 1024, .. }));

        let sent = tokio::time::timeout(Duration::from_secs(10), origin)
            .await
            .unwrap()
            .unwrap();
        assert!(sent < total, "origin delivered the whole body: {sent} bytes");
    }

    #[tokio::test]
    async fn test_chunked_body_within_cap_is_returned() {
        let (url, origin) = chunked_origin(2 * CHUNK).await;

        let bytes = capped(4 * CHUNK).fetch(&url).await.unwrap();
        assert_eq!(bytes.len(), 2 * CHUNK);
        assert_eq!(origin.await.unwrap(), 2 * CHUNK);
    }

    #[tokio::test]
    async fn test_non_http_reference_is_rejected() {
        let fetcher = HttpImageFetcher::new(&WorkerConfig::default()).unwrap();
        let err = fetcher.fetch("ftp://a/1.png").await.unwrap_err();
        assert_eq!(
            err,
            ImagingError::UnsupportedReference("ftp://a/1.png".to_string())
        );
    }

    #[tokio::test]
    async fn test_unreachable_origin_is_fetch_error() {
        let fetcher = HttpImageFetcher::new(&WorkerConfig {
            fetch_timeout_ms: 500,
            ..WorkerConfig::default()
        })
        .unwrap();
        let err = fetcher.fetch("http://127.0.0.1:1/a.png").await.unwrap_err();
        assert_eq!(err.stage(), crate::worker::CompressionStage::Downloading);
    }
}
