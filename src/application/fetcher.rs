use std::path::Path;

use futures::StreamExt;
use tokio::io::{AsyncWriteExt, BufWriter};
use url::Url;

use crate::{
    api::{ApiError, Session},
    domain::AppError,
};

/// Write buffer size; the body is never held in memory as a whole.
pub const CHUNK_SIZE: usize = 8 * 1024;

fn fs_error(action: &str, path: &Path, err: std::io::Error) -> AppError {
    AppError::Filesystem(format!("{action} {}: {err}", path.display()))
}

/// Stream `url` into `destination`, creating parent directories first.
///
/// Returns the number of bytes written. On error a partial file may remain
/// on disk.
pub async fn fetch_to_file(session: &Session, url: &Url, destination: &Path) -> Result<u64, AppError> {
    if let Some(parent) = destination.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| fs_error("create directory", parent, e))?;
    }

    let (total, stream) = session
        .download_file_stream(url)
        .await
        .map_err(ApiError::into_transfer)?;
    futures::pin_mut!(stream);

    let file = tokio::fs::File::create(destination)
        .await
        .map_err(|e| fs_error("create file", destination, e))?;
    let mut writer = BufWriter::with_capacity(CHUNK_SIZE, file);

    let idle = session.config().download_timeout;
    let mut written: u64 = 0;
    loop {
        let next = tokio::time::timeout(idle, stream.next())
            .await
            .map_err(|_| AppError::Transfer(format!("no data received for {idle:?}")))?;

        match next {
            Some(Ok(chunk)) => {
                writer
                    .write_all(&chunk)
                    .await
                    .map_err(|e| fs_error("write", destination, e))?;
                written += chunk.len() as u64;
            }
            Some(Err(e)) => return Err(e.into_transfer()),
            None => break,
        }
    }

    writer
        .flush()
        .await
        .map_err(|e| fs_error("flush", destination, e))?;
    writer
        .get_mut()
        .sync_all()
        .await
        .map_err(|e| fs_error("sync", destination, e))?;

    tracing::debug!(
        path = %destination.display(),
        bytes = written,
        expected = ?total,
        "download finished"
    );

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiClient, ApiConfig};

    fn session_for(server: &mockito::ServerGuard) -> Session {
        ApiClient::new(ApiConfig {
            endpoint: server.url(),
            ..ApiConfig::default()
        })
        .unwrap()
        .session()
        .unwrap()
    }

    fn file_url(server: &mockito::ServerGuard, path: &str) -> Url {
        Url::parse(&format!("{}{}", server.url(), path)).unwrap()
    }

    #[tokio::test]
    async fn test_streams_body_into_nested_path() {
        let body: Vec<u8> = (0..100_000u32).map(|i| (i % 251) as u8).collect();
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/files/big.bin")
            .with_status(200)
            .with_body(body.clone())
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("Reports").join("Q1").join("big.bin");
        let session = session_for(&server);

        let written = fetch_to_file(&session, &file_url(&server, "/files/big.bin"), &dest)
            .await
            .unwrap();

        assert_eq!(written, body.len() as u64);
        assert_eq!(tokio::fs::read(&dest).await.unwrap(), body);
    }

    #[tokio::test]
    async fn test_overwrites_existing_file() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/files/a")
            .with_status(200)
            .with_body("new")
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("a");
        tokio::fs::write(&dest, "old contents that are longer").await.unwrap();

        fetch_to_file(&session_for(&server), &file_url(&server, "/files/a"), &dest)
            .await
            .unwrap();

        assert_eq!(tokio::fs::read_to_string(&dest).await.unwrap(), "new");
    }

    #[tokio::test]
    async fn test_error_status_is_transfer_failure() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/files/missing")
            .with_status(404)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("sub").join("missing");

        let err = fetch_to_file(
            &session_for(&server),
            &file_url(&server, "/files/missing"),
            &dest,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::Transfer(_)));
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_parent_is_a_file() {
        let server = mockito::Server::new_async().await;
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        tokio::fs::write(&blocker, "x").await.unwrap();

        let err = fetch_to_file(
            &session_for(&server),
            &file_url(&server, "/never"),
            &blocker.join("child"),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::Filesystem(_)));
    }
}
