use tokio::io::{AsyncWrite, AsyncWriteExt};
use url::Url;

use crate::client::ClientError;

/// GET `url`, following redirects, and stream the body into `out`.
///
/// A final status outside `200..=399` is an error.
pub async fn fetch<W>(url: &Url, out: &mut W) -> Result<u64, ClientError>
where
    W: AsyncWrite + Unpin,
{
    let client = reqwest::Client::builder().build()?;
    let mut response = client.get(url.clone()).send().await?;

    let status = response.status();
    if !(200..=399).contains(&status.as_u16()) {
        return Err(ClientError::Status {
            code: status.as_u16(),
            reason: status.canonical_reason().unwrap_or_default().to_string(),
        });
    }

    tracing::debug!(
        status = status.as_u16(),
        content_type = ?response.headers().get(reqwest::header::CONTENT_TYPE),
        "Response received"
    );

    let mut written = 0u64;
    while let Some(chunk) = response.chunk().await? {
        out.write_all(&chunk).await.map_err(ClientError::Output)?;
        written += chunk.len() as u64;
    }
    out.flush().await.map_err(ClientError::Output)?;
    Ok(written)
}
