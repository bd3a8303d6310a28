use std::path::Path;

use log::info;
use tokio::fs::File;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::body::BodyReader;
use crate::config::Settings;
use crate::error::{Error, Result};
use crate::fetch::Fetched;
use crate::progress::{self, Progress};

/// Consume the response: print it, or save it when an output file is set.
/// Returns the number of body bytes delivered.
pub async fn materialize(fetched: Fetched, settings: &Settings) -> Result<u64> {
    let total = fetched.content_length();
    let mut body = fetched.into_body();

    match &settings.output {
        None => print_body(&mut body, &mut tokio::io::stdout()).await,
        Some(path) => {
            let progress = progress::reporter(settings.show_progress(), total);
            let size = save_to_file(&mut body, path, progress.as_ref()).await?;
            info!("File {} with {} bytes downloaded.", path.display(), size);
            Ok(size)
        }
    }
}

/// Buffer the whole body, then write it out unchanged.
pub async fn print_body<W>(body: &mut BodyReader, out: &mut W) -> Result<u64>
where
    W: AsyncWrite + Unpin,
{
    let bytes = body.read_to_end().await?;
    out.write_all(&bytes).await?;
    out.flush().await?;
    Ok(bytes.len() as u64)
}

/// Stream the body into `path`, creating or truncating it.
pub async fn save_to_file(
    body: &mut BodyReader,
    path: &Path,
    progress: &(dyn Progress + Send + Sync),
) -> Result<u64> {
    let file_err = |source: std::io::Error| Error::File {
        path: path.to_path_buf(),
        source,
    };
    let mut file = File::create(path).await.map_err(file_err)?;

    let mut written: u64 = 0;
    while let Some(chunk) = body.next_chunk().await? {
        file.write_all(&chunk).await.map_err(file_err)?;
        written += chunk.len() as u64;
        progress.advance(chunk.len() as u64);
    }

    file.flush().await.map_err(file_err)?;
    file.sync_all().await.map_err(file_err)?;
    progress.finish();

    Ok(written)
}
