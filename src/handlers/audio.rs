use actix_web::{http::header, web, HttpResponse};
use futures_util::stream::{self, Stream};
use std::io;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::debug;

use crate::{error::AppError, state::AppState};

const NO_CACHE: &str = "no-store, no-cache, must-revalidate, proxy-revalidate";

/// Read size for each body chunk.
const CHUNK_SIZE: usize = 64 * 1024;

/// Serve a generated artifact by name from the audio directory.
///
/// Clients poll for freshly written files under stable names (outside
/// production the name is reused per host), so caching is disabled.
pub async fn serve_audio(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let filename = path.into_inner();
    if !is_plain_file_name(&filename) {
        return Err(AppError::ValidationError(format!(
            "Invalid file name: {}",
            filename
        )));
    }

    let file_path = state.config.sonification.audio_dir.join(&filename);
    let not_found = || AppError::NotFound(format!("Audio file not found: {}", filename));
    let read_failed = |err: io::Error| {
        AppError::Internal(format!("failed to read {}: {}", file_path.display(), err))
    };

    let file = match File::open(&file_path).await {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Err(not_found()),
        Err(err) => return Err(read_failed(err)),
    };
    let metadata = file.metadata().await.map_err(read_failed)?;
    if !metadata.is_file() {
        return Err(not_found());
    }

    debug!(file = %file_path.display(), bytes = metadata.len(), "Serving audio file");

    let content_type = mime_guess::from_path(&file_path).first_or_octet_stream();
    Ok(HttpResponse::Ok()
        .content_type(content_type.as_ref())
        .insert_header((header::CACHE_CONTROL, NO_CACHE))
        .insert_header((header::PRAGMA, "no-cache"))
        .insert_header((header::EXPIRES, "0"))
        .no_chunking(metadata.len())
        .streaming(file_chunks(file)))
}

/// Yields the file's contents in `CHUNK_SIZE` pieces until EOF.
fn file_chunks(file: File) -> impl Stream<Item = Result<web::Bytes, io::Error>> {
    stream::try_unfold(file, |mut file| async move {
        let mut buf = vec![0u8; CHUNK_SIZE];
        let read = file.read(&mut buf).await?;
        if read == 0 {
            return Ok(None);
        }
        buf.truncate(read);
        Ok(Some((web::Bytes::from(buf), file)))
    })
}

fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && !name.contains("..")
        && !name.contains(['/', '\\', '\0'])
}
