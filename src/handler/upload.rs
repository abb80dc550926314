//! Photo upload endpoint
//!
//! One request, three outcomes: the form (hidden marker missing), a retry
//! link (wrong password), or the file written into the image pool.

use std::error::Error as StdError;
use std::io;
use std::path::{Path, PathBuf};

use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Body, Bytes};
use hyper::header::CONTENT_TYPE;
use hyper::{Method, Request, Response, StatusCode};
use thiserror::Error;
use tokio::fs::OpenOptions;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::config::AppState;
use crate::http::{self, mime};
use crate::logger;

pub const UPLOAD_FORM: &str = "<html>
<head><title>Picture Upload</title></head>
<body>
<form method=\"POST\" enctype=\"multipart/form-data\" action='/upload' >
<label for=\"password\">Password:</label><input type=\"text\" id=\"password\" name=\"password\" /><br />
<input type='file' id='myFile' name='myFile'><br />
<input type='hidden' id='hidden' name='hidden' value='set'>
<input type='submit'>
</form>
</body>
</html>";

pub const RETRY_PAGE: &str = "<a href='/upload'>Please try again with a valid password</a>";

pub const SUCCESS_PAGE: &str =
    "<html>File uploaded successfully. <a href='/upload'>Upload another</a></html>";

const HIDDEN_FIELD: &str = "hidden";
const HIDDEN_VALUE: &str = "set";
const PASSWORD_FIELD: &str = "password";
const FILE_FIELD: &str = "myFile";

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("request body exceeds {limit} bytes")]
    TooLarge { limit: u64 },

    #[error("failed to read request body: {0}")]
    Body(String),

    #[error("malformed multipart body: {0}")]
    Multipart(#[from] multer::Error),

    #[error("malformed form body: {0}")]
    Form(#[from] serde_urlencoded::de::Error),

    #[error("no file was sent in the myFile field")]
    MissingFile,

    #[error("file name {0:?} cannot be stored")]
    InvalidFileName(String),

    #[error("a photo named {0} already exists")]
    AlreadyExists(String),

    #[error("cannot write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: io::Error,
    },
}

impl UploadError {
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Body(_)
            | Self::Multipart(_)
            | Self::Form(_)
            | Self::MissingFile
            | Self::InvalidFileName(_) => StatusCode::BAD_REQUEST,
            Self::AlreadyExists(_) => StatusCode::CONFLICT,
            Self::Write { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// A file part of the form
#[derive(Debug)]
pub struct UploadedFile {
    pub file_name: String,
    pub data: Bytes,
}

/// Fields the handler cares about; everything else is ignored
#[derive(Debug, Default)]
pub struct UploadForm {
    pub hidden: Option<String>,
    pub password: Option<String>,
    pub file: Option<UploadedFile>,
}

pub async fn handle_upload<B>(req: Request<B>, state: &AppState) -> Response<Full<Bytes>>
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    if req.method() != Method::POST {
        return http::build_html_response(UPLOAD_FORM, req.method() == Method::HEAD);
    }

    match process_upload(req, state).await {
        Ok(page) => http::build_html_response(page, false),
        Err(e) => {
            let status = e.status();
            if status.is_server_error() {
                logger::log_error(&format!("Upload failed: {e}"));
            } else {
                logger::log_warning(&format!("Upload rejected: {e}"));
            }
            http::build_error_page(status, &e.to_string())
        }
    }
}

async fn process_upload<B>(req: Request<B>, state: &AppState) -> Result<&'static str, UploadError>
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    let content_type = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let limit = state.config.upload.max_body_size;
    let form = if mime::is_multipart(&content_type) {
        parse_form(&content_type, read_body(req.into_body(), limit).await?).await?
    } else if mime::is_urlencoded(&content_type) {
        parse_urlencoded(&read_body(req.into_body(), limit).await?)?
    } else {
        // No form fields can be read from any other body
        return Ok(UPLOAD_FORM);
    };

    if form.hidden.as_deref() != Some(HIDDEN_VALUE) {
        return Ok(UPLOAD_FORM);
    }
    if !state.password_matches(form.password.as_deref().unwrap_or_default()) {
        logger::log_warning("Upload attempted with an invalid password");
        return Ok(RETRY_PAGE);
    }

    let file = form.file.ok_or(UploadError::MissingFile)?;
    let path = save_upload(Path::new(&state.config.flyer.image_dir), &file).await?;
    logger::log_info(&format!(
        "Stored upload {} ({} bytes)",
        path.display(),
        file.data.len()
    ));
    Ok(SUCCESS_PAGE)
}

async fn read_body<B>(body: B, limit: u64) -> Result<Bytes, UploadError>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    let max = usize::try_from(limit).unwrap_or(usize::MAX);
    match Limited::new(body, max).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            Err(UploadError::TooLarge { limit })
        }
        Err(e) => Err(UploadError::Body(e.to_string())),
    }
}

/// Parse a buffered `multipart/form-data` body
pub async fn parse_form(content_type: &str, body: Bytes) -> Result<UploadForm, UploadError> {
    let boundary = multer::parse_boundary(content_type)?;
    let stream = futures_util::stream::once(async move { Ok::<_, io::Error>(body) });
    let mut multipart = multer::Multipart::new(stream, boundary);

    let mut form = UploadForm::default();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(ToString::to_string);
        match name.as_deref() {
            Some(HIDDEN_FIELD) if form.hidden.is_none() => form.hidden = Some(field.text().await?),
            Some(PASSWORD_FIELD) if form.password.is_none() => {
                form.password = Some(field.text().await?);
            }
            Some(FILE_FIELD) if form.file.is_none() => {
                // Browsers send an empty file name when nothing was picked
                let file_name = field.file_name().unwrap_or_default().to_string();
                if !file_name.is_empty() {
                    let data = field.bytes().await?;
                    form.file = Some(UploadedFile { file_name, data });
                }
            }
            _ => {}
        }
    }
    Ok(form)
}

/// Parse an `application/x-www-form-urlencoded` body.
///
/// Such a body never carries a file. The first value of a repeated field wins.
pub fn parse_urlencoded(body: &[u8]) -> Result<UploadForm, UploadError> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(body)?;

    let mut form = UploadForm::default();
    for (name, value) in pairs {
        match name.as_str() {
            HIDDEN_FIELD if form.hidden.is_none() => form.hidden = Some(value),
            PASSWORD_FIELD if form.password.is_none() => form.password = Some(value),
            _ => {}
        }
    }
    Ok(form)
}

/// Final path component of a client file name
fn pool_file_name(client_name: &str) -> Result<&str, UploadError> {
    let name = client_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();
    if name.is_empty() || name == "." || name == ".." {
        return Err(UploadError::InvalidFileName(client_name.to_string()));
    }
    Ok(name)
}

/// Write the upload into the pool, refusing to replace an existing photo
pub async fn save_upload(pool_dir: &Path, file: &UploadedFile) -> Result<PathBuf, UploadError> {
    let name = pool_file_name(&file.file_name)?;
    let path = pool_dir.join(name);

    let out = match OpenOptions::new().write(true).create_new(true).open(&path).await {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            return Err(UploadError::AlreadyExists(name.to_string()));
        }
        Err(source) => {
            return Err(UploadError::Write {
                path: path.display().to_string(),
                source,
            })
        }
    };
    fill_new_file(path, out, &file.data).await
}

/// Write `data` into the file just created at `path`.
///
/// On failure the partial file is removed, so the name stays free for a
/// retry and no truncated photo is left in the pool.
async fn fill_new_file<W>(
    path: PathBuf,
    mut out: W,
    data: &[u8],
) -> Result<PathBuf, UploadError>
where
    W: AsyncWrite + Unpin,
{
    let written = match out.write_all(data).await {
        Ok(()) => out.flush().await,
        Err(e) => Err(e),
    };
    drop(out);

    match written {
        Ok(()) => Ok(path),
        Err(source) => {
            if let Err(e) = tokio::fs::remove_file(&path).await {
                logger::log_error(&format!(
                    "Cannot remove partial upload {}: {e}",
                    path.display()
                ));
            }
            Err(UploadError::Write {
                path: path.display().to_string(),
                source,
            })
        }
    }
}
