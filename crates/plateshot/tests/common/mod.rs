//! A local stand-in for the recognition API.

#![allow(dead_code)]

use std::convert::Infallible;
use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use futures::TryStreamExt;
use serde_json::Value;
use warp::http::StatusCode;
use warp::hyper::body::Buf;
use warp::multipart::FormData;
use warp::path::FullPath;
use warp::reply::Response;
use warp::{Filter, Reply};

use plateshot::config::ApiVariant;
use plateshot::Config;

/// What the mock answers with, for every request.
#[derive(Debug, Clone)]
pub enum Canned {
    Json(Value),
    Status(u16),
    Text(&'static str),
}

impl Canned {
    fn respond(&self) -> Response {
        match self {
            Self::Json(body) => warp::reply::json(body).into_response(),
            Self::Status(code) => warp::reply::with_status(
                "upstream exploded",
                StatusCode::from_u16(*code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            )
            .into_response(),
            Self::Text(body) => warp::reply::with_status(*body, StatusCode::OK).into_response(),
        }
    }
}

/// One multipart post as the server saw it.
#[derive(Debug, Clone, Default)]
pub struct Upload {
    pub path: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub image: Option<Vec<u8>>,
}

#[derive(Debug)]
pub struct MockServer {
    pub addr: SocketAddr,
    pub uploads: Arc<Mutex<Vec<Upload>>>,
    pub synced: Arc<Mutex<Vec<Value>>>,
}

impl MockServer {
    /// Bind on an ephemeral port and serve `canned` to every request.
    pub fn start(canned: Canned) -> Self {
        let uploads = Arc::new(Mutex::new(Vec::new()));
        let synced = Arc::new(Mutex::new(Vec::new()));

        let recognize = {
            let uploads = uploads.clone();
            let canned = canned.clone();
            warp::post()
                .and(
                    warp::path!("api" / "process-plate")
                        .or(warp::path!("numberplates" / "analyze"))
                        .unify(),
                )
                .and(warp::path::full())
                .and(warp::multipart::form())
                .and_then(move |path: FullPath, form: FormData| {
                    let uploads = uploads.clone();
                    let canned = canned.clone();
                    async move {
                        let mut upload = read_image_part(form).await;
                        upload.path = path.as_str().to_string();
                        uploads.lock().unwrap().push(upload);
                        Ok::<_, Infallible>(canned.respond())
                    }
                })
        };

        let sync = {
            let synced = synced.clone();
            warp::post()
                .and(warp::path!("numberplates"))
                .and(warp::body::json())
                .map(move |body: Value| {
                    synced.lock().unwrap().push(body);
                    canned.respond()
                })
        };

        let (addr, server) =
            warp::serve(recognize.or(sync)).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);

        Self {
            addr,
            uploads,
            synced,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn uploads(&self) -> Vec<Upload> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn synced(&self) -> Vec<Value> {
        self.synced.lock().unwrap().clone()
    }
}

async fn read_image_part(mut form: FormData) -> Upload {
    let mut upload = Upload::default();
    while let Ok(Some(mut part)) = form.try_next().await {
        if part.name() != "image" {
            continue;
        }
        upload.file_name = part.filename().map(str::to_string);
        upload.content_type = part.content_type().map(str::to_string);
        let mut data = Vec::new();
        while let Some(Ok(buf)) = part.data().await {
            data.extend_from_slice(buf.chunk());
        }
        upload.image = Some(data);
    }
    upload
}

/// Config pointing at nothing, with the given API flavour.
pub fn config(variant: ApiVariant) -> Config {
    let mut config = Config::default();
    config.api.variant = variant;
    config
}

/// A small PNG with a bit of variation so the JPEG is not trivial.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let mut out = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut out, image::ImageFormat::Png)
        .unwrap();
    out.into_inner()
}
