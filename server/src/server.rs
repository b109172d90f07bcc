use serde::Serialize;
use std::convert::Infallible;
use std::sync::Arc;
use warp::http::header::{HeaderValue, CACHE_CONTROL};
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

use crate::app::App;

pub async fn run(address: std::net::SocketAddr, app: App) {
    log::info!("Listening on {}", address);
    warp::serve(routes(Arc::new(app))).run(address).await
}

pub fn routes(
    app: Arc<App>,
) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let health_route = warp::path!("health").map(|| StatusCode::OK);

    let latest_route = warp::path!("api" / "latest")
        .and(with_app(app.clone()))
        .and_then(latest);

    let tracks_route = warp::path!("api" / "tracks")
        .and(with_app(app.clone()))
        .and_then(tracks);

    let weather_route = warp::path!("api" / "with-weather")
        .and(with_app(app))
        .and_then(with_weather);

    warp::get()
        .and(
            health_route
                .or(latest_route)
                .or(tracks_route)
                .or(weather_route),
        )
        .recover(rejection)
        .with(warp::log("skytrack::http"))
}

fn with_app(app: Arc<App>) -> impl Filter<Extract = (Arc<App>,), Error = Infallible> + Clone {
    warp::any().map(move || app.clone())
}

pub async fn latest(app: Arc<App>) -> Result<impl Reply, Rejection> {
    Ok(warp::reply::json(&app.latest().await))
}

pub async fn tracks(app: Arc<App>) -> Result<impl Reply, Rejection> {
    let payload = app.tracks(app.config.bucket_count).await;
    Ok(warp::reply::with_header(
        warp::reply::json(&payload),
        CACHE_CONTROL,
        HeaderValue::from_static("no-store"),
    ))
}

pub async fn with_weather(app: Arc<App>) -> Result<impl Reply, Rejection> {
    Ok(warp::reply::json(&app.with_weather().await))
}

#[derive(Serialize)]
struct ErrorMessage {
    code: u16,
    message: String,
}

pub async fn rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (code, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not found.")
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed.")
    } else {
        log::error!("Error: {:?}", err);
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error.")
    };

    let json = warp::reply::json(&ErrorMessage {
        code: code.as_u16(),
        message: message.into(),
    });

    Ok(warp::reply::with_status(json, code))
}
