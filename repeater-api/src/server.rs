use std::{collections::HashMap, net::SocketAddr};

use axum::{
    body::Body,
    extract::{FromRequest, Multipart, Query, State},
    http::{header, HeaderValue, Method, Request},
    response::{IntoResponse, Response},
    routing::any,
    Form, Json,
};

use crate::{
    config_writer::{self, WriteError},
    database::Database,
    query,
};

pub async fn run_api(db: Database, listen: SocketAddr) -> anyhow::Result<()> {
    let app = router(db);

    log::info!("Listening on {}", listen);
    axum::Server::bind(&listen)
        .serve(app.into_make_service())
        .await?;

    Ok(())
}

pub fn router(db: Database) -> axum::Router {
    axum::Router::new()
        .route("/api", any(query_handler))
        .route("/api.php", any(query_handler))
        .route("/save_config", any(save_config_handler))
        .route("/save_config.php", any(save_config_handler))
        .layer(tower_http::cors::CorsLayer::permissive())
        .with_state(db)
}

async fn query_handler(
    State(db): State<Database>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<serde_json::Value>, query::QueryError> {
    let report = params.get("q").map(String::as_str).unwrap_or_default();
    Ok(Json(query::execute(&db, report, &params).await?))
}

/// Reads the submitted fields from a urlencoded or multipart body. Any
/// other body carries no fields. File parts are skipped.
async fn form_fields(request: Request<Body>) -> Result<HashMap<String, String>, WriteError> {
    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    if content_type.starts_with("multipart/form-data") {
        let mut multipart = Multipart::from_request(request, &())
            .await
            .map_err(|e| WriteError::Unreadable(e.to_string()))?;
        let mut fields = HashMap::new();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| WriteError::Unreadable(e.to_string()))?
        {
            let Some(name) = field.name().map(str::to_owned) else {
                continue;
            };
            if field.file_name().is_some() {
                continue;
            }
            let value = field
                .text()
                .await
                .map_err(|e| WriteError::Unreadable(e.to_string()))?;
            fields.insert(name, value);
        }
        Ok(fields)
    } else if content_type.starts_with("application/x-www-form-urlencoded") {
        let Form(fields) = Form::<HashMap<String, String>>::from_request(request, &())
            .await
            .map_err(|e| WriteError::Unreadable(e.to_string()))?;
        Ok(fields)
    } else {
        Ok(HashMap::new())
    }
}

async fn save_config_handler(State(db): State<Database>, request: Request<Body>) -> Response {
    let method = request.method().clone();
    let fields = if method == Method::POST {
        form_fields(request).await
    } else {
        Ok(HashMap::new())
    };

    let result = match fields {
        Ok(fields) => config_writer::submit(&db, &method, fields).await,
        Err(e) => Err(e),
    };
    let mut response = match result {
        Ok(receipt) => Json(receipt).into_response(),
        Err(e) => e.into_response(),
    };
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-store, must-revalidate"),
    );
    response
}
