use std::net::SocketAddr;

use axum::{
  Json,
  body::Body,
  extract::{ConnectInfo, Path, Query, State},
  http::{HeaderMap, StatusCode, header},
  response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;

use crate::{
  entity::{LicenseStatus, LicenseType, PassType, license},
  prelude::*,
  state::AppState,
  sv::{
    self,
    access::{AccessCheck, AccessMethod, RecordDownload},
    order::NewOrderItem,
  },
  utils,
};

#[derive(Serialize)]
pub struct Status {
  success: bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  msg: Option<String>,
}

fn fail(status: StatusCode, msg: impl Into<String>) -> Response {
  (status, Json(Status { success: false, msg: Some(msg.into()) }))
    .into_response()
}

/// Domain errors keep their status mapping in one place; anything
/// unexpected is logged and hidden behind a 500.
fn service_error(err: Error) -> Response {
  match err {
    Error::UserNotFound
    | Error::ProductNotFound
    | Error::OrderNotFound
    | Error::LicenseNotFound
    | Error::PassNotFound => fail(StatusCode::NOT_FOUND, err.to_string()),
    Error::InvalidArgs(_) => fail(StatusCode::BAD_REQUEST, err.to_string()),
    Error::DownloadLimitExceeded => {
      fail(StatusCode::FORBIDDEN, err.to_string())
    }
    Error::Payment(_) => fail(StatusCode::PAYMENT_REQUIRED, err.to_string()),
    err => {
      error!("Unhandled service error: {err}");
      fail(StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
    }
  }
}

pub async fn health() -> Json<json::Value> {
  Json(json::json!({ "status": "ok" }))
}

#[derive(Deserialize)]
pub struct AccessQuery {
  user_id: String,
  product_id: Option<String>,
}

pub async fn check_access(
  State(app): State<Arc<AppState>>,
  Query(query): Query<AccessQuery>,
) -> Response {
  let check = sv::Access::new(&app.db)
    .check_access(&query.user_id, query.product_id.as_deref())
    .await;

  match check {
    Ok(check) => (StatusCode::OK, Json(check)).into_response(),
    Err(err) => {
      // Store failure denies access rather than granting it
      error!("Access check failed: {err}");
      let denied =
        AccessCheck { has_access: false, method: AccessMethod::None };
      (StatusCode::OK, Json(denied)).into_response()
    }
  }
}

#[derive(Serialize)]
struct LicenseSummary {
  key: String,
  product_id: String,
  license_type: LicenseType,
  status: LicenseStatus,
  download_count: i64,
  download_limit: Option<i64>,
  issued_at: String,
  expires_at: Option<String>,
}

impl From<license::Model> for LicenseSummary {
  fn from(license: license::Model) -> Self {
    Self {
      key: license.key,
      product_id: license.product_id,
      license_type: license.license_type,
      status: license.status,
      download_count: license.download_count,
      download_limit: license.download_limit,
      issued_at: utils::format_date(license.issued_at),
      expires_at: license.expires_at.map(utils::format_date),
    }
  }
}

#[derive(Deserialize)]
pub struct LicensesQuery {
  user_id: String,
}

pub async fn user_licenses(
  State(app): State<Arc<AppState>>,
  Query(query): Query<LicensesQuery>,
) -> Response {
  match sv::License::new(&app.db).by_user(&query.user_id).await {
    Ok(licenses) => {
      let summaries: Vec<LicenseSummary> =
        licenses.into_iter().map(Into::into).collect();
      (StatusCode::OK, Json(summaries)).into_response()
    }
    Err(err) => service_error(err),
  }
}

#[derive(Deserialize)]
pub struct DownloadQuery {
  user_id: String,
  product_id: Option<String>,
  license_key: Option<String>,
}

pub async fn download(
  State(app): State<Arc<AppState>>,
  ConnectInfo(addr): ConnectInfo<SocketAddr>,
  headers: HeaderMap,
  Query(query): Query<DownloadQuery>,
) -> Response {
  let decision = match sv::Access::new(&app.db)
    .validate_download_access(
      &query.user_id,
      query.product_id.as_deref(),
      query.license_key.as_deref(),
    )
    .await
  {
    Ok(decision) => decision,
    Err(err) => {
      error!("Entitlement lookup failed: {err}");
      return fail(StatusCode::FORBIDDEN, "Access denied");
    }
  };

  if !decision.can_download {
    return (StatusCode::FORBIDDEN, Json(decision)).into_response();
  }

  deliver(
    &app,
    &query.user_id,
    query.product_id.as_deref(),
    decision.license.as_ref(),
    decision.method,
    addr,
    &headers,
  )
  .await
}

#[derive(Deserialize)]
pub struct CreateLinkReq {
  user_id: String,
  product_id: Option<String>,
  license_key: Option<String>,
}

#[derive(Serialize)]
struct DownloadLink {
  token: String,
  expires_in: u64,
}

/// Issues a signed link only for a currently-valid license; the link is a
/// capability proving authorization at issuance time.
pub async fn create_download_link(
  State(app): State<Arc<AppState>>,
  Json(req): Json<CreateLinkReq>,
) -> Response {
  let decision = match sv::Access::new(&app.db)
    .validate_download_access(
      &req.user_id,
      req.product_id.as_deref(),
      req.license_key.as_deref(),
    )
    .await
  {
    Ok(decision) => decision,
    Err(err) => {
      error!("Entitlement lookup failed: {err}");
      return fail(StatusCode::FORBIDDEN, "Access denied");
    }
  };

  if !decision.can_download {
    return (StatusCode::FORBIDDEN, Json(decision)).into_response();
  }

  let Some(license) = decision.license.as_ref() else {
    return fail(
      StatusCode::BAD_REQUEST,
      "Secure links are issued against a license, not an access pass",
    );
  };

  let tokens = sv::Tokens::new(&app.secret, app.config.token_ttl);
  match tokens.generate(&req.user_id, &license.product_id, &license.key) {
    Ok(token) => {
      let link =
        DownloadLink { token, expires_in: app.config.token_ttl.as_secs() };
      (StatusCode::OK, Json(link)).into_response()
    }
    Err(err) => service_error(err),
  }
}

#[derive(Deserialize)]
pub struct SecureDownloadQuery {
  token: String,
}

/// Redeems a signed link. The signature only proves the link was issued;
/// entitlement is re-checked live before any bytes move.
pub async fn secure_download(
  State(app): State<Arc<AppState>>,
  ConnectInfo(addr): ConnectInfo<SocketAddr>,
  headers: HeaderMap,
  Query(query): Query<SecureDownloadQuery>,
) -> Response {
  let tokens = sv::Tokens::new(&app.secret, app.config.token_ttl);
  let verified = tokens.verify(&query.token);

  if verified.expired {
    return (StatusCode::GONE, Json(verified)).into_response();
  }
  if !verified.valid {
    return (StatusCode::UNAUTHORIZED, Json(verified)).into_response();
  }

  let (Some(user_id), Some(license_key)) =
    (verified.user_id.clone(), verified.license_key.clone())
  else {
    return (StatusCode::UNAUTHORIZED, Json(verified)).into_response();
  };

  let decision = match sv::Access::new(&app.db)
    .validate_download_access(&user_id, None, Some(&license_key))
    .await
  {
    Ok(decision) => decision,
    Err(err) => {
      error!("Entitlement lookup failed: {err}");
      return fail(StatusCode::FORBIDDEN, "Access denied");
    }
  };

  if !decision.can_download {
    return (StatusCode::FORBIDDEN, Json(decision)).into_response();
  }

  deliver(
    &app,
    &user_id,
    verified.product_id.as_deref(),
    decision.license.as_ref(),
    decision.method,
    addr,
    &headers,
  )
  .await
}

/// Opens the product file, claims the download (the conditional increment
/// may still refuse the last quota unit), then streams.
async fn deliver(
  app: &AppState,
  user_id: &str,
  product_id: Option<&str>,
  license: Option<&license::Model>,
  method: AccessMethod,
  addr: SocketAddr,
  headers: &HeaderMap,
) -> Response {
  let product_id =
    match license.map(|l| l.product_id.as_str()).or(product_id) {
      Some(id) => id,
      None => return fail(StatusCode::BAD_REQUEST, "product_id required"),
    };

  let product = match sv::Catalog::new(&app.db).by_id(product_id).await {
    Ok(Some(product)) => product,
    Ok(None) => return fail(StatusCode::NOT_FOUND, "Product not found"),
    Err(err) => {
      error!("Product lookup failed: {err}");
      return fail(StatusCode::INTERNAL_SERVER_ERROR, "Store unavailable");
    }
  };

  let path = app.config.assets_dir.join(&product.file_path);
  let file = match tokio::fs::File::open(&path).await {
    Ok(file) => file,
    Err(err) => {
      error!("Asset missing for product {}: {err}", product.id);
      return fail(StatusCode::NOT_FOUND, "File not available");
    }
  };

  let file_size = match file.metadata().await {
    Ok(meta) => Some(meta.len() as i64),
    Err(_) => product.file_size,
  };

  let record = RecordDownload {
    user_id: user_id.to_string(),
    product_id: Some(product.id.clone()),
    method,
    license_key: license.map(|l| l.key.clone()),
    file_size,
    ip_address: Some(addr.ip().to_string()),
    user_agent: headers
      .get(header::USER_AGENT)
      .and_then(|v| v.to_str().ok())
      .map(str::to_string),
  };

  if let Err(err) = sv::Access::new(&app.db).record_download(record).await {
    return match err {
      Error::DownloadLimitExceeded => {
        fail(StatusCode::FORBIDDEN, "Download limit exceeded")
      }
      err => {
        error!("Failed to record download: {err}");
        fail(StatusCode::INTERNAL_SERVER_ERROR, "Failed to record download")
      }
    };
  }

  let filename = product
    .file_path
    .rsplit('/')
    .next()
    .unwrap_or(&product.file_path)
    .to_string();

  let response = Response::builder()
    .header(header::CONTENT_TYPE, "application/octet-stream")
    .header(
      header::CONTENT_DISPOSITION,
      format!("attachment; filename=\"{filename}\""),
    )
    .body(Body::from_stream(ReaderStream::new(file)));

  match response {
    Ok(response) => response,
    Err(err) => {
      error!("Failed to build download response: {err}");
      StatusCode::INTERNAL_SERVER_ERROR.into_response()
    }
  }
}

#[derive(Deserialize)]
pub struct OrderItemReq {
  product_id: String,
  license_type: LicenseType,
  quantity: i32,
}

#[derive(Deserialize)]
pub struct CreateOrderReq {
  user_id: String,
  items: Vec<OrderItemReq>,
}

pub async fn create_order(
  State(app): State<Arc<AppState>>,
  Json(req): Json<CreateOrderReq>,
) -> Response {
  let items = req
    .items
    .into_iter()
    .map(|item| NewOrderItem {
      product_id: item.product_id,
      license_type: item.license_type,
      quantity: item.quantity,
    })
    .collect();

  match sv::Order::new(&app.db).create(&req.user_id, items).await {
    Ok(order) => (StatusCode::CREATED, Json(order)).into_response(),
    Err(err) => service_error(err),
  }
}

#[derive(Deserialize)]
pub struct CompleteOrderReq {
  payment_intent_id: Option<String>,
}

pub async fn complete_order(
  State(app): State<Arc<AppState>>,
  Path(order_id): Path<String>,
  Json(req): Json<CompleteOrderReq>,
) -> Response {
  let result = sv::Order::new(&app.db)
    .complete(&order_id, req.payment_intent_id, app.stripe.as_ref())
    .await;

  match result {
    Ok(licenses) => {
      let summaries: Vec<LicenseSummary> =
        licenses.into_iter().map(Into::into).collect();
      (StatusCode::OK, Json(summaries)).into_response()
    }
    Err(err) => service_error(err),
  }
}

#[derive(Deserialize)]
pub struct CreatePassReq {
  user_id: String,
  pass_type: PassType,
  price_amount: i64,
  currency: String,
  stripe_subscription_id: Option<String>,
}

pub async fn create_pass(
  State(app): State<Arc<AppState>>,
  Json(req): Json<CreatePassReq>,
) -> Response {
  let result = sv::AccessPass::new(&app.db)
    .create(sv::access_pass::CreatePass {
      user_id: req.user_id,
      pass_type: req.pass_type,
      price_amount: req.price_amount,
      currency: req.currency,
      stripe_subscription_id: req.stripe_subscription_id,
    })
    .await;

  match result {
    Ok(pass) => (StatusCode::CREATED, Json(pass)).into_response(),
    Err(err) => service_error(err),
  }
}

#[derive(Deserialize)]
pub struct CancelPassQuery {
  at_period_end: Option<bool>,
}

pub async fn cancel_pass(
  State(app): State<Arc<AppState>>,
  Path(pass_id): Path<String>,
  Query(query): Query<CancelPassQuery>,
) -> Response {
  let result = sv::AccessPass::new(&app.db)
    .cancel(&pass_id, query.at_period_end.unwrap_or(false))
    .await;

  match result {
    Ok(pass) => (StatusCode::OK, Json(pass)).into_response(),
    Err(err) => service_error(err),
  }
}
