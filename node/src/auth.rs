use actix_web::body::MessageBody;
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::middleware::Next;
use actix_web::{web, Error, HttpResponse};
use subtle::ConstantTimeEq;

use crate::error_map::error_body;

/// Compares the presented secret against the configured one in constant
/// time, so response latency never leaks how many leading bytes matched
/// (SPEC_FULL §6 [AMBIENT]). `/api/health` is mounted outside this
/// middleware's scope and never reaches it.
pub async fn require_api_key(
    req: ServiceRequest,
    next: Next<impl MessageBody + 'static>,
) -> Result<ServiceResponse<impl MessageBody>, Error> {
    let expected = req
        .app_data::<web::Data<String>>()
        .map(|data| data.get_ref().clone())
        .unwrap_or_default();
    let presented = presented_key(&req);

    let ok = match presented {
        Some(presented) => {
            let expected = expected.as_bytes();
            let presented = presented.as_bytes();
            expected.len() == presented.len() && bool::from(expected.ct_eq(presented))
        }
        None => false,
    };

    if ok {
        next.call(req).await.map(ServiceResponse::map_into_left_body)
    } else {
        let response = HttpResponse::Unauthorized().json(error_body("UNAUTHORIZED", "missing or invalid API key"));
        Ok(req.into_response(response).map_into_right_body())
    }
}

fn presented_key(req: &ServiceRequest) -> Option<String> {
    if let Some(header) = req.headers().get("x-api-key") {
        if let Ok(value) = header.to_str() {
            return Some(value.to_string());
        }
    }
    req.query_string()
        .split('&')
        .find_map(|pair| pair.strip_prefix("apiKey=").map(|v| v.to_string()))
}
