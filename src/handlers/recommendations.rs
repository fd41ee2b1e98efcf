use crate::{
    error::ApiError,
    models::{RecommendationRequest, RecommendationResponse},
    services::RecommendationService,
};
use actix_web::{
    web::{self, Json},
    HttpResponse,
};

pub fn recommendations_config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/recommend").route(web::post().to(get_recommendations)));
}

/// Generate per-item recommendations for a multi-item request.
///
/// 200 with the generated subset when at least one item resolves, 400 on a
/// structurally invalid request, 404 when no item resolves.
pub async fn get_recommendations(
    request: Json<RecommendationRequest>,
    recommendation_service: web::Data<RecommendationService>,
) -> Result<HttpResponse, ApiError> {
    let recommendations = recommendation_service.recommend(&request).await?;

    Ok(HttpResponse::Ok().json(RecommendationResponse { recommendations }))
}
