/// Vehicle photos
///
/// ```text
/// POST   /api/vehicles/:id/photos              multipart, field `file`
/// GET    /api/vehicles/:id/photos
/// GET    /api/vehicles/:id/photos/:pid
/// GET    /api/vehicles/:id/photos/:pid/file
/// DELETE /api/vehicles/:id/photos/:pid
/// ```
///
/// The same image uploaded twice for one vehicle is rejected with 409
/// (unique SHA-256 checksum per vehicle).

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{ApiPath},
    routes::{file_response, vehicles::load_vehicle},
    storage::{read_upload, FileCategory},
};
use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::Response,
    Extension, Json,
};
use flotteq_shared::{
    auth::middleware::AuthContext,
    models::photo::{CreatePhoto, Photo},
    policy::VehicleAction,
};
use tracing::info;
use uuid::Uuid;

fn not_found() -> ApiError {
    ApiError::NotFound("Photo not found".to_string())
}

pub async fn list_photos(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(vehicle_id): ApiPath<Uuid>,
) -> ApiResult<Json<Vec<Photo>>> {
    let vehicle = load_vehicle(&state, &auth, vehicle_id, VehicleAction::View).await?;
    Ok(Json(Photo::list_for_vehicle(&state.db, vehicle.id).await?))
}

pub async fn upload_photo(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath(vehicle_id): ApiPath<Uuid>,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<Photo>)> {
    let vehicle = load_vehicle(&state, &auth, vehicle_id, VehicleAction::Update).await?;

    let upload = read_upload(&mut multipart).await?;
    let stored = state.storage.save(FileCategory::Photo, &upload.data).await?;

    let created = Photo::create(
        &state.db,
        CreatePhoto {
            vehicle_id: vehicle.id,
            tenant_id: vehicle.tenant_id,
            file_path: stored.path.clone(),
            original_name: upload.file_name,
            content_type: stored.content_type.to_string(),
            size_bytes: stored.size,
            checksum: stored.checksum.clone(),
        },
    )
    .await;

    let photo = match created {
        Ok(photo) => photo,
        Err(e) => {
            // Duplicate or failed insert: the file has no row pointing at it
            state.storage.remove_all([&stored.path]).await;
            return Err(e.into());
        }
    };

    info!(
        vehicle_id = %vehicle.id,
        photo_id = %photo.id,
        size = photo.size_bytes,
        content_type = %photo.content_type,
        "Photo uploaded"
    );

    Ok((StatusCode::CREATED, Json(photo)))
}

pub async fn get_photo(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath((vehicle_id, photo_id)): ApiPath<(Uuid, Uuid)>,
) -> ApiResult<Json<Photo>> {
    let vehicle = load_vehicle(&state, &auth, vehicle_id, VehicleAction::View).await?;

    let photo = Photo::find_for_vehicle(&state.db, vehicle.id, photo_id)
        .await?
        .ok_or_else(not_found)?;

    Ok(Json(photo))
}

pub async fn download_photo(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath((vehicle_id, photo_id)): ApiPath<(Uuid, Uuid)>,
) -> ApiResult<Response> {
    let vehicle = load_vehicle(&state, &auth, vehicle_id, VehicleAction::View).await?;

    let photo = Photo::find_for_vehicle(&state.db, vehicle.id, photo_id)
        .await?
        .ok_or_else(not_found)?;

    let data = state.storage.read(&photo.file_path).await?;
    Ok(file_response(data, &photo.content_type, &photo.original_name))
}

pub async fn delete_photo(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiPath((vehicle_id, photo_id)): ApiPath<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    let vehicle = load_vehicle(&state, &auth, vehicle_id, VehicleAction::Update).await?;

    let photo = Photo::delete(&state.db, vehicle.id, photo_id)
        .await?
        .ok_or_else(not_found)?;

    state.storage.remove_all([photo.file_path]).await;

    Ok(StatusCode::NO_CONTENT)
}
