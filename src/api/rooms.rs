use crate::api::AppState;
use crate::api::middleware::AuthUser;
use crate::api::schemas::messages::{MarkReadResponse, MessageResponse, MessagesQuery, SendMessageRequest};
use crate::api::schemas::rooms::{CreateRoomRequest, RoomListItem, RoomResponse};
use crate::error::{AppError, Result};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};

/// Opens the room between the caller and a counterpart, or returns the one
/// that already pairs them. The counterpart is given directly or resolved
/// from a listing.
///
/// # Errors
/// Returns `AppError::BadRequest` unless exactly one of `counterpart_id` and
/// `product_id` is set, or when the caller addresses themselves.
/// Returns `AppError::NotFound` for an unknown listing.
pub async fn create_room(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Json(body): Json<CreateRoomRequest>,
) -> Result<impl IntoResponse> {
    let actor = auth_user.principal.user_id;

    let (room, created) = match (body.counterpart_id, body.product_id) {
        (Some(counterpart), None) => state.room_service.get_or_create(actor, counterpart).await?,
        (None, Some(product_id)) => state.room_service.get_or_create_for_listing(actor, product_id).await?,
        _ => return Err(AppError::BadRequest("Provide exactly one of counterpart_id or product_id".to_owned())),
    };

    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(RoomResponse::for_viewer(&room, actor))))
}

/// Lists the caller's rooms, most recently active first. Rooms the caller
/// cleared stay hidden until new activity arrives.
pub async fn list_rooms(auth_user: AuthUser, State(state): State<AppState>) -> Result<impl IntoResponse> {
    let user_id = auth_user.principal.user_id;
    let rooms = state.room_service.list_rooms(user_id).await?;

    let items: Vec<RoomListItem> = rooms
        .into_iter()
        .map(|(room, unread_count)| RoomListItem { room: RoomResponse::for_viewer(&room, user_id), unread_count })
        .collect();

    Ok(Json(items))
}

pub async fn get_room(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(room_id): Path<i64>,
) -> Result<impl IntoResponse> {
    let user_id = auth_user.principal.user_id;
    let (room, unread_count) = state.room_service.room_detail(user_id, room_id).await?;

    Ok(Json(RoomListItem { room: RoomResponse::for_viewer(&room, user_id), unread_count }))
}

/// Removes the room from the caller's view. Participants clear their own
/// side; admins retire the room for both.
pub async fn delete_room(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(room_id): Path<i64>,
) -> Result<impl IntoResponse> {
    state.room_service.remove(&auth_user.principal, room_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_messages(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(room_id): Path<i64>,
    Query(query): Query<MessagesQuery>,
) -> Result<impl IntoResponse> {
    let messages = state.message_service.list(auth_user.principal.user_id, room_id, query.limit, query.before).await?;

    Ok(Json(messages.into_iter().map(MessageResponse::from).collect::<Vec<_>>()))
}

/// Persists a message and fans it out to the room's participants.
///
/// # Errors
/// Returns `AppError::BadRequest` for an empty or oversized body,
/// `AppError::Forbidden` when the caller is not a participant.
pub async fn send_message(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(room_id): Path<i64>,
    Json(body): Json<SendMessageRequest>,
) -> Result<impl IntoResponse> {
    let message = state.message_service.send(auth_user.principal.user_id, room_id, body.content, body.image_ref).await?;

    Ok((StatusCode::CREATED, Json(MessageResponse::from(message))))
}

/// Marks every counterpart-authored message in the room as read and reports
/// how many rows flipped.
pub async fn mark_read(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(room_id): Path<i64>,
) -> Result<impl IntoResponse> {
    let marked = state.message_service.mark_all_read(auth_user.principal.user_id, room_id).await?;

    Ok(Json(MarkReadResponse { marked }))
}
