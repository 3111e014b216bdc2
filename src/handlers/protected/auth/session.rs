use axum::Extension;

use crate::auth::{Principal, PrincipalView};
use crate::middleware::{ApiResponse, ApiResult};

/// GET /api/v1/whoami - Current authenticated principal
///
/// Expected Output:
/// ```json
/// {
///   "success": true,
///   "data": { "id": "...", "username": "alice", "role": "user", "createdAt": "..." }
/// }
/// ```
pub async fn whoami(Extension(principal): Extension<Principal>) -> ApiResult<PrincipalView> {
    Ok(ApiResponse::success(principal.view()))
}
