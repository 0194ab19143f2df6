use crate::schemas::auth::UserDto;

/// Login context for one portal user.
///
/// Created by a successful login and passed explicitly to everything that
/// talks to the backend; there is no process-wide token storage. The owner
/// drops or invalidates it on logout or when the backend reports the token
/// dead (401/422).
#[derive(Debug, Clone)]
pub(crate) struct AuthSession {
    access_token: String,
    user: UserDto,
}

impl AuthSession {
    pub(crate) fn new(access_token: String, user: UserDto) -> Self {
        Self { access_token, user }
    }

    pub(crate) fn token(&self) -> &str {
        &self.access_token
    }

    pub(crate) fn user(&self) -> &UserDto {
        &self.user
    }

    pub(crate) fn invalidate(self) {
        tracing::info!(user_id = self.user.id, "Auth session invalidated");
    }
}
