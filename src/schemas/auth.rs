use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub(crate) email: &'a str,
    pub(crate) password: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginResponse {
    pub(crate) access_token: String,
    pub(crate) user: UserDto,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct UserDto {
    pub(crate) id: i64,
    pub(crate) email: String,
    pub(crate) role: String,
    pub(crate) name: String,
}

/// Body of `GET /auth/time`: the authoritative Istanbul wall clock as a naive
/// `YYYY-MM-DDTHH:MM` string, decoded through the wall-clock codec. The body
/// also carries the timezone name and offset; the client has no use for them.
#[derive(Debug, Deserialize)]
pub(crate) struct ServerTimeResponse {
    pub(crate) istanbul_time: String,
}
