use std::sync::Arc;

use crate::group::GroupService;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub group_service: GroupService,
}

#[derive(Clone)]
pub struct Config {
    pub jwt_secret: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            jwt_secret: std::env::var("JWT_SECRET").expect("JWT_SECRET must be set"),
        }
    }
}
