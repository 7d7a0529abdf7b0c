use axum::{
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        Method,
    },
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{cors::{Any, CorsLayer}, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    group::{
        group_dto::{
            CreateGroupRequest, CreateGroupResponse, JoinGroupRequest, LinkItineraryRequest,
            PromoteUserRequest, RespondJoinRequest,
        },
        group_handlers,
        group_models::{Group, GroupMember},
    },
    middleware::auth_middleware,
    state::AppState,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::group::group_handlers::create_group,
        crate::group::group_handlers::list_groups,
        crate::group::group_handlers::get_group,
        crate::group::group_handlers::join_group,
        crate::group::group_handlers::respond_join_request,
        crate::group::group_handlers::promote_user,
        crate::group::group_handlers::kick_member,
        crate::group::group_handlers::link_itinerary,
        crate::group::group_handlers::unlink_itinerary,
        crate::group::group_handlers::delete_group,
    ),
    components(
        schemas(
            CreateGroupRequest,
            CreateGroupResponse,
            JoinGroupRequest,
            RespondJoinRequest,
            PromoteUserRequest,
            LinkItineraryRequest,
            Group,
            GroupMember,
        )
    ),
    tags(
        (name = "groups", description = "Travel group collaboration endpoints")
    ),
    modifiers(&SecurityAddon)
)]
struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                utoipa::openapi::security::SecurityScheme::Http(
                    utoipa::openapi::security::Http::new(
                        utoipa::openapi::security::HttpAuthScheme::Bearer,
                    ),
                ),
            )
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]);

    // All group routes require an authenticated actor.
    let group_routes = Router::new()
        .route(
            "/",
            get(group_handlers::list_groups).post(group_handlers::create_group),
        )
        .route("/join", post(group_handlers::join_group))
        .route(
            "/:group_id",
            get(group_handlers::get_group).delete(group_handlers::delete_group),
        )
        .route(
            "/:group_id/respond",
            post(group_handlers::respond_join_request),
        )
        .route("/:group_id/promote", post(group_handlers::promote_user))
        .route(
            "/:group_id/members/:user_id",
            delete(group_handlers::kick_member),
        )
        .route(
            "/:group_id/itinerary",
            put(group_handlers::link_itinerary).delete(group_handlers::unlink_itinerary),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let api_routes = Router::new().nest("/groups", group_routes);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
