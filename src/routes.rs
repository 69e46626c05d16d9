use crate::{
    api::{dashboard, student_registration, sub_admin},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use std::sync::Arc;

/// Per-IP limiter allowing `requests_per_min` with an equal burst.
fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
    let requests_per_min = requests_per_min.max(1);
    let per_ms = (60_000 / u64::from(requests_per_min)).max(1);
    let cfg = GovernorConfigBuilder::default()
        .milliseconds_per_request(per_ms)
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .unwrap_or_default();
    Governor::new(&cfg)
}

pub fn configure(cfg: &mut web::ServiceConfig, config: &Config) {
    let login_limiter = Arc::new(build_limiter(config.rate_login_per_min));
    let refresh_limiter = Arc::new(build_limiter(config.rate_refresh_per_min));
    let protected_limiter = Arc::new(build_limiter(config.rate_protected_per_min));

    // Public routes
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/login")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/refresh")
                    .wrap(refresh_limiter.clone())
                    .route(web::post().to(handlers::refresh_token)),
            )
            .service(
                web::resource("/logout")
                    .wrap(login_limiter)
                    .route(web::post().to(handlers::logout)),
            ),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware))
            .wrap(protected_limiter)
            .service(web::resource("/dashboard").route(web::get().to(dashboard::dashboard_summary)))
            .service(
                web::scope("/student-registration")
                    // /student-registration
                    .service(
                        web::resource("")
                            .route(web::get().to(student_registration::list_registrations))
                            .route(web::post().to(student_registration::create_registration)),
                    )
                    // before /{id} so it is not taken for an id
                    .service(
                        web::resource("/export")
                            .route(web::get().to(student_registration::export_registrations)),
                    )
                    // /student-registration/{id}
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(student_registration::get_registration))
                            .route(web::put().to(student_registration::update_registration))
                            .route(web::delete().to(student_registration::delete_registration)),
                    )
                    .service(
                        web::resource("/{id}/form")
                            .route(web::get().to(student_registration::get_registration_form)),
                    ),
            )
            .service(
                web::scope("/sub-admin")
                    .service(
                        web::resource("")
                            .route(web::get().to(sub_admin::list_sub_admins))
                            .route(web::post().to(sub_admin::create_sub_admin)),
                    )
                    .service(web::resource("/branches").route(web::get().to(sub_admin::list_branches)))
                    .service(
                        web::resource("/{id}")
                            .route(web::get().to(sub_admin::get_sub_admin))
                            .route(web::put().to(sub_admin::update_sub_admin))
                            .route(web::delete().to(sub_admin::delete_sub_admin)),
                    ),
            ),
    );
}

// LOGIN
//  ├─ access_token (ACCESS_TOKEN_TTL)
//  └─ refresh_token (REFRESH_TOKEN_TTL, stored by jti)

// API REQUEST
//  └─ Authorization: Bearer access_token

// ACCESS EXPIRED
//  └─ POST /auth/refresh with refresh_token
//       └─ old jti revoked, new pair returned

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{App, HttpResponse, http::StatusCode, test as actix_test};
    use std::net::SocketAddr;

    #[actix_web::test]
    async fn limiter_rejects_requests_beyond_the_burst() {
        let app = actix_test::init_service(
            App::new().service(
                web::resource("/login")
                    .wrap(build_limiter(2))
                    .route(web::post().to(|| async { HttpResponse::Ok().finish() })),
            ),
        )
        .await;
        let peer: SocketAddr = "127.0.0.1:40000".parse().unwrap();

        for expected in [StatusCode::OK, StatusCode::OK, StatusCode::TOO_MANY_REQUESTS] {
            let req = actix_test::TestRequest::post()
                .uri("/login")
                .peer_addr(peer)
                .to_request();
            let resp = actix_test::call_service(&app, req).await;
            assert_eq!(resp.status(), expected);
        }
    }

    #[actix_web::test]
    async fn zero_rate_still_admits_one_request() {
        let app = actix_test::init_service(
            App::new().service(
                web::resource("/refresh")
                    .wrap(build_limiter(0))
                    .route(web::post().to(|| async { HttpResponse::Ok().finish() })),
            ),
        )
        .await;

        let req = actix_test::TestRequest::post()
            .uri("/refresh")
            .peer_addr("127.0.0.1:40001".parse().unwrap())
            .to_request();
        let resp = actix_test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::OK);
    }
}
