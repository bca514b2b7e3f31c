use crate::{
    api::{pay_period, time_clock},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::web;

pub fn configure(cfg: &mut web::ServiceConfig, config: Config) {
    // Helper to build per-route limiter
    fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
        let per_ms = if requests_per_min == 0 {
            1
        } else {
            60_000 / requests_per_min as u64
        };
        let cfg = GovernorConfigBuilder::default()
            .per_millisecond(per_ms)
            .burst_size(requests_per_min)
            .key_extractor(PeerIpKeyExtractor)
            .finish()
            .unwrap();
        Governor::new(&cfg)
    }

    let clock_limiter = build_limiter(config.rate_clock_per_min);
    let protected_limiter = build_limiter(config.rate_protected_per_min);

    // Identity arrives as trusted X-Auth-* headers from the upstream gateway.
    cfg.service(
        web::scope(&config.api_prefix)
            .service(
                web::scope("/timeclock")
                    .wrap(clock_limiter)
                    // /timeclock/clock-in, /timeclock/clock-out
                    .service(
                        web::resource("/clock-in").route(web::post().to(time_clock::clock_in)),
                    )
                    .service(
                        web::resource("/clock-out").route(web::post().to(time_clock::clock_out)),
                    )
                    // /timeclock/active
                    .service(
                        web::resource("/active").route(web::get().to(time_clock::active_entry)),
                    )
                    // /timeclock/validate — pre-flight check for clients
                    .service(web::resource("/validate").route(web::post().to(time_clock::validate))),
            )
            .service(
                web::scope("/pay-periods")
                    .wrap(protected_limiter)
                    // /pay-periods/generate
                    .service(
                        web::resource("/generate").route(web::post().to(pay_period::generate)),
                    )
                    // /pay-periods/{id}/approve
                    .service(
                        web::resource("/{id}/approve").route(web::put().to(pay_period::approve)),
                    )
                    // /pay-periods/{id}/export
                    .service(
                        web::resource("/{id}/export").route(web::post().to(pay_period::export)),
                    )
                    // /pay-periods/{id}/recalculate
                    .service(
                        web::resource("/{id}/recalculate")
                            .route(web::post().to(pay_period::recalculate)),
                    )
                    // /pay-periods/{id}/hours
                    .service(web::resource("/{id}/hours").route(web::get().to(pay_period::hours)))
                    // /pay-periods/{id}/summary
                    .service(
                        web::resource("/{id}/summary").route(web::get().to(pay_period::summary)),
                    ),
            ),
    );
}
