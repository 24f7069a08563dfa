mod context;
mod core;
mod error;
mod handlers;
mod impls;
mod middlewares;
mod models;
mod response;
mod storer;

use actix_files::Files;
use actix_web::web::{delete, get, patch, post, put, resource, scope, Data};
use actix_web::HttpServer;
use sqlx::postgres::PgPoolOptions;

use middlewares::jwt::{Jwt, JWT_SECRET};
use storer::LocalStorer;

#[actix_web::main]
async fn main() -> Result<(), std::io::Error> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));
    let database_url = dotenv::var("DATABASE_URL").expect("environment variable DATABASE_URL not been set");
    let secret = dotenv::var(JWT_SECRET).expect("environment variable JWT_SECRET not been set");
    let port = dotenv::var("PORT").ok().and_then(|p| p.parse::<u16>().ok()).unwrap_or(8000);
    let upload_path = dotenv::var("UPLOAD_PATH").unwrap_or_else(|_| "uploads".to_owned());
    std::fs::create_dir_all(&upload_path)?;
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("failed to connect to database");
    log::info!("listening on 0.0.0.0:{}", port);
    HttpServer::new(move || {
        let secret = secret.as_bytes().to_vec();
        actix_web::App::new()
            .wrap(actix_web::middleware::Logger::default())
            .app_data(Data::new(pool.clone()))
            .app_data(Data::new(LocalStorer::new(&upload_path)))
            .service(
                scope("/api/v1")
                    .service(
                        scope("/auth")
                            .service(resource("/register").route(post().to(handlers::register)))
                            .service(resource("/login").route(post().to(handlers::login)))
                            .service(resource("/getpolls").route(get().to(handlers::poll::list_all)))
                            .service(resource("/trendingpolls").route(get().to(handlers::poll::trending)))
                            .service(
                                scope("")
                                    .wrap(Jwt::new(secret.clone()))
                                    .service(resource("/logout").route(post().to(handlers::logout)))
                                    .service(resource("/getuser").route(get().to(handlers::get_user)))
                                    .service(resource("/update-profile").route(put().to(handlers::update_profile)))
                                    .service(resource("/change-password").route(put().to(handlers::change_password)))
                                    .service(resource("/create-poll").route(post().to(handlers::poll::create::<LocalStorer>)))
                                    .service(resource("/userpoll").route(get().to(handlers::poll::list_mine)))
                                    .service(resource("/delete-poll/{id}").route(delete().to(handlers::poll::delete_poll)))
                                    .service(resource("/votepoll/{poll_id}").route(patch().to(handlers::poll::vote)))
                                    .service(resource("/getvotedpolls").route(get().to(handlers::poll::list_voted)))
                                    .service(resource("/bookmarkpoll/{poll_id}").route(post().to(handlers::poll::bookmark)))
                                    .service(resource("/getbookmarkedpolls").route(get().to(handlers::poll::list_bookmarked))),
                            ),
                    )
                    .service(
                        scope("/image")
                            .wrap(Jwt::new(secret))
                            .service(resource("/upload-image").route(post().to(handlers::upload::create::<LocalStorer>))),
                    ),
            )
            .service(Files::new("/uploads", upload_path.as_str()))
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
