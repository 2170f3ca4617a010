#[cfg(not(target_arch = "wasm32"))]
mod native {
    extern crate picboard;

    use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};

    mod adapter {
        use actix_web::HttpRequest;
        use spin_sdk::http::{Method, Request, Response};

        pub fn actix_to_spin_request(
            req: &HttpRequest,
            body: actix_web::web::Bytes,
        ) -> anyhow::Result<Request> {
            let method = match req.method().as_str() {
                "GET" => Method::Get,
                "POST" => Method::Post,
                "PUT" => Method::Put,
                "DELETE" => Method::Delete,
                "HEAD" => Method::Head,
                "OPTIONS" => Method::Options,
                "PATCH" => Method::Patch,
                _ => Method::Get,
            };

            let uri = req.uri().to_string();
            let body_vec = body.to_vec();

            let mut req_builder = Request::builder();
            let method_set = req_builder.method(method);
            let uri_set = method_set.uri(&uri);

            // Copy headers
            let mut with_headers = uri_set;
            for (name, value) in req.headers() {
                if let Ok(val_str) = value.to_str() {
                    with_headers = with_headers.header(name.as_str(), val_str);
                }
            }

            Ok(with_headers.body(body_vec).build())
        }

        pub fn spin_to_actix_response(spin_resp: Response) -> actix_web::HttpResponse {
            let status = *spin_resp.status();
            let body = spin_resp.body().to_vec();

            let mut response = actix_web::HttpResponse::build(
                actix_web::http::StatusCode::from_u16(status)
                    .unwrap_or(actix_web::http::StatusCode::INTERNAL_SERVER_ERROR),
            );

            response.body(body)
        }
    }

    pub async fn run() -> std::io::Result<()> {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
        tracing::info!("Server listening on http://0.0.0.0:3000");

        HttpServer::new(|| App::new().default_service(web::route().to(handle_all)))
            .bind("0.0.0.0:3000")?
            .run()
            .await
    }

    async fn handle_all(req: HttpRequest, body: web::Bytes) -> HttpResponse {
        let path = req.path().to_string();
        let method = req.method().as_str();

        let spin_req = match adapter::actix_to_spin_request(&req, body) {
            Ok(r) => r,
            Err(_) => {
                return HttpResponse::BadRequest().json(serde_json::json!({"e": "Invalid request"}))
            }
        };

        let result = match (method, path.as_str()) {
            ("POST", "/users/registration") => picboard::users::create_user(spin_req),
            ("GET", p) if p.starts_with("/users/verifyemail/") => picboard::auth::verify_email(p),
            ("POST", "/users/login") => picboard::auth::login_user(spin_req),
            ("POST", "/users/logout") => picboard::auth::logout_user(spin_req),
            ("POST", "/users/logoutAll") => picboard::auth::logout_all(spin_req),
            ("POST", "/users/forgetPassword") => picboard::auth::forget_password(spin_req),
            ("POST", "/users/me/update") => picboard::users::update_profile(spin_req),
            ("GET", "/users/me") => picboard::users::get_profile(spin_req),
            ("DELETE", "/users/me") => picboard::users::delete_me(spin_req),
            ("POST", "/users/me/profilePicture") => picboard::users::upload_avatar(spin_req),
            ("DELETE", "/users/me/profilePicture") => picboard::users::delete_avatar(spin_req),
            ("GET", p) if p.starts_with("/users/") && p.ends_with("/profilePicture") => {
                picboard::users::get_avatar(p)
            }
            ("PUT", p) if p.starts_with("/users/") && p.ends_with("/follow") => {
                picboard::follow::handle_follow(spin_req)
            }
            ("PUT", p) if p.starts_with("/users/") && p.ends_with("/unfollow") => {
                picboard::follow::handle_unfollow(spin_req)
            }
            ("POST", "/users/post") => picboard::posts::handle_upload(spin_req),
            ("GET", "/users/me/posts") => picboard::posts::my_posts(spin_req),
            ("GET", p) if p.starts_with("/users/") && p.ends_with("/posts") => {
                picboard::posts::user_posts(spin_req)
            }
            ("GET", "/posts/timeline/all") => picboard::visibility::get_timeline(spin_req),
            ("PATCH", p) if p.starts_with("/posts/") && p.ends_with("/update") => {
                picboard::posts::handle_update(spin_req)
            }
            ("PUT", p) if p.starts_with("/posts/") && p.ends_with("/like") => {
                picboard::visibility::handle_like(spin_req)
            }
            ("POST", p) if p.starts_with("/posts/") && p.ends_with("/comment") => {
                picboard::visibility::handle_comment(spin_req)
            }
            ("DELETE", p) if p.starts_with("/posts/") => picboard::posts::handle_delete(spin_req),
            ("POST", p) if p.starts_with("/users/") && p.matches('/').count() == 3 => {
                picboard::auth::reset_password(spin_req)
            }
            _ => {
                return HttpResponse::NotFound().json(serde_json::json!({"e": "No route found"}))
            }
        };

        match result {
            Ok(spin_resp) => adapter::spin_to_actix_response(spin_resp),
            Err(_) => HttpResponse::InternalServerError()
                .json(serde_json::json!({"e": "Internal server error"})),
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
#[actix_web::main]
async fn main() -> std::io::Result<()> {
    native::run().await
}

#[cfg(target_arch = "wasm32")]
fn main() {}
