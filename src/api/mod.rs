use rocket::Route;

mod auth;
mod common;
mod elections;
mod health;
mod results;
mod votes;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(auth::routes());
    routes.extend(elections::routes());
    routes.extend(votes::routes());
    routes.extend(results::routes());
    routes.extend(health::routes());
    routes
}
