use std::net::IpAddr;

use mongodb::bson::{doc, DateTime as BsonDateTime};
use rocket::{http::Status, serde::json::Json, Route, State};

use crate::{
    config::Config,
    error::{Error, Result},
    model::{
        api::auth::{AuthResponse, AuthToken, LoginRequest, RegisterRequest, UserProfile, Voter},
        db::{
            audit::{self, AuditAction, NewAuditLog},
            user::{NewUser, User},
        },
        mongodb::{retry, violates_index, Coll, Id, UNIQUE_EMAIL_INDEX},
    },
};

pub fn routes() -> Vec<Route> {
    routes![register, login, me]
}

#[post("/auth/register", data = "<request>", format = "json")]
async fn register(
    request: Json<RegisterRequest>,
    users: Coll<NewUser>,
    logs: Coll<NewAuditLog>,
    config: &State<Config>,
    ip: Option<IpAddr>,
) -> Result<(Status, Json<AuthResponse>)> {
    // Validate the credentials and hash the password.
    let user: NewUser = request
        .0
        .try_into()
        .map_err(|err| Error::bad_request(format!("{err}")))?;
    let role = user.role;

    // The unique index on the email is the arbiter for duplicate accounts.
    let user_id: Id = match retry::execute(|| {
        let users = users.clone();
        let user = user.clone();
        async move { users.insert_one(user, None).await }
    })
    .await
    {
        Ok(result) => result
            .inserted_id
            .as_object_id()
            .unwrap() // Valid because the ID comes directly from the DB.
            .into(),
        Err(err) if violates_index(&err, UNIQUE_EMAIL_INDEX) => {
            return Err(Error::conflict("User already exists"));
        }
        Err(err) => return Err(err.into()),
    };

    audit::record(
        &logs,
        NewAuditLog::new(AuditAction::UserRegistered, "user", Some(user_id), ip, None),
    )
    .await;

    let token = AuthToken::<Voter>::new(user_id, role).encode(config);
    Ok((
        Status::Created,
        Json(AuthResponse {
            user_id,
            role,
            token,
        }),
    ))
}

#[post("/auth/login", data = "<request>", format = "json")]
async fn login(
    request: Json<LoginRequest>,
    users: Coll<User>,
    config: &State<Config>,
) -> Result<Json<AuthResponse>> {
    let user = retry::execute(|| {
        let users = users.clone();
        let with_email = doc! { "email": &request.email };
        async move { users.find_one(with_email, None).await }
    })
    .await?
    .filter(|user| user.verify_password(&request.password))
    // An unknown email and a wrong password are indistinguishable.
    .ok_or_else(|| Error::unauthorized("Invalid credentials"))?;

    // Record the login time.
    retry::execute(|| {
        let users = users.clone();
        let filter = user.id.as_doc();
        let update = doc! { "$set": { "last_login": BsonDateTime::now() } };
        async move { users.update_one(filter, update, None).await }
    })
    .await?;

    let token = AuthToken::<Voter>::new(user.id, user.role).encode(config);
    Ok(Json(AuthResponse {
        user_id: user.id,
        role: user.role,
        token,
    }))
}

#[get("/auth/me")]
async fn me(token: AuthToken<Voter>, users: Coll<User>) -> Result<Json<UserProfile>> {
    let user = retry::execute(|| {
        let users = users.clone();
        let filter = token.id.as_doc();
        async move { users.find_one(filter, None).await }
    })
    .await?
    .ok_or_else(|| Error::not_found(format!("User {}", token.id)))?;

    Ok(Json(user.into()))
}

#[cfg(test)]
mod tests {
    use rocket::http::{ContentType, Status};
    use rocket::local::asynchronous::Client;
    use rocket::serde::json::serde_json::{self, json};

    use crate::model::api::auth::Rights;
    use crate::model::db::user::DEFAULT_ADMIN_EMAIL;
    use crate::testing::{bearer, login_as, register_voter};

    use super::*;

    #[backend_test]
    async fn register_valid(client: Client, users: Coll<User>) {
        let response = client
            .post(uri!("/api", register()))
            .header(ContentType::JSON)
            .body(serde_json::to_string(&RegisterRequest::example()).unwrap())
            .dispatch()
            .await;

        assert_eq!(Status::Created, response.status());
        let raw_response = response.into_string().await.unwrap();
        let auth: AuthResponse = serde_json::from_str(&raw_response).unwrap();
        assert_eq!(Rights::Voter, auth.role);
        assert!(!auth.token.is_empty());

        // Ensure the user was inserted with a hashed password.
        let user = users
            .find_one(doc! { "email": &RegisterRequest::example().email }, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(user.id, auth.user_id);
        assert_ne!(user.password_hash, RegisterRequest::example().password);
        assert!(user.verify_password(&RegisterRequest::example().password));
        assert!(user.last_login.is_none());
    }

    #[backend_test]
    async fn register_duplicate_email(client: Client) {
        register_voter(&client).await;

        // Same email again, different everything else.
        let mut request = RegisterRequest::example();
        request.full_name = "Someone Else".to_string();
        let response = client
            .post(uri!("/api", register()))
            .header(ContentType::JSON)
            .body(serde_json::to_string(&request).unwrap())
            .dispatch()
            .await;

        assert_eq!(Status::Conflict, response.status());
    }

    #[backend_test]
    async fn register_invalid_credentials(client: Client, users: Coll<User>) {
        let mut bad_email = RegisterRequest::example();
        bad_email.email = "not-an-email".to_string();
        let response = client
            .post(uri!("/api", register()))
            .header(ContentType::JSON)
            .body(serde_json::to_string(&bad_email).unwrap())
            .dispatch()
            .await;
        assert_eq!(Status::BadRequest, response.status());

        let mut weak_password = RegisterRequest::example();
        weak_password.password = "short".to_string();
        let response = client
            .post(uri!("/api", register()))
            .header(ContentType::JSON)
            .body(serde_json::to_string(&weak_password).unwrap())
            .dispatch()
            .await;
        assert_eq!(Status::BadRequest, response.status());

        // Neither attempt created an account.
        let voters = users
            .count_documents(doc! { "role": Rights::Voter }, None)
            .await
            .unwrap();
        assert_eq!(voters, 0);
    }

    #[backend_test]
    async fn login_valid(client: Client, users: Coll<User>) {
        let registered = register_voter(&client).await;

        let auth = login_as(
            &client,
            &RegisterRequest::example().email,
            &RegisterRequest::example().password,
        )
        .await;
        assert_eq!(registered.user_id, auth.user_id);
        assert_eq!(Rights::Voter, auth.role);

        // The login must have been recorded.
        let user = users
            .find_one(auth.user_id.as_doc(), None)
            .await
            .unwrap()
            .unwrap();
        assert!(user.last_login.is_some());
    }

    #[backend_test]
    async fn login_invalid(client: Client) {
        register_voter(&client).await;

        // Wrong password.
        let response = client
            .post(uri!("/api", login()))
            .header(ContentType::JSON)
            .body(
                json!({
                    "email": RegisterRequest::example().email,
                    "password": "Wr0ng!pass",
                })
                .to_string(),
            )
            .dispatch()
            .await;
        assert_eq!(Status::Unauthorized, response.status());

        // Unknown email; must be indistinguishable from a wrong password.
        let response = client
            .post(uri!("/api", login()))
            .header(ContentType::JSON)
            .body(
                json!({
                    "email": "nobody@example.com",
                    "password": RegisterRequest::example().password,
                })
                .to_string(),
            )
            .dispatch()
            .await;
        assert_eq!(Status::Unauthorized, response.status());
    }

    #[backend_test]
    async fn me_roundtrip(client: Client) {
        let auth = register_voter(&client).await;

        let response = client
            .get(uri!("/api", me()))
            .header(bearer(&auth.token))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());

        let profile: UserProfile =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(profile.user_id, auth.user_id);
        assert_eq!(profile.email, RegisterRequest::example().email);
        assert_eq!(profile.role, Rights::Voter);
    }

    #[backend_test]
    async fn me_requires_token(client: Client) {
        let response = client.get(uri!("/api", me())).dispatch().await;
        assert_eq!(Status::Unauthorized, response.status());
    }

    #[backend_test]
    async fn default_admin_can_login(client: Client) {
        let config = client.rocket().state::<Config>().unwrap();
        let auth = login_as(&client, DEFAULT_ADMIN_EMAIL, config.default_admin_password()).await;
        assert_eq!(Rights::Admin, auth.role);
    }
}
