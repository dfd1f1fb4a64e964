//! Test utilities and fixtures (available with the `test-utils` feature).

use axum_test::TestServer;
use rand::Rng;
use sqlx::PgPool;

use crate::{
    AppState,
    api::models::users::{CurrentUser, Role, UserResponse},
    auth::{password, session},
    config::Config,
    db::{
        handlers::{Doctors, Insurers, Patients, Persons, Repository, Specialties, Users},
        models::{
            doctors::{DoctorCreateDBRequest, DoctorDBResponse},
            insurers::{InsurerCreateDBRequest, InsurerDBResponse},
            patients::{PatientCreateDBRequest, PatientDBResponse},
            persons::{PersonCreateDBRequest, PersonDBResponse},
            specialties::{SpecialtyCreateDBRequest, SpecialtyDBResponse},
            users::UserCreateDBRequest,
        },
    },
};

/// Random suffix so fixtures never collide on unique columns.
fn unique_suffix() -> String {
    let n: u32 = rand::rng().random();
    format!("{n:08x}")
}

pub fn create_test_config() -> Config {
    let mut config = Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        admin_username: "admin".to_string(),
        admin_password: None,
        secret_key: Some("test-secret-key-for-testing-only".to_string()),
        ..Default::default()
    };
    config.auth.session.cookie_secure = false;
    config
}

pub async fn create_test_app(pool: PgPool) -> (TestServer, AppState) {
    create_test_app_with_config(pool, create_test_config()).await
}

pub async fn create_test_app_with_config(pool: PgPool, config: Config) -> (TestServer, AppState) {
    let state = AppState::builder().db(pool).config(config).build();
    let router = crate::build_router(state.clone()).expect("Failed to build router");
    let server = TestServer::new(router).expect("Failed to create test server");
    (server, state)
}

/// Cookie header value for a signed-in caller. Sessions are stateless, so no
/// database row is needed behind the identity.
pub fn session_cookie(user: &CurrentUser, config: &Config) -> String {
    let token = session::create_session_token(user, config).expect("Failed to create session token");
    format!("{}={}", config.auth.session.cookie_name, token)
}

/// Test server whose requests carry a valid reception-role session.
pub async fn authed_server(pool: &PgPool) -> TestServer {
    authed_server_as(pool, Role::Reception).await
}

/// Test server whose requests carry a valid session with the given role.
pub async fn authed_server_as(pool: &PgPool, role: Role) -> TestServer {
    let (mut server, state) = create_test_app(pool.clone()).await;

    let caller = CurrentUser {
        id: 1,
        username: "test-caller".to_string(),
        role,
    };
    server.add_header("cookie", session_cookie(&caller, &state.config));
    server
}

pub fn person_create_request(national_id: &str) -> PersonCreateDBRequest {
    PersonCreateDBRequest {
        first_name: "Maria".to_string(),
        last_name: "Garcia".to_string(),
        birth_date: chrono::NaiveDate::from_ymd_opt(1985, 6, 14).unwrap(),
        gender: "F".to_string(),
        national_id: national_id.to_string(),
        address: Some("Av. Rivadavia 1234".to_string()),
        phone: None,
        email: None,
    }
}

pub fn insurer_create_request(name: &str, code: &str) -> InsurerCreateDBRequest {
    InsurerCreateDBRequest {
        name: name.to_string(),
        code: code.to_string(),
        description: None,
        active: true,
    }
}

pub async fn create_test_person(pool: &PgPool, national_id: &str) -> PersonDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    let mut repo = Persons::new(&mut conn);
    repo.create(&person_create_request(national_id))
        .await
        .expect("Failed to create test person")
}

pub async fn create_test_insurer(pool: &PgPool, name: &str, code: &str) -> InsurerDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    let mut repo = Insurers::new(&mut conn);
    repo.create(&insurer_create_request(name, code))
        .await
        .expect("Failed to create test insurer")
}

pub async fn create_test_user(pool: &PgPool, role: Role) -> UserResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    let mut repo = Users::new(&mut conn);
    let username = format!("testuser_{}", unique_suffix());

    let user = repo
        .create(&UserCreateDBRequest {
            username: username.clone(),
            password_hash: None,
            email: Some(format!("{username}@clinic.example")),
            role,
            person_id: None,
            external_subject: None,
            active: true,
        })
        .await
        .expect("Failed to create test user");

    UserResponse::from(user)
}

pub async fn create_test_user_with_password(pool: &PgPool, username: &str, plain_password: &str, role: Role) -> UserResponse {
    let password_hash = password::hash_string(plain_password).expect("Failed to hash password");

    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    let mut repo = Users::new(&mut conn);

    let user = repo
        .create(&UserCreateDBRequest {
            username: username.to_string(),
            password_hash: Some(password_hash),
            email: Some(format!("{username}@clinic.example")),
            role,
            person_id: None,
            external_subject: None,
            active: true,
        })
        .await
        .expect("Failed to create test user");

    UserResponse::from(user)
}

/// A minimal consistent clinical world: one person who is both the doctor's
/// and the patient's, an insurer, and a specialty.
pub struct ClinicFixture {
    pub person: PersonDBResponse,
    pub insurer: InsurerDBResponse,
    pub specialty: SpecialtyDBResponse,
    pub doctor: DoctorDBResponse,
    pub patient: PatientDBResponse,
}

impl ClinicFixture {
    pub async fn seed(pool: &PgPool) -> Self {
        let suffix = unique_suffix();
        let person = create_test_person(pool, &suffix[..8]).await;
        let insurer = create_test_insurer(pool, &format!("Obra {suffix}"), &suffix[..6]).await;

        let mut conn = pool.acquire().await.expect("Failed to acquire connection");

        let specialty = Specialties::new(&mut conn)
            .create(&SpecialtyCreateDBRequest {
                name: format!("Clinica {suffix}"),
            })
            .await
            .expect("Failed to create test specialty");

        let doctor = Doctors::new(&mut conn)
            .create(&DoctorCreateDBRequest {
                person_id: person.id,
                specialty_id: specialty.id,
                license_number: format!("MP-{}", &suffix[..6]),
                phone: None,
                email: None,
                active: true,
            })
            .await
            .expect("Failed to create test doctor");

        let patient = Patients::new(&mut conn)
            .create(&PatientCreateDBRequest {
                person_id: person.id,
                insurer_id: insurer.id,
                active: true,
            })
            .await
            .expect("Failed to create test patient");

        Self {
            person,
            insurer,
            specialty,
            doctor,
            patient,
        }
    }
}
