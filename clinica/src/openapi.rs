//! OpenAPI documentation aggregation.

use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::api::handlers;
use crate::api::models;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "clinica API",
        description = "Administration backend for clinic medical records"
    ),
    paths(
        handlers::auth::login,
        handlers::auth::me,
        handlers::login::google_login,
        handlers::login::google_response,
        handlers::login::logout,
        handlers::persons::list_persons,
        handlers::persons::get_person,
        handlers::persons::create_person,
        handlers::persons::replace_person,
        handlers::persons::delete_person,
        handlers::users::list_users,
        handlers::users::get_user,
        handlers::users::create_user,
        handlers::users::replace_user,
        handlers::users::delete_user,
        handlers::specialties::list_specialties,
        handlers::specialties::get_specialty,
        handlers::specialties::create_specialty,
        handlers::specialties::replace_specialty,
        handlers::specialties::delete_specialty,
        handlers::insurers::list_insurers,
        handlers::insurers::get_insurer,
        handlers::insurers::create_insurer,
        handlers::insurers::replace_insurer,
        handlers::insurers::delete_insurer,
        handlers::doctors::list_doctors,
        handlers::doctors::get_doctor,
        handlers::doctors::create_doctor,
        handlers::doctors::replace_doctor,
        handlers::doctors::delete_doctor,
        handlers::patients::list_patients,
        handlers::patients::get_patient,
        handlers::patients::create_patient,
        handlers::patients::replace_patient,
        handlers::patients::delete_patient,
        handlers::orders::list_orders,
        handlers::orders::get_order,
        handlers::orders::create_order,
        handlers::orders::replace_order,
        handlers::orders::delete_order,
        handlers::orders::list_order_lines,
        handlers::orders::get_order_line,
        handlers::orders::create_order_line,
        handlers::orders::replace_order_line,
        handlers::orders::delete_order_line,
    ),
    components(schemas(
        models::auth::LoginRequest,
        models::auth::LoginBody,
        models::auth::AuthSuccessResponse,
        models::persons::PersonCreate,
        models::persons::PersonReplace,
        models::persons::PersonResponse,
        models::users::Role,
        models::users::UserCreate,
        models::users::UserReplace,
        models::users::UserResponse,
        models::users::CurrentUser,
        models::specialties::SpecialtyCreate,
        models::specialties::SpecialtyReplace,
        models::specialties::SpecialtyResponse,
        models::insurers::InsurerCreate,
        models::insurers::InsurerReplace,
        models::insurers::InsurerResponse,
        models::doctors::DoctorCreate,
        models::doctors::DoctorReplace,
        models::doctors::DoctorResponse,
        models::patients::PatientCreate,
        models::patients::PatientReplace,
        models::patients::PatientResponse,
        models::orders::OrderStatus,
        models::orders::OrderCreate,
        models::orders::OrderReplace,
        models::orders::OrderResponse,
        models::orders::OrderLineCreate,
        models::orders::OrderLineReplace,
        models::orders::OrderLineResponse,
    )),
    modifiers(&CookieSecurity),
    tags(
        (name = "authentication", description = "Login, logout and session identity"),
        (name = "persons", description = "People shared by users, doctors and patients"),
        (name = "users", description = "Account management (admin only)"),
        (name = "specialties", description = "Medical specialties"),
        (name = "insurers", description = "Health insurance providers"),
        (name = "doctors", description = "Doctors"),
        (name = "patients", description = "Patients"),
        (name = "orders", description = "Medical orders and their lines"),
    )
)]
pub struct ApiDoc;

struct CookieSecurity;

impl Modify for CookieSecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "CookieAuth",
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new("clinica_session"))),
            );
        }
    }
}
