//! Input validation for API requests.
//!
//! Field validators return `Result<(), String>` with the user-facing message.
//! The `validate_*_request` functions collect every failing field into a
//! single `ApiError` through `ValidationErrorBuilder`.

use lazy_static::lazy_static;
use regex::Regex;

use super::error::{ApiError, ValidationErrorBuilder};
use crate::db::{
    CreateOrganizationRequest, LoginRequest, RegisterRequest, SubmitApplicationRequest,
    SubmitStaffApplicationRequest, UpdateOrganizationRequest,
};

lazy_static! {
    /// Pragmatic email shape check: local@domain.tld, no spaces
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[^\s@]+@[^\s@]+\.[^\s@]+$"
    ).unwrap();

    /// `#RRGGBB`
    static ref HEX_COLOR_REGEX: Regex = Regex::new(
        r"^#[0-9A-Fa-f]{6}$"
    ).unwrap();
}

pub const LOGIN_PASSWORD_MIN: usize = 6;
pub const REGISTER_PASSWORD_MIN: usize = 8;

fn char_len(value: &str) -> usize {
    value.trim().chars().count()
}

pub fn validate_email(email: &str) -> Result<(), String> {
    let email = email.trim();
    if email.is_empty() || email.len() > 254 || !EMAIL_REGEX.is_match(email) {
        return Err("Email inválido".to_string());
    }
    Ok(())
}

pub fn validate_username(username: &str) -> Result<(), String> {
    let len = char_len(username);
    if !(3..=50).contains(&len) {
        return Err("Username deve ter entre 3-50 caracteres".to_string());
    }
    Ok(())
}

pub fn validate_password(password: &str, min: usize) -> Result<(), String> {
    if password.chars().count() < min {
        return Err(format!("Password deve ter pelo menos {} caracteres", min));
    }
    Ok(())
}

pub fn validate_hex_color(color: &str) -> Result<(), String> {
    if !HEX_COLOR_REGEX.is_match(color) {
        return Err("Cor deve ser um hex válido".to_string());
    }
    Ok(())
}

pub fn validate_organization_name(name: &str) -> Result<(), String> {
    let len = char_len(name);
    if !(3..=100).contains(&len) {
        return Err("Nome deve ter entre 3-100 caracteres".to_string());
    }
    Ok(())
}

pub fn validate_organization_description(description: &str) -> Result<(), String> {
    let len = char_len(description);
    if !(10..=500).contains(&len) {
        return Err("Descrição deve ter entre 10-500 caracteres".to_string());
    }
    Ok(())
}

/// At least one non-blank entry
pub fn validate_non_empty_list(items: &[String], message: &str) -> Result<(), String> {
    if items.iter().all(|item| item.trim().is_empty()) {
        return Err(message.to_string());
    }
    Ok(())
}

fn validate_required(value: &str, message: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(message.to_string());
    }
    Ok(())
}

fn validate_min_chars(value: &str, min: usize, message: &str) -> Result<(), String> {
    if char_len(value) < min {
        return Err(message.to_string());
    }
    Ok(())
}

fn validate_range(value: i64, min: i64, max: i64, message: &str) -> Result<(), String> {
    if value < min || value > max {
        return Err(message.to_string());
    }
    Ok(())
}

fn check(builder: &mut ValidationErrorBuilder, field: &str, result: Result<(), String>) {
    if let Err(message) = result {
        builder.add(field, message);
    }
}

pub fn validate_login_request(req: &LoginRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    check(&mut errors, "email", validate_email(&req.email));
    check(&mut errors, "password", validate_password(&req.password, LOGIN_PASSWORD_MIN));
    errors.finish()
}

pub fn validate_register_request(req: &RegisterRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    check(&mut errors, "username", validate_username(&req.username));
    check(&mut errors, "email", validate_email(&req.email));
    check(&mut errors, "password", validate_password(&req.password, REGISTER_PASSWORD_MIN));
    errors.finish()
}

pub fn validate_create_organization(req: &CreateOrganizationRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    check(&mut errors, "name", validate_organization_name(&req.name));
    check(&mut errors, "description", validate_organization_description(&req.description));
    check(&mut errors, "colorHex", validate_hex_color(&req.color_hex));
    check(
        &mut errors,
        "requirements",
        validate_non_empty_list(&req.requirements, "Pelo menos um requisito é necessário"),
    );
    check(
        &mut errors,
        "benefits",
        validate_non_empty_list(&req.benefits, "Pelo menos um benefício é necessário"),
    );
    errors.finish()
}

/// Same rules as creation, applied only to the fields present
pub fn validate_update_organization(req: &UpdateOrganizationRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    if let Some(name) = &req.name {
        check(&mut errors, "name", validate_organization_name(name));
    }
    if let Some(description) = &req.description {
        check(&mut errors, "description", validate_organization_description(description));
    }
    if let Some(color) = &req.color_hex {
        check(&mut errors, "colorHex", validate_hex_color(color));
    }
    if let Some(requirements) = &req.requirements {
        check(
            &mut errors,
            "requirements",
            validate_non_empty_list(requirements, "Pelo menos um requisito é necessário"),
        );
    }
    if let Some(benefits) = &req.benefits {
        check(
            &mut errors,
            "benefits",
            validate_non_empty_list(benefits, "Pelo menos um benefício é necessário"),
        );
    }
    errors.finish()
}

pub fn validate_application(req: &SubmitApplicationRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    check(
        &mut errors,
        "character_name",
        validate_min_chars(&req.character_name, 3, "Nome da personagem deve ter pelo menos 3 caracteres"),
    );
    check(
        &mut errors,
        "player_name",
        validate_required(&req.player_name, "Nome do jogador é obrigatório"),
    );
    check(&mut errors, "email", validate_email(&req.email));
    check(
        &mut errors,
        "discord_username",
        validate_required(&req.discord_username, "Username do Discord é obrigatório"),
    );
    check(
        &mut errors,
        "character_age",
        validate_range(req.character_age, 18, 80, "Idade da personagem deve estar entre 18 e 80"),
    );
    check(
        &mut errors,
        "hours_played",
        validate_range(req.hours_played, 0, i64::MAX, "Horas jogadas não pode ser negativo"),
    );
    check(
        &mut errors,
        "motivation",
        validate_min_chars(&req.motivation, 50, "Motivação deve ter pelo menos 50 caracteres"),
    );
    errors.finish()
}

pub fn validate_staff_application(req: &SubmitStaffApplicationRequest) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    check(&mut errors, "name", validate_required(&req.name, "Nome é obrigatório"));
    check(&mut errors, "email", validate_email(&req.email));
    check(&mut errors, "age", validate_range(req.age, 18, 99, "Idade deve estar entre 18 e 99"));
    check(
        &mut errors,
        "discord_username",
        validate_required(&req.discord_username, "Username do Discord é obrigatório"),
    );
    check(
        &mut errors,
        "experience",
        validate_min_chars(&req.experience, 50, "Experiência deve ter pelo menos 50 caracteres"),
    );
    check(
        &mut errors,
        "motivation",
        validate_min_chars(&req.motivation, 50, "Motivação deve ter pelo menos 50 caracteres"),
    );
    check(
        &mut errors,
        "hours_per_week",
        validate_range(req.hours_per_week, 5, 100, "Horas semanais devem estar entre 5 e 100"),
    );
    errors.finish()
}
