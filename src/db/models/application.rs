//! Organization application (candidature) models and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Review state of an organization application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
pub enum ApplicationStatus {
    Pendente,
    EmAnalise,
    Aprovada,
    Rejeitada,
}

impl ApplicationStatus {
    pub const ALL: [ApplicationStatus; 4] = [
        ApplicationStatus::Pendente,
        ApplicationStatus::EmAnalise,
        ApplicationStatus::Aprovada,
        ApplicationStatus::Rejeitada,
    ];

    /// Open applications block a new submission from the same email
    pub fn is_open(&self) -> bool {
        matches!(self, ApplicationStatus::Pendente | ApplicationStatus::EmAnalise)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_open()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Pendente => "pendente",
            ApplicationStatus::EmAnalise => "em_analise",
            ApplicationStatus::Aprovada => "aprovada",
            ApplicationStatus::Rejeitada => "rejeitada",
        }
    }
}

impl std::fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ApplicationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pendente" => Ok(ApplicationStatus::Pendente),
            "em_analise" => Ok(ApplicationStatus::EmAnalise),
            "aprovada" => Ok(ApplicationStatus::Aprovada),
            "rejeitada" => Ok(ApplicationStatus::Rejeitada),
            _ => Err(format!("Unknown application status: {}", s)),
        }
    }
}

/// Application row joined with organization display data and reviewer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationView {
    pub id: String,
    pub organization_id: String,
    pub organization_name: String,
    pub organization_color: String,
    pub character_name: String,
    pub player_name: String,
    pub email: String,
    pub discord_username: String,
    pub character_age: i64,
    pub hours_played: i64,
    pub prior_experience: Option<String>,
    pub motivation: String,
    pub availability: Option<String>,
    pub additional_info: Option<String>,
    pub status: ApplicationStatus,
    pub admin_notes: Option<String>,
    pub reviewed_by: Option<String>,
    pub reviewed_by_username: Option<String>,
    pub reviewed_at: Option<String>,
    pub created_at: String,
}

/// Public submission; snake_case on the wire, legacy camelCase names accepted
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubmitApplicationRequest {
    #[serde(alias = "nomePersonagem", alias = "nome_personagem")]
    pub character_name: String,
    #[serde(alias = "nomeJogador", alias = "nome_jogador")]
    pub player_name: String,
    pub email: String,
    #[serde(alias = "discordUsername")]
    pub discord_username: String,
    #[serde(alias = "idadePersonagem", alias = "idade_personagem")]
    pub character_age: i64,
    #[serde(alias = "horasJogadas", alias = "horas_jogadas")]
    pub hours_played: i64,
    #[serde(default, alias = "experienciaPrevia", alias = "experiencia_previa")]
    pub prior_experience: Option<String>,
    #[serde(alias = "motivacao")]
    pub motivation: String,
    #[serde(default, alias = "disponibilidade")]
    pub availability: Option<String>,
    #[serde(default, alias = "informacaoAdicional", alias = "informacao_adicional")]
    pub additional_info: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitApplicationResponse {
    pub success: bool,
    pub message: String,
    pub application_id: String,
}

/// Reviewer decision; accepts the `{estado, notasAdmin}` body used by the SPA
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateApplicationStatusRequest {
    #[serde(alias = "estado")]
    pub status: String,
    #[serde(default, alias = "notasAdmin", alias = "admin_notes")]
    pub notes: Option<String>,
}

/// Filters for the management listing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApplicationQuery {
    pub organization: Option<String>,
    pub status: Option<String>,
    pub search: Option<String>,
}

/// Count of applications per review state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationStats {
    pub total: i64,
    pub pendente: i64,
    pub em_analise: i64,
    pub aprovada: i64,
    pub rejeitada: i64,
}
